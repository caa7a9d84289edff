//! Example: Annotation Directives
//!
//! Shows the annotation language rewriting a compiled function set:
//! a rename, a suppression, and a collection-size cap.
//!
//! Run with: cargo run --example annotations

use catalog_to_proto::{
    apply_annotations, parse_annotations, parse_functions, write_protobuf, NullReporter,
};

const CSV: &str = "\
OBJECT_ID,SUBPROGRAM_ID,PACKAGE_NAME,OBJECT_NAME,DATA_LEVEL,SEQUENCE,\
ARGUMENT_NAME,IN_OUT,DATA_TYPE,DATA_PRECISION,DATA_SCALE,CHARACTER_SET_NAME,\
PLS_TYPE,CHAR_LENGTH,TYPE_LINK,TYPE_OWNER,TYPE_NAME,TYPE_SUBNAME
1,1,DB_WEB,SEND_PREOFFER_31101,0,1,CUSTOMER_ID,IN,NUMBER,9,0,,NUMBER,0,,,,
1,2,DB_WEB,INTERNAL_CHECK,0,1,WHAT,IN,VARCHAR2,0,0,,VARCHAR2,30,,,,
1,3,DB_WEB,LIST_ITEMS,0,1,ITEMS,OUT,PL/SQL TABLE,0,0,,,0,,,ITEM_REC,
1,3,DB_WEB,LIST_ITEMS,1,2,,OUT,PL/SQL RECORD,0,0,,,0,,,ITEM_REC,
1,3,DB_WEB,LIST_ITEMS,2,3,ID,OUT,NUMBER,9,0,,NUMBER,0,,,,
";

const DIRECTIVES: &str = "\
# tidy the public surface
rename         DB_WEB.SEND_PREOFFER_31101 => DB_WEB.SEND_PREOFFER
private        DB_WEB.INTERNAL_CHECK
max-table-size DB_WEB.LIST_ITEMS = 1000
";

fn main() {
    println!("=== Annotation Example ===\n");

    let functions = parse_functions(CSV.as_bytes(), None, &NullReporter).unwrap();
    println!("Compiled functions:");
    for f in &functions {
        println!("  {}", f.real_name());
    }

    let annotations = parse_annotations(DIRECTIVES).unwrap();
    println!("\nDirectives:");
    for a in &annotations {
        println!("  {}", a);
    }

    let mut functions = apply_annotations(functions, &annotations, &NullReporter);
    functions.sort_by_key(|f| f.name());
    println!("\nAfter rewriting:");
    for f in &functions {
        print!("  {}", f.name());
        if f.max_table_size > 0 {
            print!(" (max table size {})", f.max_table_size);
        }
        println!();
    }

    let mut proto = Vec::new();
    write_protobuf(&mut proto, &functions, "web", &NullReporter).unwrap();
    println!("\n{}", String::from_utf8(proto).unwrap());
}
