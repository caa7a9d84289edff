//! Example: Nested Collection Types
//!
//! Reconstructs a table-of-record argument tree from its leveled rows
//! and shows the deduplicated message emission, including a ref-cursor
//! output that turns the service method into a stream.
//!
//! Run with: cargo run --example nested_tables

use catalog_to_proto::{parse_functions, write_protobuf, ArgKind, Argument, NullReporter};

const CSV: &str = "\
OBJECT_ID,SUBPROGRAM_ID,PACKAGE_NAME,OBJECT_NAME,DATA_LEVEL,SEQUENCE,\
ARGUMENT_NAME,IN_OUT,DATA_TYPE,DATA_PRECISION,DATA_SCALE,CHARACTER_SET_NAME,\
PLS_TYPE,CHAR_LENGTH,TYPE_LINK,TYPE_OWNER,TYPE_NAME,TYPE_SUBNAME
1,1,DB_WEB,SAVE_ORDER,0,1,LINES,IN,PL/SQL TABLE,0,0,,,0,,,DB_WEB,LINE_REC
1,1,DB_WEB,SAVE_ORDER,1,2,,IN,PL/SQL RECORD,0,0,,,0,,,DB_WEB,LINE_REC
1,1,DB_WEB,SAVE_ORDER,2,3,PRODUCT_ID,IN,NUMBER,9,0,,NUMBER,0,,,,
1,1,DB_WEB,SAVE_ORDER,2,4,QUANTITY,IN,NUMBER,9,0,,NUMBER,0,,,,
1,1,DB_WEB,SAVE_ORDER,2,5,NOTES,IN,PL/SQL TABLE,0,0,,,0,,,DB_WEB,NOTE_TAB
1,1,DB_WEB,SAVE_ORDER,3,6,,IN,VARCHAR2,0,0,,VARCHAR2,200,,,,
1,1,DB_WEB,SAVE_ORDER,0,7,ORDER_ID,OUT,NUMBER,9,0,,NUMBER,0,,,,
1,2,DB_WEB,LIST_ORDERS,0,1,ROWS,OUT,REF CURSOR,0,0,,,0,,,,
1,2,DB_WEB,LIST_ORDERS,1,2,,OUT,PL/SQL RECORD,0,0,,,0,,,DB_WEB,ORDER_REC
1,2,DB_WEB,LIST_ORDERS,2,3,ORDER_ID,OUT,NUMBER,9,0,,NUMBER,0,,,,
1,2,DB_WEB,LIST_ORDERS,2,4,PLACED,OUT,DATE,0,0,,DATE,0,,,,
";

fn main() {
    println!("=== Nested Tables Example ===\n");

    let functions = parse_functions(CSV.as_bytes(), None, &NullReporter).unwrap();
    for f in &functions {
        println!("{}:", f.real_name());
        for arg in &f.args {
            print_tree(arg, 1);
        }
    }

    let mut proto = Vec::new();
    write_protobuf(&mut proto, &functions, "web", &NullReporter).unwrap();
    println!("\n{}", String::from_utf8(proto).unwrap());
}

fn print_tree(arg: &Argument, depth: usize) {
    let indent = "  ".repeat(depth);
    let label = if arg.name.is_empty() {
        "<element>"
    } else {
        arg.name.as_str()
    };
    match &arg.kind {
        ArgKind::Simple => println!("{}{} ({})", indent, label, arg.data_type),
        ArgKind::Record { fields } => {
            println!("{}{} record of {} fields", indent, label, fields.len());
            for field in fields {
                print_tree(field, depth + 1);
            }
        }
        ArgKind::Table { element } => {
            println!("{}{} table", indent, label);
            if let Some(element) = element {
                print_tree(element, depth + 1);
            }
        }
    }
}
