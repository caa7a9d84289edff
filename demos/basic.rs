//! Example: Basic Compilation
//!
//! Compiles a small catalog export into a proto3 schema.
//!
//! Run with: cargo run --example basic

use catalog_to_proto::compile;

const CSV: &str = "\
OBJECT_ID,SUBPROGRAM_ID,PACKAGE_NAME,OBJECT_NAME,DATA_LEVEL,SEQUENCE,\
ARGUMENT_NAME,IN_OUT,DATA_TYPE,DATA_PRECISION,DATA_SCALE,CHARACTER_SET_NAME,\
PLS_TYPE,CHAR_LENGTH,TYPE_LINK,TYPE_OWNER,TYPE_NAME,TYPE_SUBNAME
1,1,DB_WEB,LOGIN,0,1,USERNAME,IN,VARCHAR2,0,0,,VARCHAR2,30,,,,
1,1,DB_WEB,LOGIN,0,2,PASSWORD,IN,VARCHAR2,0,0,,VARCHAR2,60,,,,
1,1,DB_WEB,LOGIN,0,3,SESSION_ID,OUT,VARCHAR2,0,0,,VARCHAR2,64,,,,
1,2,DB_WEB,LOGOUT,0,1,SESSION_ID,IN,VARCHAR2,0,0,,VARCHAR2,64,,,,
1,3,DB_WEB,COUNT_LOGINS,0,1,,OUT,NUMBER,0,0,,NUMBER,0,,,,
1,3,DB_WEB,COUNT_LOGINS,0,2,SINCE,IN,DATE,0,0,,DATE,0,,,,
";

fn main() {
    println!("=== Basic Compilation Example ===\n");
    println!("Input: {} catalog rows\n", CSV.lines().count() - 1);

    let mut proto = Vec::new();
    compile(CSV.as_bytes(), &[], "web", &mut proto).unwrap();

    println!("{}", String::from_utf8(proto).unwrap());
}
