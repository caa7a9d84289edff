//! Catalog to Proto Compiler
//!
//! This library compiles a flat, leveled CSV export of stored-procedure
//! signatures into a proto3 schema. The export is read as a stream of
//! rows, rows are grouped per subprogram and reassembled into nested
//! argument trees, the resulting function set is rewritten by annotation
//! directives, and the survivors are lowered into message and service
//! declarations.
//!
//! # Example
//!
//! ```rust
//! use catalog_to_proto::compile;
//!
//! let csv = "\
//! OBJECT_ID,SUBPROGRAM_ID,PACKAGE_NAME,OBJECT_NAME,DATA_LEVEL,SEQUENCE,\
//! ARGUMENT_NAME,IN_OUT,DATA_TYPE,DATA_PRECISION,DATA_SCALE,CHARACTER_SET_NAME,\
//! PLS_TYPE,CHAR_LENGTH,TYPE_LINK,TYPE_OWNER,TYPE_NAME,TYPE_SUBNAME
//! 1,1,DB_WEB,LOGIN,0,1,USERNAME,IN,VARCHAR2,0,0,,VARCHAR2,30,,,,
//! 1,1,DB_WEB,LOGIN,0,2,SESSION_ID,OUT,VARCHAR2,0,0,,VARCHAR2,64,,,,
//! ";
//! let mut proto = Vec::new();
//! compile(csv.as_bytes(), &[], "web", &mut proto).unwrap();
//! let proto = String::from_utf8(proto).unwrap();
//! assert!(proto.contains("service db_web__login"));
//! ```

pub mod annotation;
pub mod builder;
pub mod codegen;
pub mod error;
pub mod grouper;
pub mod ir;
pub mod pipeline;
pub mod reader;
pub mod report;

pub use annotation::{apply_annotations, parse_annotations, Annotation, AnnotationKind};
pub use builder::build_function;
pub use codegen::write_protobuf;
pub use error::{CompileError, CompileResult};
pub use ir::{ArgKind, Argument, Direction, FlatArgument, Function};
pub use pipeline::{open_csv, parse_functions, NameFilter};
pub use reader::CsvReader;
pub use report::{CompileEvent, NullReporter, Reporter, TraceReporter};

use std::io::{BufRead, Write};

/// Compile a catalog export into a proto3 schema
pub fn compile<W: Write>(
    input: impl BufRead + Send,
    annotations: &[Annotation],
    package: &str,
    dst: &mut W,
) -> CompileResult<()> {
    compile_with(input, annotations, package, dst, None, &NullReporter)
}

/// Compile with a name filter and an observer for progress events
pub fn compile_with<W: Write>(
    input: impl BufRead + Send,
    annotations: &[Annotation],
    package: &str,
    dst: &mut W,
    filter: Option<&NameFilter>,
    reporter: &dyn Reporter,
) -> CompileResult<()> {
    let functions = pipeline::parse_functions(input, filter, reporter)?;
    let mut functions = annotation::apply_annotations(functions, annotations, reporter);
    // the rewriter drains a map; sort for reproducible output
    functions.sort_by_key(|f| f.name());
    codegen::write_protobuf(dst, &functions, package, reporter)
}
