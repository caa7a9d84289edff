//! Error types for the catalog to proto compiler

use thiserror::Error;

/// Result type for compilation operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Compilation errors
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Header error: {message}")]
    HeaderError { message: String },

    #[error("Parse error at row {row}: {message}")]
    ParseError { row: usize, message: String },

    #[error("Missing column {column} at row {row}")]
    MissingColumn { row: usize, column: &'static str },

    #[error("Invalid hierarchy in {function} at row {row}: no parent for level {level} (seen: {parents})")]
    InvalidHierarchy {
        function: String,
        row: usize,
        level: i16,
        parents: String,
    },

    #[error("Missing element type for {argument} in message {message}")]
    MissingElementType { message: String, argument: String },

    #[error("Unknown directive {directive:?} on line {line}")]
    UnknownDirective { line: usize, directive: String },

    #[error("Annotation syntax error on line {line}: {message}")]
    AnnotationSyntax { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub fn header(msg: impl Into<String>) -> Self {
        CompileError::HeaderError { message: msg.into() }
    }

    pub fn parse(row: usize, msg: impl Into<String>) -> Self {
        CompileError::ParseError { row, message: msg.into() }
    }

    pub fn annotation_syntax(line: usize, msg: impl Into<String>) -> Self {
        CompileError::AnnotationSyntax { line, message: msg.into() }
    }
}
