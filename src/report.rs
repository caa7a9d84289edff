//! Progress and diagnostic events surfaced to the embedding caller
//!
//! The compiler core never logs on its own; every stage takes a [`Reporter`]
//! and emits [`CompileEvent`]s through it. [`NullReporter`] drops everything,
//! [`TraceReporter`] forwards to the `tracing` ecosystem.

/// Observer for compilation progress and non-fatal findings
pub trait Reporter: Send + Sync {
    fn event(&self, event: CompileEvent<'_>);
}

/// One notable occurrence during a compile run
#[derive(Debug, Clone)]
pub enum CompileEvent<'a> {
    /// CSV header resolved: sniffed delimiter plus the mapped columns
    ColumnsResolved { delimiter: char, columns: &'a str },
    /// A function tree was reconstructed
    FunctionParsed { name: &'a str, arguments: usize },
    /// A function was dropped (hidden, filtered, or unemittable)
    FunctionSkipped { name: &'a str, reason: &'a str },
    /// An annotation directive rewrote the function set
    AnnotationApplied { directive: &'a str },
    /// An annotation directive did not meet its preconditions
    AnnotationSkipped { directive: &'a str, reason: &'a str },
    /// A message definition was written
    TypeEmitted { message: &'a str },
    /// A message name was redefined with a different structure
    TypeCollision { message: &'a str, function: &'a str },
}

/// Reporter that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn event(&self, _event: CompileEvent<'_>) {}
}

/// Reporter that forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceReporter;

impl Reporter for TraceReporter {
    fn event(&self, event: CompileEvent<'_>) {
        match event {
            CompileEvent::ColumnsResolved { delimiter, columns } => {
                tracing::debug!(%delimiter, columns, "resolved csv header");
            }
            CompileEvent::FunctionParsed { name, arguments } => {
                tracing::debug!(name, arguments, "parsed function");
            }
            CompileEvent::FunctionSkipped { name, reason } => {
                tracing::debug!(name, reason, "skipped function");
            }
            CompileEvent::AnnotationApplied { directive } => {
                tracing::debug!(directive, "applied annotation");
            }
            CompileEvent::AnnotationSkipped { directive, reason } => {
                tracing::debug!(directive, reason, "skipped annotation");
            }
            CompileEvent::TypeEmitted { message } => {
                tracing::trace!(message, "emitted message type");
            }
            CompileEvent::TypeCollision { message, function } => {
                tracing::warn!(message, function, "conflicting message definitions");
            }
        }
    }
}
