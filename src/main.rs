//! Catalog to Proto Compiler CLI
//!
//! Usage:
//!   catalog2proto export.csv -p web -o web.proto
//!   catalog2proto export.csv -a annotations.txt --only "DB_WEB.*"
//!   catalog2proto --json < export.csv

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};

use clap::Parser;
use colored::Colorize;

use catalog_to_proto::{
    apply_annotations, parse_annotations, pipeline, write_protobuf, Annotation, CompileResult,
    NameFilter, NullReporter, Reporter, TraceReporter,
};

#[derive(Parser, Debug)]
#[command(name = "catalog2proto")]
#[command(author = "DB Integration Team")]
#[command(version = "0.1.0")]
#[command(about = "Compiles stored-procedure catalog exports to proto3 schemas")]
struct Args {
    /// Catalog CSV export; '-' reads standard input
    #[arg(value_name = "CSV", default_value = "-")]
    csv: String,

    /// Annotation directive file
    #[arg(short = 'a', long = "annotations")]
    annotations: Option<String>,

    /// Package name of the generated schema
    #[arg(short = 'p', long = "package", default_value = "")]
    package: String,

    /// Output file; standard output when absent
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Keep only matching functions; a trailing '*' makes a prefix match
    #[arg(long = "only", value_name = "PATTERN")]
    only: Vec<String>,

    /// Dump the rewritten function set as JSON instead of a schema
    #[arg(short = 'j', long = "json")]
    json_output: bool,

    /// Verbose diagnostics on stderr
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_writer(io::stderr)
            .init();
    }

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> CompileResult<()> {
    let annotations: Vec<Annotation> = match &args.annotations {
        Some(path) => parse_annotations(&fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let reporter: &dyn Reporter = if args.verbose {
        &TraceReporter
    } else {
        &NullReporter
    };

    let patterns = args.only.clone();
    let only = move |name: &str| patterns.iter().any(|p| matches_pattern(p, name));
    let filter: Option<&NameFilter> = if args.only.is_empty() {
        None
    } else {
        Some(&only)
    };

    let input = pipeline::open_csv(&args.csv)?;
    let functions = pipeline::parse_functions(input, filter, reporter)?;
    let mut functions = apply_annotations(functions, &annotations, reporter);
    functions.sort_by_key(|f| f.name());

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    if args.json_output {
        serde_json::to_writer_pretty(&mut out, &functions).map_err(io::Error::from)?;
        writeln!(out)?;
    } else {
        write_protobuf(&mut out, &functions, &args.package, reporter)?;
    }
    out.flush()?;
    Ok(())
}

/// Case-insensitive name match with optional trailing-`*` prefix form
///
/// The filter sees both qualified and bare object names, so a qualified
/// pattern falls back to its last segment when matched against a bare
/// name.
fn matches_pattern(pattern: &str, name: &str) -> bool {
    let pattern = if pattern.contains('.') && !name.contains('.') {
        pattern.rsplit('.').next().unwrap_or(pattern)
    } else {
        pattern
    };
    let pattern = pattern.to_lowercase();
    let name = name.to_lowercase();
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}
