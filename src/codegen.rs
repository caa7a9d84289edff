//! Emits a proto3 schema from the compiled function set
//!
//! Every function becomes a `<name>__input` and `<name>__output` message
//! plus a one-method service; nested record and table types become their
//! own messages, each emitted once per run. Children render into a side
//! buffer that is flushed after the parent's closing brace, so the text
//! reads top down.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::io::Write;

use crate::error::{CompileError, CompileResult};
use crate::ir::{ArgKind, Argument, Function};
use crate::report::{CompileEvent, Reporter};

/// Proto file carrying the field-option extensions
const GOGO_IMPORT: &str = "github.com/gogo/protobuf/gogoproto/gogo.proto";

/// Package prefix of the string-backed custom scalar types
const CUSTOM_TYPES: &str = "custom";

/// Write the whole schema: header, messages, and one service per function
///
/// A function whose collection argument never received an element type is
/// skipped with a [`CompileEvent::FunctionSkipped`] and emission continues;
/// anything else fails the run.
pub fn write_protobuf<W: Write>(
    dst: &mut W,
    functions: &[Function],
    package: &str,
    reporter: &dyn Reporter,
) -> CompileResult<()> {
    let mut out = String::from("syntax = \"proto3\";\n\n");
    if !package.is_empty() {
        let _ = writeln!(out, "package {};", package);
    }
    let _ = writeln!(out, "\nimport \"{}\";", GOGO_IMPORT);

    let mut seen: HashMap<String, u64> = HashMap::new();
    for fun in functions {
        // validate up front so a skipped function leaves no half-emitted
        // types in the dedup map
        if let Err(e) = check_elements(fun) {
            reporter.event(CompileEvent::FunctionSkipped {
                name: &fun.name(),
                reason: &e.to_string(),
            });
            continue;
        }

        let flat = flatten_name(&fun.name());
        let inputs: Vec<&Argument> = fun
            .args
            .iter()
            .filter(|a| a.direction.is_input())
            .collect();
        let mut outputs: Vec<&Argument> = fun
            .args
            .iter()
            .filter(|a| a.direction.is_output())
            .collect();
        if let Some(ret) = &fun.returns {
            outputs.push(ret);
        }

        write_message(&mut out, &format!("{}__input", flat), &inputs, &mut seen, fun, reporter)?;
        write_message(&mut out, &format!("{}__output", flat), &outputs, &mut seen, fun, reporter)?;

        let stream = if fun.returns_cursor() { "stream " } else { "" };
        let _ = write!(
            out,
            "\nservice {} {{\n\trpc {} ({}__input) returns ({}{}__output) {{}}\n}}\n",
            flat, flat, flat, stream, flat
        );
    }

    dst.write_all(out.as_bytes())?;
    Ok(())
}

/// Emit one message; nested composite types go through the dedup map
fn write_message(
    out: &mut String,
    msg_name: &str,
    args: &[&Argument],
    seen: &mut HashMap<String, u64>,
    fun: &Function,
    reporter: &dyn Reporter,
) -> CompileResult<()> {
    let mut children = String::new();
    let _ = write!(out, "\nmessage {} {{\n", msg_name);

    for (i, arg) in args.iter().enumerate() {
        let rule = match arg.kind {
            ArgKind::Table { .. } => "repeated ",
            _ => "",
        };
        let fname = field_name(&arg.name);

        if let Some(leaf) = scalar_leaf(arg) {
            let (typ, opts) = proto_type(&scalar_type(leaf));
            let opts = match opts {
                Some(opts) => format!(" {}", opts),
                None => String::new(),
            };
            let _ = writeln!(out, "\t{}{} {} = {}{};", rule, typ, fname, i + 1, opts);
            continue;
        }

        // the sub-message named after the linked type identity
        let typ = message_type_name(arg);
        let sub = child_args(arg)?;
        let fp = fingerprint(&sub);
        match seen.get(&typ).copied() {
            None => {
                write_message(&mut children, &typ, &sub, seen, fun, reporter)?;
                seen.insert(typ.clone(), fp);
            }
            Some(prior) if prior != fp => {
                reporter.event(CompileEvent::TypeCollision {
                    message: &typ,
                    function: &fun.name(),
                });
            }
            Some(_) => {}
        }
        let _ = writeln!(out, "\t{}{} {} = {};", rule, typ, fname, i + 1);
    }

    out.push_str("}\n");
    out.push_str(&children);
    reporter.event(CompileEvent::TypeEmitted { message: msg_name });
    Ok(())
}

/// The scalar argument a field line describes, if the field is scalar
///
/// A table of a scalar renders inline as a repeated scalar field instead
/// of a one-field sub-message.
fn scalar_leaf(arg: &Argument) -> Option<&Argument> {
    match &arg.kind {
        ArgKind::Simple => Some(arg),
        ArgKind::Table { element: Some(el) } if el.kind == ArgKind::Simple => Some(el),
        _ => None,
    }
}

/// Fields of the sub-message a composite argument maps to
fn child_args(arg: &Argument) -> CompileResult<Vec<&Argument>> {
    match &arg.kind {
        ArgKind::Record { fields } => Ok(fields.iter().collect()),
        ArgKind::Table { element: Some(el) } => match &el.kind {
            ArgKind::Record { fields } => Ok(fields.iter().collect()),
            _ => Ok(vec![el.as_ref()]),
        },
        ArgKind::Table { element: None } => Err(CompileError::MissingElementType {
            message: message_type_name(arg),
            argument: arg.name.clone(),
        }),
        ArgKind::Simple => Ok(Vec::new()),
    }
}

/// Fail on any collection in the tree that never received an element
fn check_elements(fun: &Function) -> CompileResult<()> {
    fn check(msg: &str, args: &[&Argument]) -> CompileResult<()> {
        for arg in args {
            match &arg.kind {
                ArgKind::Simple => {}
                ArgKind::Table { element: None } => {
                    return Err(CompileError::MissingElementType {
                        message: msg.to_string(),
                        argument: arg.name.clone(),
                    });
                }
                ArgKind::Record { .. } | ArgKind::Table { element: Some(_) } => {
                    let sub = child_args(arg)?;
                    check(&message_type_name(arg), &sub)?;
                }
            }
        }
        Ok(())
    }
    let flat = flatten_name(&fun.name());
    let mut args: Vec<&Argument> = fun.args.iter().collect();
    if let Some(ret) = &fun.returns {
        args.push(ret);
    }
    check(&flat, &args)
}

/// Structural hash over field names, kinds, and resolved scalar types
fn fingerprint(args: &[&Argument]) -> u64 {
    fn hash_args(args: &[&Argument], h: &mut DefaultHasher) {
        for arg in args {
            arg.name.hash(h);
            match &arg.kind {
                ArgKind::Simple => {
                    0u8.hash(h);
                    scalar_type(arg).hash(h);
                }
                ArgKind::Record { fields } => {
                    1u8.hash(h);
                    let fields: Vec<&Argument> = fields.iter().collect();
                    hash_args(&fields, h);
                }
                ArgKind::Table { element } => {
                    2u8.hash(h);
                    if let Some(el) = element {
                        hash_args(&[el.as_ref()], h);
                    }
                }
            }
        }
    }
    let mut h = DefaultHasher::new();
    hash_args(args, &mut h);
    h.finish()
}

/// Message name for a composite argument
///
/// Derived from the linked type identity where the catalog supplies one;
/// a table names itself after its element. Arguments without any linked
/// type fall back to their own name.
fn message_type_name(arg: &Argument) -> String {
    let ident = match &arg.kind {
        ArgKind::Table { element: Some(el) } => {
            let name = linked_identity(el);
            if name.is_empty() {
                linked_identity(arg)
            } else {
                name
            }
        }
        _ => linked_identity(arg),
    };
    if ident.is_empty() {
        sanitize(&arg.name.to_lowercase())
    } else {
        ident
    }
}

fn linked_identity(arg: &Argument) -> String {
    let parts: Vec<&str> = [
        arg.type_name.as_str(),
        arg.type_subname.as_str(),
        arg.type_owner.as_str(),
        arg.type_link.as_str(),
    ]
    .into_iter()
    .filter(|p| !p.is_empty())
    .collect();
    sanitize(&parts.join("__").to_lowercase())
}

/// Lower-cased function name with dots joined by `__`
fn flatten_name(name: &str) -> String {
    sanitize(&name.to_lowercase().replace('.', "__"))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// The hidden marker would not survive a proto identifier
fn field_name(name: &str) -> String {
    match name.strip_suffix('#') {
        Some(stem) => format!("{}_hidden", stem),
        None => name.to_string(),
    }
}

/// Resolve the catalog type tag of a scalar into an abstract scalar name
fn scalar_type(arg: &Argument) -> String {
    match arg.data_type.as_str() {
        "CHAR" | "NCHAR" | "VARCHAR" | "VARCHAR2" | "NVARCHAR2" | "LONG" | "ROWID" => {
            "string".to_string()
        }
        "PLS_INTEGER" | "BINARY_INTEGER" => "int32".to_string(),
        "NUMBER" => {
            if arg.data_scale == 0 && (1..=9).contains(&arg.data_precision) {
                "int32".to_string()
            } else if arg.data_scale > 0 && (1..=15).contains(&arg.data_precision) {
                "float64".to_string()
            } else {
                // unconstrained NUMBER keeps arbitrary precision
                "number".to_string()
            }
        }
        "BINARY_FLOAT" | "BINARY_DOUBLE" | "FLOAT" => "float64".to_string(),
        "DATE" => "date".to_string(),
        t if t.starts_with("TIMESTAMP") => "time".to_string(),
        "BLOB" | "CLOB" | "NCLOB" | "LONG RAW" => "lob".to_string(),
        "RAW" => "bytes".to_string(),
        _ => arg.data_type.clone(),
    }
}

/// Map an abstract scalar name to a proto type and its field options
fn proto_type(resolved: &str) -> (String, Option<ProtoOptions>) {
    match resolved.trim().to_lowercase().as_str() {
        "date" => ("string".to_string(), Some(ProtoOptions::custom("Date"))),
        "time" | "timestamp" => ("string".to_string(), None),
        "int32" => ("sint32".to_string(), None),
        "float64" | "double" => ("double".to_string(), None),
        "number" | "n" => ("string".to_string(), Some(ProtoOptions::custom("Number"))),
        "lob" => ("bytes".to_string(), Some(ProtoOptions::custom("Lob"))),
        other => (other.to_string(), None),
    }
}

/// Field options for string-backed custom scalar types
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProtoOptions {
    custom_type: String,
}

impl ProtoOptions {
    fn custom(name: &str) -> Self {
        ProtoOptions {
            custom_type: format!("{}.{}", CUSTOM_TYPES, name),
        }
    }
}

impl std::fmt::Display for ProtoOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[(gogoproto.customtype)=\"{}\", (gogoproto.nullable)=false]",
            self.custom_type
        )
    }
}
