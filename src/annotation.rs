//! Annotation directives that rewrite the compiled function set
//!
//! Directives come one per line, comments run from `#` or `--` to the end
//! of the line:
//!
//! ```text
//! private        DB_WEB.INTERNAL_CHECK
//! rename         DB_WEB.SEND_PREOFFER_31101 => DB_WEB.SEND_PREOFFER
//! replace        DB_WEB.PREPARE_OFFER       => DB_WEB.PREPARE_OFFER_2
//! replace_json   DB_WEB.GET_RISK            => DB_WEB.GET_RISK_JSON
//! handle         DB_WEB.EXN_LOGGER
//! max-table-size DB_WEB.LIST_ITEMS = 1000
//! ```
//!
//! Unknown keywords are rejected at parse time. At apply time a directive
//! that misses its preconditions (empty name, absent counterpart, zero
//! size) is a silent no-op, reported only through the [`Reporter`].

use std::collections::HashMap;

use logos::Logos;

use crate::error::{CompileError, CompileResult};
use crate::ir::Function;
use crate::report::{CompileEvent, Reporter};

/// Directive kinds, matched exhaustively by the rewriter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Private,
    Rename,
    Replace,
    ReplaceJson,
    Handle,
    MaxTableSize,
}

impl AnnotationKind {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "private" => Some(AnnotationKind::Private),
            "rename" => Some(AnnotationKind::Rename),
            "replace" => Some(AnnotationKind::Replace),
            "replace_json" => Some(AnnotationKind::ReplaceJson),
            "handle" => Some(AnnotationKind::Handle),
            _ => None,
        }
    }

    fn requires_other(self) -> bool {
        matches!(
            self,
            AnnotationKind::Rename | AnnotationKind::Replace | AnnotationKind::ReplaceJson
        )
    }
}

impl std::fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keyword = match self {
            AnnotationKind::Private => "private",
            AnnotationKind::Rename => "rename",
            AnnotationKind::Replace => "replace",
            AnnotationKind::ReplaceJson => "replace_json",
            AnnotationKind::Handle => "handle",
            AnnotationKind::MaxTableSize => "max-table-size",
        };
        write!(f, "{}", keyword)
    }
}

/// One parsed directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub package: String,
    pub name: String,
    /// Destination or replacement name; empty when the directive has none
    pub other: String,
    /// Collection-size hint, meaningful only for `max-table-size`
    pub size: u32,
}

impl Annotation {
    /// Package-qualified target name
    pub fn full_name(&self) -> String {
        if self.package.is_empty() || self.name.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// Package-qualified counterpart name
    pub fn full_other(&self) -> String {
        if self.package.is_empty() || self.other.is_empty() {
            self.other.clone()
        } else {
            format!("{}.{}", self.package, self.other)
        }
    }
}

impl std::fmt::Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            AnnotationKind::Private | AnnotationKind::Handle => {
                write!(f, "{} {}", self.kind, self.full_name())
            }
            AnnotationKind::Rename | AnnotationKind::Replace | AnnotationKind::ReplaceJson => {
                write!(f, "{} {} => {}", self.kind, self.full_name(), self.full_other())
            }
            AnnotationKind::MaxTableSize => {
                write!(f, "{} {} = {}", self.kind, self.full_name(), self.size)
            }
        }
    }
}

/// Token types for the directive language
///
/// `max-table-size` is its own token: the dash would otherwise collide
/// with `--` comments inside the identifier class.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"(--|#)[^\n]*")]
enum Token {
    #[token("\n")]
    Newline,

    #[token("=>")]
    Arrow,

    #[token("=")]
    Equals,

    #[token(".")]
    Dot,

    #[token("max-table-size")]
    MaxTableSize,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u32>().ok())]
    Number(u32),

    #[regex(r"[A-Za-z_][A-Za-z0-9_$#]*", |lex| lex.slice().to_string())]
    Word(String),
}

/// Parse a directive file into an ordered annotation list
pub fn parse_annotations(text: &str) -> CompileResult<Vec<Annotation>> {
    let mut lexer = Token::lexer(text);
    let mut annotations = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut line = 1usize;
    while let Some(token) = lexer.next() {
        match token {
            Ok(Token::Newline) => {
                if !current.is_empty() {
                    annotations.push(parse_line(&current, line)?);
                    current.clear();
                }
                line += 1;
            }
            Ok(token) => current.push(token),
            Err(()) => {
                return Err(CompileError::annotation_syntax(
                    line,
                    format!("unexpected characters {:?}", lexer.slice()),
                ));
            }
        }
    }
    if !current.is_empty() {
        annotations.push(parse_line(&current, line)?);
    }
    Ok(annotations)
}

fn parse_line(tokens: &[Token], line: usize) -> CompileResult<Annotation> {
    let kind = match tokens.first() {
        Some(Token::Word(word)) => AnnotationKind::from_keyword(word).ok_or_else(|| {
            CompileError::UnknownDirective {
                line,
                directive: word.clone(),
            }
        })?,
        Some(Token::MaxTableSize) => AnnotationKind::MaxTableSize,
        _ => {
            return Err(CompileError::annotation_syntax(
                line,
                "expected a directive keyword",
            ))
        }
    };
    let mut pos = 1;

    let (package, name, next) = parse_path(tokens, pos, line)?;
    pos = next;

    let mut other = String::new();
    let mut size = 0u32;
    match kind {
        AnnotationKind::Rename | AnnotationKind::Replace | AnnotationKind::ReplaceJson => {
            match tokens.get(pos) {
                Some(Token::Arrow) => pos += 1,
                _ => return Err(CompileError::annotation_syntax(line, "expected '=>'")),
            }
            let (other_package, other_name, next) = parse_path(tokens, pos, line)?;
            pos = next;
            if !other_package.is_empty() && !other_package.eq_ignore_ascii_case(&package) {
                return Err(CompileError::annotation_syntax(
                    line,
                    format!(
                        "package {:?} does not match {:?}",
                        other_package, package
                    ),
                ));
            }
            other = other_name;
        }
        AnnotationKind::MaxTableSize => {
            match tokens.get(pos) {
                Some(Token::Equals) => pos += 1,
                _ => return Err(CompileError::annotation_syntax(line, "expected '='")),
            }
            match tokens.get(pos) {
                Some(Token::Number(n)) => {
                    size = *n;
                    pos += 1;
                }
                _ => return Err(CompileError::annotation_syntax(line, "expected a size")),
            }
        }
        AnnotationKind::Private | AnnotationKind::Handle => {}
    }
    if pos != tokens.len() {
        return Err(CompileError::annotation_syntax(
            line,
            "unexpected trailing tokens",
        ));
    }
    Ok(Annotation {
        kind,
        package,
        name,
        other,
        size,
    })
}

/// Parse a dotted path; the last segment is the name, the rest the package
fn parse_path(
    tokens: &[Token],
    mut pos: usize,
    line: usize,
) -> CompileResult<(String, String, usize)> {
    let mut segments: Vec<String> = Vec::new();
    loop {
        match tokens.get(pos) {
            Some(Token::Word(word)) => {
                segments.push(word.clone());
                pos += 1;
            }
            _ => return Err(CompileError::annotation_syntax(line, "expected a name")),
        }
        match tokens.get(pos) {
            Some(Token::Dot) => pos += 1,
            _ => break,
        }
    }
    let name = segments.pop().unwrap_or_default();
    Ok((segments.join("."), name, pos))
}

/// Apply directives in order to the function set
///
/// The set is keyed by lower-cased declared name. Output order is
/// arbitrary; callers needing determinism sort afterwards.
pub fn apply_annotations(
    functions: Vec<Function>,
    annotations: &[Annotation],
    reporter: &dyn Reporter,
) -> Vec<Function> {
    if annotations.is_empty() {
        return functions;
    }
    let mut funcs: HashMap<String, Function> = functions
        .into_iter()
        .map(|f| (f.real_name().to_lowercase(), f))
        .collect();

    for a in annotations {
        if a.name.is_empty() {
            skipped(reporter, a, "empty name");
            continue;
        }
        if a.other.is_empty() && a.kind.requires_other() {
            skipped(reporter, a, "missing counterpart name");
            continue;
        }
        if a.kind == AnnotationKind::MaxTableSize && a.size == 0 {
            skipped(reporter, a, "zero size");
            continue;
        }
        match a.kind {
            AnnotationKind::Private => {
                funcs.remove(&a.full_name().to_lowercase());
                applied(reporter, a);
            }
            AnnotationKind::Rename => match funcs.remove(&a.full_name().to_lowercase()) {
                Some(mut f) => {
                    f.alias = Some(a.other.clone());
                    funcs.insert(a.full_other().to_lowercase(), f);
                    applied(reporter, a);
                }
                None => skipped(reporter, a, "no such function"),
            },
            AnnotationKind::Replace | AnnotationKind::ReplaceJson => {
                let key = a.full_name().to_lowercase();
                let other = a.full_other().to_lowercase();
                if key == other {
                    // replacing a function with itself is meaningless
                    skipped(reporter, a, "replaces itself");
                    continue;
                }
                if !funcs.contains_key(&key) {
                    skipped(reporter, a, "no such function");
                    continue;
                }
                let replacement = match funcs.remove(&other) {
                    Some(replacement) => replacement,
                    None => {
                        skipped(reporter, a, "no such replacement");
                        continue;
                    }
                };
                if let Some(mut f) = funcs.remove(&key) {
                    f.replacement = Some(Box::new(replacement));
                    f.replacement_is_json = a.kind == AnnotationKind::ReplaceJson;
                    funcs.insert(f.name().to_lowercase(), f);
                    applied(reporter, a);
                }
            }
            AnnotationKind::Handle => {
                let tag = a.name.to_uppercase();
                for f in funcs.values_mut() {
                    if f.package.eq_ignore_ascii_case(&a.package) {
                        f.handlers.push(tag.clone());
                    }
                }
                applied(reporter, a);
            }
            AnnotationKind::MaxTableSize => {
                match funcs.get_mut(&a.full_name().to_lowercase()) {
                    Some(f) if a.size >= f.max_table_size => {
                        f.max_table_size = a.size;
                        applied(reporter, a);
                    }
                    Some(_) => skipped(reporter, a, "below current size"),
                    None => skipped(reporter, a, "no such function"),
                }
            }
        }
    }
    funcs.into_values().collect()
}

fn applied(reporter: &dyn Reporter, a: &Annotation) {
    reporter.event(CompileEvent::AnnotationApplied {
        directive: &a.to_string(),
    });
}

fn skipped(reporter: &dyn Reporter, a: &Annotation, reason: &str) {
    reporter.event(CompileEvent::AnnotationSkipped {
        directive: &a.to_string(),
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullReporter;

    fn fun(package: &str, name: &str) -> Function {
        Function {
            package: package.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn ann(kind: AnnotationKind, package: &str, name: &str, other: &str) -> Annotation {
        Annotation {
            kind,
            package: package.to_string(),
            name: name.to_string(),
            other: other.to_string(),
            size: 0,
        }
    }

    fn names(functions: &[Function]) -> Vec<String> {
        let mut names: Vec<String> = functions.iter().map(|f| f.name()).collect();
        names.sort();
        names
    }

    fn apply(functions: Vec<Function>, annotations: &[Annotation]) -> Vec<Function> {
        apply_annotations(functions, annotations, &NullReporter)
    }

    #[test]
    fn test_parse_all_directive_kinds() {
        let text = "\
# offer pipeline tweaks
private        DB_WEB.INTERNAL_CHECK
rename         DB_WEB.SEND_PREOFFER_31101 => DB_WEB.SEND_PREOFFER

replace        DB_WEB.PREPARE_OFFER => PREPARE_OFFER_2  -- bare counterpart
replace_json   DB_WEB.GET_RISK => DB_WEB.GET_RISK_JSON
handle         DB_WEB.EXN_LOGGER
max-table-size DB_WEB.LIST_ITEMS = 1000
";
        let anns = parse_annotations(text).unwrap();
        assert_eq!(anns.len(), 6);
        assert_eq!(anns[0].kind, AnnotationKind::Private);
        assert_eq!(anns[0].package, "DB_WEB");
        assert_eq!(anns[0].name, "INTERNAL_CHECK");
        assert_eq!(anns[1].kind, AnnotationKind::Rename);
        assert_eq!(anns[1].other, "SEND_PREOFFER");
        assert_eq!(anns[2].other, "PREPARE_OFFER_2");
        assert_eq!(anns[3].kind, AnnotationKind::ReplaceJson);
        assert_eq!(anns[4].kind, AnnotationKind::Handle);
        assert_eq!(anns[5].kind, AnnotationKind::MaxTableSize);
        assert_eq!(anns[5].size, 1000);
    }

    #[test]
    fn test_parse_unknown_directive() {
        let err = parse_annotations("suppress DB_WEB.X\n").unwrap_err();
        match err {
            CompileError::UnknownDirective { line, directive } => {
                assert_eq!(line, 1);
                assert_eq!(directive, "suppress");
            }
            other => panic!("expected UnknownDirective, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_syntax_errors() {
        assert!(matches!(
            parse_annotations("rename DB_WEB.A DB_WEB.B\n").unwrap_err(),
            CompileError::AnnotationSyntax { line: 1, .. }
        ));
        assert!(matches!(
            parse_annotations("\nmax-table-size DB_WEB.A = lots\n").unwrap_err(),
            CompileError::AnnotationSyntax { line: 2, .. }
        ));
        assert!(matches!(
            parse_annotations("rename P.A => Q.B\n").unwrap_err(),
            CompileError::AnnotationSyntax { line: 1, .. }
        ));
    }

    #[test]
    fn test_parse_last_line_without_newline() {
        let anns = parse_annotations("private P.F").unwrap();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].name, "F");
    }

    #[test]
    fn test_display_round_trips() {
        let samples = [
            ann(AnnotationKind::Private, "P", "F", ""),
            ann(AnnotationKind::Rename, "P", "F", "G"),
            ann(AnnotationKind::Replace, "P", "F", "G"),
            ann(AnnotationKind::ReplaceJson, "P", "F", "G"),
            ann(AnnotationKind::Handle, "P", "F", ""),
            Annotation {
                size: 42,
                ..ann(AnnotationKind::MaxTableSize, "P", "F", "")
            },
        ];
        for a in samples {
            let reparsed = parse_annotations(&a.to_string()).unwrap();
            assert_eq!(reparsed, [a.clone()], "{}", a);
        }
    }

    #[test]
    fn test_empty_list_is_identity() {
        let functions = vec![fun("P", "F"), fun("P", "G")];
        let output = apply(functions.clone(), &[]);
        assert_eq!(output, functions);
    }

    #[test]
    fn test_private_removes_exactly_one() {
        let functions = vec![fun("P", "F"), fun("P", "G")];
        let a = ann(AnnotationKind::Private, "P", "F", "");
        let output = apply(functions, &[a.clone()]);
        assert_eq!(names(&output), ["P.G"]);
        // a second private for the same name is a no-op
        let output = apply(output, &[a]);
        assert_eq!(names(&output), ["P.G"]);
    }

    #[test]
    fn test_rename_sets_alias_and_rekeys() {
        let output = apply(
            vec![fun("P", "F")],
            &[ann(AnnotationKind::Rename, "P", "F", "G")],
        );
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].alias.as_deref(), Some("G"));
        assert_eq!(output[0].name(), "P.G");
        assert_eq!(output[0].real_name(), "P.F");
    }

    #[test]
    fn test_rename_then_private_composes() {
        let output = apply(
            vec![fun("P", "F")],
            &[
                ann(AnnotationKind::Rename, "P", "F", "G"),
                ann(AnnotationKind::Private, "P", "G", ""),
            ],
        );
        assert!(output.is_empty());
    }

    #[test]
    fn test_replace_absorbs_counterpart() {
        let output = apply(
            vec![fun("P", "F"), fun("P", "F2")],
            &[ann(AnnotationKind::Replace, "P", "F", "F2")],
        );
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].real_name(), "P.F");
        let replacement = output[0].replacement.as_ref().unwrap();
        assert_eq!(replacement.real_name(), "P.F2");
        assert!(!output[0].replacement_is_json);
    }

    #[test]
    fn test_replace_json_sets_flag() {
        let output = apply(
            vec![fun("P", "F"), fun("P", "F2")],
            &[ann(AnnotationKind::ReplaceJson, "P", "F", "F2")],
        );
        assert!(output[0].replacement_is_json);
    }

    #[test]
    fn test_replace_missing_counterpart_is_noop() {
        let output = apply(
            vec![fun("P", "F")],
            &[ann(AnnotationKind::Replace, "P", "F", "MISSING")],
        );
        assert_eq!(output.len(), 1);
        assert!(output[0].replacement.is_none());
        assert!(!output[0].replacement_is_json);
    }

    #[test]
    fn test_self_replace_is_noop() {
        let output = apply(
            vec![fun("P", "F")],
            &[ann(AnnotationKind::Replace, "P", "F", "F")],
        );
        assert_eq!(output.len(), 1);
        assert!(output[0].replacement.is_none());
    }

    #[test]
    fn test_handle_broadcasts_across_package() {
        let output = apply(
            vec![fun("DB_WEB", "F"), fun("DB_WEB", "G"), fun("OTHER", "H")],
            &[ann(AnnotationKind::Handle, "db_web", "exn_logger", "")],
        );
        for f in &output {
            if f.package == "DB_WEB" {
                assert_eq!(f.handlers, ["EXN_LOGGER"]);
            } else {
                assert!(f.handlers.is_empty());
            }
        }
    }

    #[test]
    fn test_max_table_size_monotone() {
        let with_size = |size| Annotation {
            size,
            ..ann(AnnotationKind::MaxTableSize, "P", "F", "")
        };
        let output = apply(vec![fun("P", "F")], &[with_size(5), with_size(3)]);
        assert_eq!(output[0].max_table_size, 5);
        let output = apply(vec![fun("P", "F")], &[with_size(3), with_size(5)]);
        assert_eq!(output[0].max_table_size, 5);
    }

    #[test]
    fn test_malformed_annotations_are_silent_noops() {
        let functions = vec![fun("P", "F")];
        let malformed = [
            ann(AnnotationKind::Private, "P", "", ""),
            ann(AnnotationKind::Rename, "P", "F", ""),
            Annotation {
                size: 0,
                ..ann(AnnotationKind::MaxTableSize, "P", "F", "")
            },
        ];
        let output = apply(functions.clone(), &malformed);
        assert_eq!(names(&output), names(&functions));
        assert!(output[0].alias.is_none());
        assert_eq!(output[0].max_table_size, 0);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let output = apply(
            vec![fun("DB_WEB", "Login")],
            &[ann(AnnotationKind::Private, "db_web", "LOGIN", "")],
        );
        assert!(output.is_empty());
    }
}
