//! Reconstructs nested argument trees from level-annotated row batches
//!
//! The `DATA_LEVEL` column encodes a pre-order flattening of each
//! function's argument tree: a row's parent is the most recent composite
//! argument one level up. A map from level to that composite is enough for
//! single-pass reconstruction. Arguments live in an index arena while the
//! batch is consumed and are materialized into an owned tree at the end.

use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};
use crate::ir::{ArgKind, Argument, FlatArgument, Function};
use crate::report::{CompileEvent, Reporter};

/// Hidden/system-generated objects carry this trailing marker
const HIDDEN_MARKER: char = '#';

#[derive(Default)]
struct Slot {
    arg: Argument,
    fields: Vec<usize>,
    element: Option<usize>,
}

impl Slot {
    fn new(arg: Argument) -> Self {
        Slot {
            arg,
            fields: Vec::new(),
            element: None,
        }
    }
}

/// Build one [`Function`] from a batch of rows sharing a subprogram
///
/// Returns `Ok(None)` when the batch is empty, names a hidden object, or
/// fails `filter` (applied to the bare object name). Structural violations
/// are fatal for the whole compile.
pub fn build_function(
    rows: &[FlatArgument],
    filter: Option<&(dyn Fn(&str) -> bool + Sync)>,
    reporter: &dyn Reporter,
) -> CompileResult<Option<Function>> {
    let first = match rows.first() {
        Some(first) => first,
        None => return Ok(None),
    };
    if first.object_name.ends_with(HIDDEN_MARKER) {
        reporter.event(CompileEvent::FunctionSkipped {
            name: &first.qualified_name(),
            reason: "hidden object",
        });
        return Ok(None);
    }
    if let Some(filter) = filter {
        if !filter(&first.object_name) {
            reporter.event(CompileEvent::FunctionSkipped {
                name: &first.qualified_name(),
                reason: "filtered out",
            });
            return Ok(None);
        }
    }

    let mut fun = Function {
        package: first.package_name.clone(),
        name: first.object_name.clone(),
        last_ddl: first.last_ddl.clone(),
        ..Default::default()
    };

    let mut arena: Vec<Slot> = Vec::with_capacity(rows.len() + 1);
    arena.push(Slot::new(Argument {
        kind: ArgKind::Record { fields: Vec::new() },
        ..Default::default()
    }));
    let mut levels: HashMap<i16, usize> = HashMap::with_capacity(8);
    levels.insert(-1, 0);
    let mut returns: Option<usize> = None;

    for (i, row) in rows.iter().enumerate() {
        let level = row.data_level as i16;
        let mut arg = Argument::from_flat(row);
        let idx = arena.len();
        // deeper rows attach to this one, even when it turns out to be
        // the return value
        if arg.kind.is_composite() {
            levels.insert(level, idx);
        }
        if level == 0 && returns.is_none() && arg.name.is_empty() {
            arg.name = "ret".to_string();
            arena.push(Slot::new(arg));
            returns = Some(idx);
            continue;
        }
        arena.push(Slot::new(arg));
        let parent = match levels.get(&(level - 1)) {
            Some(&parent) => parent,
            None => {
                return Err(CompileError::InvalidHierarchy {
                    function: first.qualified_name(),
                    row: i + 1,
                    level,
                    parents: render_levels(&levels, &arena),
                });
            }
        };
        match arena[parent].arg.kind {
            // last element type wins
            ArgKind::Table { .. } => arena[parent].element = Some(idx),
            _ => arena[parent].fields.push(idx),
        }
    }

    let roots = std::mem::take(&mut arena[0].fields);
    fun.args = roots
        .into_iter()
        .map(|i| materialize(&mut arena, i))
        .collect();
    fun.returns = returns.map(|i| materialize(&mut arena, i));

    reporter.event(CompileEvent::FunctionParsed {
        name: &fun.name(),
        arguments: fun.args.len(),
    });
    Ok(Some(fun))
}

/// Move a slot out of the arena, recursing into recorded children
fn materialize(arena: &mut [Slot], idx: usize) -> Argument {
    let fields = std::mem::take(&mut arena[idx].fields);
    let element = arena[idx].element.take();
    let mut arg = std::mem::take(&mut arena[idx].arg);
    match &mut arg.kind {
        ArgKind::Record { fields: out } => {
            *out = fields.into_iter().map(|i| materialize(arena, i)).collect();
        }
        ArgKind::Table { element: out } => {
            *out = element.map(|i| Box::new(materialize(arena, i)));
        }
        ArgKind::Simple => {}
    }
    arg
}

fn render_levels(levels: &HashMap<i16, usize>, arena: &[Slot]) -> String {
    let mut entries: Vec<_> = levels.iter().collect();
    entries.sort_by_key(|(level, _)| **level);
    entries
        .iter()
        .map(|(level, &idx)| format!("{}:{:?}", level, arena[idx].arg.name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Direction;
    use crate::report::NullReporter;

    fn flat(level: u8, name: &str, data_type: &str) -> FlatArgument {
        FlatArgument {
            object_id: 1,
            subprogram_id: 1,
            package_name: "P".to_string(),
            object_name: "F".to_string(),
            argument_name: name.to_string(),
            in_out: "IN".to_string(),
            data_level: level,
            data_type: data_type.to_string(),
            ..Default::default()
        }
    }

    fn build(rows: &[FlatArgument]) -> CompileResult<Option<Function>> {
        build_function(rows, None, &NullReporter)
    }

    #[test]
    fn test_single_simple_argument() {
        let fun = build(&[flat(0, "A", "VARCHAR2")]).unwrap().unwrap();
        assert_eq!(fun.real_name(), "P.F");
        assert_eq!(fun.args.len(), 1);
        assert_eq!(fun.args[0].name, "A");
        assert_eq!(fun.args[0].kind, ArgKind::Simple);
        assert_eq!(fun.args[0].direction, Direction::In);
        assert!(fun.returns.is_none());
    }

    #[test]
    fn test_unnamed_level0_becomes_return() {
        let fun = build(&[flat(0, "", "NUMBER"), flat(0, "A", "VARCHAR2")])
            .unwrap()
            .unwrap();
        let ret = fun.returns.unwrap();
        assert_eq!(ret.name, "ret");
        assert_eq!(ret.data_type, "NUMBER");
        assert_eq!(fun.args.len(), 1);
        assert_eq!(fun.args[0].name, "A");
    }

    #[test]
    fn test_second_unnamed_row_is_not_a_return() {
        let fun = build(&[flat(0, "", "NUMBER"), flat(0, "", "VARCHAR2")])
            .unwrap()
            .unwrap();
        assert_eq!(fun.returns.unwrap().data_type, "NUMBER");
        assert_eq!(fun.args.len(), 1);
        assert_eq!(fun.args[0].name, "");
    }

    #[test]
    fn test_table_of_record_field_order() {
        let fun = build(&[
            flat(0, "ITEMS", "PL/SQL TABLE"),
            flat(1, "", "PL/SQL RECORD"),
            flat(2, "ID", "NUMBER"),
            flat(2, "NAME", "VARCHAR2"),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(fun.args.len(), 1);
        let element = match &fun.args[0].kind {
            ArgKind::Table { element } => element.as_ref().unwrap(),
            other => panic!("expected table, got {:?}", other),
        };
        let fields = match &element.kind {
            ArgKind::Record { fields } => fields,
            other => panic!("expected record, got {:?}", other),
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "ID");
        assert_eq!(fields[1].name, "NAME");
    }

    #[test]
    fn test_last_table_element_wins() {
        let fun = build(&[
            flat(0, "ITEMS", "PL/SQL TABLE"),
            flat(1, "", "NUMBER"),
            flat(1, "", "VARCHAR2"),
        ])
        .unwrap()
        .unwrap();
        let element = match &fun.args[0].kind {
            ArgKind::Table { element } => element.as_ref().unwrap(),
            other => panic!("expected table, got {:?}", other),
        };
        assert_eq!(element.data_type, "VARCHAR2");
    }

    #[test]
    fn test_cursor_return_keeps_children() {
        let fun = build(&[
            flat(0, "", "REF CURSOR"),
            flat(1, "", "PL/SQL RECORD"),
            flat(2, "COL1", "VARCHAR2"),
        ])
        .unwrap()
        .unwrap();
        assert!(fun.args.is_empty());
        let ret = fun.returns.unwrap();
        assert_eq!(ret.name, "ret");
        let element = match &ret.kind {
            ArgKind::Table { element } => element.as_ref().unwrap(),
            other => panic!("expected table, got {:?}", other),
        };
        match &element.kind {
            ArgKind::Record { fields } => assert_eq!(fields[0].name, "COL1"),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_parent_level_fails() {
        let err = build(&[flat(0, "ITEMS", "PL/SQL TABLE"), flat(2, "ID", "NUMBER")])
            .unwrap_err();
        match err {
            CompileError::InvalidHierarchy { function, row, level, .. } => {
                assert_eq!(function, "P.F");
                assert_eq!(row, 2);
                assert_eq!(level, 2);
            }
            other => panic!("expected InvalidHierarchy, got {:?}", other),
        }
    }

    #[test]
    fn test_hidden_object_skipped() {
        let mut row = flat(0, "A", "VARCHAR2");
        row.object_name = "F#".to_string();
        assert!(build(&[row]).unwrap().is_none());
    }

    #[test]
    fn test_filter_sees_object_name_only() {
        let seen = std::sync::Mutex::new(Vec::new());
        let filter = |name: &str| {
            seen.lock().unwrap().push(name.to_string());
            false
        };
        let got = build_function(&[flat(0, "A", "VARCHAR2")], Some(&filter), &NullReporter)
            .unwrap();
        assert!(got.is_none());
        assert_eq!(*seen.lock().unwrap(), ["F"]);
    }

    #[test]
    fn test_empty_batch() {
        assert!(build(&[]).unwrap().is_none());
    }

    #[test]
    fn test_reflatten_round_trip() {
        let rows = [
            flat(0, "A", "PL/SQL RECORD"),
            flat(1, "B", "VARCHAR2"),
            flat(1, "C", "PL/SQL TABLE"),
            flat(2, "D", "NUMBER"),
            flat(0, "E", "VARCHAR2"),
        ];
        let fun = build(&rows).unwrap().unwrap();

        fn flatten(arg: &Argument, level: u8, out: &mut Vec<(u8, String)>) {
            out.push((level, arg.name.clone()));
            match &arg.kind {
                ArgKind::Record { fields } => {
                    for field in fields {
                        flatten(field, level + 1, out);
                    }
                }
                ArgKind::Table { element } => {
                    if let Some(element) = element {
                        flatten(element, level + 1, out);
                    }
                }
                ArgKind::Simple => {}
            }
        }

        let mut got = Vec::new();
        for arg in &fun.args {
            flatten(arg, 0, &mut got);
        }
        let want: Vec<(u8, String)> = rows
            .iter()
            .map(|r| (r.data_level, r.argument_name.clone()))
            .collect();
        assert_eq!(got, want);
    }
}
