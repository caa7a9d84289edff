//! Groups flat catalog rows into per-function batches
//!
//! Rows for one subprogram arrive contiguously, ordered by sequence; a run
//! boundary is purely a key change. That contiguity is an input precondition
//! of the export query, not something this stage verifies.

use std::sync::mpsc::{Receiver, SyncSender};

use crate::ir::FlatArgument;

/// Batch contiguous rows sharing `(object_id, subprogram_id)`
///
/// Rows failing `filter` (applied to the qualified `package.object` name)
/// are dropped before any key comparison, so an excluded object never
/// interrupts the surrounding run. The final run is flushed when the row
/// channel closes. A failed send means the consumer is gone and the stage
/// stops quietly.
pub fn group_rows(
    rows: Receiver<FlatArgument>,
    batches: SyncSender<Vec<FlatArgument>>,
    filter: Option<&(dyn Fn(&str) -> bool + Sync)>,
) {
    let mut last_key: Option<(u32, u32)> = None;
    let mut batch: Vec<FlatArgument> = Vec::new();
    for row in rows {
        if let Some(filter) = filter {
            if !filter(&row.qualified_name()) {
                continue;
            }
        }
        let key = row.key();
        if last_key.is_some() && last_key != Some(key) && !batch.is_empty() {
            if batches.send(std::mem::take(&mut batch)).is_err() {
                return;
            }
        }
        batch.push(row);
        last_key = Some(key);
    }
    if !batch.is_empty() {
        let _ = batches.send(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    fn row(object_id: u32, subprogram_id: u32, object_name: &str, arg: &str) -> FlatArgument {
        FlatArgument {
            object_id,
            subprogram_id,
            package_name: "P".to_string(),
            object_name: object_name.to_string(),
            argument_name: arg.to_string(),
            ..Default::default()
        }
    }

    fn run(
        rows: Vec<FlatArgument>,
        filter: Option<&(dyn Fn(&str) -> bool + Sync)>,
    ) -> Vec<Vec<FlatArgument>> {
        let (row_tx, row_rx) = sync_channel(16);
        let (batch_tx, batch_rx) = sync_channel(16);
        for r in rows {
            row_tx.send(r).unwrap();
        }
        drop(row_tx);
        group_rows(row_rx, batch_tx, filter);
        batch_rx.iter().collect()
    }

    #[test]
    fn test_contiguous_runs() {
        let batches = run(
            vec![
                row(1, 1, "F", "A"),
                row(1, 1, "F", "B"),
                row(1, 2, "G", "X"),
                row(2, 1, "H", "Y"),
            ],
            None,
        );
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][1].argument_name, "B");
        assert_eq!(batches[1][0].object_name, "G");
        assert_eq!(batches[2][0].object_name, "H");
    }

    #[test]
    fn test_single_run_flushed_at_close() {
        let batches = run(vec![row(1, 1, "F", "A"), row(1, 1, "F", "B")], None);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_filter_drops_rows() {
        let keep = |name: &str| name != "P.G";
        let batches = run(
            vec![row(1, 1, "F", "A"), row(1, 2, "G", "X"), row(2, 1, "H", "Y")],
            Some(&keep),
        );
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0].object_name, "F");
        assert_eq!(batches[1][0].object_name, "H");
    }

    #[test]
    fn test_filtered_rows_do_not_break_runs() {
        // a dropped object inside a run must not split it
        let keep = |name: &str| name != "P.G";
        let batches = run(
            vec![row(1, 1, "F", "A"), row(1, 2, "G", "X"), row(1, 1, "F", "B")],
            Some(&keep),
        );
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(run(Vec::new(), None).is_empty());
    }
}
