//! Staged pipeline from a CSV stream to compiled functions
//!
//! The reader and the grouper run on their own threads connected by
//! bounded channels, so a slow stage blocks its producer instead of
//! buffering the whole export. Tree building happens on the calling
//! thread as batches arrive. Dropping an endpoint closes its channel;
//! that is the only shutdown signal a stage needs.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::mpsc::sync_channel;
use std::thread;

use crate::builder::build_function;
use crate::error::CompileResult;
use crate::grouper::group_rows;
use crate::ir::{FlatArgument, Function};
use crate::reader::CsvReader;
use crate::report::{CompileEvent, Reporter};

/// Hand-off depth between stages
const CHANNEL_CAPACITY: usize = 16;

/// Inclusion predicate over function names
///
/// The grouper applies it to the qualified `package.object` name, the
/// tree builder to the bare object name.
pub type NameFilter = dyn Fn(&str) -> bool + Sync;

/// Open a catalog export; `""` and `"-"` read standard input
pub fn open_csv(path: &str) -> io::Result<Box<dyn BufRead + Send>> {
    if path.is_empty() || path == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// Run the read, group, and build stages over `input`
///
/// A builder error aborts the run: dropping the batch receiver unwinds
/// the upstream stages. When both the reader and the builder fail, the
/// reader's error is surfaced as the root cause.
pub fn parse_functions<R: BufRead + Send>(
    input: R,
    filter: Option<&NameFilter>,
    reporter: &dyn Reporter,
) -> CompileResult<Vec<Function>> {
    let mut reader = CsvReader::new(input)?;
    reporter.event(CompileEvent::ColumnsResolved {
        delimiter: reader.delimiter(),
        columns: &reader.columns().to_string(),
    });

    let (row_tx, row_rx) = sync_channel::<FlatArgument>(CHANNEL_CAPACITY);
    let (batch_tx, batch_rx) = sync_channel::<Vec<FlatArgument>>(CHANNEL_CAPACITY);

    thread::scope(|scope| {
        let read_stage = scope.spawn(move || -> CompileResult<()> {
            tracing::debug!("reader stage started");
            for row in &mut reader {
                // a send failure means the consumer is gone; stop quietly
                if row_tx.send(row?).is_err() {
                    break;
                }
            }
            Ok(())
        });
        scope.spawn(move || group_rows(row_rx, batch_tx, filter));

        let mut functions = Vec::new();
        let mut build_err = None;
        for batch in &batch_rx {
            match build_function(&batch, filter, reporter) {
                Ok(Some(fun)) => functions.push(fun),
                Ok(None) => {}
                Err(e) => {
                    build_err = Some(e);
                    break;
                }
            }
        }
        drop(batch_rx);

        let read_result = match read_stage.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        read_result?;
        if let Some(e) = build_err {
            return Err(e);
        }
        tracing::debug!(functions = functions.len(), "pipeline finished");
        Ok(functions)
    })
}
