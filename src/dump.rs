use crate::err::DumpError;
use crate::format_table::FormatTable;
use crate::trace_reader::TraceReader;

use log::info;
use tokio_util::sync::CancellationToken;

use std::io::{Read, Write};

/// Counters describing a finished dump.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DumpSummary {
    /// Records decoded from the stream.
    pub records: u64,
    /// Records written through their template.
    pub rendered: u64,
    /// Records without a rule for their event id.
    pub skipped: u64,
    /// Records written through the diagnostic fallback.
    pub fallbacks: u64,
}

/// Renders every record of a trace stream into `output`, one line per record.
pub struct Dumper<'t, W: Write> {
    table: &'t FormatTable,
    output: W,
    cancel: CancellationToken,
}

impl<'t, W: Write> Dumper<'t, W> {
    pub fn new(table: &'t FormatTable, output: W) -> Self {
        Dumper {
            table,
            output,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs until the stream is exhausted or cancelled.
    ///
    /// A fatal decode error or a failed write stops the dump, lines written before it stay
    /// written.
    pub fn dump<R: Read>(&mut self, input: R) -> Result<DumpSummary, DumpError> {
        let mut summary = DumpSummary::default();
        let reader = TraceReader::with_cancellation(input, self.cancel.clone());

        for record in reader {
            let record = record?;
            summary.records += 1;

            match self.table.render(&record) {
                None => summary.skipped += 1,
                Some(rendered) => {
                    if rendered.is_fallback() {
                        summary.fallbacks += 1;
                    } else {
                        summary.rendered += 1;
                    }
                    writeln!(self.output, "{rendered}")
                        .map_err(|source| DumpError::Output { source })?;
                }
            }
        }

        self.output
            .flush()
            .map_err(|source| DumpError::Output { source })?;

        info!(
            "Decoded {} records: {} rendered, {} without a rule, {} fallbacks",
            summary.records, summary.rendered, summary.skipped, summary.fallbacks
        );
        Ok(summary)
    }

    pub fn into_output(self) -> W {
        self.output
    }
}
