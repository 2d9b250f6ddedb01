//! Sequential per-file processing with partial-failure bookkeeping.
//!
//! A failing file is logged and recorded, then the batch moves on. The caller
//! turns the recorded failures into a non-zero exit with
//! [`BatchSummary::ensure_success`] once every file has been attempted.

use anyhow::{Result, anyhow};
use itertools::Itertools;
use log::{debug, error, info, warn};

use crate::{
    error::FileError,
    source::{SourceFile, TRUNCATED_HEADER_LEN},
};

#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Sources handled successfully, in processing order.
    pub succeeded: Vec<String>,
    pub failures: Vec<FileError>,
}

impl BatchSummary {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        Err(anyhow!(
            "{} of {} file(s) failed: {}",
            self.failures.len(),
            self.attempted(),
            self.failures.iter().map(FileError::name).join(", ")
        ))
    }
}

fn log_failure(err: &FileError) {
    error!("{err}");
    if let FileError::Parse { name, header_len, .. } = err {
        debug!("Parse diagnostics: name={name:?} header_len={header_len}");
        if *header_len == TRUNCATED_HEADER_LEN {
            warn!(
                "Header of {name} is exactly {TRUNCATED_HEADER_LEN} bytes; the extract was likely truncated"
            );
        }
    }
}

/// Runs `handle` for every source in order, recording failures without
/// stopping the batch.
pub fn run_batch<I, F>(sources: I, mut handle: F) -> BatchSummary
where
    I: IntoIterator<Item = Result<SourceFile, FileError>>,
    F: FnMut(&SourceFile) -> Result<(), FileError>,
{
    let mut summary = BatchSummary::default();
    for source in sources {
        let outcome = source.and_then(|source| {
            debug!("Processing {} ({} bytes)", source.name, source.content.len());
            handle(&source).map(|()| source.name)
        });
        match outcome {
            Ok(name) => summary.succeeded.push(name),
            Err(err) => {
                log_failure(&err);
                summary.failures.push(err);
            }
        }
    }
    info!(
        "Processed {} file(s): {} succeeded, {} failed",
        summary.attempted(),
        summary.succeeded.len(),
        summary.failures.len()
    );
    summary
}
