pub mod classify;
pub mod failures;
pub mod spec;
pub mod stats;
pub mod weekly;

use anyhow::Result;
use tracing::info;

use crate::cli::InputArgs;
use crate::qc::ClassifiedBatchSet;

/// Loads and classifies the sheet named on the command line.
pub(crate) fn load_batches(input: &InputArgs) -> Result<ClassifiedBatchSet> {
    let config = input.columns.to_config();
    info!(input = %input.input.display(), "loading batch sheet");
    let set = ClassifiedBatchSet::load_csv(&input.input, &config)?;
    if set.is_empty() {
        info!(input = %input.input.display(), "no dated batches in sheet");
    }
    Ok(set)
}
