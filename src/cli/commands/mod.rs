//! CLI command implementations.

mod ask;
mod config;
mod delete;
mod doctor;
mod ingest;
mod list;
mod search;
mod serve;

pub use ask::run_ask;
pub use config::run_config;
pub use delete::run_delete;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use list::run_list;
pub use search::run_search;
pub use serve::run_serve;

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;

/// Run pre-flight checks, pointing at `finrag doctor` on failure.
fn require(operation: Operation) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(operation) {
        Output::error(&format!("{}", e));
        Output::info("Run 'finrag doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    Ok(())
}
