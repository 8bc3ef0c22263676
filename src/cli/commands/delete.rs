//! Delete command implementation.

use super::require;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::FinragError;
use crate::vector_store::create_vector_store;
use anyhow::Result;

/// Remove every chunk indexed for `source`.
pub async fn run_delete(source: &str, settings: Settings) -> Result<()> {
    require(Operation::Manage)?;

    let store = create_vector_store(&settings, settings.embedding.dimensions as usize).await?;

    match store.delete_by_source(source).await? {
        0 => {
            Output::warning(&format!("No indexed document named '{}'.", source));
            Output::info("Run 'finrag list' to see indexed documents.");
            Err(FinragError::SourceNotFound(source.to_string()).into())
        }
        deleted => {
            Output::success(&format!("Deleted {} chunks for {}", deleted, source));
            Ok(())
        }
    }
}
