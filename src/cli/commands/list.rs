//! List command implementation.

use super::require;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::create_vector_store;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    require(Operation::Manage)?;

    let store = create_vector_store(&settings, settings.embedding.dimensions as usize).await?;

    match store.list_sources().await {
        Ok(sources) => {
            if sources.is_empty() {
                Output::info("No documents indexed yet. Use 'finrag ingest <file>' to add one.");
            } else {
                Output::header(&format!("Indexed Documents ({})", sources.len()));
                println!();

                for item in &sources {
                    Output::document_info(
                        &item.source,
                        item.page_count,
                        item.chunk_count,
                        &item.indexed_at.format("%Y-%m-%d %H:%M").to_string(),
                    );
                }

                let total_chunks: u32 = sources.iter().map(|s| s.chunk_count).sum();
                println!();
                Output::kv("Total documents", &sources.len().to_string());
                Output::kv("Total chunks", &total_chunks.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list documents: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
