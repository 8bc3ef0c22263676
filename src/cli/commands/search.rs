//! Search command implementation.

use super::require;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Pipeline;
use crate::rag::format_context_for_display;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: usize,
    min_score: Option<f32>,
    brief: bool,
    settings: Settings,
) -> Result<()> {
    require(Operation::Query)?;

    let pipeline = Pipeline::from_settings(settings).await?;
    let mut retriever = pipeline.retriever().with_k(limit);
    if let Some(min_score) = min_score {
        retriever = retriever.with_min_score(min_score);
    }

    let spinner = Output::spinner("Searching...");
    let results = retriever.retrieve(query).await;
    spinner.finish_and_clear();

    match results {
        Ok(chunks) => {
            if chunks.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", chunks.len()));

                if brief {
                    println!("\n{}", format_context_for_display(&chunks));
                    return Ok(());
                }

                for chunk in &chunks {
                    Output::search_result(
                        &chunk.source,
                        chunk.page,
                        chunk.score,
                        &chunk.summary,
                        &chunk.content,
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
