//! Ingest command implementation.

use super::require;
use crate::cli::preflight::Operation;
use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::DocumentKind;
use crate::orchestrator::Pipeline;
use anyhow::{Context, Result};
use std::path::Path;

/// Extract and index a local PDF or image, as the upload endpoint does.
pub async fn run_ingest(file: &str, pages: Option<usize>, settings: Settings) -> Result<()> {
    let path = Path::new(file);
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Not a file path: {}", file))?;

    let kind = DocumentKind::from_filename(filename)?;
    require(Operation::Ingest(kind))?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let pipeline = Pipeline::from_settings(settings).await?;

    let spinner = Output::spinner(&format!("Processing {} {}...", kind, filename));
    let result = pipeline.process_upload(filename, &bytes, pages).await;
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            Output::error(&format!("Failed to process {}: {}", filename, e));
            return Err(e.into());
        }
    };

    Output::header(&result.filename);
    for (idx, page) in result.content.iter().enumerate() {
        let label = format!("Page {}", idx + 1);
        if page.is_fallback() {
            Output::kv(&label, "extraction failed, not indexed");
        } else {
            Output::kv(&label, &page.summary);
        }
    }
    println!();

    if result.chunks_indexed > 0 {
        Output::success(&format!("Indexed {} chunks", result.chunks_indexed));
    } else {
        Output::warning("Nothing was indexed.");
    }

    Ok(())
}
