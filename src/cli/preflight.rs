//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::error::{FinragError, Result};
use crate::gemini::require_api_key;
use crate::ingest::DocumentKind;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingesting needs the API key, and `pdftoppm` for PDFs.
    Ingest(DocumentKind),
    /// Asking, searching and serving need the API key for embeddings.
    Query,
    /// Listing and deleting only touch the vector store.
    Manage,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Ingest(kind) => {
            check_api_key()?;
            if kind == DocumentKind::Pdf {
                check_tool("pdftoppm")?;
            }
        }
        Operation::Query => {
            check_api_key()?;
        }
        Operation::Manage => {}
    }
    Ok(())
}

fn check_api_key() -> Result<()> {
    require_api_key().map(|_| ())
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    // poppler tools print their version with -v
    match Command::new(name).arg("-v").output() {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FinragError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(FinragError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
