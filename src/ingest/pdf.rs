//! PDF page rendering via poppler's `pdftoppm`.

use crate::error::{FinragError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// A single rendered PDF page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-based page number.
    pub number: u32,
    /// PNG-encoded page image.
    pub png: Vec<u8>,
}

/// Renders PDF pages to PNG images.
#[derive(Debug, Clone)]
pub struct PdfRasterizer {
    dpi: u32,
    work_dir: PathBuf,
}

impl PdfRasterizer {
    /// Create a rasterizer that renders at `dpi` and works inside `work_dir`.
    pub fn new(dpi: u32, work_dir: &Path) -> Self {
        Self {
            dpi,
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Render up to `max_pages` pages (all pages when `None`).
    #[instrument(skip(self, pdf), fields(bytes = pdf.len()))]
    pub async fn render(&self, pdf: &[u8], max_pages: Option<usize>) -> Result<Vec<RenderedPage>> {
        if max_pages == Some(0) {
            return Ok(Vec::new());
        }

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let temp_dir = tempfile::Builder::new()
            .prefix("finrag-pdf-")
            .tempdir_in(&self.work_dir)?;

        let input_path = temp_dir.path().join("input.pdf");
        tokio::fs::write(&input_path, pdf).await?;
        let prefix = temp_dir.path().join("page");

        let mut command = Command::new("pdftoppm");
        command
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string());
        if let Some(limit) = max_pages {
            command.arg("-l").arg(limit.to_string());
        }
        let result = command
            .arg(&input_path)
            .arg(&prefix)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => {}
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                return Err(FinragError::PdfRender(format!("pdftoppm failed: {}", err.trim())));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FinragError::ToolNotFound("pdftoppm".into()));
            }
            Err(e) => return Err(FinragError::PdfRender(format!("pdftoppm error: {}", e))),
        }

        let mut images: Vec<(u32, PathBuf)> = Vec::new();
        let mut entries = tokio::fs::read_dir(temp_dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "png") {
                continue;
            }
            if let Some(number) = page_number_from_path(&path) {
                images.push((number, path));
            }
        }

        // pdftoppm zero-pads by page count, so sort numerically rather than by name
        images.sort_by_key(|(number, _)| *number);

        if images.is_empty() {
            return Err(FinragError::PdfRender("PDF produced no pages".to_string()));
        }

        let mut pages = Vec::with_capacity(images.len());
        for (number, path) in images {
            let png = tokio::fs::read(&path).await?;
            debug!("Rendered page {} ({} bytes)", number, png.len());
            pages.push(RenderedPage { number, png });
        }

        info!("Converted {} pages from PDF", pages.len());
        Ok(pages)
    }
}

/// Extract the page number from a `pdftoppm` output name like `page-07.png`.
fn page_number_from_path(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    let (_, number) = stem.rsplit_once('-')?;
    number.parse().ok()
}
