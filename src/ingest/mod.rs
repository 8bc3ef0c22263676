//! Document intake: classify uploads and turn them into page images.
//!
//! PDFs are rendered page by page with poppler's `pdftoppm`; images are
//! passed through after their format has been checked.

mod pdf;

pub use pdf::{PdfRasterizer, RenderedPage};

use crate::error::{FinragError, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};

/// Extensions accepted as single-page image uploads.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Kind of an uploaded document, decided from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Classify a file by its extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        if extension == "pdf" {
            Ok(DocumentKind::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Ok(DocumentKind::Image)
        } else {
            Err(FinragError::UnsupportedFile(filename.to_string()))
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Pdf => write!(f, "PDF"),
            DocumentKind::Image => write!(f, "image"),
        }
    }
}

/// Sniff the image format from its bytes and return its MIME type.
///
/// Only the formats the vision model is given (PNG, JPEG, GIF, BMP) pass.
pub fn detect_image_format(bytes: &[u8]) -> Result<&'static str> {
    let format = image::guess_format(bytes)
        .map_err(|e| FinragError::Ocr(format!("Could not identify image: {}", e)))?;

    match format {
        ImageFormat::Png => Ok("image/png"),
        ImageFormat::Jpeg => Ok("image/jpeg"),
        ImageFormat::Gif => Ok("image/gif"),
        ImageFormat::Bmp => Ok("image/bmp"),
        other => Err(FinragError::Ocr(format!(
            "Unsupported image format: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_kind_from_filename() {
        assert_eq!(DocumentKind::from_filename("report.pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("Q3.Results.PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("scan.JPeG").unwrap(), DocumentKind::Image);
        assert_eq!(DocumentKind::from_filename("chart.bmp").unwrap(), DocumentKind::Image);
    }

    #[test]
    fn test_unsupported_filenames() {
        assert!(matches!(
            DocumentKind::from_filename("notes.docx"),
            Err(FinragError::UnsupportedFile(_))
        ));
        assert!(DocumentKind::from_filename("README").is_err());
        assert!(DocumentKind::from_filename("photo.webp").is_err());
    }

    #[test]
    fn test_detect_png() {
        assert_eq!(detect_image_format(PNG_MAGIC).unwrap(), "image/png");
    }

    #[test]
    fn test_detect_jpeg_and_gif() {
        assert_eq!(detect_image_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]).unwrap(), "image/jpeg");
        assert_eq!(detect_image_format(b"GIF89a\x01\x00").unwrap(), "image/gif");
    }

    #[test]
    fn test_detect_rejects_text() {
        assert!(detect_image_format(b"just some text, not an image").is_err());
    }
}
