//! Recursive character splitting.
//!
//! Text is cut on the coarsest separator that occurs in it (paragraphs, then
//! lines, then words, then characters). Small pieces are packed back together
//! up to the chunk size, and pieces that are still too large are split again
//! with the finer separators.

use crate::config::ChunkingSettings;
use crate::error::{FinragError, Result};
use std::collections::VecDeque;
use tracing::warn;

/// Character-count based recursive text splitter.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter with the default separators.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::with_separators(chunk_size, chunk_overlap, ChunkingSettings::default().separators)
    }

    /// Create a splitter with custom separators, tried in order.
    pub fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(FinragError::Config("chunk_size must be positive".to_string()));
        }
        if chunk_overlap > chunk_size {
            return Err(FinragError::Config(format!(
                "chunk_overlap ({}) is larger than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    /// Build a splitter from settings.
    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::with_separators(
            settings.chunk_size,
            settings.chunk_overlap,
            settings.separators.clone(),
        )
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split text into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut good_splits: Vec<&str> = Vec::new();
        for piece in split_keep_start(text, separator) {
            if char_len(piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    final_chunks.push(trimmed.to_string());
                }
            } else {
                final_chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// Pack small pieces into chunks, carrying up to `chunk_overlap`
    /// characters from the end of one chunk into the next.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !current.is_empty() {
                    push_joined(&mut docs, &current);

                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match current.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        push_joined(&mut docs, &current);
        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_joined(docs: &mut Vec<String>, pieces: &VecDeque<&str>) {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Split on `separator`, keeping each separator at the start of the piece
/// that follows it. An empty separator splits into characters.
fn split_keep_start<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = TextSplitter::new(3000, 100).unwrap();
        assert_eq!(splitter.split_text("  Net profit rose 12%.  "), vec!["Net profit rose 12%."]);
        assert!(splitter.split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_paragraphs_are_packed() {
        let splitter = TextSplitter::new(20, 0).unwrap();
        let chunks = splitter.split_text("aaaa bbbb\n\ncccc dddd\n\neeee");
        assert_eq!(chunks, vec!["aaaa bbbb\n\ncccc dddd", "eeee"]);
    }

    #[test]
    fn test_overlap_carries_trailing_words() {
        let splitter = TextSplitter::new(10, 4).unwrap();
        let chunks = splitter.split_text("one two three four five");
        assert_eq!(chunks, vec!["one two", "two three", "four five"]);
    }

    #[test]
    fn test_falls_back_to_characters() {
        let splitter = TextSplitter::new(5, 0).unwrap();
        assert_eq!(splitter.split_text("abcdefghijkl"), vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn test_oversized_piece_is_split_again() {
        let splitter = TextSplitter::new(10, 0).unwrap();
        let chunks = splitter.split_text("short\n\naveryverylongword");
        assert_eq!(chunks[0], "short");
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), "shortaveryverylongword");
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let splitter = TextSplitter::new(4, 0).unwrap();
        let chunks = splitter.split_text("₹₹₹₹₹₹");
        assert_eq!(chunks, vec!["₹₹₹₹", "₹₹"]);
    }

    #[test]
    fn test_rejects_overlap_larger_than_size() {
        assert!(matches!(TextSplitter::new(10, 11), Err(FinragError::Config(_))));
        assert!(TextSplitter::new(0, 0).is_err());
    }

    #[test]
    fn test_split_keep_start() {
        assert_eq!(split_keep_start("a  b", " "), vec!["a", " ", " b"]);
        assert_eq!(split_keep_start("\nx", "\n"), vec!["\nx"]);
        assert_eq!(split_keep_start("ab", ""), vec!["a", "b"]);
    }
}
