//! Document chunking.
//!
//! Content is first cut on structural boundaries (blank lines, bullet and
//! heading markers), segments below the minimum length are dropped as
//! noise, and any segment still longer than `max_size` is cut into
//! balanced character slices. Lengths are counted in `char`s.
//!
//! The rule is deterministic: the same document and `max_size` always yield
//! the same chunk texts and ids, so re-ingestion overwrites instead of
//! fragmenting the corpus differently.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::types::{Chunk, ChunkMetadata, RawDocument};

pub const DEFAULT_MIN_CHUNK_LENGTH: usize = 50;

fn block_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        // bullets (-, *, +, •), numbered items (1. / 1)) and markdown headings
        Regex::new(r"^(?:[-*+•]\s+|\d{1,3}[.)]\s+|#{1,6}\s+)")
            .expect("block marker regex should compile")
    })
}

#[derive(Debug, Clone)]
pub struct Chunker {
    min_length: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CHUNK_LENGTH)
    }
}

impl Chunker {
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length: min_length.max(1),
        }
    }

    /// Splits a document into chunks stamped with the current time.
    pub fn chunk(&self, document: &RawDocument, max_size: usize) -> Vec<Chunk> {
        self.chunk_at(document, max_size, Utc::now())
    }

    pub fn chunk_at(
        &self,
        document: &RawDocument,
        max_size: usize,
        created_at: DateTime<Utc>,
    ) -> Vec<Chunk> {
        let title = Some(document.title.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        self.split_text(&document.content, max_size)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| Chunk {
                id: Chunk::chunk_id(&document.url, sequence_index),
                text,
                metadata: ChunkMetadata {
                    source: document.url.clone(),
                    title: title.clone(),
                    sequence_index,
                    created_at,
                },
            })
            .collect()
    }

    /// Every returned piece has a length in `[min_length, max_size]`.
    pub fn split_text(&self, text: &str, max_size: usize) -> Vec<String> {
        if max_size < self.min_length {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        for segment in structural_segments(text) {
            let len = segment.chars().count();
            if len < self.min_length {
                continue;
            }
            if len <= max_size {
                pieces.push(segment);
                continue;
            }
            pieces.extend(hard_slices(&segment, max_size, self.min_length));
        }
        pieces
    }
}

fn structural_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut current, &mut segments);
            continue;
        }
        if block_marker().is_match(line) {
            flush(&mut current, &mut segments);
        }
        current.push(line);
    }
    flush(&mut current, &mut segments);

    segments
}

fn flush(current: &mut Vec<&str>, segments: &mut Vec<String>) {
    if !current.is_empty() {
        segments.push(current.join("\n"));
        current.clear();
    }
}

/// Cuts `segment` into `ceil(len / max_size)` slices of near-equal length.
///
/// Slices are trimmed unless trimming would take them below `min_length`;
/// such a slice is kept as cut so a boundary landing on whitespace never
/// costs the text around it. With `max_size >= 2 * min_length` every slice
/// is at least `min_length` long as cut.
fn hard_slices(segment: &str, max_size: usize, min_length: usize) -> Vec<String> {
    let chars: Vec<char> = segment.chars().collect();
    let total = chars.len();
    let count = total.div_ceil(max_size.max(1));

    (0..count)
        .filter_map(|i| {
            let start = i * total / count;
            let end = (i + 1) * total / count;
            let raw: String = chars[start..end].iter().collect();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                None
            } else if trimmed.chars().count() >= min_length {
                Some(trimmed.to_string())
            } else if end - start >= min_length {
                Some(raw)
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> RawDocument {
        RawDocument {
            url: "https://x/a".to_string(),
            title: "Account help".to_string(),
            content: content.to_string(),
        }
    }

    fn sentence_block(words: usize) -> String {
        (0..words)
            .map(|i| format!("word{}", i % 17))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn empty_content_yields_nothing() {
        let chunker = Chunker::default();
        assert!(chunker.chunk(&doc(""), 1200).is_empty());
        assert!(chunker.chunk(&doc("\n\n   \n"), 1200).is_empty());
    }

    #[test]
    fn content_below_minimum_yields_nothing() {
        let chunker = Chunker::default();
        assert!(chunker.chunk(&doc("Short note."), 1200).is_empty());
    }

    #[test]
    fn short_faq_becomes_a_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.chunk(
            &doc("Reset your password from Settings > Security. Contact support for help."),
            1200,
        );

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "https://x/a#0");
        assert_eq!(chunks[0].metadata.source, "https://x/a");
        assert_eq!(chunks[0].metadata.title.as_deref(), Some("Account help"));
        assert_eq!(chunks[0].metadata.sequence_index, 0);
        assert!(chunks[0].text.contains("Settings > Security"));
    }

    #[test]
    fn paragraphs_and_markers_start_new_segments() {
        let content = "\
## How do I close my account?
You can close your account at any time from the profile page of the app.

- Cards issued under a closed account stop working the same day.
- Short bullet.
1. Pending payments still settle on their usual schedule after closing.";
        let chunker = Chunker::default();
        let texts = chunker.split_text(content, 1200);

        assert_eq!(texts.len(), 3);
        assert!(texts[0].starts_with("## How do I close my account?\nYou can close"));
        assert!(texts[1].starts_with("- Cards issued"));
        assert!(texts[2].starts_with("1. Pending payments"));
    }

    #[test]
    fn oversized_segment_is_sliced_in_order() {
        let paragraph = sentence_block(400);
        let chunker = Chunker::new(50);
        let texts = chunker.split_text(&paragraph, 300);

        let expected = paragraph.chars().count().div_ceil(300);
        assert_eq!(texts.len(), expected);
        for text in &texts {
            let len = text.chars().count();
            assert!((50..=300).contains(&len), "length {} out of bounds", len);
        }
        let rejoined: String = texts.concat().split_whitespace().collect();
        let original: String = paragraph.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn every_chunk_respects_bounds_for_any_max_size() {
        let content = format!(
            "{}\n\n{}\n\n- tiny\n\n{}\n* {}",
            sentence_block(30),
            sentence_block(260),
            sentence_block(5),
            sentence_block(90)
        );
        let chunker = Chunker::new(50);

        for max_size in [10, 49, 50, 60, 99, 100, 101, 137, 256, 1200, 5000] {
            for text in chunker.split_text(&content, max_size) {
                let len = text.chars().count();
                assert!(
                    len >= 50 && len <= max_size,
                    "max_size {}: length {} out of bounds",
                    max_size,
                    len
                );
            }
        }
    }

    fn non_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn slice_boundary_on_whitespace_keeps_both_sides() {
        let segment = format!("{} {}", "x".repeat(49), "y".repeat(51));
        let texts = Chunker::new(50).split_text(&segment, 100);

        assert_eq!(texts.len(), 2);
        assert_eq!(non_whitespace(&texts.concat()), non_whitespace(&segment));
        for text in &texts {
            assert!((50..=100).contains(&text.chars().count()));
        }
    }

    #[test]
    fn valid_sizes_never_drop_text_from_oversized_segments() {
        let segments = [
            format!("{} {}", "x".repeat(49), "y".repeat(51)),
            format!("{}   {}", "a".repeat(60), "b".repeat(97)),
            sentence_block(120),
            "ab ".repeat(90),
            format!("{}\n{}", "p".repeat(75), "q".repeat(140)),
        ];
        let chunker = Chunker::new(50);

        for segment in &segments {
            for max_size in [100, 101, 120, 150, 199, 250] {
                let texts = chunker.split_text(segment, max_size);
                assert_eq!(
                    non_whitespace(&texts.concat()),
                    non_whitespace(segment),
                    "max_size {} lost text",
                    max_size
                );
                for text in &texts {
                    let len = text.chars().count();
                    assert!(len >= 50 && len <= max_size, "length {} out of bounds", len);
                }
            }
        }
    }

    #[test]
    fn multibyte_text_is_sliced_on_char_boundaries() {
        let paragraph = "パスワードは設定画面からリセットできます。".repeat(20);
        let chunker = Chunker::new(10);
        let texts = chunker.split_text(&paragraph, 64);
        assert!(texts.len() > 1);
        assert!(texts.iter().all(|t| t.chars().count() <= 64));
    }

    #[test]
    fn chunking_is_deterministic() {
        let content = format!("{}\n\n{}", sentence_block(300), sentence_block(40));
        let chunker = Chunker::default();
        let created_at = Utc::now();

        let first = chunker.chunk_at(&doc(&content), 500, created_at);
        let second = chunker.chunk_at(&doc(&content), 500, created_at);

        assert_eq!(first, second);
        let ids: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids[0], "https://x/a#0");
        let last_id = format!("https://x/a#{}", first.len() - 1);
        assert_eq!(ids.last().copied(), Some(last_id.as_str()));
    }
}
