//! Recursive-separator text chunker with exact offset tracking.
//!
//! Splits document text into [`Chunk`]s of at most `max_chunk_size`
//! characters, preferring the coarsest boundary available (paragraph, line,
//! sentence punctuation, word, character) and repeating the tail of each
//! chunk at the head of the next.
//!
//! # Algorithm
//!
//! 1. Measure everything in chars; keep a char → byte offset table so every
//!    chunk is an exact slice of the original text.
//! 2. Split the document into *units* no longer than
//!    `max_chunk_size - overlap_size`: a span that is too long is cut at the
//!    first separator (in priority order) that occurs in it, the separator
//!    staying attached to the end of the preceding piece. Pieces that are
//!    still too long recurse with the finer separators only.
//! 3. Pack consecutive units greedily. Each chunk after the first starts
//!    `min(overlap_size, previous chunk length)` chars before the previous
//!    chunk's end, re-read from the document, and grows unit by unit while
//!    it stays within `max_chunk_size`.
//!
//! Chunk text is never trimmed: dropping each chunk's leading `overlap`
//! chars and concatenating reconstructs the document exactly.
//!
//! # Oversized units
//!
//! With the default separators the last entry is `""` (character boundary),
//! so every unit fits. A custom separator list without it can leave a unit
//! (e.g. one long word) that exceeds the limit; such a unit becomes a chunk
//! of its own and is the only case where a chunk exceeds `max_chunk_size`.
//!
//! # Example
//!
//! ```rust
//! use rag_harness_core::chunk::{chunk_document, ChunkingParams};
//! use rag_harness_core::models::{Document, SourceMetadata};
//!
//! let doc = Document::new("Hello world.\n\nSecond paragraph.", SourceMetadata::text("a.md"));
//! let chunks = chunk_document(&doc, &ChunkingParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, doc.text);
//! ```

use sha2::{Digest, Sha256};

use crate::error::RetrievalError;
use crate::models::{Chunk, Document};

/// Separators tried from coarsest to finest. `""` means "any character".
pub const DEFAULT_SEPARATORS: [&str; 8] = ["\n\n", "\n", ".", "!", "?", ",", " ", ""];

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 800;
pub const DEFAULT_OVERLAP_SIZE: usize = 100;

/// Chunk size policy, in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingParams {
    pub max_chunk_size: usize,
    pub overlap_size: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_SIZE, DEFAULT_OVERLAP_SIZE)
    }
}

impl ChunkingParams {
    /// Params with the default separator list.
    pub fn new(max_chunk_size: usize, overlap_size: usize) -> Self {
        Self {
            max_chunk_size,
            overlap_size,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.max_chunk_size == 0 {
            return Err(RetrievalError::Configuration(
                "chunk size must be > 0".to_string(),
            ));
        }
        if self.overlap_size >= self.max_chunk_size {
            return Err(RetrievalError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap_size, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// Split every document in order and concatenate the results.
pub fn chunk_documents(documents: &[Document], params: &ChunkingParams) -> Vec<Chunk> {
    let chunks: Vec<Chunk> = documents
        .iter()
        .flat_map(|doc| chunk_document(doc, params))
        .collect();
    tracing::debug!(
        documents = documents.len(),
        chunks = chunks.len(),
        "chunked documents"
    );
    chunks
}

/// Split one document into overlapping chunks.
///
/// Returns no chunks for empty text and exactly one chunk (the whole
/// document) when the text fits in `max_chunk_size`.
pub fn chunk_document(doc: &Document, params: &ChunkingParams) -> Vec<Chunk> {
    let text = doc.text.as_str();
    if text.is_empty() {
        return Vec::new();
    }

    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    let max = params.max_chunk_size.max(1);
    let overlap = params.overlap_size.min(max - 1);
    let unit_limit = max - overlap;

    let splitter = Splitter {
        text,
        offsets: &offsets,
        limit: unit_limit,
    };
    let mut units = Vec::new();
    splitter.split(0, total, &params.separators, &mut units);

    let mut chunks = Vec::new();
    let mut units = units.into_iter().peekable();
    let mut prev: Option<(usize, usize)> = None;

    while let Some(&(body_start, _)) = units.peek() {
        let (start, overlap_len) = match prev {
            None => (body_start, 0),
            Some((prev_start, prev_end)) => {
                let o = overlap.min(prev_end - prev_start);
                (prev_end - o, o)
            }
        };

        let mut end = body_start;
        while let Some(&(_, unit_end)) = units.peek() {
            let fits = unit_end - start <= max;
            if !fits && end > body_start {
                break;
            }
            end = unit_end;
            units.next();
            if !fits {
                // Indivisible unit: emitted alone.
                break;
            }
        }

        chunks.push(make_chunk(
            doc,
            chunks.len() as i64,
            &offsets,
            start,
            end,
            overlap_len,
        ));
        prev = Some((start, end));
    }

    chunks
}

struct Splitter<'a> {
    text: &'a str,
    offsets: &'a [usize],
    limit: usize,
}

impl Splitter<'_> {
    /// Push char ranges covering `[start, end)` that respect `limit` where
    /// the separators allow it.
    fn split(&self, start: usize, end: usize, separators: &[String], out: &mut Vec<(usize, usize)>) {
        if end - start <= self.limit {
            out.push((start, end));
            return;
        }

        let base = self.offsets[start];
        let slice = &self.text[base..self.offsets[end]];

        let mut remaining = separators;
        while let Some((sep, finer)) = remaining.split_first() {
            remaining = finer;

            if sep.is_empty() {
                out.extend((start..end).map(|i| (i, i + 1)));
                return;
            }
            if !slice.contains(sep.as_str()) {
                continue;
            }

            let mut piece_start = start;
            for (byte_idx, matched) in slice.match_indices(sep.as_str()) {
                let piece_end = self.char_index(base + byte_idx + matched.len());
                if piece_end > piece_start {
                    self.split(piece_start, piece_end, finer, out);
                }
                piece_start = piece_end;
            }
            if piece_start < end {
                self.split(piece_start, end, finer, out);
            }
            return;
        }

        out.push((start, end));
    }

    fn char_index(&self, byte: usize) -> usize {
        self.offsets.binary_search(&byte).unwrap_or_else(|i| i)
    }
}

fn make_chunk(
    doc: &Document,
    index: i64,
    offsets: &[usize],
    start: usize,
    end: usize,
    overlap: usize,
) -> Chunk {
    let text = &doc.text[offsets[start]..offsets[end]];

    let mut hasher = Sha256::new();
    hasher.update(doc.metadata.label().as_bytes());
    hasher.update(start.to_le_bytes());
    hasher.update(end.to_le_bytes());
    hasher.update(Sha256::digest(text.as_bytes()));
    let id = format!("{:x}", hasher.finalize());

    Chunk {
        id,
        chunk_index: index,
        text: text.to_string(),
        start_offset: start,
        end_offset: end,
        overlap,
        metadata: doc.metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceMetadata;

    fn doc(text: &str) -> Document {
        Document::new(text, SourceMetadata::text("doc.md"))
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// The part of a chunk not shared with the previous chunk.
    fn fresh_text(chunk: &Chunk) -> &str {
        match chunk.text.char_indices().nth(chunk.overlap) {
            Some((i, _)) => &chunk.text[i..],
            None => "",
        }
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for p in 0..12 {
            for s in 0..5 {
                text.push_str(&format!(
                    "Parágrafo {p}, frase {s} fala de embeddings e vetores. "
                ));
            }
            text.push_str("\n\n");
        }
        text.push_str("Última linha sem ponto final");
        text
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_document(&doc("Hello, world!"), &ChunkingParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn test_text_exactly_max_is_one_chunk() {
        let text = "x".repeat(800);
        let chunks = chunk_document(&doc(&text), &ChunkingParams::new(800, 100));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_fresh_text_strips_overlap() {
        let chunk = Chunk {
            id: "c".into(),
            chunk_index: 1,
            text: "éfghij".into(),
            start_offset: 4,
            end_offset: 10,
            overlap: 2,
            metadata: SourceMetadata::text("a.txt"),
        };
        assert_eq!(fresh_text(&chunk), "ghij");
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_document(&doc(""), &ChunkingParams::default()).is_empty());
    }

    #[test]
    fn test_word_boundaries_without_overlap() {
        let chunks = chunk_document(&doc("aaaa bbbb cccc dddd"), &ChunkingParams::new(10, 0));
        assert_eq!(texts(&chunks), vec!["aaaa bbbb ", "cccc dddd"]);
        assert_eq!(chunks[1].start_offset, 10);
    }

    #[test]
    fn test_word_boundaries_with_overlap() {
        let chunks = chunk_document(&doc("aaaa bbbb cccc dddd"), &ChunkingParams::new(10, 3));
        assert_eq!(texts(&chunks), vec!["aaaa bbbb ", "bb cccc ", "cc dddd"]);
        assert_eq!(
            chunks.iter().map(|c| c.start_offset).collect::<Vec<_>>(),
            vec![0, 7, 12]
        );
        assert_eq!(
            chunks.iter().map(|c| c.overlap).collect::<Vec<_>>(),
            vec![0, 3, 3]
        );
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let first = "First paragraph has some words.";
        let second = "Second paragraph, also with words.";
        let text = format!("{first}\n\n{second}");
        let chunks = chunk_document(&doc(&text), &ChunkingParams::new(40, 0));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, format!("{first}\n\n"));
        assert_eq!(chunks[1].text, second);
    }

    #[test]
    fn test_coverage_reconstructs_document() {
        let text = sample_text();
        let chunks = chunk_document(&doc(&text), &ChunkingParams::new(120, 30));
        assert!(chunks.len() > 5);
        let rebuilt: String = chunks.iter().map(fresh_text).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_overlap_invariant() {
        let text = sample_text();
        let o = 30;
        let chunks = chunk_document(&doc(&text), &ChunkingParams::new(120, o));
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert!(prev.len() >= o);
            assert_eq!(&prev[prev.len() - o..], &next[..o]);
            assert_eq!(pair[1].start_offset, pair[0].end_offset - o);
        }
    }

    #[test]
    fn test_offsets_match_source_span() {
        let text = sample_text();
        let chars: Vec<char> = text.chars().collect();
        let chunks = chunk_document(&doc(&text), &ChunkingParams::new(90, 20));
        for c in &chunks {
            let span: String = chars[c.start_offset..c.end_offset].iter().collect();
            assert_eq!(span, c.text);
        }
        assert_eq!(chunks.last().unwrap().end_offset, chars.len());
    }

    #[test]
    fn test_size_bound() {
        let text = sample_text();
        for (max, overlap) in [(50, 10), (120, 30), (300, 0), (64, 63)] {
            let chunks = chunk_document(&doc(&text), &ChunkingParams::new(max, overlap));
            for c in &chunks {
                assert!(
                    c.text.chars().count() <= max,
                    "chunk of {} chars exceeds {}",
                    c.text.chars().count(),
                    max
                );
            }
        }
    }

    #[test]
    fn test_character_fallback_without_separators() {
        let text = "abcdefghij".repeat(5);
        let chunks = chunk_document(&doc(&text), &ChunkingParams::new(20, 5));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 20);
        }
        let rebuilt: String = chunks.iter().map(fresh_text).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_indivisible_word_overflows_limit() {
        let long_word = "w".repeat(50);
        let text = format!("short words {long_word} tail end");
        let mut params = ChunkingParams::new(20, 5);
        params.separators = vec![" ".to_string()];
        let chunks = chunk_document(&doc(&text), &params);

        let oversized: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.text.chars().count() > 20)
            .collect();
        assert_eq!(oversized.len(), 1);
        assert!(oversized[0].text.contains(&long_word));

        let rebuilt: String = chunks.iter().map(fresh_text).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_multibyte_offsets_are_char_based() {
        let text = "ação é ótima. ".repeat(10);
        let chunks = chunk_document(&doc(&text), &ChunkingParams::new(30, 5));
        let chars: Vec<char> = text.chars().collect();
        for c in &chunks {
            let span: String = chars[c.start_offset..c.end_offset].iter().collect();
            assert_eq!(span, c.text);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text();
        let params = ChunkingParams::new(100, 20);
        let c1 = chunk_document(&doc(&text), &params);
        let c2 = chunk_document(&doc(&text), &params);
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_chunk_indices_contiguous_and_metadata_inherited() {
        let text = sample_text();
        let document = Document::new(text.as_str(), SourceMetadata::text("notes/long.md"));
        let chunks = chunk_document(&document, &ChunkingParams::new(80, 10));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.metadata, document.metadata);
        }
    }

    #[test]
    fn test_chunk_documents_keeps_document_order() {
        let docs = vec![
            Document::new("first doc", SourceMetadata::text("a.txt")),
            Document::new("", SourceMetadata::text("empty.txt")),
            Document::new("second doc", SourceMetadata::text("b.txt")),
        ];
        let chunks = chunk_documents(&docs, &ChunkingParams::default());
        assert_eq!(texts(&chunks), vec!["first doc", "second doc"]);
        assert_ne!(chunks[0].id, chunks[1].id);
    }

    #[test]
    fn test_validate() {
        assert!(ChunkingParams::new(800, 100).validate().is_ok());
        assert!(ChunkingParams::new(0, 0).validate().is_err());
        assert!(ChunkingParams::new(100, 100).validate().is_err());
    }
}
