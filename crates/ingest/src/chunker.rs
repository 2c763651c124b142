//! Article chunking.
//!
//! Splits an article body into retrieval-sized pieces: target size in
//! whitespace tokens, a hard maximum, and a small overlap between
//! consecutive chunks. Splits prefer sentence boundaries; a sentence longer
//! than the hard maximum is split at whitespace.
//!
//! Overlap is deliberately small: articles are semantically self-contained,
//! unlike free-form prose.

use qanun_core::config::ChunkingConfig;

/// A chunk of article text, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    /// 0-based, strictly increasing within the article.
    pub chunk_index: u32,
    pub text: String,
    pub token_count: usize,
}

/// Token-budgeted sentence-packing chunker.
#[derive(Debug, Clone)]
pub struct Chunker {
    target_tokens: usize,
    max_tokens: usize,
    overlap_tokens: usize,
}

const SENTENCE_BOUNDARIES: [char; 5] = ['.', '۔', '؟', '?', '!'];

impl Chunker {
    pub fn new(target_tokens: usize, max_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            target_tokens: target_tokens.max(1),
            max_tokens: max_tokens.max(target_tokens.max(1)),
            overlap_tokens,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(
            config.chunk_target_tokens,
            config.chunk_max_tokens,
            config.chunk_overlap_tokens,
        )
    }

    /// Split `body` into ordered chunks. Empty bodies produce no chunks.
    pub fn chunk(&self, body: &str) -> Vec<ChunkDraft> {
        let mut chunks: Vec<ChunkDraft> = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for sentence in split_sentences(body) {
            let tokens: Vec<String> =
                sentence.split_whitespace().map(str::to_string).collect();
            if tokens.is_empty() {
                continue;
            }

            for piece in split_oversized(tokens, self.max_tokens) {
                if !current.is_empty() && current.len() + piece.len() > self.target_tokens {
                    self.emit(&mut chunks, &mut current, piece.len());
                }
                current.extend(piece);
            }
        }

        if !current.is_empty() {
            let token_count = current.len();
            chunks.push(ChunkDraft {
                chunk_index: chunks.len() as u32,
                text: current.join(" "),
                token_count,
            });
        }

        chunks
    }

    // Emit the current chunk and seed the next one with the overlap tail.
    fn emit(&self, chunks: &mut Vec<ChunkDraft>, current: &mut Vec<String>, incoming: usize) {
        let token_count = current.len();
        chunks.push(ChunkDraft {
            chunk_index: chunks.len() as u32,
            text: current.join(" "),
            token_count,
        });

        let overlap = self
            .overlap_tokens
            .min(current.len())
            // The overlap tail plus the incoming piece must stay within the
            // hard maximum.
            .min(self.max_tokens.saturating_sub(incoming));
        let tail_start = current.len() - overlap;
        *current = current.split_off(tail_start);
    }
}

/// Split text into sentences, boundary characters attached. Newlines also
/// terminate a sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch == '\n' {
            if !current.trim().is_empty() {
                sentences.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            continue;
        }
        current.push(ch);
        if SENTENCE_BOUNDARIES.contains(&ch) {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Break a token run into pieces of at most `max_tokens`.
fn split_oversized(tokens: Vec<String>, max_tokens: usize) -> Vec<Vec<String>> {
    if tokens.len() <= max_tokens {
        return vec![tokens];
    }
    tokens
        .chunks(max_tokens.max(1))
        .map(|piece| piece.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn words(count: usize, stem: &str) -> String {
        (0..count)
            .map(|i| format!("{stem}{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_short_body_is_one_chunk() {
        let chunker = Chunker::new(500, 800, 20);
        let chunks = chunker.chunk("يلتزم صاحب العمل بدفع الأجر.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].token_count, 5);
    }

    #[test]
    fn test_empty_body_yields_no_chunks() {
        let chunker = Chunker::new(500, 800, 20);
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   ").is_empty());
    }

    #[test]
    fn test_chunks_respect_hard_maximum() {
        let chunker = Chunker::new(50, 80, 10);
        // One long sentence with no boundaries: whitespace splits.
        let body = words(500, "كلمة");
        let chunks = chunker.chunk(&body);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 80, "chunk of {} tokens", chunk.token_count);
        }
    }

    #[test]
    fn test_chunk_indexes_are_strictly_increasing() {
        let chunker = Chunker::new(20, 30, 5);
        let body = (0..10)
            .map(|i| format!("{}.", words(15, &format!("جملة{i}كلمة"))))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker.chunk(&body);
        assert!(chunks.len() > 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
        }
    }

    #[test]
    fn test_overlap_carries_tail_tokens() {
        let chunker = Chunker::new(10, 20, 3);
        // Two sentences of 10 tokens each force two chunks.
        let body = format!("{}. {}.", words(9, "اولى"), words(9, "ثانيه"));
        let chunks = chunker.chunk(&body);
        assert_eq!(chunks.len(), 2);

        let first_tokens: Vec<&str> = chunks[0].text.split_whitespace().collect();
        let second_tokens: Vec<&str> = chunks[1].text.split_whitespace().collect();
        let tail = &first_tokens[first_tokens.len() - 3..];
        assert_eq!(&second_tokens[..3], tail);
    }

    #[test]
    fn test_splits_prefer_sentence_boundaries() {
        let chunker = Chunker::new(12, 30, 0);
        let body = format!("{}؟ {}.", words(8, "سؤال"), words(8, "جواب"));
        let chunks = chunker.chunk(&body);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with('؟'));
    }

    #[test]
    fn test_arabic_full_stop_is_a_boundary() {
        let chunker = Chunker::new(6, 30, 0);
        let body = format!("{}۔ {}۔", words(5, "نص"), words(5, "اخر"));
        let chunks = chunker.chunk(&body);
        assert_eq!(chunks.len(), 2);
    }
}
