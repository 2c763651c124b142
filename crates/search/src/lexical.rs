//! BM25 lexical scoring over chunk texts.
//!
//! Built per query over the chunks admitted by the active filters; the
//! corpus is single-node sized, so a transient index is cheaper than
//! keeping an inverted index in sync with ingest and delete.

use std::collections::HashMap;

use qanun_core::types::{ChunkId, ChunkRow};
use qanun_parser::normalize::{NormalizerOptions, normalize_str};

/// BM25 parameters; the conventional defaults.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

struct IndexedChunk {
    chunk_id: ChunkId,
    term_frequencies: HashMap<String, usize>,
    length: usize,
}

/// A transient BM25 index over a set of chunks.
pub struct Bm25Index {
    params: Bm25Params,
    chunks: Vec<IndexedChunk>,
    document_frequencies: HashMap<String, usize>,
    average_length: f32,
}

pub fn tokenize(text: &str) -> Vec<String> {
    normalize_str(text, &NormalizerOptions::search())
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

impl Bm25Index {
    pub fn build(rows: &[ChunkRow], params: Bm25Params) -> Self {
        let mut chunks = Vec::with_capacity(rows.len());
        let mut document_frequencies: HashMap<String, usize> = HashMap::new();
        let mut total_length = 0usize;

        for row in rows {
            let tokens = tokenize(&row.text);
            total_length += tokens.len();
            let mut term_frequencies: HashMap<String, usize> = HashMap::new();
            for token in tokens.iter() {
                *term_frequencies.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_frequencies.keys() {
                *document_frequencies.entry(term.clone()).or_insert(0) += 1;
            }
            chunks.push(IndexedChunk {
                chunk_id: row.chunk_id,
                term_frequencies,
                length: tokens.len(),
            });
        }

        let average_length = if chunks.is_empty() {
            0.0
        } else {
            total_length as f32 / chunks.len() as f32
        };

        Self {
            params,
            chunks,
            document_frequencies,
            average_length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.chunks.len() as f32;
        let df = self.document_frequencies.get(term).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Raw BM25 scores for every chunk matching at least one query term.
    pub fn scores(&self, query: &str) -> HashMap<ChunkId, f32> {
        let query_terms = tokenize(query);
        let mut scores: HashMap<ChunkId, f32> = HashMap::new();
        if query_terms.is_empty() || self.chunks.is_empty() {
            return scores;
        }

        let Bm25Params { k1, b } = self.params;
        for chunk in &self.chunks {
            let mut score = 0.0f32;
            for term in &query_terms {
                let tf = chunk.term_frequencies.get(term).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    continue;
                }
                let length_norm = 1.0 - b + b * chunk.length as f32 / self.average_length.max(1.0);
                score += self.idf(term) * tf * (k1 + 1.0) / (tf + k1 * length_norm);
            }
            if score > 0.0 {
                scores.insert(chunk.chunk_id, score);
            }
        }
        scores
    }

    /// BM25 scores scaled into [0, 1] by the best match, for blending with
    /// cosine similarities.
    pub fn normalized_scores(&self, query: &str) -> HashMap<ChunkId, f32> {
        let mut scores = self.scores(query);
        let max = scores.values().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            for value in scores.values_mut() {
                *value /= max;
            }
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use qanun_core::types::{ArticleId, ChunkMetadata, DocumentId};

    fn chunk(text: &str) -> ChunkRow {
        let document_id = DocumentId::new();
        ChunkRow {
            chunk_id: ChunkId::new(),
            document_id,
            article_id: ArticleId::new(),
            chunk_index: 0,
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            metadata: ChunkMetadata {
                document_id,
                article_order_index: 1,
                chunk_index: 0,
                article_number: None,
                chapter_index: None,
                section_index: None,
            },
        }
    }

    #[test]
    fn test_matching_terms_score_higher() {
        let rows = vec![
            chunk("فسخ عقد العمل من قبل صاحب العمل"),
            chunk("احكام الاجازات السنوية المدفوعة الاجر"),
        ];
        let index = Bm25Index::build(&rows, Bm25Params::default());
        let scores = index.scores("فسخ العقد");

        let hit = scores.get(&rows[0].chunk_id).copied().unwrap_or(0.0);
        let miss = scores.get(&rows[1].chunk_id).copied().unwrap_or(0.0);
        assert!(hit > miss);
    }

    #[test]
    fn test_scores_are_normalization_insensitive() {
        let rows = vec![chunk("المَادَّة الأولى: فسخ العقد")];
        let index = Bm25Index::build(&rows, Bm25Params::default());
        // Query spelled without diacritics and with plain alef.
        let scores = index.scores("الماده الاولي");
        assert!(scores.contains_key(&rows[0].chunk_id));
    }

    #[test]
    fn test_normalized_scores_bounded() {
        let rows = vec![
            chunk("فسخ عقد العمل"),
            chunk("فسخ فسخ فسخ عقد عقد العمل العمل"),
        ];
        let index = Bm25Index::build(&rows, Bm25Params::default());
        let scores = index.normalized_scores("فسخ العمل");
        assert!(!scores.is_empty());
        for score in scores.values() {
            assert!((0.0..=1.0).contains(score));
        }
        assert!(scores.values().any(|s| (*s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_empty_query_and_empty_corpus() {
        let index = Bm25Index::build(&[], Bm25Params::default());
        assert!(index.is_empty());
        assert!(index.scores("فسخ").is_empty());

        let rows = vec![chunk("نص")];
        let index = Bm25Index::build(&rows, Bm25Params::default());
        assert!(index.scores("").is_empty());
    }
}
