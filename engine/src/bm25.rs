use crate::vocab::Vocabulary;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Okapi BM25 parameters: `k1` controls term saturation, `b` controls
/// document-length normalization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// BM25 statistics for one generation: per-term frequency postings, per-
/// document token counts, and the average document length. Immutable once
/// built. Document frequencies come from the shared vocabulary; the idf
/// here is the BM25 variant, intentionally independent of the TF-IDF idf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    params: Bm25Params,
    /// term index -> (doc, raw term frequency), sorted by doc
    postings: HashMap<u32, Vec<(u32, u32)>>,
    doc_len: Vec<u32>,
    avgdl: f32,
    num_docs: u32,
}

impl Bm25Index {
    pub fn build(docs: &[Vec<String>], vocab: &Vocabulary, params: Bm25Params) -> Self {
        let mut postings: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
        let mut doc_len = Vec::with_capacity(docs.len());
        for (doc, tokens) in docs.iter().enumerate() {
            doc_len.push(tokens.len() as u32);
            let mut counts: HashMap<u32, u32> = HashMap::new();
            for token in tokens {
                if let Some(entry) = vocab.get(token) {
                    *counts.entry(entry.index).or_insert(0) += 1;
                }
            }
            for (term, tf) in counts {
                postings.entry(term).or_default().push((doc as u32, tf));
            }
        }
        for list in postings.values_mut() {
            list.sort_unstable_by_key(|&(doc, _)| doc);
        }
        let total: u64 = doc_len.iter().map(|&l| u64::from(l)).sum();
        let avgdl = if doc_len.is_empty() {
            0.0
        } else {
            total as f32 / doc_len.len() as f32
        };
        Self {
            params,
            postings,
            doc_len,
            avgdl,
            num_docs: docs.len() as u32,
        }
    }

    fn idf(&self, df: u32) -> f32 {
        let n = self.num_docs as f32;
        ((n - df as f32 + 0.5) / (df as f32 + 0.5) + 1.0).ln()
    }

    /// Accumulate Okapi scores for every document matching at least one
    /// query term. Query terms are treated as a set. Scores are unbounded
    /// and non-negative; absent documents simply don't appear.
    pub fn score(&self, query_tokens: &[String], vocab: &Vocabulary) -> HashMap<u32, f32> {
        let Bm25Params { k1, b } = self.params;
        let mut scores: HashMap<u32, f32> = HashMap::new();
        let mut seen: HashSet<u32> = HashSet::new();
        for token in query_tokens {
            let Some(entry) = vocab.get(token) else {
                continue;
            };
            if !seen.insert(entry.index) {
                continue;
            }
            let Some(list) = self.postings.get(&entry.index) else {
                continue;
            };
            let idf = self.idf(entry.df);
            for &(doc, tf) in list {
                let tf = tf as f32;
                let dl = self.doc_len[doc as usize] as f32;
                let denom = tf + k1 * (1.0 - b + b * dl / self.avgdl);
                *scores.entry(doc).or_insert(0.0) += idf * (tf * (k1 + 1.0)) / denom;
            }
        }
        scores
    }
}
