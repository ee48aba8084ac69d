use crate::vocab::Vocabulary;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sparse vector: parallel arrays of term indices (ascending) and weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseVec {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVec {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product by merge join over the sorted index arrays.
    pub fn dot(&self, other: &SparseVec) -> f32 {
        let mut sum = 0.0f32;
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        sum
    }

    pub fn l2_norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    fn l2_normalize(&mut self) {
        let norm = self.l2_norm();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }
}

/// TF-IDF vectorization: `tf = count / |T|`, `idf = ln(N / df) + 1`, final
/// weights L2-normalized. Terms unseen in the vocabulary are dropped, so
/// query vectors never grow the vocabulary. An input with no vocabulary
/// overlap yields the empty vector, not an error.
pub fn vectorize(tokens: &[String], vocab: &Vocabulary) -> SparseVec {
    if tokens.is_empty() {
        return SparseVec::default();
    }
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let total = tokens.len() as f32;
    let n = vocab.num_docs().max(1) as f32;
    let mut weighted: Vec<(u32, f32)> = Vec::with_capacity(counts.len());
    for (term, count) in counts {
        let Some(entry) = vocab.get(term) else {
            continue;
        };
        let tf = count as f32 / total;
        let idf = (n / entry.df.max(1) as f32).ln() + 1.0;
        weighted.push((entry.index, tf * idf));
    }
    weighted.sort_unstable_by_key(|&(index, _)| index);

    let mut vec = SparseVec {
        indices: weighted.iter().map(|&(i, _)| i).collect(),
        values: weighted.iter().map(|&(_, w)| w).collect(),
    };
    vec.l2_normalize();
    vec
}

/// Cosine similarity of two L2-normalized vectors — the dot product,
/// which for non-negative weights lands in [0, 1].
pub fn cosine(a: &SparseVec, b: &SparseVec) -> f32 {
    a.dot(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn document_vectors_are_unit_length() {
        let docs = vec![toks(&["alpha", "beta", "beta"]), toks(&["beta", "gamma"])];
        let vocab = Vocabulary::build(&docs);
        for doc in &docs {
            let v = vectorize(doc, &vocab);
            assert!((v.l2_norm() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn unseen_terms_are_dropped() {
        let docs = vec![toks(&["alpha"])];
        let vocab = Vocabulary::build(&docs);
        let q = vectorize(&toks(&["alpha", "zzz"]), &vocab);
        assert_eq!(q.indices.len(), 1);
    }

    #[test]
    fn no_overlap_yields_zero_similarity() {
        let docs = vec![toks(&["alpha"]), toks(&["beta"])];
        let vocab = Vocabulary::build(&docs);
        let q = vectorize(&toks(&["gamma"]), &vocab);
        assert!(q.is_empty());
        let d = vectorize(&docs[0], &vocab);
        assert_eq!(cosine(&q, &d), 0.0);
    }

    #[test]
    fn cosine_stays_in_unit_interval() {
        let docs = vec![toks(&["alpha", "beta"]), toks(&["alpha", "gamma"])];
        let vocab = Vocabulary::build(&docs);
        let a = vectorize(&docs[0], &vocab);
        let b = vectorize(&docs[1], &vocab);
        let sim = cosine(&a, &b);
        assert!(sim > 0.0 && sim <= 1.0 + f32::EPSILON);
    }
}
