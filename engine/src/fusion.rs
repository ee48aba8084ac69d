use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Relative weight of each ranking signal in the combined score. Must be
/// non-negative and sum to 1.0 — enforced at construction, not at use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub tfidf: f32,
    pub bm25: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { tfidf: 0.4, bm25: 0.6 }
    }
}

impl FusionWeights {
    pub fn new(tfidf: f32, bm25: f32) -> Result<Self, EngineError> {
        let weights = Self { tfidf, bm25 };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.tfidf < 0.0 || self.bm25 < 0.0 || (self.tfidf + self.bm25 - 1.0).abs() > 1e-6 {
            return Err(EngineError::Config(format!(
                "fusion weights must be non-negative and sum to 1.0 (got {} + {})",
                self.tfidf, self.bm25
            )));
        }
        Ok(())
    }
}

/// One ranked candidate from a single signal. `doc` is the position of the
/// document inside its generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub doc: u32,
    pub score: f32,
}

/// A candidate after min-max normalization and weighted combination.
#[derive(Debug, Clone, Copy)]
pub struct Fused {
    pub doc: u32,
    pub combined: f32,
    pub tfidf: f32,
    pub bm25: f32,
}

/// Min-max normalize one signal's scores over its own candidate list.
/// A degenerate list (single candidate, or all scores equal) normalizes
/// to 1.0 — never a division by zero.
fn normalize(list: &[Candidate]) -> HashMap<u32, f32> {
    if list.is_empty() {
        return HashMap::new();
    }
    let min = list.iter().map(|c| c.score).fold(f32::INFINITY, f32::min);
    let max = list.iter().map(|c| c.score).fold(f32::NEG_INFINITY, f32::max);
    let span = max - min;
    list.iter()
        .map(|c| {
            let norm = if span <= f32::EPSILON { 1.0 } else { (c.score - min) / span };
            (c.doc, norm)
        })
        .collect()
}

/// Fuse two independently ranked lists: union the candidates, min-max
/// normalize each signal (a candidate absent from one list gets 0 for that
/// signal), and combine with the configured weights. The result is sorted
/// by combined score descending, ties broken by ascending document.
pub fn fuse(tfidf: &[Candidate], bm25: &[Candidate], weights: FusionWeights) -> Vec<Fused> {
    let norm_tfidf = normalize(tfidf);
    let norm_bm25 = normalize(bm25);
    let docs: BTreeSet<u32> = norm_tfidf.keys().chain(norm_bm25.keys()).copied().collect();
    let mut out: Vec<Fused> = docs
        .into_iter()
        .map(|doc| {
            let t = norm_tfidf.get(&doc).copied().unwrap_or(0.0);
            let b = norm_bm25.get(&doc).copied().unwrap_or(0.0);
            Fused {
                doc,
                combined: weights.tfidf * t + weights.bm25 * b,
                tfidf: t,
                bm25: b,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        b.combined
            .partial_cmp(&a.combined)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.doc.cmp(&b.doc))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(doc: u32, score: f32) -> Candidate {
        Candidate { doc, score }
    }

    #[test]
    fn rejects_weights_that_do_not_sum_to_one() {
        assert!(FusionWeights::new(0.7, 0.7).is_err());
        assert!(FusionWeights::new(-0.2, 1.2).is_err());
        assert!(FusionWeights::new(0.4, 0.6).is_ok());
    }

    #[test]
    fn combined_scores_stay_in_unit_interval() {
        let fused = fuse(
            &[c(0, 0.9), c(1, 0.2)],
            &[c(1, 7.0), c(2, 3.0)],
            FusionWeights::default(),
        );
        assert_eq!(fused.len(), 3);
        for f in &fused {
            assert!((0.0..=1.0).contains(&f.combined));
        }
    }

    #[test]
    fn absent_candidate_gets_zero_for_that_signal() {
        let fused = fuse(&[c(0, 0.5)], &[c(1, 4.0)], FusionWeights::default());
        let doc0 = fused.iter().find(|f| f.doc == 0).unwrap();
        assert_eq!(doc0.bm25, 0.0);
        assert_eq!(doc0.tfidf, 1.0);
    }

    #[test]
    fn single_candidate_normalizes_to_one() {
        let fused = fuse(&[c(3, 0.01)], &[c(3, 0.01)], FusionWeights::default());
        assert_eq!(fused.len(), 1);
        assert!((fused[0].combined - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ties_resolve_to_smaller_doc() {
        let fused = fuse(
            &[c(5, 0.5), c(2, 0.5)],
            &[c(5, 1.0), c(2, 1.0)],
            FusionWeights::default(),
        );
        assert_eq!(fused[0].doc, 2);
    }

    #[test]
    fn winner_has_maximum_combined_score() {
        let fused = fuse(
            &[c(0, 0.8), c(1, 0.4), c(2, 0.1)],
            &[c(0, 6.0), c(2, 2.0)],
            FusionWeights::default(),
        );
        let max = fused.iter().map(|f| f.combined).fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(fused[0].combined, max);
    }
}
