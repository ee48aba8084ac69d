use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::feedback::{FeedbackOutcome, FeedbackStore};
use crate::fusion;
use crate::generation::{Generation, GenerationStore, RawDoc, RebuildSummary};
use crate::tokenizer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Closed set of ranking strategies. Invalid strategy names fail at the
/// string boundary, not deep inside a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    TfIdf,
    Bm25,
    Hybrid,
    Ensemble,
}

impl Engine {
    /// Strategies that rank directly; `Ensemble` composes these.
    pub const CONCRETE: [Engine; 3] = [Engine::TfIdf, Engine::Bm25, Engine::Hybrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::TfIdf => "tfidf",
            Engine::Bm25 => "bm25",
            Engine::Hybrid => "hybrid",
            Engine::Ensemble => "ensemble",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tfidf" => Ok(Engine::TfIdf),
            "bm25" => Ok(Engine::Bm25),
            "hybrid" => Ok(Engine::Hybrid),
            "ensemble" => Ok(Engine::Ensemble),
            other => Err(EngineError::Config(format!(
                "unknown engine {other:?} (expected tfidf, bm25, hybrid, or ensemble)"
            ))),
        }
    }
}

/// Where a match came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    /// Pattern-cache fast path; full ranking was skipped.
    Pattern,
    /// Full ranking over the current generation.
    Ranked,
    /// No vocabulary overlap; best-effort lowest-id document.
    Fallback,
}

/// A single answer: the chosen document and a calibrated confidence in
/// [0, 100].
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub doc_id: String,
    pub confidence: f64,
    pub engine: Engine,
    pub source: MatchSource,
}

/// Maps an unbounded BM25 score into [0, 100). The curve saturates the
/// same way the BM25 term-frequency component does, with k1 + 1 as the
/// half-way point.
fn bm25_confidence(score: f32) -> f64 {
    let s = f64::from(score);
    100.0 * s / (s + 2.5)
}

/// The engine facade: owns the current generation, the feedback store, and
/// the configuration. Queries are read-only against an immutable
/// generation, so any number run concurrently; feedback writes serialize
/// per key inside the store.
pub struct Matcher {
    generations: GenerationStore,
    feedback: FeedbackStore,
    config: EngineConfig,
}

impl Matcher {
    pub fn new(config: EngineConfig, feedback: FeedbackStore) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            generations: GenerationStore::new(),
            feedback,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn feedback(&self) -> &FeedbackStore {
        &self.feedback
    }

    pub fn current_generation(&self) -> Option<Arc<Generation>> {
        self.generations.current()
    }

    /// Swap in a generation loaded from a snapshot.
    pub fn install_generation(&self, generation: Generation) {
        self.generations.install(generation);
    }

    /// Rebuild the index from a corpus snapshot and atomically swap it in.
    /// In-flight queries finish against the old generation; failure leaves
    /// it serving.
    pub fn rebuild(&self, corpus: &[RawDoc]) -> Result<RebuildSummary, EngineError> {
        self.generations.rebuild(corpus, self.config.bm25)
    }

    /// Match a query to one document. The pattern cache is consulted
    /// first; on a miss the requested strategy ranks the current
    /// generation and feedback history calibrates the confidence. The
    /// prediction is recorded either way.
    pub fn search(&self, query: &str, engine: Engine) -> Result<Match, EngineError> {
        let started = Instant::now();
        let generation = self.generations.current().ok_or(EngineError::EmptyCorpus)?;

        if let Some(hit) = self.feedback.cached_answer(query, &self.config.pattern)? {
            self.note_prediction(query, &hit.doc_id, hit.confidence, engine)?;
            debug!(
                elapsed = ?started.elapsed(),
                doc = hit.doc_id.as_str(),
                confidence = hit.confidence,
                "pattern cache hit"
            );
            return Ok(Match {
                doc_id: hit.doc_id,
                confidence: hit.confidence,
                engine,
                source: MatchSource::Pattern,
            });
        }

        let (doc_id, raw, source) = self.ranked(&generation, query, engine)?;
        let confidence = match source {
            MatchSource::Fallback => 0.0,
            _ => self
                .feedback
                .adjust_confidence(query, &doc_id, raw, &self.config.pattern)?,
        };
        self.note_prediction(query, &doc_id, raw, engine)?;
        debug!(
            elapsed = ?started.elapsed(),
            doc = doc_id.as_str(),
            engine = engine.as_str(),
            raw,
            confidence,
            "full ranking"
        );
        Ok(Match {
            doc_id,
            confidence,
            engine,
            source,
        })
    }

    /// One match per concrete strategy, ranked by UCB engine weight ×
    /// adjusted confidence. Every strategy's prediction is recorded.
    pub fn search_multi(&self, query: &str) -> Result<Vec<Match>, EngineError> {
        let generation = self.generations.current().ok_or(EngineError::EmptyCorpus)?;
        let mut ranked: Vec<(f64, Match)> = Vec::with_capacity(Engine::CONCRETE.len());
        for engine in Engine::CONCRETE {
            let (doc_id, raw, source) = self.ranked(&generation, query, engine)?;
            let confidence = match source {
                MatchSource::Fallback => 0.0,
                _ => self
                    .feedback
                    .adjust_confidence(query, &doc_id, raw, &self.config.pattern)?,
            };
            self.note_prediction(query, &doc_id, raw, engine)?;
            let weight = self.feedback.engine_weight(engine)?;
            ranked.push((
                weight * confidence,
                Match {
                    doc_id,
                    confidence,
                    engine,
                    source,
                },
            ));
        }
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.doc_id.cmp(&b.1.doc_id))
        });
        Ok(ranked.into_iter().map(|(_, m)| m).collect())
    }

    /// Record the correct document for an earlier prediction and return
    /// the post-update rates.
    pub fn submit_feedback(
        &self,
        query: &str,
        predicted: &str,
        actual: &str,
        engine: Engine,
    ) -> Result<FeedbackOutcome, EngineError> {
        self.feedback.record_feedback(query, predicted, actual, engine)
    }

    /// Record prediction bookkeeping without failing the query: a lost
    /// compare-and-swap race here is transient and only conflicts on
    /// `submit_feedback` surface to callers. Other store errors propagate.
    fn note_prediction(
        &self,
        query: &str,
        doc: &str,
        raw: f64,
        engine: Engine,
    ) -> Result<(), EngineError> {
        match self.feedback.record_prediction(query, doc, raw, engine) {
            Err(EngineError::FeedbackConflict { key, attempts }) => {
                warn!(
                    key = key.as_str(),
                    attempts, "prediction bookkeeping lost its compare-and-swap races"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Run one strategy over a generation. No side effects; the returned
    /// confidence is the raw (pre-calibration) score in [0, 100].
    fn ranked(
        &self,
        generation: &Generation,
        query: &str,
        engine: Engine,
    ) -> Result<(String, f64, MatchSource), EngineError> {
        let tokens = tokenizer::ngrams(query);
        let top_k = self.config.top_k;
        let winner = match engine {
            Engine::TfIdf => generation
                .rank_tfidf(&tokens, top_k)
                .first()
                .map(|c| (c.doc, 100.0 * f64::from(c.score))),
            Engine::Bm25 => generation
                .rank_bm25(&tokens, top_k)
                .first()
                .map(|c| (c.doc, bm25_confidence(c.score))),
            Engine::Hybrid => {
                let fused = fusion::fuse(
                    &generation.rank_tfidf(&tokens, top_k),
                    &generation.rank_bm25(&tokens, top_k),
                    self.config.fusion,
                );
                fused.first().map(|f| (f.doc, 100.0 * f64::from(f.combined)))
            }
            Engine::Ensemble => return self.ensemble(generation, query),
        };
        Ok(match winner {
            Some((doc, raw)) => (
                generation.doc_id(doc).to_string(),
                raw.min(100.0),
                MatchSource::Ranked,
            ),
            None => (generation.first_doc().to_string(), 0.0, MatchSource::Fallback),
        })
    }

    /// Best concrete-strategy pick, weighted by each engine's UCB weight.
    fn ensemble(
        &self,
        generation: &Generation,
        query: &str,
    ) -> Result<(String, f64, MatchSource), EngineError> {
        let mut best: Option<(String, f64, f64)> = None;
        for engine in Engine::CONCRETE {
            let (doc_id, raw, source) = self.ranked(generation, query, engine)?;
            if source == MatchSource::Fallback {
                continue;
            }
            let weighted = raw * self.feedback.engine_weight(engine)?;
            let replace = match &best {
                Some((current_doc, _, current_weighted)) => {
                    weighted > *current_weighted
                        || (weighted == *current_weighted && doc_id < *current_doc)
                }
                None => true,
            };
            if replace {
                best = Some((doc_id, raw, weighted));
            }
        }
        Ok(match best {
            Some((doc_id, raw, _)) => (doc_id, raw, MatchSource::Ranked),
            None => (generation.first_doc().to_string(), 0.0, MatchSource::Fallback),
        })
    }
}
