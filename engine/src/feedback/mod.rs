pub mod patterns;
pub mod records;

pub use records::{DocumentStat, EngineStat, QueryDocStat, QueryPattern};

use crate::config::{FeedbackConfig, PatternConfig};
use crate::error::EngineError;
use crate::matcher::Engine;
use crate::tokenizer;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use std::collections::BTreeSet;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Separator between the normalized query and the document id in pair keys.
const PAIR_SEP: char = '\u{1f}';

/// Everything the engine learns from corrections, persisted in sled.
///
/// Each record type lives in its own tree. Every mutation goes through a
/// bounded compare-and-swap loop, so a read-modify-write on one key never
/// interleaves with another write to that key, while unrelated keys
/// proceed independently. Records outlive index generations: document ids
/// are path-stable, so a rebuild never invalidates learned history.
pub struct FeedbackStore {
    query_doc: Tree,
    doc_stats: Tree,
    engine_stats: Tree,
    patterns: Tree,
    config: FeedbackConfig,
    _db: Db,
}

/// Post-update rates from `record_feedback`, returned so callers can
/// explain why future confidence will move.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackOutcome {
    pub is_correct: bool,
    pub success_rate: f64,
    pub document_accuracy: f64,
    pub engine_accuracy: f64,
}

/// A pattern-cache lookup result.
#[derive(Debug, Clone)]
pub struct PatternHit {
    pub doc_id: String,
    pub confidence: f64,
    pub jaccard: f64,
    pub confirmations: u64,
}

impl FeedbackStore {
    pub fn open(path: impl AsRef<Path>, config: FeedbackConfig) -> Result<Self, EngineError> {
        Self::from_db(sled::open(path)?, config)
    }

    /// In-memory store for tests and ephemeral runs.
    pub fn temporary(config: FeedbackConfig) -> Result<Self, EngineError> {
        Self::from_db(sled::Config::new().temporary(true).open()?, config)
    }

    fn from_db(db: Db, config: FeedbackConfig) -> Result<Self, EngineError> {
        Ok(Self {
            query_doc: db.open_tree("query_doc")?,
            doc_stats: db.open_tree("doc_stats")?,
            engine_stats: db.open_tree("engine_stats")?,
            patterns: db.open_tree("patterns")?,
            config,
            _db: db,
        })
    }

    /// Bookkeeping for a served prediction. Ground truth is unknown here,
    /// so only the pair's existence and the engine's prediction count move;
    /// this never blocks on correctness and never fails validation.
    pub fn record_prediction(
        &self,
        query: &str,
        doc: &str,
        raw_confidence: f64,
        engine: Engine,
    ) -> Result<(), EngineError> {
        let norm = tokenizer::normalize(query);
        self.update::<QueryDocStat, _>(&self.query_doc, pair_key(&norm, doc).as_bytes(), |_| {})?;
        self.update::<EngineStat, _>(&self.engine_stats, engine.as_str().as_bytes(), |stat| {
            stat.total += 1;
        })?;
        debug!(
            query = norm.as_str(),
            doc,
            raw_confidence,
            engine = engine.as_str(),
            "prediction recorded"
        );
        Ok(())
    }

    /// Apply ground truth for one prediction. Atomically (per key) updates
    /// the pair's EMA, both documents' stats when the prediction missed,
    /// the engine counters, and the pattern cache, then returns the
    /// post-update rates.
    pub fn record_feedback(
        &self,
        query: &str,
        predicted: &str,
        actual: &str,
        engine: Engine,
    ) -> Result<FeedbackOutcome, EngineError> {
        let norm = tokenizer::normalize(query);
        let is_correct = predicted == actual;
        let alpha = self.config.ema_alpha;

        let pair = self.update::<QueryDocStat, _>(
            &self.query_doc,
            pair_key(&norm, predicted).as_bytes(),
            |stat| stat.observe(is_correct, alpha),
        )?;
        if !is_correct {
            // The document that should have been shown gets its own
            // positive entry for this query.
            self.update::<QueryDocStat, _>(
                &self.query_doc,
                pair_key(&norm, actual).as_bytes(),
                |stat| stat.observe(true, alpha),
            )?;
        }
        let doc_stat = self.update::<DocumentStat, _>(&self.doc_stats, predicted.as_bytes(), |stat| {
            stat.observe(is_correct)
        })?;
        let engine_stat =
            self.update::<EngineStat, _>(&self.engine_stats, engine.as_str().as_bytes(), |stat| {
                if is_correct {
                    stat.correct += 1;
                } else {
                    stat.incorrect += 1;
                }
            })?;

        // Every correction names the right document for this query shape.
        let signature = tokenizer::signature(query);
        if !signature.is_empty() {
            self.update::<QueryPattern, _>(
                &self.patterns,
                patterns::signature_key(&signature).as_bytes(),
                |pattern| pattern.confirm(actual),
            )?;
        }

        Ok(FeedbackOutcome {
            is_correct,
            success_rate: pair.success_rate,
            document_accuracy: doc_stat.accuracy(),
            engine_accuracy: engine_stat.accuracy(),
        })
    }

    /// Fold feedback history into a raw fused confidence, clamped to
    /// [0, 100]. With no history every term is neutral and the raw value
    /// passes through unchanged.
    pub fn adjust_confidence(
        &self,
        query: &str,
        doc: &str,
        raw_confidence: f64,
        pattern_config: &PatternConfig,
    ) -> Result<f64, EngineError> {
        let norm = tokenizer::normalize(query);
        let pair: QueryDocStat = self.read(&self.query_doc, pair_key(&norm, doc).as_bytes())?;
        let doc_stat: DocumentStat = self.read(&self.doc_stats, doc.as_bytes())?;

        // Positive pair history nudges gently; negative history pulls
        // twice as hard.
        let delta = pair.success_rate - 0.5;
        let history = if delta >= 0.0 { delta * 5.0 } else { delta * 10.0 };
        let document = (doc_stat.accuracy() - 0.5) * 5.0;

        let signature = tokenizer::signature(query);
        let similar = match self.nearest_pattern(&signature, pattern_config.min_jaccard)? {
            Some(hit) if hit.doc_id == doc => hit.jaccard * 10.0,
            _ => 0.0,
        };

        Ok((raw_confidence + history + document + similar).clamp(0.0, 100.0))
    }

    /// Derived UCB1 weight for an engine.
    pub fn engine_weight(&self, engine: Engine) -> Result<f64, EngineError> {
        Ok(self.engine_stat(engine)?.weight())
    }

    /// Fast-path lookup: a confident, well-confirmed pattern close enough
    /// to the query bypasses ranking entirely. A miss means "run the full
    /// pipeline", never an error.
    pub fn cached_answer(
        &self,
        query: &str,
        config: &PatternConfig,
    ) -> Result<Option<PatternHit>, EngineError> {
        let signature = tokenizer::signature(query);
        match self.nearest_pattern(&signature, config.min_jaccard)? {
            Some(hit)
                if hit.confirmations >= config.min_confirmations
                    && hit.confidence >= config.min_confidence =>
            {
                Ok(Some(hit))
            }
            _ => Ok(None),
        }
    }

    /// Best stored pattern by Jaccard similarity against the signature,
    /// if any clears `min_jaccard`. Similarity ties prefer the smaller
    /// best-document id.
    pub fn nearest_pattern(
        &self,
        signature: &BTreeSet<String>,
        min_jaccard: f64,
    ) -> Result<Option<PatternHit>, EngineError> {
        if signature.is_empty() {
            return Ok(None);
        }
        let mut best: Option<PatternHit> = None;
        for item in self.patterns.iter() {
            let (key, value) = item?;
            let stored = patterns::parse_signature(&String::from_utf8_lossy(&key));
            let similarity = patterns::jaccard(signature, &stored);
            if similarity < min_jaccard {
                continue;
            }
            let pattern: QueryPattern = bincode::deserialize(&value)?;
            let Some((doc, confirmations)) = pattern.best() else {
                continue;
            };
            let replace = match &best {
                Some(current) => {
                    similarity > current.jaccard
                        || (similarity == current.jaccard && doc < current.doc_id.as_str())
                }
                None => true,
            };
            if replace {
                best = Some(PatternHit {
                    doc_id: doc.to_string(),
                    confidence: pattern.confidence(),
                    jaccard: similarity,
                    confirmations,
                });
            }
        }
        Ok(best)
    }

    pub fn query_doc_stat(&self, query: &str, doc: &str) -> Result<QueryDocStat, EngineError> {
        let norm = tokenizer::normalize(query);
        self.read(&self.query_doc, pair_key(&norm, doc).as_bytes())
    }

    pub fn document_stat(&self, doc: &str) -> Result<DocumentStat, EngineError> {
        self.read(&self.doc_stats, doc.as_bytes())
    }

    pub fn engine_stat(&self, engine: Engine) -> Result<EngineStat, EngineError> {
        self.read(&self.engine_stats, engine.as_str().as_bytes())
    }

    /// Bounded compare-and-swap read-modify-write for one key. Lost races
    /// back off exponentially; exhaustion surfaces as `FeedbackConflict`
    /// rather than a silent drop.
    fn update<T, F>(&self, tree: &Tree, key: &[u8], mut apply: F) -> Result<T, EngineError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnMut(&mut T),
    {
        for attempt in 0..self.config.max_cas_retries {
            let old = tree.get(key)?;
            let mut record: T = match &old {
                Some(bytes) => bincode::deserialize(bytes)?,
                None => T::default(),
            };
            apply(&mut record);
            let new = bincode::serialize(&record)?;
            match tree.compare_and_swap(key, old, Some(new))? {
                Ok(()) => return Ok(record),
                Err(_) => {
                    debug!(attempt, "feedback compare-and-swap raced, retrying");
                    thread::sleep(Duration::from_millis(1u64 << attempt));
                }
            }
        }
        Err(EngineError::FeedbackConflict {
            key: String::from_utf8_lossy(key).into_owned(),
            attempts: self.config.max_cas_retries,
        })
    }

    fn read<T>(&self, tree: &Tree, key: &[u8]) -> Result<T, EngineError>
    where
        T: DeserializeOwned + Default,
    {
        Ok(match tree.get(key)? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => T::default(),
        })
    }
}

fn pair_key(normalized_query: &str, doc: &str) -> String {
    format!("{normalized_query}{PAIR_SEP}{doc}")
}
