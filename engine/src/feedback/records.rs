use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome history for one (normalized query, document) pair.
///
/// `success_rate` is an exponential moving average of correctness. The
/// first observed outcome seats the average directly; later observations
/// blend in with the configured alpha. A pair that has never been observed
/// rests at the neutral 0.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDocStat {
    pub success_count: u64,
    pub total_count: u64,
    pub success_rate: f64,
}

impl Default for QueryDocStat {
    fn default() -> Self {
        Self {
            success_count: 0,
            total_count: 0,
            success_rate: 0.5,
        }
    }
}

impl QueryDocStat {
    pub fn observe(&mut self, correct: bool, alpha: f64) {
        let outcome = if correct { 1.0 } else { 0.0 };
        self.success_rate = if self.total_count == 0 {
            outcome
        } else {
            alpha * outcome + (1.0 - alpha) * self.success_rate
        };
        self.total_count += 1;
        if correct {
            self.success_count += 1;
        }
    }
}

/// Per-document accuracy over confirmed outcomes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStat {
    pub times_shown: u64,
    pub times_correct: u64,
}

impl DocumentStat {
    pub fn observe(&mut self, correct: bool) {
        self.times_shown += 1;
        if correct {
            self.times_correct += 1;
        }
    }

    /// Neutral 0.5 before any data.
    pub fn accuracy(&self) -> f64 {
        if self.times_shown == 0 {
            0.5
        } else {
            self.times_correct as f64 / self.times_shown as f64
        }
    }
}

/// Per-engine outcome counters. `total` counts predictions served;
/// `correct`/`incorrect` count confirmed outcomes. The weight is derived
/// on read, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStat {
    pub correct: u64,
    pub incorrect: u64,
    pub total: u64,
}

impl EngineStat {
    /// Neutral 0.5 before any confirmed outcome.
    pub fn accuracy(&self) -> f64 {
        let confirmed = self.correct + self.incorrect;
        if confirmed == 0 {
            0.5
        } else {
            self.correct as f64 / confirmed as f64
        }
    }

    /// UCB1-style weight: observed accuracy plus an exploration bonus that
    /// shrinks as the engine accumulates predictions, so rarely-used
    /// engines are never permanently starved in an ensemble.
    pub fn weight(&self) -> f64 {
        let t = self.total.max(1) as f64;
        self.accuracy() + (2.0 * t.ln() / t).sqrt()
    }
}

/// Confirmed-correct counts per document for one query signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryPattern {
    pub confirmations: HashMap<String, u64>,
}

impl QueryPattern {
    pub fn confirm(&mut self, doc: &str) {
        *self.confirmations.entry(doc.to_string()).or_insert(0) += 1;
    }

    pub fn total(&self) -> u64 {
        self.confirmations.values().sum()
    }

    /// Most-confirmed document; ties resolve to the smaller id.
    pub fn best(&self) -> Option<(&str, u64)> {
        self.confirmations
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(doc, count)| (doc.as_str(), *count))
    }

    /// Share of confirmations agreeing on the best document, as a 0-100
    /// confidence.
    pub fn confidence(&self) -> f64 {
        match self.best() {
            Some((_, count)) if self.total() > 0 => 100.0 * count as f64 / self.total() as f64,
            _ => 0.0,
        }
    }
}
