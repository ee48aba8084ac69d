use crate::bm25::Bm25Params;
use crate::error::EngineError;
use crate::fusion::FusionWeights;
use serde::{Deserialize, Serialize};

/// Pattern-cache fast-path thresholds. All three must hold before a cached
/// answer bypasses full ranking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Minimum Jaccard similarity between the query signature and a stored
    /// pattern signature.
    pub min_jaccard: f64,
    /// Minimum confirmed-correct count for the pattern's best document.
    pub min_confirmations: u64,
    /// Minimum derived confidence (0-100) of the stored pattern.
    pub min_confidence: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_jaccard: 0.8,
            min_confirmations: 2,
            min_confidence: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// EMA smoothing factor for per-pair success rates.
    pub ema_alpha: f64,
    /// Bounded compare-and-swap retries before a conflict surfaces.
    pub max_cas_retries: u32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.1,
            max_cas_retries: 5,
        }
    }
}

/// Engine configuration, validated once at `Matcher` construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fusion: FusionWeights,
    pub bm25: Bm25Params,
    /// Candidates retained per ranking signal before fusion.
    pub top_k: usize,
    pub pattern: PatternConfig,
    pub feedback: FeedbackConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fusion: FusionWeights::default(),
            bm25: Bm25Params::default(),
            top_k: 10,
            pattern: PatternConfig::default(),
            feedback: FeedbackConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.fusion.validate()?;
        if self.top_k == 0 {
            return Err(EngineError::Config("top_k must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.feedback.ema_alpha) {
            return Err(EngineError::Config(format!(
                "ema_alpha must be within [0, 1] (got {})",
                self.feedback.ema_alpha
            )));
        }
        if self.feedback.max_cas_retries == 0 {
            return Err(EngineError::Config("max_cas_retries must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.pattern.min_jaccard) {
            return Err(EngineError::Config(format!(
                "min_jaccard must be within [0, 1] (got {})",
                self.pattern.min_jaccard
            )));
        }
        Ok(())
    }
}
