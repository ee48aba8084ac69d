use thiserror::Error;

/// Engine error taxonomy.
///
/// Ranking anomalies (a query with no vocabulary overlap, a document that
/// tokenizes to nothing) are not errors — they degrade to a low-confidence
/// result, because "no good match" is a valid outcome. Errors here are
/// corpus-level or persistence-level: silently dropping a feedback write
/// would corrupt future learning, so those surface loudly.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A rebuild saw zero usable documents. Any previously swapped-in
    /// generation keeps serving unchanged.
    #[error("corpus contains no usable documents")]
    EmptyCorpus,

    #[error("index rebuild already in progress")]
    RebuildInProgress,

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A feedback read-modify-write lost every compare-and-swap attempt.
    #[error("feedback update for {key:?} lost {attempts} compare-and-swap races")]
    FeedbackConflict { key: String, attempts: u32 },

    #[error("storage error: {0}")]
    Store(#[from] sled::Error),

    #[error("snapshot codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("meta file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
