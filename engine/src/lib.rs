//! Hybrid retrieval and adaptive feedback engine.
//!
//! Matches a free-text error message to the most relevant document in a
//! small corpus using two independent lexical signals — cosine similarity
//! over L2-normalized TF-IDF vectors and Okapi BM25 — fused with min-max
//! normalization and configurable weights. A persistent feedback store
//! recalibrates confidence from user corrections over time and maintains a
//! pattern cache that short-circuits ranking for near-duplicate queries.
//!
//! The searchable index is an immutable, versioned [`generation::Generation`]
//! behind an atomically swapped handle: rebuilds never disturb in-flight
//! queries, and a half-built index is unobservable.

pub mod bm25;
pub mod config;
pub mod error;
pub mod feedback;
pub mod fusion;
pub mod generation;
pub mod matcher;
pub mod persist;
pub mod tfidf;
pub mod tokenizer;
pub mod vocab;

pub use config::EngineConfig;
pub use error::EngineError;
pub use feedback::{FeedbackOutcome, FeedbackStore};
pub use generation::{RawDoc, RebuildSummary};
pub use matcher::{Engine, Match, MatchSource, Matcher};
