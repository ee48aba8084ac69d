use crate::bm25::{Bm25Index, Bm25Params};
use crate::error::EngineError;
use crate::fusion::Candidate;
use crate::tfidf::{self, SparseVec};
use crate::tokenizer;
use crate::vocab::Vocabulary;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::info;

/// A raw corpus document: stable path identifier plus its full text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDoc {
    pub id: String,
    pub text: String,
}

/// One immutable snapshot of the searchable index: vocabulary, normalized
/// TF-IDF document vectors, and BM25 statistics, versioned by `id`.
///
/// Never mutated after build. Readers hold an `Arc<Generation>` for the
/// duration of a query while rebuilds swap the current pointer underneath
/// them, so a half-built generation is unobservable by construction.
#[derive(Debug, Serialize, Deserialize)]
pub struct Generation {
    pub id: u64,
    pub vocab: Vocabulary,
    /// Sorted ascending; positions double as document handles.
    doc_ids: Vec<String>,
    /// Parallel to `doc_ids`, each L2-normalized.
    vectors: Vec<SparseVec>,
    bm25: Bm25Index,
}

impl Generation {
    /// Build from a full corpus snapshot. Documents that tokenize to
    /// nothing (empty text, or stopwords only) can never be ranked and are
    /// dropped from the snapshot; the second value counts them. A corpus
    /// with zero usable documents is an error.
    pub fn build(
        id: u64,
        corpus: &[RawDoc],
        params: Bm25Params,
    ) -> Result<(Self, usize), EngineError> {
        let mut pairs: Vec<(String, Vec<String>)> = corpus
            .iter()
            .map(|doc| (doc.id.clone(), tokenizer::ngrams(&doc.text)))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect();
        let skipped = corpus.len() - pairs.len();
        if pairs.is_empty() {
            return Err(EngineError::EmptyCorpus);
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let (doc_ids, token_lists): (Vec<String>, Vec<Vec<String>>) = pairs.into_iter().unzip();
        let vocab = Vocabulary::build(&token_lists);
        let vectors = token_lists
            .iter()
            .map(|tokens| tfidf::vectorize(tokens, &vocab))
            .collect();
        let bm25 = Bm25Index::build(&token_lists, &vocab, params);
        Ok((
            Self {
                id,
                vocab,
                doc_ids,
                vectors,
                bm25,
            },
            skipped,
        ))
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    pub fn doc_id(&self, doc: u32) -> &str {
        &self.doc_ids[doc as usize]
    }

    pub fn doc_ids(&self) -> &[String] {
        &self.doc_ids
    }

    /// Lexicographically first document — the best-effort answer for a
    /// query with no vocabulary overlap.
    pub fn first_doc(&self) -> &str {
        &self.doc_ids[0]
    }

    pub fn vector(&self, doc: u32) -> &SparseVec {
        &self.vectors[doc as usize]
    }

    /// Cosine ranking of a query against every document vector. Scores in
    /// [0, 1]; zero-score documents are not candidates. Ties break by
    /// ascending document, so results are reproducible.
    pub fn rank_tfidf(&self, query_tokens: &[String], top_k: usize) -> Vec<Candidate> {
        let query = tfidf::vectorize(query_tokens, &self.vocab);
        if query.is_empty() {
            return Vec::new();
        }
        let mut out: Vec<Candidate> = self
            .vectors
            .iter()
            .enumerate()
            .filter_map(|(doc, vector)| {
                let score = tfidf::cosine(&query, vector);
                (score > 0.0).then_some(Candidate {
                    doc: doc as u32,
                    score,
                })
            })
            .collect();
        sort_candidates(&mut out);
        out.truncate(top_k);
        out
    }

    /// Okapi BM25 ranking over the same token stream.
    pub fn rank_bm25(&self, query_tokens: &[String], top_k: usize) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = self
            .bm25
            .score(query_tokens, &self.vocab)
            .into_iter()
            .filter(|&(_, score)| score > 0.0)
            .map(|(doc, score)| Candidate { doc, score })
            .collect();
        sort_candidates(&mut out);
        out.truncate(top_k);
        out
    }
}

fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.doc.cmp(&b.doc))
    });
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildSummary {
    pub generation: u64,
    pub documents: usize,
    pub terms: usize,
    pub skipped_empty: usize,
}

/// Rebuild phases. Only one rebuild runs at a time; queries keep reading
/// the previous generation until the swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildPhase {
    Idle,
    Building,
    Swapping,
}

const PHASE_IDLE: u8 = 0;
const PHASE_BUILDING: u8 = 1;
const PHASE_SWAPPING: u8 = 2;

/// Holds the current generation behind an atomically swapped `Arc` and
/// runs the Idle -> Building -> Swapping -> Idle rebuild cycle.
///
/// The write lock is held only for the pointer swap itself; building
/// happens entirely outside it, so query-serving never stalls on a
/// rebuild. A failed build resets to Idle with the previous generation
/// still serving.
pub struct GenerationStore {
    current: RwLock<Option<Arc<Generation>>>,
    phase: AtomicU8,
    next_id: AtomicU64,
}

impl Default for GenerationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            phase: AtomicU8::new(PHASE_IDLE),
            next_id: AtomicU64::new(1),
        }
    }

    /// The generation currently serving queries, if any.
    pub fn current(&self) -> Option<Arc<Generation>> {
        self.current.read().clone()
    }

    pub fn phase(&self) -> RebuildPhase {
        match self.phase.load(AtomicOrdering::Acquire) {
            PHASE_BUILDING => RebuildPhase::Building,
            PHASE_SWAPPING => RebuildPhase::Swapping,
            _ => RebuildPhase::Idle,
        }
    }

    /// Swap in an externally built generation (e.g. loaded from a
    /// snapshot) and keep ids monotonic past it.
    pub fn install(&self, generation: Generation) {
        self.next_id
            .fetch_max(generation.id + 1, AtomicOrdering::AcqRel);
        *self.current.write() = Some(Arc::new(generation));
    }

    /// Build a new generation from the corpus snapshot and swap it in.
    pub fn rebuild(
        &self,
        corpus: &[RawDoc],
        params: Bm25Params,
    ) -> Result<RebuildSummary, EngineError> {
        if self
            .phase
            .compare_exchange(
                PHASE_IDLE,
                PHASE_BUILDING,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Acquire,
            )
            .is_err()
        {
            return Err(EngineError::RebuildInProgress);
        }

        let id = self.next_id.fetch_add(1, AtomicOrdering::AcqRel);
        let (generation, skipped) = match Generation::build(id, corpus, params) {
            Ok(built) => built,
            Err(err) => {
                self.phase.store(PHASE_IDLE, AtomicOrdering::Release);
                return Err(err);
            }
        };
        let summary = RebuildSummary {
            generation: id,
            documents: generation.len(),
            terms: generation.vocab.len(),
            skipped_empty: skipped,
        };

        self.phase.store(PHASE_SWAPPING, AtomicOrdering::Release);
        *self.current.write() = Some(Arc::new(generation));
        self.phase.store(PHASE_IDLE, AtomicOrdering::Release);
        info!(
            generation = summary.generation,
            documents = summary.documents,
            terms = summary.terms,
            skipped_empty = summary.skipped_empty,
            "generation swapped in"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str) -> RawDoc {
        RawDoc {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn build_drops_untokenizable_documents() {
        let corpus = vec![doc("a.md", "negative value quantity"), doc("b.md", "the and of")];
        let (generation, skipped) = Generation::build(1, &corpus, Bm25Params::default()).unwrap();
        assert_eq!(generation.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(generation.doc_id(0), "a.md");
    }

    #[test]
    fn empty_corpus_is_an_error() {
        assert!(matches!(
            Generation::build(1, &[], Bm25Params::default()),
            Err(EngineError::EmptyCorpus)
        ));
        let only_stopwords = vec![doc("a.md", "the and of")];
        assert!(matches!(
            Generation::build(1, &only_stopwords, Bm25Params::default()),
            Err(EngineError::EmptyCorpus)
        ));
    }

    #[test]
    fn failed_rebuild_keeps_previous_generation() {
        let store = GenerationStore::new();
        let corpus = vec![doc("a.md", "connection refused by remote host")];
        store.rebuild(&corpus, Bm25Params::default()).unwrap();
        let before = store.current().unwrap().id;

        assert!(store.rebuild(&[], Bm25Params::default()).is_err());
        assert_eq!(store.current().unwrap().id, before);
        assert_eq!(store.phase(), RebuildPhase::Idle);
    }

    #[test]
    fn generation_ids_increase_monotonically() {
        let store = GenerationStore::new();
        let corpus = vec![doc("a.md", "disk quota exceeded")];
        let first = store.rebuild(&corpus, Bm25Params::default()).unwrap();
        let second = store.rebuild(&corpus, Bm25Params::default()).unwrap();
        assert!(second.generation > first.generation);
    }
}
