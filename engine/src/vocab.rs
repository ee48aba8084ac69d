use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One vocabulary slot: a dense column index and the term's document frequency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TermEntry {
    pub index: u32,
    pub df: u32,
}

/// Global term table for one generation: term -> (index, document frequency).
///
/// Indices are dense `0..len()` and assigned in sorted-term order, so an
/// unchanged corpus always rebuilds to an identical vocabulary. Built once
/// per generation and never mutated afterward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: HashMap<String, TermEntry>,
    num_docs: u32,
}

impl Vocabulary {
    /// Build from pre-tokenized documents. Every document in `docs` counts
    /// toward the corpus size; callers drop untokenizable documents first.
    pub fn build(docs: &[Vec<String>]) -> Self {
        let mut df: BTreeMap<&str, u32> = BTreeMap::new();
        for tokens in docs {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *df.entry(term).or_insert(0) += 1;
            }
        }
        let terms = df
            .into_iter()
            .enumerate()
            .map(|(i, (term, df))| (term.to_string(), TermEntry { index: i as u32, df }))
            .collect();
        Self {
            terms,
            num_docs: docs.len() as u32,
        }
    }

    pub fn get(&self, term: &str) -> Option<TermEntry> {
        self.terms.get(term).copied()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Corpus size the document frequencies were counted against.
    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }
}
