use engine::bm25::Bm25Params;
use engine::generation::Generation;
use engine::persist::{load_generation, load_meta, save_generation, IndexPaths};
use engine::{tokenizer, Engine, EngineConfig, FeedbackStore, MatchSource, Matcher, RawDoc};
use tempfile::tempdir;

fn doc(id: &str, text: &str) -> RawDoc {
    RawDoc {
        id: id.to_string(),
        text: text.to_string(),
    }
}

fn matcher() -> Matcher {
    let config = EngineConfig::default();
    let store = FeedbackStore::temporary(config.feedback).unwrap();
    Matcher::new(config, store).unwrap()
}

#[test]
fn negative_quantity_query_selects_the_matching_doc() {
    let m = matcher();
    m.rebuild(&[
        doc("doc1", "negative value quantity"),
        doc("doc2", "missing required field"),
    ])
    .unwrap();

    let result = m.search("quantity is negative", Engine::Hybrid).unwrap();
    assert_eq!(result.doc_id, "doc1");
    assert_eq!(result.source, MatchSource::Ranked);
    assert!(result.confidence > 0.0);
}

#[test]
fn fused_winner_strictly_outscores_the_loser() {
    let corpus = vec![
        doc("doc1", "negative value quantity"),
        doc("doc2", "missing required field"),
    ];
    let (generation, _) = Generation::build(1, &corpus, Bm25Params::default()).unwrap();
    let tokens = tokenizer::ngrams("quantity is negative");
    let fused = engine::fusion::fuse(
        &generation.rank_tfidf(&tokens, 10),
        &generation.rank_bm25(&tokens, 10),
        engine::fusion::FusionWeights::default(),
    );

    let score_of = |id: &str| {
        fused
            .iter()
            .find(|f| generation.doc_id(f.doc) == id)
            .map(|f| f.combined)
            .unwrap_or(0.0)
    };
    assert!(score_of("doc1") > score_of("doc2"));
}

#[test]
fn every_strategy_agrees_on_an_unambiguous_corpus() {
    let m = matcher();
    m.rebuild(&[
        doc("doc1", "negative value quantity"),
        doc("doc2", "missing required field"),
    ])
    .unwrap();

    for engine in [Engine::TfIdf, Engine::Bm25, Engine::Hybrid, Engine::Ensemble] {
        let result = m.search("negative quantity", engine).unwrap();
        assert_eq!(result.doc_id, "doc1", "engine {engine}");
    }
}

#[test]
fn document_vectors_are_unit_length() {
    let corpus = vec![
        doc("a.md", "disk quota exceeded on volume"),
        doc("b.md", "connection timeout while reading response"),
        doc("c.md", "invalid credentials supplied supplied supplied"),
    ];
    let (generation, _) = Generation::build(1, &corpus, Bm25Params::default()).unwrap();
    for i in 0..generation.len() as u32 {
        let norm = generation.vector(i).l2_norm();
        assert!((norm - 1.0).abs() < 1e-5, "doc {i} has norm {norm}");
    }
}

#[test]
fn rebuild_is_idempotent() {
    let corpus = vec![
        doc("a.md", "disk quota exceeded on volume"),
        doc("b.md", "connection timeout while reading response"),
        doc("c.md", "quota limits for api requests"),
    ];
    let (first, _) = Generation::build(1, &corpus, Bm25Params::default()).unwrap();
    let (second, _) = Generation::build(2, &corpus, Bm25Params::default()).unwrap();

    assert_eq!(first.len(), second.len());
    for i in 0..first.len() as u32 {
        let (a, b) = (first.vector(i), second.vector(i));
        assert_eq!(a.indices, b.indices);
        for (x, y) in a.values.iter().zip(&b.values) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    let tokens = tokenizer::ngrams("disk quota");
    assert_eq!(first.rank_bm25(&tokens, 10), second.rank_bm25(&tokens, 10));
    assert_eq!(first.rank_tfidf(&tokens, 10), second.rank_tfidf(&tokens, 10));
}

#[test]
fn equal_scores_resolve_to_smaller_doc_id() {
    let m = matcher();
    m.rebuild(&[
        doc("b.md", "disk quota exceeded"),
        doc("a.md", "disk quota exceeded"),
    ])
    .unwrap();

    let result = m.search("disk quota exceeded", Engine::Hybrid).unwrap();
    assert_eq!(result.doc_id, "a.md");
}

#[test]
fn stopword_only_document_is_excluded_without_crashing() {
    let m = matcher();
    let summary = m
        .rebuild(&[
            doc("empty.md", "the and of to"),
            doc("net.md", "connection timeout while reading"),
            doc("disk.md", "disk quota exceeded"),
        ])
        .unwrap();
    assert_eq!(summary.documents, 2);
    assert_eq!(summary.skipped_empty, 1);

    let result = m.search("connection timeout", Engine::Hybrid).unwrap();
    assert_eq!(result.doc_id, "net.md");
    let result = m.search("disk quota", Engine::Hybrid).unwrap();
    assert_eq!(result.doc_id, "disk.md");
}

#[test]
fn vocabulary_miss_falls_back_with_zero_confidence() {
    let m = matcher();
    m.rebuild(&[
        doc("b.md", "connection timeout"),
        doc("a.md", "disk quota exceeded"),
    ])
    .unwrap();

    let result = m.search("zzzz qqqq", Engine::Hybrid).unwrap();
    assert_eq!(result.source, MatchSource::Fallback);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.doc_id, "a.md");
}

#[test]
fn search_without_a_generation_reports_empty_corpus() {
    let m = matcher();
    assert!(matches!(
        m.search("anything", Engine::Hybrid),
        Err(engine::EngineError::EmptyCorpus)
    ));
}

#[test]
fn failed_rebuild_leaves_the_old_generation_serving() {
    let m = matcher();
    m.rebuild(&[doc("a.md", "disk quota exceeded")]).unwrap();
    let before = m.current_generation().unwrap().id;

    assert!(m.rebuild(&[]).is_err());
    assert_eq!(m.current_generation().unwrap().id, before);
    let result = m.search("disk quota", Engine::Hybrid).unwrap();
    assert_eq!(result.doc_id, "a.md");
}

#[test]
fn search_multi_returns_one_match_per_strategy() {
    let m = matcher();
    m.rebuild(&[
        doc("doc1", "negative value quantity"),
        doc("doc2", "missing required field"),
    ])
    .unwrap();

    let results = m.search_multi("negative quantity").unwrap();
    assert_eq!(results.len(), 3);
    let mut engines: Vec<Engine> = results.iter().map(|r| r.engine).collect();
    engines.sort_by_key(|e| e.as_str());
    engines.dedup();
    assert_eq!(engines.len(), 3);
    for result in &results {
        assert_eq!(result.doc_id, "doc1");
    }
}

#[test]
fn snapshot_round_trips() {
    let corpus = vec![
        doc("a.md", "disk quota exceeded on volume"),
        doc("b.md", "connection timeout while reading response"),
    ];
    let (generation, _) = Generation::build(3, &corpus, Bm25Params::default()).unwrap();

    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("index"));
    save_generation(&paths, &generation, "2026-08-01T00:00:00Z").unwrap();

    let loaded = load_generation(&paths).unwrap();
    assert_eq!(loaded.id, 3);
    assert_eq!(loaded.len(), generation.len());

    let tokens = tokenizer::ngrams("connection timeout");
    assert_eq!(
        loaded.rank_bm25(&tokens, 10),
        generation.rank_bm25(&tokens, 10)
    );

    let meta = load_meta(&paths).unwrap();
    assert_eq!(meta.generation, 3);
    assert_eq!(meta.num_docs, 2);
}
