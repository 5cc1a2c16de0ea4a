use std::collections::BTreeSet;
use std::sync::Arc;

use pike::config::EngineConfig;
use pike::document::document::Document;
use pike::document::identity::IdentityGenerator;
use pike::error::PikeError;
use pike::index::IndexEngine;
use pike::index::manifest::is_segment_file;
use pike::query::{FunctionKind, Query, QueryDefinition, SortField};
use pike::schema::{FieldDeclaration, FieldTemplate};
use pike::storage::Storage;
use pike::storage::memory::MemoryStorage;
use serde_json::json;

fn schema() -> Vec<FieldDeclaration> {
    vec![
        FieldDeclaration::new("title", FieldTemplate::Text).stored(true),
        FieldDeclaration::new("category", FieldTemplate::String).stored(true).facet(true),
        FieldDeclaration::new("price", FieldTemplate::LongValue),
        FieldDeclaration::new("weight", FieldTemplate::DoubleValue),
    ]
}

fn open_engine(storage: Arc<MemoryStorage>, config: EngineConfig) -> IndexEngine {
    let engine = IndexEngine::open("scenario", storage, config).unwrap();
    engine.update_schema(schema()).unwrap();
    engine
}

fn engine() -> IndexEngine {
    open_engine(Arc::new(MemoryStorage::new()), EngineConfig::default())
}

fn segment_files(storage: &MemoryStorage) -> BTreeSet<String> {
    storage
        .list_files()
        .unwrap()
        .into_iter()
        .filter(|name| is_segment_file(name))
        .collect()
}

#[test]
fn test_written_document_reads_back() {
    let engine = engine();
    engine
        .write(&[Document::with_id("book-1")
            .field("title", "The Rust Programming Language")
            .field("category", "programming")
            .field("price", 40i64)])
        .unwrap();

    let doc = engine.get_document("book-1").unwrap().unwrap();
    assert_eq!(
        doc.get_field("title").and_then(|v| v.as_text()),
        Some("The Rust Programming Language")
    );
    assert_eq!(doc.get_field("category").and_then(|v| v.as_text()), Some("programming"));
    assert!(engine.get_document("book-2").unwrap().is_none());
}

#[test]
fn test_upsert_is_idempotent() {
    let engine = engine();
    let doc = Document::with_id("same").field("title", "repeated write").field("price", 7i64);

    for _ in 0..3 {
        engine.write(&[doc.clone()]).unwrap();
    }

    let result = engine.search(&QueryDefinition::new()).unwrap();
    assert_eq!(result.total_hits, 1);
    assert_eq!(result.identities(), vec!["same"]);

    // a later version replaces the earlier one
    engine
        .write(&[Document::with_id("same").field("title", "changed").field("price", 8i64)])
        .unwrap();
    let result = engine
        .search(&QueryDefinition::new().query_string("repeated", "title"))
        .unwrap();
    assert_eq!(result.total_hits, 0);
    assert_eq!(engine.status().unwrap().num_docs, 1);
}

#[test]
fn test_generated_identities_are_distinct_and_ordered() {
    let generator = IdentityGenerator::new();
    let identities: Vec<String> = (0..10_000).map(|_| generator.next_identity()).collect();

    let distinct: BTreeSet<&String> = identities.iter().collect();
    assert_eq!(distinct.len(), identities.len());
    for pair in identities.windows(2) {
        assert!(pair[0] < pair[1]);
    }

    // documents without an identity get one at write time
    let engine = engine();
    let written = engine
        .write(&[
            Document::new().field("title", "first"),
            Document::new().field("title", "second"),
        ])
        .unwrap();
    assert_eq!(written.len(), 2);
    assert!(written[0] < written[1]);
    assert!(engine.get_document(&written[1]).unwrap().is_some());
}

#[test]
fn test_min_max_aggregation() {
    let engine = engine();
    engine
        .write(&[
            Document::with_id("a").field("title", "red").field("price", 12i64).field("weight", 1.5),
            Document::with_id("b").field("title", "red").field("price", -3i64).field("weight", 0.25),
            Document::with_id("c").field("title", "blue").field("price", 99i64),
        ])
        .unwrap();

    let result = engine
        .search(
            &QueryDefinition::new()
                .query_string("red", "title")
                .function("price", FunctionKind::Min)
                .function("price", FunctionKind::Max)
                .function("weight", FunctionKind::Max),
        )
        .unwrap();
    assert_eq!(result.total_hits, 2);
    assert_eq!(result.function("price", FunctionKind::Min).unwrap().value, Some(json!(-3)));
    assert_eq!(result.function("price", FunctionKind::Max).unwrap().value, Some(json!(12)));
    assert_eq!(result.function("weight", FunctionKind::Max).unwrap().value, Some(json!(1.5)));

    // no matching document carries a weight
    let result = engine
        .search(
            &QueryDefinition::new()
                .query_string("blue", "title")
                .function("weight", FunctionKind::Min),
        )
        .unwrap();
    assert_eq!(result.function("weight", FunctionKind::Min).unwrap().value, None);
}

#[test]
fn test_schema_swap_leaves_open_searchers_alone() {
    let engine = engine();
    engine.write(&[Document::with_id("1").field("title", "before")]).unwrap();

    let before = engine.searcher().unwrap();

    let mut declarations = schema();
    declarations.push(FieldDeclaration::new("color", FieldTemplate::String));
    engine.update_schema(declarations).unwrap();
    engine
        .write(&[Document::with_id("2").field("title", "after").field("color", "red")])
        .unwrap();

    // the earlier searcher keeps its schema and its snapshot
    assert!(before.field_map().get("color").is_none());
    assert_eq!(before.num_docs(), 1);
    let err = before
        .search(&QueryDefinition::new().with_query(Query::term("color", "red")))
        .unwrap_err();
    assert!(matches!(err, PikeError::Query(_)));

    let result = engine
        .search(&QueryDefinition::new().with_query(Query::term("color", "red")))
        .unwrap();
    assert_eq!(result.identities(), vec!["2"]);
}

#[test]
fn test_invalid_requests_fail_fast() {
    let engine = engine();
    engine.write(&[Document::with_id("1").field("title", "hello")]).unwrap();

    let invalid = [
        QueryDefinition::new().query_string("hello", "missing"),
        QueryDefinition::new().sort(SortField::asc("missing")),
        QueryDefinition::new().sort(SortField::asc("title")),
        QueryDefinition::new().facet("title", 10),
        QueryDefinition::new().function("missing", FunctionKind::Max),
    ];
    for definition in &invalid {
        let err = engine.search(definition).unwrap_err();
        assert!(matches!(err, PikeError::Query(_)), "{definition:?} gave {err}");
        assert_eq!(engine.active_snapshot_holders(), 0);
    }
}

#[test]
fn test_segments_merge_above_limit() {
    let config = EngineConfig {
        max_segments: 3,
        ..EngineConfig::default()
    };
    let engine = open_engine(Arc::new(MemoryStorage::new()), config);

    for i in 0..10 {
        engine
            .write(&[Document::with_id(format!("doc{i}")).field("price", i as i64)])
            .unwrap();
        assert!(engine.status().unwrap().segments <= 3);
    }
    engine.delete(&["doc0", "doc1"]).unwrap();

    let status = engine.status().unwrap();
    assert_eq!(status.num_docs, 8);
    let result = engine
        .search(&QueryDefinition::new().sort(SortField::asc("price")).rows(3))
        .unwrap();
    assert_eq!(result.identities(), vec!["doc2", "doc3", "doc4"]);
}

#[test]
fn test_obsolete_files_removed_after_release() {
    let storage = Arc::new(MemoryStorage::new());
    let config = EngineConfig {
        max_segments: 1,
        ..EngineConfig::default()
    };
    let engine = open_engine(Arc::clone(&storage), config);
    engine.write(&[Document::with_id("1").field("title", "one")]).unwrap();

    let held = engine.searcher().unwrap();
    let held_files = segment_files(&storage);
    assert!(!held_files.is_empty());

    // the merge replaces every segment
    engine.write(&[Document::with_id("2").field("title", "two")]).unwrap();
    let after = segment_files(&storage);
    assert!(held_files.is_subset(&after));
    assert_eq!(held.num_docs(), 1);

    drop(held);
    let remaining = segment_files(&storage);
    assert!(remaining.is_disjoint(&held_files));
    assert_eq!(engine.active_snapshot_holders(), 0);
    assert_eq!(engine.search(&QueryDefinition::new()).unwrap().total_hits, 2);
}

#[test]
fn test_reopen_keeps_documents() {
    let storage = Arc::new(MemoryStorage::new());
    {
        let engine = open_engine(Arc::clone(&storage), EngineConfig::default());
        engine
            .write(&[Document::with_id("kept").field("title", "durable").field("price", 5i64)])
            .unwrap();
        engine
            .update_values(&[Document::with_id("kept").field("price", 6i64)])
            .unwrap();
    }

    let engine = IndexEngine::open("scenario", storage, EngineConfig::default()).unwrap();
    let result = engine
        .search(
            &QueryDefinition::new()
                .query_string("durable", "title")
                .function("price", FunctionKind::Max),
        )
        .unwrap();
    assert_eq!(result.identities(), vec!["kept"]);
    assert_eq!(result.function("price", FunctionKind::Max).unwrap().value, Some(json!(6)));
    assert!(!result.documents[0].fields.contains_key("price"));
}

#[test]
fn test_concurrent_writers_and_searchers() {
    const WRITERS: usize = 4;
    const PER_WRITER: usize = 25;
    let engine = open_engine(
        Arc::new(MemoryStorage::new()),
        EngineConfig {
            max_segments: 4,
            ..EngineConfig::default()
        },
    );

    std::thread::scope(|scope| {
        for writer in 0..WRITERS {
            let engine = &engine;
            scope.spawn(move || {
                for i in 0..PER_WRITER {
                    engine
                        .write(&[Document::with_id(format!("w{writer}-{i}"))
                            .field("title", "concurrent write")
                            .field("price", i as i64)])
                        .unwrap();
                }
            });
        }
        for _ in 0..2 {
            let engine = &engine;
            scope.spawn(move || {
                let mut last_version = 0;
                for _ in 0..50 {
                    let searcher = engine.searcher().unwrap();
                    assert!(searcher.version() >= last_version);
                    last_version = searcher.version();

                    // a held snapshot does not move while writers refresh
                    let all = searcher.search(&QueryDefinition::new().rows(0)).unwrap();
                    let matched = searcher
                        .search(&QueryDefinition::new().query_string("concurrent", "title").rows(0))
                        .unwrap();
                    assert_eq!(all.total_hits, searcher.num_docs());
                    assert_eq!(matched.total_hits, all.total_hits);
                    assert_eq!(searcher.version(), last_version);
                }
            });
        }
    });

    let total = (WRITERS * PER_WRITER) as u64;
    assert_eq!(engine.version(), total);
    assert_eq!(engine.search(&QueryDefinition::new().rows(0)).unwrap().total_hits, total);
    for writer in 0..WRITERS {
        for i in 0..PER_WRITER {
            assert!(engine.get_document(&format!("w{writer}-{i}")).unwrap().is_some());
        }
    }
    assert_eq!(engine.active_snapshot_holders(), 0);
    assert!(engine.status().unwrap().segments <= 4);
}
