use std::collections::BTreeSet;
use std::io::Read;
use std::sync::Arc;

use pike::config::EngineConfig;
use pike::document::document::Document;
use pike::error::PikeError;
use pike::index::IndexEngine;
use pike::index::engine::{ANALYZERS_FILE, FIELDS_FILE};
use pike::index::manifest::{CommitManifest, MANIFEST_FILE};
use pike::index::replication::check_master_identity;
use pike::query::QueryDefinition;
use pike::schema::{FieldDeclaration, FieldTemplate};
use pike::storage::Storage;
use pike::storage::memory::MemoryStorage;

fn read_to_end(mut reader: Box<dyn Read + Send>) -> Vec<u8> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).unwrap();
    bytes
}

#[test]
fn test_session_pins_a_consistent_copy() {
    let master = IndexEngine::open("master", Arc::new(MemoryStorage::new()), EngineConfig::default()).unwrap();
    master
        .update_schema(vec![FieldDeclaration::new("title", FieldTemplate::Text).stored(true)])
        .unwrap();
    master
        .write(&[
            Document::with_id("1").field("title", "first copy"),
            Document::with_id("2").field("title", "second copy"),
        ])
        .unwrap();

    let session = master.replication_session().unwrap();
    assert_eq!(session.index_uuid(), master.index_uuid());
    assert_eq!(session.version(), 1);

    // later commits do not change what the session serves
    master.delete_all().unwrap();
    master.write(&[Document::with_id("3").field("title", "third")]).unwrap();

    let names: BTreeSet<&str> = session.files().iter().map(|f| f.name.as_str()).collect();
    for required in [MANIFEST_FILE, FIELDS_FILE, ANALYZERS_FILE] {
        assert!(names.contains(required), "{required} missing");
    }

    let replica_storage = Arc::new(MemoryStorage::new());
    for file in session.files() {
        let bytes = read_to_end(session.open_file(&file.name).unwrap());
        assert_eq!(bytes.len() as u64, file.size, "{}", file.name);
        replica_storage.write_all(&file.name, &bytes).unwrap();
    }
    assert!(matches!(
        session.open_file("seg_999.seg"),
        Err(PikeError::Index(_))
    ));
    drop(session);
    assert_eq!(master.active_snapshot_holders(), 0);

    let manifest = CommitManifest::load(replica_storage.as_ref()).unwrap().unwrap();
    check_master_identity(&manifest.index_uuid, &master.index_uuid()).unwrap();

    let replica = IndexEngine::open("replica", replica_storage, EngineConfig::default()).unwrap();
    assert_eq!(replica.version(), 1);
    assert_eq!(replica.field_map().len(), 1);
    let result = replica
        .search(&QueryDefinition::new().query_string("copy", "title"))
        .unwrap();
    assert_eq!(result.total_hits, 2);
    assert!(replica.get_document("3").unwrap().is_none());

    // a replica never pulls from another master
    let other = IndexEngine::open("other", Arc::new(MemoryStorage::new()), EngineConfig::default()).unwrap();
    assert!(matches!(
        check_master_identity(&replica.index_uuid(), &other.index_uuid()),
        Err(PikeError::Consistency(_))
    ));
}
