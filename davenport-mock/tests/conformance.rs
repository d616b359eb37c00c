//! End-to-end conformance checks driving `MockDatabase` through the driver
//! contracts, the way a client layer would.

use serde_json::json;

use davenport_driver::capabilities::{Capabilities, Capability};
use davenport_driver::db::{BulkGetReference, Database};
use davenport_driver::document::{Attachment, Members, Security};
use davenport_driver::error::Error;
use davenport_driver::options::Options;
use davenport_mock::MockDatabase;

#[tokio::test]
async fn mandatory_only_backend_probes_empty() {
    let db = MockDatabase::builder("bare").build();
    let caps = Capabilities::probe(&db).unwrap();
    for cap in Capability::ALL {
        assert!(!caps.supports(cap), "{cap} unexpectedly supported");
        assert!(matches!(caps.require(cap), Err(Error::Unsupported)));
    }

    // The mandatory surface still works without any optional capability.
    let (id, rev) = db.create_doc(json!({"n": 1}), Options::new()).await.unwrap();
    assert!(rev.starts_with("1-"));
    let doc = db.get(&id, Options::new()).await.unwrap();
    assert_eq!(doc.rev, rev);
}

#[tokio::test]
async fn probe_rejects_both_finder_flavors() {
    let db = MockDatabase::builder("bad")
        .with_find()
        .with_find_with_options()
        .build();
    assert!(matches!(
        Capabilities::probe(&db),
        Err(Error::InvalidBackend(_))
    ));
}

#[tokio::test]
async fn probe_reports_enabled_subset() {
    let db = MockDatabase::builder("subset")
        .with_bulk_get()
        .with_purge()
        .with_partitions()
        .build();
    let caps = Capabilities::probe(&db).unwrap();
    assert_eq!(
        caps.list(),
        vec![Capability::BulkGet, Capability::Purge, Capability::Partitions]
    );
    caps.require(Capability::BulkGet).unwrap();
    assert!(matches!(caps.require(Capability::Find), Err(Error::Unsupported)));
}

#[tokio::test]
async fn crud_and_revision_conflicts() {
    let db = MockDatabase::builder("crud").build();

    let rev1 = db.put("a", json!({"v": 1}), Options::new()).await.unwrap();
    assert!(rev1.starts_with("1-"));

    // Update without asserting the current revision is a conflict.
    assert!(matches!(
        db.put("a", json!({"v": 2}), Options::new()).await,
        Err(Error::Backend(_))
    ));

    let rev2 = db
        .put("a", json!({"v": 2, "_rev": rev1}), Options::new())
        .await
        .unwrap();
    assert!(rev2.starts_with("2-"));

    assert!(matches!(
        db.delete("a", &rev1, Options::new()).await,
        Err(Error::Backend(_))
    ));
    let rev3 = db.delete("a", &rev2, Options::new()).await.unwrap();
    assert!(rev3.starts_with("3-"));

    // A soft-deleted document is gone from reads but counted as deleted.
    assert!(matches!(
        db.get("a", Options::new()).await,
        Err(Error::NotFound(_))
    ));
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.doc_count, 0);
    assert_eq!(stats.deleted_count, 1);

    assert!(matches!(
        db.delete("missing", "1-x", Options::new()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn all_docs_lists_in_id_order() {
    let db = MockDatabase::builder("listing").build();
    for id in ["c", "a", "b", "_local/cfg"] {
        db.put(id, json!({"id": id}), Options::new()).await.unwrap();
    }

    let rows = db
        .all_docs(Options::new().with("include_docs", true))
        .await
        .unwrap();
    assert_eq!(rows.total_rows(), 3);
    let mut seen = Vec::new();
    while let Some(mut row) = rows.next().await.unwrap() {
        assert!(row.read_doc().await.unwrap().is_some());
        seen.push(row.id);
    }
    // Local documents are excluded and order is by ID.
    assert_eq!(seen, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn changes_feed_reports_latest_change_per_doc() {
    let db = MockDatabase::builder("feed").build();
    let rev_a = db.put("a", json!({"v": 1}), Options::new()).await.unwrap();
    db.put("b", json!({"v": 1}), Options::new()).await.unwrap();
    let rev_a2 = db
        .put("a", json!({"v": 2, "_rev": rev_a}), Options::new())
        .await
        .unwrap();

    let feed = db
        .changes(Options::new().with("include_docs", true))
        .await
        .unwrap();
    let mut seen = Vec::new();
    while let Some(change) = feed.next().await.unwrap() {
        assert!(change.doc.is_some());
        seen.push((change.id.clone(), change.changes[0].clone()));
    }
    // Only the latest change for "a" survives, ordered by sequence.
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, "b");
    assert_eq!(seen[1], ("a".to_string(), rev_a2));
    assert_eq!(feed.last_seq(), "3");

    // since skips already-seen sequences.
    let feed = db.changes(Options::new().with("since", "2")).await.unwrap();
    let change = feed.next().await.unwrap().unwrap();
    assert_eq!(change.id, "a");
    assert!(feed.next().await.unwrap().is_none());
}

#[tokio::test]
async fn bulk_get_reports_row_level_errors() {
    let db = MockDatabase::builder("bulk").with_bulk_get().build();
    let rev = db.put("a", json!({"v": 1}), Options::new()).await.unwrap();

    let refs = vec![
        BulkGetReference { id: "a".to_string(), rev: rev.clone(), ..Default::default() },
        BulkGetReference { id: "missing".to_string(), ..Default::default() },
        BulkGetReference { id: "a".to_string(), rev: "9-stale".to_string(), ..Default::default() },
    ];
    let rows = db
        .bulk_getter()
        .unwrap()
        .bulk_get(&refs, Options::new())
        .await
        .unwrap();

    let found = rows.next().await.unwrap().unwrap();
    assert_eq!(found.id, "a");
    assert!(found.error.is_none());

    // Failed entries surface as rows, and iteration continues past them.
    let missing = rows.next().await.unwrap().unwrap();
    assert!(matches!(missing.error, Some(Error::NotFound(_))));
    let stale = rows.next().await.unwrap().unwrap();
    assert_eq!(stale.id, "a");
    assert!(matches!(stale.error, Some(Error::NotFound(_))));
    assert!(rows.next().await.unwrap().is_none());
}

#[tokio::test]
async fn attachments_round_trip() {
    let db = MockDatabase::builder("atts").with_attachment_meta().build();
    let rev = db.put("doc", json!({}), Options::new()).await.unwrap();

    let rev2 = db
        .put_attachment(
            "doc",
            &rev,
            Attachment {
                filename: "readme.txt".to_string(),
                content_type: "text/plain".to_string(),
                content: Some(Box::pin(futures::io::Cursor::new(b"hello".to_vec()))),
                ..Attachment::default()
            },
            Options::new(),
        )
        .await
        .unwrap();
    assert!(rev2.starts_with("2-"));

    let mut att = db.get_attachment("doc", "readme.txt", Options::new()).await.unwrap();
    assert_eq!(att.size, 5);
    assert!(!att.stub);
    let mut body = Vec::new();
    futures::io::AsyncReadExt::read_to_end(att.content.as_mut().unwrap(), &mut body)
        .await
        .unwrap();
    assert_eq!(body, b"hello");

    let meta = db
        .attachment_meta_getter()
        .unwrap()
        .attachment_meta("doc", "readme.txt", Options::new())
        .await
        .unwrap();
    assert!(meta.stub);
    assert!(meta.content.is_none());
    assert_eq!(meta.size, 5);

    let rev3 = db
        .delete_attachment("doc", &rev2, "readme.txt", Options::new())
        .await
        .unwrap();
    assert!(rev3.starts_with("3-"));
    assert!(matches!(
        db.get_attachment("doc", "readme.txt", Options::new()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn find_matches_selector_and_warns() {
    let db = MockDatabase::builder("find").with_find().build();
    db.put("a", json!({"kind": "cat"}), Options::new()).await.unwrap();
    db.put("b", json!({"kind": "dog"}), Options::new()).await.unwrap();
    db.put("c", json!({"kind": "cat"}), Options::new()).await.unwrap();

    let finder = db.finder().unwrap();
    let rows = finder
        .find(json!({"selector": {"kind": "cat"}}))
        .await
        .unwrap();
    assert_eq!(rows.total_rows(), 2);
    // Unindexed queries surface the warning side channel.
    let warning = rows.warner().unwrap().warning();
    assert!(warning.contains("no matching index"));
    let mut matched = Vec::new();
    while let Some(row) = rows.next().await.unwrap() {
        matched.push(row.id);
    }
    assert_eq!(matched, vec!["a", "c"]);

    finder
        .create_index("ddoc1", "by-kind", json!({"fields": ["kind"]}))
        .await
        .unwrap();
    let indexes = finder.get_indexes().await.unwrap();
    assert_eq!(indexes.len(), 2);
    assert_eq!(indexes[0].name, "_all_docs");
    assert_eq!(indexes[0].kind, "special");
    assert_eq!(indexes[1].name, "by-kind");

    let plan = finder.explain(json!({"selector": {"kind": "cat"}})).await.unwrap();
    assert_eq!(plan.dbname, "find");
    assert_eq!(plan.selector, json!({"kind": "cat"}));

    finder.delete_index("ddoc1", "by-kind").await.unwrap();
    assert!(matches!(
        finder.delete_index("ddoc1", "by-kind").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn revs_diff_reports_missing_revisions() {
    let db = MockDatabase::builder("diff").with_revs_diff().build();
    let rev = db.put("a", json!({}), Options::new()).await.unwrap();

    let rows = db
        .revs_differ()
        .unwrap()
        .revs_diff(json!({
            "a": [rev, "2-candidate"],
            "b": ["1-other"],
        }))
        .await
        .unwrap();

    let mut row = rows.next().await.unwrap().unwrap();
    assert_eq!(row.id, "a");
    let value: serde_json::Value =
        serde_json::from_slice(&row.read_value().await.unwrap().unwrap()).unwrap();
    assert_eq!(value, json!({"missing": ["2-candidate"]}));

    let row = rows.next().await.unwrap().unwrap();
    assert_eq!(row.id, "b");
    assert!(rows.next().await.unwrap().is_none());
}

#[tokio::test]
async fn purge_removes_revisions_permanently() {
    let db = MockDatabase::builder("purge").with_purge().build();
    let rev = db.put("a", json!({}), Options::new()).await.unwrap();
    db.put("b", json!({}), Options::new()).await.unwrap();

    let mut request = std::collections::HashMap::new();
    request.insert("a".to_string(), vec![rev.clone()]);
    request.insert("gone".to_string(), vec!["1-x".to_string()]);

    let result = db.purger().unwrap().purge(&request).await.unwrap();
    assert_eq!(result.seq, 1);
    assert_eq!(result.purged.get("a"), Some(&vec![rev]));
    assert!(!result.purged.contains_key("gone"));

    // Unlike a soft delete, the purged document leaves no tombstone.
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.doc_count, 1);
    assert_eq!(stats.deleted_count, 0);
}

#[tokio::test]
async fn copy_and_get_meta() {
    let db = MockDatabase::builder("copy").with_copy().with_get_meta().build();
    db.put("src", json!({"v": 1}), Options::new()).await.unwrap();

    let rev = db
        .copier()
        .unwrap()
        .copy("dst", "src", Options::new())
        .await
        .unwrap();
    assert!(rev.starts_with("1-"));
    assert!(matches!(
        db.copier().unwrap().copy("dst", "src", Options::new()).await,
        Err(Error::Backend(_))
    ));

    let (size, meta_rev) = db
        .meta_getter()
        .unwrap()
        .get_meta("dst", Options::new())
        .await
        .unwrap();
    assert_eq!(meta_rev, rev);
    assert!(size > 0);
}

#[tokio::test]
async fn design_and_local_listings() {
    let db = MockDatabase::builder("split")
        .with_design_docs()
        .with_local_docs()
        .build();
    db.put("plain", json!({}), Options::new()).await.unwrap();
    db.put("_design/views", json!({}), Options::new()).await.unwrap();
    db.put("_local/checkpoint", json!({}), Options::new()).await.unwrap();

    let rows = db
        .design_docer()
        .unwrap()
        .design_docs(Options::new())
        .await
        .unwrap();
    assert_eq!(rows.next().await.unwrap().unwrap().id, "_design/views");
    assert!(rows.next().await.unwrap().is_none());

    let rows = db
        .local_docer()
        .unwrap()
        .local_docs(Options::new())
        .await
        .unwrap();
    assert_eq!(rows.next().await.unwrap().unwrap().id, "_local/checkpoint");
    assert!(rows.next().await.unwrap().is_none());
}

#[tokio::test]
async fn partition_stats_follow_id_prefix() {
    let db = MockDatabase::builder("parts").with_partitions().build();
    db.put("north:1", json!({"v": 1}), Options::new()).await.unwrap();
    db.put("north:2", json!({"v": 2}), Options::new()).await.unwrap();
    db.put("south:1", json!({"v": 3}), Options::new()).await.unwrap();
    let rev = db.put("north:3", json!({}), Options::new()).await.unwrap();
    db.delete("north:3", &rev, Options::new()).await.unwrap();

    let stats = db.partitioned().unwrap().partition_stats("north").await.unwrap();
    assert_eq!(stats.partition, "north");
    assert_eq!(stats.doc_count, 2);
    assert_eq!(stats.deleted_doc_count, 1);
    assert!(stats.raw_response.is_some());
}

#[tokio::test]
async fn security_round_trip_and_housekeeping() {
    let db = MockDatabase::builder("admin").build();
    assert_eq!(db.security().await.unwrap(), Security::default());

    let security = Security {
        admins: Members { names: vec!["bob".to_string()], roles: vec![] },
        ..Security::default()
    };
    db.set_security(security.clone()).await.unwrap();
    assert_eq!(db.security().await.unwrap(), security);

    db.compact().await.unwrap();
    db.compact_view("views").await.unwrap();
    db.view_cleanup().await.unwrap();

    assert!(matches!(
        db.query("ddoc", "by-date", Options::new()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn closed_handle_rejects_operations() {
    let db = MockDatabase::builder("closable").with_close().with_flush().build();
    db.flusher().unwrap().flush().await.unwrap();
    db.closer().unwrap().close().await.unwrap();
    // Closing again is fine; everything else is not.
    db.closer().unwrap().close().await.unwrap();

    assert!(matches!(
        db.get("a", Options::new()).await,
        Err(Error::Backend(_))
    ));
    assert!(matches!(db.stats().await, Err(Error::Backend(_))));
    assert!(matches!(
        db.flusher().unwrap().flush().await,
        Err(Error::Backend(_))
    ));
}

#[tokio::test]
async fn bulk_docs_reports_per_document_outcomes() {
    let db = MockDatabase::builder("batch").with_bulk_docs().build();
    let rev = db.put("a", json!({"v": 1}), Options::new()).await.unwrap();

    let docs = vec![
        json!({"_id": "a", "v": 2, "_rev": rev}),
        json!({"_id": "a", "v": 3}),
        json!({"_id": "b", "v": 1}),
        json!({"v": 1}),
    ];
    let results = db
        .bulk_docer()
        .unwrap()
        .bulk_docs(&docs, Options::new())
        .await
        .unwrap();
    assert_eq!(results.len(), 4);

    assert_eq!(results[0].id, "a");
    assert!(results[0].rev.starts_with("2-"));
    assert!(results[0].error.is_none());

    // The stale entry fails in its slot without aborting the batch.
    assert!(matches!(results[1].error, Some(Error::Backend(_))));
    assert!(results[1].rev.is_empty());

    assert_eq!(results[2].id, "b");
    assert!(results[2].rev.starts_with("1-"));

    // An entry without an ID gets a backend-assigned one.
    assert!(!results[3].id.is_empty());
    assert!(results[3].rev.starts_with("1-"));

    let doc = db.get("b", Options::new()).await.unwrap();
    assert_eq!(doc.rev, results[2].rev);
}

#[tokio::test]
async fn changes_treats_negative_since_as_start() {
    let db = MockDatabase::builder("since").build();
    db.put("a", json!({}), Options::new()).await.unwrap();

    let feed = db.changes(Options::new().with("since", -5)).await.unwrap();
    assert_eq!(feed.next().await.unwrap().unwrap().id, "a");
    assert!(feed.next().await.unwrap().is_none());
}
