//! An in-memory mock backend implementing the full driver surface.
//!
//! `MockDatabase` satisfies the mandatory [`Database`] contract with simple
//! in-memory semantics (documents in a map, uuid-derived revisions, a change
//! log) and can additionally satisfy any subset of the optional capability
//! traits. The capability set is assembled explicitly through
//! [`MockDatabaseBuilder`]; a capability left out of the set stays invisible
//! to probing even though the code backing it is compiled in.
//!
//! The mock defines no views, so [`Database::query`] reports the design
//! document as not found.

use async_trait::async_trait;
use futures::io::AsyncReadExt;
use mea::rwlock::RwLock;
use serde_json::{Value, json, value::to_raw_value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

use davenport_driver::changes::{Change, ChangedRevs, Changes};
use davenport_driver::db::{
    AttachmentMetaGetter, BulkDocer, BulkGetReference, BulkGetter, BulkResult, Copier, Database,
    DatabaseCloser, DesignDocer, Finder, Flusher, Index, LocalDocer, MetaGetter, OptsFinder,
    Purger, PurgeResult, QueryPlan, RevsDiffer,
};
use davenport_driver::document::{Attachment, DbStats, Document, Security};
use davenport_driver::error::{Error, Result};
use davenport_driver::options::Options;
use davenport_driver::partition::{Partitioned, PartitionStats};
use davenport_driver::row::{Row, Rows};

use crate::changes::MockChanges;
use crate::rows::MockRows;

#[derive(Clone)]
struct StoredAttachment {
    content_type: String,
    digest: String,
    rev_pos: i64,
    data: Vec<u8>,
}

#[derive(Clone)]
struct StoredDoc {
    rev: String,
    deleted: bool,
    body: Value,
    attachments: HashMap<String, StoredAttachment>,
}

struct LogEntry {
    seq: u64,
    id: String,
    rev: String,
    deleted: bool,
}

#[derive(Default)]
struct State {
    docs: HashMap<String, StoredDoc>,
    log: Vec<LogEntry>,
    indexes: Vec<Index>,
    purge_seq: i64,
}

/// Which optional capabilities the mock exposes to probing.
#[derive(Debug, Clone, Copy, Default)]
struct EnabledCapabilities {
    find: bool,
    find_with_options: bool,
    flush: bool,
    copy: bool,
    get_meta: bool,
    bulk_get: bool,
    bulk_docs: bool,
    revs_diff: bool,
    close: bool,
    purge: bool,
    design_docs: bool,
    local_docs: bool,
    attachment_meta: bool,
    partitions: bool,
}

/// A thread-safe in-memory backend for exercising driver consumers.
///
/// Documents whose IDs start with `_design/` or `_local/` are treated as
/// design and local documents; partition membership follows the
/// `<partition>:<key>` ID convention.
pub struct MockDatabase {
    name: String,
    state: RwLock<State>,
    security: RwLock<Security>,
    seq: AtomicU64,
    closed: AtomicBool,
    caps: EnabledCapabilities,
}

impl fmt::Debug for MockDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDatabase")
            .field("name", &self.name)
            .field("caps", &self.caps)
            .finish()
    }
}

impl MockDatabase {
    /// Creates a builder for a database with the given name and no optional
    /// capabilities.
    pub fn builder(name: impl Into<String>) -> MockDatabaseBuilder {
        MockDatabaseBuilder {
            name: name.into(),
            caps: EnabledCapabilities::default(),
        }
    }

    /// The database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Backend("database handle closed".to_string()));
        }
        Ok(())
    }

    fn bump_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn next_rev(current: Option<&str>) -> String {
        let generation = current
            .and_then(|rev| rev.split_once('-'))
            .and_then(|(num, _)| num.parse::<u64>().ok())
            .unwrap_or(0);
        format!("{}-{}", generation + 1, Uuid::new_v4().simple())
    }

    fn generation(rev: &str) -> i64 {
        rev.split_once('-')
            .and_then(|(num, _)| num.parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// The revision the caller asserted, from options or the document body.
    fn provided_rev(options: &Options, body: &Value) -> Option<String> {
        options
            .get_str("rev")
            .map(str::to_string)
            .or_else(|| body.get("_rev").and_then(Value::as_str).map(str::to_string))
    }

    fn doc_row(id: &str, doc: &StoredDoc, include_docs: bool) -> Result<Row> {
        Ok(Row {
            id: id.to_string(),
            key: Some(to_raw_value(&id)?),
            value: Some(to_raw_value(&json!({ "rev": doc.rev }))?),
            doc: if include_docs {
                Some(to_raw_value(&doc.body)?)
            } else {
                None
            },
            ..Row::default()
        })
    }

    /// Lists live documents whose ID satisfies `filter`, in ID order.
    async fn listing(
        &self,
        options: &Options,
        filter: impl Fn(&str) -> bool,
    ) -> Result<MockRows> {
        let include_docs = options.get_bool("include_docs").unwrap_or(false);
        let state = self.state.read().await;
        let mut ids: Vec<&String> = state
            .docs
            .iter()
            .filter(|(id, doc)| !doc.deleted && filter(id))
            .map(|(id, _)| id)
            .collect();
        ids.sort();

        let total = ids.len() as i64;
        let mut builder = MockRows::builder()
            .total_rows(total)
            .update_seq(self.seq.load(Ordering::Acquire).to_string());
        for id in ids {
            builder = builder.row(Self::doc_row(id, &state.docs[id], include_docs)?);
        }
        Ok(builder.build())
    }

    async fn mutate_doc(
        &self,
        doc_id: &str,
        options: &Options,
        body: Value,
        delete: bool,
    ) -> Result<String> {
        let mut state = self.state.write().await;
        let current = state.docs.get(doc_id);
        if let Some(existing) = current {
            if !existing.deleted {
                let provided = Self::provided_rev(options, &body);
                if provided.as_deref() != Some(existing.rev.as_str()) {
                    return Err(Error::Backend(format!(
                        "document update conflict: {doc_id}"
                    )));
                }
            }
        } else if delete {
            return Err(Error::NotFound(doc_id.to_string()));
        }

        let rev = Self::next_rev(current.map(|doc| doc.rev.as_str()));
        let attachments = current.map(|doc| doc.attachments.clone()).unwrap_or_default();
        state.docs.insert(
            doc_id.to_string(),
            StoredDoc {
                rev: rev.clone(),
                deleted: delete,
                body,
                attachments,
            },
        );
        let seq = self.bump_seq();
        state.log.push(LogEntry {
            seq,
            id: doc_id.to_string(),
            rev: rev.clone(),
            deleted: delete,
        });
        debug!(doc_id, rev = %rev, deleted = delete, seq, "document written");
        Ok(rev)
    }

    async fn mutate_attachment(
        &self,
        doc_id: &str,
        rev: &str,
        apply: impl FnOnce(&mut HashMap<String, StoredAttachment>, i64),
    ) -> Result<String> {
        let mut state = self.state.write().await;
        let doc = state
            .docs
            .get_mut(doc_id)
            .filter(|doc| !doc.deleted)
            .ok_or_else(|| Error::NotFound(doc_id.to_string()))?;
        if doc.rev != rev {
            return Err(Error::Backend(format!("document update conflict: {doc_id}")));
        }
        let new_rev = Self::next_rev(Some(&doc.rev));
        apply(&mut doc.attachments, Self::generation(&new_rev));
        doc.rev = new_rev.clone();
        let (id, rev_for_log) = (doc_id.to_string(), new_rev.clone());
        let seq = self.bump_seq();
        state.log.push(LogEntry { seq, id, rev: rev_for_log, deleted: false });
        Ok(new_rev)
    }

    async fn find_rows(&self, query: Value) -> Result<Box<dyn Rows>> {
        self.ensure_open()?;
        let selector = query.get("selector").cloned().unwrap_or(query);
        let criteria = match selector.as_object() {
            Some(map) => map.clone(),
            None => {
                return Err(Error::Decode("selector must be an object".to_string()));
            }
        };

        let state = self.state.read().await;
        let mut ids: Vec<&String> = state
            .docs
            .iter()
            .filter(|(_, doc)| {
                !doc.deleted
                    && criteria
                        .iter()
                        .all(|(field, expected)| doc.body.get(field) == Some(expected))
            })
            .map(|(id, _)| id)
            .collect();
        ids.sort();

        // No index is ever consulted, which is exactly what the warning side
        // channel exists to report.
        let mut builder = MockRows::builder()
            .total_rows(ids.len() as i64)
            .warning("no matching index found, create an index to optimize query time");
        for id in ids {
            builder = builder.row(Self::doc_row(id, &state.docs[id], true)?);
        }
        Ok(Box::new(builder.build()))
    }

    async fn index_list(&self) -> Result<Vec<Index>> {
        self.ensure_open()?;
        let state = self.state.read().await;
        let mut indexes = vec![Index {
            design_doc: String::new(),
            name: "_all_docs".to_string(),
            kind: "special".to_string(),
            definition: json!({"fields": [{"_id": "asc"}]}),
        }];
        indexes.extend(state.indexes.iter().cloned());
        Ok(indexes)
    }

    async fn index_create(&self, ddoc: &str, name: &str, index: Value) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        state.indexes.push(Index {
            design_doc: ddoc.to_string(),
            name: name.to_string(),
            kind: "json".to_string(),
            definition: index,
        });
        debug!(ddoc, name, "index created");
        Ok(())
    }

    async fn index_delete(&self, ddoc: &str, name: &str) -> Result<()> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        let before = state.indexes.len();
        state
            .indexes
            .retain(|index| !(index.design_doc == ddoc && index.name == name));
        if state.indexes.len() == before {
            return Err(Error::NotFound(format!("{ddoc}/{name}")));
        }
        Ok(())
    }

    async fn plan(&self, query: Value) -> Result<QueryPlan> {
        self.ensure_open()?;
        let selector = query.get("selector").cloned().unwrap_or(query);
        Ok(QueryPlan {
            dbname: self.name.clone(),
            selector,
            limit: 25,
            ..QueryPlan::default()
        })
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn all_docs(&self, options: Options) -> Result<Box<dyn Rows>> {
        self.ensure_open()?;
        let rows = self
            .listing(&options, |id| !id.starts_with("_local/"))
            .await?;
        Ok(Box::new(rows))
    }

    async fn get(&self, doc_id: &str, _options: Options) -> Result<Document> {
        self.ensure_open()?;
        let state = self.state.read().await;
        let doc = state
            .docs
            .get(doc_id)
            .filter(|doc| !doc.deleted)
            .ok_or_else(|| Error::NotFound(doc_id.to_string()))?;
        let body = to_raw_value(&doc.body)?;
        Ok(Document {
            rev: doc.rev.clone(),
            content_length: body.get().len() as i64,
            body: Some(body),
            body_reader: None,
        })
    }

    async fn create_doc(&self, doc: Value, options: Options) -> Result<(String, String)> {
        self.ensure_open()?;
        let doc_id = Uuid::new_v4().simple().to_string();
        let rev = self.mutate_doc(&doc_id, &options, doc, false).await?;
        Ok((doc_id, rev))
    }

    async fn put(&self, doc_id: &str, doc: Value, options: Options) -> Result<String> {
        self.ensure_open()?;
        self.mutate_doc(doc_id, &options, doc, false).await
    }

    async fn delete(&self, doc_id: &str, rev: &str, options: Options) -> Result<String> {
        self.ensure_open()?;
        let options = options.with("rev", rev);
        self.mutate_doc(doc_id, &options, json!({}), true).await
    }

    async fn stats(&self) -> Result<DbStats> {
        self.ensure_open()?;
        let state = self.state.read().await;
        let mut doc_count = 0;
        let mut deleted_count = 0;
        let mut disk_size = 0;
        for doc in state.docs.values() {
            if doc.deleted {
                deleted_count += 1;
            } else {
                doc_count += 1;
                disk_size += doc.body.to_string().len() as i64;
            }
        }
        Ok(DbStats {
            name: self.name.clone(),
            doc_count,
            deleted_count,
            update_seq: self.seq.load(Ordering::Acquire).to_string(),
            disk_size,
            active_size: disk_size,
            external_size: disk_size,
            ..DbStats::default()
        })
    }

    async fn compact(&self) -> Result<()> {
        self.ensure_open()?;
        debug!(db = %self.name, "compaction triggered");
        Ok(())
    }

    async fn compact_view(&self, ddoc_id: &str) -> Result<()> {
        self.ensure_open()?;
        debug!(db = %self.name, ddoc_id, "view compaction triggered");
        Ok(())
    }

    async fn view_cleanup(&self) -> Result<()> {
        self.ensure_open()?;
        debug!(db = %self.name, "view cleanup triggered");
        Ok(())
    }

    async fn security(&self) -> Result<Security> {
        self.ensure_open()?;
        Ok(self.security.read().await.clone())
    }

    async fn set_security(&self, security: Security) -> Result<()> {
        self.ensure_open()?;
        *self.security.write().await = security;
        Ok(())
    }

    async fn changes(&self, options: Options) -> Result<Box<dyn Changes>> {
        self.ensure_open()?;
        let include_docs = options.get_bool("include_docs").unwrap_or(false);
        let since: u64 = options
            .get_str("since")
            .and_then(|s| s.parse().ok())
            .or_else(|| options.get_i64("since").map(|n| n.max(0) as u64))
            .unwrap_or(0);

        let state = self.state.read().await;
        // The feed reports only the latest change per document.
        let mut latest: HashMap<&str, &LogEntry> = HashMap::new();
        for entry in &state.log {
            latest.insert(entry.id.as_str(), entry);
        }
        let mut entries: Vec<&LogEntry> = latest
            .into_values()
            .filter(|entry| entry.seq > since)
            .collect();
        entries.sort_by_key(|entry| entry.seq);

        let mut builder = MockChanges::builder()
            .last_seq(since.to_string())
            .etag(format!("mock-{}", self.seq.load(Ordering::Acquire)));
        for entry in &entries {
            let doc = if !include_docs {
                None
            } else if entry.deleted {
                Some(to_raw_value(&json!({"_id": entry.id, "_deleted": true}))?)
            } else {
                state
                    .docs
                    .get(&entry.id)
                    .map(|doc| to_raw_value(&doc.body))
                    .transpose()?
            };
            builder = builder.change(Change {
                id: entry.id.clone(),
                seq: entry.seq.to_string(),
                deleted: entry.deleted,
                changes: ChangedRevs::from(vec![entry.rev.clone()]),
                doc,
            });
        }
        Ok(Box::new(builder.build()))
    }

    async fn put_attachment(
        &self,
        doc_id: &str,
        rev: &str,
        attachment: Attachment,
        _options: Options,
    ) -> Result<String> {
        self.ensure_open()?;
        let mut attachment = attachment;
        let mut data = Vec::new();
        if let Some(mut content) = attachment.content.take() {
            content.read_to_end(&mut data).await?;
        }
        let digest = format!("mock-{}", data.len());
        let filename = attachment.filename.clone();
        let content_type = attachment.content_type.clone();
        self.mutate_attachment(doc_id, rev, move |attachments, rev_pos| {
            attachments.insert(
                filename,
                StoredAttachment { content_type, digest, rev_pos, data },
            );
        })
        .await
    }

    async fn get_attachment(
        &self,
        doc_id: &str,
        filename: &str,
        _options: Options,
    ) -> Result<Attachment> {
        self.ensure_open()?;
        let state = self.state.read().await;
        let doc = state
            .docs
            .get(doc_id)
            .filter(|doc| !doc.deleted)
            .ok_or_else(|| Error::NotFound(doc_id.to_string()))?;
        let stored = doc
            .attachments
            .get(filename)
            .ok_or_else(|| Error::NotFound(filename.to_string()))?;
        Ok(Attachment {
            filename: filename.to_string(),
            content_type: stored.content_type.clone(),
            digest: stored.digest.clone(),
            rev_pos: stored.rev_pos,
            size: stored.data.len() as i64,
            stub: false,
            content: Some(Box::pin(futures::io::Cursor::new(stored.data.clone()))),
        })
    }

    async fn delete_attachment(
        &self,
        doc_id: &str,
        rev: &str,
        filename: &str,
        _options: Options,
    ) -> Result<String> {
        self.ensure_open()?;
        let filename = filename.to_string();
        self.mutate_attachment(doc_id, rev, move |attachments, _| {
            attachments.remove(&filename);
        })
        .await
    }

    async fn query(&self, ddoc: &str, view: &str, _options: Options) -> Result<Box<dyn Rows>> {
        self.ensure_open()?;
        Err(Error::NotFound(format!("_design/{ddoc}/_view/{view}")))
    }

    fn finder(&self) -> Option<&dyn Finder> {
        self.caps.find.then_some(self as &dyn Finder)
    }

    fn opts_finder(&self) -> Option<&dyn OptsFinder> {
        self.caps.find_with_options.then_some(self as &dyn OptsFinder)
    }

    fn flusher(&self) -> Option<&dyn Flusher> {
        self.caps.flush.then_some(self as &dyn Flusher)
    }

    fn copier(&self) -> Option<&dyn Copier> {
        self.caps.copy.then_some(self as &dyn Copier)
    }

    fn meta_getter(&self) -> Option<&dyn MetaGetter> {
        self.caps.get_meta.then_some(self as &dyn MetaGetter)
    }

    fn bulk_getter(&self) -> Option<&dyn BulkGetter> {
        self.caps.bulk_get.then_some(self as &dyn BulkGetter)
    }

    fn bulk_docer(&self) -> Option<&dyn BulkDocer> {
        self.caps.bulk_docs.then_some(self as &dyn BulkDocer)
    }

    fn revs_differ(&self) -> Option<&dyn RevsDiffer> {
        self.caps.revs_diff.then_some(self as &dyn RevsDiffer)
    }

    fn closer(&self) -> Option<&dyn DatabaseCloser> {
        self.caps.close.then_some(self as &dyn DatabaseCloser)
    }

    fn purger(&self) -> Option<&dyn Purger> {
        self.caps.purge.then_some(self as &dyn Purger)
    }

    fn design_docer(&self) -> Option<&dyn DesignDocer> {
        self.caps.design_docs.then_some(self as &dyn DesignDocer)
    }

    fn local_docer(&self) -> Option<&dyn LocalDocer> {
        self.caps.local_docs.then_some(self as &dyn LocalDocer)
    }

    fn attachment_meta_getter(&self) -> Option<&dyn AttachmentMetaGetter> {
        self.caps.attachment_meta.then_some(self as &dyn AttachmentMetaGetter)
    }

    fn partitioned(&self) -> Option<&dyn Partitioned> {
        self.caps.partitions.then_some(self as &dyn Partitioned)
    }
}

#[async_trait]
impl Finder for MockDatabase {
    async fn create_index(&self, ddoc: &str, name: &str, index: Value) -> Result<()> {
        self.index_create(ddoc, name, index).await
    }

    async fn delete_index(&self, ddoc: &str, name: &str) -> Result<()> {
        self.index_delete(ddoc, name).await
    }

    async fn find(&self, query: Value) -> Result<Box<dyn Rows>> {
        self.find_rows(query).await
    }

    async fn get_indexes(&self) -> Result<Vec<Index>> {
        self.index_list().await
    }

    async fn explain(&self, query: Value) -> Result<QueryPlan> {
        self.plan(query).await
    }
}

#[async_trait]
impl OptsFinder for MockDatabase {
    async fn create_index(
        &self,
        ddoc: &str,
        name: &str,
        index: Value,
        _options: Options,
    ) -> Result<()> {
        self.index_create(ddoc, name, index).await
    }

    async fn delete_index(&self, ddoc: &str, name: &str, _options: Options) -> Result<()> {
        self.index_delete(ddoc, name).await
    }

    async fn find(&self, query: Value, _options: Options) -> Result<Box<dyn Rows>> {
        self.find_rows(query).await
    }

    async fn get_indexes(&self, _options: Options) -> Result<Vec<Index>> {
        self.index_list().await
    }

    async fn explain(&self, query: Value, _options: Options) -> Result<QueryPlan> {
        self.plan(query).await
    }
}

#[async_trait]
impl Flusher for MockDatabase {
    async fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        debug!(db = %self.name, "flush");
        Ok(())
    }
}

#[async_trait]
impl Copier for MockDatabase {
    async fn copy(&self, target: &str, source: &str, _options: Options) -> Result<String> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        let source_doc = state
            .docs
            .get(source)
            .filter(|doc| !doc.deleted)
            .cloned()
            .ok_or_else(|| Error::NotFound(source.to_string()))?;
        if state.docs.get(target).is_some_and(|doc| !doc.deleted) {
            return Err(Error::Backend(format!("document update conflict: {target}")));
        }
        let rev = Self::next_rev(None);
        state.docs.insert(
            target.to_string(),
            StoredDoc { rev: rev.clone(), ..source_doc },
        );
        let seq = self.bump_seq();
        state.log.push(LogEntry {
            seq,
            id: target.to_string(),
            rev: rev.clone(),
            deleted: false,
        });
        Ok(rev)
    }
}

#[async_trait]
impl MetaGetter for MockDatabase {
    async fn get_meta(&self, doc_id: &str, _options: Options) -> Result<(i64, String)> {
        self.ensure_open()?;
        let state = self.state.read().await;
        let doc = state
            .docs
            .get(doc_id)
            .filter(|doc| !doc.deleted)
            .ok_or_else(|| Error::NotFound(doc_id.to_string()))?;
        Ok((doc.body.to_string().len() as i64, doc.rev.clone()))
    }
}

#[async_trait]
impl BulkGetter for MockDatabase {
    async fn bulk_get(
        &self,
        refs: &[BulkGetReference],
        options: Options,
    ) -> Result<Box<dyn Rows>> {
        self.ensure_open()?;
        let include_docs = options.get_bool("include_docs").unwrap_or(true);
        let state = self.state.read().await;
        let mut builder = MockRows::builder().total_rows(refs.len() as i64);
        for reference in refs {
            let found = state
                .docs
                .get(&reference.id)
                .filter(|doc| !doc.deleted)
                .filter(|doc| reference.rev.is_empty() || doc.rev == reference.rev);
            builder = builder.row(match found {
                Some(doc) => Self::doc_row(&reference.id, doc, include_docs)?,
                // A missing entry is a row-level failure; later refs still
                // produce rows.
                None => Row {
                    id: reference.id.clone(),
                    error: Some(Error::NotFound(reference.id.clone())),
                    ..Row::default()
                },
            });
        }
        Ok(Box::new(builder.build()))
    }
}

#[async_trait]
impl BulkDocer for MockDatabase {
    async fn bulk_docs(&self, docs: &[Value], options: Options) -> Result<Vec<BulkResult>> {
        self.ensure_open()?;
        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            let doc_id = doc
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
            // A failing entry is reported in its result slot; the rest of the
            // batch is still attempted.
            results.push(match self.mutate_doc(&doc_id, &options, doc.clone(), false).await {
                Ok(rev) => BulkResult { id: doc_id, rev, error: None },
                Err(err) => BulkResult { id: doc_id, error: Some(err), ..BulkResult::default() },
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl RevsDiffer for MockDatabase {
    async fn revs_diff(&self, rev_map: Value) -> Result<Box<dyn Rows>> {
        self.ensure_open()?;
        let map = rev_map
            .as_object()
            .ok_or_else(|| Error::Decode("revision map must be an object".to_string()))?;
        let state = self.state.read().await;
        let mut builder = MockRows::builder();
        let mut ids: Vec<&String> = map.keys().collect();
        ids.sort();
        for id in ids {
            let candidates: Vec<&str> = map[id]
                .as_array()
                .map(|revs| revs.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let current = state.docs.get(id.as_str()).map(|doc| doc.rev.as_str());
            let missing: Vec<&str> = candidates
                .into_iter()
                .filter(|rev| Some(*rev) != current)
                .collect();
            if missing.is_empty() {
                continue;
            }
            builder = builder.row(Row {
                id: id.clone(),
                key: Some(to_raw_value(&id)?),
                value: Some(to_raw_value(&json!({ "missing": missing }))?),
                ..Row::default()
            });
        }
        Ok(Box::new(builder.build()))
    }
}

#[async_trait]
impl DatabaseCloser for MockDatabase {
    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        debug!(db = %self.name, "database handle closed");
        Ok(())
    }
}

#[async_trait]
impl Purger for MockDatabase {
    async fn purge(&self, doc_revs: &HashMap<String, Vec<String>>) -> Result<PurgeResult> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        let mut purged: HashMap<String, Vec<String>> = HashMap::new();
        for (id, revs) in doc_revs {
            let Some(doc) = state.docs.get(id) else { continue };
            if revs.iter().any(|rev| *rev == doc.rev) {
                let rev = doc.rev.clone();
                state.docs.remove(id);
                state.purge_seq += 1;
                purged.insert(id.clone(), vec![rev]);
            }
        }
        debug!(db = %self.name, count = purged.len(), "revisions purged");
        Ok(PurgeResult { seq: state.purge_seq, purged })
    }
}

#[async_trait]
impl DesignDocer for MockDatabase {
    async fn design_docs(&self, options: Options) -> Result<Box<dyn Rows>> {
        self.ensure_open()?;
        let rows = self
            .listing(&options, |id| id.starts_with("_design/"))
            .await?;
        Ok(Box::new(rows))
    }
}

#[async_trait]
impl LocalDocer for MockDatabase {
    async fn local_docs(&self, options: Options) -> Result<Box<dyn Rows>> {
        self.ensure_open()?;
        let rows = self
            .listing(&options, |id| id.starts_with("_local/"))
            .await?;
        Ok(Box::new(rows))
    }
}

#[async_trait]
impl AttachmentMetaGetter for MockDatabase {
    async fn attachment_meta(
        &self,
        doc_id: &str,
        filename: &str,
        _options: Options,
    ) -> Result<Attachment> {
        self.ensure_open()?;
        let state = self.state.read().await;
        let doc = state
            .docs
            .get(doc_id)
            .filter(|doc| !doc.deleted)
            .ok_or_else(|| Error::NotFound(doc_id.to_string()))?;
        let stored = doc
            .attachments
            .get(filename)
            .ok_or_else(|| Error::NotFound(filename.to_string()))?;
        Ok(Attachment {
            filename: filename.to_string(),
            content_type: stored.content_type.clone(),
            digest: stored.digest.clone(),
            rev_pos: stored.rev_pos,
            size: stored.data.len() as i64,
            stub: true,
            content: None,
        })
    }
}

#[async_trait]
impl Partitioned for MockDatabase {
    async fn partition_stats(&self, name: &str) -> Result<PartitionStats> {
        self.ensure_open()?;
        let prefix = format!("{name}:");
        let state = self.state.read().await;
        let mut doc_count = 0;
        let mut deleted_doc_count = 0;
        let mut active_size = 0;
        for (id, doc) in &state.docs {
            if !id.starts_with(&prefix) {
                continue;
            }
            if doc.deleted {
                deleted_doc_count += 1;
            } else {
                doc_count += 1;
                active_size += doc.body.to_string().len() as i64;
            }
        }
        let raw = json!({
            "db_name": self.name,
            "doc_count": doc_count,
            "doc_del_count": deleted_doc_count,
            "partition": name,
            "sizes": { "active": active_size, "external": active_size },
        });
        Ok(PartitionStats {
            db_name: self.name.clone(),
            doc_count,
            deleted_doc_count,
            partition: name.to_string(),
            active_size,
            external_size: active_size,
            raw_response: Some(to_raw_value(&raw)?),
        })
    }
}

/// Assembles a [`MockDatabase`] with an explicit optional-capability set.
///
/// Capabilities default to absent; each `with_*` method adds one. The builder
/// intentionally allows assembling an invalid set (both finder flavors) so
/// that probe validation can be exercised.
pub struct MockDatabaseBuilder {
    name: String,
    caps: EnabledCapabilities,
}

impl MockDatabaseBuilder {
    /// Exposes the `Finder` capability.
    pub fn with_find(mut self) -> Self {
        self.caps.find = true;
        self
    }

    /// Exposes the `OptsFinder` capability.
    pub fn with_find_with_options(mut self) -> Self {
        self.caps.find_with_options = true;
        self
    }

    /// Exposes the `Flusher` capability.
    pub fn with_flush(mut self) -> Self {
        self.caps.flush = true;
        self
    }

    /// Exposes the `Copier` capability.
    pub fn with_copy(mut self) -> Self {
        self.caps.copy = true;
        self
    }

    /// Exposes the `MetaGetter` capability.
    pub fn with_get_meta(mut self) -> Self {
        self.caps.get_meta = true;
        self
    }

    /// Exposes the `BulkGetter` capability.
    pub fn with_bulk_get(mut self) -> Self {
        self.caps.bulk_get = true;
        self
    }

    /// Exposes the `BulkDocer` capability.
    pub fn with_bulk_docs(mut self) -> Self {
        self.caps.bulk_docs = true;
        self
    }

    /// Exposes the `RevsDiffer` capability.
    pub fn with_revs_diff(mut self) -> Self {
        self.caps.revs_diff = true;
        self
    }

    /// Exposes the `DatabaseCloser` capability.
    pub fn with_close(mut self) -> Self {
        self.caps.close = true;
        self
    }

    /// Exposes the `Purger` capability.
    pub fn with_purge(mut self) -> Self {
        self.caps.purge = true;
        self
    }

    /// Exposes the `DesignDocer` capability.
    pub fn with_design_docs(mut self) -> Self {
        self.caps.design_docs = true;
        self
    }

    /// Exposes the `LocalDocer` capability.
    pub fn with_local_docs(mut self) -> Self {
        self.caps.local_docs = true;
        self
    }

    /// Exposes the `AttachmentMetaGetter` capability.
    pub fn with_attachment_meta(mut self) -> Self {
        self.caps.attachment_meta = true;
        self
    }

    /// Exposes the `Partitioned` capability.
    pub fn with_partitions(mut self) -> Self {
        self.caps.partitions = true;
        self
    }

    /// Builds the database.
    pub fn build(self) -> MockDatabase {
        MockDatabase {
            name: self.name,
            state: RwLock::new(State::default()),
            security: RwLock::new(Security::default()),
            seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            caps: self.caps,
        }
    }
}
