//! Runtime capability detection for backend instances.
//!
//! Optional backend functionality is modelled as separate traits (see
//! [`crate::db`]) discovered dynamically: each capability has an accessor hook
//! on [`Database`] that defaults to `None`. [`Capabilities::probe`] queries
//! every hook once for a given backend instance and caches the answers, so a
//! client constructed over that backend never re-probes per call.
//!
//! Probing is a read-only check with no side effects and requires no
//! synchronization.

use std::fmt;

use crate::db::Database;
use crate::error::{Error, Result};

/// One independently optional piece of backend functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Query-by-selector and index management ([`crate::db::Finder`]).
    Find,
    /// Query-by-selector with per-call options ([`crate::db::OptsFinder`]).
    FindWithOptions,
    /// Durability buffer flush ([`crate::db::Flusher`]).
    Flush,
    /// Server-side document copy ([`crate::db::Copier`]).
    Copy,
    /// Metadata-only document check ([`crate::db::MetaGetter`]).
    GetMeta,
    /// Multi-document fetch ([`crate::db::BulkGetter`]).
    BulkGet,
    /// Multi-document write ([`crate::db::BulkDocer`]).
    BulkDocs,
    /// Revision-map difference ([`crate::db::RevsDiffer`]).
    RevsDiff,
    /// Explicit handle teardown ([`crate::db::DatabaseCloser`]).
    Close,
    /// Permanent revision purge ([`crate::db::Purger`]).
    Purge,
    /// Design-document listing ([`crate::db::DesignDocer`]).
    DesignDocs,
    /// Local-document listing ([`crate::db::LocalDocer`]).
    LocalDocs,
    /// Attachment metadata retrieval ([`crate::db::AttachmentMetaGetter`]).
    AttachmentMeta,
    /// Partition statistics ([`crate::partition::Partitioned`]).
    Partitions,
}

impl Capability {
    /// All known capabilities, in declaration order.
    pub const ALL: [Capability; 14] = [
        Capability::Find,
        Capability::FindWithOptions,
        Capability::Flush,
        Capability::Copy,
        Capability::GetMeta,
        Capability::BulkGet,
        Capability::BulkDocs,
        Capability::RevsDiff,
        Capability::Close,
        Capability::Purge,
        Capability::DesignDocs,
        Capability::LocalDocs,
        Capability::AttachmentMeta,
        Capability::Partitions,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Find => "find",
            Capability::FindWithOptions => "find-with-options",
            Capability::Flush => "flush",
            Capability::Copy => "copy",
            Capability::GetMeta => "get-meta",
            Capability::BulkGet => "bulk-get",
            Capability::BulkDocs => "bulk-docs",
            Capability::RevsDiff => "revs-diff",
            Capability::Close => "close",
            Capability::Purge => "purge",
            Capability::DesignDocs => "design-docs",
            Capability::LocalDocs => "local-docs",
            Capability::AttachmentMeta => "attachment-meta",
            Capability::Partitions => "partitions",
        };
        f.write_str(name)
    }
}

/// The cached capability set of one backend instance.
///
/// Built once per instance; clients consult it instead of re-probing the
/// backend on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
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

impl Capabilities {
    /// Probes every optional capability of `db` exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBackend`] if the backend implements both finder
    /// flavors, which are mutually exclusive by convention.
    pub fn probe(db: &dyn Database) -> Result<Self> {
        let caps = Self {
            find: db.finder().is_some(),
            find_with_options: db.opts_finder().is_some(),
            flush: db.flusher().is_some(),
            copy: db.copier().is_some(),
            get_meta: db.meta_getter().is_some(),
            bulk_get: db.bulk_getter().is_some(),
            bulk_docs: db.bulk_docer().is_some(),
            revs_diff: db.revs_differ().is_some(),
            close: db.closer().is_some(),
            purge: db.purger().is_some(),
            design_docs: db.design_docer().is_some(),
            local_docs: db.local_docer().is_some(),
            attachment_meta: db.attachment_meta_getter().is_some(),
            partitions: db.partitioned().is_some(),
        };
        if caps.find && caps.find_with_options {
            return Err(Error::InvalidBackend(
                "backend implements both finder flavors".to_string(),
            ));
        }
        Ok(caps)
    }

    /// Returns whether the backend supports the given capability.
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Find => self.find,
            Capability::FindWithOptions => self.find_with_options,
            Capability::Flush => self.flush,
            Capability::Copy => self.copy,
            Capability::GetMeta => self.get_meta,
            Capability::BulkGet => self.bulk_get,
            Capability::BulkDocs => self.bulk_docs,
            Capability::RevsDiff => self.revs_diff,
            Capability::Close => self.close,
            Capability::Purge => self.purge,
            Capability::DesignDocs => self.design_docs,
            Capability::LocalDocs => self.local_docs,
            Capability::AttachmentMeta => self.attachment_meta,
            Capability::Partitions => self.partitions,
        }
    }

    /// Maps absence of a capability to [`Error::Unsupported`].
    ///
    /// The client layer calls this before invoking an optional operation, so
    /// an unsupported call fails with a specific error kind instead of
    /// faulting.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(Error::Unsupported)
        }
    }

    /// Lists the capabilities the backend supports, in declaration order.
    pub fn list(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.supports(*c))
            .collect()
    }
}
