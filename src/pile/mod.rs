//! Pile façade: owns the three stores and sequences every operation.
//!
//! Commit order is contents -> metadata -> indexes, and flush follows the
//! same order, so anything the index can return is already durable in the
//! regions it points into.

mod open;
mod read;
mod write;

pub use read::Entries;

use anyhow::{anyhow, Result};

use crate::block::{Checksum, Compression, FileKind, MetadataRecord};
use crate::contents::ContentStore;
use crate::indexes::IndexStore;
use crate::lock::LockGuard;
use crate::metadata::MetadataStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

pub struct Pile {
    pub(crate) contents: ContentStore,
    pub(crate) metadata: MetadataStore,
    pub(crate) indexes: IndexStore,
    kind: FileKind,
    readonly: bool,
    compression: Compression,
    checksum: Checksum,
    in_flight: Option<MetadataRecord>,
    space_available: u64,
    _lock: LockGuard,
}

impl Pile {
    /// Compression for entries stored from now on.
    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    /// Checksumming for entries stored from now on.
    pub fn set_checksum(&mut self, checksum: Checksum) {
        self.checksum = checksum;
    }

    #[inline]
    pub fn readonly(&self) -> bool {
        self.readonly
    }

    #[inline]
    pub fn file_kind(&self) -> FileKind {
        self.kind
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indexes.index_names()
    }

    /// Bytes left under the contents file size limit.
    pub fn space_available(&self) -> u64 {
        self.contents.available()
    }

    /// Bytes occupied by the contents region.
    pub fn space_used(&self) -> u64 {
        self.contents.region.end
    }

    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(anyhow!("pile is open read-only"));
        }
        Ok(())
    }

    /// Make everything stored so far durable.
    pub fn flush(&mut self) -> Result<()> {
        if self.readonly {
            return Ok(());
        }
        self.contents.flush()?;
        self.metadata.flush()?;
        self.indexes.flush()
    }
}

impl Drop for Pile {
    fn drop(&mut self) {
        if !self.readonly {
            if let Err(e) = self.flush() {
                log::error!("flush on close failed: {:#}", e);
            }
        }
    }
}
