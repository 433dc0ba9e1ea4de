//! Metadata store: an append-only log of entry descriptors.
//!
//! Records are appended at the region end and never rewritten. The section's
//! ofsFirst points at the first record; each record's padded lenBlock chains
//! to the next, which makes iteration restartable from any descriptor.

use std::path::Path;

use anyhow::Result;
use log::debug;

use crate::block::{FileKind, MetadataRecord, RegionKind};
use crate::region::Region;

pub struct MetadataStore {
    pub(crate) region: Region,
}

impl MetadataStore {
    pub fn create(path: &Path) -> Result<()> {
        Region::create(path, FileKind::Metadata, RegionKind::Metadata)
    }

    pub fn open(region: Region) -> Self {
        MetadataStore { region }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.region.flush()
    }

    /// Append a record; returns its region-relative offset (the entry id).
    pub fn add(&mut self, desc: &mut MetadataRecord) -> Result<u64> {
        let data = desc.pack();
        let offset = self.region.append(&data)?;
        desc.offset = offset;
        if self.region.section.ofs_first == 0 {
            self.region.section.ofs_first = offset;
            self.region.write_section()?;
        }
        debug!("metadata add: {} bytes at offset {}", data.len(), offset);
        Ok(offset)
    }

    pub fn get(&mut self, offset: u64) -> Result<MetadataRecord> {
        let reader = self.region.reader_at(offset)?;
        let mut rec = MetadataRecord::unpack(reader)?;
        rec.offset = offset;
        Ok(rec)
    }

    pub fn first(&mut self) -> Result<Option<MetadataRecord>> {
        let ofs = self.region.section.ofs_first;
        if ofs == 0 {
            return Ok(None);
        }
        Ok(Some(self.get(ofs)?))
    }

    pub fn next(&mut self, current: &MetadataRecord) -> Result<Option<MetadataRecord>> {
        let ofs = current.offset + current.len_block as u64;
        if ofs >= self.region.end {
            return Ok(None);
        }
        Ok(Some(self.get(ofs)?))
    }
}
