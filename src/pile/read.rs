//! Reading entries back: lookup by indexed attribute, descriptor fetch,
//! ranged content reads and the lazy entry iterator.

use anyhow::Result;

use crate::block::MetadataRecord;

use super::Pile;

impl Pile {
    /// Metadata offsets of every entry whose indexed attribute `name` equals
    /// `value`, in insertion order. `Ok(None)` when the attribute has no
    /// index at all.
    pub fn lookup(&mut self, name: &str, value: &[u8]) -> Result<Option<Vec<u64>>> {
        self.indexes.find(name, value)
    }

    /// The entry descriptor stored at a metadata offset.
    pub fn entry(&mut self, metadata_offset: u64) -> Result<MetadataRecord> {
        self.metadata.get(metadata_offset)
    }

    /// `length` bytes of the entry starting at `offset` in its uncompressed
    /// byte space; clipped at the entry end.
    pub fn read_content(&mut self, desc: &MetadataRecord, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.contents.read(desc, offset, length)
    }

    /// The entry's whole content.
    pub fn content(&mut self, desc: &MetadataRecord) -> Result<Vec<u8>> {
        self.contents.read(desc, 0, desc.len_original)
    }

    /// Recompute chunk checksums of an entry against its stored table.
    /// Returns the number of chunks verified.
    pub fn verify_content(&mut self, desc: &MetadataRecord) -> Result<u32> {
        self.contents.verify(desc)
    }

    /// Iterate every entry in storage order. Descriptors are fetched lazily,
    /// one record per step.
    pub fn entries(&mut self) -> Entries<'_> {
        Entries {
            pile: self,
            current: None,
            started: false,
        }
    }
}

pub struct Entries<'a> {
    pile: &'a mut Pile,
    current: Option<MetadataRecord>,
    started: bool,
}

impl Iterator for Entries<'_> {
    type Item = Result<MetadataRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let step = if !self.started {
            self.started = true;
            self.pile.metadata.first()
        } else {
            match &self.current {
                Some(current) => self.pile.metadata.next(current),
                None => return None,
            }
        };
        match step {
            Ok(Some(rec)) => {
                self.current = Some(rec.clone());
                Some(Ok(rec))
            }
            Ok(None) => {
                self.current = None;
                None
            }
            Err(e) => {
                self.current = None;
                Some(Err(e))
            }
        }
    }
}
