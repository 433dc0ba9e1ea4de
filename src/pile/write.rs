//! Storing entries: one-shot `add` or streaming begin/transfer/commit.

use anyhow::{anyhow, Result};
use log::debug;

use crate::block::{Attribute, MetadataRecord};
use crate::consts::ATTR_COUNT_MAX;

use super::Pile;

impl Pile {
    /// Store a complete in-memory entry. Returns the entry's metadata offset.
    pub fn add(&mut self, data: &[u8], attributes: Vec<Attribute>) -> Result<u64> {
        self.begin(attributes, data.len() as u64)?;
        self.transfer(data)?;
        self.commit()
    }

    /// Start a streamed entry. `declared_length` sizes the chunks and is
    /// checked against the remaining capacity up front.
    pub fn begin(&mut self, attributes: Vec<Attribute>, declared_length: u64) -> Result<()> {
        self.check_writable()?;
        if self.in_flight.is_some() {
            return Err(anyhow!("an entry transfer is already in progress"));
        }
        let attributes = normalize_attributes(attributes)?;
        let mut desc = MetadataRecord::new(self.compression, self.checksum);
        desc.attributes = attributes;
        self.contents.begin(declared_length, &mut desc)?;
        self.space_available = self.contents.available();
        self.in_flight = Some(desc);
        Ok(())
    }

    pub fn transfer(&mut self, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        let desc = self
            .in_flight
            .as_mut()
            .ok_or_else(|| anyhow!("transfer without begin"))?;
        if data.len() as u64 > self.space_available {
            return Err(anyhow!("entry data exceeds remaining pile capacity"));
        }
        self.contents.transfer(data, desc)?;
        self.space_available -= data.len() as u64;
        Ok(())
    }

    /// Finish the entry: contents first, then its metadata record, then the
    /// indexes. Returns the metadata offset (the entry id).
    pub fn commit(&mut self) -> Result<u64> {
        self.check_writable()?;
        let mut desc = self
            .in_flight
            .take()
            .ok_or_else(|| anyhow!("commit without begin"))?;
        self.contents.commit(&mut desc)?;
        let offset = self.metadata.add(&mut desc)?;
        self.indexes.index_entry(&desc)?;
        debug!(
            "committed entry at {} ({} bytes, {} attributes)",
            offset,
            desc.len_original,
            desc.attributes.len()
        );
        Ok(offset)
    }
}

/// Validate every attribute and collapse duplicate names, keeping the last
/// occurrence.
fn normalize_attributes(attributes: Vec<Attribute>) -> Result<Vec<Attribute>> {
    let mut out: Vec<Attribute> = Vec::with_capacity(attributes.len());
    for attr in attributes {
        attr.validate()?;
        if let Some(existing) = out.iter_mut().find(|a| a.name == attr.name) {
            *existing = attr;
        } else {
            out.push(attr);
        }
    }
    if out.len() > ATTR_COUNT_MAX {
        return Err(anyhow!("more than {} attributes on one entry", ATTR_COUNT_MAX));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_attribute_names_keep_last() {
        let attrs = vec![
            Attribute::new("k", b"first".to_vec(), false),
            Attribute::new("other", b"x".to_vec(), false),
            Attribute::new("k", b"second".to_vec(), true),
        ];
        let out = normalize_attributes(attrs).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].value, b"second");
        assert!(out[0].indexed);
    }

    #[test]
    fn invalid_attribute_rejected() {
        let attrs = vec![Attribute::new("k", vec![0u8; 300], true)];
        assert!(normalize_attributes(attrs).is_err());
    }
}
