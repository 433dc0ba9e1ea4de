//! Region accessor: one file handle plus the decoded header and section,
//! with all I/O addressed by region-relative offsets.
//!
//! The base is the absolute offset of the region's section block. In writable
//! mode the append point is derived from the file end; in read-only mode it is
//! the length recorded in the section block, so a compound file can carry
//! trailing regions without confusing earlier ones.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::block::{FileKind, Header, RegionKind, Section};
use crate::consts::{HEADER_BLOCK_SIZE, SECTION_BLOCK_SIZE};

pub struct Region {
    file: File,
    readonly: bool,
    base: u64,
    pub header: Header,
    pub section: Section,
    /// Region-relative append point (= bytes used by the region).
    pub end: u64,
}

impl Region {
    /// Create a fresh single-region file: header block + empty section block.
    pub fn create(path: &Path, file_kind: FileKind, region_kind: RegionKind) -> Result<()> {
        if path.exists() {
            return Err(anyhow!("file already exists: {}", path.display()));
        }
        let mut f = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("create {}", path.display()))?;
        let mut header = Header::new(file_kind);
        header.set_region_offset(region_kind, HEADER_BLOCK_SIZE as u64);
        let section = Section::new(region_kind);
        f.write_all(&header.pack())?;
        f.write_all(&section.pack())?;
        f.sync_all()
            .with_context(|| format!("fsync {}", path.display()))?;
        Ok(())
    }

    /// Open the `region_kind` region of an already-opened pile file.
    pub fn open(mut file: File, region_kind: RegionKind, readonly: bool) -> Result<Region> {
        file.seek(SeekFrom::Start(0))?;
        let mut buf = [0u8; HEADER_BLOCK_SIZE];
        file.read_exact(&mut buf).context("read pile header")?;
        let header = Header::unpack(&buf)?;

        let base = header.region_offset(region_kind);
        if base == 0 {
            return Err(anyhow!("file has no {:?} region", region_kind));
        }
        file.seek(SeekFrom::Start(base))?;
        let mut buf = [0u8; SECTION_BLOCK_SIZE];
        file.read_exact(&mut buf).context("read section block")?;
        let section = Section::unpack(&buf)?;
        if section.kind != region_kind {
            return Err(anyhow!(
                "section kind mismatch: expected {:?}, found {:?}",
                region_kind,
                section.kind
            ));
        }

        let end = if readonly {
            section.length.max(SECTION_BLOCK_SIZE as u64)
        } else {
            let file_len = file.metadata()?.len();
            file_len.saturating_sub(base).max(SECTION_BLOCK_SIZE as u64)
        };
        Ok(Region {
            file,
            readonly,
            base,
            header,
            section,
            end,
        })
    }

    pub fn open_path(path: &Path, region_kind: RegionKind, readonly: bool) -> Result<Region> {
        let file = OpenOptions::new()
            .read(true)
            .write(!readonly)
            .open(path)
            .with_context(|| format!("open {}", path.display()))?;
        Self::open(file, region_kind, readonly)
    }

    #[inline]
    pub fn readonly(&self) -> bool {
        self.readonly
    }

    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(anyhow!("region is read-only"));
        }
        Ok(())
    }

    pub fn read_exact_at(&mut self, ofs: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.base + ofs))?;
        self.file.read_exact(buf).with_context(|| {
            format!("short read at region offset {} ({} bytes)", ofs, buf.len())
        })
    }

    /// Seek to a region-relative offset and hand out the file for streaming
    /// reads (variable-length block decoding).
    pub fn reader_at(&mut self, ofs: u64) -> Result<&mut File> {
        self.file.seek(SeekFrom::Start(self.base + ofs))?;
        Ok(&mut self.file)
    }

    pub fn write_all_at(&mut self, ofs: u64, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        self.file.seek(SeekFrom::Start(self.base + ofs))?;
        self.file
            .write_all(data)
            .with_context(|| format!("write {} bytes at region offset {}", data.len(), ofs))
    }

    /// Append at the region end; returns the region-relative offset written.
    pub fn append(&mut self, data: &[u8]) -> Result<u64> {
        let ofs = self.end;
        self.write_all_at(ofs, data)?;
        self.end += data.len() as u64;
        Ok(ofs)
    }

    /// Claim space at the region end without writing yet (deferred node
    /// write-back). The caller owns filling it before flush.
    pub fn reserve(&mut self, len: u64) -> u64 {
        let ofs = self.end;
        self.end += len;
        ofs
    }

    pub fn write_section(&mut self) -> Result<()> {
        let data = self.section.pack();
        self.write_all_at(0, &data)
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.check_writable()?;
        let data = self.header.pack();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&data).context("write pile header")
    }

    /// Bytes still available under the header's file size limit.
    pub fn available(&self) -> u64 {
        self.header.limit.max_size().saturating_sub(self.base + self.end)
    }

    /// Record the region length in the section block and fsync.
    pub fn flush(&mut self) -> Result<()> {
        if self.readonly {
            return Ok(());
        }
        self.section.length = self.end;
        self.write_section()?;
        self.file.sync_all().context("fsync region file")
    }
}
