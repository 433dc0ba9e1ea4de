//! Creating, opening and packing piles.
//!
//! Separate form: `<base>` (contents) + `<base>.pm` (metadata) + `<base>.pi`
//! (indexes), the only writable arrangement. `compound` packs the three into
//! the `<base>` file on 512-B boundaries and rewrites the header; compound
//! files open read-only. Region-relative offsets make the packed regions
//! valid without rewriting a single record.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::info;

use crate::block::{FileKind, Header, RegionKind};
use crate::consts::{BASE_BLOCK_SIZE, HEADER_BLOCK_SIZE, INDEXES_FILE_SUFFIX, METADATA_FILE_SUFFIX};
use crate::contents::ContentStore;
use crate::indexes::IndexStore;
use crate::lock::{self, LockMode};
use crate::metadata::MetadataStore;
use crate::region::Region;

use super::{OpenMode, Pile};

fn sibling(base: &Path, suffix: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

pub(crate) fn metadata_path(base: &Path) -> PathBuf {
    sibling(base, METADATA_FILE_SUFFIX)
}

pub(crate) fn indexes_path(base: &Path) -> PathBuf {
    sibling(base, INDEXES_FILE_SUFFIX)
}

fn read_file_kind(path: &Path) -> Result<FileKind> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut buf = [0u8; HEADER_BLOCK_SIZE];
    f.read_exact(&mut buf).context("read pile header")?;
    Ok(Header::unpack(&buf)?.kind)
}

impl Pile {
    /// Create an empty pile in separate form.
    pub fn create(base: &Path) -> Result<()> {
        ContentStore::create(base)?;
        MetadataStore::create(&metadata_path(base))?;
        IndexStore::create(&indexes_path(base))?;
        info!("created pile at {}", base.display());
        Ok(())
    }

    pub fn open(base: &Path, mode: OpenMode) -> Result<Pile> {
        let kind = read_file_kind(base)?;
        let readonly = match (kind, mode) {
            (FileKind::Contents, OpenMode::ReadWrite) => false,
            (FileKind::Contents, OpenMode::ReadOnly) => true,
            (FileKind::Compound | FileKind::Lookup, OpenMode::ReadOnly) => true,
            (FileKind::Compound | FileKind::Lookup, OpenMode::ReadWrite) => {
                return Err(anyhow!("{} files are read-only", kind.name()))
            }
            (FileKind::Metadata | FileKind::Indexes, _) => {
                return Err(anyhow!(
                    "open the contents file of the pile, not its {} file",
                    kind.name()
                ))
            }
        };
        let lock_mode = if readonly { LockMode::Shared } else { LockMode::Exclusive };
        let lock = lock::acquire(base, lock_mode)?;

        let (contents, metadata, indexes) = match kind {
            FileKind::Contents => {
                let contents = Region::open_path(base, RegionKind::Contents, readonly)?;
                let metadata =
                    Region::open_path(&metadata_path(base), RegionKind::Metadata, readonly)?;
                let indexes =
                    Region::open_path(&indexes_path(base), RegionKind::Indexes, readonly)?;
                (contents, metadata, indexes)
            }
            FileKind::Compound => {
                let open_one = |kind| -> Result<Region> {
                    let f = File::open(base).with_context(|| format!("open {}", base.display()))?;
                    Region::open(f, kind, true)
                };
                (
                    open_one(RegionKind::Contents)?,
                    open_one(RegionKind::Metadata)?,
                    open_one(RegionKind::Indexes)?,
                )
            }
            FileKind::Lookup => {
                return Err(anyhow!("lookup piles carry no contents region"));
            }
            FileKind::Metadata | FileKind::Indexes => unreachable!(),
        };

        Ok(Pile {
            contents: ContentStore::open(contents),
            metadata: MetadataStore::open(metadata),
            indexes: IndexStore::open(indexes)?,
            kind,
            readonly,
            compression: Default::default(),
            checksum: Default::default(),
            in_flight: None,
            space_available: 0,
            _lock: lock,
        })
    }

    /// Pack a separate-form pile into one compound file, in place on `<base>`.
    /// The `.pm`/`.pi` files are left untouched and become stale.
    pub fn compound(base: &Path) -> Result<()> {
        let _lock = lock::acquire(base, LockMode::Exclusive)?;
        if read_file_kind(base)? != FileKind::Contents {
            return Err(anyhow!("{} is not a separate-form contents file", base.display()));
        }

        let mut out = OpenOptions::new()
            .read(true)
            .write(true)
            .open(base)
            .with_context(|| format!("open {}", base.display()))?;
        let mut buf = [0u8; HEADER_BLOCK_SIZE];
        out.read_exact(&mut buf)?;
        let mut header = Header::unpack(&buf)?;

        // regions start on base block boundaries
        let mut pos = out.seek(SeekFrom::End(0))?;
        let tail = pos % BASE_BLOCK_SIZE as u64;
        if tail != 0 {
            let pad = vec![0u8; (BASE_BLOCK_SIZE as u64 - tail) as usize];
            out.write_all(&pad)?;
            pos += pad.len() as u64;
        }

        header.ofs_metadata = pos;
        pos += copy_region(&metadata_path(base), RegionKind::Metadata, &mut out)?;
        let tail = pos % BASE_BLOCK_SIZE as u64;
        if tail != 0 {
            let pad = vec![0u8; (BASE_BLOCK_SIZE as u64 - tail) as usize];
            out.write_all(&pad)?;
            pos += pad.len() as u64;
        }
        header.ofs_indexes = pos;
        copy_region(&indexes_path(base), RegionKind::Indexes, &mut out)?;

        header.kind = FileKind::Compound;
        out.seek(SeekFrom::Start(0))?;
        out.write_all(&header.pack())?;
        out.sync_all().context("fsync compound file")?;
        info!("packed {} into a compound file", base.display());
        Ok(())
    }
}

/// Append one region (its recorded length, section block included) to `out`.
fn copy_region(path: &Path, kind: RegionKind, out: &mut File) -> Result<u64> {
    let mut src = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut buf = [0u8; HEADER_BLOCK_SIZE];
    src.read_exact(&mut buf)?;
    let header = Header::unpack(&buf)?;
    let base = header.region_offset(kind);
    if base == 0 {
        return Err(anyhow!("{} has no {:?} region", path.display(), kind));
    }
    src.seek(SeekFrom::Start(base))?;
    let mut section_buf = [0u8; BASE_BLOCK_SIZE];
    src.read_exact(&mut section_buf)?;
    let section = crate::block::Section::unpack(&section_buf)?;

    src.seek(SeekFrom::Start(base))?;
    let mut limited = (&mut src).take(section.length);
    let copied = std::io::copy(&mut limited, out)
        .with_context(|| format!("copy region from {}", path.display()))?;
    if copied != section.length {
        return Err(anyhow!(
            "{}: region truncated ({} of {} bytes)",
            path.display(),
            copied,
            section.length
        ));
    }
    Ok(copied)
}
