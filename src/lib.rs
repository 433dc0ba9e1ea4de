//! piledb — an embedded, file-based data pile.
//!
//! Entries are arbitrarily large byte streams stored as fixed-size chunks
//! (optionally compressed and checksummed) with named attributes; indexed
//! attributes get a per-name B+-tree for exact-match lookup. One pile is
//! three files (`<base>`, `<base>.pm`, `<base>.pi`) while writable, or one
//! read-only compound file.
//!
//! ```no_run
//! use piledb::{Attribute, OpenMode, Pile};
//!
//! # fn main() -> anyhow::Result<()> {
//! let base = std::path::Path::new("/tmp/demo.pile");
//! Pile::create(base)?;
//! let mut pile = Pile::open(base, OpenMode::ReadWrite)?;
//! let ofs = pile.add(
//!     b"hello",
//!     vec![Attribute::new("title", b"greeting".to_vec(), true)],
//! )?;
//! pile.flush()?;
//! let hits = pile.lookup("title", b"greeting")?.unwrap_or_default();
//! assert_eq!(hits, vec![ofs]);
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod consts;
pub mod contents;
pub mod indexes;
pub mod lock;
pub mod metadata;
pub mod pile;
pub mod region;

pub use block::{Attribute, Checksum, Compression, FileKind, MetadataRecord};
pub use pile::{Entries, OpenMode, Pile};
