//! Advisory locking for the single-writer discipline.
//!
//! A `<base>.lock` file sits next to the pile. Read-write opens take the
//! exclusive lock, read-only opens the shared one; acquisition never blocks,
//! a held conflicting lock is an immediate error. The guard releases the
//! lock on drop.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::debug;

use crate::consts::LOCK_FILE_SUFFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub struct LockGuard {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

pub fn lock_path(base: &Path) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(LOCK_FILE_SUFFIX);
    PathBuf::from(s)
}

pub fn acquire(base: &Path, mode: LockMode) -> Result<LockGuard> {
    let path = lock_path(base);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    // fully qualified so std's inherent File lock methods cannot shadow fs2
    let res = match mode {
        LockMode::Shared => fs2::FileExt::try_lock_shared(&file),
        LockMode::Exclusive => fs2::FileExt::try_lock_exclusive(&file),
    };
    res.map_err(|e| {
        anyhow!(
            "pile is locked by another process ({:?} on {}): {}",
            mode,
            path.display(),
            e
        )
    })?;
    debug!("acquired {:?} lock on {}", mode, path.display());
    Ok(LockGuard { file, path, mode })
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        debug!("released {:?} lock on {}", self.mode, self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_base(tag: &str) -> PathBuf {
        let pid = std::process::id();
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("piledb-lock-{}-{}-{}", tag, pid, t))
    }

    #[test]
    fn exclusive_excludes_everyone() {
        let base = temp_base("excl");
        let guard = acquire(&base, LockMode::Exclusive).unwrap();
        assert!(acquire(&base, LockMode::Exclusive).is_err());
        assert!(acquire(&base, LockMode::Shared).is_err());
        drop(guard);
        let _again = acquire(&base, LockMode::Exclusive).unwrap();
    }

    #[test]
    fn shared_allows_shared() {
        let base = temp_base("shared");
        let a = acquire(&base, LockMode::Shared).unwrap();
        let b = acquire(&base, LockMode::Shared).unwrap();
        assert!(acquire(&base, LockMode::Exclusive).is_err());
        drop(a);
        drop(b);
    }
}
