// src/install/workdir.rs

//! Scoped working directory
//!
//! The installer tracks its own working directory instead of changing the
//! process-wide one. Entering a directory returns a guard; dropping the
//! guard puts the previous directory back, whichever way the scope exits.

use std::path::{Path, PathBuf};

/// Restores the previous working directory when dropped
#[derive(Debug)]
pub struct ScopedDir<'a> {
    slot: &'a mut PathBuf,
    previous: PathBuf,
}

impl<'a> ScopedDir<'a> {
    /// Make `dir` the current directory held in `slot` for this scope
    pub fn enter(slot: &'a mut PathBuf, dir: PathBuf) -> Self {
        let previous = std::mem::replace(slot, dir);
        Self { slot, previous }
    }

    /// Enter a nested directory; this scope's directory returns when it drops
    pub fn enter_child(&mut self, dir: PathBuf) -> ScopedDir<'_> {
        ScopedDir::enter(self.slot, dir)
    }

    pub fn path(&self) -> &Path {
        self.slot.as_path()
    }
}

impl Drop for ScopedDir<'_> {
    fn drop(&mut self) {
        std::mem::swap(self.slot, &mut self.previous);
    }
}

/// Resolve a step directory against a base directory
pub fn resolve(base: &Path, dir: Option<&str>) -> PathBuf {
    match dir {
        Some(dir) => base.join(dir),
        None => base.to_path_buf(),
    }
}
