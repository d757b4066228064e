//! Capabilities injected by the host
//!
//! The resolver touches the outside world through exactly two small
//! interfaces: a virtual file tree ([`SourceProvider`]) and a macro
//! expander ([`MacroExpander`]). Both are taken as `&dyn`; they are the
//! only dynamic-dispatch seams in the engine. Cancellation and progress
//! travel through a concrete [`BuildToken`] shared with the host.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use opal_hir::{CrateId, DirId, FileId, ItemTree};

use crate::collector::{MacroCallInfo, MacroDefInfo};
use crate::errors::{DefMapError, DefMapResult};

/// Read access to the host's virtual file tree.
///
/// Files are pre-parsed; the resolver never sees source text.
pub trait SourceProvider {
    /// Parsed item tree of a file, if the file exists and parses.
    fn item_tree(&self, file: FileId) -> Option<&ItemTree>;

    /// Resolve a relative path (e.g. `"foo.rs"`, `"foo/mod.rs"`) against
    /// a directory. `None` when no such file exists.
    fn resolve_relative(&self, dir: DirId, path: &str) -> Option<FileId>;

    /// The subdirectory `name` of `dir`, if it exists.
    fn subdirectory(&self, dir: DirId, name: &str) -> Option<DirId>;

    /// Human-readable absolute form of `path` relative to `dir`, used
    /// when recording missed files.
    fn display_path(&self, dir: DirId, path: &str) -> String;

    /// Modification stamp of a file, for the def-map's file table.
    fn modification_stamp(&self, _file: FileId) -> u64 {
        0
    }

    /// Content hash of a file, for the def-map's file table.
    fn content_hash(&self, _file: FileId) -> u64 {
        0
    }
}

/// Result of expanding one macro call in item position.
#[derive(Debug, Clone)]
pub struct MacroExpansion {
    /// The items the expansion produced.
    pub items: ItemTree,
    /// Crate substituted for `$crate` paths inside the expansion; the
    /// defining crate of the expanded macro.
    pub dollar_crate: Option<CrateId>,
}

/// Macro expansion capability.
///
/// `None` means the call produced nothing (error in the body, disabled
/// expansion); the call is still consumed.
pub trait MacroExpander {
    fn expand(&self, def: &MacroDefInfo, call: &MacroCallInfo) -> Option<MacroExpansion>;
}

/// Cancellation flag and progress counter shared between the host and a
/// running build. The flag is checked at every import-resolution pass
/// and before every macro expansion.
#[derive(Debug, Default)]
pub struct BuildToken {
    cancelled: AtomicBool,
    progress: AtomicUsize,
}

impl BuildToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running build to stop at its next suspension point.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Raise `Cancelled` if the host asked the build to stop.
    pub fn check(&self) -> DefMapResult<()> {
        if self.is_cancelled() {
            Err(DefMapError::cancelled())
        } else {
            Ok(())
        }
    }

    /// Bump the progress counter; the host may poll it from another
    /// thread.
    pub fn tick(&self) {
        self.progress.fetch_add(1, Ordering::Relaxed);
    }

    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }
}
