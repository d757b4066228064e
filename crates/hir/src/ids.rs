//! Stable identifier types shared by the item tree and the resolver
//!
//! Everything that crosses the host boundary is addressed by a small
//! copyable id instead of a reference: crates, virtual files, directories,
//! and modules inside a def-map's arena. Equality on an id is identity.

use std::fmt;

/// Opaque stable identifier of a crate. Two crates are the same crate
/// iff their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrateId(pub u32);

impl CrateId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CrateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crate_{}", self.0)
    }
}

/// Handle to a virtual file owned by the host's file table.
///
/// The resolver never reads file contents; it only asks the host for the
/// parsed item tree, the modification stamp, and the content hash behind
/// a `FileId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file_{}", self.0)
    }
}

/// Handle to a directory in the host's virtual file tree, used when
/// probing `mod name;` and `include!` targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirId(pub u32);

impl DirId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DirId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dir_{}", self.0)
    }
}

/// Index of a module inside one crate def-map's arena.
///
/// A `ModId` is only meaningful together with the `CrateId` of the map
/// that allocated it; the resolver pairs the two as a `ModuleRef`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModId(pub u32);

impl ModId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mod_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_equality_is_identity() {
        assert_eq!(CrateId::new(3), CrateId::new(3));
        assert_ne!(CrateId::new(3), CrateId::new(4));
        assert_eq!(ModId::new(7).index(), 7);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", CrateId::new(1)), "crate_1");
        assert_eq!(format!("{}", FileId::new(2)), "file_2");
        assert_eq!(format!("{}", DirId::new(3)), "dir_3");
        assert_eq!(format!("{}", ModId::new(4)), "mod_4");
    }
}
