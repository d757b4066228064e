//! Absolute module paths
//!
//! A [`ModPath`] names a module or item from its crate root: the crate id
//! plus the segment list. Unlike the syntactic `ImportPath`, there are no
//! keyword prefixes; the empty segment list is the crate root itself.

use std::fmt;

use opal_hir::CrateId;

/// Absolute path of a module or item inside a crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModPath {
    krate: CrateId,
    segments: Vec<String>,
}

impl ModPath {
    pub fn new<I, S>(krate: CrateId, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            krate,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// The crate root path.
    pub fn root(krate: CrateId) -> Self {
        Self {
            krate,
            segments: Vec::new(),
        }
    }

    pub fn krate(&self) -> CrateId {
        self.krate
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment; `None` for the crate root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path with the last segment dropped; `None` for the crate root.
    pub fn parent(&self) -> Option<ModPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(ModPath {
            krate: self.krate,
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Path extended by one segment.
    pub fn child(&self, name: impl Into<String>) -> ModPath {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        ModPath {
            krate: self.krate,
            segments,
        }
    }

    /// True iff `self` is a (non-strict) prefix of `other` in the same
    /// crate. Every path is a sub-path of itself; the crate root is a
    /// sub-path of everything in its crate.
    pub fn is_sub_path_of(&self, other: &ModPath) -> bool {
        self.krate == other.krate
            && self.segments.len() <= other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// True iff `self` is a strict prefix of `other`.
    pub fn is_strict_sub_path_of(&self, other: &ModPath) -> bool {
        self.segments.len() < other.segments.len() && self.is_sub_path_of(other)
    }
}

impl fmt::Display for ModPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "crate")
        } else {
            write!(f, "crate::{}", self.segments.join("::"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn krate() -> CrateId {
        CrateId::new(0)
    }

    #[test]
    fn test_root_path() {
        let root = ModPath::root(krate());
        assert!(root.is_root());
        assert_eq!(root.name(), None);
        assert_eq!(root.parent(), None);
        assert_eq!(root.to_string(), "crate");
    }

    #[test]
    fn test_name_and_parent() {
        let path = ModPath::new(krate(), ["a", "b", "x"]);
        assert_eq!(path.name(), Some("x"));
        assert_eq!(path.parent(), Some(ModPath::new(krate(), ["a", "b"])));
        assert_eq!(path.to_string(), "crate::a::b::x");
    }

    #[test]
    fn test_sub_path() {
        let root = ModPath::root(krate());
        let a = root.child("a");
        let ab = a.child("b");

        assert!(root.is_sub_path_of(&ab));
        assert!(a.is_sub_path_of(&ab));
        assert!(ab.is_sub_path_of(&ab));
        assert!(!ab.is_sub_path_of(&a));
        assert!(a.is_strict_sub_path_of(&ab));
        assert!(!ab.is_strict_sub_path_of(&ab));

        // Different crate, same segments.
        let other = ModPath::new(CrateId::new(9), ["a"]);
        assert!(!other.is_sub_path_of(&ab));
    }
}
