//! Crate-level build inputs
//!
//! [`CrateData`] is everything the host knows about a crate before
//! resolution: root file, root attributes, edition, and the ordered list
//! of direct dependencies with their normalized extern names.

use opal_hir::{CrateId, DirId, FileId};

/// Well-known dependency names affected by root attributes.
pub const STD: &str = "std";
pub const CORE: &str = "core";

/// Language edition of a crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Edition {
    Edition2015,
    Edition2018,
    Edition2021,
    Edition2024,
}

impl Edition {
    /// On 2015 the implicit `extern crate` occupies a name in the root
    /// module; later editions bind it as `_` and rely on the extern
    /// prelude alone.
    pub fn implicit_extern_crate_binds_name(self) -> bool {
        self == Edition::Edition2015
    }
}

/// Attributes recognized on the crate root file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootAttrs {
    #[default]
    None,
    NoStd,
    NoCore,
}

/// One direct dependency, under its normalized extern-crate name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub crate_id: CrateId,
}

impl Dependency {
    pub fn new(name: impl Into<String>, crate_id: CrateId) -> Self {
        Self {
            name: name.into(),
            crate_id,
        }
    }
}

/// Host-supplied description of the crate to resolve.
#[derive(Debug, Clone)]
pub struct CrateData {
    pub crate_id: CrateId,
    pub root_file: FileId,
    pub root_dir: DirId,
    pub attrs: RootAttrs,
    pub edition: Edition,
    /// Direct dependencies in declaration order.
    pub dependencies: Vec<Dependency>,
    /// False for crates the host does not index (e.g. non-workspace
    /// test/bench targets); such crates build no map.
    pub indexable: bool,
}

impl CrateData {
    pub fn new(crate_id: CrateId, root_file: FileId, root_dir: DirId) -> Self {
        Self {
            crate_id,
            root_file,
            root_dir,
            attrs: RootAttrs::None,
            edition: Edition::Edition2024,
            dependencies: Vec::new(),
            indexable: true,
        }
    }

    pub fn with_edition(mut self, edition: Edition) -> Self {
        self.edition = edition;
        self
    }

    pub fn with_attrs(mut self, attrs: RootAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn not_indexable(mut self) -> Self {
        self.indexable = false;
        self
    }
}
