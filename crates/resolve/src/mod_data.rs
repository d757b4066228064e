//! Per-module mutable state
//!
//! One [`ModData`] per module node: what the module makes visible, its
//! children, the textual-scope macros alive at its declaration point, and
//! the anonymous trait imports. Nodes live in the def-map's arena and
//! refer to each other by [`ModId`]; the parent link is a back-pointer
//! only.

use indexmap::IndexMap;
use opal_hir::{CrateId, DirId, FileId, ModId};

use crate::collector::MacroDefInfo;
use crate::path::ModPath;
use crate::per_ns::PerNs;
use crate::visibility::Visibility;

/// State of one module in the crate being resolved.
#[derive(Debug, Clone)]
pub struct ModData {
    pub parent: Option<ModId>,
    pub krate: CrateId,
    pub path: ModPath,
    /// File the module lives in.
    pub file_id: FileId,
    /// Position within the owning file (`"outer::inner"` for nested
    /// inline modules); empty iff the module *is* the file.
    pub file_relative_path: String,
    /// Directory this module resolves `mod child;` declarations against.
    pub owned_directory: Option<DirId>,
    /// Enums are modeled as modules whose visible items are the
    /// variants.
    pub is_enum: bool,
    /// False if this module or any ancestor is cfg-disabled.
    pub is_deeply_enabled_by_cfg: bool,
    /// The module's file was already claimed by an earlier `mod`
    /// declaration elsewhere in the tree.
    pub is_shadowed_by_other_file: bool,

    pub visible_items: IndexMap<String, PerNs>,
    pub child_modules: IndexMap<String, ModId>,
    pub legacy_macros: IndexMap<String, MacroDefInfo>,
    pub unnamed_trait_imports: IndexMap<ModPath, Visibility>,
}

impl ModData {
    pub fn new(krate: CrateId, path: ModPath, file_id: FileId) -> Self {
        Self {
            parent: None,
            krate,
            path,
            file_id,
            file_relative_path: String::new(),
            owned_directory: None,
            is_enum: false,
            is_deeply_enabled_by_cfg: true,
            is_shadowed_by_other_file: false,
            visible_items: IndexMap::new(),
            child_modules: IndexMap::new(),
            legacy_macros: IndexMap::new(),
            unnamed_trait_imports: IndexMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: ModId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_owned_directory(mut self, dir: Option<DirId>) -> Self {
        self.owned_directory = dir;
        self
    }

    pub fn with_file_relative_path(mut self, path: impl Into<String>) -> Self {
        self.file_relative_path = path.into();
        self
    }

    pub fn as_enum(mut self) -> Self {
        self.is_enum = true;
        self
    }

    pub fn cfg_disabled(mut self) -> Self {
        self.is_deeply_enabled_by_cfg = false;
        self
    }

    pub fn shadowed_by_other_file(mut self) -> Self {
        self.is_shadowed_by_other_file = true;
        self
    }

    /// Name of the module; `None` for the crate root.
    pub fn name(&self) -> Option<&str> {
        self.path.name()
    }

    /// Merge a binding into the visible items; where both sides populate
    /// a namespace the more permissive visibility survives.
    pub fn add_visible_item(&mut self, name: impl Into<String>, per_ns: PerNs) {
        let slot = self.visible_items.entry(name.into()).or_default();
        *slot = std::mem::take(slot).update(per_ns);
    }

    pub fn get_visible_item(&self, name: &str) -> Option<&PerNs> {
        self.visible_items.get(name)
    }

    pub fn add_child_module(&mut self, name: impl Into<String>, module: ModId) {
        self.child_modules.insert(name.into(), module);
    }

    /// Add a `macro_rules!` definition to the textual scope.
    pub fn add_legacy_macro(&mut self, name: impl Into<String>, def: MacroDefInfo) {
        self.legacy_macros.insert(name.into(), def);
    }

    /// Record a `use Trait as _` import; repeated imports of the same
    /// trait keep the widest visibility.
    pub fn add_unnamed_trait_import(&mut self, path: ModPath, visibility: Visibility) {
        match self.unnamed_trait_imports.entry(path) {
            indexmap::map::Entry::Occupied(mut entry) => {
                let widened = entry.get().clone().max(visibility);
                entry.insert(widened);
            }
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(visibility);
            }
        }
    }
}
