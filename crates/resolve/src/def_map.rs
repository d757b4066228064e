//! The crate definition map
//!
//! [`CrateDefMap`] is the output of resolution: an arena of module nodes
//! rooted at the crate root, the extern prelude, the selected prelude,
//! the file table, and the record of probed-but-missing files. Once a
//! build returns the map it is immutable; dependency maps are shared
//! read-only behind `Arc`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use opal_hir::{CrateId, DirId, FileId, ModId};

use crate::collector::MacroDefInfo;
use crate::errors::{DefMapError, DefMapResult};
use crate::krate::Edition;
use crate::mod_data::ModData;
use crate::path::ModPath;
use crate::per_ns::VisItem;

/// A module in this crate or in a dependency crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    pub krate: CrateId,
    pub module: ModId,
}

/// Entry in the def-map's file table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub modification_stamp: u64,
    pub content_hash: u64,
    /// The module the file belongs to (the first one, if the file is
    /// included more than once).
    pub module: ModId,
}

/// Fully resolved name map of one crate.
#[derive(Debug)]
pub struct CrateDefMap {
    krate: CrateId,
    edition: Edition,
    root: ModId,
    modules: Vec<ModData>,

    /// Direct dependencies in declaration order, by extern name.
    pub direct_dependencies: IndexMap<String, CrateId>,
    /// Def-maps of all transitive dependencies, shared with the host.
    pub all_dependencies: HashMap<CrateId, Arc<CrateDefMap>>,
    /// Dependency roots reachable by bare name, after `no_std`/`no_core`
    /// pruning and `extern crate` rebindings.
    pub extern_prelude: IndexMap<String, ModuleRef>,
    /// The module whose items are implicitly in scope everywhere.
    pub prelude: Option<ModuleRef>,
    /// Every file pulled into the module tree.
    pub file_infos: IndexMap<FileId, FileInfo>,
    /// Paths probed during `mod name;` / `include!` resolution that did
    /// not exist.
    pub missed_files: Vec<String>,
    /// Macro definitions addressable by path (exported `macro_rules!`
    /// and item-scoped `macro` definitions).
    pub macro_defs: IndexMap<ModPath, MacroDefInfo>,
}

impl CrateDefMap {
    /// Create a map containing only the given root module.
    pub fn new(krate: CrateId, edition: Edition, root_data: ModData) -> Self {
        Self {
            krate,
            edition,
            root: ModId::new(0),
            modules: vec![root_data],
            direct_dependencies: IndexMap::new(),
            all_dependencies: HashMap::new(),
            extern_prelude: IndexMap::new(),
            prelude: None,
            file_infos: IndexMap::new(),
            missed_files: Vec::new(),
            macro_defs: IndexMap::new(),
        }
    }

    pub fn krate(&self) -> CrateId {
        self.krate
    }

    pub fn edition(&self) -> Edition {
        self.edition
    }

    pub fn root(&self) -> ModId {
        self.root
    }

    pub fn alloc_module(&mut self, data: ModData) -> ModId {
        let id = ModId::new(self.modules.len() as u32);
        self.modules.push(data);
        id
    }

    pub fn module(&self, id: ModId) -> &ModData {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModId) -> &mut ModData {
        &mut self.modules[id.index()]
    }

    pub fn root_module(&self) -> &ModData {
        self.module(self.root)
    }

    pub fn module_ref(&self, module: ModId) -> ModuleRef {
        ModuleRef {
            krate: self.krate,
            module,
        }
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// All modules in allocation order, reachable or not.
    pub fn modules(&self) -> impl Iterator<Item = (ModId, &ModData)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModId::new(i as u32), m))
    }

    /// The def-map owning `krate`: this one or a dependency's.
    pub fn def_map_for(&self, krate: CrateId) -> Option<&CrateDefMap> {
        if krate == self.krate {
            Some(self)
        } else {
            self.all_dependencies.get(&krate).map(|map| &**map)
        }
    }

    pub fn resolve_module_ref(&self, module_ref: ModuleRef) -> Option<&ModData> {
        self.def_map_for(module_ref.krate)
            .map(|map| map.module(module_ref.module))
    }

    /// Cast a claimed mod-or-enum binding to its module node by walking
    /// the child-module chain of the owning crate.
    pub fn try_cast_to_module(&self, item: &VisItem) -> Option<ModuleRef> {
        if !item.is_mod_or_enum {
            return None;
        }
        let map = self.def_map_for(item.path.krate())?;
        let mut current = map.root;
        for segment in item.path.segments() {
            current = *map.module(current).child_modules.get(segment)?;
        }
        Some(ModuleRef {
            krate: item.path.krate(),
            module: current,
        })
    }

    /// Like [`Self::try_cast_to_module`], but a failed cast is a hard
    /// error: the binding claims a module that does not exist.
    pub fn cast_to_module(&self, item: &VisItem) -> DefMapResult<ModuleRef> {
        self.try_cast_to_module(item)
            .ok_or_else(|| DefMapError::bad_mod_or_enum_target(item.path.to_string()))
    }

    /// Nearest ancestor (including `module` itself) owning a directory;
    /// the directory `include!` and `mod child;` resolve against.
    pub fn owning_directory(&self, module: ModId) -> Option<DirId> {
        let mut current = Some(module);
        while let Some(id) = current {
            let data = self.module(id);
            if let Some(dir) = data.owned_directory {
                return Some(dir);
            }
            current = data.parent;
        }
        None
    }

    /// Look up a macro definition by absolute path, here or in a
    /// dependency.
    pub fn macro_def(&self, path: &ModPath) -> Option<&MacroDefInfo> {
        self.def_map_for(path.krate())?.macro_defs.get(path)
    }

    /// Modules reachable from the root via child edges. Modules dropped
    /// from the tree (cfg-shadowed) stay in the arena but are absent
    /// here.
    pub fn reachable_modules(&self) -> HashSet<ModId> {
        let mut reachable = HashSet::new();
        let mut queue = vec![self.root];
        while let Some(id) = queue.pop() {
            if !reachable.insert(id) {
                continue;
            }
            for &child in self.module(id).child_modules.values() {
                queue.push(child);
            }
        }
        reachable
    }

    /// Re-check the structural invariants of the finished map.
    ///
    /// Every child module must have a mod-or-enum binding under its name
    /// in the parent, and every same-crate mod-or-enum binding must cast
    /// back to a module node.
    pub fn verify(&self) -> DefMapResult<()> {
        for id in self.reachable_modules() {
            let data = self.module(id);
            for (name, _child) in &data.child_modules {
                let binding = data
                    .visible_items
                    .get(name)
                    .and_then(|per_ns| per_ns.types.as_ref())
                    .filter(|item| item.is_mod_or_enum);
                if binding.is_none() {
                    return Err(DefMapError::detached_child_module(
                        data.path.to_string(),
                        name.clone(),
                    ));
                }
            }
            for per_ns in data.visible_items.values() {
                if let Some(item) = &per_ns.types {
                    if item.is_mod_or_enum && item.path.krate() == self.krate {
                        self.cast_to_module(item)?;
                    }
                }
            }
        }
        Ok(())
    }
}
