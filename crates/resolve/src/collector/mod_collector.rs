//! Item-tree walker
//!
//! The mod-collector turns one item tree (a file, an inline module body,
//! or a macro expansion) into module state: declared items become
//! `visible_items` entries, `use`s and `extern crate`s become pending
//! imports, macro invocations become pending calls, and `mod`
//! declarations grow the module tree, probing the file system for
//! outline modules as it goes.
//!
//! The walker only uses the public `ModData`/`CrateDefMap` mutators; the
//! def-collector never calls back into it except to collect expansions.

use opal_hir::{CrateId, FileId, Item, ItemKind, ModId, UseDecl};

use crate::collector::{CollectorContext, Import, MacroCallInfo, MacroDefInfo, PartialResolvedImport};
use crate::def_map::{CrateDefMap, FileInfo};
use crate::host::SourceProvider;
use crate::mod_data::ModData;
use crate::per_ns::{PerNs, VisItem};
use crate::visibility::Visibility;

/// One item added to a module, kept so the def-collector can replay
/// macro-introduced items through glob propagation.
#[derive(Debug, Clone)]
pub struct CollectedItem {
    pub module: ModId,
    pub name: String,
    pub per_ns: PerNs,
}

/// Walks item trees and feeds the collector context.
pub struct ModCollector<'a> {
    def_map: &'a mut CrateDefMap,
    context: &'a mut CollectorContext,
    source: &'a dyn SourceProvider,
    macro_depth: u32,
    dollar_crate: Option<CrateId>,
    /// When set, visible items are only recorded in `collected`, not
    /// installed; the def-collector installs them through `update` so
    /// they propagate to glob importers. Used for expansions.
    defer_items: bool,
    pub collected: Vec<CollectedItem>,
}

impl<'a> ModCollector<'a> {
    pub fn new(
        def_map: &'a mut CrateDefMap,
        context: &'a mut CollectorContext,
        source: &'a dyn SourceProvider,
        macro_depth: u32,
    ) -> Self {
        Self {
            def_map,
            context,
            source,
            macro_depth,
            dollar_crate: None,
            defer_items: false,
            collected: Vec::new(),
        }
    }

    pub fn with_dollar_crate(mut self, dollar_crate: Option<CrateId>) -> Self {
        self.dollar_crate = dollar_crate;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.defer_items = true;
        self
    }

    /// Collect every item of one tree into `module`.
    pub fn collect(&mut self, module: ModId, items: &[Item]) {
        for item in items {
            self.collect_item(module, item);
        }
    }

    fn collect_item(&mut self, module: ModId, item: &Item) {
        match &item.kind {
            ItemKind::Struct => self.add_declared_item(module, item, DeclaredNs::TypesAndValues),
            ItemKind::Union
            | ItemKind::TypeAlias
            | ItemKind::Trait
            | ItemKind::TraitAlias => self.add_declared_item(module, item, DeclaredNs::Types),
            ItemKind::Function | ItemKind::Const | ItemKind::Static => {
                self.add_declared_item(module, item, DeclaredNs::Values)
            }
            ItemKind::Enum { variants } => self.collect_enum(module, item, variants),
            ItemKind::ModInline { items } => self.collect_inline_mod(module, item, items),
            ItemKind::ModOutline => self.collect_outline_mod(module, item),
            ItemKind::Use(decl) => self.collect_use(module, item, decl),
            ItemKind::ExternCrate { rename } => self.collect_extern_crate(module, item, rename),
            ItemKind::MacroRules { exported, body } => {
                self.collect_macro_rules(module, item, *exported, body)
            }
            ItemKind::MacroDef { body } => self.collect_macro_def(module, item, body),
            ItemKind::MacroCall { path, body } => {
                if item.cfg_enabled {
                    let macro_def = if path.is_single_plain_segment() {
                        self.def_map
                            .module(module)
                            .legacy_macros
                            .get(&path.segments[0])
                            .cloned()
                    } else {
                        None
                    };
                    self.context.macro_calls.push_back(MacroCallInfo {
                        containing_mod: module,
                        path: path.clone(),
                        body: body.clone(),
                        body_hash: None,
                        depth: self.macro_depth,
                        macro_def,
                        dollar_crate: self.dollar_crate,
                    });
                }
            }
        }
    }

    /// Install (or, for expansions, record) one visible item.
    fn push_item(&mut self, module: ModId, name: String, per_ns: PerNs) {
        if !self.defer_items {
            self.def_map
                .module_mut(module)
                .add_visible_item(name.clone(), per_ns.clone());
        }
        self.collected.push(CollectedItem {
            module,
            name,
            per_ns,
        });
    }

    fn item_visibility(&self, module: ModId, item: &Item) -> Visibility {
        let module_data = self.def_map.module(module);
        if !item.cfg_enabled || !module_data.is_deeply_enabled_by_cfg {
            return Visibility::CfgDisabled;
        }
        Visibility::resolve_syntactic(module_data.krate, &module_data.path, &item.visibility)
    }

    fn add_declared_item(&mut self, module: ModId, item: &Item, namespaces: DeclaredNs) {
        let Some(name) = item.name.clone() else {
            return;
        };
        let visibility = self.item_visibility(module, item);
        let path = self.def_map.module(module).path.child(name.clone());
        let vis_item = VisItem::new(path, visibility);
        let per_ns = match namespaces {
            DeclaredNs::Types => PerNs::types(vis_item),
            DeclaredNs::Values => PerNs::values(vis_item),
            DeclaredNs::TypesAndValues => PerNs::both(vis_item.clone(), vis_item),
        };
        self.push_item(module, name, per_ns);
    }

    /// Enums are modeled as child modules whose visible items are the
    /// variants, so `use Enum::*` and `Enum::Variant` paths resolve the
    /// same way module paths do.
    fn collect_enum(&mut self, module: ModId, item: &Item, variants: &[String]) {
        let Some(name) = item.name.clone() else {
            return;
        };
        let visibility = self.item_visibility(module, item);
        let parent_data = self.def_map.module(module);
        let enum_path = parent_data.path.child(name.clone());
        let enabled = parent_data.is_deeply_enabled_by_cfg && item.cfg_enabled;
        let file_id = parent_data.file_id;
        let relative = extend_relative_path(&parent_data.file_relative_path, &name);

        let mut child = ModData::new(parent_data.krate, enum_path.clone(), file_id)
            .with_parent(module)
            .with_file_relative_path(relative)
            .as_enum();
        if !enabled {
            child = child.cfg_disabled();
        }
        for variant in variants {
            let variant_item =
                VisItem::new(enum_path.child(variant.clone()), Visibility::Public);
            child.add_visible_item(variant.clone(), PerNs::both(variant_item.clone(), variant_item));
        }
        let child_id = self.def_map.alloc_module(child);
        self.link_child_module(module, name, child_id, enum_path, visibility, enabled);
    }

    fn collect_inline_mod(&mut self, module: ModId, item: &Item, items: &[Item]) {
        let Some(name) = item.name.clone() else {
            return;
        };
        let visibility = self.item_visibility(module, item);
        let parent_data = self.def_map.module(module);
        let child_path = parent_data.path.child(name.clone());
        let enabled = parent_data.is_deeply_enabled_by_cfg && item.cfg_enabled;
        let file_id = parent_data.file_id;
        let relative = extend_relative_path(&parent_data.file_relative_path, &name);
        let legacy = parent_data.legacy_macros.clone();

        let owned_dir = self
            .def_map
            .owning_directory(module)
            .and_then(|dir| self.source.subdirectory(dir, &name));

        let mut child = ModData::new(parent_data.krate, child_path.clone(), file_id)
            .with_parent(module)
            .with_file_relative_path(relative)
            .with_owned_directory(owned_dir);
        child.legacy_macros = legacy;
        if !enabled {
            child = child.cfg_disabled();
        }
        let child_id = self.def_map.alloc_module(child);
        self.link_child_module(module, name, child_id, child_path, visibility, enabled);
        self.collect(child_id, items);
    }

    /// `mod name;`: probe `name.rs` then `name/mod.rs` against the
    /// owning directory. Probes that miss are recorded in
    /// `missed_files`; if both miss the declaration is dropped.
    fn collect_outline_mod(&mut self, module: ModId, item: &Item) {
        let Some(name) = item.name.clone() else {
            return;
        };
        let parent_dir = self.def_map.owning_directory(module);
        let candidates = [format!("{}.rs", name), format!("{}/mod.rs", name)];

        let mut found = None;
        for candidate in &candidates {
            match parent_dir.and_then(|dir| self.source.resolve_relative(dir, candidate)) {
                Some(file) => {
                    found = Some(file);
                    break;
                }
                None => {
                    let display = match parent_dir {
                        Some(dir) => self.source.display_path(dir, candidate),
                        None => candidate.clone(),
                    };
                    self.def_map.missed_files.push(display);
                }
            }
        }
        let Some(file) = found else {
            return;
        };

        let visibility = self.item_visibility(module, item);
        let parent_data = self.def_map.module(module);
        let child_path = parent_data.path.child(name.clone());
        let enabled = parent_data.is_deeply_enabled_by_cfg && item.cfg_enabled;
        let legacy = parent_data.legacy_macros.clone();
        let owned_dir = parent_dir.and_then(|dir| self.source.subdirectory(dir, &name));

        // A file already claimed by another `mod` declaration is still
        // collected, but the new module is marked shadowed and the file
        // table keeps the first owner.
        let shadowed = self.def_map.file_infos.contains_key(&file);

        let mut child = ModData::new(parent_data.krate, child_path.clone(), file)
            .with_parent(module)
            .with_owned_directory(owned_dir);
        child.legacy_macros = legacy;
        if !enabled {
            child = child.cfg_disabled();
        }
        if shadowed {
            child = child.shadowed_by_other_file();
        }
        let child_id = self.def_map.alloc_module(child);
        if !shadowed {
            self.record_file(file, child_id);
        }
        self.link_child_module(module, name, child_id, child_path, visibility, enabled);

        let source = self.source;
        if let Some(tree) = source.item_tree(file) {
            self.collect(child_id, &tree.items);
        }
    }

    fn record_file(&mut self, file: FileId, module: ModId) {
        self.def_map.file_infos.insert(
            file,
            FileInfo {
                modification_stamp: self.source.modification_stamp(file),
                content_hash: self.source.content_hash(file),
                module,
            },
        );
    }

    /// Register a child in the parent's tables. A cfg-disabled child
    /// never displaces a cfg-enabled sibling of the same name; a later
    /// enabled sibling displaces a disabled one.
    fn link_child_module(
        &mut self,
        parent: ModId,
        name: String,
        child: ModId,
        child_path: crate::path::ModPath,
        visibility: Visibility,
        enabled: bool,
    ) {
        let link = match self.def_map.module(parent).child_modules.get(&name) {
            None => true,
            Some(&existing) => {
                enabled && !self.def_map.module(existing).is_deeply_enabled_by_cfg
            }
        };
        if !link {
            return;
        }
        self.def_map
            .module_mut(parent)
            .add_child_module(name.clone(), child);
        self.push_item(
            parent,
            name,
            PerNs::types(VisItem::module(child_path, visibility)),
        );
    }

    fn collect_use(&mut self, module: ModId, item: &Item, decl: &UseDecl) {
        if !item.cfg_enabled {
            return;
        }
        let visibility = self.item_visibility(module, item);
        let name_in_scope = if decl.is_glob {
            String::new()
        } else {
            match &decl.alias {
                Some(alias) => alias.clone(),
                None => match decl.path.last_segment() {
                    Some(segment) => segment.to_string(),
                    None => return,
                },
            }
        };
        self.context.imports.push(Import {
            containing_mod: module,
            path: decl.path.clone(),
            name_in_scope,
            visibility,
            is_glob: decl.is_glob,
            is_extern_crate: false,
            is_prelude: decl.is_prelude_import,
            status: PartialResolvedImport::Unresolved,
        });
    }

    fn collect_extern_crate(&mut self, module: ModId, item: &Item, rename: &Option<String>) {
        if !item.cfg_enabled {
            return;
        }
        let Some(name) = item.name.clone() else {
            return;
        };
        let visibility = self.item_visibility(module, item);
        self.context.imports.push(Import {
            containing_mod: module,
            path: opal_hir::ImportPath::plain([name.clone()]),
            name_in_scope: rename.clone().unwrap_or(name),
            visibility,
            is_glob: false,
            is_extern_crate: true,
            is_prelude: false,
            status: PartialResolvedImport::Unresolved,
        });
    }

    /// `macro_rules!` lives in textual scope; `#[macro_export]`
    /// additionally binds the name at the crate root.
    fn collect_macro_rules(&mut self, module: ModId, item: &Item, exported: bool, body: &str) {
        let Some(name) = item.name.clone() else {
            return;
        };
        if !item.cfg_enabled {
            return;
        }
        let def = MacroDefInfo {
            krate: self.def_map.krate(),
            name: name.clone(),
            body: body.to_string(),
            has_macro_export: exported,
        };
        self.def_map
            .module_mut(module)
            .add_legacy_macro(name.clone(), def.clone());
        if exported {
            let root = self.def_map.root();
            let path = crate::path::ModPath::root(self.def_map.krate()).child(name.clone());
            self.def_map.macro_defs.insert(path.clone(), def);
            self.push_item(
                root,
                name,
                PerNs::macros(VisItem::new(path, Visibility::Public)),
            );
        }
    }

    /// `macro name { ... }`, an item-scoped, path-addressable macro.
    fn collect_macro_def(&mut self, module: ModId, item: &Item, body: &str) {
        let Some(name) = item.name.clone() else {
            return;
        };
        if !item.cfg_enabled {
            return;
        }
        let visibility = self.item_visibility(module, item);
        let path = self.def_map.module(module).path.child(name.clone());
        let def = MacroDefInfo {
            krate: self.def_map.krate(),
            name: name.clone(),
            body: body.to_string(),
            has_macro_export: false,
        };
        self.def_map.macro_defs.insert(path.clone(), def);
        self.push_item(module, name, PerNs::macros(VisItem::new(path, visibility)));
    }
}

/// Which namespaces a plain declaration feeds.
enum DeclaredNs {
    Types,
    Values,
    TypesAndValues,
}

fn extend_relative_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", parent, name)
    }
}
