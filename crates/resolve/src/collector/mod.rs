//! Def-map construction
//!
//! Building a def-map is a two-actor affair: the [`ModCollector`] walks
//! item trees and deposits declared items, imports, and macro calls; the
//! [`DefCollector`] then iterates `resolve imports → expand macros` until
//! neither phase makes progress. The [`CollectorContext`] is the shared
//! workspace between them.

pub mod def_collector;
pub mod mod_collector;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::debug;

use opal_hir::{CrateId, ImportPath, ModId};

use crate::def_map::{CrateDefMap, FileInfo, ModuleRef};
use crate::errors::DefMapResult;
use crate::host::{BuildToken, MacroExpander, SourceProvider};
use crate::krate::{CORE, CrateData, RootAttrs, STD};
use crate::mod_data::ModData;
use crate::path::ModPath;
use crate::per_ns::PerNs;
use crate::visibility::Visibility;

pub use def_collector::{DefCollector, EXPANSION_DEPTH_LIMIT, GLOB_RECURSION_LIMIT, ImportType};
pub use mod_collector::ModCollector;

/// Resolution status of an import.
///
/// `Indeterminate` means at least one namespace resolved but not all
/// three; the partial binding is recorded so downstream lookups see it,
/// and the import stays pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialResolvedImport {
    Unresolved,
    Indeterminate(PerNs),
    Resolved(PerNs),
}

impl PartialResolvedImport {
    pub fn namespaces(&self) -> Option<&PerNs> {
        match self {
            PartialResolvedImport::Unresolved => None,
            PartialResolvedImport::Indeterminate(per_ns)
            | PartialResolvedImport::Resolved(per_ns) => Some(per_ns),
        }
    }
}

/// One `use` leaf or `extern crate` awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub containing_mod: ModId,
    pub path: ImportPath,
    /// Name the import binds; empty for globs, `"_"` for anonymous
    /// bindings.
    pub name_in_scope: String,
    pub visibility: Visibility,
    pub is_glob: bool,
    pub is_extern_crate: bool,
    /// Carries `#[prelude_import]`.
    pub is_prelude: bool,
    pub status: PartialResolvedImport,
}

impl Import {
    pub fn is_underscore(&self) -> bool {
        self.name_in_scope == "_"
    }
}

/// A macro definition: `macro_rules!` in textual scope or a
/// path-addressable `macro` / exported definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefInfo {
    pub krate: CrateId,
    pub name: String,
    pub body: String,
    pub has_macro_export: bool,
}

/// A macro invocation in item position, waiting for expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroCallInfo {
    pub containing_mod: ModId,
    pub path: ImportPath,
    pub body: String,
    pub body_hash: Option<u64>,
    /// Expansion depth of the tree the call was found in; zero for
    /// hand-written code.
    pub depth: u32,
    /// Pre-bound definition when the call's path hit the textual
    /// `macro_rules!` scope at collection time.
    pub macro_def: Option<MacroDefInfo>,
    /// Crate substituted for `$crate` in the call's own path.
    pub dollar_crate: Option<CrateId>,
}

/// Shared workspace of pending resolution work.
#[derive(Debug, Default)]
pub struct CollectorContext {
    pub imports: Vec<Import>,
    pub macro_calls: VecDeque<MacroCallInfo>,
}

/// Build the def-map of one crate.
///
/// `Ok(None)` means the crate is not indexable or has no parsed root;
/// `Err` is reserved for invariant violations and cancellation.
pub fn build_crate_def_map(
    crate_data: &CrateData,
    dependencies: HashMap<CrateId, Arc<CrateDefMap>>,
    source: &dyn SourceProvider,
    expander: &dyn MacroExpander,
    token: &BuildToken,
) -> DefMapResult<Option<CrateDefMap>> {
    if !crate_data.indexable {
        return Ok(None);
    }
    let Some(root_tree) = source.item_tree(crate_data.root_file) else {
        return Ok(None);
    };

    let krate = crate_data.crate_id;
    let root_data = ModData::new(krate, ModPath::root(krate), crate_data.root_file)
        .with_owned_directory(Some(crate_data.root_dir));
    let mut def_map = CrateDefMap::new(krate, crate_data.edition, root_data);
    def_map.all_dependencies = dependencies;

    let root = def_map.root();
    def_map.file_infos.insert(
        crate_data.root_file,
        FileInfo {
            modification_stamp: source.modification_stamp(crate_data.root_file),
            content_hash: source.content_hash(crate_data.root_file),
            module: root,
        },
    );

    seed_dependencies(&mut def_map, crate_data);

    let mut context = CollectorContext::default();
    inject_implicit_extern_crate(&def_map, crate_data, &mut context);

    // Initial construction: explicit items of the root file and,
    // recursively, its child modules.
    let mut collector = ModCollector::new(&mut def_map, &mut context, source, 0);
    collector.collect(root, &root_tree.items);
    drop(collector);

    // Shadow pruning: work anchored in modules no longer reachable from
    // the root (cfg-superseded) is dropped.
    let reachable = def_map.reachable_modules();
    context
        .imports
        .retain(|import| reachable.contains(&import.containing_mod));
    context
        .macro_calls
        .retain(|call| reachable.contains(&call.containing_mod));

    def_collector::sort_imports(&def_map, &mut context.imports);

    let mut collector = DefCollector::new(def_map, context, source, expander, token);
    collector.collect()?;
    let def_map = collector.into_def_map();

    #[cfg(debug_assertions)]
    def_map.verify()?;

    debug!(
        krate = %krate,
        modules = def_map.module_count(),
        missed_files = def_map.missed_files.len(),
        "built crate def-map"
    );
    Ok(Some(def_map))
}

/// Seed the extern prelude and inherit a prelude from the dependencies.
///
/// Dependencies are scanned in declaration order; every dependency map
/// exposing a prelude overwrites the slot, so `std` wins over `core` for
/// crates depending on both.
fn seed_dependencies(def_map: &mut CrateDefMap, crate_data: &CrateData) {
    for dependency in &crate_data.dependencies {
        def_map
            .direct_dependencies
            .insert(dependency.name.clone(), dependency.crate_id);

        let Some(dep_map) = def_map.all_dependencies.get(&dependency.crate_id) else {
            continue;
        };
        let dep_root = ModuleRef {
            krate: dependency.crate_id,
            module: dep_map.root(),
        };
        let dep_prelude = dep_map.prelude;

        let pruned = match crate_data.attrs {
            RootAttrs::None => false,
            RootAttrs::NoStd => dependency.name == STD,
            RootAttrs::NoCore => dependency.name == STD || dependency.name == CORE,
        };
        if !pruned {
            def_map
                .extern_prelude
                .insert(dependency.name.clone(), dep_root);
        }
        if let Some(prelude) = dep_prelude {
            def_map.prelude = Some(prelude);
        }
    }
}

/// Inject `extern crate std;` (or `core` under `no_std`; nothing under
/// `no_core`). On editions past 2015 the binding is `_`: the crate stays
/// reachable through the extern prelude without occupying a name in the
/// root module.
fn inject_implicit_extern_crate(
    def_map: &CrateDefMap,
    crate_data: &CrateData,
    context: &mut CollectorContext,
) {
    let name = match crate_data.attrs {
        RootAttrs::None => STD,
        RootAttrs::NoStd => CORE,
        RootAttrs::NoCore => return,
    };
    let name_in_scope = if crate_data.edition.implicit_extern_crate_binds_name() {
        name.to_string()
    } else {
        "_".to_string()
    };
    context.imports.push(Import {
        containing_mod: def_map.root(),
        path: ImportPath::plain([name]),
        name_in_scope,
        visibility: Visibility::Restricted(ModPath::root(crate_data.crate_id)),
        is_glob: false,
        is_extern_crate: true,
        is_prelude: false,
        status: PartialResolvedImport::Unresolved,
    });
}
