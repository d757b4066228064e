//! Fixed-point import resolution and macro expansion driver
//!
//! The def-collector owns the map being built and the pending work. It
//! alternates two phases until neither makes progress:
//!
//! 1. Resolve imports. Each pass walks the pending list; an import whose
//!    status improved records its bindings. Passes repeat until a full
//!    pass changes nothing.
//! 2. Expand macros. Each pending call is attempted once; expanded items
//!    are replayed through `update` so they reach glob importers and can
//!    unlock further imports.
//!
//! There are no internal retries: the fixed point *is* the retry
//! mechanism.

use std::collections::{HashMap, HashSet};
use std::mem;

use tracing::{debug, trace, warn};

use opal_hir::{ImportPath, ModId};

use crate::collector::mod_collector::{CollectedItem, ModCollector};
use crate::collector::{
    CollectorContext, Import, MacroCallInfo, MacroDefInfo, PartialResolvedImport,
};
use crate::def_map::{CrateDefMap, FileInfo};
use crate::errors::{DefMapError, DefMapResult};
use crate::host::{BuildToken, MacroExpander, SourceProvider};
use crate::path_resolution::ResolveMode;
use crate::per_ns::{Namespace, PerNs, VisItem};
use crate::visibility::Visibility;

/// Hard cap on glob-propagation recursion; exceeding it is a hard error,
/// not a soft skip.
pub const GLOB_RECURSION_LIMIT: usize = 100;

/// Macro calls at or beyond this expansion depth are consumed without
/// expanding.
pub const EXPANSION_DEPTH_LIMIT: u32 = 64;

/// How a binding got installed; named imports shadow glob-installed
/// bindings, never the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportType {
    Named,
    Glob,
}

/// Which `(module, name)` bindings were installed by a glob, one set per
/// namespace.
#[derive(Debug, Default)]
pub struct PerNsGlobImports {
    types: HashSet<(ModId, String)>,
    values: HashSet<(ModId, String)>,
    macros: HashSet<(ModId, String)>,
}

impl PerNsGlobImports {
    fn set_mut(&mut self, ns: Namespace) -> &mut HashSet<(ModId, String)> {
        match ns {
            Namespace::Types => &mut self.types,
            Namespace::Values => &mut self.values,
            Namespace::Macros => &mut self.macros,
        }
    }

    pub fn set(&self, ns: Namespace) -> &HashSet<(ModId, String)> {
        match ns {
            Namespace::Types => &self.types,
            Namespace::Values => &self.values,
            Namespace::Macros => &self.macros,
        }
    }

    pub fn contains(&self, ns: Namespace, module: ModId, name: &str) -> bool {
        self.set(ns).contains(&(module, name.to_string()))
    }
}

/// The resolver core.
pub struct DefCollector<'a> {
    def_map: CrateDefMap,
    context: CollectorContext,
    resolved_imports: Vec<Import>,
    /// Reverse glob edges: for each glob *source* module, the modules
    /// that glob it in and the visibility of each glob import.
    glob_imports: HashMap<ModId, Vec<(ModId, Visibility)>>,
    from_glob_import: PerNsGlobImports,
    source: &'a dyn SourceProvider,
    expander: &'a dyn MacroExpander,
    token: &'a BuildToken,
}

impl<'a> DefCollector<'a> {
    pub fn new(
        def_map: CrateDefMap,
        context: CollectorContext,
        source: &'a dyn SourceProvider,
        expander: &'a dyn MacroExpander,
        token: &'a BuildToken,
    ) -> Self {
        Self {
            def_map,
            context,
            resolved_imports: Vec::new(),
            glob_imports: HashMap::new(),
            from_glob_import: PerNsGlobImports::default(),
            source,
            expander,
            token,
        }
    }

    pub fn into_def_map(self) -> CrateDefMap {
        self.def_map
    }

    pub fn def_map(&self) -> &CrateDefMap {
        &self.def_map
    }

    /// Imports still pending; all `Unresolved` or `Indeterminate` once
    /// collection terminates.
    pub fn unresolved_imports(&self) -> &[Import] {
        &self.context.imports
    }

    pub fn resolved_imports(&self) -> &[Import] {
        &self.resolved_imports
    }

    pub fn glob_imports(&self) -> &HashMap<ModId, Vec<(ModId, Visibility)>> {
        &self.glob_imports
    }

    pub fn from_glob_import(&self) -> &PerNsGlobImports {
        &self.from_glob_import
    }

    /// Run to the fixed point.
    pub fn collect(&mut self) -> DefMapResult<()> {
        loop {
            self.resolve_imports_to_fixed_point()?;
            if !self.expand_pending_macros()? {
                break;
            }
        }

        // At the fixed point a partially resolved import is as resolved
        // as it will ever be; its bindings are already recorded. Pending
        // keeps only the truly unresolved.
        let imports = mem::take(&mut self.context.imports);
        for mut import in imports {
            match import.status.clone() {
                PartialResolvedImport::Indeterminate(per_ns) => {
                    import.status = PartialResolvedImport::Resolved(per_ns);
                    self.resolved_imports.push(import);
                }
                _ => self.context.imports.push(import),
            }
        }

        debug!(
            resolved = self.resolved_imports.len(),
            unresolved = self.context.imports.len(),
            pending_macro_calls = self.context.macro_calls.len(),
            "import resolution reached fixed point"
        );
        Ok(())
    }

    /// Walk the pending imports repeatedly until a full pass changes no
    /// import's status.
    fn resolve_imports_to_fixed_point(&mut self) -> DefMapResult<()> {
        let mut pass = 0usize;
        loop {
            self.token.check()?;
            self.token.tick();
            pass += 1;

            let mut changed = false;
            let imports = mem::take(&mut self.context.imports);
            for mut import in imports {
                let status = self.resolve_import(&import);
                match status {
                    PartialResolvedImport::Resolved(_) => {
                        import.status = status;
                        self.record_resolved_import(&import)?;
                        self.resolved_imports.push(import);
                        changed = true;
                    }
                    PartialResolvedImport::Indeterminate(_) => {
                        // Record the partial binding only when it is new;
                        // the status equality check prevents oscillation.
                        if import.status != status {
                            import.status = status;
                            self.record_resolved_import(&import)?;
                            changed = true;
                        }
                        self.context.imports.push(import);
                    }
                    PartialResolvedImport::Unresolved => {
                        self.context.imports.push(import);
                    }
                }
            }
            trace!(pass, changed, "import resolution pass");
            if !changed {
                return Ok(());
            }
        }
    }

    fn resolve_import(&self, import: &Import) -> PartialResolvedImport {
        if import.is_extern_crate {
            let Some(name) = import.path.segments.first() else {
                return PartialResolvedImport::Unresolved;
            };
            return match self.def_map.extern_prelude.get(name) {
                Some(module_ref) => {
                    let item = VisItem::module(
                        crate::path::ModPath::root(module_ref.krate),
                        Visibility::Public,
                    );
                    PartialResolvedImport::Resolved(PerNs::types(item))
                }
                None => PartialResolvedImport::Unresolved,
            };
        }

        let result = self.def_map.resolve_path_fp(
            import.containing_mod,
            &import.path,
            ResolveMode::Import,
            true,
        );
        if result.per_ns.is_empty() {
            return PartialResolvedImport::Unresolved;
        }
        // A cross-crate hop is definitive: that map is sealed, so no
        // further passes can improve the answer.
        if result.visited_other_crate || result.per_ns.is_full() {
            PartialResolvedImport::Resolved(result.per_ns)
        } else {
            PartialResolvedImport::Indeterminate(result.per_ns)
        }
    }

    fn record_resolved_import(&mut self, import: &Import) -> DefMapResult<()> {
        let Some(per_ns) = import.status.namespaces().cloned() else {
            return Ok(());
        };

        if import.is_extern_crate {
            return self.record_extern_crate(import, &per_ns);
        }
        if import.is_glob {
            return self.record_glob_import(import, &per_ns);
        }
        self.record_named_import(import, &per_ns)
    }

    /// `extern crate X [as Y]` at the crate root rebinds the extern
    /// prelude entry, so a later `extern crate` can override the
    /// implicit one. A `_` binding leaves the root namespace untouched.
    fn record_extern_crate(&mut self, import: &Import, per_ns: &PerNs) -> DefMapResult<()> {
        if import.is_underscore() {
            return Ok(());
        }
        if import.containing_mod == self.def_map.root() {
            if let Some(item) = &per_ns.types {
                if let Some(target) = self.def_map.try_cast_to_module(item) {
                    self.def_map
                        .extern_prelude
                        .insert(import.name_in_scope.clone(), target);
                }
            }
        }
        self.update(
            import.containing_mod,
            &[(import.name_in_scope.clone(), per_ns.clone())],
            import.visibility.clone(),
            ImportType::Named,
        )
    }

    fn record_glob_import(&mut self, import: &Import, per_ns: &PerNs) -> DefMapResult<()> {
        let Some(types_item) = &per_ns.types else {
            warn!(path = %import.path, "glob import target has no type binding, skipped");
            return Ok(());
        };
        let Some(target) = self.def_map.try_cast_to_module(types_item) else {
            warn!(path = %import.path, "glob import target is not a module or enum, skipped");
            return Ok(());
        };

        // A `#[prelude_import]` glob selects the prelude instead of
        // importing names.
        if import.is_prelude {
            self.def_map.prelude = Some(target);
            return Ok(());
        }

        if target.krate == self.def_map.krate() {
            // Same-crate glob: snapshot what is visible from here, and
            // leave a reverse edge so later additions to the target are
            // replayed into this module.
            let from_path = self.def_map.module(import.containing_mod).path.clone();
            let items: Vec<(String, PerNs)> = self
                .def_map
                .module(target.module)
                .visible_items
                .iter()
                .map(|(name, res)| {
                    let filtered = res
                        .clone()
                        .filter_visibility(|vis| vis.is_visible_from_path(&from_path));
                    (name.clone(), filtered)
                })
                .filter(|(_, res)| !res.is_empty())
                .collect();

            let edges = self.glob_imports.entry(target.module).or_default();
            if !edges
                .iter()
                .any(|(module, _)| *module == import.containing_mod)
            {
                edges.push((import.containing_mod, import.visibility.clone()));
            }
            self.update(
                import.containing_mod,
                &items,
                import.visibility.clone(),
                ImportType::Glob,
            )
        } else {
            // Cross-crate glob: the source is sealed, snapshot only.
            let items: Vec<(String, PerNs)> = match self.def_map.resolve_module_ref(target) {
                Some(target_data) => target_data
                    .visible_items
                    .iter()
                    .map(|(name, res)| {
                        let filtered = res
                            .clone()
                            .filter_visibility(|vis| vis.is_visible_from_other_crate());
                        (name.clone(), filtered)
                    })
                    .filter(|(_, res)| !res.is_empty())
                    .collect(),
                None => Vec::new(),
            };
            self.update(
                import.containing_mod,
                &items,
                import.visibility.clone(),
                ImportType::Glob,
            )
        }
    }

    fn record_named_import(&mut self, import: &Import, per_ns: &PerNs) -> DefMapResult<()> {
        // `use Trait as _` does not bind a name; the trait is tracked so
        // its methods resolve.
        if import.is_underscore() {
            if let Some(types_item) = &per_ns.types {
                self.def_map
                    .module_mut(import.containing_mod)
                    .add_unnamed_trait_import(types_item.path.clone(), import.visibility.clone());
            }
            return Ok(());
        }

        // Lower bindings whose target is not visible from here to
        // `Invisible`: the name still completes but does not re-export.
        let from_path = self.def_map.module(import.containing_mod).path.clone();
        let adjusted = per_ns.clone().map_items(|item| {
            if item.visibility.is_visible_from_path(&from_path) {
                item
            } else {
                item.with_visibility(Visibility::Invisible)
            }
        });
        self.update(
            import.containing_mod,
            &[(import.name_in_scope.clone(), adjusted)],
            import.visibility.clone(),
            ImportType::Named,
        )
    }

    /// Install resolutions into a module and, when anything changed,
    /// replay them through every module that glob-imports it.
    ///
    /// `vis` replaces the visibility of each installed binding, except
    /// that `Invisible` and `CfgDisabled` markers survive.
    pub(crate) fn update(
        &mut self,
        module: ModId,
        resolutions: &[(String, PerNs)],
        vis: Visibility,
        import_type: ImportType,
    ) -> DefMapResult<()> {
        self.update_recursive(module, resolutions, vis, import_type, 0)
    }

    fn update_recursive(
        &mut self,
        module: ModId,
        resolutions: &[(String, PerNs)],
        vis: Visibility,
        import_type: ImportType,
        depth: usize,
    ) -> DefMapResult<()> {
        if depth > GLOB_RECURSION_LIMIT {
            return Err(DefMapError::glob_depth_exceeded(
                self.def_map.module(module).path.to_string(),
                depth,
            ));
        }

        let mut changed = false;
        for (name, res) in resolutions {
            let applied = res.clone().map_items(|item| match item.visibility {
                Visibility::Invisible | Visibility::CfgDisabled => item,
                _ => item.with_visibility(vis.clone()),
            });
            if self.push_resolution(module, name, &applied, import_type) {
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }

        let glob_edges = self
            .glob_imports
            .get(&module)
            .cloned()
            .unwrap_or_default();
        for (importing_module, edge_visibility) in glob_edges {
            self.update_recursive(
                importing_module,
                resolutions,
                edge_visibility,
                ImportType::Glob,
                depth + 1,
            )?;
        }
        Ok(())
    }

    /// Merge one name's bindings into a module, namespace by namespace.
    ///
    /// | new \ existing | absent  | named                   | glob                    |
    /// |----------------|---------|-------------------------|-------------------------|
    /// | named          | install | install iff wider vis   | install (named shadows) |
    /// | glob           | install | keep existing           | install iff wider vis   |
    fn push_resolution(
        &mut self,
        module: ModId,
        name: &str,
        res: &PerNs,
        import_type: ImportType,
    ) -> bool {
        let mut changed = false;
        for ns in Namespace::ALL {
            let Some(new_item) = res.get(ns) else {
                continue;
            };
            let existing_is_glob = self.from_glob_import.contains(ns, module, name);
            let module_data = self.def_map.module_mut(module);
            let slot = module_data
                .visible_items
                .entry(name.to_string())
                .or_default();
            let existing = slot.get(ns);

            let install = match (existing, import_type, existing_is_glob) {
                (None, _, _) => true,
                (Some(_), ImportType::Named, true) => true,
                (Some(old), ImportType::Named, false) => new_item
                    .visibility
                    .is_strictly_more_permissive(&old.visibility),
                (Some(old), ImportType::Glob, true) => new_item
                    .visibility
                    .is_strictly_more_permissive(&old.visibility),
                (Some(_), ImportType::Glob, false) => false,
            };
            if !install {
                continue;
            }

            *slot.get_mut(ns) = Some(new_item.clone());
            let key = (module, name.to_string());
            match import_type {
                ImportType::Glob => {
                    self.from_glob_import.set_mut(ns).insert(key);
                }
                ImportType::Named => {
                    self.from_glob_import.set_mut(ns).remove(&key);
                }
            }
            changed = true;
        }
        changed
    }

    /// Attempt every pending macro call once; returns whether any call
    /// was consumed (which re-opens import resolution).
    fn expand_pending_macros(&mut self) -> DefMapResult<bool> {
        let mut consumed_any = false;
        let calls = mem::take(&mut self.context.macro_calls);
        for call in calls {
            self.token.check()?;
            self.token.tick();

            if call.depth >= EXPANSION_DEPTH_LIMIT {
                debug!(depth = call.depth, path = %call.path, "macro call past expansion depth limit, dropped");
                consumed_any = true;
                continue;
            }
            if is_include_call(&call.path) {
                self.expand_include(&call)?;
                consumed_any = true;
                continue;
            }
            if let Some(def) = call.macro_def.clone() {
                self.expand_call(&def, &call)?;
                consumed_any = true;
                continue;
            }

            // Path-resolved call; cfg-disabled definitions do not
            // resolve and so are never expanded.
            let result = self.def_map.resolve_path_fp(
                call.containing_mod,
                &call.path,
                ResolveMode::Macro,
                false,
            );
            let def = result
                .per_ns
                .macros
                .as_ref()
                .and_then(|item| self.def_map.macro_def(&item.path))
                .cloned();
            match def {
                Some(def) => {
                    self.expand_call(&def, &call)?;
                    consumed_any = true;
                }
                // Not resolvable yet; retry after the next import round.
                None => self.context.macro_calls.push_back(call),
            }
        }
        Ok(consumed_any)
    }

    /// `include!(path)`: splice another file's items into the calling
    /// module. A missing target joins `missed_files`; either way the
    /// call is consumed.
    fn expand_include(&mut self, call: &MacroCallInfo) -> DefMapResult<()> {
        let file_name = call.body.trim().trim_matches('"').to_string();
        let dir = self.def_map.owning_directory(call.containing_mod);
        match dir.and_then(|dir| self.source.resolve_relative(dir, &file_name)) {
            Some(file) => {
                if !self.def_map.file_infos.contains_key(&file) {
                    self.def_map.file_infos.insert(
                        file,
                        FileInfo {
                            modification_stamp: self.source.modification_stamp(file),
                            content_hash: self.source.content_hash(file),
                            module: call.containing_mod,
                        },
                    );
                }
                let source = self.source;
                if let Some(tree) = source.item_tree(file) {
                    self.collect_expansion(
                        call.containing_mod,
                        &tree.items,
                        call.depth + 1,
                        call.dollar_crate,
                    )?;
                }
            }
            None => {
                let display = match dir {
                    Some(dir) => self.source.display_path(dir, &file_name),
                    None => file_name,
                };
                self.def_map.missed_files.push(display);
            }
        }
        Ok(())
    }

    fn expand_call(&mut self, def: &MacroDefInfo, call: &MacroCallInfo) -> DefMapResult<()> {
        let Some(expansion) = self.expander.expand(def, call) else {
            debug!(path = %call.path, "macro expansion produced no items");
            return Ok(());
        };
        self.collect_expansion(
            call.containing_mod,
            &expansion.items.items,
            call.depth + 1,
            expansion.dollar_crate,
        )
    }

    /// Collect expanded items at `depth` and replay every declared name
    /// through `update`, so macro-introduced items immediately
    /// participate in further import resolution and glob propagation.
    fn collect_expansion(
        &mut self,
        module: ModId,
        items: &[opal_hir::Item],
        depth: u32,
        dollar_crate: Option<opal_hir::CrateId>,
    ) -> DefMapResult<()> {
        let collected = {
            let mut collector =
                ModCollector::new(&mut self.def_map, &mut self.context, self.source, depth)
                    .with_dollar_crate(dollar_crate)
                    .deferred();
            collector.collect(module, items);
            collector.collected
        };
        for CollectedItem {
            module,
            name,
            per_ns,
        } in collected
        {
            let vis = per_ns
                .types
                .as_ref()
                .or(per_ns.values.as_ref())
                .or(per_ns.macros.as_ref())
                .map(|item| item.visibility.clone())
                .unwrap_or(Visibility::Public);
            self.update(module, &[(name, per_ns)], vis, ImportType::Named)?;
        }
        Ok(())
    }
}

fn is_include_call(path: &ImportPath) -> bool {
    path.last_segment() == Some("include")
}

/// Pre-resolution ordering, descending by: the name already existing in
/// the target module, non-glob-ness, and depth of the containing module.
/// Fewer fixed-point passes on real crates; correctness does not depend
/// on it.
pub(crate) fn sort_imports(def_map: &CrateDefMap, imports: &mut [Import]) {
    imports.sort_by_key(|import| {
        let module = def_map.module(import.containing_mod);
        let name_exists = !import.name_in_scope.is_empty()
            && module.visible_items.contains_key(&import.name_in_scope);
        std::cmp::Reverse((name_exists, !import.is_glob, module.path.len()))
    });
}
