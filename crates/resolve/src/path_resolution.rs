//! Read-side path resolution
//!
//! Resolves one syntactic path from the point of view of a module, during
//! collection: segment 0 goes through the module's scope chain (visible
//! items, then the crate root's extern prelude, then the prelude); each
//! further segment steps through a module or enum, possibly hopping into
//! a dependency's sealed map.

use tracing::trace;

use opal_hir::{ImportPath, ModId, PathKind};

use crate::def_map::CrateDefMap;
use crate::per_ns::{PerNs, VisItem};
use crate::visibility::Visibility;

/// What the resolved path is for. `Macro` restricts the result to the
/// macro namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Import,
    Macro,
}

/// Outcome of one path lookup.
#[derive(Debug, Clone)]
pub struct ResolvePathResult {
    pub per_ns: PerNs,
    /// True when every step either succeeded or failed against a module
    /// that cannot grow further; until then a miss is not final and the
    /// driver will retry.
    pub reached_fixed_point: bool,
    /// True when resolution stepped into a dependency's map; that map is
    /// sealed, so the answer is definitive.
    pub visited_other_crate: bool,
}

impl ResolvePathResult {
    fn empty(reached_fixed_point: bool, visited_other_crate: bool) -> Self {
        Self {
            per_ns: PerNs::none(),
            reached_fixed_point,
            visited_other_crate,
        }
    }
}

impl CrateDefMap {
    /// Resolve `path` as seen from `origin`.
    ///
    /// `with_invisible` keeps `Invisible` bindings in the answer, so
    /// chains of private `use`s still produce an edge to resolve
    /// through. `CfgDisabled` bindings never resolve.
    pub fn resolve_path_fp(
        &self,
        origin: ModId,
        path: &ImportPath,
        mode: ResolveMode,
        with_invisible: bool,
    ) -> ResolvePathResult {
        let mut visited_other_crate = false;
        let mut reached_fixed_point = true;

        let (start_per_ns, remaining) = match path.kind {
            PathKind::Crate => (self.module_per_ns(self.root()), &path.segments[..]),
            PathKind::Super(levels) => {
                let mut module = origin;
                for _ in 0..levels {
                    match self.module(module).parent {
                        Some(parent) => module = parent,
                        // `super` past the crate root resolves nothing,
                        // and never will.
                        None => return ResolvePathResult::empty(true, false),
                    }
                }
                (self.module_per_ns(module), &path.segments[..])
            }
            PathKind::DollarCrate(krate) => {
                if krate != self.krate() {
                    visited_other_crate = true;
                }
                if self.def_map_for(krate).is_none() {
                    return ResolvePathResult::empty(true, visited_other_crate);
                }
                let root_item =
                    VisItem::module(crate::path::ModPath::root(krate), Visibility::Public);
                (PerNs::types(root_item), &path.segments[..])
            }
            PathKind::Plain => {
                let Some((first, rest)) = path.segments.split_first() else {
                    return ResolvePathResult::empty(true, false);
                };
                let per_ns = self.resolve_first_segment(
                    origin,
                    first,
                    with_invisible,
                    &mut visited_other_crate,
                );
                if per_ns.is_empty() {
                    // The scope chain may still grow through imports,
                    // the extern prelude, or a later prelude choice.
                    trace!(name = %first, "first path segment unresolved");
                    return ResolvePathResult::empty(false, visited_other_crate);
                }
                (per_ns, rest)
            }
        };

        let mut per_ns = start_per_ns;
        for segment in remaining {
            let Some(types_item) = per_ns.types.as_ref() else {
                // The previous step resolved to something that cannot
                // host children in the types namespace yet.
                return ResolvePathResult::empty(false, visited_other_crate);
            };
            let Some(target) = self.try_cast_to_module(types_item) else {
                return ResolvePathResult::empty(false, visited_other_crate);
            };
            let same_crate = target.krate == self.krate();
            if !same_crate {
                visited_other_crate = true;
            }
            let Some(map) = self.def_map_for(target.krate) else {
                return ResolvePathResult::empty(true, visited_other_crate);
            };
            let raw = map
                .module(target.module)
                .visible_items
                .get(segment)
                .cloned()
                .unwrap_or_default();
            per_ns = filter_for_access(raw, same_crate, with_invisible);
            if per_ns.is_empty() {
                if same_crate {
                    reached_fixed_point = false;
                }
                return ResolvePathResult {
                    per_ns: PerNs::none(),
                    reached_fixed_point,
                    visited_other_crate,
                };
            }
        }

        if mode == ResolveMode::Macro {
            per_ns = PerNs {
                types: None,
                values: None,
                macros: per_ns.macros,
            };
        }
        ResolvePathResult {
            per_ns,
            reached_fixed_point,
            visited_other_crate,
        }
    }

    /// Scope chain for segment 0 of a plain path: the module's own
    /// visible items, then the crate root's extern prelude, then the
    /// prelude module.
    fn resolve_first_segment(
        &self,
        origin: ModId,
        name: &str,
        with_invisible: bool,
        visited_other_crate: &mut bool,
    ) -> PerNs {
        if let Some(per_ns) = self.module(origin).visible_items.get(name) {
            let filtered = filter_for_access(per_ns.clone(), true, with_invisible);
            if !filtered.is_empty() {
                return filtered;
            }
        }

        if let Some(module_ref) = self.extern_prelude.get(name) {
            let item = VisItem::module(
                crate::path::ModPath::root(module_ref.krate),
                Visibility::Public,
            );
            return PerNs::types(item);
        }

        if let Some(prelude) = self.prelude {
            let same_crate = prelude.krate == self.krate();
            if let Some(map) = self.def_map_for(prelude.krate) {
                let raw = map
                    .module(prelude.module)
                    .visible_items
                    .get(name)
                    .cloned()
                    .unwrap_or_default();
                let filtered = filter_for_access(raw, same_crate, false);
                if !filtered.is_empty() {
                    if !same_crate {
                        *visited_other_crate = true;
                    }
                    return filtered;
                }
            }
        }

        PerNs::none()
    }

    /// A module itself, as a one-item namespace triple.
    fn module_per_ns(&self, module: ModId) -> PerNs {
        PerNs::types(VisItem::module(
            self.module(module).path.clone(),
            Visibility::Public,
        ))
    }
}

/// What a lookup may see in a module's items: cfg-disabled bindings
/// never, invisible bindings only on request and only within the crate,
/// restricted bindings never across crates.
fn filter_for_access(per_ns: PerNs, same_crate: bool, with_invisible: bool) -> PerNs {
    per_ns.filter_visibility(|visibility| match visibility {
        Visibility::Public => true,
        Visibility::Restricted(_) => same_crate,
        Visibility::Invisible => same_crate && with_invisible,
        Visibility::CfgDisabled => false,
    })
}
