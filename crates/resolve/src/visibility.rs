//! Resolved visibility and its widening order
//!
//! The resolver works with absolute visibilities: `pub` is `Public`,
//! everything narrower is `Restricted` to a module path, and two special
//! values mark bindings that are kept but not in scope (`Invisible`
//! imports of private items, and `CfgDisabled` declarations).

use opal_hir::{CrateId, RawVisibility};

use crate::path::ModPath;

/// Visibility of a binding, resolved to an absolute form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Visible everywhere.
    Public,
    /// Visible from the named module and its descendants, same crate
    /// only. Private is `Restricted` to the enclosing module.
    Restricted(ModPath),
    /// An import pointing at an item that is not visible at the import
    /// site. Retained for completion, treated as not-in-scope.
    Invisible,
    /// Disabled by a `#[cfg]` attribute.
    CfgDisabled,
}

impl Visibility {
    /// Resolve a syntactic visibility against the module that carries the
    /// declaration. `pub(in path)` is interpreted structurally: the path
    /// is taken as a module path without consulting imports.
    pub fn resolve_syntactic(
        krate: CrateId,
        containing: &ModPath,
        raw: &RawVisibility,
    ) -> Visibility {
        match raw {
            RawVisibility::Private => Visibility::Restricted(containing.clone()),
            RawVisibility::Public => Visibility::Public,
            RawVisibility::Crate => Visibility::Restricted(ModPath::root(krate)),
            RawVisibility::Super => {
                let parent = containing.parent().unwrap_or_else(|| containing.clone());
                Visibility::Restricted(parent)
            }
            RawVisibility::In(path) => {
                let base = match path.kind {
                    opal_hir::PathKind::Super(n) => {
                        let mut cur = containing.clone();
                        for _ in 0..n {
                            cur = cur.parent().unwrap_or_else(|| ModPath::root(krate));
                        }
                        cur
                    }
                    // `pub(in ...)` paths are crate-relative.
                    _ => ModPath::root(krate),
                };
                let mut target = base;
                for segment in &path.segments {
                    target = target.child(segment.clone());
                }
                Visibility::Restricted(target)
            }
        }
    }

    /// Whether a binding with this visibility is in scope for a module at
    /// `from` in crate `from.krate()`.
    pub fn is_visible_from_path(&self, from: &ModPath) -> bool {
        match self {
            Visibility::Public => true,
            Visibility::Restricted(in_mod) => in_mod.is_sub_path_of(from),
            Visibility::Invisible | Visibility::CfgDisabled => false,
        }
    }

    /// Whether the binding is visible to other crates at all.
    pub fn is_visible_from_other_crate(&self) -> bool {
        matches!(self, Visibility::Public)
    }

    /// Rank in the widening order, for the non-`Restricted` cases.
    fn rank(&self) -> u8 {
        match self {
            Visibility::CfgDisabled => 0,
            Visibility::Invisible => 1,
            Visibility::Restricted(_) => 2,
            Visibility::Public => 3,
        }
    }

    /// Widening order: `CfgDisabled < Invisible < Restricted(inner) <
    /// Restricted(outer) < Public`. For two `Restricted` values the one
    /// whose module is a strict ancestor is the more permissive; two
    /// restrictions with no ancestry relation are incomparable and
    /// neither is strictly more permissive.
    pub fn is_strictly_more_permissive(&self, other: &Visibility) -> bool {
        match (self, other) {
            (Visibility::Restricted(a), Visibility::Restricted(b)) => {
                a.is_strict_sub_path_of(b)
            }
            _ => self.rank() > other.rank(),
        }
    }

    /// The more permissive of the two; `self` wins ties and incomparable
    /// pairs.
    pub fn max(self, other: Visibility) -> Visibility {
        if other.is_strictly_more_permissive(&self) {
            other
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_hir::ImportPath;

    fn krate() -> CrateId {
        CrateId::new(0)
    }

    #[test]
    fn test_resolve_syntactic() {
        let module = ModPath::new(krate(), ["a", "b"]);

        assert_eq!(
            Visibility::resolve_syntactic(krate(), &module, &RawVisibility::Private),
            Visibility::Restricted(module.clone())
        );
        assert_eq!(
            Visibility::resolve_syntactic(krate(), &module, &RawVisibility::Public),
            Visibility::Public
        );
        assert_eq!(
            Visibility::resolve_syntactic(krate(), &module, &RawVisibility::Crate),
            Visibility::Restricted(ModPath::root(krate()))
        );
        assert_eq!(
            Visibility::resolve_syntactic(krate(), &module, &RawVisibility::Super),
            Visibility::Restricted(ModPath::new(krate(), ["a"]))
        );
        assert_eq!(
            Visibility::resolve_syntactic(
                krate(),
                &module,
                &RawVisibility::In(ImportPath::from_crate_root(["a"]))
            ),
            Visibility::Restricted(ModPath::new(krate(), ["a"]))
        );
    }

    #[test]
    fn test_visible_from() {
        let a = ModPath::new(krate(), ["a"]);
        let ab = ModPath::new(krate(), ["a", "b"]);
        let c = ModPath::new(krate(), ["c"]);

        let restricted = Visibility::Restricted(a.clone());
        assert!(restricted.is_visible_from_path(&a));
        assert!(restricted.is_visible_from_path(&ab));
        assert!(!restricted.is_visible_from_path(&c));

        assert!(Visibility::Public.is_visible_from_path(&c));
        assert!(!Visibility::Invisible.is_visible_from_path(&a));
        assert!(!Visibility::CfgDisabled.is_visible_from_path(&a));
    }

    #[test]
    fn test_widening_order() {
        let root = Visibility::Restricted(ModPath::root(krate()));
        let inner = Visibility::Restricted(ModPath::new(krate(), ["a", "b"]));

        assert!(Visibility::Public.is_strictly_more_permissive(&root));
        assert!(root.is_strictly_more_permissive(&inner));
        assert!(inner.is_strictly_more_permissive(&Visibility::Invisible));
        assert!(Visibility::Invisible.is_strictly_more_permissive(&Visibility::CfgDisabled));

        // No ancestry relation: incomparable, neither strictly wider.
        let a = Visibility::Restricted(ModPath::new(krate(), ["a"]));
        let c = Visibility::Restricted(ModPath::new(krate(), ["c"]));
        assert!(!a.is_strictly_more_permissive(&c));
        assert!(!c.is_strictly_more_permissive(&a));

        // Not strictly more permissive than itself.
        assert!(!root.clone().is_strictly_more_permissive(&root));
    }

    #[test]
    fn test_max() {
        let root = Visibility::Restricted(ModPath::root(krate()));
        let inner = Visibility::Restricted(ModPath::new(krate(), ["a"]));
        assert_eq!(inner.clone().max(root.clone()), root.clone());
        assert_eq!(root.clone().max(inner), root);
    }
}
