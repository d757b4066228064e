//! Namespaced bindings
//!
//! A name in a module can be bound once per namespace (types, values,
//! macros). [`VisItem`] is one binding; [`PerNs`] is the triple of
//! optional bindings a name resolves to.

use crate::path::ModPath;
use crate::visibility::Visibility;

/// The three item namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Types,
    Values,
    Macros,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Types, Namespace::Values, Namespace::Macros];
}

/// One binding of a name: the item it points at (by absolute path), the
/// visibility of the binding at the binding site, and whether the target
/// can host child items (a module or an enum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisItem {
    pub path: ModPath,
    pub visibility: Visibility,
    pub is_mod_or_enum: bool,
}

impl VisItem {
    pub fn new(path: ModPath, visibility: Visibility) -> Self {
        Self {
            path,
            visibility,
            is_mod_or_enum: false,
        }
    }

    pub fn module(path: ModPath, visibility: Visibility) -> Self {
        Self {
            path,
            visibility,
            is_mod_or_enum: true,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Per-namespace resolution of one name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerNs {
    pub types: Option<VisItem>,
    pub values: Option<VisItem>,
    pub macros: Option<VisItem>,
}

impl PerNs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn types(item: VisItem) -> Self {
        Self {
            types: Some(item),
            ..Self::default()
        }
    }

    pub fn values(item: VisItem) -> Self {
        Self {
            values: Some(item),
            ..Self::default()
        }
    }

    pub fn macros(item: VisItem) -> Self {
        Self {
            macros: Some(item),
            ..Self::default()
        }
    }

    pub fn both(types: VisItem, values: VisItem) -> Self {
        Self {
            types: Some(types),
            values: Some(values),
            macros: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_none() && self.values.is_none() && self.macros.is_none()
    }

    /// All three namespaces populated.
    pub fn is_full(&self) -> bool {
        self.types.is_some() && self.values.is_some() && self.macros.is_some()
    }

    pub fn get(&self, ns: Namespace) -> Option<&VisItem> {
        match ns {
            Namespace::Types => self.types.as_ref(),
            Namespace::Values => self.values.as_ref(),
            Namespace::Macros => self.macros.as_ref(),
        }
    }

    pub fn get_mut(&mut self, ns: Namespace) -> &mut Option<VisItem> {
        match ns {
            Namespace::Types => &mut self.types,
            Namespace::Values => &mut self.values,
            Namespace::Macros => &mut self.macros,
        }
    }

    pub fn take(self, ns: Namespace) -> Option<VisItem> {
        match ns {
            Namespace::Types => self.types,
            Namespace::Values => self.values,
            Namespace::Macros => self.macros,
        }
    }

    /// Componentwise fallback: `self` dominates where populated.
    pub fn or(self, other: PerNs) -> PerNs {
        PerNs {
            types: self.types.or(other.types),
            values: self.values.or(other.values),
            macros: self.macros.or(other.macros),
        }
    }

    /// Componentwise merge: where both sides populate a namespace the
    /// more permissive visibility wins.
    pub fn update(self, other: PerNs) -> PerNs {
        fn merge(a: Option<VisItem>, b: Option<VisItem>) -> Option<VisItem> {
            match (a, b) {
                (Some(a), Some(b)) => {
                    if b.visibility.is_strictly_more_permissive(&a.visibility) {
                        Some(b)
                    } else {
                        Some(a)
                    }
                }
                (a, b) => a.or(b),
            }
        }
        PerNs {
            types: merge(self.types, other.types),
            values: merge(self.values, other.values),
            macros: merge(self.macros, other.macros),
        }
    }

    /// Keep only bindings whose visibility satisfies the predicate.
    pub fn filter_visibility(self, mut f: impl FnMut(&Visibility) -> bool) -> PerNs {
        let keep = |item: Option<VisItem>, f: &mut dyn FnMut(&Visibility) -> bool| {
            item.filter(|it| f(&it.visibility))
        };
        PerNs {
            types: keep(self.types, &mut f),
            values: keep(self.values, &mut f),
            macros: keep(self.macros, &mut f),
        }
    }

    /// Replace the visibility of every populated binding.
    pub fn with_visibility(self, visibility: Visibility) -> PerNs {
        self.map_items(|item| item.with_visibility(visibility.clone()))
    }

    /// Componentwise map over the populated bindings.
    pub fn map_items(self, mut f: impl FnMut(VisItem) -> VisItem) -> PerNs {
        PerNs {
            types: self.types.map(&mut f),
            values: self.values.map(&mut f),
            macros: self.macros.map(&mut f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_hir::CrateId;

    fn item(name: &str, visibility: Visibility) -> VisItem {
        VisItem::new(ModPath::new(CrateId::new(0), [name]), visibility)
    }

    #[test]
    fn test_empty_and_full() {
        assert!(PerNs::none().is_empty());
        let t = PerNs::types(item("T", Visibility::Public));
        assert!(!t.is_empty());
        assert!(!t.is_full());
    }

    #[test]
    fn test_or_prefers_self() {
        let a = PerNs::types(item("A", Visibility::Public));
        let b = PerNs {
            types: Some(item("B", Visibility::Public)),
            values: Some(item("B", Visibility::Public)),
            macros: None,
        };
        let merged = a.or(b);
        assert_eq!(merged.types.unwrap().path.name(), Some("A"));
        assert_eq!(merged.values.unwrap().path.name(), Some("B"));
    }

    #[test]
    fn test_update_prefers_more_permissive() {
        let private = Visibility::Restricted(ModPath::new(CrateId::new(0), ["m"]));
        let a = PerNs::types(item("A", private));
        let b = PerNs::types(item("B", Visibility::Public));
        let merged = a.update(b);
        assert_eq!(merged.types.unwrap().path.name(), Some("B"));
    }

    #[test]
    fn test_filter_visibility() {
        let per_ns = PerNs::both(
            item("T", Visibility::Public),
            item("T", Visibility::Invisible),
        );
        let filtered = per_ns.filter_visibility(|v| matches!(v, Visibility::Public));
        assert!(filtered.types.is_some());
        assert!(filtered.values.is_none());
    }

    #[test]
    fn test_with_visibility() {
        let per_ns = PerNs::types(item("T", Visibility::Public)).with_visibility(Visibility::Invisible);
        assert_eq!(per_ns.types.unwrap().visibility, Visibility::Invisible);
    }
}
