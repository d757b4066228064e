//! Parsed item-tree model consumed by the resolver
//!
//! One `ItemTree` is the flat list of items of a single source file, an
//! inline module body, or a macro expansion. The tree is produced by the
//! host's parser (or by a macro expander) and is read-only to the
//! resolver: item declarations, `use` leaves, `extern crate`s, module
//! declarations, and macro definitions/invocations.
//!
//! Paths here are *syntactic*: the leading `crate`/`self`/`super`/`$crate`
//! keyword is already consumed into a [`PathKind`], so the resolver never
//! sees keyword segments.

use codespan::Span;

use crate::ids::CrateId;

/// Keyword prefix of an import or macro path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// No prefix; segment 0 resolves in the current module's scope chain.
    Plain,
    /// `crate::`, starting at the crate root.
    Crate,
    /// `self::` / `super::`: walks the given number of parents first
    /// (`self` is zero supers).
    Super(u8),
    /// `$crate::` inside a macro expansion; starts at the root of the
    /// crate the invoked macro was defined in.
    DollarCrate(CrateId),
}

/// A use or macro path as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportPath {
    pub kind: PathKind,
    pub segments: Vec<String>,
}

impl ImportPath {
    pub fn new(kind: PathKind, segments: Vec<String>) -> Self {
        Self { kind, segments }
    }

    pub fn plain<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PathKind::Plain, segments.into_iter().map(Into::into).collect())
    }

    pub fn from_crate_root<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PathKind::Crate, segments.into_iter().map(Into::into).collect())
    }

    pub fn self_<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PathKind::Super(0), segments.into_iter().map(Into::into).collect())
    }

    pub fn super_<I, S>(levels: u8, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            PathKind::Super(levels),
            segments.into_iter().map(Into::into).collect(),
        )
    }

    pub fn dollar_crate<I, S>(krate: CrateId, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            PathKind::DollarCrate(krate),
            segments.into_iter().map(Into::into).collect(),
        )
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// A bare `name` path, the shape that binds to textual-scope macros.
    pub fn is_single_plain_segment(&self) -> bool {
        self.kind == PathKind::Plain && self.segments.len() == 1
    }
}

impl std::fmt::Display for ImportPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.kind {
            PathKind::Plain => String::new(),
            PathKind::Crate => "crate".to_string(),
            PathKind::Super(0) => "self".to_string(),
            PathKind::Super(n) => vec!["super"; n as usize].join("::"),
            PathKind::DollarCrate(_) => "$crate".to_string(),
        };
        if prefix.is_empty() {
            write!(f, "{}", self.segments.join("::"))
        } else if self.segments.is_empty() {
            write!(f, "{}", prefix)
        } else {
            write!(f, "{}::{}", prefix, self.segments.join("::"))
        }
    }
}

/// Syntactic visibility written on an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawVisibility {
    /// No modifier.
    Private,
    /// `pub`.
    Public,
    /// `pub(crate)`.
    Crate,
    /// `pub(super)`.
    Super,
    /// `pub(in path)`.
    In(ImportPath),
}

/// One flattened `use` leaf. Nested use-trees are expanded by the parser,
/// so every leaf carries a full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseDecl {
    pub path: ImportPath,
    /// `as name` rename; `"_"` is the anonymous trait-import binding.
    pub alias: Option<String>,
    pub is_glob: bool,
    /// The item carried a `#[prelude_import]` attribute.
    pub is_prelude_import: bool,
}

impl UseDecl {
    pub fn named(path: ImportPath) -> Self {
        Self {
            path,
            alias: None,
            is_glob: false,
            is_prelude_import: false,
        }
    }

    pub fn glob(path: ImportPath) -> Self {
        Self {
            path,
            alias: None,
            is_glob: true,
            is_prelude_import: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn prelude_import(mut self) -> Self {
        self.is_prelude_import = true;
        self
    }
}

/// What an item is. Only the aspects the resolver cares about survive
/// parsing: the namespaces a declaration feeds, module structure, imports,
/// and macro definitions/calls. Bodies are opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Struct,
    Union,
    Enum { variants: Vec<String> },
    Function,
    Const,
    Static,
    TypeAlias,
    Trait,
    TraitAlias,
    /// `mod name { ... }`.
    ModInline { items: Vec<Item> },
    /// `mod name;`; the file is probed by the resolver.
    ModOutline,
    Use(UseDecl),
    /// `extern crate name;` / `extern crate name as rename;`.
    ExternCrate { rename: Option<String> },
    /// `macro_rules! name { ... }`; `exported` is `#[macro_export]`.
    MacroRules { exported: bool, body: String },
    /// `macro name { ... }` (item-scoped definition).
    MacroDef { body: String },
    /// `name!(...)` / `path::name!(...)` invocation in item position.
    MacroCall { path: ImportPath, body: String },
}

/// A single parsed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: Option<String>,
    pub kind: ItemKind,
    pub visibility: RawVisibility,
    /// False when a `#[cfg]` on the item evaluated to disabled.
    pub cfg_enabled: bool,
    pub span: Option<Span>,
}

impl Item {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            name: None,
            kind,
            visibility: RawVisibility::Private,
            cfg_enabled: true,
            span: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_visibility(mut self, visibility: RawVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn public(self) -> Self {
        self.with_visibility(RawVisibility::Public)
    }

    pub fn cfg_disabled(mut self) -> Self {
        self.cfg_enabled = false;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    // Shorthand constructors, used by hosts building trees without a
    // parser (tests, macro expanders).

    pub fn struct_(name: impl Into<String>) -> Self {
        Self::new(ItemKind::Struct).with_name(name)
    }

    pub fn union_(name: impl Into<String>) -> Self {
        Self::new(ItemKind::Union).with_name(name)
    }

    pub fn enum_<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ItemKind::Enum {
            variants: variants.into_iter().map(Into::into).collect(),
        })
        .with_name(name)
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::new(ItemKind::Function).with_name(name)
    }

    pub fn const_(name: impl Into<String>) -> Self {
        Self::new(ItemKind::Const).with_name(name)
    }

    pub fn static_(name: impl Into<String>) -> Self {
        Self::new(ItemKind::Static).with_name(name)
    }

    pub fn type_alias(name: impl Into<String>) -> Self {
        Self::new(ItemKind::TypeAlias).with_name(name)
    }

    pub fn trait_(name: impl Into<String>) -> Self {
        Self::new(ItemKind::Trait).with_name(name)
    }

    pub fn trait_alias(name: impl Into<String>) -> Self {
        Self::new(ItemKind::TraitAlias).with_name(name)
    }

    pub fn mod_inline(name: impl Into<String>, items: Vec<Item>) -> Self {
        Self::new(ItemKind::ModInline { items }).with_name(name)
    }

    pub fn mod_outline(name: impl Into<String>) -> Self {
        Self::new(ItemKind::ModOutline).with_name(name)
    }

    pub fn use_(decl: UseDecl) -> Self {
        Self::new(ItemKind::Use(decl))
    }

    pub fn extern_crate(name: impl Into<String>) -> Self {
        Self::new(ItemKind::ExternCrate { rename: None }).with_name(name)
    }

    pub fn extern_crate_as(name: impl Into<String>, rename: impl Into<String>) -> Self {
        Self::new(ItemKind::ExternCrate {
            rename: Some(rename.into()),
        })
        .with_name(name)
    }

    pub fn macro_rules(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(ItemKind::MacroRules {
            exported: false,
            body: body.into(),
        })
        .with_name(name)
    }

    pub fn exported_macro_rules(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(ItemKind::MacroRules {
            exported: true,
            body: body.into(),
        })
        .with_name(name)
    }

    pub fn macro_def(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(ItemKind::MacroDef { body: body.into() }).with_name(name)
    }

    pub fn macro_call(path: ImportPath, body: impl Into<String>) -> Self {
        Self::new(ItemKind::MacroCall {
            path,
            body: body.into(),
        })
    }
}

/// The item list of one file, inline module body, or macro expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemTree {
    pub items: Vec<Item>,
}

impl ItemTree {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
