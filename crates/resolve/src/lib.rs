#![forbid(unsafe_code)]
#![allow(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![deny(unused_must_use)]

//! Opal Name Resolution
//!
//! This crate builds the *definition map* of a crate: for every module,
//! which names are visible in which namespaces and with what visibility.
//! It provides:
//! - Path, visibility, and per-namespace binding primitives
//! - Per-module state and the crate def-map container
//! - The item-tree walker feeding declared items, imports, and macro
//!   calls into the build
//! - The fixed-point resolver: import resolution, glob propagation, and
//!   the macro expansion driver
//!
//! The host supplies parsed item trees and a macro expander; dependency
//! maps are consumed read-only. A finished map is immutable and safe to
//! share across threads.

pub mod collector;
pub mod def_map;
pub mod errors;
pub mod host;
pub mod krate;
pub mod mod_data;
pub mod path;
pub mod path_resolution;
pub mod per_ns;
pub mod visibility;

// Re-export main types
pub use collector::{
    CollectorContext, DefCollector, Import, MacroCallInfo, MacroDefInfo, ModCollector,
    PartialResolvedImport, build_crate_def_map,
};
pub use def_map::{CrateDefMap, FileInfo, ModuleRef};
pub use errors::{DefMapError, DefMapErrorKind, DefMapResult};
pub use host::{BuildToken, MacroExpander, MacroExpansion, SourceProvider};
pub use krate::{CrateData, Dependency, Edition, RootAttrs};
pub use mod_data::ModData;
pub use path::ModPath;
pub use path_resolution::{ResolveMode, ResolvePathResult};
pub use per_ns::{Namespace, PerNs, VisItem};
pub use visibility::Visibility;
