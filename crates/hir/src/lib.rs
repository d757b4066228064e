#![forbid(unsafe_code)]
#![allow(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![deny(unused_must_use)]

//! Opal HIR surface for name resolution
//!
//! This crate provides:
//! - Stable id types for crates, files, directories, and modules
//! - The parsed item-tree model the resolver consumes
//! - Syntactic paths and visibilities with their keyword prefixes lowered
//!
//! Parsing itself lives in the host; this crate is the contract between
//! the parser, the macro expander, and the resolver.

pub mod ids;
pub mod item_tree;

// Re-export main types
pub use ids::{CrateId, DirId, FileId, ModId};
pub use item_tree::{
    ImportPath, Item, ItemKind, ItemTree, PathKind, RawVisibility, UseDecl,
};
