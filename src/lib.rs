//! A disk-backed B+ tree index mapping fixed-width string keys to `i32`
//! values, with insert/update/remove/search and an ordered range scan.
//!
//! `ORDER` (the branching factor) is a const generic, monomorphized at
//! compile time rather than read from a header or set by a build flag.
//! See [`tree::BPlusTree`] for the entry point.

pub mod delete;
pub mod error;
pub mod insert;
pub mod key;
pub mod node;
pub mod range;
pub mod search;
pub mod store;
pub mod tree;

pub use error::{Error, Result};
pub use key::Key;
pub use node::{Meta, Value};
pub use tree::{BPlusTree, InsertStatus, RemoveStatus, SearchStatus, UpdateStatus};
