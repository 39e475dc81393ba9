//! On-disk node layout: the file header (`Meta`) and the two node kinds
//! (`InternalNode`, `LeafNode`), fixed-size and `bincode`-encodable.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::Key;

/// A byte position in the backing file, used everywhere in place of an
/// in-memory pointer.
pub type Offset = u64;

/// The value type stored inline in leaves.
pub type Value = i32;

/// Sentinel offset meaning "no node" (used for `parent`/`prev`/`next` at
/// the ends of a chain, and for "the root has no parent").
pub const NULL_OFFSET: Offset = 0;

/// The byte offset of the file header.
pub const OFFSET_META: Offset = 0;

/// The file header, stored once at [`OFFSET_META`] and rewritten whenever
/// `slot`, a node count, `height`, or `root_offset` changes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Meta {
    pub order: u64,
    pub key_size: u64,
    pub value_size: u64,
    pub internal_node_num: u64,
    pub leaf_node_num: u64,
    pub height: u64,
    pub slot: Offset,
    pub root_offset: Offset,
    /// Retained for forward compatibility; unused by this implementation.
    pub leaf_offset: Offset,
}

impl Default for Meta {
    fn default() -> Meta {
        Meta {
            order: 0,
            key_size: 0,
            value_size: 0,
            internal_node_num: 0,
            leaf_node_num: 0,
            height: 0,
            slot: 0,
            root_offset: 0,
            leaf_offset: 0,
        }
    }
}

/// One `(separator, child)` entry of an internal node.
///
/// For `i < n-1`, `key` is the separator below which every key in the
/// subtree at `child` falls; the last live entry's `key` is unused.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: Key,
    pub child: Offset,
}

/// A `(key, value)` record of a leaf node.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub value: Value,
}

/// An internal (non-leaf) node: `n` children and `n-1` separators, packed
/// into a fixed `ORDER`-length array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InternalNode<const ORDER: usize> {
    pub parent: Offset,
    pub next: Offset,
    pub prev: Offset,
    pub n: usize,
    pub children: [IndexEntry; ORDER],
}

impl<const ORDER: usize> InternalNode<ORDER> {
    /// A freshly allocated internal node: `n = 1`, a single key-less
    /// rightmost-child placeholder, no links.
    pub fn new_empty() -> InternalNode<ORDER> {
        InternalNode {
            parent: NULL_OFFSET,
            next: NULL_OFFSET,
            prev: NULL_OFFSET,
            n: 1,
            children: std::array::from_fn(|_| IndexEntry::default()),
        }
    }

    /// The live child slice, `children[..n]`.
    pub fn live(&self) -> &[IndexEntry] {
        &self.children[..self.n]
    }

    /// The live child slice, mutably.
    pub fn live_mut(&mut self) -> &mut [IndexEntry] {
        &mut self.children[..self.n]
    }

    /// The separator slice, `children[..n-1]` (empty if `n <= 1`).
    pub fn separators(&self) -> &[IndexEntry] {
        if self.n == 0 {
            &self.children[..0]
        } else {
            &self.children[..self.n - 1]
        }
    }
}

/// A leaf node: `n` sorted `(key, value)` records, packed into a fixed
/// `ORDER`-length array, linked into the leaf chain via `prev`/`next`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeafNode<const ORDER: usize> {
    pub parent: Offset,
    pub next: Offset,
    pub prev: Offset,
    pub n: usize,
    pub children: [Record; ORDER],
}

impl<const ORDER: usize> LeafNode<ORDER> {
    /// A freshly allocated leaf node: empty, no links.
    pub fn new_empty() -> LeafNode<ORDER> {
        LeafNode {
            parent: NULL_OFFSET,
            next: NULL_OFFSET,
            prev: NULL_OFFSET,
            n: 0,
            children: std::array::from_fn(|_| Record::default()),
        }
    }

    /// The live record slice, `children[..n]`.
    pub fn live(&self) -> &[Record] {
        &self.children[..self.n]
    }

    /// The live record slice, mutably.
    pub fn live_mut(&mut self) -> &mut [Record] {
        &mut self.children[..self.n]
    }
}

/// The exact encoded size of `T` under the crate's `bincode` configuration.
///
/// Every node type in this crate is fixed-size (no `Vec`/`String` fields),
/// so this is a compile-time-stable constant per type and is safe to use
/// both for slab allocation (`Meta::slot` arithmetic) and for sizing reads.
pub fn encoded_size<T: Serialize>(value: &T) -> Result<u64> {
    bincode::serialized_size(value).map_err(Error::Codec)
}
