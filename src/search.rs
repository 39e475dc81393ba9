//! Read-only descent from the root to a target leaf, and the upper-/
//! lower-bound probes used throughout the mutation engine.

use std::cmp::Ordering;

use crate::error::Result;
use crate::key::{keycmp, Key};
use crate::node::{InternalNode, LeafNode, Meta, Offset};
use crate::store::BlockStore;

/// Upper-bound index into `node`'s separators: the first entry whose key
/// is strictly greater than `key`.
///
/// When `key` is `None` — the original's "empty key" sentinel, rendered
/// here as an explicit option instead of an overloaded all-zero buffer —
/// returns the second-to-last entry's index (or `0` when `n <= 1`). No
/// call site in the mutation engine passes `None`; it exists for parity
/// with the original and is exercised directly by unit tests.
pub fn find_internal<const ORDER: usize>(node: &InternalNode<ORDER>, key: Option<&Key>) -> usize {
    match key {
        Some(key) => node
            .separators()
            .partition_point(|entry| keycmp(&entry.key, key) != Ordering::Greater),
        None => {
            if node.n > 1 {
                node.n - 2
            } else {
                0
            }
        }
    }
}

/// Lower-bound index into `node`'s live records: the first record whose
/// key is greater than or equal to `key`.
pub fn find_leaf<const ORDER: usize>(node: &LeafNode<ORDER>, key: &Key) -> usize {
    node.live()
        .partition_point(|record| keycmp(&record.key, key) == Ordering::Less)
}

/// Descend from the root until one level above the leaves, following the
/// upper-bound child at every level.
///
/// `meta.height` counts internal levels plus the leaf level: `height == 1`
/// means the root itself is a leaf (no internal node exists at all), and
/// `height == 2` means the root is already the lowest internal node (its
/// children are leaves), requiring zero descent steps. In general this
/// takes `height - 2` steps. Callers must not invoke this when
/// `meta.height == 1`; use [`search_leaf_direct`] instead, which handles
/// that case by returning the root offset directly.
pub fn search_index<const ORDER: usize>(
    store: &BlockStore,
    meta: &Meta,
    key: &Key,
) -> Result<Offset> {
    let mut offset = meta.root_offset;
    let mut height = meta.height;
    while height > 2 {
        let node: InternalNode<ORDER> = store.read_internal(offset)?;
        let idx = find_internal(&node, Some(key));
        offset = node.children[idx].child;
        height -= 1;
    }
    Ok(offset)
}

/// One upper-bound step from a known internal node to the child it leads
/// to for `key`.
pub fn search_leaf<const ORDER: usize>(
    store: &BlockStore,
    internal_offset: Offset,
    key: &Key,
) -> Result<Offset> {
    let node: InternalNode<ORDER> = store.read_internal(internal_offset)?;
    let idx = find_internal(&node, Some(key));
    Ok(node.children[idx].child)
}

/// Convenience composition of [`search_index`] then [`search_leaf`] (or
/// just the root offset, when the root is itself a leaf).
pub fn search_leaf_direct<const ORDER: usize>(
    store: &BlockStore,
    meta: &Meta,
    key: &Key,
) -> Result<Offset> {
    if meta.height == 1 {
        return Ok(meta.root_offset);
    }
    let internal_offset = search_index::<ORDER>(store, meta, key)?;
    search_leaf::<ORDER>(store, internal_offset, key)
}
