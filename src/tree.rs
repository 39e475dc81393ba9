//! The public `BPlusTree` type: construction, metadata access, and point
//! lookup. Insert, delete, and range-scan live in their own modules
//! ([`crate::insert`], [`crate::delete`], [`crate::range`]) as additional
//! `impl` blocks on the same type, mirroring the component breakdown in
//! the design.

use std::path::Path;

use crate::error::Result;
use crate::key::{keycmp_delta, Key};
use crate::node::{LeafNode, Meta, Value};
use crate::search;
use crate::store::BlockStore;

/// Outcome of [`BPlusTree::search`].
///
/// `Mismatch` preserves the original's quirk: a lower-bound probe that
/// lands past the key still reports the probed record's value, with a
/// nonzero comparison delta standing in for "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Found,
    Mismatch(i32),
    NotFound,
}

impl SearchStatus {
    pub fn code(&self) -> i32 {
        match self {
            SearchStatus::Found => 0,
            SearchStatus::Mismatch(delta) => *delta,
            SearchStatus::NotFound => -1,
        }
    }
}

/// Outcome of [`BPlusTree::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertStatus {
    Inserted,
    DuplicateKey,
}

impl InsertStatus {
    pub fn code(&self) -> i32 {
        match self {
            InsertStatus::Inserted => 0,
            InsertStatus::DuplicateKey => 1,
        }
    }
}

/// Outcome of [`crate::tree::BPlusTree::update`] (defined in
/// [`crate::insert`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Updated,
    WrongKey,
    NotFound,
}

impl UpdateStatus {
    pub fn code(&self) -> i32 {
        match self {
            UpdateStatus::Updated => 0,
            UpdateStatus::WrongKey => 1,
            UpdateStatus::NotFound => -1,
        }
    }
}

/// Outcome of [`crate::tree::BPlusTree::remove`] (defined in
/// [`crate::delete`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveStatus {
    Removed,
    NotFound,
}

impl RemoveStatus {
    pub fn code(&self) -> i32 {
        match self {
            RemoveStatus::Removed => 0,
            RemoveStatus::NotFound => -1,
        }
    }
}

/// A persistent, disk-backed B+ tree mapping [`Key`]s to [`Value`]s.
///
/// `ORDER` is the branching factor: the maximum number of entries per
/// node, fixed at compile time and baked into the file's node layout.
/// Production code should use `BPlusTree<20>`; tests typically use
/// `BPlusTree<4>` to make splits/merges easy to trigger.
pub struct BPlusTree<const ORDER: usize> {
    pub(crate) store: BlockStore,
    pub(crate) meta: Meta,
}

impl<const ORDER: usize> BPlusTree<ORDER> {
    /// Open the tree backed by the file at `path`.
    ///
    /// If `force_empty` is set, or the file does not exist yet (or exists
    /// but is empty), it is (re)initialized as an empty tree: a single
    /// leaf with no records. A file that exists with content but whose
    /// header fails to decode is treated as corrupt, not empty, and
    /// surfaces the underlying [`Error`](crate::error::Error) instead of
    /// silently discarding it.
    pub fn open<P: AsRef<Path>>(path: P, force_empty: bool) -> Result<BPlusTree<ORDER>> {
        let path = path.as_ref();
        let store = BlockStore::new(path);
        let mut tree = BPlusTree {
            store,
            meta: Meta::default(),
        };

        let mut force_empty = force_empty;
        if !force_empty {
            let is_absent_or_empty = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
            if is_absent_or_empty {
                force_empty = true;
            } else {
                tree.meta = tree.store.read_meta()?;
            }
        }

        if force_empty {
            tree.init_from_empty()?;
        }

        Ok(tree)
    }

    /// `height == 1` means the root is itself a leaf; no internal node is
    /// allocated until the first split. This keeps an empty or
    /// single-leaf tree down to exactly one node on disk.
    fn init_from_empty(&mut self) -> Result<()> {
        log::debug!("initializing {} from empty", self.store.path().display());

        let mut meta = Meta {
            order: ORDER as u64,
            key_size: crate::key::KEY_SIZE as u64,
            value_size: std::mem::size_of::<Value>() as u64,
            height: 1,
            slot: crate::store::meta_size()?,
            ..Meta::default()
        };

        let (leaf_offset, leaf) = self.store.alloc_leaf::<ORDER>(&mut meta)?;
        meta.root_offset = leaf_offset;

        self.store.write_meta(&meta)?;
        self.store.write_node(leaf_offset, &leaf)?;

        self.meta = meta;
        Ok(())
    }

    /// A copy of the current file header.
    pub fn meta(&self) -> Meta {
        self.meta
    }

    /// Point lookup.
    ///
    /// On `Found`/`Mismatch`, the returned value is always the probed
    /// record's value — including on `Mismatch`, where the probed record
    /// is *not* the requested key. This reproduces the original's
    /// behavior exactly (see design notes); callers that only care about
    /// exact matches should match on `SearchStatus::Found`.
    pub fn search(&self, key: &Key) -> Result<(SearchStatus, Option<Value>)> {
        let leaf_offset = search::search_leaf_direct::<ORDER>(&self.store, &self.meta, key)?;
        let leaf: LeafNode<ORDER> = self.store.read_leaf(leaf_offset)?;
        let idx = search::find_leaf(&leaf, key);

        if idx >= leaf.n {
            return Ok((SearchStatus::NotFound, None));
        }

        let record = leaf.children[idx];
        let delta = keycmp_delta(&record.key, key);
        let status = if delta == 0 {
            SearchStatus::Found
        } else {
            SearchStatus::Mismatch(delta)
        };
        Ok((status, Some(record.value)))
    }

    pub(crate) fn min_n(&self) -> usize {
        (ORDER + 1) / 2
    }
}
