//! Insert and update: leaf insertion with split, and separator
//! propagation up through internal nodes (with internal-node split and
//! root growth).

use std::cmp::Ordering;

use crate::error::Result;
use crate::key::{keycmp, Key};
use crate::node::{IndexEntry, InternalNode, LeafNode, Offset, Record, Value, NULL_OFFSET};
use crate::search;
use crate::tree::{BPlusTree, InsertStatus, UpdateStatus};

impl<const ORDER: usize> BPlusTree<ORDER> {
    /// Insert `key`/`value`. Returns `DuplicateKey` without mutating the
    /// tree if `key` is already present.
    pub fn insert(&mut self, key: &Key, value: Value) -> Result<InsertStatus> {
        let offset = search::search_leaf_direct::<ORDER>(&self.store, &self.meta, key)?;
        let mut leaf: LeafNode<ORDER> = self.store.read_leaf(offset)?;

        let idx = search::find_leaf(&leaf, key);
        if idx < leaf.n && keycmp(&leaf.children[idx].key, key) == Ordering::Equal {
            return Ok(InsertStatus::DuplicateKey);
        }

        if leaf.n < ORDER {
            insert_record_no_split(&mut leaf, *key, value);
            self.store.write_node(offset, &leaf)?;
        } else {
            self.split_leaf_and_insert(offset, leaf, key, value)?;
        }

        Ok(InsertStatus::Inserted)
    }

    /// Overwrite `value` for `key` if and only if it is already present.
    pub fn update(&mut self, key: &Key, value: Value) -> Result<UpdateStatus> {
        let offset = search::search_leaf_direct::<ORDER>(&self.store, &self.meta, key)?;
        let mut leaf: LeafNode<ORDER> = self.store.read_leaf(offset)?;

        let idx = search::find_leaf(&leaf, key);
        if idx >= leaf.n {
            return Ok(UpdateStatus::NotFound);
        }
        if keycmp(&leaf.children[idx].key, key) != Ordering::Equal {
            return Ok(UpdateStatus::WrongKey);
        }

        leaf.children[idx].value = value;
        self.store.write_node(offset, &leaf)?;
        Ok(UpdateStatus::Updated)
    }

    fn split_leaf_and_insert(
        &mut self,
        offset: Offset,
        mut leaf: LeafNode<ORDER>,
        key: &Key,
        value: Value,
    ) -> Result<()> {
        let parent = leaf.parent;
        let (new_offset, mut new_leaf) = self.store.alloc_leaf::<ORDER>(&mut self.meta)?;

        new_leaf.parent = leaf.parent;
        new_leaf.next = leaf.next;
        new_leaf.prev = offset;
        leaf.next = new_offset;

        if new_leaf.next != NULL_OFFSET {
            let mut successor: LeafNode<ORDER> = self.store.read_leaf(new_leaf.next)?;
            successor.prev = new_offset;
            self.store.write_node(new_leaf.next, &successor)?;
        }

        let mut point = leaf.n / 2;
        let place_right = keycmp(key, &leaf.children[point].key) == Ordering::Greater;
        if place_right {
            point += 1;
        }

        let moved = leaf.n - point;
        new_leaf.children[..moved].copy_from_slice(&leaf.children[point..leaf.n]);
        new_leaf.n = moved;
        leaf.n = point;

        if place_right {
            insert_record_no_split(&mut new_leaf, *key, value);
        } else {
            insert_record_no_split(&mut leaf, *key, value);
        }

        log::trace!(
            "split leaf {offset} -> {new_offset}, sizes {}/{}",
            leaf.n,
            new_leaf.n
        );

        let separator = new_leaf.children[0].key;

        self.store.write_node(offset, &leaf)?;
        self.store.write_node(new_offset, &new_leaf)?;
        self.store.write_meta(&self.meta)?;

        self.insert_key_to_index(parent, separator, offset, new_offset, true)
    }

    /// Propagate a new separator up through the index.
    ///
    /// `leaf_children` is true exactly when `old`/`after` are leaf offsets
    /// (the first call, immediately above a leaf split); every recursive
    /// call past that point operates on internal-node children, since the
    /// tree grows upward one internal level at a time.
    fn insert_key_to_index(
        &mut self,
        parent_offset: Offset,
        key: Key,
        old: Offset,
        after: Offset,
        leaf_children: bool,
    ) -> Result<()> {
        if parent_offset == NULL_OFFSET {
            let (root_offset, mut root) = self.store.alloc_internal::<ORDER>(&mut self.meta)?;
            root.n = 2;
            root.children[0] = IndexEntry { key, child: old };
            root.children[1] = IndexEntry {
                key: Key::default(),
                child: after,
            };

            self.meta.root_offset = root_offset;
            self.meta.height += 1;

            self.reparent_one(old, root_offset, leaf_children)?;
            self.reparent_one(after, root_offset, leaf_children)?;

            self.store.write_node(root_offset, &root)?;
            self.store.write_meta(&self.meta)?;
            log::debug!("root grew, height now {}", self.meta.height);
            return Ok(());
        }

        let mut node: InternalNode<ORDER> = self.store.read_internal(parent_offset)?;

        if node.n < ORDER {
            insert_key_to_index_no_split(&mut node, key, after);
            self.store.write_node(parent_offset, &node)?;
            return Ok(());
        }

        let grandparent = node.parent;
        let (new_offset, mut new_node) = self.store.alloc_internal::<ORDER>(&mut self.meta)?;

        new_node.parent = node.parent;
        new_node.next = node.next;
        new_node.prev = parent_offset;
        node.next = new_offset;

        if new_node.next != NULL_OFFSET {
            let mut successor: InternalNode<ORDER> = self.store.read_internal(new_node.next)?;
            successor.prev = new_offset;
            self.store.write_node(new_node.next, &successor)?;
        }

        // Three-case midpoint selection, mirroring the source exactly: a
        // plain bisection can land one slot past (or short of) where the
        // incoming key actually belongs once placement is accounted for.
        let mut point = (node.n - 1) / 2;
        let place_right = keycmp(&key, &node.children[point].key) == Ordering::Greater;
        if place_right {
            point += 1;
        }
        if place_right && keycmp(&key, &node.children[point].key) == Ordering::Less {
            point -= 1;
        }

        let middle_key = node.children[point].key;

        let moved = node.n - point - 1;
        new_node.children[..moved].copy_from_slice(&node.children[point + 1..node.n]);
        new_node.n = moved;
        node.n = point + 1;

        if place_right {
            insert_key_to_index_no_split(&mut new_node, key, after);
        } else {
            insert_key_to_index_no_split(&mut node, key, after);
        }

        log::trace!(
            "split internal {parent_offset} -> {new_offset}, sizes {}/{}",
            node.n,
            new_node.n
        );

        self.store.write_node(parent_offset, &node)?;
        self.store.write_node(new_offset, &new_node)?;
        self.store.write_meta(&self.meta)?;

        let moved_children: Vec<Offset> = new_node.live().iter().map(|e| e.child).collect();
        for child in moved_children {
            self.reparent_one(child, new_offset, leaf_children)?;
        }

        self.insert_key_to_index(grandparent, middle_key, parent_offset, new_offset, false)
    }

    pub(crate) fn set_leaf_parent(&self, offset: Offset, parent: Offset) -> Result<()> {
        let mut node: LeafNode<ORDER> = self.store.read_leaf(offset)?;
        node.parent = parent;
        self.store.write_node(offset, &node)
    }

    pub(crate) fn set_internal_parent(&self, offset: Offset, parent: Offset) -> Result<()> {
        let mut node: InternalNode<ORDER> = self.store.read_internal(offset)?;
        node.parent = parent;
        self.store.write_node(offset, &node)
    }

    pub(crate) fn reparent_one(&self, child: Offset, parent: Offset, leaf_child: bool) -> Result<()> {
        if leaf_child {
            self.set_leaf_parent(child, parent)
        } else {
            self.set_internal_parent(child, parent)
        }
    }
}

/// Insert `(key, value)` into `leaf` in sorted position. Caller must
/// ensure `leaf.n < ORDER`.
fn insert_record_no_split<const ORDER: usize>(leaf: &mut LeafNode<ORDER>, key: Key, value: Value) {
    let idx = leaf
        .live()
        .partition_point(|r| keycmp(&r.key, &key) != Ordering::Greater);
    leaf.children.copy_within(idx..leaf.n, idx + 1);
    leaf.children[idx] = Record { key, value };
    leaf.n += 1;
}

/// Insert a new `(separator, child)` pair into `node` in sorted position.
/// Caller must ensure `node.n < ORDER`.
fn insert_key_to_index_no_split<const ORDER: usize>(
    node: &mut InternalNode<ORDER>,
    key: Key,
    after: Offset,
) {
    let idx = node
        .separators()
        .partition_point(|e| keycmp(&e.key, &key) != Ordering::Greater);

    node.children.copy_within(idx..node.n, idx + 1);
    let left_child = node.children[idx].child;
    node.children[idx].key = key;
    node.children[idx].child = left_child;
    node.children[idx + 1].child = after;
    node.n += 1;
}
