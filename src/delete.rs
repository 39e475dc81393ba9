//! Delete: leaf removal with borrow-then-merge rebalancing, propagated
//! upward through internal nodes, including root collapse.

use std::cmp::Ordering;

use crate::error::Result;
use crate::key::{keycmp, Key};
use crate::node::{InternalNode, LeafNode, Offset, NULL_OFFSET};
use crate::search;
use crate::tree::{BPlusTree, RemoveStatus};

impl<const ORDER: usize> BPlusTree<ORDER> {
    /// Remove `key`. Returns `NotFound` without mutation if it is absent.
    pub fn remove(&mut self, key: &Key) -> Result<RemoveStatus> {
        let offset = search::search_leaf_direct::<ORDER>(&self.store, &self.meta, key)?;
        let mut leaf: LeafNode<ORDER> = self.store.read_leaf(offset)?;

        let idx = search::find_leaf(&leaf, key);
        if idx >= leaf.n || keycmp(&leaf.children[idx].key, key) != Ordering::Equal {
            return Ok(RemoveStatus::NotFound);
        }

        // A lone root leaf has no underflow floor at all.
        let min_n = if self.meta.leaf_node_num == 1 {
            0
        } else {
            self.min_n()
        };

        leaf.children.copy_within(idx + 1..leaf.n, idx);
        leaf.n -= 1;

        if leaf.n >= min_n {
            self.store.write_node(offset, &leaf)?;
            return Ok(RemoveStatus::Removed);
        }

        if leaf.prev != NULL_OFFSET && self.borrow_leaf(&mut leaf, false)? {
            self.store.write_node(offset, &leaf)?;
            return Ok(RemoveStatus::Removed);
        }
        if leaf.next != NULL_OFFSET && self.borrow_leaf(&mut leaf, true)? {
            self.store.write_node(offset, &leaf)?;
            return Ok(RemoveStatus::Removed);
        }

        let parent_offset = leaf.parent;
        let parent: InternalNode<ORDER> = self.store.read_internal(parent_offset)?;
        let is_rightmost = parent.children[parent.n - 1].child == offset;

        if is_rightmost {
            let prev_offset = leaf.prev;
            let mut prev: LeafNode<ORDER> = self.store.read_leaf(prev_offset)?;
            let index_key = prev.children[0].key;

            merge_leaves(&mut prev, &leaf);
            prev.next = leaf.next;
            if leaf.next != NULL_OFFSET {
                let mut successor: LeafNode<ORDER> = self.store.read_leaf(leaf.next)?;
                successor.prev = prev_offset;
                self.store.write_node(leaf.next, &successor)?;
            }
            self.store.free_leaf(&mut self.meta);
            self.store.write_node(prev_offset, &prev)?;
            self.store.write_meta(&self.meta)?;
            log::trace!("merge leaf {offset} into {prev_offset}, size now {}", prev.n);

            self.remove_from_index(parent_offset, parent, index_key, true)?;
        } else {
            let next_offset = leaf.next;
            let mut next: LeafNode<ORDER> = self.store.read_leaf(next_offset)?;
            let index_key = leaf.children[0].key;

            merge_leaves(&mut leaf, &next);
            leaf.next = next.next;
            if next.next != NULL_OFFSET {
                let mut successor: LeafNode<ORDER> = self.store.read_leaf(next.next)?;
                successor.prev = offset;
                self.store.write_node(next.next, &successor)?;
            }
            self.store.free_leaf(&mut self.meta);
            self.store.write_node(offset, &leaf)?;
            self.store.write_meta(&self.meta)?;
            log::trace!(
                "merge leaf {next_offset} into {offset}, size now {}",
                leaf.n
            );

            self.remove_from_index(parent_offset, parent, index_key, true)?;
        }

        Ok(RemoveStatus::Removed)
    }

    fn borrow_leaf(&mut self, leaf: &mut LeafNode<ORDER>, from_right: bool) -> Result<bool> {
        let lender_offset = if from_right { leaf.next } else { leaf.prev };
        let mut lender: LeafNode<ORDER> = self.store.read_leaf(lender_offset)?;

        if lender.n <= self.min_n() {
            return Ok(false);
        }

        if from_right {
            let old_key = leaf.children[0].key;
            let new_key = lender.children[1].key;

            leaf.children[leaf.n] = lender.children[0];
            leaf.n += 1;

            lender.children.copy_within(1..lender.n, 0);
            lender.n -= 1;

            self.change_parent_child(leaf.parent, old_key, new_key)?;
        } else {
            let old_key = lender.children[0].key;
            let new_key = lender.children[lender.n - 1].key;

            leaf.children.copy_within(0..leaf.n, 1);
            leaf.children[0] = lender.children[lender.n - 1];
            leaf.n += 1;
            lender.n -= 1;

            self.change_parent_child(lender.parent, old_key, new_key)?;
        }

        self.store.write_node(lender_offset, &lender)?;
        log::trace!(
            "leaf borrow {lender_offset} -> sizes {}/{}",
            lender.n,
            leaf.n
        );
        Ok(true)
    }

    /// Rewrite the separator equal to `old_key` (found via subtree-range
    /// lookup, not exact match) to `new_key`, in `parent` and every
    /// ancestor in which that same subtree boundary is the node's own
    /// rightmost (key-less) slot — the separator can be "owed" by an
    /// arbitrarily distant ancestor when the borrower sits on the left
    /// spine of its immediate parent.
    fn change_parent_child(&mut self, parent: Offset, old_key: Key, new_key: Key) -> Result<()> {
        let mut node: InternalNode<ORDER> = self.store.read_internal(parent)?;
        let idx = search::find_internal(&node, Some(&old_key));
        node.children[idx].key = new_key;
        let is_last = idx == node.n - 1;
        let grandparent = node.parent;
        self.store.write_node(parent, &node)?;
        if is_last {
            self.change_parent_child(grandparent, old_key, new_key)?;
        }
        Ok(())
    }

    /// `node` is supplied by the caller (rather than re-read here) so
    /// that, when this call is itself the continuation of a sibling
    /// merge one level down, the in-memory separator rewrite that merge
    /// already made to this very node is carried forward instead of
    /// being overwritten by a stale reread from disk.
    fn remove_from_index(
        &mut self,
        offset: Offset,
        mut node: InternalNode<ORDER>,
        key: Key,
        leaf_children: bool,
    ) -> Result<()> {
        let own_first_key = node.children[0].key;

        let idx = search::find_internal(&node, Some(&key));
        delete_index_entry(&mut node, idx);

        // Unlike the source (whose root always wraps an internal node,
        // even over a single empty leaf), a height-1 root here is a bare
        // leaf: collapsing the last internal level all the way down to
        // one is exactly the terminal case, not something to guard
        // against.
        if node.n == 1 && self.meta.root_offset == offset {
            self.store.free_internal(&mut self.meta);
            self.meta.height -= 1;
            self.meta.root_offset = node.children[0].child;
            self.store.write_meta(&self.meta)?;
            log::debug!("root collapsed to height {}", self.meta.height);
            return Ok(());
        }

        let min_n = if self.meta.root_offset == offset {
            1
        } else {
            self.min_n()
        };

        if node.n >= min_n {
            self.store.write_node(offset, &node)?;
            return Ok(());
        }

        let parent_offset = node.parent;
        let mut parent: InternalNode<ORDER> = self.store.read_internal(parent_offset)?;
        let is_leftmost = parent.children[0].child == offset;
        let is_rightmost = parent.children[parent.n - 1].child == offset;

        if !is_leftmost && self.borrow_internal(&mut node, offset, false, leaf_children)? {
            self.store.write_node(offset, &node)?;
            return Ok(());
        }
        if !is_rightmost && self.borrow_internal(&mut node, offset, true, leaf_children)? {
            self.store.write_node(offset, &node)?;
            return Ok(());
        }

        if is_rightmost {
            let prev_offset = node.prev;
            let mut prev: InternalNode<ORDER> = self.store.read_internal(prev_offset)?;

            let where_idx = search::find_internal(&parent, Some(&prev.children[0].key));
            parent.children[where_idx].key = node.children[node.n - 1].key;

            self.reparent_children(&node, prev_offset, leaf_children)?;
            let moved = node.n;
            prev.children[prev.n..prev.n + moved].copy_from_slice(&node.children[..moved]);
            prev.n += moved;
            prev.next = node.next;
            if node.next != NULL_OFFSET {
                let mut successor: InternalNode<ORDER> = self.store.read_internal(node.next)?;
                successor.prev = prev_offset;
                self.store.write_node(node.next, &successor)?;
            }

            self.store.free_internal(&mut self.meta);
            self.store.write_node(prev_offset, &prev)?;
            self.store.write_meta(&self.meta)?;
            log::trace!(
                "merge internal {offset} into {prev_offset}, size now {}",
                prev.n
            );

            self.remove_from_index(parent_offset, parent, own_first_key, false)
        } else {
            let next_offset = node.next;
            let next: InternalNode<ORDER> = self.store.read_internal(next_offset)?;

            self.reparent_children(&next, offset, leaf_children)?;
            let moved = next.n;
            node.children[node.n..node.n + moved].copy_from_slice(&next.children[..moved]);
            node.n += moved;
            node.next = next.next;
            if next.next != NULL_OFFSET {
                let mut successor: InternalNode<ORDER> = self.store.read_internal(next.next)?;
                successor.prev = offset;
                self.store.write_node(next.next, &successor)?;
            }

            self.store.free_internal(&mut self.meta);
            self.store.write_node(offset, &node)?;
            self.store.write_meta(&self.meta)?;
            log::trace!(
                "merge internal {next_offset} into {offset}, size now {}",
                node.n
            );

            self.remove_from_index(parent_offset, parent, own_first_key, false)
        }
    }

    fn borrow_internal(
        &mut self,
        borrower: &mut InternalNode<ORDER>,
        offset: Offset,
        from_right: bool,
        leaf_children: bool,
    ) -> Result<bool> {
        let lender_offset = if from_right { borrower.next } else { borrower.prev };
        let mut lender: InternalNode<ORDER> = self.store.read_internal(lender_offset)?;

        if lender.n <= self.min_n() {
            return Ok(false);
        }

        if from_right {
            let moved = lender.children[0];

            let mut parent: InternalNode<ORDER> = self.store.read_internal(borrower.parent)?;
            let where_idx =
                search::find_internal(&parent, Some(&borrower.children[borrower.n - 1].key));
            parent.children[where_idx].key = moved.key;
            self.store.write_node(borrower.parent, &parent)?;

            borrower.children[borrower.n] = moved;
            borrower.n += 1;

            self.reparent_one(moved.child, offset, leaf_children)?;

            lender.children.copy_within(1..lender.n, 0);
            lender.n -= 1;
        } else {
            let moved = lender.children[lender.n - 1];
            let new_last_key = lender.children[lender.n - 2].key;

            let mut parent: InternalNode<ORDER> = self.store.read_internal(lender.parent)?;
            let where_idx = search::find_internal(&parent, Some(&lender.children[0].key));
            parent.children[where_idx].key = new_last_key;
            self.store.write_node(lender.parent, &parent)?;

            borrower.children.copy_within(0..borrower.n, 1);
            borrower.children[0] = moved;
            borrower.n += 1;
            lender.n -= 1;

            self.reparent_one(moved.child, offset, leaf_children)?;
        }

        self.store.write_node(lender_offset, &lender)?;
        log::trace!(
            "internal borrow {lender_offset} -> sizes {}/{}",
            lender.n,
            borrower.n
        );
        Ok(true)
    }

    fn reparent_children(
        &self,
        node: &InternalNode<ORDER>,
        new_parent: Offset,
        leaf_children: bool,
    ) -> Result<()> {
        for entry in node.live() {
            self.reparent_one(entry.child, new_parent, leaf_children)?;
        }
        Ok(())
    }
}

fn merge_leaves<const ORDER: usize>(left: &mut LeafNode<ORDER>, right: &LeafNode<ORDER>) {
    left.children[left.n..left.n + right.n].copy_from_slice(&right.children[..right.n]);
    left.n += right.n;
}

/// Remove the entry at `idx`, carrying its child pointer forward into the
/// slot that takes its place. The node's last (key-less) slot has nothing
/// to its right to carry, so deleting it is a plain truncation.
fn delete_index_entry<const ORDER: usize>(node: &mut InternalNode<ORDER>, idx: usize) {
    if idx + 1 < node.n {
        node.children[idx + 1].child = node.children[idx].child;
    }
    node.children.copy_within(idx + 1..node.n, idx);
    node.n -= 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Value;
    use crate::tree::{InsertStatus, SearchStatus};

    fn open() -> (tempfile::TempDir, BPlusTree<4>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let tree = BPlusTree::<4>::open(path, true).unwrap();
        (dir, tree)
    }

    #[test]
    fn remove_on_empty_tree_is_not_found() {
        let (_dir, mut tree) = open();
        assert_eq!(tree.remove(&Key::new("a")).unwrap(), RemoveStatus::NotFound);
    }

    #[test]
    fn insert_then_remove_round_trips() {
        let (_dir, mut tree) = open();
        tree.insert(&Key::new("a"), 1).unwrap();
        assert_eq!(tree.remove(&Key::new("a")).unwrap(), RemoveStatus::Removed);
        let (status, _) = tree.search(&Key::new("a")).unwrap();
        assert_eq!(status, SearchStatus::NotFound);
        assert_eq!(tree.remove(&Key::new("a")).unwrap(), RemoveStatus::NotFound);
    }

    #[test]
    fn remove_forcing_merge_and_root_collapse() {
        let (_dir, mut tree) = open();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)] {
            assert_eq!(tree.insert(&Key::new(k), v).unwrap(), InsertStatus::Inserted);
        }
        assert_eq!(tree.meta().height, 2);

        // Reduce to three keys across two leaves, then force a merge that
        // empties the internal root back down to a single leaf.
        tree.remove(&Key::new("d")).unwrap();
        tree.remove(&Key::new("e")).unwrap();
        assert_eq!(tree.remove(&Key::new("c")).unwrap(), RemoveStatus::Removed);

        let meta = tree.meta();
        assert_eq!(meta.height, 1);
        assert_eq!(meta.internal_node_num, 0);

        for (k, v) in [("a", 1), ("b", 2)] {
            let (status, value) = tree.search(&Key::new(k)).unwrap();
            assert_eq!(status, SearchStatus::Found);
            assert_eq!(value, Some(v));
        }
    }

    #[test]
    fn remove_many_preserves_remaining_keys() {
        let (_dir, mut tree) = open();
        let keys: Vec<String> = ('a'..='t').map(|c| c.to_string()).collect();
        for (i, k) in keys.iter().enumerate() {
            tree.insert(&Key::new(k), i as Value).unwrap();
        }

        for k in keys.iter().step_by(2) {
            assert_eq!(tree.remove(&Key::new(k)).unwrap(), RemoveStatus::Removed);
        }

        for (i, k) in keys.iter().enumerate() {
            let (status, value) = tree.search(&Key::new(k)).unwrap();
            if i % 2 == 0 {
                assert_eq!(status, SearchStatus::NotFound, "key {k} should be gone");
            } else {
                assert_eq!(status, SearchStatus::Found, "key {k} should remain");
                assert_eq!(value, Some(i as Value));
            }
        }
    }
}
