//! Range scan: copy all values for keys in `[left, right]` into a caller
//! buffer, walking the leaf chain rather than descending repeatedly.

use std::cmp::Ordering;

use crate::error::Result;
use crate::key::{keycmp, Key};
use crate::node::{LeafNode, Value, NULL_OFFSET};
use crate::search;
use crate::tree::BPlusTree;

impl<const ORDER: usize> BPlusTree<ORDER> {
    /// Copy up to `max` values (and at most `out.len()`) for keys in
    /// `[*left, right]` into `out`, in ascending key order.
    ///
    /// Returns `(count, has_more)`, or `(-1, false)` if `*left > right`
    /// without touching the tree. When `has_more` is true, the scan
    /// stopped before reaching `right`; `*left` is advanced to the key of
    /// the first unread record, so a following call with the same `out`
    /// and `right` resumes where this one stopped.
    pub fn search_range(
        &mut self,
        left: &mut Key,
        right: &Key,
        out: &mut [Value],
        max: usize,
    ) -> Result<(i64, bool)> {
        if keycmp(left, right) == Ordering::Greater {
            return Ok((-1, false));
        }

        let max = max.min(out.len());
        let off_left = search::search_leaf_direct::<ORDER>(&self.store, &self.meta, left)?;
        let off_right = search::search_leaf_direct::<ORDER>(&self.store, &self.meta, right)?;

        let mut off = off_left;
        let mut i = 0usize;
        // The last leaf touched, together with how far it was drained
        // (`cursor`) and where its eligible records end (`end`) — used
        // after both loops below to decide `has_more` and the resume key.
        let mut window: Option<(LeafNode<ORDER>, usize, usize)> = None;

        while off != off_right && off != NULL_OFFSET && i < max {
            let leaf: LeafNode<ORDER> = self.store.read_leaf(off)?;
            let start = if off == off_left {
                search::find_leaf(&leaf, left)
            } else {
                0
            };
            let end = leaf.n;

            let mut cursor = start;
            while cursor < end && i < max {
                out[i] = leaf.children[cursor].value;
                i += 1;
                cursor += 1;
            }

            let next = leaf.next;
            window = Some((leaf, cursor, end));
            off = next;
        }

        if i < max {
            let leaf: LeafNode<ORDER> = self.store.read_leaf(off_right)?;
            let start = search::find_leaf(&leaf, left);
            let end = leaf
                .live()
                .partition_point(|record| keycmp(&record.key, right) != Ordering::Greater);

            let mut cursor = start;
            while cursor < end && i < max {
                out[i] = leaf.children[cursor].value;
                i += 1;
                cursor += 1;
            }
            window = Some((leaf, cursor, end));
        }

        let has_more = matches!(&window, Some((_, cursor, end)) if i == max && cursor < end);
        if has_more {
            let (leaf, cursor, _) = window.expect("has_more implies a window");
            *left = leaf.children[cursor].key;
        }

        Ok((i as i64, has_more))
    }
}
