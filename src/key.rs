//! Fixed-width key domain.
//!
//! Keys are 16-byte, null-padded buffers compared with an unusual
//! length-first ordering: shorter strings always sort before longer ones,
//! and only equal-length strings fall back to a byte-wise comparison. This
//! defines the on-disk sort order for the whole tree, so it must never
//! change once a file has been written.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Width, in bytes, of every key stored in the tree.
pub const KEY_SIZE: usize = 16;

/// A fixed-width, null-padded key.
///
/// Two keys of different *logical* length (the position of the first NUL
/// byte, or `KEY_SIZE` if there is none) are ordered by that length alone;
/// only keys of equal logical length fall back to lexicographic
/// comparison. See [`keycmp`].
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// The empty key: all-zero bytes, logical length 0.
    ///
    /// Sorts before every non-empty key and doubles as the "absent"
    /// sentinel used internally by [`crate::search::find_internal`].
    pub const EMPTY: Key = Key([0u8; KEY_SIZE]);

    /// Build a key from a UTF-8 string, truncating to `KEY_SIZE` bytes and
    /// null-padding the remainder.
    ///
    /// Panics if `s` contains an interior NUL byte, since that would make
    /// the logical length ambiguous.
    pub fn new(s: &str) -> Key {
        let bytes = s.as_bytes();
        assert!(
            !bytes.contains(&0),
            "key must not contain an interior NUL byte"
        );
        assert!(bytes.len() <= KEY_SIZE, "key longer than KEY_SIZE");
        let mut buf = [0u8; KEY_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Key(buf)
    }

    /// The raw, fixed-width byte representation.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Logical length: the offset of the first NUL byte, or `KEY_SIZE` if
    /// the buffer has none (a fully-packed key with no terminator).
    pub fn len(&self) -> usize {
        self.0.iter().position(|&b| b == 0).unwrap_or(KEY_SIZE)
    }

    /// True for [`Key::EMPTY`] and any other buffer whose first byte is
    /// NUL.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn logical(&self) -> &[u8] {
        &self.0[..self.len()]
    }
}

impl Default for Key {
    fn default() -> Key {
        Key::EMPTY
    }
}

/// Length-first, then lexicographic, comparison of two keys.
///
/// This is the ordering the on-disk format is sorted under; do not
/// replace it with plain byte-lexicographic comparison even though `Key`
/// is "just" a byte buffer.
pub fn keycmp(a: &Key, b: &Key) -> Ordering {
    keycmp_delta(a, b).cmp(&0)
}

/// A signed integer comparison matching the original's `keycmp`: the
/// difference in logical length when lengths differ, otherwise the
/// difference between the first pair of differing bytes (zero if equal).
///
/// Only the sign is part of the public contract (see [`keycmp`]); the
/// magnitude is preserved for source parity but is not itself meaningful
/// beyond "how early/how far the mismatch was", exactly as in the
/// original C `strcmp`-based comparator.
pub fn keycmp_delta(a: &Key, b: &Key) -> i32 {
    let (la, lb) = (a.len(), b.len());
    if la != lb {
        return la as i32 - lb as i32;
    }
    for i in 0..la {
        if a.0[i] != b.0[i] {
            return a.0[i] as i32 - b.0[i] as i32;
        }
    }
    0
}

impl PartialEq for Key {
    fn eq(&self, other: &Key) -> bool {
        keycmp(self, other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Key) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Key) -> Ordering {
        keycmp(self, other)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(self.logical()) {
            Ok(s) => write!(f, "Key({s:?})"),
            Err(_) => write!(f, "Key({:?})", self.logical()),
        }
    }
}
