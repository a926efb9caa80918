//! Cache-line sized leaf and internal nodes.

use crate::group::GroupId;
use crate::layout::{FANOUT, LEAF_CAPACITY, LEAF_SPLIT};
use crate::{Key, Value};

// =============================================================================
// Sibling link
// =============================================================================

/// Non-owning reference to a leaf: `(group, slot)` packed into one word.
///
/// Layout: bits 8..40 hold the group id, bits 0..8 the slot.
/// Special: `u64::MAX` = NULL (no sibling).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct LeafLink(u64);

impl LeafLink {
    const SLOT_BITS: u32 = 8;
    const SLOT_MASK: u64 = (1u64 << Self::SLOT_BITS) - 1;
    pub(crate) const NULL: LeafLink = LeafLink(u64::MAX);

    #[inline]
    pub(crate) fn new(group: GroupId, slot: usize) -> Self {
        debug_assert!((slot as u64) <= Self::SLOT_MASK);
        Self(((group.0 as u64) << Self::SLOT_BITS) | slot as u64)
    }

    #[inline]
    pub(crate) fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    #[inline]
    pub(crate) fn group(self) -> GroupId {
        debug_assert!(!self.is_null());
        GroupId((self.0 >> Self::SLOT_BITS) as u32)
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        debug_assert!(!self.is_null());
        (self.0 & Self::SLOT_MASK) as usize
    }
}

// =============================================================================
// Leaf node
// =============================================================================

/// Sorted run of up to [`LEAF_CAPACITY`] entries plus a forward sibling link.
///
/// Keys and values are kept in separate arrays so a lookup scans 56
/// contiguous bytes of keys before touching a value.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(128))]
pub struct LeafNode {
    keys: [Key; LEAF_CAPACITY],
    values: [Value; LEAF_CAPACITY],
    pub(crate) next: LeafLink,
    len: u8,
}

impl LeafNode {
    pub(crate) const EMPTY: LeafNode = LeafNode {
        keys: [0; LEAF_CAPACITY],
        values: [0; LEAF_CAPACITY],
        next: LeafLink::NULL,
        len: 0,
    };

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == LEAF_CAPACITY
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys[..self.len()]
    }

    pub fn values(&self) -> &[Value] {
        &self.values[..self.len()]
    }

    #[inline]
    pub(crate) fn key_at(&self, offset: usize) -> Key {
        self.keys[offset]
    }

    #[inline]
    pub(crate) fn value_at(&self, offset: usize) -> Value {
        self.values[offset]
    }

    /// Largest key held. Only meaningful for a non-empty leaf.
    #[inline]
    pub(crate) fn max_key(&self) -> Key {
        debug_assert!(!self.is_empty());
        self.keys[self.len() - 1]
    }

    /// Linear scan: `Ok(offset)` on an exact match, otherwise `Err(offset)`
    /// of the first key greater than `key`.
    #[inline]
    pub(crate) fn search(&self, key: Key) -> Result<usize, usize> {
        for (i, &k) in self.keys().iter().enumerate() {
            if k == key {
                return Ok(i);
            }
            if k > key {
                return Err(i);
            }
        }
        Err(self.len())
    }

    /// Shifts `offset..` right by one and writes the entry. Leaf must have room.
    pub(crate) fn insert_at(&mut self, offset: usize, key: Key, value: Value) {
        debug_assert!(!self.is_full());
        let len = self.len();
        self.keys.copy_within(offset..len, offset + 1);
        self.values.copy_within(offset..len, offset + 1);
        self.keys[offset] = key;
        self.values[offset] = value;
        self.len += 1;
    }

    /// Splits a full leaf while inserting one more entry at `offset`.
    ///
    /// `self` keeps the smallest [`LEAF_SPLIT`] entries; the returned leaf
    /// takes the rest. Sibling links are left for the caller to wire.
    pub(crate) fn split_insert(&mut self, offset: usize, key: Key, value: Value) -> LeafNode {
        debug_assert!(self.is_full());
        let mut keys = [0; LEAF_CAPACITY + 1];
        let mut values = [0; LEAF_CAPACITY + 1];
        keys[..offset].copy_from_slice(&self.keys[..offset]);
        values[..offset].copy_from_slice(&self.values[..offset]);
        keys[offset] = key;
        values[offset] = value;
        keys[offset + 1..].copy_from_slice(&self.keys[offset..]);
        values[offset + 1..].copy_from_slice(&self.values[offset..]);

        let mut right = LeafNode::EMPTY;
        let right_len = LEAF_CAPACITY + 1 - LEAF_SPLIT;
        right.keys[..right_len].copy_from_slice(&keys[LEAF_SPLIT..]);
        right.values[..right_len].copy_from_slice(&values[LEAF_SPLIT..]);
        right.len = right_len as u8;

        self.keys = [0; LEAF_CAPACITY];
        self.values = [0; LEAF_CAPACITY];
        self.keys[..LEAF_SPLIT].copy_from_slice(&keys[..LEAF_SPLIT]);
        self.values[..LEAF_SPLIT].copy_from_slice(&values[..LEAF_SPLIT]);
        self.len = LEAF_SPLIT as u8;
        right
    }
}

// =============================================================================
// Internal node
// =============================================================================

/// Up to [`FANOUT`] children, all stored in one node group.
///
/// Separator `i` is the largest key reachable through child `i`. The last
/// child has no separator and covers everything above the last one, so a
/// node with `n` children holds `n - 1` separators. The final array slot is
/// only occupied transiently while a full node absorbs a split.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(128))]
pub struct InternalNode {
    separators: [Key; FANOUT],
    pub(crate) children: GroupId,
    len: u8,
}

impl InternalNode {
    pub(crate) const EMPTY: InternalNode = InternalNode {
        separators: [0; FANOUT],
        children: GroupId::NULL,
        len: 0,
    };

    /// A node over two children in `children`, split at `separator`.
    pub(crate) fn with_two_children(children: GroupId, separator: Key) -> Self {
        let mut node = Self::EMPTY;
        node.separators[0] = separator;
        node.children = children;
        node.len = 2;
        node
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.child_count() == FANOUT
    }

    pub fn separators(&self) -> &[Key] {
        &self.separators[..self.child_count().saturating_sub(1)]
    }

    /// Child index to descend into for `key`: the first separator not below
    /// `key`, else the last child.
    #[inline]
    pub(crate) fn route(&self, key: Key) -> usize {
        let seps = self.separators();
        for (i, &sep) in seps.iter().enumerate() {
            if key <= sep {
                return i;
            }
        }
        seps.len()
    }

    /// Records that child `child` split at `separator`, its right half now
    /// sitting at `child + 1`. Node must have room.
    pub(crate) fn insert_separator(&mut self, child: usize, separator: Key) {
        debug_assert!(!self.is_full());
        let seps = self.child_count() - 1;
        self.separators.copy_within(child..seps, child + 1);
        self.separators[child] = separator;
        self.len += 1;
    }

    /// Splits a full node while recording that child `child` split at
    /// `separator`.
    ///
    /// `self` keeps the first [`GROUP_SPLIT`](crate::layout::GROUP_SPLIT)
    /// children. The returned node takes the rest and points at
    /// `right_children`. The returned key separates the two halves.
    pub(crate) fn split_insert(
        &mut self,
        child: usize,
        separator: Key,
        right_children: GroupId,
    ) -> (Key, InternalNode) {
        use crate::layout::GROUP_SPLIT;

        debug_assert!(self.is_full());
        // FANOUT + 1 children need exactly FANOUT separators.
        let seps = FANOUT - 1;
        self.separators.copy_within(child..seps, child + 1);
        self.separators[child] = separator;

        let promoted = self.separators[GROUP_SPLIT - 1];
        let mut right = InternalNode::EMPTY;
        let right_seps = FANOUT - GROUP_SPLIT;
        right.separators[..right_seps].copy_from_slice(&self.separators[GROUP_SPLIT..]);
        right.children = right_children;
        right.len = (FANOUT + 1 - GROUP_SPLIT) as u8;

        self.separators[GROUP_SPLIT - 1..].fill(0);
        self.len = GROUP_SPLIT as u8;
        (promoted, right)
    }
}
