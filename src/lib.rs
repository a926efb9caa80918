//! # csb-tree
//!
//! A cache-sensitive B+-tree (CSB+-tree) over `u64` keys and values.
//!
//! Based on "Making B+-Trees Cache Conscious in Main Memory"
//! (SIGMOD 2000, Rao and Ross).
//!
//! Every leaf and internal node is exactly one cache line. All children of
//! an internal node live side by side in one node group, so an internal
//! node stores a single group reference instead of one pointer per child.
//! Descending a level costs one line fetch; the 7 to 14 key comparisons
//! that pick the next child all hit that line.
//!
//! ## Example
//!
//! ```rust
//! use csb_tree::CsbTree;
//!
//! let mut tree = CsbTree::new();
//! tree.insert(20, 200).unwrap();
//! tree.insert(10, 100).unwrap();
//!
//! assert_eq!(tree.get(10).unwrap(), Some(100));
//! assert_eq!(tree.get(30).unwrap(), None);
//!
//! let (_, inserted) = tree.insert(10, 999).unwrap();
//! assert!(!inserted);
//!
//! let pairs: Vec<_> = tree.iter().unwrap().collect();
//! assert_eq!(pairs, vec![(10, 100), (20, 200)]);
//! ```

#![forbid(unsafe_code)]

mod error;
mod group;
mod layout;
mod node;
mod stats;

use std::fmt;
use std::iter::FusedIterator;
use std::mem::size_of;

use smallvec::SmallVec;

pub use error::{Result, TreeError};
pub use group::{NodeGroup, NodeKind, NodeRef};
pub use layout::{
    verify_layout, TreeConfig, CACHE_LINE_SIZE, FANOUT, GROUP_CAPACITY, LEAF_CAPACITY,
};
pub use node::{InternalNode, LeafNode};
pub use stats::TreeStats;

use group::{GroupArena, GroupId, Node};
use layout::MAX_INLINE_HEIGHT;
use node::LeafLink;

pub type Key = u64;
pub type Value = u64;

/// One step of a root-to-leaf descent: the node at `slot` of `group`.
#[derive(Clone, Copy, Debug)]
struct Frame {
    group: GroupId,
    slot: usize,
}

/// `path[d - 1]` locates the node at depth `d` (the root is depth 0).
type Path = SmallVec<[Frame; MAX_INLINE_HEIGHT]>;

#[derive(Clone)]
enum Root {
    Leaf(LeafNode),
    Internal(Box<InternalNode>),
}

// =============================================================================
// CsbTree
// =============================================================================

/// An ordered map from [`Key`] to [`Value`] laid out as a CSB+-tree.
///
/// Keys are unique: inserting a present key leaves the tree unchanged and
/// reports the existing entry.
#[derive(Clone)]
pub struct CsbTree {
    root: Root,
    /// Internal levels above the leaves. 0 means the root is a leaf.
    height: usize,
    groups: GroupArena,
    len: usize,
    stats: TreeStats,
}

impl CsbTree {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            root: Root::Leaf(LeafNode::EMPTY),
            height: 0,
            groups: GroupArena::with_capacity(config.initial_groups),
            len: 0,
            stats: TreeStats::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Node groups allocated so far.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn stats(&self) -> TreeStats {
        self.stats
    }

    pub fn memory_usage(&self) -> usize {
        let root = match self.root {
            Root::Leaf(_) => 0,
            Root::Internal(_) => size_of::<InternalNode>(),
        };
        size_of::<Self>() + root + self.groups.capacity() * size_of::<NodeGroup>()
    }

    /// Descends from the root to the leaf that owns `key`, recording every
    /// group slot visited.
    fn search_path(&self, key: Key) -> Result<Path> {
        let mut path = Path::new();
        let mut node = match &self.root {
            Root::Leaf(_) => return Ok(path),
            Root::Internal(node) => node.as_ref(),
        };
        for depth in 1..=self.height {
            let frame = Frame {
                group: node.children,
                slot: node.route(key),
            };
            path.push(frame);
            if depth < self.height {
                node = self.groups.get(frame.group)?.internal(frame.slot)?;
            }
        }
        Ok(path)
    }

    /// The leaf at the end of a path; `None` is the root leaf.
    fn leaf_at(&self, frame: Option<&Frame>) -> Result<&LeafNode> {
        match (frame, &self.root) {
            (Some(frame), _) => self.groups.get(frame.group)?.leaf(frame.slot),
            (None, Root::Leaf(leaf)) => Ok(leaf),
            (None, Root::Internal(_)) => Err(TreeError::KindMismatch {
                expected: NodeKind::Leaf,
                found: NodeKind::Internal,
            }),
        }
    }

    /// Cursor at `key`, or the end cursor if it is absent.
    pub fn find(&self, key: Key) -> Result<Cursor<'_>> {
        let path = self.search_path(key)?;
        let leaf = self.leaf_at(path.last())?;
        Ok(match leaf.search(key) {
            Ok(offset) => Cursor::at(&self.groups, leaf, offset),
            Err(_) => Cursor::end(&self.groups),
        })
    }

    pub fn get(&self, key: Key) -> Result<Option<Value>> {
        Ok(self.find(key)?.value())
    }

    pub fn contains_key(&self, key: Key) -> Result<bool> {
        Ok(!self.find(key)?.is_end())
    }

    /// Cursor at the first entry whose key is not below `key`.
    pub fn lower_bound(&self, key: Key) -> Result<Cursor<'_>> {
        let path = self.search_path(key)?;
        let leaf = self.leaf_at(path.last())?;
        let offset = match leaf.search(key) {
            Ok(offset) | Err(offset) => offset,
        };
        if offset < leaf.len() {
            return Ok(Cursor::at(&self.groups, leaf, offset));
        }
        // Every key in the next leaf is above this leaf's separator, hence above `key`.
        Ok(match self.groups.leaf(leaf.next)? {
            Some(next) => Cursor::at(&self.groups, next, 0),
            None => Cursor::end(&self.groups),
        })
    }

    /// Cursor at the smallest entry, or the end cursor for an empty tree.
    pub fn begin(&self) -> Result<Cursor<'_>> {
        let leaf = match &self.root {
            Root::Leaf(leaf) => leaf,
            Root::Internal(node) => {
                let mut group = self.groups.get(node.children)?;
                for _ in 1..self.height {
                    group = self.groups.get(group.internal(0)?.children)?;
                }
                group.leaf(0)?
            }
        };
        Ok(if leaf.is_empty() {
            Cursor::end(&self.groups)
        } else {
            Cursor::at(&self.groups, leaf, 0)
        })
    }

    pub fn iter(&self) -> Result<Iter<'_>> {
        Ok(self.begin()?.into_iter())
    }

    /// Entries with keys not below `key`, ascending.
    pub fn iter_from(&self, key: Key) -> Result<Iter<'_>> {
        Ok(self.lower_bound(key)?.into_iter())
    }

    /// Inserts `key` unless it is already present.
    ///
    /// Returns a cursor at the entry for `key` and whether it was inserted.
    /// A present key keeps its value and yields `(cursor_to_existing, false)`.
    pub fn insert(&mut self, key: Key, value: Value) -> Result<(Cursor<'_>, bool)> {
        let path = self.search_path(key)?;
        let found = self.leaf_at(path.last())?.search(key);
        let offset = match found {
            Ok(existing) => {
                self.stats.duplicate_inserts += 1;
                let leaf = self.leaf_at(path.last())?;
                return Ok((Cursor::at(&self.groups, leaf, existing), false));
            }
            Err(offset) => offset,
        };

        self.insert_entry(&path, offset, key, value)?;
        self.len += 1;
        self.stats.inserts += 1;
        // A split may have moved the entry; look it up again.
        Ok((self.find(key)?, true))
    }

    /// Like [`insert`](Self::insert), but a present key is an error.
    pub fn try_insert(&mut self, key: Key, value: Value) -> Result<Cursor<'_>> {
        match self.insert(key, value)? {
            (cursor, true) => Ok(cursor),
            (_, false) => Err(TreeError::DuplicateKey(key)),
        }
    }

    fn insert_entry(&mut self, path: &[Frame], offset: usize, key: Key, value: Value) -> Result<()> {
        let Some(&frame) = path.last() else {
            return self.insert_into_root_leaf(offset, key, value);
        };
        let leaf = self.groups.get_mut(frame.group)?.leaf_mut(frame.slot)?;
        if !leaf.is_full() {
            leaf.insert_at(offset, key, value);
            return Ok(());
        }

        let right = leaf.split_insert(offset, key, value);
        let separator = leaf.max_key();
        self.stats.leaf_splits += 1;
        tracing::trace!(
            target: "csb_tree::split",
            group = frame.group.0,
            slot = frame.slot,
            separator,
            "split leaf"
        );
        self.propagate_split(path, separator, Node::Leaf(right))
    }

    fn insert_into_root_leaf(&mut self, offset: usize, key: Key, value: Value) -> Result<()> {
        let Root::Leaf(leaf) = &mut self.root else {
            return Err(TreeError::KindMismatch {
                expected: NodeKind::Leaf,
                found: NodeKind::Internal,
            });
        };
        if !leaf.is_full() {
            leaf.insert_at(offset, key, value);
            return Ok(());
        }

        let mut left = *leaf;
        let right = left.split_insert(offset, key, value);
        let separator = left.max_key();
        let mut group = NodeGroup::allocate(NodeKind::Leaf);
        group.push(Node::Leaf(left))?;
        group.push(Node::Leaf(right))?;
        let id = self.groups.alloc(group);
        self.groups.get_mut(id)?.relink_leaves(id, LeafLink::NULL)?;

        self.root = Root::Internal(Box::new(InternalNode::with_two_children(id, separator)));
        self.height = 1;
        self.stats.leaf_splits += 1;
        self.stats.root_splits += 1;
        tracing::debug!(
            target: "csb_tree::split",
            separator,
            height = self.height,
            "split root leaf"
        );
        Ok(())
    }

    /// Walks a split upward from the node at the end of `path`.
    ///
    /// On entry the split node has already been cut down to its left half,
    /// with `right` holding the rest and `separator` the left half's largest
    /// key. Each round places `right` next to its left sibling, either in the
    /// same group or by splitting that group (and the parent that owns it),
    /// in which case the parent's own right half is carried one level up.
    fn propagate_split(&mut self, path: &[Frame], mut separator: Key, mut right: Node) -> Result<()> {
        let mut depth = path.len();
        loop {
            let frame = path[depth - 1];
            let group = self.groups.get_mut(frame.group)?;
            let tail = match group.kind() {
                NodeKind::Leaf => Some(group.tail_link()?),
                NodeKind::Internal => None,
            };

            if !group.is_full() {
                group.insert(frame.slot + 1, right)?;
                if let Some(tail) = tail {
                    group.relink_leaves(frame.group, tail)?;
                }
                self.parent_mut(path, depth - 1)?
                    .insert_separator(frame.slot, separator);
                return Ok(());
            }

            // A full group means a full parent: both split together.
            let right_group = group.split_insert(frame.slot + 1, right)?;
            let right_id = self.groups.alloc(right_group);
            if let Some(tail) = tail {
                self.groups
                    .get_mut(frame.group)?
                    .relink_leaves(frame.group, LeafLink::new(right_id, 0))?;
                self.groups.get_mut(right_id)?.relink_leaves(right_id, tail)?;
            }

            let (promoted, right_parent) =
                self.parent_mut(path, depth - 1)?
                    .split_insert(frame.slot, separator, right_id);
            self.stats.group_splits += 1;
            self.stats.internal_splits += 1;
            tracing::trace!(
                target: "csb_tree::split",
                group = frame.group.0,
                new_group = right_id.0,
                depth,
                promoted,
                "split node group"
            );

            if depth == 1 {
                return self.grow_root(promoted, right_parent);
            }
            separator = promoted;
            right = Node::Internal(right_parent);
            depth -= 1;
        }
    }

    /// The internal node at `depth` along `path`.
    fn parent_mut(&mut self, path: &[Frame], depth: usize) -> Result<&mut InternalNode> {
        if depth == 0 {
            return match &mut self.root {
                Root::Internal(node) => Ok(node.as_mut()),
                Root::Leaf(_) => Err(TreeError::KindMismatch {
                    expected: NodeKind::Internal,
                    found: NodeKind::Leaf,
                }),
            };
        }
        let frame = path[depth - 1];
        self.groups.get_mut(frame.group)?.internal_mut(frame.slot)
    }

    /// The root has split into itself and `right`: push both down into a
    /// fresh group under a new root.
    fn grow_root(&mut self, separator: Key, right: InternalNode) -> Result<()> {
        let Root::Internal(root) = &mut self.root else {
            return Err(TreeError::KindMismatch {
                expected: NodeKind::Internal,
                found: NodeKind::Leaf,
            });
        };
        let mut group = NodeGroup::allocate(NodeKind::Internal);
        group.push(Node::Internal(**root))?;
        group.push(Node::Internal(right))?;
        let id = self.groups.alloc(group);

        **root = InternalNode::with_two_children(id, separator);
        self.height += 1;
        self.stats.root_splits += 1;
        tracing::debug!(
            target: "csb_tree::split",
            separator,
            height = self.height,
            "split root; tree grew a level"
        );
        Ok(())
    }
}

impl Default for CsbTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CsbTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.iter() {
            Ok(iter) => f.debug_map().entries(iter).finish(),
            Err(err) => write!(f, "CsbTree(<{err}>)"),
        }
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// A position in the tree: a leaf and an offset into it, or the end.
///
/// Cursors borrow the tree, so no cursor survives an insert.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    groups: &'a GroupArena,
    leaf: Option<&'a LeafNode>,
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn at(groups: &'a GroupArena, leaf: &'a LeafNode, offset: usize) -> Self {
        Self {
            groups,
            leaf: Some(leaf),
            offset,
        }
    }

    fn end(groups: &'a GroupArena) -> Self {
        Self {
            groups,
            leaf: None,
            offset: 0,
        }
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.leaf.is_none()
    }

    pub fn entry(&self) -> Option<(Key, Value)> {
        let leaf = self.leaf?;
        (self.offset < leaf.len()).then(|| (leaf.key_at(self.offset), leaf.value_at(self.offset)))
    }

    pub fn key(&self) -> Option<Key> {
        self.entry().map(|(k, _)| k)
    }

    pub fn value(&self) -> Option<Value> {
        self.entry().map(|(_, v)| v)
    }

    /// Moves to the next entry, following the sibling link at the end of a
    /// leaf. Advancing the end cursor is a no-op.
    pub fn advance(&mut self) -> Result<()> {
        let Some(leaf) = self.leaf else {
            return Ok(());
        };
        if self.offset + 1 < leaf.len() {
            self.offset += 1;
            return Ok(());
        }
        let groups = self.groups;
        self.leaf = groups.leaf(leaf.next)?;
        self.offset = 0;
        Ok(())
    }
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.leaf, other.leaf) {
            (Some(a), Some(b)) => std::ptr::eq(a, b) && self.offset == other.offset,
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for Cursor<'_> {}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entry() {
            Some(entry) => f.debug_tuple("Cursor").field(&entry).finish(),
            None => f.write_str("Cursor(end)"),
        }
    }
}

impl<'a> IntoIterator for Cursor<'a> {
    type Item = (Key, Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        Iter { cursor: self }
    }
}

/// Ascending entries from a cursor to the end of the tree.
pub struct Iter<'a> {
    cursor: Cursor<'a>,
}

impl Iterator for Iter<'_> {
    type Item = (Key, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.cursor.entry()?;
        if let Err(err) = self.cursor.advance() {
            tracing::error!(
                target: "csb_tree::iter",
                %err,
                "sibling link did not resolve; ending iteration"
            );
            self.cursor = Cursor::end(self.cursor.groups);
        }
        Some(entry)
    }
}

impl FusedIterator for Iter<'_> {}


#[cfg(test)]
mod proptests;
