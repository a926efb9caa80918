//! Node groups: the contiguous, cache-aligned blocks that hold all children
//! of one internal node, and the arena that owns them.

use std::fmt;

use crate::error::{Result, TreeError};
use crate::layout::{GROUP_CAPACITY, GROUP_SPLIT};
use crate::node::{InternalNode, LeafLink, LeafNode};

/// Which node type a group holds. Fixed for the lifetime of the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Internal,
    Leaf,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Internal => f.write_str("internal"),
            NodeKind::Leaf => f.write_str("leaf"),
        }
    }
}

/// Borrowed view of one occupied or empty slot of a group.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Internal(&'a InternalNode),
    Leaf(&'a LeafNode),
}

/// An owned node on its way into a group.
#[derive(Clone, Copy)]
pub(crate) enum Node {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl Node {
    fn kind(&self) -> NodeKind {
        match self {
            Node::Internal(_) => NodeKind::Internal,
            Node::Leaf(_) => NodeKind::Leaf,
        }
    }
}

// =============================================================================
// Node group
// =============================================================================

/// Up to [`GROUP_CAPACITY`] sibling nodes of one kind, stored back to back.
///
/// Every node is one cache line and line aligned, so slot `i` of a group is
/// found by offset arithmetic from the group base instead of a pointer load.
/// The kind tag and used count share one extra line.
#[derive(Clone)]
pub enum NodeGroup {
    Internal {
        nodes: [InternalNode; GROUP_CAPACITY],
        used: u8,
    },
    Leaf {
        nodes: [LeafNode; GROUP_CAPACITY],
        used: u8,
    },
}

impl NodeGroup {
    /// An empty group of `kind` with every slot zeroed.
    pub fn allocate(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Internal => NodeGroup::Internal {
                nodes: [InternalNode::EMPTY; GROUP_CAPACITY],
                used: 0,
            },
            NodeKind::Leaf => NodeGroup::Leaf {
                nodes: [LeafNode::EMPTY; GROUP_CAPACITY],
                used: 0,
            },
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeGroup::Internal { .. } => NodeKind::Internal,
            NodeGroup::Leaf { .. } => NodeKind::Leaf,
        }
    }

    /// Number of occupied slots, always a prefix of the group.
    pub fn used(&self) -> usize {
        match self {
            NodeGroup::Internal { used, .. } | NodeGroup::Leaf { used, .. } => *used as usize,
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.used() == GROUP_CAPACITY
    }

    /// The node in slot `offset`, occupied or not.
    pub fn node_at(&self, offset: usize) -> Result<NodeRef<'_>> {
        check_offset(offset)?;
        Ok(match self {
            NodeGroup::Internal { nodes, .. } => NodeRef::Internal(&nodes[offset]),
            NodeGroup::Leaf { nodes, .. } => NodeRef::Leaf(&nodes[offset]),
        })
    }

    pub(crate) fn leaf(&self, offset: usize) -> Result<&LeafNode> {
        check_offset(offset)?;
        match self {
            NodeGroup::Leaf { nodes, .. } => Ok(&nodes[offset]),
            NodeGroup::Internal { .. } => Err(mismatch(NodeKind::Leaf, NodeKind::Internal)),
        }
    }

    pub(crate) fn leaf_mut(&mut self, offset: usize) -> Result<&mut LeafNode> {
        check_offset(offset)?;
        match self {
            NodeGroup::Leaf { nodes, .. } => Ok(&mut nodes[offset]),
            NodeGroup::Internal { .. } => Err(mismatch(NodeKind::Leaf, NodeKind::Internal)),
        }
    }

    pub(crate) fn internal(&self, offset: usize) -> Result<&InternalNode> {
        check_offset(offset)?;
        match self {
            NodeGroup::Internal { nodes, .. } => Ok(&nodes[offset]),
            NodeGroup::Leaf { .. } => Err(mismatch(NodeKind::Internal, NodeKind::Leaf)),
        }
    }

    pub(crate) fn internal_mut(&mut self, offset: usize) -> Result<&mut InternalNode> {
        check_offset(offset)?;
        match self {
            NodeGroup::Internal { nodes, .. } => Ok(&mut nodes[offset]),
            NodeGroup::Leaf { .. } => Err(mismatch(NodeKind::Internal, NodeKind::Leaf)),
        }
    }

    /// Places `node` at `offset`, shifting later slots right. Group must have room.
    pub(crate) fn insert(&mut self, offset: usize, node: Node) -> Result<()> {
        if offset > self.used() || self.is_full() {
            return Err(TreeError::OutOfRange {
                offset,
                capacity: GROUP_CAPACITY,
            });
        }
        match (self, node) {
            (NodeGroup::Internal { nodes, used }, Node::Internal(node)) => {
                insert_slot(nodes, used, offset, node)
            }
            (NodeGroup::Leaf { nodes, used }, Node::Leaf(node)) => {
                insert_slot(nodes, used, offset, node)
            }
            (group, node) => return Err(mismatch(node.kind(), group.kind())),
        }
        Ok(())
    }

    /// Appends `node` after the last occupied slot.
    pub(crate) fn push(&mut self, node: Node) -> Result<()> {
        self.insert(self.used(), node)
    }

    /// Splits a full group while placing `node` at `offset`.
    ///
    /// `self` keeps the first [`GROUP_SPLIT`] nodes in place; the returned
    /// group holds the rest starting at slot 0.
    pub(crate) fn split_insert(&mut self, offset: usize, node: Node) -> Result<NodeGroup> {
        if offset > GROUP_CAPACITY || !self.is_full() {
            return Err(TreeError::OutOfRange {
                offset,
                capacity: GROUP_CAPACITY,
            });
        }
        match (self, node) {
            (NodeGroup::Internal { nodes, used }, Node::Internal(node)) => {
                let (right, right_used) = split_slots(nodes, used, offset, node, InternalNode::EMPTY);
                Ok(NodeGroup::Internal {
                    nodes: right,
                    used: right_used,
                })
            }
            (NodeGroup::Leaf { nodes, used }, Node::Leaf(node)) => {
                let (right, right_used) = split_slots(nodes, used, offset, node, LeafNode::EMPTY);
                Ok(NodeGroup::Leaf {
                    nodes: right,
                    used: right_used,
                })
            }
            (group, node) => Err(mismatch(node.kind(), group.kind())),
        }
    }

    /// Sibling link of the last occupied leaf, i.e. where this group's leaf
    /// run continues.
    pub(crate) fn tail_link(&self) -> Result<LeafLink> {
        match self {
            NodeGroup::Leaf { nodes, used } if *used > 0 => Ok(nodes[*used as usize - 1].next),
            NodeGroup::Leaf { .. } => Ok(LeafLink::NULL),
            NodeGroup::Internal { .. } => Err(mismatch(NodeKind::Leaf, NodeKind::Internal)),
        }
    }

    /// Rewires the sibling chain through this group's leaves in slot order,
    /// ending at `tail`. `id` is this group's own arena id.
    pub(crate) fn relink_leaves(&mut self, id: GroupId, tail: LeafLink) -> Result<()> {
        let NodeGroup::Leaf { nodes, used } = self else {
            return Err(mismatch(NodeKind::Leaf, NodeKind::Internal));
        };
        let used = *used as usize;
        for (slot, leaf) in nodes[..used].iter_mut().enumerate() {
            leaf.next = if slot + 1 < used {
                LeafLink::new(id, slot + 1)
            } else {
                tail
            };
        }
        Ok(())
    }
}

fn mismatch(expected: NodeKind, found: NodeKind) -> TreeError {
    TreeError::KindMismatch { expected, found }
}

#[inline]
fn check_offset(offset: usize) -> Result<()> {
    if offset < GROUP_CAPACITY {
        Ok(())
    } else {
        Err(TreeError::OutOfRange {
            offset,
            capacity: GROUP_CAPACITY,
        })
    }
}

fn insert_slot<N: Copy>(nodes: &mut [N; GROUP_CAPACITY], used: &mut u8, offset: usize, node: N) {
    let len = *used as usize;
    nodes.copy_within(offset..len, offset + 1);
    nodes[offset] = node;
    *used += 1;
}

fn split_slots<N: Copy>(
    nodes: &mut [N; GROUP_CAPACITY],
    used: &mut u8,
    offset: usize,
    node: N,
    empty: N,
) -> ([N; GROUP_CAPACITY], u8) {
    let mut merged = [empty; GROUP_CAPACITY + 1];
    merged[..offset].copy_from_slice(&nodes[..offset]);
    merged[offset] = node;
    merged[offset + 1..].copy_from_slice(&nodes[offset..]);

    let right_used = GROUP_CAPACITY + 1 - GROUP_SPLIT;
    let mut right = [empty; GROUP_CAPACITY];
    right[..right_used].copy_from_slice(&merged[GROUP_SPLIT..]);

    nodes[..GROUP_SPLIT].copy_from_slice(&merged[..GROUP_SPLIT]);
    nodes[GROUP_SPLIT..].fill(empty);
    *used = GROUP_SPLIT as u8;
    (right, right_used as u8)
}

// =============================================================================
// Group arena
// =============================================================================

/// Index of a group in its tree's [`GroupArena`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct GroupId(pub(crate) u32);

impl GroupId {
    pub(crate) const NULL: GroupId = GroupId(u32::MAX);
}

/// Owns every node group of a tree.
///
/// Each group id is held by exactly one internal node, so the arena only
/// grows: a split keeps the left half in the existing group and moves the
/// right half into a fresh one.
#[derive(Clone, Default)]
pub(crate) struct GroupArena {
    groups: Vec<NodeGroup>,
}

impl GroupArena {
    pub(crate) fn with_capacity(groups: usize) -> Self {
        Self {
            groups: Vec::with_capacity(groups),
        }
    }

    pub(crate) fn alloc(&mut self, group: NodeGroup) -> GroupId {
        let id = GroupId(self.groups.len() as u32);
        debug_assert_ne!(id, GroupId::NULL);
        self.groups.push(group);
        id
    }

    #[inline]
    pub(crate) fn get(&self, id: GroupId) -> Result<&NodeGroup> {
        self.groups
            .get(id.0 as usize)
            .ok_or(TreeError::UnknownGroup(id.0))
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: GroupId) -> Result<&mut NodeGroup> {
        self.groups
            .get_mut(id.0 as usize)
            .ok_or(TreeError::UnknownGroup(id.0))
    }

    /// Resolves a sibling link. `None` for the NULL link.
    #[inline]
    pub(crate) fn leaf(&self, link: LeafLink) -> Result<Option<&LeafNode>> {
        if link.is_null() {
            return Ok(None);
        }
        self.get(link.group())?.leaf(link.slot()).map(Some)
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.groups.capacity()
    }
}
