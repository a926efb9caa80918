//! Structural constants and the layout invariants that tie them together.
//!
//! The three tunables are coupled: a leaf of `LEAF_CAPACITY` key/value pairs
//! plus its count and sibling link, and an internal node of `FANOUT`
//! separators plus its child group id and count, must each fill exactly one
//! cache line. A node group holds `GROUP_CAPACITY` such lines plus one line
//! for its kind tag and used count. These are checked at compile time, so a
//! build with mismatched values does not produce a usable tree.

use std::mem::{align_of, size_of};

use crate::error::{Result, TreeError};
use crate::group::NodeGroup;
use crate::node::{InternalNode, LeafNode};
use crate::{Key, Value};

// =============================================================================
// Configuration
// =============================================================================

/// Cache line size the node layout is built for (Apple M-series, POWER).
pub const CACHE_LINE_SIZE: usize = 128;

/// Maximum key/value pairs held by one leaf node.
pub const LEAF_CAPACITY: usize = 7;

/// Maximum children of one internal node.
pub const FANOUT: usize = 14;

/// Slots in one node group. All children of an internal node share a group.
pub const GROUP_CAPACITY: usize = FANOUT;

/// Entries kept by the left leaf when a full leaf absorbs one more entry.
pub(crate) const LEAF_SPLIT: usize = (LEAF_CAPACITY + 2) / 2;

/// Children kept by the left half when a full internal node (and its
/// group) absorbs one more child.
pub(crate) const GROUP_SPLIT: usize = (GROUP_CAPACITY + 2) / 2;

/// Inline capacity of the root-to-leaf path recorded by insert.
pub(crate) const MAX_INLINE_HEIGHT: usize = 12;

const _: () = assert!(LEAF_CAPACITY >= 2);
const _: () = assert!(FANOUT >= 3);
const _: () = assert!(GROUP_CAPACITY <= u8::MAX as usize);
const _: () = assert!(LEAF_CAPACITY <= u8::MAX as usize);

const _: () = assert!(size_of::<LeafNode>() == CACHE_LINE_SIZE);
const _: () = assert!(align_of::<LeafNode>() == CACHE_LINE_SIZE);
const _: () = assert!(size_of::<InternalNode>() == CACHE_LINE_SIZE);
const _: () = assert!(align_of::<InternalNode>() == CACHE_LINE_SIZE);
const _: () = assert!(size_of::<NodeGroup>() == CACHE_LINE_SIZE * (GROUP_CAPACITY + 1));

// Payload must fit in the line, leaving room for the count and sibling link.
const _: () = assert!(
    LEAF_CAPACITY * (size_of::<Key>() + size_of::<Value>()) + 2 * size_of::<u64>()
        <= CACHE_LINE_SIZE
);
const _: () = assert!(FANOUT * size_of::<Key>() + size_of::<u64>() <= CACHE_LINE_SIZE);

/// Re-checks the layout invariants at runtime.
///
/// The same conditions are compile-time assertions in this module; this
/// exists so a host can report the layout it was built with.
pub fn verify_layout() -> Result<()> {
    check("leaf node", CACHE_LINE_SIZE, size_of::<LeafNode>())?;
    check("leaf node alignment", CACHE_LINE_SIZE, align_of::<LeafNode>())?;
    check("internal node", CACHE_LINE_SIZE, size_of::<InternalNode>())?;
    check(
        "internal node alignment",
        CACHE_LINE_SIZE,
        align_of::<InternalNode>(),
    )?;
    check(
        "node group",
        CACHE_LINE_SIZE * (GROUP_CAPACITY + 1),
        size_of::<NodeGroup>(),
    )
}

fn check(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(TreeError::LayoutInvariantViolation {
            what,
            expected,
            actual,
        })
    }
}

/// Runtime options for a [`CsbTree`](crate::CsbTree).
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Node groups to reserve in the arena up front.
    pub initial_groups: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { initial_groups: 16 }
    }
}
