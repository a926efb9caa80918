use thiserror::Error;

use crate::group::NodeKind;
use crate::Key;

pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors surfaced by [`CsbTree`](crate::CsbTree) and the node group accessors.
///
/// Only [`TreeError::DuplicateKey`] is expected in normal operation. The
/// remaining variants mean the tree structure itself is broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("key {0} is already present")]
    DuplicateKey(Key),
    #[error("slot {offset} is out of range for a node group of {capacity} slots")]
    OutOfRange { offset: usize, capacity: usize },
    #[error("expected a {expected} node group, found a {found} node group")]
    KindMismatch { expected: NodeKind, found: NodeKind },
    #[error("node group {0} is not allocated")]
    UnknownGroup(u32),
    #[error("layout invariant violated: {what} is {actual} bytes, expected {expected}")]
    LayoutInvariantViolation {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}
