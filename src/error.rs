//! Error types for the name tree.

use thiserror::Error;

use crate::name::NameError;
use crate::node::NodeId;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by tree and chain operations.
///
/// A partial match and a change of origin during traversal are ordinary
/// outcomes, not errors: see [`Found`](crate::Found) and
/// [`ChainStep`](crate::ChainStep).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Insertion found a node for the name that already carries data.
    #[error("name already exists")]
    AlreadyExists(NodeId),

    /// Neither the name nor a usable superdomain is present.
    #[error("name not found")]
    NotFound,

    /// The node quota or the allocator is exhausted. The tree is unchanged.
    #[error("out of memory")]
    NoMemory,

    /// The name has more labels than the tree is configured to hold, or a
    /// rebuilt name does not fit the name limits.
    #[error("name exceeds the supported number of labels")]
    NoSpace,

    /// Traversal ran past the first or last node.
    #[error("no more nodes")]
    NoMore,

    #[error("name is not absolute")]
    NotAbsolute,

    /// The chain was positioned before the tree was last modified.
    #[error("chain was invalidated by a tree mutation")]
    StaleChain,

    #[error(transparent)]
    Name(#[from] NameError),
}
