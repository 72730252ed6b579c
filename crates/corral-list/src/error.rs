//! List error types.

use std::error::Error;
use std::fmt;

use corral_arena::PoolError;

use crate::node::NodeRef;

/// Errors from [`ManagedList`](crate::ManagedList) operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListError {
    /// The operation needs at least one node.
    Empty,
    /// No node carries the requested payload.
    NotFound {
        /// The payload searched for.
        data: u16,
    },
    /// The node reference is not a live member of this list.
    UnknownNode {
        /// The rejected reference.
        node: NodeRef,
    },
    /// The backing pool refused the request (usually exhaustion).
    Pool(PoolError),
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "list is empty"),
            Self::NotFound { data } => write!(f, "no node with payload {data}"),
            Self::UnknownNode { node } => write!(f, "{node} is not in this list"),
            Self::Pool(e) => write!(f, "node storage: {e}"),
        }
    }
}

impl Error for ListError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pool(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PoolError> for ListError {
    fn from(e: PoolError) -> Self {
        Self::Pool(e)
    }
}
