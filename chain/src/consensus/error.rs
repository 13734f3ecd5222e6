use std::fmt;

use crate::chain::ChainError;
use crate::transport::TransportError;
use crate::types::NodeId;

/// Errors a node raises while handling events.
///
/// All of these are recovered locally: inbound failures drop the input
/// with a warning, publish failures are logged and not retried. Nothing
/// here propagates to peers.
#[derive(Debug)]
pub enum NodeError {
    /// Inbound payload names an author with no known public key.
    UnknownAuthor(NodeId),
    /// Signature did not verify for the named author.
    BadSignature(NodeId),
    /// Structural chain failure on append or replace.
    Chain(ChainError),
    /// Broadcast submission failed.
    Transport(TransportError),
    /// The node's event loop is gone (handle used after shutdown).
    Mailbox,
}

impl From<ChainError> for NodeError {
    fn from(e: ChainError) -> Self {
        NodeError::Chain(e)
    }
}

impl From<TransportError> for NodeError {
    fn from(e: TransportError) -> Self {
        NodeError::Transport(e)
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::UnknownAuthor(id) => write!(f, "unknown author: {id}"),
            NodeError::BadSignature(id) => write!(f, "bad signature from {id}"),
            NodeError::Chain(e) => write!(f, "{e}"),
            NodeError::Transport(e) => write!(f, "{e}"),
            NodeError::Mailbox => write!(f, "node event loop is not running"),
        }
    }
}

impl std::error::Error for NodeError {}
