//! Turn-rotation consensus.
//!
//! This module holds the protocol core:
//!
//! - timing parameters ([`config::TurnConfig`]),
//! - rotation phases ([`turn::TurnPhase`]),
//! - the fixed group membership ([`membership::Membership`]),
//! - node-level errors ([`error::NodeError`]),
//! - and the per-node state machine ([`manager::TurnManager`]).

pub mod config;
pub mod error;
pub mod manager;
pub mod membership;
pub mod turn;

pub use config::TurnConfig;
pub use error::NodeError;
pub use manager::{NodeStatus, Rotation, TurnManager};
pub use membership::Membership;
pub use turn::TurnPhase;
