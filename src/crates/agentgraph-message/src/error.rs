//! Error types for message state transitions

use crate::message::MessageState;
use thiserror::Error;

/// Errors raised by the message state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The requested transition is not allowed by the state machine
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// State the message was in
        from: MessageState,
        /// State the caller asked for
        to: MessageState,
    },

    /// WAITING requires the node the message paused on
    #[error("A WAITING message requires a node id")]
    WaitingWithoutNode,
}
