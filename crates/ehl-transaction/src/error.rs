use crate::state::TransactionState;

/// Errors from the transaction state machine and manager.
///
/// A rejected transition is reported, never applied: the transaction keeps
/// the state it had before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    /// `to` is not reachable from `from` in one step.
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        from: TransactionState,
        to: TransactionState,
    },

    /// Dispenser addresses run from 1 to 255.
    #[error("invalid dispenser address {0} (expected 1..=255)")]
    InvalidAddress(u8),

    /// No active transaction is held for this address.
    #[error("no active transaction for dispenser {0}")]
    NotFound(u8),
}

pub type Result<T> = std::result::Result<T, TransactionError>;
