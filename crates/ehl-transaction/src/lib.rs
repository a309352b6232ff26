//! Delivery lifecycle for EHL dispensers.
//!
//! A [`Transaction`] follows one fuel delivery on one dispenser from the
//! moment it is armed until it is accounted for or annulled. Every state
//! change goes through [`Transaction::transition_to`], which enforces a fixed
//! transition table; [`TransactionManager`] keeps at most one active
//! transaction per dispenser address.
//!
//! ```text
//! NOT_STARTED -> READY -> ACTIVE -> FINISHED -> ACCOUNTED
//!                  |         |         '-> FINANCIAL_RETURN -> ACCOUNTED
//!                  |         '-> UNACCOUNTED -> ACCOUNTED
//!                  '-> ANNULATED
//!                FINANCIAL_TECH_RETURN -> ACCOUNTED
//! ```
//!
//! The state machine is independent of wire timing. Callers drive it from
//! the packets they receive.

pub mod error;
pub mod manager;
pub mod state;
pub mod transaction;

pub use error::{Result, TransactionError};
pub use manager::TransactionManager;
pub use state::TransactionState;
pub use transaction::{PaymentType, Transaction};
