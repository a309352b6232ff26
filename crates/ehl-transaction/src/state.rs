use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    /// Created, not yet armed.
    #[default]
    NotStarted,
    /// Armed on the dispenser, waiting for the nozzle.
    Ready,
    /// Fuel is flowing.
    Active,
    /// Delivery ended normally.
    Finished,
    /// Delivery ended without a final reading.
    Unaccounted,
    /// Part of the prepayment goes back to the customer.
    FinancialReturn,
    /// A return forced by a technical fault, such as power loss mid-delivery.
    FinancialTechReturn,
    /// Cancelled before any fuel was delivered.
    Annulated,
    /// Settled.
    Accounted,
}

impl TransactionState {
    pub const ALL: [TransactionState; 9] = [
        TransactionState::NotStarted,
        TransactionState::Ready,
        TransactionState::Active,
        TransactionState::Finished,
        TransactionState::Unaccounted,
        TransactionState::FinancialReturn,
        TransactionState::FinancialTechReturn,
        TransactionState::Annulated,
        TransactionState::Accounted,
    ];

    /// States reachable from this one in a single transition.
    pub const fn allowed_targets(self) -> &'static [TransactionState] {
        use TransactionState::*;
        match self {
            NotStarted => &[Ready],
            Ready => &[Active, Annulated],
            Active => &[Finished, Unaccounted],
            Finished => &[Accounted, FinancialReturn],
            Unaccounted => &[Accounted],
            FinancialReturn => &[Accounted],
            FinancialTechReturn => &[Accounted],
            Annulated => &[],
            Accounted => &[],
        }
    }

    pub fn can_transition_to(self, target: TransactionState) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// No transition leaves a terminal state.
    pub const fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub const fn name(self) -> &'static str {
        match self {
            TransactionState::NotStarted => "NOT_STARTED",
            TransactionState::Ready => "READY",
            TransactionState::Active => "ACTIVE",
            TransactionState::Finished => "FINISHED",
            TransactionState::Unaccounted => "UNACCOUNTED",
            TransactionState::FinancialReturn => "FINANCIAL_RETURN",
            TransactionState::FinancialTechReturn => "FINANCIAL_TECH_RETURN",
            TransactionState::Annulated => "ANNULATED",
            TransactionState::Accounted => "ACCOUNTED",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
