use std::time::SystemTime;

use ehl_frame::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TransactionError};
use crate::state::TransactionState;

/// How the customer pays for the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    #[default]
    Cash,
    BankCard,
    FuelCard,
}

/// One fuel delivery on one dispenser.
///
/// Volumes are in millilitres; money is in minor currency units. The
/// accounting fields are written by the caller as readings come in. The
/// state only changes through [`Transaction::transition_to`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: u64,
    dispenser_address: Address,
    state: TransactionState,
    pub payment_type: PaymentType,
    /// Prepaid amount the dispenser is programmed to stop at.
    pub preset_amount: u64,
    pub delivered_volume: u64,
    pub delivered_amount: u64,
    /// Price per litre.
    pub unit_price: u64,
    pub cashback_amount: u64,
    start_time: SystemTime,
    end_time: Option<SystemTime>,
}

impl Transaction {
    /// A fresh transaction in `NOT_STARTED`, started now.
    pub fn new(id: u64, dispenser_address: Address) -> Self {
        Self {
            id,
            dispenser_address,
            state: TransactionState::NotStarted,
            payment_type: PaymentType::default(),
            preset_amount: 0,
            delivered_volume: 0,
            delivered_amount: 0,
            unit_price: 0,
            cashback_amount: 0,
            start_time: SystemTime::now(),
            end_time: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dispenser_address(&self) -> Address {
        self.dispenser_address
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// Set once, on first entry into `FINISHED`.
    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `target` if the transition table allows it.
    ///
    /// On rejection the state is left as it was.
    pub fn transition_to(&mut self, target: TransactionState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            debug!(
                id = self.id,
                address = %self.dispenser_address,
                from = %self.state,
                to = %target,
                "transition rejected"
            );
            return Err(TransactionError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }

        debug!(
            id = self.id,
            address = %self.dispenser_address,
            from = %self.state,
            to = %target,
            "transition"
        );
        self.state = target;
        if target == TransactionState::Finished && self.end_time.is_none() {
            self.end_time = Some(SystemTime::now());
        }
        Ok(())
    }

    /// Put a transaction that was open when power dropped into
    /// `FINANCIAL_TECH_RETURN`, from which it can only be accounted.
    ///
    /// This is the one way into that state and sits outside the transition
    /// table. Transactions that were never armed or already closed are
    /// rejected unchanged. Calling it again is a no-op.
    pub fn recover_after_power_loss(&mut self) -> Result<()> {
        let target = TransactionState::FinancialTechReturn;
        if self.state == target {
            return Ok(());
        }
        if self.state == TransactionState::NotStarted || self.is_terminal() {
            return Err(TransactionError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }

        warn!(
            id = self.id,
            address = %self.dispenser_address,
            from = %self.state,
            "recovering transaction interrupted by power loss"
        );
        self.state = target;
        Ok(())
    }
}
