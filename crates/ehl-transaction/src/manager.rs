use std::collections::HashMap;

use ehl_frame::Address;
use tracing::{debug, info, warn};

use crate::error::{Result, TransactionError};
use crate::state::TransactionState;
use crate::transaction::Transaction;

/// Holds the active transaction for each dispenser address.
///
/// A transaction stays active from [`start_transaction`] (or [`restore`])
/// until [`finalize_transaction`] hands it back to the caller. Persisting
/// finalized records is the caller's job.
///
/// [`start_transaction`]: TransactionManager::start_transaction
/// [`restore`]: TransactionManager::restore
/// [`finalize_transaction`]: TransactionManager::finalize_transaction
#[derive(Debug)]
pub struct TransactionManager {
    active: HashMap<Address, Transaction>,
    next_id: u64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    /// Start numbering new transactions at `first_id`, for example one past
    /// the last id a persistence layer has stored.
    pub fn with_first_id(first_id: u64) -> Self {
        Self {
            active: HashMap::new(),
            next_id: first_id,
        }
    }

    /// Create a transaction for `address` and arm it (`READY`).
    ///
    /// Replaces whatever was active on that address.
    pub fn start_transaction(&mut self, address: u8) -> Result<&mut Transaction> {
        let address =
            Address::new(address).map_err(|_| TransactionError::InvalidAddress(address))?;

        let id = self.next_id;
        self.next_id += 1;

        let mut transaction = Transaction::new(id, address);
        transaction.transition_to(TransactionState::Ready)?;

        if let Some(previous) = self.active.get(&address) {
            warn!(
                %address,
                previous_id = previous.id(),
                previous_state = %previous.state(),
                id,
                "replacing unfinalized transaction"
            );
        }
        info!(%address, id, "transaction started");

        self.active.insert(address, transaction);
        self.active
            .get_mut(&address)
            .ok_or(TransactionError::NotFound(address.get()))
    }

    /// Remove and return the active transaction for `address`.
    pub fn finalize_transaction(&mut self, address: u8) -> Option<Transaction> {
        let address = Address::new(address).ok()?;
        let transaction = self.active.remove(&address)?;
        info!(
            %address,
            id = transaction.id(),
            state = %transaction.state(),
            "transaction finalized"
        );
        Some(transaction)
    }

    pub fn get_transaction(&self, address: u8) -> Option<&Transaction> {
        let address = Address::new(address).ok()?;
        self.active.get(&address)
    }

    /// Mutable access for recording readings as they arrive.
    pub fn get_transaction_mut(&mut self, address: u8) -> Option<&mut Transaction> {
        let address = Address::new(address).ok()?;
        self.active.get_mut(&address)
    }

    /// Transition the active transaction on `address`.
    pub fn transition(&mut self, address: u8, target: TransactionState) -> Result<()> {
        self.get_transaction_mut(address)
            .ok_or(TransactionError::NotFound(address))?
            .transition_to(target)
    }

    /// Reinstate a transaction reloaded from outside. Its state is kept as is;
    /// see [`restore_after_power_loss`](Self::restore_after_power_loss) for
    /// records interrupted mid-delivery.
    ///
    /// Returns the transaction it displaced, if any.
    pub fn restore(&mut self, transaction: Transaction) -> Option<Transaction> {
        let address = transaction.dispenser_address();
        if transaction.id() >= self.next_id {
            self.next_id = transaction.id() + 1;
        }
        debug!(
            %address,
            id = transaction.id(),
            state = %transaction.state(),
            "transaction restored"
        );
        let displaced = self.active.insert(address, transaction);
        if let Some(previous) = &displaced {
            warn!(%address, previous_id = previous.id(), "restore replaced active transaction");
        }
        displaced
    }

    /// Reinstate a transaction that was open when power dropped, moving it to
    /// `FINANCIAL_TECH_RETURN` first.
    ///
    /// Returns the transaction it displaced, if any. A record that cannot be
    /// recovered is rejected and nothing is reinstated.
    pub fn restore_after_power_loss(
        &mut self,
        mut transaction: Transaction,
    ) -> Result<Option<Transaction>> {
        transaction.recover_after_power_loss()?;
        Ok(self.restore(transaction))
    }

    /// Addresses with an active transaction, ascending.
    pub fn active_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.active.keys().copied().collect();
        addresses.sort();
        addresses
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionState::*;

    #[test]
    fn start_arms_transaction() {
        let mut manager = TransactionManager::new();

        let tx = manager.start_transaction(1).unwrap();
        assert_eq!(tx.state(), Ready);
        assert_eq!(tx.dispenser_address().get(), 1);
        assert_eq!(tx.id(), 1);

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get_transaction(1).map(Transaction::state), Some(Ready));
    }

    #[test]
    fn delivery_scenario() {
        let mut manager = TransactionManager::new();
        assert_eq!(manager.start_transaction(1).unwrap().state(), Ready);

        manager.transition(1, Active).unwrap();
        manager.transition(1, Finished).unwrap();
        assert!(manager.get_transaction(1).unwrap().end_time().is_some());

        assert_eq!(
            manager.transition(1, Ready),
            Err(TransactionError::InvalidTransition {
                from: Finished,
                to: Ready,
            })
        );
        assert_eq!(manager.get_transaction(1).unwrap().state(), Finished);
    }

    #[test]
    fn address_zero_is_rejected() {
        let mut manager = TransactionManager::new();
        assert_eq!(
            manager.start_transaction(0).err(),
            Some(TransactionError::InvalidAddress(0))
        );
        assert!(manager.is_empty());
        assert!(manager.get_transaction(0).is_none());
        assert!(manager.finalize_transaction(0).is_none());
    }

    #[test]
    fn full_address_range_is_accepted() {
        let mut manager = TransactionManager::new();
        manager.start_transaction(255).unwrap();
        assert!(manager.get_transaction(255).is_some());
    }

    #[test]
    fn finalize_removes_and_returns_record() {
        let mut manager = TransactionManager::new();
        {
            let tx = manager.start_transaction(4).unwrap();
            tx.delivered_volume = 12_500;
        }
        manager.transition(4, Active).unwrap();

        let tx = manager.finalize_transaction(4).unwrap();
        assert_eq!(tx.state(), Active);
        assert_eq!(tx.delivered_volume, 12_500);
        assert!(manager.get_transaction(4).is_none());
        assert!(manager.finalize_transaction(4).is_none());
    }

    #[test]
    fn start_overwrites_unfinalized_record() {
        let mut manager = TransactionManager::new();
        let first = manager.start_transaction(2).unwrap().id();
        manager.transition(2, Active).unwrap();

        let second = manager.start_transaction(2).unwrap().id();
        assert_ne!(first, second);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get_transaction(2).unwrap().state(), Ready);
    }

    #[test]
    fn addresses_are_independent() {
        let mut manager = TransactionManager::new();
        manager.start_transaction(9).unwrap();
        manager.start_transaction(3).unwrap();
        manager.transition(3, Annulated).unwrap();

        assert_eq!(manager.get_transaction(9).unwrap().state(), Ready);
        assert_eq!(
            manager
                .active_addresses()
                .into_iter()
                .map(Address::get)
                .collect::<Vec<_>>(),
            vec![3, 9]
        );
    }

    #[test]
    fn transition_without_active_record() {
        let mut manager = TransactionManager::new();
        assert_eq!(
            manager.transition(5, Ready),
            Err(TransactionError::NotFound(5))
        );
    }

    #[test]
    fn restore_keeps_state_and_advances_ids() {
        let mut reloaded = Transaction::new(41, Address::new(6).unwrap());
        reloaded.transition_to(Ready).unwrap();

        let mut manager = TransactionManager::new();
        assert!(manager.restore(reloaded).is_none());
        assert_eq!(manager.get_transaction(6).unwrap().state(), Ready);

        assert_eq!(manager.start_transaction(7).unwrap().id(), 42);
    }

    #[test]
    fn power_loss_restore_only_allows_accounting() {
        let mut interrupted = Transaction::new(41, Address::new(6).unwrap());
        interrupted.transition_to(Ready).unwrap();
        interrupted.transition_to(Active).unwrap();
        interrupted.delivered_volume = 8_000;

        let mut manager = TransactionManager::new();
        assert!(manager
            .restore_after_power_loss(interrupted)
            .unwrap()
            .is_none());
        let tx = manager.get_transaction(6).unwrap();
        assert_eq!(tx.state(), FinancialTechReturn);
        assert_eq!(tx.delivered_volume, 8_000);

        assert!(manager.transition(6, Finished).is_err());
        manager.transition(6, Accounted).unwrap();
        assert!(manager.get_transaction(6).unwrap().is_terminal());

        assert_eq!(manager.start_transaction(7).unwrap().id(), 42);
    }

    #[test]
    fn power_loss_restore_rejects_closed_record() {
        let mut closed = Transaction::new(5, Address::new(2).unwrap());
        closed.transition_to(Ready).unwrap();
        closed.transition_to(Annulated).unwrap();

        let mut manager = TransactionManager::new();
        assert_eq!(
            manager.restore_after_power_loss(closed),
            Err(TransactionError::InvalidTransition {
                from: Annulated,
                to: FinancialTechReturn,
            })
        );
        assert!(manager.is_empty());
    }
}
