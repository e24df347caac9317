//! Persistence provider interface.
//!
//! The ledger mirrors every record mutation to an [`AccountStore`] so a
//! durable copy can be maintained elsewhere. Delivery is fire-and-forget:
//! the store owns its own error handling and delivery guarantees, and the
//! ledger never blocks on or rolls back for a store failure.

use crate::rates::RateProvider;
use crate::types::account::{AccountBalance, CashEntry, Commission, Position};

/// Kind of record mutation being reported to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterKind {
    Add,
    Update,
    Delete,
}

/// Durable-store interface for one account's ledger records.
///
/// Extends [`RateProvider`] because the same backing store typically holds
/// the rate tables and trading calendar alongside the account records.
pub trait AccountStore: RateProvider {
    /// Latest settled balance record for a user, if any.
    fn balance_of(&self, user: &str) -> Option<AccountBalance>;

    /// All stored positions for a user.
    fn positions_of(&self, user: &str) -> Vec<Position>;

    /// All stored commissions for a user.
    fn commissions_of(&self, user: &str) -> Vec<Commission>;

    /// All stored cash entries for a user.
    fn cash_of(&self, user: &str) -> Vec<CashEntry>;

    /// A settled balance record was added (one per settlement).
    fn alter_balance(&self, user: &str, balance: &AccountBalance, alter: AlterKind);

    /// A position record was added, updated, or deleted.
    fn alter_position(&self, user: &str, position: &Position, alter: AlterKind);

    /// A commission record was added, updated, or deleted.
    fn alter_commission(&self, user: &str, commission: &Commission, alter: AlterKind);

    /// A cash entry was appended. Cash entries are never updated or deleted.
    fn alter_cash(&self, user: &str, cash: &CashEntry, alter: AlterKind);
}
