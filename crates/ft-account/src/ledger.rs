//! The account ledger — balance, positions, commissions, and cash history
//! for one trading account.
//!
//! All order settlement goes through a two-phase protocol: a *reserve* puts a
//! provisional hold on margin/commission capacity (and, for closes, on a
//! specific position), then a fill either *confirms* the hold into a
//! committed ledger change or an *undo* rolls it back. End of day,
//! [`Ledger::settle`] discards unfilled opens, reverts unfilled closes, and
//! produces the next day's ledger.
//!
//! # Thread safety
//!
//! The whole mutable state (positions, commissions, cash) sits behind one
//! `RwLock`; every reserve/confirm/undo/settle takes a single write guard, so
//! each operation is one transactional step and there is exactly one writer
//! at a time. Racing confirm/undo on the *same* reservation id is a caller
//! error — the loser gets a not-found or invalid-state error.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use ft_core::error::{AccountError, Result};
use ft_core::store::{AccountStore, AlterKind};
use ft_core::types::{
    AccountBalance, CashEntry, CashSource, Commission, CommissionState, Direction, OffsetFlag,
    Position, PositionDirection, PositionState,
};

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

/// Whether a reservation opens a new position or closes an existing one.
///
/// The fill consumer dispatches the confirm step on this tag; there is no
/// separate listener type per offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationKind {
    Open,
    Close,
}

/// A successful single-lot reserve: the provisional position/commission pair
/// to confirm or undo when the fill outcome is known.
///
/// Transient — lives only for the duration of one order's settlement and is
/// handed to exactly one fill consumer at submission time.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub kind: ReservationKind,
    pub position_id: String,
    pub commission_id: String,
}

/// Dash-free v4 UUID for record ids.
fn next_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Mutable ledger state, guarded as one unit.
///
/// Positions use a `BTreeMap` so iteration order is deterministic; the close
/// candidate is still chosen by an explicit oldest-first rule, never by
/// container order.
#[derive(Debug, Clone, Default)]
struct LedgerState {
    positions: BTreeMap<String, Position>,
    commissions: AHashMap<String, Commission>,
    cash: Vec<CashEntry>,
}

/// Derived totals computed under one read guard, so the numbers are mutually
/// consistent.
#[derive(Debug, Clone, Copy)]
pub struct LedgerTotals {
    pub margin: f64,
    pub frozen_margin: f64,
    pub commission: f64,
    pub frozen_commission: f64,
    pub deposit: f64,
    pub withdraw: f64,
    pub close_profit: f64,
    pub position_profit: f64,
    pub dynamic_balance: f64,
}

/// One account's ledger.
pub struct Ledger {
    user: String,
    pre_balance: AccountBalance,
    state: RwLock<LedgerState>,
    store: Arc<dyn AccountStore>,
}

impl Ledger {
    /// Build a ledger from already-loaded records.
    pub fn new(
        pre_balance: AccountBalance,
        positions: Vec<Position>,
        commissions: Vec<Commission>,
        cash: Vec<CashEntry>,
        store: Arc<dyn AccountStore>,
    ) -> Self {
        let state = LedgerState {
            positions: positions.into_iter().map(|p| (p.id.clone(), p)).collect(),
            commissions: commissions.into_iter().map(|c| (c.id.clone(), c)).collect(),
            cash,
        };
        Self {
            user: pre_balance.user.clone(),
            pre_balance,
            state: RwLock::new(state),
            store,
        }
    }

    /// Load a user's records from the store. A user with no settled balance
    /// record starts from zero.
    pub fn load(user: &str, store: Arc<dyn AccountStore>) -> Self {
        let pre_balance = store.balance_of(user).unwrap_or_else(|| AccountBalance {
            id: format!("B-{}", next_id()),
            user: user.to_string(),
            balance: 0.0,
            trading_day: store.trading_day(),
            time: store.now(),
        });
        let positions = store.positions_of(user);
        let commissions = store.commissions_of(user);
        let cash = store.cash_of(user);
        Self::new(pre_balance, positions, commissions, cash, store)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// The settled balance record this ledger started the day with.
    pub fn pre_balance(&self) -> &AccountBalance {
        &self.pre_balance
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Open path
    // -----------------------------------------------------------------------

    /// Reserve one lot to open: hold margin and commission capacity, creating
    /// a `FrozenOpen` position and a `Frozen` commission.
    ///
    /// Admission requires `available >= margin + commission`, where
    /// `available = dynamic balance - margin of NORMAL and FROZEN_CLOSE
    /// positions`. Frozen-open margin is excluded because the dynamic balance
    /// does not yet reflect the new position either.
    pub fn reserve_open(
        &self,
        symbol: &str,
        exchange: &str,
        direction: Direction,
        price: f64,
    ) -> Result<Reservation> {
        let multiplier = self.store.multiplier(symbol)?;
        let margin = self.store.margin(symbol, price, direction, OffsetFlag::Open)?;
        let commission = self
            .store
            .commission(symbol, price, direction, OffsetFlag::Open)?;
        check_margin(margin)?;
        check_commission(commission)?;

        let mut state = self.state.write();
        let available = self.available_in(&state)?;
        let required = margin + commission;
        if available < required {
            return Err(AccountError::InsufficientAvailable {
                available,
                required,
            });
        }
        let position_id = self.add_position(
            &mut state, symbol, exchange, direction, price, multiplier, margin,
        );
        let commission_id =
            self.add_commission(&mut state, symbol, direction, OffsetFlag::Open, commission);
        debug!(symbol, %direction, price, margin, commission, "reserved open lot");
        Ok(Reservation {
            kind: ReservationKind::Open,
            position_id,
            commission_id,
        })
    }

    /// Confirm an opening fill: reprice margin and commission at the fill
    /// price and move the pair to their normal states.
    pub fn confirm_open(
        &self,
        position_id: &str,
        commission_id: &str,
        fill_price: f64,
    ) -> Result<()> {
        let mut state = self.state.write();
        // Validate both records before mutating either.
        let position = state
            .positions
            .get(position_id)
            .ok_or_else(|| AccountError::PositionNotFound(position_id.to_string()))?;
        if position.state != PositionState::FrozenOpen {
            return Err(AccountError::InvalidPositionState {
                id: position_id.to_string(),
                state: position.state.to_string(),
            });
        }
        if !state.commissions.contains_key(commission_id) {
            return Err(AccountError::CommissionNotFound(commission_id.to_string()));
        }
        let opened_by = opening_direction(position.direction);
        let margin =
            self.store
                .margin(&position.symbol, fill_price, opened_by, OffsetFlag::Open)?;

        self.confirm_commission(&mut state, commission_id, fill_price)?;
        let position = state
            .positions
            .get_mut(position_id)
            .ok_or_else(|| AccountError::PositionNotFound(position_id.to_string()))?;
        position.open_price = fill_price;
        position.margin = margin;
        position.state = PositionState::Normal;
        position.open_time = self.store.now();
        self.store
            .alter_position(&self.user, position, AlterKind::Update);
        Ok(())
    }

    /// Roll back an unfilled open reservation: delete the position and
    /// commission outright.
    pub fn undo_open(&self, reservation: &Reservation) -> Result<()> {
        let mut state = self.state.write();
        let position = state
            .positions
            .remove(&reservation.position_id)
            .ok_or_else(|| AccountError::PositionNotFound(reservation.position_id.clone()))?;
        self.store
            .alter_position(&self.user, &position, AlterKind::Delete);
        self.remove_commission(&mut state, &reservation.commission_id)
    }

    // -----------------------------------------------------------------------
    // Close path
    // -----------------------------------------------------------------------

    /// Reserve one lot to close: freeze the oldest matching `Normal` position
    /// and hold the closing commission.
    ///
    /// The order direction maps to the opposite position side (buying closes
    /// a short). Selection is deterministic oldest-first: minimum
    /// `(open_time, id)` among candidates.
    pub fn reserve_close(
        &self,
        symbol: &str,
        direction: Direction,
        price: f64,
    ) -> Result<Reservation> {
        let commission = self
            .store
            .commission(symbol, price, direction, OffsetFlag::Close)?;
        check_commission(commission)?;
        let target = direction.closes();

        let mut state = self.state.write();
        let candidate = state
            .positions
            .values()
            .filter(|p| {
                p.state == PositionState::Normal
                    && p.direction == target
                    && p.symbol.eq_ignore_ascii_case(symbol)
            })
            .min_by(|a, b| {
                (a.open_time.as_str(), a.id.as_str()).cmp(&(b.open_time.as_str(), b.id.as_str()))
            })
            .map(|p| p.id.clone());
        let position_id = candidate.ok_or_else(|| AccountError::InsufficientPosition {
            symbol: symbol.to_string(),
            direction: target.to_string(),
        })?;

        let position = state
            .positions
            .get_mut(&position_id)
            .ok_or_else(|| AccountError::PositionNotFound(position_id.clone()))?;
        position.state = PositionState::FrozenClose;
        self.store
            .alter_position(&self.user, position, AlterKind::Update);
        let commission_id =
            self.add_commission(&mut state, symbol, direction, OffsetFlag::Close, commission);
        debug!(symbol, %direction, price, %position_id, "reserved close lot");
        Ok(Reservation {
            kind: ReservationKind::Close,
            position_id,
            commission_id,
        })
    }

    /// Confirm a closing fill: realize profit at the fill price, delete the
    /// position, confirm the commission, and append a close-profit cash
    /// entry.
    pub fn confirm_close(
        &self,
        position_id: &str,
        commission_id: &str,
        fill_price: f64,
    ) -> Result<()> {
        let mut state = self.state.write();
        let position = state
            .positions
            .get(position_id)
            .ok_or_else(|| AccountError::PositionNotFound(position_id.to_string()))?;
        if position.state != PositionState::FrozenClose {
            return Err(AccountError::InvalidPositionState {
                id: position_id.to_string(),
                state: position.state.to_string(),
            });
        }
        if !state.commissions.contains_key(commission_id) {
            return Err(AccountError::CommissionNotFound(commission_id.to_string()));
        }

        self.confirm_commission(&mut state, commission_id, fill_price)?;
        let position = state
            .positions
            .remove(position_id)
            .ok_or_else(|| AccountError::PositionNotFound(position_id.to_string()))?;
        self.store
            .alter_position(&self.user, &position, AlterKind::Delete);
        let profit = position.profit(fill_price);
        let cash = CashEntry {
            id: format!("S-{}", next_id()),
            amount: profit,
            source: CashSource::CloseProfit,
            trading_day: self.store.trading_day(),
            time: self.store.now(),
        };
        self.store.alter_cash(&self.user, &cash, AlterKind::Add);
        state.cash.push(cash);
        debug!(%position_id, fill_price, profit, "closed position");
        Ok(())
    }

    /// Roll back an unfilled close reservation: thaw the position and drop
    /// the frozen commission.
    pub fn undo_close(&self, reservation: &Reservation) -> Result<()> {
        let mut state = self.state.write();
        let position = state
            .positions
            .get_mut(&reservation.position_id)
            .ok_or_else(|| AccountError::PositionNotFound(reservation.position_id.clone()))?;
        if position.state != PositionState::FrozenClose {
            return Err(AccountError::InvalidPositionState {
                id: reservation.position_id.clone(),
                state: position.state.to_string(),
            });
        }
        position.state = PositionState::Normal;
        self.store
            .alter_position(&self.user, position, AlterKind::Update);
        self.remove_commission(&mut state, &reservation.commission_id)
    }

    /// Roll back a reservation of either kind.
    pub fn undo(&self, reservation: &Reservation) -> Result<()> {
        match reservation.kind {
            ReservationKind::Open => self.undo_open(reservation),
            ReservationKind::Close => self.undo_close(reservation),
        }
    }

    // -----------------------------------------------------------------------
    // Cash
    // -----------------------------------------------------------------------

    /// Record a deposit.
    pub fn deposit(&self, amount: f64) {
        let mut state = self.state.write();
        let cash = CashEntry {
            id: format!("S-{}", next_id()),
            amount,
            source: CashSource::Deposit,
            trading_day: self.store.trading_day(),
            time: self.store.now(),
        };
        self.store.alter_cash(&self.user, &cash, AlterKind::Add);
        state.cash.push(cash);
    }

    /// Record a withdrawal, admission-checked against available capital.
    pub fn withdraw(&self, amount: f64) -> Result<()> {
        let mut state = self.state.write();
        let available = self.available_in(&state)?;
        if available < amount {
            return Err(AccountError::InsufficientAvailable {
                available,
                required: amount,
            });
        }
        let cash = CashEntry {
            id: format!("S-{}", next_id()),
            amount,
            source: CashSource::Withdraw,
            trading_day: self.store.trading_day(),
            time: self.store.now(),
        };
        self.store.alter_cash(&self.user, &cash, AlterKind::Add);
        state.cash.push(cash);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// End-of-day settlement.
    ///
    /// Discards frozen-open positions and frozen commissions, reverts
    /// frozen-close positions to normal, then produces a new ledger whose
    /// pre-balance is today's dynamic balance, carrying forward the remaining
    /// positions, normal commissions, and the full cash history. The new
    /// settled balance record is appended to the store with a fresh id.
    pub fn settle(&self) -> Result<Ledger> {
        let mut state = self.state.write();
        self.clear_frozen(&mut state);
        let dynamic_balance = self.dynamic_balance_in(&state)?;
        let balance = AccountBalance {
            id: format!("B-{}", next_id()),
            user: self.user.clone(),
            balance: dynamic_balance,
            trading_day: self.store.trading_day(),
            time: self.store.now(),
        };
        self.store
            .alter_balance(&self.user, &balance, AlterKind::Add);
        debug!(user = %self.user, dynamic_balance, "settled ledger");
        Ok(Ledger {
            user: self.user.clone(),
            pre_balance: balance,
            state: RwLock::new(state.clone()),
            store: Arc::clone(&self.store),
        })
    }

    fn clear_frozen(&self, state: &mut LedgerState) {
        // Frozen, never-traded commissions are dropped.
        let frozen: Vec<String> = state
            .commissions
            .values()
            .filter(|c| c.state == CommissionState::Frozen)
            .map(|c| c.id.clone())
            .collect();
        for id in frozen {
            if let Some(c) = state.commissions.remove(&id) {
                self.store.alter_commission(&self.user, &c, AlterKind::Delete);
            }
        }
        // Frozen-open positions never filled; frozen-close positions revert.
        let ids: Vec<(String, PositionState)> = state
            .positions
            .values()
            .map(|p| (p.id.clone(), p.state))
            .collect();
        for (id, position_state) in ids {
            match position_state {
                PositionState::FrozenOpen => {
                    if let Some(p) = state.positions.remove(&id) {
                        self.store.alter_position(&self.user, &p, AlterKind::Delete);
                    }
                }
                PositionState::FrozenClose => {
                    if let Some(p) = state.positions.get_mut(&id) {
                        p.state = PositionState::Normal;
                        self.store.alter_position(&self.user, p, AlterKind::Update);
                    }
                }
                PositionState::Normal => {}
            }
        }
    }

    // -----------------------------------------------------------------------
    // Derived totals
    // -----------------------------------------------------------------------

    /// Margin held by normal and frozen-close positions.
    pub fn total_margin(&self) -> f64 {
        let state = self.state.read();
        margin_sum(&state, PositionState::Normal) + margin_sum(&state, PositionState::FrozenClose)
    }

    /// Margin held by frozen-open positions.
    pub fn total_frozen_margin(&self) -> f64 {
        margin_sum(&self.state.read(), PositionState::FrozenOpen)
    }

    /// Commission of confirmed (normal) records.
    pub fn total_commission(&self) -> f64 {
        commission_sum(&self.state.read(), CommissionState::Normal)
    }

    /// Commission still frozen by outstanding reservations.
    pub fn total_frozen_commission(&self) -> f64 {
        commission_sum(&self.state.read(), CommissionState::Frozen)
    }

    pub fn total_deposit(&self) -> f64 {
        cash_sum(&self.state.read(), CashSource::Deposit)
    }

    pub fn total_withdraw(&self) -> f64 {
        cash_sum(&self.state.read(), CashSource::Withdraw)
    }

    pub fn total_close_profit(&self) -> f64 {
        cash_sum(&self.state.read(), CashSource::CloseProfit)
    }

    /// Mark-to-market profit over all positions at current reference prices.
    pub fn total_position_profit(&self) -> Result<f64> {
        self.position_profit_in(&self.state.read())
    }

    /// `pre_balance + deposit - withdraw + position_profit - commission`.
    ///
    /// Realized close profit is not a term here: closing removes the position
    /// and its profit contribution, and the cash entry is reporting-only. The
    /// externally reported balance does include it — see the account view.
    pub fn dynamic_balance(&self) -> Result<f64> {
        self.dynamic_balance_in(&self.state.read())
    }

    /// Capital available for new reservations:
    /// `dynamic_balance - total_margin`.
    pub fn available(&self) -> Result<f64> {
        self.available_in(&self.state.read())
    }

    /// All derived sums computed under one read guard.
    pub fn totals(&self) -> Result<LedgerTotals> {
        let state = self.state.read();
        let position_profit = self.position_profit_in(&state)?;
        let commission = commission_sum(&state, CommissionState::Normal);
        let deposit = cash_sum(&state, CashSource::Deposit);
        let withdraw = cash_sum(&state, CashSource::Withdraw);
        let close_profit = cash_sum(&state, CashSource::CloseProfit);
        Ok(LedgerTotals {
            margin: margin_sum(&state, PositionState::Normal)
                + margin_sum(&state, PositionState::FrozenClose),
            frozen_margin: margin_sum(&state, PositionState::FrozenOpen),
            commission,
            frozen_commission: commission_sum(&state, CommissionState::Frozen),
            deposit,
            withdraw,
            close_profit,
            position_profit,
            dynamic_balance: self.pre_balance.balance + deposit - withdraw + position_profit
                - commission,
        })
    }

    /// Snapshot of all positions.
    pub fn positions(&self) -> Vec<Position> {
        self.state.read().positions.values().cloned().collect()
    }

    /// One position by id.
    pub fn position(&self, id: &str) -> Option<Position> {
        self.state.read().positions.get(id).cloned()
    }

    /// Snapshot of all commissions.
    pub fn commissions(&self) -> Vec<Commission> {
        self.state.read().commissions.values().cloned().collect()
    }

    /// Snapshot of the cash history.
    pub fn cash(&self) -> Vec<CashEntry> {
        self.state.read().cash.clone()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn position_profit_in(&self, state: &LedgerState) -> Result<f64> {
        let mut total = 0.0;
        for p in state.positions.values() {
            // Frozen-open positions have no exposure; skip the price lookup.
            if p.state == PositionState::FrozenOpen {
                continue;
            }
            total += p.profit(self.store.price(&p.symbol)?);
        }
        Ok(total)
    }

    fn dynamic_balance_in(&self, state: &LedgerState) -> Result<f64> {
        let cash_change =
            cash_sum(state, CashSource::Deposit) - cash_sum(state, CashSource::Withdraw);
        Ok(self.pre_balance.balance + cash_change + self.position_profit_in(state)?
            - commission_sum(state, CommissionState::Normal))
    }

    fn available_in(&self, state: &LedgerState) -> Result<f64> {
        let margin = margin_sum(state, PositionState::Normal)
            + margin_sum(state, PositionState::FrozenClose);
        Ok(self.dynamic_balance_in(state)? - margin)
    }

    fn add_position(
        &self,
        state: &mut LedgerState,
        symbol: &str,
        exchange: &str,
        direction: Direction,
        price: f64,
        multiplier: i64,
        margin: f64,
    ) -> String {
        let id = format!("P-{}", next_id());
        let position = Position {
            id: id.clone(),
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
            direction: direction.opens(),
            open_price: price,
            multiplier,
            margin,
            open_trading_day: self.store.trading_day(),
            open_time: self.store.now(),
            state: PositionState::FrozenOpen,
        };
        self.store
            .alter_position(&self.user, &position, AlterKind::Add);
        state.positions.insert(id.clone(), position);
        id
    }

    fn add_commission(
        &self,
        state: &mut LedgerState,
        symbol: &str,
        direction: Direction,
        offset: OffsetFlag,
        amount: f64,
    ) -> String {
        let id = format!("C-{}", next_id());
        let commission = Commission {
            id: id.clone(),
            symbol: symbol.to_string(),
            direction,
            offset,
            amount,
            trading_day: self.store.trading_day(),
            time: self.store.now(),
            state: CommissionState::Frozen,
        };
        self.store
            .alter_commission(&self.user, &commission, AlterKind::Add);
        state.commissions.insert(id.clone(), commission);
        id
    }

    /// Reprice a frozen commission at the fill price and confirm it.
    fn confirm_commission(
        &self,
        state: &mut LedgerState,
        commission_id: &str,
        fill_price: f64,
    ) -> Result<()> {
        let commission = state
            .commissions
            .get_mut(commission_id)
            .ok_or_else(|| AccountError::CommissionNotFound(commission_id.to_string()))?;
        let amount = self.store.commission(
            &commission.symbol,
            fill_price,
            commission.direction,
            commission.offset,
        )?;
        commission.amount = amount;
        commission.state = CommissionState::Normal;
        commission.time = self.store.now();
        self.store
            .alter_commission(&self.user, commission, AlterKind::Update);
        Ok(())
    }

    fn remove_commission(&self, state: &mut LedgerState, commission_id: &str) -> Result<()> {
        let commission = state
            .commissions
            .remove(commission_id)
            .ok_or_else(|| AccountError::CommissionNotFound(commission_id.to_string()))?;
        self.store
            .alter_commission(&self.user, &commission, AlterKind::Delete);
        Ok(())
    }
}

/// Order direction that would have opened a position on this side.
fn opening_direction(direction: PositionDirection) -> Direction {
    match direction {
        PositionDirection::Long => Direction::Buy,
        PositionDirection::Short => Direction::Sell,
    }
}

fn margin_sum(state: &LedgerState, position_state: PositionState) -> f64 {
    state
        .positions
        .values()
        .filter(|p| p.state == position_state)
        .map(|p| p.margin)
        .sum()
}

fn commission_sum(state: &LedgerState, commission_state: CommissionState) -> f64 {
    state
        .commissions
        .values()
        .filter(|c| c.state == commission_state)
        .map(|c| c.amount)
        .sum()
}

fn cash_sum(state: &LedgerState, source: CashSource) -> f64 {
    state
        .cash
        .iter()
        .filter(|c| c.source == source)
        .map(|c| c.amount)
        .sum()
}

fn check_margin(margin: f64) -> Result<()> {
    if margin < 0.0 {
        return Err(AccountError::IllegalMargin(margin));
    }
    Ok(())
}

fn check_commission(commission: f64) -> Result<()> {
    if commission < 0.0 {
        return Err(AccountError::IllegalCommission(commission));
    }
    Ok(())
}
