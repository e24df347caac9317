//! In-memory test doubles: a rate/record store, an execution channel with
//! hand-driven fills, and a recording order sink.
//!
//! These back the crate's own tests and are useful for dry-running
//! strategies without a venue connection, so they ship in the library
//! rather than behind `#[cfg(test)]`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use ahash::AHashMap;
use anyhow::bail;
use parking_lot::{Mutex, RwLock};
use tracing::warn;

use ft_core::config::AppConfig;
use ft_core::error::{AccountError, Result};
use ft_core::rates::RateProvider;
use ft_core::store::{AccountStore, AlterKind};
use ft_core::types::{
    AccountBalance, CashEntry, Commission, Direction, OffsetFlag, OrderRequest, Position,
    RatioMode, Trade,
};

use crate::channel::{ExecutionChannel, FillListener, OrderSink};

type RatioKey = (String, Direction, OffsetFlag);

#[derive(Default)]
struct Records {
    balances: Vec<AccountBalance>,
    positions: AHashMap<String, Position>,
    commissions: AHashMap<String, Commission>,
    cash: Vec<CashEntry>,
}

/// In-memory rate table and record store.
///
/// Ratios are keyed by (symbol, direction, offset); the tagged close offsets
/// share the plain `Close` entry. `now()` is a monotonic counter rather than
/// a wall clock so timestamps written during a test sort deterministically.
pub struct MemoryStore {
    trading_day: RwLock<String>,
    prices: RwLock<AHashMap<String, f64>>,
    multipliers: RwLock<AHashMap<String, i64>>,
    margin_ratios: RwLock<AHashMap<RatioKey, (RatioMode, f64)>>,
    commission_ratios: RwLock<AHashMap<RatioKey, (RatioMode, f64)>>,
    records: RwLock<AHashMap<String, Records>>,
    clock: AtomicU64,
}

impl MemoryStore {
    pub fn new(trading_day: &str) -> Self {
        Self {
            trading_day: RwLock::new(trading_day.to_string()),
            prices: RwLock::new(AHashMap::new()),
            multipliers: RwLock::new(AHashMap::new()),
            margin_ratios: RwLock::new(AHashMap::new()),
            commission_ratios: RwLock::new(AHashMap::new()),
            records: RwLock::new(AHashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    /// Seed prices, multipliers, and rate tables from a loaded config file.
    pub fn from_config(config: &AppConfig) -> Self {
        let day = config.trading_day.clone().unwrap_or_default();
        let store = Self::new(&day);
        for instrument in &config.instruments {
            if let Some(price) = instrument.price {
                store.set_price(&instrument.symbol, price);
            }
            store.set_multiplier(&instrument.symbol, instrument.multiplier);
            for direction in [Direction::Buy, Direction::Sell] {
                for offset in [OffsetFlag::Open, OffsetFlag::Close] {
                    for ratio in &instrument.margin {
                        if ratio.matches(direction, offset) {
                            store.margin_ratios.write().insert(
                                (instrument.symbol.clone(), direction, offset),
                                (ratio.mode, ratio.ratio),
                            );
                        }
                    }
                    for ratio in &instrument.commission {
                        if ratio.matches(direction, offset) {
                            store.commission_ratios.write().insert(
                                (instrument.symbol.clone(), direction, offset),
                                (ratio.mode, ratio.ratio),
                            );
                        }
                    }
                }
            }
        }
        store
    }

    pub fn set_trading_day(&self, trading_day: &str) {
        *self.trading_day.write() = trading_day.to_string();
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.write().insert(symbol.to_string(), price);
    }

    pub fn set_multiplier(&self, symbol: &str, multiplier: i64) {
        self.multipliers
            .write()
            .insert(symbol.to_string(), multiplier);
    }

    /// Set one margin ratio for every (direction, offset) combination.
    pub fn set_margin_ratio(&self, symbol: &str, mode: RatioMode, ratio: f64) {
        let mut table = self.margin_ratios.write();
        for direction in [Direction::Buy, Direction::Sell] {
            for offset in [OffsetFlag::Open, OffsetFlag::Close] {
                table.insert((symbol.to_string(), direction, offset), (mode, ratio));
            }
        }
    }

    /// Set one commission ratio for every (direction, offset) combination.
    pub fn set_commission_ratio(&self, symbol: &str, mode: RatioMode, ratio: f64) {
        let mut table = self.commission_ratios.write();
        for direction in [Direction::Buy, Direction::Sell] {
            for offset in [OffsetFlag::Open, OffsetFlag::Close] {
                table.insert((symbol.to_string(), direction, offset), (mode, ratio));
            }
        }
    }

    fn amount(
        &self,
        table: &RwLock<AHashMap<RatioKey, (RatioMode, f64)>>,
        kind: &'static str,
        symbol: &str,
        price: f64,
        direction: Direction,
        offset: OffsetFlag,
    ) -> Result<f64> {
        // The tagged close offsets carry the plain close rates.
        let offset = if offset.is_close() {
            OffsetFlag::Close
        } else {
            offset
        };
        let (mode, ratio) = table
            .read()
            .get(&(symbol.to_string(), direction, offset))
            .copied()
            .ok_or(AccountError::RateUnavailable {
                symbol: symbol.to_string(),
                kind,
            })?;
        match mode {
            RatioMode::ByVolume => Ok(ratio),
            RatioMode::ByAmount => Ok(price * self.multiplier(symbol)? as f64 * ratio),
        }
    }
}

impl RateProvider for MemoryStore {
    fn price(&self, symbol: &str) -> Result<f64> {
        self.prices
            .read()
            .get(symbol)
            .copied()
            .ok_or(AccountError::RateUnavailable {
                symbol: symbol.to_string(),
                kind: "price",
            })
    }

    fn multiplier(&self, symbol: &str) -> Result<i64> {
        self.multipliers
            .read()
            .get(symbol)
            .copied()
            .ok_or(AccountError::RateUnavailable {
                symbol: symbol.to_string(),
                kind: "multiplier",
            })
    }

    fn margin(
        &self,
        symbol: &str,
        price: f64,
        direction: Direction,
        offset: OffsetFlag,
    ) -> Result<f64> {
        self.amount(
            &self.margin_ratios,
            "margin ratio",
            symbol,
            price,
            direction,
            offset,
        )
    }

    fn commission(
        &self,
        symbol: &str,
        price: f64,
        direction: Direction,
        offset: OffsetFlag,
    ) -> Result<f64> {
        self.amount(
            &self.commission_ratios,
            "commission ratio",
            symbol,
            price,
            direction,
            offset,
        )
    }

    fn trading_day(&self) -> String {
        self.trading_day.read().clone()
    }

    fn now(&self) -> String {
        format!("{:012}", self.clock.fetch_add(1, Ordering::Relaxed))
    }
}

impl AccountStore for MemoryStore {
    fn balance_of(&self, user: &str) -> Option<AccountBalance> {
        self.records
            .read()
            .get(user)
            .and_then(|r| r.balances.last().cloned())
    }

    fn positions_of(&self, user: &str) -> Vec<Position> {
        self.records
            .read()
            .get(user)
            .map(|r| r.positions.values().cloned().collect())
            .unwrap_or_default()
    }

    fn commissions_of(&self, user: &str) -> Vec<Commission> {
        self.records
            .read()
            .get(user)
            .map(|r| r.commissions.values().cloned().collect())
            .unwrap_or_default()
    }

    fn cash_of(&self, user: &str) -> Vec<CashEntry> {
        self.records
            .read()
            .get(user)
            .map(|r| r.cash.clone())
            .unwrap_or_default()
    }

    fn alter_balance(&self, user: &str, balance: &AccountBalance, alter: AlterKind) {
        let mut records = self.records.write();
        let records = records.entry(user.to_string()).or_default();
        if alter == AlterKind::Add {
            records.balances.push(balance.clone());
        }
    }

    fn alter_position(&self, user: &str, position: &Position, alter: AlterKind) {
        let mut records = self.records.write();
        let records = records.entry(user.to_string()).or_default();
        match alter {
            AlterKind::Add | AlterKind::Update => {
                records
                    .positions
                    .insert(position.id.clone(), position.clone());
            }
            AlterKind::Delete => {
                records.positions.remove(&position.id);
            }
        }
    }

    fn alter_commission(&self, user: &str, commission: &Commission, alter: AlterKind) {
        let mut records = self.records.write();
        let records = records.entry(user.to_string()).or_default();
        match alter {
            AlterKind::Add | AlterKind::Update => {
                records
                    .commissions
                    .insert(commission.id.clone(), commission.clone());
            }
            AlterKind::Delete => {
                records.commissions.remove(&commission.id);
            }
        }
    }

    fn alter_cash(&self, user: &str, cash: &CashEntry, alter: AlterKind) {
        let mut records = self.records.write();
        let records = records.entry(user.to_string()).or_default();
        if alter == AlterKind::Add {
            records.cash.push(cash.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Execution channel
// ---------------------------------------------------------------------------

/// An execution channel that records submissions and lets the test drive
/// fills and venue errors by order id.
#[derive(Default)]
pub struct SimChannel {
    submitted: Mutex<Vec<(OrderRequest, Arc<dyn FillListener>)>>,
}

impl SimChannel {
    /// All submitted orders, in submission order.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.submitted
            .lock()
            .iter()
            .map(|(order, _)| order.clone())
            .collect()
    }

    fn listener_for(&self, order_id: &str) -> Option<(OrderRequest, Arc<dyn FillListener>)> {
        self.submitted
            .lock()
            .iter()
            .find(|(order, _)| order.id == order_id)
            .map(|(order, listener)| (order.clone(), Arc::clone(listener)))
    }

    /// Deliver a fill with the plain offset matching the order (tagged close
    /// sub-orders fill as plain closes, the way a venue reports them). An
    /// unknown order id is logged and dropped.
    pub fn fill(&self, order_id: &str, quantity: u32, price: f64) {
        let Some((order, _)) = self.listener_for(order_id) else {
            warn!(order_id, "dropping fill for unknown order");
            return;
        };
        let offset = if order.offset == OffsetFlag::Open {
            OffsetFlag::Open
        } else {
            OffsetFlag::Close
        };
        self.fill_as(order_id, quantity, price, offset);
    }

    /// Deliver a fill carrying an explicit offset.
    pub fn fill_as(&self, order_id: &str, quantity: u32, price: f64, offset: OffsetFlag) {
        let Some((order, listener)) = self.listener_for(order_id) else {
            warn!(order_id, "dropping fill for unknown order");
            return;
        };
        listener.on_fill(&Trade {
            order_id: order.id.clone(),
            symbol: order.symbol.clone(),
            quantity,
            price,
            direction: order.direction,
            offset,
            time: order.time.clone(),
        });
    }

    /// Deliver a terminal venue error for an order. An unknown order id is
    /// logged and dropped.
    pub fn fail(&self, order_id: &str, error: AccountError) {
        let Some((_, listener)) = self.listener_for(order_id) else {
            warn!(order_id, %error, "dropping venue error for unknown order");
            return;
        };
        listener.on_error(error);
    }
}

impl ExecutionChannel for SimChannel {
    fn submit(&self, order: &OrderRequest, listener: Arc<dyn FillListener>) {
        self.submitted.lock().push((order.clone(), listener));
    }
}

// ---------------------------------------------------------------------------
// Recording sink
// ---------------------------------------------------------------------------

/// One event delivered to a [`RecordingSink`].
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Trade(Trade),
    Error(AccountError),
}

/// An [`OrderSink`] that records everything it receives. In failing mode it
/// still counts delivery attempts but refuses every one.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    error_attempts: AtomicUsize,
    failing: bool,
}

impl RecordingSink {
    /// A sink whose callbacks all fail, for exercising delivery fallbacks.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Number of trade events received.
    pub fn trades(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Trade(_)))
            .count()
    }

    /// Number of error events received.
    pub fn errors(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Error(_)))
            .count()
    }

    pub fn first_error(&self) -> Option<AccountError> {
        self.events.lock().iter().find_map(|e| match e {
            SinkEvent::Error(error) => Some(error.clone()),
            SinkEvent::Trade(_) => None,
        })
    }

    /// Total `on_error` calls, delivered or refused.
    pub fn error_attempts(&self) -> usize {
        self.error_attempts.load(Ordering::Relaxed)
    }
}

impl OrderSink for RecordingSink {
    fn on_trade(&self, trade: &Trade) -> anyhow::Result<()> {
        if self.failing {
            bail!("sink closed");
        }
        self.events.lock().push(SinkEvent::Trade(trade.clone()));
        Ok(())
    }

    fn on_error(&self, error: &AccountError) -> anyhow::Result<()> {
        self.error_attempts.fetch_add(1, Ordering::Relaxed);
        if self.failing {
            bail!("sink closed");
        }
        self.events.lock().push(SinkEvent::Error(error.clone()));
        Ok(())
    }
}
