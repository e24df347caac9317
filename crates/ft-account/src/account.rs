//! The account service — the caller-facing surface of the core.
//!
//! `place_order` runs the full pre-submission pipeline (user check, batch
//! reservation, close splitting) and hands the reservations to per-order
//! fill consumers registered with the execution channel. Reservation-time
//! failures are rolled back before the caller sees a single error; nothing
//! in this module ever panics into the caller.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::info;

use ft_core::error::{AccountError, Result};
use ft_core::types::{Balance, OffsetFlag, OrderRequest, PositionSummary};

use crate::batch;
use crate::channel::{ExecutionChannel, OrderSink, deliver_error};
use crate::fill::FillConsumer;
use crate::ledger::Ledger;
use crate::route;
use crate::view;

/// One account's trading service.
pub struct AccountService {
    ledger: RwLock<Arc<Ledger>>,
    channel: Arc<dyn ExecutionChannel>,
    /// Serializes order submission per account. Fill delivery is not behind
    /// this lock and may race a new submission freely.
    submit_lock: Mutex<()>,
}

impl AccountService {
    pub fn new(ledger: Ledger, channel: Arc<dyn ExecutionChannel>) -> Self {
        Self {
            ledger: RwLock::new(Arc::new(ledger)),
            channel,
            submit_lock: Mutex::new(()),
        }
    }

    /// The current ledger. Settlement swaps in a fresh one; consumers of
    /// in-flight orders keep the instance they were built with.
    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger.read())
    }

    /// Submit an order. All outcomes — trades and errors alike — arrive via
    /// `sink`; this call itself never fails or panics.
    pub fn place_order(&self, order: &OrderRequest, sink: Arc<dyn OrderSink>) {
        if let Err(error) = self.try_place(order, &sink) {
            deliver_error(&*sink, &error);
        }
    }

    fn try_place(&self, order: &OrderRequest, sink: &Arc<dyn OrderSink>) -> Result<()> {
        let ledger = self.ledger();
        if !order.user.eq_ignore_ascii_case(ledger.user()) {
            return Err(AccountError::WrongUser {
                actual: order.user.clone(),
                expected: ledger.user().to_string(),
            });
        }
        match order.offset {
            OffsetFlag::Open => self.place_open(&ledger, order, sink),
            OffsetFlag::Close => self.place_close(&ledger, order, sink),
            // The router assigns today/yesterday tags; callers submit plain
            // closes.
            offset => Err(AccountError::IllegalOffset(offset.to_string())),
        }
    }

    fn place_open(
        &self,
        ledger: &Arc<Ledger>,
        order: &OrderRequest,
        sink: &Arc<dyn OrderSink>,
    ) -> Result<()> {
        let reservations = batch::reserve_open_batch(ledger, order)?;
        info!(order_id = %order.id, quantity = order.quantity, "submitting open order");
        let consumer = Arc::new(FillConsumer::new(
            Arc::clone(ledger),
            reservations,
            Arc::clone(sink),
        ));
        let _guard = self.submit_lock.lock();
        self.channel.submit(order, consumer);
        Ok(())
    }

    fn place_close(
        &self,
        ledger: &Arc<Ledger>,
        order: &OrderRequest,
        sink: &Arc<dyn OrderSink>,
    ) -> Result<()> {
        let reservations = batch::reserve_close_batch(ledger, order)?;
        let split = match route::split_close(ledger, order, reservations.clone()) {
            Ok(split) => split,
            Err(error) => {
                // A failed split is still a reservation-time error; nothing
                // may stay frozen.
                batch::undo_all(ledger, &reservations);
                return Err(error);
            }
        };
        let _guard = self.submit_lock.lock();
        for sub in split.into_sub_orders() {
            info!(
                order_id = %sub.order.id,
                offset = %sub.order.offset,
                quantity = sub.order.quantity,
                "submitting close sub-order"
            );
            let consumer = Arc::new(FillConsumer::new(
                Arc::clone(ledger),
                sub.reservations,
                Arc::clone(sink),
            ));
            self.channel.submit(&sub.order, consumer);
        }
        Ok(())
    }

    /// The reported balance snapshot.
    pub fn balance(&self) -> Result<Balance> {
        view::balance(&self.ledger())
    }

    /// Per-(symbol, direction) position rollup; empty filter matches all.
    pub fn positions(&self, symbol_filter: &str) -> Result<Vec<PositionSummary>> {
        view::positions(&self.ledger(), symbol_filter)
    }

    pub fn deposit(&self, amount: f64) {
        self.ledger().deposit(amount);
    }

    pub fn withdraw(&self, amount: f64) -> Result<()> {
        self.ledger().withdraw(amount)
    }

    /// End-of-day settlement: replaces the ledger with the next day's.
    pub fn settle(&self) -> Result<()> {
        let next = self.ledger().settle()?;
        *self.ledger.write() = Arc::new(next);
        Ok(())
    }
}
