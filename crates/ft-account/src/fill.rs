//! Fill consumption: turning venue fills into confirmed ledger changes.
//!
//! A [`FillConsumer`] is attached to exactly one submitted (sub-)order at
//! submission time and owns that order's queue of outstanding reservations.
//! Fills pop reservations off the front of the queue and confirm them one by
//! one; a venue error compensates whatever is still queued. No callback ever
//! panics or propagates an error back into the channel.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use ft_core::error::{AccountError, Result};
use ft_core::types::{OffsetFlag, Trade};

use crate::channel::{FillListener, OrderSink, deliver_error};
use crate::ledger::{Ledger, Reservation, ReservationKind};

/// Consumes fills for one submitted (sub-)order.
///
/// The reservation queue is handed over at submission and never touched by
/// any other component afterwards; the internal mutex only orders concurrent
/// callbacks from the channel itself.
pub struct FillConsumer {
    ledger: Arc<Ledger>,
    queue: Mutex<VecDeque<Reservation>>,
    sink: Arc<dyn OrderSink>,
}

impl FillConsumer {
    pub fn new(
        ledger: Arc<Ledger>,
        reservations: Vec<Reservation>,
        sink: Arc<dyn OrderSink>,
    ) -> Self {
        Self {
            ledger,
            queue: Mutex::new(reservations.into()),
            sink,
        }
    }

    /// Reservations not yet consumed by a fill.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Confirm one popped reservation against the fill.
    ///
    /// The venue reports plain `Open`/`Close` offsets; a close sub-order's
    /// today/yesterday tag exists only on the order, so anything other than
    /// the matching plain offset is rejected per lot.
    fn confirm(&self, reservation: &Reservation, trade: &Trade) -> Result<()> {
        let expected = match reservation.kind {
            ReservationKind::Open => OffsetFlag::Open,
            ReservationKind::Close => OffsetFlag::Close,
        };
        if trade.offset != expected {
            return Err(AccountError::IllegalOffset(format!(
                "{}: fill offset {}, expect {}",
                trade.order_id, trade.offset, expected
            )));
        }
        match reservation.kind {
            ReservationKind::Open => self.ledger.confirm_open(
                &reservation.position_id,
                &reservation.commission_id,
                trade.price,
            ),
            ReservationKind::Close => self.ledger.confirm_close(
                &reservation.position_id,
                &reservation.commission_id,
                trade.price,
            ),
        }
    }

    fn forward_trade(&self, trade: &Trade) {
        if let Err(error) = self.sink.on_trade(trade) {
            deliver_error(&*self.sink, &AccountError::SinkFailure(error.to_string()));
        }
    }

    /// Undo every reservation still queued after a terminal error.
    fn compensate(&self) {
        let drained: Vec<Reservation> = self.queue.lock().drain(..).collect();
        for reservation in &drained {
            if let Err(error) = self.ledger.undo(reservation) {
                warn!(
                    position_id = %reservation.position_id,
                    %error,
                    "failed to undo reservation during compensation"
                );
            }
        }
    }
}

impl FillListener for FillConsumer {
    fn on_fill(&self, trade: &Trade) {
        let popped: Vec<Reservation> = {
            let mut queue = self.queue.lock();
            if trade.quantity as usize > queue.len() {
                let queued = queue.len();
                drop(queue);
                deliver_error(
                    &*self.sink,
                    &AccountError::ReservationUnderflow {
                        queued,
                        requested: trade.quantity,
                    },
                );
                return;
            }
            queue.drain(..trade.quantity as usize).collect()
        };
        // One lot failing must not stop the rest of this fill.
        for reservation in &popped {
            match self.confirm(reservation, trade) {
                Ok(()) => self.forward_trade(trade),
                Err(error) => deliver_error(&*self.sink, &error),
            }
        }
    }

    fn on_error(&self, error: AccountError) {
        deliver_error(&*self.sink, &error);
        self.compensate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{MemoryStore, RecordingSink};
    use ft_core::rates::RateProvider;
    use ft_core::store::AccountStore;
    use ft_core::types::{AccountBalance, Direction, PositionState, RatioMode};

    fn ledger_with_balance(balance: f64) -> (Arc<MemoryStore>, Arc<Ledger>) {
        let store = Arc::new(MemoryStore::new("20260826"));
        store.set_price("C2109", 3000.0);
        store.set_multiplier("C2109", 10);
        store.set_margin_ratio("C2109", RatioMode::ByAmount, 0.1);
        store.set_commission_ratio("C2109", RatioMode::ByVolume, 5.0);
        let ledger = Arc::new(Ledger::new(
            AccountBalance {
                id: "B-1".into(),
                user: "hb".into(),
                balance,
                trading_day: "20260826".into(),
                time: store.now(),
            },
            Vec::new(),
            Vec::new(),
            Vec::new(),
            store.clone() as Arc<dyn AccountStore>,
        ));
        (store, ledger)
    }

    fn open_trade(quantity: u32, price: f64) -> Trade {
        Trade {
            order_id: "o1".into(),
            symbol: "C2109".into(),
            quantity,
            price,
            direction: Direction::Buy,
            offset: OffsetFlag::Open,
            time: "t".into(),
        }
    }

    #[test]
    fn fill_confirms_in_queue_order() {
        let (_, ledger) = ledger_with_balance(100_000.0);
        let reservations: Vec<_> = (0..3)
            .map(|_| {
                ledger
                    .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
                    .unwrap()
            })
            .collect();
        let sink = Arc::new(RecordingSink::default());
        let consumer = FillConsumer::new(ledger.clone(), reservations.clone(), sink.clone());

        consumer.on_fill(&open_trade(2, 3005.0));
        assert_eq!(consumer.pending(), 1);
        assert_eq!(sink.trades(), 2);
        // First two confirmed, third still frozen.
        for (i, r) in reservations.iter().enumerate() {
            let p = ledger.position(&r.position_id).unwrap();
            let expect = if i < 2 {
                PositionState::Normal
            } else {
                PositionState::FrozenOpen
            };
            assert_eq!(p.state, expect);
        }
    }

    #[test]
    fn underflow_leaves_queue_untouched() {
        let (_, ledger) = ledger_with_balance(100_000.0);
        let reservations: Vec<_> = (0..2)
            .map(|_| {
                ledger
                    .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
                    .unwrap()
            })
            .collect();
        let sink = Arc::new(RecordingSink::default());
        let consumer = FillConsumer::new(ledger.clone(), reservations, sink.clone());

        consumer.on_fill(&open_trade(3, 3000.0));
        assert_eq!(consumer.pending(), 2);
        assert_eq!(sink.trades(), 0);
        assert!(matches!(
            sink.first_error(),
            Some(AccountError::ReservationUnderflow {
                queued: 2,
                requested: 3
            })
        ));
    }

    #[test]
    fn wrong_offset_rejected_per_lot() {
        let (_, ledger) = ledger_with_balance(100_000.0);
        let r = ledger
            .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
            .unwrap();
        let sink = Arc::new(RecordingSink::default());
        let consumer = FillConsumer::new(ledger.clone(), vec![r.clone()], sink.clone());

        let mut trade = open_trade(1, 3000.0);
        trade.offset = OffsetFlag::Close;
        consumer.on_fill(&trade);
        assert!(matches!(
            sink.first_error(),
            Some(AccountError::IllegalOffset(_))
        ));
        // Still frozen; the lot was popped but not confirmed.
        let p = ledger.position(&r.position_id).unwrap();
        assert_eq!(p.state, PositionState::FrozenOpen);
    }

    #[test]
    fn one_bad_lot_does_not_stop_the_rest() {
        let (_, ledger) = ledger_with_balance(100_000.0);
        let good = ledger
            .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
            .unwrap();
        let stale = ledger
            .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
            .unwrap();
        // Consume the second reservation behind the consumer's back so its
        // confirm fails with a stale id.
        ledger.undo_open(&stale).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let consumer = FillConsumer::new(ledger.clone(), vec![stale, good.clone()], sink.clone());

        consumer.on_fill(&open_trade(2, 3000.0));
        assert!(matches!(
            sink.first_error(),
            Some(AccountError::PositionNotFound(_))
        ));
        // The good lot after the failing one still confirmed.
        assert_eq!(sink.trades(), 1);
        let p = ledger.position(&good.position_id).unwrap();
        assert_eq!(p.state, PositionState::Normal);
    }

    #[test]
    fn venue_error_compensates_open_reservations() {
        let (_, ledger) = ledger_with_balance(100_000.0);
        let reservations: Vec<_> = (0..2)
            .map(|_| {
                ledger
                    .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
                    .unwrap()
            })
            .collect();
        let sink = Arc::new(RecordingSink::default());
        let consumer = FillConsumer::new(ledger.clone(), reservations, sink.clone());

        consumer.on_error(AccountError::IllegalQuantity(0));
        assert_eq!(consumer.pending(), 0);
        assert!(ledger.positions().is_empty());
        assert_eq!(ledger.total_frozen_margin(), 0.0);
        assert!(sink.first_error().is_some());
    }

    #[test]
    fn venue_error_compensates_close_reservations() {
        let (_, ledger) = ledger_with_balance(100_000.0);
        let open = ledger
            .reserve_open("C2109", "DCE", Direction::Buy, 3000.0)
            .unwrap();
        ledger
            .confirm_open(&open.position_id, &open.commission_id, 3000.0)
            .unwrap();
        let close = ledger
            .reserve_close("C2109", Direction::Sell, 3000.0)
            .unwrap();
        let sink = Arc::new(RecordingSink::default());
        let consumer = FillConsumer::new(ledger.clone(), vec![close], sink.clone());

        consumer.on_error(AccountError::IllegalQuantity(0));
        let p = ledger.position(&open.position_id).unwrap();
        assert_eq!(p.state, PositionState::Normal);
        assert_eq!(ledger.total_frozen_commission(), 0.0);
    }

    #[test]
    fn sink_failure_is_retried_then_dropped() {
        let (_, ledger) = ledger_with_balance(100_000.0);
        let sink = Arc::new(RecordingSink::failing());
        let consumer = FillConsumer::new(ledger, Vec::new(), sink.clone());
        // Must not panic even though every delivery attempt fails.
        consumer.on_error(AccountError::IllegalQuantity(0));
        assert_eq!(sink.error_attempts(), 2);
        assert!(sink.events().is_empty());
    }
}
