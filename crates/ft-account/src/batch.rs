//! Reservation batching: one order quantity becomes N atomic single-lot
//! reservations, all-or-nothing.
//!
//! Each lot is reserved individually against the ledger. The first failure
//! rolls back every reservation made so far and surfaces that single error
//! to the caller — a failed order never leaves partial holds behind.

use tracing::warn;

use ft_core::error::{AccountError, Result};
use ft_core::types::OrderRequest;

use crate::ledger::{Ledger, Reservation};

/// Reserve `order.quantity` opening lots. Zero quantity is rejected before
/// touching the ledger.
pub fn reserve_open_batch(ledger: &Ledger, order: &OrderRequest) -> Result<Vec<Reservation>> {
    if order.quantity == 0 {
        return Err(AccountError::IllegalQuantity(0));
    }
    let mut reserved = Vec::with_capacity(order.quantity as usize);
    for _ in 0..order.quantity {
        match ledger.reserve_open(&order.symbol, &order.exchange, order.direction, order.price) {
            Ok(reservation) => reserved.push(reservation),
            Err(error) => {
                undo_all(ledger, &reserved);
                return Err(error);
            }
        }
    }
    Ok(reserved)
}

/// Reserve `order.quantity` closing lots, freezing one matching position
/// each. Same all-or-nothing guarantee as [`reserve_open_batch`].
pub fn reserve_close_batch(ledger: &Ledger, order: &OrderRequest) -> Result<Vec<Reservation>> {
    if order.quantity == 0 {
        return Err(AccountError::IllegalQuantity(0));
    }
    let mut reserved = Vec::with_capacity(order.quantity as usize);
    for _ in 0..order.quantity {
        match ledger.reserve_close(&order.symbol, order.direction, order.price) {
            Ok(reservation) => reserved.push(reservation),
            Err(error) => {
                undo_all(ledger, &reserved);
                return Err(error);
            }
        }
    }
    Ok(reserved)
}

/// Best-effort rollback of a partial batch.
pub(crate) fn undo_all(ledger: &Ledger, reserved: &[Reservation]) {
    for reservation in reserved {
        if let Err(error) = ledger.undo(reservation) {
            warn!(
                position_id = %reservation.position_id,
                %error,
                "failed to undo reservation during batch rollback"
            );
        }
    }
}
