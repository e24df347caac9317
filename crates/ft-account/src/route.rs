//! Settlement routing for close orders.
//!
//! A close order's confirmed reservations are partitioned by the opening day
//! of the frozen positions: lots opened on the current trading day go to a
//! `CloseToday` sub-order, everything else to a `CloseYesterday` sub-order.
//! Each non-empty partition becomes one sub-order carrying the original
//! order's terms and only its partition's quantity, submitted independently
//! with its own fill consumer.

use ft_core::error::{AccountError, Result};
use ft_core::types::{OffsetFlag, OrderRequest};

use crate::ledger::{Ledger, Reservation};

/// One sub-order and the reservations it settles.
#[derive(Debug, Clone)]
pub struct SubOrder {
    pub order: OrderRequest,
    pub reservations: Vec<Reservation>,
}

/// The today/yesterday partition of a close order. An empty partition
/// produces no sub-order.
#[derive(Debug, Clone, Default)]
pub struct CloseSplit {
    pub today: Option<SubOrder>,
    pub yesterday: Option<SubOrder>,
}

impl CloseSplit {
    /// Sub-orders in submission order (today first).
    pub fn into_sub_orders(self) -> Vec<SubOrder> {
        self.today.into_iter().chain(self.yesterday).collect()
    }
}

/// Partition a close batch by the frozen positions' opening day.
///
/// Every reservation must still resolve to a ledger position; a stale id
/// fails the whole split so the caller can roll the batch back.
pub fn split_close(
    ledger: &Ledger,
    order: &OrderRequest,
    reservations: Vec<Reservation>,
) -> Result<CloseSplit> {
    let trading_day = ledger.store().trading_day();
    let mut today = Vec::new();
    let mut yesterday = Vec::new();
    for reservation in reservations {
        let position = ledger
            .position(&reservation.position_id)
            .ok_or_else(|| AccountError::PositionNotFound(reservation.position_id.clone()))?;
        if position.open_trading_day == trading_day {
            today.push(reservation);
        } else {
            yesterday.push(reservation);
        }
    }
    Ok(CloseSplit {
        today: sub_order(order, 1, OffsetFlag::CloseToday, today),
        yesterday: sub_order(order, 2, OffsetFlag::CloseYesterday, yesterday),
    })
}

fn sub_order(
    order: &OrderRequest,
    seq: u32,
    offset: OffsetFlag,
    reservations: Vec<Reservation>,
) -> Option<SubOrder> {
    if reservations.is_empty() {
        return None;
    }
    let order = OrderRequest {
        id: format!("{}/{}", order.id, seq),
        offset,
        quantity: reservations.len() as u32,
        ..order.clone()
    };
    Some(SubOrder {
        order,
        reservations,
    })
}
