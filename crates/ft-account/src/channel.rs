//! Listener and channel interfaces between the core, the caller, and the
//! execution venue.
//!
//! The caller hands an [`OrderSink`] to `place_order` and receives one
//! `on_trade` callback per confirmed lot and `on_error` callbacks for every
//! failure. The venue side is an [`ExecutionChannel`] that accepts a
//! submitted order together with a [`FillListener`] and later delivers fills
//! and errors on its own threads.

use std::sync::Arc;

use tracing::warn;

use ft_core::error::AccountError;
use ft_core::types::{OrderRequest, Trade};

/// The caller's result sink for one order.
///
/// Both methods are fallible so a broken downstream (closed channel, dead
/// socket) can be reported back; the core never lets a sink failure escape —
/// see [`deliver_error`].
pub trait OrderSink: Send + Sync {
    /// A lot (or group of lots in one fill) was confirmed.
    fn on_trade(&self, trade: &Trade) -> anyhow::Result<()>;

    /// A settlement error occurred. May be called multiple times per order.
    fn on_error(&self, error: &AccountError) -> anyhow::Result<()>;
}

/// Receives asynchronous fill/error events for one submitted (sub-)order.
pub trait FillListener: Send + Sync {
    /// A fill (possibly partial) arrived from the venue.
    fn on_fill(&self, trade: &Trade);

    /// The venue reported a terminal error for the order.
    fn on_error(&self, error: AccountError);
}

/// The external order-execution channel.
///
/// `submit` must not block on venue I/O completion; outcomes are delivered to
/// the listener. Timeouts and venue retries are the channel's concern, not
/// the core's.
pub trait ExecutionChannel: Send + Sync {
    fn submit(&self, order: &OrderRequest, listener: Arc<dyn FillListener>);
}

/// Best-effort error delivery to the caller's sink.
///
/// If the first attempt fails, one retry is made carrying the delivery
/// failure itself; if that also fails the error is dropped with a log line.
/// Nothing ever propagates out of this function.
pub(crate) fn deliver_error(sink: &dyn OrderSink, error: &AccountError) {
    if let Err(first) = sink.on_error(error) {
        let retry = AccountError::SinkFailure(first.to_string());
        if let Err(second) = sink.on_error(&retry) {
            warn!(%error, %second, "dropping undeliverable order error");
        }
    }
}
