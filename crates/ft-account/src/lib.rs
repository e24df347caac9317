//! Account ledger and order-settlement core for the futures trading client.
//!
//! The [`ledger::Ledger`] holds one account's positions, commissions, and
//! cash flow behind a single lock and settles orders in two phases: a
//! reservation freezes capital (or a position) at submission time, and the
//! later fill confirms it at the traded price — or an undo releases it.
//! [`account::AccountService`] wires the ledger to an execution channel:
//! batching reservations per order, splitting close orders by opening day,
//! and consuming fills through per-order [`fill::FillConsumer`]s.
//!
//! # Thread safety
//!
//! Every public type here is `Send + Sync`; fills may arrive on any channel
//! thread while the caller submits, queries, or settles from another.

pub mod account;
pub mod batch;
pub mod channel;
pub mod fill;
pub mod ledger;
pub mod route;
pub mod sim;
pub mod view;

pub use account::AccountService;
pub use channel::{ExecutionChannel, FillListener, OrderSink};
pub use fill::FillConsumer;
pub use ledger::{Ledger, LedgerTotals, Reservation, ReservationKind};
pub use route::{CloseSplit, SubOrder};
