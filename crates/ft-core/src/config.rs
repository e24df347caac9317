//! Configuration parsing for the account core.
//!
//! A single JSON file seeds one account and its instrument rate tables. The
//! in-memory store and service wiring both read this shape.
//!
//! # Example config
//!
//! ```json
//! {
//!   "account": { "user": "hb", "balance": 100000.0 },
//!   "trading_day": "20260826",
//!   "instruments": [{
//!     "symbol": "C2109",
//!     "exchange": "DCE",
//!     "multiplier": 10,
//!     "price": 3000.0,
//!     "margin": [{ "mode": "by_amount", "ratio": 0.1 }],
//!     "commission": [{ "mode": "by_volume", "ratio": 5.0 }]
//!   }]
//! }
//! ```

use serde::Deserialize;
use tracing::info;

use crate::types::enums::{Direction, OffsetFlag, RatioMode};

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// The account this process manages.
    pub account: AccountConfig,

    /// Trading day to seed the calendar with (optional — a live provider
    /// supplies its own).
    pub trading_day: Option<String>,

    /// Instrument definitions, one per tradable symbol.
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,

    /// Optional log directory for daily-rotated files.
    pub log_path: Option<String>,
}

/// Account identity and opening balance.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub user: String,
    pub balance: f64,
}

/// Rate tables and contract terms for one symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub exchange: Option<String>,
    pub multiplier: i64,
    /// Seed reference price.
    pub price: Option<f64>,
    /// Margin ratio entries. An entry without direction/offset applies to all.
    #[serde(default)]
    pub margin: Vec<RatioConfig>,
    /// Commission ratio entries, same matching rules as margin.
    #[serde(default)]
    pub commission: Vec<RatioConfig>,
}

/// One margin or commission ratio entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RatioConfig {
    /// Restrict to one order direction; `None` matches both.
    pub direction: Option<Direction>,
    /// Restrict to one offset; `None` matches both open and close.
    pub offset: Option<OffsetFlag>,
    pub mode: RatioMode,
    pub ratio: f64,
}

impl RatioConfig {
    /// Whether this entry applies to the given direction and offset.
    pub fn matches(&self, direction: Direction, offset: OffsetFlag) -> bool {
        self.direction.is_none_or(|d| d == direction) && self.offset.is_none_or(|o| o == offset)
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    info!(
        user = %config.account.user,
        instruments = config.instruments.len(),
        "loaded config from {}",
        path.display()
    );
    Ok(config)
}
