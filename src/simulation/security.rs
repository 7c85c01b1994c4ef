//! Security definitions: tradeable instruments and the accounting currency.

use serde::{Deserialize, Serialize};

/// Dense index into the kernel's per-security arrays.
pub type SecurityId = usize;

/// What kind of instrument a security is.
///
/// The currency is the unit of portfolio accounting but shares the
/// order-book machinery with every other security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityKind {
    /// The accounting currency itself.
    Currency,
    /// A stock denominated in the named currency.
    Stock {
        /// Ticker of the denominating currency.
        currency: String,
    },
}

/// A registered security.
///
/// The `net_limit`, `gross_limit` and `max_trade_volume` fields are
/// advisory risk parameters surfaced to clients in `security_info`; the
/// kernel does not enforce them against the scripted agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    /// Dense index assigned at registration.
    pub security_id: SecurityId,
    /// Ticker symbol, unique within a kernel.
    pub ticker: String,
    /// Currency or stock.
    pub kind: SecurityKind,
    /// Number of decimal places prices are rounded to.
    pub decimal_places: u32,
    /// Advisory net position limit.
    pub net_limit: f64,
    /// Advisory gross position limit.
    pub gross_limit: f64,
    /// Advisory single-trade volume cap.
    pub max_trade_volume: u64,
}

impl Security {
    /// An accounting currency with the default advisory limits.
    pub fn currency(ticker: &str) -> Self {
        Self {
            security_id: 0,
            ticker: ticker.to_string(),
            kind: SecurityKind::Currency,
            decimal_places: 2,
            net_limit: 100.0,
            gross_limit: 100.0,
            max_trade_volume: 20,
        }
    }

    /// A stock denominated in `currency`, with the default advisory limits.
    pub fn stock(ticker: &str, currency: &str) -> Self {
        Self {
            security_id: 0,
            ticker: ticker.to_string(),
            kind: SecurityKind::Stock {
                currency: currency.to_string(),
            },
            decimal_places: 2,
            net_limit: 100.0,
            gross_limit: 100.0,
            max_trade_volume: 20,
        }
    }

    /// Whether this security is the accounting currency.
    pub fn is_currency(&self) -> bool {
        matches!(self.kind, SecurityKind::Currency)
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Dense id assigned at registration, monotonic.
    pub user_id: u64,
    /// Username supplied at registration.
    pub username: String,
}
