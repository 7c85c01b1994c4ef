//! Portfolio ledger: per-user holdings and reserved balances.

use crate::orderbook::Transaction;
use crate::simulation::security::SecurityId;

/// A `(user, security) → quantity` matrix plus reserved balances for open
/// orders.
///
/// Quantities may go negative to represent short positions. Both legs of
/// a transaction are applied together, so the sum over users of any
/// security's column is conserved: starting from all-zero portfolios it
/// stays exactly zero after every tick.
#[derive(Debug, Default)]
pub struct PortfolioLedger {
    /// Held quantity per user per security. `holdings[user][security]`.
    holdings: Vec<Vec<f64>>,
    /// Quantity committed to open orders per user per security: currency
    /// for resting bids, stock for resting asks.
    reserved: Vec<Vec<f64>>,
    security_count: usize,
}

impl PortfolioLedger {
    /// An empty ledger with no users or securities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row for a newly registered user.
    pub fn add_user(&mut self) {
        self.holdings.push(vec![0.0; self.security_count]);
        self.reserved.push(vec![0.0; self.security_count]);
    }

    /// Add a column for a newly registered security.
    pub fn add_security(&mut self) {
        self.security_count += 1;
        for row in &mut self.holdings {
            row.push(0.0);
        }
        for row in &mut self.reserved {
            row.push(0.0);
        }
    }

    /// Apply both legs of a fill atomically: the buyer gains stock and
    /// pays `price × volume` of the currency, the seller the reverse.
    ///
    /// `price` is the unscaled execution price.
    pub fn apply_transaction(
        &mut self,
        stock: SecurityId,
        currency: SecurityId,
        transaction: &Transaction,
        price: f64,
    ) {
        let volume = transaction.volume as f64;
        let notional = price * volume;
        let buyer = transaction.buyer_id as usize;
        let seller = transaction.seller_id as usize;

        self.holdings[buyer][stock] += volume;
        self.holdings[seller][stock] -= volume;
        self.holdings[buyer][currency] -= notional;
        self.holdings[seller][currency] += notional;
    }

    /// Reserve `amount` of `security` for an open order.
    pub fn reserve(&mut self, user: usize, security: SecurityId, amount: f64) {
        self.reserved[user][security] += amount;
    }

    /// Release `amount` of a previous reservation after a cancel or fill.
    pub fn release(&mut self, user: usize, security: SecurityId, amount: f64) {
        self.reserved[user][security] -= amount;
    }

    /// A user's held quantities, indexed by security id.
    pub fn holdings_of(&self, user: usize) -> &[f64] {
        &self.holdings[user]
    }

    /// A user's reserved quantities, indexed by security id.
    pub fn reserved_of(&self, user: usize) -> &[f64] {
        &self.reserved[user]
    }

    /// The full holdings matrix, user-major.
    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.holdings
    }

    /// Sum of a security's column over all users. Zero-sum conservation
    /// means this stays at zero when initial portfolios are zero.
    pub fn security_total(&self, security: SecurityId) -> f64 {
        self.holdings.iter().map(|row| row[security]).sum()
    }

    /// Zero every holding and reservation, keeping the rows and columns.
    pub fn reset(&mut self) {
        for row in &mut self.holdings {
            row.fill(0.0);
        }
        for row in &mut self.reserved {
            row.fill(0.0);
        }
    }
}
