//! Order book snapshot for market data

use crate::orderbook::order::{LimitOrder, Price};
use serde::{Deserialize, Serialize};

/// A snapshot of the order book state at a specific point in time.
///
/// Both sides are captured in priority order, so `bids[0]` and `asks[0]`
/// are the top of book. Snapshots are what tick deltas and the load
/// message carry; they are plain values detached from the live book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// The ticker symbol for this order book
    pub ticker: String,

    /// Bid orders in priority order
    pub bids: Vec<LimitOrder>,

    /// Ask orders in priority order
    pub asks: Vec<LimitOrder>,
}

impl OrderBookSnapshot {
    /// Get the best bid price, if any
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|order| order.price)
    }

    /// Get the best ask price, if any
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|order| order.price)
    }

    /// Get the mid price (average of best bid and best ask)
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid as f64 + ask as f64) / 2.0),
            _ => None,
        }
    }

    /// Calculate the total volume on the bid side
    pub fn total_bid_volume(&self) -> u64 {
        self.bids.iter().map(|order| order.volume).sum()
    }

    /// Calculate the total volume on the ask side
    pub fn total_ask_volume(&self) -> u64 {
        self.asks.iter().map(|order| order.volume).sum()
    }
}
