//! Contains the core matching engine logic for the order book.
//!
//! Matching runs once per tick, after the whole batch of submissions has
//! been inserted, and repeatedly consumes crossing top-of-book pairs until
//! the book is uncrossed. Because both orders of a crossing pair are
//! resting at match time, the engine always quotes the ask price.

use crate::orderbook::OrderBook;
use crate::orderbook::order::{Side, Tick};
use crate::orderbook::trade::Transaction;
use tracing::trace;

impl OrderBook {
    /// Resolve every crossing at the top of the book, emitting one
    /// [`Transaction`] per fill.
    ///
    /// The loop stops as soon as either side is empty or
    /// `top_bid.price < top_ask.price`. Each iteration fills
    /// `min(bid.volume, ask.volume)` at the resting ask's price; a side
    /// whose remaining volume reaches zero is popped, the other side's
    /// volume is decremented in place so its priority key never changes.
    ///
    /// # Determinism
    /// For an identical initial book and identical insertion order, the
    /// returned transaction sequence is bit-exact.
    pub fn process_transactions(&self, tick: Tick) -> Vec<Transaction> {
        let mut transactions = Vec::new();

        loop {
            let (bid, ask) = match (self.top_bid(), self.top_ask()) {
                (Some(bid), Some(ask)) => (bid, ask),
                _ => break,
            };
            if bid.price < ask.price {
                break;
            }

            let volume = bid.volume.min(ask.volume);
            transactions.push(Transaction {
                tick,
                security_id: self.security_id(),
                price: ask.price,
                volume,
                buyer_id: bid.user_id,
                seller_id: ask.user_id,
                maker_order_id: ask.order_id,
                taker_order_id: bid.order_id,
            });
            trace!(
                "{}: matched {} @ {} (bid {} x ask {})",
                self.ticker(),
                volume,
                ask.price,
                bid.order_id,
                ask.order_id
            );

            if bid.volume == volume {
                self.pop_top(Side::Bid);
            } else {
                self.set_top_volume(Side::Bid, bid.volume - volume);
            }
            if ask.volume == volume {
                self.pop_top(Side::Ask);
            } else {
                self.set_top_volume(Side::Ask, ask.volume - volume);
            }
        }

        transactions
    }
}
