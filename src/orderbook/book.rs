//! Core OrderBook implementation: dual priority sides plus an id index.

use super::error::OrderBookError;
use super::order::{BookKey, LimitOrder, OrderId, Price, RestingOrder, Side, UserId, Volume};
use super::snapshot::OrderBookSnapshot;
use crate::simulation::security::SecurityId;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// A price-time-id priority order book for a single security.
///
/// Both sides are ordered skip maps keyed by [`BookKey`]; bids store the
/// complemented price so the front entry of either map is the top of book.
/// An order-id index makes cancellation by external id O(log n), and a
/// per-user order list supports the scripted agent's partial pruning.
///
/// No matching happens on insert. The book is left crossed until
/// [`OrderBook::process_transactions`] resolves it after the tick's batch
/// of submissions.
pub struct OrderBook {
    /// Dense security index this book belongs to
    security_id: SecurityId,

    /// The ticker symbol for this order book
    ticker: String,

    /// Bid side, keyed by (complemented price, timestamp, order id) so the
    /// highest price iterates first
    bids: SkipMap<BookKey, Arc<RestingOrder>>,

    /// Ask side, keyed by (price, timestamp, order id) so the lowest price
    /// iterates first
    asks: SkipMap<BookKey, Arc<RestingOrder>>,

    /// Map from order id to (side, priority key) for O(log n) cancellation
    order_locations: DashMap<OrderId, (Side, BookKey)>,

    /// Map from user id to that user's live order ids, maintained by
    /// insert, cancel, and the matching engine
    user_orders: DashMap<UserId, Vec<OrderId>>,

    /// Live order counts per side. `SkipMap::len` walks the whole map, so
    /// the counts are tracked here instead.
    bid_count: AtomicUsize,
    ask_count: AtomicUsize,
}

impl OrderBook {
    /// Create an empty order book for the given security.
    pub fn new(security_id: SecurityId, ticker: &str) -> Self {
        Self {
            security_id,
            ticker: ticker.to_string(),
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            order_locations: DashMap::new(),
            user_orders: DashMap::new(),
            bid_count: AtomicUsize::new(0),
            ask_count: AtomicUsize::new(0),
        }
    }

    /// The ticker symbol of this order book.
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// The dense security index of this order book.
    pub fn security_id(&self) -> SecurityId {
        self.security_id
    }

    /// Insert a limit order into its side and the id index.
    ///
    /// Preconditions: the order id must not already be present and the
    /// volume must be strictly positive. No matching occurs here.
    ///
    /// # Errors
    /// [`OrderBookError::DuplicateOrderId`] or [`OrderBookError::InvalidVolume`].
    pub fn insert(&self, order: LimitOrder) -> Result<(), OrderBookError> {
        if order.volume == 0 {
            return Err(OrderBookError::InvalidVolume {
                order_id: order.order_id,
                volume: order.volume,
            });
        }
        if self.order_locations.contains_key(&order.order_id) {
            return Err(OrderBookError::DuplicateOrderId(order.order_id));
        }

        let resting = RestingOrder::new(
            order.order_id,
            order.side,
            order.price,
            order.volume,
            order.timestamp,
            order.user_id,
        );
        let key = resting.key();

        self.side_map(order.side).insert(key, Arc::new(resting));
        self.order_locations.insert(order.order_id, (order.side, key));
        self.user_orders
            .entry(order.user_id)
            .or_default()
            .push(order.order_id);
        self.side_counter(order.side).fetch_add(1, Ordering::Relaxed);

        trace!(
            "{}: inserted {} order {} at {} x{}",
            self.ticker, order.side, order.order_id, order.price, order.volume
        );
        Ok(())
    }

    /// Cancel an order by id, returning the removed order.
    ///
    /// Returns `None` when the id is unknown, which makes a second cancel
    /// for the same id a no-op at this layer.
    pub fn cancel(&self, order_id: OrderId) -> Option<LimitOrder> {
        let (_, (side, key)) = self.order_locations.remove(&order_id)?;
        let entry = match self.side_map(side).remove(&key) {
            Some(entry) => entry,
            // The index and the side disagree: the book is corrupted and
            // continuing would silently lose orders.
            None => panic!(
                "order book corrupted: {} order {} indexed at {:?} but absent from the {} side",
                self.ticker, order_id, key, side
            ),
        };
        let snapshot = entry.value().snapshot();
        self.untrack_user_order(snapshot.user_id, order_id);
        self.side_counter(side).fetch_sub(1, Ordering::Relaxed);
        trace!("{}: cancelled order {}", self.ticker, order_id);
        Some(snapshot)
    }

    /// Look up a live order by id.
    pub fn get(&self, order_id: OrderId) -> Option<LimitOrder> {
        let (side, key) = *self.order_locations.get(&order_id)?.value();
        self.side_map(side)
            .get(&key)
            .map(|entry| entry.value().snapshot())
    }

    /// Peek the highest-priority bid, if any.
    pub fn top_bid(&self) -> Option<LimitOrder> {
        self.bids.front().map(|entry| entry.value().snapshot())
    }

    /// Peek the highest-priority ask, if any.
    pub fn top_ask(&self) -> Option<LimitOrder> {
        self.asks.front().map(|entry| entry.value().snapshot())
    }

    /// Remove and return the top of the given side.
    ///
    /// Used by the matching engine when a fill drives the remaining volume
    /// to zero.
    pub fn pop_top(&self, side: Side) -> Option<LimitOrder> {
        let entry = self.side_map(side).pop_front()?;
        let snapshot = entry.value().snapshot();
        self.order_locations.remove(&snapshot.order_id);
        self.untrack_user_order(snapshot.user_id, snapshot.order_id);
        self.side_counter(side).fetch_sub(1, Ordering::Relaxed);
        Some(snapshot)
    }

    /// Overwrite the remaining volume of the current top of the given side
    /// in place. The priority key is untouched.
    pub fn set_top_volume(&self, side: Side, volume: Volume) {
        if let Some(entry) = self.side_map(side).front() {
            entry.value().set_volume(volume);
        }
    }

    /// Iterate a side's live orders in priority order.
    pub fn iter_side(&self, side: Side) -> impl Iterator<Item = LimitOrder> + '_ {
        self.side_map(side)
            .iter()
            .map(|entry| entry.value().snapshot())
    }

    /// Live order ids owned by a user, in insertion order.
    pub fn orders_for_user(&self, user_id: UserId) -> Vec<OrderId> {
        self.user_orders
            .get(&user_id)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Number of live bid orders.
    pub fn bid_count(&self) -> usize {
        self.bid_count.load(Ordering::Relaxed)
    }

    /// Number of live ask orders.
    pub fn ask_count(&self) -> usize {
        self.ask_count.load(Ordering::Relaxed)
    }

    /// Whether both sides are empty.
    pub fn is_empty(&self) -> bool {
        self.bid_count() == 0 && self.ask_count() == 0
    }

    /// Cumulative volume per distinct price level, in priority order.
    ///
    /// Returns `(bids, asks)` where each entry is `(price, cumulative
    /// volume at this level and every better one)`.
    pub fn cumulative_depth(&self) -> (Vec<(Price, Volume)>, Vec<(Price, Volume)>) {
        (
            Self::depth_of(self.iter_side(Side::Bid)),
            Self::depth_of(self.iter_side(Side::Ask)),
        )
    }

    fn depth_of(orders: impl Iterator<Item = LimitOrder>) -> Vec<(Price, Volume)> {
        let mut depth: Vec<(Price, Volume)> = Vec::new();
        let mut cumulative = 0u64;
        for order in orders {
            cumulative += order.volume;
            match depth.last_mut() {
                Some((price, volume)) if *price == order.price => *volume = cumulative,
                _ => depth.push((order.price, cumulative)),
            }
        }
        depth
    }

    /// A point-in-time snapshot of both sides in priority order.
    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            ticker: self.ticker.clone(),
            bids: self.iter_side(Side::Bid).collect(),
            asks: self.iter_side(Side::Ask).collect(),
        }
    }

    /// Drop every resting order. Used by simulation reset; user and
    /// security registrations live outside the book and are unaffected.
    pub fn clear(&self) {
        while self.bids.pop_front().is_some() {}
        while self.asks.pop_front().is_some() {}
        self.order_locations.clear();
        self.user_orders.clear();
        self.bid_count.store(0, Ordering::Relaxed);
        self.ask_count.store(0, Ordering::Relaxed);
    }

    /// Verify the index ↔ side invariant: every indexed id maps to exactly
    /// one entry on its side with a matching key. Test support; the cost is
    /// O(n log n).
    pub fn check_integrity(&self) -> bool {
        let indexed = self.order_locations.len();
        let live = self.bid_count() + self.ask_count();
        if indexed != live {
            return false;
        }
        self.order_locations.iter().all(|item| {
            let (side, key) = *item.value();
            self.side_map(side)
                .get(&key)
                .is_some_and(|entry| entry.value().order_id == *item.key())
        })
    }

    fn side_map(&self, side: Side) -> &SkipMap<BookKey, Arc<RestingOrder>> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_counter(&self, side: Side) -> &AtomicUsize {
        match side {
            Side::Bid => &self.bid_count,
            Side::Ask => &self.ask_count,
        }
    }

    fn untrack_user_order(&self, user_id: UserId, order_id: OrderId) {
        if let Some(mut ids) = self.user_orders.get_mut(&user_id) {
            ids.retain(|id| *id != order_id);
        }
    }
}
