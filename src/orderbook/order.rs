//! Core order types and the composite priority key used by both book sides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-decimal price in minor units.
///
/// Prices are scaled by `10^decimal_places` of the owning security, so a
/// security with two decimal places stores `100.25` as `10025`. Integer
/// prices keep the priority keys totally ordered and the matching engine
/// bit-exact across runs.
pub type Price = u64;

/// Order volume in units. Strictly positive on entry; partial fills
/// decrement it and a zero volume removes the order from the book.
pub type Volume = u64;

/// Globally unique order identifier, allocated monotonically by the
/// simulation kernel and never reused, including across resets.
pub type OrderId = u64;

/// Dense user identifier assigned at registration.
pub type UserId = u64;

/// Simulation tick index. Orders are timestamped with the tick on which
/// they were submitted.
pub type Tick = u64;

/// The side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy side; higher prices have priority.
    Bid,
    /// Sell side; lower prices have priority.
    Ask,
}

impl Side {
    /// The side this one trades against.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// A plain snapshot of a resting limit order.
///
/// This is the value handed out by peek/iteration APIs and carried in tick
/// deltas; the live in-book representation is [`RestingOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
    /// Globally unique order id.
    pub order_id: OrderId,
    /// Book side.
    pub side: Side,
    /// Fixed-decimal price in minor units.
    pub price: Price,
    /// Remaining volume.
    pub volume: Volume,
    /// Tick on which the order was submitted.
    pub timestamp: Tick,
    /// Owner of the order.
    pub user_id: UserId,
}

/// Composite priority key: price, then submission tick, then order id.
///
/// Bids store the one's complement of the price so that *both* sides order
/// ascending: the front of either skip map is the top of book. Lower key
/// means higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BookKey {
    sort_price: Price,
    timestamp: Tick,
    order_id: OrderId,
}

impl BookKey {
    /// Build the priority key for an order on the given side.
    pub fn new(side: Side, price: Price, timestamp: Tick, order_id: OrderId) -> Self {
        let sort_price = match side {
            Side::Bid => !price,
            Side::Ask => price,
        };
        Self {
            sort_price,
            timestamp,
            order_id,
        }
    }

    /// The real price encoded in this key.
    pub fn price(&self, side: Side) -> Price {
        match side {
            Side::Bid => !self.sort_price,
            Side::Ask => self.sort_price,
        }
    }

    /// Submission tick encoded in this key.
    pub fn timestamp(&self) -> Tick {
        self.timestamp
    }

    /// Order id encoded in this key.
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }
}

/// A live order resting in the book.
///
/// The volume is atomic so the matching engine can decrement the top of
/// book in place without touching the priority key or re-inserting the
/// entry, mirroring how partial fills mutate shared price-level state.
#[derive(Debug)]
pub struct RestingOrder {
    /// Globally unique order id.
    pub order_id: OrderId,
    /// Book side.
    pub side: Side,
    /// Fixed-decimal price in minor units. Immutable for the order's life.
    pub price: Price,
    /// Remaining volume; decremented by partial fills.
    volume: AtomicU64,
    /// Tick on which the order was submitted.
    pub timestamp: Tick,
    /// Owner of the order.
    pub user_id: UserId,
}

impl RestingOrder {
    /// Create a resting order from its submission parameters.
    pub fn new(
        order_id: OrderId,
        side: Side,
        price: Price,
        volume: Volume,
        timestamp: Tick,
        user_id: UserId,
    ) -> Self {
        Self {
            order_id,
            side,
            price,
            volume: AtomicU64::new(volume),
            timestamp,
            user_id,
        }
    }

    /// Remaining volume.
    pub fn volume(&self) -> Volume {
        self.volume.load(Ordering::Relaxed)
    }

    /// Overwrite the remaining volume in place. The priority key is not
    /// affected; only the matching engine uses this, and only on the
    /// current top of book.
    pub fn set_volume(&self, volume: Volume) {
        self.volume.store(volume, Ordering::Relaxed);
    }

    /// The priority key this order is stored under.
    pub fn key(&self) -> BookKey {
        BookKey::new(self.side, self.price, self.timestamp, self.order_id)
    }

    /// A plain snapshot of the current state.
    pub fn snapshot(&self) -> LimitOrder {
        LimitOrder {
            order_id: self.order_id,
            side: self.side,
            price: self.price,
            volume: self.volume(),
            timestamp: self.timestamp,
            user_id: self.user_id,
        }
    }
}
