//! Transaction records emitted by the matching engine.

use crate::orderbook::order::{OrderId, Price, Tick, UserId, Volume};
use crate::simulation::security::SecurityId;
use serde::{Deserialize, Serialize};

/// A single fill between a resting bid and a resting ask.
///
/// Transactions are immutable once emitted. The price is always the
/// resting ask's price and the volume is the smaller of the two orders'
/// remaining volumes at match time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Tick on which the fill happened.
    pub tick: Tick,
    /// Security the fill belongs to.
    pub security_id: SecurityId,
    /// Execution price in minor units (the maker's quoted price).
    pub price: Price,
    /// Filled volume.
    pub volume: Volume,
    /// Owner of the bid side of the fill.
    pub buyer_id: UserId,
    /// Owner of the ask side of the fill.
    pub seller_id: UserId,
    /// The resting (maker) order: the ask under this design's convention.
    pub maker_order_id: OrderId,
    /// The crossing (taker) order: the bid.
    pub taker_order_id: OrderId,
}
