//! Simulation error types

use crate::orderbook::{OrderBookError, OrderId, Tick, UserId};
use crate::simulation::security::SecurityId;
use std::fmt;

/// Errors raised at the simulation kernel boundary.
///
/// Order validation failures (`UnknownSecurity`, `UnknownUser`,
/// `InvalidPrice`, `InvalidVolume`) reject the submit call locally and are
/// reported to the caller only; they are never broadcast. Cancel misses
/// are expected at the driver layer, which may race with removals done by
/// the matching engine, and are swallowed there.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SimulationError {
    /// No security registered under this id
    UnknownSecurity(SecurityId),

    /// No security registered under this ticker
    UnknownTicker(String),

    /// No user registered under this id
    UnknownUser(UserId),

    /// Price is not finite or not positive after rounding
    InvalidPrice {
        /// The rejected price
        price: f64,
    },

    /// Order volume must be strictly positive
    InvalidVolume {
        /// The rejected volume
        volume: u64,
    },

    /// Cancel refers to an order owned by a different user
    NotOrderOwner {
        /// The targeted order
        order_id: OrderId,
        /// The user who attempted the cancel
        user_id: UserId,
    },

    /// Cancel refers to an order that is not in the book
    OrderNotFound(OrderId),

    /// `advance_tick` was called after the final step
    SimulationFinished {
        /// The tick the simulation stopped at
        tick: Tick,
    },

    /// Error from the underlying order book
    Book(OrderBookError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::UnknownSecurity(id) => write!(f, "unknown security id: {id}"),
            SimulationError::UnknownTicker(ticker) => write!(f, "unknown ticker: {ticker}"),
            SimulationError::UnknownUser(id) => write!(f, "unknown user id: {id}"),
            SimulationError::InvalidPrice { price } => write!(f, "invalid price: {price}"),
            SimulationError::InvalidVolume { volume } => write!(f, "invalid volume: {volume}"),
            SimulationError::NotOrderOwner { order_id, user_id } => {
                write!(f, "order {order_id} is not owned by user {user_id}")
            }
            SimulationError::OrderNotFound(id) => write!(f, "order not found: {id}"),
            SimulationError::SimulationFinished { tick } => {
                write!(f, "simulation is finished (tick {tick})")
            }
            SimulationError::Book(err) => write!(f, "order book error: {err}"),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Book(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OrderBookError> for SimulationError {
    fn from(err: OrderBookError) -> Self {
        SimulationError::Book(err)
    }
}
