//! Order book error types

use crate::orderbook::order::{OrderId, Volume};
use std::fmt;

/// Errors that can occur within the OrderBook
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrderBookError {
    /// An order with this id is already resting in the book
    DuplicateOrderId(OrderId),

    /// Order not found in the book
    OrderNotFound(OrderId),

    /// Order volume must be strictly positive on entry
    InvalidVolume {
        /// The order id that was rejected
        order_id: OrderId,
        /// The rejected volume
        volume: Volume,
    },
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::DuplicateOrderId(id) => {
                write!(f, "duplicate order id: {id} is already in the book")
            }
            OrderBookError::OrderNotFound(id) => write!(f, "order not found: {id}"),
            OrderBookError::InvalidVolume { order_id, volume } => {
                write!(
                    f,
                    "invalid volume: order {order_id} submitted with volume {volume}"
                )
            }
        }
    }
}

impl std::error::Error for OrderBookError {}
