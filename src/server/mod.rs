//! Server layer: the subscriber wire protocol, the paused/running
//! broadcast loop, and per-connection WebSocket sessions.

mod broadcast;
mod config;
mod error;
mod messages;
mod session;
mod subscriber;

pub use broadcast::{AdminCommand, BroadcastLoop, admin_loop};
pub use config::ServerConfig;
pub use error::ServerError;
pub use messages::{
    MarketUpdate, Message, OrderBookView, OrderRecord, SecurityInfo, SimulationLoad,
    SimulationState, SubmittedOrdersView, TransactedOrdersView, TransactionRecord,
};
pub use session::{ServerState, handle_connection};
pub use subscriber::{ChannelSubscriber, Subscriber, SubscriberTable};
