//! Prelude module that re-exports commonly used types and traits.
//!
//! ```rust
//! use marketsim_rs::prelude::*;
//! ```

// Order book types
pub use crate::orderbook::{
    LimitOrder, OrderBook, OrderBookError, OrderBookSnapshot, OrderId, Price, Side, Tick,
    Transaction, UserId, Volume,
};

// Simulation types
pub use crate::simulation::{
    BiotechFlow, DemoFlow, News, OrderFlow, PortfolioLedger, ScenarioConfig, ScenarioController,
    ScenarioKind, ScenarioStep, Security, SecurityId, SecurityKind, SimulationError,
    SimulationKernel, SimulationPhase, SubmittedOrders, TickDelta, User, biotech_volatility,
};

// Server types
pub use crate::server::{
    AdminCommand, BroadcastLoop, ChannelSubscriber, MarketUpdate, Message, ServerConfig,
    ServerError, ServerState, SimulationLoad, SimulationState, Subscriber, SubscriberTable,
    admin_loop, handle_connection,
};

// Utility functions
pub use crate::utils::{scale_price, unscale_price};
