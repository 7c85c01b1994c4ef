//! # Market-Simulation Server Core
//!
//! A central limit order book (CLOB) matching engine coupled with a driven
//! stochastic order-flow simulator and a tick-synchronous fan-out server.
//! The crate produces a realistic, time-varying stream of limit orders,
//! cancellations, and resulting transactions, and broadcasts per-tick
//! deltas to subscribed WebSocket clients.
//!
//! ## Architecture
//!
//! - **[`orderbook`]** — one price-time-id priority book per security.
//!   Both sides live in ordered skip maps keyed by
//!   `(price-or-complemented-price, timestamp, order_id)`, with an order-id
//!   index for O(log n) cancellation and per-user order tracking. Matching
//!   runs after each tick's batch of inserts and deterministically consumes
//!   crossing top-of-book pairs until the book is uncrossed, always quoting
//!   the resting ask's price.
//!
//! - **[`simulation`]** — the kernel owns securities, users, books, and
//!   portfolios, hands out monotonic order ids, and turns each
//!   `advance_tick` into a delta record (submissions, cancellations,
//!   partial/full fills, book snapshots, transactions, portfolios).
//!   Order flow comes from regime-switched stochastic drivers that prune a
//!   scripted market-maker's resting orders and submit fresh batches from
//!   a driven Euler step around the top of book, mean-reverting to a
//!   scheduled base path. The scenario controller samples the narrative
//!   (base path and scheduled news) at each reset and glues driver and kernel
//!   together run after run.
//!
//! - **[`server`]** — a paused/running broadcast loop steps the scenario on
//!   a fixed wall-clock period and fans per-user deltas out to subscribers.
//!   Clients connect over WebSocket, receive a full state snapshot before
//!   any delta, and stay subscribed until their connection drops. Admin
//!   `start`/`pause` commands arrive on stdin.
//!
//! ## Determinism
//!
//! Every stochastic component draws from a seedable `ChaCha8Rng`, and all
//! book state is integer-keyed, so two runs with the same seed produce
//! bit-identical order flow, fills, and final midpoints.
//!
//! ## Example
//!
//! ```
//! use marketsim_rs::prelude::*;
//!
//! let mut controller =
//!     ScenarioController::new(ScenarioKind::Biotech, ScenarioConfig::default(), 42);
//! let step = controller.step().expect("first tick");
//! assert_eq!(step.delta.tick, 0);
//! ```

pub mod orderbook;
pub mod prelude;
pub mod server;
pub mod simulation;
pub mod utils;

pub use orderbook::{
    LimitOrder, OrderBook, OrderBookError, OrderBookSnapshot, OrderId, Price, Side, Tick,
    Transaction, UserId, Volume,
};
pub use simulation::{
    ScenarioConfig, ScenarioController, ScenarioKind, SimulationError, SimulationKernel,
    SimulationPhase, TickDelta,
};
