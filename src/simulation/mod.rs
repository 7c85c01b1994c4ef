//! Simulation layer: portfolio ledger, kernel, stochastic order-flow
//! drivers, and scenario control.

mod driver;
mod error;
mod kernel;
mod portfolio;
mod scenario;
pub mod security;

pub use driver::{BiotechFlow, DemoFlow, OrderFlow, biotech_volatility};
pub use error::SimulationError;
pub use kernel::{SimulationKernel, SimulationPhase, SubmittedOrders, TickDelta};
pub use portfolio::PortfolioLedger;
pub use scenario::{
    NEGATIVE_FDA_BLURBS, NEGATIVE_PRELIMINARY_BLURBS, News, POSITIVE_FDA_BLURBS,
    POSITIVE_PRELIMINARY_BLURBS, ScenarioConfig, ScenarioController, ScenarioKind, ScenarioStep,
};
pub use security::{Security, SecurityId, SecurityKind, User};
