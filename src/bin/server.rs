//! The market-simulation WebSocket server binary.
//!
//! Binds a TCP listener, accepts WebSocket subscribers, reads admin
//! commands (`start`, `pause`) from stdin, and runs the broadcast loop on
//! the main task until stdin closes.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use marketsim_rs::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScenarioArg {
    /// Two-event biotech narrative with scheduled news.
    Biotech,
    /// Demonstration flow with a single mid-run target step.
    Demo,
}

impl From<ScenarioArg> for ScenarioKind {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Biotech => ScenarioKind::Biotech,
            ScenarioArg::Demo => ScenarioKind::Demo,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "marketsim-server", about = "CLOB market-simulation server")]
struct Args {
    /// Address the WebSocket listener binds to.
    #[arg(long, env = "MARKETSIM_LISTEN", default_value = "127.0.0.1:8765")]
    listen: String,

    /// Wall-clock milliseconds per simulation tick.
    #[arg(long, default_value_t = 250)]
    tick_period_ms: u64,

    /// Seed for the scenario's random source; omit to seed from entropy.
    #[arg(long)]
    seed: Option<u64>,

    /// Which order-flow scenario to run.
    #[arg(long, value_enum, default_value_t = ScenarioArg::Biotech)]
    scenario: ScenarioArg,

    /// Total simulation steps per run.
    #[arg(long, default_value_t = 1_000)]
    total_steps: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let scenario = ScenarioConfig {
            total_steps: self.total_steps,
            ..ScenarioConfig::default()
        };
        ServerConfig {
            listen_addr: self.listen,
            tick_period: Duration::from_millis(self.tick_period_ms),
            seed: self.seed,
            kind: self.scenario.into(),
            scenario,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    let seed = config.seed.unwrap_or_else(rand::random);
    info!("scenario seed: {seed}");

    let controller = Arc::new(Mutex::new(ScenarioController::new(
        config.kind,
        config.scenario.clone(),
        seed,
    )));
    let subscribers: SubscriberTable = Arc::new(DashMap::new());
    let state = Arc::new(AtomicCell::new(SimulationState::Paused));
    let (admin_tx, admin_rx) = unbounded_channel();

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.listen_addr.clone(),
            source,
        })
        .context("server startup failed")?;
    info!("listening on ws://{}", config.listen_addr);
    info!("type 'start' to run the simulation, 'pause' to pause it");

    tokio::spawn(admin_loop(admin_tx));

    let accept_state = ServerState {
        controller: controller.clone(),
        subscribers: subscribers.clone(),
        state: state.clone(),
    };
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let session = accept_state.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, session).await {
                            warn!("connection from {peer} ended with error: {err}");
                        }
                    });
                }
                Err(err) => warn!("accept failed: {err}"),
            }
        }
    });

    BroadcastLoop::new(controller, subscribers, state, config.tick_period, admin_rx)
        .run()
        .await;
    Ok(())
}
