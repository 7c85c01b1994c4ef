//! The paused/running tick loop and admin command handling.

use crate::server::messages::{MarketUpdate, SimulationState};
use crate::server::subscriber::SubscriberTable;
use crate::simulation::ScenarioController;
use crossbeam::atomic::AtomicCell;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Commands accepted on the admin channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// Paused → Running.
    Start,
    /// Running → Paused.
    Pause,
}

/// The tick-synchronous fan-out loop.
///
/// On every `tick_period`, when running, it steps the scenario and hands
/// each subscriber its per-user delta. Admin commands received between
/// ticks take effect before the next tick. A failed step is logged and
/// retried on the next period without advancing, so one bad tick never
/// halts the service.
pub struct BroadcastLoop {
    controller: Arc<Mutex<ScenarioController>>,
    subscribers: SubscriberTable,
    state: Arc<AtomicCell<SimulationState>>,
    tick_period: Duration,
    admin_rx: UnboundedReceiver<AdminCommand>,
}

impl BroadcastLoop {
    /// Wire the loop to its collaborators.
    pub fn new(
        controller: Arc<Mutex<ScenarioController>>,
        subscribers: SubscriberTable,
        state: Arc<AtomicCell<SimulationState>>,
        tick_period: Duration,
        admin_rx: UnboundedReceiver<AdminCommand>,
    ) -> Self {
        Self {
            controller,
            subscribers,
            state,
            tick_period,
            admin_rx,
        }
    }

    /// Run until the admin channel closes.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.tick_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                // Commands received before a tick boundary take effect
                // before the next tick.
                biased;
                command = self.admin_rx.recv() => match command {
                    Some(command) => self.handle_admin(command).await,
                    None => {
                        info!("admin channel closed; stopping broadcast loop");
                        return;
                    }
                },
                _ = interval.tick() => {
                    if self.state.load() == SimulationState::Running {
                        self.step_and_fan_out().await;
                    }
                }
            }
        }
    }

    async fn handle_admin(&self, command: AdminCommand) {
        let current = self.state.load();
        let next = match (command, current) {
            (AdminCommand::Start, SimulationState::Paused) => SimulationState::Running,
            (AdminCommand::Pause, SimulationState::Running) => SimulationState::Paused,
            (AdminCommand::Start, SimulationState::Running) => {
                info!("simulation is already running");
                return;
            }
            (AdminCommand::Pause, SimulationState::Paused) => {
                info!("simulation is not running");
                return;
            }
        };
        self.state.store(next);
        let tick = self.controller.lock().await.kernel().current_tick();
        info!("simulation {:?} at tick {}", next, tick);

        for entry in self.handles() {
            let (id, subscriber) = entry;
            if subscriber.on_admin(next, tick).is_err() {
                self.drop_subscriber(id);
            }
        }
    }

    async fn step_and_fan_out(&self) {
        // Build every per-user update while holding the lock, then send
        // after releasing it; sends are channel pushes and never block.
        let updates: Vec<(Uuid, MarketUpdate)> = {
            let mut controller = self.controller.lock().await;
            let step = match controller.step() {
                Ok(step) => step,
                Err(err) => {
                    error!("tick failed, retrying next period: {err}");
                    return;
                }
            };
            let kernel = controller.kernel();
            self.handles()
                .into_iter()
                .map(|(id, subscriber)| {
                    (id, MarketUpdate::build(&step, kernel, subscriber.user_id()))
                })
                .collect()
        };

        for (id, update) in updates {
            let Some(subscriber) = self.subscribers.get(&id).map(|entry| entry.value().clone())
            else {
                continue;
            };
            if subscriber.on_delta(update).is_err() {
                self.drop_subscriber(id);
            }
        }
    }

    /// Copy the live handles out so iteration never races the table.
    fn handles(&self) -> Vec<(Uuid, Arc<dyn crate::server::subscriber::Subscriber>)> {
        self.subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn drop_subscriber(&self, id: Uuid) {
        warn!("dropping broken subscriber {id}");
        self.subscribers.remove(&id);
    }
}

/// Read admin commands from stdin and feed them to the broadcast loop.
///
/// Unknown commands are reported and ignored.
pub async fn admin_loop(admin_tx: UnboundedSender<AdminCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = match line.trim().to_lowercase().as_str() {
            "start" => AdminCommand::Start,
            "pause" => AdminCommand::Pause,
            "" => continue,
            other => {
                error!("unknown command: {other}");
                continue;
            }
        };
        if admin_tx.send(command).is_err() {
            return;
        }
    }
}
