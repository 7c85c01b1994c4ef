//! The subscriber fan-out interface.

use crate::orderbook::{Tick, UserId};
use crate::server::error::ServerError;
use crate::server::messages::{MarketUpdate, Message, SimulationLoad, SimulationState};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// A connected client from the broadcast loop's point of view.
///
/// Per subscriber, `on_snapshot` precedes any `on_delta`, and deltas are
/// delivered in tick order. A send failure marks the subscriber broken;
/// the caller removes it and carries on.
pub trait Subscriber: Send + Sync {
    /// The user this subscriber is logged in as.
    fn user_id(&self) -> UserId;

    /// Deliver the full state snapshot.
    fn on_snapshot(&self, load: SimulationLoad) -> Result<(), ServerError>;

    /// Deliver a per-tick delta.
    fn on_delta(&self, update: MarketUpdate) -> Result<(), ServerError>;

    /// Deliver a paused/running transition notice.
    fn on_admin(&self, state: SimulationState, tick: Tick) -> Result<(), ServerError>;
}

/// The shared table of live subscribers, keyed by connection id.
pub type SubscriberTable = Arc<DashMap<Uuid, Arc<dyn Subscriber>>>;

/// A [`Subscriber`] that forwards messages into a connection's outbound
/// channel; the connection's writer task owns the socket.
pub struct ChannelSubscriber {
    user_id: UserId,
    outbound: UnboundedSender<Message>,
}

impl ChannelSubscriber {
    /// Wrap a connection's outbound channel.
    pub fn new(user_id: UserId, outbound: UnboundedSender<Message>) -> Self {
        Self { user_id, outbound }
    }

    fn send(&self, message: Message) -> Result<(), ServerError> {
        self.outbound
            .send(message)
            .map_err(|_| ServerError::BrokenSubscriber)
    }
}

impl Subscriber for ChannelSubscriber {
    fn user_id(&self) -> UserId {
        self.user_id
    }

    fn on_snapshot(&self, load: SimulationLoad) -> Result<(), ServerError> {
        self.send(Message::SimulationLoad(load))
    }

    fn on_delta(&self, update: MarketUpdate) -> Result<(), ServerError> {
        self.send(Message::MarketUpdate(update))
    }

    fn on_admin(&self, state: SimulationState, tick: Tick) -> Result<(), ServerError> {
        self.send(Message::SimulationUpdate {
            simulation_state: state,
            tick,
        })
    }
}
