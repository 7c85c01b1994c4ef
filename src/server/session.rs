//! Per-connection WebSocket session handling.

use crate::orderbook::UserId;
use crate::server::error::ServerError;
use crate::server::messages::{Message, SimulationLoad, SimulationState};
use crate::server::subscriber::{ChannelSubscriber, Subscriber, SubscriberTable};
use crate::simulation::ScenarioController;
use crossbeam::atomic::AtomicCell;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything a connection task needs to serve one client.
#[derive(Clone)]
pub struct ServerState {
    /// The shared scenario controller.
    pub controller: Arc<Mutex<ScenarioController>>,
    /// The live subscriber table the broadcast loop fans out to.
    pub subscribers: SubscriberTable,
    /// The loop's paused/running state, for load snapshots.
    pub state: Arc<AtomicCell<SimulationState>>,
}

/// Serve one client connection to completion.
///
/// On connect the client is registered under a placeholder username,
/// receives `login_response` and the full `simulation_load` snapshot, and
/// only then joins the fan-out table, so its snapshot always precedes any
/// delta. A later `login_request` re-registers the client under its own
/// username and replays the handshake. Other inbound messages are logged.
pub async fn handle_connection(stream: TcpStream, server: ServerState) -> Result<(), ServerError> {
    let websocket = accept_async(stream).await?;
    let client_id = Uuid::new_v4();
    info!("client {client_id} connected");

    let (mut sink, mut inbound) = websocket.split();
    let (outbound_tx, mut outbound_rx) = unbounded_channel::<Message>();

    // The writer task owns the socket sink; every other party reaches it
    // through the outbound channel, which keeps message order per client.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    error!("failed to encode outbound message: {err}");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let username = format!("USER-{}", client_id.simple());
    let mut user_id = login(&server, client_id, &username, &outbound_tx).await?;

    while let Some(frame) = inbound.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                warn!("client {client_id} transport error: {err}");
                break;
            }
        };
        match frame {
            WsMessage::Text(text) => match serde_json::from_str::<Message>(&text) {
                Ok(Message::LoginRequest { username }) => {
                    user_id = login(&server, client_id, &username, &outbound_tx).await?;
                }
                Ok(message) => {
                    debug!("client {client_id} (user {user_id}) sent: {message:?}");
                }
                Err(_) => {
                    debug!("client {client_id} sent unparseable message: {text}");
                }
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    server.subscribers.remove(&client_id);
    writer.abort();
    info!("client {client_id} disconnected");
    Ok(())
}

/// Register `username`, send the login acknowledgement and full snapshot,
/// and (re-)enter the client into the fan-out table.
async fn login(
    server: &ServerState,
    client_id: Uuid,
    username: &str,
    outbound_tx: &UnboundedSender<Message>,
) -> Result<UserId, ServerError> {
    let subscriber = {
        let mut controller = server.controller.lock().await;
        let user_id = controller.register_user(username);
        let subscriber = Arc::new(ChannelSubscriber::new(user_id, outbound_tx.clone()));
        outbound_tx
            .send(Message::LoginResponse { user_id })
            .map_err(|_| ServerError::BrokenSubscriber)?;
        let load = SimulationLoad::build(&controller, server.state.load(), user_id);
        subscriber.on_snapshot(load)?;
        subscriber
    };
    let user_id = subscriber.user_id();
    server.subscribers.insert(client_id, subscriber);
    info!("client {client_id} logged in as {username} (user {user_id})");
    Ok(user_id)
}
