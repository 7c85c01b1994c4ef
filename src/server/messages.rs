//! The subscriber wire protocol: one tagged message enum plus its payload
//! records.
//!
//! Every message is a discriminated record with a `type` tag. Prices
//! cross the wire as unscaled floats; the fixed-decimal representation is
//! internal to the book.

use crate::orderbook::{LimitOrder, OrderId, Tick, Transaction, UserId};
use crate::simulation::{News, ScenarioController, ScenarioStep, SimulationKernel};
use crate::utils::unscale_price;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serializes/deserializes `HashMap<UserId, String>` through string keys so
/// it survives the internally-tagged `Message` enum's content-buffer
/// round-trip (serde's generic tag machinery can't deserialize non-string
/// map keys directly, even though the wire format is unchanged: JSON object
/// keys are always strings).
mod user_id_map {
    use super::UserId;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S: Serializer>(
        map: &HashMap<UserId, String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let as_strings: HashMap<String, &String> =
            map.iter().map(|(k, v)| (k.to_string(), v)).collect();
        as_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<UserId, String>, D::Error> {
        let as_strings: HashMap<String, String> = HashMap::deserialize(deserializer)?;
        as_strings
            .into_iter()
            .map(|(k, v)| {
                k.parse::<UserId>()
                    .map(|k| (k, v))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

/// Whether the broadcast loop is advancing ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationState {
    /// Ticks advance on every period.
    Running,
    /// The loop idles; admin `start` resumes it.
    Paused,
}

/// A resting order as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Globally unique order id.
    pub order_id: OrderId,
    /// Price in currency units.
    pub price: f64,
    /// Remaining volume.
    pub volume: u64,
    /// Owner of the order.
    pub user_id: UserId,
}

/// Both sides of one security's book, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookView {
    /// Bids, best first.
    pub bids: Vec<OrderRecord>,
    /// Asks, best first.
    pub asks: Vec<OrderRecord>,
}

/// A fill as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Tick of the fill.
    pub tick: Tick,
    /// Execution price in currency units.
    pub price: f64,
    /// Filled volume.
    pub volume: u64,
    /// Owner of the filled ask.
    pub seller_id: UserId,
    /// Owner of the filled bid.
    pub buyer_id: UserId,
}

/// Per-security metadata surfaced in the load snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityInfo {
    /// Dense security index.
    pub security_id: usize,
    /// Price rounding, in decimal places.
    pub decimal_places: u32,
    /// Advisory net position limit.
    pub net_limit: f64,
    /// Advisory gross position limit.
    pub gross_limit: f64,
    /// Advisory single-trade volume cap.
    pub max_trade_volume: u64,
}

/// Orders submitted during one tick on one security, split by side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmittedOrdersView {
    /// Bid submissions in order.
    pub bid: Vec<OrderRecord>,
    /// Ask submissions in order.
    pub ask: Vec<OrderRecord>,
}

/// Ids of orders the matching engine touched during one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactedOrdersView {
    /// Orders partially filled and still resting.
    pub partial: Vec<OrderId>,
    /// Orders fully filled and removed.
    pub full: Vec<OrderId>,
}

/// The full state snapshot a subscriber receives on connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationLoad {
    /// Paused or running.
    pub simulation_state: SimulationState,
    /// Current tick.
    pub tick: Tick,
    /// Total steps in a run.
    pub max_tick: Tick,
    /// Every ticker, in security-id order.
    pub all_securities: Vec<String>,
    /// Tickers clients may trade.
    pub tradeable_securities: Vec<String>,
    /// Per-ticker metadata.
    pub security_info: HashMap<String, SecurityInfo>,
    /// Per-ticker book snapshot.
    pub order_book_per_security: HashMap<String, OrderBookView>,
    /// Per-ticker transaction history for the current run.
    pub transactions: HashMap<String, Vec<TransactionRecord>>,
    /// Registered users.
    #[serde(with = "user_id_map")]
    pub user_id_to_username: HashMap<UserId, String>,
    /// The receiving user's holdings per ticker.
    pub portfolio: HashMap<String, f64>,
    /// News already published this run.
    pub news: Vec<News>,
}

/// The per-tick delta a subscriber receives while running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketUpdate {
    /// The executed tick.
    pub tick: Tick,
    /// Per-ticker submissions during the tick.
    pub submitted_orders: HashMap<String, SubmittedOrdersView>,
    /// Per-ticker cancelled order ids.
    pub cancelled_orders: HashMap<String, Vec<OrderId>>,
    /// Per-ticker partially/fully filled order ids.
    pub transacted_orders: HashMap<String, TransactedOrdersView>,
    /// Per-ticker post-matching book snapshot.
    pub order_book_per_security: HashMap<String, OrderBookView>,
    /// The receiving user's holdings per ticker.
    pub portfolio: HashMap<String, f64>,
    /// Per-ticker fills from this tick.
    pub new_transactions: HashMap<String, Vec<TransactionRecord>>,
    /// News that landed on this tick.
    pub new_news: Vec<News>,
}

/// Every message that crosses the subscriber protocol, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Client asks to be registered under a username.
    LoginRequest {
        /// Requested username.
        username: String,
    },
    /// Server acknowledges registration.
    LoginResponse {
        /// The assigned user id.
        user_id: UserId,
    },
    /// Full state snapshot; always precedes any delta.
    SimulationLoad(SimulationLoad),
    /// Paused/running transition notice.
    SimulationUpdate {
        /// The new state.
        simulation_state: SimulationState,
        /// Tick at the transition.
        tick: Tick,
    },
    /// Per-tick market delta.
    MarketUpdate(MarketUpdate),
    /// Another user joined.
    NewUserConnected {
        /// Their id.
        user_id: UserId,
        /// Their username.
        username: String,
    },
    /// Relayed chat line.
    ChatMessageReceived {
        /// Sending user.
        user_id: UserId,
        /// Message text.
        text: String,
    },
}

fn order_record(kernel: &SimulationKernel, security_id: usize, order: &LimitOrder) -> OrderRecord {
    let decimals = kernel.securities()[security_id].decimal_places;
    OrderRecord {
        order_id: order.order_id,
        price: unscale_price(order.price, decimals),
        volume: order.volume,
        user_id: order.user_id,
    }
}

fn transaction_record(
    kernel: &SimulationKernel,
    security_id: usize,
    transaction: &Transaction,
) -> TransactionRecord {
    let decimals = kernel.securities()[security_id].decimal_places;
    TransactionRecord {
        tick: transaction.tick,
        price: unscale_price(transaction.price, decimals),
        volume: transaction.volume,
        seller_id: transaction.seller_id,
        buyer_id: transaction.buyer_id,
    }
}

fn portfolio_by_ticker(kernel: &SimulationKernel, holdings: &[f64]) -> HashMap<String, f64> {
    kernel
        .securities()
        .iter()
        .map(|security| {
            let held = holdings.get(security.security_id).copied().unwrap_or(0.0);
            (security.ticker.clone(), held)
        })
        .collect()
}

impl SimulationLoad {
    /// Assemble the load snapshot for one user from the controller's
    /// current state.
    pub fn build(
        controller: &ScenarioController,
        simulation_state: SimulationState,
        user_id: UserId,
    ) -> Self {
        let kernel = controller.kernel();
        let tickers = kernel.all_tickers();

        let mut security_info = HashMap::new();
        let mut books = HashMap::new();
        let mut transactions = HashMap::new();
        for security in kernel.securities() {
            let id = security.security_id;
            security_info.insert(
                security.ticker.clone(),
                SecurityInfo {
                    security_id: id,
                    decimal_places: security.decimal_places,
                    net_limit: security.net_limit,
                    gross_limit: security.gross_limit,
                    max_trade_volume: security.max_trade_volume,
                },
            );
            let snapshot = kernel
                .order_book_snapshot(id)
                .expect("registered security must have a book");
            books.insert(
                security.ticker.clone(),
                OrderBookView {
                    bids: snapshot
                        .bids
                        .iter()
                        .map(|order| order_record(kernel, id, order))
                        .collect(),
                    asks: snapshot
                        .asks
                        .iter()
                        .map(|order| order_record(kernel, id, order))
                        .collect(),
                },
            );
            transactions.insert(
                security.ticker.clone(),
                kernel
                    .transactions(id)
                    .iter()
                    .map(|transaction| transaction_record(kernel, id, transaction))
                    .collect(),
            );
        }

        let holdings = kernel
            .user_portfolio(user_id)
            .map(<[f64]>::to_vec)
            .unwrap_or_default();

        Self {
            simulation_state,
            tick: kernel.current_tick(),
            max_tick: kernel.total_steps(),
            all_securities: tickers.clone(),
            tradeable_securities: tickers,
            security_info,
            order_book_per_security: books,
            transactions,
            user_id_to_username: kernel.user_id_to_username(),
            portfolio: portfolio_by_ticker(kernel, &holdings),
            news: controller.news_log().to_vec(),
        }
    }
}

impl MarketUpdate {
    /// Assemble the per-tick delta for one user from a scenario step.
    pub fn build(step: &ScenarioStep, kernel: &SimulationKernel, user_id: UserId) -> Self {
        let delta = &step.delta;
        let mut submitted = HashMap::new();
        let mut cancelled = HashMap::new();
        let mut transacted = HashMap::new();
        let mut books = HashMap::new();
        let mut new_transactions = HashMap::new();

        for security in kernel.securities() {
            let id = security.security_id;
            let ticker = security.ticker.clone();
            submitted.insert(
                ticker.clone(),
                SubmittedOrdersView {
                    bid: delta.submitted[id]
                        .bids
                        .iter()
                        .map(|order| order_record(kernel, id, order))
                        .collect(),
                    ask: delta.submitted[id]
                        .asks
                        .iter()
                        .map(|order| order_record(kernel, id, order))
                        .collect(),
                },
            );
            cancelled.insert(ticker.clone(), delta.cancelled[id].clone());
            transacted.insert(
                ticker.clone(),
                TransactedOrdersView {
                    partial: delta.partially_filled[id].clone(),
                    full: delta.fully_filled[id].clone(),
                },
            );
            books.insert(
                ticker.clone(),
                OrderBookView {
                    bids: delta.books[id]
                        .bids
                        .iter()
                        .map(|order| order_record(kernel, id, order))
                        .collect(),
                    asks: delta.books[id]
                        .asks
                        .iter()
                        .map(|order| order_record(kernel, id, order))
                        .collect(),
                },
            );
            new_transactions.insert(
                ticker,
                delta.transactions[id]
                    .iter()
                    .map(|transaction| transaction_record(kernel, id, transaction))
                    .collect(),
            );
        }

        let holdings = delta
            .portfolios
            .get(user_id as usize)
            .cloned()
            .unwrap_or_default();

        Self {
            tick: delta.tick,
            submitted_orders: submitted,
            cancelled_orders: cancelled,
            transacted_orders: transacted,
            order_book_per_security: books,
            portfolio: portfolio_by_ticker(kernel, &holdings),
            new_transactions,
            new_news: step.new_news.clone(),
        }
    }
}
