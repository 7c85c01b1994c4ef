//! The simulation kernel: securities, users, per-security books, order-id
//! allocation, and the tick advance that runs matching and settlement.

use crate::orderbook::{
    LimitOrder, OrderBook, OrderBookSnapshot, OrderId, Price, Side, Tick, Transaction, UserId,
    Volume,
};
use crate::simulation::error::SimulationError;
use crate::simulation::portfolio::PortfolioLedger;
use crate::simulation::security::{Security, SecurityId, SecurityKind, User};
use crate::utils::{scale_price, unscale_price};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Lifecycle of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationPhase {
    /// No tick has been executed since construction or the last reset.
    Fresh,
    /// At least one tick has been executed.
    Running,
    /// The final tick has been executed; `advance_tick` now fails.
    Finished,
}

/// Orders submitted on one security during a tick, split by side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmittedOrders {
    /// Bid orders in submission order.
    pub bids: Vec<LimitOrder>,
    /// Ask orders in submission order.
    pub asks: Vec<LimitOrder>,
}

/// The delta record produced by one `advance_tick`.
///
/// Everything is indexed by dense security id, in security-id order. The
/// portfolio matrix is user-major.
#[derive(Debug, Clone)]
pub struct TickDelta {
    /// The tick that was just executed.
    pub tick: Tick,
    /// Orders submitted during the tick, per security.
    pub submitted: Vec<SubmittedOrders>,
    /// Order ids cancelled during the tick, per security.
    pub cancelled: Vec<Vec<OrderId>>,
    /// Orders partially filled by matching and still resting, per security.
    pub partially_filled: Vec<Vec<OrderId>>,
    /// Orders fully filled and removed by matching, per security.
    pub fully_filled: Vec<Vec<OrderId>>,
    /// Post-matching book snapshot, per security.
    pub books: Vec<OrderBookSnapshot>,
    /// Transactions emitted this tick, per security.
    pub transactions: Vec<Vec<Transaction>>,
    /// Holdings matrix after settlement, `portfolios[user][security]`.
    pub portfolios: Vec<Vec<f64>>,
    /// True when this was the final tick of the run.
    pub finished: bool,
}

/// Reservation bookkeeping for one open order submitted through the
/// checked path.
struct OrderMeta {
    user_id: UserId,
    security_id: SecurityId,
    side: Side,
    price: Price,
}

/// Owns the securities, users, per-security order books and portfolios,
/// hands out monotonic order ids, and routes submit/cancel/advance.
///
/// The kernel is pure in-memory CPU work: no operation suspends, so a
/// single cooperative task can interleave it safely with subscriber I/O.
pub struct SimulationKernel {
    securities: Vec<Security>,
    ticker_to_id: HashMap<String, SecurityId>,
    users: Vec<User>,
    username_to_id: HashMap<String, UserId>,
    books: Vec<OrderBook>,
    ledger: PortfolioLedger,
    /// Reservation metadata for live checked-path orders.
    order_meta: HashMap<OrderId, OrderMeta>,
    /// Next order id. Strictly increasing, survives resets.
    next_order_id: OrderId,
    current_tick: Tick,
    /// Total steps `N`; ticks run 0..N.
    total_steps: Tick,
    /// Simulated horizon `T`, so `dt = T / N`.
    horizon: f64,
    phase: SimulationPhase,
    /// Submitted orders accumulated since the last advance, per security.
    pending_submitted: Vec<SubmittedOrders>,
    /// Cancelled order ids accumulated since the last advance, per security.
    pending_cancelled: Vec<Vec<OrderId>>,
    /// Full transaction history for the current run, per security.
    transaction_history: Vec<Vec<Transaction>>,
}

impl SimulationKernel {
    /// Create a kernel with no securities or users, simulating `horizon`
    /// units of time over `total_steps` ticks.
    pub fn new(horizon: f64, total_steps: Tick) -> Self {
        Self {
            securities: Vec::new(),
            ticker_to_id: HashMap::new(),
            users: Vec::new(),
            username_to_id: HashMap::new(),
            books: Vec::new(),
            ledger: PortfolioLedger::new(),
            order_meta: HashMap::new(),
            next_order_id: 0,
            current_tick: 0,
            total_steps,
            horizon,
            phase: SimulationPhase::Fresh,
            pending_submitted: Vec::new(),
            pending_cancelled: Vec::new(),
            transaction_history: Vec::new(),
        }
    }

    /// Register a security and create its order book.
    ///
    /// The returned id is the dense index used by every per-security query.
    pub fn add_security(&mut self, mut security: Security) -> SecurityId {
        let security_id = self.securities.len();
        security.security_id = security_id;
        self.ticker_to_id
            .insert(security.ticker.clone(), security_id);
        self.books
            .push(OrderBook::new(security_id, &security.ticker));
        self.securities.push(security);
        self.ledger.add_security();
        self.pending_submitted.push(SubmittedOrders::default());
        self.pending_cancelled.push(Vec::new());
        self.transaction_history.push(Vec::new());
        security_id
    }

    /// Register a user, or return the existing id when the username is
    /// already known. Ids are dense and monotonic.
    pub fn add_user(&mut self, username: &str) -> UserId {
        if let Some(user_id) = self.username_to_id.get(username) {
            return *user_id;
        }
        let user_id = self.users.len() as UserId;
        self.users.push(User {
            user_id,
            username: username.to_string(),
        });
        self.username_to_id.insert(username.to_string(), user_id);
        self.ledger.add_user();
        debug!("registered user {} as id {}", username, user_id);
        user_id
    }

    /// Submit a limit order on behalf of a user.
    ///
    /// The price is rounded to the security's decimal places, the next
    /// order id is allocated, and the order enters the book stamped with
    /// the current tick. The denominated amount (currency for bids, stock
    /// for asks) is reserved in the ledger until the order leaves the
    /// book. No matching happens until [`Self::advance_tick`].
    ///
    /// # Errors
    /// `UnknownUser`, `UnknownSecurity`, `InvalidPrice` (non-finite or
    /// non-positive after rounding) or `InvalidVolume` (zero).
    pub fn submit_limit_order(
        &mut self,
        user_id: UserId,
        security_id: SecurityId,
        side: Side,
        price: f64,
        volume: Volume,
    ) -> Result<OrderId, SimulationError> {
        let order = self.insert_order(user_id, security_id, side, price, volume)?;

        let reservation = match side {
            Side::Bid => unscale_price(order.price, self.securities[security_id].decimal_places)
                * order.volume as f64,
            Side::Ask => order.volume as f64,
        };
        let reserve_on = match side {
            Side::Bid => self.currency_of(security_id),
            Side::Ask => security_id,
        };
        self.ledger
            .reserve(user_id as usize, reserve_on, reservation);
        self.order_meta.insert(
            order.order_id,
            OrderMeta {
                user_id,
                security_id,
                side,
                price: order.price,
            },
        );
        Ok(order.order_id)
    }

    /// Submit a limit order without reservation bookkeeping.
    ///
    /// Reserved for the scripted agent's initial book building at tick 0;
    /// identical to [`Self::submit_limit_order`] otherwise.
    pub fn direct_insert_limit_order(
        &mut self,
        user_id: UserId,
        security_id: SecurityId,
        side: Side,
        price: f64,
        volume: Volume,
    ) -> Result<OrderId, SimulationError> {
        self.insert_order(user_id, security_id, side, price, volume)
            .map(|order| order.order_id)
    }

    fn insert_order(
        &mut self,
        user_id: UserId,
        security_id: SecurityId,
        side: Side,
        price: f64,
        volume: Volume,
    ) -> Result<LimitOrder, SimulationError> {
        if user_id as usize >= self.users.len() {
            return Err(SimulationError::UnknownUser(user_id));
        }
        let security = self
            .securities
            .get(security_id)
            .ok_or(SimulationError::UnknownSecurity(security_id))?;
        if !price.is_finite() || price <= 0.0 {
            return Err(SimulationError::InvalidPrice { price });
        }
        if volume == 0 {
            return Err(SimulationError::InvalidVolume { volume });
        }

        let order = LimitOrder {
            order_id: self.next_order_id,
            side,
            price: scale_price(price, security.decimal_places),
            volume,
            timestamp: self.current_tick,
            user_id,
        };
        self.books[security_id].insert(order)?;
        self.next_order_id += 1;

        let pending = &mut self.pending_submitted[security_id];
        match side {
            Side::Bid => pending.bids.push(order),
            Side::Ask => pending.asks.push(order),
        }
        Ok(order)
    }

    /// Cancel a live order owned by `user_id`.
    ///
    /// # Errors
    /// `OrderNotFound` when the id is not resting (a second cancel for the
    /// same id lands here without side effects) and `NotOrderOwner` when
    /// the order belongs to someone else, in which case it stays in the
    /// book.
    pub fn submit_cancel_order(
        &mut self,
        user_id: UserId,
        security_id: SecurityId,
        order_id: OrderId,
    ) -> Result<LimitOrder, SimulationError> {
        if user_id as usize >= self.users.len() {
            return Err(SimulationError::UnknownUser(user_id));
        }
        let book = self
            .books
            .get(security_id)
            .ok_or(SimulationError::UnknownSecurity(security_id))?;

        match book.get(order_id) {
            None => return Err(SimulationError::OrderNotFound(order_id)),
            Some(order) if order.user_id != user_id => {
                return Err(SimulationError::NotOrderOwner { order_id, user_id });
            }
            Some(_) => {}
        }

        let cancelled = book
            .cancel(order_id)
            .ok_or(SimulationError::OrderNotFound(order_id))?;
        self.release_reservation(order_id, cancelled.volume);
        self.order_meta.remove(&order_id);
        self.pending_cancelled[security_id].push(order_id);
        trace!("user {} cancelled order {}", user_id, order_id);
        Ok(cancelled)
    }

    /// Execute matching for every security in id order, settle the fills,
    /// and advance the tick.
    ///
    /// # Errors
    /// [`SimulationError::SimulationFinished`] once `current_tick`
    /// reaches `total_steps`.
    pub fn advance_tick(&mut self) -> Result<TickDelta, SimulationError> {
        if self.current_tick >= self.total_steps {
            self.phase = SimulationPhase::Finished;
            return Err(SimulationError::SimulationFinished {
                tick: self.current_tick,
            });
        }
        self.phase = SimulationPhase::Running;
        let tick = self.current_tick;

        let security_count = self.securities.len();
        let mut transactions: Vec<Vec<Transaction>> = Vec::with_capacity(security_count);
        let mut partially_filled: Vec<Vec<OrderId>> = Vec::with_capacity(security_count);
        let mut fully_filled: Vec<Vec<OrderId>> = Vec::with_capacity(security_count);

        for security_id in 0..security_count {
            let fills = self.books[security_id].process_transactions(tick);

            let currency_id = self.currency_of(security_id);
            let decimals = self.securities[security_id].decimal_places;
            let mut partial: Vec<OrderId> = Vec::new();
            let mut full: Vec<OrderId> = Vec::new();
            for fill in &fills {
                if currency_id != security_id {
                    let price = unscale_price(fill.price, decimals);
                    self.ledger
                        .apply_transaction(security_id, currency_id, fill, price);
                }
                self.release_reservation(fill.taker_order_id, fill.volume);
                self.release_reservation(fill.maker_order_id, fill.volume);
                for order_id in [fill.taker_order_id, fill.maker_order_id] {
                    let resting = self.books[security_id].get(order_id).is_some();
                    let bucket = if resting { &mut partial } else { &mut full };
                    if !bucket.contains(&order_id) {
                        bucket.push(order_id);
                    }
                }
            }
            // A partial fill followed by a completing fill in the same
            // tick counts as fully transacted only.
            partial.retain(|id| !full.contains(id));
            for order_id in &full {
                self.order_meta.remove(order_id);
            }

            self.transaction_history[security_id].extend(fills.iter().copied());
            transactions.push(fills);
            partially_filled.push(partial);
            fully_filled.push(full);
        }

        let delta = TickDelta {
            tick,
            submitted: std::mem::take(&mut self.pending_submitted),
            cancelled: std::mem::take(&mut self.pending_cancelled),
            partially_filled,
            fully_filled,
            books: self.books.iter().map(|book| book.snapshot()).collect(),
            transactions,
            portfolios: self.ledger.matrix().to_vec(),
            finished: tick + 1 >= self.total_steps,
        };
        self.pending_submitted = vec![SubmittedOrders::default(); security_count];
        self.pending_cancelled = vec![Vec::new(); security_count];

        self.current_tick += 1;
        if self.current_tick >= self.total_steps {
            self.phase = SimulationPhase::Finished;
        }
        debug!(
            "tick {} executed: {} transactions",
            tick,
            delta.transactions.iter().map(Vec::len).sum::<usize>()
        );
        Ok(delta)
    }

    /// Drop all orders, transactions and pending deltas, and rewind the
    /// tick to zero. User and security registrations are preserved and
    /// the order-id counter keeps increasing monotonically.
    pub fn reset_simulation(&mut self) {
        for book in &self.books {
            book.clear();
        }
        self.ledger.reset();
        self.order_meta.clear();
        for pending in &mut self.pending_submitted {
            *pending = SubmittedOrders::default();
        }
        for pending in &mut self.pending_cancelled {
            pending.clear();
        }
        for history in &mut self.transaction_history {
            history.clear();
        }
        self.current_tick = 0;
        self.phase = SimulationPhase::Fresh;
        debug!("simulation reset; next order id {}", self.next_order_id);
    }

    /// Post-matching snapshot of one security's book.
    pub fn order_book_snapshot(
        &self,
        security_id: SecurityId,
    ) -> Result<OrderBookSnapshot, SimulationError> {
        self.book(security_id).map(OrderBook::snapshot)
    }

    /// Peek the top bid of a security.
    pub fn top_bid(&self, security_id: SecurityId) -> Option<LimitOrder> {
        self.books.get(security_id).and_then(OrderBook::top_bid)
    }

    /// Peek the top ask of a security.
    pub fn top_ask(&self, security_id: SecurityId) -> Option<LimitOrder> {
        self.books.get(security_id).and_then(OrderBook::top_ask)
    }

    /// Number of live bids on a security.
    pub fn bid_count(&self, security_id: SecurityId) -> usize {
        self.books
            .get(security_id)
            .map_or(0, OrderBook::bid_count)
    }

    /// Number of live asks on a security.
    pub fn ask_count(&self, security_id: SecurityId) -> usize {
        self.books
            .get(security_id)
            .map_or(0, OrderBook::ask_count)
    }

    /// Live order ids a user has open on one security.
    pub fn get_all_open_user_orders(
        &self,
        user_id: UserId,
        security_id: SecurityId,
    ) -> Vec<OrderId> {
        self.books
            .get(security_id)
            .map(|book| book.orders_for_user(user_id))
            .unwrap_or_default()
    }

    /// A user's holdings, indexed by security id.
    pub fn user_portfolio(&self, user_id: UserId) -> Result<&[f64], SimulationError> {
        if user_id as usize >= self.users.len() {
            return Err(SimulationError::UnknownUser(user_id));
        }
        Ok(self.ledger.holdings_of(user_id as usize))
    }

    /// A user's reserved balances, indexed by security id.
    pub fn user_reserved(&self, user_id: UserId) -> Result<&[f64], SimulationError> {
        if user_id as usize >= self.users.len() {
            return Err(SimulationError::UnknownUser(user_id));
        }
        Ok(self.ledger.reserved_of(user_id as usize))
    }

    /// Sum of one security's holdings over all users.
    pub fn security_holdings_total(&self, security_id: SecurityId) -> f64 {
        self.ledger.security_total(security_id)
    }

    /// Look up a security id by ticker.
    pub fn security_id(&self, ticker: &str) -> Result<SecurityId, SimulationError> {
        self.ticker_to_id
            .get(ticker)
            .copied()
            .ok_or_else(|| SimulationError::UnknownTicker(ticker.to_string()))
    }

    /// Look up a ticker by security id.
    pub fn ticker(&self, security_id: SecurityId) -> Result<&str, SimulationError> {
        self.securities
            .get(security_id)
            .map(|security| security.ticker.as_str())
            .ok_or(SimulationError::UnknownSecurity(security_id))
    }

    /// Every registered ticker, in security-id order.
    pub fn all_tickers(&self) -> Vec<String> {
        self.securities
            .iter()
            .map(|security| security.ticker.clone())
            .collect()
    }

    /// Every registered security, in id order.
    pub fn securities(&self) -> &[Security] {
        &self.securities
    }

    /// Every registered user, in id order.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Map from user id to username for the load snapshot.
    pub fn user_id_to_username(&self) -> HashMap<UserId, String> {
        self.users
            .iter()
            .map(|user| (user.user_id, user.username.clone()))
            .collect()
    }

    /// Transactions recorded this run for one security.
    pub fn transactions(&self, security_id: SecurityId) -> &[Transaction] {
        self.transaction_history
            .get(security_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The current tick; the next `advance_tick` executes this tick.
    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// The id the next submitted order will receive. Strictly increasing
    /// for the kernel's whole lifetime, including across resets.
    pub fn next_order_id(&self) -> OrderId {
        self.next_order_id
    }

    /// Total steps `N` in a run.
    pub fn total_steps(&self) -> Tick {
        self.total_steps
    }

    /// Simulated time `t = tick × dt`.
    pub fn t(&self) -> f64 {
        self.current_tick as f64 * self.dt()
    }

    /// Step length `dt = T / N`.
    pub fn dt(&self) -> f64 {
        self.horizon / self.total_steps as f64
    }

    /// Where the run is in its lifecycle.
    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    fn book(&self, security_id: SecurityId) -> Result<&OrderBook, SimulationError> {
        self.books
            .get(security_id)
            .ok_or(SimulationError::UnknownSecurity(security_id))
    }

    /// The accounting-currency id for a stock, or the security itself when
    /// it is the currency (or no currency is registered).
    fn currency_of(&self, security_id: SecurityId) -> SecurityId {
        match &self.securities[security_id].kind {
            SecurityKind::Currency => security_id,
            SecurityKind::Stock { currency } => self
                .ticker_to_id
                .get(currency)
                .copied()
                .unwrap_or(security_id),
        }
    }

    /// Release the reserved amount backing `volume` units of a
    /// checked-path order. Direct-inserted orders carry no reservation.
    fn release_reservation(&mut self, order_id: OrderId, volume: Volume) {
        if let Some(meta) = self.order_meta.get(&order_id) {
            let amount = match meta.side {
                Side::Bid => {
                    let decimals = self.securities[meta.security_id].decimal_places;
                    unscale_price(meta.price, decimals) * volume as f64
                }
                Side::Ask => volume as f64,
            };
            let release_on = match meta.side {
                Side::Bid => self.currency_of(meta.security_id),
                Side::Ask => meta.security_id,
            };
            let user = meta.user_id as usize;
            self.ledger.release(user, release_on, amount);
        }
    }
}
