//! Stochastic order-flow drivers.
//!
//! A driver owns the "market maker" behaviour of the scripted agent: each
//! tick it prunes part of the agent's resting orders and submits a fresh
//! batch of bids and asks sampled from a driven Euler step around the top
//! of book. The kernel runs matching afterwards, so a driver only shapes
//! the flow, never the fills.

use crate::orderbook::{Side, Tick, UserId};
use crate::simulation::error::SimulationError;
use crate::simulation::kernel::SimulationKernel;
use crate::simulation::security::SecurityId;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use tracing::trace;

/// A per-tick order-flow generator for one security.
///
/// Implementations are driven by the scenario controller: `drive` runs
/// before the kernel's matching pass and `observe` runs after it, so a
/// driver can track post-matching state such as the midpoint.
pub trait OrderFlow {
    /// Generate this tick's cancellations and submissions.
    fn drive(
        &mut self,
        kernel: &mut SimulationKernel,
        security_id: SecurityId,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), SimulationError>;

    /// Record post-matching state for the next tick. Default: nothing.
    fn observe(&mut self, _kernel: &SimulationKernel, _security_id: SecurityId) {}
}

/// σ-scale schedule for the biotech scenario's volatility regimes.
pub fn biotech_volatility(tick: Tick) -> f64 {
    match tick {
        0..=199 => 0.5,
        200..=399 => 1.0,
        400..=499 => 2.5,
        500..=799 => 1.0,
        800..=899 => 2.5,
        _ => 0.5,
    }
}

/// Regime-switched mean-reverting flow driven by a scheduled base path.
///
/// Price samples follow
/// `base ± s + κ·(P[τ] − top)·dt + λ·(P[τ+extra] − top)·dt + σ(τ)·√(top·dt)·Z`.
/// Two oddities of the reference behaviour are kept as-is: the ask batch
/// is based off the *top bid* plus the spread, and when only asks rest
/// the synthetic top bid is set *above* the top ask by half a dollar.
pub struct BiotechFlow {
    agent_id: UserId,
    base_path: Vec<f64>,
    extra_steps: usize,
    /// Displacement of each batch from the reference price.
    spread: f64,
    /// Orders per side per tick.
    order_count: usize,
    /// Half-open volume range sampled per order.
    volume_range: (u64, u64),
    /// Fraction of the agent's open orders pruned each tick.
    removal_percentage: f64,
    /// Reversion strength κ toward the current base-path target.
    reversion: f64,
    /// Leaky reversion strength λ toward the future target.
    leaky_reversion: f64,
    /// σ-scale schedule by tick.
    volatility: fn(Tick) -> f64,
    /// Orders per side seeded into the empty book at tick 0.
    initial_depth: usize,
    /// Post-matching midpoint history, used when the book empties out.
    midpoints: Vec<f64>,
}

impl BiotechFlow {
    /// Build the flow for one run over the given base path.
    ///
    /// `base_path` must cover `total_steps + extra_steps` entries so the
    /// leaky-reversion term can look `extra_steps` ticks ahead.
    pub fn new(
        agent_id: UserId,
        base_path: Vec<f64>,
        extra_steps: usize,
        removal_percentage: f64,
        volatility: fn(Tick) -> f64,
    ) -> Self {
        Self {
            agent_id,
            base_path,
            extra_steps,
            spread: 0.02,
            order_count: 5,
            volume_range: (1, 25),
            removal_percentage,
            reversion: 100.0,
            leaky_reversion: 10.0,
            volatility,
            initial_depth: 50,
            midpoints: Vec::new(),
        }
    }

    /// Seed the empty book with uniform strips of bids below and asks
    /// above the base-path target, widened by the regime's volatility.
    fn seed_book(
        &self,
        kernel: &mut SimulationKernel,
        security_id: SecurityId,
        target: f64,
        sigma: f64,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), SimulationError> {
        assert!(
            kernel.bid_count(security_id) + kernel.ask_count(security_id) == 0,
            "initial book must be empty at tick 0"
        );

        let blend: Vec<f64> = (0..self.initial_depth)
            .map(|_| rng.gen_range(0.75..1.0))
            .collect();
        let volumes: Vec<u64> = (0..self.initial_depth)
            .map(|_| rng.gen_range(self.volume_range.0..self.volume_range.1))
            .collect();

        let bid_top = target - self.spread;
        let bid_bottom = bid_top - 0.1 * sigma * bid_top;
        let ask_bottom = target + self.spread;
        let ask_top = ask_bottom + 0.1 * sigma * ask_bottom;

        let mut orders: Vec<(Side, f64, u64)> = Vec::with_capacity(2 * self.initial_depth);
        for (u, volume) in blend.iter().zip(&volumes) {
            orders.push((Side::Bid, bid_top * u + bid_bottom * (1.0 - u), *volume));
        }
        for (u, volume) in blend.iter().zip(&volumes) {
            orders.push((Side::Ask, ask_bottom * u + ask_top * (1.0 - u), *volume));
        }
        orders.shuffle(rng);

        for (side, price, volume) in orders {
            kernel.direct_insert_limit_order(self.agent_id, security_id, side, price, volume)?;
        }
        Ok(())
    }

    /// Cancel a uniform sample of `⌊ρ·n⌋` of the agent's open orders,
    /// without replacement. Misses are expected and swallowed.
    fn prune_agent_orders(
        &self,
        kernel: &mut SimulationKernel,
        security_id: SecurityId,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), SimulationError> {
        let open = kernel.get_all_open_user_orders(self.agent_id, security_id);
        let count = (open.len() as f64 * self.removal_percentage) as usize;
        if count == 0 {
            return Ok(());
        }
        for index in rand::seq::index::sample(rng, open.len(), count) {
            match kernel.submit_cancel_order(self.agent_id, security_id, open[index]) {
                Ok(_) | Err(SimulationError::OrderNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Resolve the working top-of-book pair, synthesising the missing
    /// side(s) the way the reference does.
    fn working_tops(&self, kernel: &SimulationKernel, security_id: SecurityId) -> (f64, f64) {
        let bid = kernel.top_bid(security_id).map(|order| self.unscale(kernel, security_id, order.price));
        let ask = kernel.top_ask(security_id).map(|order| self.unscale(kernel, security_id, order.price));
        match (bid, ask) {
            (Some(bid), Some(ask)) => (bid, ask),
            (Some(bid), None) => (bid, bid + 0.5),
            // sic: the synthetic bid sits above the ask
            (None, Some(ask)) => (ask + 0.5, ask),
            (None, None) => {
                let midpoint = self.midpoints.last().copied().unwrap_or_else(|| {
                    self.base_path.first().copied().unwrap_or_default()
                });
                (midpoint + 0.5, midpoint + 0.5)
            }
        }
    }

    fn unscale(&self, kernel: &SimulationKernel, security_id: SecurityId, price: u64) -> f64 {
        let decimals = kernel.securities()[security_id].decimal_places;
        crate::utils::unscale_price(price, decimals)
    }
}

impl OrderFlow for BiotechFlow {
    fn drive(
        &mut self,
        kernel: &mut SimulationKernel,
        security_id: SecurityId,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), SimulationError> {
        let tick = kernel.current_tick();
        let dt = kernel.dt();
        let sigma = (self.volatility)(tick);
        let target = self.base_path[tick as usize];
        let future_target = self.base_path[tick as usize + self.extra_steps];

        if tick == 0 {
            return self.seed_book(kernel, security_id, target, sigma, rng);
        }

        self.prune_agent_orders(kernel, security_id, rng)?;
        let (top_bid, top_ask) = self.working_tops(kernel, security_id);

        let mut orders: Vec<(Side, f64, u64)> = Vec::with_capacity(2 * self.order_count);

        let bid_drift = self.reversion * (target - top_bid) * dt
            + self.leaky_reversion * (future_target - top_bid) * dt;
        let bid_diffusion = sigma * (top_bid * dt).sqrt();
        let bid_prices: Vec<f64> = (0..self.order_count)
            .map(|_| {
                let z: f64 = rng.sample(StandardNormal);
                top_bid - self.spread + bid_drift + bid_diffusion * z
            })
            .collect();
        for price in bid_prices {
            let volume = rng.gen_range(self.volume_range.0..self.volume_range.1);
            orders.push((Side::Bid, price, volume));
        }

        // Ask batch bases off the top bid plus the spread (sic), while the
        // reversion and diffusion terms use the top ask.
        let ask_drift = self.reversion * (target - top_ask) * dt
            + self.leaky_reversion * (future_target - top_ask) * dt;
        let ask_diffusion = sigma * (top_ask * dt).sqrt();
        let ask_prices: Vec<f64> = (0..self.order_count)
            .map(|_| {
                let z: f64 = rng.sample(StandardNormal);
                top_bid + self.spread + ask_drift + ask_diffusion * z
            })
            .collect();
        for price in ask_prices {
            let volume = rng.gen_range(self.volume_range.0..self.volume_range.1);
            orders.push((Side::Ask, price, volume));
        }

        orders.shuffle(rng);
        for (side, price, volume) in orders {
            kernel.submit_limit_order(self.agent_id, security_id, side, price, volume)?;
        }
        trace!(
            "tick {}: drove {} orders around ({:.2}, {:.2})",
            tick,
            2 * self.order_count,
            top_bid,
            top_ask
        );
        Ok(())
    }

    fn observe(&mut self, kernel: &SimulationKernel, security_id: SecurityId) {
        let bid = kernel.top_bid(security_id).map(|order| self.unscale(kernel, security_id, order.price));
        let ask = kernel.top_ask(security_id).map(|order| self.unscale(kernel, security_id, order.price));
        let last = self.midpoints.last().copied().unwrap_or_default();
        let (top_bid, top_ask) = match (bid, ask) {
            (Some(bid), Some(ask)) => (bid, ask),
            (Some(bid), None) => (bid, bid + 0.5),
            (None, Some(ask)) => (ask + 0.5, ask),
            (None, None) => (last - 0.5, last + 0.5),
        };
        self.midpoints.push((top_bid + top_ask) / 2.0);
    }
}

/// Demonstration flow with a piecewise volatility/demand schedule and a
/// single step up in the target price midway through the run.
///
/// The order count scales with the unadjusted volatility, there is no
/// leaky-reversion term, and each side bases off its own top of book.
pub struct DemoFlow {
    agent_id: UserId,
    removal_percentage: f64,
    spread: f64,
    volume_range: (u64, u64),
}

impl DemoFlow {
    /// Build the demo flow for the given scripted agent.
    pub fn new(agent_id: UserId, removal_percentage: f64) -> Self {
        Self {
            agent_id,
            removal_percentage,
            spread: 0.04,
            volume_range: (1, 5),
        }
    }

    fn unadjusted_volatility(t: f64) -> f64 {
        if t >= 0.8 {
            0.025
        } else if (0.4..=0.6).contains(&t) {
            1.0
        } else {
            0.2
        }
    }

    fn order_count(t: f64) -> usize {
        (15.0 * Self::unadjusted_volatility(t) + 5.0) as usize
    }

    fn volatility(t: f64) -> f64 {
        3.0 * (Self::order_count(t) as f64).sqrt() * Self::unadjusted_volatility(t)
    }

    fn unadjusted_reversion(t: f64) -> f64 {
        if t >= 0.8 {
            30.0
        } else if t >= 0.5 {
            Self::unadjusted_volatility(t) * (5.0 + 30.0 * t)
        } else {
            Self::unadjusted_volatility(t) * 5.0
        }
    }

    fn reversion(t: f64) -> f64 {
        (Self::order_count(t) as f64).sqrt() * Self::unadjusted_reversion(t)
    }

    fn target(t: f64) -> f64 {
        if t >= 0.5 { 110.0 } else { 100.0 }
    }
}

impl OrderFlow for DemoFlow {
    fn drive(
        &mut self,
        kernel: &mut SimulationKernel,
        security_id: SecurityId,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), SimulationError> {
        let t = kernel.t();
        let dt = kernel.dt();
        let count = Self::order_count(t);
        let half_spread = self.spread / 2.0;
        let target = Self::target(t);
        let sigma = Self::volatility(t);

        if kernel.current_tick() == 0 {
            let blend: Vec<f64> = (0..count).map(|_| rng.gen_range(0.75..1.0)).collect();
            let volumes: Vec<u64> = (0..count)
                .map(|_| rng.gen_range(self.volume_range.0..self.volume_range.1))
                .collect();

            let bid_top = target - half_spread;
            let bid_bottom = bid_top - 0.5 * sigma * bid_top;
            let ask_bottom = target + half_spread;
            let ask_top = ask_bottom + 0.5 * sigma * ask_bottom;

            for (u, volume) in blend.iter().zip(&volumes) {
                let price = bid_top * u + bid_bottom * (1.0 - u);
                kernel.direct_insert_limit_order(
                    self.agent_id,
                    security_id,
                    Side::Bid,
                    price,
                    *volume,
                )?;
            }
            for (u, volume) in blend.iter().zip(&volumes) {
                let price = ask_bottom * u + ask_top * (1.0 - u);
                kernel.direct_insert_limit_order(
                    self.agent_id,
                    security_id,
                    Side::Ask,
                    price,
                    *volume,
                )?;
            }
            return Ok(());
        }

        let open = kernel.get_all_open_user_orders(self.agent_id, security_id);
        let prune = (open.len() as f64 * self.removal_percentage) as usize;
        if prune > 0 {
            for index in rand::seq::index::sample(rng, open.len(), prune) {
                match kernel.submit_cancel_order(self.agent_id, security_id, open[index]) {
                    Ok(_) | Err(SimulationError::OrderNotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
        }

        let decimals = kernel.securities()[security_id].decimal_places;
        let bid = kernel
            .top_bid(security_id)
            .map(|order| crate::utils::unscale_price(order.price, decimals));
        let ask = kernel
            .top_ask(security_id)
            .map(|order| crate::utils::unscale_price(order.price, decimals));
        let (top_bid, top_ask) = match (bid, ask) {
            (Some(bid), Some(ask)) => (bid, ask),
            (Some(bid), None) => (bid, bid + self.spread),
            (None, Some(ask)) => (ask - self.spread, ask),
            (None, None) => (target - half_spread, target + half_spread),
        };

        let reversion = Self::reversion(t);
        for (side, base) in [(Side::Bid, top_bid), (Side::Ask, top_ask)] {
            let offset = match side {
                Side::Bid => -half_spread,
                Side::Ask => half_spread,
            };
            for _ in 0..count {
                let z: f64 = rng.sample(StandardNormal);
                let price = base
                    + offset
                    + reversion * (target - base) * dt
                    + sigma * (base * dt).sqrt() * z;
                let volume = rng.gen_range(self.volume_range.0..self.volume_range.1);
                kernel.submit_limit_order(self.agent_id, security_id, side, price, volume)?;
            }
        }
        Ok(())
    }
}
