//! Scenario control: narrative state, base-path sampling, and the glue
//! between the order-flow driver and the kernel.

use crate::orderbook::{Tick, UserId};
use crate::simulation::driver::{BiotechFlow, DemoFlow, OrderFlow, biotech_volatility};
use crate::simulation::error::SimulationError;
use crate::simulation::kernel::{SimulationKernel, TickDelta};
use crate::simulation::security::{Security, SecurityId};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// News pool for good preliminary trial results.
pub const POSITIVE_PRELIMINARY_BLURBS: [&str; 4] = [
    "BIOTECH announces promising preliminary Phase III trial results for its flagship drug Xeronex. Early data suggests significant efficacy improvements over existing treatments, with a strong safety profile. The company is preparing its FDA submission.",
    "BIOTECH reports early success in Xeronex trials. Patients in the trial group exhibited a marked improvement over placebo, with minimal adverse effects noted.",
    "Xeronex shows early promise: BIOTECH's lead candidate surpassed expectations in efficacy metrics. Investors hopeful for FDA green light.",
    "Strong preliminary data boosts BIOTECH outlook. Internal sources say response rates \u{201c}far exceeded baseline\u{201d}, with low dropout rates.",
];

/// News pool for disappointing preliminary trial results.
pub const NEGATIVE_PRELIMINARY_BLURBS: [&str; 4] = [
    "BIOTECH releases preliminary results of its Xeronex trial. While some efficacy was observed, the overall results fell short of expectations. Concerns remain about the statistical strength and side effects profile.",
    "Initial trial data for Xeronex underwhelms. While some therapeutic effects observed, results fall short of benchmarks.",
    "BIOTECH's Xeronex stumbles in early findings. Analysts cite \u{201c}inconclusive efficacy\u{201d} and \u{201c}uncertain path forward.\u{201d}",
    "Concerns mount as Xeronex fails to meet key trial endpoints. Company shares dip as confidence wavers.",
];

/// News pool for an approval decision.
pub const POSITIVE_FDA_BLURBS: [&str; 4] = [
    "The FDA has approved BIOTECH\u{2019}s new drug Xeronex for market release. Analysts expect a major boost to the company\u{2019}s revenues as it becomes the first therapy of its kind to reach commercial availability.",
    "FDA gives green light to BIOTECH\u{2019}s Xeronex. Approval positions company as a front-runner in new therapeutics.",
    "Historic day for BIOTECH: Xeronex approved for use in the U.S. Market analysts expect blockbuster revenue potential.",
    "Regulatory win: FDA endorses Xeronex after thorough review. CEO cites \u{201c}relentless innovation\u{201d} and patient-focused development.",
];

/// News pool for a rejection decision.
pub const NEGATIVE_FDA_BLURBS: [&str; 4] = [
    "The FDA has rejected BIOTECH\u{2019}s application for Xeronex. The agency cited concerns over insufficient efficacy and unresolved safety issues in the final submission package.",
    "FDA turns down Xeronex application, citing data inconsistencies and safety concerns. BIOTECH expected to revise and resubmit.",
    "BIOTECH setback: FDA rejects Xeronex. Company vows to conduct additional studies and address regulator concerns.",
    "Approval hopes dashed as Xeronex fails to secure FDA clearance. \u{201c}Disappointing but not surprising,\u{201d} says one analyst.",
];

/// Which order-flow driver the controller runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioKind {
    /// The two-event biotech narrative with scheduled news.
    Biotech,
    /// The demonstration flow with a single mid-run target step.
    Demo,
}

/// Construction-time parameters for a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Ticker of the accounting currency.
    pub currency_ticker: String,
    /// Ticker of the simulated stock.
    pub stock_ticker: String,
    /// Reserved username of the scripted market-maker agent.
    pub agent_username: String,
    /// Simulated horizon `T`.
    pub horizon: f64,
    /// Total steps `N` per run.
    pub total_steps: Tick,
    /// Look-ahead length for the leaky-reversion term.
    pub extra_steps: usize,
    /// Price the base path starts at.
    pub initial_price: f64,
    /// Final price on a positive outcome.
    pub up_price: f64,
    /// Final price on a negative outcome.
    pub down_price: f64,
    /// Probability the preliminary trial results are good.
    pub preliminary_probability: f64,
    /// Probability of approval given good preliminary results.
    pub fda_probability: f64,
    /// Tick at which the preliminary results land.
    pub preliminary_tick: Tick,
    /// Tick at which the regulatory decision lands.
    pub fda_tick: Tick,
    /// Fraction of the agent's open orders pruned per tick.
    pub removal_percentage: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            currency_ticker: "CAD".to_string(),
            stock_ticker: "BIOTECH".to_string(),
            agent_username: "AGENT".to_string(),
            horizon: 1.0,
            total_steps: 1_000,
            extra_steps: 100,
            initial_price: 100.0,
            up_price: 150.0,
            down_price: 50.0,
            preliminary_probability: 0.5,
            fda_probability: 0.75,
            preliminary_tick: 500,
            fda_tick: 900,
            removal_percentage: 0.1,
        }
    }
}

/// A scheduled news blurb, attached to the delta of its tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct News {
    /// Tick the news landed on.
    pub tick: Tick,
    /// The blurb text.
    pub text: String,
}

/// What one `step` of the controller produced.
#[derive(Debug, Clone)]
pub struct ScenarioStep {
    /// The kernel's delta for the executed tick.
    pub delta: TickDelta,
    /// News that landed on this tick.
    pub new_news: Vec<News>,
    /// True when the run completed (the controller has already reset).
    pub finished: bool,
}

/// Drives one scenario run after another: samples the narrative (base
/// path and news) at reset, advances driver and kernel each step, and
/// answers snapshot queries for subscribers.
pub struct ScenarioController {
    kind: ScenarioKind,
    config: ScenarioConfig,
    kernel: SimulationKernel,
    rng: ChaCha8Rng,
    currency_id: SecurityId,
    stock_id: SecurityId,
    agent_id: UserId,
    flow: Box<dyn OrderFlow + Send>,
    news_schedule: HashMap<Tick, String>,
    news_log: Vec<News>,
}

impl ScenarioController {
    /// Build the controller, register the currency, stock, and agent, and
    /// sample the first run's narrative.
    pub fn new(kind: ScenarioKind, config: ScenarioConfig, seed: u64) -> Self {
        let mut kernel = SimulationKernel::new(config.horizon, config.total_steps);
        let currency_id = kernel.add_security(Security::currency(&config.currency_ticker));
        let stock_id = kernel.add_security(Security::stock(
            &config.stock_ticker,
            &config.currency_ticker,
        ));
        let agent_id = kernel.add_user(&config.agent_username);

        let mut controller = Self {
            kind,
            config,
            kernel,
            rng: ChaCha8Rng::seed_from_u64(seed),
            currency_id,
            stock_id,
            agent_id,
            // Placeholder; reset installs the real driver.
            flow: Box::new(DemoFlow::new(agent_id, 0.0)),
            news_schedule: HashMap::new(),
            news_log: Vec::new(),
        };
        controller.reset();
        controller
    }

    /// Execute one tick: drive the order flow, run matching and
    /// settlement, attach any scheduled news, and reset when the run
    /// completes.
    pub fn step(&mut self) -> Result<ScenarioStep, SimulationError> {
        self.flow
            .drive(&mut self.kernel, self.stock_id, &mut self.rng)?;
        let delta = self.kernel.advance_tick()?;
        self.flow.observe(&self.kernel, self.stock_id);

        let mut new_news = Vec::new();
        if let Some(text) = self.news_schedule.get(&delta.tick) {
            let news = News {
                tick: delta.tick,
                text: text.clone(),
            };
            self.news_log.push(news.clone());
            new_news.push(news);
        }

        let finished = delta.finished;
        if finished {
            info!("run finished at tick {}; resetting scenario", delta.tick);
            self.reset();
        }
        Ok(ScenarioStep {
            delta,
            new_news,
            finished,
        })
    }

    /// Start a fresh run: empty books, rewound tick, freshly sampled base
    /// path and news. User and security registrations survive, and order
    /// ids keep counting up.
    pub fn reset(&mut self) {
        self.kernel.reset_simulation();
        self.news_log.clear();
        self.news_schedule.clear();

        match self.kind {
            ScenarioKind::Biotech => {
                let (base_path, good_preliminary, fda_accepted) = self.sample_base_path();
                let preliminary_pool = if good_preliminary {
                    &POSITIVE_PRELIMINARY_BLURBS
                } else {
                    &NEGATIVE_PRELIMINARY_BLURBS
                };
                let fda_pool = if fda_accepted {
                    &POSITIVE_FDA_BLURBS
                } else {
                    &NEGATIVE_FDA_BLURBS
                };
                let preliminary = preliminary_pool[self.rng.gen_range(0..preliminary_pool.len())];
                let decision = fda_pool[self.rng.gen_range(0..fda_pool.len())];
                self.news_schedule
                    .insert(self.config.preliminary_tick, preliminary.to_string());
                self.news_schedule
                    .insert(self.config.fda_tick, decision.to_string());

                self.flow = Box::new(BiotechFlow::new(
                    self.agent_id,
                    base_path,
                    self.config.extra_steps,
                    self.config.removal_percentage,
                    biotech_volatility,
                ));
                info!(
                    "biotech scenario sampled: preliminary_good={} fda_accepted={}",
                    good_preliminary, fda_accepted
                );
            }
            ScenarioKind::Demo => {
                self.flow = Box::new(DemoFlow::new(
                    self.agent_id,
                    self.config.removal_percentage,
                ));
            }
        }
    }

    /// Sample the decision tree and lay out the target-price path.
    ///
    /// The path covers one extra entry beyond `total + extra` so the
    /// look-ahead index stays in range on the final tick.
    fn sample_base_path(&mut self) -> (Vec<f64>, bool, bool) {
        let config = &self.config;
        let good_preliminary = self.rng.gen_range(0.0..1.0) < config.preliminary_probability;
        let draw: f64 = self.rng.gen_range(0.0..1.0);
        let fda_accepted = if good_preliminary {
            draw < config.fda_probability
        } else {
            draw > config.fda_probability
        };

        let len = config.total_steps as usize + config.extra_steps + 1;
        let mut path = vec![config.initial_price; len];
        let conditional = if good_preliminary {
            config.fda_probability * config.up_price
                + (1.0 - config.fda_probability) * config.down_price
        } else {
            (1.0 - config.fda_probability) * config.up_price
                + config.fda_probability * config.down_price
        };
        let final_price = if fda_accepted {
            config.up_price
        } else {
            config.down_price
        };

        let preliminary = (config.preliminary_tick as usize).min(len);
        let decision = (config.fda_tick as usize).min(len);
        for target in &mut path[preliminary..decision] {
            *target = conditional;
        }
        for target in &mut path[decision..] {
            *target = final_price;
        }
        (path, good_preliminary, fda_accepted)
    }

    /// Register a user (or return their existing id).
    pub fn register_user(&mut self, username: &str) -> UserId {
        self.kernel.add_user(username)
    }

    /// Read-only access to the kernel for snapshot queries.
    pub fn kernel(&self) -> &SimulationKernel {
        &self.kernel
    }

    /// News already published during the current run.
    pub fn news_log(&self) -> &[News] {
        &self.news_log
    }

    /// The scripted agent's user id.
    pub fn agent_id(&self) -> UserId {
        self.agent_id
    }

    /// The simulated stock's security id.
    pub fn stock_id(&self) -> SecurityId {
        self.stock_id
    }

    /// The accounting currency's security id.
    pub fn currency_id(&self) -> SecurityId {
        self.currency_id
    }
}
