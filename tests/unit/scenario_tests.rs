//! Scenario-level tests: determinism, news scheduling, reset continuity,
//! and long-run stability.

use marketsim_rs::prelude::*;
use marketsim_rs::simulation::{
    NEGATIVE_FDA_BLURBS, NEGATIVE_PRELIMINARY_BLURBS, POSITIVE_FDA_BLURBS,
    POSITIVE_PRELIMINARY_BLURBS,
};

fn biotech_controller(seed: u64) -> ScenarioController {
    ScenarioController::new(ScenarioKind::Biotech, ScenarioConfig::default(), seed)
}

/// Run one full scenario, returning every step's news, the final delta,
/// and the last midpoint observed while both sides were quoted (in minor
/// units).
fn run_to_completion(
    controller: &mut ScenarioController,
) -> (Vec<News>, TickDelta, f64) {
    let stock = controller.stock_id();
    let mut news = Vec::new();
    let mut midpoint = f64::NAN;
    loop {
        let step = controller.step().expect("scenario step");
        news.extend(step.new_news.clone());
        let book = &step.delta.books[stock];
        if let (Some(bid), Some(ask)) = (book.bids.first(), book.asks.first()) {
            midpoint = (bid.price as f64 + ask.price as f64) / 2.0;
        }
        if step.finished {
            assert!(midpoint.is_finite());
            return (news, step.delta, midpoint);
        }
    }
}

#[test]
fn identical_seeds_produce_bit_identical_runs() {
    let mut first = biotech_controller(42);
    let mut second = biotech_controller(42);
    let stock = first.stock_id();

    let (news_a, delta_a, midpoint_a) = run_to_completion(&mut first);
    let (news_b, delta_b, midpoint_b) = run_to_completion(&mut second);

    assert_eq!(news_a, news_b);
    assert_eq!(delta_a.books[stock].bids, delta_b.books[stock].bids);
    assert_eq!(delta_a.books[stock].asks, delta_b.books[stock].asks);
    assert_eq!(delta_a.transactions[stock], delta_b.transactions[stock]);
    assert_eq!(midpoint_a.to_bits(), midpoint_b.to_bits());
}

#[test]
fn different_seeds_diverge() {
    let mut first = biotech_controller(42);
    let mut second = biotech_controller(43);

    // A handful of ticks is enough for the flows to separate.
    let mut diverged = false;
    for _ in 0..20 {
        let a = first.step().unwrap();
        let b = second.step().unwrap();
        if a.delta.books != b.delta.books
            || a.delta.submitted[first.stock_id()].bids != b.delta.submitted[second.stock_id()].bids
        {
            diverged = true;
            break;
        }
    }
    assert!(diverged);
}

#[test]
fn exactly_two_news_items_per_run_drawn_from_matching_pools() {
    let mut controller = biotech_controller(42);
    let (news, _, last_midpoint) = run_to_completion(&mut controller);

    assert_eq!(news.len(), 2);
    assert_eq!(news[0].tick, 500);
    assert_eq!(news[1].tick, 900);

    let preliminary_pool: Vec<&str> = POSITIVE_PRELIMINARY_BLURBS
        .iter()
        .chain(NEGATIVE_PRELIMINARY_BLURBS.iter())
        .copied()
        .collect();
    assert!(preliminary_pool.contains(&news[0].text.as_str()));

    let approved = POSITIVE_FDA_BLURBS.contains(&news[1].text.as_str());
    let rejected = NEGATIVE_FDA_BLURBS.contains(&news[1].text.as_str());
    assert!(approved ^ rejected);

    // After the decision the flow reverts toward the sampled outcome, so
    // the closing midpoint sits on the matching side of the start price.
    let midpoint = last_midpoint / 100.0;
    if approved {
        assert!(midpoint > 100.0);
    } else {
        assert!(midpoint < 100.0);
    }
}

#[test]
fn finished_run_resets_and_keeps_ids_monotonic() {
    let mut controller = biotech_controller(1);
    let (_, final_delta, _) = run_to_completion(&mut controller);
    assert!(final_delta.finished);

    // The controller already reset itself.
    let kernel = controller.kernel();
    let high_water = kernel.next_order_id();
    assert_eq!(kernel.current_tick(), 0);
    assert_eq!(kernel.phase(), SimulationPhase::Fresh);
    assert_eq!(kernel.users().len(), 1);
    assert_eq!(kernel.securities().len(), 2);
    assert!(controller.news_log().is_empty());
    assert_eq!(kernel.bid_count(controller.stock_id()), 0);

    // The next run reseeds the book; its ids continue where the last run
    // stopped.
    let step = controller.step().unwrap();
    let stock = controller.stock_id();
    assert_eq!(step.delta.tick, 0);
    let submitted = &step.delta.submitted[stock];
    assert_eq!(submitted.bids.len() + submitted.asks.len(), 100);
    assert!(
        submitted
            .bids
            .iter()
            .chain(submitted.asks.iter())
            .all(|order| order.order_id >= high_water)
    );
}

#[test]
fn seeded_book_starts_uncrossed_and_deep() {
    let mut controller = biotech_controller(3);
    let stock = controller.stock_id();
    let step = controller.step().unwrap();

    let book = &step.delta.books[stock];
    assert_eq!(book.bids.len(), 50);
    assert_eq!(book.asks.len(), 50);
    assert!(step.delta.transactions[stock].is_empty());
    assert!(book.bids[0].price < book.asks[0].price);
}

#[test]
fn long_run_keeps_a_live_book_and_trades() {
    let mut controller = biotech_controller(7);
    let stock = controller.stock_id();

    let mut total_fills = 0usize;
    for _ in 0..300 {
        let step = controller.step().unwrap();
        let book = &step.delta.books[stock];
        assert!(!book.bids.is_empty() || !book.asks.is_empty());
        total_fills += step.delta.transactions[stock].len();
    }
    assert!(total_fills > 0);
    assert_eq!(controller.kernel().current_tick(), 300);
}

#[test]
fn zero_sum_conservation_holds_across_a_run_prefix() {
    let mut controller = biotech_controller(11);
    let stock = controller.stock_id();
    let currency = controller.currency_id();

    for _ in 0..100 {
        controller.step().unwrap();
        let kernel = controller.kernel();
        assert!(kernel.security_holdings_total(stock).abs() < 1e-6);
        assert!(kernel.security_holdings_total(currency).abs() < 1e-6);
    }
}

#[test]
fn demo_scenario_drives_flow_without_news() {
    let mut controller =
        ScenarioController::new(ScenarioKind::Demo, ScenarioConfig::default(), 5);
    let stock = controller.stock_id();

    for _ in 0..50 {
        let step = controller.step().unwrap();
        assert!(step.new_news.is_empty());
        let book = &step.delta.books[stock];
        assert!(!book.bids.is_empty() || !book.asks.is_empty());
    }
}
