//! Kernel-level tests: routing, settlement, lifecycle, and validation.

use marketsim_rs::prelude::*;

fn two_security_kernel(total_steps: u64) -> (SimulationKernel, SecurityId, SecurityId) {
    let mut kernel = SimulationKernel::new(1.0, total_steps);
    let currency = kernel.add_security(Security::currency("CAD"));
    let stock = kernel.add_security(Security::stock("BIOTECH", "CAD"));
    (kernel, currency, stock)
}

#[test]
fn submit_match_and_settle_updates_both_portfolios() {
    let (mut kernel, currency, stock) = two_security_kernel(10);
    let alice = kernel.add_user("ALICE");
    let bob = kernel.add_user("BOB");

    kernel
        .submit_limit_order(alice, stock, Side::Bid, 100.0, 5)
        .unwrap();
    kernel
        .submit_limit_order(bob, stock, Side::Ask, 100.0, 3)
        .unwrap();
    let delta = kernel.advance_tick().unwrap();

    assert_eq!(delta.tick, 0);
    assert_eq!(delta.transactions[stock].len(), 1);
    let fill = delta.transactions[stock][0];
    assert_eq!(fill.volume, 3);
    assert_eq!(fill.buyer_id, alice);
    assert_eq!(fill.seller_id, bob);

    let alice_holdings = kernel.user_portfolio(alice).unwrap();
    assert_eq!(alice_holdings[stock], 3.0);
    assert_eq!(alice_holdings[currency], -300.0);
    let bob_holdings = kernel.user_portfolio(bob).unwrap();
    assert_eq!(bob_holdings[stock], -3.0);
    assert_eq!(bob_holdings[currency], 300.0);

    assert!(kernel.security_holdings_total(stock).abs() < 1e-9);
    assert!(kernel.security_holdings_total(currency).abs() < 1e-9);
}

#[test]
fn delta_classifies_partial_and_full_fills() {
    let (mut kernel, _, stock) = two_security_kernel(10);
    let alice = kernel.add_user("ALICE");
    let bob = kernel.add_user("BOB");

    let bid = kernel
        .submit_limit_order(alice, stock, Side::Bid, 100.0, 5)
        .unwrap();
    let ask = kernel
        .submit_limit_order(bob, stock, Side::Ask, 100.0, 3)
        .unwrap();
    let delta = kernel.advance_tick().unwrap();

    assert_eq!(delta.partially_filled[stock], vec![bid]);
    assert_eq!(delta.fully_filled[stock], vec![ask]);
    assert_eq!(delta.submitted[stock].bids.len(), 1);
    assert_eq!(delta.submitted[stock].asks.len(), 1);
    assert_eq!(delta.books[stock].bids[0].volume, 2);
    assert!(delta.books[stock].asks.is_empty());
}

#[test]
fn orders_are_stamped_with_the_submitting_tick() {
    let (mut kernel, _, stock) = two_security_kernel(10);
    let alice = kernel.add_user("ALICE");

    kernel
        .submit_limit_order(alice, stock, Side::Bid, 90.0, 1)
        .unwrap();
    kernel.advance_tick().unwrap();
    kernel
        .submit_limit_order(alice, stock, Side::Bid, 91.0, 1)
        .unwrap();
    let delta = kernel.advance_tick().unwrap();

    assert_eq!(delta.tick, 1);
    assert_eq!(delta.submitted[stock].bids[0].timestamp, 1);
}

#[test]
fn advance_past_the_final_step_fails() {
    let (mut kernel, _, _) = two_security_kernel(2);
    kernel.add_user("ALICE");

    assert_eq!(kernel.phase(), SimulationPhase::Fresh);
    let first = kernel.advance_tick().unwrap();
    assert!(!first.finished);
    assert_eq!(kernel.phase(), SimulationPhase::Running);

    let second = kernel.advance_tick().unwrap();
    assert!(second.finished);
    assert_eq!(kernel.phase(), SimulationPhase::Finished);

    let err = kernel.advance_tick().unwrap_err();
    assert_eq!(err, SimulationError::SimulationFinished { tick: 2 });
}

#[test]
fn reset_preserves_registrations_and_order_id_monotonicity() {
    let (mut kernel, _, stock) = two_security_kernel(5);
    let alice = kernel.add_user("ALICE");

    kernel
        .submit_limit_order(alice, stock, Side::Bid, 100.0, 5)
        .unwrap();
    let high_water = kernel.next_order_id();
    kernel.advance_tick().unwrap();

    kernel.reset_simulation();

    assert_eq!(kernel.current_tick(), 0);
    assert_eq!(kernel.phase(), SimulationPhase::Fresh);
    assert_eq!(kernel.users().len(), 1);
    assert_eq!(kernel.securities().len(), 2);
    assert_eq!(kernel.bid_count(stock), 0);
    assert!(kernel.transactions(stock).is_empty());
    assert_eq!(kernel.user_portfolio(alice).unwrap()[stock], 0.0);

    let next = kernel
        .submit_limit_order(alice, stock, Side::Bid, 100.0, 5)
        .unwrap();
    assert!(next >= high_water);
}

#[test]
fn cancel_requires_the_owner() {
    let (mut kernel, _, stock) = two_security_kernel(10);
    let alice = kernel.add_user("ALICE");
    let bob = kernel.add_user("BOB");

    let order = kernel
        .submit_limit_order(alice, stock, Side::Bid, 100.0, 5)
        .unwrap();

    let err = kernel.submit_cancel_order(bob, stock, order).unwrap_err();
    assert_eq!(
        err,
        SimulationError::NotOrderOwner {
            order_id: order,
            user_id: bob
        }
    );
    assert_eq!(kernel.bid_count(stock), 1);

    kernel.submit_cancel_order(alice, stock, order).unwrap();
    assert_eq!(kernel.bid_count(stock), 0);

    let err = kernel.submit_cancel_order(alice, stock, order).unwrap_err();
    assert_eq!(err, SimulationError::OrderNotFound(order));
}

#[test]
fn submissions_are_validated_at_the_boundary() {
    let (mut kernel, _, stock) = two_security_kernel(10);
    let alice = kernel.add_user("ALICE");

    assert!(matches!(
        kernel.submit_limit_order(99, stock, Side::Bid, 100.0, 5),
        Err(SimulationError::UnknownUser(99))
    ));
    assert!(matches!(
        kernel.submit_limit_order(alice, 9, Side::Bid, 100.0, 5),
        Err(SimulationError::UnknownSecurity(9))
    ));
    assert!(matches!(
        kernel.submit_limit_order(alice, stock, Side::Bid, -1.0, 5),
        Err(SimulationError::InvalidPrice { .. })
    ));
    assert!(matches!(
        kernel.submit_limit_order(alice, stock, Side::Bid, f64::NAN, 5),
        Err(SimulationError::InvalidPrice { .. })
    ));
    assert!(matches!(
        kernel.submit_limit_order(alice, stock, Side::Bid, 100.0, 0),
        Err(SimulationError::InvalidVolume { volume: 0 })
    ));
    // Nothing reached the book.
    assert_eq!(kernel.bid_count(stock), 0);
}

#[test]
fn prices_are_rounded_to_the_security_decimals() {
    let (mut kernel, _, stock) = two_security_kernel(10);
    let alice = kernel.add_user("ALICE");

    kernel
        .submit_limit_order(alice, stock, Side::Bid, 100.256, 1)
        .unwrap();
    let top = kernel.top_bid(stock).unwrap();
    assert_eq!(top.price, 10_026);
}

#[test]
fn checked_submissions_reserve_and_release_balances() {
    let (mut kernel, currency, stock) = two_security_kernel(10);
    let alice = kernel.add_user("ALICE");
    let bob = kernel.add_user("BOB");

    let bid = kernel
        .submit_limit_order(alice, stock, Side::Bid, 100.0, 5)
        .unwrap();
    assert_eq!(kernel.user_reserved(alice).unwrap()[currency], 500.0);

    kernel
        .submit_limit_order(bob, stock, Side::Ask, 100.0, 3)
        .unwrap();
    assert_eq!(kernel.user_reserved(bob).unwrap()[stock], 3.0);

    kernel.advance_tick().unwrap();
    // The ask filled completely, the bid for three of its five units.
    assert_eq!(kernel.user_reserved(bob).unwrap()[stock], 0.0);
    assert_eq!(kernel.user_reserved(alice).unwrap()[currency], 200.0);

    kernel.submit_cancel_order(alice, stock, bid).unwrap();
    assert_eq!(kernel.user_reserved(alice).unwrap()[currency], 0.0);
}

#[test]
fn direct_insert_skips_reservation_bookkeeping() {
    let (mut kernel, currency, stock) = two_security_kernel(10);
    let agent = kernel.add_user("AGENT");

    kernel
        .direct_insert_limit_order(agent, stock, Side::Bid, 100.0, 5)
        .unwrap();
    assert_eq!(kernel.user_reserved(agent).unwrap()[currency], 0.0);
    assert_eq!(kernel.bid_count(stock), 1);
}

#[test]
fn ticker_lookups_are_consistent() {
    let (kernel, currency, stock) = two_security_kernel(10);

    assert_eq!(kernel.security_id("CAD").unwrap(), currency);
    assert_eq!(kernel.security_id("BIOTECH").unwrap(), stock);
    assert_eq!(kernel.ticker(stock).unwrap(), "BIOTECH");
    assert_eq!(kernel.all_tickers(), vec!["CAD", "BIOTECH"]);
    assert!(matches!(
        kernel.security_id("GOLD"),
        Err(SimulationError::UnknownTicker(_))
    ));
}

#[test]
fn time_accessors_follow_the_tick() {
    let (mut kernel, _, _) = two_security_kernel(1_000);
    kernel.add_user("ALICE");

    assert_eq!(kernel.dt(), 1.0 / 1_000.0);
    assert_eq!(kernel.t(), 0.0);
    kernel.advance_tick().unwrap();
    assert_eq!(kernel.t(), 1.0 / 1_000.0);
}
