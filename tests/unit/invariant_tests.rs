//! Property tests: the book invariants must survive arbitrary
//! interleavings of submits, cancels, and matching.

use marketsim_rs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert { side: Side, price: u64, volume: u64 },
    Cancel { order_id: u64 },
    Match,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<bool>(), 9_900u64..10_100, 1u64..20).prop_map(|(bid, price, volume)| {
            Op::Insert {
                side: if bid { Side::Bid } else { Side::Ask },
                price,
                volume,
            }
        }),
        2 => (0u64..200).prop_map(|order_id| Op::Cancel { order_id }),
        1 => Just(Op::Match),
    ]
}

proptest! {
    #[test]
    fn book_invariants_survive_random_operation_sequences(
        ops in proptest::collection::vec(op_strategy(), 1..200)
    ) {
        let book = OrderBook::new(0, "PROP");
        let mut next_id = 0u64;

        for (tick, op) in ops.iter().enumerate() {
            match op {
                Op::Insert { side, price, volume } => {
                    book.insert(LimitOrder {
                        order_id: next_id,
                        side: *side,
                        price: *price,
                        volume: *volume,
                        timestamp: tick as u64,
                        user_id: next_id % 3,
                    })
                    .unwrap();
                    next_id += 1;
                }
                Op::Cancel { order_id } => {
                    // Misses are fine; a second cancel must be a no-op.
                    let first = book.cancel(*order_id);
                    if first.is_some() {
                        prop_assert!(book.cancel(*order_id).is_none());
                    }
                }
                Op::Match => {
                    book.process_transactions(tick as u64);
                }
            }
            prop_assert!(book.check_integrity());
        }

        book.process_transactions(ops.len() as u64);
        prop_assert!(book.check_integrity());
        if let (Some(bid), Some(ask)) = (book.top_bid(), book.top_ask()) {
            prop_assert!(bid.price < ask.price);
        }
    }

    #[test]
    fn fills_conserve_volume(
        orders in proptest::collection::vec(
            (any::<bool>(), 9_950u64..10_050, 1u64..15),
            2..60
        )
    ) {
        let book = OrderBook::new(0, "PROP");
        let mut submitted_volume = 0u64;
        for (id, (bid, price, volume)) in orders.iter().enumerate() {
            book.insert(LimitOrder {
                order_id: id as u64,
                side: if *bid { Side::Bid } else { Side::Ask },
                price: *price,
                volume: *volume,
                timestamp: 0,
                user_id: 0,
            })
            .unwrap();
            submitted_volume += volume;
        }

        let fills = book.process_transactions(0);

        let filled: u64 = fills.iter().map(|fill| 2 * fill.volume).sum();
        let resting: u64 = book
            .iter_side(Side::Bid)
            .chain(book.iter_side(Side::Ask))
            .map(|order| order.volume)
            .sum();
        prop_assert_eq!(filled + resting, submitted_volume);
        for fill in &fills {
            prop_assert!(fill.volume > 0);
        }
    }

    #[test]
    fn kernel_portfolios_stay_zero_sum(
        rounds in proptest::collection::vec(
            proptest::collection::vec((0u64..3, any::<bool>(), 95.0f64..105.0, 1u64..10), 1..10),
            1..10
        )
    ) {
        let mut kernel = SimulationKernel::new(1.0, 1_000);
        let currency = kernel.add_security(Security::currency("CAD"));
        let stock = kernel.add_security(Security::stock("BIOTECH", "CAD"));
        for name in ["A", "B", "C"] {
            kernel.add_user(name);
        }

        for round in &rounds {
            for (user, bid, price, volume) in round {
                let side = if *bid { Side::Bid } else { Side::Ask };
                kernel
                    .submit_limit_order(*user, stock, side, *price, *volume)
                    .unwrap();
            }
            kernel.advance_tick().unwrap();
            prop_assert!(kernel.security_holdings_total(stock).abs() < 1e-6);
            prop_assert!(kernel.security_holdings_total(currency).abs() < 1e-6);
        }
    }
}
