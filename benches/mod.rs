//! Criterion benchmarks for the order book hot paths.

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use marketsim_rs::prelude::*;

fn populated_book(orders_per_side: u64) -> OrderBook {
    let book = OrderBook::new(0, "BENCH");
    for i in 0..orders_per_side {
        book.insert(LimitOrder {
            order_id: i,
            side: Side::Bid,
            price: 9_900 - (i % 50),
            volume: 1 + i % 10,
            timestamp: i,
            user_id: i % 4,
        })
        .unwrap();
        book.insert(LimitOrder {
            order_id: orders_per_side + i,
            side: Side::Ask,
            price: 10_100 + (i % 50),
            volume: 1 + i % 10,
            timestamp: i,
            user_id: i % 4,
        })
        .unwrap();
    }
    book
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert_into_1k_book", |b| {
        b.iter_batched(
            || populated_book(500),
            |book| {
                book.insert(LimitOrder {
                    order_id: 1_000_000,
                    side: Side::Bid,
                    price: 9_950,
                    volume: 5,
                    timestamp: 501,
                    user_id: 1,
                })
                .unwrap();
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_cancel(c: &mut Criterion) {
    c.bench_function("cancel_mid_book", |b| {
        b.iter_batched(
            || populated_book(500),
            |book| {
                book.cancel(250).unwrap();
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_crossed_matching(c: &mut Criterion) {
    c.bench_function("match_crossed_batch", |b| {
        b.iter_batched(
            || {
                let book = populated_book(500);
                // Cross the book with a sweep through several levels.
                book.insert(LimitOrder {
                    order_id: 2_000_000,
                    side: Side::Bid,
                    price: 10_120,
                    volume: 200,
                    timestamp: 501,
                    user_id: 2,
                })
                .unwrap();
                book
            },
            |book| {
                book.process_transactions(501);
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_depth(c: &mut Criterion) {
    c.bench_function("cumulative_depth_1k_book", |b| {
        let book = populated_book(500);
        b.iter(|| book.cumulative_depth())
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_cancel,
    bench_crossed_matching,
    bench_depth
);
criterion_main!(benches);
