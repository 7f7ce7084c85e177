// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::{Arc, atomic::AtomicBool};

use chrono::{Duration, TimeZone, Utc};
use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use ebid_matching::{EngineConfig, MatchingEngine};
use ebid_settlement::MemoryOrderStore;
use ebid_types::{AccountId, NewOrder, OrderType, Side};
use rust_decimal::Decimal;

const BOOK_SIZES: &[usize] = &[100, 1_000, 5_000];

/// Crossed book: every buy bids at or above every ask, so each cycle
/// settles roughly one trade per order
fn crossed_book(orders_per_side: usize) -> Arc<MemoryOrderStore> {
	let store = Arc::new(MemoryOrderStore::new());
	let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

	for i in 0..orders_per_side {
		let tick = Decimal::new((i % 50) as i64, 2);
		let created_at = base + Duration::milliseconds(i as i64);
		let quantity = 1 + (i as u64 % 10);

		store
			.insert_order(NewOrder {
				account_id: AccountId(1),
				symbol: "BENCH".to_string(),
				side: Side::Buy,
				order_type: OrderType::Limit,
				price: Some(Decimal::new(10_100, 2) + tick),
				quantity,
				created_at,
			})
			.ok();
		store
			.insert_order(NewOrder {
				account_id: AccountId(2),
				symbol: "BENCH".to_string(),
				side: Side::Sell,
				order_type: OrderType::Limit,
				price: Some(Decimal::new(10_000, 2) - tick),
				quantity,
				created_at,
			})
			.ok();
	}

	store
}

fn bench_cycle(c: &mut Criterion) {
	let mut group = c.benchmark_group("matching_cycle");
	group.sample_size(20);

	for &size in BOOK_SIZES {
		group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
			b.iter_batched(
				|| {
					MatchingEngine::new(EngineConfig::default(), crossed_book(size))
						.unwrap_or_else(|e| panic!("engine config: {e}"))
				},
				|engine| engine.run_cycle(&AtomicBool::new(false)),
				BatchSize::LargeInput,
			);
		});
	}

	group.finish();
}

fn bench_idle_rescan(c: &mut Criterion) {
	// Nothing crosses: measures fetch and pairing cost alone
	let store = Arc::new(MemoryOrderStore::new());
	let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
	for i in 0..1_000 {
		let (side, price) = if i % 2 == 0 {
			(Side::Buy, Decimal::new(9_000, 2))
		} else {
			(Side::Sell, Decimal::new(11_000, 2))
		};
		store
			.insert_order(NewOrder {
				account_id: AccountId(1),
				symbol: "BENCH".to_string(),
				side,
				order_type: OrderType::Limit,
				price: Some(price),
				quantity: 5,
				created_at: base + Duration::milliseconds(i),
			})
			.ok();
	}

	let engine = MatchingEngine::new(EngineConfig::default(), store)
		.unwrap_or_else(|e| panic!("engine config: {e}"));
	let cancel = AtomicBool::new(false);

	c.bench_function("idle_rescan_1000", |b| b.iter(|| engine.run_cycle(&cancel)));
}

criterion_group!(benches, bench_cycle, bench_idle_rescan);
criterion_main!(benches);
