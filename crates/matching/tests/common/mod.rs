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

//! Shared fixtures for the matching integration tests

#![allow(dead_code)]

use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use ebid_matching::{EngineConfig, MatchingEngine};
use ebid_settlement::{
	MemoryOrderStore, OrderQuery, OrderStore, OrderUpdate, StoreError, StoreTransaction,
};
use ebid_types::{
	AccountId, NewOrder, NewTrade, Order, OrderId, OrderStatus, OrderType, Side, Trade,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;

pub const SYMBOL: &str = "AAPL";

pub fn at(secs: i64) -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap() + Duration::seconds(secs)
}

pub fn limit(side: Side, price: Decimal, quantity: u64, secs: i64) -> NewOrder {
	NewOrder {
		account_id: AccountId(100),
		symbol: SYMBOL.to_string(),
		side,
		order_type: OrderType::Limit,
		price: Some(price),
		quantity,
		created_at: at(secs),
	}
}

pub fn market(side: Side, quantity: u64, secs: i64) -> NewOrder {
	NewOrder {
		account_id: AccountId(200),
		symbol: SYMBOL.to_string(),
		side,
		order_type: OrderType::Market,
		price: None,
		quantity,
		created_at: at(secs),
	}
}

pub fn engine_config(batch_size: usize) -> EngineConfig {
	EngineConfig {
		batch_size,
		..EngineConfig::default()
	}
}

pub fn engine(store: Arc<dyn OrderStore>) -> MatchingEngine {
	MatchingEngine::new(engine_config(100), store).unwrap()
}

pub fn run(engine: &MatchingEngine) -> ebid_matching::CycleReport {
	engine.run_cycle(&AtomicBool::new(false)).unwrap()
}

/// Check every order against the trade log
///
/// - filled quantity equals the sum of its trades
/// - remaining never exceeds quantity
/// - `remaining == 0` exactly when filled; active orders have remaining
pub fn assert_consistent(store: &MemoryOrderStore) {
	let trades = store.trades();

	for order in store.orders() {
		let traded: u64 = trades
			.iter()
			.filter(|t| t.buy_order_id == order.id || t.sell_order_id == order.id)
			.map(|t| t.quantity)
			.sum();

		assert!(order.remaining <= order.quantity, "order {}", order.id);
		assert_eq!(order.filled(), traded, "order {}", order.id);
		assert_eq!(
			order.remaining == 0,
			order.status == OrderStatus::Filled,
			"order {} is {} with remaining {}",
			order.id,
			order.status,
			order.remaining
		);
		if order.status.is_active() {
			assert!(order.remaining > 0, "order {}", order.id);
		}
	}
}

/// Store wrapper with switchable failures
pub struct FlakyStore {
	pub inner: MemoryOrderStore,
	pub fail_queries: AtomicBool,
	/// Number of upcoming trade inserts to fail
	pub fail_trades: AtomicUsize,
	pub corrupt_updates: AtomicBool,
	/// Orders cancelled right before the next transaction begins
	pub cancel_on_begin: Mutex<Vec<OrderId>>,
}

impl FlakyStore {
	pub fn new() -> Self {
		Self {
			inner: MemoryOrderStore::new(),
			fail_queries: AtomicBool::new(false),
			fail_trades: AtomicUsize::new(0),
			corrupt_updates: AtomicBool::new(false),
			cancel_on_begin: Mutex::new(Vec::new()),
		}
	}
}

struct FlakyTransaction<'a> {
	inner: Box<dyn StoreTransaction + 'a>,
	store: &'a FlakyStore,
}

impl StoreTransaction for FlakyTransaction<'_> {
	fn conditional_update_order(&mut self, update: &OrderUpdate) -> Result<u64, StoreError> {
		if self.store.corrupt_updates.load(Ordering::SeqCst) {
			return Err(StoreError::Invariant(format!(
				"order {} remaining would increase",
				update.order_id
			)));
		}
		self.inner.conditional_update_order(update)
	}

	fn create_trade(&mut self, trade: NewTrade) -> Result<Trade, StoreError> {
		let pending = self.store.fail_trades.load(Ordering::SeqCst);
		if pending > 0 {
			self.store.fail_trades.store(pending - 1, Ordering::SeqCst);
			return Err(StoreError::Backend("trade insert failed".to_string()));
		}
		self.inner.create_trade(trade)
	}

	fn commit(self: Box<Self>) -> Result<(), StoreError> {
		self.inner.commit()
	}
}

impl OrderStore for FlakyStore {
	fn query_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, StoreError> {
		if self.fail_queries.load(Ordering::SeqCst) {
			return Err(StoreError::Unavailable("connection reset".to_string()));
		}
		self.inner.query_orders(query)
	}

	fn symbols(&self) -> Result<Vec<String>, StoreError> {
		self.inner.symbols()
	}

	fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
		let pending = std::mem::take(&mut *self.cancel_on_begin.lock());
		for order_id in pending {
			// A second cancellation of the same order is rejected by the store
			let _ = self.inner.cancel_order(order_id);
		}
		Ok(Box::new(FlakyTransaction {
			inner: self.inner.begin()?,
			store: self,
		}))
	}
}
