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

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use ebid_types::{NewOrder, NewTrade, Order, OrderId, OrderStatus, OrderType, Trade, TradeId};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;

use crate::store::{OrderQuery, OrderStore, OrderUpdate, StoreError, StoreTransaction};

#[derive(Debug)]
struct Tables {
	orders: BTreeMap<OrderId, Order>,
	trades: Vec<Trade>,
	next_order_id: u64,
	next_trade_id: u64,
}

/// In-memory order store
///
/// Orders and trades live in a single table set behind one lock.
/// Reads take the lock only for the duration of the copy; a transaction
/// holds it from [`OrderStore::begin`] until commit or drop, which makes
/// transactions serializable against each other and against external
/// order creation and cancellation.
///
/// Writes made inside a transaction are staged and become visible only
/// on commit. Dropping an uncommitted transaction discards them.
#[derive(Debug)]
pub struct MemoryOrderStore {
	tables: Mutex<Tables>,
}

impl MemoryOrderStore {
	pub fn new() -> Self {
		Self {
			tables: Mutex::new(Tables {
				orders: BTreeMap::new(),
				trades: Vec::new(),
				next_order_id: 1,
				next_trade_id: 1,
			}),
		}
	}

	/// Insert a new order in `Pending` status
	pub fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
		if order.quantity == 0 {
			return Err(StoreError::Rejected("quantity must be positive".to_string()));
		}
		if order.order_type == OrderType::Limit {
			let Some(price) = order.price else {
				return Err(StoreError::Rejected(
					"limit order requires a price".to_string(),
				));
			};
			// Every trade on this order prints at most price x quantity
			if price.checked_mul(Decimal::from(order.quantity)).is_none() {
				return Err(StoreError::Rejected(format!(
					"notional {price} x {} out of range",
					order.quantity
				)));
			}
		}

		let mut tables = self.tables.lock();
		let id = OrderId(tables.next_order_id);
		tables.next_order_id += 1;

		let price = match order.order_type {
			OrderType::Limit => order.price,
			OrderType::Market => None,
		};
		let stored = Order {
			id,
			account_id: order.account_id,
			symbol: order.symbol,
			side: order.side,
			order_type: order.order_type,
			price,
			quantity: order.quantity,
			remaining: order.quantity,
			status: OrderStatus::Pending,
			created_at: order.created_at,
			updated_at: order.created_at,
		};
		tables.orders.insert(id, stored.clone());
		Ok(stored)
	}

	/// Cancel an active order
	///
	/// The remaining quantity is left as is; only the status changes.
	pub fn cancel_order(&self, order_id: OrderId) -> Result<Order, StoreError> {
		let mut tables = self.tables.lock();
		let order = tables
			.orders
			.get_mut(&order_id)
			.ok_or(StoreError::NotFound(order_id))?;

		if !order.status.is_active() {
			return Err(StoreError::InvalidState {
				order_id,
				status: order.status,
			});
		}

		order.status = OrderStatus::Cancelled;
		order.updated_at = Utc::now();
		Ok(order.clone())
	}

	pub fn order(&self, order_id: OrderId) -> Option<Order> {
		self.tables.lock().orders.get(&order_id).cloned()
	}

	/// All orders in id order
	pub fn orders(&self) -> Vec<Order> {
		self.tables.lock().orders.values().cloned().collect()
	}

	/// All trades in insertion order
	pub fn trades(&self) -> Vec<Trade> {
		self.tables.lock().trades.clone()
	}

	pub fn trade_count(&self) -> usize {
		self.tables.lock().trades.len()
	}
}

impl Default for MemoryOrderStore {
	fn default() -> Self {
		Self::new()
	}
}

impl OrderStore for MemoryOrderStore {
	fn query_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, StoreError> {
		let tables = self.tables.lock();

		let mut selected: Vec<&Order> = tables
			.orders
			.values()
			.filter(|o| query.matches(o))
			.collect();
		selected.sort_by(|a, b| query.sort.compare(&a.priority(), &b.priority()));

		Ok(selected
			.into_iter()
			.skip(query.offset)
			.take(query.limit)
			.cloned()
			.collect())
	}

	fn symbols(&self) -> Result<Vec<String>, StoreError> {
		let tables = self.tables.lock();
		let symbols: BTreeSet<&str> = tables
			.orders
			.values()
			.filter(|o| o.status.is_active())
			.map(|o| o.symbol.as_str())
			.collect();
		Ok(symbols.into_iter().map(str::to_string).collect())
	}

	fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
		let tables = self.tables.lock();
		let next_trade_id = tables.next_trade_id;
		Ok(Box::new(MemoryTransaction {
			tables,
			staged_orders: HashMap::new(),
			staged_trades: Vec::new(),
			next_trade_id,
		}))
	}
}

/// Transaction over [`MemoryOrderStore`]
struct MemoryTransaction<'a> {
	tables: MutexGuard<'a, Tables>,
	/// Post-update copies of orders written in this transaction
	staged_orders: HashMap<OrderId, Order>,
	staged_trades: Vec<Trade>,
	next_trade_id: u64,
}

impl MemoryTransaction<'_> {
	fn current(&self, order_id: OrderId) -> Option<&Order> {
		self.staged_orders
			.get(&order_id)
			.or_else(|| self.tables.orders.get(&order_id))
	}
}

impl StoreTransaction for MemoryTransaction<'_> {
	fn conditional_update_order(&mut self, update: &OrderUpdate) -> Result<u64, StoreError> {
		let Some(current) = self.current(update.order_id) else {
			return Ok(0);
		};

		if !current.status.is_active() || current.remaining < update.expected_min_remaining {
			return Ok(0);
		}

		if update.new_remaining > current.remaining {
			return Err(StoreError::Invariant(format!(
				"order {} remaining would grow from {} to {}",
				update.order_id, current.remaining, update.new_remaining
			)));
		}
		if update.new_status != OrderStatus::after_fill(update.new_remaining) {
			return Err(StoreError::Invariant(format!(
				"order {} status {} inconsistent with remaining {}",
				update.order_id, update.new_status, update.new_remaining
			)));
		}

		let mut updated = current.clone();
		updated.remaining = update.new_remaining;
		updated.status = update.new_status;
		updated.updated_at = update.updated_at;
		self.staged_orders.insert(update.order_id, updated);

		Ok(1)
	}

	fn create_trade(&mut self, trade: NewTrade) -> Result<Trade, StoreError> {
		let id = TradeId(self.next_trade_id);
		self.next_trade_id += 1;

		let trade = Trade::from_new(id, trade);
		self.staged_trades.push(trade.clone());
		Ok(trade)
	}

	fn commit(self: Box<Self>) -> Result<(), StoreError> {
		let MemoryTransaction {
			mut tables,
			staged_orders,
			staged_trades,
			next_trade_id,
		} = *self;

		for (order_id, order) in staged_orders {
			tables.orders.insert(order_id, order);
		}
		tables.trades.extend(staged_trades);
		tables.next_trade_id = next_trade_id;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{DateTime, Duration, TimeZone};
	use ebid_types::{AccountId, Side};
	use rust_decimal_macros::dec;

	fn t(secs: i64) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 3, 3, 9, 30, 0).unwrap() + Duration::seconds(secs)
	}

	fn limit(side: Side, symbol: &str, price: Decimal, quantity: u64, at: i64) -> NewOrder {
		NewOrder {
			account_id: AccountId(1),
			symbol: symbol.to_string(),
			side,
			order_type: OrderType::Limit,
			price: Some(price),
			quantity,
			created_at: t(at),
		}
	}

	fn market(side: Side, symbol: &str, quantity: u64, at: i64) -> NewOrder {
		NewOrder {
			account_id: AccountId(2),
			symbol: symbol.to_string(),
			side,
			order_type: OrderType::Market,
			price: None,
			quantity,
			created_at: t(at),
		}
	}

	#[test]
	fn test_insert_assigns_ids_and_pending_status() {
		let store = MemoryOrderStore::new();
		let a = store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 5, 0)).unwrap();
		let b = store.insert_order(market(Side::Sell, "AAPL", 3, 1)).unwrap();

		assert_eq!(a.id, OrderId(1));
		assert_eq!(b.id, OrderId(2));
		assert_eq!(a.status, OrderStatus::Pending);
		assert_eq!(a.remaining, 5);
		assert_eq!(b.price, None);
	}

	#[test]
	fn test_insert_rejects_invalid_orders() {
		let store = MemoryOrderStore::new();
		assert!(matches!(
			store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 0, 0)),
			Err(StoreError::Rejected(_))
		));

		let mut no_price = limit(Side::Buy, "AAPL", dec!(10), 1, 0);
		no_price.price = None;
		assert!(matches!(store.insert_order(no_price), Err(StoreError::Rejected(_))));

		let huge = limit(Side::Sell, "AAPL", dec!(10000000000), u64::MAX, 0);
		assert!(matches!(store.insert_order(huge), Err(StoreError::Rejected(_))));
		assert!(store.orders().is_empty());
	}

	#[test]
	fn test_query_sorts_buys_by_priority_and_pages() {
		let store = MemoryOrderStore::new();
		store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 1, 0)).unwrap(); // 1
		store.insert_order(limit(Side::Buy, "AAPL", dec!(12), 1, 1)).unwrap(); // 2
		store.insert_order(market(Side::Buy, "AAPL", 1, 2)).unwrap(); // 3
		store.insert_order(limit(Side::Buy, "AAPL", dec!(12), 1, 0)).unwrap(); // 4
		store.insert_order(limit(Side::Sell, "AAPL", dec!(9), 1, 0)).unwrap(); // 5

		let all = store
			.query_orders(&OrderQuery::active(Side::Buy, None, 0, 100))
			.unwrap();
		let ids: Vec<u64> = all.iter().map(|o| o.id.0).collect();
		assert_eq!(ids, vec![3, 4, 2, 1]);

		let page = store
			.query_orders(&OrderQuery::active(Side::Buy, None, 1, 2))
			.unwrap();
		let ids: Vec<u64> = page.iter().map(|o| o.id.0).collect();
		assert_eq!(ids, vec![4, 2]);

		let past_end = store
			.query_orders(&OrderQuery::active(Side::Buy, None, 10, 2))
			.unwrap();
		assert!(past_end.is_empty());
	}

	#[test]
	fn test_query_sorts_sells_ascending() {
		let store = MemoryOrderStore::new();
		store.insert_order(limit(Side::Sell, "AAPL", dec!(11), 1, 0)).unwrap(); // 1
		store.insert_order(limit(Side::Sell, "AAPL", dec!(10), 1, 5)).unwrap(); // 2
		store.insert_order(limit(Side::Sell, "AAPL", dec!(10), 1, 3)).unwrap(); // 3

		let sells = store
			.query_orders(&OrderQuery::active(Side::Sell, Some("AAPL"), 0, 100))
			.unwrap();
		let ids: Vec<u64> = sells.iter().map(|o| o.id.0).collect();
		assert_eq!(ids, vec![3, 2, 1]);
	}

	#[test]
	fn test_query_excludes_cancelled_and_other_symbols() {
		let store = MemoryOrderStore::new();
		let a = store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 1, 0)).unwrap();
		store.insert_order(limit(Side::Buy, "MSFT", dec!(10), 1, 0)).unwrap();
		store.cancel_order(a.id).unwrap();

		let aapl = store
			.query_orders(&OrderQuery::active(Side::Buy, Some("AAPL"), 0, 100))
			.unwrap();
		assert!(aapl.is_empty());
		assert_eq!(store.symbols().unwrap(), vec!["MSFT".to_string()]);
	}

	#[test]
	fn test_cancel_terminal_order_fails() {
		let store = MemoryOrderStore::new();
		let a = store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 1, 0)).unwrap();
		store.cancel_order(a.id).unwrap();

		assert!(matches!(
			store.cancel_order(a.id),
			Err(StoreError::InvalidState { .. })
		));
		assert!(matches!(
			store.cancel_order(OrderId(99)),
			Err(StoreError::NotFound(_))
		));
	}

	#[test]
	fn test_conditional_update_applies_on_commit() {
		let store = MemoryOrderStore::new();
		let a = store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 10, 0)).unwrap();

		let mut tx = store.begin().unwrap();
		let update = OrderUpdate::fill(&a, 4, t(10)).unwrap();
		assert_eq!(tx.conditional_update_order(&update).unwrap(), 1);
		tx.commit().unwrap();

		let stored = store.order(a.id).unwrap();
		assert_eq!(stored.remaining, 6);
		assert_eq!(stored.status, OrderStatus::PartiallyFilled);
		assert_eq!(stored.updated_at, t(10));
	}

	#[test]
	fn test_conditional_update_guard_rejects_stale_snapshot() {
		let store = MemoryOrderStore::new();
		let a = store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 10, 0)).unwrap();

		let mut tx = store.begin().unwrap();
		assert_eq!(
			tx.conditional_update_order(&OrderUpdate::fill(&a, 4, t(1)).unwrap())
				.unwrap(),
			1
		);
		// Same snapshot again: remaining is now 6 < 10
		assert_eq!(
			tx.conditional_update_order(&OrderUpdate::fill(&a, 4, t(1)).unwrap())
				.unwrap(),
			0
		);
		tx.commit().unwrap();

		assert_eq!(store.order(a.id).unwrap().remaining, 6);
	}

	#[test]
	fn test_conditional_update_skips_cancelled_and_missing() {
		let store = MemoryOrderStore::new();
		let a = store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 10, 0)).unwrap();
		store.cancel_order(a.id).unwrap();

		let mut tx = store.begin().unwrap();
		let update = OrderUpdate::fill(&a, 10, t(1)).unwrap();
		assert_eq!(tx.conditional_update_order(&update).unwrap(), 0);

		let mut missing = update.clone();
		missing.order_id = OrderId(42);
		assert_eq!(tx.conditional_update_order(&missing).unwrap(), 0);
	}

	#[test]
	fn test_conditional_update_rejects_growing_remaining() {
		let store = MemoryOrderStore::new();
		let a = store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 10, 0)).unwrap();

		let mut tx = store.begin().unwrap();
		let update = OrderUpdate {
			order_id: a.id,
			expected_min_remaining: 1,
			new_remaining: 11,
			new_status: OrderStatus::PartiallyFilled,
			updated_at: t(1),
		};
		assert!(matches!(
			tx.conditional_update_order(&update),
			Err(StoreError::Invariant(_))
		));
	}

	#[test]
	fn test_dropped_transaction_rolls_back() {
		let store = MemoryOrderStore::new();
		let a = store.insert_order(limit(Side::Buy, "AAPL", dec!(10), 10, 0)).unwrap();

		{
			let mut tx = store.begin().unwrap();
			tx.conditional_update_order(&OrderUpdate::fill(&a, 10, t(1)).unwrap())
				.unwrap();
			tx.create_trade(NewTrade {
				buy_order_id: a.id,
				sell_order_id: OrderId(2),
				symbol: "AAPL".to_string(),
				price: dec!(10),
				quantity: 10,
				executed_at: t(1),
			})
			.unwrap();
		}

		let stored = store.order(a.id).unwrap();
		assert_eq!(stored.remaining, 10);
		assert_eq!(stored.status, OrderStatus::Pending);
		assert_eq!(store.trade_count(), 0);
	}

	#[test]
	fn test_rolled_back_trade_ids_are_reissued() {
		let store = MemoryOrderStore::new();
		let new_trade = || NewTrade {
			buy_order_id: OrderId(1),
			sell_order_id: OrderId(2),
			symbol: "AAPL".to_string(),
			price: dec!(10),
			quantity: 1,
			executed_at: t(1),
		};

		{
			let mut tx = store.begin().unwrap();
			tx.create_trade(new_trade()).unwrap();
		}

		let mut tx = store.begin().unwrap();
		let first = tx.create_trade(new_trade()).unwrap();
		let second = tx.create_trade(new_trade()).unwrap();
		tx.commit().unwrap();

		assert_eq!(first.id, TradeId(1));
		assert_eq!(second.id, TradeId(2));
		assert_eq!(store.trades().len(), 2);
	}
}
