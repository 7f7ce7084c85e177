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

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use ebid_types::{NewTrade, Order, OrderId, OrderPriority, OrderStatus, Side, Trade};
use thiserror::Error;

/// Error types for order store operations
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Store unavailable: {0}")]
	Unavailable(String),
	#[error("Order not found: {0}")]
	NotFound(OrderId),
	#[error("Order {order_id} is {status}")]
	InvalidState {
		order_id: OrderId,
		status: OrderStatus,
	},
	#[error("Order rejected: {0}")]
	Rejected(String),
	#[error("Store invariant violated: {0}")]
	Invariant(String),
	#[error("Storage backend error: {0}")]
	Backend(String),
}

/// Price direction of an order query
///
/// Market orders always sort ahead of limit orders, and ties on price
/// fall back to creation time, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSort {
	/// Highest price first (bids)
	Descending,
	/// Lowest price first (asks)
	Ascending,
}

impl PriceSort {
	/// Matching priority direction for a side
	pub fn for_side(side: Side) -> Self {
		match side {
			Side::Buy => PriceSort::Descending,
			Side::Sell => PriceSort::Ascending,
		}
	}

	pub fn compare(self, a: &OrderPriority, b: &OrderPriority) -> Ordering {
		match self {
			PriceSort::Descending => a.cmp_for(Side::Buy, b),
			PriceSort::Ascending => a.cmp_for(Side::Sell, b),
		}
	}
}

/// Read of active orders on one side
///
/// Only `Pending` and `PartiallyFilled` orders are ever returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
	pub side: Side,
	/// Restrict to one instrument; `None` reads every symbol
	pub symbol: Option<String>,
	pub sort: PriceSort,
	pub offset: usize,
	pub limit: usize,
}

impl OrderQuery {
	/// Page of active orders on `side`, in matching priority order
	pub fn active(side: Side, symbol: Option<&str>, offset: usize, limit: usize) -> Self {
		Self {
			side,
			symbol: symbol.map(str::to_string),
			sort: PriceSort::for_side(side),
			offset,
			limit,
		}
	}

	pub fn matches(&self, order: &Order) -> bool {
		order.side == self.side
			&& order.status.is_active()
			&& self.symbol.as_deref().is_none_or(|s| order.symbol == s)
	}
}

/// Guarded write of an order's market fields
///
/// Applies only if the order is still active and its remaining quantity
/// is at least `expected_min_remaining`; otherwise no row is affected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
	pub order_id: OrderId,
	pub expected_min_remaining: u64,
	pub new_remaining: u64,
	pub new_status: OrderStatus,
	pub updated_at: DateTime<Utc>,
}

impl OrderUpdate {
	/// Update that fills `quantity` units of `order` as last read
	///
	/// The guard is the snapshot's remaining quantity: remaining only ever
	/// decreases, so a match means the row is unchanged since the read.
	/// Returns `None` if `quantity` exceeds the snapshot's remaining.
	pub fn fill(order: &Order, quantity: u64, updated_at: DateTime<Utc>) -> Option<Self> {
		let new_remaining = order.remaining.checked_sub(quantity)?;
		Some(Self {
			order_id: order.id,
			expected_min_remaining: order.remaining,
			new_remaining,
			new_status: OrderStatus::after_fill(new_remaining),
			updated_at,
		})
	}
}

/// Durable order table plus append-only trade log
///
/// Reads never lock rows. All mutation goes through a transaction
/// obtained from [`OrderStore::begin`].
pub trait OrderStore: Send + Sync {
	/// Active orders matching the query, sorted and paged
	fn query_orders(&self, query: &OrderQuery) -> Result<Vec<Order>, StoreError>;

	/// Distinct symbols that currently have active orders
	fn symbols(&self) -> Result<Vec<String>, StoreError>;

	/// Open a transaction
	///
	/// Dropping the returned transaction without calling
	/// [`StoreTransaction::commit`] rolls it back.
	fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;
}

/// Unit of work against the order store
pub trait StoreTransaction {
	/// Apply a guarded order update, returning the number of rows affected (0 or 1)
	fn conditional_update_order(&mut self, update: &OrderUpdate) -> Result<u64, StoreError>;

	/// Append a trade record, returning it with its assigned id
	fn create_trade(&mut self, trade: NewTrade) -> Result<Trade, StoreError>;

	/// Make every write of this transaction visible atomically
	fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Run `f` inside a transaction
///
/// Commits when `f` returns `Ok`; on `Err` the transaction is dropped,
/// which rolls back every write it made.
pub fn with_transaction<T, E, F>(store: &dyn OrderStore, f: F) -> Result<T, E>
where
	E: From<StoreError>,
	F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
{
	let mut tx = store.begin()?;
	let value = f(tx.as_mut())?;
	tx.commit()?;
	Ok(value)
}
