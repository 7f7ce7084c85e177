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

use std::{cmp::Ordering, fmt};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order identifier, assigned by the order store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

/// Trade identifier, assigned by the order store on insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(pub u64);

/// Owning account of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for OrderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl fmt::Display for TradeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl fmt::Display for AccountId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Buy,
	Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
	Limit,
	Market,
}

/// Lifecycle status of an order
///
/// `remaining > 0` holds exactly for the active statuses
/// (`Pending`, `PartiallyFilled`); `remaining == 0` holds exactly for `Filled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	Pending,
	PartiallyFilled,
	Filled,
	Cancelled,
}

impl OrderStatus {
	/// Whether an order in this status is still eligible for matching
	pub fn is_active(self) -> bool {
		matches!(self, OrderStatus::Pending | OrderStatus::PartiallyFilled)
	}

	/// Whether this status is terminal
	pub fn is_terminal(self) -> bool {
		!self.is_active()
	}

	/// Status an order takes after a fill leaves `remaining` units open
	pub fn after_fill(remaining: u64) -> Self {
		if remaining == 0 {
			OrderStatus::Filled
		} else {
			OrderStatus::PartiallyFilled
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::PartiallyFilled => "partially_filled",
			OrderStatus::Filled => "filled",
			OrderStatus::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Order submission accepted by the order store
///
/// New orders always enter the table as `Pending` with the full
/// quantity remaining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
	pub account_id: AccountId,
	/// Instrument identifier (e.g. "AAPL")
	pub symbol: String,
	pub side: Side,
	#[serde(rename = "type")]
	pub order_type: OrderType,
	/// Limit price (ignored for market orders)
	pub price: Option<Decimal>,
	pub quantity: u64,
	/// Creation time; drives time priority
	pub created_at: DateTime<Utc>,
}

/// An order as stored in the order table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	pub id: OrderId,
	/// Owning account. Never read or written by matching.
	pub account_id: AccountId,
	pub symbol: String,
	pub side: Side,
	#[serde(rename = "type")]
	pub order_type: OrderType,
	/// Limit price; `None` for market orders
	pub price: Option<Decimal>,
	/// Originally requested quantity
	pub quantity: u64,
	/// Quantity still open for matching
	pub remaining: u64,
	pub status: OrderStatus,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Order {
	pub fn is_market(&self) -> bool {
		self.order_type == OrderType::Market
	}

	/// Limit price, only for limit orders
	pub fn limit_price(&self) -> Option<Decimal> {
		match self.order_type {
			OrderType::Limit => self.price,
			OrderType::Market => None,
		}
	}

	/// Quantity executed so far
	pub fn filled(&self) -> u64 {
		self.quantity.saturating_sub(self.remaining)
	}

	/// Active status with quantity left to match
	pub fn is_fillable(&self) -> bool {
		self.status.is_active() && self.remaining > 0
	}

	pub fn priority(&self) -> OrderPriority {
		OrderPriority {
			is_market: self.is_market(),
			price: self.limit_price(),
			created_at: self.created_at,
			id: self.id,
		}
	}
}

/// Matching priority of an order within its side
///
/// Market orders come first, then the better price (highest bid,
/// lowest ask), then the earliest creation time. The order id breaks
/// any remaining tie so the visit sequence is reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPriority {
	pub is_market: bool,
	pub price: Option<Decimal>,
	pub created_at: DateTime<Utc>,
	pub id: OrderId,
}

impl OrderPriority {
	/// Compare two priorities of orders on `side`; `Less` is matched first
	pub fn cmp_for(&self, side: Side, other: &Self) -> Ordering {
		other
			.is_market
			.cmp(&self.is_market)
			.then_with(|| match side {
				Side::Buy => other.price.cmp(&self.price),
				Side::Sell => self.price.cmp(&other.price),
			})
			.then_with(|| self.created_at.cmp(&other.created_at))
			.then_with(|| self.id.cmp(&other.id))
	}
}

/// Trade record as passed to the store; the id is assigned on insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrade {
	pub buy_order_id: OrderId,
	pub sell_order_id: OrderId,
	pub symbol: String,
	pub price: Decimal,
	pub quantity: u64,
	pub executed_at: DateTime<Utc>,
}

/// An executed trade. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
	pub id: TradeId,
	/// Buy order reference (audit only)
	pub buy_order_id: OrderId,
	/// Sell order reference (audit only)
	pub sell_order_id: OrderId,
	pub symbol: String,
	/// Execution price
	pub price: Decimal,
	/// Execution quantity
	pub quantity: u64,
	pub executed_at: DateTime<Utc>,
}

impl Trade {
	pub fn from_new(id: TradeId, trade: NewTrade) -> Self {
		Self {
			id,
			buy_order_id: trade.buy_order_id,
			sell_order_id: trade.sell_order_id,
			symbol: trade.symbol,
			price: trade.price,
			quantity: trade.quantity,
			executed_at: trade.executed_at,
		}
	}

	/// Price times quantity, `None` when the product is out of range
	pub fn notional(&self) -> Option<Decimal> {
		self.price.checked_mul(Decimal::from(self.quantity))
	}
}
