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

use std::sync::Arc;

use chrono::Utc;
use ebid_types::{NewTrade, Order, OrderId, OrderStatus, Trade};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
	observer::TradeObserver,
	store::{OrderStore, OrderUpdate, StoreError, with_transaction},
	validator::{ValidationError, validate_settlement},
};

/// Error types for settlement
#[derive(Debug, Error)]
pub enum SettlementError {
	/// The optimistic guard failed: the order was cancelled or changed
	/// since it was read. Expected under concurrency; skip the pairing.
	#[error("Lost race on order {order_id}")]
	Conflict { order_id: OrderId },
	#[error("Settlement contract violated: {0}")]
	Invariant(#[from] ValidationError),
	#[error("Store error: {0}")]
	Store(#[from] StoreError),
}

impl SettlementError {
	pub fn is_conflict(&self) -> bool {
		matches!(self, SettlementError::Conflict { .. })
	}

	/// Whether this error indicates a consistency bug rather than a
	/// transient failure
	pub fn is_invariant_violation(&self) -> bool {
		matches!(
			self,
			SettlementError::Invariant(_) | SettlementError::Store(StoreError::Invariant(_))
		)
	}
}

/// Post-settlement state of one side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillOutcome {
	pub order_id: OrderId,
	pub remaining: u64,
	pub status: OrderStatus,
}

impl From<&OrderUpdate> for FillOutcome {
	fn from(update: &OrderUpdate) -> Self {
		Self {
			order_id: update.order_id,
			remaining: update.new_remaining,
			status: update.new_status,
		}
	}
}

/// Result of a committed settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
	pub trade: Trade,
	pub buy: FillOutcome,
	pub sell: FillOutcome,
}

/// Settles matched pairs atomically
///
/// Each call runs one transaction that:
/// 1. Applies the guarded fill to the buy order
/// 2. Applies the guarded fill to the sell order
/// 3. Inserts the trade record
///
/// If either guard affects no row the transaction is rolled back and
/// [`SettlementError::Conflict`] names the order that lost the race.
/// Observers are notified only after a successful commit.
pub struct SettlementExecutor {
	store: Arc<dyn OrderStore>,
	observers: Vec<Arc<dyn TradeObserver>>,
}

impl SettlementExecutor {
	pub fn new(store: Arc<dyn OrderStore>) -> Self {
		Self {
			store,
			observers: Vec::new(),
		}
	}

	/// Register an observer for committed trades
	pub fn with_observer(mut self, observer: Arc<dyn TradeObserver>) -> Self {
		self.observers.push(observer);
		self
	}

	pub fn store(&self) -> &Arc<dyn OrderStore> {
		&self.store
	}

	/// Settle `quantity` units between `buy` and `sell` at `price`
	///
	/// `buy` and `sell` are the snapshots the pairing was decided on.
	pub fn execute(
		&self,
		buy: &Order,
		sell: &Order,
		quantity: u64,
		price: Decimal,
	) -> Result<Settlement, SettlementError> {
		validate_settlement(buy, sell, quantity, price)?;

		let now = Utc::now();
		let overfill = |order: &Order| ValidationError::Overfill {
			order_id: order.id,
			quantity,
			remaining: order.remaining,
		};
		let buy_update = OrderUpdate::fill(buy, quantity, now).ok_or_else(|| overfill(buy))?;
		let sell_update = OrderUpdate::fill(sell, quantity, now).ok_or_else(|| overfill(sell))?;

		let trade = with_transaction(self.store.as_ref(), |tx| {
			if tx.conditional_update_order(&buy_update)? == 0 {
				return Err(SettlementError::Conflict { order_id: buy.id });
			}

			if tx.conditional_update_order(&sell_update)? == 0 {
				return Err(SettlementError::Conflict { order_id: sell.id });
			}

			let trade = tx.create_trade(NewTrade {
				buy_order_id: buy.id,
				sell_order_id: sell.id,
				symbol: buy.symbol.clone(),
				price,
				quantity,
				executed_at: now,
			})?;

			Ok(trade)
		})?;

		debug!(
			target: "settlement",
			trade_id = %trade.id,
			buy_order_id = %buy.id,
			sell_order_id = %sell.id,
			buy_status = %buy_update.new_status,
			sell_status = %sell_update.new_status,
			"Settlement committed"
		);

		for observer in &self.observers {
			observer.on_trade_executed(&trade);
		}

		Ok(Settlement {
			trade,
			buy: FillOutcome::from(&buy_update),
			sell: FillOutcome::from(&sell_update),
		})
	}
}
