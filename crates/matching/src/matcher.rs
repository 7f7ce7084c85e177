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

//! Pairing rules for a candidate buy and sell order
//!
//! Pure functions over order snapshots. The engine calls them in
//! priority order; nothing here touches the store.

use ebid_types::Order;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price and quantity a matchable pair would execute at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
	pub price: Decimal,
	pub quantity: u64,
}

/// Whether `buy` and `sell` may trade against each other
///
/// A market order on either side accepts the opposing price. Two limit
/// orders match when the buy price is no more than `tolerance` below the
/// sell price.
pub fn is_matchable(buy: &Order, sell: &Order, tolerance: Decimal) -> bool {
	if buy.symbol != sell.symbol {
		return false;
	}

	if buy.is_market() || sell.is_market() {
		return true;
	}

	match (buy.limit_price(), sell.limit_price()) {
		(Some(bid), Some(ask)) => bid - ask >= -tolerance,
		_ => false,
	}
}

/// Price a pair executes at
///
/// - Market buy: the sell's limit price
/// - Market sell: the buy's limit price
/// - Two limits: the price of the order created first; on a tie the sell's
///
/// Returns `None` when neither side carries a limit price.
pub fn execution_price(buy: &Order, sell: &Order) -> Option<Decimal> {
	match (buy.is_market(), sell.is_market()) {
		(true, true) => None,
		(true, false) => sell.limit_price(),
		(false, true) => buy.limit_price(),
		(false, false) => {
			if buy.created_at < sell.created_at {
				buy.limit_price()
			} else {
				sell.limit_price()
			}
		}
	}
}

pub fn execution_quantity(buy: &Order, sell: &Order) -> u64 {
	buy.remaining.min(sell.remaining)
}

/// Combine the rules above into a single decision
///
/// `None` when the pair is not matchable, has no reference price, or
/// either side has nothing left to fill.
pub fn evaluate(buy: &Order, sell: &Order, tolerance: Decimal) -> Option<Execution> {
	if !buy.is_fillable() || !sell.is_fillable() || !is_matchable(buy, sell, tolerance) {
		return None;
	}

	let price = execution_price(buy, sell)?;
	let quantity = execution_quantity(buy, sell);
	(quantity > 0).then_some(Execution { price, quantity })
}
