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

use ebid_types::{Order, OrderId, OrderStatus, Side};
use rust_decimal::Decimal;
use thiserror::Error;

/// Settlement contract violations
///
/// None of these can occur for pairings produced by the matching cycle;
/// each one indicates a consistency bug upstream.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Order {order_id} is on the {actual:?} side, expected {expected:?}")]
	WrongSide {
		order_id: OrderId,
		expected: Side,
		actual: Side,
	},
	#[error("Symbol mismatch: buy {buy}, sell {sell}")]
	SymbolMismatch { buy: String, sell: String },
	#[error("Execution quantity must be greater than zero")]
	ZeroQuantity,
	#[error("Execution quantity {quantity} exceeds remaining {remaining} of order {order_id}")]
	Overfill {
		order_id: OrderId,
		quantity: u64,
		remaining: u64,
	},
	#[error("Order {order_id} is not fillable (status {status}, remaining {remaining})")]
	NotFillable {
		order_id: OrderId,
		status: OrderStatus,
		remaining: u64,
	},
	#[error("Execution price must be greater than zero, got {0}")]
	InvalidPrice(Decimal),
}

fn check_order(order: &Order, expected: Side, quantity: u64) -> Result<(), ValidationError> {
	if order.side != expected {
		return Err(ValidationError::WrongSide {
			order_id: order.id,
			expected,
			actual: order.side,
		});
	}

	if !order.is_fillable() {
		return Err(ValidationError::NotFillable {
			order_id: order.id,
			status: order.status,
			remaining: order.remaining,
		});
	}

	if quantity > order.remaining {
		return Err(ValidationError::Overfill {
			order_id: order.id,
			quantity,
			remaining: order.remaining,
		});
	}

	Ok(())
}

/// Check a pairing before any write is attempted
pub fn validate_settlement(
	buy: &Order,
	sell: &Order,
	quantity: u64,
	price: Decimal,
) -> Result<(), ValidationError> {
	if quantity == 0 {
		return Err(ValidationError::ZeroQuantity);
	}

	if price <= Decimal::ZERO {
		return Err(ValidationError::InvalidPrice(price));
	}

	if buy.symbol != sell.symbol {
		return Err(ValidationError::SymbolMismatch {
			buy: buy.symbol.clone(),
			sell: sell.symbol.clone(),
		});
	}

	check_order(buy, Side::Buy, quantity)?;
	check_order(sell, Side::Sell, quantity)?;

	Ok(())
}
