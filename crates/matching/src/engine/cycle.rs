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

use std::{collections::HashSet, time::Duration};

use ebid_settlement::Settlement;
use ebid_types::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of one matching cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
	/// Scans over the book, summed across symbol scopes
	pub passes: usize,
	/// Pages fetched across all passes
	pub pages: usize,
	pub trades: usize,
	/// Notional traded in this cycle; trades out of `Decimal` range are
	/// left out
	pub volume: Decimal,
	/// Pairings skipped after losing an optimistic race
	pub conflicts: usize,
	/// Settlements that failed and were rolled back
	pub failures: usize,
	pub duration: Duration,
	/// The cycle was abandoned on a stop request
	pub cancelled: bool,
}

/// Mutable bookkeeping for a cycle in flight
#[derive(Debug, Default)]
pub(crate) struct CycleState {
	pub report: CycleReport,
	/// Orders that lost a race; not paired again until the next cycle
	dropped: HashSet<OrderId>,
	/// Pairings whose settlement failed; retried on the next cycle
	failed: HashSet<(OrderId, OrderId)>,
}

impl CycleState {
	pub fn record_settlement(&mut self, settlement: &Settlement) {
		self.report.trades += 1;
		if let Some(volume) = settlement
			.trade
			.notional()
			.and_then(|notional| self.report.volume.checked_add(notional))
		{
			self.report.volume = volume;
		}
	}

	pub fn record_conflict(&mut self, order_id: OrderId) {
		self.report.conflicts += 1;
		self.dropped.insert(order_id);
	}

	pub fn record_failure(&mut self, buy_id: OrderId, sell_id: OrderId) {
		self.report.failures += 1;
		self.failed.insert((buy_id, sell_id));
	}

	pub fn has_failed(&self, buy_id: OrderId, sell_id: OrderId) -> bool {
		self.failed.contains(&(buy_id, sell_id))
	}

	pub fn is_dropped(&self, order_id: OrderId) -> bool {
		self.dropped.contains(&order_id)
	}
}
