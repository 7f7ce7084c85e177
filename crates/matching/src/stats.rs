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

use std::{
	sync::atomic::{AtomicI64, AtomicU64, Ordering},
	time::Duration,
};

use chrono::{DateTime, Utc};
use crossbeam::atomic::AtomicCell;
use ebid_settlement::TradeObserver;
use ebid_types::Trade;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

const NEVER: i64 = i64::MIN;

/// Point-in-time copy of the matching counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
	pub total_matches: u64,
	/// Sum of price times quantity over all trades
	pub total_volume: Decimal,
	pub last_match_time: Option<DateTime<Utc>>,
	/// Failed settlements plus failed cycles
	pub error_count: u64,
	pub last_cycle_duration: Duration,
	/// Pairings skipped after losing an optimistic race
	pub conflicts: u64,
	pub cycles: u64,
}

/// Matching counters
///
/// Written by the scheduler thread, read from anywhere. Every field is
/// monotonic except the last-cycle duration. The integer counters are
/// plain atomics. `Decimal` is too wide for a native atomic, so
/// `AtomicCell` guards the volume with crossbeam's global seqlock; a
/// reader racing a writer may briefly block on it.
pub struct MatchingStats {
	total_matches: AtomicU64,
	total_volume: AtomicCell<Decimal>,
	last_match_millis: AtomicI64,
	error_count: AtomicU64,
	conflicts: AtomicU64,
	cycles: AtomicU64,
	last_cycle_micros: AtomicU64,
}

impl MatchingStats {
	pub fn new() -> Self {
		Self {
			total_matches: AtomicU64::new(0),
			total_volume: AtomicCell::new(Decimal::ZERO),
			last_match_millis: AtomicI64::new(NEVER),
			error_count: AtomicU64::new(0),
			conflicts: AtomicU64::new(0),
			cycles: AtomicU64::new(0),
			last_cycle_micros: AtomicU64::new(0),
		}
	}

	/// Count a committed trade
	///
	/// A notional or running total out of `Decimal` range is left out of
	/// the volume and counted as an error; the trade itself still counts.
	pub fn record_trade(&self, trade: &Trade) {
		self.total_matches.fetch_add(1, Ordering::Relaxed);
		self.last_match_millis
			.fetch_max(trade.executed_at.timestamp_millis(), Ordering::Relaxed);

		let Some(notional) = trade.notional() else {
			error!(
				target: "stats",
				trade_id = %trade.id,
				price = %trade.price,
				quantity = trade.quantity,
				"Trade notional out of range, not added to volume"
			);
			self.record_error();
			return;
		};

		let mut current = self.total_volume.load();
		loop {
			let Some(total) = current.checked_add(notional) else {
				error!(
					target: "stats",
					trade_id = %trade.id,
					notional = %notional,
					total_volume = %current,
					"Total volume out of range, trade not added"
				);
				self.record_error();
				return;
			};
			match self.total_volume.compare_exchange(current, total) {
				Ok(_) => return,
				Err(actual) => current = actual,
			}
		}
	}

	pub fn record_error(&self) {
		self.error_count.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_conflict(&self) {
		self.conflicts.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_cycle(&self, duration: Duration) {
		let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
		self.last_cycle_micros.store(micros, Ordering::Relaxed);
		self.cycles.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> StatsSnapshot {
		let last_match = self.last_match_millis.load(Ordering::Relaxed);

		StatsSnapshot {
			total_matches: self.total_matches.load(Ordering::Relaxed),
			total_volume: self.total_volume.load(),
			last_match_time: (last_match != NEVER)
				.then(|| DateTime::from_timestamp_millis(last_match))
				.flatten(),
			error_count: self.error_count.load(Ordering::Relaxed),
			last_cycle_duration: Duration::from_micros(
				self.last_cycle_micros.load(Ordering::Relaxed),
			),
			conflicts: self.conflicts.load(Ordering::Relaxed),
			cycles: self.cycles.load(Ordering::Relaxed),
		}
	}
}

impl Default for MatchingStats {
	fn default() -> Self {
		Self::new()
	}
}

impl TradeObserver for MatchingStats {
	fn on_trade_executed(&self, trade: &Trade) {
		self.record_trade(trade);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use ebid_types::{OrderId, TradeId};
	use rust_decimal_macros::dec;
	use std::{sync::Arc, thread};

	fn trade(price: Decimal, quantity: u64) -> Trade {
		Trade {
			id: TradeId(1),
			buy_order_id: OrderId(1),
			sell_order_id: OrderId(2),
			symbol: "AAPL".to_string(),
			price,
			quantity,
			executed_at: Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).unwrap(),
		}
	}

	#[test]
	fn test_empty_snapshot() {
		let snapshot = MatchingStats::new().snapshot();
		assert_eq!(snapshot.total_matches, 0);
		assert_eq!(snapshot.total_volume, Decimal::ZERO);
		assert_eq!(snapshot.last_match_time, None);
		assert_eq!(snapshot.last_cycle_duration, Duration::ZERO);
	}

	#[test]
	fn test_trades_accumulate() {
		let stats = MatchingStats::new();
		stats.on_trade_executed(&trade(dec!(50.00), 10));
		stats.on_trade_executed(&trade(dec!(20.00), 5));

		let snapshot = stats.snapshot();
		assert_eq!(snapshot.total_matches, 2);
		assert_eq!(snapshot.total_volume, dec!(600.00));
		assert_eq!(
			snapshot.last_match_time,
			Some(Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).unwrap())
		);
	}

	#[test]
	fn test_volume_overflow_counts_error() {
		let stats = MatchingStats::new();
		let large = trade(dec!(5000000000), 10_000_000_000_000_000_000);
		stats.on_trade_executed(&large);
		stats.on_trade_executed(&large);
		stats.on_trade_executed(&trade(dec!(10000000000), u64::MAX));

		let snapshot = stats.snapshot();
		assert_eq!(snapshot.total_matches, 3);
		assert_eq!(snapshot.error_count, 2);
		assert_eq!(snapshot.total_volume, large.notional().unwrap());
	}

	#[test]
	fn test_cycle_duration_is_latest() {
		let stats = MatchingStats::new();
		stats.record_cycle(Duration::from_millis(40));
		stats.record_cycle(Duration::from_millis(3));

		let snapshot = stats.snapshot();
		assert_eq!(snapshot.cycles, 2);
		assert_eq!(snapshot.last_cycle_duration, Duration::from_millis(3));
	}

	#[test]
	fn test_reads_during_writes() {
		let stats = Arc::new(MatchingStats::new());
		let writer = {
			let stats = stats.clone();
			thread::spawn(move || {
				for _ in 0..1000 {
					stats.on_trade_executed(&trade(dec!(1.5), 2));
				}
			})
		};

		let mut last = 0;
		while last < 1000 {
			let snapshot = stats.snapshot();
			assert!(snapshot.total_matches >= last);
			last = snapshot.total_matches;
			if writer.is_finished() {
				break;
			}
		}
		writer.join().unwrap();

		let snapshot = stats.snapshot();
		assert_eq!(snapshot.total_matches, 1000);
		assert_eq!(snapshot.total_volume, dec!(3000.0));
	}
}
