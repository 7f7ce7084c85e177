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

mod cycle;

pub use cycle::CycleReport;

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::{Duration, Instant},
};

use ebid_settlement::{
	FillOutcome, OrderStore, SettlementError, SettlementExecutor, StoreError, TradeLogPublisher,
};
use ebid_types::{Order, OrderId};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::{
	config::{
		ConfigError, DEFAULT_BATCH_SIZE, DEFAULT_MATCH_INTERVAL_MS, default_price_tolerance,
	},
	fetcher::{Batch, BatchFetcher, FetchError},
	matcher::{self, Execution},
	stats::{MatchingStats, StatsSnapshot},
};
use cycle::CycleState;

/// Error types for matching engine operations
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Invalid configuration: {0}")]
	Config(#[from] ConfigError),
	#[error(transparent)]
	Fetch(#[from] FetchError),
	#[error("Failed to list symbols: {0}")]
	Symbols(#[from] StoreError),
	#[error("Invariant violated settling buy {buy_order_id} against sell {sell_order_id}: {source}")]
	Invariant {
		buy_order_id: OrderId,
		sell_order_id: OrderId,
		#[source]
		source: SettlementError,
	},
}

/// Configuration for the matching engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
	pub match_interval: Duration,
	pub price_tolerance: Decimal,
	pub batch_size: usize,
	/// Symbols scanned one at a time; empty scans all symbols in one pass
	pub symbols: Vec<String>,
	/// With no explicit symbols, scan each symbol that has active orders
	/// separately instead of all symbols in one pass
	pub scan_by_symbol: bool,
	pub verbose_logging: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			match_interval: Duration::from_millis(DEFAULT_MATCH_INTERVAL_MS),
			price_tolerance: default_price_tolerance(),
			batch_size: DEFAULT_BATCH_SIZE,
			symbols: Vec::new(),
			scan_by_symbol: false,
			verbose_logging: false,
		}
	}
}

impl EngineConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.match_interval.is_zero() {
			return Err(ConfigError::InvalidInterval);
		}
		if self.price_tolerance <= Decimal::ZERO {
			return Err(ConfigError::InvalidTolerance(self.price_tolerance));
		}
		if self.batch_size == 0 {
			return Err(ConfigError::InvalidBatchSize);
		}
		if self.symbols.iter().any(|s| s.trim().is_empty()) {
			return Err(ConfigError::EmptySymbol);
		}
		Ok(())
	}
}

/// Periodic batch matcher over the order store
///
/// One call to [`MatchingEngine::run_cycle`] pages through every active
/// order, pairs buys against sells in priority order and settles each
/// pair through the [`SettlementExecutor`]. Pairing and settlement are
/// sequential within a cycle, so the match sequence is reproducible for
/// a given set of orders.
///
/// A scope is scanned again while the previous pass settled anything,
/// so a cycle ends on a pass that settled nothing. Re-running a cycle
/// over an unchanged book therefore settles nothing either.
///
/// The engine holds no order state between cycles; the store is the
/// only source of truth. Orders fetched for a page are local copies,
/// updated from each settlement so later pairings in the same page see
/// the reduced remaining quantity.
pub struct MatchingEngine {
	config: EngineConfig,
	fetcher: BatchFetcher,
	executor: SettlementExecutor,
	stats: Arc<MatchingStats>,
}

impl MatchingEngine {
	/// Build an engine over `store`, rejecting invalid configuration
	pub fn new(config: EngineConfig, store: Arc<dyn OrderStore>) -> Result<Self, EngineError> {
		config.validate()?;

		let stats = Arc::new(MatchingStats::new());
		let executor = SettlementExecutor::new(store.clone())
			.with_observer(stats.clone())
			.with_observer(Arc::new(TradeLogPublisher));

		info!(
			target: "engine",
			interval_ms = config.match_interval.as_millis() as u64,
			price_tolerance = %config.price_tolerance,
			batch_size = config.batch_size,
			symbols = ?config.symbols,
			"Matching engine initialized"
		);

		Ok(Self {
			fetcher: BatchFetcher::new(store, config.batch_size),
			config,
			executor,
			stats,
		})
	}

	pub fn stats(&self) -> StatsSnapshot {
		self.stats.snapshot()
	}

	pub fn stats_handle(&self) -> Arc<MatchingStats> {
		self.stats.clone()
	}

	/// Run one full matching cycle
	///
	/// `cancel` is checked between pages and between pairings; once set
	/// the cycle stops early and reports `cancelled`. Read errors and
	/// invariant violations abort the cycle. Lost races and failed
	/// settlements only skip the pairing concerned.
	pub fn run_cycle(&self, cancel: &AtomicBool) -> Result<CycleReport, EngineError> {
		let started = Instant::now();
		let mut state = CycleState::default();

		debug!(target: "engine", "Starting matching cycle");
		let result = self.match_all(cancel, &mut state);

		let mut report = state.report;
		report.duration = started.elapsed();
		self.stats.record_cycle(report.duration);

		if let Err(e) = result {
			self.stats.record_error();
			return Err(e);
		}

		info!(
			target: "engine",
			passes = report.passes,
			pages = report.pages,
			trades = report.trades,
			volume = %report.volume,
			conflicts = report.conflicts,
			failures = report.failures,
			cancelled = report.cancelled,
			duration_ms = report.duration.as_millis() as u64,
			"Matching cycle completed"
		);

		Ok(report)
	}

	fn match_all(&self, cancel: &AtomicBool, state: &mut CycleState) -> Result<(), EngineError> {
		let symbols = if !self.config.symbols.is_empty() {
			self.config.symbols.clone()
		} else if self.config.scan_by_symbol {
			self.executor.store().symbols()?
		} else {
			return self.match_scope(None, cancel, state);
		};

		for symbol in &symbols {
			self.match_scope(Some(symbol), cancel, state)?;
			if state.report.cancelled {
				break;
			}
		}

		Ok(())
	}

	fn match_scope(
		&self,
		symbol: Option<&str>,
		cancel: &AtomicBool,
		state: &mut CycleState,
	) -> Result<(), EngineError> {
		loop {
			let settled = state.report.trades;
			state.report.passes += 1;
			self.match_pass(symbol, cancel, state)?;
			if state.report.cancelled || state.report.trades == settled {
				return Ok(());
			}
		}
	}

	fn match_pass(
		&self,
		symbol: Option<&str>,
		cancel: &AtomicBool,
		state: &mut CycleState,
	) -> Result<(), EngineError> {
		let mut batches = self.fetcher.batches(symbol);

		loop {
			if cancel.load(Ordering::Relaxed) {
				state.report.cancelled = true;
				return Ok(());
			}

			let Some(batch) = batches.next() else {
				return Ok(());
			};
			let mut batch = batch?;
			state.report.pages += 1;

			if self.config.verbose_logging {
				debug!(
					target: "engine",
					symbol = symbol.unwrap_or("*"),
					buy_offset = batch.buy_offset,
					sell_offset = batch.sell_offset,
					orders = batch.len(),
					"Fetched order batch"
				);
			}

			self.process_batch(&mut batch, cancel, state)?;
			if state.report.cancelled {
				return Ok(());
			}
			batches.rewind_filled(&batch);
		}
	}

	/// Pair every buy in the page against the sells in priority order
	fn process_batch(
		&self,
		batch: &mut Batch,
		cancel: &AtomicBool,
		state: &mut CycleState,
	) -> Result<(), EngineError> {
		let Batch { buys, sells, .. } = batch;

		for buy in buys.iter_mut() {
			if !buy.is_fillable() || state.is_dropped(buy.id) {
				continue;
			}
			self.trace_priority(buy);

			for sell in sells.iter_mut() {
				if !buy.is_fillable() {
					break;
				}
				if !sell.is_fillable()
					|| state.is_dropped(sell.id)
					|| state.has_failed(buy.id, sell.id)
				{
					continue;
				}
				if cancel.load(Ordering::Relaxed) {
					state.report.cancelled = true;
					return Ok(());
				}

				let Some(execution) = matcher::evaluate(buy, sell, self.config.price_tolerance)
				else {
					continue;
				};
				self.trace_priority(sell);
				log_match_attempt(buy, sell, &execution);

				match self
					.executor
					.execute(buy, sell, execution.quantity, execution.price)
				{
					Ok(settlement) => {
						state.record_settlement(&settlement);
						apply_fill(buy, &settlement.buy, &settlement.trade.executed_at);
						apply_fill(sell, &settlement.sell, &settlement.trade.executed_at);
					}
					Err(SettlementError::Conflict { order_id }) => {
						state.record_conflict(order_id);
						self.stats.record_conflict();
						debug!(
							target: "engine",
							order_id = %order_id,
							buy_order_id = %buy.id,
							sell_order_id = %sell.id,
							"Order changed since fetch, skipping pairing"
						);
						if order_id == buy.id {
							break;
						}
					}
					Err(e) if e.is_invariant_violation() => {
						error!(
							target: "engine",
							buy_order_id = %buy.id,
							sell_order_id = %sell.id,
							quantity = execution.quantity,
							price = %execution.price,
							error = %e,
							"Settlement invariant violated, aborting cycle"
						);
						return Err(EngineError::Invariant {
							buy_order_id: buy.id,
							sell_order_id: sell.id,
							source: e,
						});
					}
					Err(e) => {
						state.record_failure(buy.id, sell.id);
						self.stats.record_error();
						error!(
							target: "engine",
							buy_order_id = %buy.id,
							sell_order_id = %sell.id,
							error = %e,
							"Trade execution failed"
						);
					}
				}
			}
		}

		Ok(())
	}

	fn trace_priority(&self, order: &Order) {
		if self.config.verbose_logging {
			trace!(
				target: "engine",
				order_id = %order.id,
				side = ?order.side,
				priority = ?order.priority(),
				"Order priority"
			);
		}
	}
}

fn log_match_attempt(buy: &Order, sell: &Order, execution: &Execution) {
	debug!(
		target: "engine",
		buy_order_id = %buy.id,
		sell_order_id = %sell.id,
		symbol = %buy.symbol,
		price = %execution.price,
		quantity = execution.quantity,
		buy_type = ?buy.order_type,
		sell_type = ?sell.order_type,
		"Match attempt"
	);
}

fn apply_fill(order: &mut Order, outcome: &FillOutcome, at: &chrono::DateTime<chrono::Utc>) {
	order.remaining = outcome.remaining;
	order.status = outcome.status;
	order.updated_at = *at;
}
