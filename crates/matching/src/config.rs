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

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineConfig;

/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Component name used for the log directory and file prefix
pub const LOG_COMPONENT_NAME: &str = "matching";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

/// Default interval between matching cycles
pub const DEFAULT_MATCH_INTERVAL_MS: u64 = 10_000;

/// Default page size for the batch fetcher
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default interval for the periodic stats log line
pub const DEFAULT_STATS_LOG_INTERVAL_SECS: u64 = 60;

/// Default price tolerance (one cent)
pub fn default_price_tolerance() -> Decimal {
	Decimal::new(1, 2)
}

/// Invalid engine settings, reported before the scheduler starts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("Match interval must be greater than zero")]
	InvalidInterval,
	#[error("Price tolerance must be greater than zero, got {0}")]
	InvalidTolerance(Decimal),
	#[error("Batch size must be greater than zero")]
	InvalidBatchSize,
	#[error("Symbol list contains a blank entry")]
	EmptySymbol,
}

/// Matching service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
	/// Interval between matching cycles (milliseconds)
	pub match_interval_ms: u64,
	/// Allowed shortfall of a buy limit price below a sell limit price
	pub price_tolerance: Decimal,
	/// Orders fetched per side per page
	pub batch_size: usize,
	/// Symbols scanned one at a time; empty scans all symbols together
	pub symbols: Vec<String>,
	/// Discover symbols from the store and scan each one separately
	pub scan_by_symbol: bool,
	/// Interval between stats log lines (seconds)
	pub stats_log_interval_secs: u64,
	pub verbose_logging: bool,
}

impl Default for MatchingConfig {
	fn default() -> Self {
		Self {
			match_interval_ms: DEFAULT_MATCH_INTERVAL_MS,
			price_tolerance: default_price_tolerance(),
			batch_size: DEFAULT_BATCH_SIZE,
			symbols: Vec::new(),
			scan_by_symbol: false,
			stats_log_interval_secs: DEFAULT_STATS_LOG_INTERVAL_SECS,
			verbose_logging: false,
		}
	}
}

impl MatchingConfig {
	fn env_source() -> config::Environment {
		config::Environment::with_prefix("MATCHING")
			.try_parsing(true)
			.list_separator(",")
			.with_list_parse_key("symbols")
	}

	/// Load configuration from environment variables
	///
	/// `MATCHING_MATCH_INTERVAL_MS=5000`, `MATCHING_SYMBOLS=AAPL,MSFT`, ...
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(Self::env_source())
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file, with environment overrides
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(Self::env_source())
			.build()?;

		cfg.try_deserialize()
	}

	pub fn match_interval(&self) -> Duration {
		Duration::from_millis(self.match_interval_ms)
	}

	pub fn stats_log_interval(&self) -> Duration {
		Duration::from_secs(self.stats_log_interval_secs)
	}

	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			match_interval: self.match_interval(),
			price_tolerance: self.price_tolerance,
			batch_size: self.batch_size,
			symbols: self
				.symbols
				.iter()
				.map(|s| s.trim().to_string())
				.collect(),
			scan_by_symbol: self.scan_by_symbol,
			verbose_logging: self.verbose_logging,
		}
	}
}
