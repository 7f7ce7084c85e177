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

//! Matching service entry point
//!
//! Wires the order store, the matching engine and its scheduler, then
//! runs until Ctrl-C.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{signal, time};
use tracing::{info, warn};

use ebid_matching::{MatchingConfig, MatchingEngine, Scheduler, StatsSnapshot};
use ebid_settlement::{MemoryOrderStore, OrderStore};

fn log_stats(stats: &StatsSnapshot) {
	info!(
		target: "server",
		total_matches = stats.total_matches,
		total_volume = %stats.total_volume,
		error_count = stats.error_count,
		conflicts = stats.conflicts,
		cycles = stats.cycles,
		last_cycle_ms = stats.last_cycle_duration.as_millis() as u64,
		last_match_time = ?stats.last_match_time,
		"Matching engine status"
	);
}

#[tokio::main]
async fn main() -> Result<()> {
	ebid_matching::logging::init_logging()?;

	let config = match MatchingConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			warn!(target: "server", error = %e, "Invalid environment configuration, using defaults");
			MatchingConfig::default()
		}
	};

	info!(target: "server", "Starting Ebid Matching Engine");
	info!(target: "server", "Match interval: {:?}", config.match_interval());
	info!(target: "server", "Price tolerance: {}", config.price_tolerance);
	info!(target: "server", "Batch size: {}", config.batch_size);

	let store: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
	let engine_config = config.engine_config();
	let interval = engine_config.match_interval;
	let engine = Arc::new(
		MatchingEngine::new(engine_config, store).context("Failed to build matching engine")?,
	);

	let mut scheduler = Scheduler::new(engine.clone());
	scheduler
		.start(interval)
		.context("Failed to start matching scheduler")?;

	let stats = engine.stats_handle();
	let stats_interval = config.stats_log_interval().max(Duration::from_secs(1));
	let monitor = tokio::spawn(async move {
		let mut ticker = time::interval(stats_interval);
		// First tick completes immediately
		ticker.tick().await;
		loop {
			ticker.tick().await;
			log_stats(&stats.snapshot());
		}
	});

	signal::ctrl_c()
		.await
		.context("Failed to listen for shutdown signal")?;
	info!(target: "server", "Shutting down...");

	monitor.abort();
	scheduler.stop();
	log_stats(&engine.stats());

	info!(target: "server", "Shutdown complete");
	Ok(())
}
