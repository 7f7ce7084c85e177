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

//! Ebid Matching Engine
//!
//! Periodic batch matching over a persistent order table. Each cycle
//! pages through active orders in price-time priority, pairs buys
//! against sells and settles every pair in its own transaction.
//!
//! Architecture:
//! - Matching rules are pure functions over order snapshots
//! - The batch fetcher reads bounded pages and never locks rows
//! - Settlement applies optimistic guards; a lost race skips the pairing
//! - A single scheduler thread drives cycles; they never overlap
//! - Lock-free statistics readable from any thread

pub mod config;
pub mod engine;
pub mod fetcher;
pub mod logging;
pub mod matcher;
pub mod scheduler;
pub mod stats;

pub use config::{ConfigError, MatchingConfig};
pub use engine::{CycleReport, EngineConfig, EngineError, MatchingEngine};
pub use fetcher::{Batch, BatchFetcher, Batches, FetchError};
pub use matcher::{Execution, evaluate, execution_price, execution_quantity, is_matchable};
pub use scheduler::{Scheduler, SchedulerError, SchedulerState};
pub use stats::{MatchingStats, StatsSnapshot};
