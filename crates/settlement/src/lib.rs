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

//! Ebid Settlement
//!
//! This crate owns every write the matching engine makes. It defines the
//! narrow persistence contract the engine depends on (filtered, sorted
//! order reads plus a transaction boundary with a guarded order update),
//! an in-memory implementation of that contract, and the settlement
//! executor that turns a matched pair into a committed trade.
//!
//! Settlement is all-or-nothing: both order updates and the trade insert
//! commit together or not at all. Concurrent cancellation is detected by
//! the optimistic guard on the order update, never by row locks held
//! across a matching pass.

pub mod executor;
pub mod memory;
pub mod observer;
pub mod store;
pub mod validator;

pub use executor::{FillOutcome, Settlement, SettlementError, SettlementExecutor};
pub use memory::MemoryOrderStore;
pub use observer::{TradeLogPublisher, TradeObserver};
pub use store::{
	OrderQuery, OrderStore, OrderUpdate, PriceSort, StoreError, StoreTransaction, with_transaction,
};
pub use validator::{ValidationError, validate_settlement};
