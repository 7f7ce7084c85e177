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

use ebid_types::Trade;
use tracing::{info, warn};

/// Receives trades after their settlement has committed
///
/// Observers run on the settlement caller's thread and must not block.
pub trait TradeObserver: Send + Sync {
	fn on_trade_executed(&self, trade: &Trade);
}

/// Publishes each executed trade to the log as a JSON payload
///
/// Stands in for a message-bus publisher; downstream consumers can
/// tail the `settlement` target.
#[derive(Debug, Default)]
pub struct TradeLogPublisher;

impl TradeObserver for TradeLogPublisher {
	fn on_trade_executed(&self, trade: &Trade) {
		match serde_json::to_string(trade) {
			Ok(payload) => {
				info!(
					target: "settlement",
					trade_id = %trade.id,
					symbol = %trade.symbol,
					trade = %payload,
					"Trade executed"
				);
			}
			Err(e) => {
				warn!(target: "settlement", trade_id = %trade.id, error = %e, "Failed to encode trade");
			}
		}
	}
}
