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

use std::sync::Arc;

use ebid_settlement::{OrderQuery, OrderStore, StoreError};
use ebid_types::{Order, Side};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
	#[error("Failed to fetch {side:?} orders at offset {offset}: {source}")]
	Query {
		side: Side,
		offset: usize,
		#[source]
		source: StoreError,
	},
}

/// One page of active orders per side, each in matching priority order
#[derive(Debug, Clone, Default)]
pub struct Batch {
	pub buy_offset: usize,
	pub sell_offset: usize,
	pub buys: Vec<Order>,
	pub sells: Vec<Order>,
}

impl Batch {
	pub fn is_empty(&self) -> bool {
		self.buys.is_empty() && self.sells.is_empty()
	}

	pub fn len(&self) -> usize {
		self.buys.len() + self.sells.len()
	}
}

/// Reads bounded pages of active orders from the store
///
/// Reads are plain queries; no row is locked between pages.
pub struct BatchFetcher {
	store: Arc<dyn OrderStore>,
	batch_size: usize,
}

impl BatchFetcher {
	pub fn new(store: Arc<dyn OrderStore>, batch_size: usize) -> Self {
		Self { store, batch_size }
	}

	/// Fetch one page per side, each from its own offset
	pub fn fetch(
		&self,
		symbol: Option<&str>,
		buy_offset: usize,
		sell_offset: usize,
	) -> Result<Batch, FetchError> {
		let buys = self.fetch_side(Side::Buy, symbol, buy_offset)?;
		let sells = self.fetch_side(Side::Sell, symbol, sell_offset)?;

		Ok(Batch {
			buy_offset,
			sell_offset,
			buys,
			sells,
		})
	}

	fn fetch_side(
		&self,
		side: Side,
		symbol: Option<&str>,
		offset: usize,
	) -> Result<Vec<Order>, FetchError> {
		let query = OrderQuery::active(side, symbol, offset, self.batch_size);
		self.store
			.query_orders(&query)
			.map_err(|source| FetchError::Query {
				side,
				offset,
				source,
			})
	}

	/// Iterate pages from the top of the book until both sides come back
	/// empty
	///
	/// The iterator is finite and ends after the first error.
	pub fn batches<'a>(&'a self, symbol: Option<&'a str>) -> Batches<'a> {
		Batches {
			fetcher: self,
			symbol,
			buy_offset: 0,
			sell_offset: 0,
			done: false,
		}
	}
}

/// Page cursor over the active orders of one symbol scope
///
/// Each side keeps its own offset. Orders filled while a page is being
/// matched leave the active set, so the caller hands the page back
/// through [`Batches::rewind_filled`] before asking for the next one;
/// otherwise the next page would skip as many unseen orders as were
/// filled.
pub struct Batches<'a> {
	fetcher: &'a BatchFetcher,
	symbol: Option<&'a str>,
	buy_offset: usize,
	sell_offset: usize,
	done: bool,
}

impl Batches<'_> {
	/// Pull each side's offset back over the orders of `batch` that are
	/// no longer fillable
	pub fn rewind_filled(&mut self, batch: &Batch) {
		let filled = |orders: &[Order]| orders.iter().filter(|o| !o.is_fillable()).count();
		self.buy_offset = self.buy_offset.saturating_sub(filled(&batch.buys));
		self.sell_offset = self.sell_offset.saturating_sub(filled(&batch.sells));
	}
}

impl Iterator for Batches<'_> {
	type Item = Result<Batch, FetchError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}

		match self
			.fetcher
			.fetch(self.symbol, self.buy_offset, self.sell_offset)
		{
			Ok(batch) if batch.is_empty() => {
				self.done = true;
				None
			}
			Ok(batch) => {
				self.buy_offset += batch.buys.len();
				self.sell_offset += batch.sells.len();
				Some(Ok(batch))
			}
			Err(e) => {
				self.done = true;
				Some(Err(e))
			}
		}
	}
}
