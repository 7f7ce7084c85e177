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
	fmt, io,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU8, Ordering},
	},
	thread::{self, JoinHandle},
	time::Duration,
};

use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::engine::MatchingEngine;

#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error("Match interval must be greater than zero")]
	ZeroInterval,
	#[error("Scheduler already started")]
	AlreadyStarted,
	#[error("Scheduler has been stopped")]
	Stopped,
	#[error("Failed to spawn scheduler thread: {0}")]
	Spawn(#[source] io::Error),
}

/// Lifecycle of the scheduler loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
	/// Waiting for the next tick (or not started yet)
	Idle = 0,
	/// A matching cycle is in flight
	Running = 1,
	/// Loop exited and the timer was released
	Stopped = 2,
}

impl SchedulerState {
	fn from_u8(value: u8) -> Self {
		match value {
			0 => SchedulerState::Idle,
			1 => SchedulerState::Running,
			_ => SchedulerState::Stopped,
		}
	}
}

impl fmt::Display for SchedulerState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SchedulerState::Idle => "idle",
			SchedulerState::Running => "running",
			SchedulerState::Stopped => "stopped",
		};
		f.write_str(name)
	}
}

/// Drives [`MatchingEngine::run_cycle`] on a fixed interval
///
/// The loop runs on a dedicated thread. Ticks come from a capacity-1
/// timer channel, so a cycle that outlasts the interval delays the next
/// tick instead of overlapping it. A failed cycle is logged and the loop
/// waits for the next tick.
///
/// `stop` raises the engine's cancel flag, so an in-flight cycle is
/// abandoned at its next pairing, then joins the thread. Dropping the
/// scheduler stops it.
pub struct Scheduler {
	engine: Arc<MatchingEngine>,
	state: Arc<AtomicU8>,
	cancel: Arc<AtomicBool>,
	shutdown_tx: Option<Sender<()>>,
	thread_handle: Option<JoinHandle<()>>,
}

impl Scheduler {
	pub fn new(engine: Arc<MatchingEngine>) -> Self {
		Self {
			engine,
			state: Arc::new(AtomicU8::new(SchedulerState::Idle as u8)),
			cancel: Arc::new(AtomicBool::new(false)),
			shutdown_tx: None,
			thread_handle: None,
		}
	}

	pub fn state(&self) -> SchedulerState {
		SchedulerState::from_u8(self.state.load(Ordering::Acquire))
	}

	/// Whether the loop thread is alive
	pub fn is_active(&self) -> bool {
		self.thread_handle.is_some() && self.state() != SchedulerState::Stopped
	}

	/// Arm the timer and spawn the loop thread
	pub fn start(&mut self, interval: Duration) -> Result<(), SchedulerError> {
		if interval.is_zero() {
			return Err(SchedulerError::ZeroInterval);
		}
		if self.state() == SchedulerState::Stopped {
			return Err(SchedulerError::Stopped);
		}
		if self.thread_handle.is_some() {
			return Err(SchedulerError::AlreadyStarted);
		}

		let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
		let engine = self.engine.clone();
		let state = self.state.clone();
		let cancel = self.cancel.clone();

		let thread_handle = thread::Builder::new()
			.name("matching-scheduler".to_string())
			.spawn(move || {
				info!(
					target: "scheduler",
					interval_ms = interval.as_millis() as u64,
					"Matching scheduler started"
				);
				Self::run_loop(&engine, interval, &shutdown_rx, &state, &cancel);
				info!(target: "scheduler", "Matching scheduler stopped");
			})
			.map_err(SchedulerError::Spawn)?;

		self.shutdown_tx = Some(shutdown_tx);
		self.thread_handle = Some(thread_handle);
		Ok(())
	}

	fn run_loop(
		engine: &MatchingEngine,
		interval: Duration,
		shutdown_rx: &Receiver<()>,
		state: &AtomicU8,
		cancel: &AtomicBool,
	) {
		let ticker = channel::tick(interval);

		loop {
			channel::select! {
				recv(shutdown_rx) -> _ => break,
				recv(ticker) -> _ => {
					if cancel.load(Ordering::Relaxed) {
						break;
					}

					state.store(SchedulerState::Running as u8, Ordering::Release);
					match engine.run_cycle(cancel) {
						Ok(report) if report.cancelled => {
							info!(target: "scheduler", trades = report.trades, "Matching cycle abandoned on stop");
						}
						Ok(_) => {}
						Err(e) => {
							error!(target: "scheduler", error = %e, "Matching cycle failed");
						}
					}
					state.store(SchedulerState::Idle as u8, Ordering::Release);
				}
			}
		}
	}

	/// Stop the loop and release the timer; safe to call repeatedly
	pub fn stop(&mut self) {
		if self.state() == SchedulerState::Stopped {
			return;
		}

		self.cancel.store(true, Ordering::Relaxed);
		// Disconnecting the channel wakes the loop's select
		drop(self.shutdown_tx.take());

		if let Some(handle) = self.thread_handle.take() {
			info!(target: "scheduler", "Shutting down matching scheduler");
			if let Err(e) = handle.join() {
				warn!(target: "scheduler", error = ?e, "Scheduler thread panicked");
			}
		}

		self.state
			.store(SchedulerState::Stopped as u8, Ordering::Release);
	}
}

impl Drop for Scheduler {
	fn drop(&mut self) {
		self.stop();
	}
}
