// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Fixed-period driver for the queue worker.
//!
//! [`Scheduler::spawn`] starts a dedicated thread that calls
//! [`QueueWorker::tick`] once per period. Because ticks run on that one thread
//! they never overlap; the worker's busy guard covers hosts that drive ticks
//! themselves.

use crate::config::WorkerConfig;
use crate::ledger::LedgerStore;
use crate::worker::{QueueWorker, Tick};
use crossbeam::channel::{self, Sender, select};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// Fate of operations still queued when the scheduler stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Apply everything still queued before returning.
    Drain,
    /// Drop everything still queued, logging each operation.
    Discard,
}

impl FromStr for ShutdownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drain" => Ok(Self::Drain),
            "discard" => Ok(Self::Discard),
            other => Err(format!("unknown shutdown policy: {other}")),
        }
    }
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drain => f.write_str("drain"),
            Self::Discard => f.write_str("discard"),
        }
    }
}

/// Counts of what shutdown did with the pending operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub drained: usize,
    pub discarded: usize,
}

/// Handle to a running worker thread.
///
/// Dropping the handle without calling [`Scheduler::shutdown`] stops the
/// thread after its current tick but leaves queued operations in place.
pub struct Scheduler<L> {
    worker: Arc<QueueWorker<L>>,
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl<L: LedgerStore + 'static> Scheduler<L> {
    /// Starts ticking `worker` every `interval`.
    pub fn spawn(worker: Arc<QueueWorker<L>>, interval: Duration) -> io::Result<Self> {
        let (stop, stopped) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);
        let ticking = Arc::clone(&worker);

        let thread = thread::Builder::new()
            .name("donation-worker".into())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "donation worker started");
                loop {
                    select! {
                        recv(stopped) -> _ => break,
                        recv(ticker) -> _ => {
                            ticking.tick();
                        }
                    }
                }
                info!("donation worker stopped");
            })?;

        Ok(Self {
            worker,
            stop,
            thread,
        })
    }

    pub fn from_config(worker: Arc<QueueWorker<L>>, config: &WorkerConfig) -> io::Result<Self> {
        Self::spawn(worker, config.tick_interval())
    }

    pub fn worker(&self) -> &Arc<QueueWorker<L>> {
        &self.worker
    }

    /// Stops ticking, waits for the in-flight tick to finish, then drains or
    /// discards whatever is still queued.
    pub fn shutdown(self, policy: ShutdownPolicy) -> ShutdownReport {
        // The receiver is gone only if the thread already exited.
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            error!("donation worker thread panicked");
        }

        let report = match policy {
            ShutdownPolicy::Drain => {
                // A host thread may still be inside its own tick.
                let drained = loop {
                    match self.worker.drain() {
                        Tick::Busy => thread::sleep(Duration::from_millis(1)),
                        tick => break tick.attempted(),
                    }
                };
                ShutdownReport {
                    drained,
                    discarded: 0,
                }
            }
            ShutdownPolicy::Discard => {
                let mut discarded = 0;
                while let Some(operation) = self.worker.queue().dequeue() {
                    warn!(
                        kind = %operation.kind(),
                        donation = %operation.donation_id(),
                        "donation operation discarded at shutdown"
                    );
                    discarded += 1;
                }
                ShutdownReport {
                    drained: 0,
                    discarded,
                }
            }
        };

        info!(
            %policy,
            drained = report.drained,
            discarded = report.discarded,
            "donation worker shut down"
        );
        report
    }
}
