// Copyright 2025 Sushanth (https://github.com/sushanthpy)
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

//! Hand-off of contributor work to the host's main thread.
//!
//! The host binds its main thread once and drains queued jobs on every tick.
//! A worker that hands off a job blocks on a reply channel, waking every
//! poll interval to check for interruption so a host that stops ticking can
//! delay cancellation but never deadlock it.

use crate::error::{ReloadError, ReloadResult};
use crate::reloadable::ReloadContext;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use recipedex_core::ReloadConfig;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct MainThreadExecutor {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    main_thread: Mutex<Option<ThreadId>>,
    background: bool,
    warn_on_handoff: bool,
    poll: Duration,
    handoffs: AtomicU64,
}

impl MainThreadExecutor {
    pub fn new(config: &ReloadConfig) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            main_thread: Mutex::new(None),
            background: config.background,
            warn_on_handoff: config.warn_on_main_thread_handoff,
            poll: config.main_thread_poll(),
            handoffs: AtomicU64::new(0),
        }
    }

    /// Declare the calling thread as the host's main thread.
    pub fn bind_current_thread(&self) {
        *self.main_thread.lock() = Some(thread::current().id());
    }

    pub fn is_main_thread(&self) -> bool {
        *self.main_thread.lock() == Some(thread::current().id())
    }

    /// A job has to be marshalled only from a background worker, and only
    /// when some thread has been bound as the main thread.
    pub fn needs_handoff(&self) -> bool {
        self.background
            && matches!(*self.main_thread.lock(), Some(id) if id != thread::current().id())
    }

    /// Run `job` on the main thread and wait for its result.
    ///
    /// Runs inline when no hand-off is needed. Returns
    /// [`ReloadError::Interrupted`] if the cycle is interrupted while waiting;
    /// the job may still run later, so it must tolerate a stale cycle.
    pub fn execute<T, F>(&self, label: &str, ctx: &ReloadContext, job: F) -> ReloadResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if !self.needs_handoff() {
            return Ok(job());
        }

        self.handoffs.fetch_add(1, Ordering::Relaxed);
        if self.warn_on_handoff {
            tracing::warn!(
                contributor = %label,
                stage = %ctx.stage(),
                "Forcing contributor onto the main thread, this blocks the reload worker"
            );
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let wrapped: Job = Box::new(move || {
            let _ = reply_tx.send(job());
        });
        self.sender
            .send(wrapped)
            .map_err(|_| ReloadError::HandOff("main thread queue closed".to_string()))?;

        loop {
            match reply_rx.recv_timeout(self.poll) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Timeout) => ctx.check()?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ReloadError::HandOff(format!(
                        "job for {label} was dropped before replying"
                    )))
                }
            }
        }
    }

    /// Drain queued jobs. Called by the host on every tick.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::error!("Main thread job panicked");
            }
            ran += 1;
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Jobs handed off since construction.
    pub fn handoffs(&self) -> u64 {
        self.handoffs.load(Ordering::Relaxed)
    }
}
