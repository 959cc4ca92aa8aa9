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

//! Host-facing session wiring.

use crate::category_registry::CategoryRegistry;
use crate::contributor::Contributor;
use crate::error::ReloadResult;
use crate::orchestrator::{ReloadOrchestrator, ReloadReport};
use crate::registry::RecordRegistry;
use recipedex_core::{RecipedexConfig, ReloadStage};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Lifecycle events raised by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// Content changed; `None` asks for every stage.
    ReloadRequested(Option<ReloadStage>),
    /// One iteration of the host's main loop.
    Tick,
    /// A world or server connection came up.
    ConnectionEstablished,
}

/// Everything one host session needs: the orchestrator and the two
/// registries it reloads.
///
/// The thread constructing the session is bound as the main thread.
pub struct RecipeSession {
    config: RecipedexConfig,
    orchestrator: ReloadOrchestrator,
    categories: Arc<CategoryRegistry>,
    records: Arc<RecordRegistry>,
}

impl RecipeSession {
    pub fn new(config: RecipedexConfig) -> Self {
        let categories = Arc::new(CategoryRegistry::new());
        let records = Arc::new(RecordRegistry::new(
            Arc::clone(&categories),
            config.index.clone(),
        ));

        let orchestrator = ReloadOrchestrator::new(config.reload.clone());
        orchestrator.register_reloadable(categories.clone());
        orchestrator.register_reloadable(records.clone());
        orchestrator.main_thread().bind_current_thread();

        Self {
            config,
            orchestrator,
            categories,
            records,
        }
    }

    pub fn config(&self) -> &RecipedexConfig {
        &self.config
    }

    pub fn register_contributor(&self, contributor: Arc<dyn Contributor>) -> ReloadResult<()> {
        self.orchestrator.register_contributor(contributor)
    }

    pub fn handle(&self, event: HostEvent) -> ReloadResult<()> {
        match event {
            HostEvent::ReloadRequested(stage) => self.orchestrator.request_reload(stage),
            HostEvent::Tick => {
                let ran = self.orchestrator.main_thread().run_pending();
                if ran > 0 {
                    tracing::trace!(jobs = ran, "Ran main thread jobs");
                }
                Ok(())
            }
            HostEvent::ConnectionEstablished => {
                tracing::info!("Connection established, reloading content");
                self.orchestrator.request_reload(None)
            }
        }
    }

    /// Tick until no reload is running. Returns false on timeout.
    pub fn run_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let poll = self.config.reload.main_thread_poll();
        loop {
            // Tick never fails.
            let _ = self.handle(HostEvent::Tick);
            if !self.orchestrator.is_reloading() {
                let left = deadline.saturating_duration_since(Instant::now());
                return self.orchestrator.await_completion(left.max(poll));
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(poll.min(Duration::from_millis(5)));
        }
    }

    pub fn orchestrator(&self) -> &ReloadOrchestrator {
        &self.orchestrator
    }

    pub fn categories(&self) -> &Arc<CategoryRegistry> {
        &self.categories
    }

    pub fn records(&self) -> &Arc<RecordRegistry> {
        &self.records
    }

    pub fn last_report(&self) -> Option<ReloadReport> {
        self.orchestrator.last_report()
    }
}
