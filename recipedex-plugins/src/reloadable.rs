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

//! Subsystems that take part in staged population.

use crate::contributor::Contributor;
use crate::error::{ReloadError, ReloadResult};
use recipedex_core::ReloadStage;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where in a cycle a hook was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    PreStage,
    StartReload,
    BeforeReloadable,
    BeforeReloadablePlugin,
    Register,
    AfterReloadablePlugin,
    AfterReloadable,
    EndReload,
    PostStage,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::PreStage => "pre_stage",
            Phase::StartReload => "start_reload",
            Phase::BeforeReloadable => "before_reloadable",
            Phase::BeforeReloadablePlugin => "before_reloadable_plugin",
            Phase::Register => "register",
            Phase::AfterReloadablePlugin => "after_reloadable_plugin",
            Phase::AfterReloadable => "after_reloadable",
            Phase::EndReload => "end_reload",
            Phase::PostStage => "post_stage",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-stage view of a running cycle handed to every hook.
#[derive(Debug, Clone)]
pub struct ReloadContext {
    generation: u64,
    stage: ReloadStage,
    interrupt: Arc<AtomicBool>,
}

impl ReloadContext {
    pub fn new(generation: u64, stage: ReloadStage, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            generation,
            stage,
            interrupt,
        }
    }

    /// Context that can never be interrupted, for driving hooks by hand.
    pub fn detached(generation: u64, stage: ReloadStage) -> Self {
        Self::new(generation, stage, Arc::new(AtomicBool::new(false)))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stage(&self) -> ReloadStage {
        self.stage
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    /// Cooperative cancellation point.
    pub fn check(&self) -> ReloadResult<()> {
        if self.is_interrupted() {
            Err(ReloadError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// A subsystem populated in stages by contributors.
///
/// The `before_*`/`after_*` hooks notify a reloadable about the pass of a
/// *different* reloadable. Every hook may fail; failures are logged by the
/// orchestrator and never abort the cycle.
pub trait Reloadable: Send + Sync {
    fn name(&self) -> &str;

    fn pre_stage(&self, _ctx: &ReloadContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn start_reload(&self, _ctx: &ReloadContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Run one contributor's registration against this subsystem.
    fn accept_contributor(
        &self,
        contributor: &dyn Contributor,
        ctx: &ReloadContext,
    ) -> anyhow::Result<()>;

    fn end_reload(&self, _ctx: &ReloadContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn post_stage(&self, _ctx: &ReloadContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn before_reloadable(&self, _other: &dyn Reloadable, _ctx: &ReloadContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn before_reloadable_plugin(
        &self,
        _other: &dyn Reloadable,
        _contributor: &dyn Contributor,
        _ctx: &ReloadContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_reloadable_plugin(
        &self,
        _other: &dyn Reloadable,
        _contributor: &dyn Contributor,
        _ctx: &ReloadContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_reloadable(&self, _other: &dyn Reloadable, _ctx: &ReloadContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Whether `accept_contributor` must run on the host's main thread for
    /// contributors that ask for it.
    fn main_thread_sensitive(&self, _stage: ReloadStage) -> bool {
        false
    }
}
