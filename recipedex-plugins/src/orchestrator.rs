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

//! Staged, interruptible reload pipeline.
//!
//! # Cycle
//!
//! For every stage in the requested plan:
//!
//! 1. **Pre**: reloadables then contributors receive `pre_stage`.
//! 2. **Registering**: reloadables receive `start_reload`; then, for each
//!    reloadable in registration order, every contributor is run against it,
//!    surrounded by the cross-notification hooks on the other reloadables.
//! 3. **Ending**: reloadables receive `end_reload`, followed by the mirrored
//!    post pass.
//!
//! Interruption is checked between hook invocations, never inside one. A
//! reload that ignores interruption past `interrupt_timeout_ms` is abandoned:
//! its thread is detached and its generation is superseded, so anything it
//! still registers is discarded by the registries.

use crate::contributor::{Contributor, ContributorRegistry};
use crate::error::{ReloadError, ReloadResult};
use crate::main_thread::MainThreadExecutor;
use crate::reloadable::{Phase, ReloadContext, Reloadable};
use crate::state::{ReloadEvent, ReloadState};
use parking_lot::{Condvar, Mutex, RwLock};
use recipedex_core::{ReloadConfig, ReloadStage};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A contributor or reloadable hook that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    /// Contributor id or reloadable name.
    pub subject: String,
    /// Reloadable the failing call was made against, if any.
    pub reloadable: Option<String>,
    pub phase: Phase,
    pub stage: ReloadStage,
    pub message: String,
}

/// Diagnostics for one reload task.
#[derive(Debug, Clone, Default)]
pub struct ReloadReport {
    pub generation: u64,
    /// Stages that ran to completion.
    pub stages: Vec<ReloadStage>,
    pub contributor_failures: Vec<HookFailure>,
    pub reloadable_failures: Vec<HookFailure>,
    pub main_thread_handoffs: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl ReloadReport {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        !self.interrupted
            && self.contributor_failures.is_empty()
            && self.reloadable_failures.is_empty()
    }
}

enum HookOutcome {
    Done,
    Interrupted,
    Failed(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Run one hook behind a catch boundary.
fn guarded<F>(hook: F) -> HookOutcome
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => HookOutcome::Done,
        Ok(Err(err)) => match err.downcast_ref::<ReloadError>() {
            Some(ReloadError::Interrupted) => HookOutcome::Interrupted,
            _ => HookOutcome::Failed(format!("{err:#}")),
        },
        Err(payload) => HookOutcome::Failed(panic_message(payload.as_ref())),
    }
}

/// Bookkeeping for one task, shared with whichever thread runs it.
struct Task {
    generation: u64,
    interrupt: Arc<AtomicBool>,
    state: Mutex<ReloadState>,
    finished: Mutex<bool>,
    finished_cv: Condvar,
}

impl Task {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            interrupt: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(ReloadState::Idle),
            finished: Mutex::new(false),
            finished_cv: Condvar::new(),
        }
    }

    fn advance(&self, event: ReloadEvent) -> ReloadResult<()> {
        let mut state = self.state.lock();
        *state = state.transition(event)?;
        Ok(())
    }

    fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }

    fn is_finished(&self) -> bool {
        *self.finished.lock()
    }

    fn finish(&self) {
        *self.finished.lock() = true;
        self.finished_cv.notify_all();
    }

    /// Block until the task finished. False on timeout.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut finished = self.finished.lock();
        while !*finished {
            if self.finished_cv.wait_until(&mut finished, deadline).timed_out() {
                return *finished;
            }
        }
        true
    }
}

/// Marks a task finished when its run ends, including by unwinding.
struct FinishOnDrop<'a>(&'a Task);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

struct Worker {
    task: Arc<Task>,
    handle: JoinHandle<()>,
}

/// State shared between the orchestrator and its workers.
struct Shared {
    config: ReloadConfig,
    contributors: ContributorRegistry,
    reloadables: RwLock<Vec<Arc<dyn Reloadable>>>,
    main_thread: Arc<MainThreadExecutor>,
    generation: AtomicU64,
    last_report: Mutex<Option<ReloadReport>>,
}

/// Drives reload cycles over the registered reloadables and contributors.
///
/// At most one task is in flight. Requests are serialised; a request for a
/// `Start` or full reload interrupts the running task first and waits for it.
/// This holds in both modes: a synchronous task running on one thread can be
/// interrupted from any other.
pub struct ReloadOrchestrator {
    shared: Arc<Shared>,
    requests: Mutex<()>,
    current: Mutex<Option<Arc<Task>>>,
    worker: Mutex<Option<Worker>>,
}

impl ReloadOrchestrator {
    pub fn new(config: ReloadConfig) -> Self {
        let main_thread = Arc::new(MainThreadExecutor::new(&config));
        Self {
            shared: Arc::new(Shared {
                config,
                contributors: ContributorRegistry::new(),
                reloadables: RwLock::new(Vec::new()),
                main_thread,
                generation: AtomicU64::new(0),
                last_report: Mutex::new(None),
            }),
            requests: Mutex::new(()),
            current: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ReloadConfig {
        &self.shared.config
    }

    /// Reloadables run in the order they are registered here.
    pub fn register_reloadable(&self, reloadable: Arc<dyn Reloadable>) {
        tracing::debug!(reloadable = %reloadable.name(), "Registered reloadable");
        self.shared.reloadables.write().push(reloadable);
    }

    pub fn register_contributor(&self, contributor: Arc<dyn Contributor>) -> ReloadResult<()> {
        self.shared.contributors.register(contributor)
    }

    pub fn contributors(&self) -> &ContributorRegistry {
        &self.shared.contributors
    }

    pub fn main_thread(&self) -> &Arc<MainThreadExecutor> {
        &self.shared.main_thread
    }

    /// Generation of the newest cycle started or superseded.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ReloadState {
        self.current
            .lock()
            .as_ref()
            .map(|task| *task.state.lock())
            .unwrap_or_default()
    }

    pub fn is_reloading(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    pub fn last_report(&self) -> Option<ReloadReport> {
        self.shared.last_report.lock().clone()
    }

    /// Request a reload of one stage, or of every stage when `None`.
    ///
    /// In background mode this returns once the task is spawned; otherwise the
    /// whole task runs on the calling thread.
    pub fn request_reload(&self, stage: Option<ReloadStage>) -> ReloadResult<()> {
        let requests = self.requests.lock();
        let plan = ReloadStage::plan(stage);

        if let Some(running) = self.current_task() {
            // An `End` request lets the running task finish instead of cutting
            // it short.
            let interrupt_first = stage != Some(ReloadStage::End);
            self.settle(&running, interrupt_first);
        }

        let generation = if plan.contains(&ReloadStage::Start) {
            self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.shared.generation.load(Ordering::Acquire)
        };
        let task = Arc::new(Task::new(generation));
        *self.current.lock() = Some(Arc::clone(&task));

        tracing::info!(
            generation,
            stages = ?plan,
            background = self.shared.config.background,
            "Reload requested"
        );

        if !self.shared.config.background {
            // Released so other threads can interrupt this task.
            drop(requests);
            self.shared.run_task(&plan, &task);
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let worker_task = Arc::clone(&task);
        let spawned = thread::Builder::new()
            .name("recipedex-reload".to_string())
            .spawn(move || shared.run_task(&plan, &worker_task));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                task.finish();
                return Err(ReloadError::Spawn(err));
            }
        };
        *self.worker.lock() = Some(Worker { task, handle });
        Ok(())
    }

    /// Interrupt whatever is running and wait for it to stop.
    pub fn terminate_running_reloads(&self) {
        let _requests = self.requests.lock();
        if let Some(running) = self.current_task() {
            self.settle(&running, true);
        }
    }

    /// Wait for the running task to finish on its own.
    ///
    /// Returns false if it is still running after `timeout`.
    pub fn await_completion(&self, timeout: Duration) -> bool {
        let Some(running) = self.current_task() else {
            return true;
        };
        if !running.wait(timeout) {
            return false;
        }
        if let Some(worker) = self.take_worker(&running) {
            join(worker.handle);
        }
        true
    }

    fn current_task(&self) -> Option<Arc<Task>> {
        self.current.lock().clone()
    }

    fn take_worker(&self, task: &Arc<Task>) -> Option<Worker> {
        let mut slot = self.worker.lock();
        if slot.as_ref().map_or(false, |worker| Arc::ptr_eq(&worker.task, task)) {
            slot.take()
        } else {
            None
        }
    }

    /// Bring a previous task to rest: optionally interrupt it, wait up to
    /// the configured timeout, and abandon it if it does not stop.
    fn settle(&self, running: &Arc<Task>, interrupt_first: bool) {
        let timeout = self.shared.config.interrupt_timeout();
        if !running.is_finished() {
            if interrupt_first {
                tracing::debug!(
                    generation = running.generation,
                    "Interrupting running reload"
                );
                running.interrupt();
            }

            let mut stopped = running.wait(timeout);
            if !stopped && !interrupt_first {
                running.interrupt();
                stopped = running.wait(timeout);
            }

            if !stopped {
                running.interrupt();
                let superseded = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::warn!(
                    generation = running.generation,
                    superseded_by = superseded,
                    timeout_ms = timeout.as_millis() as u64,
                    "Reload did not stop in time, abandoning it"
                );
                // Detached: the task exits at its next cancellation point.
                drop(self.take_worker(running));
                let mut current = self.current.lock();
                if current.as_ref().map_or(false, |task| Arc::ptr_eq(task, running)) {
                    *current = None;
                }
                return;
            }
        }

        if let Some(worker) = self.take_worker(running) {
            join(worker.handle);
        }
    }
}

impl Drop for ReloadOrchestrator {
    fn drop(&mut self) {
        if let Some(running) = self.current.get_mut().take() {
            running.interrupt();
        }
    }
}

fn join(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("Reload worker panicked");
    }
}

impl Shared {
    fn run_task(&self, plan: &[ReloadStage], task: &Task) {
        let _finish = FinishOnDrop(task);
        let start = Instant::now();
        let mut report = ReloadReport::new(task.generation);
        let reloadables = self.reloadables.read().clone();
        let contributors = self.contributors.ordered();

        for &stage in plan {
            let ctx = ReloadContext::new(task.generation, stage, Arc::clone(&task.interrupt));
            match self.run_stage(&ctx, task, &reloadables, &contributors, &mut report) {
                Ok(()) => report.stages.push(stage),
                Err(err) => {
                    if !err.is_interrupted() {
                        tracing::error!(stage = %stage, error = %err, "Reload stage aborted");
                    }
                    report.interrupted = true;
                    // Fails only when the stage never began.
                    let _ = task.advance(ReloadEvent::Interrupt);
                    break;
                }
            }
        }

        report.elapsed = start.elapsed();
        if report.interrupted {
            tracing::debug!(
                generation = report.generation,
                completed = ?report.stages,
                "Reload interrupted"
            );
        } else {
            tracing::info!(
                generation = report.generation,
                stages = ?report.stages,
                contributor_failures = report.contributor_failures.len(),
                reloadable_failures = report.reloadable_failures.len(),
                main_thread_handoffs = report.main_thread_handoffs,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Reload finished"
            );
        }

        {
            let mut last = self.last_report.lock();
            // an abandoned task must not hide the report of its successor
            if last.as_ref().map_or(true, |prev| prev.generation <= report.generation) {
                *last = Some(report);
            }
        }
    }

    fn run_stage(
        &self,
        ctx: &ReloadContext,
        task: &Task,
        reloadables: &[Arc<dyn Reloadable>],
        contributors: &[Arc<dyn Contributor>],
        report: &mut ReloadReport,
    ) -> ReloadResult<()> {
        ctx.check()?;
        task.advance(ReloadEvent::Begin)?;

        for reloadable in reloadables {
            ctx.check()?;
            self.reloadable_hook(reloadable.as_ref(), None, Phase::PreStage, ctx, report, || {
                reloadable.pre_stage(ctx)
            })?;
        }
        for contributor in contributors {
            ctx.check()?;
            self.contributor_hook(contributor.as_ref(), None, Phase::PreStage, ctx, report, || {
                contributor.pre_stage(ctx.stage())
            })?;
        }

        ctx.check()?;
        task.advance(ReloadEvent::Register)?;

        for reloadable in reloadables {
            ctx.check()?;
            self.reloadable_hook(reloadable.as_ref(), None, Phase::StartReload, ctx, report, || {
                reloadable.start_reload(ctx)
            })?;
        }

        for current in reloadables {
            ctx.check()?;
            self.notify_others(reloadables, current, Phase::BeforeReloadable, ctx, report, |other| {
                other.before_reloadable(current.as_ref(), ctx)
            })?;

            for contributor in contributors {
                ctx.check()?;
                self.notify_others(
                    reloadables,
                    current,
                    Phase::BeforeReloadablePlugin,
                    ctx,
                    report,
                    |other| other.before_reloadable_plugin(current.as_ref(), contributor.as_ref(), ctx),
                )?;
                self.accept(current, contributor, ctx, report)?;
                self.notify_others(
                    reloadables,
                    current,
                    Phase::AfterReloadablePlugin,
                    ctx,
                    report,
                    |other| other.after_reloadable_plugin(current.as_ref(), contributor.as_ref(), ctx),
                )?;
            }

            self.notify_others(reloadables, current, Phase::AfterReloadable, ctx, report, |other| {
                other.after_reloadable(current.as_ref(), ctx)
            })?;
        }

        // Last cancellation point; past here the stage runs to completion.
        ctx.check()?;
        task.advance(ReloadEvent::End)?;

        for reloadable in reloadables {
            if let HookOutcome::Failed(message) = guarded(|| reloadable.end_reload(ctx)) {
                tracing::error!(
                    reloadable = %reloadable.name(),
                    stage = %ctx.stage(),
                    error = %message,
                    "end_reload failed, index may be incomplete"
                );
                report.reloadable_failures.push(HookFailure {
                    subject: reloadable.name().to_string(),
                    reloadable: None,
                    phase: Phase::EndReload,
                    stage: ctx.stage(),
                    message,
                });
            }
        }

        for reloadable in reloadables {
            if let HookOutcome::Failed(message) = guarded(|| reloadable.post_stage(ctx)) {
                self.record_reloadable_failure(reloadable.as_ref(), None, Phase::PostStage, ctx, report, message);
            }
        }
        for contributor in contributors {
            if let HookOutcome::Failed(message) = guarded(|| contributor.post_stage(ctx.stage())) {
                self.record_contributor_failure(contributor.as_ref(), None, Phase::PostStage, ctx, report, message);
            }
        }

        task.advance(ReloadEvent::Finish)?;
        Ok(())
    }

    /// Run one contributor against one reloadable, on the main thread if both
    /// sides ask for it.
    fn accept(
        &self,
        reloadable: &Arc<dyn Reloadable>,
        contributor: &Arc<dyn Contributor>,
        ctx: &ReloadContext,
        report: &mut ReloadReport,
    ) -> ReloadResult<()> {
        let marshal = contributor.needs_main_thread()
            && reloadable.main_thread_sensitive(ctx.stage())
            && self.main_thread.needs_handoff();

        let outcome = if marshal {
            report.main_thread_handoffs += 1;
            let reloadable = Arc::clone(reloadable);
            let job_contributor = Arc::clone(contributor);
            let job_ctx = ctx.clone();
            self.main_thread.execute(contributor.id(), ctx, move || {
                guarded(|| reloadable.accept_contributor(job_contributor.as_ref(), &job_ctx))
            })?
        } else {
            guarded(|| reloadable.accept_contributor(contributor.as_ref(), ctx))
        };

        match outcome {
            HookOutcome::Done => Ok(()),
            HookOutcome::Interrupted => Err(ReloadError::Interrupted),
            HookOutcome::Failed(message) => {
                self.record_contributor_failure(
                    contributor.as_ref(),
                    Some(reloadable.name()),
                    Phase::Register,
                    ctx,
                    report,
                    message,
                );
                Ok(())
            }
        }
    }

    fn notify_others<F>(
        &self,
        reloadables: &[Arc<dyn Reloadable>],
        current: &Arc<dyn Reloadable>,
        phase: Phase,
        ctx: &ReloadContext,
        report: &mut ReloadReport,
        hook: F,
    ) -> ReloadResult<()>
    where
        F: Fn(&dyn Reloadable) -> anyhow::Result<()>,
    {
        for other in reloadables.iter().filter(|r| !Arc::ptr_eq(*r, current)) {
            self.reloadable_hook(other.as_ref(), Some(current.name()), phase, ctx, report, || {
                hook(other.as_ref())
            })?;
        }
        Ok(())
    }

    fn reloadable_hook<F>(
        &self,
        reloadable: &dyn Reloadable,
        about: Option<&str>,
        phase: Phase,
        ctx: &ReloadContext,
        report: &mut ReloadReport,
        hook: F,
    ) -> ReloadResult<()>
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        match guarded(hook) {
            HookOutcome::Done => Ok(()),
            HookOutcome::Interrupted => Err(ReloadError::Interrupted),
            HookOutcome::Failed(message) => {
                self.record_reloadable_failure(reloadable, about, phase, ctx, report, message);
                Ok(())
            }
        }
    }

    fn contributor_hook<F>(
        &self,
        contributor: &dyn Contributor,
        reloadable: Option<&str>,
        phase: Phase,
        ctx: &ReloadContext,
        report: &mut ReloadReport,
        hook: F,
    ) -> ReloadResult<()>
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        match guarded(hook) {
            HookOutcome::Done => Ok(()),
            HookOutcome::Interrupted => Err(ReloadError::Interrupted),
            HookOutcome::Failed(message) => {
                self.record_contributor_failure(contributor, reloadable, phase, ctx, report, message);
                Ok(())
            }
        }
    }

    fn record_contributor_failure(
        &self,
        contributor: &dyn Contributor,
        reloadable: Option<&str>,
        phase: Phase,
        ctx: &ReloadContext,
        report: &mut ReloadReport,
        message: String,
    ) {
        tracing::warn!(
            contributor = %contributor.id(),
            reloadable = reloadable.unwrap_or("-"),
            phase = ?phase,
            stage = %ctx.stage(),
            error = %message,
            "Contributor failed, continuing with the rest"
        );
        report.contributor_failures.push(HookFailure {
            subject: contributor.id().to_string(),
            reloadable: reloadable.map(str::to_string),
            phase,
            stage: ctx.stage(),
            message,
        });
    }

    fn record_reloadable_failure(
        &self,
        reloadable: &dyn Reloadable,
        about: Option<&str>,
        phase: Phase,
        ctx: &ReloadContext,
        report: &mut ReloadReport,
        message: String,
    ) {
        tracing::warn!(
            reloadable = %reloadable.name(),
            about = about.unwrap_or("-"),
            phase = ?phase,
            stage = %ctx.stage(),
            error = %message,
            "Reloadable hook failed"
        );
        report.reloadable_failures.push(HookFailure {
            subject: reloadable.name().to_string(),
            reloadable: about.map(str::to_string),
            phase,
            stage: ctx.stage(),
            message,
        });
    }
}
