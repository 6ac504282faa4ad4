//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Delayed and periodic task execution
//!
//! Controllers never block. Thinking, following, casting and cross-actor
//! notifications are all expressed as callbacks handed to a [`Scheduler`],
//! which returns a [`TaskHandle`] the controller keeps in a per-purpose slot
//! and cancels before installing a replacement.
//!
//! Two implementations are provided:
//! - [`TokioScheduler`] runs tasks on the tokio runtime in real time
//! - [`ManualScheduler`] runs tasks against a virtual clock advanced by hand,
//!   which makes tick-exact tests possible

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One-shot callback
pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;

/// Periodic callback
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Cancellation handle for a scheduled task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel the task. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Generic delayed/periodic executor
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TaskHandle;

    /// Run `task` after `initial`, then every `period`, until cancelled
    fn schedule_repeating(
        &self,
        initial: Duration,
        period: Duration,
        task: RepeatingTask,
    ) -> TaskHandle;

    /// Monotonic time since the scheduler started
    fn now(&self) -> Duration;
}

/// Real-time scheduler backed by the tokio runtime
pub struct TokioScheduler {
    runtime: tokio::runtime::Handle,
    epoch: tokio::time::Instant,
    next_id: AtomicU64,
}

impl TokioScheduler {
    /// Create a scheduler on the current tokio runtime
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new() -> Self {
        Self::with_runtime(tokio::runtime::Handle::current())
    }

    pub fn with_runtime(runtime: tokio::runtime::Handle) -> Self {
        Self {
            runtime,
            epoch: tokio::time::Instant::now(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_handle(&self) -> TaskHandle {
        TaskHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TaskHandle {
        let handle = self.next_handle();
        let guard = handle.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if guard.is_cancelled() {
                return;
            }
            if let Err(err) = tokio::task::spawn_blocking(task).await {
                tracing::error!(task = guard.id(), error = %err, "Scheduled task failed");
            }
        });
        handle
    }

    fn schedule_repeating(
        &self,
        initial: Duration,
        period: Duration,
        mut task: RepeatingTask,
    ) -> TaskHandle {
        let handle = self.next_handle();
        let guard = handle.clone();
        self.runtime.spawn(async move {
            let start = tokio::time::Instant::now() + initial;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if guard.is_cancelled() {
                    break;
                }
                // Ticks lock controllers; keep them off the async workers
                task = match tokio::task::spawn_blocking(move || {
                    task();
                    task
                })
                .await
                {
                    Ok(task) => task,
                    Err(err) => {
                        tracing::error!(task = guard.id(), error = %err, "Repeating task failed");
                        break;
                    }
                };
            }
        });
        handle
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

enum ManualTask {
    Once(Option<OnceTask>),
    Repeating(RepeatingTask, Duration),
}

struct ManualEntry {
    due: Duration,
    handle: TaskHandle,
    task: ManualTask,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    entries: Vec<ManualEntry>,
}

/// Virtual-clock scheduler; nothing runs until [`ManualScheduler::advance`]
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert(&self, delay: Duration, task: ManualTask) -> TaskHandle {
        let mut state = self.lock();
        state.next_id += 1;
        let handle = TaskHandle::new(state.next_id);
        let due = state.now + delay;
        state.entries.push(ManualEntry {
            due,
            handle: handle.clone(),
            task,
        });
        handle
    }

    /// Run every task falling due within the next `duration`, in due order,
    /// then move the clock to the end of the window
    pub fn advance(&self, duration: Duration) {
        let target = self.lock().now + duration;
        loop {
            let entry = {
                let mut state = self.lock();
                state.entries.retain(|e| !e.handle.is_cancelled());
                let next = state
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.due <= target)
                    .min_by_key(|(_, e)| (e.due, e.handle.id))
                    .map(|(i, _)| i);
                match next {
                    Some(index) => {
                        let entry = state.entries.swap_remove(index);
                        state.now = state.now.max(entry.due);
                        entry
                    }
                    None => break,
                }
            };

            // Run without holding the lock; tasks routinely schedule more tasks
            let ManualEntry {
                due,
                handle,
                task,
            } = entry;
            match task {
                ManualTask::Once(mut once) => {
                    if let Some(run) = once.take() {
                        run();
                    }
                }
                ManualTask::Repeating(mut run, period) => {
                    run();
                    if !handle.is_cancelled() {
                        let mut state = self.lock();
                        state.entries.push(ManualEntry {
                            due: due + period,
                            handle,
                            task: ManualTask::Repeating(run, period),
                        });
                    }
                }
            }
        }
        let mut state = self.lock();
        state.now = state.now.max(target);
    }

    /// Run everything already due without moving the clock
    pub fn run_pending(&self) {
        self.advance(Duration::ZERO);
    }

    /// Number of scheduled, uncancelled tasks
    pub fn active_tasks(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|e| !e.handle.is_cancelled())
            .count()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TaskHandle {
        self.insert(delay, ManualTask::Once(Some(task)))
    }

    fn schedule_repeating(
        &self,
        initial: Duration,
        period: Duration,
        task: RepeatingTask,
    ) -> TaskHandle {
        self.insert(initial, ManualTask::Repeating(task, period.max(Duration::from_millis(1))))
    }

    fn now(&self) -> Duration {
        self.lock().now
    }
}
