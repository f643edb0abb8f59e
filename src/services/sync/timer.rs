use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::modules::resource::model::ResourceId;
use crate::services::publisher::StatePublisher;
use crate::services::sync::retry::PollPolicy;
use crate::services::sync::types::{SyncError, TickFlow};

enum TimerKind {
    Recurring,
    Once,
}

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

struct TimerInner {
    timers: Mutex<HashMap<ResourceId, TimerEntry>>,
    next_generation: AtomicU64,
    policy: PollPolicy,
    publisher: Arc<StatePublisher>,
}

/// Owns the lifecycle of every live reconciliation timer.
///
/// Exactly one timer per resource id: `start` on a live id is a logged
/// no-op, which is what kills the duplicate-interval class of bugs the
/// registry replaces. Ticks for one resource run strictly sequentially —
/// the loop awaits each fetch before arming the next delay, so a slow
/// fetch delays rather than overlaps the following tick.
#[derive(Clone)]
pub struct TimerController {
    inner: Arc<TimerInner>,
}

impl TimerController {
    pub fn new(policy: PollPolicy, publisher: Arc<StatePublisher>) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                timers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                policy,
                publisher,
            }),
        }
    }

    /// Begin recurring reconciliation for `id`. Returns false when a timer
    /// is already live (idempotent start).
    pub async fn start<F, Fut>(&self, id: ResourceId, tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<TickFlow, SyncError>> + Send + 'static,
    {
        self.spawn(id, TimerKind::Recurring, None, tick).await
    }

    /// Arm a single-shot reconciliation at a computed instant. The tick can
    /// chain the next shot by returning `TickFlow::Reschedule`.
    pub async fn schedule_at<F, Fut>(&self, id: ResourceId, fire_at: DateTime<Utc>, tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<TickFlow, SyncError>> + Send + 'static,
    {
        self.spawn(id, TimerKind::Once, Some(fire_at), tick).await
    }

    async fn spawn<F, Fut>(
        &self,
        id: ResourceId,
        kind: TimerKind,
        first_fire: Option<DateTime<Utc>>,
        tick: F,
    ) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<TickFlow, SyncError>> + Send + 'static,
    {
        let mut timers = self.inner.timers.lock().await;
        if timers.contains_key(&id) {
            tracing::debug!(resource = %id, "timer already live, start ignored");
            return false;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let controller = self.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            controller.run(&task_id, kind, first_fire, tick).await;
            controller.finish(&task_id, generation).await;
        });
        timers.insert(id, TimerEntry { generation, handle });
        true
    }

    async fn run<F, Fut>(
        &self,
        id: &ResourceId,
        kind: TimerKind,
        first_fire: Option<DateTime<Utc>>,
        mut tick: F,
    ) where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<TickFlow, SyncError>> + Send + 'static,
    {
        let mut consecutive_failures: u32 = 0;
        let mut degraded = false;
        let mut fire_at = first_fire;

        loop {
            let delay = match fire_at.take() {
                Some(at) => duration_until(at),
                None => self.inner.policy.next_delay(consecutive_failures),
            };
            tokio::time::sleep(delay).await;

            match tick().await {
                Ok(TickFlow::Continue) => {
                    consecutive_failures = 0;
                    if degraded {
                        degraded = false;
                        self.inner.publisher.mark_recovered(id).await;
                    }
                    if matches!(kind, TimerKind::Once) {
                        break;
                    }
                }
                Ok(TickFlow::Stop) => break,
                Ok(TickFlow::Reschedule(at)) => {
                    consecutive_failures = 0;
                    if degraded {
                        degraded = false;
                        self.inner.publisher.mark_recovered(id).await;
                    }
                    fire_at = Some(at);
                }
                Err(e) => {
                    // Transient failures must not kill polling; the backoff
                    // ladder stretches the cadence instead.
                    consecutive_failures += 1;
                    tracing::warn!(
                        resource = %id,
                        failures = consecutive_failures,
                        error = %e,
                        "reconciliation tick failed, retrying"
                    );
                    if !degraded && self.inner.policy.is_degraded(consecutive_failures) {
                        degraded = true;
                        self.inner.publisher.mark_degraded(id).await;
                    }
                }
            }
        }
    }

    /// Clear the timer for `id`. Safe when none exists, and safe to call
    /// from within that timer's own tick.
    pub async fn stop(&self, id: &ResourceId) {
        if let Some(entry) = self.inner.timers.lock().await.remove(id) {
            entry.handle.abort();
            tracing::debug!(resource = %id, "timer stopped");
        }
    }

    /// Session teardown: abort every live timer.
    pub async fn stop_all(&self) {
        let mut timers = self.inner.timers.lock().await;
        for (_, entry) in timers.drain() {
            entry.handle.abort();
        }
    }

    pub async fn live_timers(&self) -> usize {
        self.inner.timers.lock().await.len()
    }

    pub async fn is_live(&self, id: &ResourceId) -> bool {
        self.inner.timers.lock().await.contains_key(id)
    }

    /// Registry cleanup when a task ends on its own. The generation check
    /// keeps a stale task from removing a successor registered under the
    /// same id.
    async fn finish(&self, id: &ResourceId, generation: u64) {
        let mut timers = self.inner.timers.lock().await;
        if timers
            .get(id)
            .is_some_and(|entry| entry.generation == generation)
        {
            timers.remove(id);
        }
    }
}

fn duration_until(at: DateTime<Utc>) -> Duration {
    // An instant already in the past fires immediately.
    (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}
