//! Named-lane task scheduler.
//!
//! Every unit of ordered work goes through a lane: a FIFO queue with a
//! bounded number of concurrently active tasks (default 1, i.e. strict
//! serialization). Lanes are created on first use and are fully independent.
//! The registry lock is the only shared state and is never held across an
//! await; admission is driven by task completion, so the scheduler itself
//! never blocks a thread.

use std::{
    any::Any,
    collections::{HashMap, VecDeque},
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use {
    futures::{FutureExt, future::BoxFuture},
    switchyard_config::LanesConfig,
    tokio::{sync::oneshot, time::Instant},
    tracing::{debug, trace, warn},
};

use crate::{
    diagnostics::{DiagnosticsSink, TracingDiagnostics},
    error::{Error, Result},
};

/// Lane used when the caller passes an empty name.
pub const MAIN_LANE: &str = "main";

/// Probe lanes carry connectivity checks that fail routinely; their task
/// errors propagate to the caller but are not logged or reported.
#[must_use]
pub fn is_probe_lane(lane: &str) -> bool {
    lane.starts_with("auth-probe:") || lane.contains(":probe-") || lane.contains("probe-test")
}

type OnWait = Arc<dyn Fn(u64, usize) + Send + Sync>;

/// Per-enqueue options; unset fields fall back to lane configuration.
#[derive(Clone, Default)]
pub struct EnqueueOptions {
    /// Replaces the lane concurrency ceiling, clamped to >= 1.
    pub concurrency: Option<usize>,
    /// Replaces the configured wait-warning threshold for this task.
    pub warn_after_ms: Option<u64>,
    /// Called at most once if the task stays queued past the threshold, with
    /// the elapsed wait in milliseconds and the queued depth at that moment.
    pub on_wait: Option<OnWait>,
}

struct QueuedTask {
    work: BoxFuture<'static, ()>,
    started_tx: oneshot::Sender<()>,
    queued_at: Instant,
}

struct LaneState {
    queued: VecDeque<QueuedTask>,
    active: usize,
    concurrency: usize,
}

impl LaneState {
    fn new(concurrency: usize) -> Self {
        Self {
            queued: VecDeque::new(),
            active: 0,
            concurrency,
        }
    }
}

struct Inner {
    lanes: Mutex<HashMap<String, LaneState>>,
    default_concurrency: usize,
    configured: HashMap<String, usize>,
    default_warn_after_ms: Option<u64>,
    sink: Arc<dyn DiagnosticsSink>,
}

/// Schedules tasks on named lanes. Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct LaneScheduler {
    inner: Arc<Inner>,
}

impl LaneScheduler {
    /// Scheduler reporting through the default tracing sink.
    #[must_use]
    pub fn new(cfg: &LanesConfig) -> Self {
        Self::with_sink(cfg, Arc::new(TracingDiagnostics))
    }

    #[must_use]
    pub fn with_sink(cfg: &LanesConfig, sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                lanes: Mutex::new(HashMap::new()),
                default_concurrency: cfg.default_concurrency.max(1),
                configured: cfg.concurrency.clone(),
                default_warn_after_ms: cfg.warn_after_ms,
                sink,
            }),
        }
    }

    /// Queues a task and returns a future resolving with its outcome.
    ///
    /// Registration is immediate: the task counts in [`Self::queue_size`] as
    /// soon as this returns, whether or not the returned future is awaited.
    /// A task removed by [`Self::clear_lane`] resolves with
    /// [`Error::Cancelled`]; a panicking task resolves with
    /// [`Error::Panicked`] and the lane keeps draining.
    pub fn enqueue<T, F, Fut>(
        &self,
        lane: &str,
        options: EnqueueOptions,
        task: F,
    ) -> impl Future<Output = Result<T>> + Send + use<T, F, Fut>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let lane_name = normalize_lane(lane);
        let (result_tx, result_rx) = oneshot::channel::<Result<T>>();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let work = erase(Arc::clone(&self.inner), lane_name.clone(), task, result_tx);

        let depth = {
            let mut lanes = self.inner.lock_lanes();
            let lane_state = lanes
                .entry(lane_name.clone())
                .or_insert_with(|| LaneState::new(self.inner.initial_concurrency(&lane_name)));
            if let Some(limit) = options.concurrency {
                lane_state.concurrency = limit.max(1);
            }
            lane_state.queued.push_back(QueuedTask {
                work,
                started_tx,
                queued_at: Instant::now(),
            });
            lane_state.queued.len()
        };
        self.inner.emit(|sink| sink.on_enqueue(&lane_name, depth));
        #[cfg(feature = "metrics")]
        {
            switchyard_metrics::counter!(
                switchyard_metrics::lanes::TASKS_ENQUEUED_TOTAL,
                switchyard_metrics::labels::LANE => lane_name.clone()
            )
            .increment(1);
            switchyard_metrics::gauge!(switchyard_metrics::lanes::QUEUED).increment(1.0);
        }

        pump(&self.inner, &lane_name);
        self.spawn_wait_watcher(&lane_name, &options, started_rx);

        async move { result_rx.await.unwrap_or_else(|_| Err(Error::Cancelled)) }
    }

    /// Sets the lane concurrency ceiling, clamped to >= 1. Raising the
    /// ceiling admits queued tasks immediately.
    pub fn set_concurrency(&self, lane: &str, limit: usize) {
        let lane_name = normalize_lane(lane);
        {
            let mut lanes = self.inner.lock_lanes();
            let lane_state = lanes
                .entry(lane_name.clone())
                .or_insert_with(|| LaneState::new(self.inner.initial_concurrency(&lane_name)));
            lane_state.concurrency = limit.max(1);
        }
        pump(&self.inner, &lane_name);
    }

    /// Active plus queued tasks on a lane; 0 for unknown lanes.
    #[must_use]
    pub fn queue_size(&self, lane: &str) -> usize {
        let lane_name = normalize_lane(lane);
        self.inner
            .lock_lanes()
            .get(&lane_name)
            .map_or(0, |l| l.active + l.queued.len())
    }

    /// Active plus queued tasks across all lanes.
    #[must_use]
    pub fn total_queue_size(&self) -> usize {
        self.inner
            .lock_lanes()
            .values()
            .map(|l| l.active + l.queued.len())
            .sum()
    }

    /// Removes every not-yet-started task from a lane and returns how many
    /// were cancelled. Active tasks always run to completion and keep
    /// counting in [`Self::queue_size`] until they finish.
    pub fn clear_lane(&self, lane: &str) -> usize {
        let lane_name = normalize_lane(lane);
        let drained: Vec<QueuedTask> = {
            let mut lanes = self.inner.lock_lanes();
            match lanes.get_mut(&lane_name) {
                Some(lane_state) => lane_state.queued.drain(..).collect(),
                None => Vec::new(),
            }
        };
        let cancelled = drained.len();
        if cancelled > 0 {
            debug!(lane = %lane_name, cancelled, "cleared queued tasks");
            #[cfg(feature = "metrics")]
            {
                switchyard_metrics::counter!(
                    switchyard_metrics::lanes::TASKS_CANCELLED_TOTAL,
                    switchyard_metrics::labels::LANE => lane_name.clone()
                )
                .increment(cancelled as u64);
                switchyard_metrics::gauge!(switchyard_metrics::lanes::QUEUED)
                    .decrement(cancelled as f64);
            }
        }
        // Dropping the drained tasks resolves their enqueue futures with a
        // cancellation error.
        drop(drained);
        cancelled
    }

    fn spawn_wait_watcher(
        &self,
        lane_name: &str,
        options: &EnqueueOptions,
        started_rx: oneshot::Receiver<()>,
    ) {
        let Some(threshold_ms) = options
            .warn_after_ms
            .or(self.inner.default_warn_after_ms)
            .filter(|ms| *ms > 0)
        else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let lane_name = lane_name.to_string();
        let on_wait = options.on_wait.clone();
        let queued_at = Instant::now();
        tokio::spawn(async move {
            tokio::select! {
                // Admitted (or cancelled) before the deadline: no warning.
                _ = started_rx => {},
                _ = tokio::time::sleep(Duration::from_millis(threshold_ms)) => {
                    let elapsed_ms = queued_at.elapsed().as_millis() as u64;
                    let depth = inner.queued_depth(&lane_name);
                    if let Some(on_wait) = on_wait {
                        on_wait(elapsed_ms, depth);
                    }
                    inner.emit(|sink| sink.on_wait_exceeded(&lane_name, elapsed_ms));
                    #[cfg(feature = "metrics")]
                    switchyard_metrics::counter!(
                        switchyard_metrics::lanes::WAIT_EXCEEDED_TOTAL,
                        switchyard_metrics::labels::LANE => lane_name.clone()
                    )
                    .increment(1);
                },
            }
        });
    }
}

impl Inner {
    fn lock_lanes(&self) -> MutexGuard<'_, HashMap<String, LaneState>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initial_concurrency(&self, lane_name: &str) -> usize {
        self.configured
            .get(lane_name)
            .copied()
            .unwrap_or(self.default_concurrency)
            .max(1)
    }

    fn queued_depth(&self, lane_name: &str) -> usize {
        self.lock_lanes().get(lane_name).map_or(0, |l| l.queued.len())
    }

    // Sink calls are guarded: a panicking sink loses events, not tasks.
    fn emit<F: FnOnce(&dyn DiagnosticsSink)>(&self, event: F) {
        if std::panic::catch_unwind(AssertUnwindSafe(|| event(self.sink.as_ref()))).is_err() {
            debug!("diagnostics sink panicked; event dropped");
        }
    }
}

/// Wraps the caller's task into a type-erased future that records the
/// outcome, reports failures, and hands the result back through `result_tx`.
fn erase<T, F, Fut>(
    inner: Arc<Inner>,
    lane_name: String,
    task: F,
    result_tx: oneshot::Sender<Result<T>>,
) -> BoxFuture<'static, ()>
where
    T: Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Box::pin(async move {
        let outcome = AssertUnwindSafe(async move { task().await }).catch_unwind().await;
        let result = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(Error::Task(err)),
            Err(panic) => Err(Error::Panicked(panic_message(panic.as_ref()))),
        };
        if let Err(err) = &result
            && !is_probe_lane(&lane_name)
        {
            warn!(lane = %lane_name, error = %err, "lane task failed");
            inner.emit(|sink| sink.on_task_error(&lane_name, err));
            #[cfg(feature = "metrics")]
            switchyard_metrics::counter!(
                switchyard_metrics::lanes::TASK_ERRORS_TOTAL,
                switchyard_metrics::labels::LANE => lane_name.clone()
            )
            .increment(1);
        }
        #[cfg(feature = "metrics")]
        switchyard_metrics::counter!(
            switchyard_metrics::lanes::TASKS_COMPLETED_TOTAL,
            switchyard_metrics::labels::LANE => lane_name.clone()
        )
        .increment(1);
        let _ = result_tx.send(result);
    })
}

/// Admits queued tasks while the lane has spare concurrency. Called after
/// every push, completion, and ceiling change; never holds the registry lock
/// across an await.
fn pump(inner: &Arc<Inner>, lane_name: &str) {
    loop {
        let (task, queued_after, active_before) = {
            let mut lanes = inner.lock_lanes();
            let Some(lane_state) = lanes.get_mut(lane_name) else {
                return;
            };
            if lane_state.active >= lane_state.concurrency {
                return;
            }
            let Some(task) = lane_state.queued.pop_front() else {
                return;
            };
            let queued_after = lane_state.queued.len();
            let active_before = lane_state.active;
            lane_state.active += 1;
            (task, queued_after, active_before)
        };

        trace!(
            lane = %lane_name,
            waited_ms = task.queued_at.elapsed().as_millis() as u64,
            "task admitted"
        );
        inner.emit(|sink| sink.on_dequeue(lane_name, queued_after, active_before));
        #[cfg(feature = "metrics")]
        {
            switchyard_metrics::gauge!(switchyard_metrics::lanes::QUEUED).decrement(1.0);
            switchyard_metrics::gauge!(switchyard_metrics::lanes::ACTIVE).increment(1.0);
            switchyard_metrics::histogram!(switchyard_metrics::lanes::QUEUE_WAIT_SECONDS)
                .record(task.queued_at.elapsed().as_secs_f64());
        }
        let _ = task.started_tx.send(());

        let inner_clone = Arc::clone(inner);
        let lane_owned = lane_name.to_string();
        tokio::spawn(async move {
            task.work.await;
            finish(&inner_clone, &lane_owned);
        });
    }
}

fn finish(inner: &Arc<Inner>, lane_name: &str) {
    {
        let mut lanes = inner.lock_lanes();
        if let Some(lane_state) = lanes.get_mut(lane_name) {
            lane_state.active = lane_state.active.saturating_sub(1);
        }
    }
    #[cfg(feature = "metrics")]
    switchyard_metrics::gauge!(switchyard_metrics::lanes::ACTIVE).decrement(1.0);
    pump(inner, lane_name);
}

fn normalize_lane(raw: &str) -> String {
    let lane = raw.trim();
    if lane.is_empty() {
        MAIN_LANE.to_string()
    } else {
        lane.to_string()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
