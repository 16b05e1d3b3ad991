//! Background preloading of likely-next tracks
//!
//! A bounded priority queue drained by a small pool of worker tasks. Each
//! worker pops the highest priority task (FIFO within a priority), skips it
//! if the cache already holds a fresh URL, and otherwise resolves it
//! through the shared [`Resolver`], so a preload and a foreground request
//! for the same key share one resolution. Failures are dropped.

use crate::resolver::Resolver;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tfsource::TrackKey;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Preload priority, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreloadPriority {
    /// Search results the user may pick
    Speculative,
    /// Successor of the track being played
    PredictedNext,
    /// Explicitly requested by the UI
    Explicit,
}

impl PreloadPriority {
    const LANES: usize = 3;

    fn lane(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Already queued at a lower priority, moved up
    Upgraded,
    /// Already queued at the same or a higher priority
    AlreadyQueued,
    /// A fresh URL is cached, nothing to do
    AlreadyCached,
    /// Queue at capacity, task rejected
    QueueFull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadTask {
    pub key: TrackKey,
    pub priority: PreloadPriority,
    pub enqueued_at: Instant,
}

#[derive(Debug)]
struct PreloadQueue {
    lanes: [VecDeque<PreloadTask>; PreloadPriority::LANES],
    queued: HashMap<TrackKey, PreloadPriority>,
    capacity: usize,
}

impl PreloadQueue {
    fn new(capacity: usize) -> Self {
        Self {
            lanes: Default::default(),
            queued: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn len(&self) -> usize {
        self.queued.len()
    }

    fn push(&mut self, key: TrackKey, priority: PreloadPriority) -> EnqueueOutcome {
        if let Some(&current) = self.queued.get(&key) {
            if current >= priority {
                return EnqueueOutcome::AlreadyQueued;
            }

            let lane = &mut self.lanes[current.lane()];
            let Some(pos) = lane.iter().position(|t| t.key == key) else {
                return EnqueueOutcome::AlreadyQueued;
            };
            let Some(mut task) = lane.remove(pos) else {
                return EnqueueOutcome::AlreadyQueued;
            };
            task.priority = priority;
            self.lanes[priority.lane()].push_back(task);
            self.queued.insert(key, priority);
            return EnqueueOutcome::Upgraded;
        }

        if self.len() >= self.capacity {
            return EnqueueOutcome::QueueFull;
        }

        self.queued.insert(key.clone(), priority);
        self.lanes[priority.lane()].push_back(PreloadTask {
            key,
            priority,
            enqueued_at: Instant::now(),
        });
        EnqueueOutcome::Queued
    }

    fn pop(&mut self) -> Option<PreloadTask> {
        let task = self.lanes.iter_mut().rev().find_map(VecDeque::pop_front)?;
        self.queued.remove(&task.key);
        Some(task)
    }

    fn snapshot(&self) -> Vec<PreloadTask> {
        self.lanes.iter().rev().flat_map(|lane| lane.iter().cloned()).collect()
    }
}

pub struct PreloadScheduler {
    queue: Arc<Mutex<PreloadQueue>>,
    notify: Arc<Notify>,
    resolver: Arc<Resolver>,
    stop_token: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PreloadScheduler {
    /// Starts `concurrency` workers on the current tokio runtime
    pub fn spawn(resolver: Arc<Resolver>, capacity: usize, concurrency: usize) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            queue: Arc::new(Mutex::new(PreloadQueue::new(capacity))),
            notify: Arc::new(Notify::new()),
            resolver,
            stop_token: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        });

        let handles = (0..concurrency.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    scheduler.queue.clone(),
                    scheduler.notify.clone(),
                    scheduler.resolver.clone(),
                    scheduler.stop_token.clone(),
                ))
            })
            .collect();
        *scheduler.workers.lock() = handles;

        scheduler
    }

    /// After [`shutdown`](Self::shutdown) every task is rejected as `QueueFull`
    pub fn enqueue(&self, key: TrackKey, priority: PreloadPriority) -> EnqueueOutcome {
        if self.stop_token.is_cancelled() {
            return EnqueueOutcome::QueueFull;
        }
        if self.resolver.is_cached(&key) {
            return EnqueueOutcome::AlreadyCached;
        }

        let outcome = self.queue.lock().push(key, priority);
        if matches!(outcome, EnqueueOutcome::Queued | EnqueueOutcome::Upgraded) {
            self.notify.notify_one();
        }
        outcome
    }

    /// Tasks waiting, highest priority first
    pub fn pending(&self) -> Vec<PreloadTask> {
        self.queue.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        !self.stop_token.is_cancelled()
    }

    /// Stops the workers and waits for them to exit
    ///
    /// Resolutions already started keep running in their own tasks and
    /// still populate the cache.
    pub async fn shutdown(&self) {
        self.stop_token.cancel();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
        info!("preload scheduler stopped");
    }
}

impl Drop for PreloadScheduler {
    fn drop(&mut self) {
        self.stop_token.cancel();
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<Mutex<PreloadQueue>>,
    notify: Arc<Notify>,
    resolver: Arc<Resolver>,
    stop_token: CancellationToken,
) {
    debug!(worker, "preload worker started");

    while !stop_token.is_cancelled() {
        let task = queue.lock().pop();

        let Some(task) = task else {
            tokio::select! {
                _ = stop_token.cancelled() => break,
                _ = notify.notified() => {}
            }
            continue;
        };

        if resolver.is_cached(&task.key) {
            debug!(worker, track = %task.key, "already cached, skipped");
        } else {
            tokio::select! {
                _ = stop_token.cancelled() => break,
                result = resolver.resolve(&task.key) => match result {
                    Ok(resolved) => debug!(
                        worker,
                        track = %task.key,
                        provider = %resolved.provider,
                        priority = ?task.priority,
                        "preloaded"
                    ),
                    Err(e) => debug!(worker, track = %task.key, "preload dropped: {}", e),
                },
            }
        }

        tokio::task::yield_now().await;
    }

    debug!(worker, "preload worker stopped");
}
