//! Background task groups with last-write-wins delivery.
//!
//! Each [`Group`] owns one long-lived worker that runs submitted jobs one at a
//! time. A job still waiting when a newer one arrives is dropped unrun; a
//! running job is never cancelled. Every finished job produces a
//! [`Completion`] on a single channel read by the interaction loop, which uses
//! [`WorkerScheduler::is_current`] to ignore results that a later submission
//! has superseded.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_lite::future::Boxed;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Search,
    Preview,
    Apply,
}

impl Group {
    pub const ALL: [Group; 3] = [Group::Search, Group::Preview, Group::Apply];

    fn index(self) -> usize {
        match self {
            Self::Search => 0,
            Self::Preview => 1,
            Self::Apply => 2,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search => write!(f, "search"),
            Self::Preview => write!(f, "preview"),
            Self::Apply => write!(f, "apply"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Idle,
    Running,
    RunningWithQueued,
}

/// Freshness token handed out by [`WorkerScheduler::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub group: Group,
    pub generation: u64,
}

/// A job died without producing a value (it panicked or was aborted).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TaskFailure(String);

impl TaskFailure {
    fn from_join(err: JoinError) -> Self {
        if !err.is_panic() {
            return Self("task cancelled".into());
        }
        let payload = err.into_panic();
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "task panicked".into());
        Self(reason)
    }
}

#[derive(Debug)]
pub struct Completion<T> {
    pub group: Group,
    pub generation: u64,
    pub outcome: Result<T, TaskFailure>,
}

impl<T> Completion<T> {
    pub fn ticket(&self) -> Ticket {
        Ticket {
            group: self.group,
            generation: self.generation,
        }
    }
}

struct Job<T> {
    generation: u64,
    task: Boxed<T>,
}

/// Worker-side progress, read by [`WorkerScheduler::state`].
#[derive(Default)]
struct Lane {
    started: AtomicU64,
    busy: AtomicBool,
}

struct GroupHandle<T> {
    jobs: mpsc::UnboundedSender<Job<T>>,
    lane: Arc<Lane>,
    generation: u64,
}

pub struct WorkerScheduler<T> {
    groups: [GroupHandle<T>; 3],
}

impl<T: Send + 'static> WorkerScheduler<T> {
    /// Spawn one worker per group on the current tokio runtime.
    ///
    /// Must be called from within a runtime. Dropping the scheduler stops the
    /// workers once their current job is done.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Completion<T>>) {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let groups = Group::ALL.map(|group| {
            let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
            let lane = Arc::new(Lane::default());
            tokio::spawn(run_group(group, jobs_rx, Arc::clone(&lane), done_tx.clone()));
            GroupHandle {
                jobs: jobs_tx,
                lane,
                generation: 0,
            }
        });
        (Self { groups }, done_rx)
    }

    /// Queue `task` in `group`, superseding anything submitted there before.
    pub fn submit<F>(&mut self, group: Group, task: F) -> Ticket
    where
        F: Future<Output = T> + Send + 'static,
    {
        let handle = &mut self.groups[group.index()];
        handle.generation += 1;
        let generation = handle.generation;
        let job = Job {
            generation,
            task: Box::pin(task),
        };
        if handle.jobs.send(job).is_err() {
            error!(%group, generation, "worker gone, task dropped");
        } else {
            debug!(%group, generation, "task submitted");
        }
        Ticket { group, generation }
    }

    /// True when no newer task has been submitted to the completion's group.
    pub fn is_current(&self, completion: &Completion<T>) -> bool {
        self.is_fresh(completion.ticket())
    }

    pub fn is_fresh(&self, ticket: Ticket) -> bool {
        self.groups[ticket.group.index()].generation == ticket.generation
    }

    pub fn state(&self, group: Group) -> GroupState {
        let handle = &self.groups[group.index()];
        let busy = handle.lane.busy.load(Ordering::Acquire);
        let started = handle.lane.started.load(Ordering::Acquire);
        match (busy, started < handle.generation) {
            (false, false) => GroupState::Idle,
            (true, true) => GroupState::RunningWithQueued,
            // accepted but not yet picked up by the worker counts as running
            (_, _) => GroupState::Running,
        }
    }
}

async fn run_group<T: Send + 'static>(
    group: Group,
    mut jobs: mpsc::UnboundedReceiver<Job<T>>,
    lane: Arc<Lane>,
    done: mpsc::UnboundedSender<Completion<T>>,
) {
    while let Some(mut job) = jobs.recv().await {
        while let Ok(newer) = jobs.try_recv() {
            debug!(%group, dropped = job.generation, by = newer.generation, "superseded before start");
            job = newer;
        }

        let generation = job.generation;
        lane.started.store(generation, Ordering::Release);
        lane.busy.store(true, Ordering::Release);

        let outcome = tokio::spawn(job.task).await.map_err(|e| {
            let failure = TaskFailure::from_join(e);
            error!(%group, generation, "task failed: {failure}");
            failure
        });

        let delivered = done
            .send(Completion {
                group,
                generation,
                outcome,
            })
            .is_ok();
        lane.busy.store(false, Ordering::Release);

        if !delivered {
            debug!(%group, "completion receiver closed, worker exiting");
            break;
        }
    }
}
