//! Bounded-concurrency task execution
//!
//! A fixed pool of workers shares an atomic cursor into the task list, so no
//! two workers ever claim the same index and at most K tasks are inside
//! `execute` at any instant. Completions are funneled through a single mpsc
//! consumer, which serializes all shared mutation performed by the caller.

use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::Result;
use crate::types::{BusinessRecord, Task};

/// Process-wide cooperative cancellation flag, set once by an interrupt.
///
/// Workers observe it before claiming a new task; an in-flight task is
/// allowed to finish naturally.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag {
    inner: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Outcome of one scheduled task
#[derive(Debug)]
pub enum TaskOutcome {
    /// Fetch succeeded with the raw record batch
    Fetched(Vec<BusinessRecord>),
    /// Fetch failed after the caller's retry budget was exhausted
    Failed(String),
    /// The leaf was already complete; no fetch was issued
    Skipped,
}

/// A task paired with its outcome, delivered on the completion channel
#[derive(Debug)]
pub struct TaskCompletion {
    pub task: Task,
    pub outcome: TaskOutcome,
}

/// Executes a task list with at most `parallel` tasks in flight.
pub struct TaskScheduler {
    parallel: usize,
    min_delay: Duration,
    max_delay: Duration,
    cancel: CancellationFlag,
}

impl TaskScheduler {
    pub fn new(
        parallel: usize,
        min_delay: Duration,
        max_delay: Duration,
        cancel: CancellationFlag,
    ) -> Self {
        Self {
            parallel: parallel.max(1),
            min_delay,
            max_delay,
            cancel,
        }
    }

    /// Spawn `min(parallel, tasks.len())` workers and return the completion
    /// channel. The channel closes once every worker has exited, either by
    /// draining the list or by observing cancellation.
    ///
    /// `execute` runs inside a spawned task so a panicking fetch is caught
    /// at the worker boundary and reported as a failed outcome instead of
    /// tearing down the run. Completion order across workers is unspecified.
    pub fn run<S, E, Fut>(&self, tasks: Vec<Task>, should_skip: S, execute: E) -> mpsc::Receiver<TaskCompletion>
    where
        S: Fn(&Task) -> bool + Send + Sync + 'static,
        E: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<BusinessRecord>>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(32);
        let tasks = Arc::new(tasks);
        let cursor = Arc::new(AtomicUsize::new(0));
        let should_skip = Arc::new(should_skip);
        let execute = Arc::new(execute);

        let workers = self.parallel.min(tasks.len());
        debug!("Spawning {} workers over {} tasks", workers, tasks.len());

        for worker_id in 0..workers {
            let tasks = tasks.clone();
            let cursor = cursor.clone();
            let should_skip = should_skip.clone();
            let execute = execute.clone();
            let cancel = self.cancel.clone();
            let tx = tx.clone();
            let delay_window = (self.min_delay, self.max_delay);

            tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        debug!("Worker {} stopping: cancellation requested", worker_id);
                        break;
                    }

                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= tasks.len() {
                        break;
                    }
                    let task = tasks[index].clone();

                    if should_skip(&task) {
                        trace!("Worker {} skipping completed leaf {}", worker_id, task);
                        if tx
                            .send(TaskCompletion {
                                task,
                                outcome: TaskOutcome::Skipped,
                            })
                            .await
                            .is_err()
                        {
                            break;
                        }
                        continue;
                    }

                    let outcome = match tokio::spawn(execute(task.clone())).await {
                        Ok(Ok(records)) => TaskOutcome::Fetched(records),
                        Ok(Err(error)) => TaskOutcome::Failed(error.to_string()),
                        Err(join_error) => {
                            TaskOutcome::Failed(format!("task panicked: {join_error}"))
                        }
                    };

                    if tx.send(TaskCompletion { task, outcome }).await.is_err() {
                        break;
                    }

                    pause_between_tasks(delay_window.0, delay_window.1).await;
                }
            });
        }

        rx
    }
}

/// Randomized pause within the configured window, applied after each
/// executed task regardless of outcome, to throttle request rate.
async fn pause_between_tasks(min: Duration, max: Duration) {
    if max.is_zero() {
        return;
    }
    let millis = {
        let mut rng = rand::thread_rng();
        rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64)
    };
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScraperError;
    use crate::types::LocationNode;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn make_tasks(n: usize) -> Vec<Task> {
        let country = LocationNode::country("MK", "North Macedonia");
        (0..n)
            .map(|i| {
                let state = LocationNode::state(format!("S{i}"), format!("State {i}"), "MK");
                Task {
                    query: format!("dentist in State {i}"),
                    country: country.clone(),
                    state,
                    city: None,
                }
            })
            .collect()
    }

    fn scheduler(parallel: usize, cancel: CancellationFlag) -> TaskScheduler {
        TaskScheduler::new(parallel, Duration::ZERO, Duration::ZERO, cancel)
    }

    #[tokio::test]
    async fn every_task_completes_exactly_once() {
        let sched = scheduler(3, CancellationFlag::new());
        let mut rx = sched.run(make_tasks(10), |_| false, |_| async { Ok(Vec::new()) });

        let mut seen = HashSet::new();
        while let Some(completion) = rx.recv().await {
            assert!(seen.insert(completion.task.state.code.clone()));
        }
        assert_eq!(seen.len(), 10);
    }

    #[tokio::test]
    async fn at_most_k_tasks_are_concurrently_in_flight() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (active_e, peak_e) = (active.clone(), peak.clone());

        let sched = scheduler(2, CancellationFlag::new());
        let mut rx = sched.run(make_tasks(8), |_| false, move |_| {
            let active = active_e.clone();
            let peak = peak_e.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
        });

        while rx.recv().await.is_some() {}
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn skipped_tasks_do_not_execute() {
        let executed = Arc::new(Mutex::new(Vec::new()));
        let executed_e = executed.clone();

        let sched = scheduler(2, CancellationFlag::new());
        let mut rx = sched.run(
            make_tasks(4),
            |task| task.state.code == "S1" || task.state.code == "S3",
            move |task| {
                let executed = executed_e.clone();
                async move {
                    executed.lock().unwrap().push(task.state.code.clone());
                    Ok(Vec::new())
                }
            },
        );

        let mut skipped = 0;
        while let Some(completion) = rx.recv().await {
            if matches!(completion.outcome, TaskOutcome::Skipped) {
                skipped += 1;
            }
        }
        assert_eq!(skipped, 2);
        let executed = executed.lock().unwrap();
        assert!(!executed.contains(&"S1".to_string()));
        assert!(!executed.contains(&"S3".to_string()));
    }

    #[tokio::test]
    async fn failure_does_not_abort_sibling_tasks() {
        let sched = scheduler(2, CancellationFlag::new());
        let mut rx = sched.run(make_tasks(5), |_| false, |task| async move {
            if task.state.code == "S2" {
                Err(ScraperError::fetch(task.query, "permanent failure"))
            } else {
                Ok(Vec::new())
            }
        });

        let mut failed = 0;
        let mut fetched = 0;
        while let Some(completion) = rx.recv().await {
            match completion.outcome {
                TaskOutcome::Failed(_) => failed += 1,
                TaskOutcome::Fetched(_) => fetched += 1,
                TaskOutcome::Skipped => {}
            }
        }
        assert_eq!(failed, 1);
        assert_eq!(fetched, 4);
    }

    #[tokio::test]
    async fn panicking_task_becomes_a_failed_outcome() {
        let sched = scheduler(2, CancellationFlag::new());
        let mut rx = sched.run(make_tasks(3), |_| false, |task| async move {
            if task.state.code == "S0" {
                panic!("fetcher bug");
            }
            Ok(Vec::new())
        });

        let mut failed = 0;
        let mut total = 0;
        while let Some(completion) = rx.recv().await {
            total += 1;
            if let TaskOutcome::Failed(message) = completion.outcome {
                assert!(message.contains("panicked"));
                failed += 1;
            }
        }
        assert_eq!(total, 3);
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn cancellation_stops_new_claims() {
        let cancel = CancellationFlag::new();
        let cancel_e = cancel.clone();

        let sched = scheduler(1, cancel.clone());
        let mut rx = sched.run(make_tasks(10), |_| false, move |_| {
            let cancel = cancel_e.clone();
            async move {
                // First completion flips the flag, so the single worker
                // claims no further tasks.
                cancel.cancel();
                Ok(Vec::new())
            }
        });

        let mut completions = 0;
        while rx.recv().await.is_some() {
            completions += 1;
        }
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn empty_task_list_closes_channel_immediately() {
        let sched = scheduler(4, CancellationFlag::new());
        let mut rx = sched.run(Vec::new(), |_| false, |_| async { Ok(Vec::new()) });
        assert!(rx.recv().await.is_none());
    }
}
