// src/exec/executor.rs

//! Async coordinator that drives a [`Scheduler`] to completion.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::dag::{
    DependencyGraph, NodeIndex, ScheduledCreation, Scheduler, SchedulerOptions, detect_cycles,
};
use crate::errors::{CreationError, Result, SchedulerError};
use crate::report::SchedulingReport;

use super::backend::CreateResource;
use super::retry::RetryPolicy;

/// Completion message sent from a creation task back to the coordinator.
#[derive(Debug)]
struct CreationCompleted {
    index: NodeIndex,
    key: String,
    outcome: AttemptOutcome,
}

#[derive(Debug)]
enum AttemptOutcome {
    /// The creation operation ran and returned.
    Finished(std::result::Result<(), CreationError>),
    /// Cancellation arrived during the retry backoff; nothing was called.
    Abandoned,
}

/// Runs creations for a dependency graph with as much parallelism as the
/// dependencies (and the optional `max_in_flight` bound) allow.
///
/// The coordinating loop owns the [`Scheduler`] and is the only code that
/// changes resource statuses. Every dispatched creation runs in its own Tokio
/// task and reports back over an mpsc channel. The loop itself only ever
/// waits for those reports or for the shutdown signal.
pub struct Executor {
    creator: Arc<dyn CreateResource>,
    options: SchedulerOptions,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(creator: Arc<dyn CreateResource>) -> Self {
        Self {
            creator,
            options: SchedulerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: Option<usize>) -> Self {
        self.options.max_in_flight = max_in_flight;
        self
    }

    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.options.retry_policy = policy;
        self
    }

    /// Create every resource in `graph`, running until nothing is in flight.
    pub async fn run(&self, graph: DependencyGraph) -> Result<SchedulingReport> {
        self.run_until(graph, std::future::pending()).await
    }

    /// Like [`Executor::run`], but once `shutdown` resolves no new creation
    /// is started. Creations already in flight are awaited and recorded; the
    /// report is marked `cancelled`. Retries still waiting out their backoff
    /// are dropped and their resources keep the failure that triggered them.
    ///
    /// Fails with [`SchedulerError::CyclicDependency`] without creating
    /// anything if the graph has a cycle.
    pub async fn run_until<F>(&self, graph: DependencyGraph, shutdown: F) -> Result<SchedulingReport>
    where
        F: Future<Output = ()>,
    {
        let cycles = detect_cycles(&graph);
        if !cycles.is_empty() {
            let cycles: Vec<Vec<String>> = cycles.iter().map(|c| c.keys(&graph)).collect();
            error!(?cycles, "refusing to run: dependency graph has cycles");
            return Err(SchedulerError::CyclicDependency { cycles });
        }

        let started = Instant::now();
        let mut scheduler = Scheduler::new(graph, self.options.clone());
        let (tx, mut rx) = mpsc::channel::<CreationCompleted>(64);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let step = scheduler.start();
        self.spawn_creations(step.newly_scheduled, &tx, &cancel_rx);

        tokio::pin!(shutdown);
        let mut shutdown_seen = false;

        while !scheduler.is_finished() {
            tokio::select! {
                _ = &mut shutdown, if !shutdown_seen => {
                    shutdown_seen = true;
                    warn!(
                        in_flight = scheduler.in_flight(),
                        "shutdown requested; waiting for in-flight creations"
                    );
                    scheduler.halt();
                    cancel_tx.send_replace(true);
                }
                event = rx.recv() => {
                    let Some(event) = event else {
                        // We hold a sender ourselves, so this cannot happen.
                        error!("creation channel closed unexpectedly");
                        break;
                    };
                    let step = match event.outcome {
                        AttemptOutcome::Finished(outcome) => {
                            debug!(resource = %event.key, ok = outcome.is_ok(), "creation completed");
                            scheduler.handle_completion(event.index, outcome)
                        }
                        AttemptOutcome::Abandoned => {
                            debug!(resource = %event.key, "retry abandoned");
                            scheduler.handle_abandoned(event.index)
                        }
                    };
                    self.spawn_creations(step.newly_scheduled, &tx, &cancel_rx);
                }
            }
        }

        let report = scheduler.into_report();
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ready = report.ready().len(),
            failed = report.failed().len(),
            blocked = report.blocked().len(),
            not_started = report.not_started().len(),
            "scheduling run finished"
        );
        Ok(report)
    }

    fn spawn_creations(
        &self,
        creations: Vec<ScheduledCreation>,
        tx: &mpsc::Sender<CreationCompleted>,
        cancel: &watch::Receiver<bool>,
    ) {
        for creation in creations {
            self.spawn_creation(creation, tx.clone(), cancel.clone());
        }
    }

    /// Spawn one creation attempt.
    ///
    /// The creation itself runs in a nested task so that a panicking
    /// implementation still produces a completion (as a failure) instead of
    /// leaving the coordinator waiting forever.
    ///
    /// A retry backoff races `cancel`; if cancellation wins, the creation
    /// operation is never called and the attempt is reported as abandoned.
    fn spawn_creation(
        &self,
        creation: ScheduledCreation,
        tx: mpsc::Sender<CreationCompleted>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let creator = Arc::clone(&self.creator);

        tokio::spawn(async move {
            let ScheduledCreation {
                index,
                key,
                definition,
                attempt,
                delay,
            } = creation;

            if !delay.is_zero() {
                debug!(resource = %key, ?delay, attempt, "waiting before retry");
                let cancelled = tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = wait_cancelled(&mut cancel) => true,
                };
                if cancelled {
                    info!(resource = %key, attempt, "run cancelled during backoff; not retrying");
                    if tx
                        .send(CreationCompleted {
                            index,
                            key: key.clone(),
                            outcome: AttemptOutcome::Abandoned,
                        })
                        .await
                        .is_err()
                    {
                        warn!(resource = %key, "coordinator gone; dropping completion");
                    }
                    return;
                }
            }

            info!(resource = %key, attempt, "creating resource");
            let started = Instant::now();
            let handle = tokio::spawn(async move { creator.create(&definition).await });

            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    error!(resource = %key, error = %join_err, "creation task aborted");
                    Err(CreationError::new(
                        key.clone(),
                        format!("creation task aborted: {join_err}"),
                    ))
                }
            };

            debug!(
                resource = %key,
                attempt,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "creation returned"
            );

            if tx
                .send(CreationCompleted {
                    index,
                    key: key.clone(),
                    outcome: AttemptOutcome::Finished(outcome),
                })
                .await
                .is_err()
            {
                warn!(resource = %key, "coordinator gone; dropping completion");
            }
        });
    }
}

/// Resolves once the run is cancelled, or once the coordinator is gone.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}
