use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::resource::{NodeIndex, ResourceStatus};
use crate::dag::scheduler_step::{ScheduledCreation, SchedulerStep};
use crate::dag::state_manager::{ReadyQueue, StateManager};
use crate::errors::CreationError;
use crate::exec::retry::{NoRetry, RetryPolicy};
use crate::report::{ResourceOutcome, ResourceReport, SchedulingReport};

/// Knobs for a scheduling run.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Upper bound on resources in `Creating` at once. `None` = unbounded.
    pub max_in_flight: Option<usize>,
    pub retry_policy: Arc<dyn RetryPolicy>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_in_flight: None,
            retry_policy: Arc::new(NoRetry),
        }
    }
}

/// Scheduler owns the dependency graph for the duration of a run and is the
/// only writer of resource statuses.
///
/// It is a pure state machine: it hands out [`ScheduledCreation`]s and is told
/// about their outcomes, but never performs IO itself. The async
/// [`crate::exec::Executor`] drives it.
///
/// It is responsible for:
/// - moving unblocked `Init` resources to `Creating` (at most once each)
/// - recording `Ready` / `Error` outcomes
/// - consulting the retry policy on failure
/// - permanently blocking the dependents of a resource that failed for good
/// - refusing new dispatches once halted (cancellation)
///
/// Work per completion is proportional to the completed resource's
/// dependents plus whatever it dispatches, never to the size of the graph.
#[derive(Debug)]
pub struct Scheduler {
    graph: DependencyGraph,
    options: SchedulerOptions,
    attempts: Vec<u32>,
    errors: Vec<Option<CreationError>>,
    /// Root failure that makes a resource impossible to start.
    blocked_by: Vec<Option<NodeIndex>>,
    ready: ReadyQueue,
    in_flight: usize,
    halted: bool,
}

impl Scheduler {
    /// Construct a scheduler over an acyclic graph.
    ///
    /// Statuses are taken as found, so a graph may be partially Ready already.
    pub fn new(graph: DependencyGraph, options: SchedulerOptions) -> Self {
        let n = graph.len();
        let ready = ReadyQueue::seed(&graph);
        Self {
            graph,
            options,
            attempts: vec![0; n],
            errors: vec![None; n],
            blocked_by: vec![None; n],
            ready,
            in_flight: 0,
            halted: false,
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn status_of(&self, key: &str) -> Option<ResourceStatus> {
        self.graph.get(key).map(|n| n.status())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// True once nothing is in flight. Everything dispatchable is dispatched
    /// eagerly, so no further progress is possible at that point.
    pub fn is_finished(&self) -> bool {
        self.in_flight == 0
    }

    /// Dispatch every resource that can start right now.
    pub fn start(&mut self) -> SchedulerStep {
        info!(
            resources = self.graph.len(),
            max_in_flight = ?self.options.max_in_flight,
            "scheduler: starting run"
        );
        let mut step = SchedulerStep {
            newly_scheduled: self.collect_new_ready(),
            ..Default::default()
        };
        step.run_just_finished = self.is_finished();
        step
    }

    /// Stop dispatching. In-flight creations may still complete and are
    /// recorded, but nothing new leaves `Init` and failures are not retried.
    pub fn halt(&mut self) {
        if !self.halted {
            info!(in_flight = self.in_flight, "scheduler: halted; no new creations");
            self.halted = true;
        }
    }

    /// Record the outcome of a dispatched creation and return what to do next.
    pub fn handle_completion(
        &mut self,
        idx: NodeIndex,
        outcome: Result<(), CreationError>,
    ) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        if idx.index() >= self.graph.len()
            || self.graph.status_of(idx) != ResourceStatus::Creating
        {
            warn!(index = idx.index(), "completion for a resource that is not creating; ignoring");
            return step;
        }
        self.in_flight -= 1;

        let key = self.graph.key_of(idx).to_string();
        match outcome {
            Ok(()) => {
                let mut mgr = self.manager();
                if mgr.transition(idx, ResourceStatus::Creating, ResourceStatus::Ready) {
                    mgr.release_dependents(idx);
                }
                info!(resource = %key, attempt = self.attempts[idx.index()], "resource ready");
                step.newly_ready.push(key);
            }
            Err(err) => {
                self.manager()
                    .transition(idx, ResourceStatus::Creating, ResourceStatus::Error);
                let attempts = self.attempts[idx.index()];

                match self.retry_delay(&key, attempts, &err) {
                    Some(delay) => {
                        warn!(resource = %key, attempts, error = %err, ?delay, "creation failed; retrying");
                        // Kept in case the retry is abandoned before it runs.
                        self.errors[idx.index()] = Some(err);
                        let retry = self.redispatch(idx, delay);
                        step.newly_scheduled.extend(retry);
                    }
                    None => {
                        warn!(resource = %key, attempts, error = %err, "creation failed; blocking dependents");
                        self.errors[idx.index()] = Some(err);
                        let blocked = self.manager().mark_dependents_blocked(idx);
                        step.newly_blocked = self.graph.keys_of(&blocked);
                        step.newly_failed.push(key);
                    }
                }
            }
        }

        step.newly_scheduled.extend(self.collect_new_ready());
        step.run_just_finished = self.is_finished();
        if step.run_just_finished {
            info!("scheduler: nothing left in flight; run finished");
        }
        step
    }

    /// Record that a dispatched retry was dropped while waiting out its
    /// backoff, without the creation operation being called.
    ///
    /// Only meaningful once halted. The resource goes back to `Error` with
    /// the failure that triggered the retry, the phantom attempt is not
    /// counted, and its dependents are permanently blocked.
    pub fn handle_abandoned(&mut self, idx: NodeIndex) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        if idx.index() >= self.graph.len()
            || self.graph.status_of(idx) != ResourceStatus::Creating
        {
            warn!(index = idx.index(), "abandoned creation for a resource that is not creating; ignoring");
            return step;
        }
        self.in_flight -= 1;

        let i = idx.index();
        self.attempts[i] = self.attempts[i].saturating_sub(1);
        self.manager()
            .transition(idx, ResourceStatus::Creating, ResourceStatus::Error);

        let key = self.graph.key_of(idx).to_string();
        if self.errors[i].is_none() {
            self.errors[i] = Some(CreationError::new(key.as_str(), "retry abandoned: run cancelled"));
        }
        warn!(resource = %key, attempts = self.attempts[i], "pending retry abandoned; blocking dependents");

        let blocked = self.manager().mark_dependents_blocked(idx);
        step.newly_blocked = self.graph.keys_of(&blocked);
        step.newly_failed.push(key);

        step.newly_scheduled.extend(self.collect_new_ready());
        step.run_just_finished = self.is_finished();
        if step.run_just_finished {
            info!("scheduler: nothing left in flight; run finished");
        }
        step
    }

    /// Final per-resource report. Consumes the scheduler.
    pub fn into_report(self) -> SchedulingReport {
        let resources = self
            .graph
            .iter()
            .map(|(idx, node)| {
                let i = idx.index();
                let outcome = match node.status() {
                    ResourceStatus::Ready => ResourceOutcome::Ready,
                    ResourceStatus::Error => ResourceOutcome::Failed(
                        self.errors[i]
                            .clone()
                            .unwrap_or_else(|| CreationError::new(node.key(), "unknown error")),
                    ),
                    ResourceStatus::Init | ResourceStatus::Creating => match self.blocked_by[i] {
                        Some(failed) => ResourceOutcome::Blocked {
                            failed: self.graph.key_of(failed).to_string(),
                        },
                        None => ResourceOutcome::NotStarted,
                    },
                };
                ResourceReport {
                    key: node.key().to_string(),
                    status: node.status(),
                    attempts: self.attempts[i],
                    outcome,
                }
            })
            .collect();

        SchedulingReport {
            resources,
            cycles: Vec::new(),
            cancelled: self.halted,
        }
    }

    fn manager(&mut self) -> StateManager<'_> {
        StateManager::new(&mut self.graph, &mut self.blocked_by, &mut self.ready)
    }

    fn retry_delay(&self, key: &str, attempts: u32, err: &CreationError) -> Option<Duration> {
        if self.halted {
            return None;
        }
        self.options.retry_policy.next_delay(key, attempts, err)
    }

    fn redispatch(&mut self, idx: NodeIndex, delay: Duration) -> Option<ScheduledCreation> {
        if !self
            .manager()
            .transition(idx, ResourceStatus::Error, ResourceStatus::Creating)
        {
            return None;
        }
        Some(self.dispatch(idx, delay))
    }

    /// Move ready resources to `Creating`, up to the in-flight limit.
    fn collect_new_ready(&mut self) -> Vec<ScheduledCreation> {
        if self.halted {
            return Vec::new();
        }

        let free = match self.options.max_in_flight {
            Some(max) => max.saturating_sub(self.in_flight),
            None => usize::MAX,
        };
        if free == 0 {
            return Vec::new();
        }

        let ready = self.manager().collect_new_ready(free);
        ready
            .into_iter()
            .map(|idx| self.dispatch(idx, Duration::ZERO))
            .collect()
    }

    /// Bookkeeping for a resource that has just entered `Creating`.
    fn dispatch(&mut self, idx: NodeIndex, delay: Duration) -> ScheduledCreation {
        let i = idx.index();
        self.attempts[i] += 1;
        self.in_flight += 1;

        let node = self.graph.node(idx);
        debug!(
            resource = %node.key(),
            attempt = self.attempts[i],
            in_flight = self.in_flight,
            "dispatching creation"
        );

        ScheduledCreation {
            index: idx,
            key: node.key().to_string(),
            definition: node.definition().clone(),
            attempt: self.attempts[i],
            delay,
        }
    }
}
