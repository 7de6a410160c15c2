// src/report.rs

//! Final per-resource outcome of a scheduling run.

use std::fmt;

use crate::dag::{DependencyGraph, ResourceStatus};
use crate::errors::{CreationError, Result, SchedulerError};

/// How a resource ended the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOutcome {
    Ready,
    /// Creation failed (after any retries).
    Failed(CreationError),
    /// Never started: `failed` is the upstream resource whose failure made a
    /// requirement unsatisfiable.
    Blocked { failed: String },
    /// Never started because the run was cancelled.
    NotStarted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReport {
    pub key: String,
    pub status: ResourceStatus,
    /// Number of creation attempts made.
    pub attempts: u32,
    pub outcome: ResourceOutcome,
}

/// Result of [`crate::schedule`] or [`crate::exec::Executor::run`].
///
/// If `cycles` is non-empty the graph was rejected and `resources` lists
/// every resource untouched in `Init`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulingReport {
    /// One entry per resource, in graph order.
    pub resources: Vec<ResourceReport>,
    /// Cycles found by the detector, each as an ordered key list.
    pub cycles: Vec<Vec<String>>,
    /// Whether the run was cancelled before completing.
    pub cancelled: bool,
}

impl SchedulingReport {
    /// Report for a graph rejected before execution: every resource is left
    /// untouched and `cycles` explains why.
    pub fn rejected(graph: &DependencyGraph, cycles: Vec<Vec<String>>) -> Self {
        let resources = graph
            .iter()
            .map(|(_, node)| ResourceReport {
                key: node.key().to_string(),
                status: node.status(),
                attempts: 0,
                outcome: ResourceOutcome::NotStarted,
            })
            .collect();

        Self {
            resources,
            cycles,
            cancelled: false,
        }
    }

    /// True iff there were no cycles and every resource is Ready.
    pub fn is_success(&self) -> bool {
        self.cycles.is_empty()
            && self
                .resources
                .iter()
                .all(|r| r.outcome == ResourceOutcome::Ready)
    }

    pub fn get(&self, key: &str) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.key == key)
    }

    pub fn ready(&self) -> Vec<&str> {
        self.keys_where(|o| matches!(o, ResourceOutcome::Ready))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.keys_where(|o| matches!(o, ResourceOutcome::Failed(_)))
    }

    pub fn blocked(&self) -> Vec<&str> {
        self.keys_where(|o| matches!(o, ResourceOutcome::Blocked { .. }))
    }

    pub fn not_started(&self) -> Vec<&str> {
        self.keys_where(|o| matches!(o, ResourceOutcome::NotStarted))
    }

    fn keys_where(&self, pred: impl Fn(&ResourceOutcome) -> bool) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|r| pred(&r.outcome))
            .map(|r| r.key.as_str())
            .collect()
    }

    /// Convert into an error unless the run fully succeeded.
    pub fn into_result(self) -> Result<SchedulingReport> {
        if !self.cycles.is_empty() {
            return Err(SchedulerError::CyclicDependency {
                cycles: self.cycles,
            });
        }
        if self.is_success() {
            return Ok(self);
        }

        let owned = |keys: Vec<&str>| -> Vec<String> {
            keys.into_iter().map(str::to_string).collect()
        };
        Err(SchedulerError::Incomplete {
            failed: owned(self.failed()),
            blocked: owned(self.blocked()),
            not_started: owned(self.not_started()),
        })
    }
}

impl fmt::Display for SchedulingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.cycles.is_empty() {
            writeln!(f, "dependency graph rejected: {} cycle(s)", self.cycles.len())?;
            for cycle in &self.cycles {
                writeln!(f, "  cycle: {}", cycle.join(" -> "))?;
            }
            return Ok(());
        }

        for r in &self.resources {
            match &r.outcome {
                ResourceOutcome::Ready => {
                    writeln!(f, "  {:<40} ready (attempts: {})", r.key, r.attempts)?
                }
                ResourceOutcome::Failed(err) => {
                    writeln!(f, "  {:<40} FAILED after {} attempt(s): {}", r.key, r.attempts, err)?
                }
                ResourceOutcome::Blocked { failed } => {
                    writeln!(f, "  {:<40} blocked by failed {}", r.key, failed)?
                }
                ResourceOutcome::NotStarted => writeln!(f, "  {:<40} not started", r.key)?,
            }
        }
        if self.cancelled {
            writeln!(f, "run cancelled before completion")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, outcome: ResourceOutcome) -> ResourceReport {
        let status = match outcome {
            ResourceOutcome::Ready => ResourceStatus::Ready,
            ResourceOutcome::Failed(_) => ResourceStatus::Error,
            _ => ResourceStatus::Init,
        };
        ResourceReport {
            key: key.to_string(),
            status,
            attempts: u32::from(status != ResourceStatus::Init),
            outcome,
        }
    }

    #[test]
    fn all_ready_is_success() {
        let report = SchedulingReport {
            resources: vec![entry("pod/a", ResourceOutcome::Ready)],
            ..Default::default()
        };
        assert!(report.is_success());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn partial_failure_lists_each_category() {
        let report = SchedulingReport {
            resources: vec![
                entry("pod/a", ResourceOutcome::Ready),
                entry(
                    "pod/b",
                    ResourceOutcome::Failed(CreationError::new("pod/b", "boom")),
                ),
                entry(
                    "pod/c",
                    ResourceOutcome::Blocked {
                        failed: "pod/b".to_string(),
                    },
                ),
                entry("pod/d", ResourceOutcome::NotStarted),
            ],
            cycles: Vec::new(),
            cancelled: true,
        };

        assert_eq!(report.ready(), vec!["pod/a"]);
        match report.into_result() {
            Err(SchedulerError::Incomplete {
                failed,
                blocked,
                not_started,
            }) => {
                assert_eq!(failed, vec!["pod/b"]);
                assert_eq!(blocked, vec!["pod/c"]);
                assert_eq!(not_started, vec!["pod/d"]);
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn cycles_become_cyclic_dependency_error() {
        let report = SchedulingReport {
            cycles: vec![vec!["pod/a".to_string(), "pod/a".to_string()]],
            ..Default::default()
        };
        assert!(!report.is_success());
        assert!(report.to_string().contains("pod/a -> pod/a"));
        assert!(matches!(
            report.into_result(),
            Err(SchedulerError::CyclicDependency { .. })
        ));
    }
}
