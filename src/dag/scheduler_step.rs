// src/dag/scheduler_step.rs

//! Step-by-step result types for the scheduler.

use std::time::Duration;

use crate::dag::resource::NodeIndex;
use crate::source::ResourceDefinition;

/// A creation the scheduler wants dispatched now.
///
/// The resource is already `Creating` when this is handed out.
#[derive(Debug, Clone)]
pub struct ScheduledCreation {
    pub index: NodeIndex,
    pub key: String,
    pub definition: ResourceDefinition,
    /// 1 for the first attempt, incremented on every retry.
    pub attempt: u32,
    /// Wait this long before calling the creation operation (retries only).
    pub delay: Duration,
}

/// Structured result of a single scheduler step.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Creations that should be dispatched as a result of this step.
    pub newly_scheduled: Vec<ScheduledCreation>,
    /// Keys that reached `Ready` in this step.
    pub newly_ready: Vec<String>,
    /// Keys that ended in `Error` for good in this step.
    pub newly_failed: Vec<String>,
    /// Keys that can never start because an upstream resource failed.
    pub newly_blocked: Vec<String>,
    /// Whether nothing is in flight any more after this step.
    pub run_just_finished: bool,
}
