// src/dag/mod.rs

//! Dependency graph, cycle detection and scheduling.
//!
//! - [`resource`] defines graph nodes and their status state machine.
//! - [`graph`] holds the arena-backed graph and its builder.
//! - [`cycles`] enumerates cycles before anything is executed.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   resources can be created now and reacts to creation outcomes.
//! - [`scheduler_step`] defines the result types for scheduler steps.
//! - [`state_manager`] applies individual status transitions.

pub mod cycles;
pub mod graph;
pub mod resource;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;

pub use cycles::{Cycle, cyclic_components, detect_cycles};
pub use graph::{DependencyGraph, build_dependency_graph};
pub use resource::{NodeIndex, ResourceStatus, ScheduledResource};
pub use scheduler::{Scheduler, SchedulerOptions};
pub use scheduler_step::{ScheduledCreation, SchedulerStep};
