// src/exec/mod.rs

//! Creation execution layer.
//!
//! - [`backend`] provides the `CreateResource` trait that the executor calls
//!   for every resource, and which tests replace with fakes.
//! - [`command`] holds `ShellCreator`, the production backend that runs each
//!   resource's `cmd` via `tokio::process::Command`.
//! - [`executor`] owns the async coordinating loop that dispatches creations
//!   in parallel and feeds their outcomes back into the scheduler.
//! - [`retry`] defines the retry hook consulted on failures.

pub mod backend;
pub mod command;
pub mod executor;
pub mod retry;

pub use backend::{CreateFuture, CreateResource};
pub use command::ShellCreator;
pub use executor::Executor;
pub use retry::{BoundedRetry, NoRetry, RetryPolicy};
