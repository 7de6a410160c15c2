// src/exec/backend.rs

//! Pluggable creation operation.
//!
//! The executor talks to a `CreateResource` instead of provisioning anything
//! itself. This keeps the scheduler independent of how resources are actually
//! created, and lets tests swap in fakes.
//!
//! - [`super::ShellCreator`] is the implementation used by the `kubedag`
//!   binary. It runs each resource's `cmd` through the shell.
//! - Any `Fn(ResourceDefinition) -> impl Future<Output = Result<(), CreationError>>`
//!   closure is also a `CreateResource`.

use std::future::Future;
use std::pin::Pin;

use crate::errors::CreationError;
use crate::source::ResourceDefinition;

/// Future returned by [`CreateResource::create`].
pub type CreateFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CreationError>> + Send + 'a>>;

/// Trait abstracting how a single resource is provisioned.
///
/// The executor calls `create` once per attempt, from its own task, with many
/// calls running in parallel. Implementations should be stateless per call
/// (or synchronise internally).
pub trait CreateResource: Send + Sync {
    fn create<'a>(&'a self, resource: &'a ResourceDefinition) -> CreateFuture<'a>;
}

impl<F, Fut> CreateResource for F
where
    F: Fn(ResourceDefinition) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CreationError>> + Send + 'static,
{
    fn create<'a>(&'a self, resource: &'a ResourceDefinition) -> CreateFuture<'a> {
        Box::pin(self(resource.clone()))
    }
}
