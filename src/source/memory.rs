// src/source/memory.rs

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};

use super::{DependencyRecord, RecordSource, ResourceDefinition, ResourceFilter, passes};

/// In-memory record source.
///
/// Cloning shares the underlying records, so a test can keep a handle and
/// flip the source into a failing state after handing it out.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    definitions: Vec<ResourceDefinition>,
    dependencies: Vec<DependencyRecord>,
    failure: Option<String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor from bare `kind/name` keys and `(parent, child)`
    /// pairs. Malformed keys are kept as `kind = key`, `name = ""` so the
    /// resulting key still round-trips.
    pub fn from_keys(keys: &[&str], deps: &[(&str, &str)]) -> Self {
        let source = Self::new();
        for key in keys {
            let def = ResourceDefinition::from_key(key)
                .unwrap_or_else(|| ResourceDefinition::new(*key, ""));
            source.add_definition(def);
        }
        for (parent, child) in deps {
            source.add_dependency(DependencyRecord::new(*parent, *child));
        }
        source
    }

    pub fn add_definition(&self, def: ResourceDefinition) {
        self.lock().definitions.push(def);
    }

    pub fn add_dependency(&self, dep: DependencyRecord) {
        self.lock().dependencies.push(dep);
    }

    /// Make every subsequent read fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panicking writer; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordSource for StaticSource {
    fn list_resource_definitions(
        &self,
        filter: Option<&dyn ResourceFilter>,
    ) -> Result<Vec<ResourceDefinition>> {
        let inner = self.lock();
        if let Some(msg) = &inner.failure {
            return Err(anyhow!("listing resource definitions: {msg}"));
        }
        Ok(inner
            .definitions
            .iter()
            .filter(|d| passes(filter, &d.labels))
            .cloned()
            .collect())
    }

    fn list_dependencies(
        &self,
        filter: Option<&dyn ResourceFilter>,
    ) -> Result<Vec<DependencyRecord>> {
        let inner = self.lock();
        if let Some(msg) = &inner.failure {
            return Err(anyhow!("listing dependencies: {msg}"));
        }
        Ok(inner
            .dependencies
            .iter()
            .map(|d| {
                let child = inner.definitions.iter().find(|def| def.key() == d.child);
                d.clone().inheriting_labels(child.map(|def| &def.labels))
            })
            .filter(|d| passes(filter, &d.labels))
            .collect())
    }
}
