//! Builders for record sources and manifests used across integration tests.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use kubedag::config::default_manifest_path;
use kubedag::source::{DependencyRecord, ResourceDefinition, StaticSource};

/// Fluent builder for a [`StaticSource`].
///
/// ```ignore
/// let source = SourceBuilder::new()
///     .resource("svc/db")
///     .labelled("pod/web", &[("app", "web")])
///     .dependency("svc/db", "pod/web")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct SourceBuilder {
    definitions: Vec<ResourceDefinition>,
    dependencies: Vec<DependencyRecord>,
}

impl SourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(self, key: &str) -> Self {
        self.labelled(key, &[])
    }

    pub fn resources(mut self, keys: &[&str]) -> Self {
        for key in keys {
            self = self.resource(key);
        }
        self
    }

    pub fn labelled(mut self, key: &str, labels: &[(&str, &str)]) -> Self {
        let mut def = ResourceDefinition::from_key(key)
            .unwrap_or_else(|| panic!("test resource key '{key}' is not kind/name"));
        for (k, v) in labels {
            def = def.with_label(*k, *v);
        }
        self.definitions.push(def);
        self
    }

    pub fn definition(mut self, def: ResourceDefinition) -> Self {
        self.definitions.push(def);
        self
    }

    /// `child` requires `parent`.
    pub fn dependency(mut self, parent: &str, child: &str) -> Self {
        self.dependencies.push(DependencyRecord::new(parent, child));
        self
    }

    pub fn labelled_dependency(mut self, parent: &str, child: &str, labels: &[(&str, &str)]) -> Self {
        let mut dep = DependencyRecord::new(parent, child);
        for (k, v) in labels {
            dep = dep.with_label(*k, *v);
        }
        self.dependencies.push(dep);
        self
    }

    pub fn build(self) -> StaticSource {
        let source = StaticSource::new();
        for def in self.definitions {
            source.add_definition(def);
        }
        for dep in self.dependencies {
            source.add_dependency(dep);
        }
        source
    }
}

/// `pod/n0 .. pod/n{n-1}`.
pub fn chain_keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("pod/n{i}")).collect()
}

/// A ring of `k` resources: `pod/n0 -> pod/n1 -> ... -> pod/n{k-1} -> pod/n0`.
pub fn ring_source(k: usize) -> StaticSource {
    let keys = chain_keys(k);
    let mut builder = SourceBuilder::new();
    for key in &keys {
        builder = builder.resource(key);
    }
    for i in 0..k {
        builder = builder.dependency(&keys[i], &keys[(i + 1) % k]);
    }
    builder.build()
}

/// Builds the TOML text of a manifest.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    scheduler: Vec<String>,
    resources: Vec<String>,
    dependencies: Vec<String>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `key = value` line inside `[scheduler]`, e.g. `("max_in_flight", "2")`.
    pub fn scheduler(mut self, key: &str, value: &str) -> Self {
        self.scheduler.push(format!("{key} = {value}"));
        self
    }

    pub fn resource(self, key: &str, cmd: Option<&str>) -> Self {
        self.labelled_resource(key, cmd, &[])
    }

    pub fn labelled_resource(mut self, key: &str, cmd: Option<&str>, labels: &[(&str, &str)]) -> Self {
        let mut table = format!("[resource.\"{key}\"]\n");
        if let Some(cmd) = cmd {
            let _ = writeln!(table, "cmd = {cmd:?}");
        }
        if !labels.is_empty() {
            let inner: Vec<String> = labels.iter().map(|(k, v)| format!("{k} = {v:?}")).collect();
            let _ = writeln!(table, "labels = {{ {} }}", inner.join(", "));
        }
        self.resources.push(table);
        self
    }

    pub fn dependency(mut self, parent: &str, child: &str) -> Self {
        self.dependencies
            .push(format!("[[dependency]]\nparent = {parent:?}\nchild = {child:?}\n"));
        self
    }

    pub fn to_toml(&self) -> String {
        let mut out = String::new();
        if !self.scheduler.is_empty() {
            out.push_str("[scheduler]\n");
            for line in &self.scheduler {
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        for table in &self.resources {
            out.push_str(table);
            out.push('\n');
        }
        for table in &self.dependencies {
            out.push_str(table);
            out.push('\n');
        }
        out
    }

    /// Write the manifest into `dir` under its default file name and return
    /// its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(default_manifest_path());
        std::fs::write(&path, self.to_toml()).expect("failed to write test manifest");
        path
    }
}
