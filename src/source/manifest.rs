// src/source/manifest.rs

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{Manifest, load_and_validate};

use super::{
    DependencyRecord, RecordSource, ResourceDefinition, ResourceFilter, ResourcePayload, passes, split_key,
};

/// Record source backed by a validated TOML manifest.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    manifest: Manifest,
}

impl ManifestSource {
    pub fn new(manifest: Manifest) -> Self {
        Self { manifest }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let manifest =
            load_and_validate(path).with_context(|| format!("loading manifest {:?}", path))?;
        Ok(Self::new(manifest))
    }
}

impl RecordSource for ManifestSource {
    fn list_resource_definitions(
        &self,
        filter: Option<&dyn ResourceFilter>,
    ) -> Result<Vec<ResourceDefinition>> {
        let mut defs = Vec::with_capacity(self.manifest.resource.len());

        for (key, entry) in &self.manifest.resource {
            if !passes(filter, &entry.labels) {
                continue;
            }
            let (kind, name) = split_key(key)
                .with_context(|| format!("resource key '{key}' is not of the form kind/name"))?;
            defs.push(ResourceDefinition {
                kind: kind.to_string(),
                name: name.to_string(),
                labels: entry.labels.clone(),
                payload: ResourcePayload {
                    cmd: entry.cmd.clone(),
                    env: entry.env.clone(),
                },
            });
        }

        Ok(defs)
    }

    fn list_dependencies(
        &self,
        filter: Option<&dyn ResourceFilter>,
    ) -> Result<Vec<DependencyRecord>> {
        Ok(self
            .manifest
            .dependency
            .iter()
            .map(|d| {
                DependencyRecord {
                    parent: d.parent.clone(),
                    child: d.child.clone(),
                    labels: d.labels.clone(),
                }
                .inheriting_labels(self.manifest.resource.get(&d.child).map(|r| &r.labels))
            })
            .filter(|d| passes(filter, &d.labels))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::source::Selector;

    const MANIFEST: &str = r#"
[resource."service/db"]
labels = { tier = "data" }
cmd = "echo db"

[resource."pod/web"]
labels = { tier = "front" }
cmd = "echo web"
env = { REPLICAS = "2" }

[[dependency]]
parent = "service/db"
child = "pod/web"
labels = { tier = "front" }
"#;

    #[test]
    fn lists_definitions_and_dependencies() {
        let source = ManifestSource::new(load_from_str(MANIFEST).unwrap());

        let defs = source.list_resource_definitions(None).unwrap();
        let keys: Vec<String> = defs.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["pod/web", "service/db"]);

        let web = &defs[0];
        assert_eq!(web.payload.cmd.as_deref(), Some("echo web"));
        assert_eq!(web.payload.env.get("REPLICAS").map(String::as_str), Some("2"));

        let deps = source.list_dependencies(None).unwrap();
        assert_eq!(deps, vec![
            DependencyRecord::new("service/db", "pod/web").with_label("tier", "front")
        ]);
    }

    #[test]
    fn selector_applies_to_both_record_kinds() {
        let source = ManifestSource::new(load_from_str(MANIFEST).unwrap());
        let sel: Selector = "tier=data".parse().unwrap();

        let defs = source.list_resource_definitions(Some(&sel)).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].key(), "service/db");
        assert!(source.list_dependencies(Some(&sel)).unwrap().is_empty());
    }

    #[test]
    fn unlabelled_dependency_follows_its_child() {
        let manifest = load_from_str(
            r#"
[resource."service/db"]
labels = { app = "shop" }

[resource."pod/web"]
labels = { app = "shop" }

[resource."pod/blog"]
labels = { app = "blog" }

[[dependency]]
parent = "service/db"
child = "pod/web"

[[dependency]]
parent = "service/db"
child = "pod/blog"
"#,
        )
        .unwrap();
        let source = ManifestSource::new(manifest);
        let sel: Selector = "app=shop".parse().unwrap();

        let deps = source.list_dependencies(Some(&sel)).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].child, "pod/web");
        assert_eq!(deps[0].labels.get("app").map(String::as_str), Some("shop"));
    }
}
