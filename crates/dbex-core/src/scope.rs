use std::sync::Mutex;

use dbex_domain::{ResourceDescriptor, ResourceKey, ResourceKind};
use indexmap::IndexMap;

/// Non-fatal problem recorded during listing or emission. Warnings are
/// reported in the run outcome but never change the exit status.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: Option<ResourceKind>,
    pub message: String,
}

/// Ordered, deduplicated accumulator of discovered resources. Listing
/// workers for different kinds insert concurrently; a single lock guards
/// the collection since insertion is nowhere near the bottleneck (the API
/// round-trips are).
#[derive(Default)]
pub struct Scope {
    inner: Mutex<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    resources: IndexMap<ResourceKey, ResourceDescriptor>,
    warnings: Vec<Warning>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a descriptor, deduplicating by (kind, id). A repeat add
    /// merges instead of dropping: missing payload, timestamp, or display
    /// name on the existing entry are filled from the newcomer.
    pub fn add(&self, descriptor: ResourceDescriptor) -> bool {
        let mut inner = self.inner.lock().expect("scope lock");
        match inner.resources.get_mut(&descriptor.key) {
            Some(existing) => {
                if existing.payload.is_null() && !descriptor.payload.is_null() {
                    existing.payload = descriptor.payload;
                }
                if existing.last_modified.is_none() {
                    existing.last_modified = descriptor.last_modified;
                }
                if existing.display_name.is_empty() {
                    existing.display_name = descriptor.display_name;
                }
                false
            }
            None => {
                tracing::debug!(kind = %descriptor.key.kind, id = %descriptor.key.id, "discovered resource");
                inner.resources.insert(descriptor.key.clone(), descriptor);
                true
            }
        }
    }

    pub fn warn(&self, kind: Option<ResourceKind>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(?kind, "{message}");
        let mut inner = self.inner.lock().expect("scope lock");
        inner.warnings.push(Warning { kind, message });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("scope lock").resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the scope, returning descriptors in insertion order plus
    /// the accumulated warnings.
    pub fn into_parts(self) -> (Vec<ResourceDescriptor>, Vec<Warning>) {
        let inner = self.inner.into_inner().expect("scope lock");
        (
            inner.resources.into_values().collect(),
            inner.warnings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(id: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(ResourceKind::Cluster, id, format!("cluster {id}"))
    }

    #[test]
    fn duplicate_keys_collapse_to_one_entry() {
        let scope = Scope::new();
        assert!(scope.add(descriptor("c1")));
        assert!(!scope.add(descriptor("c1")));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn merge_fills_missing_payload() {
        let scope = Scope::new();
        scope.add(descriptor("c1"));
        scope.add(descriptor("c1").with_payload(json!({"num_workers": 2})));
        let (resources, _) = scope.into_parts();
        assert_eq!(resources[0].payload["num_workers"], 2);
    }

    #[test]
    fn merge_never_overwrites_existing_payload() {
        let scope = Scope::new();
        scope.add(descriptor("c1").with_payload(json!({"num_workers": 2})));
        scope.add(descriptor("c1").with_payload(json!({"num_workers": 9})));
        let (resources, _) = scope.into_parts();
        assert_eq!(resources[0].payload["num_workers"], 2);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let scope = Scope::new();
        scope.add(descriptor("b"));
        scope.add(descriptor("a"));
        scope.add(ResourceDescriptor::new(ResourceKind::Job, "a", "job a"));
        let (resources, _) = scope.into_parts();
        let ids: Vec<_> = resources.iter().map(|r| r.key.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "a"]);
        assert_eq!(scope_len(&resources, ResourceKind::Cluster), 2);
    }

    fn scope_len(resources: &[ResourceDescriptor], kind: ResourceKind) -> usize {
        resources.iter().filter(|r| r.key.kind == kind).count()
    }

    #[test]
    fn distinct_ids_are_never_dropped() {
        let scope = Scope::new();
        for i in 0..50 {
            scope.add(descriptor(&format!("c{i}")));
        }
        assert_eq!(scope.len(), 50);
    }

    #[test]
    fn concurrent_adds_keep_every_distinct_key() {
        let scope = Scope::new();
        std::thread::scope(|s| {
            for t in 0..4 {
                let scope = &scope;
                s.spawn(move || {
                    for i in 0..100 {
                        scope.add(descriptor(&format!("t{t}-c{i}")));
                        scope.add(descriptor("shared"));
                    }
                });
            }
        });
        assert_eq!(scope.len(), 401);
    }

    #[test]
    fn warnings_accumulate() {
        let scope = Scope::new();
        scope.warn(Some(ResourceKind::Job), "listing failed");
        scope.warn(None, "something else");
        let (_, warnings) = scope.into_parts();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].kind, Some(ResourceKind::Job));
    }
}
