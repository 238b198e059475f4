use std::collections::HashMap;
use std::env;

use dbex_domain::ResourceKind;

/// Bounds for per-kind worker pools; values outside are clamped.
const MIN_PARALLELISM: usize = 1;
const MAX_PARALLELISM: usize = 15;

#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Process-wide exporter settings, read once at startup and fixed for the
/// run's duration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: Option<String>,
    pub token: Option<String>,
    pub parallelism: ParallelismConfig,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let mut per_kind = HashMap::new();
        for kind in ResourceKind::all() {
            let key = format!("DBEX_PARALLELISM_{kind}");
            if let Some(value) = snapshot.var(&key).and_then(|v| v.parse::<usize>().ok()) {
                per_kind.insert(kind, value.clamp(MIN_PARALLELISM, MAX_PARALLELISM));
            }
        }
        let default = snapshot
            .var("DBEX_PARALLELISM_default")
            .and_then(|v| v.parse::<usize>().ok())
            .map(|v| v.clamp(MIN_PARALLELISM, MAX_PARALLELISM));
        Self {
            host: snapshot
                .var("DATABRICKS_HOST")
                .map(|h| h.trim_end_matches('/').to_string()),
            token: snapshot.var("DATABRICKS_TOKEN").map(ToOwned::to_owned),
            parallelism: ParallelismConfig { default, per_kind },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParallelismConfig {
    default: Option<usize>,
    per_kind: HashMap<ResourceKind, usize>,
}

impl ParallelismConfig {
    /// Detail-fetch worker count for one kind: explicit per-kind override,
    /// then the `default` override, then a built-in per-kind constant.
    pub fn for_kind(&self, kind: ResourceKind) -> usize {
        if let Some(&value) = self.per_kind.get(&kind) {
            return value;
        }
        if let Some(value) = self.default {
            return value;
        }
        match kind {
            ResourceKind::Notebook => 10,
            ResourceKind::Job | ResourceKind::Pipeline | ResourceKind::Dashboard => 5,
            ResourceKind::Cluster => 4,
            _ => 1,
        }
    }
}
