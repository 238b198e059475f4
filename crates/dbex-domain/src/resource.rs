use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, IntoEnumIterator};

/// Category of Databricks object the exporter knows how to enumerate and
/// render. Each kind maps onto exactly one Terraform resource type, one
/// service tag for `--services`/`--listing`, and one output file group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cluster,
    ClusterPolicy,
    Job,
    Pipeline,
    SecretScope,
    Secret,
    Notebook,
    Repo,
    Dashboard,
}

impl ResourceKind {
    pub fn terraform_type(self) -> &'static str {
        match self {
            Self::Cluster => "databricks_cluster",
            Self::ClusterPolicy => "databricks_cluster_policy",
            Self::Job => "databricks_job",
            Self::Pipeline => "databricks_pipeline",
            Self::SecretScope => "databricks_secret_scope",
            Self::Secret => "databricks_secret",
            Self::Notebook => "databricks_notebook",
            Self::Repo => "databricks_repo",
            Self::Dashboard => "databricks_dashboard",
        }
    }

    /// Tag accepted by `--services` and `--listing`. Secrets share a tag
    /// with their parent scope since they are discovered together.
    pub fn service(self) -> &'static str {
        match self {
            Self::Cluster => "compute",
            Self::ClusterPolicy => "policies",
            Self::Job => "jobs",
            Self::Pipeline => "dlt",
            Self::SecretScope | Self::Secret => "secrets",
            Self::Notebook => "notebooks",
            Self::Repo => "repos",
            Self::Dashboard => "dashboards",
        }
    }

    /// Output file group; resources land in `<group>.tf`.
    pub fn file_group(self) -> &'static str {
        match self {
            Self::Cluster => "compute",
            Self::ClusterPolicy => "policies",
            Self::Job => "jobs",
            Self::Pipeline => "dlt",
            Self::SecretScope | Self::Secret => "secrets",
            Self::Notebook => "notebooks",
            Self::Repo => "repos",
            Self::Dashboard => "dashboards",
        }
    }

    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }

    /// Kinds enabled by a comma-separated service list. An empty list or
    /// the literal `all` enables everything.
    pub fn from_services(services: &[String]) -> Vec<Self> {
        if services.is_empty() || services.iter().any(|s| s == "all") {
            return Self::all();
        }
        Self::iter()
            .filter(|kind| services.iter().any(|s| s == kind.service()))
            .collect()
    }
}

/// Deduplication identity of one exportable object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// One discovered object: identity, display label, fetched attribute
/// payload, and the identifier assigned by the naming pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub key: ResourceKey,
    pub display_name: String,
    /// Attribute payload as returned by the detail call, already stripped
    /// of server-managed fields by the listing driver.
    pub payload: Value,
    /// Epoch milliseconds of the last server-side modification, when the
    /// API exposes one. Drives incremental filtering.
    pub last_modified: Option<i64>,
    /// Set by the naming pass; empty until then.
    pub assigned_name: Option<String>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: ResourceKey::new(kind, id),
            display_name: display_name.into(),
            payload: Value::Null,
            last_modified: None,
            assigned_name: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn with_last_modified(mut self, millis: i64) -> Self {
        self.last_modified = Some(millis);
        self
    }

    /// Terraform address, e.g. `databricks_cluster.test1`. Only available
    /// once the naming pass has run.
    pub fn address(&self) -> Option<String> {
        self.assigned_name
            .as_ref()
            .map(|name| format!("{}.{name}", self.key.kind.terraform_type()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_tags_cover_every_kind() {
        for kind in ResourceKind::all() {
            assert!(!kind.service().is_empty());
            assert!(kind.terraform_type().starts_with("databricks_"));
        }
    }

    #[test]
    fn from_services_filters_by_tag() {
        let kinds = ResourceKind::from_services(&["compute".into(), "dlt".into()]);
        assert_eq!(kinds, vec![ResourceKind::Cluster, ResourceKind::Pipeline]);
    }

    #[test]
    fn from_services_empty_means_all() {
        assert_eq!(ResourceKind::from_services(&[]).len(), ResourceKind::all().len());
        assert_eq!(
            ResourceKind::from_services(&["all".into()]).len(),
            ResourceKind::all().len()
        );
    }

    #[test]
    fn secrets_share_the_scope_service() {
        let kinds = ResourceKind::from_services(&["secrets".into()]);
        assert_eq!(kinds, vec![ResourceKind::SecretScope, ResourceKind::Secret]);
    }

    #[test]
    fn address_requires_assigned_name() {
        let mut desc = ResourceDescriptor::new(ResourceKind::Cluster, "abc", "my cluster");
        assert_eq!(desc.address(), None);
        desc.assigned_name = Some("my_cluster".into());
        assert_eq!(desc.address().as_deref(), Some("databricks_cluster.my_cluster"));
    }
}
