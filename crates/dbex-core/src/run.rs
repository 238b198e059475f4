use std::fs;
use std::path::{Path, PathBuf};

use dbex_domain::{FilterError, NameFilter, ResourceKind, RenderOptions};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::cancel::CancelToken;
use crate::client::WorkspaceClient;
use crate::config::Settings;
use crate::emit::emit;
use crate::incremental::{merge_blocks, merge_lines};
use crate::listing::{driver_for, ListingContext};
use crate::outcome::ExecutionOutcome;
use crate::scope::Scope;

/// One export run, as requested on the command line.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub directory: PathBuf,
    /// Service tags whose resources may be emitted; empty means all.
    pub services: Vec<String>,
    /// Service tags whose listing drivers run; empty falls back to
    /// `services`.
    pub listing: Vec<String>,
    pub match_substring: Option<String>,
    pub match_regex: Option<String>,
    pub exclude_regex: Option<String>,
    pub incremental: bool,
    pub updated_since: Option<String>,
    pub native_import: bool,
    /// Skip `=` alignment in rendered blocks.
    pub no_format: bool,
}

/// Terminal failures of an export run. Everything else degrades to
/// warnings inside a successful outcome.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("the path {0} is not a directory")]
    NotADirectory(String),
    #[error("can't create directory {0}")]
    CannotCreateDirectory(String),
    #[error("--updated-since is required with --incremental")]
    UpdatedSinceRequired,
    #[error("can't parse value '{0}': use an RFC3339 timestamp")]
    UpdatedSinceInvalid(String),
    #[error("DATABRICKS_HOST is not set")]
    MissingHost,
    #[error("DATABRICKS_TOKEN is not set")]
    MissingToken,
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("no resources to import or delete")]
    NoResources,
    #[error("export cancelled")]
    Cancelled,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ExportError {
    /// User errors exit 1; internal failures exit 2.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

pub fn export(
    settings: &Settings,
    request: &ExportRequest,
    cancel: &CancelToken,
) -> Result<ExecutionOutcome, ExportError> {
    // Configuration problems are reported before any API work begins.
    prepare_directory(&request.directory)?;
    let updated_since = parse_updated_since(request)?;
    let filter = NameFilter::new(
        request.match_substring.as_deref(),
        request.match_regex.as_deref(),
        request.exclude_regex.as_deref(),
    )?;
    let host = settings.host.as_deref().ok_or(ExportError::MissingHost)?;
    let token = settings.token.as_deref().ok_or(ExportError::MissingToken)?;
    let client = WorkspaceClient::new(host, token)?;

    let listed = if request.listing.is_empty() {
        ResourceKind::from_services(&request.services)
    } else {
        ResourceKind::from_services(&request.listing)
    };

    let scope = Scope::new();
    std::thread::scope(|s| {
        for kind in &listed {
            let Some(driver) = driver_for(*kind) else {
                continue;
            };
            let kind = *kind;
            let client = &client;
            let scope = &scope;
            let filter = &filter;
            s.spawn(move || {
                tracing::info!(%kind, "listing");
                let ctx = ListingContext {
                    client,
                    scope,
                    filter,
                    cancel,
                    workers: settings.parallelism.for_kind(kind),
                    updated_since,
                };
                if let Err(err) = driver(&ctx) {
                    scope.warn(Some(kind), format!("listing {kind} failed: {err}"));
                }
            });
        }
    });

    if cancel.is_cancelled() {
        return Err(ExportError::Cancelled);
    }
    if scope.is_empty() {
        return Err(ExportError::NoResources);
    }

    let (mut descriptors, mut warnings) = scope.into_parts();
    // `--listing` widens discovery; only kinds tagged by `--services` make
    // it into the emitted configuration.
    if !request.services.is_empty() && !request.services.iter().any(|s| s == "all") {
        descriptors.retain(|descriptor| {
            request
                .services
                .iter()
                .any(|s| s == descriptor.key.kind.service())
        });
        if descriptors.is_empty() {
            return Err(ExportError::NoResources);
        }
    }
    let options = RenderOptions {
        align_equals: !request.no_format,
    };
    let mut emission = emit(&mut descriptors, request.native_import, options);
    for warning in &emission.warnings {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
    }
    warnings.append(&mut emission.warnings);

    let mut written = Vec::new();
    for (group, blocks) in &emission.blocks {
        let path = request.directory.join(format!("{group}.tf"));
        write_merged_blocks(&path, blocks, request.incremental)?;
        written.push(format!("{group}.tf"));
    }
    if !emission.variables.is_empty() {
        let blocks: Vec<(String, String)> = emission
            .variables
            .iter()
            .map(|(name, text)| (format!("variable \"{name}\""), text.clone()))
            .collect();
        let path = request.directory.join("vars.tf");
        write_merged_blocks(&path, &blocks, request.incremental)?;
        written.push("vars.tf".to_string());
    }
    write_import_script(request, &emission.import_lines)?;
    written.push("import.sh".to_string());
    if request.native_import {
        write_import_blocks(request, &emission.import_blocks)?;
        written.push("import.tf".to_string());
    }
    for (relative, bytes) in &emission.companions {
        let path = request.directory.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(anyhow::Error::from)?;
        }
        fs::write(&path, bytes).map_err(anyhow::Error::from)?;
    }

    let count = descriptors.len();
    let message = format!(
        "exported {count} resources to {}",
        request.directory.display()
    );
    let details = json!({
        "resources": count,
        "files": written,
        "warnings": warnings.iter().map(|w| w.message.clone()).collect::<Vec<_>>(),
    });
    Ok(ExecutionOutcome::success(message, details))
}

fn prepare_directory(directory: &Path) -> Result<(), ExportError> {
    if directory.exists() {
        if !directory.is_dir() {
            return Err(ExportError::NotADirectory(
                directory.display().to_string(),
            ));
        }
        return Ok(());
    }
    fs::create_dir_all(directory)
        .map_err(|_| ExportError::CannotCreateDirectory(directory.display().to_string()))
}

fn parse_updated_since(request: &ExportRequest) -> Result<Option<i64>, ExportError> {
    if !request.incremental {
        return Ok(None);
    }
    let raw = request
        .updated_since
        .as_deref()
        .ok_or(ExportError::UpdatedSinceRequired)?;
    let parsed = OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|_| ExportError::UpdatedSinceInvalid(raw.to_string()))?;
    Ok(Some(
        (parsed.unix_timestamp_nanos() / 1_000_000) as i64,
    ))
}

fn write_merged_blocks(
    path: &Path,
    blocks: &[(String, String)],
    incremental: bool,
) -> Result<(), ExportError> {
    let content = if incremental && path.exists() {
        let existing = fs::read_to_string(path).map_err(anyhow::Error::from)?;
        merge_blocks(&existing, blocks)
    } else {
        let mut out = String::new();
        for (index, (_, text)) in blocks.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(text);
        }
        out
    };
    fs::write(path, content).map_err(anyhow::Error::from)?;
    Ok(())
}

fn write_import_script(
    request: &ExportRequest,
    lines: &[String],
) -> Result<(), ExportError> {
    let path = request.directory.join("import.sh");
    let content = if request.incremental && path.exists() {
        let existing = fs::read_to_string(&path).map_err(anyhow::Error::from)?;
        merge_lines(&existing, lines)
    } else {
        let mut out = lines.join("\n");
        out.push('\n');
        out
    };
    fs::write(&path, content).map_err(anyhow::Error::from)?;
    Ok(())
}

fn write_import_blocks(
    request: &ExportRequest,
    blocks: &[(String, String)],
) -> Result<(), ExportError> {
    let path = request.directory.join("import.tf");
    let mut content = if request.incremental && path.exists() {
        fs::read_to_string(&path).map_err(anyhow::Error::from)?
    } else {
        String::new()
    };
    for (address, text) in blocks {
        // One import block per address; earlier runs may already have it.
        if content.contains(&format!("to = {address}")) {
            continue;
        }
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(text);
    }
    fs::write(&path, content).map_err(anyhow::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvSnapshot;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use tempfile::tempdir;

    fn settings_for(server: &Server) -> Settings {
        let host = server.url_str("");
        Settings::from_snapshot(&EnvSnapshot::testing(&[
            ("DATABRICKS_HOST", host.as_str()),
            ("DATABRICKS_TOKEN", "dapi-test"),
        ]))
    }

    fn request_for(dir: &Path, services: &str) -> ExportRequest {
        ExportRequest {
            directory: dir.to_path_buf(),
            services: services.split(',').map(ToOwned::to_owned).collect(),
            ..ExportRequest::default()
        }
    }

    #[test]
    fn export_fails_when_target_is_a_file() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("occupied");
        fs::write(&file, "x").unwrap();
        let settings = Settings::from_snapshot(&EnvSnapshot::testing(&[]));
        let err = export(
            &settings,
            &request_for(&file, "compute"),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::NotADirectory(_)));
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn incremental_without_timestamp_is_a_config_error() {
        let tmp = tempdir().unwrap();
        let settings = Settings::from_snapshot(&EnvSnapshot::testing(&[]));
        let mut request = request_for(tmp.path(), "dlt");
        request.incremental = true;
        let err = export(&settings, &request, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ExportError::UpdatedSinceRequired));

        request.updated_since = Some("aaa".to_string());
        let err = export(&settings, &request, &CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("can't parse value 'aaa'"));
    }

    #[test]
    fn empty_workspace_yields_the_no_resources_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/repos"))
                .respond_with(json_encoded(serde_json::json!({"repos": []}))),
        );
        let tmp = tempdir().unwrap();
        let err = export(
            &settings_for(&server),
            &request_for(tmp.path(), "repos"),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "no resources to import or delete");
    }

    #[test]
    fn failing_kind_degrades_to_warning_when_another_succeeds() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/repos"))
                .respond_with(status_code(500)),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines"))
                .respond_with(json_encoded(serde_json::json!({
                    "statuses": [{"pipeline_id": "abc", "name": "abc"}]
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines/abc"))
                .respond_with(json_encoded(serde_json::json!({
                    "spec": {"name": "abc", "target": "default"}
                }))),
        );

        let tmp = tempdir().unwrap();
        let outcome = export(
            &settings_for(&server),
            &request_for(tmp.path(), "repos,dlt"),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(outcome.details["resources"], 1);
        let warnings = outcome.details["warnings"].as_array().unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.as_str().unwrap().contains("listing repo failed")));
        let dlt = fs::read_to_string(tmp.path().join("dlt.tf")).unwrap();
        assert!(dlt.contains("resource \"databricks_pipeline\" \"abc\""));
    }

    #[test]
    fn clusters_export_references_policies() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.1/clusters/list"))
                .respond_with(json_encoded(serde_json::json!({
                    "clusters": [{"cluster_id": "test2", "cluster_name": "test cluster"}]
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.1/clusters/get"))
                .respond_with(json_encoded(serde_json::json!({
                    "cluster_id": "test2",
                    "cluster_name": "test cluster",
                    "policy_id": "pol-1",
                    "autotermination_minutes": 120
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/policies/clusters/list"))
                .respond_with(json_encoded(serde_json::json!({
                    "policies": [{
                        "policy_id": "pol-1",
                        "name": "Users Cluster Policy",
                        "definition": "{}"
                    }]
                }))),
        );

        let tmp = tempdir().unwrap();
        let outcome = export(
            &settings_for(&server),
            &request_for(tmp.path(), "compute,policies"),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(outcome.details["resources"], 2);

        let compute = fs::read_to_string(tmp.path().join("compute.tf")).unwrap();
        assert!(compute.contains("resource \"databricks_cluster\" \"test_cluster\""));
        assert!(compute.contains("databricks_cluster_policy.users_cluster_policy.id"));

        let policies = fs::read_to_string(tmp.path().join("policies.tf")).unwrap();
        assert!(policies.contains("resource \"databricks_cluster_policy\" \"users_cluster_policy\""));

        let import = fs::read_to_string(tmp.path().join("import.sh")).unwrap();
        assert!(import.contains("terraform import databricks_cluster.test_cluster \"test2\""));
        assert!(import
            .contains("terraform import databricks_cluster_policy.users_cluster_policy \"pol-1\""));
    }

    #[test]
    fn incremental_run_preserves_untouched_blocks() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines"))
                .respond_with(json_encoded(serde_json::json!({
                    "statuses": [
                        {"pipeline_id": "abc", "name": "abc"},
                        {"pipeline_id": "def", "name": "def"}
                    ]
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines/abc"))
                .respond_with(json_encoded(serde_json::json!({
                    "last_modified": 1_600_000_000_000_i64,
                    "spec": {"name": "abc"}
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines/def"))
                .respond_with(json_encoded(serde_json::json!({
                    "last_modified": 1_700_000_000_000_i64,
                    "spec": {"name": "def", "target": "default"}
                }))),
        );

        let tmp = tempdir().unwrap();
        fs::write(
            tmp.path().join("dlt.tf"),
            "resource \"databricks_pipeline\" \"abc\" {\n  name = \"abc\"\n}\n\nresource \"databricks_pipeline\" \"def\" {\n}\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("import.sh"),
            "terraform import databricks_pipeline.abc \"abc\"\nterraform import databricks_pipeline.def \"def\"\n",
        )
        .unwrap();

        // Cutoff sits between the two pipelines' modification times.
        let mut request = request_for(tmp.path(), "dlt");
        request.incremental = true;
        request.updated_since = Some("2023-07-24T00:00:00Z".to_string());
        let outcome = export(&settings_for(&server), &request, &CancelToken::new()).unwrap();
        assert_eq!(outcome.details["resources"], 1);

        let dlt = fs::read_to_string(tmp.path().join("dlt.tf")).unwrap();
        assert!(dlt.contains("resource \"databricks_pipeline\" \"abc\""));
        assert!(dlt.contains("resource \"databricks_pipeline\" \"def\""));
        assert!(dlt.contains("target = \"default\""));

        let import = fs::read_to_string(tmp.path().join("import.sh")).unwrap();
        assert_eq!(import.as_str().matches("databricks_pipeline.abc").count(), 1);
        assert_eq!(import.as_str().matches("databricks_pipeline.def").count(), 1);
    }

    #[test]
    fn listing_discovers_without_emitting_unrequested_services() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/repos"))
                .respond_with(json_encoded(serde_json::json!({
                    "repos": [{
                        "id": 121,
                        "path": "/Repos/user@domain.com/repo",
                        "url": "https://github.com/user/repo.git",
                        "provider": "gitHub",
                        "branch": "main"
                    }]
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines"))
                .respond_with(json_encoded(serde_json::json!({
                    "statuses": [{"pipeline_id": "abc", "name": "abc"}]
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines/abc"))
                .respond_with(json_encoded(serde_json::json!({
                    "spec": {"name": "abc"}
                }))),
        );

        let tmp = tempdir().unwrap();
        let mut request = request_for(tmp.path(), "dlt");
        request.listing = vec!["repos".to_string(), "dlt".to_string()];
        let outcome = export(&settings_for(&server), &request, &CancelToken::new()).unwrap();

        assert_eq!(outcome.details["resources"], 1);
        assert!(tmp.path().join("dlt.tf").exists());
        assert!(!tmp.path().join("repos.tf").exists());
        let import = fs::read_to_string(tmp.path().join("import.sh")).unwrap();
        assert!(import.contains("databricks_pipeline.abc"));
        assert!(!import.contains("databricks_repo"));
    }

    #[test]
    fn disjoint_services_and_listing_leave_nothing_to_emit() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines"))
                .respond_with(json_encoded(serde_json::json!({
                    "statuses": [{"pipeline_id": "abc", "name": "abc"}]
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/api/2.0/pipelines/abc"))
                .respond_with(json_encoded(serde_json::json!({
                    "spec": {"name": "abc"}
                }))),
        );

        let tmp = tempdir().unwrap();
        let mut request = request_for(tmp.path(), "compute");
        request.listing = vec!["dlt".to_string()];
        let err = export(&settings_for(&server), &request, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ExportError::NoResources));
    }

    #[test]
    fn cancelled_run_reports_cancellation() {
        let tmp = tempdir().unwrap();
        let settings = Settings::from_snapshot(&EnvSnapshot::testing(&[
            ("DATABRICKS_HOST", "http://127.0.0.1:1"),
            ("DATABRICKS_TOKEN", "t"),
        ]));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = export(&settings, &request_for(tmp.path(), "repos"), &cancel).unwrap_err();
        assert!(matches!(err, ExportError::Cancelled));
    }
}
