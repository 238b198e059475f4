use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dbex_domain::{ResourceDescriptor, ResourceKind};
use serde_json::json;

use super::{for_each_parallel, ListingContext};
use crate::client::ApiError;

/// Depth-first walk of the workspace tree, exporting notebook sources.
/// The match side of the filter applies to notebook paths only; only an
/// excluded directory is pruned without descending.
pub(super) fn list(ctx: &ListingContext) -> Result<(), ApiError> {
    let mut pending = vec!["/".to_string()];
    let mut notebooks: Vec<(String, String, Option<i64>)> = Vec::new();
    while let Some(dir) = pending.pop() {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        let response = match ctx.client.get("/api/2.0/workspace/list", &[("path", &dir)]) {
            Ok(response) => response,
            Err(err) if err.is_not_found() => continue,
            Err(err) => return Err(err),
        };
        for object in response["objects"].as_array().into_iter().flatten() {
            let Some(path) = object["path"].as_str() else {
                continue;
            };
            match object["object_type"].as_str() {
                Some("DIRECTORY") => {
                    if !ctx.filter.excluded(path) {
                        pending.push(path.to_string());
                    }
                }
                Some("NOTEBOOK") => {
                    if !ctx.filter.accepts(path) {
                        continue;
                    }
                    let modified_at = object["modified_at"].as_i64();
                    if !ctx.is_fresh(modified_at) {
                        continue;
                    }
                    let language = object["language"].as_str().unwrap_or("PYTHON");
                    notebooks.push((path.to_string(), language.to_string(), modified_at));
                }
                _ => {}
            }
        }
    }

    for_each_parallel(ctx.workers, &notebooks, |(path, language, modified_at)| {
        if ctx.cancel.is_cancelled() {
            return;
        }
        let result = ctx.client.get(
            "/api/2.0/workspace/export",
            &[("path", path), ("format", "SOURCE")],
        );
        match result {
            Ok(exported) => {
                let encoded = exported["content"].as_str().unwrap_or_default();
                let source = match BASE64.decode(encoded) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(err) => {
                        ctx.scope.warn(
                            Some(ResourceKind::Notebook),
                            format!("notebook {path} has undecodable content: {err}"),
                        );
                        return;
                    }
                };
                let mut descriptor =
                    ResourceDescriptor::new(ResourceKind::Notebook, path, path).with_payload(
                        json!({
                            "path": path,
                            "language": language,
                            "source": source,
                        }),
                    );
                if let Some(millis) = modified_at {
                    descriptor = descriptor.with_last_modified(*millis);
                }
                ctx.scope.add(descriptor);
            }
            Err(err) if err.is_not_found() => {
                ctx.scope.warn(
                    Some(ResourceKind::Notebook),
                    format!("notebook {path} disappeared during export"),
                );
            }
            Err(err) => {
                ctx.scope.warn(
                    Some(ResourceKind::Notebook),
                    format!("exporting notebook {path} failed: {err}"),
                );
            }
        }
    });
    Ok(())
}
