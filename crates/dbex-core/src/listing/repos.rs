use dbex_domain::{ResourceDescriptor, ResourceKind};
use serde_json::json;

use super::ListingContext;
use crate::client::ApiError;

pub(super) fn list(ctx: &ListingContext) -> Result<(), ApiError> {
    let mut page_token = String::new();
    loop {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        let mut query = Vec::new();
        if !page_token.is_empty() {
            query.push(("next_page_token", page_token.as_str()));
        }
        let response = ctx.client.get("/api/2.0/repos", &query)?;
        for repo in response["repos"].as_array().into_iter().flatten() {
            let Some(id) = repo["id"].as_u64() else {
                continue;
            };
            let path = repo["path"].as_str().unwrap_or_default();
            if !ctx.filter.accepts(path) {
                continue;
            }
            // Repos without a remote URL are corrupted leftovers; they
            // cannot be expressed as configuration.
            let Some(url) = repo["url"].as_str() else {
                ctx.scope.warn(
                    Some(ResourceKind::Repo),
                    format!("repo {id} at {path} has no remote url, skipping"),
                );
                continue;
            };
            let payload = json!({
                "url": url,
                "provider": repo["provider"],
                "path": path,
                "branch": repo["branch"],
            });
            ctx.scope.add(
                ResourceDescriptor::new(ResourceKind::Repo, id.to_string(), path)
                    .with_payload(payload),
            );
        }
        match response["next_page_token"].as_str() {
            Some(token) if !token.is_empty() => page_token = token.to_string(),
            _ => break,
        }
    }
    Ok(())
}
