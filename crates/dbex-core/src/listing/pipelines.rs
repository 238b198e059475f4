use dbex_domain::{ResourceDescriptor, ResourceKind};

use super::{for_each_parallel, strip_fields, ListingContext};
use crate::client::ApiError;

/// Spec fields owned by the service rather than the pipeline author.
const SPEC_STRIP: &[&str] = &["id", "creator_user_name", "run_as_user_name"];

pub(super) fn list(ctx: &ListingContext) -> Result<(), ApiError> {
    let mut candidates: Vec<(String, String)> = Vec::new();
    let mut page_token = String::new();
    loop {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        let mut query = vec![("max_results", "100")];
        if !page_token.is_empty() {
            query.push(("page_token", page_token.as_str()));
        }
        let response = ctx.client.get("/api/2.0/pipelines", &query)?;
        for status in response["statuses"].as_array().into_iter().flatten() {
            let Some(id) = status["pipeline_id"].as_str() else {
                continue;
            };
            let name = status["name"].as_str().unwrap_or_default();
            if !ctx.filter.accepts(name) {
                continue;
            }
            candidates.push((id.to_string(), name.to_string()));
        }
        match response["next_page_token"].as_str() {
            Some(token) if !token.is_empty() => page_token = token.to_string(),
            _ => break,
        }
    }

    for_each_parallel(ctx.workers, &candidates, |(id, name)| {
        if ctx.cancel.is_cancelled() {
            return;
        }
        let path = format!("/api/2.0/pipelines/{id}");
        match ctx.client.get(&path, &[]) {
            Ok(detail) => {
                let last_modified = detail["last_modified"].as_i64();
                if !ctx.is_fresh(last_modified) {
                    return;
                }
                let mut spec = detail["spec"].clone();
                strip_fields(&mut spec, SPEC_STRIP);
                let mut descriptor =
                    ResourceDescriptor::new(ResourceKind::Pipeline, id, name).with_payload(spec);
                if let Some(millis) = last_modified {
                    descriptor = descriptor.with_last_modified(millis);
                }
                ctx.scope.add(descriptor);
            }
            Err(err) if err.is_not_found() => {
                ctx.scope.warn(
                    Some(ResourceKind::Pipeline),
                    format!("pipeline {id} disappeared during export"),
                );
            }
            Err(err) => {
                ctx.scope.warn(
                    Some(ResourceKind::Pipeline),
                    format!("fetching pipeline {id} failed: {err}"),
                );
            }
        }
    });
    Ok(())
}
