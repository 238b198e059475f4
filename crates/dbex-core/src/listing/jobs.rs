use dbex_domain::{ResourceDescriptor, ResourceKind};

use super::{for_each_parallel, ListingContext};
use crate::client::ApiError;

struct JobCandidate {
    id: u64,
    name: String,
    created_time: Option<i64>,
}

pub(super) fn list(ctx: &ListingContext) -> Result<(), ApiError> {
    let mut candidates: Vec<JobCandidate> = Vec::new();
    let mut page_token = String::new();
    loop {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        let mut query = vec![("limit", "100")];
        if !page_token.is_empty() {
            query.push(("page_token", page_token.as_str()));
        }
        let response = ctx.client.get("/api/2.2/jobs/list", &query)?;
        for job in response["jobs"].as_array().into_iter().flatten() {
            let Some(id) = job["job_id"].as_u64() else {
                continue;
            };
            let name = job["settings"]["name"].as_str().unwrap_or_default();
            if !ctx.filter.accepts(name) {
                continue;
            }
            let created_time = job["created_time"].as_i64();
            if !ctx.is_fresh(created_time) {
                continue;
            }
            candidates.push(JobCandidate {
                id,
                name: name.to_string(),
                created_time,
            });
        }
        match response["next_page_token"].as_str() {
            Some(token) if !token.is_empty() => page_token = token.to_string(),
            _ => break,
        }
    }

    for_each_parallel(ctx.workers, &candidates, |candidate| {
        if ctx.cancel.is_cancelled() {
            return;
        }
        let id = candidate.id.to_string();
        match ctx.client.get("/api/2.2/jobs/get", &[("job_id", &id)]) {
            Ok(payload) => {
                // Only the settings sub-object is declarable configuration.
                let settings = payload["settings"].clone();
                let mut descriptor =
                    ResourceDescriptor::new(ResourceKind::Job, &id, &candidate.name)
                        .with_payload(settings);
                if let Some(millis) = candidate.created_time {
                    descriptor = descriptor.with_last_modified(millis);
                }
                ctx.scope.add(descriptor);
            }
            Err(err) if err.is_not_found() => {
                ctx.scope.warn(
                    Some(ResourceKind::Job),
                    format!("job {id} disappeared during export"),
                );
            }
            Err(err) => {
                ctx.scope.warn(
                    Some(ResourceKind::Job),
                    format!("fetching job {id} failed: {err}"),
                );
            }
        }
    });
    Ok(())
}
