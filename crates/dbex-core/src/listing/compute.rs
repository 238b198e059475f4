use dbex_domain::{ResourceDescriptor, ResourceKind};

use super::{for_each_parallel, strip_fields, ListingContext};
use crate::client::ApiError;

/// Fields of `clusters/get` that the server owns; they must not appear in
/// generated configuration.
const CLUSTER_STRIP: &[&str] = &[
    "cluster_id",
    "cluster_source",
    "creator_user_name",
    "default_tags",
    "driver",
    "executors",
    "jdbc_port",
    "last_activity_time",
    "last_restarted_time",
    "last_state_loss_time",
    "spark_context_id",
    "spec",
    "start_time",
    "state",
    "state_message",
    "terminated_time",
    "termination_reason",
];

pub(super) fn list(ctx: &ListingContext) -> Result<(), ApiError> {
    let mut candidates: Vec<(String, String)> = Vec::new();
    let mut page_token = String::new();
    loop {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        let mut query = vec![("page_size", "100")];
        if !page_token.is_empty() {
            query.push(("page_token", page_token.as_str()));
        }
        let response = ctx.client.get("/api/2.1/clusters/list", &query)?;
        for cluster in response["clusters"].as_array().into_iter().flatten() {
            let Some(id) = cluster["cluster_id"].as_str() else {
                continue;
            };
            let name = cluster["cluster_name"].as_str().unwrap_or_default();
            // Job-owned clusters are exported as part of the job itself.
            if cluster["cluster_source"].as_str() == Some("JOB") {
                continue;
            }
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
        match ctx.client.get("/api/2.1/clusters/get", &[("cluster_id", id)]) {
            Ok(mut payload) => {
                strip_fields(&mut payload, CLUSTER_STRIP);
                ctx.scope.add(
                    ResourceDescriptor::new(ResourceKind::Cluster, id, name).with_payload(payload),
                );
            }
            Err(err) if err.is_not_found() => {
                ctx.scope.warn(
                    Some(ResourceKind::Cluster),
                    format!("cluster {id} disappeared during export"),
                );
            }
            Err(err) => {
                ctx.scope.warn(
                    Some(ResourceKind::Cluster),
                    format!("fetching cluster {id} failed: {err}"),
                );
            }
        }
    });
    Ok(())
}
