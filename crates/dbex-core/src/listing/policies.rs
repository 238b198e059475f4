use dbex_domain::{ResourceDescriptor, ResourceKind};
use serde_json::json;

use super::ListingContext;
use crate::client::ApiError;

/// Cluster policies come back complete from the list call; there is no
/// separate detail fetch.
pub(super) fn list(ctx: &ListingContext) -> Result<(), ApiError> {
    let response = ctx.client.get("/api/2.0/policies/clusters/list", &[])?;
    for policy in response["policies"].as_array().into_iter().flatten() {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        let Some(id) = policy["policy_id"].as_str() else {
            continue;
        };
        let name = policy["name"].as_str().unwrap_or_default();
        if !ctx.filter.accepts(name) {
            continue;
        }
        let payload = json!({
            "name": name,
            "definition": policy["definition"],
        });
        ctx.scope.add(
            ResourceDescriptor::new(ResourceKind::ClusterPolicy, id, name).with_payload(payload),
        );
    }
    Ok(())
}
