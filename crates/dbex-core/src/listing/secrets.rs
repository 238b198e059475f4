use dbex_domain::{ResourceDescriptor, ResourceKind};
use serde_json::json;

use super::ListingContext;
use crate::client::ApiError;

/// Lists secret scopes and, inside each accepted scope, the secrets
/// themselves. Secret values are never readable through the API; emission
/// renders them as input variables.
pub(super) fn list(ctx: &ListingContext) -> Result<(), ApiError> {
    let response = ctx.client.get("/api/2.0/secrets/scopes/list", &[])?;
    for scope_obj in response["scopes"].as_array().into_iter().flatten() {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        let Some(scope_name) = scope_obj["name"].as_str() else {
            continue;
        };
        if !ctx.filter.accepts(scope_name) {
            continue;
        }
        // Keybase-style internal scopes cannot be managed declaratively.
        if scope_obj["backend_type"].as_str() == Some("DATABRICKS_INTERNAL") {
            continue;
        }
        ctx.scope.add(
            ResourceDescriptor::new(ResourceKind::SecretScope, scope_name, scope_name)
                .with_payload(json!({"name": scope_name})),
        );

        match ctx
            .client
            .get("/api/2.0/secrets/list", &[("scope", scope_name)])
        {
            Ok(listing) => {
                for secret in listing["secrets"].as_array().into_iter().flatten() {
                    let Some(key) = secret["key"].as_str() else {
                        continue;
                    };
                    let last_updated = secret["last_updated_timestamp"].as_i64();
                    if !ctx.is_fresh(last_updated) {
                        continue;
                    }
                    // Composite id mirrors the resource's import format.
                    let id = format!("{scope_name}|||{key}");
                    let mut descriptor = ResourceDescriptor::new(
                        ResourceKind::Secret,
                        id,
                        format!("{scope_name}_{key}"),
                    )
                    .with_payload(json!({"scope": scope_name, "key": key}));
                    if let Some(millis) = last_updated {
                        descriptor = descriptor.with_last_modified(millis);
                    }
                    ctx.scope.add(descriptor);
                }
            }
            Err(err) => {
                ctx.scope.warn(
                    Some(ResourceKind::Secret),
                    format!("listing secrets in scope {scope_name} failed: {err}"),
                );
            }
        }
    }
    Ok(())
}
