use dbex_domain::{ResourceDescriptor, ResourceKind};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{for_each_parallel, ListingContext};
use crate::client::ApiError;

pub(super) fn list(ctx: &ListingContext) -> Result<(), ApiError> {
    let mut candidates: Vec<(String, String, Option<i64>)> = Vec::new();
    let mut page_token = String::new();
    loop {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        let mut query = vec![("page_size", "100")];
        if !page_token.is_empty() {
            query.push(("page_token", page_token.as_str()));
        }
        let response = ctx.client.get("/api/2.0/lakeview/dashboards", &query)?;
        for dashboard in response["dashboards"].as_array().into_iter().flatten() {
            let Some(id) = dashboard["dashboard_id"].as_str() else {
                continue;
            };
            let name = dashboard["display_name"].as_str().unwrap_or_default();
            if !ctx.filter.accepts(name) {
                continue;
            }
            let updated = dashboard["update_time"].as_str().and_then(parse_rfc3339_millis);
            if !ctx.is_fresh(updated) {
                continue;
            }
            candidates.push((id.to_string(), name.to_string(), updated));
        }
        match response["next_page_token"].as_str() {
            Some(token) if !token.is_empty() => page_token = token.to_string(),
            _ => break,
        }
    }

    for_each_parallel(ctx.workers, &candidates, |(id, name, updated)| {
        if ctx.cancel.is_cancelled() {
            return;
        }
        let path = format!("/api/2.0/lakeview/dashboards/{id}");
        match ctx.client.get(&path, &[]) {
            Ok(detail) => {
                let mut descriptor = ResourceDescriptor::new(ResourceKind::Dashboard, id, name)
                    .with_payload(serde_json::json!({
                        "display_name": detail["display_name"],
                        "parent_path": detail["parent_path"],
                        "warehouse_id": detail["warehouse_id"],
                        "serialized_dashboard": detail["serialized_dashboard"],
                    }));
                if let Some(millis) = updated {
                    descriptor = descriptor.with_last_modified(*millis);
                }
                ctx.scope.add(descriptor);
            }
            Err(err) if err.is_not_found() => {
                ctx.scope.warn(
                    Some(ResourceKind::Dashboard),
                    format!("dashboard {id} disappeared during export"),
                );
            }
            Err(err) => {
                ctx.scope.warn(
                    Some(ResourceKind::Dashboard),
                    format!("fetching dashboard {id} failed: {err}"),
                );
            }
        }
    });
    Ok(())
}

fn parse_rfc3339_millis(raw: &str) -> Option<i64> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .map(|ts| (ts.unix_timestamp_nanos() / 1_000_000) as i64)
}
