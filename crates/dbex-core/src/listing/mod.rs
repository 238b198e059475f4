//! Per-kind listing drivers. Each driver enumerates live objects via the
//! workspace API, applies the name filter, fetches details over a bounded
//! worker pool, and inserts descriptors into the shared scope. Drivers for
//! different kinds run concurrently; a driver failure is recorded as a
//! warning by the caller and never aborts the other kinds.

mod compute;
mod dashboards;
mod jobs;
mod notebooks;
mod pipelines;
mod policies;
mod repos;
mod secrets;

use std::sync::atomic::{AtomicUsize, Ordering};

use dbex_domain::{NameFilter, ResourceKind};

use crate::cancel::CancelToken;
use crate::client::{ApiError, WorkspaceClient};
use crate::scope::Scope;

pub(crate) struct ListingContext<'a> {
    pub client: &'a WorkspaceClient,
    pub scope: &'a Scope,
    pub filter: &'a NameFilter,
    pub cancel: &'a CancelToken,
    /// Worker count for detail fetches within this kind.
    pub workers: usize,
    /// Incremental cutoff in epoch milliseconds; objects strictly older
    /// are skipped by kinds that expose a modification timestamp.
    pub updated_since: Option<i64>,
}

impl ListingContext<'_> {
    /// Whether an object with the given modification timestamp should be
    /// (re-)exported under the current incremental cutoff.
    pub(crate) fn is_fresh(&self, last_modified: Option<i64>) -> bool {
        match (self.updated_since, last_modified) {
            (Some(cutoff), Some(modified)) => modified >= cutoff,
            _ => true,
        }
    }
}

pub(crate) type DriverFn = fn(&ListingContext) -> Result<(), ApiError>;

/// Kinds that own a listing driver. `Secret` is absent on purpose: secrets
/// are discovered while listing their parent scopes.
pub(crate) fn driver_for(kind: ResourceKind) -> Option<DriverFn> {
    match kind {
        ResourceKind::Cluster => Some(compute::list),
        ResourceKind::ClusterPolicy => Some(policies::list),
        ResourceKind::Job => Some(jobs::list),
        ResourceKind::Pipeline => Some(pipelines::list),
        ResourceKind::SecretScope => Some(secrets::list),
        ResourceKind::Notebook => Some(notebooks::list),
        ResourceKind::Repo => Some(repos::list),
        ResourceKind::Dashboard => Some(dashboards::list),
        ResourceKind::Secret => None,
    }
}

/// Fans `f` out over `items` with at most `workers` threads. Used for the
/// per-kind detail fetches; errors are handled inside `f` (warn + skip),
/// so the closure is infallible here.
pub(crate) fn for_each_parallel<T, F>(workers: usize, items: &[T], f: F)
where
    T: Sync,
    F: Fn(&T) + Sync,
{
    if items.is_empty() {
        return;
    }
    let workers = workers.clamp(1, items.len());
    let next = AtomicUsize::new(0);
    std::thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(item) = items.get(index) else { break };
                f(item);
            });
        }
    });
}

/// Strips server-managed fields from a detail payload so only
/// user-declarable attributes reach emission.
pub(crate) fn strip_fields(payload: &mut serde_json::Value, fields: &[&str]) {
    if let Some(map) = payload.as_object_mut() {
        for field in fields {
            map.remove(*field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn parallel_helper_visits_every_item_once() {
        let items: Vec<usize> = (0..100).collect();
        let seen = Mutex::new(Vec::new());
        for_each_parallel(8, &items, |item| {
            seen.lock().unwrap().push(*item);
        });
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, items);
    }

    #[test]
    fn parallel_helper_handles_empty_input() {
        let items: Vec<usize> = Vec::new();
        for_each_parallel(4, &items, |_| panic!("should not run"));
    }

    #[test]
    fn every_kind_except_secret_has_a_driver() {
        for kind in ResourceKind::all() {
            assert_eq!(driver_for(kind).is_none(), kind == ResourceKind::Secret);
        }
    }

    #[test]
    fn freshness_only_applies_with_both_timestamps() {
        let client = WorkspaceClient::new("http://localhost", "t").unwrap();
        let scope = Scope::new();
        let filter = NameFilter::default();
        let cancel = CancelToken::new();
        let ctx = ListingContext {
            client: &client,
            scope: &scope,
            filter: &filter,
            cancel: &cancel,
            workers: 1,
            updated_since: Some(1_000),
        };
        assert!(ctx.is_fresh(Some(1_000)));
        assert!(ctx.is_fresh(None));
        assert!(!ctx.is_fresh(Some(999)));
    }
}
