//! Time-bounded application listing cache.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::source::MetadataSource;
use crate::types::{ApplicationSummary, MetadataFailurePolicy};

/// How long an application listing stays valid.
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    credential: String,
    applications: Vec<ApplicationSummary>,
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    // A negative age means the clock stepped back; the entry is stale.
    fn is_fresh(&self, credential: &str, now: DateTime<Utc>) -> bool {
        let age = now - self.fetched_at;
        self.credential == credential && age >= TimeDelta::zero() && age < cache_ttl()
    }
}

fn cache_ttl() -> TimeDelta {
    TimeDelta::from_std(CACHE_TTL).unwrap_or_else(|_| TimeDelta::zero())
}

/// Single-slot cache of the application listing.
///
/// The slot is replaced wholesale on refresh. The lock is never held across
/// the remote fetch, so two concurrent misses fetch twice and the last
/// writer wins.
#[derive(Debug, Default)]
pub struct MetadataCache {
    slot: Mutex<Option<CacheEntry>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applications for `credential`, from the cache when fresh.
    ///
    /// A failed fetch yields an empty listing and leaves the slot untouched.
    pub fn get<S>(&self, source: &S, credential: &str) -> Vec<ApplicationSummary>
    where
        S: MetadataSource + ?Sized,
    {
        self.get_at(source, credential, MetadataFailurePolicy::Passthrough, Utc::now())
            .unwrap_or_default()
    }

    /// Like [`get`](Self::get), but the failure behavior follows `policy`.
    pub fn fetch<S>(
        &self,
        source: &S,
        credential: &str,
        policy: MetadataFailurePolicy,
    ) -> Result<Vec<ApplicationSummary>, ApiError>
    where
        S: MetadataSource + ?Sized,
    {
        self.get_at(source, credential, policy, Utc::now())
    }

    /// Drop the cached listing.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    pub(crate) fn get_at<S>(
        &self,
        source: &S,
        credential: &str,
        policy: MetadataFailurePolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApplicationSummary>, ApiError>
    where
        S: MetadataSource + ?Sized,
    {
        if let Some(entry) = self.lock().as_ref() {
            if entry.is_fresh(credential, now) {
                debug!(apps = entry.applications.len(), "application list cache hit");
                return Ok(entry.applications.clone());
            }
        }

        debug!("application list cache miss");
        match source.list_applications(credential) {
            Ok(applications) => {
                *self.lock() = Some(CacheEntry {
                    credential: credential.to_string(),
                    applications: applications.clone(),
                    fetched_at: now,
                });
                Ok(applications)
            }
            Err(err) => match policy {
                MetadataFailurePolicy::Passthrough => {
                    warn!(error = %err, "failed to fetch application list");
                    Ok(Vec::new())
                }
                MetadataFailurePolicy::Fail => Err(err),
            },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CacheEntry>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{app, transport_error, FakeSource};

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn second_call_within_ttl_is_served_from_cache() {
        let source = FakeSource::new().with_apps(vec![app("app1", "CRM")]);
        let cache = MetadataCache::new();
        let policy = MetadataFailurePolicy::Passthrough;

        let first = cache.get_at(&source, "key", policy, t0()).unwrap();
        let second = cache
            .get_at(&source, "key", policy, t0() + TimeDelta::minutes(4))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(source.app_calls.get(), 1);
    }

    #[test]
    fn expired_entry_triggers_refetch() {
        let source = FakeSource::new().with_apps(vec![app("app1", "CRM")]);
        let cache = MetadataCache::new();
        let policy = MetadataFailurePolicy::Passthrough;

        cache.get_at(&source, "key", policy, t0()).unwrap();
        cache
            .get_at(&source, "key", policy, t0() + TimeDelta::minutes(5))
            .unwrap();

        assert_eq!(source.app_calls.get(), 2);
    }

    #[test]
    fn backward_clock_step_triggers_refetch() {
        let source = FakeSource::new().with_apps(vec![app("app1", "CRM")]);
        let cache = MetadataCache::new();
        let policy = MetadataFailurePolicy::Passthrough;

        cache.get_at(&source, "key", policy, t0()).unwrap();
        cache
            .get_at(&source, "key", policy, t0() - TimeDelta::days(1))
            .unwrap();

        assert_eq!(source.app_calls.get(), 2);
    }

    #[test]
    fn entry_expires_exactly_at_ttl() {
        let source = FakeSource::new().with_apps(vec![app("app1", "CRM")]);
        let cache = MetadataCache::new();
        let policy = MetadataFailurePolicy::Passthrough;

        cache.get_at(&source, "key", policy, t0()).unwrap();
        let just_before = t0() + cache_ttl() - TimeDelta::milliseconds(1);
        cache.get_at(&source, "key", policy, just_before).unwrap();
        assert_eq!(source.app_calls.get(), 1);

        cache
            .get_at(&source, "key", policy, t0() + cache_ttl())
            .unwrap();
        assert_eq!(source.app_calls.get(), 2);
    }

    #[test]
    fn different_credential_misses() {
        let source = FakeSource::new().with_apps(vec![app("app1", "CRM")]);
        let cache = MetadataCache::new();
        let policy = MetadataFailurePolicy::Passthrough;

        cache.get_at(&source, "key-a", policy, t0()).unwrap();
        cache.get_at(&source, "key-b", policy, t0()).unwrap();

        assert_eq!(source.app_calls.get(), 2);
    }

    #[test]
    fn fetch_failure_yields_empty_listing() {
        let source = FakeSource::new().with_app_error(transport_error());
        let cache = MetadataCache::new();

        assert!(cache.get(&source, "key").is_empty());
        // Failures are not cached.
        assert!(cache.get(&source, "key").is_empty());
        assert_eq!(source.app_calls.get(), 2);
    }

    #[test]
    fn fetch_failure_propagates_under_fail_policy() {
        let source = FakeSource::new().with_app_error(transport_error());
        let cache = MetadataCache::new();

        let result = cache.fetch(&source, "key", MetadataFailurePolicy::Fail);
        assert!(matches!(result, Err(ApiError::Transport { .. })));
    }

    #[test]
    fn invalidate_forces_refetch() {
        let source = FakeSource::new().with_apps(vec![app("app1", "CRM")]);
        let cache = MetadataCache::new();

        cache.get(&source, "key");
        cache.invalidate();
        cache.get(&source, "key");

        assert_eq!(source.app_calls.get(), 2);
    }
}
