use super::document::BackendSpec;
use crate::connector::{ClientFactory, PooledClient};
use crate::error::HttpError;
use arc_swap::ArcSwap;
use http::Uri;
use http::uri::{Authority, PathAndQuery, Scheme};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

struct PoolSlot {
    client: PooledClient,
    created: Instant,
}

impl PoolSlot {
    fn fresh(factory: &ClientFactory) -> Arc<Self> {
        Arc::new(Self {
            client: factory.client(),
            created: Instant::now(),
        })
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.created.elapsed() >= ttl
    }
}

/// One rotation slot. `recycle` serializes replacement so an expiry builds
/// a single new client.
struct SlotCell {
    current: ArcSwap<PoolSlot>,
    recycle: Mutex<()>,
}

/// Connection pools dedicated to one backend.
///
/// Holds `count` independent pooled clients, handed out round-robin. A
/// client older than the backend's ttl is replaced with a fresh one on its
/// next use; requests already in flight keep the old client alive until
/// they finish.
pub struct BackendPool {
    name: String,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    ttl: Option<Duration>,
    factory: ClientFactory,
    slots: Vec<SlotCell>,
    next: AtomicUsize,
    recycled: AtomicUsize,
}

impl BackendPool {
    pub(crate) fn new(spec: &BackendSpec, factory: ClientFactory) -> Self {
        let slots = (0..spec.count.max(1))
            .map(|_| SlotCell {
                current: ArcSwap::new(PoolSlot::fresh(&factory)),
                recycle: Mutex::new(()),
            })
            .collect();

        Self {
            name: spec.name.clone(),
            scheme: spec.scheme.clone(),
            authority: spec.authority.clone(),
            base_path: spec.base_path.clone(),
            ttl: spec.ttl,
            factory,
            slots,
            next: AtomicUsize::new(0),
            recycled: AtomicUsize::new(0),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn size(&self) -> usize {
        self.slots.len()
    }

    /// Next client in rotation, recycling it first if its ttl has elapsed.
    pub(crate) fn client(&self) -> PooledClient {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let cell = &self.slots[index];
        let current = cell.current.load_full();

        let Some(ttl) = self.ttl else {
            return current.client.clone();
        };
        if !current.expired(ttl) {
            return current.client.clone();
        }

        let _guard = cell.recycle.lock();
        let latest = cell.current.load_full();
        if !latest.expired(ttl) {
            // recycled by another caller while waiting for the lock
            return latest.client.clone();
        }

        let replacement = PoolSlot::fresh(&self.factory);
        cell.current.store(Arc::clone(&replacement));
        let recycled = self.recycled.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(backend = %self.name, slot = index, ?ttl, recycled, "recycled backend pool");
        replacement.client.clone()
    }

    /// Point `uri` at this backend, keeping its path and query.
    ///
    /// # Errors
    /// Returns [`HttpError::RequestBuild`] if the joined URI is invalid.
    pub(crate) fn target_uri(&self, uri: &Uri) -> Result<Uri, HttpError> {
        let path_and_query = uri
            .path_and_query()
            .map_or("/", PathAndQuery::as_str);

        let path_and_query = if self.base_path.is_empty() {
            path_and_query.to_owned()
        } else {
            format!("{}{}", self.base_path, path_and_query)
        };

        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?)
    }

    #[cfg(test)]
    fn created_at(&self, index: usize) -> Instant {
        self.slots[index].current.load().created
    }
}

impl std::fmt::Debug for BackendPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendPool")
            .field("name", &self.name)
            .field("host", &format_args!("{}://{}{}", self.scheme, self.authority, self.base_path))
            .field("ttl", &self.ttl)
            .field("size", &self.slots.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::SmartSettings;

    fn spec(host: &str, ttl: Option<Duration>, count: usize) -> BackendSpec {
        let uri: Uri = host.parse().unwrap();
        BackendSpec {
            name: "app".to_owned(),
            scheme: uri.scheme().unwrap().clone(),
            authority: uri.authority().unwrap().clone(),
            base_path: uri.path().trim_end_matches('/').to_owned(),
            ttl,
            count,
        }
    }

    fn pool(host: &str, ttl: Option<Duration>, count: usize) -> BackendPool {
        let settings = SmartSettings::default();
        let factory = ClientFactory::new(settings.connector(ttl)).unwrap();
        BackendPool::new(&spec(host, ttl, count), factory)
    }

    #[test]
    fn test_target_uri_replaces_origin() {
        let pool = pool("http://app:8081", None, 1);
        let original: Uri = "https://gateway.example.com/healthcheck?verbose=1"
            .parse()
            .unwrap();

        let target = pool.target_uri(&original).unwrap();
        assert_eq!(target.to_string(), "http://app:8081/healthcheck?verbose=1");
    }

    #[test]
    fn test_target_uri_accepts_relative_request() {
        let pool = pool("http://app:8081", None, 1);
        let original: Uri = "/users/42".parse().unwrap();

        let target = pool.target_uri(&original).unwrap();
        assert_eq!(target.to_string(), "http://app:8081/users/42");
    }

    #[test]
    fn test_target_uri_prefixes_host_path() {
        let pool = pool("https://api.internal/v2/", None, 1);
        let original: Uri = "/users?page=2".parse().unwrap();

        let target = pool.target_uri(&original).unwrap();
        assert_eq!(target.to_string(), "https://api.internal/v2/users?page=2");
    }

    #[test]
    fn test_pool_size_matches_count() {
        assert_eq!(pool("http://app", None, 3).size(), 3);
        assert_eq!(pool("http://app", None, 1).size(), 1);
    }

    #[test]
    fn test_round_robin_rotates_through_slots() {
        let pool = pool("http://app", None, 3);
        for expected in [0, 1, 2, 0, 1] {
            let before = pool.next.load(Ordering::Relaxed) % pool.size();
            assert_eq!(before, expected);
            let _client = pool.client();
        }
    }

    #[test]
    fn test_expired_slot_is_recycled() {
        let ttl = Duration::from_millis(20);
        let pool = pool("http://app", Some(ttl), 1);
        let first = pool.created_at(0);

        std::thread::sleep(ttl * 2);
        let _client = pool.client();

        let renewed = pool.created_at(0);
        assert!(renewed > first);
    }

    #[test]
    fn test_fresh_slot_is_kept() {
        let pool = pool("http://app", Some(Duration::from_secs(3600)), 1);
        let first = pool.created_at(0);

        let _client = pool.client();
        assert_eq!(pool.created_at(0), first);
    }

    #[test]
    fn test_slot_without_ttl_is_never_recycled() {
        let pool = pool("http://app", None, 1);
        let first = pool.created_at(0);

        std::thread::sleep(Duration::from_millis(5));
        let _client = pool.client();
        assert_eq!(pool.created_at(0), first);
    }

    #[test]
    fn test_concurrent_expiry_builds_one_replacement() {
        let ttl = Duration::from_millis(300);
        let pool = pool("http://app", Some(ttl), 1);
        let first = pool.created_at(0);

        std::thread::sleep(ttl + Duration::from_millis(50));
        let barrier = std::sync::Barrier::new(8);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    let _client = pool.client();
                });
            }
        });

        assert_eq!(pool.recycled.load(Ordering::Relaxed), 1);
        assert!(pool.created_at(0) > first);
    }
}
