use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use inclucity_ors::profile::TravelProfile;

use crate::error::RoutingError;
use crate::point::RoutePoint;

/// Coordinates are rounded to this many decimal places when building
/// request keys, so near-identical repeated requests collapse onto the
/// same key.
const KEY_PRECISION: usize = 6;

/// Canonical identity of an external request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn snap(point: &RoutePoint, profile: TravelProfile) -> Self {
        Self(format!(
            "snap_{:.prec$}_{:.prec$}_{profile}",
            point.lat,
            point.lng,
            prec = KEY_PRECISION,
        ))
    }

    pub fn route(start: &RoutePoint, end: &RoutePoint, profile: TravelProfile) -> Self {
        Self(format!(
            "route_{:.prec$}_{:.prec$}_{:.prec$}_{:.prec$}_{profile}",
            start.lat,
            start.lng,
            end.lat,
            end.lng,
            prec = KEY_PRECISION,
        ))
    }
}

impl Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct CacheEntry<T> {
    /// TTL is measured from completion, not from when the request was
    /// issued.
    completed_at: Instant,
    data: T,
}

type SharedRequest<T> = Shared<BoxFuture<'static, Result<T, RoutingError>>>;

struct CoordinatorState<T> {
    cache: Mutex<FxHashMap<RequestKey, CacheEntry<T>>>,
    pending: Mutex<FxHashMap<RequestKey, SharedRequest<T>>>,
}

/// Collapses identical calls to a rate-limited external service: a fresh
/// cache hit resolves immediately, a request already in flight is joined,
/// and anything else starts a single debounced call that every concurrent
/// caller waits on.
pub struct RequestCoordinator<T> {
    ttl: Duration,
    state: Arc<CoordinatorState<T>>,
}

impl<T> RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Arc::new(CoordinatorState {
                cache: Mutex::new(FxHashMap::default()),
                pending: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Runs `producer` for `key` unless its result is already cached or
    /// in flight. All callers of the same key observe the same outcome;
    /// failures propagate to every waiter and are never cached.
    pub async fn execute<F, Fut>(
        &self,
        key: RequestKey,
        debounce: Duration,
        producer: F,
    ) -> Result<T, RoutingError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RoutingError>> + Send + 'static,
    {
        if let Some(data) = self.cached(&key) {
            return Ok(data);
        }

        self.join_or_start(key, debounce, producer).await
    }

    fn cached(&self, key: &RequestKey) -> Option<T> {
        let mut cache = self.state.cache.lock();

        if let Some(entry) = cache.get(key) {
            if entry.completed_at.elapsed() < self.ttl {
                return Some(entry.data.clone());
            }

            debug!(key = %key, "cache entry expired");
            cache.remove(key);
        }

        None
    }

    fn join_or_start<F, Fut>(
        &self,
        key: RequestKey,
        debounce: Duration,
        producer: F,
    ) -> SharedRequest<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RoutingError>> + Send + 'static,
    {
        let mut pending = self.state.pending.lock();

        if let Some(request) = pending.get(&key) {
            debug!(key = %key, "joining in-flight request");
            return request.clone();
        }

        let state = Arc::clone(&self.state);
        let completion_key = key.clone();
        let request_future = producer();

        let request = async move {
            tokio::time::sleep(debounce).await;

            let result = request_future.await;

            // The pending entry goes away on both outcomes; only
            // successes are cached.
            state.pending.lock().remove(&completion_key);

            if let Ok(data) = &result {
                state.cache.lock().insert(
                    completion_key,
                    CacheEntry {
                        completed_at: Instant::now(),
                        data: data.clone(),
                    },
                );
            }

            result
        }
        .boxed()
        .shared();

        // Detached driver: the request runs to completion even when every
        // caller has dropped before the response arrived.
        tokio::spawn(request.clone());

        pending.insert(key, request.clone());
        request
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const TTL: Duration = Duration::from_secs(10);
    const DEBOUNCE: Duration = Duration::from_millis(100);

    fn snap_key(lat: f64, lng: f64) -> RequestKey {
        RequestKey::snap(&RoutePoint::new(lat, lng), TravelProfile::Wheelchair)
    }

    #[test]
    fn keys_collapse_on_rounded_coordinates() {
        assert_eq!(snap_key(49.8400001, 24.02), snap_key(49.8400004, 24.02));
        assert_ne!(snap_key(49.840001, 24.02), snap_key(49.840002, 24.02));
    }

    #[test]
    fn route_keys_differ_by_profile_and_direction() {
        let a = RoutePoint::new(49.84, 24.02);
        let b = RoutePoint::new(49.845, 24.03);

        assert_ne!(
            RequestKey::route(&a, &b, TravelProfile::Wheelchair),
            RequestKey::route(&a, &b, TravelProfile::Walking),
        );
        assert_ne!(
            RequestKey::route(&a, &b, TravelProfile::Wheelchair),
            RequestKey::route(&b, &a, TravelProfile::Wheelchair),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_producer_invocation() {
        let coordinator = Arc::new(RequestCoordinator::<u32>::new(TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);

            handles.push(tokio::spawn(async move {
                coordinator
                    .execute(snap_key(49.84, 24.02), DEBOUNCE, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(7)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_reach_every_waiter_and_are_not_cached() {
        let coordinator = Arc::new(RequestCoordinator::<u32>::new(TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RoutingError::NoRoutes)
            }
        };

        let first = {
            let coordinator = Arc::clone(&coordinator);
            let producer = failing(Arc::clone(&calls));
            tokio::spawn(async move {
                coordinator
                    .execute(snap_key(49.84, 24.02), DEBOUNCE, producer)
                    .await
            })
        };
        let second = {
            let coordinator = Arc::clone(&coordinator);
            let producer = failing(Arc::clone(&calls));
            tokio::spawn(async move {
                coordinator
                    .execute(snap_key(49.84, 24.02), DEBOUNCE, producer)
                    .await
            })
        };

        assert!(matches!(
            first.await.unwrap(),
            Err(RoutingError::NoRoutes)
        ));
        assert!(matches!(
            second.await.unwrap(),
            Err(RoutingError::NoRoutes)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // No negative caching: the next call invokes the producer again.
        let result = coordinator
            .execute(snap_key(49.84, 24.02), DEBOUNCE, {
                let calls = Arc::clone(&calls);
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(9)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_expires_after_ttl() {
        let coordinator = RequestCoordinator::<u32>::new(TTL);
        let calls = Arc::new(AtomicUsize::new(0));

        let producer = |calls: Arc<AtomicUsize>, value: u32| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
        };

        let first = coordinator
            .execute(snap_key(49.84, 24.02), DEBOUNCE, producer(Arc::clone(&calls), 1))
            .await
            .unwrap();
        assert_eq!(first, 1);

        // Within the TTL: served from cache, producer untouched.
        let cached = coordinator
            .execute(snap_key(49.84, 24.02), DEBOUNCE, producer(Arc::clone(&calls), 2))
            .await
            .unwrap();
        assert_eq!(cached, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // At exactly the TTL the entry no longer counts as fresh.
        tokio::time::advance(TTL).await;

        let refreshed = coordinator
            .execute(snap_key(49.84, 24.02), DEBOUNCE, producer(Arc::clone(&calls), 3))
            .await
            .unwrap();
        assert_eq!(refreshed, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_do_not_share_results() {
        let coordinator = RequestCoordinator::<u32>::new(TTL);

        let a = coordinator
            .execute(snap_key(49.84, 24.02), DEBOUNCE, || async { Ok(1) })
            .await
            .unwrap();
        let b = coordinator
            .execute(snap_key(49.85, 24.03), DEBOUNCE, || async { Ok(2) })
            .await
            .unwrap();

        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn request_completes_after_all_callers_drop() {
        let coordinator = Arc::new(RequestCoordinator::<u32>::new(TTL));
        let calls = Arc::new(AtomicUsize::new(0));

        let caller = {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                coordinator
                    .execute(snap_key(49.84, 24.02), DEBOUNCE, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(42)
                    })
                    .await
            })
        };

        // Let the caller register the request, then abort it before the
        // debounce elapses; the detached driver still runs the request
        // and caches the result.
        tokio::task::yield_now().await;
        caller.abort();
        let _ = caller.await;

        tokio::time::sleep(DEBOUNCE * 2).await;

        let result = coordinator
            .execute(snap_key(49.84, 24.02), DEBOUNCE, || async {
                panic!("must be served from cache")
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
