//! In-process request statistics
//!
//! The registry behind /metrics/clean. One instance is created at startup and
//! injected through axum state — tests build fresh registries, nothing lives
//! in module globals. All counters are atomics or short-lived mutex-guarded
//! maps; the handler path never awaits while holding a lock.
//!
//! Response times are kept as a running sum + sample count per route rather
//! than a sample list: only the rounded mean is ever reported, so the
//! accumulator stays constant-size no matter how long the process runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// The five proxied route kinds, in reporting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteKind {
    UserDetails,
    UserRepos,
    UserEvents,
    UserFollowers,
    UserFollowing,
}

impl RouteKind {
    pub const ALL: [RouteKind; 5] = [
        RouteKind::UserDetails,
        RouteKind::UserRepos,
        RouteKind::UserEvents,
        RouteKind::UserFollowers,
        RouteKind::UserFollowing,
    ];

    /// Stable key used in /metrics/clean and Prometheus labels.
    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::UserDetails => "user_details",
            RouteKind::UserRepos => "user_repos",
            RouteKind::UserEvents => "user_events",
            RouteKind::UserFollowers => "user_followers",
            RouteKind::UserFollowing => "user_following",
        }
    }

    /// Classify a request path by route prefix. Unknown paths are not tracked.
    pub fn from_path(path: &str) -> Option<RouteKind> {
        if path.starts_with("/api/github/user/") {
            Some(RouteKind::UserDetails)
        } else if path.starts_with("/api/github/repos/") {
            Some(RouteKind::UserRepos)
        } else if path.starts_with("/api/github/events/") {
            Some(RouteKind::UserEvents)
        } else if path.starts_with("/api/github/followers/") {
            Some(RouteKind::UserFollowers)
        } else if path.starts_with("/api/github/following/") {
            Some(RouteKind::UserFollowing)
        } else {
            None
        }
    }

    fn index(self) -> usize {
        match self {
            RouteKind::UserDetails => 0,
            RouteKind::UserRepos => 1,
            RouteKind::UserEvents => 2,
            RouteKind::UserFollowers => 3,
            RouteKind::UserFollowing => 4,
        }
    }
}

/// Per-route counters and the streaming response-time accumulator.
#[derive(Debug, Default)]
struct RouteStats {
    requests: AtomicU64,
    errors: AtomicU64,
    time_sum_ms: AtomicU64,
    time_samples: AtomicU64,
}

#[derive(Debug)]
struct Inner {
    routes: [RouteStats; 5],
    methods: Mutex<HashMap<String, u64>>,
    status_codes: Mutex<HashMap<u16, u64>>,
    per_user: Mutex<HashMap<String, u64>>,
    started_at: Instant,
}

/// Process-lifetime statistics registry, cheap to clone into handlers.
#[derive(Clone, Debug)]
pub struct Stats {
    inner: Arc<Inner>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                routes: std::array::from_fn(|_| RouteStats::default()),
                methods: Mutex::new(HashMap::new()),
                status_codes: Mutex::new(HashMap::new()),
                per_user: Mutex::new(HashMap::new()),
                started_at: Instant::now(),
            }),
        }
    }

    /// Record an incoming request before it is handled.
    pub fn record_request(&self, route: RouteKind, method: &str, username: &str) {
        self.inner.routes[route.index()]
            .requests
            .fetch_add(1, Ordering::Relaxed);
        *self
            .inner
            .methods
            .lock()
            .unwrap()
            .entry(method.to_owned())
            .or_insert(0) += 1;
        *self
            .inner
            .per_user
            .lock()
            .unwrap()
            .entry(username.to_owned())
            .or_insert(0) += 1;
    }

    /// Record a finished request: final status and elapsed wall-clock time.
    pub fn record_completion(&self, route: RouteKind, status: u16, elapsed_ms: u64) {
        let stats = &self.inner.routes[route.index()];
        stats.time_sum_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        stats.time_samples.fetch_add(1, Ordering::Relaxed);
        *self
            .inner
            .status_codes
            .lock()
            .unwrap()
            .entry(status)
            .or_insert(0) += 1;
    }

    /// Record a failure on a route. Called by the fetch path before the
    /// response is produced, so the counter is never behind what the client
    /// observed.
    pub fn record_error(&self, route: RouteKind) {
        self.inner.routes[route.index()]
            .errors
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn route_requests(&self, route: RouteKind) -> u64 {
        self.inner.routes[route.index()]
            .requests
            .load(Ordering::Relaxed)
    }

    pub fn route_errors(&self, route: RouteKind) -> u64 {
        self.inner.routes[route.index()]
            .errors
            .load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Integer-rounded mean response time for a route, 0 without samples.
    fn average_ms(&self, route: RouteKind) -> u64 {
        let stats = &self.inner.routes[route.index()];
        let samples = stats.time_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        let sum = stats.time_sum_ms.load(Ordering::Relaxed);
        (sum as f64 / samples as f64).round() as u64
    }

    /// Read-only summary of all counters. Idempotent: reading mutates nothing.
    pub fn snapshot(&self) -> serde_json::Value {
        let mut details = serde_json::Map::new();
        let mut errors = serde_json::Map::new();
        let mut averages = serde_json::Map::new();
        let mut total: u64 = 0;

        for route in RouteKind::ALL {
            let requests = self.route_requests(route);
            total += requests;
            details.insert(route.as_str().into(), requests.into());
            errors.insert(route.as_str().into(), self.route_errors(route).into());
            averages.insert(route.as_str().into(), self.average_ms(route).into());
        }

        let methods: serde_json::Map<String, serde_json::Value> = self
            .inner
            .methods
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), (*v).into()))
            .collect();
        let status_codes: serde_json::Map<String, serde_json::Value> = self
            .inner
            .status_codes
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.to_string(), (*v).into()))
            .collect();
        let per_user: serde_json::Map<String, serde_json::Value> = self
            .inner
            .per_user
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), (*v).into()))
            .collect();

        serde_json::json!({
            "total": total,
            "details": details,
            "methods": methods,
            "statusCodes": status_codes,
            "perUser": per_user,
            "errors": errors,
            "averageResponseTimeMs": averages,
        })
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware tracking every request that matches a proxied route prefix.
///
/// Increments route/method/user counters before the handler runs, then
/// records status and elapsed milliseconds once the response is ready, both
/// in this registry and as Prometheus series. Non-matching paths pass
/// through untouched.
pub async fn track(State(stats): State<Stats>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let Some(route) = RouteKind::from_path(&path) else {
        return next.run(request).await;
    };

    let method = request.method().to_string();
    let username = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_owned();
    stats.record_request(route, &method, &username);

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    stats.record_completion(route, status, elapsed_ms);
    crate::metrics::record_http_request(&method, route.as_str(), status, elapsed_ms as f64);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_classifies_all_route_kinds() {
        assert_eq!(
            RouteKind::from_path("/api/github/user/octocat"),
            Some(RouteKind::UserDetails)
        );
        assert_eq!(
            RouteKind::from_path("/api/github/repos/octocat"),
            Some(RouteKind::UserRepos)
        );
        assert_eq!(
            RouteKind::from_path("/api/github/events/octocat"),
            Some(RouteKind::UserEvents)
        );
        assert_eq!(
            RouteKind::from_path("/api/github/followers/octocat"),
            Some(RouteKind::UserFollowers)
        );
        assert_eq!(
            RouteKind::from_path("/api/github/following/octocat"),
            Some(RouteKind::UserFollowing)
        );
    }

    #[test]
    fn from_path_rejects_unknown_paths() {
        assert_eq!(RouteKind::from_path("/"), None);
        assert_eq!(RouteKind::from_path("/metrics"), None);
        assert_eq!(RouteKind::from_path("/metrics/clean"), None);
        assert_eq!(RouteKind::from_path("/api/github/user"), None);
        assert_eq!(RouteKind::from_path("/api/github/stars/octocat"), None);
    }

    #[test]
    fn snapshot_empty_registry_is_all_zeroes() {
        let stats = Stats::new();
        let snap = stats.snapshot();

        assert_eq!(snap["total"], 0);
        for route in RouteKind::ALL {
            assert_eq!(snap["details"][route.as_str()], 0);
            assert_eq!(snap["errors"][route.as_str()], 0);
            assert_eq!(snap["averageResponseTimeMs"][route.as_str()], 0);
        }
        assert!(snap["methods"].as_object().unwrap().is_empty());
        assert!(snap["statusCodes"].as_object().unwrap().is_empty());
        assert!(snap["perUser"].as_object().unwrap().is_empty());
    }

    #[test]
    fn snapshot_totals_sum_route_counts() {
        let stats = Stats::new();
        stats.record_request(RouteKind::UserDetails, "GET", "alice");
        stats.record_request(RouteKind::UserDetails, "GET", "bob");
        stats.record_request(RouteKind::UserRepos, "GET", "alice");

        let snap = stats.snapshot();
        assert_eq!(snap["total"], 3);
        assert_eq!(snap["details"]["user_details"], 2);
        assert_eq!(snap["details"]["user_repos"], 1);
        assert_eq!(snap["details"]["user_events"], 0);
        assert_eq!(snap["methods"]["GET"], 3);
        assert_eq!(snap["perUser"]["alice"], 2);
        assert_eq!(snap["perUser"]["bob"], 1);
    }

    #[test]
    fn average_is_integer_rounded_mean() {
        let stats = Stats::new();
        stats.record_completion(RouteKind::UserDetails, 200, 120);
        stats.record_completion(RouteKind::UserDetails, 200, 80);

        let snap = stats.snapshot();
        assert_eq!(snap["averageResponseTimeMs"]["user_details"], 100);
    }

    #[test]
    fn average_rounds_half_up() {
        let stats = Stats::new();
        stats.record_completion(RouteKind::UserRepos, 200, 1);
        stats.record_completion(RouteKind::UserRepos, 200, 2);

        // mean 1.5 rounds away from zero
        let snap = stats.snapshot();
        assert_eq!(snap["averageResponseTimeMs"]["user_repos"], 2);
    }

    #[test]
    fn average_is_zero_without_samples() {
        let stats = Stats::new();
        assert_eq!(
            stats.snapshot()["averageResponseTimeMs"]["user_following"],
            0
        );
    }

    #[test]
    fn status_codes_keyed_by_code() {
        let stats = Stats::new();
        stats.record_completion(RouteKind::UserDetails, 200, 10);
        stats.record_completion(RouteKind::UserDetails, 404, 5);
        stats.record_completion(RouteKind::UserRepos, 200, 7);

        let snap = stats.snapshot();
        assert_eq!(snap["statusCodes"]["200"], 2);
        assert_eq!(snap["statusCodes"]["404"], 1);
    }

    #[test]
    fn errors_tracked_per_route() {
        let stats = Stats::new();
        stats.record_error(RouteKind::UserFollowers);
        stats.record_error(RouteKind::UserFollowers);
        stats.record_error(RouteKind::UserEvents);

        let snap = stats.snapshot();
        assert_eq!(snap["errors"]["user_followers"], 2);
        assert_eq!(snap["errors"]["user_events"], 1);
        assert_eq!(snap["errors"]["user_details"], 0);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let stats = Stats::new();
        stats.record_request(RouteKind::UserDetails, "GET", "alice");
        stats.record_completion(RouteKind::UserDetails, 200, 42);

        let first = stats.snapshot();
        let second = stats.snapshot();
        assert_eq!(first, second, "snapshot must not mutate the registry");
    }

    #[test]
    fn concurrent_updates_to_distinct_routes_do_not_leak() {
        let stats = Stats::new();
        let handles: Vec<_> = RouteKind::ALL
            .iter()
            .map(|&route| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        stats.record_request(route, "GET", route.as_str());
                        stats.record_completion(route, 200, 10);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap["total"], 250);
        for route in RouteKind::ALL {
            assert_eq!(
                snap["details"][route.as_str()],
                50,
                "route {} must count only its own requests",
                route.as_str()
            );
        }
    }
}
