//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::load_balancer::{backend::Backend, Algorithm, LoadBalancer, LoadBalancerError};

/// Round-robin selector.
///
/// Selection holds the read lock only, so concurrent selections never wait on
/// each other; the rotation cursor is advanced atomically. Replacement and
/// health toggles take the write lock.
#[derive(Debug)]
pub struct RoundRobin {
    backends: RwLock<Vec<Arc<Backend>>>,
    cursor: AtomicUsize,
}

impl RoundRobin {
    /// Create a balancer whose cursor starts at a random position, so that
    /// several instances started together do not rotate in lockstep.
    pub fn new(backends: Vec<Backend>) -> Self {
        Self::with_cursor(backends, rand::random())
    }

    /// Create a balancer with a fixed starting cursor.
    ///
    /// The cursor is advanced before use: the first selection starts its scan
    /// at `(start + 1) % len`.
    pub fn with_cursor(backends: Vec<Backend>, start: usize) -> Self {
        Self {
            backends: RwLock::new(backends.into_iter().map(Arc::new).collect()),
            cursor: AtomicUsize::new(start),
        }
    }

    // A panic while holding the lock cannot leave the vector half-written:
    // writers only assign a whole vector or store into an atomic flag.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Backend>>> {
        self.backends.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Backend>>> {
        self.backends.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_backend(&self) -> Result<Arc<Backend>, LoadBalancerError> {
        let backends = self.read();
        let len = backends.len();
        if len == 0 {
            return Err(LoadBalancerError::NoHealthyBackends);
        }

        // Cursor wraps on overflow; only its value mod len matters.
        let start = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % len;

        for i in 0..len {
            let index = (start + i) % len;
            let backend = &backends[index];
            if backend.is_healthy() {
                tracing::debug!(index, backend = %backend, "Selected backend");
                return Ok(Arc::clone(backend));
            }
        }
        Err(LoadBalancerError::NoHealthyBackends)
    }

    fn update_backends(&self, backends: Vec<Backend>) {
        let replacement: Vec<Arc<Backend>> = backends.into_iter().map(Arc::new).collect();
        let count = replacement.len();
        *self.write() = replacement;
        tracing::info!(count, "Backend set replaced");
    }

    fn health_check(&self, backend: &Backend, healthy: bool) {
        let backends = self.write();
        match backends.iter().find(|b| b.as_ref() == backend) {
            Some(found) => {
                found.set_healthy(healthy);
                tracing::info!(backend = %found, healthy, "Backend health updated");
            }
            None => {
                tracing::debug!(backend = %backend, "Health update for unknown backend ignored");
            }
        }
    }

    fn backends(&self) -> Vec<Arc<Backend>> {
        self.read().clone()
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::RoundRobin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn backends(addrs: &[&str]) -> Vec<Backend> {
        addrs.iter().map(|a| Backend::parse(a).unwrap()).collect()
    }

    fn abc() -> Vec<Backend> {
        backends(&["http://a.example", "http://b.example", "http://c.example"])
    }

    fn pick(lb: &RoundRobin) -> String {
        lb.next_backend().unwrap().address().to_string()
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::with_cursor(abc(), 0);

        assert_eq!(pick(&lb), "http://b.example/");
        assert_eq!(pick(&lb), "http://c.example/");
        assert_eq!(pick(&lb), "http://a.example/");
        assert_eq!(pick(&lb), "http://b.example/");
    }

    #[test]
    fn nine_selections_visit_each_backend_three_times() {
        let lb = RoundRobin::new(abc());
        let mut seen: HashMap<String, usize> = HashMap::new();
        for _ in 0..9 {
            *seen.entry(pick(&lb)).or_default() += 1;
        }
        assert_eq!(seen.len(), 3);
        assert!(seen.values().all(|&count| count == 3), "{seen:?}");
    }

    #[test]
    fn one_full_rotation_visits_every_backend_once() {
        let lb = RoundRobin::new(backends(&[
            "http://a.example",
            "http://b.example",
            "http://c.example",
            "http://d.example",
            "http://e.example",
        ]));
        let mut seen: Vec<String> = (0..5).map(|_| pick(&lb)).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn unhealthy_backend_is_skipped() {
        let lb = RoundRobin::with_cursor(abc(), 0);
        let b = Backend::parse("http://b.example").unwrap();
        lb.health_check(&b, false);

        for _ in 0..4 {
            assert_ne!(pick(&lb), "http://b.example/");
        }

        lb.health_check(&b, true);
        let seen: Vec<String> = (0..3).map(|_| pick(&lb)).collect();
        assert!(seen.contains(&"http://b.example/".to_string()));
    }

    #[test]
    fn all_unhealthy_fails() {
        let lb = RoundRobin::new(abc());
        for addr in ["http://a.example", "http://b.example", "http://c.example"] {
            lb.health_check(&Backend::parse(addr).unwrap(), false);
        }
        for _ in 0..3 {
            assert_eq!(lb.next_backend().unwrap_err(), LoadBalancerError::NoHealthyBackends);
        }
    }

    #[test]
    fn empty_sequence_fails() {
        let lb = RoundRobin::new(Vec::new());
        assert_eq!(lb.next_backend().unwrap_err(), LoadBalancerError::NoHealthyBackends);
    }

    #[test]
    fn single_backend() {
        let lb = RoundRobin::new(backends(&["http://only.example"]));
        assert_eq!(pick(&lb), "http://only.example/");
        assert_eq!(pick(&lb), "http://only.example/");

        lb.health_check(&Backend::parse("http://only.example").unwrap(), false);
        assert_eq!(lb.next_backend().unwrap_err(), LoadBalancerError::NoHealthyBackends);
    }

    #[test]
    fn update_backends_replaces_sequence() {
        let lb = RoundRobin::new(abc());
        lb.update_backends(backends(&["http://new1.example", "http://new2.example"]));

        let snapshot: Vec<String> = lb.backends().iter().map(|b| b.address().to_string()).collect();
        assert_eq!(snapshot, vec!["http://new1.example/", "http://new2.example/"]);
        for _ in 0..4 {
            assert!(pick(&lb).starts_with("http://new"));
        }
    }

    #[test]
    fn update_to_all_unhealthy_set_fails_immediately() {
        let lb = RoundRobin::new(abc());
        let replacement = vec![
            Backend::new(url::Url::parse("http://x.example").unwrap(), false),
            Backend::new(url::Url::parse("http://y.example").unwrap(), false),
        ];
        lb.update_backends(replacement);
        assert_eq!(lb.next_backend().unwrap_err(), LoadBalancerError::NoHealthyBackends);
    }

    #[test]
    fn health_check_unknown_address_is_noop() {
        let lb = RoundRobin::new(abc());
        lb.health_check(&Backend::parse("http://unknown.example").unwrap(), false);
        assert!(lb.backends().iter().all(|b| b.is_healthy()));
    }

    #[test]
    fn cursor_wraps_without_panicking() {
        let lb = RoundRobin::with_cursor(abc(), usize::MAX - 1);
        for _ in 0..6 {
            lb.next_backend().unwrap();
        }
    }
}
