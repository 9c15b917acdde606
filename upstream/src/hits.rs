use std::sync::Arc;

use dashmap::DashMap;

/// Per-route request counters, used by tests to assert on call frequency.
#[derive(Clone, Default)]
pub struct HitCounter(Arc<DashMap<String, u64>>);

impl HitCounter {
    /// Counts one request against `route`.
    pub fn hit(&self, route: &str) {
        *self.0.entry(route.to_owned()).or_insert(0) += 1;
    }

    /// Number of requests seen for `route`; zero if it was never hit.
    pub fn get(&self, route: &str) -> u64 {
        self.0.get(route).map(|count| *count).unwrap_or(0)
    }
}
