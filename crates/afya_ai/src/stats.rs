//! Per-provider call counters and the derived reliability score.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::ProviderIdentity;

/// Penalty applied to the reliability score per offline activation.
pub const OFFLINE_PENALTY: f64 = 0.1;

/// Counters for one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub calls: u64,
    pub errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    per_provider: BTreeMap<ProviderIdentity, ProviderStats>,
    offline_invocations: u64,
}

/// Shared, concurrently-updated counters. Every mutation happens under one
/// lock so increments from parallel calls are never lost.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    inner: Mutex<Counters>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt against `provider`.
    pub fn record_attempt(&self, provider: ProviderIdentity, failed: bool) {
        let mut inner = self.inner.lock();
        let entry = inner.per_provider.entry(provider).or_default();
        entry.calls += 1;
        if failed {
            entry.errors += 1;
        }
    }

    /// Record one activation of the offline responder (call + invocation).
    pub fn record_offline(&self) {
        let mut inner = self.inner.lock();
        inner
            .per_provider
            .entry(ProviderIdentity::Offline)
            .or_default()
            .calls += 1;
        inner.offline_invocations += 1;
    }

    pub fn get(&self, provider: ProviderIdentity) -> ProviderStats {
        self.inner
            .lock()
            .per_provider
            .get(&provider)
            .copied()
            .unwrap_or_default()
    }

    /// Counters for every identity, zero-filled.
    pub fn per_provider(&self) -> BTreeMap<ProviderIdentity, ProviderStats> {
        let inner = self.inner.lock();
        ProviderIdentity::ALL
            .iter()
            .map(|id| (*id, inner.per_provider.get(id).copied().unwrap_or_default()))
            .collect()
    }

    pub fn offline_invocations(&self) -> u64 {
        self.inner.lock().offline_invocations
    }

    /// `(calls - errors) / calls - 0.1 * offline`, clamped to `[0, 1]`.
    /// `1.0` before any call.
    pub fn reliability_score(&self) -> f64 {
        let inner = self.inner.lock();
        let (calls, errors) = inner
            .per_provider
            .values()
            .fold((0u64, 0u64), |(c, e), s| (c + s.calls, e + s.errors));
        compute_reliability(calls, errors, inner.offline_invocations)
    }
}

/// Pure form of [`StatsRegistry::reliability_score`].
pub fn compute_reliability(total_calls: u64, total_errors: u64, offline_invocations: u64) -> f64 {
    if total_calls == 0 {
        return 1.0;
    }
    let success = total_calls.saturating_sub(total_errors) as f64 / total_calls as f64;
    (success - OFFLINE_PENALTY * offline_invocations as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_is_fully_reliable() {
        let stats = StatsRegistry::new();
        assert_eq!(stats.reliability_score(), 1.0);
        assert_eq!(stats.per_provider().len(), 3);
    }

    #[test]
    fn errors_lower_the_score() {
        let stats = StatsRegistry::new();
        stats.record_attempt(ProviderIdentity::Fast, true);
        stats.record_attempt(ProviderIdentity::Stable, false);
        assert_eq!(stats.get(ProviderIdentity::Fast), ProviderStats { calls: 1, errors: 1 });
        assert!((stats.reliability_score() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn offline_counts_as_call_and_penalty() {
        let stats = StatsRegistry::new();
        stats.record_attempt(ProviderIdentity::Fast, true);
        stats.record_offline();
        assert_eq!(stats.get(ProviderIdentity::Offline).calls, 1);
        assert_eq!(stats.offline_invocations(), 1);
        // (2 - 1) / 2 - 0.1
        assert!((stats.reliability_score() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn score_is_clamped() {
        assert_eq!(compute_reliability(1, 1, 50), 0.0);
        assert_eq!(compute_reliability(10, 0, 0), 1.0);
        // Errors can never exceed calls, but stay safe if they do.
        assert_eq!(compute_reliability(1, 5, 0), 0.0);
    }

    #[test]
    fn score_strictly_decreases_with_offline_invocations() {
        let a = compute_reliability(20, 2, 0);
        let b = compute_reliability(20, 2, 1);
        let c = compute_reliability(20, 2, 2);
        assert!(a > b && b > c);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let stats = std::sync::Arc::new(StatsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_attempt(ProviderIdentity::Fast, false);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.get(ProviderIdentity::Fast).calls, 8000);
    }
}
