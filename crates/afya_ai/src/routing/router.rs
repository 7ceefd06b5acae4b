//! Operation-aware provider ordering.
//!
//! Latency-sensitive work (interactive queries, reports) prefers the fast
//! provider; system work prefers the stable one. Offline is always last.
//!
//! A provider that failed as the first entry of a cascade is put "in
//! fallback" for a fixed window. While the mark is fresh it is demoted
//! behind the category's other providers but never removed; once the
//! window elapses the category's default order applies again.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::types::{OperationCategory, ProviderIdentity};

/// Default cooldown window.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

/// Preferred order for `category`, offline included as the terminal entry.
pub fn route_order(category: OperationCategory) -> Vec<ProviderIdentity> {
    use ProviderIdentity::*;
    match category {
        OperationCategory::Interactive | OperationCategory::Report => vec![Fast, Stable, Offline],
        OperationCategory::System | OperationCategory::Default => vec![Stable, Fast, Offline],
    }
}

/// Tracks when each provider last entered fallback.
#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    marks: Mutex<HashMap<ProviderIdentity, Instant>>,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            marks: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Put `provider` in fallback as of now. Offline is never marked.
    pub fn mark(&self, provider: ProviderIdentity) {
        self.mark_at(provider, Instant::now());
    }

    pub fn mark_at(&self, provider: ProviderIdentity, at: Instant) {
        if !provider.is_network() {
            return;
        }
        self.marks.lock().insert(provider, at);
        info!(
            provider = %provider,
            window_secs = self.window.as_secs(),
            "Provider entered fallback cooldown"
        );
    }

    pub fn is_cooling(&self, provider: ProviderIdentity) -> bool {
        self.is_cooling_at(provider, Instant::now())
    }

    pub fn is_cooling_at(&self, provider: ProviderIdentity, now: Instant) -> bool {
        self.marks
            .lock()
            .get(&provider)
            .is_some_and(|since| now.saturating_duration_since(*since) < self.window)
    }

    /// Cooldown-adjusted order for `category`.
    pub fn order(&self, category: OperationCategory) -> Vec<ProviderIdentity> {
        self.order_at(category, Instant::now())
    }

    /// Cooldown-adjusted order as of `now`. Expired marks are dropped.
    pub fn order_at(&self, category: OperationCategory, now: Instant) -> Vec<ProviderIdentity> {
        let base = route_order(category);
        let mut marks = self.marks.lock();

        marks.retain(|provider, since| {
            let fresh = now.saturating_duration_since(*since) < self.window;
            if !fresh {
                debug!(provider = %provider, "Fallback cooldown expired, default order restored");
            }
            fresh
        });

        if marks.is_empty() {
            return base;
        }

        let (cooling, ready): (Vec<_>, Vec<_>) = base
            .into_iter()
            .filter(|p| p.is_network())
            .partition(|p| marks.contains_key(p));

        let mut order = ready;
        order.extend(cooling);
        order.push(ProviderIdentity::Offline);
        order
    }

    /// Clear every mark.
    pub fn reset(&self) {
        self.marks.lock().clear();
        info!("All fallback cooldowns cleared");
    }
}
