//! Client manager: the single entry point of the client layer.
//!
//! Owns one lazily-constructed instance per network provider, the shared
//! counters, the fallback cooldowns and the fallback history. Construct it
//! once at startup and pass it by reference to whatever needs completions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use afya_core::{AfyaConfig, AfyaError};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::providers::groq::GroqProvider;
use crate::providers::huggingface::HuggingFaceProvider;
use crate::providers::{ProviderClient, ProviderError};
use crate::routing::{CallBudget, CooldownTracker, FallbackCascade, FallbackEvent, FallbackHistory};
use crate::stats::{ProviderStats, StatsRegistry};
use crate::types::{CompletionResult, Conversation, OperationCategory, ProviderIdentity};

/// Builds a provider on first use. Called at most once per manager.
pub type ProviderFactory =
    Box<dyn Fn() -> Result<Arc<dyn ProviderClient>, ProviderError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

struct ProviderSlot {
    identity: ProviderIdentity,
    /// Whether a credential was supplied.
    configured: bool,
    factory: ProviderFactory,
    /// `Some(None)` records a permanent construction failure.
    instance: OnceCell<Option<Arc<dyn ProviderClient>>>,
}

impl ProviderSlot {
    fn resolve(&self) -> Option<Arc<dyn ProviderClient>> {
        self.instance
            .get_or_init(|| {
                match (self.factory)() {
                    Ok(provider) => {
                        info!(provider = %self.identity, name = provider.name(), "Provider constructed");
                        Some(provider)
                    }
                    Err(e) => {
                        warn!(
                            provider = %self.identity,
                            error = %e,
                            "Provider construction failed, unavailable for this process"
                        );
                        None
                    }
                }
            })
            .clone()
    }

    /// Availability without side effects: construction outcome if known,
    /// otherwise whether it was configured.
    fn available(&self) -> bool {
        match self.instance.get() {
            Some(instance) => instance.is_some(),
            None => self.configured,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Side-effect-free diagnostic view of a manager.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerSnapshot {
    pub provider_stats: BTreeMap<ProviderIdentity, ProviderStats>,
    pub reliability_score: f64,
    pub providers_available: BTreeMap<ProviderIdentity, bool>,
    pub offline_invocations: u64,
    pub taken_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ClientManager
// ---------------------------------------------------------------------------

pub struct ClientManager {
    slots: Vec<ProviderSlot>,
    cooldowns: CooldownTracker,
    stats: Arc<StatsRegistry>,
    history: Arc<FallbackHistory>,
    cascade: FallbackCascade,
}

impl ClientManager {
    /// Build the manager from configuration. Providers are constructed on
    /// first use; fails only when no provider credential is configured.
    pub fn new(config: &AfyaConfig) -> Result<Self, AfyaError> {
        if !config.has_any_credential() {
            return Err(AfyaError::Config(
                "no AI provider credential configured (set GROQ_API_KEY or HF_API_KEY)".into(),
            ));
        }

        let groq_config = config.clone();
        let hf_config = config.clone();
        let groq: ProviderFactory = Box::new(move || {
            GroqProvider::from_config(&groq_config).map(|p| Arc::new(p) as Arc<dyn ProviderClient>)
        });
        let hf: ProviderFactory = Box::new(move || {
            HuggingFaceProvider::from_config(&hf_config)
                .map(|p| Arc::new(p) as Arc<dyn ProviderClient>)
        });

        let slots = vec![
            ProviderSlot {
                identity: ProviderIdentity::Fast,
                configured: has_key(&config.groq_api_key),
                factory: groq,
                instance: OnceCell::new(),
            },
            ProviderSlot {
                identity: ProviderIdentity::Stable,
                configured: has_key(&config.huggingface_api_key),
                factory: hf,
                instance: OnceCell::new(),
            },
        ];

        info!(
            fast = slots[0].configured,
            stable = slots[1].configured,
            cooldown_secs = config.fallback_reset_secs,
            "Client manager created"
        );

        Ok(Self::from_slots(
            slots,
            Duration::from_secs(config.fallback_reset_secs),
        ))
    }

    /// Build the manager from explicit factories. Identities without a
    /// factory are unavailable. Offline and duplicate entries are ignored.
    pub fn with_factories(
        factories: Vec<(ProviderIdentity, ProviderFactory)>,
        cooldown: Duration,
    ) -> Result<Self, AfyaError> {
        let mut slots: Vec<ProviderSlot> = Vec::new();
        for (identity, factory) in factories {
            if !identity.is_network() || slots.iter().any(|s| s.identity == identity) {
                continue;
            }
            slots.push(ProviderSlot {
                identity,
                configured: true,
                factory,
                instance: OnceCell::new(),
            });
        }
        if slots.is_empty() {
            return Err(AfyaError::Config("no AI provider configured".into()));
        }
        Ok(Self::from_slots(slots, cooldown))
    }

    fn from_slots(slots: Vec<ProviderSlot>, cooldown: Duration) -> Self {
        let stats = Arc::new(StatsRegistry::new());
        let history = Arc::new(FallbackHistory::default());
        Self {
            slots,
            cooldowns: CooldownTracker::new(cooldown),
            cascade: FallbackCascade::new(stats.clone(), history.clone()),
            stats,
            history,
        }
    }

    fn slot(&self, identity: ProviderIdentity) -> Option<&ProviderSlot> {
        self.slots.iter().find(|s| s.identity == identity)
    }

    /// Resolved, credential-filtered network providers for `category`.
    fn providers_for(&self, category: OperationCategory) -> Vec<Arc<dyn ProviderClient>> {
        self.cooldowns
            .order(category)
            .into_iter()
            .filter(|id| id.is_network())
            .filter_map(|id| self.slot(id).and_then(ProviderSlot::resolve))
            .collect()
    }

    /// Complete `conversation` for `category`. Never fails: when every
    /// network provider fails the result is degraded offline content.
    pub async fn complete(
        &self,
        category: OperationCategory,
        conversation: &Conversation,
        timeout: Option<Duration>,
    ) -> CompletionResult {
        self.complete_with_token(category, conversation, timeout, &CancellationToken::new())
            .await
    }

    /// Like [`complete`](Self::complete), abandoning in-flight work when
    /// `cancel` fires.
    pub async fn complete_with_token(
        &self,
        category: OperationCategory,
        conversation: &Conversation,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> CompletionResult {
        let providers = self.providers_for(category);
        let order: Vec<String> = providers.iter().map(|p| p.identity().to_string()).collect();
        debug!(category = %category, order = ?order, "Routing request");

        let budget = CallBudget::new(timeout, cancel.clone());
        let outcome = self.cascade.run(&providers, conversation, &budget).await;

        if let Some(primary) = outcome.failed_primary() {
            self.cooldowns.mark(primary);
        }

        info!(
            category = %category,
            provider = %outcome.result.provider_used,
            degraded = outcome.result.degraded,
            attempts = outcome.attempts.len(),
            "Completion finished"
        );
        outcome.result
    }

    /// A handle bound to one operation category.
    pub fn client_for(&self, category: OperationCategory) -> OperationClient<'_> {
        OperationClient {
            manager: self,
            category,
        }
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        let providers_available = ProviderIdentity::ALL
            .iter()
            .map(|id| {
                let available = match id {
                    ProviderIdentity::Offline => true,
                    _ => self.slot(*id).is_some_and(ProviderSlot::available),
                };
                (*id, available)
            })
            .collect();

        ManagerSnapshot {
            provider_stats: self.stats.per_provider(),
            reliability_score: self.stats.reliability_score(),
            providers_available,
            offline_invocations: self.stats.offline_invocations(),
            taken_at: Utc::now(),
        }
    }

    pub fn stats(&self, provider: ProviderIdentity) -> ProviderStats {
        self.stats.get(provider)
    }

    pub fn reliability_score(&self) -> f64 {
        self.stats.reliability_score()
    }

    pub fn fallback_history(&self) -> Vec<FallbackEvent> {
        self.history.events()
    }

    /// Order the next call for `category` would try, offline included.
    pub fn route_preview(&self, category: OperationCategory) -> Vec<ProviderIdentity> {
        self.cooldowns
            .order(category)
            .into_iter()
            .filter(|id| !id.is_network() || self.slot(*id).is_some_and(ProviderSlot::available))
            .collect()
    }

    pub fn reset_cooldowns(&self) {
        self.cooldowns.reset();
    }

    /// Tear the manager down, returning the final snapshot.
    pub fn shutdown(self) -> ManagerSnapshot {
        let snapshot = self.snapshot();
        info!(
            reliability = snapshot.reliability_score,
            offline_invocations = snapshot.offline_invocations,
            fallbacks = self.history.len(),
            "Client manager shut down"
        );
        snapshot
    }
}

fn has_key(key: &Option<String>) -> bool {
    key.as_ref().is_some_and(|k| !k.is_empty())
}

// ---------------------------------------------------------------------------
// OperationClient
// ---------------------------------------------------------------------------

/// A [`ClientManager`] view bound to one [`OperationCategory`].
#[derive(Clone, Copy)]
pub struct OperationClient<'a> {
    manager: &'a ClientManager,
    category: OperationCategory,
}

impl OperationClient<'_> {
    pub fn category(&self) -> OperationCategory {
        self.category
    }

    pub async fn complete(&self, conversation: &Conversation) -> CompletionResult {
        self.manager.complete(self.category, conversation, None).await
    }

    pub async fn complete_with_timeout(
        &self,
        conversation: &Conversation,
        timeout: Duration,
    ) -> CompletionResult {
        self.manager
            .complete(self.category, conversation, Some(timeout))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_credentials_is_a_config_error() {
        let err = ClientManager::new(&AfyaConfig::default()).err().unwrap();
        assert!(matches!(err, AfyaError::Config(_)));
    }

    #[test]
    fn one_credential_is_enough() {
        let config = AfyaConfig {
            groq_api_key: Some("gsk_test".into()),
            ..Default::default()
        };
        let manager = ClientManager::new(&config).unwrap();
        let snap = manager.snapshot();
        assert!(snap.providers_available[&ProviderIdentity::Fast]);
        assert!(!snap.providers_available[&ProviderIdentity::Stable]);
        assert!(snap.providers_available[&ProviderIdentity::Offline]);
        assert_eq!(snap.reliability_score, 1.0);
    }

    #[test]
    fn route_preview_skips_unconfigured_providers() {
        let config = AfyaConfig {
            huggingface_api_key: Some("hf_test".into()),
            ..Default::default()
        };
        let manager = ClientManager::new(&config).unwrap();
        assert_eq!(
            manager.route_preview(OperationCategory::Interactive),
            [ProviderIdentity::Stable, ProviderIdentity::Offline]
        );
    }

    #[test]
    fn factories_without_network_identity_are_rejected() {
        let offline_only: ProviderFactory =
            Box::new(|| Ok(Arc::new(crate::offline::OfflineResponder::new()) as Arc<dyn ProviderClient>));
        let err = ClientManager::with_factories(
            vec![(ProviderIdentity::Offline, offline_only)],
            Duration::from_secs(300),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AfyaError::Config(_)));
    }

    #[test]
    fn snapshot_serializes_with_identity_keys() {
        let config = AfyaConfig {
            groq_api_key: Some("gsk_test".into()),
            ..Default::default()
        };
        let snap = ClientManager::new(&config).unwrap().snapshot();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["providers_available"]["fast"], true);
        assert_eq!(json["provider_stats"]["offline"]["calls"], 0);
        assert_eq!(json["reliability_score"], 1.0);
    }
}
