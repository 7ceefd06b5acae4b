//! Fallback cascade.
//!
//! One pass over an ordered provider list: each attempt either succeeds or
//! is classified and the cascade advances. After the list the offline
//! responder answers unconditionally, so a cascade never fails.
//!
//! Every attempt is raced against the caller's cancellation token, the
//! call deadline and the provider's own request timeout. A provider
//! timeout moves on to the next provider; a cancelled token or an expired
//! deadline abandons the in-flight attempt and jumps to offline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::offline::OfflineResponder;
use crate::providers::{ProviderClient, ProviderError};
use crate::stats::StatsRegistry;
use crate::types::{CompletionResult, Conversation, FailureClass, ProviderIdentity};

const HISTORY_CAP: usize = 1000;
const HISTORY_KEEP: usize = 500;

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Time and cancellation limits for one call.
#[derive(Debug, Clone, Default)]
pub struct CallBudget {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallBudget {
    /// No deadline, never cancelled.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Some(timeout), CancellationToken::new())
    }

    /// A timeout too large to represent as an instant means no deadline.
    pub fn new(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        Self {
            deadline: timeout.and_then(|t| Instant::now().checked_add(t)),
            cancel,
        }
    }

    /// Whether no further network attempt may start.
    pub fn is_exhausted(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "class")]
pub enum AttemptOutcome {
    Succeeded,
    Failed(FailureClass),
    /// Refused because of the request itself, not the provider.
    Rejected(FailureClass),
    /// Cancelled or past the deadline while in flight.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub provider: ProviderIdentity,
    pub outcome: AttemptOutcome,
}

/// Result of one cascade run.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub result: CompletionResult,
    /// Providers actually attempted, in order. Offline included.
    pub attempts: Vec<Attempt>,
}

impl CascadeOutcome {
    /// The first attempted provider, if it failed on its own account.
    /// Rejected and abandoned attempts say nothing about provider health.
    pub fn failed_primary(&self) -> Option<ProviderIdentity> {
        self.attempts
            .first()
            .filter(|a| a.provider.is_network() && matches!(a.outcome, AttemptOutcome::Failed(_)))
            .map(|a| a.provider)
    }
}

enum Interrupted {
    Failed(ProviderError),
    Abandoned,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One provider-to-provider hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackEvent {
    pub at: DateTime<Utc>,
    pub from: ProviderIdentity,
    pub to: ProviderIdentity,
    pub class: FailureClass,
}

/// Bounded fallback log (capped at 1000 entries, trimmed to the newest 500).
#[derive(Debug, Default)]
pub struct FallbackHistory {
    events: RwLock<Vec<FallbackEvent>>,
}

impl FallbackHistory {
    pub fn record(&self, from: ProviderIdentity, to: ProviderIdentity, class: FailureClass) {
        let mut events = self.events.write();
        events.push(FallbackEvent {
            at: Utc::now(),
            from,
            to,
            class,
        });
        if events.len() > HISTORY_CAP {
            let drain_end = events.len() - HISTORY_KEEP;
            events.drain(..drain_end);
        }
    }

    pub fn events(&self) -> Vec<FallbackEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

/// Runs ordered provider lists and records what happened.
pub struct FallbackCascade {
    offline: OfflineResponder,
    stats: Arc<StatsRegistry>,
    history: Arc<FallbackHistory>,
}

impl FallbackCascade {
    pub fn new(stats: Arc<StatsRegistry>, history: Arc<FallbackHistory>) -> Self {
        Self {
            offline: OfflineResponder::new(),
            stats,
            history,
        }
    }

    pub fn stats(&self) -> &StatsRegistry {
        &self.stats
    }

    pub fn history(&self) -> &FallbackHistory {
        &self.history
    }

    /// Attempt `providers` in order, then offline. Never fails and makes at
    /// most `providers.len() + 1` attempts.
    pub async fn run(
        &self,
        providers: &[Arc<dyn ProviderClient>],
        conversation: &Conversation,
        budget: &CallBudget,
    ) -> CascadeOutcome {
        let mut attempts = Vec::with_capacity(providers.len() + 1);

        for (index, provider) in providers.iter().enumerate() {
            let identity = provider.identity();
            if budget.is_exhausted() {
                warn!(
                    provider = %identity,
                    skipped = providers.len() - index,
                    "Call budget exhausted, skipping to offline"
                );
                break;
            }

            debug!(
                provider = %identity,
                attempt = index + 1,
                est_tokens = conversation.estimated_tokens(),
                "Attempting provider"
            );

            let (class, abandoned) = match attempt(provider.as_ref(), conversation, budget).await {
                Ok(text) => {
                    self.stats.record_attempt(identity, false);
                    attempts.push(Attempt {
                        provider: identity,
                        outcome: AttemptOutcome::Succeeded,
                    });
                    info!(provider = %identity, attempt = index + 1, "Provider succeeded");
                    return CascadeOutcome {
                        result: CompletionResult::new(text, identity),
                        attempts,
                    };
                }
                Err(Interrupted::Failed(e)) => {
                    let class = e.failure_class();
                    warn!(provider = %identity, class = %class, error = %e, "Provider attempt failed");
                    let outcome = if e.is_request_fault() {
                        AttemptOutcome::Rejected(class)
                    } else {
                        AttemptOutcome::Failed(class)
                    };
                    attempts.push(Attempt {
                        provider: identity,
                        outcome,
                    });
                    (class, false)
                }
                Err(Interrupted::Abandoned) => {
                    warn!(provider = %identity, "Provider attempt abandoned (cancelled or deadline)");
                    attempts.push(Attempt {
                        provider: identity,
                        outcome: AttemptOutcome::Abandoned,
                    });
                    (FailureClass::TransportError, true)
                }
            };
            self.stats.record_attempt(identity, true);

            if !class.is_retryable() || abandoned {
                self.history.record(identity, ProviderIdentity::Offline, class);
                break;
            }
            let next = providers
                .get(index + 1)
                .map(|p| p.identity())
                .unwrap_or(ProviderIdentity::Offline);
            info!(from = %identity, to = %next, class = %class, "Fallback triggered");
            self.history.record(identity, next, class);
        }

        let text = self.offline.respond(conversation);
        self.stats.record_offline();
        attempts.push(Attempt {
            provider: ProviderIdentity::Offline,
            outcome: AttemptOutcome::Succeeded,
        });
        warn!(
            attempts = attempts.len(),
            "All network providers unavailable, serving offline response"
        );

        CascadeOutcome {
            result: CompletionResult::new(text, ProviderIdentity::Offline),
            attempts,
        }
    }
}

/// One bounded provider call.
async fn attempt(
    provider: &dyn ProviderClient,
    conversation: &Conversation,
    budget: &CallBudget,
) -> Result<String, Interrupted> {
    let limit = provider.request_timeout();
    tokio::select! {
        biased;
        _ = budget.cancel.cancelled() => Err(Interrupted::Abandoned),
        _ = budget.expired() => Err(Interrupted::Abandoned),
        res = tokio::time::timeout(limit, provider.complete(conversation)) => match res {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(Interrupted::Failed(e)),
            Err(_) => Err(Interrupted::Failed(ProviderError::Timeout)),
        },
    }
}
