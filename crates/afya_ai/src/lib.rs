pub mod manager;
pub mod offline;
pub mod providers;
pub mod routing;
pub mod stats;
pub mod types;

// Re-export core types at crate root for convenience.
pub use manager::{ClientManager, ManagerSnapshot, OperationClient, ProviderFactory};
pub use offline::{DEGRADED_BANNER, OfflineAnswer, OfflineCategory, OfflineResponder};
pub use providers::{ProviderClient, ProviderError};
pub use routing::{
    Attempt, AttemptOutcome, CallBudget, CascadeOutcome, CooldownTracker, FallbackCascade,
    FallbackEvent, FallbackHistory, classify, classify_status, route_order,
};
pub use stats::{ProviderStats, StatsRegistry, compute_reliability};
pub use types::*;
