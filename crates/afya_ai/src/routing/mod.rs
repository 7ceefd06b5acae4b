//! Afya AI routing
//!
//! Failure classification, operation-aware provider ordering with
//! fallback cooldowns, and the cascade that walks the ordering.

mod cascade;
mod classifier;
mod router;

pub use cascade::*;
pub use classifier::*;
pub use router::*;
