pub mod budget_tracker;
pub mod embedding_router;
pub mod usage_stats;

pub use budget_tracker::BudgetTracker;
pub use embedding_router::{EmbeddingPreference, EmbeddingRouter, EmbeddingRouterConfig};
pub use usage_stats::{ModelStats, ReliabilityEntry, UsageStats, UsageStatsConfig};
