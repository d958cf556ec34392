pub mod admin_service;
pub mod batch_service;
pub mod coordinator;
pub mod metrics_service;
pub mod reward_service;

pub use admin_service::{AdminService, DistributionTrigger, StatusSummary};
pub use batch_service::{create_batches, RewardTree};
pub use coordinator::{advance_range, next_range, CoordinatorHandles, DistributionCoordinator};
pub use metrics_service::MetricsService;
pub use reward_service::{RewardEngine, RewardSet};
