//! Reward computation and batched settlement for distributor nodes.
//!
//! A distributor turns per-epoch worker activity into rewards, groups them
//! into Merkle-committed batches and settles them on the ledger through a
//! commit, approve, distribute protocol shared with the other distributors.

pub mod api;
pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

pub use config::DistributorConfig;
pub use services::coordinator::DistributionCoordinator;
pub use utils::errors::{DistributionError, GatewayError};
