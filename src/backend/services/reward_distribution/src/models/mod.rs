pub mod audit;
pub mod batch;
pub mod report;

pub use distribution_models::*;
