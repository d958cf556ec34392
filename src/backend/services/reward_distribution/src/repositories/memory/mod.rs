mod audit_log;
mod ledger;
mod metrics_view;
mod status_store;

pub use audit_log::InMemoryAuditLog;
pub use ledger::{InMemoryLedger, LedgerHandle, LedgerParams};
pub use metrics_view::{StaticMetricsView, SyntheticMetricsView};
pub use status_store::InMemoryStatusStore;
