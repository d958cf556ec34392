//! Local network of distributors settling rewards on an in-memory ledger.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use chrono::Utc;
use distribution_models::{Address, DistributionStatus, WorkerId};
use reward_distribution::api::{admin_routes, health};
use reward_distribution::config::DistributorConfig;
use reward_distribution::repositories::memory::{
    InMemoryLedger, InMemoryStatusStore, LedgerParams, SyntheticMetricsView,
};
use reward_distribution::repositories::open_audit_log;
use reward_distribution::repositories::traits::{AuditLog, ChainGateway, StatusStore};
use reward_distribution::services::{AdminService, DistributionCoordinator};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commands::Error;

#[derive(Debug, Serialize)]
pub struct DistributorSummary {
    pub distributor: Address,
    pub statuses: Vec<DistributionStatus>,
}

#[derive(Debug, Serialize)]
pub struct DevnetReport {
    pub current_block: u64,
    pub last_rewarded_block: u64,
    pub total_paid: u128,
    pub audit_entries: usize,
    pub distributors: Vec<DistributorSummary>,
}

/// Run until `epochs` epochs are fully settled, or until interrupted.
pub async fn run(mut config: DistributorConfig, epochs: Option<u64>) -> Result<DevnetReport, Error> {
    config.check()?;
    let devnet = config.devnet.clone();

    let ledger = InMemoryLedger::new(LedgerParams {
        epoch_length: devnet.epoch_length,
        bond_amount: devnet.bond_amount,
        round_robin_window: devnet.round_robin_window,
        required_approvals: devnet.required_approvals,
        genesis_block: 0,
    });

    let distributors: Vec<Address> = (1..=devnet.distributors as u64)
        .map(Address::from_low_u64_be)
        .collect();
    for distributor in &distributors {
        ledger.add_distributor(*distributor);
    }

    let peers: Vec<WorkerId> = (0..devnet.workers)
        .map(|i| WorkerId::new(format!("12D3KooWdevnet{i:05}")))
        .collect();
    for (i, peer) in peers.iter().enumerate() {
        // 0, 0.5, 1 or 1.5 bonds of delegated stake
        let stake = devnet.bond_amount / 2 * (i % 4) as u128;
        ledger.register_worker(peer.clone(), stake);
    }
    info!(
        distributors = distributors.len(),
        workers = peers.len(),
        epoch_length = devnet.epoch_length,
        "devnet ledger ready"
    );

    let metrics = Arc::new(SyntheticMetricsView::new(peers, Utc::now(), devnet.seconds_per_block));
    let audit: Arc<dyn AuditLog> = open_audit_log(&config.audit)
        .await
        .map_err(|e| Error::Devnet(format!("{e:#}")))?;

    // poll at least once per commit slot
    let poll_secs = (devnet.block_time_ms * devnet.round_robin_window / 4000).max(1);
    config.coordinator.commit_interval_secs = poll_secs;
    config.coordinator.approve_interval_secs = poll_secs;

    let mut nodes = Vec::with_capacity(distributors.len());
    let mut handles = Vec::with_capacity(distributors.len());
    for distributor in &distributors {
        let mut node_config = config.clone();
        node_config.coordinator.distributor = *distributor;
        let status = Arc::new(InMemoryStatusStore::new());
        let coordinator = Arc::new(DistributionCoordinator::new(
            Arc::new(ledger.handle(*distributor)),
            metrics.clone(),
            status.clone(),
            audit.clone(),
            &node_config,
        ));
        handles.push(coordinator.spawn());
        debug!(?distributor, "distributor started");
        nodes.push((*distributor, status, coordinator));
    }

    let producer = {
        let ledger = ledger.clone();
        let period = Duration::from_millis(devnet.block_time_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let block = ledger.advance_blocks(1);
                debug!(block, "block produced");
            }
        })
    };

    let server = match nodes.first() {
        Some((_, status, coordinator)) if config.admin.enabled => {
            let admin = web::Data::new(AdminService::new(
                status.clone(),
                audit.clone(),
                coordinator.clone(),
            ));
            let server = HttpServer::new(move || {
                App::new()
                    .app_data(admin.clone())
                    .route("/health", web::get().to(health))
                    .service(admin_routes())
            })
            .workers(1)
            .bind(&config.admin.bind_address)?
            .run();
            let handle = server.handle();
            tokio::spawn(server);
            info!(address = %config.admin.bind_address, "admin API listening");
            Some(handle)
        }
        _ => None,
    };

    let target = epochs.map(|n| n.saturating_mul(devnet.epoch_length));
    let observer = ledger.handle(Address::zero());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupted, stopping devnet");
                break;
            }
            _ = ticker.tick() => {
                let Some(target) = target else { continue };
                let open = match observer.open_commitments().await {
                    Ok(open) => open,
                    Err(e) => {
                        warn!(error = %e, "could not read open commitments");
                        continue;
                    }
                };
                if ledger.last_rewarded_block() >= target && open.is_empty() {
                    info!(epochs = ?epochs, "all requested epochs settled");
                    break;
                }
            }
        }
    }

    for handle in &handles {
        handle.abort();
    }
    producer.abort();
    if let Some(server) = server {
        server.stop(true).await;
    }

    let mut summaries = Vec::with_capacity(nodes.len());
    for (distributor, status, _) in &nodes {
        let statuses = status
            .list()
            .await
            .map_err(|e| Error::Devnet(e.to_string()))?;
        summaries.push(DistributorSummary {
            distributor: *distributor,
            statuses,
        });
    }

    let audit_entries = audit
        .entries(None)
        .await
        .map_err(|e| Error::Devnet(e.to_string()))?
        .len();

    Ok(DevnetReport {
        current_block: ledger.current_block(),
        last_rewarded_block: ledger.last_rewarded_block(),
        total_paid: ledger.total_paid(),
        audit_entries,
        distributors: summaries,
    })
}
