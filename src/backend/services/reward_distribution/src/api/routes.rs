use actix_web::{web, HttpResponse, Scope};
use distribution_models::EpochRange;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::admin_service::{AdminService, StatusSummary};

pub fn admin_routes() -> Scope {
    web::scope("/distributions")
        .route("", web::get().to(list_distributions))
        .route("/trigger", web::post().to(trigger_distribution))
        .route("/history", web::get().to(full_history))
        .route("/{range_id}", web::get().to(get_distribution))
        .route("/{range_id}/history", web::get().to(distribution_history))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    distributions: StatusSummary,
}

pub async fn health(service: web::Data<AdminService>) -> HttpResponse {
    match service.summary().await {
        Ok(distributions) => HttpResponse::Ok().json(HealthResponse {
            status: "ok",
            distributions,
        }),
        Err(e) => {
            warn!(error = %e, "health check could not read statuses");
            HttpResponse::ServiceUnavailable().body(e.to_string())
        }
    }
}

async fn list_distributions(service: web::Data<AdminService>) -> HttpResponse {
    match service.list().await {
        Ok(statuses) => HttpResponse::Ok().json(statuses),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

fn invalid_range_id(range_id: &str) -> HttpResponse {
    HttpResponse::BadRequest().body(format!("invalid range id {range_id:?}, expected FROM-TO"))
}

async fn get_distribution(service: web::Data<AdminService>, path: web::Path<String>) -> HttpResponse {
    let range_id = path.into_inner();
    if range_id.parse::<EpochRange>().is_err() {
        return invalid_range_id(&range_id);
    }
    match service.status(&range_id).await {
        Ok(Some(status)) => HttpResponse::Ok().json(status),
        Ok(None) => HttpResponse::NotFound().finish(),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

async fn full_history(service: web::Data<AdminService>) -> HttpResponse {
    match service.history(None).await {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

async fn distribution_history(service: web::Data<AdminService>, path: web::Path<String>) -> HttpResponse {
    let range_id = path.into_inner();
    let Ok(range) = range_id.parse::<EpochRange>() else {
        return invalid_range_id(&range_id);
    };
    match service.history(Some(range)).await {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct TriggerRequest {
    from_block: u64,
    to_block: u64,
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    range: EpochRange,
    accepted: bool,
}

#[derive(Debug, Default, Deserialize)]
struct TriggerQuery {
    /// Answer with the outcome instead of settling in the background.
    #[serde(default)]
    wait: bool,
}

async fn trigger_distribution(
    service: web::Data<AdminService>,
    query: web::Query<TriggerQuery>,
    req: web::Json<TriggerRequest>,
) -> HttpResponse {
    let range = match EpochRange::new(req.from_block, req.to_block) {
        Ok(range) => range,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };
    if query.wait {
        return match service.trigger_and_wait(range).await {
            Ok(outcome) => HttpResponse::Ok().json(outcome),
            Err(e) if e.is_transient() => HttpResponse::ServiceUnavailable().body(e.to_string()),
            Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
        };
    }
    service.trigger(range);
    HttpResponse::Accepted().json(TriggerResponse { range, accepted: true })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{test, App};
    use async_trait::async_trait;
    use distribution_models::{Address, DistributionStatus};

    use super::*;
    use crate::models::audit::{AuditAction, AuditEntry};
    use crate::models::report::PhaseOutcome;
    use crate::repositories::memory::{InMemoryAuditLog, InMemoryStatusStore};
    use crate::repositories::traits::{AuditLog, StatusStore};
    use crate::services::admin_service::DistributionTrigger;
    use crate::utils::errors::DistributionError;

    struct NoopTrigger;

    #[async_trait]
    impl DistributionTrigger for NoopTrigger {
        async fn trigger(&self, range: EpochRange) -> Result<PhaseOutcome, DistributionError> {
            Ok(PhaseOutcome::AlreadySettled { range })
        }
    }

    async fn service() -> web::Data<AdminService> {
        let status = Arc::new(InMemoryStatusStore::new());
        status
            .upsert(DistributionStatus::new(EpochRange::new(1000, 2000).unwrap()))
            .await
            .unwrap();

        let audit = Arc::new(InMemoryAuditLog::new());
        let author = Address::from_low_u64_be(1);
        for (from, to) in [(1000, 2000), (2000, 3000)] {
            let range = EpochRange::new(from, to).unwrap();
            audit
                .append(AuditEntry::succeeded(range, AuditAction::Commit, author, None))
                .await
                .unwrap();
        }
        web::Data::new(AdminService::new(status, audit, Arc::new(NoopTrigger)))
    }

    #[actix_web::test]
    async fn serves_status_by_range_id() {
        let app = test::init_service(App::new().app_data(service().await).service(admin_routes())).await;

        let req = test::TestRequest::get().uri("/distributions/1000-2000").to_request();
        let status: DistributionStatus = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status.range, EpochRange::new(1000, 2000).unwrap());

        let req = test::TestRequest::get().uri("/distributions/2000-3000").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::get().uri("/distributions/nope").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn trigger_rejects_inverted_ranges() {
        let app = test::init_service(App::new().app_data(service().await).service(admin_routes())).await;

        let req = test::TestRequest::post()
            .uri("/distributions/trigger")
            .set_json(serde_json::json!({ "from_block": 10, "to_block": 5 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::post()
            .uri("/distributions/trigger")
            .set_json(serde_json::json!({ "from_block": 0, "to_block": 5 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 202);
    }

    #[actix_web::test]
    async fn serves_audit_history() {
        let app = test::init_service(App::new().app_data(service().await).service(admin_routes())).await;

        let req = test::TestRequest::get().uri("/distributions/1000-2000/history").to_request();
        let entries: Vec<AuditEntry> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].range, EpochRange::new(1000, 2000).unwrap());
        assert_eq!(entries[0].action, AuditAction::Commit);

        let req = test::TestRequest::get().uri("/distributions/history").to_request();
        let entries: Vec<AuditEntry> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(entries.len(), 2);

        let req = test::TestRequest::get().uri("/distributions/5-1/history").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn trigger_can_wait_for_the_outcome() {
        let app = test::init_service(App::new().app_data(service().await).service(admin_routes())).await;

        let req = test::TestRequest::post()
            .uri("/distributions/trigger?wait=true")
            .set_json(serde_json::json!({ "from_block": 0, "to_block": 5 }))
            .to_request();
        let outcome: PhaseOutcome = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome, PhaseOutcome::AlreadySettled { range: EpochRange::new(0, 5).unwrap() });
    }
}
