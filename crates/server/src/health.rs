use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use pizzabot_core::catalog::{CatalogStatus, CatalogStore};
use pizzabot_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    catalog: Arc<CatalogStore>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, catalog: Arc<CatalogStore>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, catalog })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let catalog = catalog_check(&state.catalog);
    let ready = database.status == "ready" && catalog.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        catalog,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

fn catalog_check(catalog: &CatalogStore) -> HealthCheck {
    match catalog.status() {
        CatalogStatus::Loaded { items } => {
            HealthCheck { status: "ready", detail: format!("{items} menu items loaded") }
        }
        CatalogStatus::Unloaded => {
            HealthCheck { status: "degraded", detail: "catalog not loaded yet".to_string() }
        }
        CatalogStatus::Failed { reason } => {
            HealthCheck { status: "degraded", detail: format!("catalog failed to load: {reason}") }
        }
    }
}
