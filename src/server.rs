//! HTTP answer API.
//!
//! Thin JSON surface over [`AnswerEngine`], consumed by webhook and
//! CRUD adapters that live outside this crate.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/answer` | Answer a customer question for a tenant |
//! | `POST` | `/rebuild/{tenant}` | Invalidate and recompute a tenant's index |
//! | `GET`  | `/health/{tenant}` | Per-tenant index introspection |
//! | `GET`  | `/health` | Process health check (returns version) |
//!
//! # Error Contract
//!
//! `POST /answer` always returns 200 with a non-empty reply; degraded
//! outcomes are ordinary replies, never errors. Administrative and
//! introspection endpoints return structured errors:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no knowledge source found for tenant 'x'" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based
//! dashboards can call the API directly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::{AnswerEngine, UnknownTenant};
use crate::models::TenantHealth;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<AnswerEngine>,
}

/// Start the answer API server on the configured bind address.
///
/// Spawns background pre-warming of every tenant index when enabled;
/// requests arriving before warm-up completes trigger their own build.
pub async fn run_server(engine: Arc<AnswerEngine>, bind: &str, prewarm: bool) -> anyhow::Result<()> {
    if prewarm {
        let warm_engine = engine.clone();
        tokio::spawn(async move { warm_engine.prewarm().await });
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/answer", post(handle_answer))
        .route("/rebuild/{tenant}", post(handle_rebuild))
        .route("/health/{tenant}", get(handle_tenant_health))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { engine });

    println!("Answer API listening on http://{}", bind);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g. `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ POST /answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    tenant: String,
    text: String,
}

#[derive(Serialize)]
struct AnswerResponse {
    reply: String,
}

/// Handler for `POST /answer`.
///
/// The engine absorbs every failure into a fixed reply string, so this
/// only errors on malformed requests.
async fn handle_answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    if request.tenant.trim().is_empty() {
        return Err(bad_request("tenant must not be empty"));
    }

    let reply = state.engine.answer(&request.tenant, &request.text).await;
    Ok(Json(AnswerResponse { reply }))
}

// ============ POST /rebuild/{tenant} ============

#[derive(Deserialize)]
struct RebuildParams {
    #[serde(default = "default_force")]
    force: bool,
}

fn default_force() -> bool {
    true
}

#[derive(Serialize)]
struct RebuildResponse {
    tenant: String,
    health: TenantHealth,
}

/// Handler for `POST /rebuild/{tenant}`.
///
/// Tenants are independent: a rebuild here never blocks answers for
/// other tenants, only concurrent builds of the same one.
async fn handle_rebuild(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(params): Query<RebuildParams>,
) -> Result<Json<RebuildResponse>, AppError> {
    let health = state
        .engine
        .rebuild(&tenant, params.force)
        .await
        .map_err(|e| {
            if e.downcast_ref::<UnknownTenant>().is_some() {
                not_found(e.to_string())
            } else {
                internal(e.to_string())
            }
        })?;

    Ok(Json(RebuildResponse { tenant, health }))
}

// ============ GET /health/{tenant} ============

async fn handle_tenant_health(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Json<TenantHealth> {
    Json(state.engine.health(&tenant))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
