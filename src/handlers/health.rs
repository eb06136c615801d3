use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use crate::db::{check_connection, DatabaseTarget};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub cloud: &'static str,
    pub local: &'static str,
}

/// Liveness plus a ping of both primary databases. A down database degrades
/// the response to 503 but the process keeps serving.
pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthBody>) {
    let cloud_ok = check_connection(&state.registry.cloud(), &DatabaseTarget::Cloud)
        .await
        .is_ok();
    let local_ok = check_connection(&state.registry.local(), &DatabaseTarget::Local)
        .await
        .is_ok();

    let body = HealthBody {
        status: if cloud_ok && local_ok { "ok" } else { "degraded" },
        cloud: if cloud_ok { "up" } else { "down" },
        local: if local_ok { "up" } else { "down" },
    };

    let code = if cloud_ok && local_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(body))
}
