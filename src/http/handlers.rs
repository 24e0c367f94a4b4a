//! Endpoint handlers.
//!
//! Each handler makes one bounded dependency call and serializes the
//! result. Only the products path can answer with an error status.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Json,
};

use crate::database::ProductRow;
use crate::health::{self, HealthStatus};
use crate::http::request::request_id;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::identity::UserInfo;

/// `GET /health`. Always 200; dependency failures only degrade fields.
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let status = health::check(
        state.store.as_ref(),
        state.network.as_ref(),
        state.timeouts.db_ping(),
    )
    .await;
    Json(status)
}

/// `GET /api/user`. Always 200; "not connected" is a normal answer.
pub async fn user(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<UserInfo> {
    let result = state.identity.resolve(remote_addr, &headers).await;

    if let Err(e) = &result {
        if e.is_fault() {
            tracing::warn!(
                request_id = %request_id(&headers),
                remote_addr = %remote_addr,
                error = %e,
                "Identity lookup failed"
            );
        } else {
            tracing::debug!(
                request_id = %request_id(&headers),
                remote_addr = %remote_addr,
                error = %e,
                "Caller not identified"
            );
        }
    }

    Json(UserInfo::from(result))
}

/// `GET /api/products`. Newest 100 rows, or 500 with the failure message.
pub async fn products(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProductRow>>, ApiError> {
    match state.store.recent_products(state.timeouts.query()).await {
        Ok(rows) => Ok(Json(rows)),
        Err(e) => {
            tracing::error!(request_id = %request_id(&headers), error = %e, "Products query failed");
            Err(e.into())
        }
    }
}
