//! Service management handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use barberly_core::ServiceId;

use crate::db::services::ServiceInput;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::Service;
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// PUT /services/{id}
///
/// # Errors
///
/// Returns `403` unless the caller manages the service's salon.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ServiceId>,
    Json(input): Json<ServiceInput>,
) -> Result<Json<Service>, AppError> {
    let service = CatalogService::new(state.pool())
        .update_service(id, &user, &input)
        .await?;
    Ok(Json(service))
}

/// DELETE /services/{id}
///
/// Existing bookings keep their line items.
///
/// # Errors
///
/// Returns `403` unless the caller manages the service's salon.
pub async fn deactivate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ServiceId>,
) -> Result<StatusCode, AppError> {
    CatalogService::new(state.pool())
        .deactivate_service(id, &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
