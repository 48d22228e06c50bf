//! Staff management and weekly shift handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use barberly_core::StaffId;

use crate::db::staff::{ShiftInput, StaffInput};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{Staff, StaffShift};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// PUT /staff/{id}
///
/// # Errors
///
/// Returns `403` unless the caller manages the staff member's salon.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<StaffId>,
    Json(input): Json<StaffInput>,
) -> Result<Json<Staff>, AppError> {
    let staff = CatalogService::new(state.pool())
        .update_staff(id, &user, &input)
        .await?;
    Ok(Json(staff))
}

/// DELETE /staff/{id}
///
/// # Errors
///
/// Returns `403` unless the caller manages the staff member's salon.
pub async fn deactivate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<StaffId>,
) -> Result<StatusCode, AppError> {
    CatalogService::new(state.pool())
        .deactivate_staff(id, &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /staff/{id}/shifts
///
/// An empty list means the staff member works whenever the salon is open.
///
/// # Errors
///
/// Returns `404` for unknown staff.
pub async fn shifts(
    State(state): State<AppState>,
    Path(id): Path<StaffId>,
) -> Result<Json<Vec<StaffShift>>, AppError> {
    Ok(Json(CatalogService::new(state.pool()).shifts(id).await?))
}

/// PUT /staff/{id}/shifts
///
/// Replaces the whole weekly schedule.
///
/// # Errors
///
/// Returns `400` for overlapping or inverted shifts and `403` for non-managers.
pub async fn replace_shifts(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<StaffId>,
    Json(shifts): Json<Vec<ShiftInput>>,
) -> Result<Json<Vec<StaffShift>>, AppError> {
    let shifts = CatalogService::new(state.pool())
        .replace_shifts(id, &user, &shifts)
        .await?;
    Ok(Json(shifts))
}
