//! Salon route handlers: catalogue reads, management and availability.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use barberly_core::{SalonId, ServiceId, StaffId};

use crate::db::page;
use crate::db::salons::{SalonInput, SalonRepository};
use crate::db::services::{ServiceInput, ServiceRepository};
use crate::db::staff::{StaffInput, StaffRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{Booking, Salon, Service, Staff};
use crate::services::availability::{Availability, AvailabilityRequest, AvailabilityService};
use crate::services::booking::BookingService;
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// Salon search parameters.
#[derive(Debug, Deserialize)]
pub struct SalonQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Availability parameters. `service_ids` is comma separated.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// First salon-local day; defaults to today at the salon.
    pub date: Option<NaiveDate>,
    pub days: Option<u32>,
    pub service_ids: String,
    pub staff_id: Option<StaffId>,
}

/// Salon bookings parameters.
#[derive(Debug, Deserialize)]
pub struct SalonBookingsQuery {
    pub date: NaiveDate,
}

/// Parse a comma separated id list such as `3,5, 8`.
fn parse_service_ids(raw: &str) -> Result<Vec<ServiceId>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>()
                .map(ServiceId::new)
                .map_err(|_| AppError::BadRequest(format!("invalid service id: {s}")))
        })
        .collect()
}

/// GET /salons
///
/// # Errors
///
/// Returns `500` if the query fails.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<SalonQuery>,
) -> Result<Json<Vec<Salon>>, AppError> {
    let (limit, offset) = page(query.limit, query.offset);
    let salons = SalonRepository::new(state.pool())
        .list_active(query.q.as_deref(), limit, offset)
        .await?;
    Ok(Json(salons))
}

/// POST /salons
///
/// # Errors
///
/// Returns `403` for customers and `400` for invalid input.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(input): Json<SalonInput>,
) -> Result<(StatusCode, Json<Salon>), AppError> {
    let salon = CatalogService::new(state.pool())
        .create_salon(&user, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(salon)))
}

/// GET /salons/{id}
///
/// # Errors
///
/// Returns `404` for unknown or deactivated salons.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<SalonId>,
) -> Result<Json<Salon>, AppError> {
    Ok(Json(CatalogService::new(state.pool()).salon(id).await?))
}

/// PUT /salons/{id}
///
/// # Errors
///
/// Returns `403` unless the caller manages the salon.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<SalonId>,
    Json(input): Json<SalonInput>,
) -> Result<Json<Salon>, AppError> {
    let salon = CatalogService::new(state.pool())
        .update_salon(id, &user, &input)
        .await?;
    Ok(Json(salon))
}

/// DELETE /salons/{id}
///
/// # Errors
///
/// Returns `403` unless the caller manages the salon.
pub async fn deactivate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<SalonId>,
) -> Result<StatusCode, AppError> {
    CatalogService::new(state.pool())
        .deactivate_salon(id, &user)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /salons/{id}/services
///
/// # Errors
///
/// Returns `404` for unknown or deactivated salons.
pub async fn services(
    State(state): State<AppState>,
    Path(id): Path<SalonId>,
) -> Result<Json<Vec<Service>>, AppError> {
    let salon = CatalogService::new(state.pool()).salon(id).await?;
    let services = ServiceRepository::new(state.pool())
        .list(salon.id, false)
        .await?;
    Ok(Json(services))
}

/// POST /salons/{id}/services
///
/// # Errors
///
/// Returns `403` unless the caller manages the salon and `400` for invalid input.
pub async fn create_service(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<SalonId>,
    Json(input): Json<ServiceInput>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    let service = CatalogService::new(state.pool())
        .create_service(id, &user, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// GET /salons/{id}/staff
///
/// # Errors
///
/// Returns `404` for unknown or deactivated salons.
pub async fn staff(
    State(state): State<AppState>,
    Path(id): Path<SalonId>,
) -> Result<Json<Vec<Staff>>, AppError> {
    let salon = CatalogService::new(state.pool()).salon(id).await?;
    let staff = StaffRepository::new(state.pool()).list(salon.id, false).await?;
    Ok(Json(staff))
}

/// POST /salons/{id}/staff
///
/// # Errors
///
/// Returns `403` unless the caller manages the salon.
pub async fn create_staff(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<SalonId>,
    Json(input): Json<StaffInput>,
) -> Result<(StatusCode, Json<Staff>), AppError> {
    let staff = CatalogService::new(state.pool())
        .create_staff(id, &user, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(staff)))
}

/// GET /salons/{id}/availability
///
/// `days` is clamped to the booking horizon rather than rejected.
///
/// # Errors
///
/// Returns `400` for a bad service list and `404` for an unknown salon or staff
/// member.
pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<SalonId>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    let service_ids = parse_service_ids(&query.service_ids)?;
    let date = match query.date {
        Some(date) => date,
        None => {
            let salon = CatalogService::new(state.pool()).salon(id).await?;
            salon.local(Utc::now()).date()
        }
    };

    let request = AvailabilityRequest {
        date,
        days: query.days.unwrap_or(1),
        service_ids,
        staff_id: query.staff_id,
    };
    let availability = AvailabilityService::new(state.pool(), &state.config().booking)
        .find(id, &request)
        .await?;
    Ok(Json(availability))
}

/// GET /salons/{id}/bookings?date=
///
/// # Errors
///
/// Returns `403` unless the caller manages the salon.
pub async fn bookings(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<SalonId>,
    Query(query): Query<SalonBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = BookingService::new(state.pool(), &state.config().booking)
        .list_for_salon(id, query.date, &user)
        .await?;
    Ok(Json(bookings))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_ids() {
        let ids = parse_service_ids("3, 5,,8").unwrap();
        assert_eq!(ids, vec![ServiceId::new(3), ServiceId::new(5), ServiceId::new(8)]);
    }

    #[test]
    fn test_parse_service_ids_rejects_garbage() {
        let err = parse_service_ids("3,haircut").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_service_ids_empty() {
        assert!(parse_service_ids("").unwrap().is_empty());
    }
}
