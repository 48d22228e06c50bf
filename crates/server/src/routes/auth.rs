//! Authentication route handlers.
//!
//! Phone number + password. A successful register or login stores the user in the
//! session; the session cookie is the only credential clients carry.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;

use barberly_core::UserRole;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

/// Registration payload.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
    /// `customer` (default) or `salon_owner`. Admins are created from the CLI.
    #[serde(default)]
    pub role: UserRole,
}

/// Login payload.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

/// Create an account and log it in.
///
/// POST /auth/register
///
/// # Errors
///
/// Returns `400` for invalid input, `403` when asking for the admin role and `409`
/// if the phone number is taken.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if req.role == UserRole::Admin {
        return Err(AppError::Forbidden(
            "admin accounts cannot be self-registered".to_string(),
        ));
    }

    let user = AuthService::new(state.pool())
        .register(Registration {
            phone: &req.phone,
            name: &req.name,
            email: req.email.as_deref(),
            password: &req.password,
            role: req.role,
        })
        .await?;

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    set_sentry_user(&user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in.
///
/// POST /auth/login
///
/// # Errors
///
/// Returns `401` for an unknown phone number or a wrong password.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<User>, AppError> {
    let user = AuthService::new(state.pool())
        .login(&req.phone, &req.password)
        .await?;

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    set_sentry_user(&user.id);
    Ok(Json(user))
}

/// Log out. Always succeeds for an already anonymous session.
///
/// POST /auth/logout
///
/// # Errors
///
/// Returns `500` if the session store fails.
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user, read fresh from the database.
///
/// GET /auth/me
///
/// # Errors
///
/// Returns `401` without a session.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>, AppError> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(Json(user))
}
