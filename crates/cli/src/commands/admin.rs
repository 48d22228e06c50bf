//! User management commands.
//!
//! # Environment Variables
//!
//! - `SERVER_DATABASE_URL` - `PostgreSQL` connection string
//! - `BARBERLY_ADMIN_PASSWORD` - Password for the new user (kept off the command line)

use thiserror::Error;

use barberly_core::UserRole;
use barberly_server::services::auth::{AuthError, AuthService, Registration};

/// Errors that can occur during user management.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: customer, salon_owner, admin")]
    InvalidRole(String),

    /// Registration rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

fn parse_role(role: &str) -> Result<UserRole, AdminError> {
    role.parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))
}

/// Create a user directly in the database.
///
/// # Errors
///
/// Returns an error for an invalid role, a missing password, a weak password or an
/// already registered phone number.
pub async fn create_user(
    phone: &str,
    name: &str,
    role: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let role = parse_role(role)?;
    let pool = super::connect().await?;
    let password = std::env::var("BARBERLY_ADMIN_PASSWORD")
        .map_err(|_| AdminError::MissingEnvVar("BARBERLY_ADMIN_PASSWORD"))?;

    tracing::info!("Creating user: {} ({})", phone, role);
    let user = AuthService::new(&pool)
        .register(Registration {
            phone,
            name,
            email: None,
            password: &password,
            role,
        })
        .await
        .map_err(AdminError::from)?;

    tracing::info!(
        "User created successfully! ID: {}, Phone: {}, Role: {}",
        user.id,
        user.phone,
        user.role
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("salon_owner").unwrap(), UserRole::SalonOwner);
        assert!(matches!(
            parse_role("superuser"),
            Err(AdminError::InvalidRole(r)) if r == "superuser"
        ));
    }
}
