//! Seed salons, services, staff and shifts from a YAML file.
//!
//! ```yaml
//! salons:
//!   - owner_phone: "0912345678"
//!     name: Barber Lan
//!     address: 12 Ly Thuong Kiet, Ha Noi
//!     open_time: "09:00:00"
//!     close_time: "20:00:00"
//!     services:
//!       - { name: Haircut, price: "150000", duration_minutes: 30 }
//!     staff:
//!       - name: Minh
//!         shifts:
//!           - { weekday: 0, start_time: "09:00:00", end_time: "17:00:00" }
//! ```
//!
//! Owners must already exist (see `barberly admin create --role salon_owner`).

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use barberly_core::PhoneNumber;
use barberly_server::db::salons::{SalonInput, SalonRepository};
use barberly_server::db::services::{ServiceInput, ServiceRepository};
use barberly_server::db::staff::{ShiftInput, StaffInput, StaffRepository};
use barberly_server::db::users::UserRepository;
use barberly_server::services::catalog::{validate_salon, validate_service, validate_shifts};

/// Root of the seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub salons: Vec<SeedSalon>,
}

/// A salon and everything it offers.
#[derive(Debug, Deserialize)]
pub struct SeedSalon {
    pub owner_phone: PhoneNumber,
    #[serde(flatten)]
    pub salon: SalonInput,
    #[serde(default)]
    pub services: Vec<ServiceInput>,
    #[serde(default)]
    pub staff: Vec<SeedStaff>,
}

/// A staff member and their weekly schedule.
#[derive(Debug, Deserialize)]
pub struct SeedStaff {
    #[serde(flatten)]
    pub staff: StaffInput,
    #[serde(default)]
    pub shifts: Vec<ShiftInput>,
}

/// Every problem in the file, prefixed with the salon it belongs to.
fn validate(file: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    for seed in &file.salons {
        let name = &seed.salon.name;
        if let Err(e) = validate_salon(&seed.salon) {
            errors.push(format!("{name}: {e}"));
        }
        for service in &seed.services {
            if let Err(e) = validate_service(service) {
                errors.push(format!("{name} / {}: {e}", service.name));
            }
        }
        for staff in &seed.staff {
            if let Err(e) = validate_shifts(&staff.shifts) {
                errors.push(format!("{name} / {}: {e}", staff.staff.name));
            }
        }
    }
    errors
}

/// Seed salons from `file_path`.
///
/// The whole file is validated before anything is written.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation, names an
/// unknown owner, or a database write fails.
pub async fn salons(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let file: SeedFile = serde_yaml::from_str(&content)?;
    info!(salons = file.salons.len(), "Parsed seed file");

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = super::connect().await?;
    let users = UserRepository::new(&pool);
    let salons = SalonRepository::new(&pool);
    let services = ServiceRepository::new(&pool);
    let staff_repo = StaffRepository::new(&pool);

    let (mut service_count, mut staff_count) = (0, 0);
    for seed in &file.salons {
        let owner = users
            .get_by_phone(&seed.owner_phone)
            .await?
            .ok_or_else(|| format!("owner {} not found", seed.owner_phone))?;
        if !owner.role.can_manage_salons() {
            return Err(format!("user {} is not a salon owner", seed.owner_phone).into());
        }

        let salon = salons.create(owner.id, &seed.salon).await?;
        info!(salon_id = %salon.id, name = %salon.name, "Salon created");

        for service in &seed.services {
            services.create(salon.id, service).await?;
            service_count += 1;
        }
        for member in &seed.staff {
            let created = staff_repo.create(salon.id, &member.staff).await?;
            staff_repo.replace_shifts(created.id, &member.shifts).await?;
            staff_count += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Salons: {}", file.salons.len());
    info!("  Services: {service_count}");
    info!("  Staff: {staff_count}");
    Ok(())
}
