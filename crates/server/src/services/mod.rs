//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Phone + password registration and login (argon2)
//! - `availability` - Open appointment slots from salon hours, shifts and bookings
//! - `booking` - Reservation lifecycle with overlap protection
//! - `catalog` - Salons, services, staff and shifts
//! - `notification` - In-app notifications
//! - `payment` - VietQR and cash payments, confirmation poll and watchers
//!
//! Services borrow the pool (and config where needed) for the duration of one
//! request; handlers construct them on the fly from `AppState`.

pub mod auth;
pub mod availability;
pub mod booking;
pub mod catalog;
pub mod notification;
pub mod payment;
