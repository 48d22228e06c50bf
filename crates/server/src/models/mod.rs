//! Domain models for the booking platform.
//!
//! Row types derive `sqlx::FromRow` and serialize directly as API responses.
//! Request payloads live next to the route handlers that accept them.

pub mod booking;
pub mod notification;
pub mod payment;
pub mod salon;
pub mod session;
pub mod user;

pub use booking::{Booking, BookingDetail, BookingLine};
pub use notification::Notification;
pub use payment::{Payment, PaymentView, QrPaymentDescriptor};
pub use salon::{Salon, Service, Staff, StaffShift};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
