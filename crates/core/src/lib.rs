//! Barberly Core - Shared types library.
//!
//! This crate provides common types used across all Barberly components:
//! - `server` - REST backend consumed by the customer app and the salon dashboards
//! - `cli` - Command-line tools for migrations, seeding and payment watching
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, phone numbers, and statuses
//! - [`schedule`] - Time-slot arithmetic for salon opening hours and staff shifts
//! - [`vietqr`] - VietQR bank-transfer payload encoding

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod schedule;
pub mod types;
pub mod vietqr;

pub use types::*;
