//! Barberly server library.
//!
//! REST backend for salon discovery, appointment booking and VietQR payments.
//! Exposed as a library so the CLI and the integration tests reuse the same
//! configuration, repositories and services as the HTTP binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod bank;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
