//! dyson-exporter - Prometheus exporter for Dyson air purifiers
//!
//! Polls a device gateway for Dyson Pure Cool / Hot+Cool state on a fixed
//! interval and serves the latest readings on `/metrics`.
//!
//! - [`device`] - `DeviceClient` trait and the HTTP gateway adapter
//! - [`poller`] - interval-driven state collection
//! - [`metrics`] - registry, exposition format and Dyson state translation
//! - [`api`] - axum routes for `/metrics` and `/health`
//! - [`config`] - INI configuration
//! - [`error`] - error types

pub mod api;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod metrics;
pub mod poller;
pub mod shutdown;

pub use crate::config::Config;
pub use crate::error::{ExporterError, Result};
