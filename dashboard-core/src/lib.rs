//! Core library for the weather dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather client with its time-windowed response cache
//! - Shared domain models (weather records, dashboard results)
//!
//! It is used by `dashboard-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{Clock, SystemClock, WeatherCache};
pub use client::WeatherClient;
pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use model::{CacheStats, DashboardWeather, WeatherRecord, DASHBOARD_CITIES};
