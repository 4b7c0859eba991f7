//! # caja-server: HTTP API for Caja POS
//!
//! Thin axum layer over `caja-db`.
//!
//! ```text
//! request ──► routes ──► dto ──► SaleProcessor / repositories ──► SQLite
//!                │
//!                └── ApiError ──► { code, message } + status
//! ```
//!
//! - [`config`] - Layered server configuration
//! - [`routes`] - Router and handlers
//! - [`dto`] - JSON request and response bodies
//! - [`error`] - Error to status mapping
//! - [`state`] - Shared handler state

pub mod config;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
