//! Public HTTP surface for the gateway (§4.I / §6): classifies the caller's
//! API key, resolves the target model, and hands the request to the format
//! bridge and tool orchestrator one layer down. Carries no business logic of
//! its own beyond that wiring.

pub mod auth;
pub mod error;
pub mod invoker;
pub mod routes;
pub mod state;

pub use error::{AppError, Result};
pub use routes::configure_routes;
pub use state::AppState;
