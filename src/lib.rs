//! Relay that accepts image and chat requests, forwards them to one of several
//! AI providers and normalizes what comes back.

pub mod api;
pub mod config;
pub mod connectors;
pub mod core;
pub mod metrics;
pub mod observability;
pub mod registry;
pub mod routing;

pub use api::router;
pub use config::AppConfig;
pub use routing::AppState;
