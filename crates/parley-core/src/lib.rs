//! Core utilities and types shared across all Parley crates

pub mod error;
pub mod plugin;
pub mod problem;
pub mod types;
pub mod widget_token;

pub use error::*;
pub use problem::{ErrorBuilder, Problem};
pub use types::*;
pub use widget_token::{WidgetClaims, WidgetSession, WidgetTokenError, WidgetTokenService};

// Re-export external dependencies so downstream crates share one version
pub use anyhow;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
pub use uuid;
