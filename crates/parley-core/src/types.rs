//! Canonical datetime aliases used across all Parley crates

use chrono::{DateTime, Utc};

/// Database DateTime type for TIMESTAMPTZ columns
pub type DBDateTime = DateTime<Utc>;

/// Standard UTC DateTime type for API responses
///
/// Serializes as ISO 8601 with timezone suffix. When used with utoipa,
/// annotate the field:
/// ```rust
/// # use parley_core::UtcDateTime;
/// # use serde::Serialize;
/// # use utoipa::ToSchema;
/// #[derive(Serialize, ToSchema)]
/// pub struct Response {
///     #[schema(value_type = String, format = DateTime)]
///     pub created_at: UtcDateTime,
/// }
/// ```
pub type UtcDateTime = DateTime<Utc>;
