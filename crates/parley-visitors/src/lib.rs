//! Visitor session tracking
//!
//! Owns the durable visitor row and its message log: widget-side
//! upsert/activity/status/typing/message/rating/end-chat operations and
//! the dashboard read surface. Visitor rows are mutated by several
//! independent call paths with per-field last-write-wins semantics.

pub mod handlers;
pub mod plugin;
pub mod services;
pub mod types;

pub use plugin::VisitorsPlugin;
pub use services::{SessionService, VisitorError, VisitorService};
