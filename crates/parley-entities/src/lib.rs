//! Database entities for the Parley application

pub mod agent_brands;
pub mod agents;
pub mod brands;
pub mod handoff_events;
pub mod system_settings;
pub mod tenants;
pub mod types;
pub mod visitor_messages;
pub mod visitors;
pub mod widget_settings;

pub use types::*;
