//! Widget and system settings stores
//!
//! The AI response gate consults both: per-tenant widget configuration
//! (`ai_enabled`) and the system-wide AI credential.

pub mod handlers;
pub mod plugin;
pub mod services;

pub use plugin::SettingsPlugin;
pub use services::{
    AiCredentials, SettingsError, SystemSettingsService, WidgetSettingsService, WidgetSettingsView,
};
