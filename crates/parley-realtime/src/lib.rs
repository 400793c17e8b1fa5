//! Realtime notification fan-out
//!
//! State transitions are pushed to three logical channel kinds: a
//! per-tenant broadcast for agent dashboards, a per-visitor channel for
//! the originating widget, and a per-agent channel for direct assignment
//! alerts. Emission is fire-and-forget; persisted rows remain the source
//! of truth and reconnecting clients re-fetch state over the CRUD API.

pub mod events;
pub mod handlers;
pub mod notifier;
pub mod plugin;
pub mod testing;

pub use events::{AgentProfile, ChatEvent};
pub use notifier::{ChannelNotifier, Notifier};
pub use plugin::RealtimePlugin;
