//! AI-to-human hand-off coordination
//!
//! Picks an available agent through a pluggable selection strategy,
//! mutates the visitor row, writes the durable hand-off audit trail and
//! fans the assignment out over the realtime channels. Transfers are
//! best-effort, not transactional: the visitor update is the commit
//! point and everything after it is audit or notification.

pub mod handlers;
pub mod plugin;
pub mod selector;
pub mod services;

pub use plugin::HandoffPlugin;
pub use selector::{AgentSelector, MostRecentlySeenSelector};
pub use services::{HandoffError, HandoffService, TransferOutcome};
