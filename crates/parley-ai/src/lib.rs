//! AI auto-response gate
//!
//! Answers widget chat messages with an AI engine when the tenant has AI
//! enabled and a credential is configured, and hands the chat to a human
//! agent when the engine signals a transfer. The engine sits behind a
//! trait with a timeout at the call boundary; engine trouble degrades to
//! a fallback reply, never to a server error.

pub mod engine;
pub mod handlers;
pub mod plugin;
pub mod services;

pub use engine::{AiEngine, AiEngineError, AiReply, AiRequest, OpenAiChatEngine};
pub use plugin::AiPlugin;
pub use services::{AiChatReply, AiGateError, AiGateService, AiReplyType};
