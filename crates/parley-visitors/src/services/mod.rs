pub mod session_service;
pub mod visitor_service;

pub use session_service::SessionService;
pub use visitor_service::{VisitorError, VisitorService};
