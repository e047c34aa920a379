//! HTTP API handlers for recv-engine

pub mod capture;
pub mod health;
pub mod ledger;
pub mod session;
pub mod sse;

pub use capture::capture_routes;
pub use health::health_routes;
pub use ledger::ledger_routes;
pub use session::session_routes;
pub use sse::event_stream;
