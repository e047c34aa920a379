//! # Receiving Common Library
//!
//! Shared code for the warehouse receiving services including:
//! - Error types
//! - Event types (RecvEvent enum) and EventBus
//! - Notification port (Notifier)
//! - Configuration loading
//! - SSE utilities

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{BusNotifier, EventBus, MemoryNotifier, Notifier, RecvEvent, Severity};
