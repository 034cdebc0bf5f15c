//! Client library for the Gather event service: typed domain operations
//! and a disk-persisted session over a bearer-token HTTP client. The
//! `gather` binary drives this from a REPL; tests drive it directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod events;
pub mod format;
pub mod session;
pub mod types;
pub mod validate;

pub use api::{ApiClient, ApiError, TokenCell};
pub use session::{SessionState, SessionStore};
pub use types::{Attendee, Event, EventInput, User};
