//! Configuration and session state
//!
//! Process settings come from a user-editable JSON file; mutable session
//! state (tokens, membership ids) lives in a separate state file that is
//! written through on every mutation.

pub mod session;
pub mod settings;

pub use session::{Session, SessionError, TokenBundle};
pub use settings::Settings;
