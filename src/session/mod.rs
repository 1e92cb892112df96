//! Voice-interaction session state machine

mod controller;
mod state;

pub use controller::{SessionController, SessionHandle};
pub use state::{Phase, SessionConfig, SessionState};
