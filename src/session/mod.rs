//! Vehicle session management
//!
//! One [`SessionManager`] owns at most one live vehicle session and runs
//! every operation of the command surface against it.

mod manager;
mod state;

pub use manager::SessionManager;
pub use state::Session;
