pub mod config;
pub mod failover;
pub mod handlers;
pub mod queue;
pub mod scheduler;
pub mod state;

pub use scheduler::{Coordinator, ReportEffect};
pub use state::AppState;
