pub mod config;
pub mod rpc;
pub mod worker;

pub use config::WorkerConfig;
pub use rpc::{CoordinatorRpc, HttpCoordinator};
pub use worker::{Worker, WorkerError, WorkerStats};
