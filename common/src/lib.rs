//! Tipos compartidos entre coordinator, workers y cliente: modelo de tareas,
//! mensajes RPC, almacenamiento intermedio y aplicaciones map/reduce.

pub mod app;
pub mod indexer;
pub mod job;
pub mod rpc;
pub mod store;
pub mod task;
pub mod wordcount;

pub use job::{JobPhase, JobStatus, TaskCounts};
pub use rpc::{
    GetTaskRequest, ReportTaskRequest, ReportTaskResponse, TaskAssignment, TaskOutcome, WorkerId,
};
pub use store::{IntermediateStore, KeyValue};
pub use task::{Task, TaskId, TaskInput, TaskKind, TaskState};
