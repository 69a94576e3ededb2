//! Mensajes que intercambian workers y coordinator.
//!
//! Van como JSON sobre HTTP: `POST` a [`GET_TASK_PATH`] y [`REPORT_TASK_PATH`].

use serde::{Deserialize, Serialize};

use crate::task::TaskId;

pub type WorkerId = String;

pub const GET_TASK_PATH: &str = "/api/v1/tasks/next";
pub const REPORT_TASK_PATH: &str = "/api/v1/tasks/report";
pub const JOB_STATUS_PATH: &str = "/api/v1/job";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskRequest {
    pub worker_id: WorkerId,
}

/// Respuesta a GetTask.
///
/// `Wait` significa que todavía hay trabajo pendiente pero nada asignable
/// ahora mismo; `None` que el job terminó y el worker debe salir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAssignment {
    Map {
        task_id: TaskId,
        input_file: String,
        n_reduce: u32,
    },
    Reduce {
        task_id: TaskId,
        partition: u32,
        n_reduce: u32,
    },
    Wait,
    None,
}

impl TaskAssignment {
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            TaskAssignment::Map { task_id, .. } | TaskAssignment::Reduce { task_id, .. } => {
                Some(task_id)
            }
            TaskAssignment::Wait | TaskAssignment::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTaskRequest {
    pub worker_id: WorkerId,
    pub task_id: TaskId,
    pub outcome: TaskOutcome,
}

/// Siempre `ok = true`: los reportes viejos o duplicados se aceptan sin efecto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTaskResponse {
    pub ok: bool,
}
