use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Mapping,
    Reducing,
    Done,
}

/// Conteo de tareas por estado para una de las dos fases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub idle: u32,
    pub in_progress: u32,
    pub completed: u32,
}

impl TaskCounts {
    pub fn total(&self) -> u32 {
        self.idle + self.in_progress + self.completed
    }
}

/// Foto del job que expone el coordinator en `GET /api/v1/job`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub phase: JobPhase,
    pub done: bool,
    pub n_reduce: u32,

    pub map_tasks: TaskCounts,
    /// Vacío hasta que arranca la fase reduce.
    pub reduce_tasks: TaskCounts,

    /// -------- Métricas del job --------
    pub lease_expirations: u64,
    pub failure_reports: u64,
    pub stale_reports: u64,

    pub submitted_at: DateTime<Utc>,
    pub reducing_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
