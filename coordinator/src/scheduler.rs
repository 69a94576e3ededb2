//! Máquina de estados del coordinator.
//!
//! Todas las operaciones son síncronas, sin I/O, y reciben `now` desde
//! afuera; quien la comparta entre handlers tiene que serializar el acceso
//! (ver [`crate::state::AppState`]).

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use common::{
    JobPhase, JobStatus, Task, TaskAssignment, TaskCounts, TaskId, TaskKind, TaskOutcome,
    TaskState, WorkerId,
};
use tracing::{debug, info, warn};

use crate::queue::TaskQueue;

/// Tope del lease. Más allá de esto `now + lease` puede desbordar `Instant`.
pub const MAX_LEASE: Duration = Duration::from_secs(24 * 60 * 60);

/// Estado de una tarea dentro del coordinator.
///
/// Transiciones válidas: Idle -> InProgress -> Completed, o InProgress -> Idle
/// (lease vencido o fallo reportado). Completed es terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSlot {
    Idle,
    InProgress {
        worker_id: WorkerId,
        lease_expiry: Instant,
    },
    /// `worker_id` es quien completó la tarea.
    Completed { worker_id: WorkerId },
}

impl TaskSlot {
    pub fn state(&self) -> TaskState {
        match self {
            TaskSlot::Idle => TaskState::Idle,
            TaskSlot::InProgress { .. } => TaskState::InProgress,
            TaskSlot::Completed { .. } => TaskState::Completed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub task: Task,
    pub slot: TaskSlot,
    /// Cuántas veces se entregó a algún worker.
    pub attempts: u32,
}

/// Qué hizo un ReportTask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportEffect {
    Completed,
    Requeued,
    /// El reporte no corresponde a la asignación vigente.
    Ignored,
}

#[derive(Debug)]
pub struct Coordinator {
    n_reduce: u32,
    lease: Duration,
    phase: JobPhase,

    tasks: HashMap<TaskId, TaskEntry>,
    // orden de creación, para recorridos deterministas
    map_ids: Vec<TaskId>,
    reduce_ids: Vec<TaskId>,
    queue: TaskQueue<TaskId>,

    lease_expirations: u64,
    failure_reports: u64,
    stale_reports: u64,
    submitted_at: DateTime<Utc>,
    reducing_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Coordinator {
    /// Crea el job con una tarea map por archivo. Las tareas reduce no
    /// existen hasta que terminan todos los map. El lease se recorta a
    /// [`MAX_LEASE`].
    pub fn new<I, S>(input_files: I, n_reduce: u32, lease: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lease = lease.min(MAX_LEASE);
        let mut coordinator = Self {
            n_reduce: n_reduce.max(1),
            lease,
            phase: JobPhase::Mapping,
            tasks: HashMap::new(),
            map_ids: Vec::new(),
            reduce_ids: Vec::new(),
            queue: TaskQueue::new(),
            lease_expirations: 0,
            failure_reports: 0,
            stale_reports: 0,
            submitted_at: Utc::now(),
            reducing_at: None,
            finished_at: None,
        };

        for file in input_files {
            coordinator.insert(Task::map(file));
        }

        info!(
            map_tasks = coordinator.map_ids.len(),
            n_reduce = coordinator.n_reduce,
            lease_ms = lease.as_millis() as u64,
            "job creado"
        );
        coordinator
    }

    pub fn n_reduce(&self) -> u32 {
        self.n_reduce
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn done(&self) -> bool {
        self.phase == JobPhase::Done
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskEntry> {
        self.tasks.get(task_id)
    }

    /// Tareas de un tipo en orden de creación.
    pub fn tasks_of(&self, kind: TaskKind) -> impl Iterator<Item = &TaskEntry> + '_ {
        let ids = match kind {
            TaskKind::Map => &self.map_ids,
            TaskKind::Reduce => &self.reduce_ids,
        };
        ids.iter().filter_map(|id| self.tasks.get(id))
    }

    /// GetTask: entrega la próxima tarea Idle (FIFO) a `worker_id`.
    ///
    /// Si no hay ninguna, primero recupera las tareas con lease vencido y
    /// después intenta avanzar de fase. Devuelve `Wait` si queda trabajo en
    /// curso y `None` cuando el job terminó.
    pub fn get_task(&mut self, worker_id: &str, now: Instant) -> TaskAssignment {
        loop {
            if let Some(assignment) = self.assign_next(worker_id, now) {
                return assignment;
            }
            if self.expire_leases(now) > 0 {
                continue;
            }
            if self.advance_phase() {
                continue;
            }
            return match self.phase {
                JobPhase::Done => TaskAssignment::None,
                JobPhase::Mapping | JobPhase::Reducing => {
                    debug!(worker_id, "nada asignable por ahora");
                    TaskAssignment::Wait
                }
            };
        }
    }

    /// ReportTask: sólo tiene efecto si la tarea está InProgress para este
    /// mismo worker. Cualquier otro reporte (duplicado, de un worker cuyo
    /// lease venció, de una tarea desconocida) se acepta y se ignora.
    pub fn report_task(
        &mut self,
        worker_id: &str,
        task_id: &str,
        outcome: TaskOutcome,
    ) -> ReportEffect {
        let is_holder = matches!(
            self.tasks.get(task_id).map(|e| &e.slot),
            Some(TaskSlot::InProgress { worker_id: holder, .. }) if holder == worker_id
        );
        if !is_holder {
            self.stale_reports += 1;
            debug!(task_id, worker_id, ?outcome, "reporte viejo o duplicado, se ignora");
            return ReportEffect::Ignored;
        }

        let Some(entry) = self.tasks.get_mut(task_id) else {
            return ReportEffect::Ignored;
        };

        match outcome {
            TaskOutcome::Success => {
                entry.slot = TaskSlot::Completed {
                    worker_id: worker_id.to_string(),
                };
                info!(task_id, worker_id, kind = ?entry.task.kind(), "tarea completada");
                self.advance_phase();
                ReportEffect::Completed
            }
            TaskOutcome::Failure => {
                entry.slot = TaskSlot::Idle;
                self.queue.push(task_id.to_string());
                self.failure_reports += 1;
                warn!(task_id, worker_id, "el worker reportó fallo, re-encolando");
                ReportEffect::Requeued
            }
        }
    }

    /// Devuelve a Idle (y a la cola) toda tarea InProgress cuyo lease venció
    /// antes de `now`. La asignación anterior no se cancela, sólo se abandona.
    pub fn expire_leases(&mut self, now: Instant) -> usize {
        let mut expired: Vec<(TaskId, WorkerId)> = Vec::new();
        for id in self.map_ids.iter().chain(self.reduce_ids.iter()) {
            if let Some(TaskEntry {
                slot:
                    TaskSlot::InProgress {
                        worker_id,
                        lease_expiry,
                    },
                ..
            }) = self.tasks.get(id)
            {
                if now > *lease_expiry {
                    expired.push((id.clone(), worker_id.clone()));
                }
            }
        }

        for (id, worker_id) in &expired {
            if let Some(entry) = self.tasks.get_mut(id) {
                entry.slot = TaskSlot::Idle;
            }
            self.queue.push(id.clone());
            self.lease_expirations += 1;
            warn!(task_id = %id, worker_id = %worker_id, "lease vencido, la tarea vuelve a Idle");
        }

        expired.len()
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            phase: self.phase,
            done: self.done(),
            n_reduce: self.n_reduce,
            map_tasks: self.counts(&self.map_ids),
            reduce_tasks: self.counts(&self.reduce_ids),
            lease_expirations: self.lease_expirations,
            failure_reports: self.failure_reports,
            stale_reports: self.stale_reports,
            submitted_at: self.submitted_at,
            reducing_at: self.reducing_at,
            finished_at: self.finished_at,
        }
    }

    fn insert(&mut self, task: Task) {
        let id = task.id.clone();
        match task.kind() {
            TaskKind::Map => self.map_ids.push(id.clone()),
            TaskKind::Reduce => self.reduce_ids.push(id.clone()),
        }
        self.queue.push(id.clone());
        self.tasks.insert(
            id,
            TaskEntry {
                task,
                slot: TaskSlot::Idle,
                attempts: 0,
            },
        );
    }

    fn assign_next(&mut self, worker_id: &str, now: Instant) -> Option<TaskAssignment> {
        while let Some(task_id) = self.queue.pop() {
            let Some(entry) = self.tasks.get_mut(&task_id) else {
                continue;
            };
            // sólo tareas Idle viven en la cola
            if !matches!(entry.slot, TaskSlot::Idle) {
                continue;
            }

            entry.slot = TaskSlot::InProgress {
                worker_id: worker_id.to_string(),
                lease_expiry: now.checked_add(self.lease).unwrap_or(now),
            };
            entry.attempts += 1;

            info!(
                task_id = %task_id,
                kind = ?entry.task.kind(),
                input = %entry.task.input_ref(),
                worker_id,
                attempt = entry.attempts,
                "asignando tarea"
            );
            return Some(entry.task.assignment(self.n_reduce));
        }
        None
    }

    /// Mapping -> Reducing cuando todos los map están completos (crea las
    /// `n_reduce` tareas reduce), Reducing -> Done cuando lo están todos los
    /// reduce. Devuelve true si se crearon tareas nuevas.
    fn advance_phase(&mut self) -> bool {
        let phase = self.phase;
        match phase {
            JobPhase::Mapping if self.all_completed(&self.map_ids) => {
                for partition in 0..self.n_reduce {
                    self.insert(Task::reduce(partition));
                }
                self.phase = JobPhase::Reducing;
                self.reducing_at = Some(Utc::now());
                info!(n_reduce = self.n_reduce, "todos los map completos, arranca la fase reduce");
                true
            }
            JobPhase::Reducing if self.all_completed(&self.reduce_ids) => {
                self.phase = JobPhase::Done;
                self.finished_at = Some(Utc::now());
                info!("todas las tareas reduce completas, job terminado");
                false
            }
            _ => false,
        }
    }

    fn all_completed(&self, ids: &[TaskId]) -> bool {
        ids.iter().all(|id| {
            self.tasks
                .get(id)
                .map(|e| matches!(e.slot, TaskSlot::Completed { .. }))
                .unwrap_or(false)
        })
    }

    fn counts(&self, ids: &[TaskId]) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for entry in ids.iter().filter_map(|id| self.tasks.get(id)) {
            match entry.slot.state() {
                TaskState::Idle => counts.idle += 1,
                TaskState::InProgress => counts.in_progress += 1,
                TaskState::Completed => counts.completed += 1,
            }
        }
        counts
    }
}
