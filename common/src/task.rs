use serde::{Deserialize, Serialize};

use crate::rpc::TaskAssignment;

pub type TaskId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Map,
    Reduce,
}

/// Estado de una tarea visto desde fuera del coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Idle,
    InProgress,
    Completed,
}

/// Qué tiene que leer la tarea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskInput {
    /// Archivo de entrada de una tarea map.
    File(String),
    /// Partición intermedia que consume una tarea reduce, en `[0, n_reduce)`.
    Partition(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub input: TaskInput,
}

impl Task {
    pub fn map(input_file: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input: TaskInput::File(input_file.into()),
        }
    }

    pub fn reduce(partition: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            input: TaskInput::Partition(partition),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self.input {
            TaskInput::File(_) => TaskKind::Map,
            TaskInput::Partition(_) => TaskKind::Reduce,
        }
    }

    /// Nombre del archivo para map, índice de partición para reduce.
    pub fn input_ref(&self) -> String {
        match &self.input {
            TaskInput::File(name) => name.clone(),
            TaskInput::Partition(p) => p.to_string(),
        }
    }

    /// Descriptor que se le manda al worker.
    pub fn assignment(&self, n_reduce: u32) -> TaskAssignment {
        match &self.input {
            TaskInput::File(name) => TaskAssignment::Map {
                task_id: self.id.clone(),
                input_file: name.clone(),
                n_reduce,
            },
            TaskInput::Partition(p) => TaskAssignment::Reduce {
                task_id: self.id.clone(),
                partition: *p,
                n_reduce,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Task::map("a.txt");
        let b = Task::map("a.txt");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn assignment_carries_kind_input_and_n_reduce() {
        let t = Task::map("pg-1.txt");
        assert_eq!(t.kind(), TaskKind::Map);
        assert_eq!(
            t.assignment(3),
            TaskAssignment::Map {
                task_id: t.id.clone(),
                input_file: "pg-1.txt".to_string(),
                n_reduce: 3,
            }
        );

        let r = Task::reduce(2);
        assert_eq!(r.kind(), TaskKind::Reduce);
        assert_eq!(r.input_ref(), "2");
        assert_eq!(
            r.assignment(3),
            TaskAssignment::Reduce {
                task_id: r.id.clone(),
                partition: 2,
                n_reduce: 3,
            }
        );
    }
}
