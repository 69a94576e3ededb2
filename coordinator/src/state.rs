// coordinator/src/state.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::scheduler::Coordinator;

/// Estado compartido entre handlers HTTP y el loop de failover.
///
/// Todo el estado del job vive detrás de un único `Mutex`: cada GetTask,
/// ReportTask o barrida de leases lo toma entero, así que las secuencias
/// leer-chequear-actuar del scheduler nunca se intercalan. Nunca se hace I/O
/// ni `.await` con el lock tomado.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<Mutex<Coordinator>>,
}

impl AppState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
        }
    }

    pub fn coordinator(&self) -> MutexGuard<'_, Coordinator> {
        // las operaciones del scheduler no dejan invariantes a medias
        self.coordinator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
