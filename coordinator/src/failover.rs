use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info};

use crate::state::AppState;

/// Loop de tolerancia a fallos: cada `every` devuelve a Idle las tareas
/// cuyo lease venció, aunque ningún worker esté pidiendo trabajo.
/// Termina cuando el job está completo.
pub async fn run_failover_loop(state: AppState, every: Duration) {
    loop {
        sleep(every).await;

        let done = state.coordinator().done();
        if done {
            debug!("job terminado, se detiene el failover loop");
            return;
        }

        let expired = sweep_once(&state, Instant::now());
        if expired > 0 {
            info!("failover: {} tareas con lease vencido vuelven a la cola", expired);
        }
    }
}

/// Una pasada de chequeo bajo el mismo lock que usan los handlers.
pub fn sweep_once(state: &AppState, now: Instant) -> usize {
    state.coordinator().expire_leases(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Coordinator;
    use common::{TaskAssignment, TaskState};

    #[test]
    fn sweep_once_requeues_expired_tasks() {
        let lease = Duration::from_secs(5);
        let state = AppState::new(Coordinator::new(["a.txt", "b.txt"], 1, lease));
        let t0 = Instant::now();

        let id = {
            let mut c = state.coordinator();
            let a = c.get_task("w1", t0);
            a.task_id().unwrap().clone()
        };

        assert_eq!(sweep_once(&state, t0 + Duration::from_secs(1)), 0);
        assert_eq!(sweep_once(&state, t0 + lease * 2), 1);
        assert_eq!(
            state.coordinator().task(&id).unwrap().slot.state(),
            TaskState::Idle
        );
        assert_eq!(state.coordinator().status().lease_expirations, 1);
    }

    #[tokio::test]
    async fn failover_loop_frees_abandoned_task() {
        let state = AppState::new(Coordinator::new(["a.txt"], 1, Duration::from_millis(20)));
        let first = state.coordinator().get_task("muerto", Instant::now());
        assert!(matches!(first, TaskAssignment::Map { .. }));

        let handle = tokio::spawn(run_failover_loop(state.clone(), Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(state.coordinator().status().map_tasks.idle, 1);
        handle.abort();
    }
}
