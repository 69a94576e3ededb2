//! Loop del worker: pide tareas, las ejecuta y reporta el resultado.
//!
//! El worker no guarda estado entre tareas. Si el coordinator lo da por
//! muerto (lease vencido) y reasigna su tarea, el worker sigue igual: su
//! reporte tardío se ignora y lo que escribió se reemplaza por rename.

use std::{fs, future::Future, time::Duration};

use anyhow::Context;
use common::{
    app::Application,
    store::partition_for,
    IntermediateStore, KeyValue, ReportTaskRequest, TaskAssignment, TaskId, TaskOutcome,
    WorkerId,
};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::rpc::CoordinatorRpc;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// El coordinator no respondió después de todos los intentos.
    #[error("{call} falló {attempts} veces seguidas: {cause:#}")]
    Rpc {
        call: &'static str,
        attempts: u32,
        cause: anyhow::Error,
    },
    /// Falló un paso local de la tarea; se reporta como FAILURE.
    #[error("la tarea {task_id} falló: {cause:#}")]
    Execution {
        task_id: TaskId,
        cause: anyhow::Error,
    },
}

/// Lo que hizo un worker hasta recibir NONE.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub maps: u32,
    pub reduces: u32,
    pub failures: u32,
    pub waits: u32,
}

pub struct Worker<R> {
    id: WorkerId,
    rpc: R,
    store: IntermediateStore,
    app: Application,
    backoff: Duration,
    rpc_retries: u32,
}

impl<R: CoordinatorRpc> Worker<R> {
    pub fn new(
        id: impl Into<WorkerId>,
        rpc: R,
        store: IntermediateStore,
        app: Application,
    ) -> Self {
        Self {
            id: id.into(),
            rpc,
            store,
            app,
            backoff: Duration::from_secs(1),
            rpc_retries: 3,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_rpc_retries(mut self, retries: u32) -> Self {
        self.rpc_retries = retries.max(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Corre hasta que el coordinator responde NONE (`Ok`) o deja de
    /// responder (`Err(WorkerError::Rpc)`).
    pub async fn run(&self) -> Result<WorkerStats, WorkerError> {
        info!("worker {} arrancando (app={})", self.id, self.app.name);
        let mut stats = WorkerStats::default();

        loop {
            let assignment = self
                .with_retries("GetTask", || self.rpc.get_task(&self.id))
                .await?;

            let (task_id, result) = match assignment {
                TaskAssignment::None => {
                    info!(
                        "worker {} sin más trabajo: {} map, {} reduce, {} fallos",
                        self.id, stats.maps, stats.reduces, stats.failures
                    );
                    return Ok(stats);
                }
                TaskAssignment::Wait => {
                    stats.waits += 1;
                    debug!("nada asignable, esperando {:?}", self.backoff);
                    sleep(self.backoff).await;
                    continue;
                }
                TaskAssignment::Map {
                    task_id,
                    input_file,
                    n_reduce,
                } => {
                    info!("map {} sobre {}", task_id, input_file);
                    let result = self.run_map(&task_id, input_file, n_reduce).await;
                    if result.is_ok() {
                        stats.maps += 1;
                    }
                    (task_id, result)
                }
                TaskAssignment::Reduce {
                    task_id, partition, ..
                } => {
                    info!("reduce {} de la partición {}", task_id, partition);
                    let result = self.run_reduce(&task_id, partition).await;
                    if result.is_ok() {
                        stats.reduces += 1;
                    }
                    (task_id, result)
                }
            };

            let outcome = match result {
                Ok(records) => {
                    debug!("tarea {} terminada ({} registros)", task_id, records);
                    TaskOutcome::Success
                }
                Err(e) => {
                    warn!("{}", e);
                    stats.failures += 1;
                    TaskOutcome::Failure
                }
            };

            let report = ReportTaskRequest {
                worker_id: self.id.clone(),
                task_id,
                outcome,
            };
            self.with_retries("ReportTask", || self.rpc.report_task(&report))
                .await?;
        }
    }

    async fn run_map(
        &self,
        task_id: &str,
        input_file: String,
        n_reduce: u32,
    ) -> Result<usize, WorkerError> {
        let store = self.store.clone();
        let app = self.app;
        let producer = task_id.to_string();

        // lectura, map y escrituras son bloqueantes
        let handle = tokio::task::spawn_blocking(move || {
            execute_map(&store, app, &producer, &input_file, n_reduce)
        });
        flatten(task_id, handle.await)
    }

    async fn run_reduce(&self, task_id: &str, partition: u32) -> Result<usize, WorkerError> {
        let store = self.store.clone();
        let app = self.app;

        let handle =
            tokio::task::spawn_blocking(move || execute_reduce(&store, app, partition));
        flatten(task_id, handle.await)
    }

    /// Reintenta `call` hasta `rpc_retries` veces, esperando `backoff` entre intentos.
    async fn with_retries<T, F, Fut>(&self, call: &'static str, mut f: F) -> Result<T, WorkerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let attempts = self.rpc_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(cause) if attempt >= attempts => {
                    return Err(WorkerError::Rpc {
                        call,
                        attempts,
                        cause,
                    })
                }
                Err(e) => {
                    warn!("{} falló (intento {}/{}): {:#}", call, attempt, attempts, e);
                    sleep(self.backoff).await;
                }
            }
        }
    }
}

fn flatten(
    task_id: &str,
    joined: Result<anyhow::Result<usize>, tokio::task::JoinError>,
) -> Result<usize, WorkerError> {
    joined
        .context("el hilo de la tarea terminó con pánico")
        .and_then(|r| r)
        .map_err(|cause| WorkerError::Execution {
            task_id: task_id.to_string(),
            cause,
        })
}

/// Ejecuta una tarea map completa: lee `input_file`, aplica la función map
/// y publica un segmento por cada partición que recibió registros.
/// Devuelve cuántos registros emitió.
pub fn execute_map(
    store: &IntermediateStore,
    app: Application,
    task_id: &str,
    input_file: &str,
    n_reduce: u32,
) -> anyhow::Result<usize> {
    let n_reduce = n_reduce.max(1);
    let contents = fs::read_to_string(input_file)
        .with_context(|| format!("no se pudo leer {}", input_file))?;

    let records = (app.map_fn)(input_file, &contents);
    let emitted = records.len();

    let mut buckets: Vec<Vec<KeyValue>> = vec![Vec::new(); n_reduce as usize];
    for kv in records {
        let p = partition_for(&kv.key, n_reduce) as usize;
        buckets[p].push(kv);
    }

    for (p, bucket) in buckets.iter().enumerate() {
        if bucket.is_empty() {
            continue;
        }
        store
            .append_to_partition(p as u32, task_id, bucket)
            .with_context(|| format!("no se pudo escribir la partición {}", p))?;
    }

    Ok(emitted)
}

/// Ejecuta una tarea reduce: lee la partición entera, agrupa por clave en
/// orden y escribe `"<clave> <valor>"` por línea en `mr-out-<partition>`.
/// Devuelve cuántas claves escribió.
pub fn execute_reduce(
    store: &IntermediateStore,
    app: Application,
    partition: u32,
) -> anyhow::Result<usize> {
    let mut records = store
        .read_partition(partition)
        .with_context(|| format!("no se pudo leer la partición {}", partition))?;

    // estable: los valores de una misma clave conservan su orden
    records.sort_by(|a, b| a.key.cmp(&b.key));

    let lines: Vec<String> = records
        .chunk_by(|a, b| a.key == b.key)
        .map(|group| {
            let key = &group[0].key;
            let values: Vec<String> = group.iter().map(|kv| kv.value.clone()).collect();
            format!("{} {}", key, (app.reduce_fn)(key, &values))
        })
        .collect();

    store
        .write_output(partition, &lines)
        .with_context(|| format!("no se pudo escribir la salida de la partición {}", partition))?;

    Ok(lines.len())
}
