use anyhow::{Context, Result};
use common::{app, IntermediateStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use worker::{HttpCoordinator, Worker, WorkerConfig, WorkerError};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("worker=debug,reqwest=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = WorkerConfig::from_env();
    let application = app::named(&config.app)?;

    // identidad efímera: sólo vale mientras dura el proceso
    let host = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let worker_id = format!("{}-{}", host, Uuid::new_v4());

    let rpc = HttpCoordinator::new(&config.master_url, config.rpc_timeout)
        .context("configuración de MASTER_URL inválida")?;
    info!(
        "worker {} contra {} (datos en {})",
        worker_id,
        rpc.base_url(),
        config.data_dir.display()
    );

    let worker = Worker::new(
        worker_id,
        rpc,
        IntermediateStore::new(&config.data_dir),
        application,
    )
    .with_backoff(config.backoff)
    .with_rpc_retries(config.rpc_retries);

    match worker.run().await {
        Ok(stats) => {
            info!(
                "worker {} terminó: {} map, {} reduce, {} fallos",
                worker.id(),
                stats.maps,
                stats.reduces,
                stats.failures
            );
            Ok(())
        }
        // el coordinator se fue: el job terminó o murió, en ambos casos salimos
        Err(e @ WorkerError::Rpc { .. }) => {
            warn!("coordinator inalcanzable, saliendo: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
