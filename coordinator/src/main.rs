use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use common::IntermediateStore;
use tokio::{net::TcpListener, time::sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coordinator::{
    config::{CoordinatorArgs, CoordinatorConfig},
    failover, handlers, AppState, Coordinator,
};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coordinator=debug,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = CoordinatorConfig::from_args(CoordinatorArgs::parse())?;

    // datos intermedios de un job anterior confundirían a los reduce
    let store = IntermediateStore::new(&config.data_dir);
    store
        .reset()
        .with_context(|| format!("no se pudo limpiar {}", store.root().display()))?;

    let state = AppState::new(Coordinator::new(
        config.inputs.iter().cloned(),
        config.n_reduce,
        config.lease,
    ));

    // barrida de leases vencidos en segundo plano
    tokio::spawn(failover::run_failover_loop(
        state.clone(),
        config.sweep_interval,
    ));

    let app = handlers::build_router(state.clone());
    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", config.listen))?;
    info!(
        "coordinator escuchando en {} ({} archivos, n_reduce={})",
        listener.local_addr()?,
        config.inputs.len(),
        config.n_reduce
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state, config.linger))
        .await?;

    info!("coordinator terminado");
    Ok(())
}

/// Se resuelve cuando el job terminó (más `linger`, para que los workers
/// alcancen a recibir NONE) o cuando llega Ctrl-C.
async fn shutdown_signal(state: AppState, linger: Duration) {
    let done = async {
        loop {
            let done = state.coordinator().done();
            if done {
                break;
            }
            sleep(Duration::from_millis(500)).await;
        }
        let status = state.coordinator().status();
        info!(
            lease_expirations = status.lease_expirations,
            failure_reports = status.failure_reports,
            stale_reports = status.stale_reports,
            "job completo, apagando en {:?}",
            linger
        );
        sleep(linger).await;
    };

    tokio::select! {
        _ = done => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("error esperando Ctrl-C: {}", e);
            }
            info!("Ctrl-C recibido, apagando");
        }
    }
}
