use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{rpc::JOB_STATUS_PATH, JobStatus, TaskCounts};
use reqwest::Client;
use std::{
    env,
    time::{Duration, Instant},
};

/// - En Docker: MASTER_URL=http://coordinator:8080
/// - Local: default http://localhost:8080
fn master_base_url() -> String {
    env::var("MASTER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "CLI simple para consultar el job del coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Muestra fase, progreso y métricas del job
    Status {
        /// Imprime el JobStatus crudo en JSON
        #[arg(long)]
        json: bool,
    },
    /// Espera hasta que el job termine
    Wait {
        /// Segundos entre consultas
        #[arg(long, default_value_t = 2)]
        interval: u64,

        /// Máximo de segundos a esperar (0 = sin límite)
        #[arg(long, default_value_t = 0)]
        timeout: u64,
    },
}

async fn fetch_status(client: &Client, base_url: &str) -> Result<JobStatus> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), JOB_STATUS_PATH);
    let resp = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("no se pudo contactar al coordinator en {}", url))?
        .error_for_status()?;
    Ok(resp.json().await?)
}

fn progress(counts: &TaskCounts) -> String {
    let total = counts.total();
    if total == 0 {
        return "(sin tareas)".to_string();
    }
    let pct = counts.completed as f64 / total as f64 * 100.0;
    format!(
        "{}/{} completadas ({:.1}%), {} en curso, {} pendientes",
        counts.completed, total, pct, counts.in_progress, counts.idle
    )
}

fn render_status(job: &JobStatus) -> String {
    let mut out = Vec::new();
    out.push("Job:".to_string());
    out.push(format!("  fase: {:?}", job.phase));
    out.push(format!("  terminado: {}", job.done));
    out.push(format!("  n_reduce: {}", job.n_reduce));
    out.push(format!("  map: {}", progress(&job.map_tasks)));
    out.push(format!("  reduce: {}", progress(&job.reduce_tasks)));
    out.push(format!(
        "  leases vencidos={}, fallos reportados={}, reportes ignorados={}",
        job.lease_expirations, job.failure_reports, job.stale_reports
    ));
    out.push(format!("  submitted_at: {}", job.submitted_at));
    if let Some(ref reducing) = job.reducing_at {
        out.push(format!("  reduce desde: {}", reducing));
    }
    if let Some(ref done) = job.finished_at {
        out.push(format!("  finalizado: {}", done));
    }
    out.join("\n")
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = master_base_url();

    match cli.command {
        Commands::Status { json } => {
            let job = fetch_status(&client, &base_url).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&job)?);
            } else {
                println!("{}", render_status(&job));
            }
        }

        Commands::Wait { interval, timeout } => {
            let started = Instant::now();
            let limit = (timeout > 0).then(|| Duration::from_secs(timeout));
            loop {
                let job = fetch_status(&client, &base_url).await?;
                if job.done {
                    println!("{}", render_status(&job));
                    break;
                }
                println!(
                    "fase {:?}: map {} | reduce {}",
                    job.phase,
                    progress(&job.map_tasks),
                    progress(&job.reduce_tasks)
                );
                if let Some(limit) = limit {
                    if started.elapsed() >= limit {
                        bail!("el job no terminó en {} s", timeout);
                    }
                }
                tokio::time::sleep(Duration::from_secs(interval.max(1))).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::JobPhase;

    fn status(phase: JobPhase) -> JobStatus {
        JobStatus {
            phase,
            done: phase == JobPhase::Done,
            n_reduce: 2,
            map_tasks: TaskCounts {
                idle: 0,
                in_progress: 1,
                completed: 3,
            },
            reduce_tasks: TaskCounts::default(),
            lease_expirations: 1,
            failure_reports: 0,
            stale_reports: 2,
            submitted_at: Utc::now(),
            reducing_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["client", "status", "--json"]).unwrap();
        assert_eq!(cli.command, Commands::Status { json: true });

        let cli = Cli::try_parse_from(["client", "wait", "--interval", "5"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Wait {
                interval: 5,
                timeout: 0
            }
        );
    }

    #[test]
    fn progress_shows_percentage() {
        let s = status(JobPhase::Mapping);
        assert_eq!(
            progress(&s.map_tasks),
            "3/4 completadas (75.0%), 1 en curso, 0 pendientes"
        );
        assert_eq!(progress(&s.reduce_tasks), "(sin tareas)");
    }

    #[test]
    fn render_includes_metrics() {
        let text = render_status(&status(JobPhase::Mapping));
        assert!(text.contains("fase: Mapping"));
        assert!(text.contains("reportes ignorados=2"));
        assert!(!text.contains("finalizado"));
    }
}
