use anyhow::{bail, Context, Result};
use common::{
    rpc::{GET_TASK_PATH, REPORT_TASK_PATH},
    GetTaskRequest, ReportTaskRequest, ReportTaskResponse, TaskAssignment,
};
use reqwest::Client;
use std::time::Duration;

/// Las dos llamadas que el worker le hace al coordinator.
///
/// Cualquier `Err` se trata como error transitorio: el loop reintenta y,
/// si se agotan los intentos, termina.
#[allow(async_fn_in_trait)]
pub trait CoordinatorRpc {
    async fn get_task(&self, worker_id: &str) -> Result<TaskAssignment>;
    async fn report_task(&self, report: &ReportTaskRequest) -> Result<()>;
}

/// Cliente HTTP/JSON contra el router del coordinator.
#[derive(Debug, Clone)]
pub struct HttpCoordinator {
    client: Client,
    base_url: String,
}

impl HttpCoordinator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("no se pudo crear el cliente HTTP")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl CoordinatorRpc for HttpCoordinator {
    async fn get_task(&self, worker_id: &str) -> Result<TaskAssignment> {
        let url = self.url(GET_TASK_PATH);
        let resp = self
            .client
            .post(&url)
            .json(&GetTaskRequest {
                worker_id: worker_id.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("GetTask: no se pudo contactar {}", url))?
            .error_for_status()
            .context("GetTask: el coordinator respondió con error")?;

        resp.json()
            .await
            .context("GetTask: respuesta inválida del coordinator")
    }

    async fn report_task(&self, report: &ReportTaskRequest) -> Result<()> {
        let url = self.url(REPORT_TASK_PATH);
        let ack: ReportTaskResponse = self
            .client
            .post(&url)
            .json(report)
            .send()
            .await
            .with_context(|| format!("ReportTask: no se pudo contactar {}", url))?
            .error_for_status()
            .context("ReportTask: el coordinator respondió con error")?
            .json()
            .await
            .context("ReportTask: respuesta inválida del coordinator")?;

        if !ack.ok {
            bail!("ReportTask: el coordinator no aceptó el reporte de {}", report.task_id);
        }
        Ok(())
    }
}
