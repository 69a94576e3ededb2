use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use common::{
    rpc::{GET_TASK_PATH, JOB_STATUS_PATH, REPORT_TASK_PATH},
    GetTaskRequest, JobStatus, ReportTaskRequest, ReportTaskResponse, TaskAssignment,
};
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(GET_TASK_PATH, post(next_task))
        .route(REPORT_TASK_PATH, post(report_task))
        .route(JOB_STATUS_PATH, get(job_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// GetTask: próxima tarea para el worker, o WAIT / NONE
async fn next_task(
    State(state): State<AppState>,
    Json(req): Json<GetTaskRequest>,
) -> Json<TaskAssignment> {
    let assignment = state.coordinator().get_task(&req.worker_id, Instant::now());
    Json(assignment)
}

// ReportTask: siempre ok, los reportes viejos se ignoran adentro del scheduler
async fn report_task(
    State(state): State<AppState>,
    Json(req): Json<ReportTaskRequest>,
) -> Json<ReportTaskResponse> {
    state
        .coordinator()
        .report_task(&req.worker_id, &req.task_id, req.outcome);
    Json(ReportTaskResponse { ok: true })
}

async fn job_status(State(state): State<AppState>) -> Json<JobStatus> {
    Json(state.coordinator().status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Coordinator;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use common::{JobPhase, TaskOutcome};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(files: &[&str], n_reduce: u32) -> (AppState, Router) {
        let state = AppState::new(Coordinator::new(
            files.iter().copied(),
            n_reduce,
            Duration::from_secs(10),
        ));
        (state.clone(), build_router(state))
    }

    async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn health_responds_ok() {
        let (_, router) = app(&[], 1);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn next_task_hands_out_map_then_wait() {
        let (_, router) = app(&["a.txt"], 2);

        let (status, body) =
            post_json(&router, GET_TASK_PATH, json!({"worker_id": "w1"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], json!("MAP"));
        assert_eq!(body["input_file"], json!("a.txt"));
        assert_eq!(body["n_reduce"], json!(2));

        let (_, body) = post_json(&router, GET_TASK_PATH, json!({"worker_id": "w2"})).await;
        assert_eq!(body, json!({"kind": "WAIT"}));
    }

    #[tokio::test]
    async fn report_task_completes_and_advances_phase() {
        let (state, router) = app(&["a.txt"], 1);

        let (_, body) = post_json(&router, GET_TASK_PATH, json!({"worker_id": "w1"})).await;
        let task_id = body["task_id"].as_str().unwrap().to_string();

        let (status, body) = post_json(
            &router,
            REPORT_TASK_PATH,
            json!({"worker_id": "w1", "task_id": task_id, "outcome": "SUCCESS"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
        assert_eq!(state.coordinator().phase(), JobPhase::Reducing);

        let (_, body) = post_json(&router, GET_TASK_PATH, json!({"worker_id": "w1"})).await;
        assert_eq!(body["kind"], json!("REDUCE"));
        assert_eq!(body["partition"], json!(0));
    }

    #[tokio::test]
    async fn stale_report_still_gets_ok() {
        let (state, router) = app(&["a.txt"], 1);

        let (status, body) = post_json(
            &router,
            REPORT_TASK_PATH,
            json!({"worker_id": "w9", "task_id": "desconocida", "outcome": "FAILURE"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
        assert_eq!(state.coordinator().status().stale_reports, 1);
    }

    #[tokio::test]
    async fn malformed_request_is_rejected() {
        let (_, router) = app(&["a.txt"], 1);
        let (status, _) = post_json(&router, GET_TASK_PATH, json!({})).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn job_status_reports_done() {
        let (state, router) = app(&[], 1);

        let (_, body) = get_json(&router, JOB_STATUS_PATH).await;
        assert_eq!(body["phase"], json!("MAPPING"));
        assert_eq!(body["done"], json!(false));

        {
            let mut c = state.coordinator();
            let a = c.get_task("w1", Instant::now());
            let id = a.task_id().unwrap().clone();
            c.report_task("w1", &id, TaskOutcome::Success);
        }

        let (status, body) = get_json(&router, JOB_STATUS_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], json!("DONE"));
        assert_eq!(body["done"], json!(true));
        assert_eq!(body["reduce_tasks"]["completed"], json!(1));
    }
}
