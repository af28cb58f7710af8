//! HTTP trigger surface: start syncs in the background and report their
//! state from the in-memory job registry.

pub mod jobs;

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::SourceClient;
use crate::storage::Database;
use crate::sync::{board_job_key, org_job_key, NoopProgress, SyncOptions};
use crate::ClickUpDW;

pub use jobs::{JobEntry, JobRegistry, JobState};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub source: Arc<dyn SourceClient>,
    pub jobs: JobRegistry,
}

impl AppState {
    pub fn new(config: Config, source: Arc<dyn SourceClient>) -> Self {
        Self {
            config: Arc::new(config),
            source,
            jobs: JobRegistry::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    pub org_id: i64,
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct BoardSyncParams {
    pub board_id: i64,
    pub org_id: i64,
    pub days: Option<u32>,
}

type Reply = (StatusCode, Json<Value>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sync", post(start_sync))
        .route("/sync/board", post(start_board_sync))
        .route("/sync/status/{org_id}", get(sync_status))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind `config.bind` and serve until the process stops.
pub async fn serve(config: Config, source: Arc<dyn SourceClient>) -> Result<()> {
    let bind = config.bind.clone();
    let app = router(AppState::new(config, source));
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| Error::Server(format!("failed to bind {bind}: {e}")))?;
    log::info!("Listening on http://{bind}");
    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Server(e.to_string()))
}

fn conflict(detail: String) -> Reply {
    (StatusCode::CONFLICT, Json(json!({ "detail": detail })))
}

/// Each background run gets its own connection, dropped when the run ends.
async fn open_warehouse(state: &AppState) -> Result<ClickUpDW> {
    let db = Database::open_at(state.config.resolved_db_path()?).await?;
    Ok(ClickUpDW::new(db, state.source.clone()))
}

fn to_value<T: serde::Serialize>(summary: &T) -> Result<Value> {
    serde_json::to_value(summary).map_err(|e| Error::Server(e.to_string()))
}

async fn record(jobs: &JobRegistry, key: &str, outcome: Result<Value>) {
    match outcome {
        Ok(result) => jobs.complete(key, result).await,
        Err(e) => {
            log::error!("Background sync {key} failed: {e}");
            jobs.fail(key, e.to_string()).await;
        }
    }
}

/// Run `work` on its own task and record how it ended. A panicking run is
/// recorded as failed so its key does not stay `running`.
fn spawn_job<F>(jobs: JobRegistry, key: String, work: F)
where
    F: Future<Output = Result<Value>> + Send + 'static,
{
    let handle = tokio::spawn(work);
    tokio::spawn(async move {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(Error::Server(format!("sync task aborted: {e}"))),
        };
        record(&jobs, &key, outcome).await;
    });
}

pub async fn start_sync(
    State(state): State<AppState>,
    Query(params): Query<SyncParams>,
) -> Reply {
    let org_id = params.org_id;
    let days = params.days.unwrap_or(state.config.default_days);
    let key = org_job_key(org_id);
    if !state.jobs.try_start(&key).await {
        return conflict(format!("Sync already in progress for org_id={org_id}"));
    }

    let background = state.clone();
    spawn_job(state.jobs.clone(), key, async move {
        let dw = open_warehouse(&background).await?;
        let options = SyncOptions {
            since: None,
            days: Some(days),
        };
        let summary = dw.sync_workspace(org_id, &options, &NoopProgress).await?;
        to_value(&summary)
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "started",
            "message": format!("Sync initiated for org_id={org_id}, syncing tasks from last {days} days"),
            "org_id": org_id,
        })),
    )
}

pub async fn start_board_sync(
    State(state): State<AppState>,
    Query(params): Query<BoardSyncParams>,
) -> Reply {
    let board_id = params.board_id;
    let org_id = params.org_id;
    let days = params.days.unwrap_or(state.config.default_days);
    let key = board_job_key(board_id);
    if !state.jobs.try_start(&key).await {
        return conflict(format!("Sync already in progress for board_id={board_id}"));
    }

    let background = state.clone();
    spawn_job(state.jobs.clone(), key, async move {
        let dw = open_warehouse(&background).await?;
        let options = SyncOptions {
            since: None,
            days: Some(days),
        };
        let summary = dw
            .sync_board(board_id, org_id, &options, &NoopProgress)
            .await?;
        to_value(&summary)
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "started",
            "message": format!(
                "Board sync initiated for board_id={board_id}, org_id={org_id}, syncing tasks from last {days} days"
            ),
            "org_id": org_id,
            "board_id": board_id,
        })),
    )
}

pub async fn sync_status(State(state): State<AppState>, Path(org_id): Path<i64>) -> Json<Value> {
    match state.jobs.get(&org_job_key(org_id)).await {
        Some(entry) => {
            let mut body = json!({ "org_id": org_id });
            if let (Some(map), Ok(Value::Object(fields))) =
                (body.as_object_mut(), serde_json::to_value(&entry))
            {
                map.extend(fields);
            }
            Json(body)
        }
        None => Json(json!({ "status": "no_sync_found", "org_id": org_id })),
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
