pub mod config;
pub mod date_util;
pub mod error;
pub mod mapping;
pub mod server;
pub mod source;
pub mod storage;
pub mod sync;

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

pub use config::Config;
pub use error::{Error, Result};
pub use mapping::SyncStatus;
pub use source::{ClickUpClient, SourceClient};
pub use storage::Database;
pub use sync::{
    BoardSummary, BoardSyncSummary, NoopProgress, SyncOptions, SyncProgress, SyncSummary,
};

// Repository records surfaced by `status`, without exposing the module itself
pub use storage::repository::{BoardStatusRecord, OrgSyncStatus, SyncJobRecord};

use date_util::now_local;
use mapping::PROVIDER;
use storage::repository;
use sync::{board_job_key, org_job_key, SyncContext};

/// Main entry point for the ClickUp data warehouse.
pub struct ClickUpDW {
    db: Database,
    source: Arc<dyn SourceClient>,
}

/// Everything known locally about an org's syncs.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub org_id: i64,
    pub org_status: Option<OrgSyncStatus>,
    pub boards: Vec<BoardStatusRecord>,
    pub last_job: Option<SyncJobRecord>,
}

impl ClickUpDW {
    pub fn new(db: Database, source: Arc<dyn SourceClient>) -> Self {
        Self { db, source }
    }

    /// Open the configured database and build an HTTP client for the API.
    pub async fn open(config: &Config) -> Result<Self> {
        let db = Database::open_at(config.resolved_db_path()?).await?;
        let source = Arc::new(ClickUpClient::from_config(config)?);
        Ok(Self::new(db, source))
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    async fn access_token(&self, org_id: i64) -> Result<String> {
        self.db
            .conn()
            .call(move |conn| repository::get_access_token(conn, PROVIDER, org_id))
            .await?
            .ok_or_else(|| Error::MissingCredential {
                provider: PROVIDER.to_string(),
                org_id,
            })
    }

    fn context(org_id: i64, token: String, options: &SyncOptions) -> SyncContext {
        let updated_after = options.updated_after();
        if let Some(ms) = updated_after {
            log::info!("Syncing tasks updated after {ms} (epoch ms)");
        }
        SyncContext {
            org_id,
            token,
            now: now_local(),
            updated_after,
        }
    }

    /// Run `work` under a `sync_jobs` row that records its outcome.
    async fn record_job<T, F>(&self, job_key: String, work: F) -> Result<T>
    where
        T: Serialize,
        F: Future<Output = Result<T>>,
    {
        let job_id = self
            .db
            .conn()
            .call({
                let job_key = job_key.clone();
                move |conn| repository::insert_sync_job(conn, &job_key)
            })
            .await?;

        let outcome = work.await;
        let (status, summary_json, error_message) = match &outcome {
            Ok(summary) => ("completed", serde_json::to_string(summary).ok(), None),
            Err(e) => ("failed", None, Some(e.to_string())),
        };
        if let Err(e) = self
            .db
            .conn()
            .call(move |conn| {
                repository::finish_sync_job(
                    conn,
                    job_id,
                    status,
                    summary_json.as_deref(),
                    error_message.as_deref(),
                )
            })
            .await
        {
            log::warn!("Failed to record outcome of sync job {job_key}: {e}");
        }
        outcome
    }

    /// Full sync of the org's workspace.
    pub async fn sync_workspace(
        &self,
        org_id: i64,
        options: &SyncOptions,
        progress: &dyn SyncProgress,
    ) -> Result<SyncSummary> {
        self.record_job(org_job_key(org_id), async {
            let token = self.access_token(org_id).await?;
            let ctx = Self::context(org_id, token, options);
            let source = self.source.as_ref();
            sync::orchestrator::sync_workspace(&self.db, source, &ctx, progress).await
        })
        .await
    }

    /// Re-sync one board that a previous full sync created.
    pub async fn sync_board(
        &self,
        board_id: i64,
        org_id: i64,
        options: &SyncOptions,
        progress: &dyn SyncProgress,
    ) -> Result<BoardSyncSummary> {
        self.record_job(board_job_key(board_id), async {
            let token = self.access_token(org_id).await?;
            let ctx = Self::context(org_id, token, options);
            let source = self.source.as_ref();
            sync::boards::sync_single_board(&self.db, source, &ctx, board_id, progress).await
        })
        .await
    }

    /// Store (or replace) the org's ClickUp access token.
    pub async fn set_access_token(&self, org_id: i64, token: &str) -> Result<()> {
        let token = token.to_string();
        let now = now_local();
        self.db
            .conn()
            .call(move |conn| repository::set_access_token(conn, PROVIDER, org_id, &token, &now))
            .await?;
        log::info!("Stored ClickUp access token for org_id={org_id}");
        Ok(())
    }

    pub async fn status(&self, org_id: i64) -> Result<StatusReport> {
        let job_key = org_job_key(org_id);
        let (org_status, boards, last_job) = self
            .db
            .conn()
            .call(move |conn| {
                let org_status = repository::get_org_sync_status(conn, PROVIDER, org_id)?;
                let boards = repository::list_board_statuses(conn, org_id)?;
                let last_job = repository::latest_sync_job(conn, &job_key)?;
                Ok::<_, rusqlite::Error>((org_status, boards, last_job))
            })
            .await?;
        Ok(StatusReport {
            org_id,
            org_status,
            boards,
            last_job,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::stub::{folder, list, member, space, task, team, StubSource};
    use chrono::{Duration, Local};

    fn ms(days: i64) -> i64 {
        (Local::now() + Duration::days(days)).timestamp_millis()
    }

    fn workspace() -> Arc<StubSource> {
        let source = StubSource::default();
        *source.teams.lock().unwrap() = vec![team(
            "9001",
            vec![member("1", Some("ana"), Some("ana@example.com"))],
        )];
        *source.spaces.lock().unwrap() = vec![space("55", "Engineering")];
        source
            .folders
            .lock()
            .unwrap()
            .insert("55".into(), vec![folder("f1", "Platform")]);
        source.folder_lists.lock().unwrap().insert(
            "f1".into(),
            vec![list("901", "Sprint 1", Some(ms(-3)), Some(ms(10)), "55")],
        );
        source.put_tasks("901", vec![task("t1", "One"), task("t2", "Two")]);
        Arc::new(source)
    }

    async fn dw_with_token(source: Arc<StubSource>) -> ClickUpDW {
        let dw = ClickUpDW::new(Database::open_memory().await.unwrap(), source);
        dw.set_access_token(42, "pk_test").await.unwrap();
        dw
    }

    #[tokio::test]
    async fn test_missing_token_is_fatal_and_recorded() {
        let dw = ClickUpDW::new(Database::open_memory().await.unwrap(), workspace());
        let err = dw
            .sync_workspace(42, &SyncOptions::default(), &NoopProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingCredential { org_id: 42, .. }));

        let report = dw.status(42).await.unwrap();
        let job = report.last_job.unwrap();
        assert_eq!(job.status, "failed");
        assert!(job.error_message.unwrap().contains("access token"));
        // Nothing ran, so no org status was written.
        assert!(report.org_status.is_none());
    }

    #[tokio::test]
    async fn test_missing_team_is_fatal() {
        let source = workspace();
        source.teams.lock().unwrap().clear();
        let dw = dw_with_token(source).await;
        let err = dw
            .sync_workspace(42, &SyncOptions::default(), &NoopProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingTeam(42)));
        // The run had started before the team was looked up.
        let report = dw.status(42).await.unwrap();
        assert_eq!(report.org_status.unwrap().status, "FAILED");
    }

    #[tokio::test]
    async fn test_sync_workspace_then_status() {
        let dw = dw_with_token(workspace()).await;
        let summary = dw
            .sync_workspace(42, &SyncOptions::default(), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(summary.users, 1);
        assert_eq!(summary.boards, 1);
        assert_eq!(summary.issues, 2);

        let report = dw.status(42).await.unwrap();
        assert_eq!(report.org_status.unwrap().status, "COMPLETED");
        assert_eq!(report.boards.len(), 1);
        assert_eq!(report.boards[0].board_name, "Platform");
        assert_eq!(report.boards[0].issue_count, 2);

        let job = report.last_job.unwrap();
        assert_eq!(job.job_key, "org_42");
        assert_eq!(job.status, "completed");
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_sync_board_after_workspace() {
        let source = workspace();
        let dw = dw_with_token(source.clone()).await;
        dw.sync_workspace(42, &SyncOptions::default(), &NoopProgress)
            .await
            .unwrap();
        let board_id = dw.status(42).await.unwrap().boards[0].board_id;

        source.put_tasks(
            "901",
            vec![task("t1", "One"), task("t2", "Two"), task("t3", "Three")],
        );
        let options = SyncOptions {
            since: None,
            days: Some(7),
        };
        let summary = dw
            .sync_board(board_id, 42, &options, &NoopProgress)
            .await
            .unwrap();
        assert_eq!(summary.board_name, "Platform");
        assert_eq!(summary.issues, 3);

        let issues: i64 = dw
            .db()
            .conn()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM issue", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(issues, 3);
    }

    #[tokio::test]
    async fn test_sync_board_wrong_org() {
        let dw = dw_with_token(workspace()).await;
        dw.sync_workspace(42, &SyncOptions::default(), &NoopProgress)
            .await
            .unwrap();
        let board_id = dw.status(42).await.unwrap().boards[0].board_id;

        dw.set_access_token(7, "pk_other").await.unwrap();
        let err = dw
            .sync_board(board_id, 7, &SyncOptions::default(), &NoopProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OrgMismatch { org_id: 7, .. }));
    }

    #[tokio::test]
    async fn test_token_is_replaced() {
        let dw = dw_with_token(workspace()).await;
        dw.set_access_token(42, "pk_rotated").await.unwrap();
        assert_eq!(dw.access_token(42).await.unwrap(), "pk_rotated");
    }
}
