use crate::error::{Error, Result};
use crate::mapping::{map_board_status, IssueScope, SyncStatus, ORPHAN_BOARD_KEY, PROVIDER};
use crate::source::{FieldScope, SourceClient};
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::custom_fields::sync_field_definitions;
use crate::sync::filter::{has_start_date, should_include_list, task_filter};
use crate::sync::issues::sync_tasks;
use crate::sync::sprints::sync_sprint;
use crate::sync::{BoardContentCounts, BoardSummary, BoardSyncSummary, SyncContext, SyncProgress};

/// Sync the sprints (lists) and issues (tasks) of one board.
///
/// Only lists with a start date that pass the time filter are synced. A
/// failing list is logged and skipped; failing to list the folder's lists
/// is an error. Board status rows are the caller's concern.
pub async fn sync_board_content(
    db: &Database,
    source: &dyn SourceClient,
    ctx: &SyncContext,
    board_id: i64,
    folder_id: &str,
    space_id: &str,
    progress: &dyn SyncProgress,
) -> Result<BoardContentCounts> {
    let lists = source.folder_lists(&ctx.token, folder_id).await?;
    let dated: Vec<_> = lists.iter().filter(|l| has_start_date(l)).collect();
    log::info!(
        "Found {} lists, {} with start dates",
        lists.len(),
        dated.len()
    );

    let mut counts = BoardContentCounts::default();
    for list in dated {
        let (include, use_task_filter) = should_include_list(list, ctx.updated_after);
        if !include {
            log::debug!("Skipping list '{}': due date before threshold", list.name);
            continue;
        }

        let sprint_id = match sync_sprint(db, ctx, list, folder_id, board_id).await {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Failed to insert sprint '{}': {e}", list.name);
                continue;
            }
        };
        counts.sprints += 1;

        counts.list_custom_fields +=
            sync_field_definitions(db, source, ctx, FieldScope::List(&list.id)).await;

        let scope = IssueScope {
            board_id,
            sprint_id,
            space_id: list
                .space
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_else(|| space_id.to_string()),
        };
        let filter = task_filter(ctx.updated_after, use_task_filter);
        match sync_tasks(db, source, ctx, &list.id, &list.name, &scope, filter, progress).await {
            Ok(tasks) => {
                counts.issues += tasks.tasks;
                counts.issues_failed += tasks.failed;
                counts.pr_mappings += tasks.pr_mappings;
            }
            Err(e) => log::warn!("Failed to sync tasks for list '{}': {e}", list.name),
        }
    }

    Ok(counts)
}

/// Write a board's `data_sync_process` row.
pub async fn record_board_status(
    db: &Database,
    ctx: &SyncContext,
    board_id: i64,
    user_integration_id: Option<i64>,
    status: SyncStatus,
    counts: &BoardContentCounts,
) -> Result<()> {
    let row = map_board_status(
        board_id,
        user_integration_id,
        ctx.now,
        ctx.org_id,
        status,
        counts.issues,
        counts.sprints,
    );
    db.conn()
        .call(move |conn| repository::upsert_board_sync_status(conn, &row))
        .await?;
    Ok(())
}

/// Re-sync one already mirrored board.
///
/// Fails if the board is unknown, belongs to another org, or is the orphan
/// board that has no folder upstream. A failure while syncing marks the
/// board FAILED before the error is returned.
pub async fn sync_single_board(
    db: &Database,
    source: &dyn SourceClient,
    ctx: &SyncContext,
    board_id: i64,
    progress: &dyn SyncProgress,
) -> Result<BoardSyncSummary> {
    log::info!(
        "Starting single board sync for board_id={board_id}, org_id={}",
        ctx.org_id
    );

    let board = db
        .conn()
        .call(move |conn| repository::get_board(conn, board_id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("board id={board_id}")))?;
    if board.org_id != ctx.org_id {
        return Err(Error::OrgMismatch {
            board_id,
            board_org_id: board.org_id,
            org_id: ctx.org_id,
        });
    }
    if board.folder_id == ORPHAN_BOARD_KEY {
        return Err(Error::NotFound(format!(
            "ClickUp folder for board id={board_id} (folderless lists are only synced by a full sync)"
        )));
    }
    log::info!("Found board: {} (ClickUp folder_id: {})", board.name, board.folder_id);

    let org_id = ctx.org_id;
    let user_integration_id = db
        .conn()
        .call(move |conn| repository::get_user_integration_id(conn, PROVIDER, org_id))
        .await?;

    progress.on_board_start(&board.name);
    record_board_status(
        db,
        ctx,
        board_id,
        user_integration_id,
        SyncStatus::InProgress,
        &BoardContentCounts::default(),
    )
    .await?;

    let space_id = board.account_id.clone().unwrap_or_default();
    let counts = match sync_board_content(
        db,
        source,
        ctx,
        board_id,
        &board.folder_id,
        &space_id,
        progress,
    )
    .await
    {
        Ok(counts) => counts,
        Err(e) => {
            log::error!("Single board sync failed: {e}");
            if let Err(status_err) = record_board_status(
                db,
                ctx,
                board_id,
                user_integration_id,
                SyncStatus::Failed,
                &BoardContentCounts::default(),
            )
            .await
            {
                log::warn!("Could not mark board {board_id} as failed: {status_err}");
            }
            return Err(e);
        }
    };

    record_board_status(db, ctx, board_id, user_integration_id, SyncStatus::Completed, &counts)
        .await?;
    progress.on_board_complete(&BoardSummary {
        board_id,
        name: board.name.clone(),
        issue_count: counts.issues,
        sprint_count: counts.sprints,
        status: SyncStatus::Completed,
    });

    log::info!(
        "Board sync completed: {} sprints, {} issues, {} PR mappings",
        counts.sprints,
        counts.issues,
        counts.pr_mappings
    );
    Ok(BoardSyncSummary {
        board_id,
        board_name: board.name,
        sprints: counts.sprints,
        issues: counts.issues,
        issues_failed: counts.issues_failed,
        list_custom_fields: counts.list_custom_fields,
        pr_mappings: counts.pr_mappings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_util::now_local;
    use crate::mapping::{map_folder_to_board, orphan_board, SprintState};
    use crate::source::stub::{folder, list, task, StubSource};
    use crate::sync::NoopProgress;
    use chrono::{Duration, Local};

    fn ctx(org_id: i64, updated_after: Option<i64>) -> SyncContext {
        SyncContext {
            org_id,
            token: "pk".into(),
            now: now_local(),
            updated_after,
        }
    }

    async fn seed_board(db: &Database) -> i64 {
        let now = now_local();
        db.conn()
            .call(move |conn| {
                let row = map_folder_to_board(&folder("f1", "Sprint Board"), "55", now, 42);
                repository::upsert_board(conn, &row)
            })
            .await
            .unwrap()
    }

    fn ms(days: i64) -> i64 {
        (Local::now() + Duration::days(days)).timestamp_millis()
    }

    async fn board_status(db: &Database) -> (String, i64, i64) {
        db.conn()
            .call(|conn| {
                conn.query_row(
                    "SELECT sync_status, issue_count, sprint_count FROM data_sync_process",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_content_requires_start_date() {
        let db = Database::open_memory().await.unwrap();
        let board_id = seed_board(&db).await;
        let source = StubSource::default();
        source.folder_lists.lock().unwrap().insert(
            "f1".into(),
            vec![
                list("901", "Sprint 1", Some(ms(-5)), Some(ms(5)), "55"),
                list("902", "Backlog", None, None, "55"),
            ],
        );
        source.put_tasks("901", vec![task("t1", "One")]);
        source.put_tasks("902", vec![task("t2", "Two")]);

        let ctx = ctx(42, None);
        let counts = sync_board_content(&db, &source, &ctx, board_id, "f1", "55", &NoopProgress)
            .await
            .unwrap();
        assert_eq!(counts.sprints, 1);
        assert_eq!(counts.issues, 1);
        assert!(source.requested_pages("902").is_empty());

        let state: Option<String> = db
            .conn()
            .call(|conn| conn.query_row("SELECT state FROM sprint", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(state.as_deref(), SprintState::Active.as_db());
    }

    #[tokio::test]
    async fn test_single_board_not_found() {
        let db = Database::open_memory().await.unwrap();
        let source = StubSource::default();
        let err = sync_single_board(&db, &source, &ctx(42, None), 999, &NoopProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_single_board_org_mismatch() {
        let db = Database::open_memory().await.unwrap();
        let board_id = seed_board(&db).await;
        let source = StubSource::default();
        let err = sync_single_board(&db, &source, &ctx(7, None), board_id, &NoopProgress)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::OrgMismatch {
                board_org_id: 42,
                org_id: 7,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_single_board_rejects_orphan_board() {
        let db = Database::open_memory().await.unwrap();
        let now = now_local();
        let orphan_id = db
            .conn()
            .call(move |conn| repository::upsert_board(conn, &orphan_board(now, 42)))
            .await
            .unwrap();
        let source = StubSource::default();
        source.fail(&format!("folder/{ORPHAN_BOARD_KEY}/list"));

        let err = sync_single_board(&db, &source, &ctx(42, None), orphan_id, &NoopProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // Rejected before any status row was written.
        let rows: i64 = db
            .conn()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM data_sync_process", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_single_board_completes_with_counts() {
        let db = Database::open_memory().await.unwrap();
        let board_id = seed_board(&db).await;
        let source = StubSource::default();
        source.folder_lists.lock().unwrap().insert(
            "f1".into(),
            vec![list("901", "Sprint 1", Some(ms(-5)), Some(ms(5)), "55")],
        );
        source.put_tasks("901", vec![task("t1", "One"), task("t2", "Two")]);

        let summary = sync_single_board(&db, &source, &ctx(42, None), board_id, &NoopProgress)
            .await
            .unwrap();
        assert_eq!(summary.board_name, "Sprint Board");
        assert_eq!((summary.sprints, summary.issues), (1, 2));
        assert_eq!(board_status(&db).await, ("COMPLETED".to_string(), 2, 1));
    }

    #[tokio::test]
    async fn test_single_board_failure_marks_failed() {
        let db = Database::open_memory().await.unwrap();
        let board_id = seed_board(&db).await;
        let source = StubSource::default();
        source.fail("folder/f1/list");

        let err = sync_single_board(&db, &source, &ctx(42, None), board_id, &NoopProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
        assert_eq!(board_status(&db).await.0, "FAILED");
    }

    #[tokio::test]
    async fn test_single_board_applies_threshold() {
        let db = Database::open_memory().await.unwrap();
        let board_id = seed_board(&db).await;
        let source = StubSource::default();
        let threshold = ms(-10);
        source.folder_lists.lock().unwrap().insert(
            "f1".into(),
            vec![
                list("old", "Old", Some(ms(-40)), Some(ms(-30)), "55"),
                list("cur", "Current", Some(ms(-5)), Some(ms(5)), "55"),
                list("open", "Open ended", Some(ms(-5)), None, "55"),
            ],
        );

        let summary =
            sync_single_board(&db, &source, &ctx(42, Some(threshold)), board_id, &NoopProgress)
                .await
                .unwrap();
        assert_eq!(summary.sprints, 2);
        assert!(source.requested_pages("old").is_empty());
        assert_eq!(source.task_filters("cur"), vec![None]);
        assert_eq!(source.task_filters("open"), vec![Some(threshold)]);
    }
}
