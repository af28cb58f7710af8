use serde::Serialize;

use crate::error::Result;
use crate::mapping::{map_folderless_list_to_sprint, map_list_to_sprint, orphan_board, IssueScope};
use crate::source::{FieldScope, SourceClient, Space, TaskList};
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::custom_fields::sync_field_definitions;
use crate::sync::filter::{should_include_list, task_filter};
use crate::sync::issues::sync_tasks;
use crate::sync::{SyncContext, SyncProgress};

/// Upsert one folder list as a sprint and return its id.
pub async fn sync_sprint(
    db: &Database,
    ctx: &SyncContext,
    list: &TaskList,
    folder_id: &str,
    board_id: i64,
) -> Result<i64> {
    let row = map_list_to_sprint(list, folder_id, board_id, ctx.now, ctx.org_id);
    let state = row.state;
    let id = db
        .conn()
        .call(move |conn| repository::upsert_sprint(conn, &row))
        .await?;
    log::info!("Upserted sprint '{}' (id: {id}, state: {state:?})", list.name);
    Ok(id)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FolderlessCounts {
    pub lists: u64,
    pub issues: u64,
    pub issues_failed: u64,
    pub list_custom_fields: u64,
    pub pr_mappings: u64,
}

async fn ensure_orphan_board(
    db: &Database,
    ctx: &SyncContext,
    cached: &mut Option<i64>,
) -> Result<i64> {
    if let Some(id) = *cached {
        return Ok(id);
    }
    let row = orphan_board(ctx.now, ctx.org_id);
    let id = db
        .conn()
        .call(move |conn| repository::upsert_board(conn, &row))
        .await?;
    log::debug!("Orphan board for org_id={} has id {id}", ctx.org_id);
    *cached = Some(id);
    Ok(id)
}

/// Sync a space's folderless lists against the org's orphan board.
///
/// The orphan board row is created the first time an included list needs
/// it; `orphan_board_id` carries its id across spaces. Never fails: a
/// listing error or a failing list is logged and skipped.
pub async fn sync_folderless_lists(
    db: &Database,
    source: &dyn SourceClient,
    ctx: &SyncContext,
    space: &Space,
    orphan_board_id: &mut Option<i64>,
    progress: &dyn SyncProgress,
) -> FolderlessCounts {
    let mut counts = FolderlessCounts::default();

    log::info!("Fetching folderless lists from space: {}", space.name);
    let lists = match source.folderless_lists(&ctx.token, &space.id).await {
        Ok(lists) => lists,
        Err(e) => {
            log::warn!("Failed to fetch folderless lists for space '{}': {e}", space.name);
            return counts;
        }
    };
    log::info!("Found {} folderless lists", lists.len());

    for list in &lists {
        let (include, use_task_filter) = should_include_list(list, ctx.updated_after);
        if !include {
            log::debug!("Skipping folderless list '{}': due date before threshold", list.name);
            continue;
        }

        let board_id = match ensure_orphan_board(db, ctx, orphan_board_id).await {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Failed to insert orphan board: {e}");
                return counts;
            }
        };
        let row = map_folderless_list_to_sprint(list, board_id, ctx.now, ctx.org_id);
        let sprint_id = match db
            .conn()
            .call(move |conn| repository::upsert_sprint(conn, &row))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Failed to insert folderless sprint '{}': {e}", list.name);
                continue;
            }
        };
        counts.lists += 1;
        log::info!("Folderless sprint '{}' upserted with id {sprint_id}", list.name);

        counts.list_custom_fields +=
            sync_field_definitions(db, source, ctx, FieldScope::List(&list.id)).await;

        let scope = IssueScope {
            board_id,
            sprint_id,
            space_id: space.id.clone(),
        };
        let filter = task_filter(ctx.updated_after, use_task_filter);
        match sync_tasks(db, source, ctx, &list.id, &list.name, &scope, filter, progress).await {
            Ok(tasks) => {
                counts.issues += tasks.tasks;
                counts.issues_failed += tasks.failed;
                counts.pr_mappings += tasks.pr_mappings;
            }
            Err(e) => log::warn!("Failed to sync tasks for folderless list '{}': {e}", list.name),
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_util::now_local;
    use crate::source::stub::{list, space, task, StubSource};
    use crate::sync::NoopProgress;
    use chrono::{Duration, Local};

    async fn setup(updated_after: Option<i64>) -> (Database, SyncContext) {
        let db = Database::open_memory().await.unwrap();
        let ctx = SyncContext {
            org_id: 42,
            token: "pk".into(),
            now: now_local(),
            updated_after,
        };
        (db, ctx)
    }

    async fn board_count(db: &Database) -> i64 {
        db.conn()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM board", [], |r| r.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_folderless_lists_use_orphan_board() {
        let (db, ctx) = setup(None).await;
        let source = StubSource::default();
        source
            .folderless_lists
            .lock()
            .unwrap()
            .insert("55".into(), vec![list("777", "Backlog", None, None, "55")]);
        source.put_tasks("777", vec![task("t1", "One"), task("t2", "Two")]);

        let mut orphan = None;
        let counts = sync_folderless_lists(
            &db,
            &source,
            &ctx,
            &space("55", "Engineering"),
            &mut orphan,
            &NoopProgress,
        )
        .await;
        assert_eq!(counts.lists, 1);
        assert_eq!(counts.issues, 2);

        let orphan = orphan.unwrap();
        let (boards, board_key): (Vec<i64>, String) = db
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT DISTINCT board_id FROM issue")?;
                let rows = stmt.query_map([], |r| r.get(0))?;
                let boards = rows.collect::<std::result::Result<Vec<i64>, _>>()?;
                let key = conn.query_row(
                    "SELECT board_key FROM board WHERE id = ?1",
                    [orphan],
                    |r| r.get(0),
                )?;
                Ok::<_, rusqlite::Error>((boards, key))
            })
            .await
            .unwrap();
        assert_eq!(boards, vec![orphan]);
        assert_eq!(board_key, crate::mapping::ORPHAN_BOARD_KEY);
    }

    #[tokio::test]
    async fn test_orphan_board_only_created_when_needed() {
        let (db, ctx) = setup(Some((Local::now() - Duration::days(10)).timestamp_millis())).await;
        let source = StubSource::default();
        let stale_due = (Local::now() - Duration::days(30)).timestamp_millis();
        source
            .folderless_lists
            .lock()
            .unwrap()
            .insert("55".into(), vec![list("old", "Old", None, Some(stale_due), "55")]);
        source
            .folderless_lists
            .lock()
            .unwrap()
            .insert("66".into(), vec![list("777", "Inbox", None, None, "66")]);

        let mut orphan = None;
        sync_folderless_lists(&db, &source, &ctx, &space("55", "Eng"), &mut orphan, &NoopProgress)
            .await;
        assert_eq!(orphan, None);
        assert_eq!(board_count(&db).await, 0);

        sync_folderless_lists(&db, &source, &ctx, &space("66", "Ops"), &mut orphan, &NoopProgress)
            .await;
        let first = orphan.unwrap();
        assert_eq!(board_count(&db).await, 1);

        // Later spaces reuse the cached id.
        source
            .folderless_lists
            .lock()
            .unwrap()
            .insert("77".into(), vec![list("888", "Misc", None, None, "77")]);
        sync_folderless_lists(&db, &source, &ctx, &space("77", "Misc"), &mut orphan, &NoopProgress)
            .await;
        assert_eq!(orphan, Some(first));
        assert_eq!(board_count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_folderless_filter_and_failures() {
        let threshold = (Local::now() - Duration::days(10)).timestamp_millis();
        let (db, ctx) = setup(Some(threshold)).await;
        let source = StubSource::default();
        let stale_due = (Local::now() - Duration::days(30)).timestamp_millis();
        source.folderless_lists.lock().unwrap().insert(
            "55".into(),
            vec![
                list("old", "Old", None, Some(stale_due), "55"),
                list("open", "Open", None, None, "55"),
                list("broken", "Broken", None, None, "55"),
            ],
        );
        source.put_tasks("open", vec![task("t1", "One")]);
        source.fail("list/broken/task");

        let mut orphan = None;
        let eng = space("55", "Eng");
        let counts =
            sync_folderless_lists(&db, &source, &ctx, &eng, &mut orphan, &NoopProgress).await;

        // Stale list skipped; broken list's sprint written but its tasks failed.
        assert_eq!(counts.lists, 2);
        assert_eq!(counts.issues, 1);
        assert!(source.requested_pages("old").is_empty());
        assert_eq!(source.task_filters("open"), vec![Some(threshold)]);
    }

    #[tokio::test]
    async fn test_folderless_listing_failure_is_contained() {
        let (db, ctx) = setup(None).await;
        let source = StubSource::default();
        source.fail("space/55/list");
        let mut orphan = None;
        let eng = space("55", "Eng");
        let counts =
            sync_folderless_lists(&db, &source, &ctx, &eng, &mut orphan, &NoopProgress).await;
        assert_eq!(counts, FolderlessCounts::default());
        assert_eq!(orphan, None);
    }
}
