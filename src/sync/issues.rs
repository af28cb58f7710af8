use crate::error::Result;
use crate::mapping::{pr_link, IssueScope};
use crate::source::{SourceClient, Task};
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::resolver::IssueWriter;
use crate::sync::{SyncContext, SyncProgress, TaskCounts};

/// Fetch a list's tasks and write each as an issue, in upstream order.
///
/// The task listing failing is an error for the caller; a single task
/// failing to write is counted and skipped.
#[allow(clippy::too_many_arguments)]
pub async fn sync_tasks(
    db: &Database,
    source: &dyn SourceClient,
    ctx: &SyncContext,
    list_id: &str,
    list_name: &str,
    scope: &IssueScope,
    task_filter: Option<i64>,
    progress: &dyn SyncProgress,
) -> Result<TaskCounts> {
    let tasks = source.tasks(&ctx.token, list_id, task_filter).await?;
    log::info!("Found {} tasks in list '{list_name}'", tasks.len());
    progress.on_tasks_fetched(list_name, tasks.len());

    let writer = IssueWriter::new(db, source, ctx);
    let mut counts = TaskCounts::default();

    for task in &tasks {
        let issue_id = match writer.write(task, scope).await {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Failed to write issue for task '{}' ({}): {e}", task.name, task.id);
                counts.failed += 1;
                continue;
            }
        };
        counts.tasks += 1;

        match link_pull_request(db, ctx, task, issue_id).await {
            Ok(true) => counts.pr_mappings += 1,
            Ok(false) => {}
            Err(e) => {
                log::warn!("Failed to create PR mapping for task '{}': {e}", task.name)
            }
        }
    }

    log::info!(
        "Inserted {} tasks from '{list_name}' ({} failed)",
        counts.tasks,
        counts.failed
    );
    Ok(counts)
}

/// Link the task's `PR LINK` pull request to its issue. Returns true when a
/// new mapping row was written.
pub async fn link_pull_request(
    db: &Database,
    ctx: &SyncContext,
    task: &Task,
    issue_id: i64,
) -> Result<bool> {
    let Some(url) = pr_link(task) else {
        return Ok(false);
    };

    let org_id = ctx.org_id;
    let now = ctx.now;
    let url_owned = url.to_string();
    let linked = db
        .conn()
        .call(move |conn| {
            let Some(pr_id) = repository::find_pull_request_id(conn, org_id, &url_owned)? else {
                return Ok::<Option<bool>, rusqlite::Error>(None);
            };
            let inserted =
                repository::insert_activity_issue_mapping(conn, org_id, pr_id, issue_id, &now)?;
            Ok(Some(inserted))
        })
        .await?;

    match linked {
        Some(inserted) => Ok(inserted),
        None => {
            log::warn!("Pull request not found for task '{}' (PR LINK: {url})", task.name);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_util::now_local;
    use crate::mapping::{orphan_board, map_folderless_list_to_sprint};
    use crate::source::stub::{child_task, list, task, StubSource};
    use crate::source::TaskField;
    use crate::sync::NoopProgress;
    use serde_json::json;

    async fn setup() -> (Database, SyncContext, IssueScope) {
        let db = Database::open_memory().await.unwrap();
        let now = now_local();
        let (board_id, sprint_id) = db
            .conn()
            .call(move |conn| {
                let board_id = repository::upsert_board(conn, &orphan_board(now, 42))?;
                let inbox = list("901", "L", None, None, "55");
                let sprint = map_folderless_list_to_sprint(&inbox, board_id, now, 42);
                let sprint_id = repository::upsert_sprint(conn, &sprint)?;
                let pr_url = "https://github.com/acme/api/pull/7";
                repository::insert_pull_request(conn, 42, pr_url, None)?;
                Ok::<_, rusqlite::Error>((board_id, sprint_id))
            })
            .await
            .unwrap();
        let ctx = SyncContext {
            org_id: 42,
            token: "pk".into(),
            now,
            updated_after: None,
        };
        let scope = IssueScope {
            board_id,
            sprint_id,
            space_id: "55".into(),
        };
        (db, ctx, scope)
    }

    fn with_pr(mut t: Task, url: &str) -> Task {
        t.custom_fields = vec![TaskField {
            id: "cf".into(),
            name: Some("PR LINK".into()),
            value: Some(json!(url)),
        }];
        t
    }

    #[tokio::test]
    async fn test_child_before_parent_in_listing() {
        let (db, ctx, scope) = setup().await;
        let source = StubSource::default();
        let parent = task("P", "Parent");
        source.put_remote_task(parent.clone());
        source.put_tasks("901", vec![child_task("C", "Child", "P", "P"), parent]);

        let counts = sync_tasks(&db, &source, &ctx, "901", "L", &scope, None, &NoopProgress)
            .await
            .unwrap();

        assert_eq!(counts.tasks, 2);
        assert_eq!(counts.failed, 0);
        assert_eq!(source.task_fetches(), vec!["P".to_string()]);

        let (rows, linked): (i64, i64) = db
            .conn()
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*),
                            (SELECT COUNT(*) FROM issue c JOIN issue p ON c.parent_issue_id = p.id
                             WHERE c.issue_id = 'C' AND p.issue_id = 'P')
                     FROM issue",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
            })
            .await
            .unwrap();
        assert_eq!((rows, linked), (2, 1));
    }

    #[tokio::test]
    async fn test_task_filter_is_passed_through() {
        let (db, ctx, scope) = setup().await;
        let source = StubSource::default();
        sync_tasks(&db, &source, &ctx, "901", "L", &scope, Some(123), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(source.task_filters("901"), vec![Some(123)]);
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let (db, ctx, scope) = setup().await;
        let source = StubSource::default();
        source.fail("list/901/task");
        let result = sync_tasks(&db, &source, &ctx, "901", "L", &scope, None, &NoopProgress).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pr_links_counted_once() {
        let (db, ctx, scope) = setup().await;
        let source = StubSource::default();
        source.put_tasks(
            "901",
            vec![
                with_pr(task("A", "Linked"), "https://github.com/acme/api/pull/7"),
                with_pr(task("B", "Unknown PR"), "https://github.com/acme/api/pull/99"),
                task("C", "No PR"),
            ],
        );

        let first = sync_tasks(&db, &source, &ctx, "901", "L", &scope, None, &NoopProgress)
            .await
            .unwrap();
        assert_eq!(first.tasks, 3);
        assert_eq!(first.pr_mappings, 1);

        let second = sync_tasks(&db, &source, &ctx, "901", "L", &scope, None, &NoopProgress)
            .await
            .unwrap();
        assert_eq!(second.pr_mappings, 0);

        let mappings: i64 = db
            .conn()
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM activity_issue_mapping WHERE activity_type = 'PULL REQUEST'",
                    [],
                    |r| r.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(mappings, 1);
    }
}
