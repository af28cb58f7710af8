use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::date_util::{format_opt_timestamp, format_timestamp};
use crate::mapping::{
    BoardRow, BoardStatusRow, CustomFieldRow, FieldDetail, IssueRow, SprintRow, UserRow,
};

// ── Boards ─────────────────────────────────────────────────────────

/// Insert or update a board by (folder_id, board_key, org_id). Returns its id.
pub fn upsert_board(conn: &Connection, board: &BoardRow) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO board (
            folder_id, board_key, name, account_id, active, is_deleted, is_private,
            org_id, created_at, modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(folder_id, board_key, org_id) DO UPDATE SET
            name=excluded.name, account_id=COALESCE(excluded.account_id, board.account_id),
            active=excluded.active, is_deleted=excluded.is_deleted,
            is_private=excluded.is_private, modified_at=excluded.modified_at
        RETURNING id",
        params![
            board.folder_id,
            board.board_key,
            board.name,
            board.account_id,
            board.active,
            board.is_deleted,
            board.is_private,
            board.org_id,
            format_timestamp(&board.created_at),
            format_timestamp(&board.modified_at),
        ],
        |row| row.get(0),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRecord {
    pub id: i64,
    pub org_id: i64,
    pub folder_id: String,
    pub name: String,
    pub account_id: Option<String>,
}

pub fn get_board(conn: &Connection, board_id: i64) -> Result<Option<BoardRecord>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, org_id, folder_id, name, account_id FROM board WHERE id = ?1",
        params![board_id],
        |row| {
            Ok(BoardRecord {
                id: row.get(0)?,
                org_id: row.get(1)?,
                folder_id: row.get(2)?,
                name: row.get(3)?,
                account_id: row.get(4)?,
            })
        },
    )
    .optional()
}

// ── Sprints ────────────────────────────────────────────────────────

/// Insert or update a sprint by (list_id, org_id, board_id). Returns its id.
pub fn upsert_sprint(conn: &Connection, sprint: &SprintRow) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO sprint (
            list_id, board_id, folder_id, name, goal, start_date, end_date, complete_date,
            state, is_deleted, org_id, created_at, modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(list_id, org_id, board_id) DO UPDATE SET
            folder_id=excluded.folder_id, name=excluded.name, goal=excluded.goal,
            start_date=excluded.start_date, end_date=excluded.end_date,
            complete_date=excluded.complete_date, state=excluded.state,
            is_deleted=excluded.is_deleted, modified_at=excluded.modified_at
        RETURNING id",
        params![
            sprint.list_id,
            sprint.board_id,
            sprint.folder_id,
            sprint.name,
            sprint.goal,
            format_opt_timestamp(sprint.start_date.as_ref()),
            format_opt_timestamp(sprint.end_date.as_ref()),
            format_opt_timestamp(sprint.complete_date.as_ref()),
            sprint.state.as_db(),
            sprint.is_deleted,
            sprint.org_id,
            format_timestamp(&sprint.created_at),
            format_timestamp(&sprint.modified_at),
        ],
        |row| row.get(0),
    )
}

// ── Issues ─────────────────────────────────────────────────────────

/// Insert or update an issue by (issue_id, org_id). Returns its id.
pub fn upsert_issue(conn: &Connection, issue: &IssueRow) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO issue (
            issue_id, org_id, issue_key, summary, description, status, priority, issue_type,
            current_progress, story_point, time_spent, due_date, resolution_date,
            status_change_date, parent_issue_id, top_level_parent_id, assignee_id, creator_id,
            board_id, sprint_id, project_id, issue_url, is_deleted, created_at, modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                  ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)
        ON CONFLICT(issue_id, org_id) DO UPDATE SET
            issue_key=excluded.issue_key, summary=excluded.summary,
            description=excluded.description, status=excluded.status,
            priority=excluded.priority, issue_type=excluded.issue_type,
            current_progress=excluded.current_progress, story_point=excluded.story_point,
            time_spent=excluded.time_spent, due_date=excluded.due_date,
            resolution_date=excluded.resolution_date,
            status_change_date=excluded.status_change_date,
            parent_issue_id=excluded.parent_issue_id,
            top_level_parent_id=excluded.top_level_parent_id,
            assignee_id=excluded.assignee_id, creator_id=excluded.creator_id,
            board_id=excluded.board_id, sprint_id=excluded.sprint_id,
            project_id=excluded.project_id, issue_url=excluded.issue_url,
            is_deleted=excluded.is_deleted, modified_at=excluded.modified_at
        RETURNING id",
        params![
            issue.task_id,
            issue.org_id,
            issue.key,
            issue.summary,
            issue.description,
            issue.status,
            issue.priority,
            issue.issue_type,
            issue.current_progress,
            issue.story_point,
            issue.time_spent,
            format_opt_timestamp(issue.due_date.as_ref()),
            format_opt_timestamp(issue.resolution_date.as_ref()),
            format_timestamp(&issue.status_change_date),
            issue.parent_issue_id,
            issue.top_level_parent_id,
            issue.assignee_id,
            issue.creator_id,
            issue.board_id,
            issue.sprint_id,
            issue.project_id,
            issue.issue_url,
            issue.is_deleted,
            format_timestamp(&issue.created_at),
            format_timestamp(&issue.modified_at),
        ],
        |row| row.get(0),
    )
}

/// Local id of an upstream task within the org.
pub fn find_issue_id(
    conn: &Connection,
    org_id: i64,
    task_id: &str,
) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row(
        "SELECT id FROM issue WHERE issue_id = ?1 AND org_id = ?2",
        params![task_id, org_id],
        |row| row.get(0),
    )
    .optional()
}

// ── Users ──────────────────────────────────────────────────────────

/// Insert a user unless the org already has one with that email.
/// Returns true when a row was written.
pub fn insert_user_if_absent(
    conn: &Connection,
    user: &UserRow,
    now: &NaiveDateTime,
) -> Result<bool, rusqlite::Error> {
    let count = conn.execute(
        "INSERT INTO users (organization_id, name, email, type, scm_provider, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(organization_id, email) DO NOTHING",
        params![
            user.org_id,
            user.name,
            user.email,
            user.user_type,
            user.scm_provider,
            user.active,
            format_timestamp(now),
        ],
    )?;
    Ok(count > 0)
}

pub fn find_user_by_email(
    conn: &Connection,
    org_id: i64,
    email: &str,
) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row(
        "SELECT id FROM users WHERE organization_id = ?1 AND email = ?2",
        params![org_id, email],
        |row| row.get(0),
    )
    .optional()
}

// ── Custom fields ──────────────────────────────────────────────────

pub fn upsert_custom_field(
    conn: &Connection,
    field: &CustomFieldRow,
    now: &NaiveDateTime,
) -> Result<i64, rusqlite::Error> {
    // Each row kind owns exactly one descriptive column; the other is left alone.
    let (column, value) = match &field.detail {
        FieldDetail::Description(d) => ("description", d),
        FieldDetail::DataType(t) => ("data_type", t),
    };
    let sql = format!(
        "INSERT INTO account_custom_field (field_id, org_id, name, {column}, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(field_id, org_id) DO UPDATE SET
            name=excluded.name, {column}=excluded.{column}, modified_at=excluded.modified_at
         RETURNING id"
    );
    conn.query_row(
        &sql,
        params![field.field_id, field.org_id, field.name, value, format_timestamp(now)],
        |row| row.get(0),
    )
}

/// Name of a custom field (task type) by upstream id within the org.
pub fn get_custom_field_name(
    conn: &Connection,
    org_id: i64,
    field_id: &str,
) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT name FROM account_custom_field WHERE field_id = ?1 AND org_id = ?2",
        params![field_id, org_id],
        |row| row.get(0),
    )
    .optional()
    .map(|opt| opt.flatten())
}

// ── Pull requests ──────────────────────────────────────────────────

pub const ACTIVITY_TYPE_PULL_REQUEST: &str = "PULL REQUEST";

pub fn find_pull_request_id(
    conn: &Connection,
    org_id: i64,
    html_url: &str,
) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row(
        "SELECT id FROM pull_request WHERE org_id = ?1 AND html_url = ?2",
        params![org_id, html_url],
        |row| row.get(0),
    )
    .optional()
}

/// Written by the SCM integration in production.
pub fn insert_pull_request(
    conn: &Connection,
    org_id: i64,
    html_url: &str,
    title: Option<&str>,
) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO pull_request (org_id, html_url, title) VALUES (?1, ?2, ?3)
         ON CONFLICT(org_id, html_url) DO UPDATE SET title=COALESCE(excluded.title, pull_request.title)
         RETURNING id",
        params![org_id, html_url, title],
        |row| row.get(0),
    )
}

/// Link a pull request to an issue. Returns false if the link already existed.
pub fn insert_activity_issue_mapping(
    conn: &Connection,
    org_id: i64,
    activity_id: i64,
    issue_id: i64,
    now: &NaiveDateTime,
) -> Result<bool, rusqlite::Error> {
    let count = conn.execute(
        "INSERT INTO activity_issue_mapping (activity_id, issue_id, activity_type, org_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(activity_id, issue_id, activity_type, org_id) DO NOTHING",
        params![
            activity_id,
            issue_id,
            ACTIVITY_TYPE_PULL_REQUEST,
            org_id,
            format_timestamp(now)
        ],
    )?;
    Ok(count > 0)
}

// ── Credentials ────────────────────────────────────────────────────

pub fn get_access_token(
    conn: &Connection,
    provider: &str,
    org_id: i64,
) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT access_token FROM user_integration WHERE provider = ?1 AND org_id = ?2",
        params![provider, org_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn get_user_integration_id(
    conn: &Connection,
    provider: &str,
    org_id: i64,
) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row(
        "SELECT id FROM user_integration WHERE provider = ?1 AND org_id = ?2",
        params![provider, org_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_access_token(
    conn: &Connection,
    provider: &str,
    org_id: i64,
    token: &str,
    now: &NaiveDateTime,
) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "INSERT INTO user_integration (provider, org_id, access_token, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(provider, org_id) DO UPDATE SET
            access_token=excluded.access_token, modified_at=excluded.modified_at
         RETURNING id",
        params![provider, org_id, token, format_timestamp(now)],
        |row| row.get(0),
    )
}

// ── Sync status ────────────────────────────────────────────────────

pub fn set_org_sync_status(
    conn: &Connection,
    provider: &str,
    org_id: i64,
    status: &str,
    now: &NaiveDateTime,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO integration_sync_status (provider, org_id, status, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(provider, org_id) DO UPDATE SET
            status=excluded.status, updated_at=excluded.updated_at",
        params![provider, org_id, status, format_timestamp(now)],
    )?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgSyncStatus {
    pub status: String,
    pub updated_at: String,
}

pub fn get_org_sync_status(
    conn: &Connection,
    provider: &str,
    org_id: i64,
) -> Result<Option<OrgSyncStatus>, rusqlite::Error> {
    conn.query_row(
        "SELECT status, updated_at FROM integration_sync_status WHERE provider = ?1 AND org_id = ?2",
        params![provider, org_id],
        |row| {
            Ok(OrgSyncStatus {
                status: row.get(0)?,
                updated_at: row.get(1)?,
            })
        },
    )
    .optional()
}

pub fn upsert_board_sync_status(
    conn: &Connection,
    status: &BoardStatusRow,
) -> Result<(), rusqlite::Error> {
    let now = format_timestamp(&status.now);
    conn.execute(
        "INSERT INTO data_sync_process (
            organization_id, board_id, user_integration_id, sync_type, sync_status,
            issue_count, sprint_count, is_deleted, created_at, modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)
        ON CONFLICT(organization_id, board_id, sync_type) DO UPDATE SET
            user_integration_id=excluded.user_integration_id,
            sync_status=excluded.sync_status, issue_count=excluded.issue_count,
            sprint_count=excluded.sprint_count, modified_at=excluded.modified_at",
        params![
            status.org_id,
            status.board_id,
            status.user_integration_id,
            status.sync_type,
            status.status.as_str(),
            status.issue_count as i64,
            status.sprint_count as i64,
            now,
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardStatusRecord {
    pub board_id: i64,
    pub board_name: String,
    pub sync_status: String,
    pub issue_count: i64,
    pub sprint_count: i64,
    pub modified_at: String,
}

pub fn list_board_statuses(
    conn: &Connection,
    org_id: i64,
) -> Result<Vec<BoardStatusRecord>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT d.board_id, b.name, d.sync_status, d.issue_count, d.sprint_count, d.modified_at
         FROM data_sync_process d JOIN board b ON b.id = d.board_id
         WHERE d.organization_id = ?1 AND d.is_deleted = 0
         ORDER BY b.name",
    )?;
    let rows = stmt.query_map(params![org_id], |row| {
        Ok(BoardStatusRecord {
            board_id: row.get(0)?,
            board_name: row.get(1)?,
            sync_status: row.get(2)?,
            issue_count: row.get(3)?,
            sprint_count: row.get(4)?,
            modified_at: row.get(5)?,
        })
    })?;
    rows.collect()
}

// ── Sync Jobs ──────────────────────────────────────────────────────

pub fn insert_sync_job(conn: &Connection, job_key: &str) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO sync_jobs (job_key, status, started_at)
         VALUES (?1, 'running', datetime('now'))",
        params![job_key],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_sync_job(
    conn: &Connection,
    job_id: i64,
    status: &str,
    summary_json: Option<&str>,
    error_message: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE sync_jobs SET
            status = ?2, finished_at = datetime('now'),
            summary_json = ?3, error_message = ?4
         WHERE id = ?1",
        params![job_id, status, summary_json, error_message],
    )?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJobRecord {
    pub id: i64,
    pub job_key: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub error_message: Option<String>,
}

pub fn latest_sync_job(
    conn: &Connection,
    job_key: &str,
) -> Result<Option<SyncJobRecord>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, job_key, status, started_at, finished_at, error_message
         FROM sync_jobs WHERE job_key = ?1 ORDER BY id DESC LIMIT 1",
        params![job_key],
        |row| {
            Ok(SyncJobRecord {
                id: row.get(0)?,
                job_key: row.get(1)?,
                status: row.get(2)?,
                started_at: row.get(3)?,
                finished_at: row.get(4)?,
                error_message: row.get(5)?,
            })
        },
    )
    .optional()
}
