//! Pure transformations from upstream records to persisted rows.
//!
//! Nothing here touches the network or the database. Values that need a
//! lookup (parent surrogate keys, assignee ids, issue type names) are
//! resolved by the sync services and handed in.

pub mod issue;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::date_util::millis_to_local;
use crate::source::{CustomItem, FieldDefinition, Folder, Member, TaskList};

pub use issue::{
    issue_type_lookup, map_task_to_issue, pr_link, truncate_summary, IssueLinks, IssueRow,
    IssueScope, IssueTypeLookup, SUMMARY_MAX_CHARS,
};

/// Natural key of the per-org pseudo-board that holds folderless lists.
pub const ORPHAN_BOARD_KEY: &str = "FOLDERLESS_ORPHAN";
pub const ORPHAN_BOARD_NAME: &str = "Folderless Lists";

pub const PROVIDER: &str = "CLICKUP";
pub const SYNC_TYPE_INITIAL: &str = "INITIAL";

// ── Boards ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct BoardRow {
    pub org_id: i64,
    /// Upstream folder id (or the orphan key).
    pub folder_id: String,
    pub board_key: String,
    pub name: String,
    /// Upstream space id.
    pub account_id: Option<String>,
    pub active: bool,
    pub is_deleted: bool,
    pub is_private: bool,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

pub fn map_folder_to_board(
    folder: &Folder,
    space_id: &str,
    now: NaiveDateTime,
    org_id: i64,
) -> BoardRow {
    BoardRow {
        org_id,
        folder_id: folder.id.clone(),
        board_key: folder.id.clone(),
        name: folder.name.clone(),
        account_id: Some(space_id.to_string()),
        active: !folder.archived,
        is_deleted: folder.archived,
        is_private: folder.hidden,
        created_at: now,
        modified_at: now,
    }
}

pub fn orphan_board(now: NaiveDateTime, org_id: i64) -> BoardRow {
    BoardRow {
        org_id,
        folder_id: ORPHAN_BOARD_KEY.to_string(),
        board_key: ORPHAN_BOARD_KEY.to_string(),
        name: ORPHAN_BOARD_NAME.to_string(),
        account_id: None,
        active: true,
        is_deleted: false,
        is_private: false,
        created_at: now,
        modified_at: now,
    }
}

// ── Sprints ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SprintState {
    Active,
    Future,
    Closed,
    Unknown,
}

impl SprintState {
    /// Stored value; unknown is NULL.
    pub fn as_db(&self) -> Option<&'static str> {
        match self {
            SprintState::Active => Some("active"),
            SprintState::Future => Some("future"),
            SprintState::Closed => Some("closed"),
            SprintState::Unknown => None,
        }
    }
}

/// Temporal state of a list relative to `now`. Recomputed on every sync.
pub fn sprint_state(
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> SprintState {
    match (start, end) {
        (_, Some(end)) if end < now => SprintState::Closed,
        (Some(start), _) if start > now => SprintState::Future,
        (Some(start), Some(end)) if start <= now && now <= end => SprintState::Active,
        _ => SprintState::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SprintRow {
    pub org_id: i64,
    pub board_id: i64,
    /// Upstream list id.
    pub list_id: String,
    /// Upstream folder id the list lives in (or the orphan key).
    pub folder_id: String,
    pub name: String,
    pub goal: Option<String>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub complete_date: Option<NaiveDateTime>,
    pub state: SprintState,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

pub fn map_list_to_sprint(
    list: &TaskList,
    folder_id: &str,
    board_id: i64,
    now: NaiveDateTime,
    org_id: i64,
) -> SprintRow {
    let start_date = list.start_date.and_then(millis_to_local);
    let end_date = list.due_date.and_then(millis_to_local);
    let state = sprint_state(start_date, end_date, now);

    SprintRow {
        org_id,
        board_id,
        list_id: list.id.clone(),
        folder_id: folder_id.to_string(),
        name: list.name.clone(),
        goal: list.content.clone(),
        start_date,
        end_date,
        complete_date: if state == SprintState::Closed { end_date } else { None },
        state,
        is_deleted: list.archived,
        created_at: now,
        modified_at: now,
    }
}

pub fn map_folderless_list_to_sprint(
    list: &TaskList,
    orphan_board_id: i64,
    now: NaiveDateTime,
    org_id: i64,
) -> SprintRow {
    map_list_to_sprint(list, ORPHAN_BOARD_KEY, orphan_board_id, now, org_id)
}

// ── Custom fields ──────────────────────────────────────────────────

/// Which descriptive column a custom field row carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDetail {
    /// Task types carry a free-text description.
    Description(Option<String>),
    /// Field definitions carry their data type.
    DataType(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFieldRow {
    pub org_id: i64,
    /// Upstream field or custom item id.
    pub field_id: String,
    pub name: Option<String>,
    pub detail: FieldDetail,
}

pub fn map_custom_task_type(item: &CustomItem, org_id: i64) -> CustomFieldRow {
    CustomFieldRow {
        org_id,
        field_id: item.id.clone(),
        name: item.name.clone(),
        detail: FieldDetail::Description(item.description.clone()),
    }
}

/// Workspace, space, folder and list fields all share this shape.
pub fn map_field_definition(field: &FieldDefinition, org_id: i64) -> CustomFieldRow {
    CustomFieldRow {
        org_id,
        field_id: field.id.clone(),
        name: field.name.clone(),
        detail: FieldDetail::DataType(field.field_type.clone()),
    }
}

// ── Users ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub org_id: i64,
    pub name: String,
    pub email: String,
    pub user_type: &'static str,
    pub scm_provider: &'static str,
    pub active: bool,
}

/// Members without an email have nothing to dedupe on and are dropped.
pub fn map_member_to_user(member: &Member, org_id: i64) -> Option<UserRow> {
    let email = member
        .user
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())?;
    let name = member
        .user
        .username
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(email);
    Some(UserRow {
        org_id,
        name: name.to_string(),
        email: email.to_string(),
        user_type: "USER",
        scm_provider: PROVIDER,
        active: true,
    })
}

// ── Sync status ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Started,
    InProgress,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Started => "SYNC_STARTED",
            SyncStatus::InProgress => "IN_PROGRESS",
            SyncStatus::Completed => "COMPLETED",
            SyncStatus::Failed => "FAILED",
        }
    }
}

/// Per-board progress row (`data_sync_process`).
#[derive(Debug, Clone, PartialEq)]
pub struct BoardStatusRow {
    pub org_id: i64,
    pub board_id: i64,
    pub user_integration_id: Option<i64>,
    pub status: SyncStatus,
    pub issue_count: u64,
    pub sprint_count: u64,
    pub sync_type: &'static str,
    pub now: NaiveDateTime,
}

pub fn map_board_status(
    board_id: i64,
    user_integration_id: Option<i64>,
    now: NaiveDateTime,
    org_id: i64,
    status: SyncStatus,
    issue_count: u64,
    sprint_count: u64,
) -> BoardStatusRow {
    BoardStatusRow {
        org_id,
        board_id,
        user_integration_id,
        status,
        issue_count,
        sprint_count,
        sync_type: SYNC_TYPE_INITIAL,
        now,
    }
}
