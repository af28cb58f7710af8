use chrono::NaiveDateTime;

use crate::date_util::millis_to_local;
use crate::source::Task;

/// Longest summary stored; longer names are cut and marked.
pub const SUMMARY_MAX_CHARS: usize = 255;
const TRUNCATION_MARKER: &str = "...";

pub const DEFAULT_ISSUE_TYPE: &str = "task";

/// Name of the task custom field that carries a pull-request URL.
pub const PR_LINK_FIELD: &str = "PR LINK";

/// Container context a task is written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueScope {
    pub board_id: i64,
    pub sprint_id: i64,
    /// Upstream space id, stored as the issue's project.
    pub space_id: String,
}

/// Values the mapper cannot compute on its own. Every field is already a
/// local surrogate key (or a resolved name); `None` means unresolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueLinks {
    pub parent_id: Option<i64>,
    pub top_level_parent_id: Option<i64>,
    pub assignee_id: Option<i64>,
    pub creator_id: Option<i64>,
    pub issue_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
    pub org_id: i64,
    /// Upstream task id.
    pub task_id: String,
    pub key: Option<String>,
    pub summary: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub issue_type: Option<String>,
    pub current_progress: Option<i64>,
    pub story_point: Option<f64>,
    pub time_spent: Option<i64>,
    pub due_date: Option<NaiveDateTime>,
    pub resolution_date: Option<NaiveDateTime>,
    pub status_change_date: NaiveDateTime,
    pub parent_issue_id: Option<i64>,
    pub top_level_parent_id: Option<i64>,
    pub assignee_id: Option<i64>,
    pub creator_id: Option<i64>,
    pub board_id: i64,
    pub sprint_id: i64,
    pub project_id: String,
    pub issue_url: Option<String>,
    pub is_deleted: bool,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

/// Cut a summary to [`SUMMARY_MAX_CHARS`] characters, marker included.
pub fn truncate_summary(name: &str) -> String {
    if name.chars().count() <= SUMMARY_MAX_CHARS {
        return name.to_string();
    }
    let keep = SUMMARY_MAX_CHARS - TRUNCATION_MARKER.len();
    let mut out: String = name.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// How a task's issue type is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueTypeLookup {
    /// No custom item type: the generic type, no lookup.
    Default(&'static str),
    /// Look up the custom field row with this upstream id.
    Lookup(String),
}

pub fn issue_type_lookup(custom_item_id: Option<i64>) -> IssueTypeLookup {
    match custom_item_id {
        None | Some(0) => IssueTypeLookup::Default(DEFAULT_ISSUE_TYPE),
        Some(id) => IssueTypeLookup::Lookup(id.to_string()),
    }
}

/// Email of the first assignee, if there is one.
pub fn assignee_email(task: &Task) -> Option<&str> {
    task.assignees
        .first()
        .and_then(|a| a.email.as_deref())
        .filter(|e| !e.is_empty())
}

pub fn creator_email(task: &Task) -> Option<&str> {
    task.creator
        .as_ref()
        .and_then(|c| c.email.as_deref())
        .filter(|e| !e.is_empty())
}

/// URL stored in the task's `PR LINK` custom field.
pub fn pr_link(task: &Task) -> Option<&str> {
    task.custom_fields
        .iter()
        .find(|f| f.name.as_deref() == Some(PR_LINK_FIELD))
        .and_then(|f| f.value.as_ref())
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn map_task_to_issue(
    task: &Task,
    scope: &IssueScope,
    links: IssueLinks,
    now: NaiveDateTime,
    org_id: i64,
) -> IssueRow {
    let created_at = task.date_created.and_then(millis_to_local).unwrap_or(now);
    let modified_at = task.date_updated.and_then(millis_to_local).unwrap_or(now);

    IssueRow {
        org_id,
        task_id: task.id.clone(),
        key: task.custom_id.clone(),
        summary: truncate_summary(&task.name),
        description: task.description.clone(),
        status: task.status.as_ref().and_then(|s| s.status.clone()),
        priority: task.priority.as_ref().and_then(|p| p.priority.clone()),
        issue_type: links.issue_type,
        current_progress: task.status.as_ref().and_then(|s| s.orderindex),
        story_point: task.points,
        time_spent: task.time_estimate,
        due_date: task.due_date.and_then(millis_to_local),
        resolution_date: task.date_closed.and_then(millis_to_local),
        status_change_date: modified_at,
        parent_issue_id: links.parent_id,
        top_level_parent_id: links.top_level_parent_id,
        assignee_id: links.assignee_id,
        creator_id: links.creator_id,
        board_id: scope.board_id,
        sprint_id: scope.sprint_id,
        project_id: scope.space_id.clone(),
        issue_url: task.url.clone(),
        is_deleted: task.archived,
        created_at,
        modified_at,
    }
}
