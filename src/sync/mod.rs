pub mod boards;
pub mod custom_fields;
pub mod filter;
pub mod issues;
pub mod orchestrator;
pub mod resolver;
pub mod sprints;
pub mod users;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::date_util::{date_start_millis, days_ago_millis};
use crate::mapping::SyncStatus;

/// Options controlling a sync operation.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub since: Option<NaiveDate>,
    pub days: Option<u32>,
}

impl SyncOptions {
    /// Epoch-millisecond threshold for `date_updated_gt`. `since` wins over `days`.
    pub fn updated_after(&self) -> Option<i64> {
        if let Some(d) = self.since {
            date_start_millis(d)
        } else {
            self.days.map(days_ago_millis)
        }
    }
}

/// Key of a full workspace run, shared by the run ledger and the HTTP job registry.
pub fn org_job_key(org_id: i64) -> String {
    format!("org_{org_id}")
}

pub fn board_job_key(board_id: i64) -> String {
    format!("board_{board_id}")
}

/// Per-run values every service and mapper needs.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub org_id: i64,
    pub token: String,
    pub now: NaiveDateTime,
    pub updated_after: Option<i64>,
}

/// Counts for one list's tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub tasks: u64,
    pub failed: u64,
    pub pr_mappings: u64,
}

impl std::ops::AddAssign for TaskCounts {
    fn add_assign(&mut self, other: Self) {
        self.tasks += other.tasks;
        self.failed += other.failed;
        self.pr_mappings += other.pr_mappings;
    }
}

/// What one board's sprints and tasks produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoardContentCounts {
    pub sprints: u64,
    pub issues: u64,
    pub issues_failed: u64,
    pub list_custom_fields: u64,
    pub pr_mappings: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub board_id: i64,
    pub name: String,
    pub issue_count: u64,
    pub sprint_count: u64,
    pub status: SyncStatus,
}

/// Result of a full workspace sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub users: u64,
    pub task_types: u64,
    pub workspace_custom_fields: u64,
    pub space_custom_fields: u64,
    pub folder_custom_fields: u64,
    pub list_custom_fields: u64,
    pub boards: u64,
    /// Folder sprints plus folderless lists.
    pub sprints: u64,
    pub folderless_lists: u64,
    pub issues: u64,
    pub folderless_issues: u64,
    pub failed_issues: u64,
    pub pr_mappings: u64,
    pub board_statuses: Vec<BoardSummary>,
}

impl SyncSummary {
    pub fn log(&self) {
        let rule = "=".repeat(60);
        log::info!("{rule}");
        log::info!("SYNC SUMMARY");
        log::info!("{rule}");
        log::info!("Users: {}", self.users);
        log::info!("Custom task types: {}", self.task_types);
        log::info!("Workspace custom fields: {}", self.workspace_custom_fields);
        log::info!("Space custom fields: {}", self.space_custom_fields);
        log::info!("Boards (folders): {}", self.boards);
        log::info!("Folder custom fields: {}", self.folder_custom_fields);
        log::info!("Sprints (lists): {}", self.sprints);
        log::info!("List custom fields: {}", self.list_custom_fields);
        log::info!("Issues (tasks): {}", self.issues);
        log::info!("Folderless lists: {}", self.folderless_lists);
        log::info!("Folderless issues: {}", self.folderless_issues);
        log::info!("Failed issues: {}", self.failed_issues);
        log::info!("PR-to-issue mappings: {}", self.pr_mappings);
        log::info!("{rule}");
    }
}

/// Result of a single-board sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardSyncSummary {
    pub board_id: i64,
    pub board_name: String,
    pub sprints: u64,
    pub issues: u64,
    pub issues_failed: u64,
    pub list_custom_fields: u64,
    pub pr_mappings: u64,
}

/// Progress callbacks for sync operations.
pub trait SyncProgress: Send + Sync {
    fn on_space_start(&self, _name: &str, _index: usize, _total: usize) {}
    fn on_board_start(&self, _name: &str) {}
    fn on_tasks_fetched(&self, _list_name: &str, _count: usize) {}
    fn on_board_complete(&self, _board: &BoardSummary) {}
}

/// No-op progress implementation.
pub struct NoopProgress;
impl SyncProgress for NoopProgress {}
