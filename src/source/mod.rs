pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod stub;

use async_trait::async_trait;

use crate::error::Result;

pub use client::ClickUpClient;
pub use types::{
    ContainerRef, CustomItem, FieldDefinition, Folder, Member, Space, Task, TaskField, TaskList,
    TaskPriority, TaskStatus, Team, UserRef,
};

/// Page size of the task listing endpoint. A shorter page ends pagination.
pub const TASK_PAGE_SIZE: usize = 100;

/// Upper bound on task pages fetched for one list.
const MAX_TASK_PAGES: u32 = 10_000;

/// The container a custom field definition is listed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope<'a> {
    Workspace(&'a str),
    Space(&'a str),
    Folder(&'a str),
    List(&'a str),
}

impl FieldScope<'_> {
    pub fn path(&self) -> String {
        match self {
            FieldScope::Workspace(id) => format!("team/{id}/field"),
            FieldScope::Space(id) => format!("space/{id}/field"),
            FieldScope::Folder(id) => format!("folder/{id}/field"),
            FieldScope::List(id) => format!("list/{id}/field"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FieldScope::Workspace(_) => "workspace",
            FieldScope::Space(_) => "space",
            FieldScope::Folder(_) => "folder",
            FieldScope::List(_) => "list",
        }
    }
}

/// Read-only view of the upstream workspace.
///
/// Every call takes the org's access token. Non-2xx responses surface as
/// `Error::SourceUnavailable`; nothing here retries.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Authorised teams (workspaces), each with its member list.
    async fn teams(&self, token: &str) -> Result<Vec<Team>>;

    async fn spaces(&self, token: &str, team_id: &str) -> Result<Vec<Space>>;

    async fn folders(&self, token: &str, space_id: &str) -> Result<Vec<Folder>>;

    async fn folder_lists(&self, token: &str, folder_id: &str) -> Result<Vec<TaskList>>;

    async fn folderless_lists(&self, token: &str, space_id: &str) -> Result<Vec<TaskList>>;

    /// One page of a list's tasks, subtasks and closed tasks included.
    async fn task_page(
        &self,
        token: &str,
        list_id: &str,
        page: u32,
        updated_after: Option<i64>,
    ) -> Result<Vec<Task>>;

    /// A single task, carrying its `parent` and `top_level_parent` references.
    async fn task(&self, token: &str, task_id: &str) -> Result<Task>;

    async fn custom_task_types(&self, token: &str, team_id: &str) -> Result<Vec<CustomItem>>;

    async fn custom_fields(&self, token: &str, scope: FieldScope<'_>)
        -> Result<Vec<FieldDefinition>>;

    /// All tasks of a list, following pages until one comes back short.
    async fn tasks(
        &self,
        token: &str,
        list_id: &str,
        updated_after: Option<i64>,
    ) -> Result<Vec<Task>> {
        let mut all = Vec::new();
        let mut page = 0;
        loop {
            let batch = self.task_page(token, list_id, page, updated_after).await?;
            let short = batch.len() < TASK_PAGE_SIZE;
            all.extend(batch);
            if short {
                break;
            }
            page += 1;
            if page >= MAX_TASK_PAGES {
                log::warn!("List {list_id} exceeded {MAX_TASK_PAGES} task pages; stopping");
                break;
            }
        }
        Ok(all)
    }
}
