//! In-memory `SourceClient` for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    ContainerRef, CustomItem, FieldDefinition, FieldScope, Folder, Member, SourceClient, Space,
    Task, TaskList, Team, UserRef, TASK_PAGE_SIZE,
};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct StubSource {
    pub teams: Mutex<Vec<Team>>,
    pub spaces: Mutex<Vec<Space>>,
    pub folders: Mutex<HashMap<String, Vec<Folder>>>,
    pub folder_lists: Mutex<HashMap<String, Vec<TaskList>>>,
    pub folderless_lists: Mutex<HashMap<String, Vec<TaskList>>>,
    pub list_tasks: Mutex<HashMap<String, Vec<Task>>>,
    /// Tasks reachable through the single-task endpoint.
    pub tasks_by_id: Mutex<HashMap<String, Task>>,
    pub custom_items: Mutex<Vec<CustomItem>>,
    pub fields: Mutex<HashMap<String, Vec<FieldDefinition>>>,
    /// Paths whose requests fail with `SourceUnavailable`.
    pub failing: Mutex<HashSet<String>>,
    pub task_fetches: Mutex<Vec<String>>,
    pub page_requests: Mutex<Vec<(String, u32, Option<i64>)>>,
}

impl StubSource {
    pub fn put_tasks(&self, list_id: &str, tasks: Vec<Task>) {
        self.list_tasks
            .lock()
            .unwrap()
            .insert(list_id.to_string(), tasks);
    }

    pub fn put_remote_task(&self, task: Task) {
        self.tasks_by_id
            .lock()
            .unwrap()
            .insert(task.id.clone(), task);
    }

    pub fn fail(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn task_fetches(&self) -> Vec<String> {
        self.task_fetches.lock().unwrap().clone()
    }

    pub fn requested_pages(&self, list_id: &str) -> Vec<u32> {
        self.page_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| id == list_id)
            .map(|(_, page, _)| *page)
            .collect()
    }

    pub fn task_filters(&self, list_id: &str) -> Vec<Option<i64>> {
        self.page_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| id == list_id)
            .map(|(_, _, filter)| *filter)
            .collect()
    }

    fn check(&self, path: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(Error::SourceUnavailable(format!("GET {path} returned 503")));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceClient for StubSource {
    async fn teams(&self, _token: &str) -> Result<Vec<Team>> {
        self.check("team")?;
        Ok(self.teams.lock().unwrap().clone())
    }

    async fn spaces(&self, _token: &str, team_id: &str) -> Result<Vec<Space>> {
        self.check(&format!("team/{team_id}/space"))?;
        Ok(self.spaces.lock().unwrap().clone())
    }

    async fn folders(&self, _token: &str, space_id: &str) -> Result<Vec<Folder>> {
        self.check(&format!("space/{space_id}/folder"))?;
        Ok(self
            .folders
            .lock()
            .unwrap()
            .get(space_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn folder_lists(&self, _token: &str, folder_id: &str) -> Result<Vec<TaskList>> {
        self.check(&format!("folder/{folder_id}/list"))?;
        Ok(self
            .folder_lists
            .lock()
            .unwrap()
            .get(folder_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn folderless_lists(&self, _token: &str, space_id: &str) -> Result<Vec<TaskList>> {
        self.check(&format!("space/{space_id}/list"))?;
        Ok(self
            .folderless_lists
            .lock()
            .unwrap()
            .get(space_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn task_page(
        &self,
        _token: &str,
        list_id: &str,
        page: u32,
        updated_after: Option<i64>,
    ) -> Result<Vec<Task>> {
        self.page_requests
            .lock()
            .unwrap()
            .push((list_id.to_string(), page, updated_after));
        self.check(&format!("list/{list_id}/task"))?;
        let tasks = self
            .list_tasks
            .lock()
            .unwrap()
            .get(list_id)
            .cloned()
            .unwrap_or_default();
        let start = page as usize * TASK_PAGE_SIZE;
        Ok(tasks
            .into_iter()
            .skip(start)
            .take(TASK_PAGE_SIZE)
            .collect())
    }

    async fn task(&self, _token: &str, task_id: &str) -> Result<Task> {
        self.task_fetches.lock().unwrap().push(task_id.to_string());
        self.check(&format!("task/{task_id}"))?;
        self.tasks_by_id
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::SourceUnavailable(format!("GET task/{task_id} returned 404")))
    }

    async fn custom_task_types(&self, _token: &str, team_id: &str) -> Result<Vec<CustomItem>> {
        self.check(&format!("team/{team_id}/custom_item"))?;
        Ok(self.custom_items.lock().unwrap().clone())
    }

    async fn custom_fields(
        &self,
        _token: &str,
        scope: FieldScope<'_>,
    ) -> Result<Vec<FieldDefinition>> {
        let path = scope.path();
        self.check(&path)?;
        Ok(self
            .fields
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or_default())
    }
}

// ── Builders ───────────────────────────────────────────────────────

pub fn task(id: &str, name: &str) -> Task {
    Task {
        id: id.to_string(),
        custom_id: None,
        name: name.to_string(),
        description: None,
        status: None,
        date_created: None,
        date_updated: None,
        date_closed: None,
        due_date: None,
        archived: false,
        creator: None,
        assignees: Vec::new(),
        parent: None,
        top_level_parent: None,
        priority: None,
        points: None,
        time_estimate: None,
        custom_fields: Vec::new(),
        custom_item_id: None,
        url: None,
        list: None,
        space: None,
    }
}

pub fn child_task(id: &str, name: &str, parent: &str, top_level: &str) -> Task {
    Task {
        parent: Some(parent.to_string()),
        top_level_parent: Some(top_level.to_string()),
        ..task(id, name)
    }
}

pub fn list(
    id: &str,
    name: &str,
    start: Option<i64>,
    due: Option<i64>,
    space_id: &str,
) -> TaskList {
    TaskList {
        id: id.to_string(),
        name: name.to_string(),
        content: None,
        start_date: start,
        due_date: due,
        archived: false,
        space: Some(ContainerRef {
            id: space_id.to_string(),
            name: None,
        }),
        folder: None,
    }
}

pub fn folder(id: &str, name: &str) -> Folder {
    Folder {
        id: id.to_string(),
        name: name.to_string(),
        hidden: false,
        archived: false,
        space: None,
    }
}

pub fn space(id: &str, name: &str) -> Space {
    Space {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn member(id: &str, username: Option<&str>, email: Option<&str>) -> Member {
    Member {
        user: UserRef {
            id: Some(id.to_string()),
            username: username.map(str::to_string),
            email: email.map(str::to_string),
        },
    }
}

pub fn team(id: &str, members: Vec<Member>) -> Team {
    Team {
        id: id.to_string(),
        name: Some("Workspace".to_string()),
        members,
    }
}
