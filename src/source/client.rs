use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{
    CustomItemsEnvelope, FieldsEnvelope, FoldersEnvelope, ListsEnvelope, SpacesEnvelope,
    TasksEnvelope, TeamsEnvelope,
};
use super::{
    CustomItem, FieldDefinition, FieldScope, Folder, SourceClient, Space, Task, TaskList, Team,
};
use crate::config::Config;
use crate::error::{Error, Result};

/// HTTP client for the ClickUp v2 REST API.
#[derive(Clone)]
pub struct ClickUpClient {
    base: Url,
    http: Client,
}

impl ClickUpClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        // A trailing slash makes `Url::join` append instead of replacing the last segment.
        let normalized = format!("{}/", api_url.trim_end_matches('/'));
        let base = Url::parse(&normalized)
            .map_err(|e| Error::Config(format!("invalid ClickUp API URL '{api_url}': {e}")))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to build ClickUp HTTP client: {e}")))?;

        Ok(Self { base, http })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_url, config.request_timeout)
    }

    pub(crate) fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("invalid ClickUp path '{path}': {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, token: &str, url: Url) -> Result<T> {
        let auth = header::HeaderValue::from_str(token)
            .map_err(|e| Error::Config(format!("access token is not a valid header value: {e}")))?;

        log::trace!("GET {url}");
        let response = self
            .http
            .get(url.clone())
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("GET {}: {e}", url.path())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("reading {}: {e}", url.path())))?;

        if !status.is_success() {
            return Err(Error::SourceUnavailable(format!(
                "GET {} returned {status}: {body}",
                url.path()
            )));
        }

        serde_json::from_str(&body).map_err(|e| Error::Decode(format!("{}: {e}", url.path())))
    }

    async fn get_path<T: DeserializeOwned>(&self, token: &str, path: &str) -> Result<T> {
        let url = self.endpoint(path, &[])?;
        self.get_json(token, url).await
    }
}

/// Query string for one page of a list's tasks.
pub(crate) fn task_page_query(
    page: u32,
    updated_after: Option<i64>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("subtasks", "true".to_string()),
        ("order_by", "updated".to_string()),
        ("include_closed", "true".to_string()),
        ("page", page.to_string()),
    ];
    if let Some(ms) = updated_after {
        query.push(("date_updated_gt", ms.to_string()));
    }
    query
}

#[async_trait]
impl SourceClient for ClickUpClient {
    async fn teams(&self, token: &str) -> Result<Vec<Team>> {
        let env: TeamsEnvelope = self.get_path(token, "team").await?;
        Ok(env.teams)
    }

    async fn spaces(&self, token: &str, team_id: &str) -> Result<Vec<Space>> {
        let env: SpacesEnvelope = self.get_path(token, &format!("team/{team_id}/space")).await?;
        Ok(env.spaces)
    }

    async fn folders(&self, token: &str, space_id: &str) -> Result<Vec<Folder>> {
        let env: FoldersEnvelope = self
            .get_path(token, &format!("space/{space_id}/folder"))
            .await?;
        Ok(env.folders)
    }

    async fn folder_lists(&self, token: &str, folder_id: &str) -> Result<Vec<TaskList>> {
        let env: ListsEnvelope = self
            .get_path(token, &format!("folder/{folder_id}/list"))
            .await?;
        Ok(env.lists)
    }

    async fn folderless_lists(&self, token: &str, space_id: &str) -> Result<Vec<TaskList>> {
        let env: ListsEnvelope = self.get_path(token, &format!("space/{space_id}/list")).await?;
        Ok(env.lists)
    }

    async fn task_page(
        &self,
        token: &str,
        list_id: &str,
        page: u32,
        updated_after: Option<i64>,
    ) -> Result<Vec<Task>> {
        let url = self.endpoint(
            &format!("list/{list_id}/task"),
            &task_page_query(page, updated_after),
        )?;
        let env: TasksEnvelope = self.get_json(token, url).await?;
        Ok(env.tasks)
    }

    async fn task(&self, token: &str, task_id: &str) -> Result<Task> {
        let url = self.endpoint(
            &format!("task/{task_id}"),
            &[("include_subtasks", "true".to_string())],
        )?;
        self.get_json(token, url).await
    }

    async fn custom_task_types(&self, token: &str, team_id: &str) -> Result<Vec<CustomItem>> {
        let env: CustomItemsEnvelope = self
            .get_path(token, &format!("team/{team_id}/custom_item"))
            .await?;
        Ok(env.custom_items)
    }

    async fn custom_fields(
        &self,
        token: &str,
        scope: FieldScope<'_>,
    ) -> Result<Vec<FieldDefinition>> {
        let env: FieldsEnvelope = self.get_path(token, &scope.path()).await?;
        Ok(env.fields)
    }
}
