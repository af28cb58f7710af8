//! Task → issue writer with on-demand ancestor resolution.
//!
//! A task names its immediate `parent` and its `top_level_parent` by
//! upstream id. Each reference is resolved on its own: a local lookup first,
//! and on a miss the ancestor is fetched from the source, written through
//! this same path (resolving its own ancestors), and its new id used.
//! Resolution failures never block the task itself; the link is left NULL.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::mapping::{
    issue::{assignee_email, creator_email},
    issue_type_lookup, map_task_to_issue, IssueLinks, IssueScope, IssueTypeLookup,
};
use crate::source::{SourceClient, Task};
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::SyncContext;

/// Longest ancestor chain followed before giving up.
pub const MAX_PARENT_DEPTH: usize = 32;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct IssueWriter<'a> {
    db: &'a Database,
    source: &'a dyn SourceClient,
    ctx: &'a SyncContext,
}

impl<'a> IssueWriter<'a> {
    pub fn new(db: &'a Database, source: &'a dyn SourceClient, ctx: &'a SyncContext) -> Self {
        Self { db, source, ctx }
    }

    /// Map and upsert one task. Returns the issue's local id.
    pub async fn write(&self, task: &Task, scope: &IssueScope) -> Result<i64> {
        self.write_task(task, scope, vec![task.id.clone()]).await
    }

    /// `chain` holds the upstream ids currently being written, outermost first.
    fn write_task<'b>(
        &'b self,
        task: &'b Task,
        scope: &'b IssueScope,
        chain: Vec<String>,
    ) -> BoxFuture<'b, Result<i64>> {
        Box::pin(async move {
            let parent_id = match task.parent.as_deref() {
                Some(reference) => self.resolve_reference(task, reference, scope, &chain).await,
                None => None,
            };
            let top_level_parent_id = match task.top_level_parent.as_deref() {
                Some(reference) => self.resolve_reference(task, reference, scope, &chain).await,
                None => None,
            };

            let links = IssueLinks {
                parent_id,
                top_level_parent_id,
                assignee_id: self.resolve_user(task, assignee_email(task), "Assignee").await,
                creator_id: self.resolve_user(task, creator_email(task), "Creator").await,
                issue_type: self.resolve_issue_type(task).await,
            };
            let row = map_task_to_issue(task, scope, links, self.ctx.now, self.ctx.org_id);

            let id = self
                .db
                .conn()
                .call(move |conn| repository::upsert_issue(conn, &row))
                .await?;
            log::debug!("Upserted issue '{}' ({}) as id {id}", task.name, task.id);
            Ok(id)
        })
    }

    /// Local id for an upstream task reference, fetching and writing the
    /// referenced task if it is not mirrored yet. `None` means unresolved.
    fn resolve_reference<'b>(
        &'b self,
        task: &'b Task,
        reference: &'b str,
        scope: &'b IssueScope,
        chain: &'b [String],
    ) -> BoxFuture<'b, Option<i64>> {
        Box::pin(async move {
            if reference == task.id {
                log::debug!("Task {} references itself; ignoring", task.id);
                return None;
            }

            let org_id = self.ctx.org_id;
            let lookup = self
                .db
                .conn()
                .call({
                    let reference = reference.to_string();
                    move |conn| repository::find_issue_id(conn, org_id, &reference)
                })
                .await;
            match lookup {
                Ok(Some(id)) => return Some(id),
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Lookup of parent {reference} for task '{}' failed: {e}", task.name);
                    return None;
                }
            }

            if chain.iter().any(|id| id == reference) {
                log::warn!(
                    "Cycle in task hierarchy at {reference} (chain: {}); leaving link unresolved",
                    chain.join(" -> ")
                );
                return None;
            }
            if chain.len() >= MAX_PARENT_DEPTH {
                log::warn!(
                    "Task hierarchy deeper than {MAX_PARENT_DEPTH} at {reference}; leaving link unresolved"
                );
                return None;
            }

            let ancestor = match self.source.task(&self.ctx.token, reference).await {
                Ok(t) => t,
                Err(e) => {
                    log::warn!(
                        "Parent not found for task '{}' (ClickUp parent: {reference}): {e}",
                        task.name
                    );
                    return None;
                }
            };
            log::info!("Fetched missing ancestor '{}' ({reference})", ancestor.name);

            let mut next = chain.to_vec();
            next.push(ancestor.id.clone());
            match self.write_task(&ancestor, scope, next).await {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!("Failed to insert ancestor {reference}: {e}");
                    None
                }
            }
        })
    }

    async fn resolve_user(&self, task: &Task, email: Option<&str>, role: &str) -> Option<i64> {
        let email = email?.to_string();
        let org_id = self.ctx.org_id;
        let found = self
            .db
            .conn()
            .call({
                let email = email.clone();
                move |conn| repository::find_user_by_email(conn, org_id, &email)
            })
            .await;
        match found {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                log::warn!("{role} not found for task '{}' (email: {email})", task.name);
                None
            }
            Err(e) => {
                log::warn!("{role} lookup failed for task '{}': {e}", task.name);
                None
            }
        }
    }

    async fn resolve_issue_type(&self, task: &Task) -> Option<String> {
        let field_id = match issue_type_lookup(task.custom_item_id) {
            IssueTypeLookup::Default(name) => return Some(name.to_string()),
            IssueTypeLookup::Lookup(id) => id,
        };
        let org_id = self.ctx.org_id;
        let found = self
            .db
            .conn()
            .call({
                let field_id = field_id.clone();
                move |conn| repository::get_custom_field_name(conn, org_id, &field_id)
            })
            .await;
        match found {
            Ok(Some(name)) => Some(name),
            Ok(None) => {
                log::warn!(
                    "Custom field not found for task '{}' (custom_item_id: {field_id})",
                    task.name
                );
                None
            }
            Err(e) => {
                log::warn!("Issue type lookup failed for task '{}': {e}", task.name);
                None
            }
        }
    }
}
