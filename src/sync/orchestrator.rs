//! Full workspace sync.
//!
//! Order is fixed: users and workspace-level custom fields first (issue
//! mapping looks them up), then every space: its fields, each folder as a
//! board with its sprints and issues, then its folderless lists.

use crate::error::{Error, Result};
use crate::mapping::{map_folder_to_board, SyncStatus, PROVIDER};
use crate::source::{FieldScope, Folder, SourceClient, Space, Team};
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::boards::{record_board_status, sync_board_content};
use crate::sync::custom_fields::{sync_custom_task_types, sync_field_definitions};
use crate::sync::sprints::sync_folderless_lists;
use crate::sync::users::sync_users;
use crate::sync::{BoardContentCounts, BoardSummary, SyncContext, SyncProgress, SyncSummary};

async fn set_org_status(db: &Database, ctx: &SyncContext, status: SyncStatus) -> Result<()> {
    let org_id = ctx.org_id;
    let now = ctx.now;
    db.conn()
        .call(move |conn| {
            repository::set_org_sync_status(conn, PROVIDER, org_id, status.as_str(), &now)
        })
        .await?;
    log::debug!("Org {org_id} sync status: {}", status.as_str());
    Ok(())
}

/// The workspace is the first team the token is authorised for.
async fn discover_team(source: &dyn SourceClient, ctx: &SyncContext) -> Result<Team> {
    let teams = source.teams(&ctx.token).await?;
    let team = teams
        .into_iter()
        .next()
        .ok_or(Error::MissingTeam(ctx.org_id))?;
    log::info!(
        "Using ClickUp team {} ({})",
        team.name.as_deref().unwrap_or("unnamed"),
        team.id
    );
    Ok(team)
}

/// Run a full sync of the org's workspace into its mirror.
///
/// SYNC_STARTED is written before anything is fetched, team discovery
/// included. The org status then moves IN_PROGRESS → COMPLETED, or to
/// FAILED when a fatal error aborts the run.
pub async fn sync_workspace(
    db: &Database,
    source: &dyn SourceClient,
    ctx: &SyncContext,
    progress: &dyn SyncProgress,
) -> Result<SyncSummary> {
    log::info!("Starting ClickUp full sync for org_id={}", ctx.org_id);
    set_org_status(db, ctx, SyncStatus::Started).await?;

    let outcome = match discover_team(source, ctx).await {
        Ok(team) => run(db, source, ctx, &team, progress).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(summary) => {
            summary.log();
            set_org_status(db, ctx, SyncStatus::Completed).await?;
            log::info!("Sync completed for org_id={}", ctx.org_id);
            Ok(summary)
        }
        Err(e) => {
            log::error!("Sync failed for org_id={}: {e}", ctx.org_id);
            if let Err(status_err) = set_org_status(db, ctx, SyncStatus::Failed).await {
                log::warn!("Could not record FAILED status: {status_err}");
            }
            Err(e)
        }
    }
}

async fn run(
    db: &Database,
    source: &dyn SourceClient,
    ctx: &SyncContext,
    team: &Team,
    progress: &dyn SyncProgress,
) -> Result<SyncSummary> {
    let org_id = ctx.org_id;
    let user_integration_id = db
        .conn()
        .call(move |conn| repository::get_user_integration_id(conn, PROVIDER, org_id))
        .await?;

    let mut summary = SyncSummary {
        users: sync_users(db, ctx, team).await,
        task_types: sync_custom_task_types(db, source, ctx, &team.id).await,
        workspace_custom_fields: sync_field_definitions(
            db,
            source,
            ctx,
            FieldScope::Workspace(&team.id),
        )
        .await,
        ..SyncSummary::default()
    };

    set_org_status(db, ctx, SyncStatus::InProgress).await?;

    let spaces = source.spaces(&ctx.token, &team.id).await?;
    log::info!("Found {} spaces", spaces.len());

    let mut orphan_board_id = None;

    for (index, space) in spaces.iter().enumerate() {
        progress.on_space_start(&space.name, index, spaces.len());
        log::info!("Processing space: {}", space.name);

        summary.space_custom_fields +=
            sync_field_definitions(db, source, ctx, FieldScope::Space(&space.id)).await;

        match source.folders(&ctx.token, &space.id).await {
            Ok(folders) => {
                log::info!("Found {} folders (boards)", folders.len());
                for folder in &folders {
                    sync_folder(
                        db,
                        source,
                        ctx,
                        space,
                        folder,
                        user_integration_id,
                        progress,
                        &mut summary,
                    )
                    .await;
                }
            }
            Err(e) => log::warn!("Failed to fetch folders for space '{}': {e}", space.name),
        }

        let folderless =
            sync_folderless_lists(db, source, ctx, space, &mut orphan_board_id, progress).await;
        summary.folderless_lists += folderless.lists;
        summary.sprints += folderless.lists;
        summary.folderless_issues += folderless.issues;
        summary.failed_issues += folderless.issues_failed;
        summary.list_custom_fields += folderless.list_custom_fields;
        summary.pr_mappings += folderless.pr_mappings;
    }

    Ok(summary)
}

/// One folder as one board. Failures stay inside the folder.
#[allow(clippy::too_many_arguments)]
async fn sync_folder(
    db: &Database,
    source: &dyn SourceClient,
    ctx: &SyncContext,
    space: &Space,
    folder: &Folder,
    user_integration_id: Option<i64>,
    progress: &dyn SyncProgress,
    summary: &mut SyncSummary,
) {
    let row = map_folder_to_board(folder, &space.id, ctx.now, ctx.org_id);
    let board_id = match db
        .conn()
        .call(move |conn| repository::upsert_board(conn, &row))
        .await
    {
        Ok(id) => id,
        Err(e) => {
            log::warn!("Failed to insert board '{}': {e}", folder.name);
            return;
        }
    };
    summary.boards += 1;
    log::debug!("Upserted board '{}' as id {board_id}", folder.name);
    progress.on_board_start(&folder.name);

    if let Err(e) = record_board_status(
        db,
        ctx,
        board_id,
        user_integration_id,
        SyncStatus::InProgress,
        &BoardContentCounts::default(),
    )
    .await
    {
        log::warn!("Failed to mark board '{}' in progress: {e}", folder.name);
    }

    summary.folder_custom_fields +=
        sync_field_definitions(db, source, ctx, FieldScope::Folder(&folder.id)).await;

    let (status, counts) =
        match sync_board_content(db, source, ctx, board_id, &folder.id, &space.id, progress).await {
            Ok(counts) => (SyncStatus::Completed, counts),
            Err(e) => {
                log::warn!("Failed to sync lists of folder '{}': {e}", folder.name);
                (SyncStatus::Failed, BoardContentCounts::default())
            }
        };

    summary.sprints += counts.sprints;
    summary.issues += counts.issues;
    summary.failed_issues += counts.issues_failed;
    summary.list_custom_fields += counts.list_custom_fields;
    summary.pr_mappings += counts.pr_mappings;

    if let Err(e) =
        record_board_status(db, ctx, board_id, user_integration_id, status, &counts).await
    {
        log::warn!("Failed to record status for board '{}': {e}", folder.name);
    }

    let board = BoardSummary {
        board_id,
        name: folder.name.clone(),
        issue_count: counts.issues,
        sprint_count: counts.sprints,
        status,
    };
    progress.on_board_complete(&board);
    summary.board_statuses.push(board);
}
