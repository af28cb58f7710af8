use crate::mapping::{map_custom_task_type, map_field_definition, CustomFieldRow};
use crate::source::{FieldScope, SourceClient};
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::SyncContext;

async fn store_fields(db: &Database, ctx: &SyncContext, rows: Vec<CustomFieldRow>) -> u64 {
    let mut count = 0;
    for row in rows {
        let name = row.name.clone().unwrap_or_default();
        let now = ctx.now;
        match db
            .conn()
            .call(move |conn| repository::upsert_custom_field(conn, &row, &now))
            .await
        {
            Ok(_) => {
                log::debug!("Upserted custom field: {name}");
                count += 1;
            }
            Err(e) => log::warn!("Failed to insert custom field '{name}': {e}"),
        }
    }
    count
}

/// Sync the workspace's custom task types (stored with their description).
/// Failures are logged; the count of stored rows is returned.
pub async fn sync_custom_task_types(
    db: &Database,
    source: &dyn SourceClient,
    ctx: &SyncContext,
    team_id: &str,
) -> u64 {
    log::info!("Fetching custom task types...");
    let items = match source.custom_task_types(&ctx.token, team_id).await {
        Ok(items) => items,
        Err(e) => {
            log::warn!("Failed to sync custom task types: {e}");
            return 0;
        }
    };
    log::info!("Found {} custom task types", items.len());

    let rows = items
        .iter()
        .map(|item| map_custom_task_type(item, ctx.org_id))
        .collect();
    store_fields(db, ctx, rows).await
}

/// Sync the custom field definitions of one container (stored with their data type).
pub async fn sync_field_definitions(
    db: &Database,
    source: &dyn SourceClient,
    ctx: &SyncContext,
    scope: FieldScope<'_>,
) -> u64 {
    let fields = match source.custom_fields(&ctx.token, scope).await {
        Ok(fields) => fields,
        Err(e) => {
            log::warn!("Failed to sync {} custom fields: {e}", scope.label());
            return 0;
        }
    };
    if !fields.is_empty() {
        log::info!("Found {} {} custom fields", fields.len(), scope.label());
    }

    let rows = fields
        .iter()
        .map(|field| map_field_definition(field, ctx.org_id))
        .collect();
    store_fields(db, ctx, rows).await
}
