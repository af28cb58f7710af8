use crate::mapping::map_member_to_user;
use crate::source::Team;
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::SyncContext;

/// Mirror the team's members as users. Existing emails are left untouched.
/// Returns the number of members processed.
pub async fn sync_users(db: &Database, ctx: &SyncContext, team: &Team) -> u64 {
    log::info!("Found {} team members", team.members.len());
    let mut processed = 0;
    let mut inserted = 0;

    for member in &team.members {
        let Some(user) = map_member_to_user(member, ctx.org_id) else {
            log::warn!(
                "Skipping member {} without an email",
                member.user.id.as_deref().unwrap_or("?")
            );
            continue;
        };
        let name = user.name.clone();
        let now = ctx.now;
        match db
            .conn()
            .call(move |conn| repository::insert_user_if_absent(conn, &user, &now))
            .await
        {
            Ok(written) => {
                processed += 1;
                if written {
                    inserted += 1;
                    log::debug!("Inserted user: {name}");
                }
            }
            Err(e) => log::warn!("Failed to insert user '{name}': {e}"),
        }
    }

    log::info!("Processed {processed} users ({inserted} new)");
    processed
}
