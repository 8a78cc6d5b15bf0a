// Message activity -> XP awards.

use crate::core::leveling::{ActivityOutcome, FailedGrant, LevelingService, RoleGrant};
use crate::discord::leveling_announcements::send_level_up_embed;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;

const ROLE_RETRY_DELAY: Duration = Duration::from_secs(30);
const ROLE_RETRY_ATTEMPTS: u32 = 3;

pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    message: &serenity::Message,
) -> Result<(), Error> {
    // Ignore bot messages (including our own)
    if message.author.bot {
        return Ok(());
    }
    // Only guild messages earn XP
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    let outcome = data
        .leveling
        .on_activity(guild_id.get(), message.author.id.get(), chrono::Utc::now())
        .await?;

    let ActivityOutcome::Awarded {
        level_up, failed, ..
    } = outcome
    else {
        return Ok(());
    };

    if let Some(level_up) = level_up {
        if let Err(err) =
            send_level_up_embed(ctx, message, &data.leveling.config().curve, &level_up).await
        {
            tracing::warn!("Failed to send level-up embed: {err}");
        }
    }

    if !failed.is_empty() {
        schedule_role_retry(Arc::clone(&data.leveling), failed);
    }
    Ok(())
}

/// Retry refused role rewards in the background with a growing delay.
fn schedule_role_retry(leveling: Arc<LevelingService>, failed: Vec<FailedGrant>) {
    tokio::spawn(async move {
        let mut pending: Vec<RoleGrant> = failed.into_iter().map(|f| f.grant).collect();

        for attempt in 1..=ROLE_RETRY_ATTEMPTS {
            tokio::time::sleep(ROLE_RETRY_DELAY * attempt).await;
            let still_failing = leveling.retry_role_grants(&pending).await;
            if still_failing.is_empty() {
                return;
            }
            pending = still_failing.into_iter().map(|f| f.grant).collect();
        }

        for grant in pending {
            tracing::error!(
                guild_id = grant.guild_id,
                member_id = grant.member_id,
                role_id = grant.role_id,
                level = grant.level,
                "Giving up on role reward after {} retries",
                ROLE_RETRY_ATTEMPTS
            );
        }
    });
}
