// Voice state updates -> voice session signals.

use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

pub async fn handle_voice_state_update(
    ctx: &serenity::Context,
    data: &Data,
    new: &serenity::VoiceState,
) -> Result<(), Error> {
    let Some(guild_id) = new.guild_id else {
        return Ok(());
    };
    let bot_id = ctx.cache.current_user().id;

    if new.user_id == bot_id {
        match new.channel_id {
            // Kicked, or the channel was deleted.
            None => {
                if data.voice.on_connection_lost(guild_id.get()).await {
                    tracing::info!(guild_id = guild_id.get(), "Voice connection dropped");
                }
            }
            // Dragged to another channel; songbird follows, so must the session.
            Some(channel_id) => {
                if data.voice.on_bot_moved(guild_id.get(), channel_id.get()).await {
                    tracing::info!(
                        guild_id = guild_id.get(),
                        channel_id = channel_id.get(),
                        "Moved to another voice channel"
                    );
                }
            }
        }
        return Ok(());
    }

    let Some(session) = data.voice.session(guild_id.get()) else {
        return Ok(());
    };
    let Some(listeners) = listeners_in(ctx, guild_id, session.channel_id, bot_id) else {
        tracing::debug!(guild_id = guild_id.get(), "Guild not cached, skipping occupancy check");
        return Ok(());
    };

    data.voice
        .on_voice_state_changed(guild_id.get(), session.channel_id, listeners)
        .await?;
    Ok(())
}

/// Non-bot members currently in `channel_id`, read from the cache.
/// `None` when the guild is not cached.
fn listeners_in(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    channel_id: u64,
    bot_id: serenity::UserId,
) -> Option<usize> {
    let guild = ctx.cache.guild(guild_id)?;
    let count = guild
        .voice_states
        .values()
        .filter(|vs| vs.channel_id.map(|c| c.get()) == Some(channel_id))
        .filter(|vs| vs.user_id != bot_id)
        .filter(|vs| {
            let is_bot = vs
                .member
                .as_ref()
                .map(|m| m.user.bot)
                .or_else(|| guild.members.get(&vs.user_id).map(|m| m.user.bot))
                .unwrap_or(false);
            !is_bot
        })
        .count();
    Some(count)
}
