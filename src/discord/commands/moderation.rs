// Discord commands for moderation. Input validation and the audit trail are
// handled by the core moderation service.

use crate::core::moderation::ChannelKind;
use crate::core::notifier::{Actor, Response};
use crate::discord::replies;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Ban a member from the server.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "The member to ban"] member: serenity::User,
    #[description = "The reason for the ban"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    ctx.data()
        .moderation
        .ban(
            Actor::Member(ctx.author().id.get()),
            guild_id.get(),
            member.id.get(),
            reason.as_deref(),
        )
        .await?;

    replies::send(ctx, Response::banned(&member.tag())).await
}

/// Unban a member from the server.
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "The member to unban (name#1234, name or user ID)"] member: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let user = ctx
        .data()
        .moderation
        .unban(
            Actor::Member(ctx.author().id.get()),
            guild_id.get(),
            &member,
        )
        .await?;

    replies::send(ctx, Response::unbanned(&user.to_string())).await
}

/// Timeout a member for a number of seconds.
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "The member to timeout"] member: serenity::User,
    #[description = "The number of seconds to timeout the member for"] seconds: i64,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    ctx.data()
        .moderation
        .timeout(
            Actor::Member(ctx.author().id.get()),
            guild_id.get(),
            member.id.get(),
            seconds,
            chrono::Utc::now(),
        )
        .await?;

    // The service only accepts positive durations.
    let seconds = seconds.unsigned_abs();
    replies::send(ctx, Response::timed_out(&member.tag(), seconds)).await
}

/// Lock a text or voice channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn lock(
    ctx: Context<'_>,
    #[description = "The channel to lock"]
    #[channel_types("Text", "Voice")]
    channel: serenity::GuildChannel,
) -> Result<(), Error> {
    set_lock(ctx, channel, true).await
}

/// Unlock a text or voice channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn unlock(
    ctx: Context<'_>,
    #[description = "The channel to unlock"]
    #[channel_types("Text", "Voice")]
    channel: serenity::GuildChannel,
) -> Result<(), Error> {
    set_lock(ctx, channel, false).await
}

async fn set_lock(
    ctx: Context<'_>,
    channel: serenity::GuildChannel,
    locked: bool,
) -> Result<(), Error> {
    let kind = channel_kind(channel.kind).ok_or("Only text and voice channels can be locked")?;
    let actor = Actor::Member(ctx.author().id.get());
    let moderation = &ctx.data().moderation;

    if locked {
        moderation
            .lock(actor, channel.guild_id.get(), channel.id.get(), kind)
            .await?;
    } else {
        moderation
            .unlock(actor, channel.guild_id.get(), channel.id.get(), kind)
            .await?;
    }

    // Embed titles don't render mentions.
    let label = match kind {
        ChannelKind::Text => format!("#{}", channel.name),
        ChannelKind::Voice => channel.name.clone(),
    };
    let response = if locked {
        Response::locked(&label)
    } else {
        Response::unlocked(&label)
    };
    replies::send(ctx, response).await
}

fn channel_kind(kind: serenity::ChannelType) -> Option<ChannelKind> {
    match kind {
        serenity::ChannelType::Text | serenity::ChannelType::News => Some(ChannelKind::Text),
        serenity::ChannelType::Voice | serenity::ChannelType::Stage => Some(ChannelKind::Voice),
        _ => None,
    }
}
