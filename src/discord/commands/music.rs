// Discord commands for music playback. The session rules (one channel per
// guild, queueing, idle disconnect) live in the core voice manager.

use crate::core::notifier::{Actor, ColorTag, Response};
use crate::core::voice::{PlayOutcome, SessionState};
use crate::discord::replies;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Play music from a URL.
#[poise::command(
    slash_command,
    guild_only,
    required_bot_permissions = "CONNECT | SPEAK"
)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "The URL of the music to play"] url: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;

    let channel_id = {
        let guild = ctx.guild().ok_or("Could not access guild")?;
        guild
            .voice_states
            .get(&ctx.author().id)
            .and_then(|vs| vs.channel_id)
            .ok_or("You must be in a voice channel to use this command")?
    };

    // Joining a channel can take longer than the interaction deadline.
    ctx.defer().await?;

    let outcome = ctx
        .data()
        .voice
        .play(
            Actor::Member(ctx.author().id.get()),
            guild_id.get(),
            channel_id.get(),
            &url,
        )
        .await?;

    let response = match outcome {
        PlayOutcome::Started { url, .. } => Response::playing(&url),
        PlayOutcome::Queued { url, position } => Response::queued(&url, position),
    };
    replies::send(ctx, response).await
}

/// Skip the current track.
#[poise::command(slash_command, guild_only)]
pub async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;

    ctx.data()
        .voice
        .skip(Actor::Member(ctx.author().id.get()), guild_id.get())
        .await?;

    replies::send(ctx, Response::skipped()).await
}

/// Stop playback and leave the voice channel.
#[poise::command(slash_command, guild_only)]
pub async fn leave(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;

    ctx.data()
        .voice
        .leave(Actor::Member(ctx.author().id.get()), guild_id.get())
        .await?;

    replies::send(ctx, Response::left_voice()).await
}

/// Show the current track and the queue.
#[poise::command(slash_command, guild_only)]
pub async fn queue(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let voice = &ctx.data().voice;

    let Some(session) = voice.session(guild_id.get()) else {
        ctx.say("❌ I'm not in a voice channel").await?;
        return Ok(());
    };

    let now_playing = match (voice.state(guild_id.get()), &session.current_track) {
        (SessionState::Playing, Some(url)) => url.clone(),
        _ => "Nothing".to_string(),
    };
    let upcoming = if session.queue.is_empty() {
        "📭 Queue is empty".to_string()
    } else {
        session
            .queue
            .iter()
            .enumerate()
            .map(|(i, url)| format!("**{}.** {}", i + 1, url))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("🎶 Current Queue")
        .description(format!("Connected to <#{}>", session.channel_id))
        .color(ColorTag::Music.rgb())
        .field("Now playing", now_playing, false)
        .field("Up next", upcoming, false);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
