// Discord commands for the leveling system.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation.

use crate::core::notifier::{Actor, ColorTag, Response};
use crate::discord::replies;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

const LEADERBOARD_DEFAULT: usize = 10;

/// Show your current level and XP.
#[poise::command(slash_command, guild_only)]
pub async fn level(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target_user = user.as_ref().unwrap_or_else(|| ctx.author());
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    if target_user.bot {
        ctx.say("Bots don't earn XP! 🤖").await?;
        return Ok(());
    }

    let stats = ctx
        .data()
        .leveling
        .member_stats(guild_id, target_user.id.get())
        .await?;
    let record = &stats.record;

    let mut embed = serenity::CreateEmbed::new()
        .title(format!("Level of {}", target_user.name))
        .color(ColorTag::Leveling.rgb())
        .thumbnail(target_user.face())
        .field("Level", format!("**{}**", record.level), true)
        .field("Total XP", format!("**{}**", record.xp), true);

    embed = match (stats.next_level_xp, stats.xp_to_next) {
        (Some(next), Some(remaining)) => {
            let curve = &ctx.data().leveling.config().curve;
            let floor = curve.threshold_for(record.level).unwrap_or(0);
            let span = next.saturating_sub(floor).max(1);
            let progress = record.xp.saturating_sub(floor).min(span);
            embed
                .field(
                    "Progress",
                    format!(
                        "{}/{} XP\n{}",
                        progress,
                        span,
                        build_progress_bar(progress as f64 / span as f64, 15)
                    ),
                    false,
                )
                .field("XP to next level", remaining.to_string(), false)
        }
        _ => embed.field("Progress", "Maximum level reached", false),
    };

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the top members by XP.
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "How many members to show (default: 10)"]
    #[min = 1]
    #[max = 25]
    limit: Option<usize>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let records = ctx
        .data()
        .leveling
        .leaderboard(guild_id, limit.unwrap_or(LEADERBOARD_DEFAULT))
        .await?;

    if records.is_empty() {
        ctx.say("Nobody has earned XP here yet.").await?;
        return Ok(());
    }

    let lines: Vec<String> = records
        .iter()
        .enumerate()
        .map(|(rank, record)| {
            format!(
                "**{}.** <@{}> - level {} ({} XP)",
                rank + 1,
                record.member_id,
                record.level,
                record.xp
            )
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title("Leaderboard")
        .description(lines.join("\n"))
        .color(ColorTag::Leveling.rgb());

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Set the level cooldown time (in seconds).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn set_cooldown(
    ctx: Context<'_>,
    #[description = "Seconds between XP awards for the same member"] seconds: i64,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let seconds = ctx
        .data()
        .leveling
        .set_cooldown(Actor::Member(ctx.author().id.get()), guild_id, seconds)
        .await?;

    replies::send(ctx, Response::cooldown_set(seconds)).await
}

/// Manually set a member's level.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn set_level(
    ctx: Context<'_>,
    #[description = "The member whose level to set"] member: serenity::User,
    #[description = "The level to set the member to"] level: i64,
) -> Result<(), Error> {
    if member.bot {
        ctx.say("Bots don't have levels! 🤖").await?;
        return Ok(());
    }
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let record = ctx
        .data()
        .leveling
        .set_level(
            Actor::Member(ctx.author().id.get()),
            guild_id,
            member.id.get(),
            level,
        )
        .await?;

    replies::send(ctx, Response::level_set(&member.tag(), record.level)).await
}

/// Set a role to be awarded at a certain level.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn set_role(
    ctx: Context<'_>,
    #[description = "The level at which to award the role"] level: i64,
    #[description = "The role to award at the specified level"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let level = ctx
        .data()
        .leveling
        .set_role_for_level(
            Actor::Member(ctx.author().id.get()),
            guild_id,
            level,
            role.id.get(),
        )
        .await?;

    replies::send(ctx, Response::role_for_level_set(&role.name, level)).await
}

/// List the roles awarded at each level.
#[poise::command(slash_command, guild_only)]
pub async fn level_roles(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let roles = ctx.data().leveling.role_map(guild_id).await?;
    if roles.is_empty() {
        ctx.say("No level roles configured. Use `/set_role` to add one.")
            .await?;
        return Ok(());
    }

    // BTreeMap iterates in ascending level order.
    let lines: Vec<String> = roles
        .iter()
        .map(|(level, role_id)| format!("Level **{}** → <@&{}>", level, role_id))
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title("Level roles")
        .description(lines.join("\n"))
        .color(ColorTag::Leveling.rgb());

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Wipe a member's XP and level.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_ROLES")]
pub async fn reset_xp(
    ctx: Context<'_>,
    #[description = "The member to reset"] member: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    ctx.data()
        .leveling
        .reset_member(
            Actor::Member(ctx.author().id.get()),
            guild_id,
            member.id.get(),
        )
        .await?;

    replies::send(ctx, Response::member_reset(&member.tag())).await
}

pub(crate) fn build_progress_bar(progress: f64, length: usize) -> String {
    let clamped = progress.clamp(0.0, 1.0);
    let mut filled = (clamped * length as f64).round() as usize;
    if clamped > 0.0 && filled == 0 {
        filled = 1;
    }
    filled = filled.min(length);
    let bar = "▰".repeat(filled) + &"▱".repeat(length - filled);
    format!("{} ({}%)", bar, (clamped * 100.0).round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_shows_any_progress() {
        assert_eq!(build_progress_bar(0.0, 4), "▱▱▱▱ (0%)");
        assert_eq!(build_progress_bar(0.01, 4), "▰▱▱▱ (1%)");
        assert_eq!(build_progress_bar(1.5, 4), "▰▰▰▰ (100%)");
    }
}
