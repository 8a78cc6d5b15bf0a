use crate::core::leveling::{LevelCurve, LevelUpEvent};
use crate::core::notifier::{ColorTag, Response};
use crate::discord::commands::leveling::build_progress_bar;
use crate::discord::replies;
use poise::serenity_prelude::{self as serenity, builder::CreateMessage};

/// Announce a level-up in the channel where the member earned it.
pub async fn send_level_up_embed(
    ctx: &serenity::Context,
    message: &serenity::Message,
    curve: &LevelCurve,
    level_up: &LevelUpEvent,
) -> Result<(), serenity::Error> {
    let response = Response::level_up(&message.author.name, level_up.new_level);
    let mut embed = replies::embed(&response)
        .description(format!(
            "<@{}> reached level {}!",
            level_up.member_id, level_up.new_level
        ))
        .field("Total XP", level_up.total_xp.to_string(), true);

    if let Some(next) = curve.threshold_for(level_up.new_level.saturating_add(1)) {
        let floor = curve.threshold_for(level_up.new_level).unwrap_or(0);
        let span = next.saturating_sub(floor).max(1);
        let progress = level_up.total_xp.saturating_sub(floor).min(span);
        embed = embed.field(
            "Progress",
            format!(
                "{}/{} XP\n{}",
                progress,
                span,
                build_progress_bar(progress as f64 / span as f64, 18)
            ),
            false,
        );
    }

    message
        .channel_id
        .send_message(
            ctx,
            CreateMessage::new().embed(
                embed
                    .color(level_color(level_up.new_level))
                    .footer(serenity::CreateEmbedFooter::new(flavor_line(
                        level_up.new_level,
                    ))),
            ),
        )
        .await
        .map(|_| ())
}

fn level_color(level: u32) -> serenity::Colour {
    if level >= 50 {
        serenity::Colour::DARK_PURPLE
    } else if level >= 25 {
        serenity::Colour::ORANGE
    } else if level >= 10 {
        serenity::Colour::GOLD
    } else {
        serenity::Colour::new(ColorTag::Leveling.rgb())
    }
}

fn flavor_line(level: u32) -> &'static str {
    const FLAVOR_LINES: [&str; 4] = [
        "Keep the streak going!",
        "Your grind is paying off.",
        "Another level, another flex.",
        "That XP bar never stood a chance.",
    ];

    FLAVOR_LINES[level as usize % FLAVOR_LINES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_levels_use_the_leveling_color() {
        assert_eq!(level_color(1), serenity::Colour::new(0x00FF00));
        assert_eq!(level_color(10), serenity::Colour::GOLD);
        assert_eq!(level_color(60), serenity::Colour::DARK_PURPLE);
    }
}
