// Discord commands module.
// Each feature gets its own command file.

pub mod leveling;

pub mod moderation;

pub mod music;

// Bot presence management
pub mod presence;

use crate::discord::{Data, Error};

/// Every slash command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        leveling::level(),
        leveling::leaderboard(),
        leveling::level_roles(),
        leveling::set_cooldown(),
        leveling::set_level(),
        leveling::set_role(),
        leveling::reset_xp(),
        music::play(),
        music::skip(),
        music::leave(),
        music::queue(),
        moderation::ban(),
        moderation::unban(),
        moderation::timeout(),
        moderation::lock(),
        moderation::unlock(),
    ]
}
