// Bot presence. Discord-layer glue only.

use poise::serenity_prelude as serenity;

/// Show the configured status message. Called once the bot is ready.
pub fn on_ready(ctx: &serenity::Context, status_message: &str) {
    let activity = serenity::ActivityData::playing(status_message);
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}
