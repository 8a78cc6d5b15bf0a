// Turns core `Response`s into embeds.

use crate::core::errors::{Classified, ErrorKind};
use crate::core::leveling::LevelingError;
use crate::core::moderation::ModerationError;
use crate::core::notifier::Response;
use crate::core::voice::VoiceError;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

pub fn embed(response: &Response) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title(&response.title)
        .color(response.color_tag.rgb())
}

/// Reply to the invoking interaction with the response embed.
pub async fn send(ctx: Context<'_>, response: Response) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().embed(embed(&response)))
        .await?;
    Ok(())
}

/// Kind of a command failure, when it came from a core service.
pub fn error_kind(error: &Error) -> Option<ErrorKind> {
    if let Some(e) = error.downcast_ref::<LevelingError>() {
        return Some(e.kind());
    }
    if let Some(e) = error.downcast_ref::<VoiceError>() {
        return Some(e.kind());
    }
    error.downcast_ref::<ModerationError>().map(|e| e.kind())
}
