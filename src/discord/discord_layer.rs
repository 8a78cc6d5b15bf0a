// Discord layer - commands and event handlers.
//
// Everything here translates between serenity/poise types and the core
// services. No business rules live in this layer.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "events/event_router.rs"]
pub mod events;

#[path = "leveling/leveling_announcements.rs"]
pub mod leveling_announcements;

#[path = "replies/replies.rs"]
pub mod replies;

use crate::core::leveling::LevelingService;
use crate::core::moderation::ModerationService;
use crate::core::voice::VoiceSessionManager;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands and events.
pub struct Data {
    pub leveling: Arc<LevelingService>,
    pub voice: Arc<VoiceSessionManager>,
    pub moderation: Arc<ModerationService>,
}
