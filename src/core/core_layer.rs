// The core module contains all business logic.
// Each feature gets its own submodule. Nothing in here knows about serenity or poise.

#[path = "errors/error_kind.rs"]
pub mod errors;

#[path = "guild_locks/guild_locks.rs"]
pub mod guild_locks;

#[path = "notifier/mod.rs"]
pub mod notifier;

#[path = "leveling/mod.rs"]
pub mod leveling;

#[path = "voice/mod.rs"]
pub mod voice;

#[path = "moderation/mod.rs"]
pub mod moderation;
