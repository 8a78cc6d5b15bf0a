// Core moderation module - ban, unban, timeout and channel locks.
// Validation, ban-list lookups and auditing live here; the platform calls sit
// behind the `ModerationGateway` port.

pub mod moderation_models;
pub mod moderation_service;

pub use moderation_models::*;
pub use moderation_service::*;
