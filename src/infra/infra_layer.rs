// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "leveling/leveling_store.rs"]
pub mod leveling;

#[path = "voice/mod.rs"]
pub mod voice;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "audit/mod.rs"]
pub mod audit;
