// Core voice module - one playback session per guild.
// The actual audio transport sits behind the `VoiceConnector` port.

pub mod voice_models;
pub mod voice_service;

pub use voice_models::*;
pub use voice_service::*;
