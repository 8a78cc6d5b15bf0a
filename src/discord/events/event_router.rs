// Gateway events the bot reacts to, translated into core signals.

pub mod activity;
pub mod voice_state;
