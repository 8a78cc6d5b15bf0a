// Core leveling module - XP awards, level transitions, role rewards.
// Same split as the other core features: models, service, and the curve math.

pub mod level_curve;
pub mod leveling_models;
pub mod leveling_service;

pub use level_curve::*;
pub use leveling_models::*;
pub use leveling_service::*;
