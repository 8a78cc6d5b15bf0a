// Leveling domain models.
//
// Plain data plus the ports the leveling service needs. No Discord types:
// ids are raw u64 snowflakes and time is chrono UTC.

use crate::core::errors::{Classified, ErrorKind};
use crate::core::leveling::LevelCurve;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// Durable per-guild, per-member leveling state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub guild_id: u64,
    pub member_id: u64,
    /// Only grows, except through an explicit admin reset.
    pub xp: u64,
    /// Normally `curve.level_from_xp(xp)`; an admin `set_level` may pin it
    /// elsewhere until the next awarded activity recomputes it.
    pub level: u32,
    /// `None` means XP was never awarded, so the cooldown gate is open.
    pub last_award_at: Option<DateTime<Utc>>,
}

impl MemberRecord {
    /// Fresh record for a member that has never earned XP.
    pub fn new(guild_id: u64, member_id: u64) -> Self {
        Self {
            guild_id,
            member_id,
            xp: 0,
            level: 0,
            last_award_at: None,
        }
    }
}

/// level -> role id. Keys are always >= 1. Iteration order is ascending level.
pub type LevelRoleMap = BTreeMap<u32, u64>;

/// A role reward owed to a member for crossing a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGrant {
    pub guild_id: u64,
    pub member_id: u64,
    pub level: u32,
    pub role_id: u64,
}

/// A role reward the platform refused. Can be handed to `retry_role_grants`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedGrant {
    pub grant: RoleGrant,
    pub reason: String,
}

/// Emitted when an activity pushes a member past one or more thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUpEvent {
    pub guild_id: u64,
    pub member_id: u64,
    pub old_level: u32,
    pub new_level: u32,
    pub total_xp: u64,
}

/// Result of `LevelingService::on_activity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// The member is still inside the cooldown window. Nothing changed.
    OnCooldown { remaining: Duration },
    /// XP was granted and persisted.
    Awarded {
        record: MemberRecord,
        level_up: Option<LevelUpEvent>,
        /// Roles the platform accepted, ascending by level.
        granted: Vec<RoleGrant>,
        /// Roles the platform refused. The level change stays persisted.
        failed: Vec<FailedGrant>,
    },
}

/// Read-only view used by the `/level` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberStats {
    pub record: MemberRecord,
    /// Threshold of the level after the current one, if the curve has one.
    pub next_level_xp: Option<u64>,
    /// Remaining XP until `next_level_xp`.
    pub xp_to_next: Option<u64>,
}

/// Tunables for the leveling service.
#[derive(Debug, Clone)]
pub struct LevelingConfig {
    /// XP granted per qualifying activity.
    pub xp_per_activity: u64,
    /// Cooldown used for guilds that never ran `/set_cooldown`.
    pub default_cooldown_secs: u64,
    pub curve: LevelCurve,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            xp_per_activity: 15,
            default_cooldown_secs: 60,
            curve: LevelCurve::default(),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LevelingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Platform call failed: {0}")]
    ExternalCallFailed(String),
}

impl Classified for LevelingError {
    fn kind(&self) -> ErrorKind {
        match self {
            LevelingError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LevelingError::StorageError(_) => ErrorKind::Storage,
            LevelingError::ExternalCallFailed(_) => ErrorKind::ExternalCallFailed,
        }
    }
}

// ============================================================================
// PORTS
// ============================================================================

/// Persistence for member records.
///
/// Stores do no writer coordination of their own: last `put` wins. The
/// leveling service serializes writes per guild.
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Returns a default record (xp 0, level 0, never awarded) when absent.
    async fn get(&self, guild_id: u64, member_id: u64) -> Result<MemberRecord, LevelingError>;

    /// Atomically replace the stored record.
    async fn put(&self, record: &MemberRecord) -> Result<(), LevelingError>;

    /// Highest-XP members of a guild, descending.
    async fn top_members(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<MemberRecord>, LevelingError>;

    /// Delete a member's record so the next `get` returns a default one.
    async fn reset(&self, guild_id: u64, member_id: u64) -> Result<(), LevelingError>;
}

/// Per-guild leveling settings: cooldown and level role rewards.
#[async_trait]
pub trait GuildSettingsStore: Send + Sync {
    /// `None` when the guild never configured a cooldown.
    async fn cooldown_secs(&self, guild_id: u64) -> Result<Option<u64>, LevelingError>;

    async fn set_cooldown_secs(&self, guild_id: u64, seconds: u64) -> Result<(), LevelingError>;

    async fn role_map(&self, guild_id: u64) -> Result<LevelRoleMap, LevelingError>;

    /// Insert or overwrite the role for `level`.
    async fn set_role_for_level(
        &self,
        guild_id: u64,
        level: u32,
        role_id: u64,
    ) -> Result<(), LevelingError>;
}

/// Everything the leveling service persists.
pub trait LevelingStore: MemberStore + GuildSettingsStore {}

impl<T: MemberStore + GuildSettingsStore> LevelingStore for T {}

/// Outbound platform call that hands a role to a member.
#[async_trait]
pub trait RoleGranter: Send + Sync {
    async fn grant_role(
        &self,
        guild_id: u64,
        member_id: u64,
        role_id: u64,
    ) -> Result<(), LevelingError>;
}
