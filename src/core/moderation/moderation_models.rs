// Moderation domain models - data structures for moderation actions.
//
// These are pure domain types with no Discord dependencies.
// The infra layer converts them to Discord API calls.

use crate::core::errors::{Classified, ErrorKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Longest timeout the platform accepts.
pub const MAX_TIMEOUT_SECS: i64 = 28 * 24 * 60 * 60;

/// Longest audit-log reason the platform accepts.
pub const MAX_REASON_LEN: usize = 512;

/// An entry of a guild's ban list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannedUser {
    pub user_id: u64,
    pub name: String,
    /// Legacy four-digit tag. `None` for accounts on the new username system.
    pub discriminator: Option<u16>,
}

impl fmt::Display for BannedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.discriminator {
            Some(tag) => write!(f, "{}#{:04}", self.name, tag),
            None => f.write_str(&self.name),
        }
    }
}

/// How an unban target was typed by the moderator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BanQuery {
    /// `123456789` or `<@123456789>`
    Id(u64),
    /// `name#1234`
    Tagged { name: String, discriminator: u16 },
    /// `name`
    Name(String),
}

impl BanQuery {
    pub fn parse(raw: &str) -> Result<Self, ModerationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ModerationError::InvalidArgument(
                "Unban target must not be empty".to_string(),
            ));
        }

        let unwrapped = raw
            .strip_prefix("<@")
            .and_then(|rest| rest.strip_suffix('>'))
            .map(|rest| rest.trim_start_matches('!'))
            .unwrap_or(raw);
        if let Ok(id) = unwrapped.parse::<u64>() {
            return Ok(BanQuery::Id(id));
        }

        if let Some((name, tag)) = raw.rsplit_once('#') {
            if let Ok(discriminator) = tag.parse::<u16>() {
                if !name.is_empty() && tag.len() == 4 {
                    return Ok(BanQuery::Tagged {
                        name: name.to_string(),
                        discriminator,
                    });
                }
            }
        }

        Ok(BanQuery::Name(raw.to_string()))
    }

    pub fn matches(&self, user: &BannedUser) -> bool {
        match self {
            BanQuery::Id(id) => user.user_id == *id,
            BanQuery::Tagged {
                name,
                discriminator,
            } => user.name == *name && user.discriminator == Some(*discriminator),
            BanQuery::Name(name) => user.name == *name,
        }
    }
}

/// Channels that can be locked, and the permission each lock denies to @everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Locking denies sending messages.
    Text,
    /// Locking denies connecting.
    Voice,
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} is not in the ban list")]
    NotFound(String),

    #[error("Moderation call failed: {0}")]
    ExternalCallFailed(String),
}

impl Classified for ModerationError {
    fn kind(&self) -> ErrorKind {
        match self {
            ModerationError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ModerationError::NotFound(_) => ErrorKind::NotFound,
            ModerationError::ExternalCallFailed(_) => ErrorKind::ExternalCallFailed,
        }
    }
}

/// Platform calls needed by the moderation service.
#[async_trait]
pub trait ModerationGateway: Send + Sync {
    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: Option<&str>,
    ) -> Result<(), ModerationError>;

    async fn list_bans(&self, guild_id: u64) -> Result<Vec<BannedUser>, ModerationError>;

    async fn unban(&self, guild_id: u64, user_id: u64) -> Result<(), ModerationError>;

    /// Disable the member's communication until `until`.
    async fn timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
    ) -> Result<(), ModerationError>;

    /// Deny (`locked = true`) or reset the channel permission for @everyone.
    async fn set_channel_lock(
        &self,
        guild_id: u64,
        channel_id: u64,
        kind: ChannelKind,
        locked: bool,
    ) -> Result<(), ModerationError>;
}
