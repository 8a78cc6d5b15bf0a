// Moderation service - validates moderator input, resolves ban-list lookups
// and keeps the audit trail. NO Discord dependencies here.

use super::moderation_models::{
    BanQuery, BannedUser, ChannelKind, ModerationError, ModerationGateway, MAX_REASON_LEN,
    MAX_TIMEOUT_SECS,
};
use crate::core::notifier::{Actor, AuditAction, AuditEntry, AuditSink};
use chrono::{DateTime, Utc};
use std::sync::Arc;

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationService {
    gateway: Arc<dyn ModerationGateway>,
    audit: Arc<dyn AuditSink>,
}

impl ModerationService {
    pub fn new(gateway: Arc<dyn ModerationGateway>, audit: Arc<dyn AuditSink>) -> Self {
        Self { gateway, audit }
    }

    pub async fn ban(
        &self,
        actor: Actor,
        guild_id: u64,
        user_id: u64,
        reason: Option<&str>,
    ) -> Result<(), ModerationError> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        if reason.is_some_and(|r| r.chars().count() > MAX_REASON_LEN) {
            return Err(ModerationError::InvalidArgument(format!(
                "Ban reason must be at most {} characters",
                MAX_REASON_LEN
            )));
        }

        self.gateway.ban(guild_id, user_id, reason).await?;
        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::Ban,
            format!("user {}", user_id),
            format!("reason: {}", reason.unwrap_or("none")),
        ));
        Ok(())
    }

    /// Unban the first ban-list entry matching `target`
    /// (`name#1234`, `name`, an id or a mention).
    pub async fn unban(
        &self,
        actor: Actor,
        guild_id: u64,
        target: &str,
    ) -> Result<BannedUser, ModerationError> {
        let query = BanQuery::parse(target)?;
        let bans = self.gateway.list_bans(guild_id).await?;
        let user = bans
            .into_iter()
            .find(|user| query.matches(user))
            .ok_or_else(|| ModerationError::NotFound(target.trim().to_string()))?;

        self.gateway.unban(guild_id, user.user_id).await?;
        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::Unban,
            format!("user {}", user.user_id),
            user.to_string(),
        ));
        Ok(user)
    }

    /// Silence a member for `seconds`. Returns when the timeout ends.
    pub async fn timeout(
        &self,
        actor: Actor,
        guild_id: u64,
        user_id: u64,
        seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ModerationError> {
        if !(1..=MAX_TIMEOUT_SECS).contains(&seconds) {
            return Err(ModerationError::InvalidArgument(format!(
                "Timeout must be between 1 and {} seconds",
                MAX_TIMEOUT_SECS
            )));
        }
        let until = now + chrono::Duration::seconds(seconds);

        self.gateway.timeout(guild_id, user_id, until).await?;
        self.audit.record(
            AuditEntry::new(
                actor,
                AuditAction::Timeout,
                format!("user {}", user_id),
                format!("{} seconds", seconds),
            )
            .at(now),
        );
        Ok(until)
    }

    pub async fn lock(
        &self,
        actor: Actor,
        guild_id: u64,
        channel_id: u64,
        kind: ChannelKind,
    ) -> Result<(), ModerationError> {
        self.set_lock(actor, guild_id, channel_id, kind, true).await
    }

    pub async fn unlock(
        &self,
        actor: Actor,
        guild_id: u64,
        channel_id: u64,
        kind: ChannelKind,
    ) -> Result<(), ModerationError> {
        self.set_lock(actor, guild_id, channel_id, kind, false).await
    }

    async fn set_lock(
        &self,
        actor: Actor,
        guild_id: u64,
        channel_id: u64,
        kind: ChannelKind,
        locked: bool,
    ) -> Result<(), ModerationError> {
        self.gateway
            .set_channel_lock(guild_id, channel_id, kind, locked)
            .await?;

        let action = if locked {
            AuditAction::LockChannel
        } else {
            AuditAction::UnlockChannel
        };
        self.audit.record(AuditEntry::new(
            actor,
            action,
            format!("channel {}", channel_id),
            format!("{:?}", kind).to_lowercase(),
        ));
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
