// Leveling service - all the business rules for XP and levels.
//
// No serenity or poise in here. The Discord layer extracts ids and timestamps,
// calls into this service, and renders whatever comes back.

use super::leveling_models::{
    ActivityOutcome, FailedGrant, LevelRoleMap, LevelUpEvent, LevelingConfig, LevelingError,
    LevelingStore, MemberRecord, MemberStats, RoleGrant, RoleGranter,
};
use crate::core::guild_locks::GuildLocks;
use crate::core::notifier::{Actor, AuditAction, AuditEntry, AuditSink};
use chrono::{DateTime, Utc};
use std::ops::Bound::{Excluded, Included};
use std::sync::Arc;
use std::time::Duration;

/// Awards XP, moves members between levels and hands out level roles.
pub struct LevelingService {
    store: Arc<dyn LevelingStore>,
    roles: Arc<dyn RoleGranter>,
    audit: Arc<dyn AuditSink>,
    locks: Arc<GuildLocks>,
    config: LevelingConfig,
}

impl LevelingService {
    pub fn new(
        store: Arc<dyn LevelingStore>,
        roles: Arc<dyn RoleGranter>,
        audit: Arc<dyn AuditSink>,
        locks: Arc<GuildLocks>,
        config: LevelingConfig,
    ) -> Self {
        Self {
            store,
            roles,
            audit,
            locks,
            config,
        }
    }

    pub fn config(&self) -> &LevelingConfig {
        &self.config
    }

    /// Effective cooldown for a guild (configured value or the default).
    pub async fn cooldown_secs(&self, guild_id: u64) -> Result<u64, LevelingError> {
        Ok(self
            .store
            .cooldown_secs(guild_id)
            .await?
            .unwrap_or(self.config.default_cooldown_secs))
    }

    /// Handle one qualifying activity (usually a message) from a member.
    ///
    /// Inside the cooldown window this is a no-op that returns
    /// `ActivityOutcome::OnCooldown`. Otherwise XP is added, the level is
    /// recomputed from the curve and the record is persisted while the guild
    /// lock is held. Role rewards for every newly crossed level are granted
    /// after the lock is released, in ascending level order. A refused grant is
    /// reported in `failed` and never undoes the level change.
    pub async fn on_activity(
        &self,
        guild_id: u64,
        member_id: u64,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome, LevelingError> {
        let (record, level_up, grants) = {
            let _guard = self.locks.lock(guild_id).await;

            let cooldown_ms = i64::try_from(
                self.cooldown_secs(guild_id).await?.saturating_mul(1_000),
            )
            .unwrap_or(i64::MAX);
            let mut record = self.store.get(guild_id, member_id).await?;

            if let Some(last) = record.last_award_at {
                let elapsed_ms = now.signed_duration_since(last).num_milliseconds();
                if elapsed_ms < cooldown_ms {
                    let remaining_ms = cooldown_ms.saturating_sub(elapsed_ms).max(0);
                    return Ok(ActivityOutcome::OnCooldown {
                        remaining: Duration::from_millis(remaining_ms as u64),
                    });
                }
            }

            let old_level = record.level;
            record.xp = record.xp.saturating_add(self.config.xp_per_activity);
            let new_level = self.config.curve.level_from_xp(record.xp);

            let mut grants = Vec::new();
            let mut level_up = None;
            if new_level > old_level {
                let role_map = self.store.role_map(guild_id).await?;
                grants = roles_crossed(&role_map, guild_id, member_id, old_level, new_level);
                level_up = Some(LevelUpEvent {
                    guild_id,
                    member_id,
                    old_level,
                    new_level,
                    total_xp: record.xp,
                });
            }

            record.level = new_level;
            record.last_award_at = Some(now);
            self.store.put(&record).await?;

            self.audit.record(
                AuditEntry::new(
                    Actor::Member(member_id),
                    AuditAction::XpAwarded,
                    format!("member {}", member_id),
                    format!(
                        "+{} xp (total {}) in guild {}",
                        self.config.xp_per_activity, record.xp, guild_id
                    ),
                )
                .at(now),
            );
            if let Some(event) = &level_up {
                tracing::info!(
                    guild_id,
                    member_id,
                    old_level = event.old_level,
                    new_level = event.new_level,
                    total_xp = event.total_xp,
                    "Member leveled up"
                );
                self.audit.record(
                    AuditEntry::new(
                        Actor::Member(member_id),
                        AuditAction::LevelUp,
                        format!("member {}", member_id),
                        format!("level {} -> {}", event.old_level, event.new_level),
                    )
                    .at(now),
                );
            }

            (record, level_up, grants)
        };

        let (granted, failed) = self.apply_grants(&grants).await;

        Ok(ActivityOutcome::Awarded {
            record,
            level_up,
            granted,
            failed,
        })
    }

    /// Try previously refused role grants again. Returns the ones that still fail.
    pub async fn retry_role_grants(&self, grants: &[RoleGrant]) -> Vec<FailedGrant> {
        let (_, failed) = self.apply_grants(grants).await;
        failed
    }

    async fn apply_grants(&self, grants: &[RoleGrant]) -> (Vec<RoleGrant>, Vec<FailedGrant>) {
        let mut granted = Vec::new();
        let mut failed = Vec::new();

        for grant in grants {
            match self
                .roles
                .grant_role(grant.guild_id, grant.member_id, grant.role_id)
                .await
            {
                Ok(()) => {
                    self.audit.record(AuditEntry::new(
                        Actor::System,
                        AuditAction::RoleGranted,
                        format!("member {}", grant.member_id),
                        format!("role {} for level {}", grant.role_id, grant.level),
                    ));
                    granted.push(*grant);
                }
                Err(err) => {
                    tracing::warn!(
                        guild_id = grant.guild_id,
                        member_id = grant.member_id,
                        role_id = grant.role_id,
                        "Level role grant failed: {}",
                        err
                    );
                    self.audit.record(AuditEntry::new(
                        Actor::System,
                        AuditAction::RoleGrantFailed,
                        format!("member {}", grant.member_id),
                        format!("role {} for level {}: {}", grant.role_id, grant.level, err),
                    ));
                    failed.push(FailedGrant {
                        grant: *grant,
                        reason: err.to_string(),
                    });
                }
            }
        }

        (granted, failed)
    }

    /// Admin: change the cooldown between XP awards for a guild.
    pub async fn set_cooldown(
        &self,
        actor: Actor,
        guild_id: u64,
        seconds: i64,
    ) -> Result<u64, LevelingError> {
        let seconds = u64::try_from(seconds).map_err(|_| {
            LevelingError::InvalidArgument(format!(
                "Cooldown must be zero or more seconds (got {})",
                seconds
            ))
        })?;

        let _guard = self.locks.lock(guild_id).await;
        self.store.set_cooldown_secs(guild_id, seconds).await?;
        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::SetCooldown,
            format!("guild {}", guild_id),
            format!("{} seconds", seconds),
        ));
        Ok(seconds)
    }

    /// Admin: pin a member's level.
    ///
    /// XP is left untouched and no role rewards are granted or revoked, so the
    /// level can disagree with the curve until the next awarded activity.
    pub async fn set_level(
        &self,
        actor: Actor,
        guild_id: u64,
        member_id: u64,
        level: i64,
    ) -> Result<MemberRecord, LevelingError> {
        let level = u32::try_from(level).map_err(|_| {
            LevelingError::InvalidArgument(format!("Level must be between 0 and {}", u32::MAX))
        })?;

        let _guard = self.locks.lock(guild_id).await;
        let mut record = self.store.get(guild_id, member_id).await?;
        let previous = record.level;
        record.level = level;
        self.store.put(&record).await?;

        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::SetLevel,
            format!("member {}", member_id),
            format!("level {} -> {} (xp {})", previous, level, record.xp),
        ));
        Ok(record)
    }

    /// Admin: award `role_id` when members reach `level`. Overwrites any
    /// previous role for that level.
    pub async fn set_role_for_level(
        &self,
        actor: Actor,
        guild_id: u64,
        level: i64,
        role_id: u64,
    ) -> Result<u32, LevelingError> {
        let level = u32::try_from(level)
            .ok()
            .filter(|level| *level >= 1)
            .ok_or_else(|| {
                LevelingError::InvalidArgument(format!(
                    "Role rewards need a level of 1 or more (got {})",
                    level
                ))
            })?;

        let _guard = self.locks.lock(guild_id).await;
        self.store
            .set_role_for_level(guild_id, level, role_id)
            .await?;
        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::SetRoleForLevel,
            format!("guild {}", guild_id),
            format!("role {} at level {}", role_id, level),
        ));
        Ok(level)
    }

    /// Admin: wipe a member's XP and level.
    pub async fn reset_member(
        &self,
        actor: Actor,
        guild_id: u64,
        member_id: u64,
    ) -> Result<(), LevelingError> {
        let _guard = self.locks.lock(guild_id).await;
        self.store.reset(guild_id, member_id).await?;
        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::ResetMember,
            format!("member {}", member_id),
            format!("guild {}", guild_id),
        ));
        Ok(())
    }

    pub async fn member_stats(
        &self,
        guild_id: u64,
        member_id: u64,
    ) -> Result<MemberStats, LevelingError> {
        let record = self.store.get(guild_id, member_id).await?;
        let next_level_xp = record
            .level
            .checked_add(1)
            .and_then(|next| self.config.curve.threshold_for(next));
        let xp_to_next = next_level_xp.map(|threshold| threshold.saturating_sub(record.xp));

        Ok(MemberStats {
            record,
            next_level_xp,
            xp_to_next,
        })
    }

    pub async fn leaderboard(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<MemberRecord>, LevelingError> {
        if limit == 0 {
            return Err(LevelingError::InvalidArgument(
                "Leaderboard limit must be at least 1".to_string(),
            ));
        }
        self.store.top_members(guild_id, limit).await
    }

    pub async fn role_map(&self, guild_id: u64) -> Result<LevelRoleMap, LevelingError> {
        self.store.role_map(guild_id).await
    }
}

/// Mapped roles for every level in `(old_level, new_level]`, ascending.
fn roles_crossed(
    role_map: &LevelRoleMap,
    guild_id: u64,
    member_id: u64,
    old_level: u32,
    new_level: u32,
) -> Vec<RoleGrant> {
    role_map
        .range((Excluded(old_level), Included(new_level)))
        .map(|(&level, &role_id)| RoleGrant {
            guild_id,
            member_id,
            level,
            role_id,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
