// Serenity-backed moderation calls.

use crate::core::moderation::{BannedUser, ChannelKind, ModerationError, ModerationGateway};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub struct SerenityModerationGateway {
    http: Arc<serenity::Http>,
}

impl SerenityModerationGateway {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

fn call_err(e: serenity::Error) -> ModerationError {
    ModerationError::ExternalCallFailed(e.to_string())
}

/// The permission a lock denies to @everyone.
fn locked_permission(kind: ChannelKind) -> serenity::Permissions {
    match kind {
        ChannelKind::Text => serenity::Permissions::SEND_MESSAGES,
        ChannelKind::Voice => serenity::Permissions::CONNECT,
    }
}

#[async_trait]
impl ModerationGateway for SerenityModerationGateway {
    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: Option<&str>,
    ) -> Result<(), ModerationError> {
        let guild = serenity::GuildId::new(guild_id);
        let user = serenity::UserId::new(user_id);
        match reason {
            Some(reason) => guild.ban_with_reason(&self.http, user, 0, reason).await,
            None => guild.ban(&self.http, user, 0).await,
        }
        .map_err(call_err)
    }

    async fn list_bans(&self, guild_id: u64) -> Result<Vec<BannedUser>, ModerationError> {
        let bans = serenity::GuildId::new(guild_id)
            .bans(&self.http, None, None)
            .await
            .map_err(call_err)?;

        Ok(bans
            .into_iter()
            .map(|ban| BannedUser {
                user_id: ban.user.id.get(),
                discriminator: ban.user.discriminator.map(|d| d.get()),
                name: ban.user.name,
            })
            .collect())
    }

    async fn unban(&self, guild_id: u64, user_id: u64) -> Result<(), ModerationError> {
        serenity::GuildId::new(guild_id)
            .unban(&self.http, serenity::UserId::new(user_id))
            .await
            .map_err(call_err)
    }

    async fn timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
    ) -> Result<(), ModerationError> {
        let until = serenity::Timestamp::from_unix_timestamp(until.timestamp())
            .map_err(|e| ModerationError::InvalidArgument(e.to_string()))?;

        serenity::GuildId::new(guild_id)
            .edit_member(
                self.http.as_ref(),
                serenity::UserId::new(user_id),
                serenity::EditMember::new().disable_communication_until_datetime(until),
            )
            .await
            .map(|_| ())
            .map_err(call_err)
    }

    async fn set_channel_lock(
        &self,
        guild_id: u64,
        channel_id: u64,
        kind: ChannelKind,
        locked: bool,
    ) -> Result<(), ModerationError> {
        let channel_id = serenity::ChannelId::new(channel_id);
        let channel = channel_id
            .to_channel(self.http.as_ref())
            .await
            .map_err(call_err)?
            .guild()
            .ok_or_else(|| {
                ModerationError::InvalidArgument("Only server channels can be locked".to_string())
            })?;

        let overwrite = lock_overwrite(
            &channel.permission_overwrites,
            serenity::GuildId::new(guild_id).everyone_role(),
            locked_permission(kind),
            locked,
        );

        channel_id
            .create_permission(&self.http, overwrite)
            .await
            .map_err(call_err)
    }
}

/// The @everyone overwrite after locking or unlocking. Only `permission` is
/// touched; every other bit of the existing overwrite is kept.
fn lock_overwrite(
    existing: &[serenity::PermissionOverwrite],
    everyone: serenity::RoleId,
    permission: serenity::Permissions,
    locked: bool,
) -> serenity::PermissionOverwrite {
    let kind = serenity::PermissionOverwriteType::Role(everyone);
    let (mut allow, mut deny) = existing
        .iter()
        .find(|o| o.kind == kind)
        .map(|o| (o.allow, o.deny))
        .unwrap_or((serenity::Permissions::empty(), serenity::Permissions::empty()));

    if locked {
        allow.remove(permission);
        deny.insert(permission);
    } else {
        deny.remove(permission);
    }

    serenity::PermissionOverwrite { allow, deny, kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_denies_the_channel_specific_permission() {
        assert_eq!(
            locked_permission(ChannelKind::Text),
            serenity::Permissions::SEND_MESSAGES
        );
        assert_eq!(
            locked_permission(ChannelKind::Voice),
            serenity::Permissions::CONNECT
        );
    }

    fn everyone() -> serenity::RoleId {
        serenity::RoleId::new(1)
    }

    fn everyone_overwrite(
        allow: serenity::Permissions,
        deny: serenity::Permissions,
    ) -> serenity::PermissionOverwrite {
        serenity::PermissionOverwrite {
            allow,
            deny,
            kind: serenity::PermissionOverwriteType::Role(everyone()),
        }
    }

    #[test]
    fn lock_keeps_existing_denies_on_private_channel() {
        use super::serenity::Permissions as P;
        let staff_only = vec![
            everyone_overwrite(P::empty(), P::VIEW_CHANNEL),
            serenity::PermissionOverwrite {
                allow: P::VIEW_CHANNEL,
                deny: P::empty(),
                kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(2)),
            },
        ];

        let locked = lock_overwrite(&staff_only, everyone(), P::SEND_MESSAGES, true);
        assert_eq!(locked.kind, serenity::PermissionOverwriteType::Role(everyone()));
        assert_eq!(locked.deny, P::VIEW_CHANNEL | P::SEND_MESSAGES);
        assert_eq!(locked.allow, P::empty());

        let unlocked = lock_overwrite(&[locked], everyone(), P::SEND_MESSAGES, false);
        assert_eq!(unlocked.deny, P::VIEW_CHANNEL);
    }

    #[test]
    fn lock_clears_an_explicit_allow_and_keeps_the_others() {
        use super::serenity::Permissions as P;
        let existing = vec![everyone_overwrite(P::CONNECT | P::SPEAK, P::empty())];

        let locked = lock_overwrite(&existing, everyone(), P::CONNECT, true);
        assert_eq!(locked.allow, P::SPEAK);
        assert_eq!(locked.deny, P::CONNECT);
    }

    #[test]
    fn unlock_without_an_overwrite_stays_neutral() {
        use super::serenity::Permissions as P;
        let unlocked = lock_overwrite(&[], everyone(), P::SEND_MESSAGES, false);
        assert_eq!(unlocked.allow, P::empty());
        assert_eq!(unlocked.deny, P::empty());
    }
}
