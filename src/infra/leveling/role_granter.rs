// Serenity-backed role rewards.

use crate::core::leveling::{LevelingError, RoleGranter};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub struct DiscordRoleGranter {
    http: Arc<serenity::Http>,
}

impl DiscordRoleGranter {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RoleGranter for DiscordRoleGranter {
    async fn grant_role(
        &self,
        guild_id: u64,
        member_id: u64,
        role_id: u64,
    ) -> Result<(), LevelingError> {
        self.http
            .add_member_role(
                serenity::GuildId::new(guild_id),
                serenity::UserId::new(member_id),
                serenity::RoleId::new(role_id),
                Some("Level reward"),
            )
            .await
            .map_err(|e| LevelingError::ExternalCallFailed(e.to_string()))
    }
}
