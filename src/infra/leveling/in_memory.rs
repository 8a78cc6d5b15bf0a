// In-memory implementation of the leveling ports.
//
// Used when DATABASE_URL is `:memory:` and by tests that want a real store
// without touching disk. Nothing survives a restart.

use crate::core::leveling::{
    GuildSettingsStore, LevelRoleMap, LevelingError, MemberRecord, MemberStore,
};
use async_trait::async_trait;
use dashmap::DashMap;

/// A composite key for looking up a member record.
/// Members are tracked per guild, so the same user can appear in several guilds.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
struct MemberKey {
    guild_id: u64,
    member_id: u64,
}

#[derive(Clone, Debug, Default)]
struct GuildSettings {
    cooldown_secs: Option<u64>,
    roles: LevelRoleMap,
}

/// DashMap-backed store. Each `put` replaces the whole record, so readers
/// never see a half-written one.
pub struct InMemoryLevelingStore {
    members: DashMap<MemberKey, MemberRecord>,
    settings: DashMap<u64, GuildSettings>,
}

impl InMemoryLevelingStore {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
            settings: DashMap::new(),
        }
    }
}

impl Default for InMemoryLevelingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemberStore for InMemoryLevelingStore {
    async fn get(&self, guild_id: u64, member_id: u64) -> Result<MemberRecord, LevelingError> {
        let key = MemberKey {
            guild_id,
            member_id,
        };
        Ok(self
            .members
            .get(&key)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| MemberRecord::new(guild_id, member_id)))
    }

    async fn put(&self, record: &MemberRecord) -> Result<(), LevelingError> {
        let key = MemberKey {
            guild_id: record.guild_id,
            member_id: record.member_id,
        };
        self.members.insert(key, record.clone());
        Ok(())
    }

    async fn top_members(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<MemberRecord>, LevelingError> {
        let mut records: Vec<MemberRecord> = self
            .members
            .iter()
            .filter(|entry| entry.key().guild_id == guild_id)
            .map(|entry| entry.value().clone())
            .collect();

        // Highest XP first; ties broken by member id so the order is stable.
        records.sort_by(|a, b| b.xp.cmp(&a.xp).then(a.member_id.cmp(&b.member_id)));
        records.truncate(limit);
        Ok(records)
    }

    async fn reset(&self, guild_id: u64, member_id: u64) -> Result<(), LevelingError> {
        self.members.remove(&MemberKey {
            guild_id,
            member_id,
        });
        Ok(())
    }
}

#[async_trait]
impl GuildSettingsStore for InMemoryLevelingStore {
    async fn cooldown_secs(&self, guild_id: u64) -> Result<Option<u64>, LevelingError> {
        Ok(self
            .settings
            .get(&guild_id)
            .and_then(|entry| entry.cooldown_secs))
    }

    async fn set_cooldown_secs(&self, guild_id: u64, seconds: u64) -> Result<(), LevelingError> {
        self.settings.entry(guild_id).or_default().cooldown_secs = Some(seconds);
        Ok(())
    }

    async fn role_map(&self, guild_id: u64) -> Result<LevelRoleMap, LevelingError> {
        Ok(self
            .settings
            .get(&guild_id)
            .map(|entry| entry.roles.clone())
            .unwrap_or_default())
    }

    async fn set_role_for_level(
        &self,
        guild_id: u64,
        level: u32,
        role_id: u64,
    ) -> Result<(), LevelingError> {
        self.settings
            .entry(guild_id)
            .or_default()
            .roles
            .insert(level, role_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn missing_member_reads_as_default() {
        let store = InMemoryLevelingStore::new();
        let record = store.get(456, 123).await.unwrap();
        assert_eq!(record, MemberRecord::new(456, 123));
    }

    #[tokio::test]
    async fn put_replaces_and_reset_removes() {
        let store = InMemoryLevelingStore::new();
        let mut record = MemberRecord::new(1, 2);
        record.xp = 40;
        record.level = 2;
        record.last_award_at = Some(Utc::now());
        store.put(&record).await.unwrap();

        assert_eq!(store.get(1, 2).await.unwrap(), record);

        store.reset(1, 2).await.unwrap();
        assert_eq!(store.get(1, 2).await.unwrap(), MemberRecord::new(1, 2));
    }

    #[tokio::test]
    async fn top_members_is_per_guild_and_sorted() {
        let store = InMemoryLevelingStore::new();
        for (guild, member, xp) in [(100, 1, 500), (100, 2, 300), (100, 3, 700), (200, 4, 900)] {
            let mut record = MemberRecord::new(guild, member);
            record.xp = xp;
            store.put(&record).await.unwrap();
        }

        let top = store.top_members(100, 2).await.unwrap();
        let ids: Vec<u64> = top.iter().map(|r| r.member_id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn settings_are_per_guild() {
        let store = InMemoryLevelingStore::new();
        store.set_cooldown_secs(1, 0).await.unwrap();
        store.set_role_for_level(1, 5, 55).await.unwrap();
        store.set_role_for_level(1, 5, 56).await.unwrap();

        assert_eq!(store.cooldown_secs(1).await.unwrap(), Some(0));
        assert_eq!(store.cooldown_secs(2).await.unwrap(), None);
        assert_eq!(store.role_map(1).await.unwrap().get(&5), Some(&56));
        assert!(store.role_map(2).await.unwrap().is_empty());
    }
}
