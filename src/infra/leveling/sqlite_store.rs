use crate::core::leveling::{
    GuildSettingsStore, LevelRoleMap, LevelingError, MemberRecord, MemberStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

/// SQLite-backed leveling store. Snowflakes and XP are stored as INTEGER
/// (bit-cast to i64), award timestamps as RFC 3339 TEXT.
pub struct SqliteLevelingStore {
    pool: Pool<Sqlite>,
}

impl SqliteLevelingStore {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS member_records (
                guild_id INTEGER NOT NULL,
                member_id INTEGER NOT NULL,
                xp INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 0,
                last_award_at TEXT,
                PRIMARY KEY (guild_id, member_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS level_roles (
                guild_id INTEGER NOT NULL,
                level INTEGER NOT NULL,
                role_id INTEGER NOT NULL,
                PRIMARY KEY (guild_id, level)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_cooldowns (
                guild_id INTEGER PRIMARY KEY,
                cooldown_secs INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn storage_err(e: sqlx::Error) -> LevelingError {
    LevelingError::StorageError(e.to_string())
}

fn row_to_record(row: &SqliteRow) -> MemberRecord {
    MemberRecord {
        guild_id: row.get::<i64, _>("guild_id") as u64,
        member_id: row.get::<i64, _>("member_id") as u64,
        xp: row.get::<i64, _>("xp") as u64,
        level: row.get::<i64, _>("level") as u32,
        last_award_at: row.get::<Option<DateTime<Utc>>, _>("last_award_at"),
    }
}

#[async_trait]
impl MemberStore for SqliteLevelingStore {
    async fn get(&self, guild_id: u64, member_id: u64) -> Result<MemberRecord, LevelingError> {
        let row = sqlx::query("SELECT * FROM member_records WHERE guild_id = ? AND member_id = ?")
            .bind(guild_id as i64)
            .bind(member_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row
            .as_ref()
            .map(row_to_record)
            .unwrap_or_else(|| MemberRecord::new(guild_id, member_id)))
    }

    async fn put(&self, record: &MemberRecord) -> Result<(), LevelingError> {
        sqlx::query(
            r#"
            INSERT INTO member_records (guild_id, member_id, xp, level, last_award_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(guild_id, member_id) DO UPDATE SET
                xp = excluded.xp,
                level = excluded.level,
                last_award_at = excluded.last_award_at
            "#,
        )
        .bind(record.guild_id as i64)
        .bind(record.member_id as i64)
        .bind(record.xp as i64)
        .bind(i64::from(record.level))
        .bind(record.last_award_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn top_members(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<MemberRecord>, LevelingError> {
        let rows = sqlx::query(
            "SELECT * FROM member_records WHERE guild_id = ? ORDER BY xp DESC, member_id ASC LIMIT ?",
        )
        .bind(guild_id as i64)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn reset(&self, guild_id: u64, member_id: u64) -> Result<(), LevelingError> {
        sqlx::query("DELETE FROM member_records WHERE guild_id = ? AND member_id = ?")
            .bind(guild_id as i64)
            .bind(member_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl GuildSettingsStore for SqliteLevelingStore {
    async fn cooldown_secs(&self, guild_id: u64) -> Result<Option<u64>, LevelingError> {
        let row = sqlx::query("SELECT cooldown_secs FROM guild_cooldowns WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.map(|row| row.get::<i64, _>(0) as u64))
    }

    async fn set_cooldown_secs(&self, guild_id: u64, seconds: u64) -> Result<(), LevelingError> {
        sqlx::query(
            r#"
            INSERT INTO guild_cooldowns (guild_id, cooldown_secs)
            VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                cooldown_secs = excluded.cooldown_secs
            "#,
        )
        .bind(guild_id as i64)
        .bind(seconds as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn role_map(&self, guild_id: u64) -> Result<LevelRoleMap, LevelingError> {
        let rows = sqlx::query("SELECT level, role_id FROM level_roles WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<i64, _>("level") as u32,
                    row.get::<i64, _>("role_id") as u64,
                )
            })
            .collect())
    }

    async fn set_role_for_level(
        &self,
        guild_id: u64,
        level: u32,
        role_id: u64,
    ) -> Result<(), LevelingError> {
        sqlx::query(
            r#"
            INSERT INTO level_roles (guild_id, level, role_id)
            VALUES (?, ?, ?)
            ON CONFLICT(guild_id, level) DO UPDATE SET
                role_id = excluded.role_id
            "#,
        )
        .bind(guild_id as i64)
        .bind(i64::from(level))
        .bind(role_id as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> SqliteLevelingStore {
        let path = dir.path().join("nested").join("bot.db");
        SqliteLevelingStore::connect(path.to_str().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let awarded = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let record = MemberRecord {
            guild_id: 7,
            member_id: 5,
            xp: 123,
            level: 2,
            last_award_at: Some(awarded),
        };

        {
            let store = open(&dir).await;
            store.put(&record).await.unwrap();
            store.set_cooldown_secs(7, 30).await.unwrap();
            store.set_role_for_level(7, 2, 222).await.unwrap();
        }

        let store = open(&dir).await;
        assert_eq!(store.get(7, 5).await.unwrap(), record);
        assert_eq!(store.cooldown_secs(7).await.unwrap(), Some(30));
        assert_eq!(store.role_map(7).await.unwrap().get(&2), Some(&222));
    }

    #[tokio::test]
    async fn absent_rows_read_as_defaults() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        assert_eq!(store.get(1, 2).await.unwrap(), MemberRecord::new(1, 2));
        assert_eq!(store.cooldown_secs(1).await.unwrap(), None);
        assert!(store.role_map(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_overwrites_and_reset_deletes() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        let mut record = MemberRecord::new(1, 2);
        record.xp = 10;
        store.put(&record).await.unwrap();
        record.xp = 25;
        record.level = 1;
        store.put(&record).await.unwrap();
        assert_eq!(store.get(1, 2).await.unwrap(), record);

        store.reset(1, 2).await.unwrap();
        assert_eq!(store.get(1, 2).await.unwrap(), MemberRecord::new(1, 2));
    }

    #[tokio::test]
    async fn large_snowflakes_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        let guild = 1_432_001_978_447_167_611;
        store.set_role_for_level(guild, 1, u64::MAX).await.unwrap();
        assert_eq!(store.role_map(guild).await.unwrap().get(&1), Some(&u64::MAX));
    }

    #[tokio::test]
    async fn top_members_orders_by_xp() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        for (member, xp) in [(1, 50), (2, 90), (3, 70)] {
            let mut record = MemberRecord::new(9, member);
            record.xp = xp;
            store.put(&record).await.unwrap();
        }

        let ids: Vec<u64> = store
            .top_members(9, 10)
            .await
            .unwrap()
            .iter()
            .map(|r| r.member_id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
