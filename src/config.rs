// Runtime configuration, read once at startup from the environment (and `.env`).

use crate::core::leveling::{LevelCurve, LevelingConfig};
use anyhow::{anyhow, Context as _};
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "data/bot.db";
const DEFAULT_STATUS_MESSAGE: &str = "with slash commands";

/// Where leveling state is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// `DATABASE_URL=:memory:`. Lost on restart.
    InMemory,
    Sqlite(String),
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub storage: StorageBackend,
    pub leveling: LevelingConfig,
    /// Register commands in this guild only (instant updates while developing).
    pub dev_guild_id: Option<u64>,
    pub status_message: String,
}

impl BotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let discord_token = get("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                anyhow!("Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.")
            })?;

        let storage = match get("DATABASE_URL") {
            Some(url) if url.trim() == ":memory:" => StorageBackend::InMemory,
            Some(url) if !url.trim().is_empty() => StorageBackend::Sqlite(url.trim().to_string()),
            _ => StorageBackend::Sqlite(DEFAULT_DATABASE_URL.to_string()),
        };

        let defaults = LevelingConfig::default();
        let curve = match (get("LEVEL_THRESHOLDS"), get("LEVEL_CURVE_BASE")) {
            (Some(_), Some(_)) => {
                return Err(anyhow!(
                    "Set either LEVEL_THRESHOLDS or LEVEL_CURVE_BASE, not both"
                ))
            }
            (Some(table), None) => {
                LevelCurve::parse_thresholds(&table).context("Invalid LEVEL_THRESHOLDS")?
            }
            (None, Some(_)) => LevelCurve::quadratic(parse_var(&get, "LEVEL_CURVE_BASE", 0)?)
                .context("Invalid LEVEL_CURVE_BASE")?,
            (None, None) => defaults.curve,
        };

        let leveling = LevelingConfig {
            xp_per_activity: parse_var(&get, "XP_PER_ACTIVITY", defaults.xp_per_activity)?,
            default_cooldown_secs: parse_var(
                &get,
                "DEFAULT_COOLDOWN_SECS",
                defaults.default_cooldown_secs,
            )?,
            curve,
        };

        let dev_guild_id = get("DEV_GUILD_ID")
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow!("DEV_GUILD_ID must be a valid u64"))
            })
            .transpose()?;

        Ok(Self {
            discord_token,
            storage,
            leveling,
            dev_guild_id,
            status_message: get("STATUS_MESSAGE")
                .unwrap_or_else(|| DEFAULT_STATUS_MESSAGE.to_string()),
        })
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T> {
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} has an invalid value: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<BotConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = load(&[("DISCORD_TOKEN", "abc")]).unwrap();

        assert_eq!(
            config.storage,
            StorageBackend::Sqlite(DEFAULT_DATABASE_URL.to_string())
        );
        assert_eq!(config.leveling.xp_per_activity, 15);
        assert_eq!(config.leveling.default_cooldown_secs, 60);
        assert_eq!(config.leveling.curve, LevelCurve::default());
        assert_eq!(config.dev_guild_id, None);
        assert_eq!(config.status_message, DEFAULT_STATUS_MESSAGE);
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(load(&[]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn memory_url_selects_in_memory_store() {
        let config = load(&[("DISCORD_TOKEN", "abc"), ("DATABASE_URL", ":memory:")]).unwrap();
        assert_eq!(config.storage, StorageBackend::InMemory);
    }

    #[test]
    fn threshold_table_is_parsed_and_validated() {
        let config = load(&[("DISCORD_TOKEN", "abc"), ("LEVEL_THRESHOLDS", "10, 30")]).unwrap();
        assert_eq!(config.leveling.curve, LevelCurve::Thresholds(vec![10, 30]));

        assert!(load(&[("DISCORD_TOKEN", "abc"), ("LEVEL_THRESHOLDS", "30,10")]).is_err());
        assert!(load(&[
            ("DISCORD_TOKEN", "abc"),
            ("LEVEL_THRESHOLDS", "10"),
            ("LEVEL_CURVE_BASE", "20"),
        ])
        .is_err());
    }

    #[test]
    fn numeric_vars_reject_garbage() {
        assert!(load(&[("DISCORD_TOKEN", "abc"), ("XP_PER_ACTIVITY", "lots")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "abc"), ("DEFAULT_COOLDOWN_SECS", "-5")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "abc"), ("DEV_GUILD_ID", "guild")]).is_err());
        assert!(load(&[("DISCORD_TOKEN", "abc"), ("LEVEL_CURVE_BASE", "0")]).is_err());
    }

    #[test]
    fn dev_guild_and_overrides_are_read() {
        let config = load(&[
            ("DISCORD_TOKEN", "abc"),
            ("DEV_GUILD_ID", "42"),
            ("XP_PER_ACTIVITY", "10"),
            ("DEFAULT_COOLDOWN_SECS", "0"),
            ("LEVEL_CURVE_BASE", "100"),
            ("STATUS_MESSAGE", "the charts"),
        ])
        .unwrap();

        assert_eq!(config.dev_guild_id, Some(42));
        assert_eq!(config.leveling.xp_per_activity, 10);
        assert_eq!(config.leveling.default_cooldown_secs, 0);
        assert_eq!(config.leveling.curve, LevelCurve::Quadratic { base: 100 });
        assert_eq!(config.status_message, "the charts");
    }
}
