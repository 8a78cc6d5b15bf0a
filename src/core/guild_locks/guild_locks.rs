// Per-guild serialization point.
//
// All read-modify-write cycles on a guild's state (member records, voice
// session) run while holding that guild's lock. Guilds never share a lock,
// so unrelated servers never wait on each other.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per guild, created lazily on first use.
#[derive(Default)]
pub struct GuildLocks {
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl GuildLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `guild_id`.
    ///
    /// The guard is owned so it can be held across `.await` points without
    /// borrowing the map. The DashMap shard lock is released before awaiting.
    pub async fn lock(&self, guild_id: u64) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    #[cfg(test)]
    pub fn tracked_guilds(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_guild_is_exclusive() {
        let locks = Arc::new(GuildLocks::new());
        let guard = locks.lock(1).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock(1).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_guilds_do_not_block() {
        let locks = GuildLocks::new();
        let _a = locks.lock(1).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(2)).await;
        assert!(b.is_ok());
        assert_eq!(locks.tracked_guilds(), 2);
    }
}
