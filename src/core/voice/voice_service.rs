// Voice session manager - at most one voice connection per guild.
//
// Sessions live in memory only; a restart drops every connection anyway.
// Each transition runs under the guild lock, including the platform call that
// drives it, so a failed connect can be rolled back before anyone else sees
// the half-built session as usable.

use super::voice_models::{
    OccupancyOutcome, PlayOutcome, SessionState, TrackEndOutcome, VoiceConnector, VoiceError,
    VoiceSession,
};
use crate::core::guild_locks::GuildLocks;
use crate::core::notifier::{Actor, AuditAction, AuditEntry, AuditSink};
use dashmap::DashMap;
use std::sync::Arc;

pub struct VoiceSessionManager {
    connector: Arc<dyn VoiceConnector>,
    audit: Arc<dyn AuditSink>,
    locks: Arc<GuildLocks>,
    sessions: DashMap<u64, VoiceSession>,
}

impl VoiceSessionManager {
    pub fn new(
        connector: Arc<dyn VoiceConnector>,
        audit: Arc<dyn AuditSink>,
        locks: Arc<GuildLocks>,
    ) -> Self {
        Self {
            connector,
            audit,
            locks,
            sessions: DashMap::new(),
        }
    }

    /// Snapshot of a guild's session, if connected.
    pub fn session(&self, guild_id: u64) -> Option<VoiceSession> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    pub fn state(&self, guild_id: u64) -> SessionState {
        self.sessions
            .get(&guild_id)
            .map(|s| s.state)
            .unwrap_or(SessionState::Disconnected)
    }

    /// Request playback of `url` in `channel_id`.
    ///
    /// Connects first when the guild has no session. A guild already connected
    /// elsewhere gets `ChannelConflict` and keeps its session untouched. While a
    /// track is playing, new requests for the same channel are queued. Returns
    /// as soon as playback has been handed to the player.
    pub async fn play(
        &self,
        actor: Actor,
        guild_id: u64,
        channel_id: u64,
        url: &str,
    ) -> Result<PlayOutcome, VoiceError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(VoiceError::InvalidArgument(
                "Track URL must not be empty".to_string(),
            ));
        }

        let _guard = self.locks.lock(guild_id).await;

        match self.session(guild_id) {
            Some(session) if session.channel_id != channel_id => {
                Err(VoiceError::ChannelConflict {
                    current: session.channel_id,
                    requested: channel_id,
                })
            }
            // `Connecting` only exists while the guild lock is held, so any
            // session seen here is playing.
            Some(mut session) => {
                session.queue.push_back(url.to_string());
                let position = session.queue.len();
                self.sessions.insert(guild_id, session);
                self.audit.record(AuditEntry::new(
                    actor,
                    AuditAction::TrackQueued,
                    format!("guild {}", guild_id),
                    format!("{} at position {}", url, position),
                ));
                Ok(PlayOutcome::Queued {
                    url: url.to_string(),
                    position,
                })
            }
            None => {
                self.connect_and_start(actor, guild_id, channel_id, url)
                    .await?;
                Ok(PlayOutcome::Started {
                    url: url.to_string(),
                })
            }
        }
    }

    async fn connect_and_start(
        &self,
        actor: Actor,
        guild_id: u64,
        channel_id: u64,
        url: &str,
    ) -> Result<(), VoiceError> {
        let session = VoiceSession::connecting(guild_id, channel_id);
        self.sessions.insert(guild_id, session.clone());

        if let Err(err) = self.connector.connect(guild_id, channel_id).await {
            self.sessions.remove(&guild_id);
            tracing::warn!(guild_id, channel_id, "Voice connect failed: {}", err);
            return Err(err);
        }
        tracing::info!(guild_id, channel_id, "Joined voice channel");
        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::VoiceConnected,
            format!("channel {}", channel_id),
            format!("guild {}", guild_id),
        ));

        if let Err(err) = self.start_track(actor, session, url).await {
            // Nothing is playing on a connection we just opened; do not keep it.
            if let Err(disconnect_err) = self.connector.disconnect(guild_id).await {
                tracing::warn!(guild_id, "Rollback disconnect failed: {}", disconnect_err);
            }
            self.sessions.remove(&guild_id);
            self.audit.record(AuditEntry::new(
                Actor::System,
                AuditAction::VoiceDisconnected,
                format!("channel {}", channel_id),
                "playback failed to start",
            ));
            return Err(err);
        }
        Ok(())
    }

    /// Hand `url` to the player and store the session as playing.
    async fn start_track(
        &self,
        actor: Actor,
        mut session: VoiceSession,
        url: &str,
    ) -> Result<(), VoiceError> {
        self.connector.start_track(session.guild_id, url).await?;

        session.state = SessionState::Playing;
        session.current_track = Some(url.to_string());
        let guild_id = session.guild_id;
        self.sessions.insert(guild_id, session);

        tracing::info!(guild_id, url, "Track started");
        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::TrackStarted,
            format!("guild {}", guild_id),
            url,
        ));
        Ok(())
    }

    /// Player signal: the current track finished.
    ///
    /// Starts the next queued track if there is one. Queued tracks the player
    /// refuses are skipped. With nothing left to play the bot disconnects. A
    /// guild without a session is a no-op.
    pub async fn on_track_end(&self, guild_id: u64) -> Result<TrackEndOutcome, VoiceError> {
        let _guard = self.locks.lock(guild_id).await;

        let Some(mut session) = self.session(guild_id) else {
            return Ok(TrackEndOutcome::NoSession);
        };
        session.current_track = None;

        while let Some(next) = session.queue.pop_front() {
            match self
                .start_track(Actor::System, session.clone(), &next)
                .await
            {
                Ok(()) => return Ok(TrackEndOutcome::NextTrack { url: next }),
                Err(err) => {
                    tracing::warn!(guild_id, url = %next, "Skipping queued track: {}", err);
                }
            }
        }

        self.teardown(Actor::System, guild_id, "queue finished")
            .await?;
        Ok(TrackEndOutcome::Disconnected)
    }

    /// Voice occupancy signal for `channel_id`, not counting bots.
    ///
    /// When the bot's channel has nobody left to listen, leave even if a track
    /// is still nominally playing.
    pub async fn on_voice_state_changed(
        &self,
        guild_id: u64,
        channel_id: u64,
        occupants_remaining: usize,
    ) -> Result<OccupancyOutcome, VoiceError> {
        let _guard = self.locks.lock(guild_id).await;

        let in_channel = self
            .sessions
            .get(&guild_id)
            .is_some_and(|s| s.channel_id == channel_id);
        if !in_channel || occupants_remaining > 0 {
            return Ok(OccupancyOutcome::Ignored);
        }

        tracing::info!(guild_id, channel_id, "Voice channel empty, leaving");
        self.teardown(Actor::System, guild_id, "channel empty")
            .await?;
        Ok(OccupancyOutcome::Disconnected)
    }

    /// Player signal: the platform dropped our connection (kicked, channel
    /// deleted). Forget the session without calling out.
    pub async fn on_connection_lost(&self, guild_id: u64) -> bool {
        let _guard = self.locks.lock(guild_id).await;

        match self.sessions.remove(&guild_id) {
            Some((_, session)) => {
                self.audit.record(AuditEntry::new(
                    Actor::System,
                    AuditAction::VoiceDisconnected,
                    format!("channel {}", session.channel_id),
                    "connection lost",
                ));
                true
            }
            None => false,
        }
    }

    /// Player signal: the bot was moved to `channel_id` by someone else.
    /// The session follows it. Returns false when there was nothing to move.
    pub async fn on_bot_moved(&self, guild_id: u64, channel_id: u64) -> bool {
        let _guard = self.locks.lock(guild_id).await;

        let Some(mut session) = self.sessions.get_mut(&guild_id) else {
            return false;
        };
        if session.channel_id == channel_id {
            return false;
        }
        let previous = std::mem::replace(&mut session.channel_id, channel_id);
        drop(session);

        self.audit.record(AuditEntry::new(
            Actor::System,
            AuditAction::VoiceMoved,
            format!("channel {}", channel_id),
            format!("from channel {}", previous),
        ));
        true
    }

    /// Intentional disconnect requested by a member.
    pub async fn leave(&self, actor: Actor, guild_id: u64) -> Result<(), VoiceError> {
        let _guard = self.locks.lock(guild_id).await;

        if !self.sessions.contains_key(&guild_id) {
            return Err(VoiceError::NotConnected);
        }
        self.teardown(actor, guild_id, "requested").await
    }

    /// End the current track early. The player's track-end signal then moves
    /// on to the next queued track or disconnects.
    pub async fn skip(&self, actor: Actor, guild_id: u64) -> Result<(), VoiceError> {
        let _guard = self.locks.lock(guild_id).await;

        let session = self.session(guild_id).ok_or(VoiceError::NotConnected)?;
        self.connector.stop_track(guild_id).await?;
        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::TrackSkipped,
            format!("guild {}", guild_id),
            session.current_track.unwrap_or_default(),
        ));
        Ok(())
    }

    /// Disconnect and destroy the session. Must be called with the guild lock
    /// held. The session is dropped even when the platform call fails; the
    /// error is still returned.
    async fn teardown(&self, actor: Actor, guild_id: u64, reason: &str) -> Result<(), VoiceError> {
        let result = self.connector.disconnect(guild_id).await;
        let channel_id = self
            .sessions
            .remove(&guild_id)
            .map(|(_, s)| s.channel_id)
            .unwrap_or_default();

        self.audit.record(AuditEntry::new(
            actor,
            AuditAction::VoiceDisconnected,
            format!("channel {}", channel_id),
            reason,
        ));

        if let Err(err) = &result {
            tracing::warn!(guild_id, channel_id, "Voice disconnect failed: {}", err);
        } else {
            tracing::info!(guild_id, channel_id, reason, "Left voice channel");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{Classified, ErrorKind};
    use crate::core::notifier::MemoryAuditSink;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Connect(u64),
        Start(String),
        Stop,
        Disconnect,
    }

    /// Records calls; fails the ones it is told to.
    #[derive(Default)]
    struct ScriptedConnector {
        calls: Mutex<Vec<Call>>,
        fail_connect: Mutex<bool>,
        fail_disconnect: Mutex<bool>,
        bad_urls: Mutex<HashSet<String>>,
    }

    impl ScriptedConnector {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VoiceConnector for ScriptedConnector {
        async fn connect(&self, _: u64, channel_id: u64) -> Result<(), VoiceError> {
            self.calls.lock().unwrap().push(Call::Connect(channel_id));
            if *self.fail_connect.lock().unwrap() {
                return Err(VoiceError::ExternalCallFailed("gateway timeout".into()));
            }
            Ok(())
        }

        async fn start_track(&self, _: u64, url: &str) -> Result<(), VoiceError> {
            self.calls.lock().unwrap().push(Call::Start(url.to_string()));
            if self.bad_urls.lock().unwrap().contains(url) {
                return Err(VoiceError::ExternalCallFailed("unsupported source".into()));
            }
            Ok(())
        }

        async fn stop_track(&self, _: u64) -> Result<(), VoiceError> {
            self.calls.lock().unwrap().push(Call::Stop);
            Ok(())
        }

        async fn disconnect(&self, _: u64) -> Result<(), VoiceError> {
            self.calls.lock().unwrap().push(Call::Disconnect);
            if *self.fail_disconnect.lock().unwrap() {
                return Err(VoiceError::ExternalCallFailed("already gone".into()));
            }
            Ok(())
        }
    }

    const GUILD: u64 = 10;
    const C1: u64 = 111;
    const C2: u64 = 222;
    const USER: Actor = Actor::Member(5);

    fn manager() -> (VoiceSessionManager, Arc<ScriptedConnector>, Arc<MemoryAuditSink>) {
        let connector = Arc::new(ScriptedConnector::default());
        let audit = Arc::new(MemoryAuditSink::new());
        let manager =
            VoiceSessionManager::new(connector.clone(), audit.clone(), Arc::new(GuildLocks::new()));
        (manager, connector, audit)
    }

    #[tokio::test]
    async fn first_play_connects_and_starts() {
        let (manager, connector, _) = manager();

        let outcome = manager.play(USER, GUILD, C1, "https://a").await.unwrap();

        assert_eq!(
            outcome,
            PlayOutcome::Started {
                url: "https://a".into()
            }
        );
        let session = manager.session(GUILD).unwrap();
        assert_eq!(session.channel_id, C1);
        assert_eq!(session.state, SessionState::Playing);
        assert_eq!(session.current_track.as_deref(), Some("https://a"));
        assert_eq!(
            connector.calls(),
            vec![Call::Connect(C1), Call::Start("https://a".into())]
        );
    }

    #[tokio::test]
    async fn second_channel_conflicts_and_keeps_first() {
        let (manager, connector, _) = manager();
        manager.play(USER, GUILD, C1, "https://a").await.unwrap();

        let err = manager
            .play(USER, GUILD, C2, "https://b")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ChannelConflict);
        let session = manager.session(GUILD).unwrap();
        assert_eq!(session.channel_id, C1);
        assert_eq!(session.current_track.as_deref(), Some("https://a"));
        assert!(session.queue.is_empty());
        assert_eq!(connector.calls().len(), 2);
    }

    #[tokio::test]
    async fn same_channel_while_playing_queues() {
        let (manager, _, _) = manager();
        manager.play(USER, GUILD, C1, "https://a").await.unwrap();

        let first = manager.play(USER, GUILD, C1, "https://b").await.unwrap();
        let second = manager.play(USER, GUILD, C1, "https://c").await.unwrap();

        assert_eq!(
            first,
            PlayOutcome::Queued {
                url: "https://b".into(),
                position: 1
            }
        );
        assert_eq!(
            second,
            PlayOutcome::Queued {
                url: "https://c".into(),
                position: 2
            }
        );
    }

    #[tokio::test]
    async fn failed_connect_leaves_no_session() {
        let (manager, connector, audit) = manager();
        *connector.fail_connect.lock().unwrap() = true;

        let err = manager
            .play(USER, GUILD, C1, "https://a")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalCallFailed);
        assert!(manager.session(GUILD).is_none());
        assert_eq!(manager.state(GUILD), SessionState::Disconnected);
        assert!(audit.entries().is_empty());

        // A later attempt starts from scratch.
        *connector.fail_connect.lock().unwrap() = false;
        manager.play(USER, GUILD, C2, "https://a").await.unwrap();
        assert_eq!(manager.session(GUILD).unwrap().channel_id, C2);
    }

    #[tokio::test]
    async fn failed_first_track_rolls_back_connection() {
        let (manager, connector, _) = manager();
        connector
            .bad_urls
            .lock()
            .unwrap()
            .insert("https://broken".into());

        let err = manager
            .play(USER, GUILD, C1, "https://broken")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalCallFailed);
        assert!(manager.session(GUILD).is_none());
        assert_eq!(connector.calls().last(), Some(&Call::Disconnect));
    }

    #[tokio::test]
    async fn track_end_with_empty_queue_disconnects_then_noops() {
        let (manager, connector, _) = manager();
        manager.play(USER, GUILD, C1, "https://a").await.unwrap();

        assert_eq!(
            manager.on_track_end(GUILD).await.unwrap(),
            TrackEndOutcome::Disconnected
        );
        assert_eq!(manager.state(GUILD), SessionState::Disconnected);

        assert_eq!(
            manager.on_track_end(GUILD).await.unwrap(),
            TrackEndOutcome::NoSession
        );
        let disconnects = connector
            .calls()
            .into_iter()
            .filter(|c| *c == Call::Disconnect)
            .count();
        assert_eq!(disconnects, 1);
    }

    #[tokio::test]
    async fn track_end_with_queue_plays_next_and_stays() {
        let (manager, _, _) = manager();
        manager.play(USER, GUILD, C1, "https://a").await.unwrap();
        manager.play(USER, GUILD, C1, "https://b").await.unwrap();

        assert_eq!(
            manager.on_track_end(GUILD).await.unwrap(),
            TrackEndOutcome::NextTrack {
                url: "https://b".into()
            }
        );
        let session = manager.session(GUILD).unwrap();
        assert_eq!(session.state, SessionState::Playing);
        assert_eq!(session.current_track.as_deref(), Some("https://b"));
        assert!(session.queue.is_empty());
    }

    #[tokio::test]
    async fn track_end_skips_queued_tracks_the_player_refuses() {
        let (manager, connector, _) = manager();
        connector
            .bad_urls
            .lock()
            .unwrap()
            .insert("https://broken".into());
        manager.play(USER, GUILD, C1, "https://a").await.unwrap();
        manager.play(USER, GUILD, C1, "https://broken").await.unwrap();
        manager.play(USER, GUILD, C1, "https://c").await.unwrap();

        assert_eq!(
            manager.on_track_end(GUILD).await.unwrap(),
            TrackEndOutcome::NextTrack {
                url: "https://c".into()
            }
        );
    }

    #[tokio::test]
    async fn empty_channel_forces_disconnect_while_playing() {
        let (manager, _, audit) = manager();
        manager.play(USER, GUILD, C1, "https://a").await.unwrap();

        assert_eq!(
            manager.on_voice_state_changed(GUILD, C2, 0).await.unwrap(),
            OccupancyOutcome::Ignored
        );
        assert_eq!(
            manager.on_voice_state_changed(GUILD, C1, 2).await.unwrap(),
            OccupancyOutcome::Ignored
        );
        assert!(manager.session(GUILD).is_some());

        assert_eq!(
            manager.on_voice_state_changed(GUILD, C1, 0).await.unwrap(),
            OccupancyOutcome::Disconnected
        );
        assert!(manager.session(GUILD).is_none());
        let last = audit.entries().pop().unwrap();
        assert_eq!(last.action, AuditAction::VoiceDisconnected);
        assert_eq!(last.actor, Actor::System);
    }

    #[tokio::test]
    async fn failed_disconnect_still_drops_session() {
        let (manager, connector, _) = manager();
        manager.play(USER, GUILD, C1, "https://a").await.unwrap();
        *connector.fail_disconnect.lock().unwrap() = true;

        let err = manager.on_track_end(GUILD).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalCallFailed);
        assert!(manager.session(GUILD).is_none());
    }

    #[tokio::test]
    async fn leave_and_skip_need_a_session() {
        let (manager, connector, _) = manager();
        assert_eq!(
            manager.leave(USER, GUILD).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            manager.skip(USER, GUILD).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );

        manager.play(USER, GUILD, C1, "https://a").await.unwrap();
        manager.skip(USER, GUILD).await.unwrap();
        // Skipping only asks the player to stop; the session waits for the end signal.
        assert!(manager.session(GUILD).is_some());
        assert_eq!(connector.calls().last(), Some(&Call::Stop));

        manager.leave(USER, GUILD).await.unwrap();
        assert!(manager.session(GUILD).is_none());
    }

    #[tokio::test]
    async fn connection_lost_forgets_without_calling_out() {
        let (manager, connector, _) = manager();
        manager.play(USER, GUILD, C1, "https://a").await.unwrap();

        assert!(manager.on_connection_lost(GUILD).await);
        assert!(!manager.on_connection_lost(GUILD).await);
        assert!(!connector.calls().contains(&Call::Disconnect));
    }

    #[tokio::test]
    async fn moved_bot_takes_its_session_along() {
        let (manager, connector, audit) = manager();
        manager.play(USER, GUILD, C1, "https://a").await.unwrap();

        assert!(!manager.on_bot_moved(GUILD, C1).await);
        assert!(manager.on_bot_moved(GUILD, C2).await);
        assert_eq!(manager.session(GUILD).unwrap().channel_id, C2);
        assert_eq!(audit.actions().last(), Some(&AuditAction::VoiceMoved));

        // Listeners in the new channel queue instead of conflicting.
        assert!(matches!(
            manager.play(USER, GUILD, C2, "https://b").await.unwrap(),
            PlayOutcome::Queued { position: 1, .. }
        ));
        // The old channel emptying out no longer tears the connection down.
        assert_eq!(
            manager.on_voice_state_changed(GUILD, C1, 0).await.unwrap(),
            OccupancyOutcome::Ignored
        );
        assert!(manager.session(GUILD).is_some());
        assert!(!connector.calls().contains(&Call::Disconnect));
    }

    #[tokio::test]
    async fn move_without_session_is_ignored() {
        let (manager, _, audit) = manager();
        assert!(!manager.on_bot_moved(GUILD, C2).await);
        assert!(manager.session(GUILD).is_none());
        assert!(audit.entries().is_empty());
    }

    #[tokio::test]
    async fn blank_url_is_rejected() {
        let (manager, connector, _) = manager();
        let err = manager.play(USER, GUILD, C1, "   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn guilds_are_independent() {
        let (manager, _, _) = manager();
        manager.play(USER, 1, C1, "https://a").await.unwrap();
        manager.play(USER, 2, C2, "https://b").await.unwrap();

        manager.on_track_end(1).await.unwrap();
        assert!(manager.session(1).is_none());
        assert_eq!(manager.session(2).unwrap().channel_id, C2);
    }
}
