// Songbird-backed voice connector.
//
// The core keeps its own queue, so every track is started with `play_input`
// rather than songbird's builtin queue. Track ends are forwarded to the
// session manager as guild ids over an mpsc channel.

use crate::core::voice::{VoiceConnector, VoiceError};
use async_trait::async_trait;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use songbird::error::{ControlError, JoinError};
use songbird::input::YoutubeDl;
use songbird::tracks::TrackHandle;
use songbird::{Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

struct PlayingTrack {
    generation: u64,
    handle: TrackHandle,
}

pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
    /// The track each guild is currently playing.
    playing: Arc<DashMap<u64, PlayingTrack>>,
    generation: AtomicU64,
    track_end_tx: UnboundedSender<u64>,
}

impl SongbirdConnector {
    /// Returns the connector and the receiving end of its track-end signals.
    pub fn new(
        manager: Arc<Songbird>,
        http_client: reqwest::Client,
    ) -> (Self, UnboundedReceiver<u64>) {
        let (track_end_tx, track_end_rx) = mpsc::unbounded_channel();
        let connector = Self {
            manager,
            http_client,
            playing: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
            track_end_tx,
        };
        (connector, track_end_rx)
    }
}

fn voice_err(e: impl std::fmt::Display) -> VoiceError {
    VoiceError::ExternalCallFailed(e.to_string())
}

/// Stopping a track that already finished is not an error.
fn stop_outcome(result: Result<(), ControlError>) -> Result<(), VoiceError> {
    match result {
        Ok(()) | Err(ControlError::Finished) => Ok(()),
        Err(e) => Err(voice_err(e)),
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(&self, guild_id: u64, channel_id: u64) -> Result<(), VoiceError> {
        self.manager
            .join(
                serenity::GuildId::new(guild_id),
                serenity::ChannelId::new(channel_id),
            )
            .await
            .map(|_| ())
            .map_err(voice_err)
    }

    async fn start_track(&self, guild_id: u64, url: &str) -> Result<(), VoiceError> {
        let call = self
            .manager
            .get(serenity::GuildId::new(guild_id))
            .ok_or(VoiceError::NotConnected)?;

        let source = YoutubeDl::new(self.http_client.clone(), url.to_string());
        let handle = call.lock().await.play_input(source.into());

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.playing.insert(
            guild_id,
            PlayingTrack {
                generation,
                handle: handle.clone(),
            },
        );

        let notifier = TrackEndNotifier {
            guild_id,
            generation,
            playing: Arc::clone(&self.playing),
            tx: self.track_end_tx.clone(),
        };
        // A track that fails to load reports Error instead of End.
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(voice_err)?;
        }
        Ok(())
    }

    async fn stop_track(&self, guild_id: u64) -> Result<(), VoiceError> {
        // The track may have ended before its end signal reached the session.
        let Some(playing) = self.playing.get(&guild_id) else {
            return Ok(());
        };
        stop_outcome(playing.handle.stop())
    }

    async fn disconnect(&self, guild_id: u64) -> Result<(), VoiceError> {
        // Forget the track first so its end event is not reported.
        self.playing.remove(&guild_id);
        match self.manager.remove(serenity::GuildId::new(guild_id)).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(voice_err(e)),
        }
    }
}

/// Reports the end of one specific track. Ends of tracks that were already
/// replaced or torn down are dropped.
#[derive(Clone)]
struct TrackEndNotifier {
    guild_id: u64,
    generation: u64,
    playing: Arc<DashMap<u64, PlayingTrack>>,
    tx: UnboundedSender<u64>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(_) = ctx {
            let current = self
                .playing
                .remove_if(&self.guild_id, |_, track| {
                    track.generation == self.generation
                })
                .is_some();
            if current && self.tx.send(self.guild_id).is_err() {
                tracing::warn!(guild_id = self.guild_id, "Track end receiver dropped");
            }
        }
        None
    }
}
