// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases, Discord and voice APIs)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::{BotConfig, StorageBackend};
use crate::core::errors::ErrorKind;
use crate::core::guild_locks::GuildLocks;
use crate::core::leveling::{LevelingService, LevelingStore};
use crate::core::moderation::ModerationService;
use crate::core::notifier::AuditSink;
use crate::core::voice::{TrackEndOutcome, VoiceSessionManager};
use crate::discord::commands::presence;
use crate::discord::events::{activity, voice_state};
use crate::discord::replies;
use crate::discord::{Data, Error};
use crate::infra::audit::TracingAuditSink;
use crate::infra::leveling::{DiscordRoleGranter, InMemoryLevelingStore, SqliteLevelingStore};
use crate::infra::moderation::SerenityModerationGateway;
use crate::infra::voice::SongbirdConnector;
use poise::serenity_prelude as serenity;
use songbird::serenity::SerenityInit;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = activity::handle_message(ctx, data, new_message).await {
                tracing::error!("Error processing XP for message: {}", e);
            }
        }
        serenity::FullEvent::VoiceStateUpdate { new, .. } => {
            if let Err(e) = voice_state::handle_voice_state_update(ctx, data, new).await {
                tracing::error!("Error handling voice state update: {}", e);
            }
        }
        _ => {}
    }

    Ok(())
}

/// Reply with the error text instead of poise's generic message.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let command = &ctx.command().qualified_name;
            match replies::error_kind(&error) {
                Some(kind @ (ErrorKind::ExternalCallFailed | ErrorKind::Storage)) => {
                    tracing::error!(%command, %kind, "Command failed: {}", error)
                }
                kind => tracing::info!(%command, kind = ?kind, "Command rejected: {}", error),
            }
            if let Err(e) = ctx.say(format!("❌ {}", error)).await {
                tracing::error!("Failed to report command error: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Feed player track-end signals into the session manager until the
/// connector is dropped.
fn spawn_track_end_listener(
    voice: Arc<VoiceSessionManager>,
    mut track_ends: UnboundedReceiver<u64>,
) {
    tokio::spawn(async move {
        while let Some(guild_id) = track_ends.recv().await {
            match voice.on_track_end(guild_id).await {
                Ok(TrackEndOutcome::NextTrack { url }) => {
                    tracing::debug!(guild_id, %url, "Advanced to next queued track");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(guild_id, "Track end handling failed: {}", e),
            }
        }
    });
}

async fn open_store(storage: &StorageBackend) -> anyhow::Result<Arc<dyn LevelingStore>> {
    Ok(match storage {
        StorageBackend::InMemory => {
            tracing::warn!("DATABASE_URL is :memory:, leveling data will not survive a restart");
            Arc::new(InMemoryLevelingStore::new())
        }
        StorageBackend::Sqlite(url) => Arc::new(SqliteLevelingStore::connect(url).await?),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = BotConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let store = open_store(&config.storage).await?;
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    // Shared so leveling and voice transitions for one guild never interleave.
    let locks = Arc::new(GuildLocks::new());

    let songbird = songbird::Songbird::serenity();
    let (connector, track_ends) =
        SongbirdConnector::new(Arc::clone(&songbird), reqwest::Client::new());
    let voice = Arc::new(VoiceSessionManager::new(
        Arc::new(connector),
        Arc::clone(&audit),
        Arc::clone(&locks),
    ));

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let leveling_config = config.leveling.clone();
    let status_message = config.status_message.clone();
    let dev_guild_id = config.dev_guild_id;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up...");

                match dev_guild_id {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?;
                        tracing::info!(guild_id, "Commands registered in development guild");
                    }
                    None => {
                        // Global registration can take up to an hour to propagate.
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?;
                        tracing::info!("Commands registered globally");
                    }
                }

                presence::on_ready(ctx, &status_message);

                let leveling = Arc::new(LevelingService::new(
                    store,
                    Arc::new(DiscordRoleGranter::new(ctx.http.clone())),
                    Arc::clone(&audit),
                    locks,
                    leveling_config,
                ));
                let moderation = Arc::new(ModerationService::new(
                    Arc::new(SerenityModerationGateway::new(ctx.http.clone())),
                    audit,
                ));

                spawn_track_end_listener(Arc::clone(&voice), track_ends);

                tracing::info!("Bot is ready!");
                Ok(Data {
                    leveling,
                    voice,
                    moderation,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .register_songbird_with(songbird)
        .await?;

    client.start().await?;
    Ok(())
}
