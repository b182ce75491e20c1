//! # Main Entry Point
//!
//! Initializes the bot:
//! - Domain: Configuration
//! - Infrastructure: Matrix connection
//! - Application: Statistics, Dispatcher, Supervisor, Router
//! - Interface: Built-in command handlers
//!

use anyhow::{Context, Result};
use clap::Parser;
use matrix_sdk::{
    Client,
    config::SyncSettings,
    room::Room,
    ruma::events::room::{
        member::{MembershipState, StrippedRoomMemberEvent},
        message::{MessageType, SyncRoomMessageEvent},
    },
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use relay::application::dispatcher::Dispatcher;
use relay::application::policy::SendOptions;
use relay::application::router::{CommandRouter, Routed};
use relay::application::stats::StatsTracker;
use relay::application::supervisor::{Supervisor, SupervisorSettings};
use relay::domain::config::AppConfig;
use relay::domain::traits::Connection;
use relay::domain::types::InboundMessage;
use relay::infrastructure::matrix::MatrixConnection;
use relay::interface::commands::register_builtin;

#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Matrix bot with supervised commands and retrying delivery")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "data/config.yaml")]
    config: PathBuf,

    /// Directory for session.log
    #[arg(long, default_value = "data")]
    log_dir: PathBuf,
}

fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Clear previous session log
    let log_path = log_dir.join("session.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "session.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,matrix_sdk=warn,matrix_sdk_base=warn,matrix_sdk_crypto=error,ruma=warn,hyper=warn",
        )
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load Configuration
    let config = AppConfig::load(&args.config)?;

    // 2. Logging Setup
    let _guard = init_logging(&args.log_dir)?;
    tracing::info!("Starting Relay...");

    // 3. Delivery and Supervision
    let stats = Arc::new(StatsTracker::new());
    let dispatcher = Dispatcher::new(stats.clone(), SendOptions::from(&config.delivery));
    let supervisor = Supervisor::new(dispatcher, SupervisorSettings::from(&config.supervisor));

    let mut router = CommandRouter::new(config.system.clone(), supervisor);
    register_builtin(&mut router);
    let router = Arc::new(router);

    // 4. Matrix Setup
    let matrix = &config.services.matrix;
    let client = Client::builder()
        .homeserver_url(&matrix.homeserver)
        .build()
        .await
        .context("Failed to build Matrix client")?;

    client
        .matrix_auth()
        .login_username(&matrix.username, &matrix.password)
        .send()
        .await
        .context("Failed to log in")?;
    tracing::info!("Logged in as {}", matrix.username);

    if let Some(name) = &matrix.display_name {
        if let Err(e) = client.account().set_display_name(Some(name.as_str())).await {
            tracing::warn!("Failed to set display name: {}", e);
        }
    }

    let connection: Arc<dyn Connection> = Arc::new(MatrixConnection::new(client.clone()));

    // 5. Event Loop
    let start_time = SystemTime::now();
    let loop_router = router.clone();
    let loop_connection = connection.clone();

    client.add_event_handler(move |ev: SyncRoomMessageEvent, room: Room| {
        let router = loop_router.clone();
        let connection = loop_connection.clone();

        async move {
            let Some(original) = ev.as_original() else {
                return;
            };

            // Ignore events from before startup (initial sync backlog)
            let event_time = UNIX_EPOCH + Duration::from_millis(ev.origin_server_ts().get().into());
            if event_time < start_time {
                return;
            }

            let MessageType::Text(text) = &original.content.msgtype else {
                return;
            };
            if original.sender == room.own_user_id() {
                return;
            }

            let message = InboundMessage::new(
                room.room_id().as_str(),
                original.sender.as_str(),
                text.body.clone(),
            )
            .with_message_id(original.event_id.to_string());

            match router.route(connection, message).await {
                Routed::Ignored => {}
                routed => tracing::debug!("Message in {} routed: {:?}", room.room_id(), routed),
            }
        }
    });

    // Handle Invites
    client.add_event_handler(|ev: StrippedRoomMemberEvent, room: Room| async move {
        if ev.content.membership == MembershipState::Invite {
            if let Err(e) = room.join().await {
                tracing::warn!("Failed to join {}: {}", room.room_id(), e);
            }
        }
    });

    // 6. Sync until interrupted
    tokio::select! {
        res = client.sync(SyncSettings::default()) => {
            if let Err(e) = res {
                tracing::error!("Matrix sync failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down...");
        }
    }

    match serde_json::to_string(&stats.snapshot()) {
        Ok(json) => tracing::info!("Final delivery statistics: {}", json),
        Err(e) => tracing::warn!("Failed to serialize delivery statistics: {}", e),
    }
    Ok(())
}
