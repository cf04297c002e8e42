//! CLI for quillcast
//!
//! Subcommands:
//! - `server`: run the WebSocket server
//! - `client`: join a thread, signal writing for every line typed on stdin,
//!   and print writer updates

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info, warn};

use quillcast::client::{ClientEvent, SignalThrottle, WriterUpdates};
use quillcast::config::load_config;
use quillcast::notify::NotificationService;
use quillcast::presence::{PresenceTracker, ThreadId};
use quillcast::registry::SubscriptionRegistry;
use quillcast::transport::message::ClientMessage;
use quillcast::transport::websocket::start_websocket_server;

#[derive(Parser)]
#[command(name = "quillcast")]
enum Command {
    /// Start the WebSocket server
    Server,
    /// Join a thread as a user and type lines to signal writing
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Thread to view and write in
        #[arg(long, default_value_t = 1)]
        thread: u64,
        #[arg(long)]
        user_id: String,
        /// Display name shown to other viewers
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("Server failed: {}", e);
            }
        }
        Command::Client {
            url,
            thread,
            user_id,
            name,
        } => {
            quillcast::utils::logging::init("info");
            if let Err(e) = run_client(&url, ThreadId(thread), user_id, name).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            quillcast::utils::logging::init("info");
            return Err(e.into());
        }
    };
    quillcast::utils::logging::init(&config.log.level);

    let ttl = ChronoDuration::seconds(i64::try_from(config.presence.writer_ttl_secs)?);
    let service = Arc::new(NotificationService::new(
        PresenceTracker::with_ttl(ttl),
        SubscriptionRegistry::new(),
    ));

    if config.presence.sweep_interval_secs > 0 {
        tokio::spawn(NotificationService::start_sweep_loop(
            service.clone(),
            Duration::from_secs(config.presence.sweep_interval_secs),
        ));
    }

    tokio::select! {
        res = start_websocket_server(service, config.clone()) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(
    url: &str,
    thread: ThreadId,
    user_id: String,
    name: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ws_stream, _response) = connect_async(url).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    for msg in [
        ClientMessage::Identify { user_id, name },
        ClientMessage::View { thread },
    ] {
        ws_sender
            .send(WsMessage::Text(serde_json::to_string(&msg)?.into()))
            .await?;
    }

    let printer = tokio::spawn(async move {
        let mut updates = WriterUpdates::new();
        while let Some(frame) = ws_receiver.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Connection error: {e}");
                    break;
                }
            };
            match updates.on_frame(frame) {
                ClientEvent::Writers(writers) if writers.is_empty() => {
                    println!("Nobody is writing")
                }
                ClientEvent::Writers(writers) => println!("Writing: {}", writers.join(", ")),
                ClientEvent::ServerError(message) => warn!("Server error: {message}"),
                ClientEvent::Identified => info!("Identified"),
                ClientEvent::Ignored => {}
                ClientEvent::Closed => break,
            }
        }
    });

    println!("Type to signal writing, `/post` to finish the reply, Ctrl-D to quit.");
    let mut throttle = SignalThrottle::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let msg = if line.trim() == "/post" {
            throttle.reset(thread);
            ClientMessage::Stopped { thread }
        } else if throttle.should_send(thread, Instant::now()) {
            ClientMessage::Writing { thread }
        } else {
            continue;
        };
        ws_sender
            .send(WsMessage::Text(serde_json::to_string(&msg)?.into()))
            .await?;
    }

    ws_sender.close().await?;
    printer.abort();
    Ok(())
}
