//! WebSocket transport
//!
//! Accepts TCP connections, upgrades them, and runs one `Session` per
//! connection. Each connection has two halves:
//! - a writer task draining the client's outbound queue into the socket
//! - the read loop, feeding text frames into the session
//!
//! Whichever half stops first ends the connection. Session cleanup
//! (unsubscribe, drop the user's writer entries) runs exactly once, after the
//! read loop exits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::client::Client;
use crate::config::Settings;
use crate::notify::NotificationService;
use crate::transport::message::ServerMessage;
use crate::transport::session::{Outcome, Session};
use crate::utils::error::TransportError;

pub async fn bind(addr: &str) -> Result<TcpListener, TransportError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })
}

pub async fn start_websocket_server(
    service: Arc<NotificationService>,
    settings: Settings,
) -> Result<(), TransportError> {
    let listener = bind(&settings.addr()).await?;
    serve(listener, service, settings.presence.max_connections).await
}

/// Accept connections on `listener` until the task is cancelled.
pub async fn serve(
    listener: TcpListener,
    service: Arc<NotificationService>,
    max_connections: usize,
) -> Result<(), TransportError> {
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);
    let active = Arc::new(AtomicUsize::new(0));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {e}");
                continue;
            }
        };

        let slot = ConnectionSlot::acquire(&active, max_connections);
        let service = service.clone();
        spawn(handle_connection(stream, peer, service, slot));
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<NotificationService>,
    slot: Option<ConnectionSlot>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error from {peer}: {}", TransportError::from(e));
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let Some(_slot) = slot else {
        warn!("Rejecting {peer}: connection limit reached");
        if let Ok(json) = serde_json::to_string(&ServerMessage::error("server full")) {
            let _ = ws_sender.send(WsMessage::text(json)).await;
        }
        let _ = ws_sender.close().await;
        return;
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Arc::new(Client::new(tx));
    let client_id = client.id.clone();
    info!("{client_id} connected from {peer}");

    let mut writer = {
        let client_id = client_id.clone();
        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    debug!("Failed to send message to {client_id}: {e}");
                    return;
                }
            }
            let _ = ws_sender.close().await;
        })
    };

    let mut session = Session::new(service, client);

    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if session.handle_text(text.as_str()) == Outcome::Close {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Read error from {client_id}: {e}");
                    break;
                }
            },
            _ = &mut writer => {
                debug!("Send loop closed for {client_id}");
                break;
            }
        }
    }

    // Dropping the session releases the only strong reference to the client,
    // which closes the outbound queue once pending frames are flushed.
    session.close();
    drop(session);
    info!("{client_id} disconnected");
}

/// One unit of the connection budget, returned on drop.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn acquire(active: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| ConnectionSlot(active.clone()))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
