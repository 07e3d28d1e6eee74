//! WebSocket surface: endpoint routing and the per-socket loops.
//!
//! Two endpoints per room. `/submit/{room}` is write-only from the client's
//! point of view: frames are routed to the shared channel. `/receive/{room}`
//! is read-only: the socket is registered for the room's broadcasts and
//! nothing the client sends on it is interpreted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing::{debug, info};
use uuid::Uuid;

use crate::connection::{Connection, SendError};
use crate::rooms::RoomRegistry;
use crate::router::InboundRouter;

/// Room used when the endpoint path names none.
pub(crate) const DEFAULT_ROOM: &str = "default";

// ---------------------------------------------------------------------------
// Type aliases for WebSocket split halves
// ---------------------------------------------------------------------------

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;
type WsWrite = futures_util::stream::SplitSink<WsStream, tungstenite::Message>;

// ---------------------------------------------------------------------------
// Endpoint routing
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Submit { room: String },
    Receive { room: String },
}

/// Map a request path to an endpoint. `/submit` and `/receive` with no room
/// segment fall back to [`DEFAULT_ROOM`]; anything else is not served.
pub(crate) fn parse_endpoint(path: &str) -> Option<Endpoint> {
    let path = path.split('?').next().unwrap_or(path);
    let mut segments = path.trim_matches('/').split('/');
    let kind = segments.next()?;
    let room = segments
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_ROOM)
        .to_string();
    if segments.next().is_some() {
        return None;
    }
    match kind {
        "submit" => Some(Endpoint::Submit { room }),
        "receive" => Some(Endpoint::Receive { room }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Outbound connection
// ---------------------------------------------------------------------------

/// Write half of a `/receive` socket, as the registry sees it.
struct WsConnection {
    id: String,
    writer: Mutex<WsWrite>,
    open: AtomicBool,
}

impl WsConnection {
    fn new(writer: WsWrite) -> Self {
        Self {
            id: format!("conn-{}", Uuid::new_v4()),
            writer: Mutex::new(writer),
            open: AtomicBool::new(true),
        }
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl Connection for WsConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, payload: &str) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError("connection closed".to_string()));
        }
        let mut writer = self.writer.lock().await;
        writer
            .send(tungstenite::Message::Text(payload.into()))
            .await
            .map_err(|e| {
                self.mark_closed();
                SendError(e.to_string())
            })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Socket handlers
// ---------------------------------------------------------------------------

/// Upgrade one accepted TCP stream and run the loop its endpoint calls for.
/// Unknown paths are refused during the handshake.
pub(crate) async fn handle_socket(
    stream: TcpStream,
    peer: SocketAddr,
    rooms: Arc<RoomRegistry>,
    router: Arc<InboundRouter>,
) {
    let mut endpoint = None;
    let accepted = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        match parse_endpoint(req.uri().path()) {
            Some(parsed) => {
                endpoint = Some(parsed);
                Ok(resp)
            }
            None => {
                let mut refused = ErrorResponse::new(Some("no such endpoint".to_string()));
                *refused.status_mut() = tungstenite::http::StatusCode::NOT_FOUND;
                Err(refused)
            }
        }
    })
    .await;

    let ws = match accepted {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%peer, error = %e, "handshake refused");
            return;
        }
    };
    let Some(endpoint) = endpoint else {
        return;
    };

    match endpoint {
        Endpoint::Submit { room } => submit_loop(ws, peer, &room, router).await,
        Endpoint::Receive { room } => receive_loop(ws, peer, &room, rooms).await,
    }
}

/// Read frames from a submitter until the socket goes away. Empty frames are
/// idle ticks; non-text frames are ignored.
async fn submit_loop(mut ws: WsStream, peer: SocketAddr, room: &str, router: Arc<InboundRouter>) {
    info!(%peer, room = %room, "submit connection opened");
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(tungstenite::Message::Text(raw)) => {
                if raw.is_empty() {
                    continue;
                }
                router.route(room, raw.as_str()).await;
            }
            Ok(tungstenite::Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%peer, room = %room, error = %e, "submit socket error");
                break;
            }
        }
    }
    info!(%peer, room = %room, "submit connection closed");
}

/// Register the socket for the room's broadcasts, then sit on the read half
/// until the client goes away. Closing does not unregister; the membership
/// falls out on the next failed delivery.
async fn receive_loop(ws: WsStream, peer: SocketAddr, room: &str, rooms: Arc<RoomRegistry>) {
    let (write, mut read) = ws.split();
    let conn = Arc::new(WsConnection::new(write));
    rooms
        .register(Arc::clone(&conn) as Arc<dyn Connection>, room)
        .await;
    info!(%peer, room = %room, connection = %conn.id(), "receive connection registered");

    while let Some(frame) = read.next().await {
        match frame {
            Ok(tungstenite::Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    conn.mark_closed();
    info!(%peer, room = %room, connection = %conn.id(), "receive connection closed");
}
