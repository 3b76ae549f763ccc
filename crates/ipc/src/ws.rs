//! WebSocket JSON-RPC 2.0 transport.
//!
//! Accepts WebSocket connections at `/ws` and routes text frames through the
//! shared `IpcHandler`, one JSON-RPC message per frame. When `WsAuth.api_key`
//! is set, connections must carry `?key=<api_key>`.
//!
//! Broadcast events are pushed to each connection as notifications.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::server::{respond, IpcHandler};

#[derive(Debug, Clone, Default)]
pub struct WsAuth {
    /// Key required in the `?key=` query parameter. `None` disables auth.
    pub api_key: Option<String>,
}

/// Listen on `port` and serve JSON-RPC over WebSocket at `/ws`.
pub async fn run_ws_server(
    port: u16,
    handler: Arc<dyn IpcHandler>,
    auth: WsAuth,
    event_tx: broadcast::Sender<String>,
) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket server listening on ws://0.0.0.0:{}/ws", port);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let handler = handler.clone();
                let auth = auth.clone();
                let event_rx = event_tx.subscribe();
                tokio::spawn(async move {
                    let ws_stream = match accept_ws(stream, &auth).await {
                        Ok(ws) => ws,
                        Err(e) => {
                            debug!("WebSocket handshake failed from {}: {}", peer, e);
                            return;
                        }
                    };

                    debug!("WebSocket client connected: {}", peer);
                    handle_ws_connection(ws_stream, handler, peer, event_rx).await;
                    debug!("WebSocket client disconnected: {}", peer);
                });
            }
            Err(e) => {
                error!("Failed to accept TCP connection: {}", e);
            }
        }
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut err = ErrorResponse::new(Some(reason.to_string()));
    *err.status_mut() = status;
    err
}

/// Value of `key` in a query string such as `a=1&key=abc`.
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// Handshake check: path must be `/ws` and the API key must match if set.
fn check_request(req: &Request, auth: &WsAuth) -> Result<(), ErrorResponse> {
    let uri = req.uri();
    if uri.path() != "/ws" && uri.path() != "/ws/" {
        return Err(reject(StatusCode::NOT_FOUND, "Not Found"));
    }
    let supplied = query_param(uri.query().unwrap_or(""), "key");
    match &auth.api_key {
        Some(expected) if supplied != Some(expected.as_str()) => {
            Err(reject(StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        _ => Ok(()),
    }
}

async fn accept_ws(
    stream: TcpStream,
    auth: &WsAuth,
) -> Result<WebSocketStream<TcpStream>, tokio_tungstenite::tungstenite::Error> {
    let auth = auth.clone();
    tokio_tungstenite::accept_hdr_async(stream, move |req: &Request, resp: Response| {
        check_request(req, &auth).map(|_| resp)
    })
    .await
}

async fn handle_ws_connection(
    ws_stream: WebSocketStream<TcpStream>,
    handler: Arc<dyn IpcHandler>,
    peer: std::net::SocketAddr,
    mut event_rx: broadcast::Receiver<String>,
) {
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            msg = stream.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        debug!("WebSocket read error from {}: {}", peer, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        if let Some(json) = respond(handler.as_ref(), &text).await {
                            if sink.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Ping(data) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }

            event = event_rx.recv() => {
                match event {
                    Ok(notification) => {
                        if sink.send(Message::Text(notification)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client {} lagged, dropped {} events", peer, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
