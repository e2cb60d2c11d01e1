use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, warn};

use super::{LiveHandle, Subscription};
use crate::errors::{DaemonError, Result};
use crate::manager::ServiceManager;
use crate::registry::Registry;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Checks credentials presented by a live-feed client
pub trait Authenticator: Send + Sync + 'static {
    fn login(&self, username: &str, password: &str) -> impl Future<Output = Result<()>> + Send;
}

impl<M: ServiceManager> Authenticator for Registry<M> {
    async fn login(&self, username: &str, password: &str) -> Result<()> {
        Registry::login(self, username, password).await
    }
}

/// Decode an `Authorization: Basic ...` header value into user and password
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Accept websocket clients on `listener` until `shutdown` resolves
pub async fn serve<A: Authenticator>(
    listener: TcpListener,
    hub: LiveHandle,
    auth: A,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let auth = Arc::new(auth);
    tokio::pin!(shutdown);

    if let Ok(addr) = listener.local_addr() {
        info!("Live feed listening on ws://{}", addr);
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                let hub = hub.clone();
                let auth = Arc::clone(&auth);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, hub, auth).await {
                        debug!("Connection {} ended: {}", peer, e);
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Live feed listener stopped");
                return Ok(());
            }
        }
    }
}

async fn handle_connection<A: Authenticator>(
    stream: TcpStream,
    peer: SocketAddr,
    hub: LiveHandle,
    auth: Arc<A>,
) -> Result<()> {
    let mut authorization: Option<String> = None;
    let callback = |request: &Request, response: Response| {
        authorization = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok::<Response, ErrorResponse>(response)
    };

    let handshake = accept_hdr_async(stream, callback);
    let mut ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(DaemonError::Internal(format!(
                "websocket handshake with {} timed out",
                peer
            )));
        }
    };

    let (user, password) = authorization
        .as_deref()
        .and_then(parse_basic_auth)
        .unwrap_or_default();
    if let Err(e) = auth.login(&user, &password).await {
        warn!("Rejected live feed client {}: {}", peer, e);
        let frame = CloseFrame {
            code: CloseCode::Policy,
            reason: e.to_string().into(),
        };
        ws.send(Message::Close(Some(frame))).await?;
        return Ok(());
    }
    drop(auth);

    let Subscription { id, mut outbox } = hub.subscribe().await?;
    info!("Live feed client {} connected as subscriber {}", peer, id);
    let (mut sender, mut receiver) = ws.split();

    loop {
        tokio::select! {
            payload = outbox.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = sender.send(Message::Text(payload.to_string().into())).await {
                        debug!("Write to {} failed: {}", peer, e);
                        break;
                    }
                }
                None => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sender.send(Message::Pong(data)).await {
                        debug!("Pong to {} failed: {}", peer, e);
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Read from {} failed: {}", peer, e);
                    break;
                }
            },
        }
    }

    hub.unsubscribe(id).await;
    info!("Live feed client {} disconnected", peer);
    Ok(())
}
