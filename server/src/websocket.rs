use crate::{
    app::{AppError, AppResult},
    notification::{NotificationHandler, Subscription},
};
use futures::{SinkExt, StreamExt};
use hyper::{
    header::{self, HeaderName, HeaderValue},
    Body, Request, Response, StatusCode,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    tungstenite::{handshake::derive_accept_key, protocol::Role, Message},
    WebSocketStream,
};

/// Whether the request asks for a WebSocket upgrade
pub fn is_upgrade_request(request: &Request<Body>) -> bool {
    header_has_token(request, header::UPGRADE, "websocket")
        && header_has_token(request, header::CONNECTION, "upgrade")
}

fn header_has_token(request: &Request<Body>, name: HeaderName, token: &str) -> bool {
    request
        .headers()
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|value| value.trim().eq_ignore_ascii_case(token))
}

/// Answers the handshake and hands the upgraded connection to [`serve_viewer`].
///
/// The viewer is subscribed before the 101 response goes out, so nothing
/// published after the client sees the connection open is missed.
pub async fn upgrade(
    mut request: Request<Body>,
    notifications: Arc<NotificationHandler>,
) -> AppResult<Response<Body>> {
    if !is_upgrade_request(&request) {
        return Err(AppError::invalid_request().with_message("Expected WebSocket"));
    }

    let accept_key = match request.headers().get(header::SEC_WEBSOCKET_KEY) {
        Some(key) => derive_accept_key(key.as_bytes()),
        None => {
            return Err(AppError::invalid_request()
                .with_message("missing 'Sec-WebSocket-Key' header"));
        }
    };
    let accept_key = HeaderValue::from_str(&accept_key)
        .map_err(|e| AppError::internal_error().with_context(&e))?;

    let subscription = notifications.subscribe().await;
    let on_upgrade = hyper::upgrade::on(&mut request);
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let socket = WebSocketStream::from_raw_socket(upgraded, Role::Server, None).await;
                serve_viewer(socket, subscription, notifications).await;
            }
            Err(error) => {
                error!("websocket upgrade failed: {}", error);
                notifications.unsubscribe(subscription.id).await;
            }
        }
    });

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(header::SEC_WEBSOCKET_ACCEPT, accept_key);

    Ok(response)
}

/// Forwards every published update to one viewer until either side goes away.
///
/// Frames from the viewer are read only to notice when it closes.
pub async fn serve_viewer<S>(
    socket: WebSocketStream<S>,
    subscription: Subscription,
    notifications: Arc<NotificationHandler>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Subscription { id, mut receiver } = subscription;
    info!("viewer {} connected", id);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outgoing = receiver.recv() => match outgoing {
                Some(message) => {
                    if let Err(error) = sink.send(Message::Text(message)).await {
                        debug!("failed to send update to viewer {}: {}", id, error);
                        break;
                    }
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    debug!("connection to viewer {} failed: {}", id, error);
                    break;
                }
            },
        }
    }

    notifications.unsubscribe(id).await;
    info!("viewer {} disconnected", id);
}
