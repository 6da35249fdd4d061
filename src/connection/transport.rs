//! Low-level WebSocket transport helpers: gateway URL resolution, handshake,
//! frame encoding and keepalive jitter.

use crate::error::{PylonLinkError, Result};
use crate::event_handlers::{EventHandlers, TransportError};
use crate::models::{ClientFrame, ServerFrame};
use crate::timeouts::PylonLinkTimeouts;
use futures_util::SinkExt;
use std::time::Duration;
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest, error::Error as WsError, http::HeaderValue, protocol::Message,
};

/// The connected WebSocket stream type used throughout the engine.
pub(crate) type WebSocketStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Capacity of the engine command channel.
pub(crate) const DEFAULT_CMD_CHANNEL_CAPACITY: usize = 256;

/// Maximum accepted text frame size (16 MiB).
pub(crate) const MAX_WS_TEXT_MESSAGE_BYTES: usize = 16 << 20;

/// A duration far enough in the future (~100 years) to act as "never" for
/// deadline calculations without overflowing `Instant::now() + dur`.
pub(crate) const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Header carrying the API key on the lookup call and the WS handshake.
pub(crate) const API_KEY_HEADER: &str = "x-pylon-api-key";

/// Map an http(s) URL to its ws(s) twin; ws(s) URLs pass through.
pub(crate) fn map_ws_scheme(url: &str) -> Result<String> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url.to_string())
    } else if let Some(rest) = url.strip_prefix("https://") {
        Ok(format!("wss://{}", rest))
    } else if let Some(rest) = url.strip_prefix("http://") {
        Ok(format!("ws://{}", rest))
    } else {
        Err(PylonLinkError::ConfigurationError(format!(
            "Unsupported URL scheme: {}",
            url
        )))
    }
}

/// Resolve the realtime gateway URL: the builder override when present,
/// otherwise the discovery endpoint on the base URL. The gateway address can
/// move between reconnects, so this runs before every transport attempt.
pub(crate) async fn resolve_gateway_url(
    http_client: &reqwest::Client,
    base_url: &str,
    gateway_url_override: Option<&str>,
    api_key: Option<&str>,
    lookup_timeout: Duration,
) -> Result<String> {
    if let Some(url) = gateway_url_override {
        return map_ws_scheme(url);
    }

    let lookup_url = format!("{}/rt/lookup", base_url.trim_end_matches('/'));
    log::debug!("[pylon-link] Resolving gateway URL from {}", lookup_url);

    let mut request = http_client.get(&lookup_url);
    if !PylonLinkTimeouts::is_no_timeout(lookup_timeout) {
        request = request.timeout(lookup_timeout);
    }
    if let Some(key) = api_key {
        request = request.header(API_KEY_HEADER, key);
    }

    let response = request.send().await?.error_for_status()?;
    let gateway_url = response.json::<String>().await?;
    map_ws_scheme(&gateway_url)
}

/// Establish the WebSocket connection, bounded by `connection_timeout`.
/// Handshake failures are also reported through `on_error` so lifecycle
/// observers see them without awaiting `connect()`.
pub(crate) async fn establish_ws(
    gateway_url: &str,
    api_key: Option<&str>,
    timeouts: &PylonLinkTimeouts,
    event_handlers: &EventHandlers,
) -> Result<WebSocketStream> {
    log::debug!("[pylon-link] Establishing WebSocket connection to {}", gateway_url);

    let mut request = gateway_url.into_client_request().map_err(|e| {
        PylonLinkError::ConfigurationError(format!("Failed to build WebSocket request: {}", e))
    })?;
    if let Some(key) = api_key {
        let value = HeaderValue::from_str(key).map_err(|e| {
            PylonLinkError::ConfigurationError(format!("Invalid API key header value: {}", e))
        })?;
        request.headers_mut().insert(API_KEY_HEADER, value);
    }

    let connect_result = if !PylonLinkTimeouts::is_no_timeout(timeouts.connection_timeout) {
        tokio::time::timeout(
            timeouts.connection_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
    } else {
        Ok(tokio_tungstenite::connect_async(request).await)
    };

    match connect_result {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(WsError::Http(response))) => {
            let status = response.status();
            let message = match status.as_u16() {
                401 => "Unauthorized: gateway requires valid credentials".to_string(),
                403 => "Forbidden: access to gateway denied".to_string(),
                code => format!("Gateway HTTP error: {}", code),
            };
            event_handlers.emit_error(TransportError::new(&message, false));
            Err(PylonLinkError::ConnectionError(message))
        }
        Ok(Err(e)) => {
            let message = format!("Connection failed: {}", e);
            event_handlers.emit_error(TransportError::new(&message, true));
            Err(PylonLinkError::ConnectionError(message))
        }
        Err(_) => {
            let message = format!("Connection timeout ({:?})", timeouts.connection_timeout);
            event_handlers.emit_error(TransportError::new(&message, true));
            Err(PylonLinkError::ConnectionError(message))
        }
    }
}

/// Serialize and send one client frame, feeding the `on_send` debug hook.
pub(crate) async fn send_frame(
    ws: &mut WebSocketStream,
    frame: &ClientFrame,
    event_handlers: &EventHandlers,
) -> Result<()> {
    let payload = serde_json::to_string(frame)?;
    event_handlers.emit_send(&payload);
    ws.send(Message::Text(payload.into()))
        .await
        .map_err(|e| PylonLinkError::ConnectionError(format!("Failed to send frame: {}", e)))
}

/// Parse one inbound text frame.
pub(crate) fn parse_frame(text: &str) -> Result<ServerFrame> {
    serde_json::from_str(text)
        .map_err(|e| PylonLinkError::ProtocolError(format!("Unparseable frame: {}", e)))
}

/// Spread keepalive pings out by up to ±10% so a fleet of clients created at
/// the same moment does not ping in lockstep.
pub(crate) fn jitter_keepalive_interval(base: Duration, tag: &str) -> Duration {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    tag.hash(&mut hasher);
    let bucket = hasher.finish() % 21; // 0..=20
    let percent = 90 + bucket; // 90%..110%
    base.mul_f64(percent as f64 / 100.0)
}
