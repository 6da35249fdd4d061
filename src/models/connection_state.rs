use std::fmt;

/// Lifecycle state of the single gateway connection.
///
/// The engine task owns the state; a mirrored atomic lets callers read it
/// without a round-trip (see
/// [`PylonLinkClient::connection_state`](crate::client::PylonLinkClient::connection_state)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, and no attempt in progress.
    Disconnected,
    /// An explicit or first-time connection attempt is in progress.
    Connecting,
    /// Transport is established; frames flow.
    Connected,
    /// Transport was lost unexpectedly; the backoff retry loop is running.
    Reconnecting,
}

impl ConnectionState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        write!(f, "{}", text)
    }
}
