#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Channel created; begin the first connection attempt.
    OpenRequested,
    /// Transport handshake finished.
    Connected,
    /// Raw text frame from the transport, not yet parsed.
    FrameReceived(String),
    /// Transport-level failure (connect refused, read error).
    TransportFailed(String),
    /// Connection went away for any reason.
    ConnectionClosed { code: Option<u16> },
    /// The reconnect timer elapsed.
    ReconnectDue,
    /// Caller asked to close the channel.
    CloseRequested,
}
