//! Arrivals delivered from the transport to the client runtime.

use std::sync::mpsc;

use psmove_protocol::ServiceMessage;

/// Everything a transport can report to its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection to the service is established
    ConnectionOpened,
    /// Connecting to the service failed
    ConnectionOpenFailed { reason: String },
    /// The connection was closed, by either side
    ConnectionClosed,
    /// Closing the connection reported an error
    ConnectionCloseFailed { reason: String },
    /// The socket reported an error while open
    SocketError { reason: String },
    /// A protocol value was decoded from the stream
    Message(ServiceMessage),
}

impl TransportEvent {
    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::ConnectionOpened => "connection_opened",
            TransportEvent::ConnectionOpenFailed { .. } => "connection_open_failed",
            TransportEvent::ConnectionClosed => "connection_closed",
            TransportEvent::ConnectionCloseFailed { .. } => "connection_close_failed",
            TransportEvent::SocketError { .. } => "socket_error",
            TransportEvent::Message(_) => "message",
        }
    }
}

/// Arrivals buffered between the transport and its consumer by default
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Producer half of the arrival channel, held by the transport side
pub type EventSender = mpsc::SyncSender<TransportEvent>;

/// Consumer half of the arrival channel, held by the client runtime
pub type EventReceiver = mpsc::Receiver<TransportEvent>;

/// Create the arrival channel with [`DEFAULT_EVENT_CAPACITY`]
pub fn event_channel() -> (EventSender, EventReceiver) {
    event_channel_with_capacity(DEFAULT_EVENT_CAPACITY)
}

/// Create an arrival channel holding at most `capacity` undelivered events
///
/// A full channel pushes back on the producer, so a consumer that stops
/// calling `update()` stalls the transport instead of growing the backlog.
/// A capacity of zero is raised to one.
pub fn event_channel_with_capacity(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::sync_channel(capacity.max(1))
}
