//! # psmove-transport
//!
//! Connection layer between the client runtime and the tracking service.
//!
//! A [`Transport`] owns the socket and whatever thread drives it. Everything it
//! observes (connection lifecycle changes and decoded protocol values) is
//! delivered as a [`TransportEvent`] through an [`EventSender`], which is the
//! only point where network-side activity crosses into the consumer thread.
//!
//! - [`TcpTransport`]: background worker thread with its own tokio runtime
//! - [`MockTransport`]: in-memory transport for tests and offline tooling

pub mod config;
pub mod error;
pub mod event;
pub mod mock;
pub mod tcp;

pub use config::TransportConfig;
pub use error::{Result, TransportError};
pub use event::{
    event_channel, event_channel_with_capacity, EventReceiver, EventSender, TransportEvent,
    DEFAULT_EVENT_CAPACITY,
};
pub use mock::MockTransport;
pub use tcp::TcpTransport;

use psmove_protocol::Request;

/// A connection to the tracking service
///
/// Implementations must never block in [`Transport::send_request`]; the
/// request is queued and written by whatever drives the socket.
pub trait Transport: Send {
    /// Begin connecting. Lifecycle and inbound traffic are reported on `events`.
    fn startup(&mut self, events: EventSender) -> Result<()>;

    /// Queue a request for sending. The request id must already be assigned.
    fn send_request(&mut self, request: Request) -> Result<()>;

    /// Give the transport a chance to do consumer-side I/O work
    ///
    /// Called once per client update cycle, before pending arrivals are drained.
    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    /// Close the connection. Safe to call more than once.
    fn shutdown(&mut self);

    /// Whether the connection is currently open
    fn is_connected(&self) -> bool;
}
