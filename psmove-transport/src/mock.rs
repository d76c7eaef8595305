//! In-memory transport for testing

use std::sync::{Arc, Mutex};

use psmove_protocol::{Request, ServiceMessage};

use crate::error::{Result, TransportError};
use crate::event::{EventSender, TransportEvent};
use crate::Transport;

/// Mock transport for unit and integration testing
///
/// Clones share state, so a test can keep one clone to inject arrivals and
/// inspect sent requests while the client owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    events: Option<EventSender>,
    sent: Vec<Request>,
    connected: bool,
    open_on_startup: bool,
    update_calls: usize,
    shutdown_calls: usize,
}

impl MockTransport {
    /// Create a mock that stays silent on startup
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that reports `ConnectionOpened` as soon as it is started
    pub fn connected_on_startup() -> Self {
        let mock = Self::default();
        mock.lock().open_on_startup = true;
        mock
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockTransportInner> {
        // A panicking test thread must not hide the state from the others
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver an arrival as if the network thread had produced it
    ///
    /// Never blocks. Returns `false` when the transport was never started or
    /// the arrival channel is full.
    pub fn inject(&self, event: TransportEvent) -> bool {
        let mut inner = self.lock();
        match &event {
            TransportEvent::ConnectionOpened => inner.connected = true,
            TransportEvent::ConnectionClosed
            | TransportEvent::ConnectionOpenFailed { .. }
            | TransportEvent::ConnectionCloseFailed { .. }
            | TransportEvent::SocketError { .. } => inner.connected = false,
            TransportEvent::Message(_) => {}
        }
        match &inner.events {
            Some(events) => events.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver a decoded protocol value
    pub fn inject_message(&self, message: ServiceMessage) -> bool {
        self.inject(TransportEvent::Message(message))
    }

    /// A handle the test can move to another thread to inject from there
    pub fn event_sender(&self) -> Option<EventSender> {
        self.lock().events.clone()
    }

    /// All requests handed to the transport so far
    pub fn sent_requests(&self) -> Vec<Request> {
        self.lock().sent.clone()
    }

    pub fn update_calls(&self) -> usize {
        self.lock().update_calls
    }

    pub fn shutdown_calls(&self) -> usize {
        self.lock().shutdown_calls
    }

    pub fn is_started(&self) -> bool {
        self.lock().events.is_some()
    }
}

impl Transport for MockTransport {
    fn startup(&mut self, events: EventSender) -> Result<()> {
        let mut inner = self.lock();
        if inner.events.is_some() {
            return Err(TransportError::AlreadyStarted);
        }
        if inner.open_on_startup {
            inner.connected = true;
            let _ = events.try_send(TransportEvent::ConnectionOpened);
        }
        inner.events = Some(events);
        Ok(())
    }

    fn send_request(&mut self, request: Request) -> Result<()> {
        let mut inner = self.lock();
        if inner.events.is_none() {
            return Err(TransportError::NotStarted);
        }
        inner.sent.push(request);
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        self.lock().update_calls += 1;
        Ok(())
    }

    fn shutdown(&mut self) {
        let mut inner = self.lock();
        inner.shutdown_calls += 1;
        if let Some(events) = inner.events.take() {
            if inner.connected {
                let _ = events.try_send(TransportEvent::ConnectionClosed);
            }
        }
        inner.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}
