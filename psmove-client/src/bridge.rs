//! Event bridge: the consumer-side core of the client pipeline
//!
//! Transports hand every arrival across an mpsc channel. The bridge drains that
//! channel once per [`EventBridge::update`] call, routing data frames straight
//! to the view registry and turning everything else into queued [`Message`]s
//! whose payloads stay resolvable until the next update.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use psmove_protocol::{Notification, Request, RequestId, Response, ServiceMessage};
use psmove_transport::{
    event_channel_with_capacity, EventReceiver, EventSender, Transport, TransportError,
    TransportEvent,
};

use crate::correlator::RequestCorrelator;
use crate::error::PayloadError;
use crate::message::{ClientEvent, Message, PayloadHandle};
use crate::payload::PayloadCache;
use crate::registry::ControllerViewRegistry;

/// Connection status as last reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(name)
    }
}

pub struct EventBridge {
    registry: Arc<ControllerViewRegistry>,
    correlator: RequestCorrelator,
    messages: VecDeque<Message>,
    payloads: PayloadCache,
    arrivals: EventReceiver,
    arrival_sender: EventSender,
    connection_state: ConnectionState,
    update_timeout: Duration,
    max_arrivals_per_update: usize,
}

impl EventBridge {
    /// Create a bridge feeding `registry`
    ///
    /// `update_timeout` bounds how long [`update`](Self::update) waits for the
    /// first arrival of a cycle; zero never blocks. `arrival_capacity` bounds
    /// both the channel from the transport and the arrivals handled per update.
    pub fn new(
        registry: Arc<ControllerViewRegistry>,
        update_timeout: Duration,
        arrival_capacity: usize,
    ) -> Self {
        let max_arrivals_per_update = arrival_capacity.max(1);
        let (arrival_sender, arrivals) = event_channel_with_capacity(max_arrivals_per_update);
        Self {
            registry,
            correlator: RequestCorrelator::new(),
            messages: VecDeque::new(),
            payloads: PayloadCache::new(),
            arrivals,
            arrival_sender,
            connection_state: ConnectionState::Disconnected,
            update_timeout,
            max_arrivals_per_update,
        }
    }

    /// Sender a transport uses to deliver arrivals to this bridge
    pub fn arrival_sender(&self) -> EventSender {
        self.arrival_sender.clone()
    }

    pub fn mark_connecting(&mut self) {
        self.set_state(ConnectionState::Connecting);
    }

    /// Run one update cycle
    ///
    /// Anything not polled since the previous cycle is discarded, and every
    /// payload handle issued so far expires. At most `arrival_capacity`
    /// arrivals are handled; the rest stay queued for the next cycle.
    pub fn update(&mut self, transport: &mut dyn Transport) {
        let discarded = self.messages.len();
        if discarded > 0 {
            tracing::debug!("Discarding {} unread messages from the previous cycle", discarded);
        }
        self.messages.clear();
        self.payloads.clear();

        if let Err(e) = transport.update() {
            tracing::warn!("Transport update failed: {}", e);
        }

        let mut processed = 0usize;
        if !self.update_timeout.is_zero() {
            if let Ok(event) = self.arrivals.recv_timeout(self.update_timeout) {
                self.handle_arrival(event);
                processed += 1;
            }
        }
        while processed < self.max_arrivals_per_update {
            let Ok(event) = self.arrivals.try_recv() else {
                break;
            };
            self.handle_arrival(event);
            processed += 1;
        }
        if processed == self.max_arrivals_per_update {
            tracing::debug!(
                "Arrival limit of {} reached, deferring the rest to the next update",
                self.max_arrivals_per_update
            );
        }

        if processed > 0 {
            tracing::trace!(
                "Update cycle {} processed {} arrivals, {} messages queued",
                self.payloads.generation(),
                processed,
                self.messages.len()
            );
        }
    }

    /// Route a single transport arrival
    pub fn handle_arrival(&mut self, event: TransportEvent) {
        tracing::trace!("Arrival: {}", event.name());
        match event {
            TransportEvent::Message(ServiceMessage::DataFrame(frame)) => {
                tracing::trace!(
                    "Data frame for controller {} (seq {})",
                    frame.controller_id,
                    frame.sequence_num
                );
                self.registry.apply_data_frame(&frame);
            }
            TransportEvent::Message(ServiceMessage::Notification(notification)) => {
                self.enqueue_notification(notification);
            }
            TransportEvent::Message(ServiceMessage::Response(response)) => {
                if let Some(response) = self.correlator.resolve(response) {
                    self.enqueue_response(response);
                }
            }
            TransportEvent::ConnectionOpened => {
                tracing::info!("Connected to service");
                self.set_state(ConnectionState::Connected);
                self.enqueue_connection_event(ClientEvent::ConnectedToService);
            }
            TransportEvent::ConnectionOpenFailed { reason } => {
                tracing::error!("Failed to connect to service: {}", reason);
                self.set_state(ConnectionState::Error);
                self.correlator.abandon_all();
                self.enqueue_connection_event(ClientEvent::FailedToConnectToService);
            }
            TransportEvent::ConnectionClosed => {
                tracing::info!("Disconnected from service");
                self.set_state(ConnectionState::Disconnected);
                self.correlator.abandon_all();
                self.enqueue_connection_event(ClientEvent::DisconnectedFromService);
            }
            // Diagnostic only, never surfaced as a message
            TransportEvent::ConnectionCloseFailed { reason } => {
                tracing::error!("Failed to close service connection: {}", reason);
                self.set_state(ConnectionState::Error);
            }
            TransportEvent::SocketError { reason } => {
                tracing::error!("Socket error: {}", reason);
                self.set_state(ConnectionState::Error);
            }
        }
    }

    fn enqueue_notification(&mut self, notification: Notification) {
        let event = ClientEvent::from(&notification.notification_type);
        tracing::debug!(
            "Notification {} classified as {:?}",
            notification.notification_type,
            event
        );
        let payload = self.payloads.retain_event(notification);
        self.messages.push_back(Message::Event {
            event,
            payload: Some(payload),
        });
    }

    fn enqueue_response(&mut self, response: Response) {
        let request_id = response.request_id;
        let result_code = response.result_code;
        let payload = self.payloads.retain_response(response);
        self.messages.push_back(Message::Response {
            request_id,
            result_code,
            payload,
        });
    }

    fn enqueue_connection_event(&mut self, event: ClientEvent) {
        self.messages.push_back(Message::Event {
            event,
            payload: None,
        });
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.connection_state != state {
            tracing::debug!("Connection state: {} -> {}", self.connection_state, state);
            self.connection_state = state;
        }
    }

    /// Submit a request through the correlator
    pub fn send_request(
        &mut self,
        request: Request,
        transport: &mut dyn Transport,
    ) -> Result<RequestId, TransportError> {
        self.correlator.send(request, transport)
    }

    /// Pop the oldest queued message, never blocking
    pub fn poll_next_message(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    pub fn response_payload(&self, handle: PayloadHandle) -> Result<&Response, PayloadError> {
        self.payloads.response(handle)
    }

    pub fn event_payload(&self, handle: PayloadHandle) -> Result<&Notification, PayloadError> {
        self.payloads.event(handle)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn pending_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Drop queued messages, retained payloads and in-flight requests
    ///
    /// Arrivals still sitting in the channel are discarded as well.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.payloads.clear();
        self.correlator.abandon_all();
        while self.arrivals.try_recv().is_ok() {}
        self.set_state(ConnectionState::Disconnected);
    }
}
