//! Public façade over the client pipeline

use std::ops::BitOr;
use std::sync::Arc;

use psmove_protocol::{
    ControllerId, Notification, Request, RequestId, RequestKind, Response, INVALID_REQUEST_ID,
};
use psmove_transport::{TcpTransport, Transport};

use crate::bridge::{ConnectionState, EventBridge};
use crate::config::ClientConfig;
use crate::error::{PayloadError, Result};
use crate::logging::{init_logging, LogSeverity};
use crate::message::{Message, PayloadHandle};
use crate::registry::ControllerViewRegistry;
use crate::view::ControllerViewHandle;

/// Options for [`ClientApi::start_controller_data_stream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamFlags(u32);

impl StreamFlags {
    pub const NONE: StreamFlags = StreamFlags(0);
    /// Ask the service to include accelerometer, gyroscope and magnetometer samples
    pub const INCLUDE_RAW_SENSOR_DATA: StreamFlags = StreamFlags(1 << 0);

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Unknown bits are discarded
    pub fn from_bits(bits: u32) -> Self {
        StreamFlags(bits & Self::INCLUDE_RAW_SENSOR_DATA.0)
    }

    pub fn contains(self, other: StreamFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for StreamFlags {
    type Output = StreamFlags;

    fn bitor(self, rhs: StreamFlags) -> StreamFlags {
        StreamFlags(self.0 | rhs.0)
    }
}

/// Map a rumble amount in `[0, 1]` onto the wire range
fn rumble_intensity(amount: f32) -> u8 {
    (amount.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Everything that exists only while the client is running
struct Pipeline {
    config: ClientConfig,
    registry: Arc<ControllerViewRegistry>,
    bridge: EventBridge,
    transport: Box<dyn Transport>,
}

/// Handle to one client instance
///
/// Created stopped; [`startup`](Self::startup) builds the pipeline and
/// [`shutdown`](Self::shutdown) (or drop) tears it down. All calls are meant
/// for a single consumer thread; views handed out may be read from anywhere.
///
/// Command functions never wait for the service. They return the id the
/// eventual [`Message::Response`] will carry, or [`INVALID_REQUEST_ID`] when
/// the client is not running or the request could not be handed off.
#[derive(Default)]
pub struct ClientApi {
    pipeline: Option<Pipeline>,
}

impl ClientApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to the service at `host:port`
    ///
    /// Returns `true` when the client is running afterwards, including when it
    /// already was. Connection failures surface later as a
    /// `FailedToConnectToService` event, not here.
    pub fn startup(&mut self, host: &str, port: u16, log_level: LogSeverity) -> bool {
        let config = ClientConfig::new(host, port).with_log_level(log_level);
        match self.startup_with_config(config) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to start client: {}", e);
                false
            }
        }
    }

    /// Start over TCP using a full configuration
    pub fn startup_with_config(&mut self, config: ClientConfig) -> Result<()> {
        if self.has_started() {
            tracing::debug!("Client already started");
            return Ok(());
        }
        let transport = TcpTransport::new(config.transport_config());
        self.startup_with_transport(config, Box::new(transport))
    }

    /// Start over a caller-supplied transport
    ///
    /// A no-op when already running; the given transport is dropped unused.
    pub fn startup_with_transport(
        &mut self,
        config: ClientConfig,
        mut transport: Box<dyn Transport>,
    ) -> Result<()> {
        if self.has_started() {
            tracing::debug!("Client already started");
            return Ok(());
        }

        config.validate()?;
        init_logging(config.log_level)?;

        let registry = Arc::new(ControllerViewRegistry::new());
        let mut bridge = EventBridge::new(
            Arc::clone(&registry),
            config.update_timeout,
            config.arrival_capacity,
        );
        bridge.mark_connecting();
        transport.startup(bridge.arrival_sender())?;

        tracing::info!("Client started for {}:{}", config.host, config.port);
        self.pipeline = Some(Pipeline {
            config,
            registry,
            bridge,
            transport,
        });
        Ok(())
    }

    pub fn has_started(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Configuration of the running client
    pub fn config(&self) -> Option<&ClientConfig> {
        self.pipeline.as_ref().map(|p| &p.config)
    }

    /// Close the connection and release the pipeline
    ///
    /// Unread messages and in-flight requests are discarded. Safe to call when
    /// not running. Views still held by the application stay readable but no
    /// longer receive updates.
    pub fn shutdown(&mut self) {
        let Some(mut pipeline) = self.pipeline.take() else {
            return;
        };

        pipeline.transport.shutdown();
        pipeline.bridge.reset();

        let live_views = pipeline.registry.len();
        if live_views > 0 {
            tracing::debug!("Shutting down with {} controller views still allocated", live_views);
        }
        tracing::info!("Client shut down");
    }

    /// Run one update cycle; see [`EventBridge::update`]
    pub fn update(&mut self) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.bridge.update(pipeline.transport.as_mut());
        }
    }

    /// Next message of the current cycle, in arrival order
    pub fn poll_next_message(&mut self) -> Option<Message> {
        self.pipeline.as_mut()?.bridge.poll_next_message()
    }

    pub fn response_payload(&self, handle: PayloadHandle) -> std::result::Result<&Response, PayloadError> {
        match &self.pipeline {
            Some(pipeline) => pipeline.bridge.response_payload(handle),
            None => Err(PayloadError::NotRunning),
        }
    }

    pub fn event_payload(
        &self,
        handle: PayloadHandle,
    ) -> std::result::Result<&Notification, PayloadError> {
        match &self.pipeline {
            Some(pipeline) => pipeline.bridge.event_payload(handle),
            None => Err(PayloadError::NotRunning),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.pipeline
            .as_ref()
            .map_or(ConnectionState::Disconnected, |p| p.bridge.connection_state())
    }

    /// Get a shared view of `controller_id`, or `None` when not running
    ///
    /// Every successful call must be matched by one
    /// [`free_controller_view`](Self::free_controller_view).
    pub fn allocate_controller_view(
        &mut self,
        controller_id: ControllerId,
    ) -> Option<ControllerViewHandle> {
        let pipeline = self.pipeline.as_ref()?;
        Some(pipeline.registry.allocate(controller_id))
    }

    /// Release one listener on the view
    ///
    /// # Panics
    ///
    /// Panics if the handle was already freed as many times as it was
    /// allocated.
    pub fn free_controller_view(&mut self, view: ControllerViewHandle) {
        match &self.pipeline {
            Some(pipeline) => pipeline.registry.free(view),
            None => tracing::debug!(
                "Ignoring free of controller view {}: client is not running",
                view.controller_id()
            ),
        }
    }

    /// Number of outstanding allocations for `controller_id`
    pub fn listener_count(&self, controller_id: ControllerId) -> usize {
        self.pipeline
            .as_ref()
            .map_or(0, |p| p.registry.listener_count(controller_id))
    }

    pub fn start_controller_data_stream(
        &mut self,
        view: &ControllerViewHandle,
        flags: StreamFlags,
    ) -> RequestId {
        self.send_view_request(
            view,
            RequestKind::StartControllerDataStream {
                controller_id: view.controller_id(),
                include_raw_sensor_data: flags.contains(StreamFlags::INCLUDE_RAW_SENSOR_DATA),
            },
        )
    }

    pub fn stop_controller_data_stream(&mut self, view: &ControllerViewHandle) -> RequestId {
        self.send_view_request(
            view,
            RequestKind::StopControllerDataStream {
                controller_id: view.controller_id(),
            },
        )
    }

    /// Set rumble strength; `amount` is clamped to `[0, 1]`
    pub fn set_controller_rumble(&mut self, view: &ControllerViewHandle, amount: f32) -> RequestId {
        self.send_view_request(
            view,
            RequestKind::SetRumble {
                controller_id: view.controller_id(),
                rumble: rumble_intensity(amount),
            },
        )
    }

    pub fn set_led_color(&mut self, view: &ControllerViewHandle, r: u8, g: u8, b: u8) -> RequestId {
        self.send_view_request(
            view,
            RequestKind::SetLedColor {
                controller_id: view.controller_id(),
                r,
                g,
                b,
            },
        )
    }

    pub fn reset_pose(&mut self, view: &ControllerViewHandle) -> RequestId {
        self.send_view_request(
            view,
            RequestKind::ResetPose {
                controller_id: view.controller_id(),
            },
        )
    }

    /// Ask the service which controllers it knows about
    ///
    /// The response body is a `ResponseBody::ControllerList`.
    pub fn get_controller_list(&mut self) -> RequestId {
        self.send_request(Request::new(RequestKind::GetControllerList))
    }

    /// Submit a prebuilt request
    ///
    /// Any id already on the request is replaced.
    pub fn send_opaque_request(&mut self, request: Request) -> RequestId {
        self.send_request(request)
    }

    /// Submit a command about `view`, refusing views this client no longer tracks
    fn send_view_request(&mut self, view: &ControllerViewHandle, kind: RequestKind) -> RequestId {
        let registered = self
            .pipeline
            .as_ref()
            .map_or(true, |p| p.registry.is_registered(view));
        if !registered {
            tracing::warn!(
                "Refusing {:?}: controller view {} is not allocated",
                kind,
                view.controller_id()
            );
            return INVALID_REQUEST_ID;
        }
        self.send_request(Request::new(kind))
    }

    fn send_request(&mut self, request: Request) -> RequestId {
        let Some(pipeline) = self.pipeline.as_mut() else {
            tracing::warn!("Dropping {:?}: client is not running", request.kind);
            return INVALID_REQUEST_ID;
        };

        match pipeline
            .bridge
            .send_request(request, pipeline.transport.as_mut())
        {
            Ok(request_id) => request_id,
            Err(e) => {
                tracing::warn!("Failed to send request: {}", e);
                INVALID_REQUEST_ID
            }
        }
    }
}

impl Drop for ClientApi {
    fn drop(&mut self) {
        self.shutdown();
    }
}
