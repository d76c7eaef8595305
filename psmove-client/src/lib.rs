//! # PSMove Client
//!
//! A sync-first runtime for applications talking to the PSMove tracking
//! service: controller data streams in, actuation commands (rumble, LED color,
//! pose reset, stream start/stop) go out.
//!
//! ## Overview
//!
//! The host owns one [`ClientApi`] and drives it from a single thread:
//!
//! ```rust,no_run
//! use psmove_client::prelude::*;
//!
//! let mut client = ClientApi::new();
//! if !client.startup("localhost", 9512, LogSeverity::Info) {
//!     return;
//! }
//!
//! let view = client.allocate_controller_view(0).expect("client is running");
//! let request_id = client.start_controller_data_stream(&view, StreamFlags::NONE);
//!
//! loop {
//!     client.update();
//!     while let Some(message) = client.poll_next_message() {
//!         match message {
//!             Message::Response { request_id: id, result_code, .. } if id == request_id => {
//!                 println!("stream start finished with {:?}", result_code);
//!             }
//!             Message::Event { event, .. } => println!("event: {:?}", event),
//!             _ => {}
//!         }
//!     }
//!     println!("orientation: {:?}", view.snapshot().orientation());
//! #   break;
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! network worker thread                 consumer thread
//! ─────────────────────                 ───────────────────────────────────────
//! Transport ── TransportEvent ──mpsc──▶ EventBridge::update()
//!                                         ├─ DataFrame    ─▶ ControllerViewRegistry
//!                                         ├─ Response     ─▶ RequestCorrelator ─▶ queue
//!                                         ├─ Notification ─▶ classify ─────────▶ queue
//!                                         └─ connection   ─▶ ClientEvent ──────▶ queue
//!                                       ClientApi::poll_next_message() ◀── queue
//! ```
//!
//! 1. **Reference-counted views**: every `allocate_controller_view` call adds a
//!    listener; the view is destroyed when the last listener frees it.
//! 2. **Request correlation**: commands return a request id immediately; the
//!    matching response surfaces later as a [`Message::Response`].
//! 3. **One cycle of buffering**: `update()` discards anything unread from the
//!    previous cycle before pulling in new arrivals.
//! 4. **Cycle-scoped payloads**: a [`PayloadHandle`] resolves only until the
//!    next `update()`; after that it reports [`PayloadError::Expired`].

pub mod bridge;
pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod logging;
pub mod message;
pub mod payload;
pub mod registry;
pub mod view;

// Re-export main types for convenience
pub use bridge::{ConnectionState, EventBridge};
pub use client::{ClientApi, StreamFlags};
pub use config::ClientConfig;
pub use correlator::RequestCorrelator;
pub use error::{ClientError, PayloadError, Result};
pub use logging::{init_logging, LogSeverity, LoggingError};
pub use message::{ClientEvent, Message, PayloadHandle, PayloadKind};
pub use payload::PayloadCache;
pub use registry::ControllerViewRegistry;
pub use view::{Button, ButtonState, ControllerView, ControllerViewHandle};

// Re-export commonly used types from dependencies
pub use psmove_protocol::{
    ControllerId, Notification, NotificationType, Request, RequestId, RequestKind, Response,
    ResponseBody, ResultCode, INVALID_REQUEST_ID,
};
pub use psmove_transport::{MockTransport, TcpTransport, Transport, TransportEvent};

/// Prelude module for convenient imports
///
/// ```rust
/// use psmove_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ClientApi, ClientConfig, ClientError, ClientEvent, ControllerViewHandle, LogSeverity,
        Message, PayloadHandle, RequestId, ResultCode, StreamFlags, INVALID_REQUEST_ID,
    };
}
