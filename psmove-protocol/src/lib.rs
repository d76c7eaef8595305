//! # psmove-protocol
//!
//! Typed values exchanged with the PSMove tracking service, plus the
//! length-prefixed frame codec used on the wire.
//!
//! The client runtime treats everything in this crate as opaque tagged values:
//! it reads the type discriminator and a handful of fields (request id, result
//! code, controller id) and hands the rest through to the host untouched.
//!
//! ```text
//! outbound:  Request ──encode_frame──▶ [len:u32 BE][json]
//! inbound:   [len:u32 BE][json] ──FrameDecoder──▶ ServiceMessage
//!                                                  ├── Response
//!                                                  ├── Notification
//!                                                  └── DataFrame
//! ```

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{encode_frame, FrameDecoder, MAX_FRAME_LEN};
pub use error::{ProtocolError, Result};
pub use types::*;
