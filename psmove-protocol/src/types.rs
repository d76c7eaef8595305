//! Protocol value types.
//!
//! These mirror the messages the tracking service speaks. Requests flow out,
//! everything else flows in as a [`ServiceMessage`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier assigned to an outgoing request by the client
pub type RequestId = i32;

/// Sentinel returned by command functions when no request could be issued
pub const INVALID_REQUEST_ID: RequestId = -1;

/// Identifier of a controller, stable for a service session
pub type ControllerId = i32;

// ============================================================================
// Outbound
// ============================================================================

/// A command sent to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, stamped by the client right before sending
    pub request_id: RequestId,
    /// What the service is asked to do
    pub kind: RequestKind,
}

impl Request {
    /// Build a request that has not yet been assigned an id
    pub fn new(kind: RequestKind) -> Self {
        Self {
            request_id: INVALID_REQUEST_ID,
            kind,
        }
    }

    /// Build an opaque request the client forwards without interpretation
    pub fn custom(name: impl Into<String>, body: Value) -> Self {
        Self::new(RequestKind::Custom {
            name: name.into(),
            body,
        })
    }

    /// The controller this request targets, if any
    pub fn controller_id(&self) -> Option<ControllerId> {
        match &self.kind {
            RequestKind::StartControllerDataStream { controller_id, .. }
            | RequestKind::StopControllerDataStream { controller_id }
            | RequestKind::SetRumble { controller_id, .. }
            | RequestKind::SetLedColor { controller_id, .. }
            | RequestKind::ResetPose { controller_id } => Some(*controller_id),
            RequestKind::GetControllerList | RequestKind::Custom { .. } => None,
        }
    }
}

/// Typed request payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestKind {
    /// Begin streaming data frames for a controller
    StartControllerDataStream {
        controller_id: ControllerId,
        include_raw_sensor_data: bool,
    },
    /// Stop streaming data frames for a controller
    StopControllerDataStream { controller_id: ControllerId },
    /// Set rumble strength, 0..=255
    SetRumble { controller_id: ControllerId, rumble: u8 },
    /// Set the sphere LED color
    SetLedColor {
        controller_id: ControllerId,
        r: u8,
        g: u8,
        b: u8,
    },
    /// Treat the controller's current orientation as the identity pose
    ResetPose { controller_id: ControllerId },
    /// Ask for the list of connected controllers
    GetControllerList,
    /// Anything the typed vocabulary does not cover
    Custom { name: String, body: Value },
}

// ============================================================================
// Inbound
// ============================================================================

/// Any value decoded from the service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceMessage {
    /// Reply to a request issued by this client
    Response(Response),
    /// Unsolicited service-side event
    Notification(Notification),
    /// Streamed controller state
    DataFrame(ControllerDataFrame),
}

/// Outcome reported by the service for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Ok,
    Error,
    Canceled,
}

/// Reply to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: RequestId,
    pub result_code: ResultCode,
    #[serde(default)]
    pub body: ResponseBody,
}

impl Response {
    /// A body-less reply, the common case for actuation commands
    pub fn new(request_id: RequestId, result_code: ResultCode) -> Self {
        Self {
            request_id,
            result_code,
            body: ResponseBody::Empty,
        }
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }
}

/// Request-specific reply data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ResponseBody {
    #[default]
    Empty,
    ControllerList(Vec<ControllerInfo>),
    Custom(Value),
}

/// Entry of a controller list reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub controller_id: ControllerId,
    pub controller_type: ControllerType,
    pub device_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerType {
    PsMove,
    PsNavi,
}

/// Unsolicited service-side event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_type: NotificationType,
    #[serde(default)]
    pub body: Value,
}

impl Notification {
    pub fn new(notification_type: NotificationType) -> Self {
        Self {
            notification_type,
            body: Value::Null,
        }
    }
}

/// Kind of a notification
///
/// Encoded as a bare string so kinds added on the service side still decode,
/// landing in [`NotificationType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationType {
    ControllerListUpdated,
    TrackerListUpdated,
    HmdListUpdated,
    Other(String),
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationType::ControllerListUpdated => "controller_list_updated",
            NotificationType::TrackerListUpdated => "tracker_list_updated",
            NotificationType::HmdListUpdated => "hmd_list_updated",
            NotificationType::Other(name) => name,
        }
    }
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "controller_list_updated" => NotificationType::ControllerListUpdated,
            "tracker_list_updated" => NotificationType::TrackerListUpdated,
            "hmd_list_updated" => NotificationType::HmdListUpdated,
            _ => NotificationType::Other(value),
        }
    }
}

impl From<NotificationType> for String {
    fn from(value: NotificationType) -> Self {
        match value {
            NotificationType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Data frames
// ============================================================================

/// Streamed state of one controller
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerDataFrame {
    pub controller_id: ControllerId,
    pub sequence_num: u32,
    pub is_connected: bool,
    pub is_tracking: bool,
    pub orientation: Quaternion,
    pub position: Vector3,
    /// One bit per button, see the client's button table
    pub button_state: u32,
    pub trigger_value: u8,
    #[serde(default)]
    pub raw_sensor_data: Option<RawSensorData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Unfiltered IMU readings, only sent when the stream was started with raw data
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSensorData {
    pub accelerometer: Vector3,
    pub gyroscope: Vector3,
    pub magnetometer: Vector3,
}
