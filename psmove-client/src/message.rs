//! Values handed to the host by `poll_next_message`

use psmove_protocol::{NotificationType, RequestId, ResultCode};

/// Client-facing event vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEvent {
    /// A service notification the client has no specific kind for
    OpaqueServiceEvent,
    ControllerListUpdated,
    TrackerListUpdated,
    HmdListUpdated,
    ConnectedToService,
    FailedToConnectToService,
    DisconnectedFromService,
}

impl From<&NotificationType> for ClientEvent {
    fn from(notification_type: &NotificationType) -> Self {
        match notification_type {
            NotificationType::ControllerListUpdated => ClientEvent::ControllerListUpdated,
            NotificationType::TrackerListUpdated => ClientEvent::TrackerListUpdated,
            NotificationType::HmdListUpdated => ClientEvent::HmdListUpdated,
            NotificationType::Other(_) => ClientEvent::OpaqueServiceEvent,
        }
    }
}

/// Which retained collection a payload handle points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Response,
    Event,
}

/// Reference to a protocol value retained for the current update cycle
///
/// Resolve it with [`ClientApi::response_payload`](crate::ClientApi::response_payload)
/// or [`ClientApi::event_payload`](crate::ClientApi::event_payload). Once the
/// next `update()` runs the handle reports
/// [`PayloadError::Expired`](crate::PayloadError::Expired).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadHandle {
    kind: PayloadKind,
    generation: u64,
    slot: u32,
}

impl PayloadHandle {
    pub(crate) fn new(kind: PayloadKind, generation: u64, slot: u32) -> Self {
        Self {
            kind,
            generation,
            slot,
        }
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    /// Update cycle the handle was issued in
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }
}

/// One entry of the per-cycle message queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// A response to a request this client issued
    Response {
        request_id: RequestId,
        result_code: ResultCode,
        payload: PayloadHandle,
    },
    /// A notification or connection change
    ///
    /// Connection events carry no payload.
    Event {
        event: ClientEvent,
        payload: Option<PayloadHandle>,
    },
}

impl Message {
    pub fn payload(&self) -> Option<PayloadHandle> {
        match self {
            Message::Response { payload, .. } => Some(*payload),
            Message::Event { payload, .. } => *payload,
        }
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Message::Response { request_id, .. } => Some(*request_id),
            Message::Event { .. } => None,
        }
    }

    pub fn event(&self) -> Option<ClientEvent> {
        match self {
            Message::Event { event, .. } => Some(*event),
            Message::Response { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(NotificationType::ControllerListUpdated, ClientEvent::ControllerListUpdated)]
    #[case(NotificationType::TrackerListUpdated, ClientEvent::TrackerListUpdated)]
    #[case(NotificationType::HmdListUpdated, ClientEvent::HmdListUpdated)]
    #[case(NotificationType::Other("tracker_pose_changed".to_string()), ClientEvent::OpaqueServiceEvent)]
    fn test_notification_classification(
        #[case] notification_type: NotificationType,
        #[case] expected: ClientEvent,
    ) {
        assert_eq!(ClientEvent::from(&notification_type), expected);
    }

    #[test]
    fn test_message_accessors() {
        let handle = PayloadHandle::new(PayloadKind::Response, 1, 0);
        let response = Message::Response {
            request_id: 4,
            result_code: ResultCode::Ok,
            payload: handle,
        };
        assert_eq!(response.request_id(), Some(4));
        assert_eq!(response.payload(), Some(handle));
        assert_eq!(response.event(), None);

        let event = Message::Event {
            event: ClientEvent::ConnectedToService,
            payload: None,
        };
        assert_eq!(event.event(), Some(ClientEvent::ConnectedToService));
        assert_eq!(event.payload(), None);
        assert_eq!(event.request_id(), None);
    }
}
