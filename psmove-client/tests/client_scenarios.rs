//! End-to-end behaviour of `ClientApi` driven through an in-memory transport

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::TrySendError;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use psmove_client::prelude::*;
use psmove_client::{
    ConnectionState, MockTransport, Notification, NotificationType, PayloadError, Request,
    RequestKind, Response, ResponseBody, TransportEvent,
};
use psmove_protocol::{ControllerDataFrame, ControllerInfo, ControllerType, ServiceMessage};

fn started(mock: &MockTransport) -> ClientApi {
    let mut client = ClientApi::new();
    client
        .startup_with_transport(
            ClientConfig::default().with_log_level(LogSeverity::Warning),
            Box::new(mock.clone()),
        )
        .expect("mock transport starts");
    client
}

fn drain(client: &mut ClientApi) -> Vec<Message> {
    std::iter::from_fn(|| client.poll_next_message()).collect()
}

fn response(request_id: RequestId, result_code: ResultCode) -> ServiceMessage {
    ServiceMessage::Response(Response::new(request_id, result_code))
}

#[test]
fn stream_start_response_is_polled_after_update() {
    let mock = MockTransport::connected_on_startup();
    let mut client = started(&mock);

    let view = client.allocate_controller_view(7).unwrap();
    let request_id = client.start_controller_data_stream(&view, StreamFlags::NONE);
    assert_eq!(request_id, 1);

    // Nothing is visible until the next update
    assert_eq!(client.poll_next_message(), None);

    mock.inject_message(response(request_id, ResultCode::Ok));
    client.update();

    let messages = drain(&mut client);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].event(), Some(ClientEvent::ConnectedToService));
    match messages[1] {
        Message::Response {
            request_id: id,
            result_code,
            payload,
        } => {
            assert_eq!(id, 1);
            assert_eq!(result_code, ResultCode::Ok);
            assert_eq!(client.response_payload(payload).unwrap().request_id, 1);
        }
        other => panic!("expected a response, got {:?}", other),
    }

    let sent = mock.sent_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].kind,
        RequestKind::StartControllerDataStream {
            controller_id: 7,
            include_raw_sensor_data: false,
        }
    );
}

#[test]
fn views_are_shared_and_destroyed_with_last_listener() {
    let mock = MockTransport::new();
    let mut client = started(&mock);

    let first = client.allocate_controller_view(5).unwrap();
    let second = client.allocate_controller_view(5).unwrap();
    assert_eq!(client.listener_count(5), 2);

    client.free_controller_view(first);
    assert_eq!(client.listener_count(5), 1);

    client.free_controller_view(second);
    assert_eq!(client.listener_count(5), 0);

    // Frames for the destroyed view are dropped quietly
    mock.inject_message(ServiceMessage::DataFrame(ControllerDataFrame {
        controller_id: 5,
        sequence_num: 11,
        ..Default::default()
    }));
    client.update();
    assert_eq!(client.poll_next_message(), None);

    // A fresh allocation starts from a new view
    let third = client.allocate_controller_view(5).unwrap();
    assert_eq!(third.read().listener_count(), 1);
    assert!(!third.read().is_valid());
}

#[test]
fn failed_connection_yields_single_event() {
    let mock = MockTransport::new();
    let mut client = started(&mock);
    assert_eq!(client.connection_state(), ConnectionState::Connecting);

    mock.inject(TransportEvent::ConnectionOpenFailed {
        reason: "connection refused".to_string(),
    });
    client.update();

    let messages = drain(&mut client);
    assert_eq!(
        messages,
        vec![Message::Event {
            event: ClientEvent::FailedToConnectToService,
            payload: None,
        }]
    );
    assert_eq!(client.connection_state(), ConnectionState::Error);
}

#[test]
fn payloads_expire_after_update() {
    let mock = MockTransport::new();
    let mut client = started(&mock);
    let request_id = client.get_controller_list();

    let body = ResponseBody::ControllerList(vec![ControllerInfo {
        controller_id: 0,
        controller_type: ControllerType::PsMove,
        device_path: "/dev/hidraw0".to_string(),
    }]);
    mock.inject_message(ServiceMessage::Response(
        Response::new(request_id, ResultCode::Ok).with_body(body.clone()),
    ));
    client.update();

    let payload = client.poll_next_message().and_then(|m| m.payload()).unwrap();
    assert_eq!(client.response_payload(payload).unwrap().body, body);

    client.update();
    assert!(matches!(
        client.response_payload(payload),
        Err(PayloadError::Expired { .. })
    ));

    client.shutdown();
    assert_eq!(client.response_payload(payload), Err(PayloadError::NotRunning));
}

#[test]
fn unread_messages_do_not_carry_over() {
    let mock = MockTransport::new();
    let mut client = started(&mock);

    mock.inject_message(ServiceMessage::Notification(Notification::new(
        NotificationType::TrackerListUpdated,
    )));
    mock.inject_message(ServiceMessage::Notification(Notification::new(
        NotificationType::HmdListUpdated,
    )));
    client.update();
    assert_eq!(
        client.poll_next_message().and_then(|m| m.event()),
        Some(ClientEvent::TrackerListUpdated)
    );

    client.update();
    assert_eq!(client.poll_next_message(), None);
}

#[test]
fn data_frames_update_views_without_messages() {
    let mock = MockTransport::new();
    let mut client = started(&mock);
    let view = client.allocate_controller_view(1).unwrap();

    for sequence_num in [3, 9, 4] {
        mock.inject_message(ServiceMessage::DataFrame(ControllerDataFrame {
            controller_id: 1,
            sequence_num,
            is_connected: true,
            ..Default::default()
        }));
    }
    // Nobody listens to controller 2
    mock.inject_message(ServiceMessage::DataFrame(ControllerDataFrame {
        controller_id: 2,
        ..Default::default()
    }));
    client.update();

    assert_eq!(client.poll_next_message(), None);
    let state = view.snapshot();
    assert!(state.is_connected());
    // Last write wins, even when it is older
    assert_eq!(state.sequence_num(), 4);
    assert_eq!(state.frames_applied(), 3);
    assert_eq!(client.listener_count(2), 0);
}

#[test]
#[should_panic(expected = "not registered")]
fn double_free_panics() {
    let mock = MockTransport::new();
    let mut client = started(&mock);

    let view = client.allocate_controller_view(0).unwrap();
    let copy = view.clone();
    client.free_controller_view(view);
    client.free_controller_view(copy);
}

#[test]
fn commands_outside_running_client_are_invalid() {
    let mut client = ClientApi::new();
    assert!(client.allocate_controller_view(0).is_none());
    assert_eq!(
        client.send_opaque_request(Request::new(RequestKind::GetControllerList)),
        INVALID_REQUEST_ID
    );

    let mock = MockTransport::new();
    let mut client = started(&mock);
    let view = client.allocate_controller_view(0).unwrap();
    client.shutdown();

    assert_eq!(client.set_controller_rumble(&view, 0.5), INVALID_REQUEST_ID);
    assert_eq!(client.set_led_color(&view, 255, 0, 0), INVALID_REQUEST_ID);
    assert_eq!(client.reset_pose(&view), INVALID_REQUEST_ID);
    assert_eq!(client.stop_controller_data_stream(&view), INVALID_REQUEST_ID);
    assert!(mock.sent_requests().is_empty());

    // Freeing after shutdown is harmless
    client.free_controller_view(view);
}

#[test]
fn unknown_and_duplicate_responses_are_dropped() {
    let mock = MockTransport::new();
    let mut client = started(&mock);
    let view = client.allocate_controller_view(0).unwrap();
    let request_id = client.reset_pose(&view);

    mock.inject_message(response(request_id, ResultCode::Ok));
    mock.inject_message(response(request_id, ResultCode::Ok));
    mock.inject_message(response(request_id + 100, ResultCode::Error));
    client.update();

    let ids: Vec<_> = drain(&mut client)
        .iter()
        .filter_map(Message::request_id)
        .collect();
    assert_eq!(ids, vec![request_id]);
}

#[test]
fn commands_carry_view_controller_id() {
    let mock = MockTransport::new();
    let mut client = started(&mock);
    let view = client.allocate_controller_view(3).unwrap();

    let ids = [
        client.start_controller_data_stream(&view, StreamFlags::INCLUDE_RAW_SENSOR_DATA),
        client.set_controller_rumble(&view, 2.0),
        client.set_led_color(&view, 1, 2, 3),
        client.reset_pose(&view),
        client.stop_controller_data_stream(&view),
    ];
    assert_eq!(ids, [1, 2, 3, 4, 5]);

    let kinds: Vec<_> = mock.sent_requests().into_iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RequestKind::StartControllerDataStream {
                controller_id: 3,
                include_raw_sensor_data: true,
            },
            RequestKind::SetRumble {
                controller_id: 3,
                rumble: 255,
            },
            RequestKind::SetLedColor {
                controller_id: 3,
                r: 1,
                g: 2,
                b: 3,
            },
            RequestKind::ResetPose { controller_id: 3 },
            RequestKind::StopControllerDataStream { controller_id: 3 },
        ]
    );
}

#[test]
fn arrivals_from_another_thread_are_delivered() {
    let mock = MockTransport::new();
    let mut client = started(&mock);
    let sender = mock.event_sender().unwrap();

    std::thread::spawn(move || {
        sender.send(TransportEvent::ConnectionOpened).unwrap();
        sender
            .send(TransportEvent::SocketError {
                reason: "reset by peer".to_string(),
            })
            .unwrap();
        sender.send(TransportEvent::ConnectionClosed).unwrap();
    })
    .join()
    .unwrap();

    client.update();
    let events: Vec<_> = drain(&mut client).iter().filter_map(Message::event).collect();
    assert_eq!(
        events,
        vec![
            ClientEvent::ConnectedToService,
            ClientEvent::DisconnectedFromService
        ]
    );
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[test]
fn shutdown_abandons_in_flight_requests() {
    let mock = MockTransport::connected_on_startup();
    let mut client = started(&mock);
    client.update();
    let request_id = client.get_controller_list();

    client.shutdown();
    assert_eq!(mock.shutdown_calls(), 1);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.poll_next_message(), None);
    assert!(request_id > 0);
}

#[test]
fn payload_handles_do_not_survive_restart() {
    let first = MockTransport::new();
    let mut client = started(&first);
    first.inject_message(ServiceMessage::Notification(Notification::new(
        NotificationType::TrackerListUpdated,
    )));
    client.update();
    let old = client.poll_next_message().and_then(|m| m.payload()).unwrap();
    client.shutdown();

    let second = MockTransport::new();
    client
        .startup_with_transport(ClientConfig::default(), Box::new(second.clone()))
        .unwrap();
    second.inject_message(ServiceMessage::Notification(Notification::new(
        NotificationType::HmdListUpdated,
    )));
    client.update();
    let fresh = client.poll_next_message().and_then(|m| m.payload()).unwrap();

    assert!(matches!(
        client.event_payload(old),
        Err(PayloadError::Expired { .. })
    ));
    assert_eq!(
        client.event_payload(fresh).unwrap().notification_type,
        NotificationType::HmdListUpdated
    );
}

#[test]
fn update_is_bounded_while_producer_keeps_sending() {
    const CAPACITY: usize = 8;

    let mock = MockTransport::new();
    let mut client = ClientApi::new();
    client
        .startup_with_transport(
            ClientConfig::default()
                .with_log_level(LogSeverity::Warning)
                .with_arrival_capacity(CAPACITY),
            Box::new(mock.clone()),
        )
        .unwrap();

    let sender = mock.event_sender().unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let producer = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut sent = 0usize;
            while !stop.load(Ordering::SeqCst) {
                let event = TransportEvent::Message(ServiceMessage::Notification(
                    Notification::new(NotificationType::ControllerListUpdated),
                ));
                match sender.try_send(event) {
                    Ok(()) => sent += 1,
                    Err(TrySendError::Full(_)) => thread::yield_now(),
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            sent
        })
    };

    let mut received = 0;
    for _ in 0..50 {
        client.update();
        let handled = drain(&mut client).len();
        assert!(handled <= CAPACITY, "update handled {} arrivals", handled);
        received += handled;
    }
    stop.store(true, Ordering::SeqCst);
    let sent = producer.join().unwrap();

    // Everything sent but not yet handled fits in the channel
    assert!(sent - received <= CAPACITY);
}

#[test]
fn snapshots_are_detached_from_later_updates() {
    let mock = MockTransport::new();
    let mut client = started(&mock);
    let view = client.allocate_controller_view(2).unwrap();

    let before = view.snapshot();
    mock.inject_message(ServiceMessage::DataFrame(ControllerDataFrame {
        controller_id: 2,
        sequence_num: 42,
        ..Default::default()
    }));
    client.update();

    assert_eq!(before.sequence_num(), 0);
    assert_eq!(view.snapshot().sequence_num(), 42);
}

fn notification_types() -> impl Strategy<Value = NotificationType> {
    prop_oneof![
        Just(NotificationType::ControllerListUpdated),
        Just(NotificationType::TrackerListUpdated),
        Just(NotificationType::HmdListUpdated),
        "[a-z_]{1,12}".prop_map(NotificationType::from),
    ]
}

/// One inbound arrival, as seen on the wire
#[derive(Debug, Clone)]
enum Arrival {
    Response,
    Notification(NotificationType),
    Connected,
}

/// What the host observes for an arrival
#[derive(Debug, Clone, PartialEq)]
enum Delivered {
    Response(RequestId),
    Notification(NotificationType),
    Connected,
}

fn arrival_strategy() -> impl Strategy<Value = Arrival> {
    prop_oneof![
        Just(Arrival::Response),
        notification_types().prop_map(Arrival::Notification),
        Just(Arrival::Connected),
    ]
}

proptest! {
    #[test]
    fn messages_are_delivered_in_arrival_order(arrivals in prop::collection::vec(arrival_strategy(), 0..30)) {
        let mock = MockTransport::new();
        let mut client = started(&mock);

        let mut expected = Vec::new();
        for arrival in &arrivals {
            match arrival {
                Arrival::Response => {
                    let request_id = client.get_controller_list();
                    mock.inject_message(response(request_id, ResultCode::Ok));
                    expected.push(Delivered::Response(request_id));
                }
                Arrival::Notification(notification_type) => {
                    mock.inject_message(ServiceMessage::Notification(Notification::new(
                        notification_type.clone(),
                    )));
                    expected.push(Delivered::Notification(notification_type.clone()));
                }
                Arrival::Connected => {
                    mock.inject(TransportEvent::ConnectionOpened);
                    expected.push(Delivered::Connected);
                }
            }
        }
        client.update();

        let mut delivered = Vec::new();
        while let Some(message) = client.poll_next_message() {
            let observed = match message {
                Message::Response { request_id, .. } => Delivered::Response(request_id),
                Message::Event { event: ClientEvent::ConnectedToService, .. } => Delivered::Connected,
                Message::Event { payload: Some(handle), .. } => Delivered::Notification(
                    client.event_payload(handle).unwrap().notification_type.clone(),
                ),
                other => panic!("unexpected message {:?}", other),
            };
            delivered.push(observed);
        }
        prop_assert_eq!(delivered, expected);
    }
}
