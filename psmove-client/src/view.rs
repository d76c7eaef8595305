//! Client-side mirror of one controller's latest streamed state

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{RwLock, RwLockReadGuard};
use psmove_protocol::{ControllerDataFrame, ControllerId, Quaternion, RawSensorData, Vector3};

/// Weight of the newest sample in the smoothed frame rate
const FRAME_RATE_SMOOTHING: f32 = 0.1;

/// Physical buttons, indexed by their bit in a data frame's button mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Triangle,
    Circle,
    Cross,
    Square,
    Select,
    Start,
    Ps,
    Move,
    Trigger,
}

impl Button {
    pub const ALL: [Button; 9] = [
        Button::Triangle,
        Button::Circle,
        Button::Cross,
        Button::Square,
        Button::Select,
        Button::Start,
        Button::Ps,
        Button::Move,
        Button::Trigger,
    ];

    fn mask(self) -> u32 {
        1 << (self as u32)
    }
}

/// Button state derived from the previous and current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    /// Not held in either frame
    Up,
    /// Went down in the latest frame
    Pressed,
    /// Held in both frames
    Down,
    /// Went up in the latest frame
    Released,
}

/// Latest known state of a controller
#[derive(Debug, Clone)]
pub struct ControllerView {
    controller_id: ControllerId,
    listener_count: usize,

    sequence_num: u32,
    is_connected: bool,
    is_tracking: bool,
    orientation: Quaternion,
    position: Vector3,
    previous_buttons: u32,
    buttons: u32,
    trigger_value: u8,
    raw_sensor_data: Option<RawSensorData>,

    frames_applied: u64,
    last_frame_received: Option<Instant>,
    frame_rate: f32,
}

impl ControllerView {
    pub(crate) fn new(controller_id: ControllerId) -> Self {
        Self {
            controller_id,
            listener_count: 0,
            sequence_num: 0,
            is_connected: false,
            is_tracking: false,
            orientation: Quaternion::IDENTITY,
            position: Vector3::default(),
            previous_buttons: 0,
            buttons: 0,
            trigger_value: 0,
            raw_sensor_data: None,
            frames_applied: 0,
            last_frame_received: None,
            frame_rate: 0.0,
        }
    }

    pub(crate) fn inc_listener_count(&mut self) -> usize {
        self.listener_count += 1;
        self.listener_count
    }

    pub(crate) fn dec_listener_count(&mut self) -> usize {
        self.listener_count = self.listener_count.saturating_sub(1);
        self.listener_count
    }

    /// Overwrite the state with a newly received frame
    ///
    /// No ordering check is made: a late frame replaces a newer one.
    pub fn apply_data_frame(&mut self, frame: &ControllerDataFrame) {
        self.apply_data_frame_at(frame, Instant::now());
    }

    pub(crate) fn apply_data_frame_at(&mut self, frame: &ControllerDataFrame, received: Instant) {
        debug_assert_eq!(frame.controller_id, self.controller_id);

        self.sequence_num = frame.sequence_num;
        self.is_connected = frame.is_connected;
        self.is_tracking = frame.is_tracking;
        self.orientation = frame.orientation;
        self.position = frame.position;
        self.previous_buttons = self.buttons;
        self.buttons = frame.button_state;
        self.trigger_value = frame.trigger_value;
        self.raw_sensor_data = frame.raw_sensor_data;

        if let Some(last) = self.last_frame_received {
            let seconds = received.saturating_duration_since(last).as_secs_f32();
            if seconds > 0.0 {
                let instant_rate = 1.0 / seconds;
                self.frame_rate = if self.frame_rate == 0.0 {
                    instant_rate
                } else {
                    self.frame_rate + FRAME_RATE_SMOOTHING * (instant_rate - self.frame_rate)
                };
            }
        }
        self.last_frame_received = Some(received);
        self.frames_applied += 1;
    }

    pub fn controller_id(&self) -> ControllerId {
        self.controller_id
    }

    /// Number of outstanding allocations of this view
    pub fn listener_count(&self) -> usize {
        self.listener_count
    }

    /// Whether any data frame has been applied yet
    pub fn is_valid(&self) -> bool {
        self.frames_applied > 0
    }

    pub fn sequence_num(&self) -> u32 {
        self.sequence_num
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn is_tracking(&self) -> bool {
        self.is_tracking
    }

    pub fn orientation(&self) -> Quaternion {
        self.orientation
    }

    pub fn position(&self) -> Vector3 {
        self.position
    }

    pub fn trigger_value(&self) -> u8 {
        self.trigger_value
    }

    /// Trigger pull normalized to `[0, 1]`
    pub fn trigger(&self) -> f32 {
        f32::from(self.trigger_value) / 255.0
    }

    pub fn raw_sensor_data(&self) -> Option<&RawSensorData> {
        self.raw_sensor_data.as_ref()
    }

    pub fn button_state(&self, button: Button) -> ButtonState {
        let was_down = self.previous_buttons & button.mask() != 0;
        let is_down = self.buttons & button.mask() != 0;
        match (was_down, is_down) {
            (false, false) => ButtonState::Up,
            (false, true) => ButtonState::Pressed,
            (true, true) => ButtonState::Down,
            (true, false) => ButtonState::Released,
        }
    }

    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }

    pub fn last_frame_received(&self) -> Option<Instant> {
        self.last_frame_received
    }

    /// Smoothed data frames per second, zero until two frames have arrived
    pub fn data_frame_rate(&self) -> f32 {
        self.frame_rate
    }
}

/// Shared reference to a registered [`ControllerView`]
///
/// Handles are cheap to clone; clones refer to the same view but do not count
/// as extra listeners. Each handle returned by
/// [`ClientApi::allocate_controller_view`](crate::ClientApi::allocate_controller_view)
/// must be given back exactly once.
#[derive(Debug, Clone)]
pub struct ControllerViewHandle {
    controller_id: ControllerId,
    view: Arc<RwLock<ControllerView>>,
}

impl ControllerViewHandle {
    pub(crate) fn new(controller_id: ControllerId, view: Arc<RwLock<ControllerView>>) -> Self {
        Self {
            controller_id,
            view,
        }
    }

    pub fn controller_id(&self) -> ControllerId {
        self.controller_id
    }

    /// Borrow the current state for a few quick reads
    ///
    /// `update()` applies data frames under the write lock, so holding this
    /// guard across `update()` on the same thread deadlocks. Prefer
    /// [`snapshot`](Self::snapshot) for anything longer-lived.
    pub fn read(&self) -> RwLockReadGuard<'_, ControllerView> {
        self.view.read()
    }

    /// Copy of the current state, detached from later updates
    ///
    /// The usual way to inspect a view between update cycles.
    pub fn snapshot(&self) -> ControllerView {
        self.view.read().clone()
    }

    pub(crate) fn shared(&self) -> &Arc<RwLock<ControllerView>> {
        &self.view
    }
}
