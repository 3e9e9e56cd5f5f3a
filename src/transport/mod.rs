//! # Transport Module
//!
//! The capability set the controller core consumes from the hardware layer.
//!
//! The core never talks to Bluetooth or USB directly. It sees a [`Transport`]:
//! something that can be polled once per tick, reports attach events through a
//! context-free callback, and exposes raw per-button and per-axis state for up to
//! two physical units.
//!
//! - `evdev`: Linux host implementation over `/dev/input/event*`

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::controller::indicator::Indicator;

pub mod evdev;

/// Physical unit slot on the transport.
///
/// Single gamepads only ever use [`UnitSlot::First`]. The navigation pair uses
/// both slots, in the order the transport paired the units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSlot {
    First,
    Second,
}

impl UnitSlot {
    /// Both slots, in index order.
    pub const ALL: [UnitSlot; 2] = [UnitSlot::First, UnitSlot::Second];

    /// Array index of this slot.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            UnitSlot::First => 0,
            UnitSlot::Second => 1,
        }
    }

    /// The other slot of a pair.
    #[must_use]
    pub fn other(self) -> UnitSlot {
        match self {
            UnitSlot::First => UnitSlot::Second,
            UnitSlot::Second => UnitSlot::First,
        }
    }
}

impl fmt::Display for UnitSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSlot::First => write!(f, "first"),
            UnitSlot::Second => write!(f, "second"),
        }
    }
}

/// Digital buttons, in snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Right,
    Down,
    Left,
    Triangle,
    Circle,
    Cross,
    Square,
    L1,
    L2,
    L3,
    R1,
    R2,
    R3,
    Share,
    Options,
    Ps,
}

impl Button {
    /// Number of buttons in a snapshot.
    pub const COUNT: usize = 17;

    /// Every button, in snapshot order.
    pub const ALL: [Button; Button::COUNT] = [
        Button::Up,
        Button::Right,
        Button::Down,
        Button::Left,
        Button::Triangle,
        Button::Circle,
        Button::Cross,
        Button::Square,
        Button::L1,
        Button::L2,
        Button::L3,
        Button::R1,
        Button::R2,
        Button::R3,
        Button::Share,
        Button::Options,
        Button::Ps,
    ];

    /// Position of this button in [`Button::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Analog axes. Raw values are 0-255 with 128 at rest for sticks and 0 at rest
/// for triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    LeftX,
    LeftY,
    RightX,
    RightY,
    L2,
    R2,
}

impl Axis {
    /// Number of analog axes.
    pub const COUNT: usize = 6;

    /// Position of this axis in per-unit axis arrays.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Raw stick value at rest.
pub const AXIS_CENTER: u8 = 128;

/// Context-free attach notification. The transport calls it once for every
/// attach it observes during [`Transport::poll`].
pub type AttachCallback = fn(UnitSlot);

/// Failure to reach the hardware layer. Polling continues regardless.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Hardware capability set consumed by the controllers.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Run one poll of the hardware layer. Attach callbacks fire from here.
    fn poll(&mut self) -> Result<(), TransportError>;

    /// Register the attach callback. Replaces any previous one.
    fn set_attach_callback(&mut self, callback: AttachCallback);

    /// Whether the unit in `slot` is currently present.
    fn connected(&self, slot: UnitSlot) -> bool;

    /// Whether the latest report from `slot` was well formed.
    fn report_valid(&self, slot: UnitSlot) -> bool;

    /// Identity of the unit in `slot` (Bluetooth MAC), if readable.
    fn device_id(&self, slot: UnitSlot) -> Option<String>;

    /// Whether `button` is currently held.
    fn button_press(&self, slot: UnitSlot, button: Button) -> bool;

    /// Whether `button` was pressed since the last call. Consumes the click.
    fn button_click(&mut self, slot: UnitSlot, button: Button) -> bool;

    /// Raw analog value (0-255).
    fn analog_axis(&self, slot: UnitSlot, axis: Axis) -> u8;

    /// Set the unit's indicator.
    fn set_indicator(&mut self, slot: UnitSlot, indicator: Indicator);

    /// Drop the unit at the transport level.
    fn disconnect(&mut self, slot: UnitSlot);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn poll(&mut self) -> Result<(), TransportError> {
        (**self).poll()
    }

    fn set_attach_callback(&mut self, callback: AttachCallback) {
        (**self).set_attach_callback(callback);
    }

    fn connected(&self, slot: UnitSlot) -> bool {
        (**self).connected(slot)
    }

    fn report_valid(&self, slot: UnitSlot) -> bool {
        (**self).report_valid(slot)
    }

    fn device_id(&self, slot: UnitSlot) -> Option<String> {
        (**self).device_id(slot)
    }

    fn button_press(&self, slot: UnitSlot, button: Button) -> bool {
        (**self).button_press(slot, button)
    }

    fn button_click(&mut self, slot: UnitSlot, button: Button) -> bool {
        (**self).button_click(slot, button)
    }

    fn analog_axis(&self, slot: UnitSlot, axis: Axis) -> u8 {
        (**self).analog_axis(slot, axis)
    }

    fn set_indicator(&mut self, slot: UnitSlot, indicator: Indicator) {
        (**self).set_indicator(slot, indicator);
    }

    fn disconnect(&mut self, slot: UnitSlot) {
        (**self).disconnect(slot);
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Per-slot state of the fake hardware.
    #[derive(Debug, Clone)]
    pub struct FakeUnit {
        pub connected: bool,
        pub report_valid: bool,
        pub device_id: Option<String>,
        pub pressed: Vec<Button>,
        pub clicks: Vec<Button>,
        pub axes: [u8; Axis::COUNT],
        pub indicators: Vec<Indicator>,
        pub disconnects: usize,
    }

    impl FakeUnit {
        fn new() -> Self {
            let mut axes = [AXIS_CENTER; Axis::COUNT];
            axes[Axis::L2.index()] = 0;
            axes[Axis::R2.index()] = 0;
            Self {
                connected: false,
                report_valid: true,
                device_id: None,
                pressed: Vec::new(),
                clicks: Vec::new(),
                axes,
                indicators: Vec::new(),
                disconnects: 0,
            }
        }
    }

    #[derive(Debug)]
    struct FakeState {
        units: [FakeUnit; 2],
        pending_attaches: Vec<UnitSlot>,
        poll_error: Option<String>,
        polls: usize,
        callback: Option<AttachCallback>,
    }

    /// Scriptable transport shared between a test and the controller under test.
    #[derive(Clone)]
    pub struct FakeTransport {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(FakeState {
                    units: [FakeUnit::new(), FakeUnit::new()],
                    pending_attaches: Vec::new(),
                    poll_error: None,
                    polls: 0,
                    callback: None,
                })),
            }
        }

        /// Make a unit present and queue its attach callback for the next poll.
        pub fn plug(&self, slot: UnitSlot, device_id: &str) {
            let mut state = self.state.lock().unwrap();
            let unit = &mut state.units[slot.index()];
            unit.connected = true;
            unit.device_id = Some(device_id.to_string());
            state.pending_attaches.push(slot);
        }

        /// Queue another attach callback without changing the hardware.
        pub fn repeat_attach(&self, slot: UnitSlot) {
            self.state.lock().unwrap().pending_attaches.push(slot);
        }

        /// Make the unit go silent without a detach notification.
        pub fn go_silent(&self, slot: UnitSlot) {
            self.state.lock().unwrap().units[slot.index()].connected = false;
        }

        pub fn set_report_valid(&self, slot: UnitSlot, valid: bool) {
            self.state.lock().unwrap().units[slot.index()].report_valid = valid;
        }

        pub fn press(&self, slot: UnitSlot, button: Button) {
            let mut state = self.state.lock().unwrap();
            let unit = &mut state.units[slot.index()];
            if !unit.pressed.contains(&button) {
                unit.pressed.push(button);
            }
        }

        pub fn release(&self, slot: UnitSlot, button: Button) {
            self.state.lock().unwrap().units[slot.index()]
                .pressed
                .retain(|b| *b != button);
        }

        pub fn click(&self, slot: UnitSlot, button: Button) {
            self.state.lock().unwrap().units[slot.index()].clicks.push(button);
        }

        pub fn set_axis(&self, slot: UnitSlot, axis: Axis, value: u8) {
            self.state.lock().unwrap().units[slot.index()].axes[axis.index()] = value;
        }

        pub fn set_poll_error(&self, error: Option<&str>) {
            self.state.lock().unwrap().poll_error = error.map(str::to_string);
        }

        pub fn unit(&self, slot: UnitSlot) -> FakeUnit {
            self.state.lock().unwrap().units[slot.index()].clone()
        }

        pub fn polls(&self) -> usize {
            self.state.lock().unwrap().polls
        }

        pub fn has_callback(&self) -> bool {
            self.state.lock().unwrap().callback.is_some()
        }
    }

    impl Transport for FakeTransport {
        fn poll(&mut self) -> Result<(), TransportError> {
            let (callback, attaches) = {
                let mut state = self.state.lock().unwrap();
                state.polls += 1;
                if let Some(error) = state.poll_error.clone() {
                    return Err(TransportError(error));
                }
                (state.callback, std::mem::take(&mut state.pending_attaches))
            };
            if let Some(callback) = callback {
                for slot in attaches {
                    callback(slot);
                }
            }
            Ok(())
        }

        fn set_attach_callback(&mut self, callback: AttachCallback) {
            self.state.lock().unwrap().callback = Some(callback);
        }

        fn connected(&self, slot: UnitSlot) -> bool {
            self.state.lock().unwrap().units[slot.index()].connected
        }

        fn report_valid(&self, slot: UnitSlot) -> bool {
            self.state.lock().unwrap().units[slot.index()].report_valid
        }

        fn device_id(&self, slot: UnitSlot) -> Option<String> {
            self.state.lock().unwrap().units[slot.index()].device_id.clone()
        }

        fn button_press(&self, slot: UnitSlot, button: Button) -> bool {
            self.state.lock().unwrap().units[slot.index()]
                .pressed
                .contains(&button)
        }

        fn button_click(&mut self, slot: UnitSlot, button: Button) -> bool {
            let mut state = self.state.lock().unwrap();
            let clicks = &mut state.units[slot.index()].clicks;
            match clicks.iter().position(|b| *b == button) {
                Some(pos) => {
                    clicks.remove(pos);
                    true
                }
                None => false,
            }
        }

        fn analog_axis(&self, slot: UnitSlot, axis: Axis) -> u8 {
            self.state.lock().unwrap().units[slot.index()].axes[axis.index()]
        }

        fn set_indicator(&mut self, slot: UnitSlot, indicator: Indicator) {
            self.state.lock().unwrap().units[slot.index()]
                .indicators
                .push(indicator);
        }

        fn disconnect(&mut self, slot: UnitSlot) {
            let mut state = self.state.lock().unwrap();
            let unit = &mut state.units[slot.index()];
            unit.connected = false;
            unit.disconnects += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_order_matches_index() {
        for (i, button) in Button::ALL.iter().enumerate() {
            assert_eq!(button.index(), i, "{:?} out of order", button);
        }
    }

    #[test]
    fn test_slot_other() {
        assert_eq!(UnitSlot::First.other(), UnitSlot::Second);
        assert_eq!(UnitSlot::Second.other(), UnitSlot::First);
        assert_eq!(UnitSlot::Second.index(), 1);
    }

    #[test]
    fn test_transport_error_message() {
        let err = TransportError("usb host gone".to_string());
        assert_eq!(err.to_string(), "usb host gone");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert_eq!(boxed.to_string(), "usb host gone");
    }

    #[test]
    fn test_fake_click_is_consumed() {
        let mut fake = mocks::FakeTransport::new();
        fake.click(UnitSlot::First, Button::Ps);
        assert!(fake.button_click(UnitSlot::First, Button::Ps));
        assert!(!fake.button_click(UnitSlot::First, Button::Ps));
    }

    #[test]
    fn test_fake_poll_error() {
        let mut fake = mocks::FakeTransport::new();
        fake.set_poll_error(Some("usb host gone"));
        assert_eq!(
            fake.poll(),
            Err(TransportError("usb host gone".to_string()))
        );
        fake.set_poll_error(None);
        assert!(fake.poll().is_ok());
        assert_eq!(fake.polls(), 2);
    }
}
