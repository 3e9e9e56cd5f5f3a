//! # Snapshot Module
//!
//! The normalized input record handed to the drive logic every tick, and the
//! per-unit raw report it is built from.
//!
//! `read()` overwrites the [`InputSnapshot`] once per tick. While the controller
//! is disconnected the snapshot is neutral: centred sticks, nothing pressed.

use super::ConnectionState;
use crate::transport::{Axis, Button, Transport, UnitSlot, AXIS_CENTER};

/// Held and clicked state of one button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub pressed: bool,
    pub clicked: bool,
}

impl ButtonState {
    fn merge(self, other: ButtonState) -> ButtonState {
        ButtonState {
            pressed: self.pressed || other.pressed,
            clicked: self.clicked || other.clicked,
        }
    }
}

/// Requests raised by the operator through the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requests {
    /// The operator asked to disconnect the controller this tick.
    pub disconnect_requested: bool,
}

/// Normalized per-tick input.
///
/// # Examples
///
/// ```
/// use astro_controller::controller::snapshot::InputSnapshot;
/// use astro_controller::controller::ConnectionState;
/// use astro_controller::transport::Button;
///
/// let snapshot = InputSnapshot::default();
/// assert_eq!(snapshot.connection, ConnectionState::Disconnected);
/// assert_eq!(snapshot.drive_stick_x, 0);
/// assert!(!snapshot.button(Button::Ps).pressed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSnapshot {
    pub drive_stick_x: i8,
    pub drive_stick_y: i8,
    pub dome_stick_x: i8,
    pub dome_stick_y: i8,
    /// One entry per button, in [`Button::ALL`] order.
    pub buttons: [ButtonState; Button::COUNT],
    pub requests: Requests,
    pub connection: ConnectionState,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self {
            drive_stick_x: 0,
            drive_stick_y: 0,
            dome_stick_x: 0,
            dome_stick_y: 0,
            buttons: [ButtonState::default(); Button::COUNT],
            requests: Requests::default(),
            connection: ConnectionState::Disconnected,
        }
    }
}

impl InputSnapshot {
    /// State of one button.
    #[must_use]
    pub fn button(&self, button: Button) -> ButtonState {
        self.buttons[button.index()]
    }

    /// Resets to neutral, keeping the connection state and requests given.
    pub fn clear(&mut self, connection: ConnectionState, requests: Requests) {
        *self = InputSnapshot {
            connection,
            requests,
            ..InputSnapshot::default()
        };
    }

    /// Whether any stick is off centre or any button held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.drive_stick_x != 0
            || self.drive_stick_y != 0
            || self.dome_stick_x != 0
            || self.dome_stick_y != 0
            || self.buttons.iter().any(|b| b.pressed)
    }
}

/// Raw state of one physical unit, sampled once per tick.
///
/// Clicks are consumed from the transport when the report is taken, so every
/// consumer in the tick works from the same report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub buttons: [ButtonState; Button::COUNT],
    pub axes: [u8; Axis::COUNT],
}

impl Default for UnitReport {
    fn default() -> Self {
        let mut axes = [AXIS_CENTER; Axis::COUNT];
        axes[Axis::L2.index()] = 0;
        axes[Axis::R2.index()] = 0;
        Self {
            buttons: [ButtonState::default(); Button::COUNT],
            axes,
        }
    }
}

impl UnitReport {
    /// Samples every button and axis of `slot`.
    pub fn sample<T: Transport + ?Sized>(transport: &mut T, slot: UnitSlot) -> Self {
        let mut report = UnitReport::default();
        for button in Button::ALL {
            report.buttons[button.index()] = ButtonState {
                pressed: transport.button_press(slot, button),
                clicked: transport.button_click(slot, button),
            };
        }
        for axis in [
            Axis::LeftX,
            Axis::LeftY,
            Axis::RightX,
            Axis::RightY,
            Axis::L2,
            Axis::R2,
        ] {
            report.axes[axis.index()] = transport.analog_axis(slot, axis);
        }
        report
    }

    #[must_use]
    pub fn pressed(&self, button: Button) -> bool {
        self.buttons[button.index()].pressed
    }

    #[must_use]
    pub fn clicked(&self, button: Button) -> bool {
        self.buttons[button.index()].clicked
    }

    #[must_use]
    pub fn axis(&self, axis: Axis) -> u8 {
        self.axes[axis.index()]
    }

    /// Merges `other`'s state for `button` into this report's `target` entry.
    pub(crate) fn merge_button(&mut self, target: Button, other: ButtonState) {
        let entry = &mut self.buttons[target.index()];
        *entry = entry.merge(other);
    }
}
