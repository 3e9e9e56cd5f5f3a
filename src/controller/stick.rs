//! # Stick Module
//!
//! Turns raw 0-255 stick axes into signed stick values with a dead zone.
//!
//! ## Dead Zone
//!
//! Worn sticks rarely rest exactly at 128. Deflections within the dead zone map
//! to 0, and the remaining travel is rescaled so full deflection still reaches
//! ±127.
//!
//! ## Orientation
//!
//! Output is -127..=127 with right and up positive. Raw Y grows downward, so Y
//! is inverted.
//!
//! ```
//! use astro_controller::controller::stick::{Stick, StickSide};
//!
//! let stick = Stick::new(StickSide::Left, 10);
//!
//! // Resting slightly off centre
//! assert_eq!(stick.normalize(133, 124), (0, 0));
//!
//! // Full right, full up
//! assert_eq!(stick.normalize(255, 0), (127, 127));
//! ```

use serde::Deserialize;

use crate::transport::{Axis, AXIS_CENTER};

/// Largest accepted dead zone, in raw units.
pub const MAX_DEADZONE: u8 = 64;

/// Which physical stick of a gamepad feeds a logical stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StickSide {
    Left,
    Right,
}

impl StickSide {
    /// The raw (X, Y) axes of this side.
    #[must_use]
    pub fn axes(self) -> (Axis, Axis) {
        match self {
            StickSide::Left => (Axis::LeftX, Axis::LeftY),
            StickSide::Right => (Axis::RightX, Axis::RightY),
        }
    }
}

/// A logical stick: its source side and dead zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stick {
    side: StickSide,
    deadzone: u8,
}

impl Stick {
    /// Creates a stick. The dead zone is clamped to [`MAX_DEADZONE`].
    #[must_use]
    pub fn new(side: StickSide, deadzone: u8) -> Self {
        Self {
            side,
            deadzone: deadzone.min(MAX_DEADZONE),
        }
    }

    #[must_use]
    pub fn side(&self) -> StickSide {
        self.side
    }

    #[must_use]
    pub fn deadzone(&self) -> u8 {
        self.deadzone
    }

    /// Normalizes a raw (X, Y) pair.
    #[must_use]
    pub fn normalize(&self, raw_x: u8, raw_y: u8) -> (i8, i8) {
        let x = i16::from(raw_x) - i16::from(AXIS_CENTER);
        let y = i16::from(AXIS_CENTER) - i16::from(raw_y);
        (self.apply_deadzone(x), self.apply_deadzone(y))
    }

    /// Applies the dead zone to a centred value (-128..=127).
    fn apply_deadzone(&self, centred: i16) -> i8 {
        let dz = i16::from(self.deadzone);
        let magnitude = centred.abs().min(127);
        if magnitude <= dz {
            return 0;
        }
        // Rescale remaining travel to 0..=127
        let scaled = (magnitude - dz) * 127 / (127 - dz);
        (centred.signum() * scaled) as i8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centre_is_zero() {
        let stick = Stick::new(StickSide::Left, 0);
        assert_eq!(stick.normalize(128, 128), (0, 0));
    }

    #[test]
    fn test_within_deadzone() {
        let stick = Stick::new(StickSide::Right, 12);
        assert_eq!(stick.normalize(140, 116), (0, 0));
        assert_eq!(stick.normalize(116, 140), (0, 0));
    }

    #[test]
    fn test_full_deflection_preserved() {
        let stick = Stick::new(StickSide::Left, 20);
        assert_eq!(stick.normalize(255, 255), (127, -127));
        assert_eq!(stick.normalize(0, 0), (-127, 127));
    }

    #[test]
    fn test_rescaled_past_deadzone() {
        let stick = Stick::new(StickSide::Left, 10);
        let (x, _) = stick.normalize(128 + 11, 128);
        assert_eq!(x, 1);
        let (x, _) = stick.normalize(128 + 60, 128);
        assert!(x > 50 && x < 60, "unexpected rescale: {}", x);
    }

    #[test]
    fn test_deadzone_clamped() {
        let stick = Stick::new(StickSide::Left, 200);
        assert_eq!(stick.deadzone(), MAX_DEADZONE);
    }

    #[test]
    fn test_side_axes() {
        assert_eq!(StickSide::Left.axes(), (Axis::LeftX, Axis::LeftY));
        assert_eq!(StickSide::Right.axes(), (Axis::RightX, Axis::RightY));
    }
}
