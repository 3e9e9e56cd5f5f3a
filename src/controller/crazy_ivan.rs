//! # Crazy Ivan Module
//!
//! Ambiguity check for the navigation pair.
//!
//! Two navigation units form one logical controller, one driving and one
//! steering the dome. If the Bluetooth host crosses them, reports the same unit
//! in both slots, or otherwise mixes them up, relaying their input could send
//! dome commands to the drive motors. Each tick with both units present their
//! reports are compared against a fixed set of contradictory patterns; a match
//! means the pairing cannot be trusted.
//!
//! ## Patterns
//!
//! | Pattern | FIRST vs SECOND |
//! |---------|-----------------|
//! | Duplicate identity | same device identity |
//! | Mirrored stick | both sticks deflected past [`MIRROR_DEFLECTION`], identical X and Y |
//! | Mirrored shoulder chord | identical L1/L2/L3 with one held, identical stick |
//!
//! Two hands cannot hold two sticks bit-identical far off centre, so these trade
//! an occasional false positive for never relaying swapped input.

use std::fmt;

use super::auth::normalize_device_id;
use super::snapshot::UnitReport;
use crate::transport::{Axis, Button, AXIS_CENTER};

/// Minimum raw distance from centre for a stick to count as deflected.
pub const MIRROR_DEFLECTION: u8 = 64;

/// Which contradictory pattern matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvanPattern {
    DuplicateIdentity,
    MirroredStick,
    MirroredShoulderChord,
}

impl fmt::Display for IvanPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IvanPattern::DuplicateIdentity => write!(f, "both units report the same identity"),
            IvanPattern::MirroredStick => write!(f, "both sticks mirror the same deflection"),
            IvanPattern::MirroredShoulderChord => {
                write!(f, "both units mirror the same shoulder chord")
            }
        }
    }
}

/// One side of the comparison.
#[derive(Debug, Clone, Copy)]
pub struct UnitView<'a> {
    pub device_id: Option<&'a str>,
    pub report: &'a UnitReport,
}

const SHOULDER_CHORD: [Button; 3] = [Button::L1, Button::L2, Button::L3];

/// Compares FIRST and SECOND. Returns the first matching pattern.
///
/// # Examples
///
/// ```
/// use astro_controller::controller::crazy_ivan::{check, IvanPattern, UnitView};
/// use astro_controller::controller::snapshot::UnitReport;
///
/// let report = UnitReport::default();
/// let first = UnitView { device_id: Some("00:1A:7D:DA:71:13"), report: &report };
/// let second = UnitView { device_id: Some("00:1A:7D:DA:71:14"), report: &report };
/// assert_eq!(check(&first, &second), None);
///
/// let twin = UnitView { device_id: Some("00:1a:7d:da:71:13"), report: &report };
/// assert_eq!(check(&first, &twin), Some(IvanPattern::DuplicateIdentity));
/// ```
#[must_use]
pub fn check(first: &UnitView<'_>, second: &UnitView<'_>) -> Option<IvanPattern> {
    if let (Some(a), Some(b)) = (first.device_id, second.device_id) {
        if normalize_device_id(a) == normalize_device_id(b) {
            return Some(IvanPattern::DuplicateIdentity);
        }
    }

    let same_stick = stick(first.report) == stick(second.report);

    if same_stick && deflected(first.report) {
        return Some(IvanPattern::MirroredStick);
    }

    let chord_mirrored = SHOULDER_CHORD
        .iter()
        .all(|b| first.report.pressed(*b) == second.report.pressed(*b));
    let chord_held = SHOULDER_CHORD.iter().any(|b| first.report.pressed(*b));
    if same_stick && chord_mirrored && chord_held {
        return Some(IvanPattern::MirroredShoulderChord);
    }

    None
}

fn stick(report: &UnitReport) -> (u8, u8) {
    (report.axis(Axis::LeftX), report.axis(Axis::LeftY))
}

fn deflected(report: &UnitReport) -> bool {
    let (x, y) = stick(report);
    x.abs_diff(AXIS_CENTER) >= MIRROR_DEFLECTION || y.abs_diff(AXIS_CENTER) >= MIRROR_DEFLECTION
}
