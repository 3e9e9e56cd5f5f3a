//! # Controller Module
//!
//! Connection lifecycle for the droid's wireless controllers.
//!
//! This module handles:
//! - Attach dispatch from the transport to the active controller
//! - Allow-list authorization of newly attached units
//! - Staleness and bad-data fault detection
//! - Pairing two navigation units into one logical controller, with the
//!   "Crazy Ivan" ambiguity check
//! - Normalizing whatever is connected into one [`InputSnapshot`] per tick
//!
//! ## Connection States
//!
//! ```text
//!                 authorized attach (gamepad, or second nav unit)
//!   Disconnected ─────────────────────────────────────────────► Connected
//!        │  ▲                                                     ▲   │
//!        │  │ chord / fault / Crazy Ivan                          │   │
//!        │  └─────────────────────────────────────────────────────┼───┘
//!        │ first nav unit                 second nav unit         │
//!        └────────────────────► Partial ──────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use astro_controller::config::Config;
//! use astro_controller::controller::{self, ControllerSettings, InputSnapshot};
//! use astro_controller::transport::evdev::EvdevTransport;
//!
//! let config = Config::load("config/default.toml")?;
//! let transport = EvdevTransport::new(config.controller.kind, &config.transport);
//! let mut pad = controller::build(
//!     config.controller.kind,
//!     Box::new(transport),
//!     ControllerSettings::from_config(&config),
//! );
//!
//! pad.begin();
//! let mut snapshot = InputSnapshot::default();
//! controller::run_tick(pad.as_mut(), 0, &mut snapshot);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod anchor;
pub mod auth;
pub mod crazy_ivan;
pub mod fault;
pub mod gamepad;
pub mod indicator;
pub mod nav_pair;
pub mod snapshot;
pub mod stick;
pub mod unit;

use std::fmt;

use serde::Deserialize;
use tracing::warn;

use crate::config::Config;
use crate::error::LinkFault;
use crate::transport::{Axis, Button, Transport, TransportError, UnitSlot};

pub use auth::AuthorizedDevices;
pub use fault::{FaultDetector, FaultRecord};
pub use gamepad::Gamepad;
pub use indicator::{Indicator, SpeedProfile};
pub use nav_pair::NavPair;
pub use snapshot::InputSnapshot;
pub use stick::{Stick, StickSide};

/// Overall connection state of the logical controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// One unit of a navigation pair is connected.
    Partial,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Partial => write!(f, "partial"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Supported controller families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerKind {
    /// Two PS3 Move navigation units
    Ps3Nav,
    /// DualShock 3
    Ps3,
    /// DualShock 4
    Ps4,
    /// DualSense
    Ps5,
}

impl ControllerKind {
    /// Number of physical units forming one logical controller.
    #[must_use]
    pub fn unit_count(self) -> usize {
        match self {
            ControllerKind::Ps3Nav => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerKind::Ps3Nav => write!(f, "PS3 navigation pair"),
            ControllerKind::Ps3 => write!(f, "PS3 controller"),
            ControllerKind::Ps4 => write!(f, "PS4 controller"),
            ControllerKind::Ps5 => write!(f, "PS5 controller"),
        }
    }
}

/// Everything a controller needs from configuration.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub authorized: AuthorizedDevices,
    pub detector: FaultDetector,
    pub drive_stick: Stick,
    pub dome_stick: Stick,
    /// Navigation unit that drives; the other one steers the dome.
    pub drive_unit: UnitSlot,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            authorized: AuthorizedDevices::accept_all(),
            detector: FaultDetector::default(),
            drive_stick: Stick::new(StickSide::Left, 10),
            dome_stick: Stick::new(StickSide::Right, 10),
            drive_unit: UnitSlot::First,
        }
    }
}

impl ControllerSettings {
    /// Builds settings from a validated configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let controller = &config.controller;
        Self {
            authorized: AuthorizedDevices::new(&config.authorization.devices),
            detector: FaultDetector::new(config.safety.fault_timeout_ms, config.safety.max_bad_data),
            drive_stick: Stick::new(controller.drive_stick.side, controller.drive_stick.deadzone),
            dome_stick: Stick::new(controller.dome_stick.side, controller.dome_stick.deadzone),
            drive_unit: controller.nav.drive_unit,
        }
    }
}

/// Capability set shared by every controller family.
///
/// One tick is [`Controller::read`] followed by [`Controller::detect_faults`];
/// [`run_tick`] does both.
pub trait Controller {
    /// Controller family.
    fn kind(&self) -> ControllerKind;

    /// Registers for attach events. Call once before the first tick.
    fn begin(&mut self);

    /// Polls the transport, handles attaches and writes this tick's snapshot.
    ///
    /// Returns `true` when input was read from at least one unit.
    fn read(&mut self, now_ms: u64, snapshot: &mut InputSnapshot) -> bool;

    /// Runs the fault detector. A fault disconnects the controller.
    fn detect_faults(&mut self, now_ms: u64) -> Option<LinkFault>;

    /// Current connection state.
    fn connection_state(&self) -> ConnectionState;

    /// Whether the logical controller is fully connected.
    fn connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Sets the indicator of every connected unit.
    fn set_indicator(&mut self, indicator: Indicator);

    /// Shows the drive state on the indicator.
    fn set_led(&mut self, drive_enabled: bool, profile: SpeedProfile) {
        self.set_indicator(Indicator::for_drive(drive_enabled, profile));
    }

    /// Raw click of the driving unit. Consumes the click.
    fn button_click(&mut self, button: Button) -> bool;

    /// Raw axis of the driving unit.
    fn analog_axis(&self, axis: Axis) -> u8;

    /// Fault records of every unit.
    fn fault_records(&self) -> Vec<(UnitSlot, FaultRecord)>;

    /// Most recent link fault, if any.
    fn last_fault(&self) -> Option<&LinkFault>;

    /// Unregisters from attach events and disconnects every unit.
    fn shutdown(&mut self);
}

/// Builds the controller for `kind`.
#[must_use]
pub fn build(
    kind: ControllerKind,
    transport: Box<dyn Transport>,
    settings: ControllerSettings,
) -> Box<dyn Controller> {
    match kind {
        ControllerKind::Ps3Nav => Box::new(NavPair::new(transport, settings)),
        _ => Box::new(Gamepad::new(kind, transport, settings)),
    }
}

/// Runs one tick: read, then fault detection.
///
/// When the fault detector disconnects the controller the snapshot is reset to
/// neutral, so the drive logic never sees input from a faulted link.
pub fn run_tick(controller: &mut dyn Controller, now_ms: u64, snapshot: &mut InputSnapshot) -> bool {
    let read = controller.read(now_ms, snapshot);
    if controller.detect_faults(now_ms).is_some() {
        snapshot.clear(controller.connection_state(), snapshot.requests);
        return false;
    }
    read
}

/// Polls the transport, tracking outages so each one is logged once.
pub(crate) fn poll_transport<T: Transport + ?Sized>(
    transport: &mut T,
    transport_down: &mut bool,
    last_fault: &mut Option<LinkFault>,
) -> bool {
    match transport.poll() {
        Ok(()) => {
            if *transport_down {
                tracing::info!("Transport available again");
                *transport_down = false;
            }
            true
        }
        Err(TransportError(reason)) => {
            if !*transport_down {
                let fault = LinkFault::TransportUnavailable(reason);
                warn!("{}", fault);
                *last_fault = Some(fault);
                *transport_down = true;
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mocks::FakeTransport;

    #[test]
    fn test_unit_count() {
        assert_eq!(ControllerKind::Ps3Nav.unit_count(), 2);
        assert_eq!(ControllerKind::Ps4.unit_count(), 1);
    }

    #[test]
    fn test_build_selects_family() {
        let pad = build(
            ControllerKind::Ps5,
            Box::new(FakeTransport::new()),
            ControllerSettings::default(),
        );
        assert_eq!(pad.kind(), ControllerKind::Ps5);

        let nav = build(
            ControllerKind::Ps3Nav,
            Box::new(FakeTransport::new()),
            ControllerSettings::default(),
        );
        assert_eq!(nav.kind(), ControllerKind::Ps3Nav);
        assert_eq!(nav.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_run_tick_neutralizes_on_fault() {
        let fake = FakeTransport::new();
        let mut pad = build(
            ControllerKind::Ps4,
            Box::new(fake.clone()),
            ControllerSettings::default(),
        );
        pad.begin();
        let mut snapshot = InputSnapshot::default();

        fake.plug(UnitSlot::First, "00:1A:7D:DA:71:13");
        fake.set_axis(UnitSlot::First, Axis::LeftX, 255);
        assert!(run_tick(pad.as_mut(), 0, &mut snapshot));
        assert_eq!(snapshot.drive_stick_x, 127);

        // The pad keeps reporting connected but stops delivering valid reports
        fake.set_report_valid(UnitSlot::First, false);
        run_tick(pad.as_mut(), 500, &mut snapshot);
        assert!(!run_tick(pad.as_mut(), 1_200, &mut snapshot));
        assert_eq!(snapshot.connection, ConnectionState::Disconnected);
        assert_eq!(snapshot.drive_stick_x, 0);
        pad.shutdown();
    }

    #[test]
    fn test_poll_transport_logs_outage_once() {
        let mut fake = FakeTransport::new();
        let mut down = false;
        let mut last_fault = None;

        fake.set_poll_error(Some("host controller lost"));
        assert!(!poll_transport(&mut fake, &mut down, &mut last_fault));
        assert!(down);
        assert_eq!(
            last_fault,
            Some(LinkFault::TransportUnavailable("host controller lost".to_string()))
        );

        last_fault = None;
        assert!(!poll_transport(&mut fake, &mut down, &mut last_fault));
        assert!(last_fault.is_none());

        fake.set_poll_error(None);
        assert!(poll_transport(&mut fake, &mut down, &mut last_fault));
        assert!(!down);
    }
}
