//! # Navigation Pair Module
//!
//! Two PS3 Move navigation units acting as one logical controller.
//!
//! Each unit has its own [`UnitLink`]. The pair is
//! - disconnected while neither unit is connected,
//! - partial while exactly one is,
//! - connected once both are.
//!
//! One unit drives, the other steers the dome (`nav.drive_unit` in the
//! configuration). Every tick with both units reporting, the Crazy Ivan check
//! compares them; a contradictory pattern disconnects both. A critical fault on
//! either unit, or the operator chord (PS clicked while L2 is held) on either
//! unit, also disconnects both.
//!
//! ## Button Merge
//!
//! | Dome unit | Snapshot |
//! |-----------|----------|
//! | L1 / L2 / L3 | R1 / R2 / R3 |
//! | Cross | Triangle |
//! | Circle | Square |
//! | D-pad, PS | OR-ed with the drive unit |
//!
//! The drive unit's buttons keep their own names.

use std::rc::Rc;

use tracing::{debug, info, warn};

use super::anchor::{self, AttachInbox, AttachSink};
use super::crazy_ivan::{self, UnitView};
use super::snapshot::{InputSnapshot, Requests, UnitReport};
use super::unit::{AttachOutcome, UnitLink};
use super::{
    poll_transport, Controller, ControllerKind, ControllerSettings, ConnectionState, FaultRecord,
    Indicator,
};
use crate::error::LinkFault;
use crate::transport::{Axis, Button, Transport, UnitSlot};

/// Where the dome unit's buttons land in the snapshot.
const DOME_BUTTON_MAP: [(Button, Button); 10] = [
    (Button::L1, Button::R1),
    (Button::L2, Button::R2),
    (Button::L3, Button::R3),
    (Button::Cross, Button::Triangle),
    (Button::Circle, Button::Square),
    (Button::Up, Button::Up),
    (Button::Right, Button::Right),
    (Button::Down, Button::Down),
    (Button::Left, Button::Left),
    (Button::Ps, Button::Ps),
];

/// Dual navigation-unit controller.
pub struct NavPair<T: Transport> {
    transport: T,
    settings: ControllerSettings,
    inbox: Rc<AttachInbox>,
    units: [UnitLink; 2],
    last_fault: Option<LinkFault>,
    transport_down: bool,
}

impl<T: Transport> std::fmt::Debug for NavPair<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavPair")
            .field("units", &self.units)
            .field("last_fault", &self.last_fault)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> NavPair<T> {
    /// Creates a disconnected pair. Call [`Controller::begin`] before polling.
    pub fn new(transport: T, settings: ControllerSettings) -> Self {
        Self {
            transport,
            settings,
            inbox: Rc::new(AttachInbox::new()),
            units: [UnitLink::new(UnitSlot::First), UnitLink::new(UnitSlot::Second)],
            last_fault: None,
            transport_down: false,
        }
    }

    fn unit(&self, slot: UnitSlot) -> &UnitLink {
        &self.units[slot.index()]
    }

    fn handle_attaches(&mut self, now_ms: u64) {
        for slot in self.inbox.drain() {
            let before = self.connection_state();
            let outcome = self.units[slot.index()].handle_attach(
                &mut self.transport,
                &self.settings.authorized,
                now_ms,
            );
            match outcome {
                AttachOutcome::Rejected(fault) => self.last_fault = Some(fault),
                AttachOutcome::Connected | AttachOutcome::Invalid => {
                    let after = self.connection_state();
                    if before != after {
                        info!("Navigation pair {} -> {}", before, after);
                    }
                }
                AttachOutcome::Duplicate => {}
            }
        }
    }

    /// Disconnects both units.
    fn disconnect_all(&mut self) {
        for unit in &mut self.units {
            unit.force_disconnect(&mut self.transport);
        }
    }

    /// Samples every unit that is connected and currently reporting.
    fn sample_reports(&mut self) -> [Option<UnitReport>; 2] {
        let mut reports = [None, None];
        for slot in UnitSlot::ALL {
            if self.units[slot.index()].is_connected()
                && self.transport.connected(slot)
                && self.transport.report_valid(slot)
            {
                reports[slot.index()] = Some(UnitReport::sample(&mut self.transport, slot));
            }
        }
        reports
    }

    fn crazy_ivan(&self, reports: &[Option<UnitReport>; 2]) -> Option<LinkFault> {
        let (Some(first), Some(second)) = (&reports[0], &reports[1]) else {
            return None;
        };
        let pattern = crazy_ivan::check(
            &UnitView {
                device_id: self.unit(UnitSlot::First).device_id(),
                report: first,
            },
            &UnitView {
                device_id: self.unit(UnitSlot::Second).device_id(),
                report: second,
            },
        )?;
        Some(LinkFault::AmbiguousPairing(pattern.to_string()))
    }

    fn merge(&self, reports: &[Option<UnitReport>; 2]) -> InputSnapshot {
        let drive_slot = self.settings.drive_unit;
        let dome_slot = drive_slot.other();

        let mut merged = reports[drive_slot.index()].clone().unwrap_or_default();
        if let Some(dome) = &reports[dome_slot.index()] {
            for (from, to) in DOME_BUTTON_MAP {
                merged.merge_button(to, dome.buttons[from.index()]);
            }
        }

        let (drive_x, drive_y) = match &reports[drive_slot.index()] {
            Some(r) => self
                .settings
                .drive_stick
                .normalize(r.axis(Axis::LeftX), r.axis(Axis::LeftY)),
            None => (0, 0),
        };
        let (dome_x, dome_y) = match &reports[dome_slot.index()] {
            Some(r) => self
                .settings
                .dome_stick
                .normalize(r.axis(Axis::LeftX), r.axis(Axis::LeftY)),
            None => (0, 0),
        };

        InputSnapshot {
            drive_stick_x: drive_x,
            drive_stick_y: drive_y,
            dome_stick_x: dome_x,
            dome_stick_y: dome_y,
            buttons: merged.buttons,
            requests: Requests::default(),
            connection: self.connection_state(),
        }
    }
}

impl<T: Transport> Controller for NavPair<T> {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Ps3Nav
    }

    fn begin(&mut self) {
        let sink: Rc<dyn AttachSink> = self.inbox.clone();
        anchor::install(&sink);
        self.transport.set_attach_callback(anchor::dispatch_attach);

        info!("Ready to connect a {}", ControllerKind::Ps3Nav);
        debug!(
            "Drive unit: {}, drive dead zone {}, dome dead zone {}",
            self.settings.drive_unit,
            self.settings.drive_stick.deadzone(),
            self.settings.dome_stick.deadzone()
        );
    }

    fn read(&mut self, now_ms: u64, snapshot: &mut InputSnapshot) -> bool {
        if !poll_transport(&mut self.transport, &mut self.transport_down, &mut self.last_fault) {
            snapshot.clear(self.connection_state(), Requests::default());
            return false;
        }
        self.handle_attaches(now_ms);

        if self.connection_state() == ConnectionState::Disconnected {
            snapshot.clear(ConnectionState::Disconnected, Requests::default());
            return false;
        }

        for unit in &mut self.units {
            unit.refresh(&self.transport, now_ms);
        }
        let reports = self.sample_reports();

        if let Some(fault) = self.crazy_ivan(&reports) {
            warn!("{}", fault);
            self.last_fault = Some(fault);
            self.disconnect_all();
            snapshot.clear(ConnectionState::Disconnected, Requests::default());
            return false;
        }

        if reports.iter().flatten().any(|r| r.clicked(Button::Ps) && r.pressed(Button::L2)) {
            info!("Disconnecting navigation pair due to user request");
            self.disconnect_all();
            snapshot.clear(
                ConnectionState::Disconnected,
                Requests {
                    disconnect_requested: true,
                },
            );
            return true;
        }

        *snapshot = self.merge(&reports);
        reports.iter().any(Option::is_some)
    }

    fn detect_faults(&mut self, now_ms: u64) -> Option<LinkFault> {
        let mut detected = None;
        for slot in UnitSlot::ALL {
            if let Some(fault) = self.units[slot.index()].detect_fault(
                &mut self.transport,
                &self.settings.detector,
                now_ms,
            ) {
                detected.get_or_insert(fault);
            }
        }
        let fault = detected?;
        // The pair cannot be trusted with one unit gone
        self.disconnect_all();
        self.last_fault = Some(fault.clone());
        Some(fault)
    }

    fn connection_state(&self) -> ConnectionState {
        match self.units.iter().filter(|u| u.is_connected()).count() {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Partial,
            _ => ConnectionState::Connected,
        }
    }

    fn set_indicator(&mut self, indicator: Indicator) {
        for unit in &self.units {
            if unit.is_connected() {
                self.transport.set_indicator(unit.slot(), indicator);
            }
        }
    }

    fn button_click(&mut self, button: Button) -> bool {
        self.transport.button_click(self.settings.drive_unit, button)
    }

    fn analog_axis(&self, axis: Axis) -> u8 {
        self.transport.analog_axis(self.settings.drive_unit, axis)
    }

    fn fault_records(&self) -> Vec<(UnitSlot, FaultRecord)> {
        self.units.iter().map(|u| (u.slot(), *u.faults())).collect()
    }

    fn last_fault(&self) -> Option<&LinkFault> {
        self.last_fault.as_ref()
    }

    fn shutdown(&mut self) {
        anchor::clear();
        self.inbox.discard();
        self.disconnect_all();
        info!("{} shut down", ControllerKind::Ps3Nav);
    }
}
