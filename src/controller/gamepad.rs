//! # Gamepad Module
//!
//! Single-unit controllers: DualShock 3, DualShock 4 and DualSense.
//!
//! A gamepad is disconnected or connected. An authorized attach connects it;
//! the operator chord (PS clicked while L2 or R2 is held), a critical fault, or an
//! attach notification for a vanished pad disconnects it.
//!
//! The drive and dome sticks come from the configured sides of the pad.

use std::rc::Rc;

use tracing::{debug, info};

use super::anchor::{self, AttachInbox, AttachSink};
use super::snapshot::{InputSnapshot, Requests, UnitReport};
use super::unit::{AttachOutcome, UnitLink};
use super::{
    poll_transport, Controller, ControllerKind, ControllerSettings, ConnectionState, FaultRecord,
    Indicator,
};
use crate::error::LinkFault;
use crate::transport::{Axis, Button, Transport, UnitSlot};

const SLOT: UnitSlot = UnitSlot::First;

/// Single-unit controller.
pub struct Gamepad<T: Transport> {
    kind: ControllerKind,
    transport: T,
    settings: ControllerSettings,
    inbox: Rc<AttachInbox>,
    link: UnitLink,
    last_fault: Option<LinkFault>,
    transport_down: bool,
}

impl<T: Transport> std::fmt::Debug for Gamepad<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gamepad")
            .field("kind", &self.kind)
            .field("link", &self.link)
            .field("last_fault", &self.last_fault)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Gamepad<T> {
    /// Creates a disconnected gamepad. Call [`Controller::begin`] before polling.
    pub fn new(kind: ControllerKind, transport: T, settings: ControllerSettings) -> Self {
        Self {
            kind,
            transport,
            settings,
            inbox: Rc::new(AttachInbox::new()),
            link: UnitLink::new(SLOT),
            last_fault: None,
            transport_down: false,
        }
    }

    fn handle_attaches(&mut self, now_ms: u64) {
        for slot in self.inbox.drain() {
            if slot != SLOT {
                debug!("Ignoring attach on {} unit for a single gamepad", slot);
                continue;
            }
            if let AttachOutcome::Rejected(fault) =
                self.link
                    .handle_attach(&mut self.transport, &self.settings.authorized, now_ms)
            {
                self.last_fault = Some(fault);
            }
        }
    }

    fn disconnect_requested(report: &UnitReport) -> bool {
        report.clicked(Button::Ps) && (report.pressed(Button::L2) || report.pressed(Button::R2))
    }
}

impl<T: Transport> Controller for Gamepad<T> {
    fn kind(&self) -> ControllerKind {
        self.kind
    }

    fn begin(&mut self) {
        let sink: Rc<dyn AttachSink> = self.inbox.clone();
        anchor::install(&sink);
        self.transport.set_attach_callback(anchor::dispatch_attach);

        info!("Ready to connect a {}", self.kind);
        debug!(
            "Drive stick: {:?} (dead zone {})",
            self.settings.drive_stick.side(),
            self.settings.drive_stick.deadzone()
        );
        debug!(
            "Dome stick: {:?} (dead zone {})",
            self.settings.dome_stick.side(),
            self.settings.dome_stick.deadzone()
        );
    }

    fn read(&mut self, now_ms: u64, snapshot: &mut InputSnapshot) -> bool {
        if !poll_transport(&mut self.transport, &mut self.transport_down, &mut self.last_fault) {
            snapshot.clear(self.connection_state(), Requests::default());
            return false;
        }
        self.handle_attaches(now_ms);

        if !self.link.is_connected() {
            snapshot.clear(ConnectionState::Disconnected, Requests::default());
            return false;
        }

        self.link.refresh(&self.transport, now_ms);
        if !self.transport.connected(SLOT) || !self.transport.report_valid(SLOT) {
            snapshot.clear(ConnectionState::Connected, Requests::default());
            return false;
        }

        let report = UnitReport::sample(&mut self.transport, SLOT);

        if Self::disconnect_requested(&report) {
            info!("Disconnecting due to user request");
            self.link.force_disconnect(&mut self.transport);
            snapshot.clear(
                ConnectionState::Disconnected,
                Requests {
                    disconnect_requested: true,
                },
            );
            return true;
        }

        let drive = self.settings.drive_stick;
        let (drive_x_axis, drive_y_axis) = drive.side().axes();
        let (drive_x, drive_y) =
            drive.normalize(report.axis(drive_x_axis), report.axis(drive_y_axis));

        let dome = self.settings.dome_stick;
        let (dome_x_axis, dome_y_axis) = dome.side().axes();
        let (dome_x, dome_y) = dome.normalize(report.axis(dome_x_axis), report.axis(dome_y_axis));

        *snapshot = InputSnapshot {
            drive_stick_x: drive_x,
            drive_stick_y: drive_y,
            dome_stick_x: dome_x,
            dome_stick_y: dome_y,
            buttons: report.buttons,
            requests: Requests::default(),
            connection: ConnectionState::Connected,
        };
        true
    }

    fn detect_faults(&mut self, now_ms: u64) -> Option<LinkFault> {
        let fault = self
            .link
            .detect_fault(&mut self.transport, &self.settings.detector, now_ms)?;
        self.last_fault = Some(fault.clone());
        Some(fault)
    }

    fn connection_state(&self) -> ConnectionState {
        if self.link.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    fn set_indicator(&mut self, indicator: Indicator) {
        if self.link.is_connected() {
            self.transport.set_indicator(SLOT, indicator);
        }
    }

    fn button_click(&mut self, button: Button) -> bool {
        self.transport.button_click(SLOT, button)
    }

    fn analog_axis(&self, axis: Axis) -> u8 {
        self.transport.analog_axis(SLOT, axis)
    }

    fn fault_records(&self) -> Vec<(UnitSlot, FaultRecord)> {
        vec![(SLOT, *self.link.faults())]
    }

    fn last_fault(&self) -> Option<&LinkFault> {
        self.last_fault.as_ref()
    }

    fn shutdown(&mut self) {
        anchor::clear();
        self.inbox.discard();
        self.link.force_disconnect(&mut self.transport);
        info!("{} shut down", self.kind);
    }
}
