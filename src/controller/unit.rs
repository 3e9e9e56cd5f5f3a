//! # Unit Link Module
//!
//! Connection sub-state machine for one physical unit.
//!
//! A [`UnitLink`] is either disconnected or connected. It moves to connected
//! only through an authorized attach, and back to disconnected through a forced
//! disconnect (operator chord, critical fault, ambiguous pairing) or an attach
//! notification for a unit the transport no longer sees.
//!
//! Every path into disconnected turns the unit's indicator off and drops it at
//! the transport level.

use tracing::{debug, info, warn};

use super::auth::{normalize_device_id, AuthorizedDevices};
use super::fault::{FaultDetector, FaultRecord};
use super::indicator::Indicator;
use crate::error::LinkFault;
use crate::transport::{Transport, UnitSlot};

/// Result of handling one attach notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The unit is now connected.
    Connected,
    /// The unit was already connected; nothing changed.
    Duplicate,
    /// The allow-list rejected the unit.
    Rejected(LinkFault),
    /// The transport no longer reports the unit; it was dropped.
    Invalid,
}

/// One physical unit's link state and fault record.
#[derive(Debug, Clone)]
pub struct UnitLink {
    slot: UnitSlot,
    connected: bool,
    device_id: Option<String>,
    faults: FaultRecord,
}

impl UnitLink {
    #[must_use]
    pub fn new(slot: UnitSlot) -> Self {
        Self {
            slot,
            connected: false,
            device_id: None,
            faults: FaultRecord::default(),
        }
    }

    #[must_use]
    pub fn slot(&self) -> UnitSlot {
        self.slot
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Identity captured at connect time.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    #[must_use]
    pub fn faults(&self) -> &FaultRecord {
        &self.faults
    }

    /// Handles an attach notification for this unit.
    ///
    /// Repeat notifications for the unit that is already connected are ignored:
    /// the transport may report one physical connection more than once. A
    /// different device in the slot replaces the old link and goes through
    /// authorization like any new attach.
    pub fn handle_attach<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        authorized: &AuthorizedDevices,
        now_ms: u64,
    ) -> AttachOutcome {
        if !transport.connected(self.slot) {
            warn!("Attach on {} unit but the controller is gone", self.slot);
            self.drop_link(transport);
            return AttachOutcome::Invalid;
        }

        let device_id = transport.device_id(self.slot);
        if self.connected {
            if self.same_device(device_id.as_deref()) {
                debug!("Ignoring repeated attach on {} unit", self.slot);
                return AttachOutcome::Duplicate;
            }
            warn!(
                "{} unit replaced by {} while connected",
                self.slot,
                device_id.as_deref().unwrap_or("<unknown>")
            );
            self.faults.on_fault();
            self.connected = false;
            self.device_id = None;
        }

        if !authorized.is_authorized(device_id.as_deref()) {
            let fault = LinkFault::UnauthorizedDevice {
                slot: self.slot,
                device: device_id.unwrap_or_else(|| "<unknown>".to_string()),
            };
            warn!("{}", fault);
            transport.set_indicator(self.slot, Indicator::Off);
            transport.disconnect(self.slot);
            return AttachOutcome::Rejected(fault);
        }

        self.connected = true;
        self.faults.on_connect(now_ms);
        info!(
            "Controller connected on {} unit ({})",
            self.slot,
            device_id.as_deref().unwrap_or("no identity")
        );
        self.device_id = device_id;
        AttachOutcome::Connected
    }

    /// Refreshes the fault record from this tick's transport state.
    ///
    /// Only a present unit with a valid report counts as a read.
    pub fn refresh<T: Transport + ?Sized>(&mut self, transport: &T, now_ms: u64) {
        if !self.connected || !transport.connected(self.slot) {
            return;
        }
        if transport.report_valid(self.slot) {
            self.faults.record_read(now_ms);
        } else {
            self.faults.record_bad_data();
            debug!(
                "Bad report on {} unit ({} in a row)",
                self.slot, self.faults.bad_data_count
            );
        }
    }

    /// Runs the fault detector. On a fault the unit is disconnected and the
    /// fault returned.
    pub fn detect_fault<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        detector: &FaultDetector,
        now_ms: u64,
    ) -> Option<LinkFault> {
        if !self.connected {
            return None;
        }
        let reason = detector.evaluate(&self.faults, now_ms)?;
        let fault = LinkFault::CriticalFault {
            slot: self.slot,
            reason,
        };
        warn!("{}", fault);
        self.faults.on_fault();
        self.drop_link(transport);
        Some(fault)
    }

    /// Disconnects the unit if it is connected. Returns whether anything changed.
    pub fn force_disconnect<T: Transport + ?Sized>(&mut self, transport: &mut T) -> bool {
        if !self.connected {
            return false;
        }
        self.drop_link(transport);
        true
    }

    fn same_device(&self, device_id: Option<&str>) -> bool {
        self.device_id.as_deref().map(normalize_device_id) == device_id.map(normalize_device_id)
    }

    fn drop_link<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        transport.set_indicator(self.slot, Indicator::Off);
        transport.disconnect(self.slot);
        if self.connected {
            info!("Controller disconnected on {} unit", self.slot);
        }
        self.connected = false;
        self.device_id = None;
    }
}
