//! # evdev Transport
//!
//! Linux host transport over the evdev interface.
//!
//! ## Controller Detection
//!
//! Controllers are identified by vendor and product ID:
//!
//! | Family | Vendor | Product |
//! |--------|--------|---------|
//! | PS3 navigation | 0x054c | 0x042f |
//! | DualShock 3 | 0x054c | 0x0268 |
//! | DualShock 4 | 0x054c | 0x05c4, 0x09cc |
//! | DualSense | 0x054c | 0x0ce6 |
//!
//! `/dev/input/event*` is rescanned while a slot is free, lowest node number
//! first. Only nodes with gamepad buttons count, which skips the motion sensor
//! and touchpad nodes that DS4 and DualSense expose under the same ids. Every
//! newly opened controller takes the first free slot and fires the attach
//! callback.
//!
//! ## State
//!
//! Button and axis state is queried with `EVIOCGKEY`/`EVIOCGABS` on every poll,
//! so a poll never blocks on the event queue. A failed query marks the report
//! invalid; a vanished device node frees the slot. Clicks are rising edges
//! between polls.
//!
//! ## Identity
//!
//! The evdev unique name, which the kernel HID drivers fill with the
//! controller's Bluetooth MAC address.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use evdev::{AbsoluteAxisType, AttributeSet, AttributeSetRef, Device, Key};
use tracing::{debug, info, trace};

use super::{AttachCallback, Axis, Button, Transport, TransportError, UnitSlot, AXIS_CENTER};
use crate::config::TransportConfig;
use crate::controller::indicator::Indicator;
use crate::controller::ControllerKind;

/// Sony vendor ID
const SONY_VENDOR_ID: u16 = 0x054c;

/// Product IDs per controller family
const PS3_NAV_PRODUCT_IDS: &[u16] = &[0x042f];
const PS3_PRODUCT_IDS: &[u16] = &[0x0268];
const PS4_PRODUCT_IDS: &[u16] = &[0x05c4, 0x09cc];
const PS5_PRODUCT_IDS: &[u16] = &[0x0ce6];

/// Button to evdev key codes. D-pad buttons also arrive as hat axes on some
/// drivers; see [`hat_pressed`].
const KEY_MAP: [(Button, Key); Button::COUNT] = [
    (Button::Up, Key::BTN_DPAD_UP),
    (Button::Right, Key::BTN_DPAD_RIGHT),
    (Button::Down, Key::BTN_DPAD_DOWN),
    (Button::Left, Key::BTN_DPAD_LEFT),
    (Button::Triangle, Key::BTN_NORTH),
    (Button::Circle, Key::BTN_EAST),
    (Button::Cross, Key::BTN_SOUTH),
    (Button::Square, Key::BTN_WEST),
    (Button::L1, Key::BTN_TL),
    (Button::L2, Key::BTN_TL2),
    (Button::L3, Key::BTN_THUMBL),
    (Button::R1, Key::BTN_TR),
    (Button::R2, Key::BTN_TR2),
    (Button::R3, Key::BTN_THUMBR),
    (Button::Share, Key::BTN_SELECT),
    (Button::Options, Key::BTN_START),
    (Button::Ps, Key::BTN_MODE),
];

/// Axis to evdev absolute axis codes (hid-sony and hid-playstation layout).
const AXIS_MAP: [(Axis, AbsoluteAxisType); Axis::COUNT] = [
    (Axis::LeftX, AbsoluteAxisType::ABS_X),
    (Axis::LeftY, AbsoluteAxisType::ABS_Y),
    (Axis::RightX, AbsoluteAxisType::ABS_RX),
    (Axis::RightY, AbsoluteAxisType::ABS_RY),
    (Axis::L2, AbsoluteAxisType::ABS_Z),
    (Axis::R2, AbsoluteAxisType::ABS_RZ),
];

/// Vendor and product IDs accepted for `kind`, honouring configured overrides.
#[must_use]
pub fn device_ids(kind: ControllerKind, config: &TransportConfig) -> Vec<(u16, u16)> {
    let vendor = config.vendor_id.unwrap_or(SONY_VENDOR_ID);
    if let Some(product) = config.product_id {
        return vec![(vendor, product)];
    }
    let products = match kind {
        ControllerKind::Ps3Nav => PS3_NAV_PRODUCT_IDS,
        ControllerKind::Ps3 => PS3_PRODUCT_IDS,
        ControllerKind::Ps4 => PS4_PRODUCT_IDS,
        ControllerKind::Ps5 => PS5_PRODUCT_IDS,
    };
    products.iter().map(|p| (vendor, *p)).collect()
}

/// Whether a D-pad direction is pressed on the hat axes.
fn hat_pressed(button: Button, hat_x: i32, hat_y: i32) -> bool {
    match button {
        Button::Up => hat_y < 0,
        Button::Down => hat_y > 0,
        Button::Left => hat_x < 0,
        Button::Right => hat_x > 0,
        _ => false,
    }
}

/// Whether a device exposes gamepad face buttons. Motion sensor and touchpad
/// nodes of the same controller share its vendor and product ids but not this.
fn is_gamepad(keys: &AttributeSetRef<Key>) -> bool {
    keys.contains(Key::BTN_SOUTH)
}

/// Number of an `eventN` node, used to order nodes numerically.
fn event_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// Clamps a raw absolute value into the 0-255 report range.
fn clamp_axis(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// One opened controller.
struct OpenUnit {
    device: Device,
    path: PathBuf,
    pressed: [bool; Button::COUNT],
    clicks: [bool; Button::COUNT],
    axes: [u8; Axis::COUNT],
    report_valid: bool,
}

impl OpenUnit {
    fn new(device: Device, path: PathBuf) -> Self {
        let mut axes = [AXIS_CENTER; Axis::COUNT];
        axes[Axis::L2.index()] = 0;
        axes[Axis::R2.index()] = 0;
        Self {
            device,
            path,
            pressed: [false; Button::COUNT],
            clicks: [false; Button::COUNT],
            axes,
            report_valid: true,
        }
    }

    /// Queries the kernel for current state.
    fn refresh(&mut self) -> io::Result<()> {
        let keys: AttributeSet<Key> = self.device.get_key_state()?;
        let abs = self.device.get_abs_state()?;

        let hat_x = abs[AbsoluteAxisType::ABS_HAT0X.0 as usize].value;
        let hat_y = abs[AbsoluteAxisType::ABS_HAT0Y.0 as usize].value;
        for (button, key) in KEY_MAP {
            let i = button.index();
            let now = keys.contains(key) || hat_pressed(button, hat_x, hat_y);
            if now && !self.pressed[i] {
                self.clicks[i] = true;
            }
            self.pressed[i] = now;
        }
        for (axis, code) in AXIS_MAP {
            self.axes[axis.index()] = clamp_axis(abs[code.0 as usize].value);
        }
        Ok(())
    }
}

/// evdev-backed transport.
pub struct EvdevTransport {
    kind: ControllerKind,
    ids: Vec<(u16, u16)>,
    input_dir: PathBuf,
    rescan_interval: Duration,
    last_scan: Option<Instant>,
    slots: [Option<OpenUnit>; 2],
    released: HashSet<PathBuf>,
    callback: Option<AttachCallback>,
}

impl std::fmt::Debug for EvdevTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevTransport")
            .field("kind", &self.kind)
            .field("input_dir", &self.input_dir)
            .field(
                "slots",
                &self
                    .slots
                    .iter()
                    .map(|s| s.as_ref().map(|u| u.path.display().to_string()))
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl EvdevTransport {
    /// Creates a transport for `kind`. Devices are opened on poll.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use astro_controller::config::TransportConfig;
    /// use astro_controller::controller::ControllerKind;
    /// use astro_controller::transport::evdev::EvdevTransport;
    /// use astro_controller::transport::Transport;
    ///
    /// let mut transport = EvdevTransport::new(ControllerKind::Ps4, &TransportConfig::default());
    /// transport.poll()?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn new(kind: ControllerKind, config: &TransportConfig) -> Self {
        Self {
            kind,
            ids: device_ids(kind, config),
            input_dir: PathBuf::from(&config.input_dir),
            rescan_interval: Duration::from_millis(config.rescan_interval_ms),
            last_scan: None,
            slots: [None, None],
            released: HashSet::new(),
            callback: None,
        }
    }

    fn slot_count(&self) -> usize {
        self.kind.unit_count()
    }

    fn unit(&self, slot: UnitSlot) -> Option<&OpenUnit> {
        self.slots.get(slot.index()).and_then(Option::as_ref)
    }

    fn free_slot(&self) -> Option<UnitSlot> {
        UnitSlot::ALL
            .into_iter()
            .take(self.slot_count())
            .find(|s| self.slots[s.index()].is_none())
    }

    fn in_use(&self, path: &Path) -> bool {
        self.slots.iter().flatten().any(|u| u.path == path)
    }

    /// Refreshes every open unit, freeing slots whose device vanished.
    fn refresh_units(&mut self) {
        for slot in UnitSlot::ALL {
            let Some(unit) = self.slots[slot.index()].as_mut() else {
                continue;
            };
            match unit.refresh() {
                Ok(()) => unit.report_valid = true,
                Err(e) if !unit.path.exists() => {
                    info!("Controller on {} unit removed ({})", slot, e);
                    self.slots[slot.index()] = None;
                }
                Err(e) => {
                    trace!("Bad report from {}: {}", unit.path.display(), e);
                    unit.report_valid = false;
                }
            }
        }
    }

    /// Opens newly appeared controllers. Returns the slots that were filled.
    fn scan(&mut self) -> Result<Vec<UnitSlot>, TransportError> {
        let mut entries: Vec<(u32, PathBuf)> = std::fs::read_dir(&self.input_dir)
            .map_err(|e| {
                TransportError(format!("Failed to read {}: {}", self.input_dir.display(), e))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| event_number(&path).map(|n| (n, path)))
            .collect();

        // Lowest node first, so event9 is tried before event10
        entries.sort();
        self.released.retain(|p| p.exists());

        let mut attached = Vec::new();
        for (_, path) in entries {
            let Some(slot) = self.free_slot() else {
                break;
            };

            if self.in_use(&path) || self.released.contains(&path) {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    let id = device.input_id();
                    trace!(
                        "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                        path.display(),
                        id.vendor(),
                        id.product()
                    );
                    if !self.ids.contains(&(id.vendor(), id.product())) {
                        continue;
                    }
                    if !device.supported_keys().map_or(false, is_gamepad) {
                        trace!("Skipping {}: no gamepad buttons", path.display());
                        continue;
                    }
                    info!("Found {} at {} ({} unit)", self.kind, path.display(), slot);
                    let mut unit = OpenUnit::new(device, path);
                    unit.report_valid = unit.refresh().is_ok();
                    self.slots[slot.index()] = Some(unit);
                    attached.push(slot);
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    trace!("Could not open {}: {}", path.display(), e);
                }
            }
        }
        Ok(attached)
    }
}

impl Transport for EvdevTransport {
    fn poll(&mut self) -> Result<(), TransportError> {
        if !self.input_dir.exists() {
            return Err(TransportError(format!(
                "{} directory not found",
                self.input_dir.display()
            )));
        }

        self.refresh_units();

        let scan_due = self
            .last_scan
            .map_or(true, |t| t.elapsed() >= self.rescan_interval);
        if self.free_slot().is_some() && scan_due {
            self.last_scan = Some(Instant::now());
            let attached = self.scan()?;
            if let Some(callback) = self.callback {
                for slot in attached {
                    callback(slot);
                }
            }
        }
        Ok(())
    }

    fn set_attach_callback(&mut self, callback: AttachCallback) {
        self.callback = Some(callback);
    }

    fn connected(&self, slot: UnitSlot) -> bool {
        self.unit(slot).is_some()
    }

    fn report_valid(&self, slot: UnitSlot) -> bool {
        self.unit(slot).map_or(false, |u| u.report_valid)
    }

    fn device_id(&self, slot: UnitSlot) -> Option<String> {
        self.unit(slot)
            .and_then(|u| u.device.unique_name())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    fn button_press(&self, slot: UnitSlot, button: Button) -> bool {
        self.unit(slot).map_or(false, |u| u.pressed[button.index()])
    }

    fn button_click(&mut self, slot: UnitSlot, button: Button) -> bool {
        match self.slots[slot.index()].as_mut() {
            Some(unit) => std::mem::take(&mut unit.clicks[button.index()]),
            None => false,
        }
    }

    fn analog_axis(&self, slot: UnitSlot, axis: Axis) -> u8 {
        match self.unit(slot) {
            Some(unit) => unit.axes[axis.index()],
            None if matches!(axis, Axis::L2 | Axis::R2) => 0,
            None => AXIS_CENTER,
        }
    }

    fn set_indicator(&mut self, slot: UnitSlot, indicator: Indicator) {
        // Light bar colours are driven outside evdev
        debug!("Indicator on {} unit: {:?}", slot, indicator);
    }

    fn disconnect(&mut self, slot: UnitSlot) {
        if let Some(unit) = self.slots[slot.index()].take() {
            debug!("Releasing {} ({} unit)", unit.path.display(), slot);
            self.released.insert(unit.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TransportConfig {
        TransportConfig::default()
    }

    #[test]
    fn test_sony_vendor_id() {
        assert_eq!(SONY_VENDOR_ID, 0x054c, "Sony vendor ID should be 0x054c");
    }

    #[test]
    fn test_device_ids_per_family() {
        assert_eq!(
            device_ids(ControllerKind::Ps3Nav, &config()),
            vec![(0x054c, 0x042f)]
        );
        assert_eq!(
            device_ids(ControllerKind::Ps4, &config()),
            vec![(0x054c, 0x05c4), (0x054c, 0x09cc)]
        );
        assert_eq!(
            device_ids(ControllerKind::Ps5, &config()),
            vec![(0x054c, 0x0ce6)]
        );
    }

    #[test]
    fn test_device_id_override() {
        let mut config = config();
        config.vendor_id = Some(0x1234);
        config.product_id = Some(0x5678);
        assert_eq!(device_ids(ControllerKind::Ps3, &config), vec![(0x1234, 0x5678)]);
    }

    #[test]
    fn test_key_map_covers_every_button_in_order() {
        for (i, (button, _)) in KEY_MAP.iter().enumerate() {
            assert_eq!(button.index(), i);
        }
    }

    #[test]
    fn test_hat_directions() {
        assert!(hat_pressed(Button::Up, 0, -1));
        assert!(hat_pressed(Button::Right, 1, 0));
        assert!(!hat_pressed(Button::Down, 0, -1));
        assert!(!hat_pressed(Button::Cross, 1, 1));
    }

    #[test]
    fn test_gamepad_filter() {
        let mut pad = AttributeSet::<Key>::new();
        pad.insert(Key::BTN_SOUTH);
        pad.insert(Key::BTN_MODE);
        assert!(is_gamepad(&pad));

        // Touchpad node of the same controller
        let mut touchpad = AttributeSet::<Key>::new();
        touchpad.insert(Key::BTN_LEFT);
        touchpad.insert(Key::BTN_TOUCH);
        assert!(!is_gamepad(&touchpad));

        // Motion sensor node: no keys at all
        assert!(!is_gamepad(&AttributeSet::<Key>::new()));
    }

    #[test]
    fn test_event_nodes_order_numerically() {
        assert_eq!(event_number(Path::new("/dev/input/event9")), Some(9));
        assert_eq!(event_number(Path::new("/dev/input/event10")), Some(10));
        assert_eq!(event_number(Path::new("/dev/input/js0")), None);
        assert_eq!(event_number(Path::new("/dev/input/by-id")), None);

        let mut nodes: Vec<(u32, PathBuf)> = ["event10", "event9", "event2"]
            .iter()
            .map(|n| PathBuf::from("/dev/input").join(n))
            .filter_map(|p| event_number(&p).map(|n| (n, p)))
            .collect();
        nodes.sort();
        let order: Vec<u32> = nodes.iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec![2, 9, 10]);
    }

    #[test]
    fn test_clamp_axis() {
        assert_eq!(clamp_axis(-5), 0);
        assert_eq!(clamp_axis(128), 128);
        assert_eq!(clamp_axis(1023), 255);
    }

    #[test]
    fn test_missing_input_dir_is_transport_error() {
        let mut config = config();
        config.input_dir = "/nonexistent/input".to_string();
        let mut transport = EvdevTransport::new(ControllerKind::Ps4, &config);
        assert!(transport.poll().is_err());
        assert!(!transport.connected(UnitSlot::First));
    }

    #[test]
    fn test_empty_dir_has_no_units() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.input_dir = dir.path().to_string_lossy().to_string();
        let mut transport = EvdevTransport::new(ControllerKind::Ps3Nav, &config);

        assert!(transport.poll().is_ok());
        assert!(!transport.connected(UnitSlot::First));
        assert!(!transport.report_valid(UnitSlot::Second));
        assert_eq!(transport.analog_axis(UnitSlot::First, Axis::LeftX), AXIS_CENTER);
        assert_eq!(transport.analog_axis(UnitSlot::First, Axis::R2), 0);
        assert!(!transport.button_click(UnitSlot::Second, Button::Ps));
    }

    #[test]
    fn test_gamepad_uses_one_slot() {
        let transport = EvdevTransport::new(ControllerKind::Ps5, &config());
        assert_eq!(transport.slot_count(), 1);
        assert_eq!(transport.free_slot(), Some(UnitSlot::First));
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_attach_with_real_hardware() {
        // This test requires a connected PS4 controller
        let mut transport = EvdevTransport::new(ControllerKind::Ps4, &config());
        transport.poll().expect("Input directory should be readable");
        assert!(transport.connected(UnitSlot::First));
        println!("Controller identity: {:?}", transport.device_id(UnitSlot::First));
    }
}
