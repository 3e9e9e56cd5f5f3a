//! # Authorization Module
//!
//! Allow-list of controller identities.
//!
//! Identities are Bluetooth MAC addresses. They are compared in normalized form
//! (upper case, `:` separated), so `00:1a:7d:da:71:13` and `00-1A-7D-DA-71-13`
//! name the same device. An empty list accepts every device.

use std::collections::HashSet;

/// Immutable set of authorized device identities.
///
/// # Examples
///
/// ```
/// use astro_controller::controller::auth::AuthorizedDevices;
///
/// let devices = AuthorizedDevices::new(["00:1A:7D:DA:71:13"]);
/// assert!(devices.is_authorized(Some("00:1a:7d:da:71:13")));
/// assert!(!devices.is_authorized(Some("00:1A:7D:DA:71:14")));
///
/// let open = AuthorizedDevices::accept_all();
/// assert!(open.is_authorized(Some("anything")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuthorizedDevices {
    devices: HashSet<String>,
}

impl AuthorizedDevices {
    /// Builds the allow-list from configured identities.
    pub fn new<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            devices: devices
                .into_iter()
                .map(|d| normalize_device_id(d.as_ref()))
                .collect(),
        }
    }

    /// Accept-all policy.
    #[must_use]
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Whether the list is empty (accept-all).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Number of authorized identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Checks a device identity against the list.
    ///
    /// A device without a readable identity only passes the accept-all policy.
    #[must_use]
    pub fn is_authorized(&self, device_id: Option<&str>) -> bool {
        if self.devices.is_empty() {
            return true;
        }
        match device_id {
            Some(id) => self.devices.contains(&normalize_device_id(id)),
            None => false,
        }
    }
}

/// Normalizes a MAC address for comparison.
#[must_use]
pub fn normalize_device_id(id: &str) -> String {
    id.trim().replace('-', ":").to_ascii_uppercase()
}

/// Whether `id` looks like a MAC address (`XX:XX:XX:XX:XX:XX`).
#[must_use]
pub fn is_valid_device_id(id: &str) -> bool {
    let normalized = normalize_device_id(id);
    let parts: Vec<&str> = normalized.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_is_authorized() {
        let devices = AuthorizedDevices::new(["00:1A:7D:DA:71:13", "00:1A:7D:DA:71:14"]);
        assert_eq!(devices.len(), 2);
        assert!(devices.is_authorized(Some("00:1A:7D:DA:71:13")));
        assert!(devices.is_authorized(Some("00:1a:7d:da:71:14")));
    }

    #[test]
    fn test_non_member_is_rejected() {
        let devices = AuthorizedDevices::new(["00:1A:7D:DA:71:13"]);
        assert!(!devices.is_authorized(Some("AA:BB:CC:DD:EE:FF")));
    }

    #[test]
    fn test_missing_identity_rejected_by_non_empty_list() {
        let devices = AuthorizedDevices::new(["00:1A:7D:DA:71:13"]);
        assert!(!devices.is_authorized(None));
    }

    #[test]
    fn test_empty_list_accepts_all() {
        let devices = AuthorizedDevices::accept_all();
        assert!(devices.is_empty());
        assert!(devices.is_authorized(Some("AA:BB:CC:DD:EE:FF")));
        assert!(devices.is_authorized(None));
    }

    #[test]
    fn test_dash_separated_identity_matches() {
        let devices = AuthorizedDevices::new(["00-1a-7d-da-71-13"]);
        assert!(devices.is_authorized(Some("00:1A:7D:DA:71:13")));
    }

    #[test]
    fn test_device_id_format() {
        assert!(is_valid_device_id("00:1A:7D:DA:71:13"));
        assert!(is_valid_device_id("00-1a-7d-da-71-13"));
        assert!(!is_valid_device_id("00:1A:7D:DA:71"));
        assert!(!is_valid_device_id("00:1A:7D:DA:71:ZZ"));
        assert!(!is_valid_device_id(""));
    }
}
