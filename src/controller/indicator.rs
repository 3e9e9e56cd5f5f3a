//! # Indicator Module
//!
//! Indicator colours shown on the controller's light bar.
//!
//! The indicator is cosmetic. The only lifecycle rule is that it is turned
//! [`Indicator::Off`] whenever a unit is disconnected.

/// Light bar colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Off,
    Red,
    Yellow,
    Green,
    Blue,
    Purple,
}

/// Drive speed profile selected by the drive logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedProfile {
    Walk,
    Jog,
    Run,
    Sprint,
}

impl Indicator {
    /// Colour for the current drive state.
    ///
    /// Red while drive is disabled, otherwise one colour per speed profile.
    ///
    /// # Examples
    ///
    /// ```
    /// use astro_controller::controller::indicator::{Indicator, SpeedProfile};
    ///
    /// assert_eq!(Indicator::for_drive(false, SpeedProfile::Sprint), Indicator::Red);
    /// assert_eq!(Indicator::for_drive(true, SpeedProfile::Walk), Indicator::Yellow);
    /// ```
    #[must_use]
    pub fn for_drive(drive_enabled: bool, profile: SpeedProfile) -> Self {
        if !drive_enabled {
            return Indicator::Red;
        }
        match profile {
            SpeedProfile::Walk => Indicator::Yellow,
            SpeedProfile::Jog => Indicator::Green,
            SpeedProfile::Run => Indicator::Blue,
            SpeedProfile::Sprint => Indicator::Purple,
        }
    }
}
