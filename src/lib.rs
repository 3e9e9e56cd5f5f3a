//! # Astro Controller Library
//!
//! Controller connection lifecycle for an astromech droid.
//!
//! This library attaches PlayStation controllers (a pair of PS3 navigation
//! units, or a single PS3/PS4/PS5 gamepad), authorizes them against an
//! allow-list, watches each link for faults, and turns whatever is connected
//! into one neutral-safe [`controller::InputSnapshot`] per tick.

pub mod config;
pub mod controller;
pub mod error;
pub mod transport;
