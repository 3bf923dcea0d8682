//! # ledble
//!
//! `ledble-lib` is a Rust library for controlling cheap Bluetooth LE LED bulbs
//! and strips that speak the "LEDBLE" command family (GATT services `ffd5` or
//! `ffe5`). It finds a bulb by address, connects, negotiates the command
//! characteristic, and hands back a [`Bulb`] that can be switched on and off,
//! colored, dimmed, and set to one of the built-in effects.
//!
//! The radio is reached through the [`Transport`] trait. Enable the `btleplug`
//! feature for the real backend; the [`SimulatedTransport`] is always available
//! for tests and dry runs.
//!
//! ## Example
//!
//! ```no_run
//! # #[cfg(feature = "btleplug")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use ledble_lib::led::effect::Effect;
//! use ledble_lib::util::btle::BtleTransport;
//!
//! let transport = BtleTransport::new().await?;
//! let bulb = ledble_lib::open_bulb(&transport, "e8:eb:11:0f:8a:4c").await?;
//!
//! bulb.set_color(255, 0, 0).await?;
//! bulb.set_effect(Effect::SevenColorCrossFade, 10).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Transport`]: util::traits::Transport
//! [`SimulatedTransport`]: util::simulator::SimulatedTransport

// The `control_interface` module provides the bulb handle and the session that
// opens it: adapter readiness, locating the device, and command writes.
pub mod control_interface;

pub mod config;
pub mod error;

// The `led` module holds the data the bulbs understand: named colors and the
// effect registry.
pub mod led;

pub mod message;

// The `util` module provides the transport seam and the steps of a session:
// adapter readiness, discovery, capability negotiation, and the backends.
pub mod util;

pub use config::SessionConfig;
pub use control_interface::{open_bulb, Bulb};
pub use error::{Error, Result, TransportError};
