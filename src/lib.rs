//! Hotspot activation scheduling for interactive exhibits.
//!
//! A sensor layer reports presses and releases of physical hotspots. The
//! [`HotspotActivationScheduler`] decides which single hotspot is activated once it has been
//! pressed for the configured dwell time, tolerating brief releases and rapid switching, and
//! publishes [`HotspotEvent`]s for the presentation layer.

pub mod activation;
pub mod app;
pub mod board;
pub mod config;
pub mod error;
pub mod models;
pub mod sensor;

pub use activation::HotspotActivationScheduler;
pub use models::{HotspotEvent, HotspotId, HotspotState};
