//! Simulated browser used as the default driver
//!
//! Pages and their dynamic behaviour come from a YAML site fixture. Time is
//! tokio time, so scenarios against a simulated site run deterministically
//! under a paused clock.

pub mod browser;
pub mod site;

pub use browser::{SimulatedBrowser, SimulatedBrowserFactory};
pub use site::Site;
