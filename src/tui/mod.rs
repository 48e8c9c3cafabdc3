//! Terminal front panel for the TD4.
//!
//! Provides an interactive panel with:
//! - LED row for the output port pulse
//! - Register and carry view
//! - ROM listing with the current PC
//! - Start/stop/step/reset controls

mod app;
mod ui;

pub use app::{PanelApp, run_panel};
