#[cfg(feature = "desktop")]
pub mod commands;
pub mod controller;
pub mod state;

pub use controller::{KioskController, ScanConfig, ScanController};
pub use state::{KioskState, ScanSnapshot};
