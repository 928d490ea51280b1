//! Library crate for fleetcheck exposing reusable modules.
pub mod checker;
pub mod hosts;
pub mod prober;
pub mod types;
