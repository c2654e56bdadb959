//! Application-level orchestration.
//!
//! This module owns the controllers once the application is running and executes every
//! load/run request on a blocking worker. UI and CLI layers call into it instead of
//! touching the controllers directly.

mod controller;
mod workers;

pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use workers::Controllers;
