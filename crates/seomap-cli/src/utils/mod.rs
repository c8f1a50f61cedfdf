//! Helpers shared across commands.

pub mod logging;
