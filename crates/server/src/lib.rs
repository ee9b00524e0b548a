//! HTTP surface and process wiring for the Sentinel pipeline daemon.

pub mod api;
pub mod metrics;
pub mod state;
