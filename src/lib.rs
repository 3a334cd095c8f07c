//! Sticky-pixel memory-effect correction for sCMOS time-lapse volumes.
//!
//! The [`memory_correction`] module holds the correction engine; [`logger`]
//! wires up `tracing` output for the binary and benches.

pub mod logger;
pub mod memory_correction;
