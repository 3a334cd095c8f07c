//! Common utilities module
//!
//! This module contains shared utilities used across the correction engine.

pub mod error;

pub use error::{CorrectionError, ErrorKind, Result};
