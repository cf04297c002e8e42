//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `quillcast` application.
//!
//! It centralizes the error types shared by the presence core and the
//! transport, and the logging bootstrap used by the binary.

pub mod error;
pub mod logging;
