//! Host-side input layer types.
//!
//! This module contains:
//! - `config`: `amp.toml` schema for the shared window, the rotary encoder and buttons.
//! - `consts`: Board wiring defaults and service names.
//! - `edge`: Edge events as delivered by the kernel (or a simulated source).
//! - `error`: `HalError`, the environment-fatal error type of the input layer.

pub mod config;
pub mod consts;
pub mod edge;
pub mod error;
