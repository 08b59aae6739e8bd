//! AMP Common Library
//!
//! Single source of truth shared by the application core (Linux host) and
//! the real-time coprocessor. Both programs are built from this crate, so the
//! shared-memory layout they agree on cannot drift apart.
//!
//! # Module Structure
//!
//! - [`shm`] - Shared region layout, physical addresses and volatile accessors
//! - [`led`] - LED string constants and color words
//! - [`config`] - Configuration loading traits and types (`std` only)
//! - [`hal`] - Host-side input configuration, edge events and errors (`std` only)
//! - [`prelude`] - Common re-exports for convenience (`std` only)
//!
//! # Usage
//!
//! Host crates use the default `std` feature. The coprocessor firmware depends
//! on the crate with `default-features = false`, which leaves only the
//! `no_std` layout and LED modules:
//!
//! ```toml
//! [dependencies]
//! amp = { package = "amp_common", path = "../amp_common", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

pub mod led;
pub mod shm;

#[cfg(feature = "std")]
pub mod config;
#[cfg(feature = "std")]
pub mod hal;
#[cfg(feature = "std")]
pub mod prelude;
