//! Shared memory subsystem.
//!
//! This module contains:
//! - `consts`: Physical window addresses and handshake values.
//! - `layout`: The declarative field list both cores compute offsets from.
//! - `region`: Volatile, alignment-checked accessors over a mapped region.

pub mod consts;
pub mod layout;
pub mod region;
