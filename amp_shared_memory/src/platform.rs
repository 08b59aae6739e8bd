//! Platform-specific memory mapping

pub mod linux;

pub use linux::{map_physical, system_page_size};
