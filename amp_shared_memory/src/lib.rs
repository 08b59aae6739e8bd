//! # AMP Shared Memory (host side)
//!
//! Maps the coprocessor's tightly-coupled memory into the Linux process and
//! writes LED commands into the shared region defined by
//! [`amp::shm::layout`].
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐   /dev/mem (O_SYNC)   ┌──────────────────────────┐
//! │   LedWriter     │ ────────────────────► │ BTCM window @ 0x79020000 │
//! │  set_led()      │   aligned u32 stores  │  +0x7000: shared region  │
//! │  reset_leds()   │                       │  [msg|delay|init|c0..c7] │
//! └─────────────────┘                       └────────────┬─────────────┘
//!                                                        │ polled per frame
//!                                               ┌────────▼─────────┐
//!                                               │ coprocessor LED  │
//!                                               │ bit-bang driver  │
//!                                               └──────────────────┘
//! ```
//!
//! There is no lock between the cores. Every color word is a single aligned
//! 32-bit store, so the coprocessor observes either the old or the new value;
//! which of two rapid writes it sees is unspecified.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use amp::hal::config::SharedMemoryConfig;
//! use amp::led::ColorWord;
//! use amp_shared_memory::LedWriter;
//!
//! # fn main() -> Result<(), amp_shared_memory::ShmError> {
//! let writer = LedWriter::open(&SharedMemoryConfig::default())?;
//! writer.set_led(3, ColorWord::RED_BRIGHT)?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod mapping;
pub mod platform;
pub mod reader;
pub mod scanner;
pub mod writer;

pub use error::{ShmError, ShmResult};
pub use mapping::PhysicalMapping;
pub use reader::{RegionReader, RegionSnapshot};
pub use scanner::Scanner;
pub use writer::{LedWriter, STARTUP_MESSAGE};

/// Initialize tracing for tools built on this crate
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
