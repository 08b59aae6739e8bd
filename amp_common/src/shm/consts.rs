//! SHM (Shared Memory) constants.
//!
//! These constants describe where the shared window lives in each core's
//! address space. They are the single source of truth - the host mapping code
//! and the coprocessor firmware both import from here.

/// Physical address of the coprocessor BTCM as seen from the application core.
///
/// The shared region lives inside this window.
pub const BTCM_PHYS_ADDR: u64 = 0x7902_0000;

/// Length of the mapped TCM window in bytes.
pub const WINDOW_LEN: usize = 0x8000;

/// Base address of the BTCM in the coprocessor's own address space.
pub const COPROCESSOR_BTCM_BASE: usize = 0x0000_0000;

/// Offset of the shared region from the start of the TCM window.
///
/// The lower part of the BTCM is used by the coprocessor image itself.
pub const REGION_OFFSET: usize = 0x7000;

/// Default physical memory device used by the host to map the window.
pub const DEFAULT_MEM_DEVICE: &str = "/dev/mem";

/// `init_flag` value while the host is (re)writing the region.
pub const HAL_UNINITIALIZED: u32 = 0x0000_0000;

/// `init_flag` value once the host has written a complete initial frame.
pub const HAL_INITIALIZED: u32 = 0x0000_0001;

/// Frame delay the host writes at start-up, in milliseconds.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 50;

/// Upper bound the coprocessor applies to the host-provided frame delay.
pub const MAX_FRAME_DELAY_MS: u32 = 1000;

/// Page size used to validate the mapped window.
pub const PAGE_SIZE: usize = 4096;
