//! Owned mapping of the shared window

use crate::error::{ShmError, ShmResult};
use crate::platform::map_physical;
use amp::hal::config::SharedMemoryConfig;
use amp::shm::layout::{REGION_END, WORD_SIZE};
use amp::shm::region::SharedRegion;
use memmap2::MmapMut;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The physical window mapped into this process, plus a view of the shared
/// region inside it.
///
/// [`PhysicalMapping::region`] lends the view out by reference only, so the
/// borrow checker refuses any use of it after the window is unmapped:
///
/// ```compile_fail
/// fn stale(mapping: amp_shared_memory::PhysicalMapping) {
///     let region = mapping.region();
///     let _ = mapping.close();
///     region.set_init_flag(0);
/// }
/// ```
pub struct PhysicalMapping {
    mmap: MmapMut,
    region: SharedRegion,
    device: PathBuf,
    phys_addr: u64,
    region_offset: usize,
}

impl std::fmt::Debug for PhysicalMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalMapping")
            .field("device", &self.device)
            .field("phys_addr", &format_args!("{:#x}", self.phys_addr))
            .field("window_len", &self.mmap.len())
            .field("region_offset", &format_args!("{:#x}", self.region_offset))
            .finish()
    }
}

impl PhysicalMapping {
    /// Map the window described by `config`.
    pub fn open(config: &SharedMemoryConfig) -> ShmResult<Self> {
        Self::open_at(
            &config.device,
            config.phys_addr,
            config.window_len,
            config.region_offset,
        )
    }

    /// Map `window_len` bytes of `device` at `phys_addr`, with the shared
    /// region starting `region_offset` bytes into the window.
    pub fn open_at(
        device: &Path,
        phys_addr: u64,
        window_len: usize,
        region_offset: usize,
    ) -> ShmResult<Self> {
        if region_offset % WORD_SIZE != 0 {
            return Err(ShmError::AlignmentError {
                address: region_offset as u64,
                alignment: WORD_SIZE,
            });
        }
        if region_offset + REGION_END > window_len {
            return Err(ShmError::RegionOutOfBounds {
                offset: region_offset,
                required: REGION_END,
                window: window_len,
            });
        }

        let mut mmap = map_physical(device, phys_addr, window_len)?;

        // SAFETY: the offset was bounds-checked above; the mmap base is page
        // aligned so `base + region_offset` is word aligned, and the pointer
        // stays valid for as long as `mmap` is owned by `self`.
        let region = unsafe {
            SharedRegion::from_raw(
                mmap.as_mut_ptr().add(region_offset),
                window_len - region_offset,
            )
        };

        info!(
            device = %device.display(),
            phys_addr = format_args!("{phys_addr:#x}"),
            region_offset = format_args!("{region_offset:#x}"),
            "Shared region mapped"
        );

        Ok(Self {
            mmap,
            region,
            device: device.to_path_buf(),
            phys_addr,
            region_offset,
        })
    }

    /// View of the shared region, valid while the mapping is borrowed.
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    /// Length of the whole mapped window.
    pub fn window_len(&self) -> usize {
        self.mmap.len()
    }

    /// Memory device backing the mapping.
    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Flush and release the mapping.
    pub fn close(self) -> ShmResult<()> {
        self.mmap.flush()?;
        debug!(device = %self.device.display(), "Shared region unmapped");
        Ok(())
    }
}
