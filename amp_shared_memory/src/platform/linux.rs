//! Linux physical memory mapping
//!
//! The coprocessor TCM is reachable from Linux only through the physical
//! memory device. It is opened with `O_SYNC` so the kernel maps it uncached,
//! which keeps every store visible to the other core without extra flushing.

use crate::error::{ShmError, ShmResult};
use amp::shm::consts::PAGE_SIZE;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::debug;

/// Page size reported by the kernel, falling back to 4 KiB.
pub fn system_page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { PAGE_SIZE }
}

/// Map `len` bytes of `device` starting at physical address `phys_addr`.
///
/// `device` is normally `/dev/mem`; any file large enough works, which is
/// how tests exercise this path.
pub fn map_physical(device: &Path, phys_addr: u64, len: usize) -> ShmResult<MmapMut> {
    let page = system_page_size();
    if phys_addr % page as u64 != 0 {
        return Err(ShmError::AlignmentError {
            address: phys_addr,
            alignment: page,
        });
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_SYNC)
        .open(device)
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ShmError::DeviceNotFound {
                path: device.to_path_buf(),
            },
            ErrorKind::PermissionDenied => ShmError::PermissionDenied {
                path: device.to_path_buf(),
            },
            _ => ShmError::Io { source: e },
        })?;

    // SAFETY: the coprocessor writes this memory concurrently; all
    // access goes through `SharedRegion`'s volatile accessors.
    let mmap = unsafe {
        MmapOptions::new()
            .offset(phys_addr)
            .len(len)
            .populate()
            .map_mut(&file)?
    };

    debug!(
        device = %device.display(),
        phys_addr = format_args!("{phys_addr:#x}"),
        len,
        "Mapped physical window"
    );

    Ok(mmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(system_page_size().is_power_of_two());
    }

    #[test]
    fn test_missing_device() {
        let err = map_physical(Path::new("/nonexistent/mem"), 0, 4096).unwrap_err();
        assert!(matches!(err, ShmError::DeviceNotFound { .. }));
    }

    #[test]
    fn test_unaligned_address_rejected() {
        let file = NamedTempFile::new().unwrap();
        let err = map_physical(file.path(), 12, 4096).unwrap_err();
        assert!(matches!(err, ShmError::AlignmentError { address: 12, .. }));
    }

    #[test]
    fn test_file_backed_window_at_offset() {
        let file = NamedTempFile::new().unwrap();
        let page = system_page_size();
        file.as_file().set_len((page * 3) as u64).unwrap();

        let mut first = map_physical(file.path(), page as u64, page).unwrap();
        first[0] = 0x5A;
        first.flush().unwrap();

        let second = map_physical(file.path(), page as u64, page).unwrap();
        assert_eq!(second[0], 0x5A);
        assert_eq!(second.len(), page);
    }
}
