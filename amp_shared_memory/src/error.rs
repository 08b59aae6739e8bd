//! Error types for shared memory operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while mapping or accessing the shared window
#[derive(Error, Debug)]
pub enum ShmError {
    /// Memory device does not exist
    #[error("Memory device not found: {}", path.display())]
    DeviceNotFound {
        /// Device path
        path: PathBuf,
    },

    /// Permission denied opening the memory device
    #[error("Permission denied opening {} (run as root?)", path.display())]
    PermissionDenied {
        /// Device path
        path: PathBuf,
    },

    /// Physical address or offset not aligned as required
    #[error("Memory alignment error: address {address:#x} not aligned to {alignment}")]
    AlignmentError {
        /// Offending address
        address: u64,
        /// Required alignment
        alignment: usize,
    },

    /// Region does not fit the mapped window
    #[error("Shared region at {offset:#x} (+{required} bytes) exceeds window of {window:#x} bytes")]
    RegionOutOfBounds {
        /// Region offset in the window
        offset: usize,
        /// Bytes required by the layout
        required: usize,
        /// Window length
        window: usize,
    },

    /// Writer used after `close()`
    #[error("Shared memory writer is closed")]
    Closed,

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;
