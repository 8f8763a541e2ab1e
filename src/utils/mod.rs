//! Utility modules shared across the kernel.

/// Serial port logging
pub mod debug;

/// Port I/O primitives
#[cfg(target_arch = "x86")]
pub mod io;

/// Misc low-level helpers
pub mod librs;
