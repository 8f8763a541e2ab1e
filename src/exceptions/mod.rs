//! Interrupt and exception handling.

/// Interrupts and exceptions
#[cfg(target_arch = "x86")]
pub mod interrupts;

/// Kernel panic path
#[cfg(target_arch = "x86")]
pub mod panic;

/// Programmable Interrupt Controller (PIC)
#[cfg(target_arch = "x86")]
pub mod pic8259;

/// Programmable Interval Timer (PIT)
pub mod pit;
