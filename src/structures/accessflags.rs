//! Access flags for segments.
//!
//! See Intel 3a, Section 3.4.5 "Segment Descriptors"

/// Access byte of the mandatory null descriptor.
pub const NULL_SEGMENT: u8 = 0x00;

/// Present, ring 0, code segment, executable/readable.
pub const KERNEL_CODE_SEGMENT: u8 = 0x9a;

/// Present, ring 0, data segment, readable/writable.
pub const KERNEL_DATA_SEGMENT: u8 = 0x92;

/// Present, ring 0, data segment used for the kernel stack.
pub const KERNEL_STACK_SEGMENT: u8 = 0x92;

/// 20-bit limit covering the full 4 GiB with 4 KiB granularity.
pub const MAX_SEGMENT_SIZE: u32 = 0xfffff;

/// Flat segments start at address zero.
pub const NO_OFFSET: u32 = 0;

/// Granularity = 4 KiB, 32-bit protected mode operation.
pub const SEGMENT_FLAGS: u8 = 0xc0;
