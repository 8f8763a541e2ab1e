//! Memory management: the kernel heap and the identity paging bring-up.

pub mod kmalloc;

#[cfg(target_arch = "x86")]
pub mod paging;

pub mod page_directory_entry;

pub mod page_table_entry;
