//! Multiboot2 header and boot information parsing.
//!
//! The bootloader hands over a magic value and a physical pointer to a tag
//! list. We validate both, report the interesting tags over serial and carve
//! the kernel heap region out of the largest available memory range.

use crate::memory::kmalloc::{HEAP_REGION_END, HEAP_REGION_START};

const MULTIBOOT_HEADER_MAGIC: u32 = 0xe85250d6;
const MULTIBOOT_HEADER_ARCHITECTURE: u32 = 0;
const MULTIBOOT_HEADER_CHECKSUM: u32 = (0_u32)
	.wrapping_sub(MULTIBOOT_HEADER_MAGIC)
	.wrapping_sub(MULTIBOOT_HEADER_ARCHITECTURE);
const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x36d76289;

/// The heap must stay below what the identity mapping covers.
const IDENTITY_MAPPED_END: u64 = 8 * 1024 * 1024;
const HEAP_FLOOR: u64 = 4 * 1024 * 1024;

#[used]
#[link_section = ".multiboot_header"]
static MULTIBOOT_HEADER: MultibootHeader = MultibootHeader {
	magic: MULTIBOOT_HEADER_MAGIC,
	architecture: MULTIBOOT_HEADER_ARCHITECTURE,
	header_length: core::mem::size_of::<MultibootHeader>() as u32,
	checksum: MULTIBOOT_HEADER_CHECKSUM
		.wrapping_sub(core::mem::size_of::<MultibootHeader>() as u32),
	end_tag_type: 0,
	end_tag_flags: 0,
	end_tag_size: 8,
};

#[repr(C)]
struct MultibootHeader {
	magic: u32,
	architecture: u32,
	header_length: u32,
	checksum: u32,
	end_tag_type: u16,
	end_tag_flags: u16,
	end_tag_size: u32,
}

#[repr(C)]
struct MultibootInfo {
	total_size: u32,
	reserved: u32,
	tags: [MultibootTag; 1],
}

#[repr(C)]
struct MultibootTag {
	tag_type: u32,
	size: u32,
}

#[repr(C)]
struct MultibootTagString {
	tag_type: u32,
	size: u32,
	string: u8,
}

#[repr(C)]
struct MultibootTagBasicMemInfo {
	tag_type: u32,
	size: u32,
	mem_lower: u32,
	mem_upper: u32,
}

#[repr(C)]
struct MultibootMemoryMapTag {
	tag_type: u32,
	size: u32,
	entry_size: u32,
	entry_version: u32,
	entries: [MultibootMemoryMapEntry; 1],
}

#[repr(C)]
struct MultibootMemoryMapEntry {
	addr: u64,
	len: u64,
	entry_type: u32,
	zero: u32,
}

const MULTIBOOT_TAG_TYPE_END: u32 = 0;
const MULTIBOOT_TAG_TYPE_CMDLINE: u32 = 1;
const MULTIBOOT_TAG_TYPE_BOOT_LOADER_NAME: u32 = 2;
const MULTIBOOT_TAG_TYPE_BASIC_MEMINFO: u32 = 4;
const MULTIBOOT_TAG_TYPE_MMAP: u32 = 6;
const MULTIBOOT_MEMORY_AVAILABLE: u32 = 1;

fn c_str(pointer: *const u8) -> &'static str {
	let mut length = 0;
	while unsafe { *pointer.add(length) } != 0 {
		length += 1;
	}
	let slice = unsafe { core::slice::from_raw_parts(pointer, length) };
	core::str::from_utf8(slice).unwrap_or("<invalid utf-8>")
}

pub fn init(magic: u32, address: u32) {
	if magic != MULTIBOOT_BOOTLOADER_MAGIC {
		panic!("Invalid multiboot magic number: {:#x}", magic);
	}
	if address & 0x7 != 0 {
		panic!("Unaligned multiboot address: {:#x}", address);
	}

	let multiboot_info: &MultibootInfo = unsafe { &*(address as *const MultibootInfo) };
	println_serial!("Multiboot info size: {:#x}", multiboot_info.total_size);

	let mut current_tag: *const MultibootTag = multiboot_info.tags.as_ptr();
	let mut tag: &MultibootTag = unsafe { &*current_tag };

	while tag.tag_type != MULTIBOOT_TAG_TYPE_END {
		match tag.tag_type {
			MULTIBOOT_TAG_TYPE_CMDLINE => {
				let cmdline = unsafe { &*(current_tag as *const MultibootTagString) };
				println_serial!("Command line: {}", c_str(&cmdline.string));
			}
			MULTIBOOT_TAG_TYPE_BOOT_LOADER_NAME => {
				let name = unsafe { &*(current_tag as *const MultibootTagString) };
				println_serial!("Bootloader: {}", c_str(&name.string));
			}
			MULTIBOOT_TAG_TYPE_BASIC_MEMINFO => {
				let meminfo = unsafe { &*(current_tag as *const MultibootTagBasicMemInfo) };
				println_serial!(
					"Mem lower: {} KiB, mem upper: {} KiB",
					meminfo.mem_lower,
					meminfo.mem_upper
				);
			}
			MULTIBOOT_TAG_TYPE_MMAP => {
				let mmap = unsafe { &*(current_tag as *const MultibootMemoryMapTag) };
				let entries_count = (mmap.size - mmap.entry_size) / mmap.entry_size;
				let entries = unsafe {
					core::slice::from_raw_parts(mmap.entries.as_ptr(), entries_count as usize)
				};
				process_memory_map(entries);
			}
			_ => {}
		}
		current_tag = (current_tag as usize + (tag.size as usize + 7) & !7) as *const MultibootTag;
		tag = unsafe { &*current_tag };
	}
}

/// Picks the largest available region, clips it to the identity-mapped window
/// above the low 4 MiB and hands the result to the heap.
fn process_memory_map(entries: &[MultibootMemoryMapEntry]) {
	let mut largest = (0u64, 0u64);
	for entry in entries {
		println_serial!(
			"  {:#x}-{:#x} type: {:#x}",
			entry.addr,
			entry.addr + entry.len,
			entry.entry_type
		);
		if entry.entry_type == MULTIBOOT_MEMORY_AVAILABLE && entry.len > largest.1 {
			largest = (entry.addr, entry.len);
		}
	}

	let start = largest.0.max(HEAP_FLOOR);
	let end = (largest.0 + largest.1).min(IDENTITY_MAPPED_END);
	if end <= start {
		panic!(
			"No usable memory between {:#x} and {:#x}",
			HEAP_FLOOR, IDENTITY_MAPPED_END
		);
	}

	unsafe {
		HEAP_REGION_START = start as u32;
		HEAP_REGION_END = end as u32;
	}
	println!("Heap region: {:#x}-{:#x}", start, end);
}
