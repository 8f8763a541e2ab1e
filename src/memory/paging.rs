//! Identity paging bring-up.
//!
//! The first 8 MiB of physical memory are identity mapped through two page
//! tables, the directory is loaded into CR3 and the PG bit is set in CR0.
//! All other directory entries stay not-present so stray accesses fault.

use crate::memory::page_directory_entry::{PageDirectoryEntry, PageDirectoryFlags};
use crate::memory::page_table_entry::{PageTableEntry, PageTableFlags};
use crate::utils::debug::LogLevel;
use core::arch::asm;
use core::ptr::addr_of_mut;

const ENTRY_COUNT: usize = 1024;
const PAGE_SIZE: u32 = 4096;
const IDENTITY_TABLE_COUNT: usize = 2;

#[repr(C, align(4096))]
struct PageTable {
	entries: [PageTableEntry; ENTRY_COUNT],
}

#[repr(C, align(4096))]
struct PageDirectory {
	entries: [PageDirectoryEntry; ENTRY_COUNT],
}

static mut PAGE_DIRECTORY: PageDirectory = PageDirectory {
	entries: [PageDirectoryEntry::zero(); ENTRY_COUNT],
};

static mut PAGE_TABLES: [PageTable; IDENTITY_TABLE_COUNT] = [
	PageTable {
		entries: [PageTableEntry::zero(); ENTRY_COUNT],
	},
	PageTable {
		entries: [PageTableEntry::zero(); ENTRY_COUNT],
	},
];

pub fn init() {
	let directory = unsafe { &mut *addr_of_mut!(PAGE_DIRECTORY) };
	let tables = unsafe { &mut *addr_of_mut!(PAGE_TABLES) };

	for (table_index, table) in tables.iter_mut().enumerate() {
		for (entry_index, entry) in table.entries.iter_mut().enumerate() {
			let frame = (table_index * ENTRY_COUNT + entry_index) as u32 * PAGE_SIZE;
			*entry = PageTableEntry::new(frame, PageTableFlags::PRESENT | PageTableFlags::WRITABLE);
		}
		directory.entries[table_index] = PageDirectoryEntry::new(
			table as *const PageTable as u32,
			PageDirectoryFlags::PRESENT | PageDirectoryFlags::WRITABLE,
		);
	}
	for entry in directory.entries.iter_mut().skip(IDENTITY_TABLE_COUNT) {
		*entry = PageDirectoryEntry::new(0, PageDirectoryFlags::WRITABLE);
	}

	unsafe {
		enable(directory as *const PageDirectory as u32);
	}

	if paging_enabled() {
		log!(
			LogLevel::Info,
			"Paging enabled, identity mapped {} MiB",
			IDENTITY_TABLE_COUNT * 4
		);
	} else {
		log!(LogLevel::Error, "Paging: CR0.PG did not stick");
	}
}

unsafe fn enable(directory_address: u32) {
	asm!(
		"mov cr3, {dir}",
		"mov {tmp}, cr0",
		"or {tmp}, 0x80000000",
		"mov cr0, {tmp}",
		dir = in(reg) directory_address,
		tmp = out(reg) _,
		options(nostack, preserves_flags)
	);
}

fn paging_enabled() -> bool {
	let cr0: u32;
	unsafe {
		asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
	}
	cr0 & 0x8000_0000 != 0
}
