use bitflags::bitflags;

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct PageDirectoryFlags: u32 {
		const PRESENT = 0b1;
		const WRITABLE = 0b10;
		const USER = 0b100;
		const WRITETHROUGH = 0b1000;
		const NOT_CACHEABLE = 0b1_0000;
		const ACCESSED = 0b10_0000;
		const PAGE_SIZE_4MIB = 0b1000_0000;
		const TABLE = 0xffff_f000;
	}
}

/// One 32-bit entry of the page directory: the physical address of a page
/// table plus flags.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct PageDirectoryEntry {
	value: u32,
}

impl PageDirectoryEntry {
	pub const fn zero() -> Self {
		PageDirectoryEntry { value: 0 }
	}

	pub fn new(table: u32, flags: PageDirectoryFlags) -> Self {
		PageDirectoryEntry {
			value: (table & PageDirectoryFlags::TABLE.bits()) | flags.bits(),
		}
	}

	pub fn is_present(&self) -> bool {
		self.value & PageDirectoryFlags::PRESENT.bits() != 0
	}

	pub fn table(&self) -> u32 {
		self.value & PageDirectoryFlags::TABLE.bits()
	}
}
