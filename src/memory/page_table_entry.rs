use bitflags::bitflags;

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct PageTableFlags: u32 {
		const PRESENT = 0b1;
		const WRITABLE = 0b10;
		const USER = 0b100;
		const WRITETHROUGH = 0b1000;
		const NOT_CACHEABLE = 0b1_0000;
		const ACCESSED = 0b10_0000;
		const DIRTY = 0b100_0000;
		const FRAME = 0xffff_f000;
	}
}

/// One 32-bit entry of a page table: a 4 KiB-aligned frame address plus flags.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct PageTableEntry {
	value: u32,
}

impl PageTableEntry {
	pub const fn zero() -> Self {
		PageTableEntry { value: 0 }
	}

	pub fn new(frame: u32, flags: PageTableFlags) -> Self {
		PageTableEntry {
			value: (frame & PageTableFlags::FRAME.bits()) | flags.bits(),
		}
	}

	pub fn is_present(&self) -> bool {
		self.value & PageTableFlags::PRESENT.bits() != 0
	}

	pub fn frame(&self) -> u32 {
		self.value & PageTableFlags::FRAME.bits()
	}
}
