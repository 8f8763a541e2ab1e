//! Kernel heap allocator.
//!
//! A single free list over one contiguous region. Every block starts with a
//! 16-byte header carrying the block size and a used bit, so payloads stay
//! 16-byte aligned. Allocation is first fit with block splitting, freeing
//! coalesces adjacent free blocks in address order. Out-of-memory and invalid
//! frees never panic: `allocate` returns a null pointer and `free` logs and
//! returns.

use crate::utils::debug::LogLevel;
use bitflags::bitflags;
use core::ptr;
use spin::Mutex;

bitflags! {
	struct KmallocHeaderFlags: u32 {
		const USED = 1 << 31;
		const SIZE = 0x7fff_ffff;
	}
}

/// Block header, padded so the payload that follows it is 16-byte aligned.
/// The stored size covers the header itself.
#[repr(C, align(16))]
struct KmallocHeader {
	value: u32,
}

impl KmallocHeader {
	fn new(used: bool, size: u32) -> Self {
		let mut value = size & KmallocHeaderFlags::SIZE.bits();
		if used {
			value |= KmallocHeaderFlags::USED.bits();
		}
		KmallocHeader { value }
	}

	fn set_used(&mut self, used: bool) {
		if used {
			self.value |= KmallocHeaderFlags::USED.bits();
		} else {
			self.value &= !KmallocHeaderFlags::USED.bits();
		}
	}

	fn used(&self) -> bool {
		self.value & KmallocHeaderFlags::USED.bits() != 0
	}

	fn set_size(&mut self, size: u32) {
		self.value = (self.value & KmallocHeaderFlags::USED.bits()) | (size & KmallocHeaderFlags::SIZE.bits());
	}

	fn size(&self) -> u32 {
		self.value & KmallocHeaderFlags::SIZE.bits()
	}
}

pub const KMALLOC_HEADER_SIZE: usize = core::mem::size_of::<KmallocHeader>();
const MIN_ALLOCATION_SIZE: u32 = 32;

pub struct Heap {
	start: *mut u8,
	end: *mut u8,
}

unsafe impl Send for Heap {}

impl Heap {
	const fn empty() -> Self {
		Heap {
			start: ptr::null_mut(),
			end: ptr::null_mut(),
		}
	}

	/// # Safety
	///
	/// `start` must point to `size` bytes of memory owned by the heap for the
	/// rest of the kernel's lifetime, 16-byte aligned.
	unsafe fn init(&mut self, start: *mut u8, size: u32) {
		let size = size - size % MIN_ALLOCATION_SIZE;
		self.start = start;
		self.end = start.add(size as usize);
		let header = self.start as *mut KmallocHeader;
		header.write(KmallocHeader::new(false, size));
	}

	fn initialized(&self) -> bool {
		!self.start.is_null()
	}

	/// Returns a pointer to `size` usable bytes, or null when the request is
	/// zero, too large, or no free block fits.
	fn allocate(&mut self, size: u32) -> *mut u8 {
		if size == 0 || !self.initialized() {
			return ptr::null_mut();
		}
		let Some(needed) = size.checked_add(KMALLOC_HEADER_SIZE as u32) else {
			return ptr::null_mut();
		};
		let needed = match needed.checked_next_multiple_of(MIN_ALLOCATION_SIZE) {
			Some(n) => n,
			None => return ptr::null_mut(),
		};

		let mut current = self.start;
		while current < self.end {
			let header = current as *mut KmallocHeader;
			let block_size = unsafe { (*header).size() };
			if block_size == 0 {
				log!(LogLevel::Error, "Kmalloc: corrupted header at {:p}", current);
				return ptr::null_mut();
			}
			if !unsafe { (*header).used() } && block_size >= needed {
				unsafe {
					self.split_block(header, needed);
					(*header).set_used(true);
				}
				return unsafe { current.add(KMALLOC_HEADER_SIZE) };
			}
			current = unsafe { current.add(block_size as usize) };
		}
		ptr::null_mut()
	}

	/// Carves `size` bytes off the front of a free block when the remainder
	/// can still hold a header and a minimum payload.
	unsafe fn split_block(&mut self, header: *mut KmallocHeader, size: u32) {
		let remainder = (*header).size() - size;
		if remainder < KMALLOC_HEADER_SIZE as u32 + MIN_ALLOCATION_SIZE {
			return;
		}
		(*header).set_size(size);
		let next = (header as *mut u8).add(size as usize) as *mut KmallocHeader;
		next.write(KmallocHeader::new(false, remainder));
	}

	/// Releases a block previously returned by `allocate`. Null pointers,
	/// pointers outside the heap and pointers that do not match a live block
	/// are ignored.
	fn free(&mut self, ptr: *mut u8) {
		if ptr.is_null() || !self.initialized() {
			return;
		}
		let header_address = ptr.wrapping_sub(KMALLOC_HEADER_SIZE);
		if header_address < self.start || header_address >= self.end {
			log!(LogLevel::Error, "Kfree: pointer {:p} outside the heap", ptr);
			return;
		}

		let mut current = self.start;
		while current < self.end {
			let header = current as *mut KmallocHeader;
			let block_size = unsafe { (*header).size() };
			if block_size == 0 {
				log!(LogLevel::Error, "Kfree: corrupted header at {:p}", current);
				return;
			}
			if current == header_address {
				if !unsafe { (*header).used() } {
					log!(LogLevel::Error, "Kfree: double free of {:p}", ptr);
					return;
				}
				unsafe { (*header).set_used(false) };
				self.defragment();
				return;
			}
			current = unsafe { current.add(block_size as usize) };
		}
		log!(LogLevel::Error, "Kfree: pointer {:p} is not a block start", ptr);
	}

	/// Merges runs of adjacent free blocks into single blocks.
	fn defragment(&mut self) {
		let mut current = self.start;
		while current < self.end {
			let header = current as *mut KmallocHeader;
			let block_size = unsafe { (*header).size() };
			let next = unsafe { current.add(block_size as usize) };
			if next >= self.end {
				break;
			}
			let next_header = next as *mut KmallocHeader;
			if unsafe { !(*header).used() && !(*next_header).used() } {
				unsafe { (*header).set_size(block_size + (*next_header).size()) };
				continue;
			}
			current = next;
		}
	}

	/// Usable payload size of a live allocation, or `None` for anything else.
	fn allocation_size(&self, ptr: *const u8) -> Option<u32> {
		if ptr.is_null() || !self.initialized() {
			return None;
		}
		let header_address = ptr.wrapping_sub(KMALLOC_HEADER_SIZE);
		let mut current = self.start as *const u8;
		while current < self.end {
			let header = current as *const KmallocHeader;
			let block_size = unsafe { (*header).size() };
			if block_size == 0 {
				return None;
			}
			if current == header_address {
				if !unsafe { (*header).used() } {
					return None;
				}
				return Some(block_size - KMALLOC_HEADER_SIZE as u32);
			}
			current = unsafe { current.add(block_size as usize) };
		}
		None
	}

	#[cfg(test)]
	fn blocks(&self) -> std::vec::Vec<(u32, bool)> {
		let mut list = std::vec::Vec::new();
		let mut current = self.start as *const u8;
		while current < self.end {
			let header = current as *const KmallocHeader;
			let size = unsafe { (*header).size() };
			list.push((size, unsafe { (*header).used() }));
			current = unsafe { current.add(size as usize) };
		}
		list
	}
}

static KERNEL_HEAP: Mutex<Heap> = Mutex::new(Heap::empty());

/// Region handed over by the multiboot memory map walk, in physical bytes.
#[cfg(target_arch = "x86")]
pub static mut HEAP_REGION_START: u32 = 0;
#[cfg(target_arch = "x86")]
pub static mut HEAP_REGION_END: u32 = 0;

#[cfg(target_arch = "x86")]
const KERNEL_HEAP_SIZE: u32 = 4 * 1024 * 1024;
#[cfg(target_arch = "x86")]
const KERNEL_HEAP_MINIMUM: u32 = 1024 * 1024;

#[cfg(target_arch = "x86")]
pub fn init() {
	let (start, end) = unsafe { (HEAP_REGION_START, HEAP_REGION_END) };
	if end <= start || end - start < KERNEL_HEAP_MINIMUM {
		log!(LogLevel::Error, "Kmalloc: no usable region for the kernel heap");
		return;
	}
	let size = KERNEL_HEAP_SIZE.min(end - start);
	unsafe {
		KERNEL_HEAP.lock().init(start as *mut u8, size);
	}
	log!(
		LogLevel::Info,
		"Kernel heap initialized at {:#x}, {} KiB",
		start,
		size / 1024
	);
}

pub fn kmalloc(size: u32) -> *mut u8 {
	KERNEL_HEAP.lock().allocate(size)
}

pub fn kfree(ptr: *mut u8) {
	KERNEL_HEAP.lock().free(ptr);
}

pub fn ksize(ptr: *const u8) -> Option<u32> {
	KERNEL_HEAP.lock().allocation_size(ptr)
}

#[cfg(not(test))]
mod global {
	use super::KERNEL_HEAP;
	use core::alloc::{GlobalAlloc, Layout};
	use core::ptr;

	struct KernelAllocator;

	unsafe impl GlobalAlloc for KernelAllocator {
		unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
			if layout.align() > 16 {
				return ptr::null_mut();
			}
			KERNEL_HEAP.lock().allocate(layout.size() as u32)
		}

		unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
			KERNEL_HEAP.lock().free(ptr);
		}
	}

	#[global_allocator]
	static ALLOCATOR: KernelAllocator = KernelAllocator;
}

#[cfg(test)]
mod tests {
	use super::*;

	const TEST_HEAP_SIZE: u32 = 4096;

	struct TestHeap {
		heap: Heap,
		_backing: std::boxed::Box<[u128]>,
	}

	fn test_heap() -> TestHeap {
		let mut backing = std::vec![0u128; TEST_HEAP_SIZE as usize / 16].into_boxed_slice();
		let mut heap = Heap::empty();
		unsafe { heap.init(backing.as_mut_ptr() as *mut u8, TEST_HEAP_SIZE) };
		TestHeap { heap, _backing: backing }
	}

	#[test]
	fn allocations_do_not_overlap_and_are_aligned() {
		let mut t = test_heap();
		let a = t.heap.allocate(100);
		let b = t.heap.allocate(100);
		assert!(!a.is_null() && !b.is_null());
		assert_eq!(a as usize % 16, 0);
		assert_eq!(b as usize % 16, 0);
		let gap = (b as usize).abs_diff(a as usize);
		assert!(gap >= 100 + KMALLOC_HEADER_SIZE);

		unsafe {
			a.write_bytes(0xaa, 100);
			b.write_bytes(0x55, 100);
			assert_eq!(a.read(), 0xaa);
			assert_eq!(b.read(), 0x55);
		}
	}

	#[test]
	fn freeing_everything_restores_one_block() {
		let mut t = test_heap();
		let a = t.heap.allocate(48);
		let b = t.heap.allocate(200);
		let c = t.heap.allocate(17);
		t.heap.free(b);
		t.heap.free(a);
		t.heap.free(c);
		assert_eq!(t.heap.blocks(), std::vec![(TEST_HEAP_SIZE, false)]);
	}

	#[test]
	fn exhaustion_returns_null_without_panicking() {
		let mut t = test_heap();
		assert!(t.heap.allocate(TEST_HEAP_SIZE * 2).is_null());
		let whole = t.heap.allocate(TEST_HEAP_SIZE - KMALLOC_HEADER_SIZE as u32);
		assert!(!whole.is_null());
		assert!(t.heap.allocate(1).is_null());
		t.heap.free(whole);
		assert!(!t.heap.allocate(1).is_null());
	}

	#[test]
	fn zero_sized_allocation_returns_null() {
		let mut t = test_heap();
		assert!(t.heap.allocate(0).is_null());
	}

	#[test]
	fn invalid_frees_are_ignored() {
		let mut t = test_heap();
		let a = t.heap.allocate(64);
		t.heap.free(ptr::null_mut());
		t.heap.free(0x1000 as *mut u8);
		t.heap.free(unsafe { a.add(8) });
		t.heap.free(a);
		t.heap.free(a); // double free
		assert_eq!(t.heap.blocks(), std::vec![(TEST_HEAP_SIZE, false)]);
	}

	#[test]
	fn ksize_reports_at_least_the_request() {
		let mut t = test_heap();
		let a = t.heap.allocate(40);
		let size = t.heap.allocation_size(a).unwrap();
		assert!(size >= 40);
		t.heap.free(a);
		assert_eq!(t.heap.allocation_size(a), None);
	}

	#[test]
	fn split_leaves_usable_remainder() {
		let mut t = test_heap();
		let a = t.heap.allocate(MIN_ALLOCATION_SIZE);
		assert!(!a.is_null());
		let blocks = t.heap.blocks();
		assert_eq!(blocks.len(), 2);
		assert!(blocks[0].1);
		assert!(!blocks[1].1);
		assert_eq!(blocks[0].0 + blocks[1].0, TEST_HEAP_SIZE);
	}
}
