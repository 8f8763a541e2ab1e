//! # kfs-2
//!
//! Core of a small x86 (32-bit protected mode) kernel: descriptor tables,
//! PIC/PIT/keyboard bring-up, a free-list kernel heap, identity paging and
//! a FAT12/16/32 filesystem driver on top of a sector buffer cache.
//!
//! Everything that touches the hardware is gated on `target_arch = "x86"`;
//! the heap policy, the keyboard decode path and the whole filesystem layer
//! are portable and unit-tested on the host.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod macros;

#[cfg(target_arch = "x86")]
mod boot;

pub mod exceptions;
pub mod fs;
pub mod keyboard;
pub mod memory;

#[cfg(target_arch = "x86")]
mod structures;

pub mod utils;

#[cfg(target_arch = "x86")]
pub mod vga;

#[cfg(target_arch = "x86")]
use crate::utils::debug::LogLevel;

/// Kernel entry point, called by the assembly bootstrap with the
/// multiboot2 magic number and info-structure address.
#[cfg(target_arch = "x86")]
#[no_mangle]
pub extern "C" fn kernel_main(magic: u32, address: u32) -> ! {
	utils::debug::init_serial_port();
	boot::multiboot::init(magic, address);

	structures::gdt::init();
	structures::idt::init();
	exceptions::interrupts::init();
	exceptions::pit::init();
	memory::paging::init();
	memory::kmalloc::init();

	exceptions::interrupts::enable();
	log!(LogLevel::Info, "Kernel initialized, interrupts enabled");
	println!("kfs-2 ready");

	loop {
		if let Some(byte) = keyboard::KEYBOARD.read() {
			print!("{}", byte as char);
		}
		utils::librs::hlt();
	}
}

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
	#[cfg(target_arch = "x86")]
	exceptions::panic::handle_panic(info, None);

	#[cfg(not(target_arch = "x86"))]
	loop {}
}
