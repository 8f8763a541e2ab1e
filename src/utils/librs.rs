//! # Utility Functions for Kernel Operations
//!
//! Low-level helpers shared by the boot path and the panic handler:
//! halting the CPU and dumping memory regions over the serial port.

#[cfg(target_arch = "x86")]
use core::arch::asm;

/// Halts the CPU until the next external interrupt.
#[cfg(target_arch = "x86")]
#[inline]
pub fn hlt() {
	unsafe {
		asm!("hlt", options(nomem, nostack, preserves_flags));
	}
}

#[cfg(not(target_arch = "x86"))]
#[inline]
pub fn hlt() {
	core::hint::spin_loop();
}

/// Performs a hex dump of `limit` bytes starting at `address`, on the serial port.
#[cfg(target_arch = "x86")]
pub fn hexdump(mut address: u32, limit: usize) {
	if limit == 0 {
		return;
	}

	println_serial!("address: {:08x}, limit: {}", address, limit);

	let bytes = unsafe { core::slice::from_raw_parts(address as *const u8, limit) };

	for (i, &byte) in bytes.iter().enumerate() {
		if i % 16 == 0 {
			if i != 0 {
				print_hex_line(address - 16, 16);
				println_serial!();
			}
			print_serial!("{:08x}: ", address);
		}
		print_serial!("{:02x} ", byte);
		address += 1;
	}

	let remaining = limit % 16;
	for _ in 0..((16 - remaining) * 3) {
		print_serial!(" ");
	}
	print_hex_line(address - remaining as u32, remaining);
	println_serial!();
}

#[cfg(target_arch = "x86")]
fn print_hex_line(address: u32, count: usize) {
	let bytes = unsafe { core::slice::from_raw_parts(address as *const u8, count) };

	for &byte in bytes {
		if byte <= 32 || byte >= 127 {
			print_serial!(".");
		} else {
			print_serial!("{}", byte as char);
		}
	}
}
