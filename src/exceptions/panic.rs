//! Kernel panic path: dump the stack over serial, report on both outputs,
//! then halt forever.

use crate::exceptions::interrupts::InterruptStackFrame;
use crate::utils::debug::LogLevel;
use crate::utils::librs::{hexdump, hlt};
use core::arch::asm;
use core::fmt::Display;

const STACK_DUMP_SIZE: usize = 1024;
static mut STACK_DUMP: [u8; STACK_DUMP_SIZE] = [0; STACK_DUMP_SIZE];

fn save_stack() {
	let stack_pointer: usize;
	unsafe {
		asm!("mov {}, esp", out(reg) stack_pointer, options(nostack, preserves_flags));

		let buffer_ptr = core::ptr::addr_of_mut!(STACK_DUMP) as *mut u8;
		buffer_ptr.copy_from(stack_pointer as *const u8, STACK_DUMP_SIZE);
	}
}

pub fn handle_panic<D: Display>(info: &D, stack_frame: Option<&InterruptStackFrame>) -> ! {
	save_stack();

	log!(LogLevel::Panic, "{}", info);
	println!("{}", info);

	if let Some(frame) = stack_frame {
		log!(LogLevel::Panic, "{:#?}", frame);
		println!("{:#?}", frame);
	}

	let stack_start_address = core::ptr::addr_of!(STACK_DUMP) as usize;
	log!(LogLevel::Info, "Stack dump at {:#x}", stack_start_address);
	hexdump(stack_start_address as u32, STACK_DUMP_SIZE);

	println!("See serial output for more information.");

	loop {
		hlt();
	}
}
