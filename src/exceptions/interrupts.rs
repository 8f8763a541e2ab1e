//! CPU exception handlers and the hardware IRQ dispatch path.
//!
//! Exceptions print their mnemonic and the saved stack frame. Hardware
//! interrupts get fast paths for the timer and the keyboard; every other
//! remapped line is acknowledged and dropped. EOI is always sent before
//! interrupts can be re-enabled.

use crate::exceptions::pic8259::ChainedPics;
use crate::exceptions::pit;
use crate::keyboard::KEYBOARD;
use crate::utils::io::inb;
use spin::Mutex;

pub const PIC_1_OFFSET: u8 = 32;

const KEYBOARD_DATA_PORT: u16 = 0x60;

/// Bring-up masks: only the timer (IRQ 0) and keyboard (IRQ 1) lines are open.
const PIC_1_MASK: u8 = 0xfc;
const PIC_2_MASK: u8 = 0xff;

pub static PICS: Mutex<ChainedPics> =
	Mutex::new(unsafe { ChainedPics::new_contiguous(PIC_1_OFFSET) });

#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
#[repr(u8)]
pub enum InterruptIndex {
	Timer = PIC_1_OFFSET,
	Keyboard,
	Cascade,
	Com2,
	Com1,
	Lpt2,
	Floppy,
	Lpt1,
	Rtc,
	Free1,
	Free2,
	Free3,
	Ps2Mouse,
	PrimaryAtaHardDisk,
	SecondaryAtaHardDisk,
}

impl InterruptIndex {
	pub fn as_u8(self) -> u8 {
		self as u8
	}

	pub fn as_usize(self) -> usize {
		usize::from(self.as_u8())
	}
}

#[derive(Debug)]
#[repr(C)]
pub struct InterruptStackFrame {
	instruction_pointer: u32,
	code_segment: u32,
	cpu_flags: u32,
	stack_pointer: u32,
	stack_segment: u32,
}

pub extern "C" fn divide_by_zero(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: DIVIDE BY ZERO\n{:#x?}", _stack_frame);
}

pub extern "C" fn debug(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: DEBUG\n{:#x?}", _stack_frame);
}

pub extern "C" fn non_maskable_interrupt(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: NON MASKABLE INTERRUPT\n{:#x?}", _stack_frame);
}

pub extern "C" fn breakpoint(stack_frame: &mut InterruptStackFrame) {
	println!(
		"EXCEPTION: BREAKPOINT at {:#x}\n{:#x?}",
		stack_frame.instruction_pointer, stack_frame
	);
}

pub extern "C" fn overflow(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: OVERFLOW\n{:#x?}", _stack_frame);
}

pub extern "C" fn bound_range_exceeded(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: BOUND RANGE EXCEEDED\n{:#x?}", _stack_frame);
}

pub extern "C" fn invalid_opcode(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: INVALID OPCODE\n{:#x?}", _stack_frame);
}

pub extern "C" fn coprocessor_not_available(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: COPROCESSOR NOT AVAILABLE\n{:#x?}", _stack_frame);
}

pub extern "C" fn double_fault(_stack_frame: &mut InterruptStackFrame, _error_code: u32) {
	println!("EXCEPTION: DOUBLE FAULT\n{:#x?}", _stack_frame);
}

pub extern "C" fn coprocessor_segment_overrun(_stack_frame: &mut InterruptStackFrame) {
	println!(
		"EXCEPTION: COPROCESSOR SEGMENT OVERRUN\n{:#x?}",
		_stack_frame
	);
}

pub extern "C" fn invalid_task_state_segment(_stack_frame: &mut InterruptStackFrame, error_code: u32) {
	println!(
		"EXCEPTION: INVALID TASK STATE SEGMENT ({:#x})\n{:#x?}",
		error_code, _stack_frame
	);
}

pub extern "C" fn segment_not_present(_stack_frame: &mut InterruptStackFrame, error_code: u32) {
	println!(
		"EXCEPTION: SEGMENT NOT PRESENT ({:#x})\n{:#x?}",
		error_code, _stack_frame
	);
}

pub extern "C" fn stack_fault(_stack_frame: &mut InterruptStackFrame, error_code: u32) {
	println!(
		"EXCEPTION: STACK FAULT ({:#x})\n{:#x?}",
		error_code, _stack_frame
	);
}

pub extern "C" fn general_protection_fault(stack_frame: &mut InterruptStackFrame, error_code: u32) {
	println!(
		"EXCEPTION: GENERAL PROTECTION FAULT ({:#x})\n{:#x?}",
		error_code, stack_frame
	);
}

pub extern "C" fn page_fault(_stack_frame: &mut InterruptStackFrame, error_code: u32) {
	println!(
		"EXCEPTION: PAGE FAULT ({:#x})\n{:#x?}",
		error_code, _stack_frame
	);
}

pub extern "C" fn reserved(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: RESERVED\n{:#x?}", _stack_frame);
}

pub extern "C" fn math_fault(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: MATH FAULT\n{:#x?}", _stack_frame);
}

pub extern "C" fn alignment_check(_stack_frame: &mut InterruptStackFrame, _error_code: u32) {
	println!("EXCEPTION: ALIGNMENT CHECK\n{:#x?}", _stack_frame);
}

pub extern "C" fn machine_check(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: MACHINE CHECK\n{:#x?}", _stack_frame);
}

pub extern "C" fn simd_floating_point_exception(_stack_frame: &mut InterruptStackFrame) {
	println!(
		"EXCEPTION: SIMD FLOATING POINT EXCEPTION\n{:#x?}",
		_stack_frame
	);
}

pub extern "C" fn virtualization_exception(_stack_frame: &mut InterruptStackFrame) {
	println!("EXCEPTION: VIRTUALIZATION EXCEPTION\n{:#x?}", _stack_frame);
}

pub extern "C" fn timer_interrupt(_stack_frame: &mut InterruptStackFrame) {
	pit::tick();

	unsafe {
		PICS.lock()
			.notify_end_of_interrupt(InterruptIndex::Timer.as_u8());
	}
}

pub extern "C" fn keyboard_interrupt(_stack_frame: &mut InterruptStackFrame) {
	let scancode: u8 = unsafe { inb(KEYBOARD_DATA_PORT) };

	KEYBOARD.handle_scancode(scancode);

	unsafe {
		PICS.lock()
			.notify_end_of_interrupt(InterruptIndex::Keyboard.as_u8());
	}
}

/// EOI-only handler for the remaining master PIC lines (including the
/// spurious IRQ 7). The exact vector is unknown here, so any master-range
/// id acknowledges the right chip.
pub extern "C" fn primary_irq(_stack_frame: &mut InterruptStackFrame) {
	unsafe {
		PICS.lock()
			.notify_end_of_interrupt(InterruptIndex::Lpt1.as_u8());
	}
}

/// EOI-only handler for the slave PIC lines (including the spurious IRQ 15).
pub extern "C" fn secondary_irq(_stack_frame: &mut InterruptStackFrame) {
	unsafe {
		PICS.lock()
			.notify_end_of_interrupt(InterruptIndex::Rtc.as_u8());
	}
}

pub fn init() {
	unsafe {
		let mut pics = PICS.lock();
		pics.initialize();
		pics.write_masks(PIC_1_MASK, PIC_2_MASK);
	}
	println_serial!("Interrupts successfully initialized");
}

pub fn enable() {
	use core::arch::asm;
	unsafe {
		asm!("sti", options(preserves_flags, nostack));
	}
}

pub fn disable() {
	use core::arch::asm;
	unsafe {
		asm!("cli", options(preserves_flags, nostack));
	}
}

/// Returns true when the IF flag is set in EFLAGS.
pub fn are_enabled() -> bool {
	use core::arch::asm;
	let eflags: u32;
	unsafe {
		asm!("pushfd", "pop {}", out(reg) eflags, options(preserves_flags));
	}
	eflags & 0x200 != 0
}
