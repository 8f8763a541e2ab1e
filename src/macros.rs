//! # Macros and Printing Utilities
//!
//! Provides macros and utility functions for printing text to the VGA text buffer and serial port.
//! It includes macros for both general printing (`print!` and `println!`) and serial printing
//! (`print_serial!` and `println_serial!`), a levelled `log!` macro, and the naked wrappers that
//! interrupt handlers are built from.
//!
//! On non-x86 targets every printing macro compiles to a no-op, so the portable parts of the
//! kernel (heap, keyboard decoding, the filesystem layer) can log unconditionally.

#[cfg(target_arch = "x86")]
use crate::exceptions::interrupts;
#[cfg(target_arch = "x86")]
use crate::utils::debug::DEBUG;
#[cfg(target_arch = "x86")]
use crate::vga::video_graphics_array::WRITER;
#[cfg(target_arch = "x86")]
use core::fmt;

/// Macro for printing formatted text to the VGA buffer.
#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! print {
	($($arg:tt)*) => ($crate::macros::print(format_args!($($arg)*)));
}

#[cfg(not(target_arch = "x86"))]
#[macro_export]
macro_rules! print {
	($($arg:tt)*) => {{
		let _ = format_args!($($arg)*);
	}};
}

/// Macro for printing formatted text with a newline to the VGA buffer.
#[macro_export]
macro_rules! println {
	() => (print!("\n"));
	($($arg:tt)*) => (print!("{}\n", format_args!($($arg)*)));
}

/// Macro for printing formatted text to the serial port.
#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! print_serial {
	($($arg:tt)*) => {
		$crate::macros::print_serial(format_args!($($arg)*))
	};
}

#[cfg(not(target_arch = "x86"))]
#[macro_export]
macro_rules! print_serial {
	($($arg:tt)*) => {{
		let _ = format_args!($($arg)*);
	}};
}

/// Macro for printing formatted text with a newline to the serial port.
#[macro_export]
macro_rules! println_serial {
	() => (print_serial!("\n"));
	($($arg:tt)*) => (print_serial!("{}\n", format_args!($($arg)*)));
}

/// Levelled logging to the serial port.
#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! log {
	($level:expr, $($arg:tt)*) => {{
		let level_str = $level.as_str();
		$crate::macros::print_serial(format_args!("{}", level_str));
		$crate::macros::print_serial(format_args!(": {}\n", format_args!($($arg)*)));
	}};
}

#[cfg(not(target_arch = "x86"))]
#[macro_export]
macro_rules! log {
	($level:expr, $($arg:tt)*) => {{
		let _ = $level.as_str();
		let _ = format_args!($($arg)*);
	}};
}

/// Macro for creating interrupt handler wrappers.
///
/// Generates a wrapper function for an interrupt handler. The wrapper sets up
/// a proper stack frame, saves and restores registers, and hands the handler a
/// pointer to the saved frame before returning with `iretd`.
#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! handler {
	($name: ident) => {{
		#[naked]
		extern "C" fn wrapper() {
			unsafe {
				asm!(
					// Set up stack frame
					"push ebp",
					"mov ebp, esp",

					// Save all general-purpose registers
					"pushad",

					// Calculate the correct stack frame pointer
					"mov eax, esp",
					"add eax, 36",
					"push eax",

					// Call the actual interrupt handler
					"call {}",

					// Restore all general-purpose registers
					"pop eax",
					"popad",

					// Restore base pointer and return from interrupt
					"pop ebp",
					"iretd",
					sym $name,
					options(noreturn)
				);
			}
		}
		wrapper as extern "C" fn()
	}};
}

#[cfg(target_arch = "x86")]
#[macro_export]
macro_rules! handler_with_error_code {
	($name: ident) => {{
		#[naked]
		extern "C" fn wrapper() {
			unsafe {
				asm!(
					// Set up stack frame
					"push ebp",
					"mov ebp, esp",

					// Save all general-purpose registers
					"pushad",

					// Retrieve error code
					"mov edx, [esp + 36]",

					// Calculate the correct stack frame pointer
					"lea eax, [esp + 40]",
					"push edx",
					"push eax",

					// Call the actual interrupt handler
					"call {}",

					"pop eax",
					"pop edx",

					// Restore all general-purpose registers
					"popad",

					"add esp, 4",

					// Restore base pointer and return from interrupt
					"pop ebp",
					"iretd",
					sym $name,
					options(noreturn)
				);
			}
		}
		wrapper as extern "C" fn()
	}};
}

/// Prints formatted text to the VGA buffer.
///
/// Disables interrupts, writes formatted text to the VGA buffer, and then re-enables interrupts.
#[cfg(target_arch = "x86")]
pub fn print(args: fmt::Arguments) {
	use core::fmt::Write;
	interrupts::disable();
	WRITER.lock().write_fmt(args).unwrap();
	interrupts::enable();
}

/// Prints formatted text to the serial port.
#[cfg(target_arch = "x86")]
pub fn print_serial(args: fmt::Arguments) {
	use core::fmt::Write;
	interrupts::disable();
	DEBUG
		.lock()
		.write_fmt(args)
		.expect("Printing to serial failed");
	interrupts::enable();
}
