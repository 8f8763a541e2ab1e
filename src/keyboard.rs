//! # PS/2 Keyboard Driver
//!
//! Turns raw scancodes from the IRQ 1 handler into a stream of cooked ASCII
//! bytes. Modifier state (shift, caps lock, num lock) is tracked with
//! atomics so the decode path can run straight from the interrupt handler;
//! cooked bytes land in a fixed power-of-two ring buffer that drops new
//! keystrokes when full (the producer never blocks).
//!
//! Two scancode tables describe a layout (unshifted and shifted); US QWERTY
//! and a plain-ASCII AZERTY are built in, switchable at runtime.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const BUFFER_SIZE: usize = 256;
const BUFFER_MASK: usize = BUFFER_SIZE - 1;

const EXTENDED_PREFIX: u8 = 0xe0;
const RELEASE_BIT: u8 = 0x80;

const SCANCODE_LEFT_SHIFT: u8 = 0x2a;
const SCANCODE_RIGHT_SHIFT: u8 = 0x36;
const SCANCODE_CAPS_LOCK: u8 = 0x3a;
const SCANCODE_NUM_LOCK: u8 = 0x45;

const LAYOUT_TABLE_SIZE: usize = 0x3a;

/// Scancode-indexed translation tables for one layout.
pub struct Layout {
	normal: [u8; LAYOUT_TABLE_SIZE],
	shifted: [u8; LAYOUT_TABLE_SIZE],
}

#[rustfmt::skip]
static QWERTY: Layout = Layout {
	normal: [
		0, 0x1b, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
		b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0,
		b'a', b's', b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\',
		b'z', b'x', b'c', b'v', b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ',
	],
	shifted: [
		0, 0x1b, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0x08, b'\t',
		b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0,
		b'A', b'S', b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0, b'|',
		b'Z', b'X', b'C', b'V', b'B', b'N', b'M', b'<', b'>', b'?', 0, b'*', 0, b' ',
	],
};

// Accented AZERTY positions with no ASCII equivalent map to 0 and are dropped.
#[rustfmt::skip]
static AZERTY: Layout = Layout {
	normal: [
		0, 0x1b, b'&', 0, b'"', b'\'', b'(', b'-', 0, b'_', 0, 0, b')', b'=', 0x08, b'\t',
		b'a', b'z', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'^', b'$', b'\n', 0,
		b'q', b's', b'd', b'f', b'g', b'h', b'j', b'k', b'l', b'm', 0, 0, 0, b'*',
		b'w', b'x', b'c', b'v', b'b', b'n', b',', b';', b':', b'!', 0, b'*', 0, b' ',
	],
	shifted: [
		0, 0x1b, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', 0, b'+', 0x08, b'\t',
		b'A', b'Z', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', 0, 0, b'\n', 0,
		b'Q', b'S', b'D', b'F', b'G', b'H', b'J', b'K', b'L', b'M', b'%', 0, 0, 0,
		b'W', b'X', b'C', b'V', b'B', b'N', b'?', b'.', b'/', 0, 0, b'*', 0, b' ',
	],
};

/// Single-producer ring buffer of cooked bytes with masked indices.
///
/// The IRQ handler is the only writer; readers poll. A full buffer drops
/// the incoming byte at the tail so existing bytes are never reordered.
pub struct KeyBuffer {
	head: AtomicUsize,
	tail: AtomicUsize,
	bytes: UnsafeCell<[u8; BUFFER_SIZE]>,
}

unsafe impl Sync for KeyBuffer {}

impl KeyBuffer {
	pub const fn new() -> Self {
		Self {
			head: AtomicUsize::new(0),
			tail: AtomicUsize::new(0),
			bytes: UnsafeCell::new([0; BUFFER_SIZE]),
		}
	}

	/// Enqueues one byte; returns false when the buffer is full.
	pub fn push(&self, byte: u8) -> bool {
		let head = self.head.load(Ordering::Relaxed);
		let next = (head + 1) & BUFFER_MASK;
		if next == self.tail.load(Ordering::Acquire) {
			return false;
		}
		unsafe {
			(*self.bytes.get())[head] = byte;
		}
		self.head.store(next, Ordering::Release);
		true
	}

	/// Dequeues one byte, if any.
	pub fn pop(&self) -> Option<u8> {
		let tail = self.tail.load(Ordering::Relaxed);
		if tail == self.head.load(Ordering::Acquire) {
			return None;
		}
		let byte = unsafe { (*self.bytes.get())[tail] };
		self.tail.store((tail + 1) & BUFFER_MASK, Ordering::Release);
		Some(byte)
	}

	pub fn is_empty(&self) -> bool {
		self.tail.load(Ordering::Acquire) == self.head.load(Ordering::Acquire)
	}
}

pub struct Keyboard {
	shift: AtomicBool,
	caps_lock: AtomicBool,
	num_lock: AtomicBool,
	extended: AtomicBool,
	qwerty: AtomicBool,
	buffer: KeyBuffer,
}

pub static KEYBOARD: Keyboard = Keyboard::new();

impl Keyboard {
	pub const fn new() -> Self {
		Self {
			shift: AtomicBool::new(false),
			caps_lock: AtomicBool::new(false),
			num_lock: AtomicBool::new(false),
			extended: AtomicBool::new(false),
			qwerty: AtomicBool::new(true),
			buffer: KeyBuffer::new(),
		}
	}

	/// Feeds one raw scancode into the driver. Called from the IRQ handler.
	pub fn handle_scancode(&self, scancode: u8) {
		if scancode == EXTENDED_PREFIX {
			self.extended.store(true, Ordering::SeqCst);
			return;
		}
		// Extended keys (arrows, right ctrl, ...) carry no cooked byte.
		if self.extended.swap(false, Ordering::SeqCst) {
			return;
		}

		match scancode {
			SCANCODE_LEFT_SHIFT | SCANCODE_RIGHT_SHIFT => {
				self.shift.store(true, Ordering::SeqCst)
			}
			s if s == SCANCODE_LEFT_SHIFT | RELEASE_BIT || s == SCANCODE_RIGHT_SHIFT | RELEASE_BIT => {
				self.shift.store(false, Ordering::SeqCst)
			}
			SCANCODE_CAPS_LOCK => {
				let caps_lock = self.caps_lock.load(Ordering::SeqCst);
				self.caps_lock.store(!caps_lock, Ordering::SeqCst);
			}
			SCANCODE_NUM_LOCK => {
				let num_lock = self.num_lock.load(Ordering::SeqCst);
				self.num_lock.store(!num_lock, Ordering::SeqCst);
			}
			s if s & RELEASE_BIT != 0 => (),
			_ => {
				let byte = self.scancode_to_char(scancode);
				if byte != 0 {
					// Full buffer: the keystroke is dropped, never blocks.
					let _ = self.buffer.push(byte);
				}
			}
		}
	}

	#[rustfmt::skip]
	fn scancode_to_char(&self, scancode: u8) -> u8 {
		let shift = self.shift.load(Ordering::SeqCst);
		let num_lock = self.num_lock.load(Ordering::SeqCst);
		let caps_lock = self.caps_lock.load(Ordering::SeqCst);

		// Keypad block sits above the layout tables.
		let byte = match scancode {
			0x47 => if num_lock { b'7' } else { 0 }
			0x48 => if num_lock { b'8' } else { 0 }
			0x49 => if num_lock { b'9' } else { 0 }
			0x4a => b'-',
			0x4b => if num_lock { b'4' } else { 0 }
			0x4c => if num_lock { b'5' } else { 0 }
			0x4d => if num_lock { b'6' } else { 0 }
			0x4e => b'+',
			0x4f => if num_lock { b'1' } else { 0 }
			0x50 => if num_lock { b'2' } else { 0 }
			0x51 => if num_lock { b'3' } else { 0 }
			0x52 => if num_lock { b'0' } else { 0 }
			0x53 => if num_lock { b'.' } else { 0 }
			s if (s as usize) < LAYOUT_TABLE_SIZE => {
				let layout = if self.qwerty.load(Ordering::SeqCst) { &QWERTY } else { &AZERTY };
				if shift { layout.shifted[s as usize] } else { layout.normal[s as usize] }
			}
			_ => 0,
		};

		if caps_lock && byte.is_ascii_alphabetic() {
			byte ^ 0x20
		} else {
			byte
		}
	}

	/// Non-blocking read of the next cooked byte.
	pub fn read(&self) -> Option<u8> {
		self.buffer.pop()
	}

	pub fn data_available(&self) -> bool {
		!self.buffer.is_empty()
	}

	/// Blocking read; halts between polls until a byte arrives.
	#[cfg(target_arch = "x86")]
	pub fn getchar(&self) -> u8 {
		loop {
			if let Some(byte) = self.read() {
				return byte;
			}
			crate::utils::librs::hlt();
		}
	}

	pub fn toggle_layout(&self) {
		let qwerty = self.qwerty.load(Ordering::SeqCst);
		self.qwerty.store(!qwerty, Ordering::SeqCst);
	}
}
