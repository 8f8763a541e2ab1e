//! # Programmable Interval Timer (PIT)
//!
//! Programs channel 0 of the 8254 as a rate generator at 1 kHz and keeps a
//! monotonic tick counter incremented from the timer IRQ. Sleeping comes in
//! two flavors: a busy spin on the tick counter, and an interrupt-friendly
//! variant that falls back to busy waiting for very short durations or when
//! interrupts are off.
//!
//! The divisor arithmetic is portable and unit-tested on the host.

use core::sync::atomic::{AtomicU32, Ordering};

/// Base oscillator frequency of the 8254, in Hz.
pub const PIT_BASE_FREQUENCY: u32 = 1_193_180;

/// Configured tick rate: one tick per millisecond.
pub const TICK_FREQUENCY: u32 = 1_000;

/// Below this duration the interrupt-driven sleep degrades to busy waiting.
const MIN_INTERRUPT_SLEEP_MS: u32 = 5;

#[cfg(target_arch = "x86")]
const PIT_CHANNEL_0: u16 = 0x40;
#[cfg(target_arch = "x86")]
const PIT_COMMAND: u16 = 0x43;

/// Channel 0, lobyte/hibyte access, mode 2 (rate generator), binary.
#[cfg(target_arch = "x86")]
const PIT_RATE_GENERATOR: u8 = 0x34;

/// Monotonic tick counter, incremented by the timer IRQ handler.
pub static TICKS: AtomicU32 = AtomicU32::new(0);

/// Computes the channel-0 reload value for a target frequency.
///
/// The hardware divides its base oscillator by this value; it is clamped to
/// `[2, 65536]`, with 65536 encoded as 0 per the 8254 convention.
pub fn divisor(frequency: u32) -> u16 {
	let raw = PIT_BASE_FREQUENCY / frequency.max(1);
	let clamped = raw.clamp(2, 65_536);
	(clamped & 0xffff) as u16
}

/// Called from the timer IRQ handler.
pub fn tick() {
	TICKS.fetch_add(1, Ordering::SeqCst);
}

/// Current tick count. Readers may observe a stale value, never a decrease.
pub fn ticks() -> u32 {
	TICKS.load(Ordering::SeqCst)
}

/// Programs channel 0 for the configured tick frequency.
#[cfg(target_arch = "x86")]
pub fn init() {
	use crate::utils::debug::LogLevel;
	use crate::utils::io::outb;

	let reload = divisor(TICK_FREQUENCY);
	unsafe {
		outb(PIT_COMMAND, PIT_RATE_GENERATOR);
		outb(PIT_CHANNEL_0, (reload & 0xff) as u8);
		outb(PIT_CHANNEL_0, ((reload >> 8) & 0xff) as u8);
	}
	log!(
		LogLevel::Info,
		"PIT channel 0 programmed at {} Hz (divisor {})",
		TICK_FREQUENCY,
		reload
	);
}

/// Spins until at least `ms` ticks have elapsed.
#[cfg(target_arch = "x86")]
pub fn busy_sleep(ms: u32) {
	let start = ticks();
	while ticks().wrapping_sub(start) < ms {
		core::hint::spin_loop();
	}
}

/// Sleeps for at least `ms` milliseconds.
///
/// Short waits and waits with interrupts masked degrade to `busy_sleep`;
/// otherwise the loop yields with a pause hint between tick reads so the
/// timer IRQ keeps firing. Overshoot is bounded by one tick plus handler
/// latency.
#[cfg(target_arch = "x86")]
pub fn sleep(ms: u32) {
	use crate::exceptions::interrupts;

	if ms < MIN_INTERRUPT_SLEEP_MS || !interrupts::are_enabled() {
		busy_sleep(ms);
		return;
	}

	let start = ticks();
	while ticks().wrapping_sub(start) < ms {
		core::hint::spin_loop();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn divisor_hits_the_documented_clamp() {
		assert_eq!(divisor(1_193_180), 2);
		assert_eq!(divisor(u32::MAX), 2);
		assert_eq!(divisor(1), 0); // 65536 encodes as 0
		assert_eq!(divisor(0), 0);
	}

	#[test]
	fn divisor_for_one_kilohertz() {
		assert_eq!(divisor(1_000), 1_193);
	}

	#[test]
	fn ticks_never_decrease() {
		let before = ticks();
		for _ in 0..1_000 {
			tick();
		}
		let after = ticks();
		assert!(after.wrapping_sub(before) == 1_000);
	}
}
