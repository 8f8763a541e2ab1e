use core::arch::asm;

/// Reads a byte from the given I/O port.
pub unsafe fn inb(port: u16) -> u8 {
	let value: u8;
	asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack));
	value
}

/// Reads a word from the given I/O port.
#[allow(dead_code)]
pub unsafe fn inw(port: u16) -> u16 {
	let value: u16;
	asm!("in ax, dx", out("ax") value, in("dx") port, options(nomem, nostack));
	value
}

/// Writes a byte to the given I/O port.
pub unsafe fn outb(port: u16, value: u8) {
	asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack));
}

/// Writes a word to the given I/O port.
#[allow(dead_code)]
pub unsafe fn outw(port: u16, value: u16) {
	asm!("out dx, ax", in("dx") port, in("ax") value, options(nomem, nostack));
}

/// Reads the model-specific register `msr` as an edx:eax pair.
#[allow(dead_code)]
pub unsafe fn rdmsr(msr: u32) -> u64 {
	let low: u32;
	let high: u32;
	asm!("rdmsr", in("ecx") msr, out("eax") low, out("edx") high, options(nomem, nostack));
	(high as u64) << 32 | low as u64
}

/// Writes the model-specific register `msr` from an edx:eax pair.
#[allow(dead_code)]
pub unsafe fn wrmsr(msr: u32, value: u64) {
	asm!(
		"wrmsr",
		in("ecx") msr,
		in("eax") value as u32,
		in("edx") (value >> 32) as u32,
		options(nomem, nostack)
	);
}

/// Writes to an unused port, giving slow devices time to settle.
pub unsafe fn io_wait() {
	outb(0x80, 0);
}
