//! Structures for the x86 architecture

/// Global Descriptor Table
pub mod gdt;

/// Interrupt Descriptor Table
pub mod idt;

/// Access flags for GDT entries
pub mod accessflags;
