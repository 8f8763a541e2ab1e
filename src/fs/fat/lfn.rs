//! Long file names and 8.3 short-name generation.

use crate::fs::error::{FsError, FsResult};
use crate::fs::fat::dirent::{LfnEntry, LFN_LAST_FLAG, LFN_SEQUENCE_MASK};
use crate::utils::debug::LogLevel;

pub const LFN_CHARS_PER_ENTRY: usize = 13;
pub const MAX_LFN_ENTRIES: usize = 20;
pub const MAX_LFN_LENGTH: usize = 255;
pub const MAX_NUMERIC_TAIL: u32 = 999_999;

/// Fold-right-rotate checksum of an 11-byte short name, shared by every LFN
/// entry attached to it.
pub fn short_name_checksum(name: &[u8; 11]) -> u8 {
	let mut sum: u8 = 0;
	for &byte in name {
		sum = ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(byte);
	}
	sum
}

/// Rebuilds a long name from its entries, in whatever order they were
/// collected; each entry's sequence number fixes its 13-character window.
/// Returns the name length after writing into `out`, truncating if needed.
pub fn reconstruct(entries: &[LfnEntry], out: &mut [u8]) -> usize {
	let mut name = [0u8; MAX_LFN_LENGTH];
	let mut length = 0;

	for entry in entries {
		let sequence = (entry.sequence & LFN_SEQUENCE_MASK) as usize;
		if sequence == 0 || sequence > MAX_LFN_ENTRIES {
			continue;
		}
		let base = (sequence - 1) * LFN_CHARS_PER_ENTRY;
		for (i, &unit) in entry.units().iter().enumerate() {
			if unit == 0x0000 || unit == 0xffff {
				continue;
			}
			let position = base + i;
			if position >= MAX_LFN_LENGTH {
				continue;
			}
			name[position] = if unit < 0x80 { unit as u8 } else { b'?' };
			if position + 1 > length {
				length = position + 1;
			}
		}
	}

	if length > out.len() {
		log!(LogLevel::Warning, "Long name truncated from {} to {} bytes", length, out.len());
		length = out.len();
	}
	out[..length].copy_from_slice(&name[..length]);
	length
}

/// Produces the on-disk LFN run for `name` in storage order: the entry
/// carrying the tail of the name comes first and carries the last-entry flag.
/// Returns how many of `out`'s slots were filled.
pub fn generate(
	name: &[u8],
	checksum: u8,
	out: &mut [LfnEntry; MAX_LFN_ENTRIES],
) -> FsResult<usize> {
	if name.is_empty() {
		return Err(FsError::InvalidArgument);
	}
	if name.len() > MAX_LFN_LENGTH {
		return Err(FsError::NameTooLong);
	}
	let count = name.len().div_ceil(LFN_CHARS_PER_ENTRY);

	for slot in 0..count {
		let sequence = (count - slot) as u8;
		let mut units = [0xffffu16; LFN_CHARS_PER_ENTRY];
		let base = (sequence as usize - 1) * LFN_CHARS_PER_ENTRY;
		for (i, unit) in units.iter_mut().enumerate() {
			let position = base + i;
			if position < name.len() {
				*unit = name[position] as u16;
			} else if position == name.len() {
				*unit = 0x0000;
			}
		}
		let mut entry = LfnEntry {
			sequence: if slot == 0 { sequence | LFN_LAST_FLAG } else { sequence },
			name1: [0; 5],
			checksum,
			name2: [0; 6],
			name3: [0; 2],
		};
		entry.set_units(&units);
		out[slot] = entry;
	}
	Ok(count)
}

fn is_valid_short_char(byte: u8) -> bool {
	byte.is_ascii_uppercase()
		|| byte.is_ascii_digit()
		|| byte > 0x7f
		|| b"!#$%&'()-@^_`{}~".contains(&byte)
}

/// Derives the base 11-byte short name from a long name: uppercase, spaces
/// and dots stripped, split at the last dot, disallowed characters replaced.
pub fn format_short_name(name: &[u8]) -> [u8; 11] {
	let mut short = [b' '; 11];

	let (base, extension) = match name.iter().rposition(|&c| c == b'.') {
		Some(position) => (&name[..position], &name[position + 1..]),
		None => (name, &name[..0]),
	};

	let mut cursor = 0;
	for &byte in base {
		if cursor == 8 {
			break;
		}
		if byte == b' ' || byte == b'.' {
			continue;
		}
		let upper = byte.to_ascii_uppercase();
		short[cursor] = if is_valid_short_char(upper) { upper } else { b'_' };
		cursor += 1;
	}
	if cursor == 0 {
		short[..7].copy_from_slice(b"NO_NAME");
	}

	let mut cursor = 8;
	for &byte in extension {
		if cursor == 11 {
			break;
		}
		if byte == b' ' || byte == b'.' {
			continue;
		}
		let upper = byte.to_ascii_uppercase();
		short[cursor] = if is_valid_short_char(upper) { upper } else { b'_' };
		cursor += 1;
	}
	short
}

/// Rewrites the base part of a short name with a `~N` collision suffix,
/// keeping as many leading base characters as fit.
pub fn apply_numeric_tail(base: &[u8; 11], n: u32) -> FsResult<[u8; 11]> {
	if n == 0 || n > MAX_NUMERIC_TAIL {
		return Err(FsError::NameTooLong);
	}

	let mut digits = [0u8; 6];
	let mut count = 0;
	let mut value = n;
	while value > 0 {
		digits[count] = b'0' + (value % 10) as u8;
		value /= 10;
		count += 1;
	}
	let tail_len = count + 1;

	let base_len = base[..8]
		.iter()
		.rposition(|&c| c != b' ')
		.map_or(0, |p| p + 1);
	let keep = (8 - tail_len).min(base_len);

	let mut out = *base;
	for slot in out[..8].iter_mut().skip(keep) {
		*slot = b' ';
	}
	out[keep] = b'~';
	for i in 0..count {
		out[keep + 1 + i] = digits[count - 1 - i];
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn checksum_matches_reference_values() {
		assert_eq!(short_name_checksum(b"TEST    TXT"), 0x8f);
		assert_eq!(short_name_checksum(b"README  MD "), 0xf3);
		assert_eq!(short_name_checksum(b"           "), 0xf7);
	}

	#[test]
	fn short_name_formatting() {
		assert_eq!(format_short_name(b"TEST.TXT"), *b"TEST    TXT");
		assert_eq!(format_short_name(b"readme.md"), *b"README  MD ");
		assert_eq!(format_short_name(b"verylongfilename01.txt"), *b"VERYLONGTXT");
		assert_eq!(format_short_name(b"a b.c d"), *b"AB      CD ");
		assert_eq!(format_short_name(b"no_extension"), *b"NO_EXTEN   ");
		assert_eq!(format_short_name(b"bad*chars?.t|"), *b"BAD_CHART_ ");
		assert_eq!(format_short_name(b"...."), *b"NO_NAME    ");
	}

	#[test]
	fn numeric_tail_keeps_leading_base_characters() {
		assert_eq!(apply_numeric_tail(b"VERYLONGTXT", 1).unwrap(), *b"VERYLO~1TXT");
		assert_eq!(apply_numeric_tail(b"VERYLONGTXT", 10).unwrap(), *b"VERYL~10TXT");
		assert_eq!(apply_numeric_tail(b"VERYLONGTXT", 999_999).unwrap(), *b"V~999999TXT");
		assert_eq!(apply_numeric_tail(b"AB      TXT", 7).unwrap(), *b"AB~7    TXT");
		assert_eq!(apply_numeric_tail(b"VERYLONGTXT", 0).unwrap_err(), FsError::NameTooLong);
		assert_eq!(
			apply_numeric_tail(b"VERYLONGTXT", 1_000_000).unwrap_err(),
			FsError::NameTooLong
		);
	}

	fn round_trip(name: &[u8]) {
		let checksum = short_name_checksum(&format_short_name(name));
		let mut entries = [LfnEntry {
			sequence: 0,
			name1: [0; 5],
			checksum: 0,
			name2: [0; 6],
			name3: [0; 2],
		}; MAX_LFN_ENTRIES];
		let count = generate(name, checksum, &mut entries).unwrap();

		assert_eq!(entries[0].sequence & LFN_LAST_FLAG, LFN_LAST_FLAG);
		assert_eq!(entries[0].sequence & LFN_SEQUENCE_MASK, count as u8);
		assert_eq!(entries[count - 1].sequence & LFN_SEQUENCE_MASK, 1);
		for entry in &entries[..count] {
			assert_eq!(entry.checksum, checksum);
		}

		let mut out = [0u8; MAX_LFN_LENGTH];
		let length = reconstruct(&entries[..count], &mut out);
		assert_eq!(&out[..length], name);
	}

	#[test]
	fn generated_names_reconstruct_byte_exact() {
		round_trip(b"hello.txt");
		round_trip(b"a");
		round_trip(b"exactly13char"); // 13 chars fill one entry with no terminator
		round_trip(b"verylongfilename01.txt");
		let long = [b'x'; MAX_LFN_LENGTH];
		round_trip(&long);
	}

	#[test]
	fn entry_count_is_the_ceiling_of_length_over_thirteen() {
		let mut entries = [LfnEntry {
			sequence: 0,
			name1: [0; 5],
			checksum: 0,
			name2: [0; 6],
			name3: [0; 2],
		}; MAX_LFN_ENTRIES];
		assert_eq!(generate(b"a", 0, &mut entries).unwrap(), 1);
		assert_eq!(generate(b"exactly13char", 0, &mut entries).unwrap(), 1);
		assert_eq!(generate(b"fourteen chars", 0, &mut entries).unwrap(), 2);
		assert_eq!(generate(&[b'x'; MAX_LFN_LENGTH], 0, &mut entries).unwrap(), 20);
	}

	#[test]
	fn generate_rejects_degenerate_names() {
		let mut entries = [LfnEntry {
			sequence: 0,
			name1: [0; 5],
			checksum: 0,
			name2: [0; 6],
			name3: [0; 2],
		}; MAX_LFN_ENTRIES];
		assert_eq!(generate(b"", 0, &mut entries).unwrap_err(), FsError::InvalidArgument);
		let too_long = [b'x'; MAX_LFN_LENGTH + 1];
		assert_eq!(generate(&too_long, 0, &mut entries).unwrap_err(), FsError::NameTooLong);
	}
}
