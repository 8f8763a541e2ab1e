//! On-disk directory entry codecs, 8.3 and LFN.

use bitflags::bitflags;

pub const DIR_ENTRY_SIZE: usize = 32;
pub const END_OF_DIRECTORY: u8 = 0x00;
pub const DELETED_MARKER: u8 = 0xe5;
/// An initial 0xE5 byte in a real name is stored escaped as 0x05.
pub const ESCAPED_DELETED: u8 = 0x05;

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct DirAttributes: u8 {
		const READ_ONLY = 0x01;
		const HIDDEN = 0x02;
		const SYSTEM = 0x04;
		const VOLUME_ID = 0x08;
		const DIRECTORY = 0x10;
		const ARCHIVE = 0x20;
	}
}

/// The four low attribute bits set together mark a long-name entry.
pub const LFN_ATTRIBUTES: u8 = 0x0f;

/// A 32-byte 8.3 directory entry. Timestamps are carried verbatim but never
/// set by this driver; newly created entries leave them zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
	pub name: [u8; 11],
	pub attributes: u8,
	pub nt_reserved: u8,
	pub creation_time_tenths: u8,
	pub creation_time: u16,
	pub creation_date: u16,
	pub access_date: u16,
	pub first_cluster_high: u16,
	pub write_time: u16,
	pub write_date: u16,
	pub first_cluster_low: u16,
	pub size: u32,
}

impl DirEntry {
	pub fn new(name: [u8; 11], attributes: DirAttributes) -> Self {
		DirEntry {
			name,
			attributes: attributes.bits(),
			nt_reserved: 0,
			creation_time_tenths: 0,
			creation_time: 0,
			creation_date: 0,
			access_date: 0,
			first_cluster_high: 0,
			write_time: 0,
			write_date: 0,
			first_cluster_low: 0,
			size: 0,
		}
	}

	pub fn from_bytes(bytes: &[u8; DIR_ENTRY_SIZE]) -> Self {
		let mut name = [0; 11];
		name.copy_from_slice(&bytes[0..11]);
		DirEntry {
			name,
			attributes: bytes[11],
			nt_reserved: bytes[12],
			creation_time_tenths: bytes[13],
			creation_time: u16::from_le_bytes([bytes[14], bytes[15]]),
			creation_date: u16::from_le_bytes([bytes[16], bytes[17]]),
			access_date: u16::from_le_bytes([bytes[18], bytes[19]]),
			first_cluster_high: u16::from_le_bytes([bytes[20], bytes[21]]),
			write_time: u16::from_le_bytes([bytes[22], bytes[23]]),
			write_date: u16::from_le_bytes([bytes[24], bytes[25]]),
			first_cluster_low: u16::from_le_bytes([bytes[26], bytes[27]]),
			size: u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]),
		}
	}

	pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
		let mut bytes = [0; DIR_ENTRY_SIZE];
		bytes[0..11].copy_from_slice(&self.name);
		bytes[11] = self.attributes;
		bytes[12] = self.nt_reserved;
		bytes[13] = self.creation_time_tenths;
		bytes[14..16].copy_from_slice(&self.creation_time.to_le_bytes());
		bytes[16..18].copy_from_slice(&self.creation_date.to_le_bytes());
		bytes[18..20].copy_from_slice(&self.access_date.to_le_bytes());
		bytes[20..22].copy_from_slice(&self.first_cluster_high.to_le_bytes());
		bytes[22..24].copy_from_slice(&self.write_time.to_le_bytes());
		bytes[24..26].copy_from_slice(&self.write_date.to_le_bytes());
		bytes[26..28].copy_from_slice(&self.first_cluster_low.to_le_bytes());
		bytes[28..32].copy_from_slice(&self.size.to_le_bytes());
		bytes
	}

	pub fn first_cluster(&self) -> u32 {
		(self.first_cluster_high as u32) << 16 | self.first_cluster_low as u32
	}

	pub fn set_first_cluster(&mut self, cluster: u32) {
		self.first_cluster_high = (cluster >> 16) as u16;
		self.first_cluster_low = cluster as u16;
	}

	pub fn is_end(&self) -> bool {
		self.name[0] == END_OF_DIRECTORY
	}

	pub fn is_deleted(&self) -> bool {
		self.name[0] == DELETED_MARKER
	}

	pub fn is_lfn(&self) -> bool {
		self.attributes & LFN_ATTRIBUTES == LFN_ATTRIBUTES
	}

	pub fn is_volume_label(&self) -> bool {
		!self.is_lfn() && self.attributes & DirAttributes::VOLUME_ID.bits() != 0
	}

	pub fn is_directory(&self) -> bool {
		self.attributes & DirAttributes::DIRECTORY.bits() != 0
	}

	pub fn is_read_only(&self) -> bool {
		self.attributes & DirAttributes::READ_ONLY.bits() != 0
	}
}

/// A 32-byte long-file-name entry: 13 UTF-16 code units in three runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LfnEntry {
	pub sequence: u8,
	pub name1: [u16; 5],
	pub checksum: u8,
	pub name2: [u16; 6],
	pub name3: [u16; 2],
}

/// Set on the sequence byte of the entry stored first on disk.
pub const LFN_LAST_FLAG: u8 = 0x40;
pub const LFN_SEQUENCE_MASK: u8 = 0x3f;

impl LfnEntry {
	pub fn from_bytes(bytes: &[u8; DIR_ENTRY_SIZE]) -> Self {
		let mut name1 = [0u16; 5];
		for (i, unit) in name1.iter_mut().enumerate() {
			*unit = u16::from_le_bytes([bytes[1 + i * 2], bytes[2 + i * 2]]);
		}
		let mut name2 = [0u16; 6];
		for (i, unit) in name2.iter_mut().enumerate() {
			*unit = u16::from_le_bytes([bytes[14 + i * 2], bytes[15 + i * 2]]);
		}
		let mut name3 = [0u16; 2];
		for (i, unit) in name3.iter_mut().enumerate() {
			*unit = u16::from_le_bytes([bytes[28 + i * 2], bytes[29 + i * 2]]);
		}
		LfnEntry {
			sequence: bytes[0],
			name1,
			checksum: bytes[13],
			name2,
			name3,
		}
	}

	pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
		let mut bytes = [0; DIR_ENTRY_SIZE];
		bytes[0] = self.sequence;
		for (i, unit) in self.name1.iter().enumerate() {
			bytes[1 + i * 2..3 + i * 2].copy_from_slice(&unit.to_le_bytes());
		}
		bytes[11] = LFN_ATTRIBUTES;
		bytes[13] = self.checksum;
		for (i, unit) in self.name2.iter().enumerate() {
			bytes[14 + i * 2..16 + i * 2].copy_from_slice(&unit.to_le_bytes());
		}
		// bytes 26..28 stay zero, the reserved first-cluster field
		for (i, unit) in self.name3.iter().enumerate() {
			bytes[28 + i * 2..30 + i * 2].copy_from_slice(&unit.to_le_bytes());
		}
		bytes
	}

	/// The 13 code units in name order.
	pub fn units(&self) -> [u16; 13] {
		let mut units = [0u16; 13];
		units[0..5].copy_from_slice(&self.name1);
		units[5..11].copy_from_slice(&self.name2);
		units[11..13].copy_from_slice(&self.name3);
		units
	}

	pub fn set_units(&mut self, units: &[u16; 13]) {
		self.name1.copy_from_slice(&units[0..5]);
		self.name2.copy_from_slice(&units[5..11]);
		self.name3.copy_from_slice(&units[11..13]);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn short_entry_round_trips_through_bytes() {
		let mut entry = DirEntry::new(*b"HELLO   TXT", DirAttributes::ARCHIVE);
		entry.set_first_cluster(0x0004_0002);
		entry.size = 1234;
		let decoded = DirEntry::from_bytes(&entry.to_bytes());
		assert_eq!(decoded, entry);
		assert_eq!(decoded.first_cluster(), 0x0004_0002);
	}

	#[test]
	fn lfn_entry_round_trips_and_keeps_reserved_cluster_zero() {
		let mut entry = LfnEntry {
			sequence: 0x41,
			name1: [0; 5],
			checksum: 0x8f,
			name2: [0; 6],
			name3: [0; 2],
		};
		let mut units = [0xffffu16; 13];
		for (i, b) in b"hello.txt".iter().enumerate() {
			units[i] = *b as u16;
		}
		units[9] = 0;
		entry.set_units(&units);

		let bytes = entry.to_bytes();
		assert_eq!(bytes[11], LFN_ATTRIBUTES);
		assert_eq!(&bytes[26..28], &[0, 0]);
		assert_eq!(LfnEntry::from_bytes(&bytes), entry);
	}

	#[test]
	fn attribute_classification() {
		let lfn = DirEntry::new(*b"AAAAAAAAAAA", DirAttributes::empty());
		let mut lfn_bytes = lfn.to_bytes();
		lfn_bytes[11] = LFN_ATTRIBUTES;
		assert!(DirEntry::from_bytes(&lfn_bytes).is_lfn());

		let dir = DirEntry::new(*b"SUBDIR     ", DirAttributes::DIRECTORY);
		assert!(dir.is_directory());
		assert!(!dir.is_lfn());

		let label = DirEntry::new(*b"VOLUME     ", DirAttributes::VOLUME_ID);
		assert!(label.is_volume_label());
	}
}
