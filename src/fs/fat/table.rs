//! In-memory FAT table with 12/16/32-bit entry access.
//!
//! One full FAT copy is loaded at mount and kept as raw little-endian bytes;
//! writes land here and reach the disk through `flush`, which rewrites only
//! the sectors that changed, in every FAT copy. FAT12 volumes are read-only:
//! the packed nibble arithmetic is implemented for reads, writes are refused.

use crate::fs::bcache::{BlockDevice, BufferCache, SECTOR_SIZE};
use crate::fs::error::{FsError, FsResult};
use crate::fs::fat::bpb::Geometry;
use crate::fs::fat::FatType;
use alloc::vec;
use alloc::vec::Vec;

pub const FAT32_ENTRY_MASK: u32 = 0x0fff_ffff;
pub const FREE_CLUSTER: u32 = 0;

pub struct FatTable {
	fat_type: FatType,
	bytes: Vec<u8>,
	entry_count: u32,
	dirty: bool,
}

impl FatTable {
	pub fn new(fat_type: FatType, bytes: Vec<u8>, entry_count: u32) -> Self {
		FatTable {
			fat_type,
			bytes,
			entry_count,
			dirty: false,
		}
	}

	/// Reads one full FAT copy from the reserved area into memory.
	pub fn load<D: BlockDevice>(
		cache: &mut BufferCache<D>,
		geometry: &Geometry,
	) -> FsResult<Self> {
		let mut bytes = vec![0u8; (geometry.fat_size as usize) * SECTOR_SIZE];
		for sector in 0..geometry.fat_size {
			let handle = cache.get(geometry.fat_start_lba + sector)?;
			let from = sector as usize * SECTOR_SIZE;
			bytes[from..from + SECTOR_SIZE].copy_from_slice(cache.data(handle));
			cache.release(handle);
		}
		Ok(FatTable::new(
			geometry.fat_type,
			bytes,
			geometry.total_data_clusters + 2,
		))
	}

	pub fn entry_count(&self) -> u32 {
		self.entry_count
	}

	pub fn is_dirty(&self) -> bool {
		self.dirty
	}

	pub fn get(&self, cluster: u32) -> FsResult<u32> {
		if cluster >= self.entry_count {
			return Err(FsError::InvalidArgument);
		}
		match self.fat_type {
			FatType::Fat12 => {
				let index = cluster as usize + cluster as usize / 2;
				if index + 1 >= self.bytes.len() {
					return Err(FsError::Corrupted);
				}
				let pair = u16::from_le_bytes([self.bytes[index], self.bytes[index + 1]]);
				if cluster & 1 == 1 {
					Ok((pair >> 4) as u32)
				} else {
					Ok((pair & 0x0fff) as u32)
				}
			}
			FatType::Fat16 => {
				let index = cluster as usize * 2;
				Ok(u16::from_le_bytes([self.bytes[index], self.bytes[index + 1]]) as u32)
			}
			FatType::Fat32 => {
				let index = cluster as usize * 4;
				let raw = u32::from_le_bytes([
					self.bytes[index],
					self.bytes[index + 1],
					self.bytes[index + 2],
					self.bytes[index + 3],
				]);
				Ok(raw & FAT32_ENTRY_MASK)
			}
		}
	}

	pub fn set(&mut self, cluster: u32, value: u32) -> FsResult<()> {
		if cluster >= self.entry_count {
			return Err(FsError::InvalidArgument);
		}
		match self.fat_type {
			FatType::Fat12 => Err(FsError::Unsupported),
			FatType::Fat16 => {
				let index = cluster as usize * 2;
				self.bytes[index..index + 2].copy_from_slice(&(value as u16).to_le_bytes());
				self.dirty = true;
				Ok(())
			}
			FatType::Fat32 => {
				let index = cluster as usize * 4;
				let old = u32::from_le_bytes([
					self.bytes[index],
					self.bytes[index + 1],
					self.bytes[index + 2],
					self.bytes[index + 3],
				]);
				let merged = (old & !FAT32_ENTRY_MASK) | (value & FAT32_ENTRY_MASK);
				self.bytes[index..index + 4].copy_from_slice(&merged.to_le_bytes());
				self.dirty = true;
				Ok(())
			}
		}
	}

	/// Next cluster in the chain, `None` at end-of-chain. A link to cluster
	/// 0 or 1 means the chain is damaged.
	pub fn next_cluster(&self, geometry: &Geometry, cluster: u32) -> FsResult<Option<u32>> {
		let value = self.get(cluster)?;
		if geometry.is_eoc(value) {
			return Ok(None);
		}
		if !geometry.is_valid_cluster(value) {
			return Err(FsError::Corrupted);
		}
		Ok(Some(value))
	}

	/// Writes changed sectors back through the cache, into every FAT copy.
	pub fn flush<D: BlockDevice>(
		&mut self,
		cache: &mut BufferCache<D>,
		geometry: &Geometry,
	) -> FsResult<()> {
		if !self.dirty {
			return Ok(());
		}
		for copy in 0..geometry.num_fats {
			let base = geometry.fat_start_lba + copy * geometry.fat_size;
			for sector in 0..geometry.fat_size {
				let from = sector as usize * SECTOR_SIZE;
				let handle = cache.get(base + sector)?;
				if cache.data(handle)[..] != self.bytes[from..from + SECTOR_SIZE] {
					cache
						.data_mut(handle)
						.copy_from_slice(&self.bytes[from..from + SECTOR_SIZE]);
					cache.mark_dirty(handle);
				}
				cache.release(handle);
			}
		}
		self.dirty = false;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fat16_table(entries: &[u16]) -> FatTable {
		let mut bytes = vec![0u8; SECTOR_SIZE];
		for (i, e) in entries.iter().enumerate() {
			bytes[i * 2..i * 2 + 2].copy_from_slice(&e.to_le_bytes());
		}
		FatTable::new(FatType::Fat16, bytes, entries.len() as u32)
	}

	#[test]
	fn fat12_packed_reads() {
		// entries: 0xff8, 0xfff, 0x003, 0xfff
		let bytes = vec![0xf8, 0xff, 0xff, 0x03, 0xf0, 0xff];
		let table = FatTable::new(FatType::Fat12, bytes, 4);
		assert_eq!(table.get(2).unwrap(), 3);
		assert_eq!(table.get(3).unwrap(), 0xfff);
	}

	#[test]
	fn fat12_writes_are_refused() {
		let table_bytes = vec![0u8; 16];
		let mut table = FatTable::new(FatType::Fat12, table_bytes, 8);
		assert_eq!(table.set(2, 3).unwrap_err(), FsError::Unsupported);
		assert!(!table.is_dirty());
	}

	#[test]
	fn fat16_set_then_get() {
		let mut table = fat16_table(&[0xfff8, 0xffff, 0, 0, 0]);
		table.set(2, 3).unwrap();
		table.set(3, 0xfff8).unwrap();
		assert_eq!(table.get(2).unwrap(), 3);
		assert_eq!(table.get(3).unwrap(), 0xfff8);
		assert!(table.is_dirty());
	}

	#[test]
	fn fat32_write_preserves_reserved_top_bits() {
		let mut bytes = vec![0u8; 64];
		bytes[8..12].copy_from_slice(&0xa000_0000u32.to_le_bytes());
		let mut table = FatTable::new(FatType::Fat32, bytes, 16);
		table.set(2, 0x0fff_fff8).unwrap();
		assert_eq!(table.get(2).unwrap(), 0x0fff_fff8);
		let raw = u32::from_le_bytes(table.bytes[8..12].try_into().unwrap());
		assert_eq!(raw, 0xafff_fff8);
	}

	#[test]
	fn out_of_range_cluster_is_rejected() {
		let table = fat16_table(&[0xfff8, 0xffff, 0]);
		assert_eq!(table.get(3).unwrap_err(), FsError::InvalidArgument);
	}
}
