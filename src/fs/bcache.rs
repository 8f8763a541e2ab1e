//! Sector buffer cache.
//!
//! Sits between the FAT driver and a block device. Buffers are keyed by LBA,
//! reference counted and write-back: a dirty buffer reaches the disk on
//! eviction or on an explicit `sync`. Callers must mark a buffer dirty
//! before releasing it whenever they modified its bytes.

use crate::fs::error::{FsError, FsResult};
use alloc::vec;
use alloc::vec::Vec;
use bitflags::bitflags;

pub const SECTOR_SIZE: usize = 512;

/// Minimal contract a disk must fulfil to host a filesystem.
pub trait BlockDevice {
	fn read_sector(&mut self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> FsResult<()>;
	fn write_sector(&mut self, lba: u32, buf: &[u8; SECTOR_SIZE]) -> FsResult<()>;
	fn sector_count(&self) -> u32;
}

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	struct BufferFlags: u8 {
		const VALID = 0b01;
		const DIRTY = 0b10;
	}
}

struct Buffer {
	lba: u32,
	flags: BufferFlags,
	refs: u32,
	data: [u8; SECTOR_SIZE],
}

/// Index of a buffer slot. Valid until the matching `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufHandle(usize);

pub struct BufferCache<D: BlockDevice> {
	device: D,
	buffers: Vec<Buffer>,
}

impl<D: BlockDevice> BufferCache<D> {
	pub fn new(device: D, capacity: usize) -> Self {
		let mut buffers = Vec::with_capacity(capacity);
		for _ in 0..capacity {
			buffers.push(Buffer {
				lba: 0,
				flags: BufferFlags::empty(),
				refs: 0,
				data: [0; SECTOR_SIZE],
			});
		}
		BufferCache { device, buffers }
	}

	/// Returns a referenced buffer holding `lba`, reading it on a miss.
	pub fn get(&mut self, lba: u32) -> FsResult<BufHandle> {
		if let Some(index) = self
			.buffers
			.iter()
			.position(|b| b.flags.contains(BufferFlags::VALID) && b.lba == lba)
		{
			self.buffers[index].refs += 1;
			return Ok(BufHandle(index));
		}

		let index = self.pick_victim()?;
		if self.buffers[index].flags.contains(BufferFlags::DIRTY) {
			let old_lba = self.buffers[index].lba;
			let data = self.buffers[index].data;
			self.device.write_sector(old_lba, &data)?;
			self.buffers[index].flags.remove(BufferFlags::DIRTY);
		}

		let mut data = [0; SECTOR_SIZE];
		self.device.read_sector(lba, &mut data)?;
		let buffer = &mut self.buffers[index];
		buffer.lba = lba;
		buffer.flags = BufferFlags::VALID;
		buffer.refs = 1;
		buffer.data = data;
		Ok(BufHandle(index))
	}

	fn pick_victim(&self) -> FsResult<usize> {
		if let Some(index) = self
			.buffers
			.iter()
			.position(|b| !b.flags.contains(BufferFlags::VALID))
		{
			return Ok(index);
		}
		self.buffers
			.iter()
			.position(|b| b.refs == 0)
			.ok_or(FsError::OutOfMemory)
	}

	pub fn data(&self, handle: BufHandle) -> &[u8; SECTOR_SIZE] {
		&self.buffers[handle.0].data
	}

	pub fn data_mut(&mut self, handle: BufHandle) -> &mut [u8; SECTOR_SIZE] {
		&mut self.buffers[handle.0].data
	}

	pub fn mark_dirty(&mut self, handle: BufHandle) {
		self.buffers[handle.0].flags.insert(BufferFlags::DIRTY);
	}

	pub fn release(&mut self, handle: BufHandle) {
		let buffer = &mut self.buffers[handle.0];
		if buffer.refs > 0 {
			buffer.refs -= 1;
		}
	}

	/// Writes every dirty buffer back to the device.
	pub fn sync(&mut self) -> FsResult<()> {
		for index in 0..self.buffers.len() {
			if self.buffers[index].flags.contains(BufferFlags::DIRTY) {
				let lba = self.buffers[index].lba;
				let data = self.buffers[index].data;
				self.device.write_sector(lba, &data)?;
				self.buffers[index].flags.remove(BufferFlags::DIRTY);
			}
		}
		Ok(())
	}

	pub fn device(&self) -> &D {
		&self.device
	}

	pub fn device_mut(&mut self) -> &mut D {
		&mut self.device
	}

	pub fn into_device(self) -> D {
		self.device
	}
}

/// Memory-backed block device, used by the test suite and early bring-up.
pub struct RamDisk {
	sectors: Vec<[u8; SECTOR_SIZE]>,
}

impl RamDisk {
	pub fn new(sector_count: u32) -> Self {
		RamDisk {
			sectors: vec![[0; SECTOR_SIZE]; sector_count as usize],
		}
	}
}

impl BlockDevice for RamDisk {
	fn read_sector(&mut self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> FsResult<()> {
		let sector = self.sectors.get(lba as usize).ok_or(FsError::Io)?;
		buf.copy_from_slice(sector);
		Ok(())
	}

	fn write_sector(&mut self, lba: u32, buf: &[u8; SECTOR_SIZE]) -> FsResult<()> {
		let sector = self.sectors.get_mut(lba as usize).ok_or(FsError::Io)?;
		sector.copy_from_slice(buf);
		Ok(())
	}

	fn sector_count(&self) -> u32 {
		self.sectors.len() as u32
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hit_returns_the_same_slot_without_reading() {
		let mut cache = BufferCache::new(RamDisk::new(8), 4);
		let a = cache.get(3).unwrap();
		cache.release(a);
		let b = cache.get(3).unwrap();
		assert_eq!(a, b);
		cache.release(b);
	}

	#[test]
	fn dirty_buffer_reaches_the_disk_on_sync() {
		let mut cache = BufferCache::new(RamDisk::new(8), 4);
		let handle = cache.get(5).unwrap();
		cache.data_mut(handle)[0] = 0xab;
		cache.mark_dirty(handle);
		cache.release(handle);
		cache.sync().unwrap();

		let mut sector = [0; SECTOR_SIZE];
		cache.device_mut().read_sector(5, &mut sector).unwrap();
		assert_eq!(sector[0], 0xab);
	}

	#[test]
	fn eviction_writes_back_the_victim() {
		let mut cache = BufferCache::new(RamDisk::new(8), 1);
		let handle = cache.get(1).unwrap();
		cache.data_mut(handle)[10] = 0x42;
		cache.mark_dirty(handle);
		cache.release(handle);

		let other = cache.get(2).unwrap();
		cache.release(other);

		let mut sector = [0; SECTOR_SIZE];
		cache.device_mut().read_sector(1, &mut sector).unwrap();
		assert_eq!(sector[10], 0x42);
	}

	#[test]
	fn all_buffers_referenced_reports_exhaustion() {
		let mut cache = BufferCache::new(RamDisk::new(8), 2);
		let _a = cache.get(0).unwrap();
		let _b = cache.get(1).unwrap();
		assert_eq!(cache.get(2), Err(FsError::OutOfMemory));
	}

	#[test]
	fn out_of_range_lba_is_an_io_error() {
		let mut cache = BufferCache::new(RamDisk::new(4), 2);
		assert_eq!(cache.get(99), Err(FsError::Io));
	}
}
