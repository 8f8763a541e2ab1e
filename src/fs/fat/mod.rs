//! FAT12/16/32 filesystem driver.
//!
//! A `FatFs` owns the buffer cache over its block device, the derived
//! geometry and one in-memory FAT copy. Callers that share an instance wrap
//! it in a spinlock; every public operation takes `&mut self` and completes
//! before returning.

pub mod alloc;
pub mod bpb;
pub mod dir;
pub mod dirent;
pub mod file;
pub mod lfn;
pub mod table;

use crate::fs::bcache::{BlockDevice, BufferCache, SECTOR_SIZE};
use crate::fs::error::{FsError, FsResult};
use crate::utils::debug::LogLevel;
use bpb::{BiosParameterBlock, Geometry};
use table::FatTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
	Fat12,
	Fat16,
	Fat32,
}

impl FatType {
	pub fn as_str(&self) -> &'static str {
		match self {
			FatType::Fat12 => "FAT12",
			FatType::Fat16 => "FAT16",
			FatType::Fat32 => "FAT32",
		}
	}
}

pub struct FatFs<D: BlockDevice> {
	cache: BufferCache<D>,
	geometry: Geometry,
	table: FatTable,
}

const CACHE_CAPACITY: usize = 32;

impl<D: BlockDevice> FatFs<D> {
	/// Reads the boot sector, derives the geometry and loads the FAT.
	pub fn mount(device: D) -> FsResult<Self> {
		let mut cache = BufferCache::new(device, CACHE_CAPACITY);

		let handle = cache.get(0)?;
		let bpb = BiosParameterBlock::parse(cache.data(handle));
		cache.release(handle);
		let bpb = bpb?;

		let geometry = Geometry::derive(&bpb)?;
		if geometry.bytes_per_sector != SECTOR_SIZE as u32 {
			return Err(FsError::Unsupported);
		}
		if geometry.total_sectors > cache.device().sector_count() {
			return Err(FsError::Corrupted);
		}

		let table = FatTable::load(&mut cache, &geometry)?;
		log!(
			LogLevel::Info,
			"Mounted {} volume: {} clusters of {} bytes",
			geometry.fat_type.as_str(),
			geometry.total_data_clusters,
			geometry.cluster_size
		);
		Ok(FatFs {
			cache,
			geometry,
			table,
		})
	}

	pub fn geometry(&self) -> &Geometry {
		&self.geometry
	}

	pub fn fat_type(&self) -> FatType {
		self.geometry.fat_type
	}

	/// Flushes the FAT table and every dirty sector buffer.
	pub fn sync(&mut self) -> FsResult<()> {
		self.table.flush(&mut self.cache, &self.geometry)?;
		self.cache.sync()
	}

	/// Flushes everything and hands the device back.
	pub fn unmount(mut self) -> FsResult<D> {
		self.sync()?;
		Ok(self.cache.into_device())
	}

	pub(crate) fn cache(&mut self) -> &mut BufferCache<D> {
		&mut self.cache
	}

	pub(crate) fn table(&mut self) -> &mut FatTable {
		&mut self.table
	}

	pub(crate) fn fat_entry(&self, cluster: u32) -> FsResult<u32> {
		self.table.get(cluster)
	}

	/// Walks `hops` links from `cluster`; `Ok(None)` when the chain ends
	/// before that many hops.
	pub(crate) fn walk_chain(&self, cluster: u32, hops: u32) -> FsResult<Option<u32>> {
		let mut current = cluster;
		for _ in 0..hops {
			if !self.geometry.is_valid_cluster(current) {
				return Err(FsError::Corrupted);
			}
			match self.table.next_cluster(&self.geometry, current)? {
				Some(next) => current = next,
				None => return Ok(None),
			}
		}
		Ok(Some(current))
	}

	/// Fills a freshly allocated cluster with zeroes.
	pub(crate) fn zero_cluster(&mut self, cluster: u32) -> FsResult<()> {
		let lba = self.geometry.cluster_to_lba(cluster);
		for sector in 0..self.geometry.sectors_per_cluster {
			let handle = self.cache.get(lba + sector)?;
			self.cache.data_mut(handle).fill(0);
			self.cache.mark_dirty(handle);
			self.cache.release(handle);
		}
		Ok(())
	}
}
