//! File open/read/write/lseek/close/unlink and directory iteration.

use crate::fs::bcache::{BlockDevice, SECTOR_SIZE};
use crate::fs::error::{FsError, FsResult};
use crate::fs::fat::alloc::{allocate_cluster, free_chain};
use crate::fs::fat::dir::{Dirent, PathLocation, ROOT_OFFSET};
use crate::fs::fat::dirent::{DirAttributes, DirEntry};
use crate::fs::fat::{FatFs, FatType};
use bitflags::bitflags;

bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct OpenFlags: u32 {
		const WRONLY = 0o1;
		const RDWR = 0o2;
		const CREAT = 0o100;
		const EXCL = 0o200;
		const TRUNC = 0o1000;
		const APPEND = 0o2000;
	}
}

impl OpenFlags {
	pub const RDONLY: OpenFlags = OpenFlags::empty();

	fn wants_write(&self) -> bool {
		self.intersects(OpenFlags::WRONLY | OpenFlags::RDWR)
	}

	fn wants_read(&self) -> bool {
		!self.contains(OpenFlags::WRONLY)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
	Set,
	Cur,
	End,
}

/// Runtime state of an open file or directory. Created by `open`, consumed
/// by `close`; the byte offset of the next read or write lives here too.
#[derive(Debug)]
pub struct FileContext {
	first_cluster: u32,
	size: u32,
	parent_cluster: u32,
	entry_offset: u32,
	is_directory: bool,
	dirty: bool,
	flags: OpenFlags,
	offset: u32,
	iter_offset: u32,
	last_index: Option<u32>,
}

impl FileContext {
	pub fn size(&self) -> u32 {
		self.size
	}

	pub fn offset(&self) -> u32 {
		self.offset
	}

	pub fn is_directory(&self) -> bool {
		self.is_directory
	}
}

impl<D: BlockDevice> FatFs<D> {
	pub fn open(&mut self, path: &str, flags: OpenFlags) -> FsResult<FileContext> {
		let mutating = flags.wants_write() || flags.intersects(OpenFlags::CREAT | OpenFlags::TRUNC);
		if mutating && self.fat_type() == FatType::Fat12 {
			return Err(FsError::Unsupported);
		}

		let mut created = false;
		let mut location = match self.lookup_path(path) {
			Ok(location) => {
				if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) {
					return Err(FsError::AlreadyExists);
				}
				location
			}
			Err(FsError::NotFound) if flags.contains(OpenFlags::CREAT) => {
				created = true;
				self.create_at_path(path)?
			}
			Err(error) => return Err(error),
		};

		if location.entry.is_directory() && flags.wants_write() {
			return Err(FsError::IsADirectory);
		}
		if location.entry.is_read_only()
			&& (flags.wants_write() || flags.contains(OpenFlags::TRUNC))
		{
			return Err(FsError::PermissionDenied);
		}

		let mut truncated = false;
		if flags.contains(OpenFlags::TRUNC) && !location.entry.is_directory() && !created {
			self.truncate_to_zero(&mut location)?;
			truncated = true;
		}

		Ok(FileContext {
			first_cluster: location.entry.first_cluster(),
			size: location.entry.size,
			parent_cluster: location.parent_cluster,
			entry_offset: location.offset,
			is_directory: location.entry.is_directory(),
			dirty: created || truncated,
			flags,
			offset: 0,
			iter_offset: 0,
			last_index: None,
		})
	}

	fn create_at_path(&mut self, path: &str) -> FsResult<PathLocation> {
		let (parent_path, leaf) = Self::split_path(path)?;
		let parent = self.lookup_path(parent_path)?;
		if !parent.entry.is_directory() {
			return Err(FsError::NotADirectory);
		}
		let parent_cluster = if parent.offset == ROOT_OFFSET {
			self.geometry().root_cluster
		} else {
			parent.entry.first_cluster()
		};
		let created = self.create_entry(parent_cluster, leaf.as_bytes(), DirAttributes::ARCHIVE)?;
		self.cache().sync()?;
		Ok(PathLocation {
			entry: created.entry,
			parent_cluster,
			offset: created.offset,
			lfn_start: created.lfn_start,
		})
	}

	/// Frees the file's chain and zeroes its size and first cluster, on disk
	/// and in `location`. Refuses directories.
	pub fn truncate_to_zero(&mut self, location: &mut PathLocation) -> FsResult<()> {
		if location.entry.is_directory() || location.offset == ROOT_OFFSET {
			return Err(FsError::IsADirectory);
		}
		let first = location.entry.first_cluster();
		if first >= 2 {
			let geometry = *self.geometry();
			free_chain(self.table(), &geometry, first)?;
		}
		location.entry.size = 0;
		location.entry.set_first_cluster(0);
		self.update_directory_entry(
			location.parent_cluster,
			location.offset,
			&location.entry,
		)?;
		self.sync()
	}

	pub fn read(&mut self, file: &mut FileContext, buf: &mut [u8]) -> FsResult<usize> {
		if file.is_directory {
			return Err(FsError::IsADirectory);
		}
		if !file.flags.wants_read() {
			return Err(FsError::PermissionDenied);
		}
		if file.offset >= file.size || buf.is_empty() {
			return Ok(0);
		}
		let mut remaining = (buf.len() as u64).min((file.size - file.offset) as u64) as u32;
		if file.first_cluster < 2 {
			return Err(FsError::Corrupted);
		}

		let geometry = *self.geometry();
		let mut cluster = self
			.walk_chain(file.first_cluster, file.offset / geometry.cluster_size)?
			.ok_or(FsError::Corrupted)?;
		let mut copied = 0usize;

		while remaining > 0 {
			let within_cluster = file.offset % geometry.cluster_size;
			let within_sector = file.offset % SECTOR_SIZE as u32;
			let lba = geometry.cluster_to_lba(cluster) + within_cluster / SECTOR_SIZE as u32;
			let chunk = remaining
				.min(SECTOR_SIZE as u32 - within_sector)
				.min(geometry.cluster_size - within_cluster) as usize;

			let handle = self.cache().get(lba)?;
			buf[copied..copied + chunk].copy_from_slice(
				&self.cache().data(handle)[within_sector as usize..within_sector as usize + chunk],
			);
			self.cache().release(handle);

			copied += chunk;
			file.offset += chunk as u32;
			remaining -= chunk as u32;

			if remaining > 0 && file.offset % geometry.cluster_size == 0 {
				cluster = self.walk_chain(cluster, 1)?.ok_or(FsError::Corrupted)?;
			}
		}
		Ok(copied)
	}

	pub fn write(&mut self, file: &mut FileContext, buf: &[u8]) -> FsResult<usize> {
		if file.is_directory {
			return Err(FsError::IsADirectory);
		}
		if !file.flags.wants_write() {
			return Err(FsError::PermissionDenied);
		}
		if buf.is_empty() {
			return Ok(0);
		}
		if file.flags.contains(OpenFlags::APPEND) {
			file.offset = file.size;
		}
		if file.offset as u64 + buf.len() as u64 > u32::MAX as u64 {
			return Err(FsError::Overflow);
		}

		let geometry = *self.geometry();
		if file.first_cluster < 2 {
			let cluster = allocate_cluster(self.table(), &geometry, 0)?;
			self.zero_cluster(cluster)?;
			file.first_cluster = cluster;
			file.dirty = true;
		}

		// Walk to the cluster holding the current offset, extending the
		// chain with zeroed clusters on the way.
		let mut cluster = file.first_cluster;
		for _ in 0..file.offset / geometry.cluster_size {
			cluster = match self.walk_chain(cluster, 1)? {
				Some(next) => next,
				None => {
					let next = allocate_cluster(self.table(), &geometry, cluster)?;
					self.zero_cluster(next)?;
					next
				}
			};
		}

		let mut copied = 0usize;
		let mut remaining = buf.len() as u32;
		while remaining > 0 {
			let within_cluster = file.offset % geometry.cluster_size;
			let within_sector = file.offset % SECTOR_SIZE as u32;
			let lba = geometry.cluster_to_lba(cluster) + within_cluster / SECTOR_SIZE as u32;
			let chunk = remaining
				.min(SECTOR_SIZE as u32 - within_sector)
				.min(geometry.cluster_size - within_cluster) as usize;

			let handle = self.cache().get(lba)?;
			self.cache().data_mut(handle)[within_sector as usize..within_sector as usize + chunk]
				.copy_from_slice(&buf[copied..copied + chunk]);
			self.cache().mark_dirty(handle);
			self.cache().release(handle);

			copied += chunk;
			file.offset += chunk as u32;
			remaining -= chunk as u32;

			if remaining > 0 && file.offset % geometry.cluster_size == 0 {
				cluster = match self.walk_chain(cluster, 1)? {
					Some(next) => next,
					None => {
						let next = allocate_cluster(self.table(), &geometry, cluster)?;
						self.zero_cluster(next)?;
						next
					}
				};
			}
		}

		if file.offset > file.size {
			file.size = file.offset;
			file.dirty = true;
		}
		Ok(copied)
	}

	/// Repositions the handle. Seeking past the end is allowed; the file
	/// grows at the next write.
	pub fn lseek(&mut self, file: &mut FileContext, offset: i64, whence: Whence) -> FsResult<u32> {
		let base = match whence {
			Whence::Set => 0,
			Whence::Cur => file.offset as i64,
			Whence::End => file.size as i64,
		};
		let target = base.checked_add(offset).ok_or(FsError::Overflow)?;
		if target < 0 || target > u32::MAX as i64 {
			return Err(FsError::InvalidArgument);
		}
		file.offset = target as u32;
		Ok(file.offset)
	}

	/// Flushes dirty metadata (size and first cluster) into the 8.3 entry
	/// and consumes the context.
	pub fn close(&mut self, file: FileContext) -> FsResult<()> {
		if !file.dirty || file.entry_offset == ROOT_OFFSET {
			return Ok(());
		}
		let bytes = self
			.read_dir_entry_bytes(file.parent_cluster, file.entry_offset)?
			.ok_or(FsError::Corrupted)?;
		let mut entry = DirEntry::from_bytes(&bytes);
		entry.size = file.size;
		entry.set_first_cluster(file.first_cluster);
		self.update_directory_entry(file.parent_cluster, file.entry_offset, &entry)?;
		self.cache().sync()
	}

	pub fn unlink(&mut self, path: &str) -> FsResult<()> {
		if self.fat_type() == FatType::Fat12 {
			return Err(FsError::Unsupported);
		}
		let location = self.lookup_path(path)?;
		if location.offset == ROOT_OFFSET || location.entry.is_directory() {
			return Err(FsError::IsADirectory);
		}
		if location.entry.is_read_only() {
			return Err(FsError::PermissionDenied);
		}

		let first = location.entry.first_cluster();
		if first >= 2 {
			let geometry = *self.geometry();
			free_chain(self.table(), &geometry, first)?;
		}
		self.mark_directory_entries_deleted(
			location.parent_cluster,
			location.lfn_start.unwrap_or(location.offset),
			location.offset,
		)?;
		self.sync()
	}

	/// Returns the logical entry at `index`. Index 0, or any index at or
	/// below the last one returned, restarts the scan; `last + 1` advances;
	/// anything else is invalid. `Ok(None)` once the directory is exhausted.
	pub fn readdir(&mut self, file: &mut FileContext, index: u32) -> FsResult<Option<Dirent>> {
		if !file.is_directory {
			return Err(FsError::NotADirectory);
		}
		let dir_cluster = file.first_cluster;

		let restart = match file.last_index {
			None => {
				if index != 0 {
					return Err(FsError::InvalidArgument);
				}
				true
			}
			Some(last) => {
				if index == 0 || index <= last {
					true
				} else if index == last + 1 {
					false
				} else {
					return Err(FsError::InvalidArgument);
				}
			}
		};

		if restart {
			file.iter_offset = 0;
			for _ in 0..index {
				if self
					.next_logical_entry(dir_cluster, &mut file.iter_offset)?
					.is_none()
				{
					return Ok(None);
				}
			}
		}

		let result = self.next_logical_entry(dir_cluster, &mut file.iter_offset)?;
		if result.is_some() {
			file.last_index = Some(index);
		}
		Ok(result)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fs::bcache::RamDisk;
	use crate::fs::fat::dirent::DIR_ENTRY_SIZE;

	fn boot_sector_fat16(total_sectors: u16) -> [u8; SECTOR_SIZE] {
		let mut sector = [0u8; SECTOR_SIZE];
		sector[11..13].copy_from_slice(&512u16.to_le_bytes());
		sector[13] = 4; // sectors per cluster
		sector[14..16].copy_from_slice(&32u16.to_le_bytes());
		sector[16] = 2;
		sector[17..19].copy_from_slice(&512u16.to_le_bytes());
		sector[19..21].copy_from_slice(&total_sectors.to_le_bytes());
		sector[21] = 0xf8;
		sector[22..24].copy_from_slice(&32u16.to_le_bytes());
		sector[510] = 0x55;
		sector[511] = 0xaa;
		sector
	}

	/// 512-byte sectors, 4 per cluster, 32 reserved, two 32-sector FATs,
	/// 512 root entries: data starts at sector 128, clusters are 2048 bytes.
	fn fat16_image() -> RamDisk {
		let mut disk = RamDisk::new(20608);
		disk.write_sector(0, &boot_sector_fat16(20608)).unwrap();

		let mut fat = [0u8; SECTOR_SIZE];
		fat[0..2].copy_from_slice(&0xfff8u16.to_le_bytes());
		fat[2..4].copy_from_slice(&0xffffu16.to_le_bytes());
		disk.write_sector(32, &fat).unwrap();
		disk.write_sector(64, &fat).unwrap();
		disk
	}

	fn fat16_fs() -> FatFs<RamDisk> {
		FatFs::mount(fat16_image()).unwrap()
	}

	fn fat32_image() -> RamDisk {
		let mut sector = [0u8; SECTOR_SIZE];
		sector[11..13].copy_from_slice(&512u16.to_le_bytes());
		sector[13] = 1;
		sector[14..16].copy_from_slice(&32u16.to_le_bytes());
		sector[16] = 2;
		sector[21] = 0xf8;
		sector[32..36].copy_from_slice(&70000u32.to_le_bytes());
		sector[36..40].copy_from_slice(&560u32.to_le_bytes());
		sector[44..48].copy_from_slice(&2u32.to_le_bytes());
		sector[510] = 0x55;
		sector[511] = 0xaa;

		let mut disk = RamDisk::new(70000);
		disk.write_sector(0, &sector).unwrap();

		let mut fat = [0u8; SECTOR_SIZE];
		fat[0..4].copy_from_slice(&0x0fff_fff8u32.to_le_bytes());
		fat[4..8].copy_from_slice(&0x0fff_ffffu32.to_le_bytes());
		fat[8..12].copy_from_slice(&0x0fff_fff8u32.to_le_bytes()); // root chain
		disk.write_sector(32, &fat).unwrap();
		disk.write_sector(32 + 560, &fat).unwrap();
		disk
	}

	fn pattern(len: usize) -> std::vec::Vec<u8> {
		(0..len).map(|i| (i * 31 + 7) as u8).collect()
	}

	#[test]
	fn mounted_geometry_matches_the_format() {
		let fs = fat16_fs();
		let geometry = fs.geometry();
		assert_eq!(geometry.fat_type, FatType::Fat16);
		assert_eq!(geometry.first_data_sector, 128);
		assert_eq!(geometry.cluster_size, 2048);
		assert_eq!(geometry.eoc_marker, 0xfff8);
	}

	#[test]
	fn create_write_close_then_read_back() {
		let mut fs = fat16_fs();
		let mut file = fs
			.open("/hello.txt", OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap();
		assert_eq!(fs.write(&mut file, b"hello").unwrap(), 5);
		fs.close(file).unwrap();

		let mut file = fs.open("/hello.txt", OpenFlags::RDONLY).unwrap();
		assert_eq!(file.size(), 5);
		let mut buf = [0u8; 16];
		assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 5);
		assert_eq!(&buf[..5], b"hello");
		assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 0);
		fs.close(file).unwrap();
	}

	#[test]
	fn contents_survive_a_remount() {
		let mut fs = fat16_fs();
		let mut file = fs
			.open("/persist.bin", OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap();
		let data = pattern(3000);
		fs.write(&mut file, &data).unwrap();
		fs.close(file).unwrap();
		let disk = fs.unmount().unwrap();

		let mut fs = FatFs::mount(disk).unwrap();
		let mut file = fs.open("/persist.bin", OpenFlags::RDONLY).unwrap();
		let mut back = std::vec![0u8; 3000];
		assert_eq!(fs.read(&mut file, &mut back).unwrap(), 3000);
		assert_eq!(back, data);
	}

	#[test]
	fn a_3000_byte_file_occupies_a_two_cluster_chain() {
		let mut fs = fat16_fs();
		let mut file = fs
			.open("/two.bin", OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap();
		fs.write(&mut file, &pattern(3000)).unwrap();
		fs.close(file).unwrap();

		let file = fs.open("/two.bin", OpenFlags::RDONLY).unwrap();
		let first = {
			let location = fs.lookup_path("/two.bin").unwrap();
			location.entry.first_cluster()
		};
		assert_eq!(first, 2);
		assert_eq!(fs.fat_entry(2).unwrap(), 3);
		assert_eq!(fs.fat_entry(3).unwrap(), 0xfff8);
		fs.close(file).unwrap();
	}

	#[test]
	fn round_trips_across_cluster_and_sector_boundaries() {
		let mut fs = fat16_fs();
		for &size in &[0usize, 1, 511, 512, 513, 2047, 2048, 2049, 4095, 4096, 4097, 20480] {
			let path = std::format!("/rt{}.bin", size);
			let data = pattern(size);
			let mut file = fs
				.open(&path, OpenFlags::CREAT | OpenFlags::WRONLY)
				.unwrap();
			assert_eq!(fs.write(&mut file, &data).unwrap(), size);
			fs.close(file).unwrap();

			let mut file = fs.open(&path, OpenFlags::RDONLY).unwrap();
			assert_eq!(file.size(), size as u32);
			let mut back = std::vec![0u8; size + 7];
			assert_eq!(fs.read(&mut file, &mut back).unwrap(), size);
			assert_eq!(&back[..size], &data[..]);
			fs.close(file).unwrap();
		}
	}

	#[test]
	fn long_names_get_unique_short_forms_and_stay_resolvable() {
		let mut fs = fat16_fs();
		for i in 1..=10 {
			let path = std::format!("/verylongfilename{:02}.txt", i);
			let file = fs
				.open(&path, OpenFlags::CREAT | OpenFlags::WRONLY)
				.unwrap();
			fs.close(file).unwrap();
		}

		let mut shorts = std::collections::HashSet::new();
		for i in 1..=10 {
			let path = std::format!("/verylongfilename{:02}.txt", i);
			let location = fs.lookup_path(&path).unwrap();
			assert!(shorts.insert(location.entry.name), "short name collision");
		}
		// the collision suffixes resolve as names in their own right
		assert!(fs.find_in_dir(0, b"VERYLO~1.TXT").is_ok());
		assert!(fs.find_in_dir(0, b"VERYLO~9.TXT").is_ok());
	}

	#[test]
	fn similar_long_names_create_distinct_files() {
		let mut fs = fat16_fs();
		let mut file = fs
			.open("/verylongfilename01.txt", OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap();
		fs.write(&mut file, b"first").unwrap();
		fs.close(file).unwrap();

		// shares the truncated 8.3 base, must not resolve to the file above
		let mut file = fs
			.open("/verylongfilename02.txt", OpenFlags::CREAT | OpenFlags::RDWR)
			.unwrap();
		let mut buf = [0u8; 8];
		assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 0);
		fs.write(&mut file, b"second").unwrap();
		fs.close(file).unwrap();

		let mut file = fs.open("/verylongfilename01.txt", OpenFlags::RDONLY).unwrap();
		assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 5);
		assert_eq!(&buf[..5], b"first");
		fs.close(file).unwrap();

		let mut file = fs.open("/verylongfilename02.txt", OpenFlags::RDONLY).unwrap();
		assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 6);
		assert_eq!(&buf[..6], b"second");
		fs.close(file).unwrap();
	}

	#[test]
	fn unlink_frees_the_chain_and_hides_the_name() {
		let mut fs = fat16_fs();
		let mut file = fs
			.open("/big.bin", OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap();
		fs.write(&mut file, &pattern(5 * 2048)).unwrap();
		fs.close(file).unwrap();

		let chain_start = fs.lookup_path("/big.bin").unwrap().entry.first_cluster();
		assert_eq!(chain_start, 2);

		fs.unlink("/big.bin").unwrap();
		assert_eq!(fs.lookup_path("/big.bin").unwrap_err(), FsError::NotFound);
		for cluster in 2..7 {
			assert_eq!(fs.fat_entry(cluster).unwrap(), 0);
		}

		let mut root = fs.open("/", OpenFlags::RDONLY).unwrap();
		assert!(fs.readdir(&mut root, 0).unwrap().is_none());
		fs.close(root).unwrap();

		let geometry = *fs.geometry();
		let next = allocate_cluster(fs.table(), &geometry, 0).unwrap();
		assert_eq!(next, chain_start);
	}

	#[test]
	fn readdir_advances_and_restarts() {
		let mut fs = fat16_fs();
		for name in ["/alpha.txt", "/bravo.txt", "/charlie.txt"] {
			let file = fs.open(name, OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
			fs.close(file).unwrap();
		}

		let mut root = fs.open("/", OpenFlags::RDONLY).unwrap();
		let mut first_pass = std::vec::Vec::new();
		let mut index = 0;
		while let Some(dirent) = fs.readdir(&mut root, index).unwrap() {
			first_pass.push(dirent.name_bytes().to_vec());
			index += 1;
		}
		assert_eq!(first_pass.len(), 3);
		assert!(first_pass.contains(&b"alpha.txt".to_vec()));

		// restarting from 0 reproduces the same sequence
		let mut second_pass = std::vec::Vec::new();
		let mut index = 0;
		while let Some(dirent) = fs.readdir(&mut root, index).unwrap() {
			second_pass.push(dirent.name_bytes().to_vec());
			index += 1;
		}
		assert_eq!(first_pass, second_pass);

		// jumping ahead is an error
		assert_eq!(
			fs.readdir(&mut root, 99).unwrap_err(),
			FsError::InvalidArgument
		);
		fs.close(root).unwrap();
	}

	#[test]
	fn truncate_releases_the_old_contents() {
		let mut fs = fat16_fs();
		let mut file = fs
			.open("/trunc.bin", OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap();
		fs.write(&mut file, &pattern(4096)).unwrap();
		fs.close(file).unwrap();

		let file = fs
			.open("/trunc.bin", OpenFlags::WRONLY | OpenFlags::TRUNC)
			.unwrap();
		assert_eq!(file.size(), 0);
		fs.close(file).unwrap();

		assert_eq!(fs.fat_entry(2).unwrap(), 0);
		assert_eq!(fs.fat_entry(3).unwrap(), 0);
		let location = fs.lookup_path("/trunc.bin").unwrap();
		assert_eq!(location.entry.size, 0);
		assert_eq!(location.entry.first_cluster(), 0);
	}

	#[test]
	fn append_writes_land_at_the_end() {
		let mut fs = fat16_fs();
		let mut file = fs
			.open("/log.txt", OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap();
		fs.write(&mut file, b"one").unwrap();
		fs.close(file).unwrap();

		let mut file = fs
			.open("/log.txt", OpenFlags::WRONLY | OpenFlags::APPEND)
			.unwrap();
		fs.write(&mut file, b"two").unwrap();
		fs.close(file).unwrap();

		let mut file = fs.open("/log.txt", OpenFlags::RDONLY).unwrap();
		let mut buf = [0u8; 8];
		assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 6);
		assert_eq!(&buf[..6], b"onetwo");
		fs.close(file).unwrap();
	}

	#[test]
	fn seek_past_end_extends_with_zeroes_at_the_next_write() {
		let mut fs = fat16_fs();
		let mut file = fs
			.open("/sparse.bin", OpenFlags::CREAT | OpenFlags::RDWR)
			.unwrap();
		assert_eq!(fs.lseek(&mut file, 5000, Whence::Set).unwrap(), 5000);
		fs.write(&mut file, b"x").unwrap();
		assert_eq!(file.size(), 5001);

		fs.lseek(&mut file, 0, Whence::Set).unwrap();
		let mut back = std::vec![0xffu8; 5001];
		assert_eq!(fs.read(&mut file, &mut back).unwrap(), 5001);
		assert!(back[..5000].iter().all(|&b| b == 0));
		assert_eq!(back[5000], b'x');

		assert_eq!(fs.lseek(&mut file, -1, Whence::End).unwrap(), 5000);
		assert_eq!(
			fs.lseek(&mut file, -1, Whence::Set).unwrap_err(),
			FsError::InvalidArgument
		);
		fs.close(file).unwrap();
	}

	#[test]
	fn exclusive_create_refuses_an_existing_file() {
		let mut fs = fat16_fs();
		let file = fs
			.open("/once.txt", OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap();
		fs.close(file).unwrap();
		assert_eq!(
			fs.open(
				"/once.txt",
				OpenFlags::CREAT | OpenFlags::EXCL | OpenFlags::WRONLY
			)
			.unwrap_err(),
			FsError::AlreadyExists
		);
	}

	#[test]
	fn open_without_create_requires_the_file_to_exist() {
		let mut fs = fat16_fs();
		assert_eq!(
			fs.open("/missing.txt", OpenFlags::RDONLY).unwrap_err(),
			FsError::NotFound
		);
	}

	#[test]
	fn directories_refuse_write_access() {
		let mut fs = fat16_fs();
		assert_eq!(
			fs.open("/", OpenFlags::WRONLY).unwrap_err(),
			FsError::IsADirectory
		);
		assert_eq!(fs.unlink("/").unwrap_err(), FsError::IsADirectory);
	}

	#[test]
	fn dot_dot_components_are_unsupported() {
		let mut fs = fat16_fs();
		assert_eq!(
			fs.lookup_path("/../a.txt").unwrap_err(),
			FsError::Unsupported
		);
	}

	#[test]
	fn fat32_volume_supports_the_full_cycle() {
		let mut fs = FatFs::mount(fat32_image()).unwrap();
		assert_eq!(fs.fat_type(), FatType::Fat32);
		assert_eq!(fs.geometry().eoc_marker, 0x0fff_fff8);

		let data = pattern(5000);
		let mut file = fs
			.open("/deep.bin", OpenFlags::CREAT | OpenFlags::RDWR)
			.unwrap();
		fs.write(&mut file, &data).unwrap();
		fs.lseek(&mut file, 0, Whence::Set).unwrap();
		let mut back = std::vec![0u8; 5000];
		assert_eq!(fs.read(&mut file, &mut back).unwrap(), 5000);
		assert_eq!(back, data);
		fs.close(file).unwrap();

		fs.unlink("/deep.bin").unwrap();
		assert_eq!(fs.lookup_path("/deep.bin").unwrap_err(), FsError::NotFound);
	}

	#[test]
	fn fat32_directories_grow_on_demand() {
		let mut fs = FatFs::mount(fat32_image()).unwrap();
		// 512-byte clusters hold 16 entries; these need three slots each
		for i in 0..20 {
			let path = std::format!("/extension_test_file_{:02}.dat", i);
			let file = fs.open(&path, OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
			fs.close(file).unwrap();
		}
		for i in 0..20 {
			let path = std::format!("/extension_test_file_{:02}.dat", i);
			assert!(fs.lookup_path(&path).is_ok(), "lost {}", path);
		}
	}

	#[test]
	fn fat12_volumes_are_read_only() {
		// 1024 total sectors leave 224 clusters, a FAT12 layout
		let mut disk = RamDisk::new(1024);
		disk.write_sector(0, &boot_sector_fat16(1024)).unwrap();

		let mut fat = [0u8; SECTOR_SIZE];
		// packed 12-bit entries: 0xff8, 0xfff, then 0xfff for the file
		fat[0..6].copy_from_slice(&[0xf8, 0xff, 0xff, 0xff, 0x0f, 0x00]);
		disk.write_sector(32, &fat).unwrap();
		disk.write_sector(64, &fat).unwrap();

		let mut root = [0u8; SECTOR_SIZE];
		root[0..11].copy_from_slice(b"HELLO   TXT");
		root[11] = 0x20;
		root[26..28].copy_from_slice(&2u16.to_le_bytes());
		root[28..32].copy_from_slice(&5u32.to_le_bytes());
		disk.write_sector(96, &root).unwrap();

		let mut data = [0u8; SECTOR_SIZE];
		data[..5].copy_from_slice(b"hello");
		disk.write_sector(128, &data).unwrap();

		let mut fs = FatFs::mount(disk).unwrap();
		assert_eq!(fs.fat_type(), FatType::Fat12);

		let mut file = fs.open("/HELLO.TXT", OpenFlags::RDONLY).unwrap();
		let mut buf = [0u8; 8];
		assert_eq!(fs.read(&mut file, &mut buf).unwrap(), 5);
		assert_eq!(&buf[..5], b"hello");
		fs.close(file).unwrap();

		assert_eq!(
			fs.open("/HELLO.TXT", OpenFlags::WRONLY).unwrap_err(),
			FsError::Unsupported
		);
		assert_eq!(fs.unlink("/HELLO.TXT").unwrap_err(), FsError::Unsupported);
	}

	#[test]
	fn deleted_entries_free_their_directory_slots() {
		let mut fs = fat16_fs();
		let file = fs
			.open("/deleteme.verylongname.txt", OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap();
		fs.close(file).unwrap();
		let location = fs.lookup_path("/deleteme.verylongname.txt").unwrap();
		let span_start = location.lfn_start.unwrap();
		fs.unlink("/deleteme.verylongname.txt").unwrap();

		let mut offset = span_start;
		while offset <= location.offset {
			let bytes = fs.read_dir_entry_bytes(0, offset).unwrap().unwrap();
			assert_eq!(bytes[0], 0xe5);
			offset += DIR_ENTRY_SIZE as u32;
		}
	}
}
