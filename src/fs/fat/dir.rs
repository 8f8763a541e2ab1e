//! Directory engine: sector mapping, name resolution, slot management and
//! entry writes.
//!
//! Directories are addressed as a flat byte stream of 32-byte entries. For
//! the fixed FAT12/16 root the stream maps onto the reserved root region;
//! cluster-backed directories map through the chain. Entries never straddle
//! sectors, so every access is one buffer-cache round trip.

use crate::fs::bcache::{BlockDevice, SECTOR_SIZE};
use crate::fs::error::{FsError, FsResult};
use crate::fs::fat::alloc::allocate_cluster;
use crate::fs::fat::dirent::{
	DirAttributes, DirEntry, LfnEntry, DELETED_MARKER, DIR_ENTRY_SIZE, END_OF_DIRECTORY,
	ESCAPED_DELETED, LFN_LAST_FLAG,
};
use crate::fs::fat::lfn::{
	self, MAX_LFN_ENTRIES, MAX_LFN_LENGTH, MAX_NUMERIC_TAIL,
};
use crate::fs::fat::{FatFs, FatType};

/// Where an 8.3 entry lives inside its parent directory.
#[derive(Debug, Clone, Copy)]
pub struct DirLocation {
	pub entry: DirEntry,
	/// Byte offset of the 8.3 entry in the directory stream.
	pub offset: u32,
	/// Byte offset of the first LFN entry of the run, when one exists.
	pub lfn_start: Option<u32>,
}

/// Result of a full path lookup. `offset == u32::MAX` marks the root
/// directory, which has no entry of its own.
#[derive(Debug, Clone, Copy)]
pub struct PathLocation {
	pub entry: DirEntry,
	pub parent_cluster: u32,
	pub offset: u32,
	pub lfn_start: Option<u32>,
}

pub const ROOT_OFFSET: u32 = u32::MAX;

/// One fused logical directory entry as returned by readdir.
#[derive(Debug, Clone, Copy)]
pub struct Dirent {
	pub name: [u8; MAX_LFN_LENGTH],
	pub name_len: usize,
	pub attributes: u8,
	pub first_cluster: u32,
	pub size: u32,
}

impl Dirent {
	pub fn name_bytes(&self) -> &[u8] {
		&self.name[..self.name_len]
	}
}

const EMPTY_LFN: LfnEntry = LfnEntry {
	sequence: 0,
	name1: [0; 5],
	checksum: 0,
	name2: [0; 6],
	name3: [0; 2],
};

/// Collects an LFN run while scanning a directory.
struct LfnCollector {
	entries: [LfnEntry; MAX_LFN_ENTRIES],
	count: usize,
	start_offset: u32,
}

impl LfnCollector {
	fn new() -> Self {
		LfnCollector {
			entries: [EMPTY_LFN; MAX_LFN_ENTRIES],
			count: 0,
			start_offset: 0,
		}
	}

	fn reset(&mut self) {
		self.count = 0;
	}

	fn push(&mut self, entry: LfnEntry, offset: u32) {
		if entry.sequence & LFN_LAST_FLAG != 0 {
			self.count = 0;
			self.start_offset = offset;
		}
		if self.count < MAX_LFN_ENTRIES {
			self.entries[self.count] = entry;
			self.count += 1;
		} else {
			self.reset();
		}
	}

	/// The reconstructed long name, if the run is non-empty and every entry
	/// checksums against the 8.3 name.
	fn long_name(&self, short: &DirEntry, out: &mut [u8; MAX_LFN_LENGTH]) -> Option<usize> {
		if self.count == 0 {
			return None;
		}
		let checksum = lfn::short_name_checksum(&short.name);
		if !self.entries[..self.count].iter().all(|e| e.checksum == checksum) {
			return None;
		}
		Some(lfn::reconstruct(&self.entries[..self.count], out))
	}
}

/// Renders an 11-byte short name in `NAME.EXT` display form.
fn display_short_name(name: &[u8; 11], out: &mut [u8; MAX_LFN_LENGTH]) -> usize {
	let mut length = 0;
	let base_len = name[..8].iter().rposition(|&c| c != b' ').map_or(0, |p| p + 1);
	for (i, &byte) in name[..base_len].iter().enumerate() {
		out[length] = if i == 0 && byte == ESCAPED_DELETED { DELETED_MARKER } else { byte };
		length += 1;
	}
	let ext_len = name[8..].iter().rposition(|&c| c != b' ').map_or(0, |p| p + 1);
	if ext_len > 0 {
		out[length] = b'.';
		length += 1;
		out[length..length + ext_len].copy_from_slice(&name[8..8 + ext_len]);
		length += ext_len;
	}
	length
}

impl<D: BlockDevice> FatFs<D> {
	/// LBA of directory sector `sector_index`, or `None` past the end of the
	/// directory. `dir_cluster == 0` addresses the fixed FAT12/16 root.
	fn dir_sector_lba(&self, dir_cluster: u32, sector_index: u32) -> FsResult<Option<u32>> {
		let geometry = self.geometry();
		if dir_cluster == 0 {
			if geometry.fat_type == FatType::Fat32 {
				return Err(FsError::Internal);
			}
			if sector_index >= geometry.root_dir_sectors {
				return Ok(None);
			}
			return Ok(Some(geometry.root_dir_start_lba + sector_index));
		}

		let hops = sector_index / geometry.sectors_per_cluster;
		match self.walk_chain(dir_cluster, hops)? {
			Some(cluster) => Ok(Some(
				self.geometry().cluster_to_lba(cluster)
					+ sector_index % self.geometry().sectors_per_cluster,
			)),
			None => Ok(None),
		}
	}

	/// Reads the 32-byte entry at `offset`, or `None` past the end of the
	/// directory's allocated space.
	pub(crate) fn read_dir_entry_bytes(
		&mut self,
		dir_cluster: u32,
		offset: u32,
	) -> FsResult<Option<[u8; DIR_ENTRY_SIZE]>> {
		let sector_index = offset / SECTOR_SIZE as u32;
		let Some(lba) = self.dir_sector_lba(dir_cluster, sector_index)? else {
			return Ok(None);
		};
		let within = offset as usize % SECTOR_SIZE;
		let handle = self.cache().get(lba)?;
		let mut bytes = [0; DIR_ENTRY_SIZE];
		bytes.copy_from_slice(&self.cache().data(handle)[within..within + DIR_ENTRY_SIZE]);
		self.cache().release(handle);
		Ok(Some(bytes))
	}

	fn write_dir_entry_bytes(
		&mut self,
		dir_cluster: u32,
		offset: u32,
		bytes: &[u8; DIR_ENTRY_SIZE],
	) -> FsResult<()> {
		let sector_index = offset / SECTOR_SIZE as u32;
		let Some(lba) = self.dir_sector_lba(dir_cluster, sector_index)? else {
			return Err(FsError::NotFound);
		};
		let within = offset as usize % SECTOR_SIZE;
		let handle = self.cache().get(lba)?;
		self.cache().data_mut(handle)[within..within + DIR_ENTRY_SIZE].copy_from_slice(bytes);
		self.cache().mark_dirty(handle);
		self.cache().release(handle);
		Ok(())
	}

	pub fn update_directory_entry(
		&mut self,
		dir_cluster: u32,
		offset: u32,
		entry: &DirEntry,
	) -> FsResult<()> {
		self.write_dir_entry_bytes(dir_cluster, offset, &entry.to_bytes())
	}

	/// Scans `dir_cluster` for `name`, matching the reconstructed long name
	/// case-insensitively and falling back to the rendered 8.3 form.
	pub fn find_in_dir(&mut self, dir_cluster: u32, name: &[u8]) -> FsResult<DirLocation> {
		let mut collector = LfnCollector::new();
		let mut offset = 0;

		loop {
			let Some(bytes) = self.read_dir_entry_bytes(dir_cluster, offset)? else {
				return Err(FsError::NotFound);
			};
			if bytes[0] == END_OF_DIRECTORY {
				return Err(FsError::NotFound);
			}
			if bytes[0] == DELETED_MARKER {
				collector.reset();
				offset += DIR_ENTRY_SIZE as u32;
				continue;
			}

			let entry = DirEntry::from_bytes(&bytes);
			if entry.is_lfn() {
				collector.push(LfnEntry::from_bytes(&bytes), offset);
				offset += DIR_ENTRY_SIZE as u32;
				continue;
			}
			if entry.is_volume_label() {
				collector.reset();
				offset += DIR_ENTRY_SIZE as u32;
				continue;
			}

			let mut long = [0u8; MAX_LFN_LENGTH];
			let matched = match collector.long_name(&entry, &mut long) {
				Some(length) => long[..length].eq_ignore_ascii_case(name),
				None => false,
			} || {
				let short_len = display_short_name(&entry.name, &mut long);
				long[..short_len].eq_ignore_ascii_case(name)
			};

			if matched {
				let lfn_start = (collector.count > 0).then_some(collector.start_offset);
				return Ok(DirLocation {
					entry,
					offset,
					lfn_start,
				});
			}
			collector.reset();
			offset += DIR_ENTRY_SIZE as u32;
		}
	}

	fn root_location(&self) -> PathLocation {
		let mut entry = DirEntry::new([b' '; 11], DirAttributes::DIRECTORY);
		entry.set_first_cluster(self.geometry().root_cluster);
		PathLocation {
			entry,
			parent_cluster: 0,
			offset: ROOT_OFFSET,
			lfn_start: None,
		}
	}

	/// Resolves an absolute path component by component. `.` components are
	/// skipped; `..` is not supported.
	pub fn lookup_path(&mut self, path: &str) -> FsResult<PathLocation> {
		if !path.starts_with('/') {
			return Err(FsError::InvalidArgument);
		}

		let mut location = self.root_location();
		let mut current_dir = self.geometry().root_cluster;
		let mut components = path
			.split('/')
			.filter(|c| !c.is_empty() && *c != ".")
			.peekable();

		while let Some(component) = components.next() {
			if component == ".." {
				return Err(FsError::Unsupported);
			}
			if component.len() > MAX_LFN_LENGTH {
				return Err(FsError::NameTooLong);
			}
			let found = self.find_in_dir(current_dir, component.as_bytes())?;
			if components.peek().is_some() && !found.entry.is_directory() {
				return Err(FsError::NotADirectory);
			}
			location = PathLocation {
				entry: found.entry,
				parent_cluster: current_dir,
				offset: found.offset,
				lfn_start: found.lfn_start,
			};
			current_dir = found.entry.first_cluster();
		}
		Ok(location)
	}

	/// Splits an absolute path into its parent directory and leaf name.
	pub fn split_path(path: &str) -> FsResult<(&str, &str)> {
		if !path.starts_with('/') {
			return Err(FsError::InvalidArgument);
		}
		let trimmed = path.trim_end_matches('/');
		if trimmed.is_empty() {
			return Err(FsError::InvalidArgument);
		}
		let slash = trimmed.rfind('/').ok_or(FsError::InvalidArgument)?;
		let parent = if slash == 0 { "/" } else { &trimmed[..slash] };
		let leaf = &trimmed[slash + 1..];
		if leaf.is_empty() || leaf == "." || leaf == ".." {
			return Err(FsError::InvalidArgument);
		}
		Ok((parent, leaf))
	}

	fn last_chain_cluster(&self, start: u32) -> FsResult<u32> {
		let mut cluster = start;
		loop {
			if !self.geometry().is_valid_cluster(cluster) {
				return Err(FsError::Corrupted);
			}
			match self.walk_chain(cluster, 1)? {
				Some(next) => cluster = next,
				None => return Ok(cluster),
			}
		}
	}

	/// Finds `needed` contiguous free slots, extending a cluster-backed
	/// directory with a zeroed cluster when the existing space runs out.
	/// The fixed FAT12/16 root cannot grow.
	pub fn find_free_directory_slot(
		&mut self,
		dir_cluster: u32,
		needed: usize,
	) -> FsResult<u32> {
		let mut run_start = 0;
		let mut run = 0;
		let mut offset = 0;

		let end_offset = loop {
			let Some(bytes) = self.read_dir_entry_bytes(dir_cluster, offset)? else {
				break offset;
			};
			if bytes[0] == END_OF_DIRECTORY || bytes[0] == DELETED_MARKER {
				if run == 0 {
					run_start = offset;
				}
				run += 1;
				if run == needed {
					return Ok(run_start);
				}
			} else {
				run = 0;
			}
			offset += DIR_ENTRY_SIZE as u32;
		};

		if dir_cluster == 0 {
			return Err(FsError::NoSpace);
		}

		let geometry = *self.geometry();
		let slots_per_cluster = geometry.cluster_size / DIR_ENTRY_SIZE as u32;
		let mut available = run as u32;
		while (needed as u32) > available {
			let last = self.last_chain_cluster(dir_cluster)?;
			let new_cluster = allocate_cluster(self.table(), &geometry, last)?;
			self.zero_cluster(new_cluster)?;
			available += slots_per_cluster;
		}
		Ok(if run > 0 { run_start } else { end_offset })
	}

	/// Marks the span from the first LFN slot through the 8.3 entry deleted.
	pub fn mark_directory_entries_deleted(
		&mut self,
		dir_cluster: u32,
		first_offset: u32,
		entry_offset: u32,
	) -> FsResult<()> {
		let mut offset = first_offset;
		while offset <= entry_offset {
			let Some(mut bytes) = self.read_dir_entry_bytes(dir_cluster, offset)? else {
				return Err(FsError::Corrupted);
			};
			bytes[0] = DELETED_MARKER;
			self.write_dir_entry_bytes(dir_cluster, offset, &bytes)?;
			offset += DIR_ENTRY_SIZE as u32;
		}
		Ok(())
	}

	/// Writes an LFN run followed by its 8.3 entry starting at `offset`.
	/// If the 8.3 write fails the already-written LFN slots are marked
	/// deleted so they never read as live junk. Returns the 8.3 offset.
	pub fn write_directory_entries(
		&mut self,
		dir_cluster: u32,
		offset: u32,
		lfn_entries: &[LfnEntry],
		short: &DirEntry,
	) -> FsResult<u32> {
		let mut cursor = offset;
		for entry in lfn_entries {
			self.write_dir_entry_bytes(dir_cluster, cursor, &entry.to_bytes())?;
			cursor += DIR_ENTRY_SIZE as u32;
		}
		if let Err(error) = self.write_dir_entry_bytes(dir_cluster, cursor, &short.to_bytes()) {
			if !lfn_entries.is_empty() {
				let _ = self.mark_directory_entries_deleted(
					dir_cluster,
					offset,
					cursor - DIR_ENTRY_SIZE as u32,
				);
			}
			return Err(error);
		}
		Ok(cursor)
	}

	fn short_name_exists(&mut self, dir_cluster: u32, short: &[u8; 11]) -> FsResult<bool> {
		let mut offset = 0;
		loop {
			let Some(bytes) = self.read_dir_entry_bytes(dir_cluster, offset)? else {
				return Ok(false);
			};
			if bytes[0] == END_OF_DIRECTORY {
				return Ok(false);
			}
			if bytes[0] != DELETED_MARKER {
				let entry = DirEntry::from_bytes(&bytes);
				if !entry.is_lfn() && !entry.is_volume_label() && entry.name == *short {
					return Ok(true);
				}
			}
			offset += DIR_ENTRY_SIZE as u32;
		}
	}

	/// Derives a short name for `name` that collides with nothing in the
	/// directory, applying the `~N` scheme when the plain form is taken.
	pub fn unique_short_name(&mut self, dir_cluster: u32, name: &[u8]) -> FsResult<[u8; 11]> {
		let base = lfn::format_short_name(name);
		if !self.short_name_exists(dir_cluster, &base)? {
			return Ok(base);
		}
		for n in 1..=MAX_NUMERIC_TAIL {
			let candidate = lfn::apply_numeric_tail(&base, n)?;
			if !self.short_name_exists(dir_cluster, &candidate)? {
				return Ok(candidate);
			}
		}
		Err(FsError::NameTooLong)
	}

	/// Creates a new entry (LFN run plus 8.3) for `name` in the directory.
	pub fn create_entry(
		&mut self,
		dir_cluster: u32,
		name: &[u8],
		attributes: DirAttributes,
	) -> FsResult<DirLocation> {
		let short_name = self.unique_short_name(dir_cluster, name)?;
		let checksum = lfn::short_name_checksum(&short_name);

		let mut lfn_entries = [EMPTY_LFN; MAX_LFN_ENTRIES];
		let lfn_count = lfn::generate(name, checksum, &mut lfn_entries)?;

		let slot_offset = self.find_free_directory_slot(dir_cluster, lfn_count + 1)?;
		let entry = DirEntry::new(short_name, attributes);
		let entry_offset = self.write_directory_entries(
			dir_cluster,
			slot_offset,
			&lfn_entries[..lfn_count],
			&entry,
		)?;
		Ok(DirLocation {
			entry,
			offset: entry_offset,
			lfn_start: Some(slot_offset),
		})
	}

	/// Advances `offset` past the next fused logical entry and returns it,
	/// or `None` when the directory is exhausted.
	pub(crate) fn next_logical_entry(
		&mut self,
		dir_cluster: u32,
		offset: &mut u32,
	) -> FsResult<Option<Dirent>> {
		let mut collector = LfnCollector::new();
		loop {
			let Some(bytes) = self.read_dir_entry_bytes(dir_cluster, *offset)? else {
				return Ok(None);
			};
			if bytes[0] == END_OF_DIRECTORY {
				return Ok(None);
			}
			if bytes[0] == DELETED_MARKER {
				collector.reset();
				*offset += DIR_ENTRY_SIZE as u32;
				continue;
			}

			let entry = DirEntry::from_bytes(&bytes);
			if entry.is_lfn() {
				collector.push(LfnEntry::from_bytes(&bytes), *offset);
				*offset += DIR_ENTRY_SIZE as u32;
				continue;
			}
			if entry.is_volume_label() {
				collector.reset();
				*offset += DIR_ENTRY_SIZE as u32;
				continue;
			}

			let mut name = [0u8; MAX_LFN_LENGTH];
			let name_len = match collector.long_name(&entry, &mut name) {
				Some(length) => length,
				None => display_short_name(&entry.name, &mut name),
			};
			*offset += DIR_ENTRY_SIZE as u32;
			return Ok(Some(Dirent {
				name,
				name_len,
				attributes: entry.attributes,
				first_cluster: entry.first_cluster(),
				size: entry.size,
			}));
		}
	}
}
