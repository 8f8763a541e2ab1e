//! Boot sector parsing and geometry derivation.

use crate::fs::bcache::SECTOR_SIZE;
use crate::fs::error::{FsError, FsResult};
use crate::fs::fat::FatType;

const BOOT_SIGNATURE: u16 = 0xaa55;
const BOOT_SIGNATURE_OFFSET: usize = 510;
pub const DIR_ENTRY_SIZE: u32 = 32;

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
	u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
	u32::from_le_bytes([
		bytes[offset],
		bytes[offset + 1],
		bytes[offset + 2],
		bytes[offset + 3],
	])
}

/// The BPB fields the driver needs, lifted out of sector 0.
#[derive(Debug, Clone, Copy)]
pub struct BiosParameterBlock {
	pub bytes_per_sector: u16,
	pub sectors_per_cluster: u8,
	pub reserved_sector_count: u16,
	pub num_fats: u8,
	pub root_entry_count: u16,
	pub total_sectors_16: u16,
	pub media: u8,
	pub fat_size_16: u16,
	pub hidden_sectors: u32,
	pub total_sectors_32: u32,
	pub fat_size_32: u32,
	pub root_cluster: u32,
}

impl BiosParameterBlock {
	pub fn parse(sector: &[u8; SECTOR_SIZE]) -> FsResult<Self> {
		if read_u16(sector, BOOT_SIGNATURE_OFFSET) != BOOT_SIGNATURE {
			return Err(FsError::Corrupted);
		}

		let bpb = BiosParameterBlock {
			bytes_per_sector: read_u16(sector, 11),
			sectors_per_cluster: sector[13],
			reserved_sector_count: read_u16(sector, 14),
			num_fats: sector[16],
			root_entry_count: read_u16(sector, 17),
			total_sectors_16: read_u16(sector, 19),
			media: sector[21],
			fat_size_16: read_u16(sector, 22),
			hidden_sectors: read_u32(sector, 28),
			total_sectors_32: read_u32(sector, 32),
			fat_size_32: read_u32(sector, 36),
			root_cluster: read_u32(sector, 44),
		};

		if !bpb.bytes_per_sector.is_power_of_two()
			|| !(512..=4096).contains(&bpb.bytes_per_sector)
			|| !bpb.sectors_per_cluster.is_power_of_two()
			|| bpb.reserved_sector_count == 0
			|| bpb.num_fats == 0
		{
			return Err(FsError::Corrupted);
		}
		Ok(bpb)
	}
}

/// Everything derived from the BPB that the rest of the driver works with.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
	pub fat_type: FatType,
	pub bytes_per_sector: u32,
	pub sectors_per_cluster: u32,
	pub cluster_size: u32,
	pub reserved_sector_count: u32,
	pub num_fats: u32,
	pub fat_size: u32,
	pub fat_start_lba: u32,
	pub root_dir_start_lba: u32,
	pub root_dir_sectors: u32,
	pub first_data_sector: u32,
	pub total_sectors: u32,
	pub total_data_clusters: u32,
	pub root_cluster: u32,
	pub eoc_marker: u32,
}

impl Geometry {
	pub fn derive(bpb: &BiosParameterBlock) -> FsResult<Self> {
		let bytes_per_sector = bpb.bytes_per_sector as u32;
		let sectors_per_cluster = bpb.sectors_per_cluster as u32;

		let root_dir_sectors = (bpb.root_entry_count as u32 * DIR_ENTRY_SIZE)
			.div_ceil(bytes_per_sector);
		let fat_size = if bpb.fat_size_16 != 0 {
			bpb.fat_size_16 as u32
		} else {
			bpb.fat_size_32
		};
		let total_sectors = if bpb.total_sectors_16 != 0 {
			bpb.total_sectors_16 as u32
		} else {
			bpb.total_sectors_32
		};
		if fat_size == 0 || total_sectors == 0 {
			return Err(FsError::Corrupted);
		}

		let fat_start_lba = bpb.reserved_sector_count as u32;
		let root_dir_start_lba = fat_start_lba + bpb.num_fats as u32 * fat_size;
		let first_data_sector = root_dir_start_lba + root_dir_sectors;
		if first_data_sector >= total_sectors {
			return Err(FsError::Corrupted);
		}
		let total_data_clusters = (total_sectors - first_data_sector) / sectors_per_cluster;

		let (fat_type, eoc_marker) = if total_data_clusters < 4085 {
			(FatType::Fat12, 0xff8)
		} else if total_data_clusters < 65525 {
			(FatType::Fat16, 0xfff8)
		} else {
			(FatType::Fat32, 0x0fff_fff8)
		};

		let root_cluster = match fat_type {
			FatType::Fat32 => {
				if bpb.root_cluster < 2 {
					return Err(FsError::Corrupted);
				}
				bpb.root_cluster
			}
			_ => {
				if bpb.root_entry_count == 0 {
					return Err(FsError::Corrupted);
				}
				0
			}
		};

		Ok(Geometry {
			fat_type,
			bytes_per_sector,
			sectors_per_cluster,
			cluster_size: bytes_per_sector * sectors_per_cluster,
			reserved_sector_count: bpb.reserved_sector_count as u32,
			num_fats: bpb.num_fats as u32,
			fat_size,
			fat_start_lba,
			root_dir_start_lba,
			root_dir_sectors,
			first_data_sector,
			total_sectors,
			total_data_clusters,
			root_cluster,
			eoc_marker,
		})
	}

	pub fn cluster_to_lba(&self, cluster: u32) -> u32 {
		self.first_data_sector + (cluster - 2) * self.sectors_per_cluster
	}

	/// Legal data clusters are numbered 2 ..= total_data_clusters + 1.
	pub fn is_valid_cluster(&self, cluster: u32) -> bool {
		(2..self.total_data_clusters + 2).contains(&cluster)
	}

	pub fn is_eoc(&self, value: u32) -> bool {
		value >= self.eoc_marker
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	pub fn boot_sector(
		bytes_per_sector: u16,
		sectors_per_cluster: u8,
		reserved: u16,
		num_fats: u8,
		fat_size_16: u16,
		root_entries: u16,
		total_sectors: u32,
	) -> [u8; SECTOR_SIZE] {
		let mut sector = [0u8; SECTOR_SIZE];
		sector[11..13].copy_from_slice(&bytes_per_sector.to_le_bytes());
		sector[13] = sectors_per_cluster;
		sector[14..16].copy_from_slice(&reserved.to_le_bytes());
		sector[16] = num_fats;
		sector[17..19].copy_from_slice(&root_entries.to_le_bytes());
		if total_sectors <= u16::MAX as u32 {
			sector[19..21].copy_from_slice(&(total_sectors as u16).to_le_bytes());
		} else {
			sector[32..36].copy_from_slice(&total_sectors.to_le_bytes());
		}
		sector[21] = 0xf8;
		sector[22..24].copy_from_slice(&fat_size_16.to_le_bytes());
		sector[510] = 0x55;
		sector[511] = 0xaa;
		sector
	}

	#[test]
	fn derived_geometry_matches_the_reference_calculation() {
		// 32 reserved + 2 FATs of 32 sectors + 32 root sectors.
		let sector = boot_sector(512, 4, 32, 2, 32, 512, 20608);
		let bpb = BiosParameterBlock::parse(&sector).unwrap();
		let geometry = Geometry::derive(&bpb).unwrap();

		assert_eq!(geometry.first_data_sector, 128);
		assert_eq!(geometry.cluster_size, 2048);
		assert_eq!(geometry.total_data_clusters, (20608 - 128) / 4);
		assert_eq!(geometry.fat_type, FatType::Fat16);
		assert_eq!(geometry.eoc_marker, 0xfff8);
		assert_eq!(geometry.cluster_to_lba(2), 128);
		assert_eq!(geometry.cluster_to_lba(3), 132);
	}

	#[test]
	fn small_volumes_classify_as_fat12() {
		let sector = boot_sector(512, 4, 32, 2, 32, 512, 1024);
		let bpb = BiosParameterBlock::parse(&sector).unwrap();
		let geometry = Geometry::derive(&bpb).unwrap();
		assert_eq!(geometry.total_data_clusters, 224);
		assert_eq!(geometry.fat_type, FatType::Fat12);
		assert_eq!(geometry.eoc_marker, 0xff8);
	}

	#[test]
	fn missing_boot_signature_is_rejected() {
		let mut sector = boot_sector(512, 4, 32, 2, 32, 512, 1024);
		sector[511] = 0;
		assert_eq!(BiosParameterBlock::parse(&sector).unwrap_err(), FsError::Corrupted);
	}

	#[test]
	fn non_power_of_two_geometry_is_rejected() {
		let mut sector = boot_sector(512, 4, 32, 2, 32, 512, 1024);
		sector[13] = 3;
		assert_eq!(BiosParameterBlock::parse(&sector).unwrap_err(), FsError::Corrupted);
	}
}
