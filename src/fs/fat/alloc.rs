//! Cluster allocation and chain release.

use crate::fs::error::{FsError, FsResult};
use crate::fs::fat::bpb::Geometry;
use crate::fs::fat::table::{FatTable, FREE_CLUSTER};
use crate::utils::debug::LogLevel;

/// Claims the lowest-numbered free cluster, marks it end-of-chain and, when
/// `previous` names a live cluster, links it to the new one. A failed link
/// rolls the claim back.
pub fn allocate_cluster(
	table: &mut FatTable,
	geometry: &Geometry,
	previous: u32,
) -> FsResult<u32> {
	for cluster in 2..geometry.total_data_clusters + 2 {
		if table.get(cluster)? != FREE_CLUSTER {
			continue;
		}
		table.set(cluster, geometry.eoc_marker)?;
		if previous >= 2 {
			if let Err(error) = table.set(previous, cluster) {
				if table.set(cluster, FREE_CLUSTER).is_err() {
					log!(LogLevel::Error, "Leaked cluster {} during link rollback", cluster);
				}
				return Err(error);
			}
		}
		return Ok(cluster);
	}
	Err(FsError::NoSpace)
}

/// Frees a whole chain starting at `start`, writing zero into each entry.
/// Frees as much of the chain as it can reach and reports the first error.
pub fn free_chain(table: &mut FatTable, geometry: &Geometry, start: u32) -> FsResult<()> {
	if !geometry.is_valid_cluster(start) {
		return Err(FsError::InvalidArgument);
	}

	let mut cluster = start;
	loop {
		let next = table.get(cluster)?;
		table.set(cluster, FREE_CLUSTER)?;
		if geometry.is_eoc(next) {
			return Ok(());
		}
		if !geometry.is_valid_cluster(next) {
			log!(LogLevel::Error, "Chain from {} walks into cluster {}", start, next);
			return Err(FsError::Corrupted);
		}
		cluster = next;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fs::bcache::SECTOR_SIZE;
	use crate::fs::fat::bpb::{BiosParameterBlock, Geometry};
	use crate::fs::fat::FatType;

	fn fat16_fixture() -> (FatTable, Geometry) {
		let mut sector = [0u8; SECTOR_SIZE];
		sector[11..13].copy_from_slice(&512u16.to_le_bytes());
		sector[13] = 4;
		sector[14..16].copy_from_slice(&32u16.to_le_bytes());
		sector[16] = 2;
		sector[17..19].copy_from_slice(&512u16.to_le_bytes());
		sector[19..21].copy_from_slice(&20608u16.to_le_bytes());
		sector[22..24].copy_from_slice(&32u16.to_le_bytes());
		sector[510] = 0x55;
		sector[511] = 0xaa;
		let geometry =
			Geometry::derive(&BiosParameterBlock::parse(&sector).unwrap()).unwrap();

		let mut bytes = std::vec![0u8; (geometry.fat_size as usize) * SECTOR_SIZE];
		bytes[0..2].copy_from_slice(&0xfff8u16.to_le_bytes());
		bytes[2..4].copy_from_slice(&0xffffu16.to_le_bytes());
		let table = FatTable::new(FatType::Fat16, bytes, geometry.total_data_clusters + 2);
		(table, geometry)
	}

	#[test]
	fn allocation_returns_the_lowest_free_cluster_and_links() {
		let (mut table, geometry) = fat16_fixture();
		let first = allocate_cluster(&mut table, &geometry, 0).unwrap();
		assert_eq!(first, 2);
		assert_eq!(table.get(2).unwrap(), geometry.eoc_marker);

		let second = allocate_cluster(&mut table, &geometry, first).unwrap();
		assert_eq!(second, 3);
		assert_eq!(table.get(2).unwrap(), 3);
		assert_eq!(table.get(3).unwrap(), geometry.eoc_marker);
	}

	#[test]
	fn freed_chain_clusters_are_reallocated_in_order() {
		let (mut table, geometry) = fat16_fixture();
		let mut chain = std::vec::Vec::new();
		let mut previous = 0;
		for _ in 0..5 {
			previous = allocate_cluster(&mut table, &geometry, previous).unwrap();
			chain.push(previous);
		}

		free_chain(&mut table, &geometry, chain[0]).unwrap();
		for &cluster in &chain {
			assert_eq!(table.get(cluster).unwrap(), FREE_CLUSTER);
		}

		let mut reallocated = std::vec::Vec::new();
		let mut previous = 0;
		for _ in 0..5 {
			previous = allocate_cluster(&mut table, &geometry, previous).unwrap();
			reallocated.push(previous);
		}
		assert_eq!(reallocated, chain);
	}

	#[test]
	fn free_chain_stops_on_a_wild_link() {
		let (mut table, geometry) = fat16_fixture();
		table.set(2, 3).unwrap();
		table.set(3, 1).unwrap(); // link into a reserved cluster
		assert_eq!(
			free_chain(&mut table, &geometry, 2).unwrap_err(),
			FsError::Corrupted
		);
		assert_eq!(table.get(2).unwrap(), FREE_CLUSTER);
		assert_eq!(table.get(3).unwrap(), FREE_CLUSTER);
	}

	#[test]
	fn free_chain_rejects_reserved_start() {
		let (mut table, geometry) = fat16_fixture();
		assert_eq!(
			free_chain(&mut table, &geometry, 0).unwrap_err(),
			FsError::InvalidArgument
		);
	}

	#[test]
	fn exhausted_volume_reports_no_space() {
		let (mut table, geometry) = fat16_fixture();
		for cluster in 2..geometry.total_data_clusters + 2 {
			table.set(cluster, geometry.eoc_marker).unwrap();
		}
		assert_eq!(
			allocate_cluster(&mut table, &geometry, 0).unwrap_err(),
			FsError::NoSpace
		);
	}
}
