// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::hash::{Hash, Hasher};

/// Reserved `columnIndex` for the per-batch stats row (row count and friends).
pub const STATROW_COL_INDEX: i32 = -1;
/// Reserved `columnIndex` for the delta stats row.
pub const DELTA_STATROW_COL_INDEX: i32 = -2;
/// Reserved `columnIndex` for the delete mask (bitmap + delete count).
///
/// Must remain the numerically smallest reserved index: some callers derive
/// the count of reserved columns as `STATROW_COL_INDEX - DELETE_MASK_COL_INDEX + 1`.
pub const DELETE_MASK_COL_INDEX: i32 = -3;

/// Identifies one column of one row-batch of one partition.
///
/// All columns belonging to the same row-batch share `uuid` and
/// `partition_id`; only `column_index` varies. Equality is componentwise,
/// but [`Hash`] deliberately ignores `column_index` so that every column of a
/// batch lands in the same hash bucket — see the type-level docs on
/// colocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnKey {
	uuid: u64,
	partition_id: i32,
	column_index: i32,
}

impl ColumnKey {
	/// Builds a key for one column of the row-batch `uuid` in `partition_id`.
	pub fn new(uuid: u64, partition_id: i32, column_index: i32) -> Self {
		Self { uuid, partition_id, column_index }
	}

	/// The row-batch identity shared by every column of this batch.
	pub fn uuid(&self) -> u64 {
		self.uuid
	}

	/// The partition bucket shared by every column of this batch.
	pub fn partition_id(&self) -> i32 {
		self.partition_id
	}

	/// The column this key selects; negative for a reserved auxiliary cell.
	pub fn column_index(&self) -> i32 {
		self.column_index
	}

	/// Returns a sibling key for a different column of the same batch.
	pub fn with_column_index(&self, column_index: i32) -> Self {
		Self { uuid: self.uuid, partition_id: self.partition_id, column_index }
	}

	/// The routing object the region engine partitions on: the partition id.
	pub fn routing_object(&self) -> i32 {
		self.partition_id
	}

	/// 16-byte big-endian wire/disk encoding: `uuid ‖ partition_id ‖ column_index`.
	pub fn encode(&self) -> [u8; 16] {
		let mut out = [0u8; 16];
		out[0..8].copy_from_slice(&self.uuid.to_be_bytes());
		out[8..12].copy_from_slice(&self.partition_id.to_be_bytes());
		out[12..16].copy_from_slice(&self.column_index.to_be_bytes());
		out
	}

	/// Inverse of [`ColumnKey::encode`].
	pub fn decode(bytes: &[u8; 16]) -> Self {
		let uuid = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
		let partition_id = i32::from_be_bytes(bytes[8..12].try_into().unwrap());
		let column_index = i32::from_be_bytes(bytes[12..16].try_into().unwrap());
		Self { uuid, partition_id, column_index }
	}
}

impl Hash for ColumnKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.uuid.hash(state);
		self.partition_id.hash(state);
	}
}

impl ColumnKey {
	/// A stable 64-bit hash over `(uuid, partition_id)`, independent of
	/// whatever [`std::hash::Hasher`] a particular `HashMap` happens to be
	/// seeded with. Used for consistent-hash style routing decisions that
	/// must agree across processes and restarts, unlike [`Hash`]'s
	/// process-local SipHash.
	pub fn stable_hash(&self) -> u64 {
		let mut bytes = [0u8; 12];
		bytes[0..8].copy_from_slice(&self.uuid.to_le_bytes());
		bytes[8..12].copy_from_slice(&self.partition_id.to_le_bytes());
		xxhash_rust::xxh3::xxh3_64(&bytes)
	}
}
