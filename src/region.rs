// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! External collaborator contracts for the region/bucket engine: the
//! disk-read primitive used by spill recall, and the non-owning back
//! reference a [`crate::value::ColumnValue`] keeps to its owning region for
//! stats and memory accounting.

use crate::buffer::BufferRef;
use crate::memory::MemoryBroker;
use std::collections::HashMap;
use std::sync::Mutex;

/// Opaque handle to a persisted copy of a column value. Meaningless outside
/// the region/bucket engine that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiskId(pub u64);

/// A disk-materialized column value, as handed back by [`DiskStore::read`].
/// Transient: its buffer and compression state are adopted into the calling
/// `ColumnValue` and this struct is then discarded.
pub struct RawColumnValue {
	/// The recalled bytes, already tagged with an owner.
	pub buffer: BufferRef,
	/// The codec id the recalled bytes were stored under.
	pub codec_id: u8,
	/// Whether the recalled bytes are still in their compressed form.
	pub compressed: bool,
}

/// Failure modes the spill-recall path treats as "entry absent", per spec
/// §4.C step 3 and §7 (`EntryAbsent`): compaction, bucket migration, and
/// background consumers must never see these escape as exceptions.
#[derive(Debug, thiserror::Error)]
pub enum DiskReadError {
	/// The entry was destroyed (e.g. by compaction) before recall completed.
	#[error("entry destroyed")]
	EntryDestroyed,
	/// The underlying disk/oplog read failed.
	#[error("disk access error: {0}")]
	DiskAccess(String),
	/// The owning region was destroyed (e.g. bucket migration) mid-recall.
	#[error("region destroyed")]
	RegionDestroyed,
}

/// The region/bucket engine's disk-read primitive, as seen from this crate.
/// Everything else the real engine does (bucket enumeration, eviction
/// callbacks, get-by-key) is out of scope — this is the one entry point
/// `getValueRetain` needs for spill recall.
pub trait DiskStore: Send + Sync {
	/// Reads the persisted value for `disk_id`. `Ok(None)` models a
	/// tombstone (value deleted on disk); `Err` models the lifecycle errors
	/// enumerated on [`DiskReadError`].
	fn read(&self, disk_id: DiskId) -> Result<Option<RawColumnValue>, DiskReadError>;
}

/// Non-owning back-reference from a `ColumnValue` to its owning region, for
/// stats and memory accounting. Stored behind a `Weak` by callers so the
/// value <-> region relationship never becomes a reference cycle (spec §9).
pub trait RegionContext: Send + Sync {
	/// The memory accounting service this region is billed against.
	fn memory_broker(&self) -> &dyn MemoryBroker;

	/// The codec id this region prefers new disk locations to be tagged
	/// with, consulted by `setDiskLocation`.
	fn preferred_codec_id(&self) -> u8;

	/// Records that a `compressValue` call hit the sticky
	/// `NOT_COMPRESSIBLE` path (a skip statistic, not an error).
	fn record_compression_skip(&self);

	/// Records that a recall observed `state = COMPRESSED` with a
	/// non-negative leading int (spec §9, the documented corruption case).
	fn record_corrupt_value(&self);
}

/// An in-memory [`DiskStore`] stand-in for tests and single-node embedded
/// use with no real persistence layer. Not part of the spec's core; this is
/// ambient test tooling (see `SPEC_FULL.md` §1.1).
#[derive(Default)]
pub struct InMemoryDiskStore {
	entries: Mutex<HashMap<DiskId, Option<(Vec<u8>, u8, bool)>>>,
}

impl InMemoryDiskStore {
	/// An empty store with no durable entries.
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a durable copy reachable by `disk_id`.
	pub fn put(&self, disk_id: DiskId, bytes: Vec<u8>, codec_id: u8, compressed: bool) {
		self.entries.lock().unwrap().insert(disk_id, Some((bytes, codec_id, compressed)));
	}

	/// Marks `disk_id` as a tombstone (present but deleted).
	pub fn tombstone(&self, disk_id: DiskId) {
		self.entries.lock().unwrap().insert(disk_id, None);
	}
}

impl DiskStore for InMemoryDiskStore {
	fn read(&self, disk_id: DiskId) -> Result<Option<RawColumnValue>, DiskReadError> {
		let guard = self.entries.lock().unwrap();
		match guard.get(&disk_id) {
			None => Ok(None),
			Some(None) => Ok(None),
			Some(Some((bytes, codec_id, compressed))) => Ok(Some(RawColumnValue {
				buffer: BufferRef::new_heap(bytes.clone()),
				codec_id: *codec_id,
				compressed: *compressed,
			})),
		}
	}
}

/// A [`DiskStore`] that always reports a given lifecycle error, used by
/// tests exercising the fatal-to-absent translation (spec scenario E7).
pub struct FailingDiskStore {
	error: fn() -> DiskReadError,
}

impl FailingDiskStore {
	/// A store whose every `read` call reports `error()`.
	pub fn new(error: fn() -> DiskReadError) -> Self {
		Self { error }
	}
}

impl DiskStore for FailingDiskStore {
	fn read(&self, _disk_id: DiskId) -> Result<Option<RawColumnValue>, DiskReadError> {
		Err((self.error)())
	}
}
