// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use std::sync::Arc;

use reifydb_store_column::Error;
use reifydb_store_column::buffer::{BufferRef, HeapOnlyAllocator};
use reifydb_store_column::codec::{self, CodecRegistry};
use reifydb_store_column::key::{ColumnKey, DELETE_MASK_COL_INDEX, STATROW_COL_INDEX};
use reifydb_store_column::memory::{BoundedMemoryBroker, MemoryBroker, UnlimitedMemoryBroker};
use reifydb_store_column::region::{DiskId, DiskReadError, FailingDiskStore, InMemoryDiskStore, RegionContext};
use reifydb_store_column::value::{ColumnValue, OpContext};

struct TestRegion {
	broker: Box<dyn MemoryBroker>,
}

impl RegionContext for TestRegion {
	fn memory_broker(&self) -> &dyn MemoryBroker {
		self.broker.as_ref()
	}
	fn preferred_codec_id(&self) -> u8 {
		codec::ZSTD
	}
	fn record_compression_skip(&self) {}
	fn record_corrupt_value(&self) {}
}

fn fresh_with_codec(bytes: &[u8], codec_id: u8, allocator: &HeapOnlyAllocator) -> Arc<ColumnValue> {
	let value = ColumnValue::new();
	value.set_buffer(BufferRef::new_heap(bytes.to_vec()), codec_id, false, false, allocator).unwrap();
	value
}

#[test]
fn e1_sibling_columns_of_a_batch_colocate() {
	let a = ColumnKey::new(99, 3, 0);
	let stats = a.with_column_index(STATROW_COL_INDEX);
	let mask = a.with_column_index(DELETE_MASK_COL_INDEX);
	assert_eq!(a.routing_object(), stats.routing_object());
	assert_eq!(a.routing_object(), mask.routing_object());
}

#[test]
fn e2_round_trips_header_and_payload() {
	let allocator = HeapOnlyAllocator;
	let value = fresh_with_codec(b"hello column world", codec::NONE, &allocator);

	let codecs = CodecRegistry::with_defaults();
	let disk = InMemoryDiskStore::new();
	let context = OpContext { allocator: &allocator, codecs: &codecs, disk_store: &disk };

	let mut out = Vec::new();
	value
		.write_to(
			&mut out,
			reifydb_store_column::wire::ValueKind::Column,
			reifydb_store_column::wire::ByteOrder::Big,
			true,
			&context,
		)
		.unwrap();

	assert_eq!(out[0], reifydb_store_column::wire::FIXED_ID_SENTINEL);
	assert_eq!(out[1], reifydb_store_column::wire::WIRE_TYPE_ID);
	assert_eq!(out.len(), 8 + b"hello column world".len());

	let restored = ColumnValue::read_from(&out[8..], codec::NONE, &allocator);
	let same = restored.get_value_retain(false, false, &context).unwrap();
	assert!(Arc::ptr_eq(&same, &restored));
}

#[test]
fn e4_hysteresis_eventually_replaces_in_place() {
	let allocator = HeapOnlyAllocator;
	let codecs = CodecRegistry::with_defaults();
	let disk = InMemoryDiskStore::new();
	let context = OpContext { allocator: &allocator, codecs: &codecs, disk_store: &disk };

	let payload = vec![b'z'; 4096];
	let value = fresh_with_codec(&payload, codec::ZSTD, &allocator);

	// Each call below operates on the *same* `value`, mirroring spec E4:
	// with no external retainer on a heap-backed buffer, the first two
	// calls only advance the decompression counter (each handing back an
	// independent, discarded compressed snapshot); the third exceeds
	// MAX_CONSECUTIVE_COMPRESSIONS and replaces `value`'s own buffer in place.
	let snapshot_one = value.compress_value(&context).unwrap();
	assert!(!Arc::ptr_eq(&snapshot_one, &value));

	let snapshot_two = value.compress_value(&context).unwrap();
	assert!(!Arc::ptr_eq(&snapshot_two, &value));

	let replaced = value.compress_value(&context).unwrap();
	assert!(Arc::ptr_eq(&replaced, &value));
}

#[test]
fn e4_external_retainer_on_direct_buffer_blocks_in_place_replace() {
	let allocator = HeapOnlyAllocator;
	let codecs = CodecRegistry::with_defaults();
	let disk = InMemoryDiskStore::new();
	let context = OpContext { allocator: &allocator, codecs: &codecs, disk_store: &disk };

	// A direct (off-heap) stored buffer, so the hysteresis replace
	// decision is gated on `refCount <= 2` rather than always-true.
	let value = ColumnValue::new();
	let direct = allocator.allocate_direct(4096, reifydb_store_column::buffer::OwnerTag::Storage);
	unsafe { direct.as_mut_slice_unchecked() }.fill(b'z');
	value.set_buffer(direct, codec::ZSTD, false, false, &allocator).unwrap();

	// Drive the decompression counter past the threshold first, with no
	// external retainer, exactly as in the prior test.
	let _ = value.compress_value(&context).unwrap();
	let _ = value.compress_value(&context).unwrap();

	// Now two extra retainers hold the stored (direct) buffer's bytes open
	// directly (not just the `ColumnValue` wrapper), pushing its ref count
	// to 3 — past the `refCount <= 2` boundary from spec E4/§4.C — so the
	// in-place replace must be skipped even though the counter threshold
	// was already exceeded.
	let held = value.buffer().expect("compressed buffer present");
	assert!(held.retain());
	assert!(held.retain());
	assert_eq!(held.ref_count(), 3);

	let still_not_replaced = value.compress_value(&context).unwrap();
	assert!(!Arc::ptr_eq(&still_not_replaced, &value));

	held.release();
	held.release();
}

#[test]
fn e5_spill_recall_rehydrates_and_resets_refcount() {
	let allocator = HeapOnlyAllocator;
	let codecs = CodecRegistry::with_defaults();
	let disk = InMemoryDiskStore::new();
	let context = OpContext { allocator: &allocator, codecs: &codecs, disk_store: &disk };

	// no in-memory buffer: models an entry whose bytes were already spilled
	// and evicted, leaving only the disk location behind.
	let value = ColumnValue::new();
	disk.put(DiskId(42), b"durable payload".to_vec(), codec::NONE, false);
	let region: Arc<dyn RegionContext> = Arc::new(TestRegion { broker: Box::new(UnlimitedMemoryBroker) });
	value.set_disk_location(DiskId(42), Some(Arc::downgrade(&region)));

	let recalled = value.get_value_retain(false, false, &context).unwrap();
	assert_eq!(recalled.ref_count(), 1);
}

#[test]
fn e6_low_memory_denies_growth_on_decompress() {
	let allocator = HeapOnlyAllocator;
	let codecs = CodecRegistry::with_defaults();
	let disk = InMemoryDiskStore::new();
	let context = OpContext { allocator: &allocator, codecs: &codecs, disk_store: &disk };

	let payload = vec![b'q'; 8192];
	let value = fresh_with_codec(&payload, codec::ZSTD, &allocator);
	let compressed = value.compress_value(&context).unwrap();

	let region: Arc<dyn RegionContext> =
		Arc::new(TestRegion { broker: Box::new(BoundedMemoryBroker::new(0)) });
	compressed.attach_region(Arc::downgrade(&region));

	let err = compressed.decompress_value(&context).unwrap_err();
	assert!(matches!(err, Error::LowMemory { .. }));
}

#[test]
fn e7_fatal_disk_errors_are_swallowed_into_absence() {
	let allocator = HeapOnlyAllocator;
	let codecs = CodecRegistry::with_defaults();
	let disk = FailingDiskStore::new(|| DiskReadError::RegionDestroyed);
	let context = OpContext { allocator: &allocator, codecs: &codecs, disk_store: &disk };

	let value = ColumnValue::new();
	value.set_disk_location(DiskId(1), None);
	let result = value.get_value_retain(false, false, &context);
	assert!(result.is_ok());
}

#[test]
fn unbounded_broker_never_denies() {
	let broker = UnlimitedMemoryBroker;
	assert!(broker.try_acquire(i64::MAX / 2));
}
