// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The column-format value itself: a reference-counted, lazily
//! (de)compressed, optionally disk-spilled handle over one cell's bytes
//! (spec §3, §4.C).

mod state;

pub use state::CompressionState;

use crate::buffer::{BufferAllocator, BufferRef, OwnerTag};
use crate::codec::CodecRegistry;
use crate::constants::{MAX_CONSECUTIVE_COMPRESSIONS, TRIM_THRESHOLD_BYTES};
use crate::error::{Error, Result};
use crate::region::{DiskId, DiskStore, RegionContext};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{instrument, trace, warn};

/// The collaborators an operation needs, bundled for convenience. Mirrors the
/// dependency-injected contracts of spec §1.1/§6: nothing here is global
/// state, every call site threads its own.
pub struct OpContext<'a> {
	/// Produces fresh heap/off-heap buffers for replace and recall paths.
	pub allocator: &'a dyn BufferAllocator,
	/// Looks up a [`crate::codec::Codec`] by wire codec id.
	pub codecs: &'a CodecRegistry,
	/// The disk-read primitive used for spill recall.
	pub disk_store: &'a dyn DiskStore,
}

struct Inner {
	buffer: Option<BufferRef>,
	codec_id: u8,
	state: CompressionState,
	from_disk: bool,
	disk_id: Option<DiskId>,
	region_ctx: Option<Weak<dyn RegionContext>>,
}

/// A column cell's value: an off-heap (or heap) byte buffer plus the
/// bookkeeping needed to compress, decompress, and spill/recall it without
/// ever losing track of who holds a live reference to its bytes.
///
/// Always held behind an `Arc`: compression and decompression can hand back
/// either `self` (mutated in place) or a brand-new `ColumnValue` sharing no
/// state with the original, depending on how many other readers are
/// currently retaining the stored buffer (spec §4.C, §5).
pub struct ColumnValue {
	inner: Mutex<Inner>,
	ref_count: AtomicI64,
}

// SAFETY: all interior state is guarded by `inner`'s mutex or is itself
// atomic; `ColumnValue` has no thread-affine state.
unsafe impl Send for ColumnValue {}
unsafe impl Sync for ColumnValue {}

impl ColumnValue {
	/// A freshly constructed, empty value: no buffer, `NOT_COMPRESSIBLE`,
	/// `refCount = 1` (the constructing caller's own hold).
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			inner: Mutex::new(Inner {
				buffer: None,
				codec_id: crate::codec::NONE,
				state: CompressionState::NotCompressible,
				from_disk: false,
				disk_id: None,
				region_ctx: None,
			}),
			ref_count: AtomicI64::new(1),
		})
	}

	fn from_parts(
		buffer: BufferRef,
		codec_id: u8,
		state: CompressionState,
		from_disk: bool,
		disk_id: Option<DiskId>,
		region_ctx: Option<Weak<dyn RegionContext>>,
	) -> Arc<Self> {
		Arc::new(Self {
			inner: Mutex::new(Inner {
				buffer: Some(buffer),
				codec_id,
				state,
				from_disk,
				disk_id,
				region_ctx,
			}),
			ref_count: AtomicI64::new(1),
		})
	}

	/// Attaches a region back-reference used for memory accounting and
	/// preferred-codec lookups during `setDiskLocation`/compress/decompress.
	pub fn attach_region(&self, region_ctx: Weak<dyn RegionContext>) {
		self.inner.lock().region_ctx = Some(region_ctx);
	}

	/// Installs a freshly produced buffer as this value's sole content.
	///
	/// `transfer_ownership` moves the bytes into `allocator`'s pool under
	/// [`OwnerTag::Storage`] (e.g. adopting a network-received heap buffer
	/// into the off-heap pool); otherwise the buffer is simply retagged in
	/// place. Only valid while this value has no other concurrent holder
	/// (`refCount == 1`); violating that is a caller bug, not a recoverable
	/// race, so it returns [`Error::InvalidState`].
	pub fn set_buffer(
		self: &Arc<Self>,
		buffer: BufferRef,
		codec_id: u8,
		compressed: bool,
		transfer_ownership: bool,
		allocator: &dyn BufferAllocator,
	) -> Result<()> {
		if self.ref_count.load(Ordering::Acquire) != 1 {
			return Err(Error::InvalidState("set_buffer requires refCount == 1"));
		}
		let buffer = if transfer_ownership {
			buffer.transfer_to(allocator, OwnerTag::Storage)
		} else {
			buffer.set_owner(OwnerTag::Storage);
			buffer
		};

		let mut inner = self.inner.lock();
		if let Some(old) = inner.buffer.take() {
			old.release();
		}
		inner.buffer = Some(buffer);
		inner.codec_id = codec_id;
		inner.state = if compressed { CompressionState::Compressed } else { CompressionState::Decompressed(1) };
		inner.from_disk = false;
		Ok(())
	}

	/// Records where this value's durable copy lives, for future spill
	/// recall. Does not itself write anything to disk.
	///
	/// Idempotent. When `region` is given, it also becomes this value's
	/// region back-reference, and `codecId` is updated to the region's
	/// preferred codec so a later `compressValue` picks it up without the
	/// caller threading it through separately (spec §4.C).
	pub fn set_disk_location(&self, disk_id: DiskId, region: Option<Weak<dyn RegionContext>>) {
		let mut inner = self.inner.lock();
		inner.disk_id = Some(disk_id);
		if let Some(region) = region {
			if let Some(upgraded) = region.upgrade() {
				inner.codec_id = upgraded.preferred_codec_id();
			}
			inner.region_ctx = Some(region);
		}
	}

	/// Current logical reference count.
	pub fn ref_count(&self) -> i64 {
		self.ref_count.load(Ordering::Acquire).max(0)
	}

	/// Increments the reference count if it hasn't already reached zero.
	/// Returns `false` if this value has already been fully released —
	/// callers must treat that as "entry evicted" and look the key up again.
	pub fn retain(&self) -> bool {
		let mut current = self.ref_count.load(Ordering::Acquire);
		loop {
			if current <= 0 {
				return false;
			}
			match self.ref_count.compare_exchange_weak(
				current,
				current + 1,
				Ordering::AcqRel,
				Ordering::Acquire,
			) {
				Ok(_) => return true,
				Err(observed) => current = observed,
			}
		}
	}

	/// Decrements the reference count. At zero, releases the held buffer
	/// exactly once.
	pub fn release(&self) {
		let previous = self.ref_count.fetch_sub(1, Ordering::AcqRel);
		if previous == 1 {
			self.release_buffer();
		}
	}

	fn release_buffer(&self) {
		let mut inner = self.inner.lock();
		if let Some(buffer) = inner.buffer.take() {
			buffer.release();
		}
		inner.state = CompressionState::NotCompressible;
		inner.from_disk = false;
	}

	/// The currently stored buffer handle, if any.
	///
	/// Per spec §3.1, reading it is only well-defined while the caller holds
	/// an active `retain()` on this value (or the `BufferRef` it returns) —
	/// this accessor itself performs no retain.
	pub fn buffer(&self) -> Option<BufferRef> {
		self.inner.lock().buffer.clone()
	}

	/// A synthetic size estimate covering the container's own overhead plus,
	/// when a buffer is present, the buffer wrapper, its capacity, and (for
	/// off-heap buffers) the allocator cleaner overhead — per spec §4.F,
	/// stable across calls for the same logical state and independent of
	/// `refCount`.
	pub fn size_in_bytes(&self) -> u64 {
		let inner = self.inner.lock();
		let buffer_cost = inner.buffer.as_ref().map_or(0, |b| {
			let cleaner = if b.is_direct() { crate::constants::DIRECT_OBJECT_OVERHEAD } else { 0 };
			crate::constants::BUFFER_WRAPPER_OVERHEAD + b.capacity() as u64 + cleaner
		});
		crate::constants::CONTAINER_OVERHEAD + buffer_cost
	}

	/// Off-heap bytes charged against the memory broker: zero for heap
	/// buffers or an absent buffer.
	pub fn off_heap_size_in_bytes(&self) -> u64 {
		let inner = self.inner.lock();
		match &inner.buffer {
			Some(buffer) if buffer.is_direct() => {
				buffer.capacity() as u64 + crate::constants::DIRECT_OBJECT_OVERHEAD
			}
			_ => 0,
		}
	}

	/// Retrieves this value's bytes, optionally decompressing or
	/// compressing it first, recalling from disk if the buffer has been
	/// evicted. Returns either `self` (mutated in place) or a brand-new
	/// value; either way the caller now holds exactly one retain on the
	/// returned value and must `release()` it (spec §4.C).
	#[instrument(name = "column_value::get_value_retain", level = "trace", skip(self, ctx))]
	pub fn get_value_retain(
		self: &Arc<Self>,
		decompress: bool,
		compress: bool,
		ctx: &OpContext,
	) -> Result<Arc<Self>> {
		if decompress && compress {
			return Err(Error::BadArgument("decompress and compress are mutually exclusive"));
		}

		let pinned = {
			let inner = self.inner.lock();
			inner.buffer.as_ref().and_then(|b| if b.retain() { Some(b.clone()) } else { None })
		};

		if let Some(pinned) = pinned {
			self.ref_count.fetch_add(1, Ordering::AcqRel);
			let result = self.transform(decompress, compress, ctx);
			pinned.release();
			return result;
		}

		let (disk_id, region_ctx) = {
			let inner = self.inner.lock();
			(inner.disk_id, inner.region_ctx.clone())
		};

		let Some(disk_id) = disk_id else {
			self.ref_count.fetch_add(1, Ordering::AcqRel);
			return Ok(self.clone());
		};

		match ctx.disk_store.read(disk_id) {
			Ok(Some(raw)) => {
				raw.buffer.set_owner(OwnerTag::Storage);
				{
					let mut inner = self.inner.lock();
					inner.state = if raw.compressed {
						CompressionState::Compressed
					} else {
						CompressionState::Decompressed(1)
					};
					inner.buffer = Some(raw.buffer);
					inner.codec_id = raw.codec_id;
					inner.from_disk = true;
				}
				self.ref_count.store(1, Ordering::Release);
				if let Some(region) = region_ctx.as_ref().and_then(Weak::upgrade) {
					// Recalled bytes were tagged with whatever codec wrote
					// them to disk (`raw.codec_id` above); the owning
					// region's preferred codec governs the *next*
					// `compress_value`, matching `set_disk_location`'s own
					// "region, when given, overrides codecId" behavior.
					let mut inner = self.inner.lock();
					inner.codec_id = region.preferred_codec_id();
				}
				self.transform(decompress, compress, ctx)
			}
			Ok(None) | Err(_) => {
				// Tombstoned, destroyed, or otherwise unreadable: treated as
				// an absent entry rather than propagated, per spec §7.
				warn!(?disk_id, "disk recall found no readable entry, treating as absent");
				self.ref_count.fetch_add(1, Ordering::AcqRel);
				Ok(self.clone())
			}
		}
	}

	// Every caller has already accounted for the retain this call returns
	// (a `ref_count.fetch_add(1)` taken before `transform` runs); on success
	// that hold either becomes the returned `self` or is released in favor
	// of a brand-new value below. On error neither of those happens, so the
	// same release must run here too, or the `+1` is stranded forever (spec
	// §5: every MemoryBroker/refcount acquisition is released on every path,
	// including failure).
	fn transform(self: &Arc<Self>, decompress: bool, compress: bool, ctx: &OpContext) -> Result<Arc<Self>> {
		if decompress {
			match self.decompress_value(ctx) {
				Ok(result) => {
					if !Arc::ptr_eq(&result, self) {
						self.release();
					}
					Ok(result)
				}
				Err(err) => {
					self.release();
					Err(err)
				}
			}
		} else if compress {
			match self.compress_value(ctx) {
				Ok(result) => {
					if !Arc::ptr_eq(&result, self) {
						self.release();
					}
					Ok(result)
				}
				Err(err) => {
					self.release();
					Err(err)
				}
			}
		} else {
			Ok(self.clone())
		}
	}

	/// Ensures the held buffer's type-bearing form is decompressed,
	/// replacing the stored buffer in place when safe to do so and handing
	/// back a brand-new value otherwise (spec §4.C, hysteresis in §5/§9).
	#[instrument(name = "column_value::decompress_value", level = "trace", skip(self, ctx))]
	pub fn decompress_value(self: &Arc<Self>, ctx: &OpContext) -> Result<Arc<Self>> {
		let mut inner = self.inner.lock();

		match inner.state {
			CompressionState::NotCompressible => return Ok(self.clone()),
			CompressionState::Decompressed(n) => {
				if n > 1 {
					inner.state = CompressionState::Decompressed(1);
				}
				return Ok(self.clone());
			}
			CompressionState::Compressed => {}
		}

		let Some(buf) = inner.buffer.clone() else { return Ok(self.clone()) };
		let leading = buf.leading_i32_le().ok_or(Error::CorruptValue("buffer shorter than header"))?;

		if leading >= 0 {
			warn!(leading, "compressed buffer carries a non-negative leading marker, treating as corrupt");
			if let Some(region) = inner.region_ctx.as_ref().and_then(Weak::upgrade) {
				region.record_corrupt_value();
			}
			inner.state = CompressionState::Decompressed(1);
			return Ok(self.clone());
		}

		let codec_id = (-leading) as u8;
		let codec = ctx.codecs.get(codec_id).ok_or(Error::CorruptValue("unknown codec id"))?;
		// The leading 4 bytes are this value's own marker (spec §3.1), not
		// part of what the codec produced; only the bytes after it are the
		// actual compressed stream.
		let decompressed = codec.decompress(&buf.as_slice()[4..], ctx.allocator)?;

		let replace = !buf.is_direct() || buf.ref_count() <= 2;
		let from_disk = inner.from_disk;
		let region_ctx = inner.region_ctx.clone();

		if replace {
			if !from_disk {
				if let Some(region) = region_ctx.as_ref().and_then(Weak::upgrade) {
					let delta = decompressed.capacity() as i64 - buf.capacity() as i64;
					if delta > 0 && !region.memory_broker().try_acquire(delta) {
						warn!(requested = delta, "decompression growth denied by memory broker");
						decompressed.release();
						return Err(Error::LowMemory { requested: delta });
					}
					if delta < 0 {
						region.memory_broker().release(-delta);
					}
				}
			}
			decompressed.set_owner(OwnerTag::Storage);
			let old = inner.buffer.replace(decompressed);
			inner.state = CompressionState::Decompressed(1);
			drop(inner);
			if let Some(old) = old {
				old.release();
			}
			Ok(self.clone())
		} else {
			let codec_id = inner.codec_id;
			let disk_id = inner.disk_id;
			drop(inner);
			decompressed.set_owner(OwnerTag::Storage);
			Ok(Self::from_parts(
				decompressed,
				codec_id,
				CompressionState::Decompressed(1),
				from_disk,
				disk_id,
				region_ctx,
			))
		}
	}

	/// Attempts to compress the held buffer, applying the hysteresis
	/// described in spec §4.C/§9: a sticky `NOT_COMPRESSIBLE` once a codec
	/// fails to shrink the payload, and an in-place replace only once the
	/// decompression counter has run past [`MAX_CONSECUTIVE_COMPRESSIONS`]
	/// while no other reader is retaining the stored buffer.
	#[instrument(name = "column_value::compress_value", level = "trace", skip(self, ctx))]
	pub fn compress_value(self: &Arc<Self>, ctx: &OpContext) -> Result<Arc<Self>> {
		let mut inner = self.inner.lock();

		let n = match inner.state {
			CompressionState::NotCompressible | CompressionState::Compressed => return Ok(self.clone()),
			CompressionState::Decompressed(n) => n,
		};

		if inner.codec_id == crate::codec::NONE {
			return Ok(self.clone());
		}

		let Some(buf) = inner.buffer.clone() else { return Ok(self.clone()) };
		let codec_id = inner.codec_id;
		let codec = ctx.codecs.get(codec_id).ok_or(Error::CorruptValue("unknown codec id"))?;
		let raw_compressed = codec.compress(buf.as_slice(), ctx.allocator)?;

		if raw_compressed.len() == buf.len() {
			warn!(codec_id, "codec produced no reduction, marking value not compressible");
			inner.state = CompressionState::NotCompressible;
			let region_ctx = inner.region_ctx.clone();
			drop(inner);
			if let Some(region) = region_ctx.as_ref().and_then(Weak::upgrade) {
				region.record_compression_skip();
			}
			raw_compressed.release();
			return Ok(self.clone());
		}

		// Frame the codec's raw output with this value's own leading marker
		// (spec §3.1): `-codecId` as a little-endian i32 at byte 0, so a
		// later `decompress_value` (or a reader on the wire) can recover
		// which codec produced these bytes without any out-of-band state.
		let compressed =
			BufferRef::framed(-(codec_id as i32), raw_compressed.as_slice(), raw_compressed.is_direct(), OwnerTag::Storage);
		raw_compressed.release();

		let replace = n > MAX_CONSECUTIVE_COMPRESSIONS && (!buf.is_direct() || buf.ref_count() <= 2);
		let region_ctx = inner.region_ctx.clone();
		let from_disk = inner.from_disk;
		let disk_id = inner.disk_id;

		if replace {
			let slack = compressed.capacity().saturating_sub(compressed.len());
			let adopted = if slack >= TRIM_THRESHOLD_BYTES {
				let trimmed = BufferRef::direct_from_slice(compressed.as_slice(), OwnerTag::Storage);
				if compressed.is_direct() {
					compressed.release();
				}
				trimmed
			} else {
				compressed
			};

			if let Some(region) = region_ctx.as_ref().and_then(Weak::upgrade) {
				let freed = buf.capacity() as i64 - adopted.capacity() as i64;
				if freed > 0 {
					region.memory_broker().release(freed);
				}
			}

			trace!("replacing stored buffer in place after hysteresis threshold");
			let old = inner.buffer.replace(adopted);
			inner.state = CompressionState::Compressed;
			drop(inner);
			if let Some(old) = old {
				old.release();
			}
			Ok(self.clone())
		} else {
			inner.state = CompressionState::Decompressed(n.saturating_add(1));
			drop(inner);
			Ok(Self::from_parts(
				compressed,
				codec_id,
				CompressionState::Compressed,
				from_disk,
				disk_id,
				region_ctx,
			))
		}
	}

	/// Serializes this value's header and payload into `out`.
	///
	/// Retains and, unless `same_host` (the destination is a loopback/
	/// in-process channel not worth spending CPU to shrink for), compresses
	/// the value before emitting it — a cross-host channel always receives
	/// the compressed form when a non-`NONE` codec is configured. Writes a
	/// zero-length frame (header only, no payload) when no buffer is present
	/// even after recall.
	pub fn write_to(
		self: &Arc<Self>,
		out: &mut Vec<u8>,
		kind: crate::wire::ValueKind,
		order: crate::wire::ByteOrder,
		same_host: bool,
		ctx: &OpContext,
	) -> Result<()> {
		let retained = self.get_value_retain(false, !same_host, ctx)?;

		let inner = retained.inner.lock();
		let payload_len = inner.buffer.as_ref().map(|b| b.len()).unwrap_or(0) as i32;

		let mut header = [0u8; 8];
		crate::wire::write_serialization_header(&mut header, kind, payload_len, order);
		out.extend_from_slice(&header);

		if let Some(buffer) = inner.buffer.as_ref() {
			out.extend_from_slice(buffer.as_slice());
		}
		drop(inner);
		retained.release();
		Ok(())
	}

	/// Reconstructs a value from bytes previously produced by
	/// [`ColumnValue::write_to`]'s payload (header already consumed by the
	/// caller, as the channel/stream layer owns framing). `codec_id`
	/// reflects whichever codec produced the leading sign the payload
	/// carries; pass [`crate::codec::NONE`] for an always-decompressed form.
	pub fn read_from(payload: &[u8], codec_id: u8, allocator: &dyn BufferAllocator) -> Arc<Self> {
		if payload.is_empty() {
			return Self::new();
		}
		let buffer = allocator.allocate_direct(payload.len(), OwnerTag::Storage);
		// SAFETY: freshly allocated, ref_count == 1, no other reader exists.
		unsafe { buffer.as_mut_slice_unchecked() }.copy_from_slice(payload);

		let state = match buffer.leading_i32_le() {
			Some(leading) if leading < 0 => CompressionState::Compressed,
			_ => CompressionState::Decompressed(1),
		};

		Self::from_parts(buffer, codec_id, state, false, None, None)
	}
}

impl std::fmt::Debug for ColumnValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.inner.lock();
		f.debug_struct("ColumnValue")
			.field("ref_count", &self.ref_count())
			.field("state", &inner.state)
			.field("from_disk", &inner.from_disk)
			.field("has_buffer", &inner.buffer.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer::HeapOnlyAllocator;
	use crate::codec::{CodecRegistry, NONE};
	use crate::region::InMemoryDiskStore;

	fn ctx<'a>(
		allocator: &'a HeapOnlyAllocator,
		codecs: &'a CodecRegistry,
		disk_store: &'a InMemoryDiskStore,
	) -> OpContext<'a> {
		OpContext { allocator, codecs, disk_store }
	}

	fn fresh_with_bytes(bytes: &[u8]) -> Arc<ColumnValue> {
		let value = ColumnValue::new();
		let allocator = HeapOnlyAllocator;
		value.set_buffer(BufferRef::new_heap(bytes.to_vec()), NONE, false, false, &allocator).unwrap();
		value
	}

	#[test]
	fn fresh_value_has_no_buffer_and_refcount_one() {
		let value = ColumnValue::new();
		assert_eq!(value.ref_count(), 1);
		assert!(value.size_in_bytes() >= crate::constants::CONTAINER_OVERHEAD);
	}

	#[test]
	fn set_buffer_rejects_shared_value() {
		let value = ColumnValue::new();
		let allocator = HeapOnlyAllocator;
		assert!(value.retain());
		let err = value.set_buffer(BufferRef::new_heap(vec![1, 2, 3]), NONE, false, false, &allocator);
		assert!(matches!(err, Err(Error::InvalidState(_))));
	}

	#[test]
	fn retain_fails_after_full_release() {
		let value = ColumnValue::new();
		value.release();
		assert_eq!(value.ref_count(), 0);
		assert!(!value.retain());
	}

	#[test]
	fn get_value_retain_round_trips_through_zstd() {
		let allocator = HeapOnlyAllocator;
		let codecs = CodecRegistry::with_defaults();
		let disk = InMemoryDiskStore::new();
		let context = ctx(&allocator, &codecs, &disk);

		let payload = b"payload payload payload payload payload payload payload payload".repeat(4);
		let value = ColumnValue::new();
		value
			.set_buffer(BufferRef::new_heap(payload.clone()), crate::codec::ZSTD, false, false, &allocator)
			.unwrap();

		let compressed = value.get_value_retain(false, true, &context).unwrap();
		assert!(compressed.ref_count() >= 1);
		{
			let inner = compressed.inner.lock();
			assert!(inner.state.is_compressed());
			let leading = inner.buffer.as_ref().unwrap().leading_i32_le().unwrap();
			assert_eq!(leading, -(crate::codec::ZSTD as i32));
		}

		let decompressed = compressed.get_value_retain(true, false, &context).unwrap();
		let inner = decompressed.inner.lock();
		assert_eq!(inner.buffer.as_ref().unwrap().as_slice(), payload.as_slice());
	}

	#[test]
	fn compress_value_is_sticky_once_incompressible() {
		let allocator = HeapOnlyAllocator;
		let codecs = CodecRegistry::with_defaults();
		let disk = InMemoryDiskStore::new();
		let context = ctx(&allocator, &codecs, &disk);

		// single already-small byte: zstd cannot beat the improvement ratio.
		let mut value = fresh_with_bytes(&[7]);
		value.inner.lock().codec_id = crate::codec::ZSTD;
		let value = value.compress_value(&context).unwrap();
		let inner = value.inner.lock();
		assert!(inner.state.is_not_compressible());
	}

	#[test]
	fn low_memory_denies_decompression_growth() {
		use crate::memory::DenyingMemoryBroker;

		struct Region {
			broker: DenyingMemoryBroker,
		}
		impl RegionContext for Region {
			fn memory_broker(&self) -> &dyn crate::memory::MemoryBroker {
				&self.broker
			}
			fn preferred_codec_id(&self) -> u8 {
				crate::codec::ZSTD
			}
			fn record_compression_skip(&self) {}
			fn record_corrupt_value(&self) {}
		}

		let allocator = HeapOnlyAllocator;
		let codecs = CodecRegistry::with_defaults();
		let disk = InMemoryDiskStore::new();
		let context = ctx(&allocator, &codecs, &disk);

		let payload = vec![b'x'; 4096];
		let value = fresh_with_bytes(&payload);
		value.inner.lock().codec_id = crate::codec::ZSTD;
		let compressed = value.compress_value(&context).unwrap();

		let region: Arc<dyn RegionContext> = Arc::new(Region { broker: DenyingMemoryBroker });
		compressed.attach_region(Arc::downgrade(&region));

		let err = compressed.decompress_value(&context).unwrap_err();
		assert!(matches!(err, Error::LowMemory { .. }));
	}

	#[test]
	fn spill_recall_rehydrates_absent_buffer() {
		let allocator = HeapOnlyAllocator;
		let codecs = CodecRegistry::with_defaults();
		let disk = InMemoryDiskStore::new();
		let context = ctx(&allocator, &codecs, &disk);

		let value = fresh_with_bytes(b"durable bytes");
		disk.put(DiskId(1), b"durable bytes".to_vec(), NONE, false);
		value.set_disk_location(DiskId(1), None);
		value.release_buffer();

		let recalled = value.get_value_retain(false, false, &context).unwrap();
		assert_eq!(recalled.ref_count(), 1);
		let inner = recalled.inner.lock();
		assert_eq!(inner.buffer.as_ref().unwrap().as_slice(), b"durable bytes");
	}

	#[test]
	fn disk_read_failure_yields_absent_value_not_an_error() {
		use crate::region::{DiskReadError, FailingDiskStore};

		let allocator = HeapOnlyAllocator;
		let codecs = CodecRegistry::with_defaults();
		let disk = FailingDiskStore::new(|| DiskReadError::DiskAccess("corrupt oplog".into()));
		let context = OpContext { allocator: &allocator, codecs: &codecs, disk_store: &disk };

		let value = ColumnValue::new();
		value.set_disk_location(DiskId(7), None);
		let result = value.get_value_retain(false, false, &context).unwrap();
		let inner = result.inner.lock();
		assert!(inner.buffer.is_none());
	}

	#[test]
	fn write_to_then_read_from_round_trips_payload() {
		let allocator = HeapOnlyAllocator;
		let codecs = CodecRegistry::with_defaults();
		let disk = InMemoryDiskStore::new();
		let context = ctx(&allocator, &codecs, &disk);
		let value = fresh_with_bytes(&10i32.to_le_bytes());

		let mut out = Vec::new();
		value
			.write_to(&mut out, crate::wire::ValueKind::Column, crate::wire::ByteOrder::Big, true, &context)
			.unwrap();
		assert_eq!(&out[0..2], &[crate::wire::FIXED_ID_SENTINEL, crate::wire::WIRE_TYPE_ID]);

		let payload = &out[8..];
		let restored = ColumnValue::read_from(payload, NONE, &allocator);
		let inner = restored.inner.lock();
		assert_eq!(inner.buffer.as_ref().unwrap().as_slice(), 10i32.to_le_bytes());
	}
}
