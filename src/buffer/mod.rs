// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Reference-counted handles over heap and off-heap byte buffers.
//!
//! [`BufferRef`] is the unit of buffer ownership shared between
//! [`crate::value::ColumnValue`] instances, disk-recall paths, and codecs.
//! Off-heap ("direct") buffers are freed exactly once, when the shared
//! reference count drops to zero; heap buffers are freed by ordinary Rust
//! drop semantics once the last `BufferRef` pointing at them is dropped.

/// The `BufferAllocator` collaborator contract plus a heap-only stand-in.
pub mod allocator;

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

pub use allocator::{BufferAllocator, HeapOnlyAllocator};

/// Accounting identity attached to an off-heap allocation. Transfers between
/// pools (e.g. "decompression scratch" -> "column storage") change the tag
/// atomically rather than reallocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerTag {
	/// Backing a live `ColumnValue` entry in a region.
	Storage,
	/// Transient scratch produced by a codec, not yet adopted by a value.
	Decompression,
}

enum Kind {
	Heap(Box<[u8]>),
	Direct { ptr: NonNull<u8>, layout: Layout },
}

// SAFETY: `Kind::Direct`'s pointer is exclusively owned by the `Shared` that
// holds it; it is only read while `ref_count >= 1` and only freed by the
// thread whose `release` observes the count transition to zero, which can
// only happen once (enforced by the atomic fetch_sub below).
unsafe impl Send for Kind {}
unsafe impl Sync for Kind {}

struct Shared {
	kind: Kind,
	len: usize,
	ref_count: AtomicI64,
	owner: parking_lot::Mutex<OwnerTag>,
}

impl Drop for Shared {
	fn drop(&mut self) {
		// A BufferRef that was retained down to exactly the handles that
		// still exist gets here via ordinary Arc drop (e.g. it was never
		// adopted into a ColumnValue). Off-heap memory not already freed by
		// `release` reaching zero must still be freed here.
		if let Kind::Direct { ptr, layout } = self.kind {
			if self.ref_count.load(Ordering::Acquire) != i64::MIN {
				// SAFETY: no other BufferRef can observe this allocation
				// once the last Arc<Shared> is being dropped.
				unsafe { dealloc(ptr.as_ptr(), layout) };
			}
		}
	}
}

/// A reference-counted view over one contiguous byte region.
///
/// Cloning a `BufferRef` is cheap (it clones the internal `Arc`) but does
/// **not** perform the logical `retain()` the spec requires before a read —
/// callers must call [`BufferRef::retain`] explicitly, exactly as the spec's
/// `retain`/`release` pair describes. This mirrors the spec precisely:
/// `retain` can fail once the logical count has hit zero even though the
/// `Arc` metadata handle itself is still alive.
#[derive(Clone)]
pub struct BufferRef {
	shared: Arc<Shared>,
	start: usize,
	end: usize,
}

impl BufferRef {
	/// Wraps an owned `Vec<u8>` as a heap buffer with `ref_count = 1`.
	pub fn new_heap(data: Vec<u8>) -> Self {
		let len = data.len();
		let shared = Arc::new(Shared {
			kind: Kind::Heap(data.into_boxed_slice()),
			len,
			ref_count: AtomicI64::new(1),
			owner: parking_lot::Mutex::new(OwnerTag::Storage),
		});
		Self { shared, start: 0, end: len }
	}

	/// Allocates a zeroed off-heap buffer of `len` bytes with `ref_count = 1`.
	pub fn new_direct(len: usize, owner: OwnerTag) -> Self {
		let layout = Layout::array::<u8>(len.max(1)).expect("buffer length overflow");
		// SAFETY: layout is non-zero-sized (len.max(1)) and well-formed.
		let ptr = unsafe { alloc_zeroed(layout) };
		let ptr = NonNull::new(ptr).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
		let shared = Arc::new(Shared {
			kind: Kind::Direct { ptr, layout },
			len,
			ref_count: AtomicI64::new(1),
			owner: parking_lot::Mutex::new(owner),
		});
		Self { shared, start: 0, end: len }
	}

	/// Convenience constructor for an off-heap buffer initialized from `bytes`.
	pub fn direct_from_slice(bytes: &[u8], owner: OwnerTag) -> Self {
		let buf = Self::new_direct(bytes.len(), owner);
		// SAFETY: freshly constructed, ref_count == 1, no other reader exists.
		unsafe { buf.as_mut_slice_unchecked() }.copy_from_slice(bytes);
		buf
	}

	/// Builds a buffer carrying a 4-byte little-endian `i32` header followed
	/// by `payload`, matching the leading-int convention of spec §3.1/§6.2
	/// (`header < 0` marks a compressed payload under `-header` as the codec
	/// id). `direct` picks the heap/off-heap backing; `leading_i32_le` reads
	/// the header straight back off byte 0 without knowing this layout.
	pub fn framed(leading: i32, payload: &[u8], direct: bool, owner: OwnerTag) -> Self {
		let total = 4 + payload.len();
		let buf = if direct { Self::new_direct(total, owner) } else { Self::new_heap(vec![0u8; total]) };
		// SAFETY: freshly constructed, ref_count == 1, no other reader exists.
		let slice = unsafe { buf.as_mut_slice_unchecked() };
		slice[0..4].copy_from_slice(&leading.to_le_bytes());
		slice[4..].copy_from_slice(payload);
		buf
	}

	/// True if this buffer is backed by an off-heap allocation.
	pub fn is_direct(&self) -> bool {
		matches!(self.shared.kind, Kind::Direct { .. })
	}

	/// Total capacity of the underlying allocation (not just this view).
	pub fn capacity(&self) -> usize {
		self.shared.len
	}

	/// Number of bytes addressable from this view's start.
	pub fn len(&self) -> usize {
		self.end - self.start
	}

	/// True iff this view addresses zero bytes.
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}

	/// Start offset of this view into the shared allocation.
	pub fn position(&self) -> usize {
		self.start
	}

	/// Current accounting owner tag.
	pub fn owner(&self) -> OwnerTag {
		*self.shared.owner.lock()
	}

	/// Atomically retags the owner of the underlying allocation in place
	/// (used when a buffer is adopted into storage from a scratch pool).
	pub fn set_owner(&self, owner: OwnerTag) {
		*self.shared.owner.lock() = owner;
	}

	/// Atomically increments the logical ref count if it is greater than
	/// zero. Returns `false` if the buffer has already been released to
	/// zero by another holder (lost the race with eviction).
	pub fn retain(&self) -> bool {
		let mut current = self.shared.ref_count.load(Ordering::Acquire);
		loop {
			if current <= 0 {
				return false;
			}
			match self.shared.ref_count.compare_exchange_weak(
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

	/// Decrements the logical ref count. If it reaches zero and the buffer
	/// is off-heap, frees the allocation exactly once.
	pub fn release(&self) {
		let previous = self.shared.ref_count.fetch_sub(1, Ordering::AcqRel);
		if previous == 1 {
			if let Kind::Direct { ptr, layout } = self.shared.kind {
				// Mark freed so `Shared::drop` does not double-free.
				self.shared.ref_count.store(i64::MIN, Ordering::Release);
				// SAFETY: previous == 1 means we are the thread that
				// observed the transition to zero; no other holder can
				// read this allocation after this point because every
				// reader is required to hold a successful `retain`.
				unsafe { dealloc(ptr.as_ptr(), layout) };
			}
		}
	}

	/// Current logical reference count. Exposed for tests and hysteresis
	/// decisions (`refCount <= 2` checks in the compression state machine).
	pub fn ref_count(&self) -> i64 {
		self.shared.ref_count.load(Ordering::Acquire).max(0)
	}

	/// Returns an independent read cursor over the same bytes starting at
	/// this view's current position. Does not copy memory; the returned
	/// `BufferRef` shares the same underlying allocation and accounting.
	pub fn duplicate(&self) -> Self {
		Self { shared: Arc::clone(&self.shared), start: self.start, end: self.end }
	}

	/// Read-only view of the addressable bytes.
	///
	/// # Safety
	/// Caller must hold a successful `retain()` for the duration of use.
	pub fn as_slice(&self) -> &[u8] {
		let base = match &self.shared.kind {
			Kind::Heap(bytes) => bytes.as_ptr(),
			Kind::Direct { ptr, .. } => ptr.as_ptr() as *const u8,
		};
		// SAFETY: `self.start..self.end` was established at construction
		// time to be within `0..shared.len`, and the caller is assumed to
		// hold a retain so the allocation is still live.
		unsafe { std::slice::from_raw_parts(base.add(self.start), self.len()) }
	}

	/// Mutable view of the addressable bytes, for use immediately after
	/// construction while `ref_count == 1` and no other handle exists.
	///
	/// # Safety
	/// Caller must ensure no other `BufferRef` handle is concurrently
	/// reading or writing this allocation.
	pub unsafe fn as_mut_slice_unchecked(&self) -> &mut [u8] {
		let base = match &self.shared.kind {
			Kind::Heap(bytes) => bytes.as_ptr() as *mut u8,
			Kind::Direct { ptr, .. } => ptr.as_ptr(),
		};
		unsafe { std::slice::from_raw_parts_mut(base.add(self.start), self.len()) }
	}

	/// Reads the first 4 bytes of this view as a little-endian `i32`, per
	/// the payload convention of §6.2 (negative = compressed marker).
	pub fn leading_i32_le(&self) -> Option<i32> {
		let slice = self.as_slice();
		if slice.len() < 4 {
			return None;
		}
		Some(i32::from_le_bytes(slice[0..4].try_into().unwrap()))
	}

	/// Moves this buffer's bytes to a freshly allocated buffer from
	/// `allocator`, tagged `owner`, and releases this buffer's hold.
	///
	/// Off-heap buffers cannot migrate pools by pointer games alone without
	/// an allocator-specific API, so this copies; callers on the hot path
	/// only call this when a buffer is already being replaced (skip-replace
	/// paths never call it).
	pub fn transfer_to(self, allocator: &dyn BufferAllocator, owner: OwnerTag) -> Self {
		let moved = if self.is_direct() {
			allocator.allocate_direct(self.len(), owner)
		} else {
			allocator.allocate_heap(self.len())
		};
		// SAFETY: `moved` was just constructed with ref_count == 1.
		unsafe { moved.as_mut_slice_unchecked() }.copy_from_slice(self.as_slice());
		self.release();
		moved
	}
}

impl std::fmt::Debug for BufferRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BufferRef")
			.field("len", &self.len())
			.field("capacity", &self.capacity())
			.field("direct", &self.is_direct())
			.field("ref_count", &self.ref_count())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn retain_succeeds_while_count_positive_and_fails_after_release() {
		let buf = BufferRef::new_heap(vec![1, 2, 3, 4]);
		assert!(buf.retain());
		assert_eq!(buf.ref_count(), 2);
		buf.release();
		buf.release();
		assert_eq!(buf.ref_count(), 0);
		assert!(!buf.retain());
	}

	#[test]
	fn duplicate_shares_bytes_and_refcount() {
		let buf = BufferRef::new_heap(vec![9, 9, 9]);
		let dup = buf.duplicate();
		assert_eq!(dup.as_slice(), buf.as_slice());
		assert!(dup.retain());
		assert_eq!(buf.ref_count(), 2);
	}

	#[test]
	fn direct_buffer_round_trips_bytes() {
		let buf = BufferRef::direct_from_slice(&[0xAA, 0xBB, 0xCC], OwnerTag::Storage);
		assert!(buf.is_direct());
		assert_eq!(buf.as_slice(), &[0xAA, 0xBB, 0xCC]);
		buf.release();
	}

	#[test]
	fn framed_buffer_carries_its_own_marker_and_payload() {
		let buf = BufferRef::framed(-2, &[0xAA, 0xBB, 0xCC], false, OwnerTag::Storage);
		assert_eq!(buf.leading_i32_le(), Some(-2));
		assert_eq!(&buf.as_slice()[4..], &[0xAA, 0xBB, 0xCC]);
		assert_eq!(buf.len(), 7);
	}

	#[test]
	fn leading_i32_matches_little_endian_convention() {
		let buf = BufferRef::new_heap(vec![0x0A, 0x00, 0x00, 0x00]);
		assert_eq!(buf.leading_i32_le(), Some(10));

		let compressed = BufferRef::new_heap((-2i32).to_le_bytes().to_vec());
		assert_eq!(compressed.leading_i32_le(), Some(-2));
	}
}
