// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use crate::buffer::{BufferRef, OwnerTag};

/// External collaborator contract: heap and off-heap allocation.
///
/// The real allocator lives in the embedding engine (it tracks slab pools,
/// per-pool accounting, etc). This crate only needs the two entry points it
/// calls on the hot paths of [`crate::value::ColumnValue`].
pub trait BufferAllocator: Send + Sync {
	/// Allocates `len` bytes on the heap, owned by the returned [`BufferRef`].
	fn allocate_heap(&self, len: usize) -> BufferRef;

	/// Allocates `len` bytes off-heap under `owner`, owned by the returned
	/// [`BufferRef`]. Implementations that have no off-heap pool (tests,
	/// single-node embedded use) may fall back to a heap allocation; the
	/// state machine only distinguishes "direct" buffers by the flag carried
	/// on the returned [`BufferRef`], not by which allocator produced them.
	fn allocate_direct(&self, len: usize, owner: OwnerTag) -> BufferRef;
}

/// A [`BufferAllocator`] that always allocates on the heap.
///
/// Used by embeddings that have no off-heap pool configured, and by tests
/// that don't care about the on-heap/off-heap distinction.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapOnlyAllocator;

impl BufferAllocator for HeapOnlyAllocator {
	fn allocate_heap(&self, len: usize) -> BufferRef {
		BufferRef::new_heap(vec![0u8; len])
	}

	fn allocate_direct(&self, len: usize, owner: OwnerTag) -> BufferRef {
		BufferRef::new_direct(len, owner)
	}
}
