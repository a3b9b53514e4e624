// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use crate::buffer::{BufferAllocator, BufferRef, OwnerTag};
use crate::codec::Codec;

/// The `NONE` codec: `compress` and `decompress` are both identity copies.
///
/// `ColumnValue::compress_value` special-cases `codecId == NONE` as a no-op
/// before ever reaching this codec, but the adapter still needs a concrete
/// implementation registered at id 0 so generic callers (e.g. `readFrom`
/// restoring a previously-uncompressed payload) have something to dispatch to.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneCodec;

impl Codec for NoneCodec {
	fn decompress(&self, src: &[u8], allocator: &dyn BufferAllocator) -> crate::Result<BufferRef> {
		let dst = allocator.allocate_direct(src.len(), OwnerTag::Decompression);
		// SAFETY: freshly allocated, ref_count == 1, no other reader exists.
		unsafe { dst.as_mut_slice_unchecked() }.copy_from_slice(src);
		Ok(dst)
	}

	fn compress(&self, src: &[u8], _allocator: &dyn BufferAllocator) -> crate::Result<BufferRef> {
		Ok(BufferRef::new_heap(src.to_vec()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::buffer::HeapOnlyAllocator;

	#[test]
	fn compress_and_decompress_are_identity() {
		let allocator = HeapOnlyAllocator;
		let codec = NoneCodec;
		let payload = b"untouched bytes";

		let compressed = codec.compress(payload, &allocator).unwrap();
		assert_eq!(compressed.as_slice(), payload);

		let decompressed = codec.decompress(payload, &allocator).unwrap();
		assert_eq!(decompressed.as_slice(), payload);
	}
}
