// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use crate::buffer::{BufferAllocator, BufferRef, OwnerTag};
use crate::codec::Codec;
use crate::error::Error;

/// Minimum improvement ratio a compression attempt must clear before the
/// shrunk form is preferred over the original — see spec §4.C, `compressValue`.
const MIN_IMPROVEMENT_RATIO: f64 = 0.90;

/// `zstd`-backed [`Codec`]. The default compressing codec shipped by this
/// crate, registered at [`super::ZSTD`].
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
	level: i32,
}

impl Default for ZstdCodec {
	fn default() -> Self {
		Self { level: zstd::DEFAULT_COMPRESSION_LEVEL }
	}
}

impl ZstdCodec {
	/// A codec using a specific `zstd` compression level.
	pub fn with_level(level: i32) -> Self {
		Self { level }
	}
}

impl Codec for ZstdCodec {
	fn decompress(&self, src: &[u8], allocator: &dyn BufferAllocator) -> crate::Result<BufferRef> {
		let decoded = zstd::stream::decode_all(src)
			.map_err(|e| Error::Codec(format!("zstd decompress failed: {e}")))?;
		let dst = allocator.allocate_direct(decoded.len(), OwnerTag::Decompression);
		// SAFETY: freshly allocated, ref_count == 1, no other reader exists.
		unsafe { dst.as_mut_slice_unchecked() }.copy_from_slice(&decoded);
		Ok(dst)
	}

	fn compress(&self, src: &[u8], _allocator: &dyn BufferAllocator) -> crate::Result<BufferRef> {
		let encoded = zstd::stream::encode_all(src, self.level)
			.map_err(|e| Error::Codec(format!("zstd compress failed: {e}")))?;

		// §4.C: "returns the same buffer (did not shrink enough)" when the
		// codec fails to improve below a ratio threshold — surfaced to the
		// caller as a same-length result so `compress_value` can detect it.
		if (encoded.len() as f64) > (src.len() as f64) * MIN_IMPROVEMENT_RATIO {
			return Ok(BufferRef::new_heap(src.to_vec()));
		}

		Ok(BufferRef::new_heap(encoded))
	}
}
