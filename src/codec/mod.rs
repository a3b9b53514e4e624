// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! The compression codec adapter: a thin, stateless contract over
//! `compress`/`decompress`, plus the registry that maps a wire `codecId` to
//! a concrete [`Codec`] implementation.

mod none;
mod zstd_codec;

use crate::buffer::{BufferAllocator, BufferRef, OwnerTag};
use std::collections::HashMap;
use std::sync::Arc;

pub use none::NoneCodec;
pub use zstd_codec::ZstdCodec;

/// Reserved codec id meaning "no compression".
pub const NONE: u8 = 0;
/// Default compressing codec id shipped by this crate.
pub const ZSTD: u8 = 1;

/// Stateless compression/decompression contract.
///
/// Implementations must not mutate shared state between calls; the adapter
/// layer ([`CodecRegistry`]) is what callers hold onto, and it is safe to
/// share across threads.
pub trait Codec: Send + Sync {
	/// Decompresses `src` into a freshly allocated buffer under the
	/// `Decompression` owner tag.
	fn decompress(&self, src: &[u8], allocator: &dyn BufferAllocator) -> crate::Result<BufferRef>;

	/// Compresses `src`. Implementations return a buffer containing the
	/// *original* bytes verbatim (same length as `src`) when compression
	/// would not shrink the payload below this codec's improvement ratio —
	/// callers detect "did not shrink" by comparing `result.len() == src.len()`.
	fn compress(&self, src: &[u8], allocator: &dyn BufferAllocator) -> crate::Result<BufferRef>;
}

/// Maps wire `codecId` values to concrete [`Codec`] implementations.
///
/// Ships [`NONE`] (passthrough) and [`ZSTD`] registered by default; embedding
/// crates can register additional codec ids (Snappy, LZ4, ...).
#[derive(Clone)]
pub struct CodecRegistry {
	codecs: HashMap<u8, Arc<dyn Codec>>,
}

impl CodecRegistry {
	/// A registry with only the built-in `NONE` and `ZSTD` codecs.
	pub fn with_defaults() -> Self {
		let mut codecs: HashMap<u8, Arc<dyn Codec>> = HashMap::new();
		codecs.insert(NONE, Arc::new(NoneCodec));
		codecs.insert(ZSTD, Arc::new(ZstdCodec::default()));
		Self { codecs }
	}

	/// Registers (or replaces) the codec for `id`.
	pub fn register(&mut self, id: u8, codec: Arc<dyn Codec>) {
		self.codecs.insert(id, codec);
	}

	/// Looks up the codec for `id`.
	pub fn get(&self, id: u8) -> Option<Arc<dyn Codec>> {
		self.codecs.get(&id).cloned()
	}

	/// True iff `id` names a codec other than [`NONE`] — i.e. a payload
	/// carrying this id was actually run through a compressor, per §6.3.
	pub fn is_compressed(id: u8) -> bool {
		id != NONE
	}
}

impl Default for CodecRegistry {
	fn default() -> Self {
		Self::with_defaults()
	}
}
