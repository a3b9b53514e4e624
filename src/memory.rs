// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! External collaborator contract for logical storage memory accounting.

use std::sync::atomic::{AtomicI64, Ordering};

/// Grants and releases logical storage memory, may deny a grant (out of
/// memory), and may trigger eviction elsewhere in the engine as a side
/// effect of a denial — none of which is this crate's concern beyond the
/// grant/deny/release contract itself.
pub trait MemoryBroker: Send + Sync {
	/// Attempts to acquire `bytes` of accounted memory. Returns `false` on
	/// denial; the caller must not have committed any state change yet.
	fn try_acquire(&self, bytes: i64) -> bool;

	/// Releases `bytes` previously acquired. Must be called on every path
	/// that acquired, including ones that later fail for unrelated reasons.
	fn release(&self, bytes: i64);
}

/// A [`MemoryBroker`] that never denies. Used by embeddings with no global
/// memory ceiling (single-node, embedded, or test use).
#[derive(Debug, Default)]
pub struct UnlimitedMemoryBroker;

impl MemoryBroker for UnlimitedMemoryBroker {
	fn try_acquire(&self, _bytes: i64) -> bool {
		true
	}

	fn release(&self, _bytes: i64) {}
}

/// A [`MemoryBroker`] with a fixed ceiling, used by tests exercising the
/// `LowMemory` path (spec scenario E6).
#[derive(Debug)]
pub struct BoundedMemoryBroker {
	available: AtomicI64,
}

impl BoundedMemoryBroker {
	/// A broker starting with `capacity` bytes available to grant.
	pub fn new(capacity: i64) -> Self {
		Self { available: AtomicI64::new(capacity) }
	}

	/// Bytes currently available to grant.
	pub fn available(&self) -> i64 {
		self.available.load(Ordering::Acquire)
	}
}

impl MemoryBroker for BoundedMemoryBroker {
	fn try_acquire(&self, bytes: i64) -> bool {
		let mut current = self.available.load(Ordering::Acquire);
		loop {
			if current < bytes {
				return false;
			}
			match self.available.compare_exchange_weak(
				current,
				current - bytes,
				Ordering::AcqRel,
				Ordering::Acquire,
			) {
				Ok(_) => return true,
				Err(observed) => current = observed,
			}
		}
	}

	fn release(&self, bytes: i64) {
		self.available.fetch_add(bytes, Ordering::AcqRel);
	}
}

/// A [`MemoryBroker`] that always denies, used to exercise `LowMemory`
/// without needing to compute an exact byte budget.
#[derive(Debug, Default)]
pub struct DenyingMemoryBroker;

impl MemoryBroker for DenyingMemoryBroker {
	fn try_acquire(&self, _bytes: i64) -> bool {
		false
	}

	fn release(&self, _bytes: i64) {}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bounded_broker_denies_past_capacity() {
		let broker = BoundedMemoryBroker::new(100);
		assert!(broker.try_acquire(60));
		assert!(!broker.try_acquire(60));
		broker.release(60);
		assert!(broker.try_acquire(60));
	}
}
