// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! Tunables from spec §6.4. These are `pub const` rather than runtime
//! configuration because the subsystem embeds them as compile-time
//! invariants of the state machine, not knobs an operator turns.

/// Number of consecutive compressions tolerated before `compressValue`
/// replaces the stored buffer in place (hysteresis, spec §4.C/§5).
pub const MAX_CONSECUTIVE_COMPRESSIONS: u8 = 2;

/// Bytes of unused capacity in a freshly compressed buffer that triggers an
/// exact-size trimmed copy before it is adopted into storage.
pub const TRIM_THRESHOLD_BYTES: usize = 32;

/// Per-object overhead charged by `getOffHeapSizeInBytes` for an off-heap
/// allocation's accounting cleaner, independent of the allocation's own
/// capacity.
pub const DIRECT_OBJECT_OVERHEAD: u64 = 16;

/// Synthetic per-object overhead charged by `getSizeInBytes` for the
/// `ColumnValue` container itself (object header + field layout), excluding
/// whatever buffer it holds.
pub const CONTAINER_OVERHEAD: u64 = 48;

/// Synthetic overhead for the `BufferRef` wrapper around a buffer,
/// independent of the buffer's own capacity.
pub const BUFFER_WRAPPER_OVERHEAD: u64 = 16;
