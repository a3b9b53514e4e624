// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

use thiserror::Error;

/// Errors produced by the column-format storage entry subsystem.
///
/// `EntryAbsent` is never constructed as a propagated error — spill-recall
/// failures are folded into an absent buffer at the call site (see
/// [`crate::value::ColumnValue::get_value_retain`]) — it exists here only so
/// call sites that want to log the reason have a typed value to match on.
#[derive(Debug, Error)]
pub enum Error {
	/// An operation's precondition on `refCount` or prior state was violated.
	#[error("invalid state: {0}")]
	InvalidState(&'static str),

	/// Caller passed a contradictory combination of flags.
	#[error("bad argument: {0}")]
	BadArgument(&'static str),

	/// `MemoryBroker` denied a grant on a buffer-replace path.
	#[error("low memory: failed to acquire {requested} bytes")]
	LowMemory {
		/// Bytes that were requested and denied.
		requested: i64,
	},

	/// The leading integer of a payload disagreed with the recorded
	/// compression state in a way that cannot be recovered locally.
	#[error("corrupt value: {0}")]
	CorruptValue(&'static str),

	/// Spill recall found no usable copy on disk. Recovered locally by
	/// every caller; kept as a variant so tests and logging can name it.
	#[error("entry absent from disk")]
	EntryAbsent,

	/// The underlying channel/stream ended before a full frame could be
	/// read or written.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// A disk-backed collaborator reported a failure other than "absent".
	#[error("disk access error: {0}")]
	DiskAccess(String),

	/// A `Codec` implementation failed to compress or decompress a payload.
	#[error("codec error: {0}")]
	Codec(String),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, Error>;
