// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Column-format storage entry subsystem: a composite key addressing one
//! column of one row-batch of one partition, and a reference-counted,
//! lazily (de)compressed, disk-spillable value type for its bytes.
//!
//! Collaborators this crate depends on but does not own — region storage,
//! memory accounting, buffer allocation, compression codecs, and stats
//! decoding — are expressed as traits in [`region`], [`memory`], [`buffer`],
//! [`codec`], and [`stats`] respectively, so an embedding engine supplies the
//! concrete implementations.

/// Reference-counted heap/off-heap buffer handles ([`buffer::BufferRef`]).
pub mod buffer;
/// The compression codec contract and registry.
pub mod codec;
/// Tunable constants from spec §6.4.
pub mod constants;
mod error;
/// The composite [`key::ColumnKey`] identifying one column-batch cell.
pub mod key;
/// The memory accounting collaborator contract.
pub mod memory;
/// Partition routing for a [`key::ColumnKey`].
pub mod partition;
/// Disk spill/recall collaborator contracts.
pub mod region;
/// The stats-row decoder collaborator contract.
pub mod stats;
/// The [`value::ColumnValue`] state machine itself.
pub mod value;
/// Wire/disk header framing.
pub mod wire;

pub use error::Error;
pub use key::ColumnKey;
pub use partition::PartitionResolver;
pub use value::ColumnValue;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, Error>;
