// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later, see license.md file

//! External collaborator contract for the row decoder that reads the
//! `STATROW_COL_INDEX` cell's row-count field. Decoding the row's full
//! layout is the SQL engine's concern; this crate only needs the one field.

/// Parses an encoded stats row to extract the row count. Implementations
/// live with the row/layout encoding used by the wider engine; this crate
/// only depends on the contract.
pub trait StatsReader: Send + Sync {
	/// Extracts the row count from an already-decompressed stats row
	/// payload (the bytes that would be obtained from
	/// `ColumnValue::get_value_retain(true, false)` on a `STATROW_COL_INDEX`
	/// cell, with the leading-`i32` type-id header already stripped).
	fn row_count(&self, encoded: &[u8]) -> crate::Result<u64>;
}

/// A [`StatsReader`] that reads the row count as a plain big-endian `u64`
/// occupying the first 8 bytes of the payload. Stands in for the real
/// engine's row-layout decoder in tests and single-node embedded use.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedOffsetStatsReader;

impl StatsReader for FixedOffsetStatsReader {
	fn row_count(&self, encoded: &[u8]) -> crate::Result<u64> {
		let bytes: [u8; 8] = encoded.get(0..8).ok_or(crate::Error::CorruptValue(
			"stats row shorter than the row-count field",
		))?.try_into().unwrap();
		Ok(u64::from_be_bytes(bytes))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_row_count_from_fixed_offset() {
		let reader = FixedOffsetStatsReader;
		let mut payload = 42u64.to_be_bytes().to_vec();
		payload.extend_from_slice(b"trailing");
		assert_eq!(reader.row_count(&payload).unwrap(), 42);
	}

	#[test]
	fn rejects_short_payload() {
		let reader = FixedOffsetStatsReader;
		assert!(reader.row_count(&[0, 1, 2]).is_err());
	}
}
