/*!
# Subtool: Delay Table CSV Codec
*/

use crate::{
	DelayTable,
	DelayTableEntry,
	DtHints,
	DtVersion,
	SubtoolError,
};
use super::bin::to_millis;



/// # Fixed Columns Before the Trajectory (v1).
const FIXED_V1: usize = 6;

/// # Fixed Columns Before the Trajectory (v2).
const FIXED_V2: usize = 10;



/// # Parse a CSV Table.
///
/// Rows split on LF or CRLF, cells on commas, whitespace trimmed. The
/// version marker is the `num_pointings` column: index 5 for v1, index 8
/// for v2. A file where both columns read `1` throughout is ambiguous and
/// refused.
///
/// ## Errors
///
/// This will return an error for non-UTF-8 content, ragged rows, cells that
/// fail to parse (with their row/col recorded), an unsettleable version, or
/// content contradicting the hints.
pub(crate) fn parse(raw: &[u8], hints: DtHints) -> Result<DelayTable, SubtoolError> {
	let text = std::str::from_utf8(raw).map_err(|_| SubtoolError::DtStructure)?;
	let rows: Vec<Vec<&str>> = text.lines()
		.filter(|line| ! line.trim().is_empty())
		.map(|line| line.split(',').map(str::trim).collect())
		.collect();
	if rows.is_empty() { return Err(SubtoolError::DtStructure); }

	// Rectangular or bust.
	let width = rows[0].len();
	for (idx, row) in rows.iter().enumerate() {
		if row.len() != width {
			return Err(SubtoolError::CsvShape(idx, row.len(), width));
		}
	}

	let version = match hints.version {
		Some(v) => v,
		None => detect(&rows)?,
	};

	let fixed = match version {
		DtVersion::V1 => FIXED_V1,
		DtVersion::V2 => FIXED_V2,
	};
	if width < fixed { return Err(SubtoolError::CsvShape(0, width, fixed)); }
	let num_fracs = width - fixed;

	if let Some(want) = hints.rows.filter(|&n| n != rows.len()) {
		return Err(SubtoolError::CountMismatch("delay-table rows", want as u64, rows.len() as u64));
	}
	if let Some(want) = hints.fracs.filter(|&n| n != num_fracs) {
		return Err(SubtoolError::CountMismatch("fractional delays", want as u64, num_fracs as u64));
	}

	let entries = rows.iter()
		.enumerate()
		.map(|(idx, row)| parse_row(row, idx, version, num_fracs))
		.collect::<Result<Vec<_>, SubtoolError>>()?;

	Ok(DelayTable { version, entries })
}

/// # Serialise a Table.
///
/// One row per entry, every numeric column comma-separated, v1 trajectory
/// back on the millisample grid.
pub(crate) fn serialise(table: &DelayTable) -> String {
	let mut out = String::new();
	for e in &table.entries {
		match table.version {
			DtVersion::V1 => {
				out.push_str(&format!(
					"{},{},{},{},{},{}",
					e.rf_input, e.ws_delay,
					e.initial_delay.floor() as i64,
					e.delta_delay.floor() as i64,
					e.delta_delta_delay.floor() as i64,
					e.num_pointings,
				));
				for f in &e.frac_delay {
					out.push_str(&format!(",{}", to_millis(*f)));
				}
			},
			DtVersion::V2 => {
				out.push_str(&format!(
					"{},{},{},{},{},{},{},{},{},0",
					e.rf_input, e.ws_delay,
					e.initial_delay, e.delta_delay, e.delta_delta_delay,
					e.start_total_delay, e.middle_total_delay, e.end_total_delay,
					e.num_pointings,
				));
				for f in &e.frac_delay {
					out.push_str(&format!(",{f}"));
				}
			},
		}
		out.push('\n');
	}
	out
}



/// # Settle the Version.
fn detect(rows: &[Vec<&str>]) -> Result<DtVersion, SubtoolError> {
	let v1 = rows.iter().all(|r| r.get(5).copied() == Some("1"));
	let v2 = rows.iter().all(|r| r.get(8).copied() == Some("1"));
	match (v1, v2) {
		(true, false) => Ok(DtVersion::V1),
		(false, true) => Ok(DtVersion::V2),
		(true, true) => Err(SubtoolError::DtAmbiguous),
		(false, false) => Err(SubtoolError::DtStructure),
	}
}

/// # Parse One Row.
fn parse_row(row: &[&str], idx: usize, version: DtVersion, num_fracs: usize)
-> Result<DelayTableEntry, SubtoolError> {
	match version {
		DtVersion::V1 => Ok(DelayTableEntry {
			rf_input: cell_int(row, idx, 0)?,
			ws_delay: cell_int(row, idx, 1)?,
			initial_delay: cell_float(row, idx, 2)?.floor(),
			delta_delay: cell_float(row, idx, 3)?.floor(),
			delta_delta_delay: cell_float(row, idx, 4)?.floor(),
			num_pointings: cell_int(row, idx, 5)?,
			start_total_delay: 0.0,
			middle_total_delay: 0.0,
			end_total_delay: 0.0,
			frac_delay: (0..num_fracs)
				.map(|i| cell_float(row, idx, FIXED_V1 + i)
					.map(|f| (f.floor() / 1000.0) as f32))
				.collect::<Result<Vec<_>, SubtoolError>>()?,
		}),
		DtVersion::V2 => {
			// The reserved column still has to be a number.
			let _reserved: u16 = cell_int(row, idx, 9)?;
			Ok(DelayTableEntry {
				rf_input: cell_int(row, idx, 0)?,
				ws_delay: cell_int(row, idx, 1)?,
				initial_delay: cell_float(row, idx, 2)?,
				delta_delay: cell_float(row, idx, 3)?,
				delta_delta_delay: cell_float(row, idx, 4)?,
				num_pointings: cell_int(row, idx, 8)?,
				start_total_delay: cell_float(row, idx, 5)?,
				middle_total_delay: cell_float(row, idx, 6)?,
				end_total_delay: cell_float(row, idx, 7)?,
				frac_delay: (0..num_fracs)
					.map(|i| cell_float(row, idx, FIXED_V2 + i).map(|f| f as f32))
					.collect::<Result<Vec<_>, SubtoolError>>()?,
			})
		},
	}
}

/// # Integer Cell.
fn cell_int<T: std::str::FromStr>(row: &[&str], row_idx: usize, col: usize)
-> Result<T, SubtoolError> {
	let cell = row.get(col).copied().unwrap_or_default();
	cell.parse::<T>().map_err(|_| SubtoolError::CsvCell(
		row_idx,
		col,
		format!("Failed to parse integer: '{cell}'"),
	))
}

/// # Float Cell.
fn cell_float(row: &[&str], row_idx: usize, col: usize) -> Result<f64, SubtoolError> {
	let cell = row.get(col).copied().unwrap_or_default();
	cell.parse::<f64>()
		.ok()
		.filter(|f| f.is_finite())
		.ok_or_else(|| SubtoolError::CsvCell(
			row_idx,
			col,
			format!("Failed to parse float: '{cell}'"),
		))
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::test_util::small_table;

	#[test]
	fn t_dt_csv_detect() {
		// Column 5 says one, column 8 does not: v1.
		let v1 = b"11,0,0,0,0,1,250,-300\n12,2,0,0,0,1,0,125\n";
		let table = parse(v1, DtHints::default()).expect("Failed to parse v1 CSV.");
		assert_eq!(table.version, DtVersion::V1);
		assert_eq!(table.len(), 2);
		assert_eq!(table.num_fracs(), 2);

		// Column 8 says one, column 5 does not: v2.
		let v2 = b"11,0,0.5,0,0,0.5,0.5,0.5,1,0,0.5,0.25\n";
		let table = parse(v2, DtHints::default()).expect("Failed to parse v2 CSV.");
		assert_eq!(table.version, DtVersion::V2);
		assert_eq!(table.num_fracs(), 2);

		// Both columns one everywhere: ambiguous.
		let both = b"11,0,0,0,0,1,0,0,1,0,0,0\n";
		assert!(
			matches!(parse(both, DtHints::default()), Err(SubtoolError::DtAmbiguous)),
			"Ambiguous CSVs must be refused."
		);
	}

	#[test]
	fn t_dt_csv_v1_values() {
		// Millisample cells scale down by a thousand on the way in.
		let raw = b"11,-3,0,0,0,1,1000,-1500\n";
		let table = parse(raw, DtHints::default()).expect("Failed to parse v1 CSV.");
		let e = &table.entries[0];
		assert_eq!(e.ws_delay, -3);
		assert!((e.frac_delay[0] - 1.0).abs() < 1e-6);
		assert!((e.frac_delay[1] + 1.5).abs() < 1e-6);

		// And back out again.
		assert_eq!(serialise(&table), "11,-3,0,0,0,1,1000,-1500\n");
	}

	#[test]
	fn t_dt_csv_v2_round_trip() {
		let table = small_table(DtVersion::V2, 3, 4);
		let text = serialise(&table);
		let back = parse(text.as_bytes(), DtHints::default())
			.expect("Failed to re-parse v2 CSV.");
		assert_eq!(table, back, "The v2 CSV round trip must be exact.");

		// CSV-sourced and directly-serialised binaries must agree.
		assert_eq!(
			back.to_bin(),
			table.to_bin(),
			"CSV and binary paths disagree."
		);
	}

	#[test]
	fn t_dt_csv_breadcrumbs() {
		// A rotten cell names its row and column.
		let raw = b"11,0,0,0,0,1,250\n12,0,0,x,0,1,250\n";
		match parse(raw, DtHints::default()) {
			Err(SubtoolError::CsvCell(row, col, reason)) => {
				assert_eq!(row, 1);
				assert_eq!(col, 3);
				assert_eq!(reason, "Failed to parse float: 'x'");
			},
			other => panic!("Expected a cell error, got {other:?}."),
		}
	}

	#[test]
	fn t_dt_csv_ragged() {
		let raw = b"11,0,0,0,0,1,250\n12,0,0,0,0,1\n";
		assert!(
			matches!(parse(raw, DtHints::default()), Err(SubtoolError::CsvShape(1, 6, 7))),
			"Ragged rows must be refused."
		);
	}

	#[test]
	fn t_dt_csv_crlf() {
		let unix = b"11,0,0,0,0,1,250\n";
		let dos = b"11,0,0,0,0,1,250\r\n";
		assert_eq!(
			parse(unix, DtHints::default()).expect("Failed to parse LF CSV."),
			parse(dos, DtHints::default()).expect("Failed to parse CRLF CSV."),
			"Line endings should not matter."
		);
	}
}
