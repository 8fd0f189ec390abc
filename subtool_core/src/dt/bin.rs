/*!
# Subtool: Delay Table Binary Codec
*/

use crate::{
	DelayTable,
	DelayTableEntry,
	DtHints,
	DtVersion,
	SubtoolError,
};



/// # Detection Agreement Tolerance.
///
/// How closely the redundant fields must agree for a version heuristic to
/// accept a buffer.
const EPSILON: f64 = 0.0001;



/// # Parse a Binary Table.
///
/// Version comes from the hints or the plausibility heuristics; row and
/// fractional-delay counts come from the hints or structure inference over
/// every row count that divides the buffer.
///
/// ## Errors
///
/// This will return an error if the version cannot be settled, no structure
/// fits, or the content contradicts the hints.
pub(crate) fn parse(raw: &[u8], hints: DtHints) -> Result<DelayTable, SubtoolError> {
	let version = match hints.version {
		Some(v) => v,
		None => detect(raw)?,
	};

	if let Some((rows, fracs)) = infer(raw, version, hints.rows, hints.fracs) {
		return Ok(parse_rows(raw, version, rows, fracs));
	}

	// Nothing fit. If the caller pinned anything, the buffer may simply
	// disagree with them; redetect from scratch so the complaint can name
	// the actual shape.
	if hints.version.is_some() || hints.rows.is_some() || hints.fracs.is_some() {
		if let Ok(found) = detect(raw) {
			if let Some((rows, fracs)) = infer(raw, found, None, None) {
				if let Some(want) = hints.version.filter(|&v| v != found) {
					return Err(SubtoolError::CountMismatch(
						"delay-table version",
						u64::from(want.as_u8()),
						u64::from(found.as_u8()),
					));
				}
				if let Some(want) = hints.rows.filter(|&r| r != rows) {
					return Err(SubtoolError::CountMismatch(
						"delay-table rows",
						want as u64,
						rows as u64,
					));
				}
				if let Some(want) = hints.fracs.filter(|&n| n != fracs) {
					return Err(SubtoolError::CountMismatch(
						"fractional delays",
						want as u64,
						fracs as u64,
					));
				}
			}
		}
	}

	Err(SubtoolError::DtStructure)
}

/// # Serialise a Table.
///
/// Emit on-disk rows in the table's own version; v1 fractional delays go
/// back to the integer millisample grid.
pub(crate) fn serialise(table: &DelayTable) -> Vec<u8> {
	let row_len = table.version.entry_min_size() +
		table.num_fracs() * table.version.frac_size();
	let mut out = Vec::with_capacity(row_len * table.len());

	for e in &table.entries {
		out.extend_from_slice(&e.rf_input.to_le_bytes());
		out.extend_from_slice(&e.ws_delay.to_le_bytes());
		match table.version {
			DtVersion::V1 => {
				out.extend_from_slice(&as_i32(e.initial_delay).to_le_bytes());
				out.extend_from_slice(&as_i32(e.delta_delay).to_le_bytes());
				out.extend_from_slice(&as_i32(e.delta_delta_delay).to_le_bytes());
				out.extend_from_slice(&e.num_pointings.to_le_bytes());
				out.extend_from_slice(&[0, 0]);
				for f in &e.frac_delay {
					out.extend_from_slice(&to_millis(*f).to_le_bytes());
				}
			},
			DtVersion::V2 => {
				out.extend_from_slice(&e.initial_delay.to_le_bytes());
				out.extend_from_slice(&e.delta_delay.to_le_bytes());
				out.extend_from_slice(&e.delta_delta_delay.to_le_bytes());
				out.extend_from_slice(&e.start_total_delay.to_le_bytes());
				out.extend_from_slice(&e.middle_total_delay.to_le_bytes());
				out.extend_from_slice(&e.end_total_delay.to_le_bytes());
				out.extend_from_slice(&e.num_pointings.to_le_bytes());
				out.extend_from_slice(&[0, 0]);
				for f in &e.frac_delay {
					out.extend_from_slice(&f.to_le_bytes());
				}
			},
		}
	}

	out
}



/// # Settle the Version.
///
/// Exactly one of the two heuristics must accept the buffer.
fn detect(raw: &[u8]) -> Result<DtVersion, SubtoolError> {
	match (plausibly_v1(raw), plausibly_v2(raw)) {
		(true, false) => Ok(DtVersion::V1),
		(false, true) => Ok(DtVersion::V2),
		(true, true) => Err(SubtoolError::DtAmbiguous),
		(false, false) => Err(SubtoolError::DtStructure),
	}
}

/// # Plausibly Version 1?
///
/// The first row's `num_pointings` sits at 16, the initial delay at 4, and
/// the first trajectory slot at 18. A real pointing keeps the latter two in
/// agreement and within the millisample range.
fn plausibly_v1(raw: &[u8]) -> bool {
	if raw.len() < 20 { return false; }
	let initial = f64::from(r_i32(raw, 4));
	let frac = f64::from(r_i16(raw, 18));
	r_u16(raw, 16) == 1 &&
		(initial - frac).abs() <= EPSILON &&
		frac.abs() <= 2000.0 &&
		(initial == 0.0) == (frac == 0.0)
}

/// # Plausibly Version 2?
///
/// `num_pointings` at 52 with a zeroed reserve at 54, and the initial
/// delay, start total, and first trajectory slot all telling one story.
fn plausibly_v2(raw: &[u8]) -> bool {
	if raw.len() < 60 { return false; }
	let initial = r_f64(raw, 4);
	r_u16(raw, 52) == 1 &&
		r_u16(raw, 54) == 0 &&
		(initial - r_f64(raw, 28)).abs() <= EPSILON &&
		(initial - f64::from(r_f32(raw, 56))).abs() <= EPSILON
}

/// # Infer Row/Frac Counts.
///
/// Walk every candidate row count that divides the buffer, smallest first,
/// and return the first whose implied shape validates across all rows.
/// Caller hints simply narrow the candidate set.
fn infer(raw: &[u8], version: DtVersion, rows: Option<usize>, fracs: Option<usize>)
-> Option<(usize, usize)> {
	let min_size = version.entry_min_size();
	let frac_size = version.frac_size();
	if raw.is_empty() { return None; }

	for candidate in 1..=raw.len() / min_size {
		if raw.len() % candidate != 0 { continue; }
		let row_len = raw.len() / candidate;
		if row_len < min_size { break; }

		let spare = row_len - min_size;
		if spare % frac_size != 0 { continue; }
		let num_fracs = spare / frac_size;

		if rows.is_some_and(|want| want != candidate) { continue; }
		if fracs.is_some_and(|want| want != num_fracs) { continue; }

		if validate(raw, version, candidate, num_fracs) {
			return Some((candidate, num_fracs));
		}
	}

	None
}

/// # Validate a Candidate Shape.
///
/// Every row must carry a single pointing, zeroed reserve bytes, and a
/// trajectory within the version's plausible range.
fn validate(raw: &[u8], version: DtVersion, rows: usize, num_fracs: usize) -> bool {
	let row_len = raw.len() / rows;
	let range = version.frac_range();

	(0..rows).all(|r| {
		let row = &raw[r * row_len..(r + 1) * row_len];
		match version {
			DtVersion::V1 =>
				r_u16(row, 16) == 1 &&
				r_u16(row, 18) == 0 &&
				(0..num_fracs).all(|i| {
					f64::from(r_i16(row, 20 + 2 * i)).abs() <= range
				}),
			DtVersion::V2 =>
				r_u16(row, 52) == 1 &&
				r_u16(row, 54) == 0 &&
				(0..num_fracs).all(|i| {
					let f = r_f32(row, 56 + 4 * i);
					f.is_finite() && f64::from(f).abs() <= range
				}),
		}
	})
}

/// # Decode Validated Rows.
fn parse_rows(raw: &[u8], version: DtVersion, rows: usize, num_fracs: usize) -> DelayTable {
	let row_len = raw.len() / rows;
	let entries = (0..rows)
		.map(|r| {
			let row = &raw[r * row_len..(r + 1) * row_len];
			match version {
				DtVersion::V1 => DelayTableEntry {
					rf_input: r_u16(row, 0),
					ws_delay: r_i16(row, 2),
					initial_delay: f64::from(r_i32(row, 4)),
					delta_delay: f64::from(r_i32(row, 8)),
					delta_delta_delay: f64::from(r_i32(row, 12)),
					num_pointings: r_u16(row, 16),
					start_total_delay: 0.0,
					middle_total_delay: 0.0,
					end_total_delay: 0.0,
					frac_delay: (0..num_fracs)
						.map(|i| f32::from(r_i16(row, 20 + 2 * i)) / 1000.0)
						.collect(),
				},
				DtVersion::V2 => DelayTableEntry {
					rf_input: r_u16(row, 0),
					ws_delay: r_i16(row, 2),
					initial_delay: r_f64(row, 4),
					delta_delay: r_f64(row, 12),
					delta_delta_delay: r_f64(row, 20),
					num_pointings: r_u16(row, 52),
					start_total_delay: r_f64(row, 28),
					middle_total_delay: r_f64(row, 36),
					end_total_delay: r_f64(row, 44),
					frac_delay: (0..num_fracs)
						.map(|i| r_f32(row, 56 + 4 * i))
						.collect(),
				},
			}
		})
		.collect();

	DelayTable { version, entries }
}



/// # Millisample Grid.
pub(crate) fn to_millis(f: f32) -> i16 {
	let n = (f64::from(f) * 1000.0).round();
	if n < f64::from(i16::MIN) { i16::MIN }
	else if f64::from(i16::MAX) < n { i16::MAX }
	else { n as i16 }
}

/// # Polynomial Coefficient Grid (v1).
fn as_i32(f: f64) -> i32 {
	let n = f.round();
	if n < f64::from(i32::MIN) { i32::MIN }
	else if f64::from(i32::MAX) < n { i32::MAX }
	else { n as i32 }
}



// Little-endian field readers. Out-of-range offsets read as zero, which the
// heuristics then safely reject.

/// # Read u16.
fn r_u16(raw: &[u8], off: usize) -> u16 {
	raw.get(off..off + 2)
		.and_then(|s| s.try_into().ok())
		.map_or(0, u16::from_le_bytes)
}

/// # Read i16.
fn r_i16(raw: &[u8], off: usize) -> i16 {
	raw.get(off..off + 2)
		.and_then(|s| s.try_into().ok())
		.map_or(0, i16::from_le_bytes)
}

/// # Read i32.
fn r_i32(raw: &[u8], off: usize) -> i32 {
	raw.get(off..off + 4)
		.and_then(|s| s.try_into().ok())
		.map_or(0, i32::from_le_bytes)
}

/// # Read f32.
fn r_f32(raw: &[u8], off: usize) -> f32 {
	raw.get(off..off + 4)
		.and_then(|s| s.try_into().ok())
		.map_or(0.0, f32::from_le_bytes)
}

/// # Read f64.
fn r_f64(raw: &[u8], off: usize) -> f64 {
	raw.get(off..off + 8)
		.and_then(|s| s.try_into().ok())
		.map_or(0.0, f64::from_le_bytes)
}
