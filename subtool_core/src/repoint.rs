/*!
# Subtool: Repoint Engine
*/

use crate::{
	DelayTable,
	SubfileReader,
	SubtoolError,
};
use fyi_msg::Progless;
use std::{
	io::Write,
	sync::Arc,
};



#[derive(Debug, Clone, Copy)]
/// # One Source's Shift Plan.
struct LineShift {
	/// # Existing Whole-Sample Delay.
	m: i64,

	/// # Relative Shift (target minus existing).
	n: i64,
}

/// # Repoint a Subfile's Data Stream.
///
/// Shift every source by the whole-sample difference between the current
/// and target tables, sourcing the shifted-in samples from the neighbouring
/// block, or from the margin at the subfile edges. Output blocks are
/// written to `out` in ascending order.
///
/// With `force`, sources missing from the target table pass through
/// unshifted; without it they are an error.
///
/// ## Errors
///
/// This will return an error if a shift exceeds what the margin can
/// back-fill, a source cannot be resolved, or any read or write fails.
pub(crate) fn run<W>(
	reader: &mut SubfileReader,
	from: &DelayTable,
	to: &DelayTable,
	force: bool,
	out: &mut W,
	progress: &Progless,
) -> Result<(), SubtoolError>
where W: Write {
	let meta = *reader.meta();
	let shifts = line_shifts(reader, from, to, force)?;

	let spl = meta.samples_per_line as usize;
	let sls = meta.sub_line_size as usize;
	let m2 = (meta.margin_samples / 2) as i64;
	let bps = meta.blocks_per_sub;

	// Pull the margins up front; they are tiny and the shifted edges need
	// them mid-stream.
	let mut heads = Vec::with_capacity(shifts.len());
	let mut tails = Vec::with_capacity(shifts.len());
	for src in 0..meta.num_sources {
		heads.push(reader.read_margin_line(src, true)?);
		tails.push(reader.read_margin_line(src, false)?);
	}

	// A three-block window slides down the file: previous, current, next.
	let mut prev: Option<Arc<[u8]>> = None;
	let mut cur: Option<Arc<[u8]>> = None;
	let mut next: Option<Arc<[u8]>> = Some(reader.read_block(1)?);
	let mut buf = vec![0_u8; meta.block_length as usize];

	for block in 1..=bps {
		prev = cur.take();
		cur = next.take();
		if block < bps { next = Some(reader.read_block(block + 1)?); }

		let cur_block = cur.as_deref().ok_or(SubtoolError::Bug("repoint window underflow"))?;
		buf.fill(0);

		for (src, shift) in shifts.iter().enumerate() {
			let base = src * sls;
			let head_len = usize::try_from(shift.n.max(0)).unwrap_or_default();
			let tail_len = usize::try_from((-shift.n).max(0)).unwrap_or_default();
			let body_len = spl - shift.n.unsigned_abs() as usize;

			let cur_line = &cur_block[base..base + sls];
			let out_line = &mut buf[base..base + sls];

			// The body always comes from the current block.
			out_line[head_len * 2..(head_len + body_len) * 2]
				.copy_from_slice(&cur_line[tail_len * 2..(tail_len + body_len) * 2]);

			// A forward shift owes samples at the front.
			if 0 < head_len {
				if block == 1 {
					let lo = (m2 - shift.n - shift.m - 1).unsigned_abs() as usize;
					out_line[..head_len * 2]
						.copy_from_slice(&heads[src][lo * 2..(lo + head_len) * 2]);
				}
				else {
					let prev_block = prev.as_deref()
						.ok_or(SubtoolError::Bug("repoint window underflow"))?;
					let prev_line = &prev_block[base..base + sls];
					out_line[..head_len * 2]
						.copy_from_slice(&prev_line[(spl - head_len) * 2..]);
				}
			}

			// A backward shift owes samples at the back.
			if 0 < tail_len {
				if block == bps {
					let lo = (m2 - shift.m + 1).unsigned_abs() as usize;
					out_line[(spl - tail_len) * 2..]
						.copy_from_slice(&tails[src][lo * 2..(lo + tail_len) * 2]);
				}
				else {
					let next_block = next.as_deref()
						.ok_or(SubtoolError::Bug("repoint window underflow"))?;
					let next_line = &next_block[base..base + sls];
					out_line[(spl - tail_len) * 2..]
						.copy_from_slice(&next_line[..tail_len * 2]);
				}
			}
		}

		out.write_all(&buf)
			.map_err(|_| SubtoolError::Write("output data block".to_owned()))?;
		progress.increment();
	}

	Ok(())
}

/// # Resolve Per-Source Shifts.
///
/// Pair each resident source with its target row and make sure every
/// resulting shift stays inside the line and the half-margin budget.
fn line_shifts(
	reader: &SubfileReader,
	from: &DelayTable,
	to: &DelayTable,
	force: bool,
) -> Result<Vec<LineShift>, SubtoolError> {
	let meta = reader.meta();
	let spl = meta.samples_per_line as i64;
	let m2 = (meta.margin_samples / 2) as i64;

	if from.len() != meta.num_sources as usize {
		return Err(SubtoolError::CountMismatch(
			"delay-table rows",
			meta.num_sources,
			from.len() as u64,
		));
	}

	from.entries.iter()
		.map(|e| {
			let m = i64::from(e.ws_delay);
			let n = match to.entry(e.rf_input) {
				Some(t) => i64::from(t.ws_delay) - m,
				None if force => 0,
				None => return Err(SubtoolError::UnknownSource(e.rf_input)),
			};

			if spl < n.abs() {
				return Err(SubtoolError::MarginBudget(e.rf_input, n));
			}
			if 0 < n {
				// Block one backfills its head from the margin.
				let lo = m2 - n - m - 1;
				let hi = m2 - m - 1;
				if lo < 0 || (m2 * 2) < hi {
					return Err(SubtoolError::MarginBudget(e.rf_input, n));
				}
			}
			else if n < 0 {
				// The last block backfills its tail from the margin.
				let lo = m2 - m + 1;
				let hi = m2 - n - m + 1;
				if lo < 0 || (m2 * 2) < hi {
					return Err(SubtoolError::MarginBudget(e.rf_input, n));
				}
			}

			Ok(LineShift { m, n })
		})
		.collect()
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::test_util::{
		line,
		micro_file,
		micro_meta,
		micro_streams,
		micro_table,
	};
	use std::fs::File;

	/// # Run a Repoint Over the Micro Subfile.
	fn run_micro(dir: &std::path::Path, from: [i16; 2], to: [i16; 2]) -> Vec<u8> {
		let path = micro_file(dir);
		let file = File::open(path).expect("Failed to open micro subfile.");
		let mut reader = SubfileReader::new(file, micro_meta());
		let mut out = Vec::new();
		run(
			&mut reader,
			&micro_table(from),
			&micro_table(to),
			false,
			&mut out,
			&Progless::default(),
		).expect("Repoint failed.");
		out
	}

	#[test]
	fn t_repoint_micro() {
		// The canonical micro shift: source zero moves forward three,
		// source one backward three, margins covering both edges.
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let out = run_micro(dir.path(), [-1, 1], [2, -2]);

		let mut want = Vec::new();
		want.extend(line(&[1, 2, 3, 4]));
		want.extend(line(&[107, 108, 109, 110]));
		want.extend(line(&[5, 6, 7, 8]));
		want.extend(line(&[111, 112, 113, 114]));
		want.extend(line(&[9, 10, 11, 12]));
		want.extend(line(&[115, 116, 117, 118]));

		assert_eq!(out, want, "Micro repoint produced the wrong stream.");
	}

	#[test]
	fn t_repoint_identity() {
		// Equal tables shift nothing and change nothing.
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let out = run_micro(dir.path(), [-1, 1], [-1, 1]);

		let streams = micro_streams();
		let want: Vec<u8> = streams.blocks.concat();
		assert_eq!(out, want, "Identity repoint must be byte-exact.");
	}

	#[test]
	fn t_repoint_cancellation() {
		// Shift, rebuild a consistent subfile around the result, shift
		// back, and land exactly where we started.
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let meta = micro_meta();
		let shifted = run_micro(dir.path(), [-1, 1], [2, -2]);

		// Same margins, new data.
		let path = dir.path().join("shifted.sub");
		let mut raw = std::fs::read(micro_file(dir.path())).expect("Failed to read micro subfile.");
		let pos = meta.data_offset as usize;
		raw[pos..pos + shifted.len()].copy_from_slice(&shifted);
		std::fs::write(&path, raw).expect("Failed to write shifted subfile.");

		let file = File::open(path).expect("Failed to open shifted subfile.");
		let mut reader = SubfileReader::new(file, meta);
		let mut out = Vec::new();
		run(
			&mut reader,
			&micro_table([2, -2]),
			&micro_table([-1, 1]),
			false,
			&mut out,
			&Progless::default(),
		).expect("Reverse repoint failed.");

		let streams = micro_streams();
		let want: Vec<u8> = streams.blocks.concat();
		assert_eq!(out, want, "The round trip should cancel exactly.");
	}

	#[test]
	fn t_repoint_budget() {
		// A nine-sample shift cannot be backfilled from an eight-sample
		// margin.
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let path = micro_file(dir.path());
		let file = File::open(path).expect("Failed to open micro subfile.");
		let mut reader = SubfileReader::new(file, micro_meta());
		let mut out = Vec::new();
		assert!(
			matches!(
				run(
					&mut reader,
					&micro_table([0, 0]),
					&micro_table([9, 0]),
					false,
					&mut out,
					&Progless::default(),
				),
				Err(SubtoolError::MarginBudget(5001, 9))
			),
			"Over-budget shifts must be refused up front."
		);
	}

	#[test]
	fn t_repoint_missing_source() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let path = micro_file(dir.path());
		let file = File::open(path).expect("Failed to open micro subfile.");
		let mut reader = SubfileReader::new(file, micro_meta());

		let mut to = micro_table([1, 1]);
		to.entries.remove(1);

		let mut out = Vec::new();
		assert!(
			matches!(
				run(&mut reader, &micro_table([0, 0]), &to, false, &mut out, &Progless::default()),
				Err(SubtoolError::UnknownSource(5002))
			),
			"A missing target source must be refused without force."
		);

		// With force it passes through unshifted.
		out.clear();
		run(&mut reader, &micro_table([0, 0]), &to, true, &mut out, &Progless::default())
			.expect("Forced repoint failed.");
		let streams = micro_streams();
		let src1_line3 = &out[5 * 8..6 * 8];
		assert_eq!(
			src1_line3,
			&streams.blocks[2][8..16],
			"An unmatched source should pass through untouched."
		);
	}
}
