/*!
# Subtool: Resample Engine
*/

use crate::{
	DelayTable,
	SubfileReader,
	SubtoolError,
};
use fyi_msg::Progless;
use std::io::Write;



/// # A Complex Sample, Widened For Arithmetic.
type Cx = (f64, f64);



#[derive(Debug, Clone, Copy, PartialEq)]
/// # A Per-Sample Transform.
pub enum ResampleFn {
	/// # Multiply Every Sample by a Real Factor.
	Scale(f64),

	/// # Linear-Interpolated Phase Gradient.
	///
	/// The shift amount grows with time: `initial + rate * t` samples,
	/// resolved against the neighbouring samples by two-point
	/// interpolation.
	Linear {
		/// # Samples Per Second of Drift.
		rate: f64,

		/// # Samples of Shift at Time Zero.
		initial: f64,
	},
}

impl ResampleFn {
	/// # Apply to One Sample.
	///
	/// `prev` and `next` hold up to the configured region of neighbouring
	/// samples in chronological order; windows truncate at the subfile
	/// edges and the transform clamps to whatever is reachable.
	fn apply(self, prev: &[Cx], cur: Cx, next: &[Cx], time: f64) -> Cx {
		match self {
			Self::Scale(s) => (cur.0 * s, cur.1 * s),
			Self::Linear { rate, initial } => {
				let amount = rate.mul_add(time, initial);
				if amount == 0.0 { return cur; }

				let ws = amount.trunc().abs() as usize;
				let frac = amount.fract().abs();

				let (s1, s2) =
					if 0.0 < amount {
						let s1 = if ws == 0 { cur } else { fwd(next, ws - 1, cur) };
						(s1, fwd(next, ws, cur))
					}
					else {
						let s1 = if ws == 0 { cur } else { bwd(prev, ws, cur) };
						(s1, bwd(prev, ws + 1, cur))
					};

				(
					(s2.0 - s1.0).mul_add(frac, s1.0),
					(s2.1 - s1.1).mul_add(frac, s1.1),
				)
			},
		}
	}
}

/// # Forward Neighbour (offset `i + 1` from current).
fn fwd(next: &[Cx], i: usize, cur: Cx) -> Cx {
	next.get(i).or_else(|| next.last()).copied().unwrap_or(cur)
}

/// # Backward Neighbour (offset `-i` from current).
fn bwd(prev: &[Cx], i: usize, cur: Cx) -> Cx {
	prev.len().checked_sub(i)
		.and_then(|pos| prev.get(pos))
		.or_else(|| prev.first())
		.copied()
		.unwrap_or(cur)
}



#[derive(Debug, Clone, PartialEq)]
/// # A Transform and Its Targets.
pub struct ResampleRule {
	/// # Affected Source Ids (`None` means all).
	pub sources: Option<Vec<u16>>,

	/// # The Transform.
	pub transform: ResampleFn,
}

/// # Resolve Rules to Lines.
///
/// Returns one optional transform per line, later rules overriding earlier
/// ones where they overlap.
///
/// ## Errors
///
/// This will return an error if a rule names a source the table does not
/// have.
pub(crate) fn resolve(table: &DelayTable, rules: &[ResampleRule])
-> Result<Vec<Option<ResampleFn>>, SubtoolError> {
	let mut out: Vec<Option<ResampleFn>> = vec![None; table.len()];
	for rule in rules {
		match &rule.sources {
			None => out.fill(Some(rule.transform)),
			Some(ids) => for &rf in ids {
				let idx = table.position(rf).ok_or(SubtoolError::UnknownSource(rf))?;
				out[idx] = Some(rule.transform);
			},
		}
	}
	Ok(out)
}

/// # Resample a Subfile's Data Stream.
///
/// Lines with a transform are rewritten sample by sample, each call seeing
/// up to `region` neighbours on either side, stitched across block
/// boundaries and, at the subfile edges, from the non-overlapping halves of
/// the margins. Untouched lines copy through byte-identically.
///
/// ## Errors
///
/// This will return an error if the rule set is the wrong size or any read
/// or write fails.
pub(crate) fn run<W>(
	reader: &mut SubfileReader,
	line_rules: &[Option<ResampleFn>],
	region: usize,
	out: &mut W,
	progress: &Progless,
) -> Result<(), SubtoolError>
where W: Write {
	let meta = *reader.meta();
	if line_rules.len() != meta.num_sources as usize {
		return Err(SubtoolError::CountMismatch(
			"resample rules",
			meta.num_sources,
			line_rules.len() as u64,
		));
	}

	let spl = meta.samples_per_line as usize;
	let sls = meta.sub_line_size as usize;
	let m2 = (meta.margin_samples / 2) as usize;
	let blocks_per_sec = meta.blocks_per_sub as f64 / meta.secs_per_subobs as f64;
	let sample_rate = meta.sample_rate as f64;

	let mut buf = vec![0_u8; meta.block_length as usize];
	let mut ext: Vec<Cx> = Vec::with_capacity(spl + 2 * region);

	for block in 1..=meta.blocks_per_sub {
		let cur = reader.read_block(block)?;
		let prev = reader.read_block_or_null(block as i64 - 1)?;
		let next = reader.read_block_or_null(block as i64 + 1)?;
		buf.copy_from_slice(&cur);

		let block_time = (block - 1) as f64 / blocks_per_sec;

		for (src, rule) in line_rules.iter().enumerate() {
			let Some(rule) = rule else { continue; };
			let base = src * sls;

			// Stitch the extended line: up to `region` samples of context
			// on either side, from the neighbouring block or the
			// non-overlapping margin half.
			ext.clear();
			let pc = match prev.as_deref() {
				Some(p) => push_tail(&mut ext, &p[base..base + sls], region),
				None => {
					let head = reader.read_margin_line(src as u64, true)?;
					push_tail(&mut ext, &head[..m2 * 2], region)
				},
			};
			push_all(&mut ext, &cur[base..base + sls]);
			match next.as_deref() {
				Some(n) => push_head(&mut ext, &n[base..base + sls], region),
				None => {
					let tail = reader.read_margin_line(src as u64, false)?;
					push_head(&mut ext, &tail[m2 * 2..], region);
				},
			}

			let out_line = &mut buf[base..base + sls];
			for idx in 0..spl {
				let pos = pc + idx;
				let lo = pos - pos.min(region);
				let hi = ext.len().min(pos + 1 + region);
				let time = block_time + idx as f64 / sample_rate;

				let (re, im) = rule.apply(&ext[lo..pos], ext[pos], &ext[pos + 1..hi], time);
				out_line[idx * 2] = quantise(re);
				out_line[idx * 2 + 1] = quantise(im);
			}
		}

		out.write_all(&buf)
			.map_err(|_| SubtoolError::Write("output data block".to_owned()))?;
		progress.increment();
	}

	Ok(())
}



/// # Decode and Append a Whole Line.
fn push_all(ext: &mut Vec<Cx>, raw: &[u8]) {
	ext.extend(raw.chunks_exact(2).map(decode));
}

/// # Decode and Append the Last `n` Samples.
fn push_tail(ext: &mut Vec<Cx>, raw: &[u8], n: usize) -> usize {
	let total = raw.len() / 2;
	let take = total.min(n);
	ext.extend(raw[(total - take) * 2..].chunks_exact(2).map(decode));
	take
}

/// # Decode and Append the First `n` Samples.
fn push_head(ext: &mut Vec<Cx>, raw: &[u8], n: usize) {
	ext.extend(raw.chunks_exact(2).take(n).map(decode));
}

/// # One Raw Sample, Widened.
pub(crate) fn decode(pair: &[u8]) -> Cx {
	(f64::from(pair[0] as i8), f64::from(pair[1] as i8))
}

/// # Round and Clamp to a Signed Byte.
pub(crate) fn quantise(v: f64) -> u8 {
	(v.round().clamp(f64::from(i8::MIN), f64::from(i8::MAX)) as i8).to_le_bytes()[0]
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

	/// # Run a Resample Over the Micro Subfile.
	fn run_micro(dir: &std::path::Path, rules: &[ResampleRule], region: usize) -> Vec<u8> {
		let path = micro_file(dir);
		let file = File::open(path).expect("Failed to open micro subfile.");
		let mut reader = SubfileReader::new(file, micro_meta());
		let table = micro_table([0, 0]);
		let line_rules = resolve(&table, rules).expect("Rule resolution failed.");
		let mut out = Vec::new();
		run(&mut reader, &line_rules, region, &mut out, &Progless::default())
			.expect("Resample failed.");
		out
	}

	#[test]
	fn t_resample_scale_zero() {
		// Scale zero flattens the chosen source; the other passes through
		// byte-identically.
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let rules = [ResampleRule {
			sources: Some(vec![5001]),
			transform: ResampleFn::Scale(0.0),
		}];
		let out = run_micro(dir.path(), &rules, 4);

		let streams = micro_streams();
		for (b, block) in streams.blocks.iter().enumerate() {
			let got = &out[b * 16..(b + 1) * 16];
			assert!(got[..8].iter().all(|&x| x == 0), "Scaled line should be zero.");
			assert_eq!(&got[8..], &block[8..], "Untouched line must pass through.");
		}
	}

	#[test]
	fn t_resample_linear_half() {
		// A constant half-sample shift interpolates midway to the next
		// sample, crossing block boundaries and finishing in the tail
		// margin: every value rounds up by one.
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let rules = [ResampleRule {
			sources: Some(vec![5001]),
			transform: ResampleFn::Linear { rate: 0.0, initial: 0.5 },
		}];
		let out = run_micro(dir.path(), &rules, 4);

		let want = [
			line(&[5, 6, 7, 8]),
			line(&[9, 10, 11, 12]),
			line(&[13, 14, 15, 16]),
		];
		for (b, w) in want.iter().enumerate() {
			assert_eq!(
				&out[b * 16..b * 16 + 8],
				w.as_slice(),
				"Block {} line zero came out wrong.", b + 1,
			);
		}
	}

	#[test]
	fn t_resample_linear_whole() {
		// A one-and-a-half sample shift leans on next[0] and next[1].
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let rules = [ResampleRule {
			sources: Some(vec![5001]),
			transform: ResampleFn::Linear { rate: 0.0, initial: 1.5 },
		}];
		let out = run_micro(dir.path(), &rules, 4);

		let want = [
			line(&[6, 7, 8, 9]),
			line(&[10, 11, 12, 13]),
			line(&[14, 15, 16, 17]),
		];
		for (b, w) in want.iter().enumerate() {
			assert_eq!(
				&out[b * 16..b * 16 + 8],
				w.as_slice(),
				"Block {} line zero came out wrong.", b + 1,
			);
		}
	}

	#[test]
	fn t_resample_linear_negative() {
		// Backward shifts read from the head margin at the subfile start.
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let rules = [ResampleRule {
			sources: Some(vec![5001]),
			transform: ResampleFn::Linear { rate: 0.0, initial: -1.0 },
		}];
		let out = run_micro(dir.path(), &rules, 4);

		let want = [
			line(&[3, 4, 5, 6]),
			line(&[7, 8, 9, 10]),
			line(&[11, 12, 13, 14]),
		];
		for (b, w) in want.iter().enumerate() {
			assert_eq!(
				&out[b * 16..b * 16 + 8],
				w.as_slice(),
				"Block {} line zero came out wrong.", b + 1,
			);
		}
	}

	#[test]
	fn t_resample_all_sources() {
		// A rule with no source filter touches everything.
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let rules = [ResampleRule {
			sources: None,
			transform: ResampleFn::Scale(0.0),
		}];
		let out = run_micro(dir.path(), &rules, 2);
		assert!(out.iter().all(|&x| x == 0), "Everything should be flattened.");
	}

	#[test]
	fn t_resample_unknown_source() {
		let table = micro_table([0, 0]);
		let rules = [ResampleRule {
			sources: Some(vec![4321]),
			transform: ResampleFn::Scale(1.0),
		}];
		assert!(
			matches!(resolve(&table, &rules), Err(SubtoolError::UnknownSource(4321))),
			"Unknown sources must be refused."
		);
	}
}
