/*!
# Subtool: Bake Engine
*/

use crate::{
	CACHE_BAKE_CAP,
	DEFAULT_CENTRE_FREQUENCY,
	DEFAULT_FFT_SIZE,
	resample::{
		decode,
		quantise,
	},
	Subfile,
	SubtoolError,
};
use fyi_msg::Progless;
use rustfft::{
	FftPlanner,
	num_complex::Complex,
};



#[derive(Debug, Clone, PartialEq)]
/// # Bake Options.
pub struct BakeOptions {
	/// # Affected Source Ids (`None` means all).
	pub sources: Option<Vec<u16>>,

	/// # FFT Length (samples).
	pub fft_size: usize,

	/// # Sky Frequency at the Band Centre (Hz).
	pub centre_frequency: f64,
}

impl Default for BakeOptions {
	fn default() -> Self {
		Self {
			sources: None,
			fft_size: DEFAULT_FFT_SIZE,
			centre_frequency: DEFAULT_CENTRE_FREQUENCY,
		}
	}
}



/// # Bake the Fractional Delays Into the Stream.
///
/// For each selected source, rotate the spectrum of every `fft_size` chunk
/// by the phase gradient its microsample delay implies, then write the
/// stream back in place and zero the source's trajectory in the delay
/// table.
///
/// Bake visits the file in source order rather than block order, so the
/// cache is widened to hold the whole data section for the duration.
///
/// ## Errors
///
/// This will return an error for a zero or over-long FFT size, an unknown
/// source, or any failed read or write.
pub fn bake(subfile: &mut Subfile, opts: &BakeOptions, progress: &Progless)
-> Result<(), SubtoolError> {
	let meta = *subfile.meta();
	let spl = meta.samples_per_line as usize;
	let sls = meta.sub_line_size as usize;
	let stream_len = (meta.blocks_per_sub * meta.samples_per_line) as usize;
	let sample_rate = meta.sample_rate as f64;

	if opts.fft_size == 0 || stream_len < opts.fft_size {
		return Err(SubtoolError::CountMismatch(
			"FFT samples",
			opts.fft_size as u64,
			stream_len as u64,
		));
	}

	// Resolve the targets before touching anything.
	let targets: Vec<usize> = match &opts.sources {
		None => (0..subfile.dt().len()).collect(),
		Some(ids) => ids.iter()
			.map(|&rf| subfile.dt().position(rf).ok_or(SubtoolError::UnknownSource(rf)))
			.collect::<Result<Vec<_>, SubtoolError>>()?,
	};
	if targets.is_empty() { return Err(SubtoolError::Noop); }

	subfile.reader_mut().set_cache_capacity(CACHE_BAKE_CAP);
	let _res = progress.try_reset(targets.len() as u32);

	let mut planner = FftPlanner::<f64>::new();
	let forward = planner.plan_fft_forward(opts.fft_size);
	let inverse = planner.plan_fft_inverse(opts.fft_size);
	let fft_len = opts.fft_size as f64 / sample_rate;

	// Transform every selected stream first, write back after; the reads
	// would otherwise see a half-baked file.
	let mut baked: Vec<(usize, Vec<Complex<f64>>)> = Vec::with_capacity(targets.len());
	for &src in &targets {
		// Trajectory in microsamples, mapped over the stream by position.
		let delays: Vec<f64> = subfile.dt().entries[src].frac_delay.iter()
			.map(|f| f64::from(*f) * 1e6)
			.collect();

		let mut stream: Vec<Complex<f64>> = Vec::with_capacity(stream_len);
		for block in 1..=meta.blocks_per_sub {
			let line = subfile.reader_mut().read_line(src as u64, block)?;
			stream.extend(line.chunks_exact(2).map(|pair| {
				let (re, im) = decode(pair);
				Complex::new(re, im)
			}));
		}

		let mut start = 0;
		while start + opts.fft_size <= stream_len {
			let chunk = &mut stream[start..start + opts.fft_size];
			forward.process(chunk);

			let mid = start + opts.fft_size / 2;
			let delay = delays.get(delays.len() * mid / stream_len)
				.copied()
				.unwrap_or_default() / 1e6 / sample_rate;

			for (k, bin) in chunk.iter_mut().enumerate() {
				let dc_offset = opts.centre_frequency * delay * std::f64::consts::TAU;
				let fine_offset = (k as f64 / (opts.fft_size as f64 * fft_len)) *
					delay * std::f64::consts::TAU;
				*bin *= Complex::from_polar(1.0, -(dc_offset - fine_offset));
			}

			inverse.process(chunk);
			for c in chunk.iter_mut() { *c /= opts.fft_size as f64; }
			start += opts.fft_size;
		}

		baked.push((src, stream));
		progress.increment();
	}

	// Now the write-back, line by line.
	for (src, stream) in baked {
		for block in 1..=meta.blocks_per_sub {
			let mut line = vec![0_u8; sls];
			let chunk = &stream[(block as usize - 1) * spl..block as usize * spl];
			for (pair, c) in line.chunks_exact_mut(2).zip(chunk) {
				pair[0] = quantise(c.re);
				pair[1] = quantise(c.im);
			}
			let pos = meta.block_offset(block) + (src as u64) * meta.sub_line_size;
			subfile.write_at(pos, &line)?;
		}

		// The delay is in the stream now; the table must stop claiming it.
		for f in &mut subfile.dt_mut().entries[src].frac_delay { *f = 0.0; }
	}
	subfile.rewrite_dt()?;

	progress.finish();
	Ok(())
}
