/*!
# Subtool: Metadata
*/

use crate::{
	FFT_PER_BLOCK,
	Header,
	HEADER_LENGTH,
	MARGIN_PACKETS,
	SAMPLE_SIZE,
	SAMPLES_PER_PACKET,
	SubtoolError,
};



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Subfile Metadata.
///
/// The derived geometry of one open subfile. Everything below the raw
/// header fields follows from them by exact integer arithmetic; a remainder
/// anywhere means the header is lying and the file is refused.
///
/// Metadata is immutable for the life of a file, with one exception: the
/// upgrade command swaps the version-dependent delay-table sizing via
/// [`Metadata::with_version`].
pub struct Metadata {
	/// # Observation Id.
	pub observation_id: u64,

	/// # Sub-observation Id.
	pub subobservation_id: u64,

	/// # Sample Rate (samples/s).
	pub sample_rate: u64,

	/// # Seconds Per Sub-observation.
	pub secs_per_subobs: u64,

	/// # Samples Per Line (`NTIMESAMPLES`).
	pub samples_per_line: u64,

	/// # Samples Per UDP Packet.
	pub samples_per_packet: u64,

	/// # Margin Packets Per End.
	pub margin_packets: u64,

	/// # FFTs Per Block.
	pub fft_per_block: u64,

	/// # Number of Sources (`NINPUTS`).
	pub num_sources: u64,

	/// # Sub-format Version (1 or 2).
	pub mwax_sub_version: u8,

	/// # Data Blocks Per Sub-observation.
	pub blocks_per_sub: u64,

	/// # Bytes Per Line.
	pub sub_line_size: u64,

	/// # Bytes Per Block.
	pub block_length: u64,

	/// # Fractional Delays Per Source.
	pub num_frac_delays: u64,

	/// # Margin Samples Per End.
	pub margin_samples: u64,

	/// # Bytes Per Fractional Delay (2 or 4).
	pub frac_delay_size: u64,

	/// # Fixed Bytes Per Delay-Table Row (20 or 56).
	pub dt_entry_min_size: u64,

	/// # Delay-Table Section Length.
	pub dt_length: u64,

	/// # Packet-Map Section Length.
	pub udpmap_length: u64,

	/// # Margin Section Length.
	pub margin_length: u64,

	/// # Delay-Table Offset.
	pub dt_offset: u64,

	/// # Packet-Map Offset.
	pub udpmap_offset: u64,

	/// # Margin Offset.
	pub margin_offset: u64,

	/// # Data Offset.
	pub data_offset: u64,
}

impl Metadata {
	/// # From a Parsed Header.
	///
	/// ## Errors
	///
	/// This will return an error if a required key is missing or negative,
	/// the version is unsupported, or any derivation leaves a remainder.
	pub fn from_header(header: &Header) -> Result<Self, SubtoolError> {
		/// # Required Unsigned Field.
		fn want(header: &Header, key: &'static str) -> Result<u64, SubtoolError> {
			header.get_int(key)
				.and_then(|n| u64::try_from(n).ok())
				.ok_or(SubtoolError::HeaderMissing(key))
		}

		let mwax_sub_version = match header.get_int("MWAX_SUB_VER") {
			None | Some(1) => 1,
			Some(2) => 2,
			Some(other) => return Err(SubtoolError::Version(other.unsigned_abs())),
		};

		Self::derive(
			want(header, "OBS_ID")?,
			want(header, "SUBOBS_ID")?,
			want(header, "SAMPLE_RATE")?,
			want(header, "SECS_PER_SUBOBS")?,
			want(header, "NTIMESAMPLES")?,
			want(header, "NINPUTS")?,
			SAMPLES_PER_PACKET,
			MARGIN_PACKETS,
			mwax_sub_version,
		)
	}

	#[expect(clippy::too_many_arguments, reason = "It is a constructor.")]
	/// # Derive the Geometry.
	///
	/// The packet parameters are fixed for real subfiles but vary in tests,
	/// where full-sized margins would drown the arithmetic being checked.
	pub(crate) fn derive(
		observation_id: u64,
		subobservation_id: u64,
		sample_rate: u64,
		secs_per_subobs: u64,
		samples_per_line: u64,
		num_sources: u64,
		samples_per_packet: u64,
		margin_packets: u64,
		mwax_sub_version: u8,
	) -> Result<Self, SubtoolError> {
		/// # Exact Division or Bust.
		fn exact(num: u64, den: u64, what: &'static str) -> Result<u64, SubtoolError> {
			if den == 0 || num % den != 0 { Err(SubtoolError::Geometry(what)) }
			else { Ok(num / den) }
		}

		if samples_per_line == 0 || num_sources == 0 {
			return Err(SubtoolError::Geometry("empty line or source set"));
		}

		let total_samples = sample_rate * secs_per_subobs;
		let blocks_per_sub = exact(total_samples, samples_per_line, "samples per block")?;
		let sub_line_size = samples_per_line * SAMPLE_SIZE;
		let block_length = sub_line_size * num_sources;
		let num_frac_delays = blocks_per_sub * FFT_PER_BLOCK;
		let margin_samples = margin_packets * samples_per_packet;

		let (frac_delay_size, dt_entry_min_size) = version_sizes(mwax_sub_version)?;
		let dt_length = num_sources * (dt_entry_min_size + num_frac_delays * frac_delay_size);

		let packets = exact(total_samples, samples_per_packet, "samples per packet")?;
		let udpmap_length = exact(num_sources * packets, 8, "packet map bits")?;

		// Head and tail, two bytes per complex sample.
		let margin_length = num_sources * margin_samples * SAMPLE_SIZE * 2;

		let dt_offset = HEADER_LENGTH;
		let udpmap_offset = dt_offset + dt_length;
		let margin_offset = udpmap_offset + udpmap_length;
		let data_offset = HEADER_LENGTH + block_length;

		Ok(Self {
			observation_id,
			subobservation_id,
			sample_rate,
			secs_per_subobs,
			samples_per_line,
			samples_per_packet,
			margin_packets,
			fft_per_block: FFT_PER_BLOCK,
			num_sources,
			mwax_sub_version,
			blocks_per_sub,
			sub_line_size,
			block_length,
			num_frac_delays,
			margin_samples,
			frac_delay_size,
			dt_entry_min_size,
			dt_length,
			udpmap_length,
			margin_length,
			dt_offset,
			udpmap_offset,
			margin_offset,
			data_offset,
		})
	}

	/// # Re-derive For a Different Version.
	///
	/// The delay table grows or shrinks with the version, dragging the
	/// packet-map and margin offsets along with it. Nothing else moves.
	///
	/// ## Errors
	///
	/// This will return an error if the version is not 1 or 2.
	pub fn with_version(self, version: u8) -> Result<Self, SubtoolError> {
		let (frac_delay_size, dt_entry_min_size) = version_sizes(version)?;
		let dt_length = self.num_sources * (dt_entry_min_size + self.num_frac_delays * frac_delay_size);
		let udpmap_offset = self.dt_offset + dt_length;
		let margin_offset = udpmap_offset + self.udpmap_length;
		Ok(Self {
			mwax_sub_version: version,
			frac_delay_size,
			dt_entry_min_size,
			dt_length,
			udpmap_offset,
			margin_offset,
			..self
		})
	}

	#[must_use]
	/// # Byte Offset of a Block.
	///
	/// Block zero is the preamble region; data proper starts at block one.
	pub const fn block_offset(&self, idx: u64) -> u64 {
		HEADER_LENGTH + idx * self.block_length
	}

	#[must_use]
	/// # Expected Total File Size.
	pub const fn file_size(&self) -> u64 {
		self.data_offset + self.blocks_per_sub * self.block_length
	}

	#[must_use]
	/// # Preamble Length (header plus block zero).
	pub const fn preamble_length(&self) -> u64 { HEADER_LENGTH + self.block_length }

	#[must_use]
	/// # Usable Shift Budget (samples).
	pub const fn margin_budget(&self) -> u64 { self.margin_samples / 2 }
}

/// # Version-Dependent Row Sizing.
const fn version_sizes(version: u8) -> Result<(u64, u64), SubtoolError> {
	match version {
		1 => Ok((2, 20)),
		2 => Ok((4, 56)),
		other => Err(SubtoolError::Version(other as u64)),
	}
}
