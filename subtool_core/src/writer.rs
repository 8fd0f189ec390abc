/*!
# Subtool: Subfile Writer
*/

use crate::{
	DelayTable,
	HEADER_LENGTH,
	KEY_DT,
	KEY_HEADER,
	KEY_MARGIN,
	KEY_UDPMAP,
	remap,
	repoint,
	resample,
	resample::ResampleRule,
	Subfile,
	SubtoolError,
};
use fyi_msg::{
	Msg,
	Progless,
};
use std::{
	fs::File,
	io::{
		BufWriter,
		Write,
	},
	path::Path,
};



#[derive(Debug, Clone, PartialEq)]
/// # Section Content.
///
/// Where a preamble section's bytes come from when assembling an output
/// subfile.
pub enum SectionContent {
	/// # Caller-Supplied Bytes.
	Bytes(Vec<u8>),

	/// # A Delay Table (serialised on the way out).
	Table(DelayTable),

	/// # Copied From the Source Subfile.
	FromSource,
}

#[derive(Debug, Clone, PartialEq)]
/// # Data Section Treatment.
pub enum DataMode {
	/// # No Data Section At All.
	None,

	/// # Copy Blocks Verbatim.
	Passthrough,

	/// # Whole-Sample Shift to a New Delay Table.
	Repoint {
		/// # The Target Table.
		to: DelayTable,

		/// # Pass Unmatched Sources Through.
		force: bool,
	},

	/// # Reassign Source Streams to Slots.
	Remap {
		/// # Every Slot Receives This Donor.
		map_all: Option<u16>,

		/// # Per-Slot Overrides (slot, donor).
		pairs: Vec<(u16, u16)>,
	},

	/// # Per-Sample Complex Transform.
	Resample {
		/// # The Transforms.
		rules: Vec<ResampleRule>,

		/// # Neighbourhood Window (samples).
		region: usize,
	},
}

#[derive(Debug, Clone, PartialEq)]
/// # Output Descriptor.
///
/// One of these fully describes an output subfile: where each preamble
/// section comes from and what happens to the data stream.
pub struct OutputDescriptor {
	/// # Header Section.
	pub header: SectionContent,

	/// # Delay-Table Section.
	pub dt: SectionContent,

	/// # Packet-Map Section.
	pub udpmap: SectionContent,

	/// # Margin Section.
	pub margin: SectionContent,

	/// # Data Treatment.
	pub data: DataMode,
}

impl Default for OutputDescriptor {
	/// # A Faithful Copy.
	fn default() -> Self {
		Self {
			header: SectionContent::FromSource,
			dt: SectionContent::FromSource,
			udpmap: SectionContent::FromSource,
			margin: SectionContent::FromSource,
			data: DataMode::Passthrough,
		}
	}
}



/// # Write a Subfile.
///
/// Assemble the `header_length + block_length` preamble, copy each section
/// in at its declared offset, then stream the data blocks through whichever
/// engine the descriptor calls for, in ascending block order.
///
/// A failure part-way leaves the partial output in place for the caller to
/// deal with.
///
/// ## Errors
///
/// This will return an error if the preamble sections cannot fit block
/// zero, a section has the wrong length, the destination cannot be
/// created, or the selected engine fails.
pub fn write_subfile<P>(
	subfile: &mut Subfile,
	dst: P,
	desc: &OutputDescriptor,
	progress: &Progless,
) -> Result<(), SubtoolError>
where P: AsRef<Path> {
	let meta = *subfile.meta();

	// Invariant first: dt, udpmap, and margin have to pack into block zero.
	if meta.preamble_length() < meta.margin_offset + meta.margin_length {
		return Err(SubtoolError::Geometry("the preamble sections overflow block zero"));
	}

	// Assemble the preamble.
	let mut preamble = vec![0_u8; meta.preamble_length() as usize];
	fill_section(subfile, &mut preamble, &desc.header, KEY_HEADER, 0, HEADER_LENGTH)?;
	fill_section(subfile, &mut preamble, &desc.dt, KEY_DT, meta.dt_offset, meta.dt_length)?;
	fill_section(subfile, &mut preamble, &desc.udpmap, KEY_UDPMAP, meta.udpmap_offset, meta.udpmap_length)?;
	fill_section(subfile, &mut preamble, &desc.margin, KEY_MARGIN, meta.margin_offset, meta.margin_length)?;

	let dst = dst.as_ref();
	let out = File::create(dst)
		.map_err(|_| SubtoolError::Create(dst.to_string_lossy().into_owned()))?;
	let mut out = BufWriter::new(out);
	out.write_all(&preamble)
		.map_err(|_| SubtoolError::Write(dst.to_string_lossy().into_owned()))?;

	// And now the data, if any.
	if ! matches!(desc.data, DataMode::None) {
		let _res = progress.try_reset(u32::try_from(meta.blocks_per_sub).unwrap_or(u32::MAX));
		progress.set_title(Some(Msg::new(("Writing", 199), "data blocks…")));

		match &desc.data {
			DataMode::None => {},
			DataMode::Passthrough => {
				for block in 1..=meta.blocks_per_sub {
					let buf = subfile.reader_mut().read_block(block)?;
					out.write_all(&buf)
						.map_err(|_| SubtoolError::Write("output data block".to_owned()))?;
					progress.increment();
				}
			},
			DataMode::Repoint { to, force } => {
				let from = subfile.dt().clone();
				repoint::run(subfile.reader_mut(), &from, to, *force, &mut out, progress)?;
			},
			DataMode::Remap { map_all, pairs } => {
				let line_map = remap::resolve(subfile.dt(), *map_all, pairs)?;
				remap::run(subfile.reader_mut(), &line_map, &mut out, progress)?;
			},
			DataMode::Resample { rules, region } => {
				let line_rules = resample::resolve(subfile.dt(), rules)?;
				resample::run(subfile.reader_mut(), &line_rules, *region, &mut out, progress)?;
			},
		}

		progress.finish();
	}

	out.flush().map_err(|_| SubtoolError::Write(dst.to_string_lossy().into_owned()))
}

/// # Copy One Section Into the Preamble.
fn fill_section(
	subfile: &mut Subfile,
	preamble: &mut [u8],
	content: &SectionContent,
	key: &'static str,
	offset: u64,
	length: u64,
) -> Result<(), SubtoolError> {
	let raw = match content {
		SectionContent::Bytes(b) => b.clone(),
		SectionContent::Table(t) => t.to_bin(),
		SectionContent::FromSource => subfile.reader_mut().read_section(key)?.to_vec(),
	};
	if raw.len() as u64 != length {
		return Err(SubtoolError::CountMismatch(key, length, raw.len() as u64));
	}

	let offset = offset as usize;
	preamble[offset..offset + raw.len()].copy_from_slice(&raw);
	Ok(())
}
