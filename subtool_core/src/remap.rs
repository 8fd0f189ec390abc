/*!
# Subtool: Remap Engine
*/

use crate::{
	DelayTable,
	SubfileReader,
	SubtoolError,
};
use fyi_msg::Progless;
use std::io::Write;



/// # Resolve a Source Map to Line Indices.
///
/// The subfile's source order is its delay-table order; the result says,
/// for each output line, which input line to copy. The default is identity,
/// `map_all` repoints every slot at one donor, and explicit pairs override
/// individual slots (slot, donor).
///
/// ## Errors
///
/// This will return an error if any referenced source id is not in the
/// table.
pub(crate) fn resolve(
	table: &DelayTable,
	map_all: Option<u16>,
	pairs: &[(u16, u16)],
) -> Result<Vec<usize>, SubtoolError> {
	let mut out: Vec<usize> = (0..table.len()).collect();

	if let Some(donor) = map_all {
		let idx = table.position(donor).ok_or(SubtoolError::UnknownSource(donor))?;
		out.fill(idx);
	}

	for &(slot, donor) in pairs {
		let slot_idx = table.position(slot).ok_or(SubtoolError::UnknownSource(slot))?;
		let donor_idx = table.position(donor).ok_or(SubtoolError::UnknownSource(donor))?;
		out[slot_idx] = donor_idx;
	}

	Ok(out)
}

/// # Remap a Subfile's Data Stream.
///
/// Per block, output line `i` is a verbatim copy of the input line the map
/// points it at.
///
/// ## Errors
///
/// This will return an error if the map is the wrong size or any read or
/// write fails.
pub(crate) fn run<W>(
	reader: &mut SubfileReader,
	line_map: &[usize],
	out: &mut W,
	progress: &Progless,
) -> Result<(), SubtoolError>
where W: Write {
	let meta = *reader.meta();
	if line_map.len() != meta.num_sources as usize {
		return Err(SubtoolError::CountMismatch(
			"map entries",
			meta.num_sources,
			line_map.len() as u64,
		));
	}

	let sls = meta.sub_line_size as usize;
	let mut buf = vec![0_u8; meta.block_length as usize];

	for block in 1..=meta.blocks_per_sub {
		let input = reader.read_block(block)?;
		for (slot, &donor) in line_map.iter().enumerate() {
			buf[slot * sls..(slot + 1) * sls]
				.copy_from_slice(&input[donor * sls..(donor + 1) * sls]);
		}
		out.write_all(&buf)
			.map_err(|_| SubtoolError::Write("output data block".to_owned()))?;
		progress.increment();
	}

	Ok(())
}
