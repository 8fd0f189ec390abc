/*!
# Subtool: Test Scaffolding

Synthetic tables, metadata, and files small enough to reason about by hand.
Only compiled for tests.
*/

use crate::{
	DelayTable,
	DelayTableEntry,
	DtVersion,
	Metadata,
};
use std::{
	fs::File,
	io::Write,
	path::{
		Path,
		PathBuf,
	},
};



/// # A Small, Detection-Friendly Table.
///
/// Source ids start above the millisample range so that binary structure
/// inference cannot mistake a row boundary for trajectory data, and the
/// delay values keep the redundant fields in agreement so the version
/// heuristics accept the serialised form.
pub(crate) fn small_table(version: DtVersion, rows: usize, fracs: usize) -> DelayTable {
	let entries = (0..rows)
		.map(|i| {
			let rf_input = 5001 + i as u16;
			let ws_delay = i as i16 - 1;
			match version {
				DtVersion::V1 => DelayTableEntry {
					rf_input,
					ws_delay,
					initial_delay: 0.0,
					delta_delay: f64::from(250 * i as u32),
					delta_delta_delay: 3.0,
					num_pointings: 1,
					start_total_delay: 0.0,
					middle_total_delay: 0.0,
					end_total_delay: 0.0,
					// Millisample-grid values, well inside range.
					frac_delay: (0..fracs)
						.map(|j| (i as f32).mul_add(0.1, j as f32 * 0.025))
						.collect(),
				},
				DtVersion::V2 => {
					let frac_delay: Vec<f32> = (0..fracs)
						.map(|j| (j as f32).mul_add(0.01, 0.5 + i as f32 * 0.1))
						.collect();
					let initial = f64::from(frac_delay[0]);
					DelayTableEntry {
						rf_input,
						ws_delay,
						initial_delay: initial,
						delta_delay: 0.7 + 0.01 * i as f64,
						delta_delta_delay: 0.03,
						num_pointings: 1,
						start_total_delay: initial,
						middle_total_delay: initial + 0.1,
						end_total_delay: initial + 0.2,
						frac_delay,
					}
				},
			}
		})
		.collect();

	DelayTable { version, entries }
}

/// # Micro Metadata.
///
/// Three blocks of four samples across two sources, with an eight-sample
/// margin: the smallest world in which the windowed transforms have
/// anything interesting to do.
pub(crate) fn micro_meta() -> Metadata {
	Metadata::derive(1_217_000_000, 1_217_000_008, 12, 1, 4, 2, 1, 8, 2)
		.expect("Micro metadata should derive.")
}

/// # Encode a Sample Value.
///
/// Both complex components carry the same number so stream positions can be
/// eyeballed straight from hexdumps.
pub(crate) const fn px(v: i8) -> [u8; 2] {
	let b = v.to_le_bytes()[0];
	[b, b]
}

/// # A Line of Sample Values.
pub(crate) fn line(values: &[i8]) -> Vec<u8> {
	values.iter().flat_map(|&v| px(v)).collect()
}

/// # Micro Subfile Streams.
///
/// Source 0 carries 0..=19 and source 1 carries 100..=119, with the data
/// proper covering the middle twelve samples of each and the margins the
/// overhanging ends.
pub(crate) struct MicroStreams {
	/// # Data Blocks (block-major, line-minor).
	pub(crate) blocks: Vec<Vec<u8>>,

	/// # Head Margins Per Source.
	pub(crate) heads: Vec<Vec<u8>>,

	/// # Tail Margins Per Source.
	pub(crate) tails: Vec<Vec<u8>>,
}

/// # Build the Micro Streams.
pub(crate) fn micro_streams() -> MicroStreams {
	let blocks = (0..3_i8)
		.map(|b| {
			let mut block = line(&[4 + b * 4, 5 + b * 4, 6 + b * 4, 7 + b * 4]);
			block.extend(line(&[104 + b * 4, 105 + b * 4, 106 + b * 4, 107 + b * 4]));
			block
		})
		.collect();

	MicroStreams {
		blocks,
		heads: vec![
			line(&[0, 1, 2, 3, 4, 5, 6, 7]),
			line(&[100, 101, 102, 103, 104, 105, 106, 107]),
		],
		tails: vec![
			line(&[12, 13, 14, 15, 16, 17, 18, 19]),
			line(&[112, 113, 114, 115, 116, 117, 118, 119]),
		],
	}
}

/// # Write the Micro Subfile.
///
/// Lays the streams out at the offsets `micro_meta` dictates and returns
/// the path. The preamble is not internally consistent (the micro geometry
/// is too small to honour the packing invariant), but every region the
/// engines read is where they expect it.
pub(crate) fn micro_file(dir: &Path) -> PathBuf {
	let meta = micro_meta();
	let streams = micro_streams();

	let mut raw = vec![0_u8; meta.margin_offset as usize + meta.margin_length as usize];
	for (i, block) in streams.blocks.iter().enumerate() {
		let pos = meta.block_offset(i as u64 + 1) as usize;
		raw[pos..pos + block.len()].copy_from_slice(block);
	}

	// Margins pack as (head, tail) per source.
	let mut pos = meta.margin_offset as usize;
	for src in 0..2 {
		raw[pos..pos + 16].copy_from_slice(&streams.heads[src]);
		pos += 16;
		raw[pos..pos + 16].copy_from_slice(&streams.tails[src]);
		pos += 16;
	}

	let path = dir.join("micro.sub");
	let mut file = File::create(&path).expect("Failed to create micro subfile.");
	file.write_all(&raw).expect("Failed to write micro subfile.");
	path
}

/// # Micro Delay Table.
///
/// Whole-sample delays as given; everything else zero. Source order matches
/// the micro streams.
pub(crate) fn micro_table(ws: [i16; 2]) -> DelayTable {
	let mut table = small_table(DtVersion::V2, 2, 30).zeroed();
	table.entries[0].ws_delay = ws[0];
	table.entries[1].ws_delay = ws[1];
	table
}

/// # A Complete, Loadable Subfile.
///
/// Real packet constants, two sources, two blocks, every section populated
/// with recognisable patterns. Returns the path and the metadata it was
/// built against.
pub(crate) fn full_subfile(dir: &Path, version: DtVersion) -> (PathBuf, Metadata) {
	let meta = Metadata::derive(
		1_217_000_000, 1_217_000_008,
		32_768, 1, 16_384, 2,
		crate::SAMPLES_PER_PACKET, crate::MARGIN_PACKETS,
		version.as_u8(),
	).expect("Full metadata should derive.");

	let header_text = format!(
		"HDR_SIZE 4096\nPOPULATED 1\nOBS_ID {}\nSUBOBS_ID {}\nMODE MWAX_VCS\n\
		NTIMESAMPLES {}\nNINPUTS {}\nSAMPLE_RATE {}\nSECS_PER_SUBOBS {}\n\
		MWAX_SUB_VER {}\nFRAC_DELAY_SIZE {}\n",
		meta.observation_id, meta.subobservation_id,
		meta.samples_per_line, meta.num_sources,
		meta.sample_rate, meta.secs_per_subobs,
		meta.mwax_sub_version, meta.frac_delay_size,
	);

	let mut table = small_table(version, 2, meta.num_frac_delays as usize);
	// The literal S2 trajectory head: one sample and minus one and a half.
	table.entries[0].frac_delay[0] = 1.0;
	table.entries[0].frac_delay[1] = -1.5;

	let mut raw = vec![0_u8; meta.file_size() as usize];
	raw[..header_text.len()].copy_from_slice(header_text.as_bytes());

	let dt = table.to_bin();
	assert_eq!(dt.len(), meta.dt_length as usize, "Table/metadata length mismatch.");
	let pos = meta.dt_offset as usize;
	raw[pos..pos + dt.len()].copy_from_slice(&dt);

	// Recognisable section patterns.
	let pos = meta.udpmap_offset as usize;
	for (i, b) in raw[pos..pos + meta.udpmap_length as usize].iter_mut().enumerate() {
		*b = (0xA0 | (i & 0x0F)) as u8;
	}
	let pos = meta.margin_offset as usize;
	for (i, b) in raw[pos..pos + meta.margin_length as usize].iter_mut().enumerate() {
		*b = (i % 251) as u8;
	}
	let pos = meta.data_offset as usize;
	for (i, b) in raw[pos..].iter_mut().enumerate() {
		*b = (i % 127) as u8;
	}

	let path = dir.join("full.sub");
	let mut file = File::create(&path).expect("Failed to create full subfile.");
	file.write_all(&raw).expect("Failed to write full subfile.");
	(path, meta)
}
