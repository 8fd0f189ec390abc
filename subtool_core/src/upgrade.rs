/*!
# Subtool: Upgrade
*/

use crate::{
	DtVersion,
	KEY_MARGIN,
	KEY_UDPMAP,
	Subfile,
	SubtoolError,
};



/// # Upgrade a Subfile From v1 to v2, In Place.
///
/// The delay table grows, pushing the packet map and margin rightward
/// within block zero, so those two sections are held in memory across the
/// move. The data section never moves. Returns `false` if the file was
/// already v2 and nothing needed doing.
///
/// ## Errors
///
/// This will return an error if the grown preamble would no longer fit
/// block zero, or any read, serialisation, or write fails.
pub fn upgrade(subfile: &mut Subfile) -> Result<bool, SubtoolError> {
	if subfile.meta().mwax_sub_version == 2 { return Ok(false); }

	// The movers, before anything shifts under them.
	let udpmap = subfile.reader_mut().read_section(KEY_UDPMAP)?.to_vec();
	let margin = subfile.reader_mut().read_section(KEY_MARGIN)?.to_vec();

	let meta = subfile.meta().with_version(2)?;
	if meta.preamble_length() < meta.margin_offset + meta.margin_length {
		return Err(SubtoolError::Geometry("the v2 preamble would overflow block zero"));
	}

	subfile.dt_mut().version = DtVersion::V2;
	let dt = subfile.dt().to_bin();
	if dt.len() as u64 != meta.dt_length {
		return Err(SubtoolError::Bug("upgraded table length mismatch"));
	}

	subfile.write_at(meta.udpmap_offset, &udpmap)?;
	subfile.write_at(meta.margin_offset, &margin)?;
	subfile.write_at(meta.dt_offset, &dt)?;

	// And finally the header catches up.
	subfile.header_mut().set("FRAC_DELAY_SIZE", "4", false)?;
	subfile.header_mut().set("MWAX_SUB_VER", "2", false)?;
	subfile.set_meta(meta);
	subfile.rewrite_header()?;

	Ok(true)
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::test_util::full_subfile;

	#[test]
	fn t_upgrade() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let (path, v1_meta) = full_subfile(dir.path(), DtVersion::V1);

		// Remember the movers and the data as they were.
		let raw = std::fs::read(&path).expect("Failed to read subfile.");
		let udpmap = raw[v1_meta.udpmap_offset as usize..][..v1_meta.udpmap_length as usize].to_vec();
		let margin = raw[v1_meta.margin_offset as usize..][..v1_meta.margin_length as usize].to_vec();
		let data = raw[v1_meta.data_offset as usize..].to_vec();

		let mut sub = Subfile::open(&path, true).expect("Failed to open subfile.");
		assert!(upgrade(&mut sub).expect("Upgrade failed."), "v1 should upgrade.");
		drop(sub);

		// Fresh eyes.
		let sub = Subfile::open(&path, false).expect("Failed to re-open subfile.");
		let meta = *sub.meta();
		assert_eq!(meta.mwax_sub_version, 2);
		assert_eq!(sub.header().get_int("MWAX_SUB_VER"), Some(2));
		assert_eq!(sub.header().get_int("FRAC_DELAY_SIZE"), Some(4));
		assert_eq!(meta.frac_delay_size, 4);
		assert_eq!(meta.dt_entry_min_size, 56);
		assert_eq!(
			meta.dt_length,
			meta.num_sources * (56 + meta.num_frac_delays * 4),
		);

		// The trajectory survives the widening: one sample and minus one
		// and a half, now as floats.
		assert_eq!(sub.dt().version, DtVersion::V2);
		assert!((sub.dt().entries[0].frac_delay[0] - 1.0).abs() < 1e-6);
		assert!((sub.dt().entries[0].frac_delay[1] + 1.5).abs() < 1e-6);

		// The movers moved without changing a byte; the data stayed put.
		let raw = std::fs::read(&path).expect("Failed to re-read subfile.");
		assert_eq!(
			&raw[meta.udpmap_offset as usize..][..meta.udpmap_length as usize],
			udpmap.as_slice(),
			"Packet map bytes must survive the move."
		);
		assert_eq!(
			&raw[meta.margin_offset as usize..][..meta.margin_length as usize],
			margin.as_slice(),
			"Margin bytes must survive the move."
		);
		assert_eq!(
			&raw[meta.data_offset as usize..],
			data.as_slice(),
			"The data section never moves."
		);

		// Going again is a polite no-op.
		let mut sub = Subfile::open(&path, true).expect("Failed to re-open subfile.");
		assert!(! upgrade(&mut sub).expect("Second upgrade failed."), "v2 is a no-op.");
	}
}
