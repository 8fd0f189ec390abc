/*!
# Subtool: Subfile
*/

use crate::{
	DelayTable,
	DtHints,
	DtVersion,
	Header,
	HEADER_LENGTH,
	KEY_DT,
	Metadata,
	SubfileReader,
	SubtoolError,
	TableFormat,
};
use dactyl::NiceU64;
use std::{
	fmt,
	fs::OpenOptions,
	io::{
		Read,
		Seek,
		SeekFrom,
		Write,
	},
	path::{
		Path,
		PathBuf,
	},
};



#[derive(Debug)]
/// # A Loaded Subfile.
///
/// Opening a subfile parses the header, derives the geometry, and loads the
/// delay table; the data section stays on disk behind the cached reader
/// until somebody asks for it.
pub struct Subfile {
	/// # Where It Lives.
	path: PathBuf,

	/// # Parsed Header.
	header: Header,

	/// # Derived Geometry.
	meta: Metadata,

	/// # Its Delay Table.
	dt: DelayTable,

	/// # Cached Reader.
	reader: SubfileReader,
}

impl Subfile {
	/// # Open and Parse.
	///
	/// `writable` also opens the handle for the in-place commands.
	///
	/// ## Errors
	///
	/// This will return an error if the file cannot be opened, the header
	/// is malformed, the geometry does not add up, the file is shorter than
	/// the header claims, or the delay table fails to parse.
	pub fn open<P>(src: P, writable: bool) -> Result<Self, SubtoolError>
	where P: AsRef<Path> {
		let path = src.as_ref().to_path_buf();
		let mut file = OpenOptions::new()
			.read(true)
			.write(writable)
			.open(&path)
			.map_err(|_| SubtoolError::Open(path.to_string_lossy().into_owned()))?;

		// The header has to be read raw; everything else hangs off it.
		let mut raw = vec![0_u8; HEADER_LENGTH as usize];
		file.read_exact(&mut raw)
			.map_err(|_| SubtoolError::Read("header".to_owned()))?;
		let header = Header::parse(&raw)?;
		let meta = Metadata::from_header(&header)?;

		// Refuse files that cannot hold what the header promises.
		let actual = file.metadata().map(|m| m.len()).unwrap_or(0);
		if actual < meta.file_size() {
			return Err(SubtoolError::ShortRead(
				"subfile".to_owned(),
				meta.file_size() as usize,
				actual as usize,
			));
		}

		let mut reader = SubfileReader::new(file, meta);
		let hints = DtHints {
			version: Some(DtVersion::from_u8(meta.mwax_sub_version)?),
			rows: Some(meta.num_sources as usize),
			fracs: Some(meta.num_frac_delays as usize),
		};
		let raw = reader.read_section(KEY_DT)?;
		let dt = DelayTable::from_bytes(&raw, TableFormat::Bin, hints)?;

		Ok(Self { path, header, meta, dt, reader })
	}
}

/// # Getters.
impl Subfile {
	#[must_use]
	/// # Path.
	pub fn path(&self) -> &Path { &self.path }

	#[must_use]
	/// # Header.
	pub const fn header(&self) -> &Header { &self.header }

	/// # Mutable Header.
	pub fn header_mut(&mut self) -> &mut Header { &mut self.header }

	#[must_use]
	/// # Metadata.
	pub const fn meta(&self) -> &Metadata { &self.meta }

	#[must_use]
	/// # Delay Table.
	pub const fn dt(&self) -> &DelayTable { &self.dt }

	/// # Mutable Delay Table.
	pub fn dt_mut(&mut self) -> &mut DelayTable { &mut self.dt }

	#[must_use]
	/// # Reader.
	pub const fn reader(&self) -> &SubfileReader { &self.reader }

	/// # Mutable Reader.
	pub fn reader_mut(&mut self) -> &mut SubfileReader { &mut self.reader }
}

/// # In-place Writes.
impl Subfile {
	/// # Adopt New Metadata.
	///
	/// Used by the upgrade path once the sections have been moved.
	pub(crate) fn set_meta(&mut self, meta: Metadata) {
		self.meta = meta;
		self.reader.set_meta(meta);
	}

	/// # Write a Region In Place.
	///
	/// ## Errors
	///
	/// This will return an error if the seek or write fails.
	pub(crate) fn write_at(&mut self, pos: u64, raw: &[u8]) -> Result<(), SubtoolError> {
		let name = self.path.to_string_lossy().into_owned();
		let file = self.reader.file_mut();
		file.seek(SeekFrom::Start(pos))
			.and_then(|_| file.write_all(raw))
			.map_err(|_| SubtoolError::Write(name))?;
		self.reader.flush();
		Ok(())
	}

	/// # Re-serialise the Header In Place.
	///
	/// ## Errors
	///
	/// This will return an error if the header overflows its section or the
	/// write fails.
	pub fn rewrite_header(&mut self) -> Result<(), SubtoolError> {
		let raw = self.header.serialise()?;
		self.write_at(0, &raw)
	}

	/// # Re-serialise the Delay Table In Place.
	///
	/// ## Errors
	///
	/// This will return an error if the table no longer matches the
	/// metadata shape, or the write fails.
	pub fn rewrite_dt(&mut self) -> Result<(), SubtoolError> {
		let raw = self.dt.to_bin();
		if raw.len() as u64 != self.meta.dt_length {
			return Err(SubtoolError::DtShape);
		}
		let pos = self.meta.dt_offset;
		self.write_at(pos, &raw)
	}

	/// # Replace the Delay Table.
	///
	/// The patch command: a replacement table must match the resident shape
	/// and version exactly.
	///
	/// ## Errors
	///
	/// This will return an error on any shape/version mismatch, or if the
	/// write fails.
	pub fn patch_dt(&mut self, table: DelayTable) -> Result<(), SubtoolError> {
		if table.version.as_u8() != self.meta.mwax_sub_version ||
			table.len() != self.dt.len() ||
			table.num_fracs() != self.dt.num_fracs() {
			return Err(SubtoolError::DtShape);
		}
		self.dt = table;
		self.rewrite_dt()
	}
}

impl fmt::Display for Subfile {
	/// # Summarize the Subfile.
	///
	/// Identity, geometry, and the section map in a nice little table.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kv: [(&str, String); 8] = [
			("Observation:", self.meta.observation_id.to_string()),
			("Sub-observation:", self.meta.subobservation_id.to_string()),
			("Version:", self.meta.mwax_sub_version.to_string()),
			("Sources:", self.meta.num_sources.to_string()),
			("Sample Rate:", format!("{}/s", NiceU64::from(self.meta.sample_rate))),
			("Duration:", format!("{}s", self.meta.secs_per_subobs)),
			("Blocks:", format!(
				"{} x {} bytes",
				NiceU64::from(self.meta.blocks_per_sub),
				NiceU64::from(self.meta.block_length),
			)),
			("Margin:", format!("{} samples per end", NiceU64::from(self.meta.margin_samples))),
		];
		let col_max: usize = kv.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
		for (k, v) in kv {
			writeln!(f, "\x1b[1;38;5;199m{k:col_max$}\x1b[0m {v}")?;
		}

		writeln!(f, "\n\x1b[2mSECTION        OFFSET        LENGTH\x1b[0m")?;
		writeln!(f, "\x1b[2m-----------------------------------\x1b[0m")?;
		let sections: [(&str, u64, u64); 5] = [
			("header", 0, HEADER_LENGTH),
			("dt", self.meta.dt_offset, self.meta.dt_length),
			("udpmap", self.meta.udpmap_offset, self.meta.udpmap_length),
			("margin", self.meta.margin_offset, self.meta.margin_length),
			("data", self.meta.data_offset, self.meta.blocks_per_sub * self.meta.block_length),
		];
		for (name, pos, len) in sections {
			writeln!(
				f,
				"{name:<8} {:>12} {:>13}",
				NiceU64::from(pos).as_str(),
				NiceU64::from(len).as_str(),
			)?;
		}

		Ok(())
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::test_util::full_subfile;

	#[test]
	fn t_subfile_open() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let (path, meta) = full_subfile(dir.path(), DtVersion::V2);

		let sub = Subfile::open(&path, false).expect("Failed to open subfile.");
		assert_eq!(sub.meta(), &meta, "Loader geometry mismatch.");
		assert_eq!(sub.dt().len(), 2);
		assert_eq!(sub.dt().num_fracs(), meta.num_frac_delays as usize);
		assert_eq!(sub.dt().version, DtVersion::V2);
		assert!((sub.dt().entries[0].frac_delay[0] - 1.0).abs() < 1e-6);
	}

	#[test]
	fn t_subfile_open_v1() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let (path, _meta) = full_subfile(dir.path(), DtVersion::V1);

		let sub = Subfile::open(&path, false).expect("Failed to open v1 subfile.");
		assert_eq!(sub.meta().mwax_sub_version, 1);
		assert_eq!(sub.dt().version, DtVersion::V1);
		assert!((sub.dt().entries[0].frac_delay[1] + 1.5).abs() < 1e-6);
	}

	#[test]
	fn t_subfile_truncated() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let (path, _meta) = full_subfile(dir.path(), DtVersion::V2);

		// Chop the last block short.
		let raw = std::fs::read(&path).expect("Failed to read subfile.");
		std::fs::write(&path, &raw[..raw.len() - 10]).expect("Failed to truncate.");
		assert!(
			matches!(Subfile::open(&path, false), Err(SubtoolError::ShortRead(_, _, _))),
			"Truncated files must be refused."
		);
	}

	#[test]
	fn t_subfile_set_in_place() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let (path, _meta) = full_subfile(dir.path(), DtVersion::V2);

		let mut sub = Subfile::open(&path, true).expect("Failed to open subfile.");
		sub.header_mut().set("EXPOSURE_SECS", "16", false).expect("Set failed.");
		sub.rewrite_header().expect("Header rewrite failed.");
		drop(sub);

		let sub = Subfile::open(&path, false).expect("Failed to re-open subfile.");
		assert_eq!(sub.header().get_int("EXPOSURE_SECS"), Some(16), "Edit did not stick.");
	}
}
