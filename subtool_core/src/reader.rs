/*!
# Subtool: Cached Reader
*/

use crate::{
	BlockCache,
	CACHE_DEFAULT_CAP,
	CacheStats,
	HEADER_LENGTH,
	KEY_DT,
	KEY_HEADER,
	KEY_MARGIN,
	KEY_UDPMAP,
	Metadata,
	SAMPLE_SIZE,
	SubtoolError,
};
use std::{
	fs::File,
	io::{
		Read,
		Seek,
		SeekFrom,
	},
	sync::Arc,
};



#[derive(Debug)]
/// # Subfile Reader.
///
/// All section, block, line, and margin reads funnel through one cached,
/// exact-length positional read. Blocks are the unit of caching; line and
/// margin accessors slice out of cached buffers rather than touching the
/// file again.
pub struct SubfileReader {
	/// # The Open Subfile.
	file: File,

	/// # Its Geometry.
	meta: Metadata,

	/// # Keyed Buffer Cache.
	cache: BlockCache,
}

impl SubfileReader {
	#[must_use]
	/// # New Instance.
	pub fn new(file: File, meta: Metadata) -> Self {
		Self {
			file,
			meta,
			cache: BlockCache::new(CACHE_DEFAULT_CAP),
		}
	}

	#[must_use]
	/// # Metadata.
	pub const fn meta(&self) -> &Metadata { &self.meta }

	#[must_use]
	/// # Cache Statistics.
	pub const fn cache_stats(&self) -> &CacheStats { self.cache.stats() }

	/// # Change Cache Capacity.
	pub fn set_cache_capacity(&mut self, cap: usize) { self.cache.set_capacity(cap); }

	/// # Swap the Metadata.
	///
	/// The upgrade path re-derives geometry mid-flight; everything cached
	/// under the old offsets has to go with it.
	pub fn set_meta(&mut self, meta: Metadata) {
		self.meta = meta;
		self.cache.flush();
	}

	/// # Borrow the File.
	pub(crate) fn file_mut(&mut self) -> &mut File { &mut self.file }

	/// # Drop Any Cached State.
	pub fn flush(&mut self) { self.cache.flush(); }
}

/// # Reads.
impl SubfileReader {
	/// # Cached Positional Read.
	///
	/// Look the key up in the cache; on a miss, read exactly `len` bytes at
	/// `pos` and remember them.
	///
	/// ## Errors
	///
	/// This will return an error if the read fails or comes up short.
	pub fn read(&mut self, key: &str, pos: u64, len: usize) -> Result<Arc<[u8]>, SubtoolError> {
		if let Some(buf) = self.cache.get(key) { return Ok(buf); }

		let mut buf = vec![0_u8; len];
		self.file.seek(SeekFrom::Start(pos))
			.map_err(|_| SubtoolError::Read(key.to_owned()))?;

		let mut got = 0;
		while got < len {
			match self.file.read(&mut buf[got..]) {
				Ok(0) => break,
				Ok(n) => { got += n; },
				Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {},
				Err(_) => return Err(SubtoolError::Read(key.to_owned())),
			}
		}
		if got < len {
			return Err(SubtoolError::ShortRead(key.to_owned(), len, got));
		}

		let buf: Arc<[u8]> = buf.into();
		self.cache.add(key, Arc::clone(&buf));
		Ok(buf)
	}

	/// # Read a Named Section.
	///
	/// ## Errors
	///
	/// This will return an error for an unknown section name or a failed
	/// read.
	pub fn read_section(&mut self, name: &'static str) -> Result<Arc<[u8]>, SubtoolError> {
		let (pos, len) = match name {
			KEY_HEADER => (0, HEADER_LENGTH),
			KEY_DT => (self.meta.dt_offset, self.meta.dt_length),
			KEY_UDPMAP => (self.meta.udpmap_offset, self.meta.udpmap_length),
			KEY_MARGIN => (self.meta.margin_offset, self.meta.margin_length),
			_ => return Err(SubtoolError::MissingSection(name)),
		};
		self.read(name, pos, len as usize)
	}

	/// # Read a Block.
	///
	/// Block zero is the preamble region; blocks one through
	/// `blocks_per_sub` are data.
	///
	/// ## Errors
	///
	/// This will return an error for an out-of-range index or a failed
	/// read.
	pub fn read_block(&mut self, idx: u64) -> Result<Arc<[u8]>, SubtoolError> {
		if self.meta.blocks_per_sub < idx {
			return Err(SubtoolError::BlockIndex(idx, self.meta.blocks_per_sub));
		}
		let key = format!("block-{idx}");
		self.read(&key, self.meta.block_offset(idx), self.meta.block_length as usize)
	}

	/// # Read a Block, Maybe.
	///
	/// Indices outside `1..=blocks_per_sub` come back as `None` so sliding
	/// windows can run off either end without ceremony.
	///
	/// ## Errors
	///
	/// This will return an error only for a failed read of an in-range
	/// block.
	pub fn read_block_or_null(&mut self, idx: i64) -> Result<Option<Arc<[u8]>>, SubtoolError> {
		if idx <= 0 || self.meta.blocks_per_sub < idx.unsigned_abs() { Ok(None) }
		else { self.read_block(idx.unsigned_abs()).map(Some) }
	}

	/// # Read One Source's Line of a Block.
	///
	/// ## Errors
	///
	/// This will return an error for an out-of-range source or block.
	pub fn read_line(&mut self, src: u64, block: u64) -> Result<Vec<u8>, SubtoolError> {
		if self.meta.num_sources <= src {
			return Err(SubtoolError::SourceIndex(src, self.meta.num_sources));
		}
		let buf = self.read_block(block)?;
		let line = self.meta.sub_line_size as usize;
		let start = src as usize * line;
		Ok(buf[start..start + line].to_vec())
	}

	/// # Read One Source's Margin.
	///
	/// `head` selects the leading margin, otherwise the trailing one.
	///
	/// ## Errors
	///
	/// This will return an error for an out-of-range source or a failed
	/// read.
	pub fn read_margin_line(&mut self, src: u64, head: bool) -> Result<Vec<u8>, SubtoolError> {
		if self.meta.num_sources <= src {
			return Err(SubtoolError::SourceIndex(src, self.meta.num_sources));
		}
		let buf = self.read_section(KEY_MARGIN)?;
		let end = (self.meta.margin_samples * SAMPLE_SIZE) as usize;
		let start = src as usize * end * 2 + if head { 0 } else { end };
		Ok(buf[start..start + end].to_vec())
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::test_util::{
		line,
		micro_file,
		micro_meta,
		micro_streams,
	};

	/// # Open the Micro World.
	fn micro_reader(dir: &std::path::Path) -> SubfileReader {
		let path = micro_file(dir);
		let file = File::open(path).expect("Failed to open micro subfile.");
		SubfileReader::new(file, micro_meta())
	}

	#[test]
	fn t_reader_blocks() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let mut reader = micro_reader(dir.path());
		let streams = micro_streams();

		for (i, want) in streams.blocks.iter().enumerate() {
			let got = reader.read_block(i as u64 + 1).expect("Block read failed.");
			assert_eq!(&*got, want.as_slice(), "Block {} came back wrong.", i + 1);
		}
		assert!(reader.read_block(4).is_err(), "Out-of-range block should fail.");

		// A second pass should be all cache hits.
		let misses = reader.cache_stats().misses;
		for i in 1..=3 { let _res = reader.read_block(i).expect("Block read failed."); }
		assert_eq!(reader.cache_stats().misses, misses, "Re-reads should hit the cache.");
	}

	#[test]
	fn t_reader_or_null() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let mut reader = micro_reader(dir.path());

		assert!(
			reader.read_block_or_null(0).expect("Null read failed.").is_none(),
			"Block zero is not data."
		);
		assert!(
			reader.read_block_or_null(-1).expect("Null read failed.").is_none(),
			"Negative blocks are not data."
		);
		assert!(
			reader.read_block_or_null(4).expect("Null read failed.").is_none(),
			"Past-the-end blocks are not data."
		);
		assert!(
			reader.read_block_or_null(2).expect("Read failed.").is_some(),
			"Interior blocks are data."
		);
	}

	#[test]
	fn t_reader_lines() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let mut reader = micro_reader(dir.path());

		assert_eq!(
			reader.read_line(0, 2).expect("Line read failed."),
			line(&[8, 9, 10, 11]),
		);
		assert_eq!(
			reader.read_line(1, 3).expect("Line read failed."),
			line(&[112, 113, 114, 115]),
		);
		assert!(reader.read_line(2, 1).is_err(), "Out-of-range source should fail.");
	}

	#[test]
	fn t_reader_margins() {
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let mut reader = micro_reader(dir.path());
		let streams = micro_streams();

		assert_eq!(
			reader.read_margin_line(0, true).expect("Margin read failed."),
			streams.heads[0],
		);
		assert_eq!(
			reader.read_margin_line(0, false).expect("Margin read failed."),
			streams.tails[0],
		);
		assert_eq!(
			reader.read_margin_line(1, true).expect("Margin read failed."),
			streams.heads[1],
		);
		assert_eq!(
			reader.read_margin_line(1, false).expect("Margin read failed."),
			streams.tails[1],
		);
	}

	#[test]
	fn t_reader_short() {
		// A file that ends mid-block.
		let dir = tempfile::tempdir().expect("Failed to create temp dir.");
		let path = dir.path().join("short.sub");
		std::fs::write(&path, vec![0_u8; 4100]).expect("Failed to write stub.");
		let file = File::open(path).expect("Failed to open stub.");
		let mut reader = SubfileReader::new(file, micro_meta());

		assert!(
			matches!(
				reader.read_block(1),
				Err(SubtoolError::ShortRead(_, 16, _))
			),
			"A truncated block must be a short read."
		);
	}
}
