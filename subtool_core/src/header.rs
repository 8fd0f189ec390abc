/*!
# Subtool: Header Codec
*/

use ahash::AHashMap;
use crate::{
	HEADER_LENGTH,
	OutputFormat,
	SubtoolError,
};
use std::fmt;
use trimothy::TrimSliceMatches;



/// # Sort Index for Unregistered Keys.
///
/// Unknown keys survive a round trip; they just sort last.
const UNKNOWN_INDEX: u16 = 9999;

/// # Known Header Fields.
///
/// Key, preferred ordering index, and value type. This is the MWAX subfile
/// vocabulary; anything else needs `--force`.
const HEADER_FIELDS: &[(&str, u16, FieldKind)] = &[
	("HDR_SIZE",                  10, FieldKind::Int),
	("POPULATED",                 20, FieldKind::Int),
	("OBS_ID",                    30, FieldKind::Int),
	("SUBOBS_ID",                 40, FieldKind::Int),
	("MODE",                      50, FieldKind::Str),
	("UTC_START",                 60, FieldKind::Str),
	("OBS_OFFSET",                70, FieldKind::Int),
	("NBIT",                      80, FieldKind::Int),
	("NPOL",                      90, FieldKind::Int),
	("NTIMESAMPLES",             100, FieldKind::Int),
	("NINPUTS",                  110, FieldKind::Int),
	("NINPUTS_XGPU",             120, FieldKind::Int),
	("APPLY_PATH_WEIGHTS",       130, FieldKind::Int),
	("APPLY_PATH_DELAYS",        140, FieldKind::Int),
	("APPLY_PATH_PHASE_OFFSETS", 150, FieldKind::Int),
	("APPLY_VIS_WEIGHTS",        160, FieldKind::Int),
	("INT_TIME_MSEC",            170, FieldKind::Int),
	("FSCRUNCH_FACTOR",          180, FieldKind::Int),
	("TRANSFER_SIZE",            190, FieldKind::Int),
	("PROJ_ID",                  200, FieldKind::Str),
	("EXPOSURE_SECS",            210, FieldKind::Int),
	("COARSE_CHANNEL",           220, FieldKind::Int),
	("CORR_COARSE_CHANNEL",      230, FieldKind::Int),
	("SECS_PER_SUBOBS",          240, FieldKind::Int),
	("UNIXTIME",                 250, FieldKind::Int),
	("UNIXTIME_MSEC",            260, FieldKind::Int),
	("FINE_CHAN_WIDTH_HZ",       270, FieldKind::Int),
	("NFINE_CHAN",               280, FieldKind::Int),
	("BANDWIDTH_HZ",             290, FieldKind::Int),
	("SAMPLE_RATE",              300, FieldKind::Int),
	("MC_IP",                    310, FieldKind::Str),
	("MC_PORT",                  320, FieldKind::Int),
	("MC_SRC_IP",                330, FieldKind::Str),
	("MWAX_U2S_VER",             340, FieldKind::Int),
	("IDX_PACKET_MAP",           350, FieldKind::Int),
	("IDX_METAFITS",             360, FieldKind::Int),
	("IDX_DELAY_TABLE",          370, FieldKind::Int),
	("IDX_MARGIN_DATA",          380, FieldKind::Int),
	("MWAX_SUB_VER",             390, FieldKind::Int),
	("FRAC_DELAY_SIZE",          400, FieldKind::Int),
];



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Header Field Type.
enum FieldKind {
	/// # Integer.
	Int,

	/// # Free Text.
	Str,
}

/// # Registry Lookup.
///
/// Return the ordering index and type for a known key.
fn registry(key: &str) -> Option<(u16, FieldKind)> {
	HEADER_FIELDS.iter()
		.find_map(|&(k, idx, kind)| k.eq(key).then_some((idx, kind)))
}



#[derive(Debug, Clone, PartialEq, Eq)]
/// # Header Value.
pub enum HeaderValue {
	/// # Integer.
	Int(i64),

	/// # Free Text.
	Str(String),
}

impl fmt::Display for HeaderValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Int(n) => write!(f, "{n}"),
			Self::Str(s) => f.write_str(s),
		}
	}
}



#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// # Subfile Header.
///
/// The header section is `HEADER_LENGTH` bytes of NUL-padded ASCII, one
/// `KEY VALUE` pair per line. Values are coerced according to
/// `HEADER_FIELDS` on the way in and emitted in registry order on the way
/// out, so a parse/serialise round trip is stable even when the input was
/// shuffled.
pub struct Header {
	/// # Key/Value Pairs.
	fields: AHashMap<String, HeaderValue>,
}

/// # Parsing.
impl Header {
	/// # Parse a Header Section.
	///
	/// Decode ASCII up to the first NUL and coerce each line's value by its
	/// registered type.
	///
	/// ## Errors
	///
	/// This will return an error if the text is not ASCII, a line has no
	/// value, or a registered integer fails to parse.
	pub fn parse(raw: &[u8]) -> Result<Self, SubtoolError> {
		let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
		let text = std::str::from_utf8(&raw[..end])
			.map_err(|_| SubtoolError::HeaderEncoding)?;
		if ! text.is_ascii() { return Err(SubtoolError::HeaderEncoding); }

		let mut fields = AHashMap::new();
		for (lineno, line) in text.split('\n').enumerate() {
			let line = line.trim();
			if line.is_empty() { continue; }

			let (key, value) = line.split_once(' ')
				.map(|(k, v)| (k.trim(), v.trim()))
				.filter(|(k, v)| ! k.is_empty() && ! v.is_empty())
				.ok_or(SubtoolError::HeaderParse(lineno + 1))?;

			fields.insert(key.to_owned(), coerce(key, value)?);
		}

		Ok(Self { fields })
	}
}

/// # Getters.
impl Header {
	#[must_use]
	/// # Fetch a Value.
	pub fn get(&self, key: &str) -> Option<&HeaderValue> { self.fields.get(key) }

	#[must_use]
	/// # Fetch an Integer Value.
	pub fn get_int(&self, key: &str) -> Option<i64> {
		match self.fields.get(key) {
			Some(HeaderValue::Int(n)) => Some(*n),
			_ => None,
		}
	}

	#[must_use]
	/// # Number of Fields.
	pub fn len(&self) -> usize { self.fields.len() }

	#[must_use]
	/// # Is It Empty?
	pub fn is_empty(&self) -> bool { self.fields.is_empty() }

	/// # Fields in Registry Order.
	///
	/// Sorted by registered index, alphabetically among ties; unknown keys
	/// land at the end.
	fn sorted(&self) -> Vec<(&str, &HeaderValue)> {
		let mut out: Vec<(u16, &str, &HeaderValue)> = self.fields.iter()
			.map(|(k, v)| (
				registry(k).map_or(UNKNOWN_INDEX, |(idx, _)| idx),
				k.as_str(),
				v,
			))
			.collect();
		out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
		out.into_iter().map(|(_, k, v)| (k, v)).collect()
	}
}

/// # Setters.
impl Header {
	/// # Set a Value.
	///
	/// Registered keys coerce to their registered type. Unknown keys are
	/// refused unless `force`, in which case they are stored as text.
	///
	/// ## Errors
	///
	/// This will return an error for an unknown key without `force`, or a
	/// value that fails coercion.
	pub fn set(&mut self, key: &str, value: &str, force: bool) -> Result<(), SubtoolError> {
		if registry(key).is_none() && ! force {
			return Err(SubtoolError::HeaderKey(key.to_owned()));
		}
		self.fields.insert(key.to_owned(), coerce(key, value)?);
		Ok(())
	}

	/// # Remove a Key.
	///
	/// ## Errors
	///
	/// This will return an error if the key is not present.
	pub fn unset(&mut self, key: &str) -> Result<(), SubtoolError> {
		self.fields.remove(key)
			.map(|_| ())
			.ok_or_else(|| SubtoolError::HeaderKey(key.to_owned()))
	}
}

/// # Serialisation.
impl Header {
	/// # Serialise.
	///
	/// Emit `KEY VALUE` lines in registry order and NUL-pad the result to
	/// exactly `HEADER_LENGTH` bytes.
	///
	/// ## Errors
	///
	/// This will return an error if the lines no longer fit the section.
	pub fn serialise(&self) -> Result<Vec<u8>, SubtoolError> {
		let mut out = String::new();
		for (k, v) in self.sorted() {
			out.push_str(k);
			out.push(' ');
			out.push_str(&v.to_string());
			out.push('\n');
		}

		let mut out = out.into_bytes();
		if (HEADER_LENGTH as usize) < out.len() { return Err(SubtoolError::HeaderOverflow); }
		out.resize(HEADER_LENGTH as usize, 0);
		Ok(out)
	}

	/// # Print.
	///
	/// Render for human or machine consumption: `Pretty` packs four fields
	/// per line with fixed paddings, `Csv` emits one `KEY,VALUE` pair per
	/// line, and `Bin` is the raw section.
	///
	/// ## Errors
	///
	/// This will only return an error in `Bin` mode, if serialisation
	/// fails.
	pub fn print(&self, format: OutputFormat) -> Result<Vec<u8>, SubtoolError> {
		match format {
			OutputFormat::Pretty => {
				let mut out = String::new();
				for chunk in self.sorted().chunks(4) {
					let mut line = String::new();
					for (k, v) in chunk {
						line.push_str(&format!("{k:<19} {:<20}", v.to_string()));
					}
					out.push_str(line.trim_end());
					out.push('\n');
				}
				Ok(out.into_bytes())
			},
			OutputFormat::Csv => {
				let mut out = String::new();
				for (k, v) in self.sorted() {
					out.push_str(&format!("{k},{v}\n"));
				}
				Ok(out.into_bytes())
			},
			OutputFormat::Bin => self.serialise(),
		}
	}
}



/// # Coerce a Value.
///
/// Registered integers parse or fail; everything else stays text.
fn coerce(key: &str, value: &str) -> Result<HeaderValue, SubtoolError> {
	match registry(key) {
		Some((_, FieldKind::Int)) => value.parse::<i64>()
			.map(HeaderValue::Int)
			.map_err(|_| SubtoolError::HeaderValue(key.to_owned(), value.to_owned())),
		_ => Ok(HeaderValue::Str(value.to_owned())),
	}
}

/// # Strip Section Padding.
///
/// Return the meaningful (pre-NUL) portion of a header section.
pub(crate) fn strip_padding(raw: &[u8]) -> &[u8] {
	raw.trim_end_matches(|b: u8| b == 0)
}
