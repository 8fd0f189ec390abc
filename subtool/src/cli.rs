/*!
# Subtool: CLI
*/

use argyle::Argument;
use dactyl::traits::BytesToUnsigned;
use std::path::PathBuf;
use subtool_core::{
	DEFAULT_CENTRE_FREQUENCY,
	DEFAULT_FFT_SIZE,
	OutputFormat,
	SubtoolError,
	TableFormat,
};



/// # Default Resample Neighbourhood (samples).
const DEFAULT_REGION: usize = 16;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Commands.
pub(super) enum Cmd {
	/// # Summarize.
	Info,

	/// # Print the Header.
	Show,

	/// # One Header Value.
	Get,

	/// # Set a Header Value.
	Set,

	/// # Remove a Header Key.
	Unset,

	/// # Print a Delay Table.
	Dt,

	/// # Dump a Section/Block/Line.
	Dump,

	/// # Apply a New Delay Table.
	Repoint,

	/// # Remap Source Streams.
	Replace,

	/// # Per-Sample Transform.
	Resample,

	/// # FFT-Apply the Fractional Delays.
	Bake,

	/// # Replace the Delay-Table Section.
	Patch,

	/// # v1 to v2 Migration.
	Upgrade,
}

impl Cmd {
	/// # From the First Positional.
	fn from_str(src: &str) -> Result<Self, SubtoolError> {
		match src {
			"info" => Ok(Self::Info),
			"show" => Ok(Self::Show),
			"get" => Ok(Self::Get),
			"set" => Ok(Self::Set),
			"unset" => Ok(Self::Unset),
			"dt" => Ok(Self::Dt),
			"dump" => Ok(Self::Dump),
			"repoint" => Ok(Self::Repoint),
			"replace" => Ok(Self::Replace),
			"resample" => Ok(Self::Resample),
			"bake" => Ok(Self::Bake),
			"patch" => Ok(Self::Patch),
			"upgrade" => Ok(Self::Upgrade),
			_ => Err(SubtoolError::CliArg(src.to_owned())),
		}
	}
}



#[derive(Debug, Clone)]
/// # Parsed Options.
///
/// Everything after the command, flattened; each command picks out the
/// parts it understands.
pub(super) struct Options {
	/// # Delay-Table Input Format.
	pub(super) format_in: TableFormat,

	/// # Output Format.
	pub(super) format_out: OutputFormat,

	/// # Expected Table Rows.
	pub(super) num_sources: Option<usize>,

	/// # Expected Fractional Delays.
	pub(super) num_fracs: Option<usize>,

	/// # Comparison Table Path.
	pub(super) compare: Option<PathBuf>,

	/// # Selected Source Ids.
	pub(super) sources: Option<Vec<u16>>,

	/// # Replacement Delay-Table Path.
	pub(super) dt: Option<PathBuf>,

	/// # Target a Zero Table.
	pub(super) zero: bool,

	/// # Force.
	pub(super) force: bool,

	/// # Remap Donor For All Slots.
	pub(super) map_all: Option<u16>,

	/// # Remap Overrides (slot, donor).
	pub(super) pairs: Vec<(u16, u16)>,

	/// # Resample Scale Factor.
	pub(super) scale: Option<f64>,

	/// # Resample Linear Gradient (rate, initial).
	pub(super) linear: Option<(f64, f64)>,

	/// # Resample Neighbourhood.
	pub(super) region: usize,

	/// # Bake FFT Length.
	pub(super) fft_size: usize,

	/// # Bake Centre Frequency.
	pub(super) centre_frequency: f64,

	/// # Dump Section Name.
	pub(super) section: Option<String>,

	/// # Dump Block Index.
	pub(super) block: Option<u64>,

	/// # Dump Line (source index).
	pub(super) line: Option<u64>,

	/// # Stitch Margins Around a Dumped Line.
	pub(super) with_margin: bool,

	/// # Payload Destination.
	pub(super) output: Option<PathBuf>,

	/// # Chatty Mode.
	pub(super) verbose: bool,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			format_in: TableFormat::Auto,
			format_out: OutputFormat::Pretty,
			num_sources: None,
			num_fracs: None,
			compare: None,
			sources: None,
			dt: None,
			zero: false,
			force: false,
			map_all: None,
			pairs: Vec::new(),
			scale: None,
			linear: None,
			region: DEFAULT_REGION,
			fft_size: DEFAULT_FFT_SIZE,
			centre_frequency: DEFAULT_CENTRE_FREQUENCY,
			section: None,
			block: None,
			line: None,
			with_margin: false,
			output: None,
			verbose: false,
		}
	}
}



/// # Parse Options.
///
/// Returns the command, its positional arguments, and the flattened
/// option set.
pub(super) fn parse() -> Result<(Cmd, Vec<String>, Options), SubtoolError> {
	let args = argyle::args()
		.with_keywords(include!(concat!(env!("OUT_DIR"), "/argyle.rs")));

	let mut opts = Options::default();
	let mut pos: Vec<String> = Vec::new();

	for arg in args {
		match arg {
			Argument::Key("--force") => { opts.force = true; },
			Argument::Key("-h" | "--help") => return Err(SubtoolError::PrintHelp),
			Argument::Key("-v" | "--verbose") => { opts.verbose = true; },
			Argument::Key("-V" | "--version") => return Err(SubtoolError::PrintVersion),
			Argument::Key("--with-margin") => { opts.with_margin = true; },
			Argument::Key("--zero") => { opts.zero = true; },

			Argument::KeyWithValue("--block", s) => {
				opts.block.replace(parse_u64(&s, "--block")?);
			},
			Argument::KeyWithValue("--centre-freq", s) => {
				opts.centre_frequency = parse_f64(&s, "--centre-freq")?;
			},
			Argument::KeyWithValue("--compare", s) => {
				opts.compare.replace(PathBuf::from(s));
			},
			Argument::KeyWithValue("--dt", s) => { opts.dt.replace(PathBuf::from(s)); },
			Argument::KeyWithValue("--fft-size", s) => {
				opts.fft_size = usize::btou(s.trim().as_bytes())
					.ok_or(SubtoolError::CliParse("--fft-size"))?;
			},
			Argument::KeyWithValue("-i" | "--format-in", s) => {
				opts.format_in = match s.trim() {
					"auto" => TableFormat::Auto,
					"csv" => TableFormat::Csv,
					"bin" => TableFormat::Bin,
					_ => return Err(SubtoolError::CliParse("-i/--format-in")),
				};
			},
			Argument::KeyWithValue("-f" | "--format-out", s) => {
				opts.format_out = match s.trim() {
					"pretty" => OutputFormat::Pretty,
					"csv" => OutputFormat::Csv,
					"bin" => OutputFormat::Bin,
					_ => return Err(SubtoolError::CliParse("-f/--format-out")),
				};
			},
			Argument::KeyWithValue("--line", s) => {
				opts.line.replace(parse_u64(&s, "--line")?);
			},
			Argument::KeyWithValue("--linear", s) => {
				opts.linear.replace(parse_linear(&s)?);
			},
			Argument::KeyWithValue("--map", s) => {
				opts.pairs.extend(parse_map(&s)?);
			},
			Argument::KeyWithValue("--map-all", s) => {
				opts.map_all.replace(
					u16::btou(s.trim().as_bytes())
						.ok_or(SubtoolError::CliParse("--map-all"))?
				);
			},
			Argument::KeyWithValue("--num-fracs", s) => {
				opts.num_fracs.replace(
					usize::btou(s.trim().as_bytes())
						.ok_or(SubtoolError::CliParse("--num-fracs"))?
				);
			},
			Argument::KeyWithValue("--num-sources", s) => {
				opts.num_sources.replace(
					usize::btou(s.trim().as_bytes())
						.ok_or(SubtoolError::CliParse("--num-sources"))?
				);
			},
			Argument::KeyWithValue("-o" | "--output", s) => {
				opts.output.replace(PathBuf::from(s));
			},
			Argument::KeyWithValue("--region", s) => {
				opts.region = usize::btou(s.trim().as_bytes())
					.ok_or(SubtoolError::CliParse("--region"))?;
			},
			Argument::KeyWithValue("--scale", s) => {
				opts.scale.replace(parse_f64(&s, "--scale")?);
			},
			Argument::KeyWithValue("--section", s) => {
				opts.section.replace(s.trim().to_owned());
			},
			Argument::KeyWithValue("-s" | "--source", s) => {
				let mut set = opts.sources.take().unwrap_or_default();
				for part in s.split(',') {
					let part = part.trim();
					if part.is_empty() { continue; }
					set.push(
						u16::btou(part.as_bytes())
							.ok_or(SubtoolError::CliParse("-s/--source"))?
					);
				}
				opts.sources.replace(set);
			},

			Argument::Other(s) => { pos.push(s); },
			_ => {},
		}
	}

	if pos.is_empty() { return Err(SubtoolError::CliCommand); }
	let cmd = Cmd::from_str(&pos.remove(0))?;
	Ok((cmd, pos, opts))
}



/// # Parse an Unsigned Number.
fn parse_u64(src: &str, what: &'static str) -> Result<u64, SubtoolError> {
	u64::btou(src.trim().as_bytes()).ok_or(SubtoolError::CliParse(what))
}

/// # Parse a Float.
fn parse_f64(src: &str, what: &'static str) -> Result<f64, SubtoolError> {
	src.trim().parse::<f64>()
		.ok()
		.filter(|f| f.is_finite())
		.ok_or(SubtoolError::CliParse(what))
}

/// # Parse `RATE[,INITIAL]`.
fn parse_linear(src: &str) -> Result<(f64, f64), SubtoolError> {
	match src.split_once(',') {
		Some((rate, initial)) => Ok((
			parse_f64(rate, "--linear")?,
			parse_f64(initial, "--linear")?,
		)),
		None => Ok((parse_f64(src, "--linear")?, 0.0)),
	}
}

/// # Parse `A:B[,C:D…]` Pairs.
fn parse_map(src: &str) -> Result<Vec<(u16, u16)>, SubtoolError> {
	src.split(',')
		.filter(|part| ! part.trim().is_empty())
		.map(|part| {
			let (slot, donor) = part.split_once(':')
				.ok_or(SubtoolError::CliParse("--map"))?;
			let slot = u16::btou(slot.trim().as_bytes())
				.ok_or(SubtoolError::CliParse("--map"))?;
			let donor = u16::btou(donor.trim().as_bytes())
				.ok_or(SubtoolError::CliParse("--map"))?;
			Ok((slot, donor))
		})
		.collect()
}
