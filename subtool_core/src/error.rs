/*!
# Subtool: Errors
*/

use fyi_msg::Msg;
use std::{
	error::Error,
	fmt,
};



#[cfg(feature = "bin")]
/// # Help Text.
const HELP: &str = concat!("\x1b[38;5;199msubtool\x1b[0;38;5;69m v", env!("CARGO_PKG_VERSION"), "\x1b[0m
An inspection and manipulation toolkit for MWA sub-observation files.

USAGE:
    subtool <COMMAND> [OPTIONS] <SUBFILE> [ARGS]

COMMANDS:
    info      Summarize the subfile geometry and identity.
    show      Print the header section.
    get       Print a single header value.
    set       Set a header value in place.
    unset     Remove a header key in place.
    dt        Load and print a delay table (subfile or standalone).
    dump      Dump a section, block, or source line.
    repoint   Rewrite with a new whole-sample delay table applied.
    replace   Rewrite with sample streams remapped between sources.
    resample  Rewrite with a per-sample transform applied.
    bake      FFT-apply the fractional delays in place, then zero them.
    patch     Replace the delay-table section in place.
    upgrade   Migrate a v1 subfile to v2 in place.

TABLE OPTIONS:
    -i, --format-in <auto|csv|bin>
                      Delay-table input format. [default: auto]
    -f, --format-out <pretty|csv|bin>
                      Header/table output format. [default: pretty]
        --num-sources <NUM>
                      Expected delay-table row count, when the source of the
                      table cannot say. [default: auto]
        --num-fracs <NUM>
                      Expected fractional-delay count per row.
                      [default: auto]
        --compare <FILE>
                      (dt) Print the element-wise difference against a second
                      table instead.

TRANSFORM OPTIONS:
    -s, --source <IDS>
                      Restrict to these RF input ids, comma-separated.
                      [default: all]
        --dt <FILE>   (repoint, patch) The replacement delay table.
        --zero        (repoint) Target a zero table instead of --dt.
        --map <A:B,..>
                      (replace) Source B's stream lands in source A's slot.
        --map-all <ID>
                      (replace) Every slot receives this source's stream.
        --scale <S>   (resample) Multiply every complex sample by S.
        --linear <RATE[,INITIAL]>
                      (resample) Linear-interpolate a phase gradient.
        --region <NUM>
                      (resample) Neighbourhood window, in samples.
                      [default: 16]
        --fft-size <NUM>
                      (bake) FFT length in samples. [default: 128]
        --centre-freq <HZ>
                      (bake) Sky frequency at the band centre.
                      [default: 157000000]

DUMP OPTIONS:
        --section <header|dt|udpmap|margin|data>
        --block <NUM>
        --line <SRC>
        --with-margin Stitch the head/tail margin around a dumped line.
    -o, --output <FILE>
                      Write the payload here instead of STDOUT.

MISCELLANEOUS:
        --force       (set) Allow unknown header keys.
                      (repoint) Allow tables that omit subfile sources.
    -h, --help        Print help information to STDOUT and exit.
    -V, --version     Print version information to STDOUT and exit.
");



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Errors.
pub enum SubtoolError {
	/// # Block index out of range.
	BlockIndex(u64, u64),

	/// # Bug!
	Bug(&'static str),

	/// # CSV cell parse failure.
	CsvCell(usize, usize, String),

	/// # CSV row has the wrong number of columns.
	CsvShape(usize, usize, usize),

	/// # Delay table matches both/neither version heuristic.
	DtAmbiguous,

	/// # No (version, rows, fracs) fits the buffer.
	DtStructure,

	/// # Tables have incompatible shapes or orderings.
	DtShape,

	/// # Caller-specified count disagrees with the detected value.
	CountMismatch(&'static str, u64, u64),

	/// # Derived geometry did not divide exactly.
	Geometry(&'static str),

	/// # Unknown header key.
	HeaderKey(String),

	/// # Header value failed numeric coercion.
	HeaderValue(String, String),

	/// # Header line missing its value.
	HeaderParse(usize),

	/// # Header section is not ASCII text.
	HeaderEncoding,

	/// # Header is missing a required key.
	HeaderMissing(&'static str),

	/// # Serialised header exceeds the section length.
	HeaderOverflow,

	/// # A required shift exceeds the margin budget.
	MarginBudget(u16, i64),

	/// # Referenced section is not present.
	MissingSection(&'static str),

	/// # Noop.
	Noop,

	/// # Unable to open a file.
	Open(String),

	/// # Unable to create a file.
	Create(String),

	/// # Unable to read from a file.
	Read(String),

	/// # Fewer bytes than requested.
	ShortRead(String, usize, usize),

	/// # Source index out of range.
	SourceIndex(u64, u64),

	/// # Referenced source id is not in the delay table.
	UnknownSource(u16),

	/// # Invalid sub-format version.
	Version(u64),

	/// # Unable to write to a file.
	Write(String),

	#[cfg(feature = "bin")]
	/// # Invalid CLI arg.
	CliArg(String),

	#[cfg(feature = "bin")]
	/// # CLI parsing failure.
	CliParse(&'static str),

	#[cfg(feature = "bin")]
	/// # Missing CLI command.
	CliCommand,

	#[cfg(feature = "bin")]
	/// # Print Help (Not an Error).
	PrintHelp,

	#[cfg(feature = "bin")]
	/// # Print Version (Not an Error).
	PrintVersion,
}

impl Error for SubtoolError {}

impl From<SubtoolError> for Msg {
	#[inline]
	fn from(src: SubtoolError) -> Self { Self::error(src.to_string()) }
}

impl fmt::Display for SubtoolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::BlockIndex(n, max) => write!(f, "Block index {n} is outside 0..={max}."),
			Self::Bug(s) => write!(f, "Bug: {s}."),
			Self::CsvCell(row, col, s) => write!(f, "Error parsing CSV at row {row}, col {col}: {s}"),
			Self::CsvShape(row, got, want) => write!(f, "CSV row {row} has {got} columns; expected {want}."),
			Self::DtAmbiguous => f.write_str("Unable to settle the delay-table version; the content is ambiguous."),
			Self::DtStructure => f.write_str("No delay-table structure fits this buffer."),
			Self::DtShape => f.write_str("The delay tables have different shapes or source orderings."),
			Self::CountMismatch(what, want, got) => write!(f, "Expected {want} {what}, found {got}."),
			Self::Geometry(s) => write!(f, "Invalid subfile geometry: {s}."),
			Self::HeaderKey(s) => write!(f, "Unknown header key {s}; use --force to set it anyway."),
			Self::HeaderValue(k, v) => write!(f, "Header key {k} wants a number, not {v:?}."),
			Self::HeaderParse(n) => write!(f, "Header line #{n} is missing its value."),
			Self::HeaderEncoding => f.write_str("The header section is not ASCII text."),
			Self::HeaderMissing(k) => write!(f, "The header is missing required key {k}."),
			Self::HeaderOverflow => f.write_str("The header no longer fits its 4096-byte section."),
			Self::MarginBudget(rf, n) => write!(f, "A shift of {n} samples for source {rf} exceeds the margin budget."),
			Self::MissingSection(s) => write!(f, "This subfile has no {s} section."),
			Self::Noop => f.write_str("There's nothing to do!"),
			Self::Open(s) => write!(f, "Unable to open {s}."),
			Self::Create(s) => write!(f, "Unable to create {s}."),
			Self::Read(s) => write!(f, "Unable to read from {s}."),
			Self::ShortRead(key, want, got) => write!(f, "Short read for {key}: wanted {want} bytes, got {got}."),
			Self::SourceIndex(n, max) => write!(f, "Source index {n} is outside 0..{max}."),
			Self::UnknownSource(rf) => write!(f, "Source {rf} is not in the delay table."),
			Self::Version(v) => write!(f, "Unsupported sub-format version {v}; expected 1 or 2."),
			Self::Write(s) => write!(f, "Unable to write to {s}."),

			#[cfg(feature = "bin")]
			Self::CliArg(s) => write!(f, "Invalid CLI option: {s}"),

			#[cfg(feature = "bin")]
			Self::CliParse(s) => write!(f, "Unable to parse {s}."),

			#[cfg(feature = "bin")]
			Self::CliCommand => f.write_str("Missing command; see subtool --help."),

			#[cfg(feature = "bin")]
			Self::PrintHelp => f.write_str(HELP),

			#[cfg(feature = "bin")]
			Self::PrintVersion => f.write_str(concat!("subtool v", env!("CARGO_PKG_VERSION"))),
		}
	}
}
