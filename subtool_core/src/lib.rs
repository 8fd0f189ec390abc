/*!
# Subtool: Library
*/

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
	unsafe_code,
)]

#![warn(
	clippy::complexity,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::style,

	clippy::allow_attributes,
	clippy::clone_on_ref_ptr,
	clippy::create_dir,
	clippy::filetype_is_file,
	clippy::format_push_string,
	clippy::get_unwrap,
	clippy::impl_trait_in_params,
	clippy::lossy_float_literal,
	clippy::missing_assert_message,
	clippy::missing_docs_in_private_items,
	clippy::needless_raw_strings,
	clippy::panic_in_result_fn,
	clippy::pub_without_shorthand,
	clippy::rest_pat_in_fully_bound_structs,
	clippy::semicolon_inside_block,
	clippy::str_to_string,
	clippy::string_to_string,
	clippy::todo,
	clippy::undocumented_unsafe_blocks,
	clippy::unneeded_field_pattern,
	clippy::unseparated_literal_suffix,
	clippy::unwrap_in_result,

	macro_use_extern_crate,
	missing_copy_implementations,
	missing_docs,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]

mod bake;
mod cache;
mod dt;
mod error;
mod header;
mod meta;
mod reader;
mod remap;
mod repoint;
mod resample;
mod subfile;
mod upgrade;
mod writer;

#[cfg(test)]
pub(crate) mod test_util;

pub use bake::{
	bake,
	BakeOptions,
};
pub use cache::{
	BlockCache,
	CacheStats,
};
pub use dt::{
	DelayTable,
	DelayTableEntry,
	DtHints,
	DtVersion,
};
pub use error::SubtoolError;
pub use header::{
	Header,
	HeaderValue,
};
pub use meta::Metadata;
pub use reader::SubfileReader;
pub use resample::{
	ResampleFn,
	ResampleRule,
};
pub use subfile::Subfile;
pub use upgrade::upgrade;
pub use writer::{
	DataMode,
	OutputDescriptor,
	SectionContent,
	write_subfile,
};



#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
/// # Delay Table Input Format.
pub enum TableFormat {
	#[default]
	/// # Sniff CSV vs binary from the content.
	Auto,

	/// # Comma-separated text.
	Csv,

	/// # On-disk binary rows.
	Bin,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
/// # Output Format.
///
/// How header and delay-table payloads are rendered on request.
pub enum OutputFormat {
	#[default]
	/// # Aligned human-readable table.
	Pretty,

	/// # Comma-separated text.
	Csv,

	/// # Raw on-disk bytes.
	Bin,
}



// Fixed Geometry
// ---------------

/// # Header Section Length (bytes).
///
/// Every subfile starts with exactly this much NUL-padded ASCII.
pub const HEADER_LENGTH: u64 = 4096;

/// # Samples Per UDP Packet.
pub const SAMPLES_PER_PACKET: u64 = 2048;

/// # Margin Packets.
///
/// Packets retained at each end of a sub-observation, beyond the nominal
/// data section.
pub const MARGIN_PACKETS: u64 = 2;

/// # FFTs Per Block.
///
/// The fractional-delay trajectory carries this many entries per data block.
pub const FFT_PER_BLOCK: u64 = 10;

/// # Bytes Per Complex Sample.
///
/// Data and margin streams both store one complex sample as an (i8, i8)
/// pair.
pub const SAMPLE_SIZE: u64 = 2;



// Cache
// ---------------

/// # Default Cache Capacity (bytes).
///
/// Enough to hold a decent run of neighbouring blocks for the streaming
/// transforms.
pub const CACHE_DEFAULT_CAP: usize = 1024 * 1024 * 1024;

/// # Bake Cache Capacity (bytes).
///
/// Bake walks the file in source order rather than block order, so it wants
/// the whole data section resident at once.
pub const CACHE_BAKE_CAP: usize = 6 * 1024 * 1024 * 1024;



// Bake
// ---------------

/// # Default Bake FFT Length (samples).
pub const DEFAULT_FFT_SIZE: usize = 128;

/// # Default Centre Frequency (Hz).
pub const DEFAULT_CENTRE_FREQUENCY: f64 = 157_000_000.0;



// Section Keys
// ---------------

/// # Cache/Read Key: Header.
pub(crate) const KEY_HEADER: &str = "header";

/// # Cache/Read Key: Delay Table.
pub(crate) const KEY_DT: &str = "dt";

/// # Cache/Read Key: Packet Map.
pub(crate) const KEY_UDPMAP: &str = "udpmap";

/// # Cache/Read Key: Margin.
pub(crate) const KEY_MARGIN: &str = "margin";
