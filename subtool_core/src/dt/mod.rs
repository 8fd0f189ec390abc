/*!
# Subtool: Delay Tables
*/

pub(crate) mod bin;
pub(crate) mod csv;

use crate::{
	OutputFormat,
	SubtoolError,
	TableFormat,
};
use std::fmt;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Delay-Table Version.
///
/// Two incompatible on-disk generations coexist in the wild: v1 keeps
/// integer millisample trajectories, v2 floating-point samples plus the
/// start/middle/end totals.
pub enum DtVersion {
	/// # Version 1 (int16 millisamples).
	V1,

	/// # Version 2 (float32 samples).
	V2,
}

impl DtVersion {
	#[must_use]
	/// # Bytes Per Fractional Delay.
	pub const fn frac_size(self) -> usize {
		match self {
			Self::V1 => 2,
			Self::V2 => 4,
		}
	}

	#[must_use]
	/// # Fixed Bytes Per Row.
	pub const fn entry_min_size(self) -> usize {
		match self {
			Self::V1 => 20,
			Self::V2 => 56,
		}
	}

	#[must_use]
	/// # Largest Plausible Fractional Delay.
	///
	/// Millisamples for v1, samples for v2; either way the telescope never
	/// asks for more than two whole samples of trajectory.
	pub const fn frac_range(self) -> f64 {
		match self {
			Self::V1 => 2000.0,
			Self::V2 => 2.0,
		}
	}

	#[must_use]
	/// # As Number.
	pub const fn as_u8(self) -> u8 {
		match self {
			Self::V1 => 1,
			Self::V2 => 2,
		}
	}

	/// # From Number.
	///
	/// ## Errors
	///
	/// This will return an error for anything but 1 or 2.
	pub const fn from_u8(src: u8) -> Result<Self, SubtoolError> {
		match src {
			1 => Ok(Self::V1),
			2 => Ok(Self::V2),
			other => Err(SubtoolError::Version(other as u64)),
		}
	}
}

impl fmt::Display for DtVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_u8())
	}
}



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Parsing Hints.
///
/// What the caller already knows about a table it is about to load. Loading
/// a subfile's own table pins everything from the metadata; a standalone
/// file usually pins nothing and leaves the detector to earn its keep.
pub struct DtHints {
	/// # Expected Version.
	pub version: Option<DtVersion>,

	/// # Expected Row Count.
	pub rows: Option<usize>,

	/// # Expected Fractional Delays Per Row.
	pub fracs: Option<usize>,
}



#[derive(Debug, Clone, PartialEq)]
/// # One Delay-Table Row.
///
/// In-memory values always use the wider v2 forms; v1 scaling happens at
/// the codec boundary.
pub struct DelayTableEntry {
	/// # RF Input Id.
	pub rf_input: u16,

	/// # Whole-Sample Delay Currently Applied.
	pub ws_delay: i16,

	/// # Delay Polynomial: Constant Term.
	pub initial_delay: f64,

	/// # Delay Polynomial: Linear Term.
	pub delta_delay: f64,

	/// # Delay Polynomial: Quadratic Term.
	pub delta_delta_delay: f64,

	/// # Number of Pointings.
	///
	/// Always one; doubles as an integrity marker for format detection.
	pub num_pointings: u16,

	/// # Total Delay at Sub-observation Start (v2).
	pub start_total_delay: f64,

	/// # Total Delay at Sub-observation Middle (v2).
	pub middle_total_delay: f64,

	/// # Total Delay at Sub-observation End (v2).
	pub end_total_delay: f64,

	/// # Fractional-Delay Trajectory (samples).
	pub frac_delay: Vec<f32>,
}

impl DelayTableEntry {
	#[must_use]
	/// # A Zeroed Row For the Same Source.
	pub fn zeroed(&self) -> Self {
		Self {
			rf_input: self.rf_input,
			ws_delay: 0,
			initial_delay: 0.0,
			delta_delay: 0.0,
			delta_delta_delay: 0.0,
			num_pointings: 1,
			start_total_delay: 0.0,
			middle_total_delay: 0.0,
			end_total_delay: 0.0,
			frac_delay: vec![0.0; self.frac_delay.len()],
		}
	}
}



#[derive(Debug, Clone, PartialEq)]
/// # A Delay Table.
///
/// One row per source, in subfile source order.
pub struct DelayTable {
	/// # On-disk Version.
	pub version: DtVersion,

	/// # Rows.
	pub entries: Vec<DelayTableEntry>,
}

/// # Loading.
impl DelayTable {
	/// # Load From Bytes.
	///
	/// Dispatch on the requested format; `Auto` sniffs text from binary
	/// first.
	///
	/// ## Errors
	///
	/// This will pass through any codec error, or complain if the content
	/// contradicts the hints.
	pub fn from_bytes(raw: &[u8], format: TableFormat, hints: DtHints)
	-> Result<Self, SubtoolError> {
		match format {
			TableFormat::Auto =>
				if looks_textual(raw) { csv::parse(raw, hints) }
				else { bin::parse(raw, hints) },
			TableFormat::Csv => csv::parse(raw, hints),
			TableFormat::Bin => bin::parse(raw, hints),
		}
	}
}

/// # Getters.
impl DelayTable {
	#[must_use]
	/// # Number of Rows.
	pub fn len(&self) -> usize { self.entries.len() }

	#[must_use]
	/// # Is It Empty?
	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	#[must_use]
	/// # Fractional Delays Per Row.
	pub fn num_fracs(&self) -> usize {
		self.entries.first().map_or(0, |e| e.frac_delay.len())
	}

	#[must_use]
	/// # Find a Row by Source Id.
	pub fn entry(&self, rf_input: u16) -> Option<&DelayTableEntry> {
		self.entries.iter().find(|e| e.rf_input == rf_input)
	}

	#[must_use]
	/// # Find a Row Index by Source Id.
	pub fn position(&self, rf_input: u16) -> Option<usize> {
		self.entries.iter().position(|e| e.rf_input == rf_input)
	}
}

/// # Transformations.
impl DelayTable {
	#[must_use]
	/// # A Zero Table of the Same Shape.
	pub fn zeroed(&self) -> Self {
		Self {
			version: self.version,
			entries: self.entries.iter().map(DelayTableEntry::zeroed).collect(),
		}
	}

	/// # Element-wise Difference (`to − self`).
	///
	/// The result's `num_pointings` is pinned to one so the output remains
	/// digestible by the format detector.
	///
	/// ## Errors
	///
	/// This will return an error if the tables have different shapes or
	/// source orderings.
	pub fn compare(&self, to: &Self) -> Result<Self, SubtoolError> {
		if self.len() != to.len() || self.num_fracs() != to.num_fracs() {
			return Err(SubtoolError::DtShape);
		}

		let entries = self.entries.iter().zip(to.entries.iter())
			.map(|(a, b)| {
				if a.rf_input != b.rf_input { return Err(SubtoolError::DtShape); }
				Ok(DelayTableEntry {
					rf_input: a.rf_input,
					ws_delay: b.ws_delay - a.ws_delay,
					initial_delay: b.initial_delay - a.initial_delay,
					delta_delay: b.delta_delay - a.delta_delay,
					delta_delta_delay: b.delta_delta_delay - a.delta_delta_delay,
					num_pointings: 1,
					start_total_delay: b.start_total_delay - a.start_total_delay,
					middle_total_delay: b.middle_total_delay - a.middle_total_delay,
					end_total_delay: b.end_total_delay - a.end_total_delay,
					frac_delay: a.frac_delay.iter().zip(b.frac_delay.iter())
						.map(|(x, y)| y - x)
						.collect(),
				})
			})
			.collect::<Result<Vec<_>, SubtoolError>>()?;

		Ok(Self { version: to.version, entries })
	}
}

/// # Serialisation.
impl DelayTable {
	#[must_use]
	/// # To On-disk Bytes.
	pub fn to_bin(&self) -> Vec<u8> { bin::serialise(self) }

	#[must_use]
	/// # To CSV.
	pub fn to_csv(&self) -> String { csv::serialise(self) }

	#[must_use]
	/// # Pretty Table.
	pub fn pretty(&self) -> String {
		let mut out = String::new();
		match self.version {
			DtVersion::V1 => {
				out.push_str("    RF      WS       INITIAL         DELTA   DELTA-DELTA  FRAC (msamp)\n");
				for e in &self.entries {
					out.push_str(&format!(
						"{:>6}  {:>6}  {:>12}  {:>12}  {:>12}  ",
						e.rf_input, e.ws_delay,
						e.initial_delay as i64, e.delta_delay as i64, e.delta_delta_delay as i64,
					));
					let fracs: Vec<String> = e.frac_delay.iter()
						.map(|f| format!("{}", (f64::from(*f) * 1000.0).round() as i64))
						.collect();
					out.push_str(&fracs.join(" "));
					out.push('\n');
				}
			},
			DtVersion::V2 => {
				out.push_str("    RF      WS       INITIAL         DELTA   DELTA-DELTA         START        MIDDLE           END  FRAC (samp)\n");
				for e in &self.entries {
					out.push_str(&format!(
						"{:>6}  {:>6}  {:>12.6}  {:>12.6}  {:>12.6}  {:>12.6}  {:>12.6}  {:>12.6}  ",
						e.rf_input, e.ws_delay,
						e.initial_delay, e.delta_delay, e.delta_delta_delay,
						e.start_total_delay, e.middle_total_delay, e.end_total_delay,
					));
					let fracs: Vec<String> = e.frac_delay.iter()
						.map(|f| format!("{f:.6}"))
						.collect();
					out.push_str(&fracs.join(" "));
					out.push('\n');
				}
			},
		}
		out
	}

	/// # Print.
	///
	/// ## Errors
	///
	/// Present for signature symmetry with the header printer; table
	/// rendering itself cannot fail.
	pub fn print(&self, format: OutputFormat) -> Result<Vec<u8>, SubtoolError> {
		Ok(match format {
			OutputFormat::Pretty => self.pretty().into_bytes(),
			OutputFormat::Csv => self.to_csv().into_bytes(),
			OutputFormat::Bin => self.to_bin(),
		})
	}
}



/// # Does This Smell Like Text?
///
/// CSV tables are pure printable ASCII; binary rows go non-printable within
/// a few bytes (ws_delay's high byte, if nothing sooner).
fn looks_textual(raw: &[u8]) -> bool {
	! raw.is_empty() &&
	raw.iter()
		.take(512)
		.all(|&b| matches!(b, b'\t' | b'\n' | b'\r' | b' '..=b'~'))
}
