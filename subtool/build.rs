/*!
# Subtool: Build
*/

use argyle::KeyWordsBuilder;
use std::path::PathBuf;



/// # Set Up CLI Arguments.
fn main() {
	println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");

	let mut builder = KeyWordsBuilder::default();
	builder.push_keys([
		"--force",
		"-h", "--help",
		"-v", "--verbose",
		"-V", "--version",
		"--with-margin",
		"--zero",
	]);
	builder.push_keys_with_values([
		"--block",
		"--centre-freq",
		"--compare",
		"--dt",
		"--fft-size",
		"-i", "--format-in",
		"-f", "--format-out",
		"--line",
		"--linear",
		"--map",
		"--map-all",
		"--num-fracs",
		"--num-sources",
		"-o", "--output",
		"--region",
		"--scale",
		"--section",
		"-s", "--source",
	]);
	builder.save(out_path("argyle.rs"));
}

/// # Output Path.
///
/// Append the sub-path to OUT_DIR and return it.
fn out_path(stub: &str) -> PathBuf {
	std::fs::canonicalize(std::env::var("OUT_DIR").expect("Missing OUT_DIR."))
		.expect("Missing OUT_DIR.")
		.join(stub)
}
