/*!
# Subtool
*/

#![forbid(unsafe_code)]

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
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

mod cli;

use cli::{
	Cmd,
	Options,
};
use fyi_msg::{
	Msg,
	Progless,
};
use std::{
	io::Write,
	path::Path,
};
use subtool_core::{
	bake,
	BakeOptions,
	DataMode,
	DelayTable,
	DtHints,
	OutputDescriptor,
	ResampleFn,
	ResampleRule,
	SectionContent,
	Subfile,
	SubtoolError,
	TableFormat,
	upgrade,
	write_subfile,
};



/// # Main.
///
/// This lets us bubble up errors so they can be pretty-printed.
fn main() {
	match _main() {
		Ok(()) => {},
		Err(e @ (SubtoolError::PrintHelp | SubtoolError::PrintVersion)) => {
			println!("{e}");
		},
		Err(e) => {
			Msg::from(e).eprint();
			std::process::exit(1);
		},
	}
}

/// # Actual Main.
fn _main() -> Result<(), SubtoolError> {
	let (cmd, pos, opts) = cli::parse()?;

	match cmd {
		Cmd::Info => {
			let sub = Subfile::open(positional(&pos, 0)?, false)?;
			print!("{sub}");
			if opts.verbose {
				eprintln!("\n{}", sub.reader().cache_stats());
			}
			Ok(())
		},
		Cmd::Show => {
			let sub = Subfile::open(positional(&pos, 0)?, false)?;
			let raw = sub.header().print(opts.format_out)?;
			emit(&raw, opts.output.as_deref())
		},
		Cmd::Get => {
			let sub = Subfile::open(positional(&pos, 0)?, false)?;
			let key = positional(&pos, 1)?;
			let value = sub.header().get(key)
				.ok_or_else(|| SubtoolError::HeaderKey(key.to_owned()))?;
			println!("{value}");
			Ok(())
		},
		Cmd::Set => {
			let mut sub = Subfile::open(positional(&pos, 0)?, true)?;
			sub.header_mut().set(
				positional(&pos, 1)?,
				positional(&pos, 2)?,
				opts.force,
			)?;
			sub.rewrite_header()
		},
		Cmd::Unset => {
			let mut sub = Subfile::open(positional(&pos, 0)?, true)?;
			sub.header_mut().unset(positional(&pos, 1)?)?;
			sub.rewrite_header()
		},
		Cmd::Dt => cmd_dt(&pos, &opts),
		Cmd::Dump => cmd_dump(&pos, &opts),
		Cmd::Repoint => cmd_repoint(&pos, &opts),
		Cmd::Replace => {
			if opts.map_all.is_none() && opts.pairs.is_empty() {
				return Err(SubtoolError::CliParse("--map/--map-all"));
			}
			let mut sub = Subfile::open(positional(&pos, 0)?, false)?;
			let dst = positional(&pos, 1)?;
			let desc = OutputDescriptor {
				data: DataMode::Remap {
					map_all: opts.map_all,
					pairs: opts.pairs.clone(),
				},
				..OutputDescriptor::default()
			};
			write_subfile(&mut sub, dst, &desc, &Progless::default())?;
			Msg::new(("Wrote", 10), dst).eprint();
			Ok(())
		},
		Cmd::Resample => cmd_resample(&pos, &opts),
		Cmd::Bake => {
			let mut sub = Subfile::open(positional(&pos, 0)?, true)?;
			bake(
				&mut sub,
				&BakeOptions {
					sources: opts.sources.clone(),
					fft_size: opts.fft_size,
					centre_frequency: opts.centre_frequency,
				},
				&Progless::default(),
			)?;
			Msg::new(("Baked", 10), &sub.path().to_string_lossy()).eprint();
			Ok(())
		},
		Cmd::Patch => {
			let mut sub = Subfile::open(positional(&pos, 0)?, true)?;
			let src = opts.dt.as_deref().ok_or(SubtoolError::CliParse("--dt"))?;
			let hints = DtHints {
				version: Some(sub.dt().version),
				rows: Some(sub.dt().len()),
				fracs: Some(sub.dt().num_fracs()),
			};
			let table = load_table(src, opts.format_in, hints)?;
			sub.patch_dt(table)
		},
		Cmd::Upgrade => {
			let mut sub = Subfile::open(positional(&pos, 0)?, true)?;
			if upgrade(&mut sub)? {
				Msg::new(("Upgraded", 10), &sub.path().to_string_lossy()).eprint();
			}
			else {
				Msg::warning("This subfile is already version 2.").eprint();
			}
			Ok(())
		},
	}
}



/// # The Dt Command.
///
/// Load a table from a subfile or a standalone file, optionally diff it
/// against a second table, and print.
fn cmd_dt(pos: &[String], opts: &Options) -> Result<(), SubtoolError> {
	let hints = DtHints {
		version: None,
		rows: opts.num_sources,
		fracs: opts.num_fracs,
	};

	let mut table = load_table(Path::new(positional(pos, 0)?), opts.format_in, hints)?;

	if let Some(ids) = &opts.sources {
		table.entries.retain(|e| ids.contains(&e.rf_input));
		if table.is_empty() { return Err(SubtoolError::Noop); }
	}

	if let Some(other) = &opts.compare {
		let mut other = load_table(other, opts.format_in, hints)?;
		if let Some(ids) = &opts.sources {
			other.entries.retain(|e| ids.contains(&e.rf_input));
		}
		table = table.compare(&other)?;
	}

	let raw = table.print(opts.format_out)?;
	emit(&raw, opts.output.as_deref())
}

/// # The Dump Command.
fn cmd_dump(pos: &[String], opts: &Options) -> Result<(), SubtoolError> {
	let mut sub = Subfile::open(positional(pos, 0)?, false)?;

	let raw: Vec<u8> =
		if let Some(name) = &opts.section {
			match name.as_str() {
				"header" => sub.reader_mut().read_section("header")?.to_vec(),
				"dt" => sub.reader_mut().read_section("dt")?.to_vec(),
				"udpmap" => sub.reader_mut().read_section("udpmap")?.to_vec(),
				"margin" => sub.reader_mut().read_section("margin")?.to_vec(),
				"data" => {
					let mut out = Vec::new();
					for block in 1..=sub.meta().blocks_per_sub {
						out.extend_from_slice(&sub.reader_mut().read_block(block)?);
					}
					out
				},
				_ => return Err(SubtoolError::CliParse("--section")),
			}
		}
		else if let Some(src) = opts.line {
			let mut out = Vec::new();
			if opts.with_margin {
				out.extend(sub.reader_mut().read_margin_line(src, true)?);
			}
			match opts.block {
				Some(block) => out.extend(sub.reader_mut().read_line(src, block)?),
				None => for block in 1..=sub.meta().blocks_per_sub {
					out.extend(sub.reader_mut().read_line(src, block)?);
				},
			}
			if opts.with_margin {
				out.extend(sub.reader_mut().read_margin_line(src, false)?);
			}
			out
		}
		else if let Some(block) = opts.block {
			sub.reader_mut().read_block(block)?.to_vec()
		}
		else {
			return Err(SubtoolError::CliParse("--section/--block/--line"));
		};

	emit(&raw, opts.output.as_deref())
}

/// # The Repoint Command.
fn cmd_repoint(pos: &[String], opts: &Options) -> Result<(), SubtoolError> {
	let mut sub = Subfile::open(positional(pos, 0)?, false)?;
	let dst = positional(pos, 1)?;

	let mut to =
		if opts.zero { sub.dt().zeroed() }
		else if let Some(src) = opts.dt.as_deref() {
			let hints = DtHints {
				version: None,
				rows: opts.num_sources,
				fracs: opts.num_fracs,
			};
			load_table(src, opts.format_in, hints)?
		}
		else { return Err(SubtoolError::CliParse("--dt/--zero")); };

	// The output subfile carries the target table, provided it still fits
	// the resident shape; a forced partial table leaves the old section in
	// place.
	to.version = sub.dt().version;
	let meta = *sub.meta();
	let dt_section =
		if to.len() as u64 == meta.num_sources && to.num_fracs() as u64 == meta.num_frac_delays {
			SectionContent::Table(to.clone())
		}
		else { SectionContent::FromSource };

	let desc = OutputDescriptor {
		dt: dt_section,
		data: DataMode::Repoint { to, force: opts.force },
		..OutputDescriptor::default()
	};
	write_subfile(&mut sub, dst, &desc, &Progless::default())?;
	Msg::new(("Wrote", 10), dst).eprint();
	Ok(())
}

/// # The Resample Command.
fn cmd_resample(pos: &[String], opts: &Options) -> Result<(), SubtoolError> {
	let mut sub = Subfile::open(positional(pos, 0)?, false)?;
	let dst = positional(pos, 1)?;

	let mut rules = Vec::new();
	if let Some(s) = opts.scale {
		rules.push(ResampleRule {
			sources: opts.sources.clone(),
			transform: ResampleFn::Scale(s),
		});
	}
	if let Some((rate, initial)) = opts.linear {
		rules.push(ResampleRule {
			sources: opts.sources.clone(),
			transform: ResampleFn::Linear { rate, initial },
		});
	}
	if rules.is_empty() { return Err(SubtoolError::CliParse("--scale/--linear")); }

	let desc = OutputDescriptor {
		data: DataMode::Resample { rules, region: opts.region },
		..OutputDescriptor::default()
	};
	write_subfile(&mut sub, dst, &desc, &Progless::default())?;
	Msg::new(("Wrote", 10), dst).eprint();
	Ok(())
}



/// # Fetch a Positional Argument.
fn positional(pos: &[String], idx: usize) -> Result<&str, SubtoolError> {
	pos.get(idx)
		.map(String::as_str)
		.ok_or(SubtoolError::CliParse("missing argument; see subtool --help"))
}

/// # Load a Delay Table From Disk.
///
/// A subfile hands over its resident table; anything else parses as a
/// standalone table in the requested format.
fn load_table<P>(src: P, format: TableFormat, hints: DtHints)
-> Result<DelayTable, SubtoolError>
where P: AsRef<Path> {
	let src = src.as_ref();
	if let Ok(sub) = Subfile::open(src, false) {
		return Ok(sub.dt().clone());
	}
	let raw = std::fs::read(src)
		.map_err(|_| SubtoolError::Open(src.to_string_lossy().into_owned()))?;
	DelayTable::from_bytes(&raw, format, hints)
}

/// # Emit a Payload.
///
/// Raw bytes to the requested file, or STDOUT.
fn emit(raw: &[u8], output: Option<&Path>) -> Result<(), SubtoolError> {
	match output {
		Some(path) => std::fs::write(path, raw)
			.map_err(|_| SubtoolError::Write(path.to_string_lossy().into_owned())),
		None => {
			let writer = std::io::stdout();
			let mut handle = writer.lock();
			handle.write_all(raw)
				.and_then(|()| handle.flush())
				.map_err(|_| SubtoolError::Write("STDOUT".to_owned()))
		},
	}
}
