//! framecull command line
//!
//! Extracts visually distinct frames from animated images and videos.
//!
//!   framecull clip.webm dance.gif -o dataset/ --cutoff 6
//!
//! ## Config file
//!
//! `--config` takes a JSON file with the same shape as the library's job
//! settings. Flags given on the command line win over the file.
//!
//! ```json
//! {
//!   "hash": { "hash_size": 8, "cutoff": 5 },
//!   "decoder": { "program": "/usr/bin/ffmpeg", "timeout_seconds": 600 }
//! }
//! ```
//!
//! Log verbosity follows `RUST_LOG` when set, otherwise `info` (`debug` with
//! `--verbose`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use framecull::{
	check_decoder, extract, DecoderConfig, ExtractionJob, ExtractionOutcome, HashConfig, SourceKind,
};

#[derive(Debug, Parser)]
#[command(name = "framecull", version, about = "Keep only the visually distinct frames of a GIF, APNG, WebP or video")]
struct Args {
	/// Animated images or videos to process, in order
	#[arg(required = true)]
	inputs: Vec<PathBuf>,

	/// Directory accepted frames are written to
	#[arg(short, long)]
	output: PathBuf,

	/// Fingerprint side length (N×N bits)
	#[arg(long)]
	hash_size: Option<u32>,

	/// Frames closer than this many bits to a kept frame are dropped
	#[arg(long)]
	cutoff: Option<u32>,

	/// FFmpeg executable used for video inputs
	#[arg(long)]
	ffmpeg: Option<PathBuf>,

	/// Kill FFmpeg after this many seconds
	#[arg(long)]
	timeout: Option<u64>,

	/// JSON settings file
	#[arg(long)]
	config: Option<PathBuf>,

	/// Print one JSON outcome per input instead of a summary line
	#[arg(long)]
	json: bool,

	/// Debug logging
	#[arg(short, long)]
	verbose: bool,
}

/// Settings read from `--config`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
	hash: HashConfig,
	decoder: DecoderConfig,
}

impl FileConfig {
	fn load(path: &Path) -> anyhow::Result<Self> {
		let text = std::fs::read_to_string(path)
			.with_context(|| format!("reading config {}", path.display()))?;
		serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
	}
}

/// Merge the config file (if any) with command-line overrides.
fn resolve_settings(args: &Args, file: FileConfig) -> (HashConfig, DecoderConfig) {
	let FileConfig {
		mut hash,
		mut decoder,
	} = file;

	if let Some(hash_size) = args.hash_size {
		hash.hash_size = hash_size;
	}
	if let Some(cutoff) = args.cutoff {
		hash.cutoff = cutoff;
	}
	if let Some(program) = &args.ffmpeg {
		decoder.program.clone_from(program);
	}
	if args.timeout.is_some() {
		decoder.timeout_seconds = args.timeout;
	}

	(hash, decoder)
}

fn init_tracing(verbose: bool) {
	let level = if verbose { "debug" } else { "info" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

fn report(outcome: &ExtractionOutcome, json: bool) -> anyhow::Result<()> {
	if json {
		println!("{}", serde_json::to_string(outcome)?);
	} else {
		println!(
			"{}: kept {} of {} frames ({} ms)",
			outcome.source.display(),
			outcome.frames_accepted,
			outcome.frames_considered,
			outcome.elapsed_ms
		);
	}
	Ok(())
}

fn is_video(input: &Path) -> bool {
	SourceKind::from_path(input).is_ok_and(|kind| kind.is_video())
}

fn print_install_hint() {
	eprintln!("hint: install FFmpeg (https://ffmpeg.org/download.html) or pass --ffmpeg <PATH>");
}

/// Probe the decoder once if any input needs it.
fn decoder_ready(inputs: &[PathBuf], decoder: &DecoderConfig) -> bool {
	if !inputs.iter().any(|input| is_video(input)) {
		return true;
	}
	match check_decoder(decoder) {
		Ok(()) => true,
		Err(e) => {
			error!("{e}");
			print_install_hint();
			false
		}
	}
}

fn run(args: &Args) -> anyhow::Result<usize> {
	let file = match &args.config {
		Some(path) => FileConfig::load(path)?,
		None => FileConfig::default(),
	};
	let (hash, decoder) = resolve_settings(args, file);
	let can_decode_video = decoder_ready(&args.inputs, &decoder);

	let mut failures = 0;
	for input in &args.inputs {
		if !can_decode_video && is_video(input) {
			warn!(input = %input.display(), "Skipping video, no decoder available");
			failures += 1;
			continue;
		}

		let job = ExtractionJob::builder()
			.source(input.as_path())
			.output_dir(args.output.as_path())
			.hash(hash)
			.decoder(decoder.clone())
			.build();

		match extract(&job) {
			Ok(outcome) => {
				if outcome.scratch_cleanup_failures > 0 {
					warn!(
						input = %input.display(),
						count = outcome.scratch_cleanup_failures,
						"Some scratch files could not be removed"
					);
				}
				report(&outcome, args.json)?;
			}
			Err(e) if e.is_missing_dependency() => {
				error!(input = %input.display(), "{e}");
				print_install_hint();
				failures += 1;
			}
			Err(e) => {
				error!(input = %input.display(), "{e}");
				failures += 1;
			}
		}
	}

	info!(
		total = args.inputs.len(),
		failed = failures,
		"All inputs processed"
	);
	Ok(failures)
}

fn main() -> ExitCode {
	let args = Args::parse();
	init_tracing(args.verbose);

	match run(&args) {
		Ok(0) => ExitCode::SUCCESS,
		Ok(_) => ExitCode::FAILURE,
		Err(e) => {
			error!("{e:#}");
			ExitCode::FAILURE
		}
	}
}
