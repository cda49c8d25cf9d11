//! Video keyframe extraction using the FFmpeg CLI.
//!
//! FFmpeg runs as a blocking child process that writes one PNG per I-frame
//! into a scratch directory private to the job. The scratch sequence is then
//! drained in order: each artifact is hashed, written out if novel, and
//! deleted whatever the outcome.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::dedup::Deduplicator;
use crate::error::{ExtractError, Result};
use crate::scratch::{output_pattern, ScratchArtifact, ScratchSequence};
use crate::writer::FrameWriter;

/// Scratch directory name prefix inside the output directory.
const SCRATCH_DIR_PREFIX: &str = ".framecull-";

/// How often a timed-out decoder is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the external keyframe decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
	/// FFmpeg executable (looked up on PATH when not absolute)
	pub program: PathBuf,

	/// Kill the decoder after this many seconds (None = wait indefinitely)
	pub timeout_seconds: Option<u64>,

	/// Width keyframes are scaled to
	pub width: u32,

	/// Height keyframes are scaled to
	pub height: u32,
}

impl Default for DecoderConfig {
	fn default() -> Self {
		Self {
			program: PathBuf::from("ffmpeg"),
			timeout_seconds: None,
			width: 320,
			height: 240,
		}
	}
}

// ============================================================================
// Decoder seam
// ============================================================================

/// Something that turns a video into numbered keyframe images.
///
/// Implementations must write `temp_0000.png`, `temp_0001.png`, … densely
/// into `scratch_dir` and return only once they are done.
pub trait KeyframeDecoder {
	/// Decode `video` into `scratch_dir`.
	///
	/// # Errors
	///
	/// [`ExtractError::DecoderUnavailable`] if the tool cannot be started,
	/// [`ExtractError::DecoderFailed`] if it rejects the input.
	fn decode(&self, video: &Path, scratch_dir: &Path) -> Result<()>;
}

/// [`KeyframeDecoder`] backed by the `ffmpeg` binary.
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder {
	config: DecoderConfig,
}

impl FfmpegDecoder {
	/// Create a decoder with the given settings.
	#[must_use]
	pub const fn new(config: DecoderConfig) -> Self {
		Self { config }
	}

	/// Decoder settings.
	#[must_use]
	pub const fn config(&self) -> &DecoderConfig {
		&self.config
	}

	/// Full argument list for decoding `video` into `scratch_dir`.
	#[must_use]
	pub fn args(&self, video: &Path, scratch_dir: &Path) -> Vec<String> {
		vec![
			"-nostdin".to_string(),
			"-y".to_string(),
			"-i".to_string(),
			video.display().to_string(),
			"-vf".to_string(),
			format!(
				"select='eq(pict_type\\,I)',scale={}:{},format=rgb24",
				self.config.width, self.config.height
			),
			"-vsync".to_string(),
			"vfr".to_string(),
			"-start_number".to_string(),
			"0".to_string(),
			output_pattern(scratch_dir).display().to_string(),
		]
	}

	fn spawn(&self, args: &[String]) -> Result<Child> {
		Command::new(&self.config.program)
			.args(args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| match e.kind() {
				std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
					ExtractError::DecoderUnavailable {
						program: self.config.program.clone(),
					}
				}
				_ => ExtractError::IoError(e),
			})
	}

	/// Wait for `child`, honouring the configured timeout.
	fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
		let Some(seconds) = self.config.timeout_seconds else {
			return Ok(child.wait()?);
		};

		let deadline = Instant::now() + Duration::from_secs(seconds);
		loop {
			match child.try_wait() {
				Ok(Some(status)) => return Ok(status),
				Ok(None) => {}
				Err(e) => {
					stop(child);
					return Err(e.into());
				}
			}
			if Instant::now() >= deadline {
				warn!(seconds, "Decoder timed out, killing it");
				stop(child);
				return Err(ExtractError::DecoderTimeout { seconds });
			}
			thread::sleep(POLL_INTERVAL);
		}
	}
}

/// Kill `child` and reap it. Failures are logged only.
fn stop(child: &mut Child) {
	if let Err(e) = child.kill() {
		warn!(error = %e, "Failed to kill decoder");
	}
	if let Err(e) = child.wait() {
		warn!(error = %e, "Failed to reap decoder");
	}
}

impl KeyframeDecoder for FfmpegDecoder {
	#[instrument(skip_all, fields(video = %video.display(), program = %self.config.program.display()))]
	fn decode(&self, video: &Path, scratch_dir: &Path) -> Result<()> {
		let args = self.args(video, scratch_dir);
		debug!(?args, "Running decoder");

		let mut child = self.spawn(&args)?;

		// Drain stderr concurrently so a chatty decoder never stalls on a full pipe.
		let stderr = child.stderr.take().map(|mut pipe| {
			thread::spawn(move || {
				let mut buf = String::new();
				let _ = pipe.read_to_string(&mut buf);
				buf
			})
		});

		let status = self.wait(&mut child)?;
		let diagnostics = stderr
			.and_then(|handle| handle.join().ok())
			.unwrap_or_default();

		if !status.success() {
			return Err(ExtractError::DecoderFailed {
				path: video.to_path_buf(),
				message: last_lines(&diagnostics, 20),
				exit_code: status.code(),
			});
		}

		debug!("Decoder completed");
		Ok(())
	}
}

/// Tail of the decoder's diagnostics; FFmpeg prints its banner first.
fn last_lines(text: &str, n: usize) -> String {
	let lines: Vec<&str> = text.lines().collect();
	let start = lines.len().saturating_sub(n);
	lines[start..].join("\n").trim().to_string()
}

// ============================================================================
// Decoder Detection
// ============================================================================

/// Check if the configured decoder can be started.
///
/// # Errors
///
/// Returns [`ExtractError::DecoderUnavailable`] if `<program> -version` cannot
/// be run or exits unsuccessfully.
#[instrument(skip_all, fields(program = %config.program.display()))]
pub fn check_decoder(config: &DecoderConfig) -> Result<()> {
	let status = Command::new(&config.program)
		.arg("-version")
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.status();

	match status {
		Ok(status) if status.success() => Ok(()),
		_ => Err(ExtractError::DecoderUnavailable {
			program: config.program.clone(),
		}),
	}
}

// ============================================================================
// Extraction
// ============================================================================

/// Counters from draining a scratch sequence.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DrainStats {
	/// Artifacts read
	pub considered: usize,
	/// Artifacts whose deletion failed
	pub cleanup_failures: usize,
}

/// Run `decoder` on `video` and deduplicate its keyframes into `writer`.
///
/// Scratch output goes to a fresh hidden directory inside the writer's
/// directory, so leftovers from other runs can never be mistaken for ours.
#[instrument(skip_all, fields(video = %video.display()))]
pub(crate) fn extract_video(
	video: &Path,
	decoder: &dyn KeyframeDecoder,
	dedup: &mut Deduplicator,
	writer: &mut FrameWriter,
) -> Result<DrainStats> {
	let scratch = tempfile::Builder::new()
		.prefix(SCRATCH_DIR_PREFIX)
		.tempdir_in(writer.dir())
		.map_err(|e| ExtractError::write(writer.dir(), e))?;

	decoder.decode(video, scratch.path())?;

	let stats = drain_scratch(scratch.path(), dedup, writer)?;

	if let Err(e) = scratch.close() {
		warn!(error = %e, "Failed to remove scratch directory");
	}

	info!(
		considered = stats.considered,
		accepted = writer.count(),
		"Extracted unique keyframes from video"
	);
	Ok(stats)
}

/// Consume every artifact in `scratch_dir`, in order.
///
/// Each artifact is deleted before any error it caused is returned; the first
/// error stops the drain.
pub(crate) fn drain_scratch(
	scratch_dir: &Path,
	dedup: &mut Deduplicator,
	writer: &mut FrameWriter,
) -> Result<DrainStats> {
	let mut stats = DrainStats::default();

	for artifact in ScratchSequence::new(scratch_dir) {
		stats.considered += 1;
		let outcome = process_artifact(&artifact, dedup, writer);

		let path = artifact.path().to_path_buf();
		if let Err(e) = artifact.release() {
			warn!(path = %path.display(), error = %e, "Failed to delete scratch artifact");
			stats.cleanup_failures += 1;
		}

		outcome?;
	}

	Ok(stats)
}

fn process_artifact(
	artifact: &ScratchArtifact,
	dedup: &mut Deduplicator,
	writer: &mut FrameWriter,
) -> Result<()> {
	let image = read_artifact(artifact.path())?;
	let decision = dedup.consider(&image);
	debug!(index = artifact.index(), ?decision, "Considered keyframe");

	if decision.is_accepted() {
		let _ = writer.write(&image)?;
	}
	Ok(())
}

fn read_artifact(path: &Path) -> Result<DynamicImage> {
	image::open(path).map_err(|source| ExtractError::ArtifactUnreadable {
		path: path.to_path_buf(),
		source,
	})
}

// ============================================================================
// Tests
// ============================================================================
