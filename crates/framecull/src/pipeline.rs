//! Extraction jobs: routing a source to its pipeline and reporting the outcome.

use std::path::{Path, PathBuf};
use std::time::Instant;

use bon::Builder;
use image::ImageError;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::dedup::Deduplicator;
use crate::error::{ExtractError, Result};
use crate::frame::SourceKind;
use crate::hash::HashConfig;
use crate::still::extract_still;
use crate::video::{extract_video, DecoderConfig, FfmpegDecoder, KeyframeDecoder};
use crate::writer::{FrameNaming, FrameWriter};

// ============================================================================
// Job
// ============================================================================

/// The immutable parameters of one extraction run.
///
/// ```rust
/// use framecull::{ExtractionJob, HashConfig};
///
/// let job = ExtractionJob::builder()
///     .source("clips/dance.gif")
///     .output_dir("dataset/dance")
///     .hash(HashConfig { hash_size: 8, cutoff: 6 })
///     .build();
/// assert_eq!(job.hash.cutoff, 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct ExtractionJob {
	/// Animated image or video to extract from
	#[builder(into)]
	pub source: PathBuf,

	/// Destination for accepted frames (created if missing)
	#[builder(into)]
	pub output_dir: PathBuf,

	/// Hash size and distance cutoff
	#[builder(default)]
	#[serde(default)]
	pub hash: HashConfig,

	/// External decoder settings (video sources only)
	#[builder(default)]
	#[serde(default)]
	pub decoder: DecoderConfig,
}

impl ExtractionJob {
	/// Reject parameters no pipeline can run with.
	///
	/// # Errors
	///
	/// Returns [`ExtractError::InvalidConfig`] for a hash size outside
	/// `1..=MAX_HASH_SIZE` or zero decoder dimensions.
	pub fn validate(&self) -> Result<()> {
		self.hash.validate()?;
		if self.decoder.width == 0 || self.decoder.height == 0 {
			return Err(ExtractError::InvalidConfig(format!(
				"decoder scale {}x{} must be non-zero",
				self.decoder.width, self.decoder.height
			)));
		}
		Ok(())
	}
}

// ============================================================================
// Outcome
// ============================================================================

/// What one successful job produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
	/// Source that was processed
	pub source: PathBuf,

	/// Pipeline that handled it
	pub kind: SourceKind,

	/// Frames (or keyframe artifacts) examined
	pub frames_considered: usize,

	/// Frames kept and written
	pub frames_accepted: usize,

	/// Written files, in acceptance order
	pub written: Vec<PathBuf>,

	/// Scratch artifacts that could not be deleted
	pub scratch_cleanup_failures: usize,

	/// Wall-clock time for the job (ms)
	pub elapsed_ms: u64,
}

// ============================================================================
// Entry points
// ============================================================================

/// Run `job`, using FFmpeg (per `job.decoder`) for video sources.
///
/// # Errors
///
/// Any [`ExtractError`]; see [`extract_with`].
pub fn extract(job: &ExtractionJob) -> Result<ExtractionOutcome> {
	let decoder = FfmpegDecoder::new(job.decoder.clone());
	extract_with(job, &decoder)
}

/// Run `job` with a caller-supplied keyframe decoder for video sources.
///
/// The output directory is created before any frame is decoded, so it exists
/// even when the decoder turns out to be missing.
///
/// # Errors
///
/// - [`ExtractError::UnsupportedFormat`] / [`ExtractError::InvalidConfig`] before any work
/// - [`ExtractError::SourceUnreadable`] if the source is missing or cannot be decoded
/// - [`ExtractError::DecoderUnavailable`], [`ExtractError::DecoderFailed`],
///   [`ExtractError::DecoderTimeout`] from the external decoder
/// - [`ExtractError::ArtifactUnreadable`] / [`ExtractError::WriteFailed`] mid-run
#[instrument(skip_all, fields(source = %job.source.display(), output = %job.output_dir.display()))]
pub fn extract_with(job: &ExtractionJob, decoder: &dyn KeyframeDecoder) -> Result<ExtractionOutcome> {
	let kind = SourceKind::from_path(&job.source)?;
	job.validate()?;
	let mut dedup = Deduplicator::new(job.hash)?;

	ensure_source_exists(&job.source)?;

	let naming = if kind.is_video() {
		FrameNaming::KeyFrame
	} else {
		FrameNaming::Frame
	};
	let mut writer = FrameWriter::create(&job.output_dir, &job.source, naming)?;

	let start = Instant::now();
	let (frames_considered, scratch_cleanup_failures) = match kind {
		SourceKind::Still(format) => (
			extract_still(&job.source, format, &mut dedup, &mut writer)?,
			0,
		),
		SourceKind::Video => {
			let stats = extract_video(&job.source, decoder, &mut dedup, &mut writer)?;
			(stats.considered, stats.cleanup_failures)
		}
	};
	let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

	let written = writer.into_written();
	info!(
		?kind,
		considered = frames_considered,
		accepted = written.len(),
		elapsed_ms,
		"Extraction complete"
	);

	Ok(ExtractionOutcome {
		source: job.source.clone(),
		kind,
		frames_considered,
		frames_accepted: written.len(),
		written,
		scratch_cleanup_failures,
		elapsed_ms,
	})
}

/// Extract with default settings and return the number of frames kept.
///
/// # Errors
///
/// See [`extract_with`].
pub fn extract_keyframes(source: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Result<usize> {
	let job = ExtractionJob::builder()
		.source(source.as_ref())
		.output_dir(output_dir.as_ref())
		.build();
	extract(&job).map(|outcome| outcome.frames_accepted)
}

fn ensure_source_exists(source: &Path) -> Result<()> {
	match std::fs::metadata(source) {
		Ok(meta) if meta.is_file() => Ok(()),
		Ok(_) => Err(ExtractError::SourceUnreadable {
			path: source.to_path_buf(),
			source: ImageError::IoError(std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				"not a regular file",
			)),
		}),
		Err(e) => Err(ExtractError::SourceUnreadable {
			path: source.to_path_buf(),
			source: ImageError::IoError(e),
		}),
	}
}
