//! Error types for keyframe extraction.

use std::path::PathBuf;

/// Errors that can occur during an extraction job.
///
/// Every variant aborts the current job. Scratch deletion failures are not
/// errors; they are logged and counted in the outcome.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
	/// The source container could not be opened or decoded.
	#[error("Cannot read source {path}: {source}")]
	SourceUnreadable {
		/// Source file
		path: PathBuf,
		/// Underlying I/O or codec error
		#[source]
		source: image::ImageError,
	},

	/// The source extension maps to neither pipeline.
	#[error("Unsupported source format: {0}")]
	UnsupportedFormat(PathBuf),

	/// The external decoder executable could not be located.
	#[error("Decoder `{}` not found. Please install FFmpeg: https://ffmpeg.org/download.html", .program.display())]
	DecoderUnavailable {
		/// Program that was invoked
		program: PathBuf,
	},

	/// The external decoder ran but reported failure.
	#[error("Decoder failed on {}: {message}", .path.display())]
	DecoderFailed {
		/// Source video
		path: PathBuf,
		/// Diagnostic output from the decoder
		message: String,
		/// Exit code if available
		exit_code: Option<i32>,
	},

	/// The external decoder exceeded its configured time budget and was killed.
	#[error("Decoder timed out after {seconds}s")]
	DecoderTimeout {
		/// Timeout duration in seconds
		seconds: u64,
	},

	/// A scratch artifact produced by the decoder could not be read.
	#[error("Cannot read scratch artifact {path}: {source}")]
	ArtifactUnreadable {
		/// Artifact path
		path: PathBuf,
		/// Underlying I/O or codec error
		#[source]
		source: image::ImageError,
	},

	/// The output directory or an output file could not be written.
	#[error("Cannot write {path}: {source}")]
	WriteFailed {
		/// Destination path
		path: PathBuf,
		/// Underlying I/O or codec error
		#[source]
		source: image::ImageError,
	},

	/// The job parameters are invalid.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),

	/// I/O error outside the categories above (scratch directory setup, process plumbing).
	#[error("I/O error: {0}")]
	IoError(#[from] std::io::Error),
}

impl ExtractError {
	/// Check if this error is due to a missing dependency (the external decoder).
	#[must_use]
	pub const fn is_missing_dependency(&self) -> bool {
		matches!(self, Self::DecoderUnavailable { .. })
	}

	/// Check if the decoder ran and rejected the input (bad video, unsupported codec, timeout).
	#[must_use]
	pub const fn is_decoder_failure(&self) -> bool {
		matches!(self, Self::DecoderFailed { .. } | Self::DecoderTimeout { .. })
	}

	/// Wrap a plain I/O failure as a write error for `path`.
	pub(crate) fn write(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
		Self::WriteFailed {
			path: path.into(),
			source: image::ImageError::IoError(err),
		}
	}
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
