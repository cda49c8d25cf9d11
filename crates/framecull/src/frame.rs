//! Frames and source classification.

use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

/// A decoded frame and its 0-based position within the source.
#[derive(Debug, Clone)]
pub struct Frame {
	/// Position in the source sequence
	pub index: usize,

	/// Decoded pixels
	pub image: DynamicImage,
}

impl Frame {
	/// Wrap a decoded image.
	#[must_use]
	pub const fn new(index: usize, image: DynamicImage) -> Self {
		Self { index, image }
	}
}

/// Still-image containers decoded in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StillFormat {
	/// GIF, usually animated
	Gif,
	/// PNG or APNG
	Png,
	/// WebP, static or animated
	WebP,
	/// JPEG (single frame)
	Jpeg,
	/// BMP (single frame)
	Bmp,
}

/// Which pipeline handles a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
	/// Multi-frame still image, decoded in-process
	Still(StillFormat),
	/// Video, decoded by the external keyframe extractor
	Video,
}

const VIDEO_EXTENSIONS: &[&str] = &[
	"webm", "mp4", "mkv", "mov", "avi", "m4v", "flv", "wmv", "mpg", "mpeg", "ts",
];

impl SourceKind {
	/// Classify a source by its (case-insensitive) extension.
	///
	/// # Errors
	///
	/// Returns [`ExtractError::UnsupportedFormat`] for unknown or missing extensions.
	pub fn from_path(path: &Path) -> Result<Self> {
		let ext = path
			.extension()
			.map(|e| e.to_string_lossy().to_ascii_lowercase())
			.ok_or_else(|| ExtractError::UnsupportedFormat(path.to_path_buf()))?;

		let kind = match ext.as_str() {
			"gif" => Self::Still(StillFormat::Gif),
			"png" | "apng" => Self::Still(StillFormat::Png),
			"webp" => Self::Still(StillFormat::WebP),
			"jpg" | "jpeg" => Self::Still(StillFormat::Jpeg),
			"bmp" => Self::Still(StillFormat::Bmp),
			e if VIDEO_EXTENSIONS.contains(&e) => Self::Video,
			_ => return Err(ExtractError::UnsupportedFormat(path.to_path_buf())),
		};
		Ok(kind)
	}

	/// True for the external-decoder pipeline.
	#[must_use]
	pub const fn is_video(&self) -> bool {
		matches!(self, Self::Video)
	}
}
