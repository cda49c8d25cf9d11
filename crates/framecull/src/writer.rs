//! Persists accepted frames as PNG files with dense, per-job numbering.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExtractError, Result};

/// Output naming scheme, one per pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameNaming {
	/// `<stem>_frame_<n>.png`, used for animated still images
	Frame,
	/// `<stem>_key_frame_<n>.png`, used for video keyframes
	KeyFrame,
}

impl FrameNaming {
	/// Infix placed between the source stem and the counter.
	#[must_use]
	pub const fn infix(&self) -> &'static str {
		match self {
			Self::Frame => "frame",
			Self::KeyFrame => "key_frame",
		}
	}

	/// File name for the `n`th accepted frame of `stem`.
	#[must_use]
	pub fn file_name(&self, stem: &str, n: usize) -> String {
		format!("{stem}_{}_{n}.png", self.infix())
	}
}

/// Writes accepted frames into one destination directory.
///
/// The counter only advances on a successful write, so survivors are numbered
/// 0, 1, 2, … regardless of how many frames were rejected in between.
#[derive(Debug)]
pub struct FrameWriter {
	dir: PathBuf,
	stem: String,
	naming: FrameNaming,
	written: Vec<PathBuf>,
}

impl FrameWriter {
	/// Create the writer, creating `dir` (and parents) if absent.
	///
	/// # Errors
	///
	/// Returns [`ExtractError::WriteFailed`] if the directory cannot be created.
	pub fn create(dir: impl Into<PathBuf>, source: &Path, naming: FrameNaming) -> Result<Self> {
		let dir = dir.into();
		fs::create_dir_all(&dir).map_err(|e| ExtractError::write(&dir, e))?;

		Ok(Self {
			dir,
			stem: source_stem(source),
			naming,
			written: Vec::new(),
		})
	}

	/// Write `image` as the next numbered frame and return its path.
	///
	/// # Errors
	///
	/// Returns [`ExtractError::WriteFailed`] if encoding or writing fails.
	pub fn write(&mut self, image: &DynamicImage) -> Result<PathBuf> {
		let path = self
			.dir
			.join(self.naming.file_name(&self.stem, self.written.len()));

		image
			.save_with_format(&path, ImageFormat::Png)
			.map_err(|source| ExtractError::WriteFailed {
				path: path.clone(),
				source,
			})?;

		debug!(path = %path.display(), "Wrote frame");
		self.written.push(path.clone());
		Ok(path)
	}

	/// Number of frames written so far.
	#[must_use]
	pub fn count(&self) -> usize {
		self.written.len()
	}

	/// Paths written so far, in order.
	#[must_use]
	pub fn written(&self) -> &[PathBuf] {
		&self.written
	}

	/// Consume the writer, returning the written paths.
	#[must_use]
	pub fn into_written(self) -> Vec<PathBuf> {
		self.written
	}

	/// Destination directory.
	#[must_use]
	pub fn dir(&self) -> &Path {
		&self.dir
	}
}

/// Source file name without its final extension.
fn source_stem(source: &Path) -> String {
	source
		.file_stem()
		.map_or_else(|| "frames".to_string(), |s| s.to_string_lossy().into_owned())
}
