//! Numbered scratch artifacts left behind by the external decoder.
//!
//! The decoder writes `temp_0000.png`, `temp_0001.png`, … and reports no count,
//! so the sequence ends at the first index with no file. Each artifact is
//! wrapped in a guard that deletes it on every exit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// File name prefix of decoder output.
pub const SCRATCH_PREFIX: &str = "temp_";

/// Extension of decoder output.
pub const SCRATCH_EXTENSION: &str = "png";

/// Path of the `index`th artifact in `dir`.
#[must_use]
pub fn artifact_path(dir: &Path, index: usize) -> PathBuf {
	dir.join(format!("{SCRATCH_PREFIX}{index:04}.{SCRATCH_EXTENSION}"))
}

/// The decoder's output pattern (`temp_%04d.png`) inside `dir`.
#[must_use]
pub fn output_pattern(dir: &Path) -> PathBuf {
	dir.join(format!("{SCRATCH_PREFIX}%04d.{SCRATCH_EXTENSION}"))
}

// ============================================================================
// Artifact guard
// ============================================================================

/// A scratch file owned by the current job.
///
/// Dropping the guard deletes the file. Call [`ScratchArtifact::release`] to
/// delete it explicitly and observe the result.
#[derive(Debug)]
pub struct ScratchArtifact {
	index: usize,
	path: PathBuf,
	released: bool,
}

impl ScratchArtifact {
	fn new(index: usize, path: PathBuf) -> Self {
		Self {
			index,
			path,
			released: false,
		}
	}

	/// Position in the numbered sequence.
	#[must_use]
	pub const fn index(&self) -> usize {
		self.index
	}

	/// Location on disk.
	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Delete the artifact now.
	///
	/// # Errors
	///
	/// Returns the underlying error if the file exists but cannot be removed.
	/// A file that is already gone counts as released.
	pub fn release(mut self) -> io::Result<()> {
		self.released = true;
		remove_if_present(&self.path)
	}
}

impl Drop for ScratchArtifact {
	fn drop(&mut self) {
		if self.released {
			return;
		}
		if let Err(e) = remove_if_present(&self.path) {
			warn!(path = %self.path.display(), error = %e, "Failed to delete scratch artifact");
		}
	}
}

fn remove_if_present(path: &Path) -> io::Result<()> {
	match fs::remove_file(path) {
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		other => other,
	}
}

// ============================================================================
// Sequence
// ============================================================================

/// Lazily probes `temp_0000`, `temp_0001`, … until an index is missing.
#[derive(Debug)]
pub struct ScratchSequence {
	dir: PathBuf,
	next_index: usize,
	exhausted: bool,
}

impl ScratchSequence {
	/// Start probing at index 0 in `dir`.
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
			next_index: 0,
			exhausted: false,
		}
	}
}

impl Iterator for ScratchSequence {
	type Item = ScratchArtifact;

	fn next(&mut self) -> Option<Self::Item> {
		if self.exhausted {
			return None;
		}

		let path = artifact_path(&self.dir, self.next_index);
		if !path.is_file() {
			self.exhausted = true;
			return None;
		}

		let artifact = ScratchArtifact::new(self.next_index, path);
		self.next_index += 1;
		Some(artifact)
	}
}

impl std::iter::FusedIterator for ScratchSequence {}
