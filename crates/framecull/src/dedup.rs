//! Near-duplicate rejection against the full history of accepted frames.
//!
//! Unlike consecutive-frame scene detection, every new frame is compared with
//! *every* frame kept so far, so a shot that returns after a cut is still
//! recognised as a duplicate. The first occurrence always wins.

use image::DynamicImage;
use tracing::debug;

use crate::error::Result;
use crate::hash::{DifferenceHasher, Fingerprint, HashConfig};

/// Outcome of considering one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
	/// Novel frame; its fingerprint joined the accepted set.
	Accepted {
		/// Position in the accepted set (dense, 0-based)
		slot: usize,
	},
	/// Closer than the cutoff to an earlier accepted frame.
	Rejected {
		/// Slot of the closest accepted frame
		nearest: usize,
		/// Hamming distance to it
		distance: u32,
	},
}

impl Decision {
	/// Whether the frame was kept.
	#[inline]
	#[must_use]
	pub const fn is_accepted(&self) -> bool {
		matches!(self, Self::Accepted { .. })
	}
}

/// Per-job deduplication state.
///
/// Owns the accepted fingerprints for exactly one extraction run.
#[derive(Debug)]
pub struct Deduplicator {
	hasher: DifferenceHasher,
	cutoff: u32,
	accepted: Vec<Fingerprint>,
}

impl Deduplicator {
	/// Create an engine with an empty accepted set.
	///
	/// # Errors
	///
	/// Returns [`crate::ExtractError::InvalidConfig`] if the hash size is zero.
	pub fn new(config: HashConfig) -> Result<Self> {
		Ok(Self {
			hasher: DifferenceHasher::new(config.hash_size)?,
			cutoff: config.cutoff,
			accepted: Vec::new(),
		})
	}

	/// Fingerprint `image` and decide whether to keep it.
	pub fn consider(&mut self, image: &DynamicImage) -> Decision {
		let fingerprint = self.hasher.hash(image);
		self.consider_fingerprint(fingerprint)
	}

	/// Decide on an already computed fingerprint.
	///
	/// A distance equal to the cutoff is not a match.
	pub fn consider_fingerprint(&mut self, fingerprint: Fingerprint) -> Decision {
		if let Some((nearest, distance)) = self.nearest(&fingerprint) {
			if distance < self.cutoff {
				debug!(nearest, distance, hash = %fingerprint, "Rejected near-duplicate");
				return Decision::Rejected { nearest, distance };
			}
		}

		let slot = self.accepted.len();
		debug!(slot, hash = %fingerprint, "Accepted frame");
		self.accepted.push(fingerprint);
		Decision::Accepted { slot }
	}

	/// Closest accepted fingerprint and its distance.
	///
	/// Ties resolve to the earliest slot.
	#[must_use]
	pub fn nearest(&self, fingerprint: &Fingerprint) -> Option<(usize, u32)> {
		self.accepted
			.iter()
			.enumerate()
			.map(|(slot, kept)| (slot, kept.distance(fingerprint)))
			.min_by_key(|&(slot, distance)| (distance, slot))
	}

	/// Fingerprints accepted so far, in acceptance order.
	#[must_use]
	pub fn accepted(&self) -> &[Fingerprint] {
		&self.accepted
	}

	/// Number of accepted frames.
	#[inline]
	#[must_use]
	pub fn len(&self) -> usize {
		self.accepted.len()
	}

	/// True before anything has been accepted.
	#[inline]
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.accepted.is_empty()
	}

	/// The configured cutoff.
	#[must_use]
	pub const fn cutoff(&self) -> u32 {
		self.cutoff
	}
}
