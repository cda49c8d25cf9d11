//! Difference hashing (dHash).
//!
//! A difference hash captures the coarse gradient structure of an image. It is
//! robust to re-encoding and rescaling, which makes it a good fit for spotting
//! near-identical frames.
//!
//! ## Algorithm
//!
//! 1. Convert the frame to 8-bit grayscale
//! 2. Downscale to (N+1)×N samples
//! 3. For each row, emit one bit per adjacent pair: 1 if left ≥ right
//! 4. Concatenate rows, top to bottom, into an N×N-bit fingerprint

use std::fmt;

use image::imageops::{self, FilterType};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{ExtractError, Result};

/// Default hash size (8×8 = 64-bit fingerprints).
pub const DEFAULT_HASH_SIZE: u32 = 8;

/// Largest accepted hash size (64×64 = 4096-bit fingerprints).
pub const MAX_HASH_SIZE: u32 = 64;

/// Default Hamming distance cutoff; frames closer than this are duplicates.
pub const DEFAULT_CUTOFF: u32 = 5;

// ============================================================================
// Configuration
// ============================================================================

/// Hashing and similarity parameters for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
	/// Side length N of the N×N-bit fingerprint
	pub hash_size: u32,

	/// Exclusive Hamming distance below which two frames are duplicates
	pub cutoff: u32,
}

impl HashConfig {
	/// Check that the hash size is within `1..=MAX_HASH_SIZE`.
	///
	/// # Errors
	///
	/// Returns [`ExtractError::InvalidConfig`] otherwise.
	pub fn validate(&self) -> Result<()> {
		check_hash_size(self.hash_size)
	}
}

impl Default for HashConfig {
	fn default() -> Self {
		Self {
			hash_size: DEFAULT_HASH_SIZE,
			cutoff: DEFAULT_CUTOFF,
		}
	}
}

fn check_hash_size(hash_size: u32) -> Result<()> {
	if (1..=MAX_HASH_SIZE).contains(&hash_size) {
		Ok(())
	} else {
		Err(ExtractError::InvalidConfig(format!(
			"hash size must be between 1 and {MAX_HASH_SIZE}, got {hash_size}"
		)))
	}
}

// ============================================================================
// Fingerprint
// ============================================================================

/// A fixed-length perceptual fingerprint.
///
/// Bits are packed row-major, most significant bit first, so a 64-bit
/// fingerprint reads naturally as a big-endian `u64`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
	bits: usize,
	bytes: SmallVec<[u8; 8]>,
}

impl Fingerprint {
	/// Build a fingerprint from row-major bits.
	pub fn from_bits(bits: impl IntoIterator<Item = bool>) -> Self {
		let mut bytes = SmallVec::new();
		let mut len = 0;

		for bit in bits {
			if len % 8 == 0 {
				bytes.push(0);
			}
			if bit {
				if let Some(last) = bytes.last_mut() {
					*last |= 0x80 >> (len % 8);
				}
			}
			len += 1;
		}

		Self { bits: len, bytes }
	}

	/// Build a 64-bit fingerprint from its big-endian integer form.
	#[must_use]
	pub fn from_u64(value: u64) -> Self {
		Self {
			bits: 64,
			bytes: SmallVec::from_slice(&value.to_be_bytes()),
		}
	}

	/// The 64-bit integer form, if this is a 64-bit fingerprint.
	#[must_use]
	pub fn to_u64(&self) -> Option<u64> {
		let bytes: [u8; 8] = self.bytes.as_slice().try_into().ok()?;
		(self.bits == 64).then(|| u64::from_be_bytes(bytes))
	}

	/// Number of bits in the fingerprint.
	#[inline]
	#[must_use]
	pub const fn len(&self) -> usize {
		self.bits
	}

	/// True for the degenerate zero-length fingerprint.
	#[inline]
	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.bits == 0
	}

	/// Raw packed bytes.
	#[must_use]
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Hex encoding of the packed bytes (for logging and storage).
	#[must_use]
	pub fn to_hex(&self) -> String {
		self.bytes.iter().map(|b| format!("{b:02x}")).collect()
	}

	/// Compute Hamming distance to another fingerprint.
	///
	/// Fingerprints of different lengths compare as if the shorter were zero-padded.
	#[must_use]
	pub fn distance(&self, other: &Self) -> u32 {
		let (short, long) = if self.bytes.len() <= other.bytes.len() {
			(&self.bytes, &other.bytes)
		} else {
			(&other.bytes, &self.bytes)
		};
		let tail: u32 = long[short.len()..].iter().map(|b| b.count_ones()).sum();
		hamming_distance(short, long) + tail
	}
}

impl fmt::Debug for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Fingerprint({}b {})", self.bits, self.to_hex())
	}
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

/// Compute Hamming distance between two byte arrays.
///
/// Compares up to the shorter length.
#[must_use]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
	a.iter()
		.zip(b.iter())
		.map(|(x, y)| (x ^ y).count_ones())
		.sum()
}

// ============================================================================
// Hasher
// ============================================================================

/// Computes N×N-bit difference hashes.
#[derive(Debug, Clone, Copy)]
pub struct DifferenceHasher {
	hash_size: u32,
}

impl DifferenceHasher {
	/// Create a hasher producing `hash_size`×`hash_size`-bit fingerprints.
	///
	/// # Errors
	///
	/// Returns [`ExtractError::InvalidConfig`] if `hash_size` is zero or above
	/// [`MAX_HASH_SIZE`].
	pub fn new(hash_size: u32) -> Result<Self> {
		check_hash_size(hash_size)?;
		Ok(Self { hash_size })
	}

	/// Side length N of the fingerprints this hasher produces.
	#[must_use]
	pub const fn hash_size(&self) -> u32 {
		self.hash_size
	}

	/// Fingerprint one decoded frame.
	#[must_use]
	pub fn hash(&self, image: &DynamicImage) -> Fingerprint {
		let n = self.hash_size;
		let gray = image.to_luma8();
		let small = imageops::resize(&gray, n + 1, n, FilterType::Lanczos3);

		Fingerprint::from_bits((0..n).flat_map(|y| {
			let small = &small;
			(0..n).map(move |x| small.get_pixel(x, y).0[0] >= small.get_pixel(x + 1, y).0[0])
		}))
	}
}

impl Default for DifferenceHasher {
	fn default() -> Self {
		Self {
			hash_size: DEFAULT_HASH_SIZE,
		}
	}
}

// ============================================================================
// Tests
// ============================================================================
