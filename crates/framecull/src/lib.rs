//! # framecull
//!
//! Near-duplicate keyframe extraction for dataset curation.
//!
//! Given an animated image or a video, `framecull` writes out the smallest set
//! of visually distinct frames it can find. Each frame is reduced to a
//! difference hash (dHash) and kept only if it is at least `cutoff` bits away
//! from every frame kept before it.
//!
//! ## Pipelines
//!
//! - **Still images** (GIF, APNG, animated WebP) are decoded in-process, one
//!   frame at a time, and written as `<name>_frame_<n>.png`.
//! - **Videos** are handed to FFmpeg, which emits one PNG per I-frame into a
//!   private scratch directory. Each scratch file is hashed, written as
//!   `<name>_key_frame_<n>.png` if novel, and deleted whatever happens.
//!
//! In both cases `n` counts survivors only, so numbering is dense.
//!
//! ## Example
//!
//! ```rust,no_run
//! use framecull::{extract, ExtractError, ExtractionJob};
//!
//! let job = ExtractionJob::builder()
//!     .source("clips/intro.webm")
//!     .output_dir("dataset/intro")
//!     .build();
//!
//! match extract(&job) {
//!     Ok(outcome) => println!("kept {} of {}", outcome.frames_accepted, outcome.frames_considered),
//!     Err(e) if e.is_missing_dependency() => eprintln!("install ffmpeg first: {e}"),
//!     Err(e) => eprintln!("extraction failed: {e}"),
//! }
//! ```
//!
//! Jobs are synchronous and share no state; run independent jobs on separate
//! threads if needed.

pub mod dedup;
pub mod error;
pub mod frame;
pub mod hash;
pub mod pipeline;
pub mod scratch;
pub mod still;
pub mod video;
pub mod writer;

pub use dedup::{Decision, Deduplicator};
pub use error::{ExtractError, Result};
pub use frame::{Frame, SourceKind, StillFormat};
pub use hash::{DifferenceHasher, Fingerprint, HashConfig, DEFAULT_CUTOFF, DEFAULT_HASH_SIZE, MAX_HASH_SIZE};
pub use pipeline::{extract, extract_keyframes, extract_with, ExtractionJob, ExtractionOutcome};
pub use still::StillFrames;
pub use video::{check_decoder, DecoderConfig, FfmpegDecoder, KeyframeDecoder};
pub use writer::{FrameNaming, FrameWriter};
