//! End-to-end extraction tests.
//!
//! Fixtures are synthesised at test time: every frame is a 9×8 gradient whose
//! difference hash is known exactly, so expected accept/reject decisions can be
//! stated in terms of bit distances.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use framecull::scratch::artifact_path;
use framecull::{
	extract, extract_with, DecoderConfig, ExtractError, ExtractionJob, HashConfig, KeyframeDecoder,
	SourceKind,
};
use image::codecs::gif::GifEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, Rgba, RgbaImage};

// ============================================================================
// Fixtures
// ============================================================================

/// A 9×8 frame whose 64-bit dHash is exactly `bits`.
fn frame_with_hash(bits: u64) -> RgbaImage {
	let mut img = RgbaImage::new(9, 8);
	for y in 0..8 {
		let mut value: i32 = 128;
		img.put_pixel(0, y, Rgba([128, 128, 128, 255]));
		for x in 0..8 {
			let bit = (bits >> (63 - (y * 8 + x))) & 1 == 1;
			value += if bit { -12 } else { 12 };
			let v = value as u8;
			img.put_pixel(x + 1, y, Rgba([v, v, v, 255]));
		}
	}
	img
}

fn write_gif(path: &Path, hashes: &[u64]) {
	let file = File::create(path).unwrap();
	let mut encoder = GifEncoder::new(file);
	encoder
		.encode_frames(
			hashes
				.iter()
				.map(|&h| image::Frame::new(frame_with_hash(h))),
		)
		.unwrap();
}

fn write_apng(path: &Path, hashes: &[u64]) {
	let file = File::create(path).unwrap();
	let mut encoder = png::Encoder::new(BufWriter::new(file), 9, 8);
	encoder.set_color(png::ColorType::Rgba);
	encoder.set_depth(png::BitDepth::Eight);
	encoder
		.set_animated(u32::try_from(hashes.len()).unwrap(), 0)
		.unwrap();

	let mut writer = encoder.write_header().unwrap();
	for &h in hashes {
		writer.write_image_data(frame_with_hash(h).as_raw()).unwrap();
	}
	writer.finish().unwrap();
}

fn push_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], data: &[u8]) {
	out.extend_from_slice(fourcc);
	out.extend_from_slice(&u32::try_from(data.len()).unwrap().to_le_bytes());
	out.extend_from_slice(data);
	if data.len() % 2 == 1 {
		out.push(0);
	}
}

fn le24(value: u32) -> [u8; 3] {
	let [a, b, c, _] = value.to_le_bytes();
	[a, b, c]
}

/// Animated WebP built from lossless still frames: VP8X + ANIM, then one
/// full-canvas ANMF per frame with blending disabled so pixels survive exactly.
fn write_animated_webp(path: &Path, hashes: &[u64]) {
	let (width, height) = (9u32, 8u32);
	let mut body = Vec::new();

	let mut vp8x = vec![0b0001_0010, 0, 0, 0]; // alpha + animation
	vp8x.extend_from_slice(&le24(width - 1));
	vp8x.extend_from_slice(&le24(height - 1));
	push_chunk(&mut body, b"VP8X", &vp8x);
	push_chunk(&mut body, b"ANIM", &[0, 0, 0, 0, 0, 0]);

	for &h in hashes {
		let mut still = Vec::new();
		WebPEncoder::new_lossless(&mut still)
			.encode(frame_with_hash(h).as_raw(), width, height, ExtendedColorType::Rgba8)
			.unwrap();
		// Simple container: "RIFF" size "WEBP", then the whole VP8L chunk.
		assert_eq!(&still[12..16], b"VP8L");

		let mut anmf = Vec::new();
		anmf.extend_from_slice(&le24(0));
		anmf.extend_from_slice(&le24(0));
		anmf.extend_from_slice(&le24(width - 1));
		anmf.extend_from_slice(&le24(height - 1));
		anmf.extend_from_slice(&le24(100));
		anmf.push(0b10); // no blending, no disposal
		anmf.extend_from_slice(&still[12..]);
		push_chunk(&mut body, b"ANMF", &anmf);
	}

	let mut file = b"RIFF".to_vec();
	file.extend_from_slice(&u32::try_from(body.len() + 4).unwrap().to_le_bytes());
	file.extend_from_slice(b"WEBP");
	file.extend_from_slice(&body);
	fs::write(path, file).unwrap();
}

fn written_hashes(outcome: &framecull::ExtractionOutcome) -> Vec<u64> {
	let hasher = framecull::DifferenceHasher::default();
	outcome
		.written
		.iter()
		.map(|p| hasher.hash(&image::open(p).unwrap()).to_u64().unwrap())
		.collect()
}

fn files_in(dir: &Path) -> Vec<String> {
	let mut names: Vec<String> = fs::read_dir(dir)
		.unwrap()
		.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
		.collect();
	names.sort();
	names
}

fn job(source: PathBuf, output_dir: PathBuf) -> ExtractionJob {
	ExtractionJob::builder()
		.source(source)
		.output_dir(output_dir)
		.build()
}

const A: u64 = 0;
const B: u64 = u64::MAX;
const C: u64 = 0x0000_0000_FFFF_FFFF;
const D: u64 = 0xFFFF_FFFF_0000_0000;
const E: u64 = 0x0F0F_0F0F_0F0F_0F0F;

/// Decoder double that writes a fixed list of keyframes (or garbage) into the
/// scratch directory and remembers where it was asked to write.
struct FakeDecoder {
	artifacts: Vec<Option<u64>>,
	scratch_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeDecoder {
	fn new(artifacts: Vec<Option<u64>>) -> Self {
		Self {
			artifacts,
			scratch_dirs: Mutex::new(Vec::new()),
		}
	}

	fn scratch_dir(&self) -> PathBuf {
		self.scratch_dirs.lock().unwrap()[0].clone()
	}
}

impl KeyframeDecoder for FakeDecoder {
	fn decode(&self, _video: &Path, scratch_dir: &Path) -> framecull::Result<()> {
		self.scratch_dirs.lock().unwrap().push(scratch_dir.to_path_buf());
		for (i, artifact) in self.artifacts.iter().enumerate() {
			let path = artifact_path(scratch_dir, i);
			match artifact {
				Some(bits) => frame_with_hash(*bits).save(&path).unwrap(),
				None => fs::write(&path, b"truncated").unwrap(),
			}
		}
		Ok(())
	}
}

struct FailingDecoder;

impl KeyframeDecoder for FailingDecoder {
	fn decode(&self, video: &Path, _scratch_dir: &Path) -> framecull::Result<()> {
		Err(ExtractError::DecoderFailed {
			path: video.to_path_buf(),
			message: "moov atom not found".to_string(),
			exit_code: Some(1),
		})
	}
}

fn fake_video(dir: &Path) -> PathBuf {
	let path = dir.join("clip.webm");
	fs::write(&path, b"not really a video").unwrap();
	path
}

// ============================================================================
// Still images
// ============================================================================

#[test]
fn test_gif_collapses_repeated_frames() {
	let tmp = tempfile::tempdir().unwrap();
	let source = tmp.path().join("dance.gif");
	// Frames 3-7 repeat frame 2; frames 8 and 9 are new.
	write_gif(&source, &[A, B, C, C, C, C, C, C, D, E]);
	let out = tmp.path().join("out");

	let outcome = extract(&job(source, out.clone())).unwrap();

	assert_eq!(outcome.kind, SourceKind::Still(framecull::StillFormat::Gif));
	assert_eq!(outcome.frames_considered, 10);
	assert_eq!(outcome.frames_accepted, 5);
	assert_eq!(
		files_in(&out),
		vec![
			"dance_frame_0.png",
			"dance_frame_1.png",
			"dance_frame_2.png",
			"dance_frame_3.png",
			"dance_frame_4.png",
		]
	);
}

#[test]
fn test_returning_shot_is_still_a_duplicate() {
	let tmp = tempfile::tempdir().unwrap();
	let source = tmp.path().join("loop.gif");
	write_gif(&source, &[A, B, A, C, B]);

	let outcome = extract(&job(source, tmp.path().join("out"))).unwrap();
	assert_eq!(outcome.frames_accepted, 3);
}

#[test]
fn test_accepted_frames_keep_source_pixels_and_order() {
	let tmp = tempfile::tempdir().unwrap();
	let source = tmp.path().join("order.gif");
	write_gif(&source, &[D, D, A, E]);
	let out = tmp.path().join("out");

	let outcome = extract(&job(source, out)).unwrap();

	assert_eq!(written_hashes(&outcome), vec![D, A, E]);
}

#[test]
fn test_apng_frames_are_deduplicated_in_order() {
	let tmp = tempfile::tempdir().unwrap();
	let source = tmp.path().join("spin.png");
	write_apng(&source, &[C, C, A, E, A, D]);
	let out = tmp.path().join("out");

	let outcome = extract(&job(source, out.clone())).unwrap();

	assert_eq!(outcome.kind, SourceKind::Still(framecull::StillFormat::Png));
	assert_eq!(outcome.frames_considered, 6);
	assert_eq!(written_hashes(&outcome), vec![C, A, E, D]);
	assert_eq!(
		files_in(&out),
		vec![
			"spin_frame_0.png",
			"spin_frame_1.png",
			"spin_frame_2.png",
			"spin_frame_3.png",
		]
	);
}

#[test]
fn test_animated_webp_frames_are_deduplicated_in_order() {
	let tmp = tempfile::tempdir().unwrap();
	let source = tmp.path().join("wave.webp");
	write_animated_webp(&source, &[E, B, B, E, C]);
	let out = tmp.path().join("out");

	let outcome = extract(&job(source, out.clone())).unwrap();

	assert_eq!(outcome.kind, SourceKind::Still(framecull::StillFormat::WebP));
	assert_eq!(outcome.frames_considered, 5);
	assert_eq!(written_hashes(&outcome), vec![E, B, C]);
	assert_eq!(
		files_in(&out),
		vec!["wave_frame_0.png", "wave_frame_1.png", "wave_frame_2.png"]
	);
}

#[test]
fn test_single_frame_yields_one_output() {
	let tmp = tempfile::tempdir().unwrap();
	let source = tmp.path().join("still.gif");
	write_gif(&source, &[E]);

	let outcome = extract(&job(source, tmp.path().join("out"))).unwrap();
	assert_eq!(outcome.frames_considered, 1);
	assert_eq!(outcome.frames_accepted, 1);
}

#[test]
fn test_cutoff_boundary_on_real_frames() {
	let tmp = tempfile::tempdir().unwrap();
	let base = 0x00FF_00FF_00FF_00FF;

	let five = tmp.path().join("five.gif");
	write_gif(&five, &[base, base ^ 0b1_1111]);
	let outcome = extract(&job(five, tmp.path().join("five"))).unwrap();
	assert_eq!(outcome.frames_accepted, 2);

	let four = tmp.path().join("four.gif");
	write_gif(&four, &[base, base ^ 0b1111]);
	let outcome = extract(&job(four, tmp.path().join("four"))).unwrap();
	assert_eq!(outcome.frames_accepted, 1);
}

#[test]
fn test_custom_cutoff_is_honoured() {
	let tmp = tempfile::tempdir().unwrap();
	let source = tmp.path().join("loose.gif");
	// A and C differ by 32 bits.
	write_gif(&source, &[A, C]);

	let job = ExtractionJob::builder()
		.source(source)
		.output_dir(tmp.path().join("out"))
		.hash(HashConfig {
			hash_size: 8,
			cutoff: 33,
		})
		.build();

	assert_eq!(extract(&job).unwrap().frames_accepted, 1);
}

#[test]
fn test_corrupt_gif_fails_job() {
	let tmp = tempfile::tempdir().unwrap();
	let source = tmp.path().join("broken.gif");
	fs::write(&source, b"plain text wearing a .gif extension").unwrap();

	let err = extract(&job(source, tmp.path().join("out"))).unwrap_err();
	assert!(matches!(err, ExtractError::SourceUnreadable { .. }));
}

// ============================================================================
// Video
// ============================================================================

#[test]
fn test_video_drains_all_thirteen_artifacts() {
	let tmp = tempfile::tempdir().unwrap();
	let source = fake_video(tmp.path());
	let out = tmp.path().join("out");

	let mut artifacts = vec![Some(A); 13];
	artifacts[4] = Some(B);
	artifacts[9] = Some(E);
	let decoder = FakeDecoder::new(artifacts);

	let outcome = extract_with(&job(source, out.clone()), &decoder).unwrap();

	assert_eq!(outcome.kind, SourceKind::Video);
	assert_eq!(outcome.frames_considered, 13);
	assert_eq!(outcome.frames_accepted, 3);
	assert_eq!(outcome.scratch_cleanup_failures, 0);

	// Scratch lived inside the output directory and is gone afterwards.
	let scratch = decoder.scratch_dir();
	assert_eq!(scratch.parent(), Some(out.as_path()));
	assert!(!scratch.exists());

	assert_eq!(
		files_in(&out),
		vec![
			"clip_key_frame_0.png",
			"clip_key_frame_1.png",
			"clip_key_frame_2.png",
		]
	);
}

#[test]
fn test_corrupt_artifact_aborts_and_cleans_up() {
	let tmp = tempfile::tempdir().unwrap();
	let source = fake_video(tmp.path());
	let out = tmp.path().join("out");
	let decoder = FakeDecoder::new(vec![Some(A), Some(B), None, Some(C)]);

	let err = extract_with(&job(source, out.clone()), &decoder).unwrap_err();

	assert!(matches!(err, ExtractError::ArtifactUnreadable { .. }));
	assert!(!decoder.scratch_dir().exists());
	// Frames accepted before the failure stay on disk.
	assert_eq!(
		files_in(&out),
		vec!["clip_key_frame_0.png", "clip_key_frame_1.png"]
	);
}

#[test]
fn test_decoder_failure_is_propagated() {
	let tmp = tempfile::tempdir().unwrap();
	let source = fake_video(tmp.path());
	let out = tmp.path().join("out");

	let err = extract_with(&job(source, out.clone()), &FailingDecoder).unwrap_err();

	assert!(err.is_decoder_failure());
	assert!(files_in(&out).is_empty());
}

#[test]
fn test_missing_decoder_reports_unavailable() {
	let tmp = tempfile::tempdir().unwrap();
	let source = fake_video(tmp.path());
	let out = tmp.path().join("out");

	let job = ExtractionJob::builder()
		.source(source)
		.output_dir(&out)
		.decoder(DecoderConfig {
			program: PathBuf::from("framecull-no-such-decoder"),
			..DecoderConfig::default()
		})
		.build();

	let err = extract(&job).unwrap_err();

	assert!(matches!(err, ExtractError::DecoderUnavailable { .. }));
	assert!(out.is_dir());
	assert!(files_in(&out).is_empty());
}

#[test]
fn test_parallel_jobs_share_an_output_directory() {
	let tmp = tempfile::tempdir().unwrap();
	let out = tmp.path().join("out");

	let sources: Vec<PathBuf> = ["left", "right"]
		.iter()
		.map(|name| {
			let path = tmp.path().join(format!("{name}.webm"));
			fs::write(&path, b"video").unwrap();
			path
		})
		.collect();

	std::thread::scope(|s| {
		for source in &sources {
			let out = out.clone();
			let _ = s.spawn(move || {
				let decoder = FakeDecoder::new(vec![Some(A), Some(B), Some(A)]);
				let outcome = extract_with(&job(source.clone(), out), &decoder).unwrap();
				assert_eq!(outcome.frames_considered, 3);
				assert_eq!(outcome.frames_accepted, 2);
			});
		}
	});

	assert_eq!(
		files_in(&out),
		vec![
			"left_key_frame_0.png",
			"left_key_frame_1.png",
			"right_key_frame_0.png",
			"right_key_frame_1.png",
		]
	);
}
