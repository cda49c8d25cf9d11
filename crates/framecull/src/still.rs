//! In-process decoding of multi-frame still images (GIF, APNG, animated WebP).
//!
//! Frames are decoded lazily, one at a time, so memory stays bounded to the
//! current frame no matter how long the animation is.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageError, ImageFormat};
use tracing::{debug, info, instrument};

use crate::dedup::Deduplicator;
use crate::error::{ExtractError, Result};
use crate::frame::{Frame, StillFormat};
use crate::writer::FrameWriter;

enum Stream {
	Animated(image::Frames<'static>),
	Single(Option<DynamicImage>),
}

/// Lazy, single-pass sequence of frames from a still-image container.
pub struct StillFrames {
	path: PathBuf,
	stream: Stream,
	next_index: usize,
}

impl StillFrames {
	/// Open `path` as `format` and prepare to decode its frames.
	///
	/// # Errors
	///
	/// Returns [`ExtractError::SourceUnreadable`] if the file cannot be opened or
	/// its header is not a valid container of that format.
	pub fn open(path: &Path, format: StillFormat) -> Result<Self> {
		let unreadable = |source| ExtractError::SourceUnreadable {
			path: path.to_path_buf(),
			source,
		};

		let file = File::open(path).map_err(|e| unreadable(ImageError::IoError(e)))?;
		let reader = BufReader::new(file);

		let stream = match format {
			StillFormat::Gif => {
				Stream::Animated(GifDecoder::new(reader).map_err(unreadable)?.into_frames())
			}
			StillFormat::Png => {
				let decoder = PngDecoder::new(reader).map_err(unreadable)?;
				if decoder.is_apng().map_err(unreadable)? {
					Stream::Animated(decoder.apng().map_err(unreadable)?.into_frames())
				} else {
					Stream::Single(Some(
						DynamicImage::from_decoder(decoder).map_err(unreadable)?,
					))
				}
			}
			StillFormat::WebP => {
				let decoder = WebPDecoder::new(reader).map_err(unreadable)?;
				if decoder.has_animation() {
					Stream::Animated(decoder.into_frames())
				} else {
					Stream::Single(Some(
						DynamicImage::from_decoder(decoder).map_err(unreadable)?,
					))
				}
			}
			StillFormat::Jpeg => {
				Stream::Single(Some(image::load(reader, ImageFormat::Jpeg).map_err(unreadable)?))
			}
			StillFormat::Bmp => {
				Stream::Single(Some(image::load(reader, ImageFormat::Bmp).map_err(unreadable)?))
			}
		};

		Ok(Self {
			path: path.to_path_buf(),
			stream,
			next_index: 0,
		})
	}
}

impl Iterator for StillFrames {
	type Item = Result<Frame>;

	fn next(&mut self) -> Option<Self::Item> {
		let decoded = match &mut self.stream {
			Stream::Animated(frames) => frames
				.next()?
				.map(|frame| DynamicImage::ImageRgba8(frame.into_buffer())),
			Stream::Single(image) => Ok(image.take()?),
		};

		let index = self.next_index;
		self.next_index += 1;

		Some(
			decoded
				.map(|image| Frame::new(index, image))
				.map_err(|source| ExtractError::SourceUnreadable {
					path: self.path.clone(),
					source,
				}),
		)
	}
}

/// Deduplicate every frame of a still-image container into `writer`.
///
/// Accepted frames are written as soon as they are decided. A decode failure
/// midway aborts the job but leaves already-written frames on disk.
///
/// Returns the number of frames considered.
#[instrument(skip_all, fields(source = %path.display()))]
pub(crate) fn extract_still(
	path: &Path,
	format: StillFormat,
	dedup: &mut Deduplicator,
	writer: &mut FrameWriter,
) -> Result<usize> {
	let mut considered = 0;

	for frame in StillFrames::open(path, format)? {
		let frame = frame?;
		considered += 1;

		let decision = dedup.consider(&frame.image);
		debug!(index = frame.index, ?decision, "Considered frame");
		if decision.is_accepted() {
			let _ = writer.write(&frame.image)?;
		}
	}

	info!(
		considered,
		accepted = writer.count(),
		"Extracted unique frames from still image"
	);
	Ok(considered)
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::codecs::gif::GifEncoder;
	use image::{Rgba, RgbaImage};

	fn solid(value: u8) -> RgbaImage {
		RgbaImage::from_pixel(6, 6, Rgba([value, value, value, 255]))
	}

	fn write_gif(path: &Path, frames: Vec<RgbaImage>) {
		let file = File::create(path).unwrap();
		let mut encoder = GifEncoder::new(file);
		encoder
			.encode_frames(frames.into_iter().map(image::Frame::new))
			.unwrap();
	}

	#[test]
	fn test_gif_frames_are_indexed_in_order() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("three.gif");
		write_gif(&path, vec![solid(0), solid(120), solid(250)]);

		let frames: Vec<Frame> = StillFrames::open(&path, StillFormat::Gif)
			.unwrap()
			.collect::<Result<_>>()
			.unwrap();

		assert_eq!(frames.len(), 3);
		assert_eq!(
			frames.iter().map(|f| f.index).collect::<Vec<_>>(),
			vec![0, 1, 2]
		);
		assert_eq!((frames[0].image.width(), frames[0].image.height()), (6, 6));
	}

	#[test]
	fn test_static_png_is_one_frame() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("still.png");
		solid(77).save(&path).unwrap();

		let frames: Vec<Frame> = StillFrames::open(&path, StillFormat::Png)
			.unwrap()
			.collect::<Result<_>>()
			.unwrap();
		assert_eq!(frames.len(), 1);
		assert_eq!(frames[0].index, 0);
	}

	#[test]
	fn test_missing_file_is_unreadable() {
		let err = StillFrames::open(Path::new("/definitely/not/here.gif"), StillFormat::Gif)
			.err()
			.unwrap();
		assert!(matches!(err, ExtractError::SourceUnreadable { .. }));
	}

	#[test]
	fn test_garbage_is_unreadable() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("fake.gif");
		std::fs::write(&path, b"this is not a gif").unwrap();

		let err = StillFrames::open(&path, StillFormat::Gif).err().unwrap();
		assert!(matches!(err, ExtractError::SourceUnreadable { .. }));
	}
}
