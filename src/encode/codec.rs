//! Codec bindings: one quality-parameterized lossy encoder per format.
//!
//! Every binding is a pure function of `(image, quality)`. Effort settings
//! are fixed per binding so that two calls with the same inputs produce the
//! same bytes; the search relies on that.

use std::borrow::Cow;

use clap::ValueEnum;
use image::GrayImage;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{CamError, CamResult};

/// A deterministic, quality-parameterized lossy encoder.
pub trait Codec: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// File extension for stored artifacts, without the dot.
    fn extension(&self) -> &'static str;

    fn mime_type(&self) -> &'static str;

    /// Encode `image` at `quality`.
    ///
    /// # Errors
    ///
    /// Returns `CamError::Encoding` when the codec rejects the input, e.g. a
    /// zero-area image or a quality outside the codec's own range. Callers
    /// clamp quality into their tuning range before calling.
    fn encode(&self, image: &GrayImage, quality: u8) -> CamResult<Vec<u8>>;

    /// Pixel layout the codec consumes, built once per image so repeated
    /// encodes at different qualities skip the conversion.
    fn prepare<'a>(&self, image: &'a GrayImage) -> Cow<'a, [u8]> {
        Cow::Borrowed(image.as_raw())
    }

    /// Encode `image` from a buffer `prepare` built for it.
    fn encode_prepared(&self, image: &GrayImage, _prepared: &[u8], quality: u8) -> CamResult<Vec<u8>> {
        self.encode(image, quality)
    }
}

/// Which codec binding to build from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Webp,
    Jpeg,
}

impl CodecKind {
    /// Instantiate the binding.
    ///
    /// # Errors
    ///
    /// `CamError::Config` when WebP is requested but the `webp` feature is off.
    pub fn build(self) -> CamResult<Box<dyn Codec>> {
        match self {
            #[cfg(feature = "webp")]
            CodecKind::Webp => Ok(Box::new(WebpCodec)),
            #[cfg(not(feature = "webp"))]
            CodecKind::Webp => Err(CamError::config(
                "codec",
                "webp",
                "built without the 'webp' feature",
            )
            .with_recovery_suggestion("Rebuild with --features webp or use --codec jpeg")),
            CodecKind::Jpeg => Ok(Box::new(JpegCodec)),
        }
    }
}

fn check_input(codec: &str, image: &GrayImage, quality: u8) -> CamResult<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(CamError::encoding(
            codec,
            quality,
            format!("zero-area image {}x{}", image.width(), image.height()),
        ));
    }
    if !(1..=100).contains(&quality) {
        return Err(CamError::encoding(codec, quality, "quality must be within 1..=100"));
    }
    Ok(())
}

/// Lossy WebP through libwebp's simple API.
///
/// The simple API uses libwebp's default preset, whose effort (`method`) is
/// 4: markedly faster than 6 for a small size penalty, and constant for the
/// whole process.
#[cfg(feature = "webp")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpCodec;

#[cfg(feature = "webp")]
impl Codec for WebpCodec {
    fn name(&self) -> &'static str {
        "webp"
    }

    fn extension(&self) -> &'static str {
        "webp"
    }

    fn mime_type(&self) -> &'static str {
        "image/webp"
    }

    fn encode(&self, image: &GrayImage, quality: u8) -> CamResult<Vec<u8>> {
        self.encode_prepared(image, &self.prepare(image), quality)
    }

    /// libwebp takes RGB input; gray maps to R=G=B.
    fn prepare<'a>(&self, image: &'a GrayImage) -> Cow<'a, [u8]> {
        Cow::Owned(image.as_raw().iter().flat_map(|&v| [v, v, v]).collect())
    }

    fn encode_prepared(&self, image: &GrayImage, prepared: &[u8], quality: u8) -> CamResult<Vec<u8>> {
        check_input(self.name(), image, quality)?;
        let expected = image.as_raw().len() * 3;
        if prepared.len() != expected {
            return Err(CamError::encoding(
                self.name(),
                quality,
                format!("prepared buffer has {} bytes, expected {}", prepared.len(), expected),
            ));
        }
        let encoder = webp::Encoder::from_rgb(prepared, image.width(), image.height());
        let memory = encoder
            .encode_simple(false, f32::from(quality))
            .map_err(|e| CamError::encoding(self.name(), quality, format!("{:?}", e)))?;
        Ok(memory.to_vec())
    }
}

/// Baseline single-channel JPEG from the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl Codec for JpegCodec {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    fn encode(&self, image: &GrayImage, quality: u8) -> CamResult<Vec<u8>> {
        check_input(self.name(), image, quality)?;
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::L8,
            )
            .map_err(|e| CamError::encoding(self.name(), quality, e.to_string()))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::testing::flat;

    fn noise(width: u32, height: u32, seed: u32) -> GrayImage {
        let mut state = seed;
        GrayImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            image::Luma([(state >> 24) as u8])
        })
    }

    #[test]
    fn jpeg_is_deterministic() {
        let img = noise(64, 64, 7);
        let a = JpegCodec.encode(&img, 60).unwrap();
        let b = JpegCodec.encode(&img, 60).unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn jpeg_lower_quality_is_smaller_on_noise() {
        let img = noise(128, 128, 42);
        let high = JpegCodec.encode(&img, 92).unwrap();
        let low = JpegCodec.encode(&img, 30).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn zero_area_image_is_rejected() {
        let img = GrayImage::new(0, 16);
        let err = JpegCodec.encode(&img, 50).unwrap_err();
        assert_eq!(err.category(), "encoding");
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let err = JpegCodec.encode(&flat(8, 8), 0).unwrap_err();
        assert_eq!(err.category(), "encoding");
        assert!(JpegCodec.encode(&flat(8, 8), 101).is_err());
    }

    #[test]
    fn codec_kind_builds_jpeg() {
        let codec = CodecKind::Jpeg.build().unwrap();
        assert_eq!(codec.extension(), "jpg");
        assert_eq!(codec.mime_type(), "image/jpeg");
    }

    #[cfg(feature = "webp")]
    #[test]
    fn webp_prepared_encode_matches_direct_encode() {
        let img = noise(48, 32, 11);
        let prepared = WebpCodec.prepare(&img);
        assert_eq!(prepared.len(), 48 * 32 * 3);
        let direct = WebpCodec.encode(&img, 60).unwrap();
        assert_eq!(WebpCodec.encode_prepared(&img, &prepared, 60).unwrap(), direct);
        assert!(WebpCodec.encode_prepared(&img, &prepared[..10], 60).is_err());
    }

    #[test]
    fn jpeg_encodes_straight_from_the_image_buffer() {
        let img = noise(16, 16, 5);
        assert!(matches!(JpegCodec.prepare(&img), Cow::Borrowed(_)));
        assert_eq!(
            JpegCodec.encode_prepared(&img, &JpegCodec.prepare(&img), 50).unwrap(),
            JpegCodec.encode(&img, 50).unwrap()
        );
    }

    #[cfg(feature = "webp")]
    #[test]
    fn webp_produces_riff_container() {
        let bytes = WebpCodec.encode(&noise(32, 32, 3), 75).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }
}
