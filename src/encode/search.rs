//! Bounded quality search at fixed dimensions.
//!
//! Finds the highest quality in `[q_min, start]` whose encode fits the
//! budget, using a fast attempt at `start` followed by a binary search of at
//! most `max_search_steps` encodes. Codecs are only approximately monotone in
//! quality; when the attempts show an inversion, a short descending scan
//! over untried qualities recovers fits the bisection stepped over.

use std::borrow::Cow;

use image::GrayImage;
use tracing::{debug, warn};

use super::codec::Codec;
use crate::config::FitTuning;
use crate::error::CamResult;

/// One encode made during a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeAttempt {
    pub quality: u8,
    pub byte_len: usize,
}

/// Result of one search at fixed dimensions.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub fits: bool,
    /// Every encode made, in call order.
    pub attempts: Vec<EncodeAttempt>,
}

impl SearchOutcome {
    pub fn encodes(&self) -> usize {
        self.attempts.len()
    }
}

/// Records every encode so the caller can inspect size-vs-quality behavior.
struct Probe<'a> {
    codec: &'a dyn Codec,
    image: &'a GrayImage,
    prepared: Cow<'a, [u8]>,
    budget: usize,
    attempts: Vec<EncodeAttempt>,
}

impl<'a> Probe<'a> {
    fn new(codec: &'a dyn Codec, image: &'a GrayImage, budget: usize) -> Self {
        Self {
            codec,
            image,
            prepared: codec.prepare(image),
            budget,
            attempts: Vec::new(),
        }
    }

    fn encode(&mut self, quality: u8) -> CamResult<Vec<u8>> {
        let bytes = self.codec.encode_prepared(self.image, &self.prepared, quality)?;
        debug!(
            codec = self.codec.name(),
            quality,
            bytes = bytes.len(),
            budget = self.budget,
            width = self.image.width(),
            height = self.image.height(),
            "encode attempt"
        );
        self.attempts.push(EncodeAttempt {
            quality,
            byte_len: bytes.len(),
        });
        Ok(bytes)
    }

    fn fits(&self, bytes: &[u8]) -> bool {
        bytes.len() <= self.budget
    }

    fn tried(&self, quality: u8) -> bool {
        self.attempts.iter().any(|a| a.quality == quality)
    }

    /// True when no lower quality produced strictly more bytes than a higher one.
    fn is_monotone(&self) -> bool {
        let mut sorted = self.attempts.clone();
        sorted.sort_by_key(|a| a.quality);
        sorted
            .windows(2)
            .all(|w| w[0].quality == w[1].quality || w[0].byte_len <= w[1].byte_len)
    }

    fn finish(self, bytes: Vec<u8>, quality: u8, fits: bool) -> SearchOutcome {
        SearchOutcome {
            bytes,
            quality,
            fits,
            attempts: self.attempts,
        }
    }
}

/// Search for the highest quality whose encode fits `budget`.
///
/// `start_quality` is clamped into the tuning range. The fast attempt at the
/// clamped start is always made. When neither the start nor the bounded
/// search finds a fit, a final encode at `q_min` is returned as the best
/// effort; its `fits` reports whether that floor encode happens to fit.
/// Total encodes never exceed `2 * max_search_steps + 2`.
///
/// # Errors
///
/// Propagates the first codec failure unchanged.
pub fn search(
    codec: &dyn Codec,
    image: &GrayImage,
    budget: usize,
    start_quality: u8,
    tuning: &FitTuning,
) -> CamResult<SearchOutcome> {
    let mut probe = Probe::new(codec, image, budget);
    let start = tuning.clamp_quality(start_quality);

    let first = probe.encode(start)?;
    if probe.fits(&first) {
        return Ok(probe.finish(first, start, true));
    }

    let mut best: Option<(Vec<u8>, u8)> = None;
    let mut lo = i32::from(tuning.q_min);
    let mut hi = i32::from(start) - 1;
    let mut steps = 0;
    while lo <= hi && steps < tuning.max_search_steps {
        let mid = ((lo + hi) / 2) as u8;
        let bytes = probe.encode(mid)?;
        steps += 1;
        if probe.fits(&bytes) {
            lo = i32::from(mid) + 1;
            best = Some((bytes, mid));
        } else {
            hi = i32::from(mid) - 1;
        }
    }

    if !probe.is_monotone() {
        let floor = best.as_ref().map_or(tuning.q_min, |(_, q)| q + 1);
        warn!(
            codec = codec.name(),
            best = ?best.as_ref().map(|(_, q)| *q),
            "size not monotone in quality, scanning {}..{}",
            floor,
            start
        );
        let mut extra = 0;
        for quality in (floor..start).rev() {
            if extra >= tuning.max_search_steps {
                break;
            }
            if probe.tried(quality) {
                continue;
            }
            let bytes = probe.encode(quality)?;
            extra += 1;
            if probe.fits(&bytes) {
                best = Some((bytes, quality));
                break;
            }
        }
    }

    if let Some((bytes, quality)) = best {
        return Ok(probe.finish(bytes, quality, true));
    }

    let floor = probe.encode(tuning.q_min)?;
    let fits = probe.fits(&floor);
    Ok(probe.finish(floor, tuning.q_min, fits))
}
