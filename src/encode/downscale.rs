//! Downscale controller.
//!
//! When no quality in range fits, the only remaining lever is pixel count.
//! Each round searches at the current dimensions; on failure the image is
//! shrunk by a factor derived from the overshoot and searched again. Shrink
//! planning lives in `fit_scale::shrink`; this module drives the loop.

use std::borrow::Cow;

use fast_image_resize::Resizer;
use fit_scale::Size;
use fit_scale::cpu::{ResampleFilter, resize_gray};
use fit_scale::shrink::{ShrinkKind, plan_shrink};
use image::GrayImage;
use tracing::debug;

use super::codec::Codec;
use super::dimensions;
use super::fit::{FitResult, FitStats};
use super::search::{SearchOutcome, search};
use crate::config::FitTuning;
use crate::error::{CamError, CamResult};

/// Fit `image` under `budget`, shrinking it when quality alone is not enough.
///
/// The first round starts at `heuristic_quality`; later rounds start at the
/// quality the previous round returned. After `max_downscale_rounds`
/// unsuccessful rounds one final search runs on the smallest image. The
/// loop stops early when the shrink planner reports that no further
/// progress is possible.
pub fn fit_by_downscale(
    codec: &dyn Codec,
    image: &GrayImage,
    budget: usize,
    heuristic_quality: u8,
    tuning: &FitTuning,
) -> CamResult<FitResult> {
    let mut resizer = Resizer::new();
    let mut work: Cow<'_, GrayImage> = Cow::Borrowed(image);
    let mut stats = FitStats {
        trail: vec![dimensions(image)],
        ..FitStats::default()
    };
    let mut start = heuristic_quality;
    let mut last_resort_spent = false;

    for round in 1..=tuning.max_downscale_rounds {
        let outcome = search(codec, &work, budget, start, tuning)?;
        stats.encodes += outcome.encodes();
        if outcome.fits {
            return Ok(finish(work, outcome, stats));
        }
        start = outcome.quality;

        let current = dimensions(&work);
        let Some(step) = plan_shrink(
            current,
            tuning.min_side,
            budget,
            outcome.bytes.len(),
            &tuning.shrink,
            last_resort_spent,
        ) else {
            debug!(round, size = %current, "no further shrink possible");
            return Ok(finish(work, outcome, stats));
        };

        last_resort_spent |= step.kind == ShrinkKind::LastResort;
        debug!(
            round,
            from = %step.from,
            to = %step.to,
            scale = step.scale,
            forced = step.forced,
            achieved = outcome.bytes.len(),
            budget,
            "downscaling"
        );
        work = Cow::Owned(shrink(&mut resizer, &work, step.to, tuning.filter)?);
        stats.trail.push(step.to);
        stats.downscale_rounds += 1;
    }

    let outcome = search(codec, &work, budget, start, tuning)?;
    stats.encodes += outcome.encodes();
    Ok(finish(work, outcome, stats))
}

fn shrink(
    resizer: &mut Resizer,
    image: &GrayImage,
    to: Size,
    filter: ResampleFilter,
) -> CamResult<GrayImage> {
    let pixels = resize_gray(resizer, image.as_raw(), dimensions(image), to, filter)?;
    GrayImage::from_raw(to.w, to.h, pixels)
        .ok_or_else(|| CamError::resize(format!("resampled buffer does not match {}", to)))
}

fn finish(work: Cow<'_, GrayImage>, outcome: SearchOutcome, stats: FitStats) -> FitResult {
    FitResult {
        image: work.into_owned(),
        bytes: outcome.bytes,
        quality: outcome.quality,
        fits: outcome.fits,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::testing::{flat, proportional};

    const BUDGET: usize = 102_400;

    #[test]
    fn fits_without_downscale_when_quality_suffices() {
        let codec = proportional(400);
        let result = fit_by_downscale(&codec, &flat(1024, 1024), BUDGET, 78, &FitTuning::default()).unwrap();
        assert!(result.fits);
        assert_eq!(result.quality, 39);
        assert_eq!(result.size(), Size::new(1024, 1024));
        assert_eq!(result.stats.downscale_rounds, 0);
    }

    #[test]
    fn incompressible_image_stops_at_min_side() {
        let codec = proportional(100);
        let result = fit_by_downscale(&codec, &flat(1024, 1024), BUDGET, 78, &FitTuning::default()).unwrap();
        assert!(!result.fits);
        assert_eq!(result.quality, 30);
        assert_eq!(result.size(), Size::new(640, 640));
        assert_eq!(
            result.stats.trail,
            vec![Size::new(1024, 1024), Size::new(716, 716), Size::new(640, 640)]
        );
        assert_eq!(result.bytes.len(), 640 * 640 * 30 / 100);
    }

    #[test]
    fn later_rounds_start_from_previous_quality() {
        // 640x640 at q=30 is exactly the budget
        let codec = proportional(120);
        let result = fit_by_downscale(&codec, &flat(1024, 1024), BUDGET, 78, &FitTuning::default()).unwrap();
        assert!(result.fits);
        assert_eq!(result.quality, 30);
        assert_eq!(result.bytes.len(), BUDGET);
        assert_eq!(result.size(), Size::new(640, 640));
        assert_eq!(result.stats.downscale_rounds, 2);
    }

    #[test]
    fn wide_image_keeps_shrinking_long_axis_at_min_side() {
        let codec = proportional(150);
        let result = fit_by_downscale(&codec, &flat(2000, 700), BUDGET, 78, &FitTuning::default()).unwrap();
        assert_eq!(
            result.stats.trail,
            vec![
                Size::new(2000, 700),
                Size::new(1400, 640),
                Size::new(1190, 640),
                Size::new(1011, 640),
                Size::new(859, 640),
                Size::new(730, 640),
            ]
        );
        // the final search after the last round fits at the floor quality
        assert!(result.fits);
        assert_eq!(result.quality, 30);
        assert_eq!(result.bytes.len(), 730 * 640 * 30 / 150);
        assert_eq!(result.stats.downscale_rounds, 5);
    }

    #[test]
    fn small_image_gets_one_last_resort_shrink() {
        let codec = proportional(10);
        let result = fit_by_downscale(&codec, &flat(400, 300), BUDGET, 78, &FitTuning::default()).unwrap();
        assert!(!result.fits);
        assert_eq!(result.stats.trail, vec![Size::new(400, 300), Size::new(340, 255)]);
        assert_eq!(result.size(), Size::new(340, 255));
    }

    #[test]
    fn dimensions_never_increase() {
        let tuning = FitTuning {
            min_side: 100,
            ..FitTuning::default()
        };
        for divisor in [1, 5, 50] {
            let codec = proportional(divisor);
            let result = fit_by_downscale(&codec, &flat(900, 600), 20_000, 78, &tuning).unwrap();
            for pair in result.stats.trail.windows(2) {
                assert!(pair[1].w <= pair[0].w && pair[1].h <= pair[0].h);
                assert!(pair[1].short_side() >= 100);
            }
        }
    }

    #[test]
    fn zero_rounds_runs_only_the_final_search() {
        let codec = proportional(100);
        let tuning = FitTuning {
            max_downscale_rounds: 0,
            ..FitTuning::default()
        };
        let result = fit_by_downscale(&codec, &flat(1024, 1024), BUDGET, 78, &tuning).unwrap();
        assert!(!result.fits);
        assert_eq!(result.size(), Size::new(1024, 1024));
        assert_eq!(result.stats.trail.len(), 1);
    }

    #[test]
    fn final_search_runs_after_all_rounds() {
        // min_side 1 lets every round shrink; the budget is reached only
        // after the rounds run out.
        let codec = proportional(1);
        let tuning = FitTuning {
            min_side: 1,
            max_downscale_rounds: 2,
            ..FitTuning::default()
        };
        let result = fit_by_downscale(&codec, &flat(100, 100), 4_000, 78, &tuning).unwrap();
        assert_eq!(result.stats.downscale_rounds, 2);
        assert_eq!(result.stats.trail, vec![Size::new(100, 100), Size::new(70, 70), Size::new(49, 49)]);
        // 49*49*30 = 72_030 still over budget
        assert!(!result.fits);
        assert!(result.stats.encodes <= tuning.max_encodes());
    }
}
