// SPDX-License-Identifier: MIT
//! # Downscale Step Policy
//!
//! Decides the next, smaller resolution when no quality level fits the byte
//! budget at the current one. Three step kinds exist:
//!
//! 1. **Proportional**: encoded size scales roughly with pixel count, so the
//!    linear factor is `sqrt(budget / achieved)`, clamped to
//!    `[min_scale, max_scale]` so one step is neither negligible nor
//!    destructive.
//! 2. **Last resort**: once the shorter side is at or below `min_side`, a
//!    fixed factor is applied each round, flooring every axis at `min_side`,
//!    so a wide image keeps losing width after its height bottoms out. An
//!    image that arrived below `min_side` gets this step only once.
//! 3. **Forced**: if a step leaves both axes unchanged (rounding, clamping),
//!    a fixed factor replaces it. If even that cannot shrink, there is no
//!    next step.
//!
//! New dimensions never drop below `min_side` unless the image started below
//! it, and never exceed the current dimensions.

use serde::{Deserialize, Serialize};

use crate::plan::Size;

/// Tunable constants of the downscale heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShrinkPolicy {
    /// Smallest proportional factor per step
    pub min_scale: f64,
    /// Largest proportional factor per step
    pub max_scale: f64,
    /// Fixed factor applied once the shorter side is at or below `min_side`
    pub last_resort_scale: f64,
    /// Fixed factor used when a planned step makes no progress
    pub forced_scale: f64,
}

impl Default for ShrinkPolicy {
    fn default() -> Self {
        Self {
            min_scale: 0.70,
            max_scale: 0.92,
            last_resort_scale: 0.85,
            forced_scale: 0.90,
        }
    }
}

impl ShrinkPolicy {
    /// Check that every factor is a real shrink and the clamp range is ordered.
    pub fn validate(&self) -> Result<(), String> {
        let factors = [
            ("min_scale", self.min_scale),
            ("max_scale", self.max_scale),
            ("last_resort_scale", self.last_resort_scale),
            ("forced_scale", self.forced_scale),
        ];
        for (name, value) in factors {
            if !(value > 0.0 && value < 1.0) {
                return Err(format!("{name} must be within (0, 1), got {value}"));
            }
        }
        if self.min_scale > self.max_scale {
            return Err(format!(
                "min_scale ({}) must not exceed max_scale ({})",
                self.min_scale, self.max_scale
            ));
        }
        Ok(())
    }

    /// `sqrt(budget / achieved)` clamped to `[min_scale, max_scale]`.
    pub fn proportional_scale(&self, budget: usize, achieved: usize) -> f64 {
        let ratio = budget as f64 / achieved.max(1) as f64;
        ratio.sqrt().clamp(self.min_scale, self.max_scale)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShrinkKind {
    Proportional,
    LastResort,
}

/// One planned downscale step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShrinkStep {
    pub from: Size,
    pub to: Size,
    /// Factor actually applied
    pub scale: f64,
    pub kind: ShrinkKind,
    /// The planned factor made no progress and `forced_scale` was used
    pub forced: bool,
}

/// Plan the next downscale step, or `None` when the image cannot shrink
/// further under the policy.
///
/// # Arguments
/// * `current` - Dimensions of the image that just failed the budget
/// * `min_side` - Shorter-side floor
/// * `budget` - Byte budget
/// * `achieved` - Byte length of the best-effort encode at `current`
/// * `last_resort_spent` - Whether a last-resort step was already taken;
///   only limits images that are below `min_side`
pub fn plan_shrink(
    current: Size,
    min_side: u32,
    budget: usize,
    achieved: usize,
    policy: &ShrinkPolicy,
    last_resort_spent: bool,
) -> Option<ShrinkStep> {
    let short = current.short_side();
    let (kind, scale) = if short <= min_side {
        if short < min_side && last_resort_spent {
            return None;
        }
        (ShrinkKind::LastResort, policy.last_resort_scale)
    } else {
        (ShrinkKind::Proportional, policy.proportional_scale(budget, achieved))
    };

    // An image that arrived below the floor may only get smaller.
    let floor = if short < min_side { 1 } else { min_side };

    let to = scale_size(current, scale, floor);
    if current.shrinks_to(to) {
        return Some(ShrinkStep {
            from: current,
            to,
            scale,
            kind,
            forced: false,
        });
    }

    let to = scale_size(current, policy.forced_scale, floor);
    current.shrinks_to(to).then_some(ShrinkStep {
        from: current,
        to,
        scale: policy.forced_scale,
        kind,
        forced: true,
    })
}

fn scale_size(size: Size, scale: f64, floor: u32) -> Size {
    Size {
        w: scale_axis(size.w, scale, floor),
        h: scale_axis(size.h, scale, floor),
    }
}

fn scale_axis(d: u32, scale: f64, floor: u32) -> u32 {
    let scaled = (f64::from(d) * scale).floor() as u32;
    scaled.max(floor).min(d)
}
