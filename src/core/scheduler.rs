use crate::core::mapper;
use crate::domain::model::{ActionRequest, BoardRegion, DevicePoint, HoverStep, MoveMethod};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and motion parameters that make automated input look human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanizerProfile {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// 1 (slow, shaky) ..= 10 (fast, precise)
    pub skill_level: u8,
    pub jitter_pixels: u32,
    pub hover_probability: f64,
    pub min_motion: Duration,
    pub max_motion: Duration,
}

impl Default for HumanizerProfile {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(3500),
            skill_level: 5,
            jitter_pixels: 3,
            hover_probability: 0.3,
            min_motion: Duration::from_millis(300),
            max_motion: Duration::from_millis(700),
        }
    }
}

impl HumanizerProfile {
    /// No delays, no jitter, no hover.
    pub fn instant() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            skill_level: 10,
            jitter_pixels: 0,
            hover_probability: 0.0,
            min_motion: Duration::ZERO,
            max_motion: Duration::ZERO,
        }
    }

    /// 0.0 at skill 1, 1.0 at skill 10.
    fn skill_factor(&self) -> f64 {
        (self.skill_level.clamp(1, 10) - 1) as f64 / 9.0
    }

    /// Delay bounds after skill scaling: the lower bound stays, the spread
    /// shrinks to 30% of the configured range at the top skill level.
    pub fn delay_bounds(&self) -> (f64, f64) {
        let lo = self.min_delay.as_secs_f64();
        let hi = self.max_delay.as_secs_f64().max(lo);
        let spread = (hi - lo) * (1.0 - 0.7 * self.skill_factor());
        (lo, lo + spread)
    }

    pub fn jitter_radius(&self) -> u32 {
        if self.jitter_pixels == 0 {
            return 0;
        }
        let scaled = self.jitter_pixels as f64 * (1.0 - 0.5 * self.skill_factor());
        (scaled.round() as u32).max(1)
    }
}

const HOVER_OFFSET: i32 = 20;
const HOVER_DWELL_MS: u64 = 100;
const SETTLE_RANGE: (f64, f64) = (0.1, 0.5);

/// Draws from a triangular distribution peaking at the midpoint.
fn triangular<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    let u: f64 = rng.gen();
    // symmetric mode: split at one half
    if u < 0.5 {
        lo + (hi - lo) * (u / 2.0).sqrt()
    } else {
        hi - (hi - lo) * ((1.0 - u) / 2.0).sqrt()
    }
}

fn millis(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}

pub struct ActionScheduler<R: Rng = StdRng> {
    profile: HumanizerProfile,
    method: MoveMethod,
    max_offset: u32,
    rng: R,
}

impl ActionScheduler<StdRng> {
    pub fn new(profile: HumanizerProfile, method: MoveMethod, board: &BoardRegion) -> Self {
        Self::with_rng(profile, method, board, StdRng::from_entropy())
    }
}

impl<R: Rng> ActionScheduler<R> {
    pub fn with_rng(profile: HumanizerProfile, method: MoveMethod, board: &BoardRegion, rng: R) -> Self {
        Self {
            profile,
            method,
            max_offset: mapper::max_safe_offset(board),
            rng,
        }
    }

    pub fn profile(&self) -> &HumanizerProfile {
        &self.profile
    }

    fn jitter(&mut self, point: DevicePoint, radius: u32) -> DevicePoint {
        if radius == 0 {
            return point;
        }
        let r = radius as i32;
        let dx = self.rng.gen_range(-r..=r);
        let dy = self.rng.gen_range(-r..=r);
        point.offset(dx, dy)
    }

    /// Wraps a pair of cell centers into a humanized action.
    pub fn schedule(&mut self, origin: DevicePoint, destination: DevicePoint) -> ActionRequest {
        let (lo, hi) = self.profile.delay_bounds();
        let pre_delay = triangular(&mut self.rng, lo, hi);
        let motion = triangular(
            &mut self.rng,
            self.profile.min_motion.as_secs_f64(),
            self.profile.max_motion.as_secs_f64(),
        );
        let settle = if self.profile.max_delay.is_zero() {
            0.0
        } else {
            triangular(&mut self.rng, SETTLE_RANGE.0, SETTLE_RANGE.1)
        };

        let radius = self.profile.jitter_radius().min(self.max_offset);
        let origin = self.jitter(origin, radius);
        let destination = self.jitter(destination, radius);

        let hover = if self.profile.hover_probability > 0.0
            && self.rng.gen_bool(self.profile.hover_probability.clamp(0.0, 1.0))
        {
            let dx = self.rng.gen_range(-HOVER_OFFSET..=HOVER_OFFSET);
            let dy = self.rng.gen_range(-HOVER_OFFSET..=HOVER_OFFSET);
            Some(HoverStep {
                point: origin.offset(dx, dy),
                dwell_ms: HOVER_DWELL_MS,
            })
        } else {
            None
        };

        let request = ActionRequest {
            origin,
            destination,
            method: self.method,
            pre_delay_ms: millis(pre_delay),
            motion_ms: millis(motion),
            settle_ms: millis(settle),
            jitter_radius: radius,
            hover,
        };
        tracing::debug!(
            pre_delay_ms = request.pre_delay_ms,
            motion_ms = request.motion_ms,
            hover = request.hover.is_some(),
            "action scheduled"
        );
        request
    }
}
