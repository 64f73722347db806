//! Bitrate regulator (C7): turns a BWC loss signal into a target video
//! bitrate, within codec-specific bounds, spec.md §4.7.

use log::debug;

/// Loss fraction below which bitrate is allowed to climb.
pub const INC_THRESHOLD: f64 = 0.02;
/// Loss fraction above which bitrate is cut.
pub const DEC_THRESHOLD: f64 = 0.08;

/// A published increase must clear the previous bitrate by more than this
/// many bits/sec, or it's suppressed (hysteresis), spec.md §4.7.
const PUBLISH_HYSTERESIS_BPS: i64 = 300_000;

/// `B' = B - SCALAR_DEC * floor(loss*100)` on a decrease; not pinned to an
/// exact figure in the spec's own worked example (any value large enough to
/// hit the `B_min` clamp at `loss=0.10, B=2000kbps` satisfies it) — chosen
/// in line with the original's decrease-by-hundreds-of-kbps-per-percent
/// shape. See `DESIGN.md` for this Open Question's resolution.
const SCALAR_DEC_BPS_PER_PERCENT: i64 = 200_000;

/// Codec-specific bounds and scalar thresholds, spec.md §4.7 (H.264 values
/// given explicitly; VP8/VP9 share a correction factor per spec.md §4.7).
#[derive(Clone, Copy, Debug)]
pub struct CodecBitrateProfile {
    pub min_bps: u32,
    pub max_bps: u32,
    pub scalar_t1_bps: u32,
    pub scalar_t2_bps: u32,
    /// Multiplicative correction applied after clamping (VP8/VP9 only).
    pub correction_factor: Option<f64>,
}

impl CodecBitrateProfile {
    pub const H264: CodecBitrateProfile = CodecBitrateProfile {
        min_bps: 90_000,
        max_bps: 12_000_000,
        scalar_t1_bps: 1_400_000,
        scalar_t2_bps: 5_000_000,
        correction_factor: None,
    };

    pub const VP8: CodecBitrateProfile = CodecBitrateProfile {
        min_bps: 50_000,
        max_bps: 2_500_000,
        scalar_t1_bps: 1_400_000,
        scalar_t2_bps: 5_000_000,
        correction_factor: Some(0.9),
    };

    pub const VP9: CodecBitrateProfile = CodecBitrateProfile::VP8;
}

/// Parameters the encoder collaborator receives alongside a new bitrate.
#[derive(Clone, Copy, Debug)]
pub struct ReconfigureRequest {
    pub bitrate_bps: u32,
    pub width: u32,
    pub height: u32,
    pub keyframe_hint: bool,
}

/// Tracks the working bitrate estimate for one outgoing video stream and
/// applies the §4.7 step rule on each BWC tick.
///
/// `current_bps` is the internal running estimate, updated on every tick;
/// `last_published_bps` is what the encoder collaborator was last told.
/// Increases only reach the encoder once they've accumulated past the
/// publish hysteresis, so a string of small +180kbps/+40kbps creeps doesn't
/// spam a reconfigure every second — decreases always publish immediately.
pub struct BitrateRegulator {
    profile: CodecBitrateProfile,
    current_bps: u32,
    last_published_bps: u32,
    user_cap_bps: u32,
}

impl BitrateRegulator {
    pub fn new(profile: CodecBitrateProfile, start_bps: u32, user_cap_bps: u32) -> Self {
        let clamped = start_bps.clamp(profile.min_bps, profile.max_bps.min(user_cap_bps));
        BitrateRegulator {
            profile,
            current_bps: clamped,
            last_published_bps: clamped,
            user_cap_bps,
        }
    }

    pub fn current_bps(&self) -> u32 {
        self.current_bps
    }

    pub fn last_published_bps(&self) -> u32 {
        self.last_published_bps
    }

    pub fn user_cap_bps(&self) -> u32 {
        self.user_cap_bps
    }

    /// Applies the step rule for one observed `loss` fraction, returning a
    /// [`ReconfigureRequest`] only when a publishable change occurred.
    pub fn on_loss_report(&mut self, loss: f64, width: u32, height: u32) -> Option<ReconfigureRequest> {
        let b = i64::from(self.current_bps);
        let is_increase;
        let candidate = if loss < INC_THRESHOLD && self.current_bps < self.profile.max_bps {
            is_increase = true;
            if b < i64::from(self.profile.scalar_t1_bps) {
                b + 180_000
            } else if b > i64::from(self.profile.scalar_t2_bps) {
                b + 40_000
            } else {
                (b as f64 * 1.06) as i64
            }
        } else if loss > DEC_THRESHOLD && self.current_bps > self.profile.min_bps {
            is_increase = false;
            let percent = (loss * 100.0).floor() as i64;
            b - SCALAR_DEC_BPS_PER_PERCENT * percent
        } else {
            return None;
        };

        let cap = self.profile.max_bps.min(self.user_cap_bps);
        let mut clamped = candidate.clamp(i64::from(self.profile.min_bps), i64::from(cap)) as u32;
        if let Some(factor) = self.profile.correction_factor {
            clamped = ((clamped as f64) * factor) as u32;
            clamped = clamped.clamp(self.profile.min_bps, cap);
        }
        self.current_bps = clamped;

        if is_increase {
            if i64::from(clamped) <= i64::from(self.last_published_bps) + PUBLISH_HYSTERESIS_BPS {
                debug!(
                    "bitrate regulator: current {} not yet past hysteresis over last published {}",
                    clamped, self.last_published_bps
                );
                return None;
            }
        } else if clamped == self.last_published_bps {
            return None;
        }

        self.last_published_bps = clamped;
        Some(ReconfigureRequest {
            bitrate_bps: clamped,
            width,
            height,
            keyframe_hint: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_loss_below_scalar_t1_steps_current_bps_by_180kbps_per_tick() {
        let mut reg = BitrateRegulator::new(CodecBitrateProfile::H264, 1_000_000, 12_000_000);
        // A single tick's +180kbps creep is under the 300kbps publish hysteresis.
        assert!(reg.on_loss_report(0.01, 640, 480).is_none());
        assert_eq!(reg.current_bps(), 1_180_000);
    }

    #[test]
    fn low_loss_above_scalar_t2_steps_current_bps_by_40kbps_per_tick() {
        let mut reg = BitrateRegulator::new(CodecBitrateProfile::H264, 6_000_000, 12_000_000);
        assert!(reg.on_loss_report(0.01, 640, 480).is_none());
        assert_eq!(reg.current_bps(), 6_040_000);
    }

    #[test]
    fn low_loss_between_thresholds_scales_by_1_06_until_hysteresis_clears() {
        let mut reg = BitrateRegulator::new(CodecBitrateProfile::H264, 2_000_000, 12_000_000);
        assert!(reg.on_loss_report(0.01, 640, 480).is_none());
        assert_eq!(reg.current_bps(), 2_120_000);
        // Second tick: 2_120_000 * 1.06 = 2_247_200, now > last_published(2_000_000) + 300_000.
        let req = reg.on_loss_report(0.01, 640, 480).unwrap();
        assert_eq!(req.bitrate_bps, 2_247_200);
        assert_eq!(reg.last_published_bps(), 2_247_200);
    }

    #[test]
    fn repeated_small_increases_eventually_clear_the_hysteresis() {
        let mut reg = BitrateRegulator::new(CodecBitrateProfile::H264, 1_000_000, 12_000_000);
        let mut published = None;
        for _ in 0..3 {
            published = reg.on_loss_report(0.01, 640, 480);
        }
        // After three +180kbps ticks, current_bps = 1_540_000, clearing 1_000_000+300_000.
        assert_eq!(reg.current_bps(), 1_540_000);
        assert!(published.is_some());
        assert_eq!(published.unwrap().bitrate_bps, 1_540_000);
    }

    #[test]
    fn high_loss_clamps_to_minimum() {
        let mut reg = BitrateRegulator::new(CodecBitrateProfile::H264, 2_000_000, 12_000_000);
        let req = reg.on_loss_report(0.10, 640, 480).unwrap();
        assert_eq!(req.bitrate_bps, CodecBitrateProfile::H264.min_bps);
    }

    #[test]
    fn vp8_applies_correction_factor_after_clamping() {
        let mut reg = BitrateRegulator::new(CodecBitrateProfile::VP8, 2_000_000, 2_500_000);
        let req = reg.on_loss_report(0.10, 640, 480).unwrap();
        assert_eq!(req.bitrate_bps, CodecBitrateProfile::VP8.min_bps);
    }

    #[test]
    fn respects_user_cap_even_under_codec_max() {
        let mut reg = BitrateRegulator::new(CodecBitrateProfile::H264, 1_000_000, 1_200_000);
        reg.on_loss_report(0.01, 640, 480);
        assert!(reg.current_bps() <= 1_200_000);
    }

    #[test]
    fn mid_range_loss_does_nothing() {
        let mut reg = BitrateRegulator::new(CodecBitrateProfile::H264, 2_000_000, 12_000_000);
        assert!(reg.on_loss_report(0.05, 640, 480).is_none());
    }
}
