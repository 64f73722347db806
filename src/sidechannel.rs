//! Capability / side-channel (C10): out-of-band lossless control messages,
//! spec.md §4.10. Wraps [`crate::wire::ControlMessage`] with send policy and
//! the `LESS_VIDEO_FPS` rate limiting shared with the work-buffer skip path.

use log::debug;

use crate::wire::ControlMessage;
use crate::MonoMs;

/// Sender-side hint produced by [`RequestKeyframe`]: force the next encoded
/// frame to be a keyframe and reset the keyframe timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyframeRequestState {
    pub force_next_keyframe: bool,
    pub last_keyframe_ts: MonoMs,
}

impl KeyframeRequestState {
    pub fn on_request_received(&mut self, now_ms: MonoMs) {
        self.force_next_keyframe = true;
        self.last_keyframe_ts = now_ms;
    }

    pub fn take_force_flag(&mut self) -> bool {
        std::mem::take(&mut self.force_next_keyframe)
    }
}

/// Minimum gap between two `LESS_VIDEO_FPS` requests we originate, spec.md §4.10.
pub const FPS_REQUEST_MIN_INTERVAL_MS: u64 = 10_000;
/// `n` used when this side autonomously throttles the peer's outgoing FPS.
pub const FPS_REQUEST_DEFAULT_N: u8 = 3;

/// How long a received `LESS_VIDEO_FPS{n}` request stays in effect before
/// the sender resumes full rate, per spec.md §4.10
/// (`TOXAV_SKIP_FPS_RELEASE_AFTER_MS`).
pub const SKIP_FPS_RELEASE_AFTER_MS: u64 = 5_000;

/// Sender-side effect of an inbound `LESS_VIDEO_FPS{n}` request: drop 1 of
/// every `n` outgoing frames until it expires.
#[derive(Clone, Copy, Debug, Default)]
pub struct FpsThrottle {
    n: u8,
    expires_at: MonoMs,
    frames_sent_since_skip: u32,
}

impl FpsThrottle {
    pub fn apply(&mut self, n: u8, now_ms: MonoMs) {
        self.n = n;
        self.expires_at = now_ms + SKIP_FPS_RELEASE_AFTER_MS;
        self.frames_sent_since_skip = 0;
    }

    pub fn active(&self, now_ms: MonoMs) -> bool {
        self.n > 0 && now_ms < self.expires_at
    }

    /// Returns `true` if this outgoing frame should be dropped.
    pub fn should_skip(&mut self, now_ms: MonoMs) -> bool {
        if !self.active(now_ms) {
            return false;
        }
        self.frames_sent_since_skip += 1;
        let skip = self.frames_sent_since_skip % u32::from(self.n) == 0;
        skip
    }
}

/// Receiver-side decision to autonomously ask the peer to slow down, driven
/// by the work buffer's "skipping" state.
pub struct FpsRequestLimiter {
    last_request_ts: Option<MonoMs>,
}

impl FpsRequestLimiter {
    pub fn new() -> Self {
        FpsRequestLimiter { last_request_ts: None }
    }

    /// `is_skipping` reflects that this side's video pipeline has been
    /// forced to drop incoming frames (work-buffer thrash). Returns a
    /// `LESS_VIDEO_FPS` message to send if the rate limit allows it.
    pub fn maybe_request(&mut self, is_skipping: bool, now_ms: MonoMs) -> Option<ControlMessage> {
        if !is_skipping {
            return None;
        }
        if let Some(last) = self.last_request_ts {
            if now_ms.saturating_sub(last) < FPS_REQUEST_MIN_INTERVAL_MS {
                return None;
            }
        }
        self.last_request_ts = Some(now_ms);
        debug!("sidechannel: requesting peer drop 1-of-{} frames", FPS_REQUEST_DEFAULT_N);
        Some(ControlMessage::LessVideoFps { n: FPS_REQUEST_DEFAULT_N })
    }
}

impl Default for FpsRequestLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the peer has told us it can decode H.264, spec.md §4.10
/// (`HAVE_H264_VIDEO`); resets the negotiated bitrate to the codec's
/// initial default when first learned.
#[derive(Clone, Copy, Debug, Default)]
pub struct PeerCodecCapability {
    pub have_h264: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyframe_request_sets_and_consumes_force_flag() {
        let mut state = KeyframeRequestState::default();
        state.on_request_received(100);
        assert!(state.take_force_flag());
        assert!(!state.take_force_flag());
    }

    #[test]
    fn fps_throttle_drops_one_of_n_frames() {
        let mut throttle = FpsThrottle::default();
        throttle.apply(3, 0);
        let skips: Vec<bool> = (0..6).map(|_| throttle.should_skip(0)).collect();
        assert_eq!(skips, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn fps_throttle_expires_after_release_window() {
        let mut throttle = FpsThrottle::default();
        throttle.apply(3, 0);
        assert!(throttle.active(1_000));
        assert!(!throttle.active(SKIP_FPS_RELEASE_AFTER_MS + 1));
    }

    #[test]
    fn fps_request_limiter_respects_min_interval() {
        let mut limiter = FpsRequestLimiter::new();
        assert!(limiter.maybe_request(true, 0).is_some());
        assert!(limiter.maybe_request(true, 1_000).is_none());
        assert!(limiter.maybe_request(true, FPS_REQUEST_MIN_INTERVAL_MS + 1).is_some());
    }

    #[test]
    fn fps_request_limiter_does_nothing_when_not_skipping() {
        let mut limiter = FpsRequestLimiter::new();
        assert!(limiter.maybe_request(false, 0).is_none());
    }
}
