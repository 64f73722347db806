//! Clock tracker (C2): the "dummy NTP" clock-offset/round-trip estimator,
//! one per video session, spec.md §4.2.
//!
//! Shaped like the teacher's [`crate::clock`] analogue, `client::timeline`:
//! a small piece of state advanced by single calls, with its own inline
//! `#[cfg(test)]` module exercising the interesting edge cases rather than a
//! separate integration-test file.

use log::debug;

use crate::MonoMs;

/// Below this measured RTT (inclusive upper bound exclusive), a roundtrip
/// update is considered "close enough" to step slowly.
const RTT_SMALL_STEP_THRESHOLD_MS: i64 = 150;
/// Step size applied to `roundtrip_ms` when the new measurement is within
/// [`RTT_SMALL_STEP_THRESHOLD_MS`] of the tracked value.
const RTT_SMALL_STEP_MS: i64 = 1;
/// Step size applied otherwise.
const RTT_LARGE_STEP_MS: i64 = 40;
/// A round trip measurement above this is discarded outright.
const MAX_VALID_RTT_MS: i64 = 800;
/// The largest single-sample jump allowed in `offset_ms_to_sender`.
const MAX_OFFSET_JUMP_MS: i64 = 100;
/// Offset changes smaller than this are suppressed (treated as noise).
const OFFSET_CHANGE_SUPPRESS_MS: i64 = 10;

/// How often (in incoming video frames) a `CLOCK_REQUEST` is sent once the
/// stream is established.
pub const REQUEST_CADENCE_FRAMES: u32 = 60;
/// During the first this-many incoming frames, a request is sent on every
/// frame instead of waiting for the cadence above (fast initial lock-on).
pub const WARMUP_FRAMES: u32 = 10;

/// Per-peer clock tracker state.
#[derive(Clone, Copy, Debug)]
pub struct ClockTracker {
    offset_ms_to_sender: i64,
    roundtrip_ms: i64,
    last_request_ts: MonoMs,
    frames_seen: u32,
    have_sample: bool,
}

impl Default for ClockTracker {
    fn default() -> Self {
        ClockTracker {
            offset_ms_to_sender: 0,
            roundtrip_ms: 0,
            last_request_ts: 0,
            frames_seen: 0,
            have_sample: false,
        }
    }
}

/// Outcome of [`ClockTracker::on_video_frame`]: whether the caller should
/// emit a fresh `CLOCK_REQUEST` this tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RequestDecision {
    Send,
    Skip,
}

impl ClockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset_ms_to_sender(&self) -> i64 {
        self.offset_ms_to_sender
    }

    pub fn roundtrip_ms(&self) -> i64 {
        self.roundtrip_ms
    }

    /// Called once per incoming video frame; decides whether this tick
    /// should emit a `CLOCK_REQUEST{local_t0}` per the cadence in spec.md
    /// §4.2 (every ~60 frames, plus every frame during the first 10).
    pub fn on_video_frame(&mut self) -> RequestDecision {
        self.frames_seen = self.frames_seen.wrapping_add(1);
        if self.frames_seen <= WARMUP_FRAMES || self.frames_seen % REQUEST_CADENCE_FRAMES == 0 {
            RequestDecision::Send
        } else {
            RequestDecision::Skip
        }
    }

    pub fn record_request_sent(&mut self, now_ms: MonoMs) {
        self.last_request_ts = now_ms;
    }

    pub fn last_request_ts(&self) -> MonoMs {
        self.last_request_ts
    }

    /// Applies one `CLOCK_ANSWER` sample: `local_t0` is when we sent the
    /// request, `local_t3` is now (when the answer arrived), and
    /// `remote_t1`/`remote_t2` are the peer's receive/send timestamps.
    ///
    /// Returns `true` if the sample was accepted and applied, `false` if it
    /// was discarded as an invalid RTT.
    pub fn apply_sample(&mut self, local_t0: u32, local_t3: u32, remote_t1: u32, remote_t2: u32) -> bool {
        let wire_rtt = i64::from(local_t3.wrapping_sub(local_t0)) - i64::from(remote_t2.wrapping_sub(remote_t1));
        if wire_rtt > MAX_VALID_RTT_MS || wire_rtt <= 0 {
            debug!(
                "clock tracker: discarding sample, rtt={}ms took too long or was non-positive",
                wire_rtt
            );
            return false;
        }

        let measured_offset =
            (i64::from(remote_t1.wrapping_sub(local_t0)) + i64::from(remote_t2 as i64 - local_t3 as i64)) / 2;

        self.apply_roundtrip(wire_rtt);
        self.apply_offset(measured_offset);
        self.have_sample = true;
        true
    }

    fn apply_roundtrip(&mut self, measured_rtt: i64) {
        if !self.have_sample {
            self.roundtrip_ms = measured_rtt;
            return;
        }
        let delta = measured_rtt - self.roundtrip_ms;
        let step = if delta.abs() <= RTT_SMALL_STEP_THRESHOLD_MS {
            RTT_SMALL_STEP_MS
        } else {
            RTT_LARGE_STEP_MS
        };
        self.roundtrip_ms += delta.signum() * step.min(delta.abs());
    }

    fn apply_offset(&mut self, measured_offset: i64) {
        if !self.have_sample {
            self.offset_ms_to_sender = measured_offset;
            return;
        }
        let delta = measured_offset - self.offset_ms_to_sender;
        if delta.abs() < OFFSET_CHANGE_SUPPRESS_MS {
            return;
        }
        let clamped = delta.clamp(-MAX_OFFSET_JUMP_MS, MAX_OFFSET_JUMP_MS);
        self.offset_ms_to_sender += clamped;
    }
}
