//! Bandwidth controller (C6): per-peer EWMA of received vs. lost bytes,
//! emitting a loss-fraction signal on a 1-second cadence, spec.md §4.6.

use log::trace;

use crate::MonoMs;

/// Fragments missing beyond this tolerance are counted as loss outright.
const GAP_TOLERANCE_NORMAL: u32 = 0;
/// Wider tolerance applied while the receiver is actively skipping frames
/// (e.g. mid keyframe-grace eviction), per spec.md §4.6.
const GAP_TOLERANCE_SKIPPING: u32 = 2;

/// How often accumulated counters are folded into a loss-fraction report.
pub const REPORT_INTERVAL_MS: u64 = 1_000;

#[derive(Clone, Copy, Debug, Default)]
pub struct LossReport {
    pub loss_fraction: f64,
    pub recv_bytes: u64,
    pub lost_bytes: u64,
}

/// Per-peer, per-direction loss/throughput accumulator.
pub struct BandwidthController {
    recv_bytes: u64,
    lost_bytes: u64,
    last_report_ts: Option<MonoMs>,
    current_loss_fraction: f64,
}

impl BandwidthController {
    pub fn new() -> Self {
        BandwidthController {
            recv_bytes: 0,
            lost_bytes: 0,
            last_report_ts: None,
            current_loss_fraction: 0.0,
        }
    }

    pub fn current_loss_fraction(&self) -> f64 {
        self.current_loss_fraction
    }

    /// Accounts bytes of a packet that arrived successfully.
    pub fn on_bytes_received(&mut self, n: u32) {
        self.recv_bytes += u64::from(n);
    }

    /// Accounts bytes declared lost: `missing_count` fragments each of
    /// `full_length` bytes, only once `missing_count` exceeds the gap
    /// tolerance for the current skip state.
    pub fn on_gap_detected(&mut self, missing_count: u32, full_length: u32, receiver_is_skipping: bool) {
        let tolerance = if receiver_is_skipping { GAP_TOLERANCE_SKIPPING } else { GAP_TOLERANCE_NORMAL };
        if missing_count <= tolerance {
            return;
        }
        let counted = missing_count - tolerance;
        self.lost_bytes += u64::from(counted) * u64::from(full_length);
    }

    /// Accounts an incomplete frame evicted from the work buffer: the
    /// shortfall between what was received and its declared full length.
    pub fn on_incomplete_eviction(&mut self, received: u32, full_length: u32) {
        if full_length > received {
            self.lost_bytes += u64::from(full_length - received);
        }
    }

    /// Folds accumulators into a loss report if at least
    /// [`REPORT_INTERVAL_MS`] has passed since the last one. Returns `None`
    /// (no report, no reset) otherwise, or when nothing was accounted this
    /// period — `SPEC_FULL.md` §B's "no report when zero bytes accounted"
    /// guard, avoiding a spurious `loss = 0/1 = 0.0` report flooding the
    /// bitrate regulator while the stream is simply idle.
    pub fn maybe_report(&mut self, now_ms: MonoMs) -> Option<LossReport> {
        if let Some(last) = self.last_report_ts {
            if now_ms.saturating_sub(last) < REPORT_INTERVAL_MS {
                return None;
            }
        }
        self.last_report_ts = Some(now_ms);

        let total = self.recv_bytes + self.lost_bytes;
        if total == 0 {
            trace!("bwc: no bytes accounted this period, skipping report");
            return None;
        }

        let loss = self.lost_bytes as f64 / (total.max(1) as f64);
        self.current_loss_fraction = loss;
        let report = LossReport {
            loss_fraction: loss,
            recv_bytes: self.recv_bytes,
            lost_bytes: self.lost_bytes,
        };
        self.recv_bytes = 0;
        self.lost_bytes = 0;
        Some(report)
    }
}

impl Default for BandwidthController {
    fn default() -> Self {
        Self::new()
    }
}
