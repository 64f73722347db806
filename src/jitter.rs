//! Audio jitter buffer (C3): a bounded ring of completed Opus-payload
//! frames, spec.md §4.3.
//!
//! Sized like the teacher's demux buffers in spirit (a small ring fed from
//! one side, drained from the other under a lock) but purpose-built for the
//! "codec-conceal or deliver" read protocol §4.3 describes, rather than
//! anything copied directly from one teacher file.

use std::collections::VecDeque;

use log::{debug, warn};

/// One reassembled audio frame as handed off by the RTP layer (C5):
/// the frame's own Opus payload, its original sequence number, and the
/// sender's record timestamp.
#[derive(Clone, Debug)]
pub struct AudioFrame {
    pub payload: Vec<u8>,
    pub sequnum: u16,
    pub record_timestamp: u32,
}

/// Outcome of [`JitterBuffer::read`].
#[derive(Debug)]
pub enum ReadOutcome {
    /// A frame is ready to decode normally.
    Frame(AudioFrame),
    /// The buffer has fallen behind: drop the oldest pending slot and ask
    /// the caller to run the decoder's packet-loss-concealment path.
    Plc,
    /// Nothing pending.
    Empty,
}

/// Bounded ring of audio frames awaiting decode.
///
/// `bottom` and `top` are unbounded monotonic counters rather than indices
/// folded into `0..size` — see `SPEC_FULL.md` §C for why this sidesteps the
/// `top - bottom > C` wraparound ambiguity in the original rather than
/// reproducing it: the invariant `count == top - bottom` holds exactly for
/// the lifetime of the process, no modular arithmetic needed on the
/// counters themselves (only on the slot index `n % size`).
pub struct JitterBuffer {
    capacity: u64,
    size: u64,
    slots: Vec<Option<AudioFrame>>,
    bottom: u64,
    top: u64,
}

impl JitterBuffer {
    /// Allocates a ring sized to the smallest power of two `>= 4*capacity`.
    pub fn new(capacity: u64) -> Self {
        assert!(capacity > 0, "jitter buffer capacity must be positive");
        let size = (4 * capacity).next_power_of_two();
        JitterBuffer {
            capacity,
            size,
            slots: vec![None; size as usize],
            bottom: 0,
            top: 0,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn count(&self) -> u64 {
        self.top - self.bottom
    }

    fn slot_index(&self, n: u64) -> usize {
        (n % self.size) as usize
    }

    /// Stores `frame` at the write cursor. Returns `false` (no-op) if the
    /// buffer is full or the target slot is unexpectedly occupied —
    /// matching the original `write` returning `-1` rather than panicking.
    ///
    /// Frames are accepted strictly in call order, ignoring `sequnum` —
    /// out-of-order delivery is the RTP layer's problem (C5 reorders within
    /// a multipart reassembly window), not the jitter buffer's; this
    /// preserves the original's arrival-order FIFO behavior verbatim (see
    /// `SPEC_FULL.md` §C).
    pub fn write(&mut self, frame: AudioFrame) -> bool {
        if self.count() >= self.capacity {
            debug!("jitter buffer full at capacity {}, dropping frame", self.capacity);
            return false;
        }
        let idx = self.slot_index(self.top);
        if self.slots[idx].is_some() {
            warn!("jitter buffer slot {} unexpectedly occupied on write", idx);
            return false;
        }
        self.slots[idx] = Some(frame);
        self.top += 1;
        true
    }

    /// Pops the oldest pending frame, or signals PLC/empty per §4.3.
    pub fn read(&mut self) -> ReadOutcome {
        let idx = self.slot_index(self.bottom);
        if let Some(frame) = self.slots[idx].take() {
            self.bottom += 1;
            return ReadOutcome::Frame(frame);
        }
        if self.top.saturating_sub(self.bottom) > self.capacity {
            self.bottom += 1;
            return ReadOutcome::Plc;
        }
        ReadOutcome::Empty
    }

    /// Frees all pending frames without decoding them.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.bottom = self.top;
    }
}

/// How full the buffer is relative to its capacity, used by
/// [`AudioIterator::fill_level`] to decide whether to yield to video.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FillLevel {
    Idle,
    Normal,
    /// Above `FILL_THRESHOLD`: the caller should let the video path run
    /// first this tick.
    SlowDown,
}

/// Decoded-PCM handoff the audio iterate loop produces for the
/// audio-receive callback, spec.md §4.3.
#[derive(Clone, Debug)]
pub struct DecodedAudio {
    pub pcm: Vec<i16>,
    pub sample_count: usize,
    pub channels: u8,
    pub sampling_rate: u32,
}

/// Minimum time between decoder reconfigurations, per §4.3.
pub const RECONFIGURE_MIN_INTERVAL_MS: u64 = 500;

/// PCM buffer sizing target: 120ms of audio at up to 48kHz stereo.
pub const PCM_BUFFER_FRAME_DURATION_MS: u32 = 120;
pub const PCM_MAX_SAMPLING_RATE_HZ: u32 = 48_000;
pub const PCM_MAX_CHANNELS: u8 = 2;

/// Drives the "iterate protocol for audio" in §4.3: inspects fill level,
/// then drains the ring into the decoder collaborator.
///
/// The decoder itself is an external collaborator (the crate's
/// [`crate::codec::AudioBackend`]); this only implements the buffer-facing
/// control flow (reconfigure throttling, PLC dispatch, learned frame
/// duration bookkeeping) around it.
pub struct AudioIterator {
    fill_threshold: u64,
    current_rate: u32,
    current_channels: u8,
    last_reconfigure_ts: Option<u64>,
    learned_frame_duration_ms: u32,
}

impl AudioIterator {
    pub fn new(capacity: u64) -> Self {
        AudioIterator {
            fill_threshold: capacity.saturating_mul(2),
            current_rate: 0,
            current_channels: 0,
            last_reconfigure_ts: None,
            learned_frame_duration_ms: 0,
        }
    }

    pub fn learned_frame_duration_ms(&self) -> u32 {
        self.learned_frame_duration_ms
    }

    pub fn fill_level(&self, buf: &JitterBuffer) -> FillLevel {
        if buf.count() == 0 {
            FillLevel::Idle
        } else if buf.count() > self.fill_threshold {
            FillLevel::SlowDown
        } else {
            FillLevel::Normal
        }
    }

    /// Returns `true` if a decoder reconfigure to `(rate, channels)` is
    /// allowed right now (either the pair changed, or it didn't and no
    /// reconfigure is needed at all). `now_ms` is checked against the
    /// 500ms minimum interval only when a change is actually requested.
    pub fn try_reconfigure(&mut self, rate: u32, channels: u8, now_ms: u64) -> bool {
        if rate == self.current_rate && channels == self.current_channels {
            return true;
        }
        if let Some(last) = self.last_reconfigure_ts {
            if now_ms.saturating_sub(last) < RECONFIGURE_MIN_INTERVAL_MS {
                debug!(
                    "audio decoder reconfigure to {}Hz/{}ch suppressed, {}ms since last",
                    rate,
                    channels,
                    now_ms.saturating_sub(last)
                );
                return false;
            }
        }
        self.current_rate = rate;
        self.current_channels = channels;
        self.last_reconfigure_ts = Some(now_ms);
        true
    }

    /// Records a successfully decoded frame's sample count against the
    /// sampling rate, updating the learned frame duration used for pacing.
    pub fn record_decoded_samples(&mut self, samples: usize, rate: u32) {
        if rate > 0 {
            self.learned_frame_duration_ms = ((samples as u64 * 1000) / u64::from(rate)) as u32;
        }
    }

    /// Frame size (in samples) to request from the decoder's
    /// loss-concealment path, given the last known sampling rate.
    pub fn plc_frame_size(&self, frame_duration_ms: u32) -> usize {
        (u64::from(self.current_rate) * u64::from(frame_duration_ms) / 1000) as usize
    }
}

/// Convenience FIFO of decode results accumulated during one `iterate`
/// call, drained by the caller after the buffer's mutex is released — see
/// the callback-outside-the-lock policy in `SPEC_FULL.md` §A.
#[derive(Default)]
pub struct PendingAudioCallbacks {
    queue: VecDeque<DecodedAudio>,
}

impl PendingAudioCallbacks {
    pub fn push(&mut self, decoded: DecodedAudio) {
        self.queue.push_back(decoded);
    }

    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, DecodedAudio> {
        self.queue.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u16) -> AudioFrame {
        AudioFrame {
            payload: vec![0u8; 4],
            sequnum: seq,
            record_timestamp: 0,
        }
    }

    #[test]
    fn size_rounds_up_to_power_of_two_times_four() {
        let buf = JitterBuffer::new(3);
        assert_eq!(buf.size, 16); // 4*3=12 -> next_power_of_two = 16
        let buf = JitterBuffer::new(4);
        assert_eq!(buf.size, 16); // 4*4=16 already a power of two
    }

    #[test]
    fn write_fails_when_at_capacity() {
        let mut buf = JitterBuffer::new(2);
        assert!(buf.write(frame(0)));
        assert!(buf.write(frame(1)));
        assert!(!buf.write(frame(2)));
        assert_eq!(buf.count(), 2);
    }

    #[test]
    fn read_drains_in_fifo_order_regardless_of_sequnum() {
        let mut buf = JitterBuffer::new(4);
        buf.write(frame(5));
        buf.write(frame(1)); // lower sequnum, arrives second: still read second.
        match buf.read() {
            ReadOutcome::Frame(f) => assert_eq!(f.sequnum, 5),
            other => panic!("expected Frame, got {:?}", other),
        }
        match buf.read() {
            ReadOutcome::Frame(f) => assert_eq!(f.sequnum, 1),
            other => panic!("expected Frame, got {:?}", other),
        }
    }

    #[test]
    fn read_on_empty_buffer_reports_empty() {
        let mut buf = JitterBuffer::new(4);
        assert!(matches!(buf.read(), ReadOutcome::Empty));
    }

    #[test]
    fn read_past_window_reports_plc_and_advances() {
        let mut buf = JitterBuffer::new(2);
        // Manually push top ahead of bottom by more than capacity without
        // filling the intervening slots, simulating frames dropped in transit.
        buf.top = 5;
        buf.bottom = 0;
        match buf.read() {
            ReadOutcome::Plc => {}
            other => panic!("expected Plc, got {:?}", other),
        }
        assert_eq!(buf.bottom, 1);
    }

    #[test]
    fn clear_empties_all_slots() {
        let mut buf = JitterBuffer::new(4);
        buf.write(frame(0));
        buf.write(frame(1));
        buf.clear();
        assert_eq!(buf.count(), 0);
        assert!(matches!(buf.read(), ReadOutcome::Empty));
    }

    #[test]
    fn fill_level_transitions() {
        let buf_cap = 4;
        let mut buf = JitterBuffer::new(buf_cap);
        let iter = AudioIterator::new(buf_cap);
        assert_eq!(iter.fill_level(&buf), FillLevel::Idle);
        buf.write(frame(0));
        assert_eq!(iter.fill_level(&buf), FillLevel::Normal);
        buf.top = buf.bottom + 9; // above 2*capacity threshold
        assert_eq!(iter.fill_level(&buf), FillLevel::SlowDown);
    }

    #[test]
    fn reconfigure_is_throttled_within_500ms() {
        let mut iter = AudioIterator::new(4);
        assert!(iter.try_reconfigure(48_000, 2, 0));
        assert!(!iter.try_reconfigure(16_000, 1, 100));
        assert!(iter.try_reconfigure(16_000, 1, 600));
    }

    #[test]
    fn reconfigure_to_same_pair_is_always_allowed() {
        let mut iter = AudioIterator::new(4);
        assert!(iter.try_reconfigure(48_000, 2, 0));
        assert!(iter.try_reconfigure(48_000, 2, 1));
    }

    #[test]
    fn learned_frame_duration_tracks_samples_over_rate() {
        let mut iter = AudioIterator::new(4);
        iter.record_decoded_samples(5_760, 48_000); // 120ms @ 48kHz
        assert_eq!(iter.learned_frame_duration_ms(), 120);
    }
}
