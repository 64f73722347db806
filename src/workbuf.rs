//! Video work buffer (C4): a small slot table that reassembles multipart
//! video frames, spec.md §4.4.
//!
//! Grounded in the same "few owned slots, linear scan, force-evict oldest"
//! shape the teacher uses for its RTP reorder buffers in
//! `rtsp/src/client/rtp.rs`, adapted from "reorder by sequence number" to
//! "reassemble by `(sequnum, timestamp)` identity."

use log::{debug, warn};

use crate::wire::Header;

/// Number of slots in the work buffer, spec.md §3 ("≈5").
pub const SLOT_COUNT: usize = 5;

/// How long (in incoming-packet count, not wall time) a keyframe slot is
/// protected from the gap-heuristic eviction in [`WorkBuffer::on_slot_filled`]
/// — SPEC_FULL.md §B, grounded in the original's
/// `VIDEO_KEEP_KEYFRAME_IN_BUFFER_FOR_MS` intent but expressed as a packet
/// counter since this module has no wall clock of its own.
pub const KEYFRAME_GRACE_PACKETS: u32 = 10;

/// After this many consecutive out-of-order ("old") sequence numbers, treat
/// it as a rollover rather than jitter, spec.md §4.4.
const ROLLOVER_THRESHOLD: u32 = 6;

#[derive(Clone, Debug)]
struct Slot {
    sequnum: u16,
    timestamp: u32,
    header: Header,
    buffer: Vec<u8>,
    received: u32,
    full_length: u32,
    is_keyframe: bool,
    packets_since_fill: u32,
}

impl Slot {
    fn complete(&self) -> bool {
        self.received >= self.full_length
    }
}

/// Finished frame handed off to the decoder collaborator.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub header: Header,
    pub payload: Vec<u8>,
    pub complete: bool,
}

/// Outcome of [`WorkBuffer::get_slot`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SlotOutcome {
    Index(usize),
    DropOldest,
    DropIncoming,
}

/// Extra headroom allocated past a frame's declared `full_length` to absorb
/// codec container overhead, mirroring the original's `codec_padding` slack.
const CODEC_PADDING: usize = 1024;

pub struct WorkBuffer {
    slots: Vec<Slot>,
    last_seen_seq: Option<u16>,
    old_frame_streak: u32,
}

impl WorkBuffer {
    pub fn new() -> Self {
        WorkBuffer {
            slots: Vec::with_capacity(SLOT_COUNT),
            last_seen_seq: None,
            old_frame_streak: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Updates rollover/skew tracking for an incoming sequence number;
    /// should be called once per accepted packet ahead of [`Self::get_slot`].
    pub fn note_incoming_sequnum(&mut self, sequnum: u16) {
        if let Some(last) = self.last_seen_seq {
            if sequnum < last {
                self.old_frame_streak += 1;
                if self.old_frame_streak >= ROLLOVER_THRESHOLD {
                    debug!("work buffer: treating {} consecutive old sequence numbers as rollover", self.old_frame_streak);
                    self.last_seen_seq = Some(sequnum);
                    self.old_frame_streak = 0;
                }
                return;
            }
        }
        self.old_frame_streak = 0;
        self.last_seen_seq = Some(sequnum);
    }

    /// Finds or allocates a slot for an incoming (possibly multipart)
    /// packet, per spec.md §4.4.
    pub fn get_slot(&mut self, is_multipart: bool, header: &Header) -> SlotOutcome {
        if self.slots.is_empty() {
            return SlotOutcome::Index(0);
        }
        if is_multipart {
            if let Some(idx) = self
                .slots
                .iter()
                .position(|s| s.sequnum == header.sequence_number && s.timestamp == header.timestamp)
            {
                return SlotOutcome::Index(idx);
            }
        }
        if self.slots.len() < SLOT_COUNT {
            return SlotOutcome::Index(self.slots.len());
        }
        SlotOutcome::DropOldest
    }

    /// Writes `payload` into the slot identified by `index`, allocating it
    /// first if this is the slot's first packet. Returns `true` once the
    /// slot's declared `full_length` has been fully received.
    pub fn fill_slot(&mut self, index: usize, header: &Header, payload: &[u8]) -> Result<bool, failure::Error> {
        if index == self.slots.len() {
            self.slots.push(Slot {
                sequnum: header.sequence_number,
                timestamp: header.timestamp,
                header: *header,
                buffer: vec![0u8; header.length() as usize + CODEC_PADDING],
                received: 0,
                full_length: header.length(),
                is_keyframe: header.is_keyframe(),
                packets_since_fill: 0,
            });
        }
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| failure::format_err!("work buffer: slot index {} out of range", index))?;

        let offset = header.offset() as usize;
        let payload_len = payload.len();
        if offset + payload_len > slot.full_length as usize {
            failure::bail!(
                "work buffer: fragment offset {} + len {} exceeds full_length {}",
                offset,
                payload_len,
                slot.full_length
            );
        }
        slot.buffer[offset..offset + payload_len].copy_from_slice(payload);
        slot.received += payload_len as u32;
        if header.is_keyframe() {
            slot.is_keyframe = true;
        }
        let done = slot.complete();
        self.on_slot_filled(index);
        Ok(done)
    }

    /// Gap heuristic from spec.md §4.4: after filling a slot at `k > 0`, if
    /// slot 0 is stale relative to it (more than two sequence numbers
    /// behind) and isn't within its keyframe grace window, evict slot 0.
    fn on_slot_filled(&mut self, filled_index: usize) {
        for slot in &mut self.slots {
            slot.packets_since_fill += 1;
        }
        if filled_index == 0 || self.slots.len() < 2 {
            return;
        }
        let stale = {
            let head = &self.slots[0];
            let filled = &self.slots[filled_index];
            head.sequnum.wrapping_add(2) < filled.sequnum
                && !(head.is_keyframe && head.packets_since_fill <= KEYFRAME_GRACE_PACKETS)
        };
        if stale {
            debug!("work buffer: evicting stale slot 0 (seq {}) behind newer slot", self.slots[0].sequnum);
            let evicted = self.slots.remove(0);
            if evicted.received > 0 {
                warn!("work buffer: discarding incomplete stale slot, {}/{} bytes", evicted.received, evicted.full_length);
            }
        }
    }

    /// Moves the slot at `index` out, shifting later slots down to close
    /// the gap. Returns `None` if a slot has no payload at all yet (should
    /// not normally happen, but guards against an index into a just-removed
    /// slot).
    pub fn process_frame(&mut self, index: usize) -> Option<VideoFrame> {
        if index >= self.slots.len() {
            return None;
        }
        let slot = self.slots.remove(index);
        let complete = slot.complete();
        Some(VideoFrame {
            header: slot.header,
            payload: slot.buffer[..slot.received as usize].to_vec(),
            complete,
        })
    }

    /// Force-delivers slot 0, per the `DROP_OLDEST` eviction path in
    /// spec.md §4.4 (delivered to the decoder even if incomplete).
    pub fn force_evict_oldest(&mut self) -> Option<VideoFrame> {
        self.process_frame(0)
    }
}

impl Default for WorkBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::flags;

    fn header(seq: u16, ts: u32, full_length: u32, keyframe: bool) -> Header {
        let mut h = Header {
            sequence_number: seq,
            timestamp: ts,
            length_full: full_length,
            payload_type: 96,
            ..Header::default()
        };
        h.set_flag(flags::LARGE_FRAME, true);
        h.set_flag(flags::KEY_FRAME, keyframe);
        h
    }

    #[test]
    fn get_slot_on_empty_buffer_returns_zero() {
        let mut buf = WorkBuffer::new();
        let h = header(1, 100, 10, false);
        assert_eq!(buf.get_slot(true, &h), SlotOutcome::Index(0));
    }

    #[test]
    fn multipart_packet_finds_existing_slot() {
        let mut buf = WorkBuffer::new();
        let h = header(1, 100, 20, false);
        let idx = match buf.get_slot(true, &h) {
            SlotOutcome::Index(i) => i,
            other => panic!("unexpected {:?}", other),
        };
        buf.fill_slot(idx, &h, &[1, 2, 3, 4, 5]).unwrap();

        // A second fragment of the same (sequnum, timestamp) should land in the same slot.
        let mut h2 = h;
        h2.offset_full = 5;
        assert_eq!(buf.get_slot(true, &h2), SlotOutcome::Index(0));
    }

    #[test]
    fn fill_slot_completes_when_full_length_reached() {
        let mut buf = WorkBuffer::new();
        let h = header(1, 100, 4, false);
        let done = buf.fill_slot(0, &h, &[1, 2, 3, 4]).unwrap();
        assert!(done);
    }

    #[test]
    fn fill_slot_rejects_out_of_bounds_fragment() {
        let mut buf = WorkBuffer::new();
        let h = header(1, 100, 4, false);
        let mut h2 = h;
        h2.offset_full = 2;
        let err = buf.fill_slot(0, &h2, &[1, 2, 3, 4]).unwrap_err();
        assert!(err.to_string().contains("exceeds full_length"));
    }

    #[test]
    fn slot_count_caps_at_slot_count_then_drops_oldest() {
        let mut buf = WorkBuffer::new();
        for i in 0..SLOT_COUNT {
            let h = header(i as u16, 100 + i as u32, 4, false);
            let idx = match buf.get_slot(false, &h) {
                SlotOutcome::Index(idx) => idx,
                other => panic!("unexpected {:?}", other),
            };
            buf.fill_slot(idx, &h, &[0, 0, 0, 0]).unwrap();
        }
        let h = header(99, 999, 4, false);
        assert_eq!(buf.get_slot(false, &h), SlotOutcome::DropOldest);
    }

    #[test]
    fn process_frame_shifts_later_slots_down() {
        let mut buf = WorkBuffer::new();
        let h0 = header(0, 100, 4, false);
        let h1 = header(1, 101, 4, false);
        buf.fill_slot(0, &h0, &[1, 1, 1, 1]).unwrap();
        buf.fill_slot(1, &h1, &[2, 2, 2, 2]).unwrap();
        let frame = buf.process_frame(0).unwrap();
        assert_eq!(frame.payload, vec![1, 1, 1, 1]);
        assert_eq!(buf.len(), 1);
        // The old slot 1 is now at index 0.
        let remaining = buf.process_frame(0).unwrap();
        assert_eq!(remaining.payload, vec![2, 2, 2, 2]);
    }

    #[test]
    fn gap_heuristic_evicts_stale_head_slot() {
        let mut buf = WorkBuffer::new();
        let h0 = header(0, 100, 8, false);
        buf.fill_slot(0, &h0, &[1, 1, 1, 1]).unwrap(); // incomplete, stays open

        let h1 = header(10, 200, 4, false); // sequnum far ahead of slot 0's 0+2
        let idx = match buf.get_slot(false, &h1) {
            SlotOutcome::Index(i) => i,
            other => panic!("unexpected {:?}", other),
        };
        buf.fill_slot(idx, &h1, &[2, 2, 2, 2]).unwrap();

        // Slot 0 should have been evicted by the gap heuristic; only the newer frame remains.
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn keyframe_slot_is_protected_during_grace_window() {
        let mut buf = WorkBuffer::new();
        let h0 = header(0, 100, 8, true); // keyframe, incomplete
        buf.fill_slot(0, &h0, &[1, 1, 1, 1]).unwrap();

        let h1 = header(10, 200, 4, false);
        let idx = match buf.get_slot(false, &h1) {
            SlotOutcome::Index(i) => i,
            other => panic!("unexpected {:?}", other),
        };
        buf.fill_slot(idx, &h1, &[2, 2, 2, 2]).unwrap();

        // Both slots remain: the keyframe is protected within its grace window.
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn rollover_resets_after_six_consecutive_old_sequence_numbers() {
        let mut buf = WorkBuffer::new();
        buf.note_incoming_sequnum(100);
        for seq in [50, 51, 52, 53, 54, 55] {
            buf.note_incoming_sequnum(seq);
        }
        // After 6 consecutive "old" numbers, the tracker should have reset to the latest.
        assert_eq!(buf.last_seen_seq, Some(55));
        assert_eq!(buf.old_frame_streak, 0);
    }
}
