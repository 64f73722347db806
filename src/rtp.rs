//! RTP layer (C5): fragmentation on the way out, header parsing and
//! reassembly dispatch on the way in, spec.md §4.5.

use log::{trace, warn};

use crate::jitter::{AudioFrame, JitterBuffer};
use crate::packet_id;
use crate::wire::{self, flags, Header, HEADER_SIZE};
use crate::workbuf::{SlotOutcome, VideoFrame, WorkBuffer};

/// Ceiling on a single outbound wire packet, approximating the underlying
/// transport's own maximum payload size minus its framing overhead (the
/// transport itself, per spec.md §1, is an external oracle this crate never
/// touches directly).
pub const MAX_WIRE_PACKET: usize = 1400;

/// Per-direction media kind, used for packet-type assignment (§4.5) and for
/// selecting which reassembly buffer an inbound packet feeds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// A single fragment of an outbound `send_data` call, ready to hand to the
/// transport collaborator.
#[derive(Clone, Debug)]
pub struct OutboundPacket {
    pub packet_id: u8,
    pub bytes: Vec<u8>,
}

/// Result of feeding one inbound transport packet through [`RtpSession`].
#[derive(Debug)]
pub enum Ingress {
    /// Nothing ready yet (a fragment landed in an incomplete slot/holder).
    Pending,
    Audio(AudioFrame),
    Video(VideoFrame),
    /// An evicted, still-incomplete slot forced out by the `DROP_OLDEST`
    /// path — still handed to the decoder per spec.md §4.4/§4.5. The `bool`
    /// is `true` when this eviction exceeded the fresh-session grace window
    /// ([`RtpSession::consume_grace`]) and should be accounted as loss.
    VideoPartial(VideoFrame, bool),
}

/// Held single-slot fragment collector for legacy (16-bit, non-large-frame)
/// multipart audio/video, per spec.md §4.5 step 5 ("one-slot holder field
/// per session").
struct LegacyHolder {
    header: Header,
    buffer: Vec<u8>,
    received: u32,
}

/// One peer's RTP state: outbound sequence counter, inbound reassembly
/// buffers, and the receiving on/off toggle from `SPEC_FULL.md` §B.
pub struct RtpSession {
    next_seq: u16,
    jitter: JitterBuffer,
    workbuf: WorkBuffer,
    legacy_holder: Option<LegacyHolder>,
    receiving: bool,
    lossless_video: bool,
    /// First-N-missing-fragments grace counter for a freshly (re)started
    /// receive session, `SPEC_FULL.md` §B.
    grace_packets: u32,
}

/// Number of initial apparently-missing fragments not counted as loss in a
/// fresh receive session, `SPEC_FULL.md` §B.
pub const DISMISS_FIRST_LOST_PACKETS: u32 = 2;

impl RtpSession {
    pub fn new(jitter_capacity: u64) -> Self {
        RtpSession {
            next_seq: 0,
            jitter: JitterBuffer::new(jitter_capacity),
            workbuf: WorkBuffer::new(),
            legacy_holder: None,
            receiving: true,
            lossless_video: false,
            grace_packets: DISMISS_FIRST_LOST_PACKETS,
        }
    }

    pub fn jitter_mut(&mut self) -> &mut JitterBuffer {
        &mut self.jitter
    }

    pub fn jitter(&self) -> &JitterBuffer {
        &self.jitter
    }

    /// Enables/disables inbound processing for this stream, per
    /// `rtp_allow_receiving`/`rtp_stop_receiving` in `SPEC_FULL.md` §B.
    /// Disabling also resets the grace counter so re-enabling starts a
    /// fresh tolerant window.
    pub fn set_receiving(&mut self, on: bool) {
        self.receiving = on;
        if on {
            self.grace_packets = DISMISS_FIRST_LOST_PACKETS;
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    pub fn set_lossless_video(&mut self, on: bool) {
        self.lossless_video = on;
    }

    /// Consumes one grace slot if available; returns `true` if this missing
    /// fragment should be tolerated rather than counted as loss.
    pub fn consume_grace(&mut self) -> bool {
        if self.grace_packets > 0 {
            self.grace_packets -= 1;
            true
        } else {
            false
        }
    }

    /// Builds the outbound packet(s) for one media frame, fragmenting per
    /// spec.md §4.5 when it doesn't fit in [`MAX_WIRE_PACKET`].
    #[allow(clippy::too_many_arguments)]
    pub fn send_data(
        &mut self,
        kind: MediaKind,
        payload: &[u8],
        is_keyframe: bool,
        record_ts: u64,
        is_h264: bool,
        bitrate: u32,
        capture_delay_ms: u32,
        rotation: wire::Rotation,
    ) -> Vec<OutboundPacket> {
        let sequnum = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let mut header = Header {
            version: 0,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: is_keyframe,
            payload_type: payload_type_for(kind, self.lossless_video),
            sequence_number: sequnum,
            timestamp: record_ts as u32,
            ssrc: 0,
            flags: 0,
            offset_full: 0,
            length_full: payload.len() as u32,
            received_length_full: 0,
            record_timestamp: record_ts,
            fragment_num: 0,
            real_frame_num: 0,
            encoder_bitrate: bitrate,
            capture_delay_ms,
            offset_legacy: 0,
            length_legacy: 0,
        };
        header.set_flag(flags::LARGE_FRAME, true);
        header.set_flag(flags::KEY_FRAME, is_keyframe);
        header.set_flag(flags::HAS_RECORD_TIMESTAMP, true);
        header.set_flag(flags::IS_H264, is_h264);
        header.set_rotation(rotation);

        let pid = packet_id_for(kind, self.lossless_video);

        if 1 + HEADER_SIZE + payload.len() <= MAX_WIRE_PACKET {
            return vec![encode_packet(pid, &header, payload)];
        }

        let piece = MAX_WIRE_PACKET - HEADER_SIZE - 1;
        let mut packets = Vec::new();
        let mut offset = 0usize;
        let mut fragment_num = 0u32;
        while offset < payload.len() {
            let end = (offset + piece).min(payload.len());
            header.offset_full = offset as u32;
            header.fragment_num = fragment_num;
            packets.push(encode_packet(pid, &header, &payload[offset..end]));
            offset = end;
            fragment_num += 1;
        }
        packets
    }

    /// Dispatches one inbound transport packet, per spec.md §4.5.
    pub fn on_transport_packet(&mut self, data: &[u8]) -> Result<Ingress, failure::Error> {
        if data.is_empty() {
            failure::bail!("empty transport packet");
        }
        let pid = data[0];
        let kind = match pid {
            packet_id::LOSSY_AUDIO => MediaKind::Audio,
            packet_id::LOSSY_VIDEO | packet_id::LOSSLESS_VIDEO => MediaKind::Video,
            other => failure::bail!("on_transport_packet: unexpected packet id {:#x}, expected media packet", other),
        };

        if !self.receiving {
            trace!("rtp session not receiving, dropping inbound {:?} packet", kind);
            return Ok(Ingress::Pending);
        }

        if data.len() < 1 + HEADER_SIZE {
            failure::bail!("transport packet too short: {} bytes", data.len());
        }
        let header = wire::unpack_header(&data[1..])?;
        let expected_type = expected_payload_type(kind);
        if header.payload_type % 128 != expected_type {
            failure::bail!(
                "payload type mismatch: got {}, expected {} for {:?}",
                header.payload_type,
                expected_type,
                kind
            );
        }
        let payload = &data[1 + HEADER_SIZE..];

        if header.is_large_frame() && kind == MediaKind::Video {
            return Ok(self.ingest_large_video(&header, payload));
        }

        self.ingest_legacy(kind, &header, payload)
    }

    fn ingest_large_video(&mut self, header: &Header, payload: &[u8]) -> Ingress {
        self.workbuf.note_incoming_sequnum(header.sequence_number);
        let is_multipart = header.length() as usize > payload.len() || header.offset() != 0 || payload.len() < header.length() as usize;
        match self.workbuf.get_slot(is_multipart, header) {
            SlotOutcome::Index(idx) => match self.workbuf.fill_slot(idx, header, payload) {
                Ok(true) => match self.workbuf.process_frame(idx) {
                    Some(frame) => Ingress::Video(frame),
                    None => Ingress::Pending,
                },
                Ok(false) => Ingress::Pending,
                Err(e) => {
                    warn!("work buffer fill_slot failed: {}", e);
                    Ingress::Pending
                }
            },
            SlotOutcome::DropOldest => {
                let evicted = self.workbuf.force_evict_oldest();
                // Re-run placement for this packet now that room exists.
                if let SlotOutcome::Index(idx) = self.workbuf.get_slot(is_multipart, header) {
                    let _ = self.workbuf.fill_slot(idx, header, payload);
                }
                match evicted {
                    Some(frame) => {
                        let tolerated = self.consume_grace();
                        Ingress::VideoPartial(frame, !tolerated)
                    }
                    None => Ingress::Pending,
                }
            }
            SlotOutcome::DropIncoming => Ingress::Pending,
        }
    }

    fn ingest_legacy(&mut self, kind: MediaKind, header: &Header, payload: &[u8]) -> Result<Ingress, failure::Error> {
        let legacy_length = u32::from(header.length_legacy);
        if legacy_length == payload.len() as u32 {
            return Ok(self.deliver(kind, header, payload.to_vec()));
        }

        match &mut self.legacy_holder {
            Some(holder) if holder.header.sequence_number == header.sequence_number && holder.header.timestamp == header.timestamp => {
                let offset = u32::from(header.offset_legacy) as usize;
                if offset + payload.len() > holder.buffer.len() {
                    failure::bail!("legacy fragment overruns held buffer");
                }
                holder.buffer[offset..offset + payload.len()].copy_from_slice(payload);
                holder.received += payload.len() as u32;
                if holder.received >= legacy_length {
                    let holder = self.legacy_holder.take().unwrap();
                    return Ok(self.deliver(kind, &holder.header, holder.buffer));
                }
                Ok(Ingress::Pending)
            }
            _ => {
                let mut buffer = vec![0u8; legacy_length as usize];
                let offset = u32::from(header.offset_legacy) as usize;
                if offset + payload.len() > buffer.len() {
                    failure::bail!("legacy fragment overruns new buffer");
                }
                buffer[offset..offset + payload.len()].copy_from_slice(payload);
                self.legacy_holder = Some(LegacyHolder {
                    header: *header,
                    buffer,
                    received: payload.len() as u32,
                });
                Ok(Ingress::Pending)
            }
        }
    }

    fn deliver(&mut self, kind: MediaKind, header: &Header, payload: Vec<u8>) -> Ingress {
        match kind {
            MediaKind::Audio => {
                let frame = AudioFrame {
                    payload,
                    sequnum: header.sequence_number,
                    record_timestamp: header.timestamp,
                };
                self.jitter.write(frame.clone());
                Ingress::Audio(frame)
            }
            MediaKind::Video => Ingress::Video(VideoFrame {
                header: *header,
                payload,
                complete: true,
            }),
        }
    }
}

fn packet_id_for(kind: MediaKind, lossless_video: bool) -> u8 {
    match kind {
        MediaKind::Audio => packet_id::LOSSY_AUDIO,
        MediaKind::Video if lossless_video => packet_id::LOSSLESS_VIDEO,
        MediaKind::Video => packet_id::LOSSY_VIDEO,
    }
}

fn payload_type_for(kind: MediaKind, lossless_video: bool) -> u8 {
    packet_id_for(kind, lossless_video) % 128
}

fn expected_payload_type(kind: MediaKind) -> u8 {
    match kind {
        MediaKind::Audio => packet_id::LOSSY_AUDIO % 128,
        MediaKind::Video => packet_id::LOSSY_VIDEO % 128,
    }
}

fn encode_packet(pid: u8, header: &Header, payload: &[u8]) -> OutboundPacket {
    let mut bytes = Vec::with_capacity(1 + HEADER_SIZE + payload.len());
    bytes.push(pid);
    bytes.extend_from_slice(&wire::pack_header(header));
    bytes.extend_from_slice(payload);
    OutboundPacket { packet_id: pid, bytes }
}
