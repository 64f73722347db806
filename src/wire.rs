//! Wire codec (C1): the fixed 80-byte RTP-style header, and the control
//! side-channel / MSI broadcast framing.
//!
//! Field order and sizes follow spec.md §3 and §6.1 byte-for-byte. This
//! mirrors the way the teacher parses RTSP/SDP text fields in
//! `rtsp/src/client/parse.rs` — small, single-purpose functions that bail
//! out with a descriptive message rather than panicking on malformed input.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use failure::{bail, Error};

/// Size in bytes of the packed [`Header`] on the wire.
pub const HEADER_SIZE: usize = 80;

/// Flag bits of [`Header::flags`] (spec.md §6.1).
pub mod flags {
    /// Offset/length are carried in the 32-bit fields rather than the
    /// legacy 16-bit ones.
    pub const LARGE_FRAME: u64 = 1 << 0;
    /// This fragment is part of a key frame.
    pub const KEY_FRAME: u64 = 1 << 1;
    /// `record_timestamp` is meaningful.
    pub const HAS_RECORD_TIMESTAMP: u64 = 1 << 2;
    /// Video payload is H.264 (unset means VP8/VP9).
    pub const IS_H264: u64 = 1 << 3;
    /// Low bit of the 2-bit rotation angle.
    pub const ROT_BIT0: u64 = 1 << 4;
    /// High bit of the 2-bit rotation angle.
    pub const ROT_BIT1: u64 = 1 << 5;
    /// All bits not named above must be zero on send.
    pub const RESERVED_MASK: u64 = !(LARGE_FRAME | KEY_FRAME | HAS_RECORD_TIMESTAMP | IS_H264 | ROT_BIT0 | ROT_BIT1);
}

/// Video rotation, carried as a 2-bit field packed into [`Header::flags`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    fn from_bits(bit0: bool, bit1: bool) -> Self {
        match (bit1, bit0) {
            (false, false) => Rotation::Deg0,
            (false, true) => Rotation::Deg90,
            (true, false) => Rotation::Deg180,
            (true, true) => Rotation::Deg270,
        }
    }

    fn to_bits(self) -> (bool, bool) {
        match self {
            Rotation::Deg0 => (false, false),
            Rotation::Deg90 => (true, false),
            Rotation::Deg180 => (false, true),
            Rotation::Deg270 => (true, true),
        }
    }
}

/// The 80-byte frame header prepended to every RTP-carried media packet.
///
/// The in-memory representation is wider than the packed form (fields are
/// plain Rust integers rather than C bitfields), matching the teacher's note
/// in spec.md §4.1 that "the packed representation is 80 bytes; the
/// in-memory representation may be wider."
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Header {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub flags: u64,
    pub offset_full: u32,
    pub length_full: u32,
    pub received_length_full: u32,
    pub record_timestamp: u64,
    pub fragment_num: u32,
    pub real_frame_num: u32,
    pub encoder_bitrate: u32,
    pub capture_delay_ms: u32,
    pub offset_legacy: u16,
    pub length_legacy: u16,
}

impl Header {
    pub fn has_flag(&self, bit: u64) -> bool {
        self.flags & bit != 0
    }

    pub fn set_flag(&mut self, bit: u64, on: bool) {
        if on {
            self.flags |= bit;
        } else {
            self.flags &= !bit;
        }
    }

    pub fn is_large_frame(&self) -> bool {
        self.has_flag(flags::LARGE_FRAME)
    }

    pub fn is_keyframe(&self) -> bool {
        self.has_flag(flags::KEY_FRAME)
    }

    pub fn rotation(&self) -> Rotation {
        Rotation::from_bits(self.has_flag(flags::ROT_BIT0), self.has_flag(flags::ROT_BIT1))
    }

    pub fn set_rotation(&mut self, rot: Rotation) {
        let (bit0, bit1) = rot.to_bits();
        self.set_flag(flags::ROT_BIT0, bit0);
        self.set_flag(flags::ROT_BIT1, bit1);
    }

    /// Effective offset of this fragment, preferring the 32-bit field when
    /// [`flags::LARGE_FRAME`] is set and falling back to the legacy 16-bit
    /// field otherwise.
    pub fn offset(&self) -> u32 {
        if self.is_large_frame() {
            self.offset_full
        } else {
            u32::from(self.offset_legacy)
        }
    }

    /// Effective full-frame length; see [`Header::offset`].
    pub fn length(&self) -> u32 {
        if self.is_large_frame() {
            self.length_full
        } else {
            u32::from(self.length_legacy)
        }
    }
}

/// Serializes `h` into its 80-byte wire form.
pub fn pack_header(h: &Header) -> [u8; HEADER_SIZE] {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE);
    let byte0 = ((h.version & 0x3) << 6) | (u8::from(h.padding) << 5) | (u8::from(h.extension) << 4) | (h.csrc_count & 0xf);
    buf.put_u8(byte0);
    buf.put_u8((u8::from(h.marker) << 7) | (h.payload_type & 0x7f));
    buf.put_u16(h.sequence_number);
    buf.put_u32(h.timestamp);
    buf.put_u32(h.ssrc);
    buf.put_u64(h.flags & !flags::RESERVED_MASK);
    buf.put_u32(h.offset_full);
    buf.put_u32(h.length_full);
    buf.put_u32(h.received_length_full);
    buf.put_u64(h.record_timestamp);
    buf.put_u32(h.fragment_num);
    buf.put_u32(h.real_frame_num);
    buf.put_u32(h.encoder_bitrate);
    buf.put_u32(h.capture_delay_ms);
    buf.put_bytes(0, 20); // reserved: 5 x u32 zero
    buf.put_u16(h.offset_legacy);
    buf.put_u16(h.length_legacy);
    debug_assert_eq!(buf.len(), HEADER_SIZE);
    let mut out = [0u8; HEADER_SIZE];
    out.copy_from_slice(&buf);
    out
}

/// Parses a [`Header`] from its 80-byte wire form. `data` may be longer than
/// 80 bytes (the payload follows); only the first [`HEADER_SIZE`] bytes are
/// consumed.
pub fn unpack_header(data: &[u8]) -> Result<Header, Error> {
    if data.len() < HEADER_SIZE {
        bail!("RTP header too short: {} bytes, need at least {}", data.len(), HEADER_SIZE);
    }
    let mut buf = &data[..HEADER_SIZE];
    let byte0 = buf.get_u8();
    let byte1 = buf.get_u8();
    let version = (byte0 >> 6) & 0x3;
    let extension = (byte0 & 0x10) != 0;
    let padding = (byte0 & 0x20) != 0;
    let csrc_count = byte0 & 0xf;
    let marker = (byte1 & 0x80) != 0;
    let payload_type = byte1 & 0x7f;
    let sequence_number = buf.get_u16();
    let timestamp = buf.get_u32();
    let ssrc = buf.get_u32();
    let flags = buf.get_u64();
    let offset_full = buf.get_u32();
    let length_full = buf.get_u32();
    let received_length_full = buf.get_u32();
    let record_timestamp = buf.get_u64();
    let fragment_num = buf.get_u32();
    let real_frame_num = buf.get_u32();
    let encoder_bitrate = buf.get_u32();
    let capture_delay_ms = buf.get_u32();
    buf.advance(20); // reserved: 5 x u32, ignored on receive
    let offset_legacy = buf.get_u16();
    let length_legacy = buf.get_u16();
    Ok(Header {
        version,
        padding,
        extension,
        csrc_count,
        marker,
        payload_type,
        sequence_number,
        timestamp,
        ssrc,
        flags,
        offset_full,
        length_full,
        received_length_full,
        record_timestamp,
        fragment_num,
        real_frame_num,
        encoder_bitrate,
        capture_delay_ms,
        offset_legacy,
        length_legacy,
    })
}

/// Subtype byte of a comm-channel (side-channel) control message,
/// spec.md §4.10/§6.1.
pub mod subtype {
    pub const REQUEST_KEYFRAME: u8 = 1;
    pub const HAVE_H264_VIDEO: u8 = 2;
    pub const LESS_VIDEO_FPS: u8 = 3;
    pub const CLOCK_REQUEST: u8 = 4;
    pub const CLOCK_ANSWER: u8 = 5;
}

/// A parsed comm-channel message (without the leading transport packet id).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlMessage {
    RequestKeyframe,
    HaveH264Video,
    LessVideoFps { n: u8 },
    ClockRequest { t0: u32 },
    ClockAnswer { echo_t0: u32, remote_t1: u32, remote_t2: u32 },
}

impl ControlMessage {
    pub fn pack(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(9);
        match *self {
            ControlMessage::RequestKeyframe => {
                buf.put_u8(subtype::REQUEST_KEYFRAME);
            }
            ControlMessage::HaveH264Video => {
                buf.put_u8(subtype::HAVE_H264_VIDEO);
            }
            ControlMessage::LessVideoFps { n } => {
                buf.put_u8(subtype::LESS_VIDEO_FPS);
                buf.put_u8(n);
            }
            ControlMessage::ClockRequest { t0 } => {
                buf.put_u8(subtype::CLOCK_REQUEST);
                buf.put_u32(t0);
            }
            ControlMessage::ClockAnswer { echo_t0, remote_t1, remote_t2 } => {
                buf.put_u8(subtype::CLOCK_ANSWER);
                buf.put_u32(echo_t0);
                buf.put_u32(remote_t1);
                buf.put_u32(remote_t2);
            }
        }
        buf.freeze()
    }

    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.is_empty() {
            bail!("empty comm-channel message");
        }
        let mut buf = &data[1..];
        Ok(match data[0] {
            subtype::REQUEST_KEYFRAME => ControlMessage::RequestKeyframe,
            subtype::HAVE_H264_VIDEO => ControlMessage::HaveH264Video,
            subtype::LESS_VIDEO_FPS => {
                if buf.remaining() < 1 {
                    bail!("LESS_VIDEO_FPS message missing payload byte");
                }
                let n = buf.get_u8();
                if !(2..10).contains(&n) {
                    bail!("LESS_VIDEO_FPS n={} out of range (1, 10)", n);
                }
                ControlMessage::LessVideoFps { n }
            }
            subtype::CLOCK_REQUEST => {
                if buf.remaining() < 4 {
                    bail!("CLOCK_REQUEST message truncated");
                }
                ControlMessage::ClockRequest { t0: buf.get_u32() }
            }
            subtype::CLOCK_ANSWER => {
                if buf.remaining() < 12 {
                    bail!("CLOCK_ANSWER message truncated");
                }
                ControlMessage::ClockAnswer {
                    echo_t0: buf.get_u32(),
                    remote_t1: buf.get_u32(),
                    remote_t2: buf.get_u32(),
                }
            }
            other => bail!("unknown comm-channel subtype {}", other),
        })
    }
}

/// MSI broadcast type, distinguishing the handful of MSI signaling messages
/// carried over the lossless MSI control channel (spec.md §4.9).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BroadcastType {
    Invite,
    Start,
    CapabilityChange,
    Hangup,
    Error,
}

impl BroadcastType {
    fn to_byte(self) -> u8 {
        match self {
            BroadcastType::Invite => 1,
            BroadcastType::Start => 2,
            BroadcastType::CapabilityChange => 3,
            BroadcastType::Hangup => 4,
            BroadcastType::Error => 5,
        }
    }

    fn from_byte(b: u8) -> Result<Self, Error> {
        Ok(match b {
            1 => BroadcastType::Invite,
            2 => BroadcastType::Start,
            3 => BroadcastType::CapabilityChange,
            4 => BroadcastType::Hangup,
            5 => BroadcastType::Error,
            other => bail!("unknown MSI broadcast type {}", other),
        })
    }
}

/// Builds a control-side header for an MSI message: distinct from (and much
/// smaller than) the 80-byte RTP header, since MSI messages carry no media
/// payload offsets/fragment numbers. Layout: `[payload_type][bc_type][now_ms: u64 be]`.
pub fn make_broadcast_header(payload_type: u8, now_ms: u64, bc_type: BroadcastType) -> Bytes {
    let mut buf = BytesMut::with_capacity(10);
    buf.put_u8(payload_type);
    buf.put_u8(bc_type.to_byte());
    buf.put_u64(now_ms);
    buf.freeze()
}

/// Inverse of [`make_broadcast_header`]; returns `(payload_type, now_ms, bc_type, rest)`.
pub fn parse_broadcast_header(data: &[u8]) -> Result<(u8, u64, BroadcastType, &[u8]), Error> {
    if data.len() < 10 {
        bail!("MSI broadcast header too short: {} bytes, need 10", data.len());
    }
    let payload_type = data[0];
    let bc_type = BroadcastType::from_byte(data[1])?;
    let now_ms = u64::from_be_bytes(data[2..10].try_into().expect("slice is exactly 8 bytes"));
    Ok((payload_type, now_ms, bc_type, &data[10..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        let mut h = Header {
            version: 2,
            padding: false,
            extension: true,
            csrc_count: 3,
            marker: true,
            payload_type: 96,
            sequence_number: 0xbeef,
            timestamp: 0xdead_beef,
            ssrc: 0x1234_5678,
            flags: 0,
            offset_full: 4096,
            length_full: 8192,
            received_length_full: 4096,
            record_timestamp: 0x1122_3344_5566_7788,
            fragment_num: 2,
            real_frame_num: 0,
            encoder_bitrate: 500_000,
            capture_delay_ms: 12,
            offset_legacy: 10,
            length_legacy: 20,
        };
        h.set_flag(flags::LARGE_FRAME, true);
        h.set_flag(flags::KEY_FRAME, true);
        h.set_rotation(Rotation::Deg180);
        h
    }

    #[test]
    fn round_trips() {
        let h = sample_header();
        let packed = pack_header(&h);
        assert_eq!(packed.len(), HEADER_SIZE);
        let unpacked = unpack_header(&packed).unwrap();
        assert_eq!(h, unpacked);
        assert!(unpacked.is_large_frame());
        assert!(unpacked.is_keyframe());
        assert_eq!(unpacked.rotation(), Rotation::Deg180);
    }

    #[test]
    fn rejects_short_input() {
        let packed = pack_header(&sample_header());
        assert!(unpack_header(&packed[..HEADER_SIZE - 1]).is_err());
    }

    #[test]
    fn reserved_bits_are_zeroed_on_pack() {
        let mut h = sample_header();
        h.flags |= 1 << 40; // set a reserved bit
        let packed = pack_header(&h);
        let unpacked = unpack_header(&packed).unwrap();
        assert_eq!(unpacked.flags & flags::RESERVED_MASK, 0);
    }

    #[test]
    fn control_message_round_trips() {
        for msg in [
            ControlMessage::RequestKeyframe,
            ControlMessage::HaveH264Video,
            ControlMessage::LessVideoFps { n: 3 },
            ControlMessage::ClockRequest { t0: 42 },
            ControlMessage::ClockAnswer { echo_t0: 1, remote_t1: 2, remote_t2: 3 },
        ] {
            let packed = msg.pack();
            let parsed = ControlMessage::parse(&packed).unwrap();
            assert_eq!(msg, parsed);
        }
    }

    #[test]
    fn less_video_fps_rejects_out_of_range_n() {
        let bad = [subtype::LESS_VIDEO_FPS, 0];
        assert!(ControlMessage::parse(&bad).is_err());
        let bad = [subtype::LESS_VIDEO_FPS, 1];
        assert!(ControlMessage::parse(&bad).is_err());
        let bad = [subtype::LESS_VIDEO_FPS, 10];
        assert!(ControlMessage::parse(&bad).is_err());
    }

    #[test]
    fn broadcast_header_round_trips() {
        let packed = make_broadcast_header(200, 123_456, BroadcastType::Start);
        let (pt, now_ms, bc_type, rest) = parse_broadcast_header(&packed).unwrap();
        assert_eq!(pt, 200);
        assert_eq!(now_ms, 123_456);
        assert_eq!(bc_type, BroadcastType::Start);
        assert!(rest.is_empty());
    }
}
