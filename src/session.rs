//! Call session / pacing loop (C8): one audio + one video sub-session per
//! friend, each behind its own recursive mutex, driven by an external
//! `iterate(now)` tick, spec.md §4.8 and §5.
//!
//! The recursive-mutex-guarded, single-writer-thread model follows the
//! `parking_lot` usage the pack's `brew-lab-thaumic-cast` stream manager
//! shows for shared per-stream state (`parking_lot::{Mutex, RwLock}` owning
//! `RefCell`-free interior state there; here a
//! [`parking_lot::ReentrantMutex`] is required instead, since spec.md §5
//! requires callbacks invoked from within a locked section to be able to
//! reacquire it — `RefCell` supplies the interior mutability a reentrant
//! mutex's shared-only `&T` access needs).

use std::cell::RefCell;

use log::debug;
use parking_lot::ReentrantMutex;

use crate::bitrate::{BitrateRegulator, CodecBitrateProfile};
use crate::bwc::BandwidthController;
use crate::clock::ClockTracker;
use crate::codec::{AudioBackend, PcmFrame, VideoBackend, YuvFrame};
use crate::jitter::{AudioIterator, FillLevel, ReadOutcome};
use crate::msi::{Capabilities, MsiCall};
use crate::rtp::{Ingress, MediaKind, RtpSession};
use crate::sidechannel::{FpsRequestLimiter, FpsThrottle, KeyframeRequestState, PeerCodecCapability};
use crate::wire::ControlMessage;
use crate::MonoMs;

/// Decoded media handed back to the caller for delivery to the
/// audio/video-receive callbacks, spec.md §4.5 ("decoded frames passed to
/// the user-supplied receive callback").
pub enum ReceivedMedia {
    None,
    Audio(PcmFrame),
    Video(YuvFrame, bool),
}

/// Encoding of the audio iterate return value, spec.md §4.8: `idle=0,
/// ok=1, slow=2`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AudioIterateResult {
    Idle,
    Ok,
    Slow,
}

struct AudioSubSession {
    rtp: RtpSession,
    iterator: AudioIterator,
    backend: Box<dyn AudioBackend>,
    send_bitrate_bps: u32,
}

struct VideoSubSession {
    rtp: RtpSession,
    clock: ClockTracker,
    bwc: BandwidthController,
    bitrate: BitrateRegulator,
    backend: Box<dyn VideoBackend>,
    last_incoming_ts: MonoMs,
    is_h264: bool,
    keyframe_state: KeyframeRequestState,
    fps_throttle: FpsThrottle,
    fps_limiter: FpsRequestLimiter,
    peer_cap: PeerCodecCapability,
    /// Inter-frame spacing learned from incoming `record_timestamp`s, used
    /// as the non-skip `iterate()` pacing interval, spec.md §4.8.
    learned_frame_duration_ms: MonoMs,
    last_video_record_ts: Option<u64>,
    /// The bitrate regulator's original start point, kept so a mid-call
    /// codec switch (`HaveH264Video`) can rebuild it from scratch rather
    /// than guessing a new starting estimate.
    configured_start_bps: u32,
}

/// Rolling `(sender_ts, local_ts)` reference pair established on first
/// matched audio+video arrival, spec.md §4.8 ("A/V sync").
#[derive(Clone, Copy, Debug, Default)]
struct AvSyncReference {
    sender_ts_ref: u64,
    local_ts_ref: MonoMs,
    established: bool,
}

pub struct CallSession {
    audio: ReentrantMutex<RefCell<AudioSubSession>>,
    video: ReentrantMutex<RefCell<VideoSubSession>>,
    msi: ReentrantMutex<RefCell<MsiCall>>,
    av_sync: RefCell<AvSyncReference>,
}

impl CallSession {
    pub fn new(
        audio_backend: Box<dyn AudioBackend>,
        video_backend: Box<dyn VideoBackend>,
        jitter_capacity: u64,
        audio_start_bps: u32,
        video_profile: CodecBitrateProfile,
        video_start_bps: u32,
        video_user_cap_bps: u32,
    ) -> Self {
        CallSession {
            audio: ReentrantMutex::new(RefCell::new(AudioSubSession {
                rtp: RtpSession::new(jitter_capacity),
                iterator: AudioIterator::new(jitter_capacity),
                backend: audio_backend,
                send_bitrate_bps: audio_start_bps,
            })),
            video: ReentrantMutex::new(RefCell::new(VideoSubSession {
                rtp: RtpSession::new(jitter_capacity),
                clock: ClockTracker::new(),
                bwc: BandwidthController::new(),
                bitrate: BitrateRegulator::new(video_profile, video_start_bps, video_user_cap_bps),
                backend: video_backend,
                last_incoming_ts: 0,
                is_h264: false,
                keyframe_state: KeyframeRequestState::default(),
                fps_throttle: FpsThrottle::default(),
                fps_limiter: FpsRequestLimiter::new(),
                peer_cap: PeerCodecCapability::default(),
                learned_frame_duration_ms: 1,
                last_video_record_ts: None,
                configured_start_bps: video_start_bps,
            })),
            msi: ReentrantMutex::new(RefCell::new(MsiCall::new())),
            av_sync: RefCell::new(AvSyncReference::default()),
        }
    }

    pub fn msi(&self) -> &ReentrantMutex<RefCell<MsiCall>> {
        &self.msi
    }

    /// Configures whether outgoing video uses the lossless packet id,
    /// `SPEC_FULL.md` §A's `send_video_lossless` option.
    pub fn set_lossless_video(&self, on: bool) {
        self.video.lock().borrow_mut().rtp.set_lossless_video(on);
    }

    /// Runs one tick: audio drain, video pacing decision, BWC tick; returns
    /// the next-wake interval in ms, per spec.md §4.8.
    ///
    /// Any MSI callbacks raised elsewhere are the caller's responsibility
    /// to drain and fire *after* this call returns — this method itself
    /// only touches the audio/video mutexes, never the MSI one, so it
    /// never produces callbacks directly.
    pub fn iterate(&self, now_ms: MonoMs) -> (MonoMs, Option<PcmFrame>) {
        let audio_guard = self.audio.lock();
        let mut audio = audio_guard.borrow_mut();
        let (audio_result, decoded) = self.iterate_audio(&mut audio, now_ms);
        let skip_video = audio_result == AudioIterateResult::Slow;
        let audio_frame_duration = audio.iterator.learned_frame_duration_ms().max(1);
        drop(audio);
        drop(audio_guard);

        let video_guard = self.video.lock();
        let mut video = video_guard.borrow_mut();
        let video_frame_duration = self.iterate_video(&mut video, now_ms, skip_video);
        let bwc_report = video.bwc.maybe_report(now_ms);
        if let Some(report) = bwc_report {
            if let Some(req) = video.bitrate.on_loss_report(report.loss_fraction, 0, 0) {
                debug!("session: bitrate regulator published {} bps", req.bitrate_bps);
                if let Err(e) = video.backend.reconfigure(req) {
                    debug!("session: video backend reconfigure failed: {}", e);
                }
            }
        }
        drop(video);
        drop(video_guard);

        let audio_component = audio_frame_duration.saturating_sub(4).max(1);
        (audio_component.min(video_frame_duration.max(1)), decoded)
    }

    fn iterate_audio(&self, audio: &mut AudioSubSession, now_ms: MonoMs) -> (AudioIterateResult, Option<PcmFrame>) {
        let fill = audio.iterator.fill_level(audio.rtp.jitter());
        match fill {
            FillLevel::Idle => return (AudioIterateResult::Idle, None),
            FillLevel::SlowDown => return (AudioIterateResult::Slow, None),
            FillLevel::Normal => {}
        }

        // Drain one frame per tick: `ac_iterate`'s historical one-frame
        // quirk is preserved verbatim, see SPEC_FULL.md §C.
        let decoded = match audio.rtp.jitter_mut().read() {
            ReadOutcome::Frame(frame) => match audio.backend.decode(&frame.payload) {
                Ok(decoded) => {
                    audio.iterator.record_decoded_samples(decoded.sample_count, decoded.sampling_rate);
                    if audio.iterator.try_reconfigure(decoded.sampling_rate, decoded.channels, now_ms) {
                        if let Err(e) = audio.backend.reconfigure_decoder(decoded.sampling_rate, decoded.channels) {
                            debug!("session: audio decoder reconfigure failed: {}", e);
                        }
                    }
                    Some(decoded)
                }
                Err(e) => {
                    debug!("session: audio decode error, dropping frame: {}", e);
                    None
                }
            },
            ReadOutcome::Plc => {
                let frame_size = audio.iterator.plc_frame_size(audio.iterator.learned_frame_duration_ms().max(1));
                match audio.backend.conceal(frame_size) {
                    Ok(concealed) => Some(concealed),
                    Err(e) => {
                        debug!("session: audio PLC error: {}", e);
                        None
                    }
                }
            }
            ReadOutcome::Empty => None,
        };
        (AudioIterateResult::Ok, decoded)
    }

    fn iterate_video(&self, video: &mut VideoSubSession, now_ms: MonoMs, skip: bool) -> MonoMs {
        if skip {
            debug!("session: skipping video iterate this tick (audio signaled slow-down)");
            return 1;
        }
        let offset = video.clock.offset_ms_to_sender();
        let _target_ts = (now_ms as i64 + offset) as u64;
        // Actual frame delivery happens on transport ingress (C5); the tick
        // here only maintains pacing/clock state, per spec.md §4.8.
        video.last_incoming_ts = now_ms;
        video.learned_frame_duration_ms.max(1)
    }

    /// Applies the capability-change handling in spec.md §4.9: stop
    /// sending a stream whose Send* bit flipped off; resume receiving when
    /// a Recv* bit flips on.
    pub fn apply_capability_change(&self, caps: Capabilities) {
        let audio_guard = self.audio.lock();
        audio_guard.borrow_mut().rtp.set_receiving(caps.recv_audio);
        drop(audio_guard);

        let video_guard = self.video.lock();
        video_guard.borrow_mut().rtp.set_receiving(caps.recv_video);
    }

    pub fn pause_capabilities(&self) {
        let msi_guard = self.msi.lock();
        msi_guard.borrow_mut().pause();
    }

    pub fn resume_capabilities(&self) {
        let msi_guard = self.msi.lock();
        msi_guard.borrow_mut().resume();
    }

    pub fn audio_send_bitrate_bps(&self) -> u32 {
        self.audio.lock().borrow().send_bitrate_bps
    }

    pub fn video_send_bitrate_bps(&self) -> u32 {
        self.video.lock().borrow().bitrate.current_bps()
    }

    /// Encodes one PCM frame through the audio backend collaborator and
    /// sends it, spec.md §4.5 ("encode is the audio backend collaborator's
    /// job; this module only owns fragmentation/transport handoff").
    pub fn encode_audio_frame(&self, pcm: &[i16], sample_count: usize, channels: u8, rate: u32) -> Result<Vec<crate::rtp::OutboundPacket>, failure::Error> {
        let guard = self.audio.lock();
        let mut audio = guard.borrow_mut();
        let bitrate = audio.send_bitrate_bps;
        let payload = audio.backend.encode(pcm, sample_count, channels, rate, bitrate)?;
        drop(audio);
        drop(guard);
        Ok(self.send_audio_frame(&payload))
    }

    /// Sends one encoded audio frame, fragmenting per the RTP layer (C5).
    pub fn send_audio_frame(&self, payload: &[u8]) -> Vec<crate::rtp::OutboundPacket> {
        let guard = self.audio.lock();
        let mut audio = guard.borrow_mut();
        let bitrate = audio.send_bitrate_bps;
        audio
            .rtp
            .send_data(MediaKind::Audio, payload, false, 0, false, bitrate, 0, crate::wire::Rotation::Deg0)
    }

    /// Encodes one YUV frame through the video backend collaborator and
    /// sends it. A pending peer `RequestKeyframe` (spec.md §4.10) is only
    /// peeked here, not consumed — [`send_video_frame`] does the actual
    /// consuming so the flag is cleared exactly once.
    pub fn encode_video_frame(&self, frame: &YuvFrame, record_ts: u64, capture_delay_ms: u32) -> Result<Vec<crate::rtp::OutboundPacket>, failure::Error> {
        let guard = self.video.lock();
        let mut video = guard.borrow_mut();
        let force_keyframe = video.keyframe_state.force_next_keyframe;
        let payload = video.backend.encode(frame, force_keyframe)?;
        drop(video);
        drop(guard);
        Ok(self.send_video_frame(&payload, force_keyframe, record_ts, capture_delay_ms))
    }

    /// Sends one encoded video frame. Drops it instead (returning no
    /// packets) when a peer-requested `LESS_VIDEO_FPS` throttle is active
    /// for this tick, per spec.md §4.10.
    #[allow(clippy::too_many_arguments)]
    pub fn send_video_frame(&self, payload: &[u8], is_keyframe: bool, record_ts: u64, capture_delay_ms: u32) -> Vec<crate::rtp::OutboundPacket> {
        let guard = self.video.lock();
        let mut video = guard.borrow_mut();
        let is_keyframe = is_keyframe || video.keyframe_state.take_force_flag();
        if !is_keyframe && video.fps_throttle.should_skip(record_ts) {
            debug!("session: dropping outgoing video frame under active peer FPS throttle");
            return Vec::new();
        }
        let bitrate = video.bitrate.current_bps();
        let is_h264 = video.is_h264;
        video.rtp.send_data(
            MediaKind::Video,
            payload,
            is_keyframe,
            record_ts,
            is_h264,
            bitrate,
            capture_delay_ms,
            crate::wire::Rotation::Deg0,
        )
    }

    /// Feeds one inbound media (audio/video) transport packet, spec.md §4.5.
    /// Video is decoded immediately on reassembly; audio is only enqueued —
    /// its decode happens on the next `iterate()` tick per the audio
    /// pacing model (§4.3). A forced-stale-slot eviction ([`Ingress::VideoPartial`])
    /// is this side's work-buffer-thrash signal and may return a
    /// `LESS_VIDEO_FPS` request to send back to the peer, spec.md §4.10.
    pub fn on_media_packet(&self, pid: u8, data: &[u8], now_ms: MonoMs) -> Result<(ReceivedMedia, Option<ControlMessage>), failure::Error> {
        match pid {
            crate::packet_id::LOSSY_AUDIO => {
                let guard = self.audio.lock();
                guard.borrow_mut().rtp.on_transport_packet(data)?;
                Ok((ReceivedMedia::None, None))
            }
            crate::packet_id::LOSSY_VIDEO | crate::packet_id::LOSSLESS_VIDEO => {
                let guard = self.video.lock();
                let mut video = guard.borrow_mut();
                video.bwc.on_bytes_received(data.len() as u32);
                match video.rtp.on_transport_packet(data)? {
                    Ingress::Video(frame) => {
                        let is_keyframe = frame.header.is_keyframe();
                        let record_ts = frame.header.record_timestamp;
                        if let Some(last) = video.last_video_record_ts {
                            video.learned_frame_duration_ms = record_ts.saturating_sub(last).max(1);
                        }
                        video.last_video_record_ts = Some(record_ts);
                        let yuv = video.backend.decode(&frame.payload, is_keyframe)?;
                        let clock_reply = match video.clock.on_video_frame() {
                            crate::clock::RequestDecision::Send => {
                                video.clock.record_request_sent(now_ms);
                                Some(ControlMessage::ClockRequest { t0: now_ms as u32 })
                            }
                            crate::clock::RequestDecision::Skip => None,
                        };
                        Ok((ReceivedMedia::Video(yuv, is_keyframe), clock_reply))
                    }
                    Ingress::VideoPartial(frame, counts_as_loss) => {
                        let is_keyframe = frame.header.is_keyframe();
                        if counts_as_loss {
                            video.bwc.on_incomplete_eviction(frame.payload.len() as u32, frame.header.length_full);
                        }
                        let yuv = video.backend.decode(&frame.payload, is_keyframe)?;
                        let reply = video.fps_limiter.maybe_request(true, now_ms);
                        Ok((ReceivedMedia::Video(yuv, is_keyframe), reply))
                    }
                    Ingress::Audio(_) | Ingress::Pending => Ok((ReceivedMedia::None, None)),
                }
            }
            other => failure::bail!("on_media_packet: unexpected packet id {:#x}", other),
        }
    }

    /// Handles one inbound comm-channel control message, spec.md §4.10,
    /// returning an outbound reply (e.g. a `CLOCK_ANSWER`) when one is due.
    pub fn on_control_message(&self, payload: &[u8], now_ms: MonoMs) -> Result<Option<ControlMessage>, failure::Error> {
        let msg = ControlMessage::parse(payload)?;
        match msg {
            ControlMessage::RequestKeyframe => {
                let guard = self.video.lock();
                guard.borrow_mut().keyframe_state.on_request_received(now_ms);
                Ok(None)
            }
            ControlMessage::HaveH264Video => {
                let guard = self.video.lock();
                let mut video = guard.borrow_mut();
                video.peer_cap.have_h264 = true;
                if !video.is_h264 {
                    video.is_h264 = true;
                    let user_cap_bps = video.bitrate.user_cap_bps();
                    let start_bps = video.configured_start_bps;
                    video.bitrate = BitrateRegulator::new(CodecBitrateProfile::H264, start_bps, user_cap_bps);
                    debug!("session: peer announced H.264 support, switching codec/bitrate profile");
                }
                Ok(None)
            }
            ControlMessage::LessVideoFps { n } => {
                let guard = self.video.lock();
                guard.borrow_mut().fps_throttle.apply(n, now_ms);
                Ok(None)
            }
            ControlMessage::ClockRequest { t0 } => Ok(Some(ControlMessage::ClockAnswer {
                echo_t0: t0,
                remote_t1: now_ms as u32,
                remote_t2: now_ms as u32,
            })),
            ControlMessage::ClockAnswer { echo_t0, remote_t1, remote_t2 } => {
                let guard = self.video.lock();
                guard.borrow_mut().clock.apply_sample(echo_t0, now_ms as u32, remote_t1, remote_t2);
                Ok(None)
            }
        }
    }

    /// Whether this side's incoming video has been throttled enough that a
    /// `LESS_VIDEO_FPS` request to the peer is due, spec.md §4.10.
    pub fn maybe_request_slower_fps(&self, is_skipping: bool, now_ms: MonoMs) -> Option<ControlMessage> {
        let guard = self.video.lock();
        guard.borrow_mut().fps_limiter.maybe_request(is_skipping, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{NullAudioBackend, NullVideoBackend};

    fn make_session() -> CallSession {
        CallSession::new(
            Box::new(NullAudioBackend::default()),
            Box::new(NullVideoBackend::default()),
            4,
            64_000,
            CodecBitrateProfile::H264,
            500_000,
            12_000_000,
        )
    }

    #[test]
    fn iterate_on_idle_session_returns_a_positive_wake_interval() {
        let session = make_session();
        let (next, decoded) = session.iterate(0);
        assert!(next > 0);
        assert!(decoded.is_none());
    }

    #[test]
    fn media_round_trip_delivers_decoded_audio_on_next_iterate() {
        let sender = make_session();
        let receiver = make_session();
        let packets = sender.send_audio_frame(&[1, 2, 3, 4]);
        for p in &packets {
            receiver.on_media_packet(p.packet_id, &p.bytes, 0).unwrap();
        }
        let (_, decoded) = receiver.iterate(0);
        assert!(decoded.is_some());
    }

    #[test]
    fn clock_request_yields_a_clock_answer_reply() {
        let session = make_session();
        let msg = crate::wire::ControlMessage::ClockRequest { t0: 1000 };
        let reply = session.on_control_message(&msg.pack(), 1050).unwrap();
        match reply {
            Some(crate::wire::ControlMessage::ClockAnswer { echo_t0, .. }) => assert_eq!(echo_t0, 1000),
            other => panic!("expected ClockAnswer, got {:?}", other),
        }
    }

    #[test]
    fn capability_change_toggles_receiving() {
        let session = make_session();
        session.apply_capability_change(Capabilities {
            send_audio: true,
            recv_audio: false,
            send_video: true,
            recv_video: true,
        });
        assert!(!session.audio.lock().borrow().rtp.is_receiving());
        assert!(session.video.lock().borrow().rtp.is_receiving());
    }

    #[test]
    fn pause_then_resume_restores_msi_capabilities() {
        let session = make_session();
        session.msi.lock().borrow_mut().self_capabilities = Capabilities {
            send_audio: true,
            recv_audio: true,
            send_video: false,
            recv_video: false,
        };
        session.pause_capabilities();
        assert!(session.msi.lock().borrow().self_capabilities.is_empty());
        session.resume_capabilities();
        assert!(session.msi.lock().borrow().self_capabilities.send_audio);
    }

    #[test]
    fn send_audio_frame_produces_at_least_one_packet() {
        let session = make_session();
        let packets = session.send_audio_frame(&[1, 2, 3, 4]);
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn iterate_video_tracks_learned_frame_duration_from_record_timestamps() {
        let sender = make_session();
        let receiver = make_session();
        for &ts in &[0u64, 33, 66] {
            let packets = sender.send_video_frame(&[1, 2, 3, 4], true, ts, 0);
            for p in &packets {
                receiver.on_media_packet(p.packet_id, &p.bytes, 0).unwrap();
            }
        }
        let guard = receiver.video.lock();
        let mut video = guard.borrow_mut();
        assert_eq!(receiver.iterate_video(&mut video, 0, false), 33);
    }

    #[test]
    fn reentrant_lock_can_be_reacquired_on_the_same_thread() {
        let session = make_session();
        let outer = session.audio.lock();
        let _inner = session.audio.lock(); // must not deadlock
        drop(outer);
    }
}
