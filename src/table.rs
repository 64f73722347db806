//! Session table & driver (C11): maps friend id → call session, and the
//! top-level public API surface, spec.md §4.11.

use std::collections::{HashMap, VecDeque};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::bitrate::CodecBitrateProfile;
use crate::codec::{AudioBackend, VideoBackend};
use crate::config::CallConfig;
use crate::error::{AnswerError, CallError, ControlError, SendFrameError};
use crate::msi::{ApplyOutcome, Capabilities, MsiCallback, MsiEvent};
use crate::rtp::OutboundPacket;
use crate::session::CallSession;
use crate::MonoMs;

/// Default iteration interval when no call is active, spec.md §4.11.
pub const IDLE_ITERATION_INTERVAL_MS: MonoMs = 200;

/// Safety margin subtracted from the adaptive decode-time estimate, never
/// letting the computed interval undercut the caller's actual processing
/// time, spec.md §4.11.
const ADAPTIVE_SAFETY_MARGIN_MS: MonoMs = 5;

/// How many recent `iterate()` wake intervals feed the moving average.
const WAKE_HISTORY_SAMPLES: usize = 3;

/// Opaque per-friend identifier, spec.md §3 ("session table owns all call
/// sessions keyed by friend id").
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FriendId(pub u32);

/// `control()` actions, spec.md §4.11.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlAction {
    Resume,
    Pause,
    Cancel,
    MuteA,
    UnmuteA,
    HideV,
    ShowV,
}

type AudioReceiveCallback = Box<dyn FnMut(FriendId, &[i16], usize, u8, u32) + Send>;
type VideoReceiveCallback = Box<dyn FnMut(FriendId, &[u8], &[u8], &[u8], u32, u32) + Send>;
type MsiCallbackHook = Box<dyn FnMut(FriendId, MsiCallback) + Send>;

/// Factory for the per-call codec backends, so the engine doesn't need to
/// know about concrete Opus/VP8/H.264 types — callers supply their own.
pub type BackendFactory = Box<dyn Fn() -> (Box<dyn AudioBackend>, Box<dyn VideoBackend>) + Send>;

/// The crate's top-level entry point: owns every active call session and
/// exposes the `call`/`answer`/`control`/`send_*`/`iterate` surface,
/// spec.md §4.11.
pub struct CallEngine {
    calls: Mutex<HashMap<FriendId, CallSession>>,
    config: CallConfig,
    backend_factory: BackendFactory,
    wake_history: Mutex<VecDeque<MonoMs>>,
    msi_hook: Mutex<Option<MsiCallbackHook>>,
    audio_receive_hook: Mutex<Option<AudioReceiveCallback>>,
    video_receive_hook: Mutex<Option<VideoReceiveCallback>>,
}

impl CallEngine {
    pub fn new(config: CallConfig, backend_factory: BackendFactory) -> Self {
        CallEngine {
            calls: Mutex::new(HashMap::new()),
            config,
            backend_factory,
            wake_history: Mutex::new(VecDeque::with_capacity(WAKE_HISTORY_SAMPLES)),
            msi_hook: Mutex::new(None),
            audio_receive_hook: Mutex::new(None),
            video_receive_hook: Mutex::new(None),
        }
    }

    pub fn on_msi_event(&self, hook: impl FnMut(FriendId, MsiCallback) + Send + 'static) {
        *self.msi_hook.lock() = Some(Box::new(hook));
    }

    pub fn on_audio_receive(&self, hook: impl FnMut(FriendId, &[i16], usize, u8, u32) + Send + 'static) {
        *self.audio_receive_hook.lock() = Some(Box::new(hook));
    }

    pub fn on_video_receive(&self, hook: impl FnMut(FriendId, &[u8], &[u8], &[u8], u32, u32) + Send + 'static) {
        *self.video_receive_hook.lock() = Some(Box::new(hook));
    }

    fn new_session(&self) -> CallSession {
        let (audio_backend, video_backend) = (self.backend_factory)();
        let profile = match self.config.video.codec_kind() {
            crate::codec::VideoCodec::H264 => CodecBitrateProfile::H264,
            crate::codec::VideoCodec::Vp8 => CodecBitrateProfile::VP8,
            crate::codec::VideoCodec::Vp9 => CodecBitrateProfile::VP9,
        };
        let session = CallSession::new(
            audio_backend,
            video_backend,
            self.config.audio.jitter_capacity(),
            self.config.audio.start_bitrate_bps(),
            profile,
            self.config.video.start_bitrate_bps(),
            u32::MAX,
        );
        session.set_lossless_video(self.config.video.send_lossless_enabled());
        session
    }

    /// Places an outbound call, spec.md §4.11.
    pub fn call(&self, friend: FriendId, audio_br_kbps: u32, video_br_kbps: u32) -> Result<(), CallError> {
        if !(crate::config::AUDIO_BITRATE_MIN_KBPS..=crate::config::AUDIO_BITRATE_MAX_KBPS).contains(&audio_br_kbps) {
            return Err(CallError::InvalidBitrate);
        }
        let mut calls = self.calls.lock();
        if calls.contains_key(&friend) {
            return Err(CallError::FriendAlreadyInCall);
        }
        let session = self.new_session();
        let mut callbacks = Vec::new();
        {
            let msi_guard = session.msi().lock();
            let mut msi = msi_guard.borrow_mut();
            msi.self_capabilities = Capabilities {
                send_audio: audio_br_kbps > 0,
                recv_audio: true,
                send_video: video_br_kbps > 0,
                recv_video: true,
            };
            msi.apply(MsiEvent::InviteOut, 0, &mut callbacks);
        }
        calls.insert(friend, session);
        drop(calls);
        self.fire_msi_callbacks(friend, callbacks);
        Ok(())
    }

    /// Ingress seam for an inbound `InviteIn` MSI control message, spec.md
    /// §4.9 — creates the session table entry a subsequent `answer()` call
    /// expects to find. A real transport collaborator calls this when a
    /// friend's comm channel carries an invite.
    pub fn on_invite_received(&self, friend: FriendId) {
        let mut calls = self.calls.lock();
        let session = calls.entry(friend).or_insert_with(|| self.new_session());
        let mut callbacks = Vec::new();
        {
            let msi_guard = session.msi().lock();
            msi_guard.borrow_mut().apply(MsiEvent::InviteIn, 0, &mut callbacks);
        }
        drop(calls);
        self.fire_msi_callbacks(friend, callbacks);
    }

    /// Ingress seam for an inbound `StartIn` MSI control message — the
    /// caller side of the handshake, fired once the callee's `answer()`
    /// signal arrives.
    pub fn on_start_received(&self, friend: FriendId) {
        let calls = self.calls.lock();
        let session = match calls.get(&friend) {
            Some(session) => session,
            None => {
                warn!("on_start_received: no session for friend {:?}", friend);
                return;
            }
        };
        let mut callbacks = Vec::new();
        {
            let msi_guard = session.msi().lock();
            msi_guard.borrow_mut().apply(MsiEvent::StartIn, 0, &mut callbacks);
        }
        drop(calls);
        self.fire_msi_callbacks(friend, callbacks);
    }

    /// Accepts an inbound invite, spec.md §4.11.
    pub fn answer(&self, friend: FriendId, audio_br_kbps: u32, video_br_kbps: u32) -> Result<(), AnswerError> {
        if !(crate::config::AUDIO_BITRATE_MIN_KBPS..=crate::config::AUDIO_BITRATE_MAX_KBPS).contains(&audio_br_kbps) {
            return Err(AnswerError::InvalidBitrate);
        }
        let calls = self.calls.lock();
        let session = calls.get(&friend).ok_or(AnswerError::FriendNotFound)?;
        let mut callbacks = Vec::new();
        {
            let msi_guard = session.msi().lock();
            let mut msi = msi_guard.borrow_mut();
            if !matches!(msi.state, crate::msi::MsiState::Requested) {
                return Err(AnswerError::FriendNotCalling);
            }
            msi.self_capabilities = Capabilities {
                send_audio: audio_br_kbps > 0,
                recv_audio: true,
                send_video: video_br_kbps > 0,
                recv_video: true,
            };
            if msi.apply(MsiEvent::AnswerOut, 0, &mut callbacks) != ApplyOutcome::Ok {
                return Err(AnswerError::FriendNotCalling);
            }
        }
        drop(calls);
        self.fire_msi_callbacks(friend, callbacks);
        Ok(())
    }

    /// Applies a control action, spec.md §4.11/§4.9.
    pub fn control(&self, friend: FriendId, action: ControlAction) -> Result<(), ControlError> {
        let calls = self.calls.lock();
        let session = calls.get(&friend).ok_or(ControlError::FriendNotFound)?;
        if !self.is_in_call(session) {
            return Err(ControlError::FriendNotInCall);
        }

        match action {
            ControlAction::Pause => session.pause_capabilities(),
            ControlAction::Resume => session.resume_capabilities(),
            ControlAction::Cancel => {
                let mut callbacks = Vec::new();
                {
                    let msi_guard = session.msi().lock();
                    msi_guard.borrow_mut().apply(MsiEvent::HangupOut, 0, &mut callbacks);
                }
                drop(calls);
                self.fire_msi_callbacks(friend, callbacks);
                self.calls.lock().remove(&friend);
                return Ok(());
            }
            ControlAction::MuteA => self.toggle_capability(session, friend, |c| c.send_audio = false),
            ControlAction::UnmuteA => self.toggle_capability(session, friend, |c| c.send_audio = true),
            ControlAction::HideV => self.toggle_capability(session, friend, |c| c.send_video = false),
            ControlAction::ShowV => self.toggle_capability(session, friend, |c| c.send_video = true),
        }
        Ok(())
    }

    fn is_in_call(&self, session: &CallSession) -> bool {
        let msi_guard = session.msi().lock();
        msi_guard.borrow().is_in_call()
    }

    fn toggle_capability(&self, session: &CallSession, _friend: FriendId, edit: impl FnOnce(&mut Capabilities)) {
        let msi_guard = session.msi().lock();
        let mut msi = msi_guard.borrow_mut();
        let mut caps = msi.self_capabilities;
        edit(&mut caps);
        msi.self_capabilities = caps;
        drop(msi);
        drop(msi_guard);
        session.apply_capability_change(caps);
    }

    fn fire_msi_callbacks(&self, friend: FriendId, callbacks: Vec<MsiCallback>) {
        if callbacks.is_empty() {
            return;
        }
        if let Some(hook) = self.msi_hook.lock().as_mut() {
            for cb in callbacks {
                hook(friend, cb);
            }
        }
    }

    /// Encodes and sends one audio frame, spec.md §4.11.
    pub fn send_audio(&self, friend: FriendId, pcm: &[i16], samples: usize, channels: u8, rate: u32) -> Result<Vec<OutboundPacket>, SendFrameError> {
        let calls = self.calls.lock();
        let session = calls.get(&friend).ok_or(SendFrameError::FriendNotFound)?;
        if !self.is_in_call(session) {
            return Err(SendFrameError::FriendNotInCall);
        }
        if session.audio_send_bitrate_bps() == 0 {
            return Err(SendFrameError::PayloadTypeDisabled);
        }
        session.encode_audio_frame(pcm, samples, channels, rate).map_err(|e| {
            debug!("send_audio: audio backend encode failed: {}", e);
            SendFrameError::RtpFailed
        })
    }

    /// Encodes and sends one video frame, spec.md §4.11.
    #[allow(clippy::too_many_arguments)]
    pub fn send_video(&self, friend: FriendId, y: &[u8], u: &[u8], v: &[u8], w: u32, h: u32) -> Result<Vec<OutboundPacket>, SendFrameError> {
        let calls = self.calls.lock();
        let session = calls.get(&friend).ok_or(SendFrameError::FriendNotFound)?;
        if !self.is_in_call(session) {
            return Err(SendFrameError::FriendNotInCall);
        }
        if session.video_send_bitrate_bps() == 0 {
            return Err(SendFrameError::PayloadTypeDisabled);
        }
        let frame = crate::codec::YuvFrame {
            y: y.to_vec(),
            u: u.to_vec(),
            v: v.to_vec(),
            width: w,
            height: h,
        };
        session.encode_video_frame(&frame, 0, 0).map_err(|e| {
            debug!("send_video: video backend encode failed: {}", e);
            SendFrameError::RtpFailed
        })
    }

    /// Runs every active session once and returns the next suggested wake
    /// interval, spec.md §4.11.
    ///
    /// Per spec.md §5 ("callbacks are never invoked while the session
    /// mutex is held"), decoded audio is collected while each session's
    /// locks are held and only delivered to the audio-receive hook after
    /// every session has been released.
    pub fn iterate(&self, now_ms: MonoMs) -> MonoMs {
        let calls = self.calls.lock();
        if calls.is_empty() {
            return IDLE_ITERATION_INTERVAL_MS;
        }
        let mut slowest_wake = 1;
        let mut decoded_audio = Vec::new();
        for (&friend, session) in calls.iter() {
            let (wake, decoded) = session.iterate(now_ms);
            slowest_wake = slowest_wake.max(wake);
            if let Some(frame) = decoded {
                decoded_audio.push((friend, frame));
            }
        }
        drop(calls);

        if !decoded_audio.is_empty() {
            if let Some(hook) = self.audio_receive_hook.lock().as_mut() {
                for (friend, frame) in decoded_audio {
                    hook(friend, &frame.samples, frame.sample_count, frame.channels, frame.sampling_rate);
                }
            }
        }
        self.record_wake_sample(slowest_wake)
    }

    fn record_wake_sample(&self, wake_ms: MonoMs) -> MonoMs {
        let mut history = self.wake_history.lock();
        if history.len() == WAKE_HISTORY_SAMPLES {
            history.pop_front();
        }
        history.push_back(wake_ms);
        let avg: MonoMs = history.iter().sum::<MonoMs>() / history.len() as MonoMs;
        avg.saturating_sub(ADAPTIVE_SAFETY_MARGIN_MS).max(1)
    }

    /// Current suggested interval without running a tick, spec.md §4.11.
    pub fn iteration_interval(&self) -> MonoMs {
        let calls = self.calls.lock();
        if calls.is_empty() {
            return IDLE_ITERATION_INTERVAL_MS;
        }
        let history = self.wake_history.lock();
        if history.is_empty() {
            return IDLE_ITERATION_INTERVAL_MS;
        }
        let avg: MonoMs = history.iter().sum::<MonoMs>() / history.len() as MonoMs;
        avg.saturating_sub(ADAPTIVE_SAFETY_MARGIN_MS).max(1)
    }

    /// Dispatches one inbound transport packet to the owning friend's
    /// session, spec.md §4.5/§4.10. Returns the raw bytes of an outbound
    /// reply (e.g. a `CLOCK_ANSWER`) when the transport collaborator
    /// should send one back; video frames are decoded and delivered to
    /// the video-receive hook immediately (audio waits for the next
    /// `iterate()` tick, per spec.md §4.3).
    pub fn on_transport_packet(&self, friend: FriendId, now_ms: MonoMs, data: &[u8]) -> Option<Vec<u8>> {
        if data.is_empty() {
            warn!("on_transport_packet: empty packet from {:?}", friend);
            return None;
        }
        let calls = self.calls.lock();
        let session = match calls.get(&friend) {
            Some(session) => session,
            None => {
                warn!("on_transport_packet: no active session for friend {:?}", friend);
                return None;
            }
        };

        let pid = data[0];
        let result = match pid {
            crate::packet_id::LOSSY_AUDIO | crate::packet_id::LOSSY_VIDEO | crate::packet_id::LOSSLESS_VIDEO => {
                match session.on_media_packet(pid, data, now_ms) {
                    Ok((crate::session::ReceivedMedia::Video(frame, _is_keyframe), reply)) => {
                        drop(calls);
                        if let Some(hook) = self.video_receive_hook.lock().as_mut() {
                            hook(friend, &frame.y, &frame.u, &frame.v, frame.width, frame.height);
                        }
                        return reply.map(|r| {
                            let mut out = vec![crate::packet_id::COMM_CHANNEL];
                            out.extend_from_slice(&r.pack());
                            out
                        });
                    }
                    Ok((_, reply)) => reply.map(|r| r.pack().to_vec()),
                    Err(e) => {
                        debug!("on_transport_packet: media decode failed: {}", e);
                        None
                    }
                }
            }
            crate::packet_id::COMM_CHANNEL => match session.on_control_message(&data[1..], now_ms) {
                Ok(Some(reply)) => Some(reply.pack().to_vec()),
                Ok(None) => None,
                Err(e) => {
                    debug!("on_transport_packet: control message parse failed: {}", e);
                    None
                }
            },
            crate::packet_id::MSI_CONTROL => match crate::wire::parse_broadcast_header(&data[1..]) {
                Ok((_, _, bc_type, _rest)) => {
                    drop(calls);
                    match bc_type {
                        crate::wire::BroadcastType::Invite => self.on_invite_received(friend),
                        crate::wire::BroadcastType::Start => self.on_start_received(friend),
                        other => debug!("on_transport_packet: unhandled MSI broadcast type {:?} from {:?}", other, friend),
                    }
                    return None;
                }
                Err(e) => {
                    debug!("on_transport_packet: MSI broadcast parse failed: {}", e);
                    None
                }
            },
            other => {
                debug!("on_transport_packet: unhandled packet id {:#x} from {:?}", other, friend);
                None
            }
        };
        drop(calls);
        result.map(|mut bytes| {
            let mut out = vec![crate::packet_id::COMM_CHANNEL];
            out.append(&mut bytes);
            out
        })
    }

    pub fn friend_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{NullAudioBackend, NullVideoBackend};

    fn make_engine() -> CallEngine {
        CallEngine::new(
            CallConfig::default(),
            Box::new(|| (Box::new(NullAudioBackend::default()) as Box<dyn AudioBackend>, Box::new(NullVideoBackend::default()) as Box<dyn VideoBackend>)),
        )
    }

    #[test]
    fn iteration_interval_is_200ms_when_idle() {
        let engine = make_engine();
        assert_eq!(engine.iteration_interval(), IDLE_ITERATION_INTERVAL_MS);
    }

    #[test]
    fn call_rejects_invalid_bitrate() {
        let engine = make_engine();
        assert_eq!(engine.call(FriendId(1), 1000, 500).unwrap_err(), CallError::InvalidBitrate);
    }

    #[test]
    fn calling_twice_returns_already_in_call() {
        let engine = make_engine();
        engine.call(FriendId(1), 64, 500).unwrap();
        assert_eq!(engine.call(FriendId(1), 64, 500).unwrap_err(), CallError::FriendAlreadyInCall);
    }

    #[test]
    fn answer_on_unknown_friend_is_not_found() {
        let engine = make_engine();
        assert_eq!(engine.answer(FriendId(9), 64, 500).unwrap_err(), AnswerError::FriendNotFound);
    }

    #[test]
    fn send_audio_before_active_is_rejected() {
        let engine = make_engine();
        engine.call(FriendId(1), 64, 500).unwrap();
        // Still in Requesting, not yet Active.
        assert_eq!(engine.send_audio(FriendId(1), &[], 0, 2, 48_000).unwrap_err(), SendFrameError::FriendNotInCall);
    }

    #[test]
    fn cancel_removes_the_session_and_send_then_fails() {
        let engine = make_engine();
        engine.call(FriendId(1), 64, 500).unwrap();
        engine.control(FriendId(1), ControlAction::Cancel).unwrap();
        assert_eq!(engine.friend_count(), 0);
        assert_eq!(engine.send_video(FriendId(1), &[], &[], &[], 0, 0).unwrap_err(), SendFrameError::FriendNotFound);
    }

    #[test]
    fn msi_callbacks_fire_on_invite_and_answer() {
        use std::sync::{Arc, Mutex as StdMutex};
        let engine = make_engine();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen2 = seen.clone();
        engine.on_msi_event(move |_friend, cb| seen2.lock().unwrap().push(cb));

        engine.call(FriendId(1), 64, 500).unwrap();
        // InviteOut fires no callback by itself (only the Requested side fires on_invite).
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn iterate_with_no_calls_returns_idle_interval() {
        let engine = make_engine();
        assert_eq!(engine.iterate(0), IDLE_ITERATION_INTERVAL_MS);
    }

    #[test]
    fn full_invite_answer_start_handshake_enables_sending() {
        let caller = make_engine();
        let callee = make_engine();
        let callee_sees_caller = FriendId(0);
        let caller_sees_callee = FriendId(1);

        caller.call(caller_sees_callee, 64, 500).unwrap();
        callee.on_invite_received(callee_sees_caller);
        callee.answer(callee_sees_caller, 64, 500).unwrap();
        caller.on_start_received(caller_sees_callee);

        assert!(caller.send_audio(caller_sees_callee, &[], 0, 2, 48_000).is_ok());
    }

    /// Places and answers a call between two fresh engines, returning
    /// `(caller, callee, friend_as_seen_by_caller, friend_as_seen_by_callee)`.
    fn connected_pair() -> (CallEngine, CallEngine, FriendId, FriendId) {
        let caller = make_engine();
        let callee = make_engine();
        let callee_sees_caller = FriendId(0);
        let caller_sees_callee = FriendId(1);

        caller.call(caller_sees_callee, 64, 500).unwrap();
        callee.on_invite_received(callee_sees_caller);
        callee.answer(callee_sees_caller, 64, 500).unwrap();
        caller.on_start_received(caller_sees_callee);
        (caller, callee, caller_sees_callee, callee_sees_caller)
    }

    #[test]
    fn on_transport_packet_from_unknown_friend_returns_none() {
        let engine = make_engine();
        assert!(engine.on_transport_packet(FriendId(42), 0, &[crate::packet_id::LOSSY_AUDIO, 0]).is_none());
    }

    #[test]
    fn on_transport_packet_delivers_decoded_video_to_the_receive_hook() {
        let (caller, callee, caller_sees_callee, callee_sees_caller) = connected_pair();
        use std::sync::{Arc, Mutex as StdMutex};
        let seen = Arc::new(StdMutex::new(0usize));
        let seen2 = seen.clone();
        callee.on_video_receive(move |_friend, _y, _u, _v, _w, _h| *seen2.lock().unwrap() += 1);

        let packets = caller.send_video(caller_sees_callee, &[0u8; 16], &[0u8; 4], &[0u8; 4], 4, 4).unwrap();
        for p in &packets {
            callee.on_transport_packet(callee_sees_caller, 0, &p.bytes);
        }
        assert_eq!(*seen.lock().unwrap(), packets.len());
    }

    #[test]
    fn on_transport_packet_enqueues_audio_delivered_on_next_iterate() {
        let (caller, callee, caller_sees_callee, callee_sees_caller) = connected_pair();
        use std::sync::{Arc, Mutex as StdMutex};
        let seen = Arc::new(StdMutex::new(0usize));
        let seen2 = seen.clone();
        callee.on_audio_receive(move |_friend, _pcm, _samples, _channels, _rate| *seen2.lock().unwrap() += 1);

        let packets = caller.send_audio(caller_sees_callee, &[0i16; 960], 960, 2, 48_000).unwrap();
        for p in &packets {
            callee.on_transport_packet(callee_sees_caller, 0, &p.bytes);
        }
        callee.iterate(0);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn msi_control_packet_dispatches_invite_broadcast() {
        let caller = make_engine();
        let callee = make_engine();
        let callee_sees_caller = FriendId(0);
        let caller_sees_callee = FriendId(1);

        caller.call(caller_sees_callee, 64, 500).unwrap();
        let mut data = vec![crate::packet_id::MSI_CONTROL];
        data.extend_from_slice(&crate::wire::make_broadcast_header(0, 0, crate::wire::BroadcastType::Invite));
        assert!(callee.on_transport_packet(callee_sees_caller, 0, &data).is_none());
        assert_eq!(callee.friend_count(), 1);
    }

    #[test]
    fn on_transport_packet_clock_request_yields_a_packed_reply() {
        let (caller, callee, caller_sees_callee, callee_sees_caller) = connected_pair();
        let _ = caller_sees_callee;
        let msg = crate::wire::ControlMessage::ClockRequest { t0: 7 };
        let mut data = vec![crate::packet_id::COMM_CHANNEL];
        data.extend_from_slice(&msg.pack());
        let reply = callee.on_transport_packet(callee_sees_caller, 100, &data);
        assert!(reply.is_some());
        assert_eq!(reply.unwrap()[0], crate::packet_id::COMM_CHANNEL);
    }
}
