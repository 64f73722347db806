//! MSI — Media Session Initiation (C9): the call-setup/teardown state
//! machine, spec.md §4.9.

use log::{info, warn};

use crate::MonoMs;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MsiState {
    Inactive,
    Requesting,
    Requested,
    Active,
    Error,
}

/// Capability set `{SendA, RecvA, SendV, RecvV}`, spec.md §4.9.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Capabilities {
    pub send_audio: bool,
    pub recv_audio: bool,
    pub send_video: bool,
    pub recv_video: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        send_audio: false,
        recv_audio: false,
        send_video: false,
        recv_video: false,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// Events driving the MSI state machine, spec.md §4.9.
#[derive(Clone, Copy, Debug)]
pub enum MsiEvent {
    InviteIn,
    InviteOut,
    StartIn,
    AnswerOut,
    CapChangeIn(Capabilities),
    CapChangeOut(Capabilities),
    HangupIn,
    HangupOut,
    PeerTimeout,
    Error,
}

/// User-visible callbacks fired by state transitions, collected during a
/// locked section and drained after release per `SPEC_FULL.md` §A
/// (REDESIGN FLAG 1 — no callback is ever invoked while a lock is held).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MsiCallback {
    OnInvite,
    OnStart,
    OnCapabilityChange(Capabilities),
    OnEnd,
    OnError,
}

/// Outcome of [`MsiCall::apply`]: `Ok` if the transition was legal,
/// `InvalidTransition` (the caller-visible `control()` error) otherwise.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyOutcome {
    Ok,
    InvalidTransition,
}

/// Per-friend MSI call state, spec.md §3.
pub struct MsiCall {
    pub state: MsiState,
    pub self_capabilities: Capabilities,
    pub peer_capabilities: Capabilities,
    pub last_request_ts: MonoMs,
    paused_snapshot: Option<Capabilities>,
}

impl MsiCall {
    pub fn new() -> Self {
        MsiCall {
            state: MsiState::Inactive,
            self_capabilities: Capabilities::NONE,
            peer_capabilities: Capabilities::NONE,
            last_request_ts: 0,
            paused_snapshot: None,
        }
    }

    /// Applies one event per the transition table in spec.md §4.9, pushing
    /// any resulting user callbacks into `callbacks` (fired by the caller
    /// only after releasing the session mutex).
    pub fn apply(&mut self, event: MsiEvent, now_ms: MonoMs, callbacks: &mut Vec<MsiCallback>) -> ApplyOutcome {
        use MsiEvent::*;
        use MsiState::*;

        // PeerTimeout and Error are legal from (almost) any non-terminal state.
        match event {
            PeerTimeout => {
                if matches!(self.state, Requesting | Requested | Active) {
                    self.state = Error;
                    callbacks.push(MsiCallback::OnError);
                    return ApplyOutcome::Ok;
                }
                return ApplyOutcome::InvalidTransition;
            }
            Error => {
                self.state = MsiState::Error;
                callbacks.push(MsiCallback::OnError);
                return ApplyOutcome::Ok;
            }
            HangupIn | HangupOut => {
                self.state = Inactive;
                callbacks.push(MsiCallback::OnEnd);
                return ApplyOutcome::Ok;
            }
            _ => {}
        }

        match (self.state, event) {
            (Inactive, InviteIn) => {
                self.last_request_ts = now_ms;
                self.state = Requested;
                callbacks.push(MsiCallback::OnInvite);
                ApplyOutcome::Ok
            }
            (Inactive, InviteOut) => {
                self.last_request_ts = now_ms;
                self.state = Requesting;
                ApplyOutcome::Ok
            }
            (Requesting, StartIn) => {
                self.state = Active;
                callbacks.push(MsiCallback::OnStart);
                ApplyOutcome::Ok
            }
            (Requested, AnswerOut) => {
                self.state = Active;
                callbacks.push(MsiCallback::OnStart);
                ApplyOutcome::Ok
            }
            (Active, CapChangeIn(caps)) | (Active, CapChangeOut(caps)) => {
                self.peer_capabilities = caps;
                callbacks.push(MsiCallback::OnCapabilityChange(caps));
                ApplyOutcome::Ok
            }
            _ => {
                warn!("msi: invalid transition {:?} from state {:?}", event, self.state);
                ApplyOutcome::InvalidTransition
            }
        }
    }

    /// Pause: snapshot and clear `self_capabilities`, per spec.md §4.9.
    pub fn pause(&mut self) {
        self.paused_snapshot = Some(self.self_capabilities);
        self.self_capabilities = Capabilities::NONE;
        info!("msi: paused, capabilities cleared");
    }

    /// Resume: restore the pre-pause snapshot.
    pub fn resume(&mut self) {
        if let Some(snapshot) = self.paused_snapshot.take() {
            self.self_capabilities = snapshot;
        }
    }

    pub fn is_in_call(&self) -> bool {
        matches!(self.state, MsiState::Requesting | MsiState::Requested | MsiState::Active)
    }
}

impl Default for MsiCall {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_caps() -> Capabilities {
        Capabilities {
            send_audio: true,
            recv_audio: true,
            send_video: true,
            recv_video: true,
        }
    }

    #[test]
    fn inbound_invite_creates_requested_and_fires_on_invite() {
        let mut call = MsiCall::new();
        let mut cb = Vec::new();
        assert_eq!(call.apply(MsiEvent::InviteIn, 0, &mut cb), ApplyOutcome::Ok);
        assert_eq!(call.state, MsiState::Requested);
        assert_eq!(cb, vec![MsiCallback::OnInvite]);
    }

    #[test]
    fn full_invite_answer_handshake_reaches_active() {
        let mut caller = MsiCall::new();
        let mut callee = MsiCall::new();
        let mut cb = Vec::new();

        caller.apply(MsiEvent::InviteOut, 0, &mut cb);
        assert_eq!(caller.state, MsiState::Requesting);

        callee.apply(MsiEvent::InviteIn, 0, &mut cb);
        assert_eq!(callee.state, MsiState::Requested);

        cb.clear();
        callee.apply(MsiEvent::AnswerOut, 0, &mut cb);
        assert_eq!(callee.state, MsiState::Active);
        assert_eq!(cb, vec![MsiCallback::OnStart]);

        cb.clear();
        caller.apply(MsiEvent::StartIn, 0, &mut cb);
        assert_eq!(caller.state, MsiState::Active);
        assert_eq!(cb, vec![MsiCallback::OnStart]);
    }

    #[test]
    fn pause_then_resume_restores_capabilities() {
        let mut call = MsiCall::new();
        call.self_capabilities = full_caps();
        call.pause();
        assert!(call.self_capabilities.is_empty());
        call.resume();
        assert_eq!(call.self_capabilities, full_caps());
    }

    #[test]
    fn cancel_from_any_state_goes_inactive_and_fires_on_end() {
        let mut call = MsiCall::new();
        let mut cb = Vec::new();
        call.apply(MsiEvent::InviteOut, 0, &mut cb);
        cb.clear();
        assert_eq!(call.apply(MsiEvent::HangupOut, 1, &mut cb), ApplyOutcome::Ok);
        assert_eq!(call.state, MsiState::Inactive);
        assert_eq!(cb, vec![MsiCallback::OnEnd]);
    }

    #[test]
    fn peer_timeout_from_active_goes_to_error() {
        let mut call = MsiCall::new();
        let mut cb = Vec::new();
        call.apply(MsiEvent::InviteOut, 0, &mut cb);
        call.apply(MsiEvent::StartIn, 0, &mut cb);
        cb.clear();
        assert_eq!(call.apply(MsiEvent::PeerTimeout, 2, &mut cb), ApplyOutcome::Ok);
        assert_eq!(call.state, MsiState::Error);
        assert_eq!(cb, vec![MsiCallback::OnError]);
    }

    #[test]
    fn invalid_transition_is_rejected_and_state_unchanged() {
        let mut call = MsiCall::new();
        let mut cb = Vec::new();
        // StartIn from Inactive is not a legal transition.
        assert_eq!(call.apply(MsiEvent::StartIn, 0, &mut cb), ApplyOutcome::InvalidTransition);
        assert_eq!(call.state, MsiState::Inactive);
        assert!(cb.is_empty());
    }

    #[test]
    fn capability_change_while_active_updates_peer_caps() {
        let mut call = MsiCall::new();
        let mut cb = Vec::new();
        call.apply(MsiEvent::InviteOut, 0, &mut cb);
        call.apply(MsiEvent::StartIn, 0, &mut cb);
        cb.clear();
        let new_caps = Capabilities {
            send_audio: true,
            ..Capabilities::NONE
        };
        call.apply(MsiEvent::CapChangeIn(new_caps), 5, &mut cb);
        assert_eq!(call.peer_capabilities, new_caps);
        assert_eq!(cb, vec![MsiCallback::OnCapabilityChange(new_caps)]);
    }
}
