//! Outcome enums for the public API (spec.md §6.2).
//!
//! Unlike internal plumbing errors (packet-level parse failures, codec
//! errors), these are *expected*, named results a caller is meant to match
//! on — so they're plain enums rather than [`failure::Error`], the same way
//! `rtsp_types::ParseError` separates `Error`/`Incomplete` from the
//! `failure::Error` the rest of the teacher crate uses for "this should
//! never happen" failures.

pub use failure::Error;

/// Outcome of [`crate::table::CallEngine::send_audio`] /
/// [`crate::table::CallEngine::send_video`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendFrameError {
    FriendNotFound,
    Sync,
    FriendNotInCall,
    PayloadTypeDisabled,
    Invalid,
    Null,
    RtpFailed,
}

/// Outcome of [`crate::table::CallEngine::call`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallError {
    MalformedFriend,
    FriendNotFound,
    FriendNotConnected,
    FriendAlreadyInCall,
    InvalidBitrate,
    Malloc,
    Sync,
}

/// Outcome of [`crate::table::CallEngine::answer`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnswerError {
    Sync,
    FriendNotFound,
    FriendNotCalling,
    InvalidBitrate,
    CodecInit,
}

/// Outcome of [`crate::table::CallEngine::control`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlError {
    Sync,
    FriendNotFound,
    FriendNotInCall,
    InvalidTransition,
}
