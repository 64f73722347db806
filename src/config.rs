//! Configuration surface (spec.md §6.3), built as chained validating
//! setters over a `Default`, the way the teacher's sibling `retina` crate
//! exposes `PlayPolicy` (see `rtsp/src/timestats.rs`).

use failure::{bail, Error};

use crate::codec::{H264Profile, VideoCodec};

/// Audio bitrate invariant, spec.md §4.9.
pub const AUDIO_BITRATE_MIN_KBPS: u32 = 6;
pub const AUDIO_BITRATE_MAX_KBPS: u32 = 510;

#[derive(Clone, Debug)]
pub struct AudioConfig {
    start_bitrate_kbps: u32,
    start_sample_rate_hz: u32,
    start_channels: u8,
    jitter_capacity_frames: u64,
    max_frame_duration_ms: u32,
    opus_complexity: u8,
    opus_packet_loss_pct: u8,
    opus_inband_fec: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            start_bitrate_kbps: 64,
            start_sample_rate_hz: 48_000,
            start_channels: 2,
            jitter_capacity_frames: 3,
            max_frame_duration_ms: 120,
            opus_complexity: 10,
            opus_packet_loss_pct: 10,
            opus_inband_fec: true,
        }
    }
}

impl AudioConfig {
    pub fn start_bitrate_kbps(mut self, kbps: u32) -> Result<Self, Error> {
        if !(AUDIO_BITRATE_MIN_KBPS..=AUDIO_BITRATE_MAX_KBPS).contains(&kbps) {
            bail!("audio start_bitrate_kbps {} out of range [{}, {}]", kbps, AUDIO_BITRATE_MIN_KBPS, AUDIO_BITRATE_MAX_KBPS);
        }
        self.start_bitrate_kbps = kbps;
        Ok(self)
    }

    pub fn start_sample_rate_hz(mut self, hz: u32) -> Result<Self, Error> {
        if hz == 0 {
            bail!("audio start_sample_rate_hz must be positive");
        }
        self.start_sample_rate_hz = hz;
        Ok(self)
    }

    pub fn start_channels(mut self, channels: u8) -> Result<Self, Error> {
        if !(1..=2).contains(&channels) {
            bail!("audio start_channels must be 1 or 2, got {}", channels);
        }
        self.start_channels = channels;
        Ok(self)
    }

    pub fn jitter_capacity_frames(mut self, frames: u64) -> Result<Self, Error> {
        if frames == 0 {
            bail!("audio jitter_capacity_frames must be positive");
        }
        self.jitter_capacity_frames = frames;
        Ok(self)
    }

    pub fn max_frame_duration_ms(mut self, ms: u32) -> Result<Self, Error> {
        if ms == 0 {
            bail!("audio max_frame_duration_ms must be positive");
        }
        self.max_frame_duration_ms = ms;
        Ok(self)
    }

    pub fn opus_complexity(mut self, complexity: u8) -> Result<Self, Error> {
        if complexity > 10 {
            bail!("opus_complexity must be in [0, 10], got {}", complexity);
        }
        self.opus_complexity = complexity;
        Ok(self)
    }

    pub fn opus_packet_loss_pct(mut self, pct: u8) -> Result<Self, Error> {
        if pct > 100 {
            bail!("opus_packet_loss_pct must be in [0, 100], got {}", pct);
        }
        self.opus_packet_loss_pct = pct;
        Ok(self)
    }

    pub fn opus_inband_fec(mut self, on: bool) -> Self {
        self.opus_inband_fec = on;
        self
    }

    pub fn jitter_capacity(&self) -> u64 {
        self.jitter_capacity_frames
    }

    pub fn start_bitrate_bps(&self) -> u32 {
        self.start_bitrate_kbps * 1000
    }
}

#[derive(Clone, Debug)]
pub struct VideoConfig {
    start_bitrate_kbps: u32,
    codec: VideoCodec,
    max_kf_dist: u32,
    send_lossless: bool,
    initial_profile: H264Profile,
    encoder_threads: u8,
    encoder_slices: u8,
    decoder_threads: u8,
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            start_bitrate_kbps: 500,
            codec: VideoCodec::Vp8,
            max_kf_dist: 100,
            send_lossless: false,
            initial_profile: H264Profile::Baseline,
            encoder_threads: 1,
            encoder_slices: 1,
            decoder_threads: 1,
        }
    }
}

impl VideoConfig {
    pub fn start_bitrate_kbps(mut self, kbps: u32) -> Result<Self, Error> {
        if kbps == 0 {
            bail!("video start_bitrate_kbps must be positive to enable sending");
        }
        self.start_bitrate_kbps = kbps;
        Ok(self)
    }

    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn max_kf_dist(mut self, dist: u32) -> Result<Self, Error> {
        if dist == 0 {
            bail!("video max_kf_dist must be positive");
        }
        self.max_kf_dist = dist;
        Ok(self)
    }

    pub fn send_lossless(mut self, on: bool) -> Self {
        self.send_lossless = on;
        self
    }

    pub fn initial_profile(mut self, profile: H264Profile) -> Self {
        self.initial_profile = profile;
        self
    }

    pub fn encoder_threads(mut self, n: u8) -> Result<Self, Error> {
        if n == 0 {
            bail!("encoder_threads must be positive");
        }
        self.encoder_threads = n;
        Ok(self)
    }

    pub fn encoder_slices(mut self, n: u8) -> Result<Self, Error> {
        if n == 0 {
            bail!("encoder_slices must be positive");
        }
        self.encoder_slices = n;
        Ok(self)
    }

    pub fn decoder_threads(mut self, n: u8) -> Result<Self, Error> {
        if n == 0 {
            bail!("decoder_threads must be positive");
        }
        self.decoder_threads = n;
        Ok(self)
    }

    pub fn codec_kind(&self) -> VideoCodec {
        self.codec
    }

    pub fn send_lossless_enabled(&self) -> bool {
        self.send_lossless
    }

    pub fn start_bitrate_bps(&self) -> u32 {
        self.start_bitrate_kbps * 1000
    }
}

/// Top-level per-call configuration, combining audio and video knobs.
#[derive(Clone, Debug, Default)]
pub struct CallConfig {
    pub audio: AudioConfig,
    pub video: VideoConfig,
}
