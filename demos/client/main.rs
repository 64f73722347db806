//! Two-peer in-process demo: places a call, answers it, and pumps a few
//! iterations while shuttling frames over an in-memory fake transport.

use failure::{format_err, Error};
use log::info;
use structopt::StructOpt;

use tox_av_core::config::CallConfig;
use tox_av_core::table::{CallEngine, ControlAction, FriendId};

#[derive(StructOpt)]
struct Opts {
    /// Number of `iterate()` ticks to run after the call is answered.
    #[structopt(long, default_value = "5")]
    ticks: u32,

    /// Audio start bitrate in kbps offered by the caller.
    #[structopt(long, default_value = "64")]
    audio_kbps: u32,

    /// Video start bitrate in kbps offered by the caller.
    #[structopt(long, default_value = "500")]
    video_kbps: u32,
}

fn make_engine() -> CallEngine {
    CallEngine::new(
        CallConfig::default(),
        Box::new(|| {
            (
                Box::new(tox_av_core::codec::NullAudioBackend::default()) as Box<dyn tox_av_core::codec::AudioBackend>,
                Box::new(tox_av_core::codec::NullVideoBackend::default()) as Box<dyn tox_av_core::codec::VideoBackend>,
            )
        }),
    )
}

fn run(opts: Opts) -> Result<(), Error> {
    let caller = make_engine();
    let callee = make_engine();
    let friend_of_caller = FriendId(1); // callee, as seen by caller
    let friend_of_callee = FriendId(0); // caller, as seen by callee

    caller.on_msi_event(|friend, cb| info!("caller: msi event for {:?}: {:?}", friend, cb));
    callee.on_msi_event(|friend, cb| info!("callee: msi event for {:?}: {:?}", friend, cb));
    callee.on_audio_receive(|friend, _pcm, samples, channels, rate| {
        info!("callee: decoded {} samples ({} ch, {} Hz) from {:?}", samples, channels, rate, friend)
    });
    callee.on_video_receive(|friend, y, _u, _v, w, h| info!("callee: decoded {}x{} video frame ({} luma bytes) from {:?}", w, h, y.len(), friend));

    caller
        .call(friend_of_caller, opts.audio_kbps, opts.video_kbps)
        .map_err(|e| format_err!("call() failed: {:?}", e))?;
    info!("caller: placed call to {:?}", friend_of_caller);

    // No real transport is wired up in this demo, so the invite/start
    // handshake is mirrored directly between the two engines instead of
    // traveling over a comm channel.
    callee.on_invite_received(friend_of_callee);
    callee
        .answer(friend_of_callee, opts.audio_kbps, opts.video_kbps)
        .map_err(|e| format_err!("answer() failed: {:?}", e))?;
    caller.on_start_received(friend_of_caller);
    info!("callee: answered, both sides active");

    let mut now_ms: u64 = 0;
    for tick in 0..opts.ticks {
        now_ms += caller.iterate(now_ms);
        callee.iterate(now_ms);

        match caller.send_audio(friend_of_caller, &[0i16; 960], 960, 2, 48_000) {
            Ok(packets) => {
                info!("tick {}: caller sent {} audio packet(s)", tick, packets.len());
                for packet in &packets {
                    if let Some(reply) = callee.on_transport_packet(friend_of_callee, now_ms, &packet.bytes) {
                        caller.on_transport_packet(friend_of_caller, now_ms, &reply);
                    }
                }
            }
            Err(e) => info!("tick {}: caller audio send failed: {:?}", tick, e),
        }

        match caller.send_video(friend_of_caller, &[0u8; 64], &[0u8; 16], &[0u8; 16], 8, 8) {
            Ok(packets) => {
                info!("tick {}: caller sent {} video packet(s)", tick, packets.len());
                for packet in &packets {
                    if let Some(reply) = callee.on_transport_packet(friend_of_callee, now_ms, &packet.bytes) {
                        caller.on_transport_packet(friend_of_caller, now_ms, &reply);
                    }
                }
            }
            Err(e) => info!("tick {}: caller video send failed: {:?}", tick, e),
        }
    }

    caller
        .control(friend_of_caller, ControlAction::Cancel)
        .map_err(|e| format_err!("control(Cancel) failed: {:?}", e))?;
    info!("caller: call ended after {} ticks", opts.ticks);
    Ok(())
}

fn main() {
    env_logger::init();
    let opts = Opts::from_args();
    if let Err(e) = run(opts) {
        eprintln!("fatal: {}", e);
        std::process::exit(1);
    }
}
