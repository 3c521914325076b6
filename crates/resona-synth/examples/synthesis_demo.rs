//! Render a short two-voice phrase through the mixer and print block
//! peaks.
//!
//! Run with: cargo run -p resona-synth --example synthesis_demo

use std::sync::Arc;

use resona_core::{EngineConfig, WaveId, WaveTableSet};
use resona_synth::{
    CurveKind, EnvGenAdsr, Generator, Mixer, PanLaw, Release, WaveOscInterp,
};

fn main() {
    let cfg = Arc::new(EngineConfig::new(44100.0, 4096));
    let tables = Arc::new(WaveTableSet::new(4096));

    let mut mixer = Mixer::new(cfg.clone(), 2);
    mixer.set_channel_pan(0, PanLaw::QuarterSine, -0.5);
    mixer.set_channel_pan(1, PanLaw::QuarterSine, 0.5);
    mixer.set_master_volume(0.7, 0.7);

    // Two voices a fifth apart, saw into an ADSR.
    let mut voices: Vec<(WaveOscInterp, EnvGenAdsr, usize)> = [(220.0, 0), (330.0, 1)]
        .into_iter()
        .map(|(freq, channel)| {
            let mut osc = WaveOscInterp::new(cfg.clone(), tables.clone());
            osc.init(&[freq, WaveId::Saw.index() as f32]);
            let env = EnvGenAdsr::new(
                cfg.clone(),
                0.02,
                1.0,
                0.1,
                0.6,
                0.4,
                0.0,
                CurveKind::Exponential,
            );
            (osc, env, channel)
        })
        .collect();

    let block = 512;
    for block_index in 0..40 {
        // Note off two thirds of the way through.
        if block_index == 26 {
            for (_, env, _) in &mut voices {
                env.release();
            }
        }

        let mut peak = 0.0f32;
        for _ in 0..block {
            for (osc, env, channel) in &mut voices {
                let s = osc.generate() * env.generate();
                mixer.channel_in(*channel, s);
            }
            let (l, r) = mixer.out();
            peak = peak.max(l.abs()).max(r.abs());
        }
        println!("block {block_index:2}  peak {peak:.4}");
    }
}
