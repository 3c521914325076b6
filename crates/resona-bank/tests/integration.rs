//! Integration tests for resona-bank.
//!
//! Builds complete synthetic SF2 and DLS images in memory, loads them
//! through the public API, and checks the converted model — units,
//! ranges, loops — plus end-to-end playback through `ZoneOscillator`
//! and the six-stage envelope.

use std::io::Write;
use std::sync::Arc;

use resona_bank::{
    BankError, LoopMode, SoundBank, ZoneOscillator, load_sound_bank, load_sound_bank_bytes,
};
use resona_core::EngineConfig;
use resona_synth::{EnvGenSF, Generator};

// ---------------------------------------------------------------------------
// RIFF image builders
// ---------------------------------------------------------------------------

fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(tag);
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn list(subtype: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    let mut body = subtype.to_vec();
    for c in children {
        body.extend_from_slice(c);
    }
    chunk(b"LIST", &body)
}

fn name20(name: &str) -> [u8; 20] {
    let mut out = [0u8; 20];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

// ---------------------------------------------------------------------------
// Synthetic SF2
// ---------------------------------------------------------------------------

mod genop {
    pub const ATTACK_VOL_ENV: u16 = 34;
    pub const SUSTAIN_VOL_ENV: u16 = 37;
    pub const RELEASE_VOL_ENV: u16 = 38;
    pub const INSTRUMENT: u16 = 41;
    pub const KEY_RANGE: u16 = 43;
    pub const INITIAL_ATTENUATION: u16 = 48;
    pub const SAMPLE_ID: u16 = 53;
    pub const SAMPLE_MODES: u16 = 54;
}

fn gen_rec(oper: u16, amount: u16) -> [u8; 4] {
    let mut out = [0u8; 4];
    out[..2].copy_from_slice(&oper.to_le_bytes());
    out[2..].copy_from_slice(&amount.to_le_bytes());
    out
}

fn phdr_rec(name: &str, preset: u16, bank: u16, bag: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(38);
    out.extend_from_slice(&name20(name));
    out.extend_from_slice(&preset.to_le_bytes());
    out.extend_from_slice(&bank.to_le_bytes());
    out.extend_from_slice(&bag.to_le_bytes());
    out.extend_from_slice(&[0; 12]);
    out
}

fn bag_rec(r#gen: u16, modi: u16) -> [u8; 4] {
    let mut out = [0u8; 4];
    out[..2].copy_from_slice(&r#gen.to_le_bytes());
    out[2..].copy_from_slice(&modi.to_le_bytes());
    out
}

fn inst_rec(name: &str, bag: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(22);
    out.extend_from_slice(&name20(name));
    out.extend_from_slice(&bag.to_le_bytes());
    out
}

#[allow(clippy::too_many_arguments)]
fn shdr_rec(
    name: &str,
    start: u32,
    end: u32,
    loop_start: u32,
    loop_end: u32,
    rate: u32,
    key: u8,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(46);
    out.extend_from_slice(&name20(name));
    out.extend_from_slice(&start.to_le_bytes());
    out.extend_from_slice(&end.to_le_bytes());
    out.extend_from_slice(&loop_start.to_le_bytes());
    out.extend_from_slice(&loop_end.to_le_bytes());
    out.extend_from_slice(&rate.to_le_bytes());
    out.push(key);
    out.push(0); // correction
    out.extend_from_slice(&0u16.to_le_bytes()); // link
    out.extend_from_slice(&1u16.to_le_bytes()); // mono type
    out
}

/// One preset / one instrument / one 200-frame sample, with a continuous
/// loop, a 0.5 s attack (-1200 tc), -20 dB sustain (200 cb), and a 0.25 s
/// release (-2400 tc).
fn build_sf2() -> Vec<u8> {
    let samples: Vec<u8> = (0..200i16)
        .flat_map(|i| (i * 150).to_le_bytes())
        .collect();

    let mut phdr = phdr_rec("Piano", 0, 0, 0);
    phdr.extend_from_slice(&phdr_rec("EOP", 0, 0, 1));

    let mut pbag = bag_rec(0, 0).to_vec();
    pbag.extend_from_slice(&bag_rec(1, 0));

    let pmod = [0u8; 10]; // sentinel only

    let mut pgen = gen_rec(genop::INSTRUMENT, 0).to_vec();
    pgen.extend_from_slice(&gen_rec(0, 0)); // sentinel

    let mut inst = inst_rec("PianoIns", 0);
    inst.extend_from_slice(&inst_rec("EOI", 1));

    let mut ibag = bag_rec(0, 0).to_vec();
    ibag.extend_from_slice(&bag_rec(6, 0));

    let imod = [0u8; 10]; // sentinel only

    let mut igen = Vec::new();
    igen.extend_from_slice(&gen_rec(genop::KEY_RANGE, 36 | (96 << 8)));
    igen.extend_from_slice(&gen_rec(genop::ATTACK_VOL_ENV, (-1200i16) as u16));
    igen.extend_from_slice(&gen_rec(genop::RELEASE_VOL_ENV, (-2400i16) as u16));
    igen.extend_from_slice(&gen_rec(genop::SUSTAIN_VOL_ENV, 200));
    igen.extend_from_slice(&gen_rec(genop::SAMPLE_MODES, 1));
    igen.extend_from_slice(&gen_rec(genop::SAMPLE_ID, 0));
    igen.extend_from_slice(&gen_rec(0, 0)); // sentinel

    let mut shdr = shdr_rec("Samp", 0, 200, 50, 150, 44100, 60);
    shdr.extend_from_slice(&shdr_rec("EOS", 0, 0, 0, 0, 0, 0));

    let info = list(b"INFO", &[chunk(b"ifil", &[2, 0, 1, 0]), chunk(b"INAM", b"Test Bank\0")]);
    let sdta = list(b"sdta", &[chunk(b"smpl", &samples)]);
    let pdta = list(
        b"pdta",
        &[
            chunk(b"phdr", &phdr),
            chunk(b"pbag", &pbag),
            chunk(b"pmod", &pmod),
            chunk(b"pgen", &pgen),
            chunk(b"inst", &inst),
            chunk(b"ibag", &ibag),
            chunk(b"imod", &imod),
            chunk(b"igen", &igen),
            chunk(b"shdr", &shdr),
        ],
    );

    let mut form = b"sfbk".to_vec();
    form.extend_from_slice(&info);
    form.extend_from_slice(&sdta);
    form.extend_from_slice(&pdta);
    chunk(b"RIFF", &form)
}

// ---------------------------------------------------------------------------
// Synthetic DLS
// ---------------------------------------------------------------------------

mod dlsdst {
    pub const EG1_ATTACK: u16 = 0x0206;
    pub const EG1_SUSTAIN: u16 = 0x020a;
    pub const EG1_RELEASE: u16 = 0x0209;
}

fn art1(blocks: &[(u16, u16, u16, i32)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&8u32.to_le_bytes()); // cbSize
    body.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
    for &(src, ctl, dst, scale) in blocks {
        body.extend_from_slice(&src.to_le_bytes());
        body.extend_from_slice(&ctl.to_le_bytes());
        body.extend_from_slice(&dst.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes()); // transform
        body.extend_from_slice(&scale.to_le_bytes());
    }
    chunk(b"art1", &body)
}

fn wsmp(unity: u16, gain: i32, one_loop: Option<(u32, u32, u32)>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&20u32.to_le_bytes()); // cbSize
    body.extend_from_slice(&unity.to_le_bytes());
    body.extend_from_slice(&0i16.to_le_bytes()); // fine tune
    body.extend_from_slice(&gain.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes()); // options
    body.extend_from_slice(&(u32::from(one_loop.is_some())).to_le_bytes());
    if let Some((loop_type, start, length)) = one_loop {
        body.extend_from_slice(&16u32.to_le_bytes());
        body.extend_from_slice(&loop_type.to_le_bytes());
        body.extend_from_slice(&start.to_le_bytes());
        body.extend_from_slice(&length.to_le_bytes());
    }
    chunk(b"wsmp", &body)
}

/// One instrument (bank 0x41, program 5) with one region covering keys
/// 36..=96, one 100-frame 22050 Hz wave, forward loop 25..75.
fn build_dls() -> Vec<u8> {
    let colh = chunk(b"colh", &1u32.to_le_bytes());

    let mut rgnh = Vec::new();
    for v in [36u16, 96, 0, 127, 0, 0] {
        rgnh.extend_from_slice(&v.to_le_bytes());
    }

    let mut wlnk = Vec::new();
    wlnk.extend_from_slice(&0u16.to_le_bytes()); // options
    wlnk.extend_from_slice(&0u16.to_le_bytes()); // phase group
    wlnk.extend_from_slice(&1u32.to_le_bytes()); // channel
    wlnk.extend_from_slice(&0u32.to_le_bytes()); // table index

    let region = list(
        b"rgn ",
        &[
            chunk(b"rgnh", &rgnh),
            wsmp(60, 0, Some((0, 25, 50))),
            chunk(b"wlnk", &wlnk),
        ],
    );

    let lart = list(
        b"lart",
        &[art1(&[
            (0, 0, dlsdst::EG1_ATTACK, -1200 << 16),
            (0, 0, dlsdst::EG1_SUSTAIN, 500 << 16),
            // Duplicate attack row: first match must win, not this one.
            (0, 0, dlsdst::EG1_ATTACK, 0),
            (0, 0, dlsdst::EG1_RELEASE, -2400 << 16),
        ])],
    );

    let mut insh = Vec::new();
    insh.extend_from_slice(&1u32.to_le_bytes()); // region count
    insh.extend_from_slice(&0x41u32.to_le_bytes()); // bank
    insh.extend_from_slice(&5u32.to_le_bytes()); // program

    let ins = list(
        b"ins ",
        &[
            chunk(b"insh", &insh),
            list(b"lrgn", &[region]),
            lart,
            list(b"INFO", &[chunk(b"INAM", b"Strings\0")]),
        ],
    );
    let lins = list(b"lins", &[ins]);

    let ptbl = {
        let mut body = Vec::new();
        body.extend_from_slice(&8u32.to_le_bytes());
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes()); // cue: first wave
        chunk(b"ptbl", &body)
    };

    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes()); // PCM
    fmt.extend_from_slice(&1u16.to_le_bytes()); // mono
    fmt.extend_from_slice(&22050u32.to_le_bytes());
    fmt.extend_from_slice(&44100u32.to_le_bytes()); // avg bytes
    fmt.extend_from_slice(&2u16.to_le_bytes()); // align
    fmt.extend_from_slice(&16u16.to_le_bytes()); // bits

    let wave_data: Vec<u8> = (0..100i16)
        .flat_map(|i| (i * 300).to_le_bytes())
        .collect();
    let wave = list(
        b"wave",
        &[chunk(b"fmt ", &fmt), chunk(b"data", &wave_data)],
    );
    let wvpl = list(b"wvpl", &[wave]);

    let info = list(b"INFO", &[chunk(b"INAM", b"Test DLS\0")]);

    let mut form = b"DLS ".to_vec();
    form.extend_from_slice(&colh);
    form.extend_from_slice(&lins);
    form.extend_from_slice(&ptbl);
    form.extend_from_slice(&wvpl);
    form.extend_from_slice(&info);
    chunk(b"RIFF", &form)
}

// ---------------------------------------------------------------------------
// SF2 end to end
// ---------------------------------------------------------------------------

#[test]
fn sf2_loads_with_converted_units() {
    let bank = load_sound_bank_bytes(&build_sf2()).unwrap();
    assert_eq!(bank.name, "Test Bank");
    assert_eq!(bank.instruments.len(), 1);
    assert_eq!(bank.samples.len(), 1);

    let piano = bank.instrument(0, 0).unwrap();
    assert_eq!(piano.name, "Piano");
    assert!(!piano.is_drum);

    let zone = piano.zone_for(60, 100).unwrap();
    assert_eq!((zone.key_low, zone.key_high), (36, 96));
    assert_eq!(zone.loop_mode, LoopMode::Continuous);
    assert_eq!((zone.loop_start, zone.loop_end), (50, 150));

    // -1200 timecents = 0.5 s; -2400 = 0.25 s
    assert!((zone.vol_env.attack - 0.5).abs() < 1e-3);
    assert!((zone.vol_env.release - 0.25).abs() < 1e-3);
    // 200 cb below peak = -20 dB = 0.1 linear
    assert!((zone.vol_env.sustain - 0.1).abs() < 1e-3);
    // No attenuation generator: unity gain
    assert!((zone.attenuation - 1.0).abs() < 1e-6);

    let sample = bank.sample(zone).unwrap();
    assert_eq!(sample.data.len(), 200);
    assert_eq!(sample.sample_rate, 44100.0);
    assert_eq!(sample.root_key, 60);
    // 150 * 16 in i16 → normalized
    assert!((sample.data[16] - f32::from(150i16 * 16) / 32768.0).abs() < 1e-6);

    // Zones outside the key range do not match.
    assert!(piano.zone_for(20, 100).is_none());
}

#[test]
fn sf2_zone_drives_playback_end_to_end() {
    let bank = load_sound_bank_bytes(&build_sf2()).unwrap();
    let cfg = Arc::new(EngineConfig::new(44100.0, 16384));

    let zone = bank.instrument(0, 0).unwrap().zone_for(60, 100).unwrap();
    let sample = bank.sample(zone).unwrap().clone();
    let freq = cfg.frequency(60);
    let mut osc = ZoneOscillator::from_zone(cfg.clone(), sample, zone, freq, false);

    let mut env = EnvGenSF::new(cfg);
    let e = &zone.vol_env;
    env.init(&[e.delay, e.attack, e.hold, e.decay, e.sustain, e.release, 0.0]);

    let mut rendered = 0usize;
    for _ in 0..4410 {
        let s = osc.generate() * env.generate();
        assert!(s.is_finite());
        rendered += 1;
    }
    assert_eq!(rendered, 4410);
    assert!(!osc.is_finished(), "continuous loop must keep sounding");
}

#[test]
fn sf2_loads_from_disk() {
    let mut file = tempfile::Builder::new().suffix(".sf2").tempfile().unwrap();
    file.write_all(&build_sf2()).unwrap();
    file.flush().unwrap();

    let bank = load_sound_bank(file.path()).unwrap();
    assert_eq!(bank.instruments.len(), 1);
}

#[test]
fn truncated_sf2_fails_without_panic() {
    let image = build_sf2();
    // Chop the image at a few arbitrary points; every prefix must fail
    // cleanly, never panic, never produce a partial bank.
    for cut in [4usize, 11, 60, 200, image.len() - 3] {
        let err = load_sound_bank_bytes(&image[..cut]);
        assert!(err.is_err(), "cut at {cut} produced a bank");
    }
}

#[test]
fn sf2_with_ragged_record_table_is_malformed() {
    let mut image = build_sf2();
    // Grow the phdr chunk body by one byte: find the tag and bump the
    // declared size so it is no longer a multiple of 38.
    let pos = image.windows(4).position(|w| w == b"phdr").unwrap();
    let size = u32::from_le_bytes(image[pos + 4..pos + 8].try_into().unwrap());
    image[pos + 4..pos + 8].copy_from_slice(&(size - 1).to_le_bytes());
    match load_sound_bank_bytes(&image) {
        Err(BankError::Malformed { .. } | BankError::Truncated { .. }) => {}
        other => panic!("expected malformed/truncated, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// DLS end to end
// ---------------------------------------------------------------------------

#[test]
fn dls_loads_with_converted_units() {
    let bank = load_sound_bank_bytes(&build_dls()).unwrap();
    assert_eq!(bank.name, "Test DLS");

    let inst = bank.instrument(0x41, 5).unwrap();
    assert_eq!(inst.name, "Strings");
    assert!(!inst.is_drum);

    let zone = inst.zone_for(60, 64).unwrap();
    assert_eq!((zone.key_low, zone.key_high), (36, 96));
    assert_eq!(zone.loop_mode, LoopMode::Continuous);
    assert_eq!((zone.loop_start, zone.loop_end), (25, 75));
    assert_eq!(zone.root_key, Some(60));

    // First matching articulation row wins: attack 0.5 s, not the
    // duplicate's instant value.
    assert!((zone.vol_env.attack - 0.5).abs() < 1e-3);
    assert!((zone.vol_env.release - 0.25).abs() < 1e-3);
    // 500 per-mille sustain = 0.5 linear fraction
    assert!((zone.vol_env.sustain - 0.5).abs() < 1e-3);

    let sample = bank.sample(zone).unwrap();
    assert_eq!(sample.data.len(), 100);
    assert_eq!(sample.sample_rate, 22050.0);
}

#[test]
fn dls_zone_plays_at_half_speed_through_44100_engine() {
    let bank = load_sound_bank_bytes(&build_dls()).unwrap();
    let cfg = Arc::new(EngineConfig::new(44100.0, 16384));
    let zone = bank.instrument(0x41, 5).unwrap().zone_for(60, 64).unwrap();
    let sample = bank.sample(zone).unwrap().clone();

    let freq = cfg.frequency(60);
    let mut osc = ZoneOscillator::from_zone(cfg, sample, zone, freq, false);
    for _ in 0..100 {
        osc.generate();
    }
    // 22050 Hz material through a 44100 Hz engine advances half a frame
    // per output sample.
    assert!((osc.position() - 50.0).abs() < 1e-2);
}

#[test]
fn dls_missing_collection_header_is_rejected() {
    let image = build_dls();
    // Rebuild without colh: strip the chunk (12 bytes at its position).
    let pos = image.windows(4).position(|w| w == b"colh").unwrap();
    let mut stripped = image[..pos].to_vec();
    stripped.extend_from_slice(&image[pos + 12..]);
    // Fix the RIFF size field.
    let new_size = (stripped.len() - 8) as u32;
    stripped[4..8].copy_from_slice(&new_size.to_le_bytes());

    assert!(matches!(
        load_sound_bank_bytes(&stripped),
        Err(BankError::MissingChunk { .. })
    ));
}

// ---------------------------------------------------------------------------
// Shared-bank lock bracket
// ---------------------------------------------------------------------------

#[test]
fn bank_reload_brackets_with_write_lock() {
    let shared = load_sound_bank_bytes(&build_sf2()).unwrap().into_shared();

    // Playback side: read lock.
    {
        let bank = shared.read().unwrap();
        assert_eq!(bank.instruments.len(), 1);
    }

    // Reload side: write lock swaps the contents wholesale.
    {
        let mut bank = shared.write().unwrap();
        *bank = SoundBank::default();
    }
    assert_eq!(shared.read().unwrap().instruments.len(), 0);
}
