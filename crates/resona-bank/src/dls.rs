//! DLS (Downloadable Sounds) ingestion.
//!
//! Two phases, like the SF2 side: [`parse_dls`] walks the RIFF tree and
//! materializes the raw record hierarchy — instruments with their MIDI
//! locale headers, regions, articulation connection blocks, the pool
//! table, and the wave pool — then [`build_sound_bank`] converts that
//! tree into the shared [`SoundBank`] model, routing every unit
//! conversion through `resona_core::units`.
//!
//! Collections whose lengths are unknown ahead of the read (regions,
//! connection blocks, waves) are built as ordered append-only vectors.

use std::sync::Arc;

use tracing::{debug, warn};

use resona_core::{dls_gain_to_linear, dls_percent, dls_time_to_seconds};

use crate::error::{BankError, Result};
use crate::model::{EnvParams, Instrument, LoopMode, SampleData, SoundBank, Zone};
use crate::riff::{Chunk, FourCc, open_riff, read_zstring};

/// Articulation source and destination identifiers.
///
/// Only the subset the builder consumes is named; unknown values pass
/// through the records untouched.
pub mod conn {
    /// No modulation source — a constant connection.
    pub const SRC_NONE: u16 = 0x0000;
    /// Note-on velocity source.
    pub const SRC_KEY_ON_VELOCITY: u16 = 0x0002;
    /// Key number source.
    pub const SRC_KEY_NUMBER: u16 = 0x0003;

    /// Destination: overall gain, 1/65536 dB units.
    pub const DST_GAIN: u16 = 0x0001;
    /// Destination: pitch offset.
    pub const DST_PITCH: u16 = 0x0003;
    /// Destination: pan, 16.16 fixed-point 0.1% units.
    pub const DST_PAN: u16 = 0x0004;
    /// Destination: EG1 attack time, 16.16 time cents.
    pub const DST_EG1_ATTACK: u16 = 0x0206;
    /// Destination: EG1 decay time, 16.16 time cents.
    pub const DST_EG1_DECAY: u16 = 0x0207;
    /// Destination: EG1 release time, 16.16 time cents.
    pub const DST_EG1_RELEASE: u16 = 0x0209;
    /// Destination: EG1 sustain level, 16.16 fixed-point 0.1% units.
    pub const DST_EG1_SUSTAIN: u16 = 0x020a;
    /// Destination: EG1 delay time (level 2 banks).
    pub const DST_EG1_DELAY: u16 = 0x020b;
    /// Destination: EG1 hold time (level 2 banks).
    pub const DST_EG1_HOLD: u16 = 0x020c;
}

/// The "instantaneous" articulation time sentinel.
const TIME_INSTANT: i32 = i32::MIN;
/// Default sustain: 100% in 16.16 fixed-point 0.1% units.
const SUSTAIN_FULL: i32 = 1000 << 16;

/// One `art1` connection block: destination `destination` receives
/// `scale`, optionally gated by `source`/`control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionBlock {
    /// Modulation source.
    pub source: u16,
    /// Modulation control.
    pub control: u16,
    /// Destination parameter.
    pub destination: u16,
    /// Transform applied to the source.
    pub transform: u16,
    /// Scale amount in the destination's native units.
    pub scale: i32,
}

/// Find a connection's scale against a flat connection-block list.
///
/// Linear scan; the **first** exact (source, control, destination) match
/// wins and duplicate rows are never aggregated.
pub fn connection_find(
    blocks: &[ConnectionBlock],
    source: u16,
    control: u16,
    destination: u16,
) -> Option<i32> {
    blocks
        .iter()
        .find(|b| b.source == source && b.control == control && b.destination == destination)
        .map(|b| b.scale)
}

/// [`connection_find`] with a caller-supplied default on a miss.
pub fn connection_lookup(
    blocks: &[ConnectionBlock],
    source: u16,
    control: u16,
    destination: u16,
    default: i32,
) -> i32 {
    connection_find(blocks, source, control, destination).unwrap_or(default)
}

/// Sample playback data from a `wsmp` chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveSample {
    /// MIDI key the recording is pitched at.
    pub unity_note: u16,
    /// Fine tune in relative pitch units.
    pub fine_tune: i16,
    /// Gain in 1/65536 dB units.
    pub gain: i32,
    /// First loop record; the file may declare more, playback uses one.
    pub loops: Option<WaveLoop>,
}

/// One `wsmp` loop record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveLoop {
    /// 0 = forward loop, 1 = loop-until-release.
    pub loop_type: u32,
    /// Loop start frame.
    pub start: u32,
    /// Loop length in frames.
    pub length: u32,
}

/// A region record: ranges, sample link, per-region overrides.
#[derive(Debug, Clone)]
pub struct DlsRegion {
    /// Lowest MIDI key.
    pub key_low: u16,
    /// Highest MIDI key.
    pub key_high: u16,
    /// Lowest velocity.
    pub vel_low: u16,
    /// Highest velocity.
    pub vel_high: u16,
    /// Region option flags.
    pub options: u16,
    /// Exclusive key group (drums).
    pub key_group: u16,
    /// Per-region sample data override.
    pub sample: Option<WaveSample>,
    /// Index into the pool table.
    pub table_index: u32,
    /// Per-region articulation overrides.
    pub articulations: Vec<ConnectionBlock>,
}

/// An instrument record: locale header, regions, articulation, info.
#[derive(Debug, Clone)]
pub struct DlsInstrument {
    /// Packed 32-bit bank locale field, decoded by [`bank`](Self::bank).
    pub bank_raw: u32,
    /// Packed 32-bit program locale field.
    pub program_raw: u32,
    /// Display name from the instrument's INFO list.
    pub name: String,
    /// Regions in file order.
    pub regions: Vec<DlsRegion>,
    /// Instrument-level articulation.
    pub articulations: Vec<ConnectionBlock>,
}

impl DlsInstrument {
    /// Decode the bank number from the packed locale field.
    ///
    /// Authoring tools disagree on where the bank lives, so the decode
    /// has a two-place fallback that must be preserved exactly: field 0
    /// is the GM default bank; the top bit marks a drum kit on bank 128;
    /// otherwise the low 7 bits when non-zero, else bits 8–14.
    pub fn bank(&self) -> u16 {
        if self.bank_raw == 0 {
            return 0;
        }
        if self.bank_raw & 0x8000_0000 != 0 {
            return 128;
        }
        let low = (self.bank_raw & 0x7f) as u16;
        if low != 0 {
            low
        } else {
            ((self.bank_raw >> 8) & 0x7f) as u16
        }
    }

    /// Program number from the packed locale field.
    pub fn program(&self) -> u8 {
        (self.program_raw & 0x7f) as u8
    }

    /// Whether the locale's drum bit is set.
    pub fn is_drum(&self) -> bool {
        self.bank_raw & 0x8000_0000 != 0
    }
}

/// A decoded wave-pool entry.
#[derive(Debug, Clone)]
pub struct DlsWave {
    /// Display name from the wave's INFO list.
    pub name: String,
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// Normalized mono samples.
    pub data: Vec<f32>,
    /// Wave-level playback data.
    pub sample: Option<WaveSample>,
}

/// The raw record tree of one DLS file.
#[derive(Debug, Clone, Default)]
pub struct DlsFile {
    /// Bank name from the file INFO list.
    pub name: String,
    /// Instrument count declared by the `colh` header.
    pub declared_instruments: u32,
    /// Instrument records.
    pub instruments: Vec<DlsInstrument>,
    /// Pool-table cues: byte offsets of each wave within the pool.
    pub pool_table: Vec<u32>,
    /// Wave pool entries paired with their pool offsets.
    pub waves: Vec<(u32, DlsWave)>,
}

impl DlsFile {
    /// Resolve a region's pool-table index to a wave-pool position.
    pub fn wave_for_table_index(&self, table_index: u32) -> Option<usize> {
        let cue = *self.pool_table.get(table_index as usize)?;
        self.waves.iter().position(|&(off, _)| off == cue)
    }
}

/// Phase one: materialize the raw record tree from DLS file bytes.
pub fn parse_dls(buf: &[u8]) -> Result<DlsFile> {
    let (form, mut chunks) = open_riff(buf)?;
    if form != b"DLS " {
        return Err(BankError::UnknownForm { form });
    }

    let mut file = DlsFile::default();
    let mut saw_colh = false;

    while let Some(chunk) = chunks.next_chunk()? {
        match &chunk.tag.0 {
            b"colh" => {
                let mut cur = chunk.cursor();
                file.declared_instruments = cur.read_u32()?;
                saw_colh = true;
            }
            b"ptbl" => {
                let mut cur = chunk.cursor();
                let cb_size = cur.read_u32()? as usize;
                let cues = cur.read_u32()?;
                // cbSize counts the header; skip any extension bytes.
                if cb_size > 8 {
                    cur.skip(cb_size - 8)?;
                }
                for _ in 0..cues {
                    file.pool_table.push(cur.read_u32()?);
                }
            }
            b"LIST" => match &chunk.list_type()?.0 {
                b"lins" => parse_instrument_list(&chunk, &mut file.instruments)?,
                b"wvpl" => parse_wave_pool(&chunk, &mut file.waves)?,
                b"INFO" => {
                    file.name = parse_info_name(&chunk)?.unwrap_or_default();
                }
                other => {
                    debug!(list = %FourCc(*other), "skipping unrecognized DLS list");
                }
            },
            _ => {
                debug!(tag = %chunk.tag, "skipping unrecognized DLS chunk");
            }
        }
    }

    if !saw_colh {
        return Err(BankError::MissingChunk {
            tag: FourCc(*b"colh"),
        });
    }
    if file.instruments.len() != file.declared_instruments as usize {
        warn!(
            declared = file.declared_instruments,
            found = file.instruments.len(),
            "DLS collection header disagrees with instrument list"
        );
    }
    debug!(
        instruments = file.instruments.len(),
        waves = file.waves.len(),
        "parsed DLS record tree"
    );
    Ok(file)
}

fn parse_info_name(list: &Chunk<'_>) -> Result<Option<String>> {
    let mut children = list.children();
    while let Some(c) = children.next_chunk()? {
        if c.tag == b"INAM" {
            return Ok(Some(read_zstring(c.data)));
        }
    }
    Ok(None)
}

fn parse_instrument_list(list: &Chunk<'_>, out: &mut Vec<DlsInstrument>) -> Result<()> {
    let mut children = list.children();
    while let Some(c) = children.next_chunk()? {
        if c.tag == FourCc::LIST && c.list_type()? == b"ins " {
            out.push(parse_instrument(&c)?);
        }
    }
    Ok(())
}

fn parse_instrument(list: &Chunk<'_>) -> Result<DlsInstrument> {
    let mut inst = DlsInstrument {
        bank_raw: 0,
        program_raw: 0,
        name: String::new(),
        regions: Vec::new(),
        articulations: Vec::new(),
    };
    let mut children = list.children();
    while let Some(c) = children.next_chunk()? {
        match &c.tag.0 {
            b"insh" => {
                let mut cur = c.cursor();
                let _region_count = cur.read_u32()?;
                inst.bank_raw = cur.read_u32()?;
                inst.program_raw = cur.read_u32()?;
            }
            b"LIST" => match &c.list_type()?.0 {
                b"lrgn" => parse_region_list(&c, &mut inst.regions)?,
                b"lart" | b"lar2" => parse_articulation_list(&c, &mut inst.articulations)?,
                b"INFO" => {
                    if let Some(name) = parse_info_name(&c)? {
                        inst.name = name;
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
    Ok(inst)
}

fn parse_region_list(list: &Chunk<'_>, out: &mut Vec<DlsRegion>) -> Result<()> {
    let mut children = list.children();
    while let Some(c) = children.next_chunk()? {
        if c.tag == FourCc::LIST {
            let sub = c.list_type()?;
            if sub == b"rgn " || sub == b"rgn2" {
                out.push(parse_region(&c)?);
            }
        }
    }
    Ok(())
}

fn parse_region(list: &Chunk<'_>) -> Result<DlsRegion> {
    let mut region = DlsRegion {
        key_low: 0,
        key_high: 127,
        vel_low: 0,
        vel_high: 127,
        options: 0,
        key_group: 0,
        sample: None,
        table_index: 0,
        articulations: Vec::new(),
    };
    let mut children = list.children();
    while let Some(c) = children.next_chunk()? {
        match &c.tag.0 {
            b"rgnh" => {
                let mut cur = c.cursor();
                region.key_low = cur.read_u16()?;
                region.key_high = cur.read_u16()?;
                region.vel_low = cur.read_u16()?;
                region.vel_high = cur.read_u16()?;
                region.options = cur.read_u16()?;
                region.key_group = cur.read_u16()?;
            }
            b"wsmp" => {
                region.sample = Some(parse_wave_sample(&c)?);
            }
            b"wlnk" => {
                let mut cur = c.cursor();
                let _options = cur.read_u16()?;
                let _phase_group = cur.read_u16()?;
                let _channel = cur.read_u32()?;
                region.table_index = cur.read_u32()?;
            }
            b"LIST" => {
                let sub = c.list_type()?;
                if sub == b"lart" || sub == b"lar2" {
                    parse_articulation_list(&c, &mut region.articulations)?;
                }
            }
            _ => {}
        }
    }
    Ok(region)
}

fn parse_wave_sample(chunk: &Chunk<'_>) -> Result<WaveSample> {
    let mut cur = chunk.cursor();
    let cb_size = cur.read_u32()? as usize;
    let unity_note = cur.read_u16()?;
    let fine_tune = cur.read_i16()?;
    let gain = cur.read_i32()?;
    let _options = cur.read_u32()?;
    let loop_count = cur.read_u32()?;
    if cb_size > 20 {
        cur.skip(cb_size - 20)?;
    }
    // Multiple loops are legal in the file; playback consumes the first.
    let mut first_loop = None;
    for _ in 0..loop_count {
        let loop_cb = cur.read_u32()? as usize;
        let loop_type = cur.read_u32()?;
        let start = cur.read_u32()?;
        let length = cur.read_u32()?;
        if loop_cb > 16 {
            cur.skip(loop_cb - 16)?;
        }
        if first_loop.is_none() {
            first_loop = Some(WaveLoop {
                loop_type,
                start,
                length,
            });
        }
    }
    Ok(WaveSample {
        unity_note,
        fine_tune,
        gain,
        loops: first_loop,
    })
}

fn parse_articulation_list(list: &Chunk<'_>, out: &mut Vec<ConnectionBlock>) -> Result<()> {
    let mut children = list.children();
    while let Some(c) = children.next_chunk()? {
        if c.tag == b"art1" || c.tag == b"art2" {
            let mut cur = c.cursor();
            let cb_size = cur.read_u32()? as usize;
            let count = cur.read_u32()?;
            if cb_size > 8 {
                cur.skip(cb_size - 8)?;
            }
            for _ in 0..count {
                out.push(ConnectionBlock {
                    source: cur.read_u16()?,
                    control: cur.read_u16()?,
                    destination: cur.read_u16()?,
                    transform: cur.read_u16()?,
                    scale: cur.read_i32()?,
                });
            }
        }
    }
    Ok(())
}

fn parse_wave_pool(list: &Chunk<'_>, out: &mut Vec<(u32, DlsWave)>) -> Result<()> {
    let mut children = list.children();
    loop {
        let offset = children.offset() as u32;
        let Some(c) = children.next_chunk()? else {
            break;
        };
        if c.tag == FourCc::LIST && c.list_type()? == b"wave" {
            out.push((offset, parse_wave(&c)?));
        }
    }
    Ok(())
}

fn parse_wave(list: &Chunk<'_>) -> Result<DlsWave> {
    let mut name = String::new();
    let mut sample = None;
    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    let mut data_chunk: Option<&[u8]> = None;

    let mut children = list.children();
    while let Some(c) = children.next_chunk()? {
        match &c.tag.0 {
            b"fmt " => {
                let mut cur = c.cursor();
                let format_tag = cur.read_u16()?;
                let channels = cur.read_u16()?;
                let rate = cur.read_u32()?;
                let _avg_bytes = cur.read_u32()?;
                let _block_align = cur.read_u16()?;
                let bits = cur.read_u16()?;
                fmt = Some((format_tag, channels, rate, bits));
            }
            b"data" => data_chunk = Some(c.data),
            b"wsmp" => sample = Some(parse_wave_sample(&c)?),
            b"LIST" => {
                if c.list_type()? == b"INFO" {
                    if let Some(n) = parse_info_name(&c)? {
                        name = n;
                    }
                }
            }
            _ => {}
        }
    }

    let Some((format_tag, channels, sample_rate, bits)) = fmt else {
        return Err(BankError::MissingChunk {
            tag: FourCc(*b"fmt "),
        });
    };
    let Some(raw) = data_chunk else {
        return Err(BankError::MissingChunk {
            tag: FourCc(*b"data"),
        });
    };
    if format_tag != 1 {
        return Err(BankError::Unsupported(format!(
            "DLS wave format tag {format_tag} (only PCM is supported)"
        )));
    }
    if channels != 1 {
        return Err(BankError::Unsupported(format!(
            "DLS wave with {channels} channels (only mono is supported)"
        )));
    }

    let data = decode_pcm(raw, bits)?;
    Ok(DlsWave {
        name,
        sample_rate,
        data,
        sample,
    })
}

/// Decode 8-bit unsigned or 16-bit signed PCM to normalized f32.
fn decode_pcm(raw: &[u8], bits: u16) -> Result<Vec<f32>> {
    let frames = match bits {
        8 => raw.len(),
        16 => raw.len() / 2,
        other => {
            return Err(BankError::Unsupported(format!(
                "{other}-bit DLS sample data"
            )));
        }
    };
    let mut data = Vec::new();
    data.try_reserve_exact(frames).map_err(|_| BankError::Alloc {
        bytes: frames * core::mem::size_of::<f32>(),
    })?;
    match bits {
        8 => {
            for &b in raw {
                data.push((f32::from(b) - 128.0) / 128.0);
            }
        }
        _ => {
            for pair in raw.chunks_exact(2) {
                let v = i16::from_le_bytes([pair[0], pair[1]]);
                data.push(f32::from(v) / 32768.0);
            }
        }
    }
    Ok(data)
}

/// Phase two: emit the shared model from the raw record tree.
///
/// Articulation is resolved per region with the instrument-level list as
/// fallback; every value is converted to engine-native units here and
/// nowhere else.
pub fn build_sound_bank(file: &DlsFile) -> Result<SoundBank> {
    let mut bank = SoundBank {
        name: file.name.clone(),
        instruments: Vec::with_capacity(file.instruments.len()),
        samples: Vec::with_capacity(file.waves.len()),
    };

    for (_, wave) in &file.waves {
        let ws = wave.sample.unwrap_or_default();
        let (loop_start, loop_end) = match ws.loops {
            Some(l) => (l.start, l.start + l.length),
            None => (0, 0),
        };
        bank.samples.push(Arc::new(SampleData {
            name: wave.name.clone(),
            data: wave.data.clone(),
            sample_rate: wave.sample_rate as f32,
            loop_start,
            loop_end,
            root_key: (ws.unity_note & 0x7f) as u8,
            fine_tune: (ws.fine_tune.clamp(-128, 127)) as i8,
        }));
    }

    for inst in &file.instruments {
        let mut zones = Vec::with_capacity(inst.regions.len());
        for region in &inst.regions {
            let Some(sample_index) = file.wave_for_table_index(region.table_index) else {
                return Err(BankError::malformed(
                    FourCc(*b"wlnk"),
                    format!(
                        "region links pool index {} with no matching wave",
                        region.table_index
                    ),
                ));
            };
            zones.push(build_zone(region, inst, sample_index, file));
        }
        bank.instruments.push(Instrument {
            bank: inst.bank(),
            program: inst.program(),
            is_drum: inst.is_drum(),
            name: inst.name.clone(),
            zones,
        });
    }

    Ok(bank)
}

fn build_zone(
    region: &DlsRegion,
    inst: &DlsInstrument,
    sample_index: usize,
    file: &DlsFile,
) -> Zone {
    // Region articulation overrides instrument articulation row by row:
    // the region list is scanned first, then the instrument list, each
    // first-match-wins.
    let lookup = |dest: u16, default: i32| {
        connection_find(&region.articulations, conn::SRC_NONE, 0, dest)
            .or_else(|| connection_find(&inst.articulations, conn::SRC_NONE, 0, dest))
            .unwrap_or(default)
    };

    let vol_env = EnvParams {
        delay: dls_time_to_seconds(lookup(conn::DST_EG1_DELAY, TIME_INSTANT)),
        attack: dls_time_to_seconds(lookup(conn::DST_EG1_ATTACK, TIME_INSTANT)),
        hold: dls_time_to_seconds(lookup(conn::DST_EG1_HOLD, TIME_INSTANT)),
        decay: dls_time_to_seconds(lookup(conn::DST_EG1_DECAY, TIME_INSTANT)),
        sustain: dls_percent(lookup(conn::DST_EG1_SUSTAIN, SUSTAIN_FULL)),
        release: dls_time_to_seconds(lookup(conn::DST_EG1_RELEASE, TIME_INSTANT)),
    };

    // Region wsmp overrides the wave-level wsmp.
    let wave_sample = region
        .sample
        .or(file.waves[sample_index].1.sample)
        .unwrap_or_default();

    let (loop_mode, loop_start, loop_end) = match wave_sample.loops {
        Some(l) => {
            let mode = if l.loop_type == 1 {
                LoopMode::UntilRelease
            } else {
                LoopMode::Continuous
            };
            (mode, l.start, l.start + l.length)
        }
        None => (LoopMode::None, 0, 0),
    };

    Zone {
        key_low: (region.key_low & 0x7f) as u8,
        key_high: (region.key_high & 0x7f) as u8,
        vel_low: (region.vel_low & 0x7f) as u8,
        vel_high: (region.vel_high & 0x7f) as u8,
        sample: sample_index,
        root_key: Some((wave_sample.unity_note & 0x7f) as u8),
        tune_cents: f32::from(wave_sample.fine_tune),
        loop_mode,
        loop_start,
        loop_end,
        attenuation: dls_gain_to_linear(wave_sample.gain),
        pan: dls_percent(lookup(conn::DST_PAN, 0)) * 2.0,
        vol_env,
    }
}
