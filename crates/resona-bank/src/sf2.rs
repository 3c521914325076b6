//! SoundFont 2 (SF2) ingestion.
//!
//! Phase one ([`parse_sf2`]) walks the `sfbk` RIFF form and materializes
//! the nine flat `pdta` tables plus the `sdta` sample data. Phase two
//! ([`build_sound_bank`]) resolves the index-range hierarchy — preset →
//! preset bags → instruments → instrument bags → sample headers — and
//! emits the shared [`SoundBank`] model.
//!
//! Hierarchy in this format is expressed entirely as half-open index
//! ranges: entry *n*'s children are bag rows `[bag[n], bag[n+1])`, and a
//! bag's generators are ranged the same way into the generator table.
//! Each table therefore ends in a sentinel record that exists solely to
//! bound the final real entry; a missing sentinel is a malformed file.

use std::sync::Arc;

use tracing::debug;

use resona_core::{centibels_to_linear, time_cents_to_seconds};

use crate::error::{BankError, Result};
use crate::model::{EnvParams, Instrument, LoopMode, SampleData, SoundBank, Zone};
use crate::riff::{Chunk, FourCc, open_riff, read_zstring};

/// Generator operator identifiers (the subset the builder consumes).
pub mod r#gen {
    /// Pan, 0.1% units, −500..500.
    pub const PAN: u16 = 17;
    /// Volume envelope delay, absolute time cents.
    pub const DELAY_VOL_ENV: u16 = 33;
    /// Volume envelope attack, absolute time cents.
    pub const ATTACK_VOL_ENV: u16 = 34;
    /// Volume envelope hold, absolute time cents.
    pub const HOLD_VOL_ENV: u16 = 35;
    /// Volume envelope decay, absolute time cents.
    pub const DECAY_VOL_ENV: u16 = 36;
    /// Volume envelope sustain, centibels of attenuation below peak.
    pub const SUSTAIN_VOL_ENV: u16 = 37;
    /// Volume envelope release, absolute time cents.
    pub const RELEASE_VOL_ENV: u16 = 38;
    /// Instrument index (preset zones only).
    pub const INSTRUMENT: u16 = 41;
    /// Key range, low byte..high byte.
    pub const KEY_RANGE: u16 = 43;
    /// Velocity range, low byte..high byte.
    pub const VEL_RANGE: u16 = 44;
    /// Initial attenuation, centibels.
    pub const INITIAL_ATTENUATION: u16 = 48;
    /// Coarse tune, semitones.
    pub const COARSE_TUNE: u16 = 51;
    /// Fine tune, cents.
    pub const FINE_TUNE: u16 = 52;
    /// Sample header index (instrument zones only).
    pub const SAMPLE_ID: u16 = 53;
    /// Loop mode flags.
    pub const SAMPLE_MODES: u16 = 54;
    /// Root key override.
    pub const OVERRIDING_ROOT_KEY: u16 = 58;

    /// One past the highest operator a conforming file can carry.
    pub const OPER_COUNT: usize = 64;
}

/// Default envelope time when a generator is absent: −12000 absolute
/// time cents, about a millisecond.
const DEFAULT_TIMECENTS: i16 = -12000;

/// A `phdr` record.
#[derive(Debug, Clone)]
pub struct PresetHeader {
    /// Preset display name.
    pub name: String,
    /// Program number.
    pub preset: u16,
    /// Bank number.
    pub bank: u16,
    /// First `pbag` row of this preset's zones.
    pub bag_index: u16,
    /// Library handle (unused by playback).
    pub library: u32,
    /// Genre handle (unused by playback).
    pub genre: u32,
    /// Morphology handle (unused by playback).
    pub morphology: u32,
}

/// A `pbag`/`ibag` record: the start of a zone's generator and modulator
/// ranges.
#[derive(Debug, Clone, Copy)]
pub struct Bag {
    /// First generator row of this zone.
    pub gen_index: u16,
    /// First modulator row of this zone.
    pub mod_index: u16,
}

/// A `pgen`/`igen` record: (operator, amount) keyed by index range.
#[derive(Debug, Clone, Copy)]
pub struct GenRecord {
    /// Generator operator.
    pub oper: u16,
    /// Raw 16-bit amount; signed for values, packed bytes for ranges.
    pub amount: u16,
}

impl GenRecord {
    /// The amount as a signed value.
    pub fn value(&self) -> i16 {
        self.amount as i16
    }

    /// The amount as a (low, high) range.
    pub fn range(&self) -> (u8, u8) {
        ((self.amount & 0xff) as u8, (self.amount >> 8) as u8)
    }
}

/// A `pmod`/`imod` record. Parsed and carried; default modulators only
/// are honored downstream.
#[derive(Debug, Clone, Copy)]
pub struct ModRecord {
    /// Modulation source operator.
    pub src: u16,
    /// Destination generator.
    pub dest: u16,
    /// Amount in destination units.
    pub amount: i16,
    /// Amount-source operator.
    pub amt_src: u16,
    /// Transform operator.
    pub transform: u16,
}

/// An `inst` record.
#[derive(Debug, Clone)]
pub struct InstRecord {
    /// Instrument display name.
    pub name: String,
    /// First `ibag` row of this instrument's zones.
    pub bag_index: u16,
}

/// An `shdr` record.
#[derive(Debug, Clone)]
pub struct SampleHeader {
    /// Sample display name.
    pub name: String,
    /// First frame in the `smpl` data.
    pub start: u32,
    /// One past the last frame.
    pub end: u32,
    /// Loop start frame (absolute).
    pub loop_start: u32,
    /// Loop end frame (absolute, exclusive).
    pub loop_end: u32,
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// MIDI key the recording is pitched at.
    pub original_key: u8,
    /// Pitch correction in cents.
    pub correction: i8,
    /// Linked sample (stereo pairs).
    pub sample_link: u16,
    /// Sample type flags.
    pub sample_type: u16,
}

/// The raw tables of one SF2 file.
#[derive(Debug, Clone, Default)]
pub struct Sf2File {
    /// Bank name from INFO/INAM.
    pub name: String,
    /// Raw 16-bit sample data from `sdta`/`smpl`.
    pub sample_data: Vec<i16>,
    /// Preset headers (`phdr`), sentinel last.
    pub presets: Vec<PresetHeader>,
    /// Preset zone bags (`pbag`), sentinel last.
    pub pbag: Vec<Bag>,
    /// Preset modulators (`pmod`), sentinel last.
    pub pmod: Vec<ModRecord>,
    /// Preset generators (`pgen`), sentinel last.
    pub pgen: Vec<GenRecord>,
    /// Instrument headers (`inst`), sentinel last.
    pub insts: Vec<InstRecord>,
    /// Instrument zone bags (`ibag`), sentinel last.
    pub ibag: Vec<Bag>,
    /// Instrument modulators (`imod`), sentinel last.
    pub imod: Vec<ModRecord>,
    /// Instrument generators (`igen`), sentinel last.
    pub igen: Vec<GenRecord>,
    /// Sample headers (`shdr`), sentinel last.
    pub shdr: Vec<SampleHeader>,
}

impl Sf2File {
    /// Number of real presets (sentinel excluded).
    pub fn preset_count(&self) -> usize {
        self.presets.len().saturating_sub(1)
    }

    /// Preset *n*'s zone rows: `pbag[phdr[n].bag .. phdr[n+1].bag)`.
    ///
    /// Bounded to exclude the terminal sentinel bag, which every real
    /// zone needs as its successor.
    pub fn preset_zone_range(&self, n: usize) -> Result<core::ops::Range<usize>> {
        range_of(
            FourCc(*b"pbag"),
            self.presets[n].bag_index,
            self.presets[n + 1].bag_index,
            self.pbag.len().saturating_sub(1),
        )
    }

    /// Preset zone `b`'s generators: `pgen[pbag[b] .. pbag[b+1])`.
    pub fn preset_gen_range(&self, b: usize) -> Result<core::ops::Range<usize>> {
        range_of(
            FourCc(*b"pgen"),
            self.pbag[b].gen_index,
            self.pbag[b + 1].gen_index,
            self.pgen.len().saturating_sub(1),
        )
    }

    /// Instrument *n*'s zone rows: `ibag[inst[n].bag .. inst[n+1].bag)`.
    pub fn inst_zone_range(&self, n: usize) -> Result<core::ops::Range<usize>> {
        range_of(
            FourCc(*b"ibag"),
            self.insts[n].bag_index,
            self.insts[n + 1].bag_index,
            self.ibag.len().saturating_sub(1),
        )
    }

    /// Instrument zone `b`'s generators: `igen[ibag[b] .. ibag[b+1])`.
    pub fn inst_gen_range(&self, b: usize) -> Result<core::ops::Range<usize>> {
        range_of(
            FourCc(*b"igen"),
            self.ibag[b].gen_index,
            self.ibag[b + 1].gen_index,
            self.igen.len().saturating_sub(1),
        )
    }
}

fn range_of(tag: FourCc, start: u16, end: u16, table_len: usize) -> Result<core::ops::Range<usize>> {
    let (start, end) = (start as usize, end as usize);
    if start > end || end > table_len {
        return Err(BankError::malformed(
            tag,
            format!("bag range {start}..{end} exceeds table of {table_len}"),
        ));
    }
    Ok(start..end)
}

/// Phase one: materialize the raw tables from SF2 file bytes.
pub fn parse_sf2(buf: &[u8]) -> Result<Sf2File> {
    let (form, mut chunks) = open_riff(buf)?;
    if form != b"sfbk" {
        return Err(BankError::UnknownForm { form });
    }

    let mut file = Sf2File::default();
    let mut saw_pdta = false;

    while let Some(chunk) = chunks.next_chunk()? {
        if chunk.tag != FourCc::LIST {
            debug!(tag = %chunk.tag, "skipping unrecognized top-level chunk");
            continue;
        }
        match &chunk.list_type()?.0 {
            b"INFO" => {
                let mut children = chunk.children();
                while let Some(c) = children.next_chunk()? {
                    if c.tag == b"INAM" {
                        file.name = read_zstring(c.data);
                    }
                }
            }
            b"sdta" => {
                let mut children = chunk.children();
                while let Some(c) = children.next_chunk()? {
                    if c.tag == b"smpl" {
                        file.sample_data = decode_sample_data(c.data)?;
                    }
                }
            }
            b"pdta" => {
                parse_pdta(&chunk, &mut file)?;
                saw_pdta = true;
            }
            other => {
                debug!(list = %FourCc(*other), "skipping unrecognized SF2 list");
            }
        }
    }

    if !saw_pdta {
        return Err(BankError::MissingChunk {
            tag: FourCc(*b"pdta"),
        });
    }
    debug!(
        presets = file.preset_count(),
        instruments = file.insts.len().saturating_sub(1),
        samples = file.shdr.len().saturating_sub(1),
        "parsed SF2 tables"
    );
    Ok(file)
}

fn decode_sample_data(raw: &[u8]) -> Result<Vec<i16>> {
    let frames = raw.len() / 2;
    let mut data = Vec::new();
    data.try_reserve_exact(frames).map_err(|_| BankError::Alloc {
        bytes: frames * core::mem::size_of::<i16>(),
    })?;
    for pair in raw.chunks_exact(2) {
        data.push(i16::from_le_bytes([pair[0], pair[1]]));
    }
    Ok(data)
}

/// Decode one fixed-record chunk, checking the size divides evenly and a
/// sentinel record is present.
fn fixed_records<'a, T>(
    chunk: &Chunk<'a>,
    record_size: usize,
    mut decode: impl FnMut(&mut crate::riff::Cursor<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    if chunk.data.len() % record_size != 0 {
        return Err(BankError::malformed(
            chunk.tag,
            format!(
                "size {} is not a multiple of the {record_size}-byte record",
                chunk.data.len()
            ),
        ));
    }
    let count = chunk.data.len() / record_size;
    if count == 0 {
        return Err(BankError::malformed(chunk.tag, "missing sentinel record"));
    }
    let mut cur = chunk.cursor();
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(decode(&mut cur)?);
    }
    Ok(out)
}

fn parse_pdta(list: &Chunk<'_>, file: &mut Sf2File) -> Result<()> {
    let mut children = list.children();
    while let Some(c) = children.next_chunk()? {
        match &c.tag.0 {
            b"phdr" => {
                file.presets = fixed_records(&c, 38, |cur| {
                    Ok(PresetHeader {
                        name: cur.read_name(20)?,
                        preset: cur.read_u16()?,
                        bank: cur.read_u16()?,
                        bag_index: cur.read_u16()?,
                        library: cur.read_u32()?,
                        genre: cur.read_u32()?,
                        morphology: cur.read_u32()?,
                    })
                })?;
            }
            b"pbag" | b"ibag" => {
                let bags = fixed_records(&c, 4, |cur| {
                    Ok(Bag {
                        gen_index: cur.read_u16()?,
                        mod_index: cur.read_u16()?,
                    })
                })?;
                if c.tag == b"pbag" {
                    file.pbag = bags;
                } else {
                    file.ibag = bags;
                }
            }
            b"pmod" | b"imod" => {
                let mods = fixed_records(&c, 10, |cur| {
                    Ok(ModRecord {
                        src: cur.read_u16()?,
                        dest: cur.read_u16()?,
                        amount: cur.read_i16()?,
                        amt_src: cur.read_u16()?,
                        transform: cur.read_u16()?,
                    })
                })?;
                if c.tag == b"pmod" {
                    file.pmod = mods;
                } else {
                    file.imod = mods;
                }
            }
            b"pgen" | b"igen" => {
                let gens = fixed_records(&c, 4, |cur| {
                    Ok(GenRecord {
                        oper: cur.read_u16()?,
                        amount: cur.read_u16()?,
                    })
                })?;
                if c.tag == b"pgen" {
                    file.pgen = gens;
                } else {
                    file.igen = gens;
                }
            }
            b"inst" => {
                file.insts = fixed_records(&c, 22, |cur| {
                    Ok(InstRecord {
                        name: cur.read_name(20)?,
                        bag_index: cur.read_u16()?,
                    })
                })?;
            }
            b"shdr" => {
                file.shdr = fixed_records(&c, 46, |cur| {
                    Ok(SampleHeader {
                        name: cur.read_name(20)?,
                        start: cur.read_u32()?,
                        end: cur.read_u32()?,
                        loop_start: cur.read_u32()?,
                        loop_end: cur.read_u32()?,
                        sample_rate: cur.read_u32()?,
                        original_key: cur.read_u8()?,
                        correction: cur.read_i8()?,
                        sample_link: cur.read_u16()?,
                        sample_type: cur.read_u16()?,
                    })
                })?;
            }
            _ => {}
        }
    }

    for (tag, present) in [
        (*b"phdr", !file.presets.is_empty()),
        (*b"pbag", !file.pbag.is_empty()),
        (*b"pmod", !file.pmod.is_empty()),
        (*b"pgen", !file.pgen.is_empty()),
        (*b"inst", !file.insts.is_empty()),
        (*b"ibag", !file.ibag.is_empty()),
        (*b"imod", !file.imod.is_empty()),
        (*b"igen", !file.igen.is_empty()),
        (*b"shdr", !file.shdr.is_empty()),
    ] {
        if !present {
            return Err(BankError::MissingChunk { tag: FourCc(tag) });
        }
    }
    Ok(())
}

/// Sparse generator assignment for one zone, operator-indexed.
#[derive(Debug, Clone)]
struct GenSet {
    values: [Option<i16>; r#gen::OPER_COUNT],
}

impl GenSet {
    fn new() -> Self {
        Self {
            values: [None; r#gen::OPER_COUNT],
        }
    }

    fn set(&mut self, oper: u16, amount: i16) {
        if (oper as usize) < r#gen::OPER_COUNT {
            self.values[oper as usize] = Some(amount);
        }
    }

    fn get(&self, oper: u16) -> Option<i16> {
        self.values.get(oper as usize).copied().flatten()
    }

    /// Instrument value plus preset offset, or the default when the
    /// instrument never sets the operator.
    fn with_offset(&self, offset: &GenSet, oper: u16, default: i16) -> i16 {
        let base = self.get(oper).unwrap_or(default);
        base.saturating_add(offset.get(oper).unwrap_or(0))
    }

    fn load(&mut self, records: &[GenRecord]) {
        for r in records {
            self.set(r.oper, r.amount as i16);
        }
    }
}

/// Phase two: emit the shared model from the raw tables.
pub fn build_sound_bank(file: &Sf2File) -> Result<SoundBank> {
    let mut bank = SoundBank {
        name: file.name.clone(),
        instruments: Vec::with_capacity(file.preset_count()),
        samples: Vec::new(),
    };

    // One SampleData per real sample header, extracted from smpl.
    for header in file.shdr.iter().take(file.shdr.len().saturating_sub(1)) {
        bank.samples.push(Arc::new(extract_sample(file, header)?));
    }

    for p in 0..file.preset_count() {
        let preset = &file.presets[p];
        let mut zones = Vec::new();

        let mut preset_global = GenSet::new();
        for bag in file.preset_zone_range(p)? {
            let gens = &file.pgen[file.preset_gen_range(bag)?];
            let mut pset = preset_global.clone();
            pset.load(gens);

            let Some(inst_index) = pset.get(r#gen::INSTRUMENT) else {
                // A zone without an instrument generator is the preset's
                // global zone; it donates defaults to the ones after it.
                preset_global.load(gens);
                continue;
            };
            let inst_index = inst_index as usize;
            if inst_index + 1 >= file.insts.len() {
                return Err(BankError::malformed(
                    FourCc(*b"pgen"),
                    format!("preset '{}' references instrument {inst_index}", preset.name),
                ));
            }

            build_instrument_zones(file, &pset, inst_index, &mut zones)?;
        }

        bank.instruments.push(Instrument {
            bank: preset.bank,
            program: (preset.preset & 0x7f) as u8,
            is_drum: preset.bank == 128,
            name: preset.name.clone(),
            zones,
        });
    }

    Ok(bank)
}

fn build_instrument_zones(
    file: &Sf2File,
    preset_set: &GenSet,
    inst_index: usize,
    zones: &mut Vec<Zone>,
) -> Result<()> {
    let mut inst_global = GenSet::new();
    for bag in file.inst_zone_range(inst_index)? {
        let gens = &file.igen[file.inst_gen_range(bag)?];
        let mut iset = inst_global.clone();
        iset.load(gens);

        let Some(sample_id) = iset.get(r#gen::SAMPLE_ID) else {
            // Global instrument zone.
            inst_global.load(gens);
            continue;
        };
        let sample_id = sample_id as usize;
        if sample_id + 1 >= file.shdr.len() {
            return Err(BankError::malformed(
                FourCc(*b"igen"),
                format!("zone references sample {sample_id}"),
            ));
        }

        zones.push(build_zone(file, preset_set, &iset, sample_id));
    }
    Ok(())
}

fn build_zone(file: &Sf2File, pset: &GenSet, iset: &GenSet, sample_id: usize) -> Zone {
    let header = &file.shdr[sample_id];

    // Ranges: the instrument zone's range intersected with the preset's.
    let (ik_lo, ik_hi) = range_bytes(iset.get(r#gen::KEY_RANGE), (0, 127));
    let (pk_lo, pk_hi) = range_bytes(pset.get(r#gen::KEY_RANGE), (0, 127));
    let (iv_lo, iv_hi) = range_bytes(iset.get(r#gen::VEL_RANGE), (0, 127));
    let (pv_lo, pv_hi) = range_bytes(pset.get(r#gen::VEL_RANGE), (0, 127));

    let vol_env = EnvParams {
        delay: env_seconds(iset, pset, r#gen::DELAY_VOL_ENV),
        attack: env_seconds(iset, pset, r#gen::ATTACK_VOL_ENV),
        hold: env_seconds(iset, pset, r#gen::HOLD_VOL_ENV),
        decay: env_seconds(iset, pset, r#gen::DECAY_VOL_ENV),
        // Sustain is centibels of decrease below peak. Deliberately
        // unclamped, like attenuation.
        sustain: centibels_to_linear(f32::from(iset.with_offset(
            pset,
            r#gen::SUSTAIN_VOL_ENV,
            0,
        ))),
        release: env_seconds(iset, pset, r#gen::RELEASE_VOL_ENV),
    };

    let root_key = match iset.get(r#gen::OVERRIDING_ROOT_KEY) {
        Some(k) if (0..=127).contains(&k) => Some(k as u8),
        _ => Some(header.original_key.min(127)),
    };

    let tune_cents = f32::from(iset.with_offset(pset, r#gen::COARSE_TUNE, 0)) * 100.0
        + f32::from(iset.with_offset(pset, r#gen::FINE_TUNE, 0))
        + f32::from(header.correction);

    let loop_mode = match iset.get(r#gen::SAMPLE_MODES).unwrap_or(0) & 0x3 {
        1 => LoopMode::Continuous,
        3 => LoopMode::UntilRelease,
        _ => LoopMode::None,
    };

    Zone {
        key_low: ik_lo.max(pk_lo),
        key_high: ik_hi.min(pk_hi),
        vel_low: iv_lo.max(pv_lo),
        vel_high: iv_hi.min(pv_hi),
        sample: sample_id,
        root_key,
        tune_cents,
        loop_mode,
        // Header loop points are absolute in smpl; SampleData holds the
        // extracted region, so rebase to the sample start.
        loop_start: header.loop_start.saturating_sub(header.start),
        loop_end: header.loop_end.saturating_sub(header.start),
        attenuation: centibels_to_linear(f32::from(iset.with_offset(
            pset,
            r#gen::INITIAL_ATTENUATION,
            0,
        ))),
        pan: f32::from(iset.with_offset(pset, r#gen::PAN, 0)) / 500.0,
        vol_env,
    }
}

fn env_seconds(iset: &GenSet, pset: &GenSet, oper: u16) -> f32 {
    time_cents_to_seconds(f32::from(iset.with_offset(pset, oper, DEFAULT_TIMECENTS)))
}

fn range_bytes(amount: Option<i16>, default: (u8, u8)) -> (u8, u8) {
    match amount {
        Some(a) => {
            let raw = a as u16;
            ((raw & 0xff) as u8, (raw >> 8) as u8)
        }
        None => default,
    }
}

fn extract_sample(file: &Sf2File, header: &SampleHeader) -> Result<SampleData> {
    let start = header.start as usize;
    let end = header.end as usize;
    if start > end || end > file.sample_data.len() {
        return Err(BankError::malformed(
            FourCc(*b"shdr"),
            format!(
                "sample '{}' spans {start}..{end} of {} frames",
                header.name,
                file.sample_data.len()
            ),
        ));
    }
    let frames = end - start;
    let mut data = Vec::new();
    data.try_reserve_exact(frames).map_err(|_| BankError::Alloc {
        bytes: frames * core::mem::size_of::<f32>(),
    })?;
    for &v in &file.sample_data[start..end] {
        data.push(f32::from(v) / 32768.0);
    }
    Ok(SampleData {
        name: header.name.clone(),
        data,
        sample_rate: header.sample_rate as f32,
        loop_start: header.loop_start.saturating_sub(header.start),
        loop_end: header.loop_end.saturating_sub(header.start),
        root_key: header.original_key.min(127),
        fine_tune: header.correction,
    })
}
