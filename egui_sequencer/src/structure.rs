//! 核心数据结构
//!
//! 音符、时间/音高区间、拍号，以及持久化快照与 MIDI 文件的互转。
//! 时间单位统一为十六分音符（sixteenth）。

use crate::error::SequencerResult;
use midly::{MetaMessage, Smf, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub const MIN_PITCH: u8 = 0;
pub const MAX_PITCH: u8 = 127;
pub const MAX_VELOCITY: u8 = 127;
/// Below this semitone height the pitch ruler stops drawing per-key labels.
pub const MIN_SEMITONE_HEIGHT: f64 = 4.0;
/// Pitch zoom-in stops once a semitone is this tall.
pub const MAX_SEMITONE_HEIGHT: f64 = 30.0;
/// Black keys within one octave, starting at C.
pub const PITCH_PATTERN: [bool; 12] = [
    false, true, false, true, false, false, true, false, true, false, true, false,
];

/// MIDI files are written at 480 ticks per quarter note.
pub const TICKS_PER_QUARTER: u16 = 480;
pub const TICKS_PER_SIXTEENTH: f64 = TICKS_PER_QUARTER as f64 / 4.0;

static NOTE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteId(pub u64);

impl NoteId {
    pub fn next() -> Self {
        NoteId(NOTE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub fn is_black_key(pitch: i32) -> bool {
    PITCH_PATTERN[pitch.rem_euclid(12) as usize]
}

#[derive(Clone, Debug, Copy, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub time: f64,     // Sixteenths
    pub pitch: u8,     // MIDI note number (0-127)
    pub duration: f64, // Sixteenths
    pub velocity: u8,  // 0-127
}

impl Note {
    pub fn new(time: f64, pitch: u8, duration: f64, velocity: u8) -> Self {
        Self::with_id(NoteId::next(), time, pitch, duration, velocity)
    }

    pub fn with_id(id: NoteId, time: f64, pitch: u8, duration: f64, velocity: u8) -> Self {
        Self {
            id,
            time,
            pitch,
            duration,
            velocity,
        }
    }

    pub fn end(&self) -> f64 {
        self.time + self.duration
    }

    pub fn to_record(&self) -> NoteRecord {
        NoteRecord {
            time: self.time,
            pitch: self.pitch,
            duration: self.duration,
            velocity: self.velocity,
        }
    }
}

/// Half-open interval in sixteenths (time) or semitones (pitch).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub start: f64,
    pub end: f64,
}

impl Range {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0.0
    }

    pub fn contains_range(&self, other: &Range) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Shifts the range by `offset` so that it fits inside `bounds`, keeping
    /// its length when possible and shrinking it otherwise.
    pub fn translated_into(&self, bounds: &Range) -> Range {
        let len = self.len().min(bounds.len()).max(0.0);
        let start = self.start.clamp(bounds.start, bounds.end - len);
        Range::new(start, start + len)
    }

    /// Intersects with `bounds`. A result that would be empty or inverted
    /// falls back to `bounds`.
    pub fn clamped_to(&self, bounds: &Range) -> Range {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        if end > start {
            Range::new(start, end)
        } else {
            *bounds
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub upper: u8,
    pub lower: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { upper: 4, lower: 4 }
    }
}

impl TimeSignature {
    pub fn new(upper: u8, lower: u8) -> Option<Self> {
        let valid = upper >= 1 && matches!(lower, 1 | 2 | 4 | 8 | 16);
        valid.then_some(Self { upper, lower })
    }

    pub fn sixteenths_per_beat(&self) -> f64 {
        16.0 / f64::from(self.lower)
    }

    pub fn sixteenths_per_measure(&self) -> f64 {
        self.sixteenths_per_beat() * f64::from(self.upper)
    }

    /// Zero-based measure, beat and sixteenth offset for a time.
    pub fn time_as_mbs(&self, time: f64) -> (f64, f64, f64) {
        let per_beat = self.sixteenths_per_beat();
        let mut beat = (time / per_beat).floor();
        let sixteenth = time - beat * per_beat;
        let measure = (beat / f64::from(self.upper)).floor();
        beat -= measure * f64::from(self.upper);
        (measure, beat, sixteenth)
    }

    /// Formats a time as `measure[.beat[.sixteenth]]`, omitting trailing
    /// parts that sit on the origin.
    pub fn string_for_time(&self, time: f64, origin_one: bool) -> String {
        let (mut m, mut b, mut s) = self.time_as_mbs(time);
        let origin = if origin_one { 1.0 } else { 0.0 };
        m += origin;
        b += origin;
        s += origin;

        let use_sixteenth = s != origin;
        let use_beats = use_sixteenth || b != origin;

        let mut label = format!("{}", m as i64);
        if use_beats {
            label.push_str(&format!(".{}", b as i64));
        }
        if use_sixteenth {
            label.push_str(&format!(".{}", s.floor() as i64));
        }
        label
    }
}

/// Persisted form of a note. Transient editing state is never stored here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub time: f64,
    pub pitch: u8,
    pub duration: f64,
    pub velocity: u8,
}

impl NoteRecord {
    pub fn into_note(self) -> Note {
        Note::new(self.time, self.pitch, self.duration, self.velocity)
    }
}

/// 可导入导出的完整编辑器状态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequencerSnapshot {
    pub notes: Vec<NoteRecord>,
    pub signature: TimeSignature,
    #[serde(default)]
    pub time_start: f64,
    pub length: f64,
    pub visible_time_range: Range,
    pub vertical_range: Range,
    #[serde(default)]
    pub selected: Vec<usize>,
}

impl Default for SequencerSnapshot {
    fn default() -> Self {
        Self {
            notes: Vec::new(),
            signature: TimeSignature::default(),
            time_start: 0.0,
            length: 32.0,
            visible_time_range: Range::new(0.0, 16.0),
            vertical_range: Range::new(58.0, 82.0),
            selected: Vec::new(),
        }
    }
}

impl SequencerSnapshot {
    /// Clamps out-of-range values so the snapshot can be loaded safely.
    /// Returns the number of values that had to be adjusted.
    pub fn sanitize(&mut self) -> usize {
        let mut fixes = 0;
        if !self.time_start.is_finite() || self.time_start < 0.0 {
            self.time_start = 0.0;
            fixes += 1;
        }
        if !self.length.is_finite() || self.length < 0.0 {
            self.length = 0.0;
            fixes += 1;
        }
        if TimeSignature::new(self.signature.upper, self.signature.lower).is_none() {
            self.signature = TimeSignature::default();
            fixes += 1;
        }
        for note in &mut self.notes {
            if !note.time.is_finite() || note.time < 0.0 {
                note.time = 0.0;
                fixes += 1;
            }
            if !note.duration.is_finite() || note.duration < 0.0 {
                note.duration = 0.0;
                fixes += 1;
            }
            if note.pitch > MAX_PITCH {
                note.pitch = MAX_PITCH;
                fixes += 1;
            }
            if note.velocity > MAX_VELOCITY {
                note.velocity = MAX_VELOCITY;
                fixes += 1;
            }
        }
        let count = self.notes.len();
        let before = self.selected.len();
        self.selected.retain(|&i| i < count);
        self.selected.sort_unstable();
        self.selected.dedup();
        fixes += before - self.selected.len();

        let max_time = Range::new(self.time_start, self.time_start + self.length);
        let visible = if self.visible_time_range.start.is_finite()
            && self.visible_time_range.end.is_finite()
        {
            self.visible_time_range.clamped_to(&max_time)
        } else {
            max_time
        };
        if visible != self.visible_time_range {
            self.visible_time_range = visible;
            fixes += 1;
        }
        let pitch_bounds = Range::new(f64::from(MIN_PITCH), f64::from(MAX_PITCH));
        let vertical = self.vertical_range.clamped_to(&pitch_bounds);
        if vertical != self.vertical_range {
            self.vertical_range = vertical;
            fixes += 1;
        }
        fixes
    }

    pub fn from_smf(smf: &Smf) -> Self {
        let ticks_per_quarter = match smf.header.timing {
            midly::Timing::Metrical(t) => f64::from(t.as_int()),
            _ => f64::from(TICKS_PER_QUARTER), // Default fallback
        };
        let ticks_per_sixteenth = ticks_per_quarter / 4.0;
        let mut notes = Vec::new();
        let mut signature = TimeSignature::default();

        // Merge all MIDI tracks into a single note lane.
        for track in &smf.tracks {
            let mut current_ticks: u64 = 0;
            let mut active_notes: HashMap<u8, (u64, u8)> = HashMap::new();

            for event in track {
                current_ticks += u64::from(event.delta.as_int());

                match event.kind {
                    TrackEventKind::Midi { message, .. } => match message {
                        midly::MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            active_notes.insert(key.as_int(), (current_ticks, vel.as_int()));
                        }
                        // NoteOn with velocity 0 is NoteOff
                        midly::MidiMessage::NoteOn { key, .. }
                        | midly::MidiMessage::NoteOff { key, .. } => {
                            if let Some((start, velocity)) = active_notes.remove(&key.as_int()) {
                                notes.push(NoteRecord {
                                    time: start as f64 / ticks_per_sixteenth,
                                    pitch: key.as_int(),
                                    duration: (current_ticks - start) as f64 / ticks_per_sixteenth,
                                    velocity,
                                });
                            }
                        }
                        _ => {}
                    },
                    TrackEventKind::Meta(MetaMessage::TimeSignature(numer, denom, ..)) => {
                        if let Some(sig) = 2u8
                            .checked_pow(u32::from(denom))
                            .and_then(|lower| TimeSignature::new(numer, lower))
                        {
                            signature = sig;
                        }
                    }
                    _ => {}
                }
            }
        }

        notes.sort_by(|a, b| a.time.total_cmp(&b.time));

        let last_end = notes.iter().map(|n| n.time + n.duration).fold(0.0, f64::max);
        let measure = signature.sixteenths_per_measure();
        let length = ((last_end / measure).ceil() * measure).max(measure * 2.0);
        let defaults = Self::default();

        Self {
            notes,
            signature,
            time_start: 0.0,
            length,
            visible_time_range: defaults.visible_time_range.clamped_to(&Range::new(0.0, length)),
            vertical_range: defaults.vertical_range,
            selected: Vec::new(),
        }
    }

    pub fn to_smf(&self) -> Smf<'static> {
        use midly::{Format, Header, MidiMessage, Timing, TrackEvent};

        let mut track: Vec<TrackEvent<'static>> = Vec::new();
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                self.signature.upper,
                self.signature.lower.trailing_zeros() as u8,
                24,
                8,
            )),
        });

        let to_ticks = |sixteenths: f64| (sixteenths.max(0.0) * TICKS_PER_SIXTEENTH).round() as u64;
        let mut events: Vec<(u64, bool, TrackEventKind<'static>)> = Vec::new();
        for note in &self.notes {
            let start = to_ticks(note.time);
            let end = to_ticks(note.time + note.duration);
            events.push((
                start,
                true,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::NoteOn {
                        key: note.pitch.min(MAX_PITCH).into(),
                        vel: note.velocity.clamp(1, MAX_VELOCITY).into(),
                    },
                },
            ));
            events.push((
                end,
                false,
                TrackEventKind::Midi {
                    channel: 0.into(),
                    message: MidiMessage::NoteOff {
                        key: note.pitch.min(MAX_PITCH).into(),
                        vel: 0.into(),
                    },
                },
            ));
        }
        // Note-offs first on equal ticks so back-to-back notes stay separate.
        events.sort_by_key(|(t, on, _)| (*t, *on));

        let mut last_tick = 0;
        for (tick, _, kind) in events {
            let delta = tick.saturating_sub(last_tick);
            last_tick = tick;
            let delta_ticks = u32::try_from(delta).unwrap_or(u32::MAX);
            track.push(TrackEvent {
                delta: delta_ticks.into(),
                kind,
            });
        }
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        Smf {
            header: Header {
                format: Format::SingleTrack,
                timing: Timing::Metrical(TICKS_PER_QUARTER.into()),
            },
            tracks: vec![track],
        }
    }
}

pub fn load_midi(bytes: &[u8]) -> SequencerResult<SequencerSnapshot> {
    let smf = Smf::parse(bytes)?;
    let snapshot = SequencerSnapshot::from_smf(&smf);
    log::info!("Imported {} notes from MIDI data", snapshot.notes.len());
    Ok(snapshot)
}

pub fn export_midi(snapshot: &SequencerSnapshot) -> SequencerResult<Vec<u8>> {
    let smf = snapshot.to_smf();
    let mut out = Vec::new();
    smf.write_std(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mbs_labels_omit_parts_on_origin() {
        let sig = TimeSignature::default();
        assert_eq!(sig.string_for_time(0.0, true), "1");
        assert_eq!(sig.string_for_time(16.0, true), "2");
        assert_eq!(sig.string_for_time(20.0, true), "2.2");
        assert_eq!(sig.string_for_time(21.0, true), "2.2.2");
        let waltz = TimeSignature::new(3, 4).unwrap();
        assert_eq!(waltz.sixteenths_per_measure(), 12.0);
        assert_eq!(waltz.time_as_mbs(13.0), (1.0, 0.0, 1.0));
    }

    #[test]
    fn signatures_reject_odd_denominators() {
        assert!(TimeSignature::new(4, 3).is_none());
        assert!(TimeSignature::new(0, 4).is_none());
        assert!(TimeSignature::new(7, 8).is_some());
    }

    #[test]
    fn ranges_translate_into_bounds() {
        let bounds = Range::new(0.0, 32.0);
        assert_eq!(Range::new(-4.0, 12.0).translated_into(&bounds), Range::new(0.0, 16.0));
        assert_eq!(Range::new(24.0, 40.0).translated_into(&bounds), Range::new(16.0, 32.0));
        assert_eq!(Range::new(-8.0, 48.0).translated_into(&bounds), bounds);
    }

    #[test]
    fn sanitize_clamps_bad_values() {
        let mut snapshot = SequencerSnapshot {
            notes: vec![NoteRecord {
                time: -1.0,
                pitch: 200,
                duration: -3.0,
                velocity: 255,
            }],
            selected: vec![0, 0, 4],
            vertical_range: Range::new(-10.0, 200.0),
            ..SequencerSnapshot::default()
        };
        assert!(snapshot.sanitize() > 0);
        let note = snapshot.notes[0];
        assert_eq!((note.time, note.pitch, note.duration, note.velocity), (0.0, 127, 0.0, 127));
        assert_eq!(snapshot.selected, vec![0]);
        assert_eq!(snapshot.vertical_range, Range::new(0.0, 127.0));
    }

    #[test]
    fn midi_round_trip_keeps_notes() {
        let snapshot = SequencerSnapshot {
            notes: vec![
                NoteRecord { time: 0.0, pitch: 60, duration: 4.0, velocity: 100 },
                NoteRecord { time: 4.0, pitch: 60, duration: 2.5, velocity: 90 },
                NoteRecord { time: 1.0, pitch: 67, duration: 1.0, velocity: 64 },
            ],
            signature: TimeSignature::new(3, 4).unwrap(),
            ..SequencerSnapshot::default()
        };
        let bytes = export_midi(&snapshot).unwrap();
        let loaded = load_midi(&bytes).unwrap();

        assert_eq!(loaded.signature, snapshot.signature);
        assert_eq!(loaded.notes.len(), 3);
        let second = loaded.notes.iter().find(|n| n.pitch == 67).unwrap();
        assert_relative_eq!(second.time, 1.0);
        let tail = loaded.notes.iter().find(|n| n.pitch == 60 && n.time > 1.0).unwrap();
        assert_relative_eq!(tail.duration, 2.5);
        assert_eq!(tail.velocity, 90);
    }
}
