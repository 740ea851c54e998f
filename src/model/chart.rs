use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_BPM: f64 = 120.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SongInfo {
    pub title: String,
    pub artist: String,
    pub audio_file: String,

    /// Seconds. Negative values pre-roll the audio.
    pub audio_offset: f64,
    pub total_measures: u32,

    /// Playback volume in `0.0..=1.0`.
    pub volume: f64,
    pub difficulty: String,
    pub level: u32,
}

impl Default for SongInfo {
    fn default() -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            audio_file: String::new(),
            audio_offset: 0.0,
            total_measures: 100,
            volume: 0.5,
            difficulty: String::from("Normal"),
            level: 1,
        }
    }
}

/// A partial [`SongInfo`]. Fields left as `None` keep their current value when merged.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SongInfoPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub audio_file: Option<String>,
    pub audio_offset: Option<f64>,
    pub total_measures: Option<u32>,
    pub volume: Option<f64>,
    pub difficulty: Option<String>,
    pub level: Option<u32>,
}

impl SongInfoPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(self, info: &mut SongInfo) {
        if let Some(title) = self.title {
            info.title = title;
        }
        if let Some(artist) = self.artist {
            info.artist = artist;
        }
        if let Some(audio_file) = self.audio_file {
            info.audio_file = audio_file;
        }
        if let Some(audio_offset) = self.audio_offset {
            info.audio_offset = audio_offset;
        }
        if let Some(total_measures) = self.total_measures {
            info.total_measures = total_measures;
        }
        if let Some(volume) = self.volume {
            info.volume = volume;
        }
        if let Some(difficulty) = self.difficulty {
            info.difficulty = difficulty;
        }
        if let Some(level) = self.level {
            info.level = level;
        }
    }
}

/// `(numerator, denominator)`, serialized as a two element array.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature(pub u32, pub u32);

impl TimeSignature {
    pub fn numerator(&self) -> u32 {
        self.0
    }

    pub fn denominator(&self) -> u32 {
        self.1
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self(4, 4)
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimingPoint {
    pub measure: u32,
    pub beat: f64,
    pub bpm: f64,
    pub time_signature: TimeSignature,
}

impl TimingPoint {
    pub fn new(measure: u32, beat: f64, bpm: f64, time_signature: TimeSignature) -> Self {
        Self {
            measure,
            beat,
            bpm,
            time_signature,
        }
    }

    pub fn is_at(&self, measure: u32, beat: f64) -> bool {
        self.measure == measure && self.beat == beat
    }

    /// Strictly earlier measure, or same measure with `beat <= query beat`.
    pub fn is_at_or_before(&self, measure: u32, beat: f64) -> bool {
        self.measure < measure || (self.measure == measure && self.beat <= beat)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NoteKind {
    /// An instantaneous note.
    Tap,

    /// A note held for `duration` beats.
    Hold { duration: f64 },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Note {
    pub measure: u32,
    pub beat: f64,
    pub lane: u32,

    #[serde(flatten)]
    pub kind: NoteKind,
}

impl Note {
    pub fn tap(measure: u32, beat: f64, lane: u32) -> Self {
        Self {
            measure,
            beat,
            lane,
            kind: NoteKind::Tap,
        }
    }

    pub fn hold(measure: u32, beat: f64, lane: u32, duration: f64) -> Self {
        Self {
            measure,
            beat,
            lane,
            kind: NoteKind::Hold { duration },
        }
    }

    pub fn duration(&self) -> Option<f64> {
        match self.kind {
            NoteKind::Tap => None,
            NoteKind::Hold { duration } => Some(duration),
        }
    }
}

/// The serialization unit: everything a chart file holds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub song_info: SongInfo,
    pub timing_points: Vec<TimingPoint>,
    pub notes: Vec<Note>,
}

impl Default for ChartData {
    fn default() -> Self {
        Self {
            song_info: SongInfo::default(),
            timing_points: vec![TimingPoint::new(1, 0.0, DEFAULT_BPM, TimeSignature::default())],
            notes: Vec::new(),
        }
    }
}

pub fn compare_position(a: (u32, f64), b: (u32, f64)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.total_cmp(&b.1))
}

pub fn compare_timing_points(a: &TimingPoint, b: &TimingPoint) -> Ordering {
    compare_position((a.measure, a.beat), (b.measure, b.beat))
}

pub fn compare_notes(a: &Note, b: &Note) -> Ordering {
    compare_position((a.measure, a.beat), (b.measure, b.beat)).then_with(|| a.lane.cmp(&b.lane))
}

pub fn is_sorted_by_position<T>(items: &[T], cmp: fn(&T, &T) -> Ordering) -> bool {
    items
        .windows(2)
        .all(|pair| cmp(&pair[0], &pair[1]) != Ordering::Greater)
}
