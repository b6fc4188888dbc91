use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::audio_api::NoteLength;
use crate::shared::ParseError;

const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PitchClass(u8); // 0 = C ... 11 = B

impl PitchClass {
    pub fn index(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        PITCH_NAMES[self.0 as usize]
    }

    // step around the circle of semitones, wrapping at both ends
    pub fn shifted(self, semis: i32) -> Self {
        Self((self.0 as i32 + semis).rem_euclid(12) as u8)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let idx = match name.trim() {
            "C" => 0,
            "C#" | "Db" => 1,
            "D" => 2,
            "D#" | "Eb" => 3,
            "E" => 4,
            "F" => 5,
            "F#" | "Gb" => 6,
            "G" => 7,
            "G#" | "Ab" => 8,
            "A" => 9,
            "A#" | "Bb" => 10,
            "B" => 11,
            _ => return None,
        };
        Some(Self(idx))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pitch class pinned to an octave, displayed the scientific way ("A3").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Note {
    pub pitch: PitchClass,
    pub octave: i32,
}

impl Note {
    pub fn midi(self) -> i32 {
        (self.octave + 1) * 12 + self.pitch.0 as i32
    }

    // equal temperament around A4 = 440 Hz
    pub fn frequency(self) -> f32 {
        440.0 * 2.0_f32.powf((self.midi() - 69) as f32 / 12.0)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch, self.octave)
    }
}

/// Spell out a scale from a root name, an octave and semitone offsets.
/// Unknown roots produce an empty scale rather than an error; callers treat
/// that as "nothing to play".
pub fn generate(root: &str, octave: i32, intervals: &[u8]) -> Vec<Note> {
    let Some(root) = PitchClass::from_name(root) else {
        return Vec::new();
    };
    intervals
        .iter()
        .map(|&offset| {
            let semis = root.0 as i32 + offset as i32;
            Note {
                pitch: PitchClass(semis.rem_euclid(12) as u8),
                octave: octave + semis.div_euclid(12),
            }
        })
        .collect()
}

/// All thirteen semitones from the root up to and including its octave.
pub fn generate_chromatic(root: &str, octave: i32) -> Vec<Note> {
    let offsets: Vec<u8> = (0..=12).collect();
    generate(root, octave, &offsets)
}

// How a fired collision turns into notes for a given family of scales.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleKind {
    Chromatic,
    Exotic,
    Standard,
}

/// One note to play, `offset` after the trigger fires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledNote {
    pub note: Note,
    pub offset_ms: u32,
    pub length: NoteLength,
}

const CHROMATIC_RUN_MS: [u32; 3] = [0, 100, 200];
const EXOTIC_GAP_MS: u32 = 150;

impl ScaleKind {
    pub fn play_pattern<R: Rng + ?Sized>(self, scale: &[Note], rng: &mut R) -> Vec<ScheduledNote> {
        if scale.is_empty() {
            return Vec::new();
        }
        match self {
            ScaleKind::Chromatic => {
                // a short ascending run; fall back to a single note on tiny scales
                if scale.len() < CHROMATIC_RUN_MS.len() {
                    return ScaleKind::Standard.play_pattern(scale, rng);
                }
                let start = rng.gen_range(0..=scale.len() - CHROMATIC_RUN_MS.len());
                CHROMATIC_RUN_MS
                    .iter()
                    .enumerate()
                    .map(|(i, &offset_ms)| ScheduledNote {
                        note: scale[start + i],
                        offset_ms,
                        length: NoteLength::Sixteenth,
                    })
                    .collect()
            }
            ScaleKind::Exotic => [0, EXOTIC_GAP_MS]
                .into_iter()
                .filter_map(|offset_ms| {
                    scale.choose(rng).map(|&note| ScheduledNote {
                        note,
                        offset_ms,
                        length: NoteLength::Eighth,
                    })
                })
                .collect(),
            ScaleKind::Standard => scale
                .choose(rng)
                .map(|&note| ScheduledNote {
                    note,
                    offset_ms: 0,
                    length: NoteLength::Eighth,
                })
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleType {
    Major,
    Minor,
    HarmonicMinor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    PentatonicMajor,
    PentatonicMinor,
    Blues,
    Chromatic,
    WholeTone,
    Hirajoshi,
    InSen,
    HungarianMinor,
}

impl ScaleType {
    pub const ALL: [ScaleType; 15] = [
        ScaleType::Major,
        ScaleType::Minor,
        ScaleType::HarmonicMinor,
        ScaleType::Dorian,
        ScaleType::Phrygian,
        ScaleType::Lydian,
        ScaleType::Mixolydian,
        ScaleType::PentatonicMajor,
        ScaleType::PentatonicMinor,
        ScaleType::Blues,
        ScaleType::Chromatic,
        ScaleType::WholeTone,
        ScaleType::Hirajoshi,
        ScaleType::InSen,
        ScaleType::HungarianMinor,
    ];

    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleType::Major => &[0, 2, 4, 5, 7, 9, 11, 12],
            ScaleType::Minor => &[0, 2, 3, 5, 7, 8, 10, 12],
            ScaleType::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11, 12],
            ScaleType::Dorian => &[0, 2, 3, 5, 7, 9, 10, 12],
            ScaleType::Phrygian => &[0, 1, 3, 5, 7, 8, 10, 12],
            ScaleType::Lydian => &[0, 2, 4, 6, 7, 9, 11, 12],
            ScaleType::Mixolydian => &[0, 2, 4, 5, 7, 9, 10, 12],
            ScaleType::PentatonicMajor => &[0, 2, 4, 7, 9, 12],
            ScaleType::PentatonicMinor => &[0, 3, 5, 7, 10, 12],
            ScaleType::Blues => &[0, 3, 5, 6, 7, 10, 12],
            ScaleType::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            ScaleType::WholeTone => &[0, 2, 4, 6, 8, 10, 12],
            ScaleType::Hirajoshi => &[0, 2, 3, 7, 8, 12],
            ScaleType::InSen => &[0, 1, 5, 7, 10, 12],
            ScaleType::HungarianMinor => &[0, 2, 3, 6, 7, 8, 11, 12],
        }
    }

    pub fn kind(self) -> ScaleKind {
        match self {
            ScaleType::Chromatic => ScaleKind::Chromatic,
            ScaleType::WholeTone
            | ScaleType::Hirajoshi
            | ScaleType::InSen
            | ScaleType::HungarianMinor => ScaleKind::Exotic,
            _ => ScaleKind::Standard,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScaleType::Major => "major",
            ScaleType::Minor => "minor",
            ScaleType::HarmonicMinor => "harmonic-minor",
            ScaleType::Dorian => "dorian",
            ScaleType::Phrygian => "phrygian",
            ScaleType::Lydian => "lydian",
            ScaleType::Mixolydian => "mixolydian",
            ScaleType::PentatonicMajor => "pentatonic-major",
            ScaleType::PentatonicMinor => "pentatonic-minor",
            ScaleType::Blues => "blues",
            ScaleType::Chromatic => "chromatic",
            ScaleType::WholeTone => "whole-tone",
            ScaleType::Hirajoshi => "hirajoshi",
            ScaleType::InSen => "in-sen",
            ScaleType::HungarianMinor => "hungarian-minor",
        }
    }

    pub fn notes(self, root: &str, octave: i32) -> Vec<Note> {
        match self {
            ScaleType::Chromatic => generate_chromatic(root, octave),
            other => generate(root, octave, other.intervals()),
        }
    }

    pub fn cycle(self, step: i32) -> Self {
        let pos = Self::ALL.iter().position(|&s| s == self).unwrap_or(0) as i32;
        let len = Self::ALL.len() as i32;
        Self::ALL[(pos + step).rem_euclid(len) as usize]
    }
}

impl FromStr for ScaleType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.label() == wanted)
            .ok_or_else(|| ParseError::UnknownScale(s.to_string()))
    }
}
