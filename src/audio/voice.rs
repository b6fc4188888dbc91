use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;

use crate::shared::ParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [Waveform::Sine, Waveform::Square, Waveform::Triangle, Waveform::Sawtooth];

    pub fn label(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Waveform::Sine => Waveform::Square,
            Waveform::Square => Waveform::Triangle,
            Waveform::Triangle => Waveform::Sawtooth,
            Waveform::Sawtooth => Waveform::Sine,
        }
    }

    // phase in [0, 1)
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 { 1.0 } else { -1.0 }
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Waveform {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "saw" => Ok(Waveform::Sawtooth),
            _ => Self::ALL
                .iter()
                .copied()
                .find(|w| w.label() == wanted)
                .ok_or_else(|| ParseError::UnknownWaveform(s.to_string())),
        }
    }
}

/// Attack/decay/release in seconds, sustain as a level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

const MIN_STAGE_SECONDS: f32 = 0.001;

impl Envelope {
    pub fn sanitized(self) -> Self {
        let time = |t: f32| if t.is_finite() { t.max(MIN_STAGE_SECONDS) } else { MIN_STAGE_SECONDS };
        Self {
            attack: time(self.attack),
            decay: time(self.decay),
            sustain: if self.sustain.is_finite() { self.sustain.clamp(0.0, 1.0) } else { 0.0 },
            release: time(self.release),
        }
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.2,
            sustain: 0.2,
            release: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Single oscillator + ADSR. Monophonic: a new note takes over the voice and
/// ramps from wherever the level currently is, so retriggers don't click.
#[derive(Clone, Debug)]
pub struct Voice {
    waveform: Waveform,
    sample_rate: f32,
    phase: f32,
    phase_inc: f32,
    level: f32,
    stage: Stage,
    // envelope captured at note-on; later edits wait for the next note
    env: Envelope,
    release_from: f32,
}

impl Voice {
    pub fn new(waveform: Waveform, sample_rate: f32) -> Self {
        Self {
            waveform,
            sample_rate,
            phase: 0.0,
            phase_inc: 0.0,
            level: 0.0,
            stage: Stage::Idle,
            env: Envelope::default(),
            release_from: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    pub fn frequency(&self) -> f32 {
        self.phase_inc * self.sample_rate
    }

    pub fn note_on(&mut self, frequency: f32, env: Envelope) {
        self.phase_inc = frequency.max(0.0) / self.sample_rate;
        self.env = env.sanitized();
        self.stage = Stage::Attack;
    }

    pub fn note_off(&mut self) {
        if self.stage != Stage::Idle {
            self.release_from = self.level;
            self.stage = Stage::Release;
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.stage == Stage::Idle {
            return 0.0;
        }
        self.advance_envelope();

        let out = self.waveform.sample(self.phase) * self.level;
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        out
    }

    fn advance_envelope(&mut self) {
        let dt = 1.0 / self.sample_rate;
        match self.stage {
            Stage::Idle | Stage::Sustain => {}
            Stage::Attack => {
                self.level += dt / self.env.attack;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= (1.0 - self.env.sustain) * dt / self.env.decay;
                if self.level <= self.env.sustain {
                    self.level = self.env.sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Release => {
                self.level -= self.release_from.max(1e-4) * dt / self.env.release;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }
    }
}
