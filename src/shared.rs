// The current input plan:
//
// Canvas:
//   left click    //  SpawnAt(x, y) in canvas coordinates
//   Space         //  SpawnRandom
//   c             //  Clear
//
// Musical settings:
//   s / S         //  NextScale / PrevScale
//   k / K         //  KeyUp / KeyDown (one semitone)
//   o / O         //  OctaveUp / OctaveDown
//   w             //  NextWaveform
//
// Knob:
//   Up / Down     //  SelectParam(-1 / 1), walks the parameter list
//   [ / ]         //  AdjustParam(-1.0 / 1.0), one step of the selected parameter
//
// Recording:
//   r             //  ToggleRecording
//
// Quit:
//   Esc / q       //  Quit
//
// The TUI only resolves keys and clicks into these events and draws whatever
// `DisplayState` the middle layer hands back.

use std::time::Duration;

use crate::audio::ChainParameters;

pub const CANVAS_WIDTH: f64 = 1000.0;
pub const CANVAS_HEIGHT: f64 = 680.0;
pub const BALL_RADIUS: f64 = 10.0;
pub const WALL_MARGIN: f64 = 10.0;
pub const SPAWN_VELOCITY_RANGE: f64 = 5.0;

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);
pub const TEMPO_BPM: f32 = 120.0;

pub const MIN_OCTAVE: i32 = 0;
pub const MAX_OCTAVE: i32 = 7;
pub const DEFAULT_KEY: &str = "A";
pub const DEFAULT_OCTAVE: i32 = 3;

pub const FFT_SIZE: usize = 1024;
pub const SPECTRUM_BANDS: usize = 32;

// UI-level bounds, the chain itself accepts wider ranges
pub const MAX_UI_GAIN: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown scale type '{0}'")]
    UnknownScale(String),
    #[error("unknown waveform '{0}'")]
    UnknownWaveform(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    SpawnAt { x: f64, y: f64 },
    SpawnRandom,
    Clear,

    NextScale,
    PrevScale,
    KeyUp,
    KeyDown,
    OctaveUp,
    OctaveDown,
    NextWaveform,

    SelectParam(i8),
    AdjustParam(f32), // in steps of the selected parameter

    ToggleRecording,
    Quit,
}

// Every knob-adjustable value, in the order the TUI lists them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamSlot {
    Attack,
    Decay,
    Sustain,
    Release,
    DelayMix,
    ReverbMix,
    Gain,
    Lowpass,
    Highpass,
    BallSpeed,
}

impl ParamSlot {
    pub const ALL: [ParamSlot; 10] = [
        ParamSlot::Attack,
        ParamSlot::Decay,
        ParamSlot::Sustain,
        ParamSlot::Release,
        ParamSlot::DelayMix,
        ParamSlot::ReverbMix,
        ParamSlot::Gain,
        ParamSlot::Lowpass,
        ParamSlot::Highpass,
        ParamSlot::BallSpeed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ParamSlot::Attack => "ATTACK",
            ParamSlot::Decay => "DECAY",
            ParamSlot::Sustain => "SUSTAIN",
            ParamSlot::Release => "RELEASE",
            ParamSlot::DelayMix => "DELAY",
            ParamSlot::ReverbMix => "REVERB",
            ParamSlot::Gain => "GAIN",
            ParamSlot::Lowpass => "LOWPASS",
            ParamSlot::Highpass => "HIGHPASS",
            ParamSlot::BallSpeed => "SPEED",
        }
    }

    /// (min, max, step) for the knob.
    pub fn range(self) -> (f32, f32, f32) {
        match self {
            ParamSlot::Attack | ParamSlot::Decay | ParamSlot::Sustain => (0.01, 1.0, 0.01),
            ParamSlot::Release => (0.01, 3.0, 0.05),
            ParamSlot::DelayMix | ParamSlot::ReverbMix => (0.0, 1.0, 0.05),
            ParamSlot::Gain => (0.0, MAX_UI_GAIN, 0.02),
            ParamSlot::Lowpass => (20.0, 20000.0, 250.0),
            ParamSlot::Highpass => (20.0, 1000.0, 20.0),
            ParamSlot::BallSpeed => (0.1, 1.0, 0.1),
        }
    }

    pub fn cycle(self, step: i32) -> Self {
        let pos = Self::ALL.iter().position(|&p| p == self).unwrap_or(0) as i32;
        Self::ALL[(pos + step).rem_euclid(Self::ALL.len() as i32) as usize]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BallView {
    pub x: f64,
    pub y: f64,
    pub color: (u8, u8, u8),
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub balls: Vec<BallView>,
    pub params: ChainParameters,
    pub ball_speed: f32,
    pub selected_param: ParamSlot,
    pub scale_label: &'static str,
    pub key: String,
    pub octave: i32,
    pub recording: bool,
    pub chain_ready: bool,
    pub last_notes: Vec<String>, // most recent fired pattern, e.g. ["C4", "C#4", "D4"]
    pub status: String,          // one line of feedback, e.g. the last saved file
}
