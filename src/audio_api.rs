pub use crate::audio::{ChainParameters, Envelope, Waveform};

/// Note lengths are tokens; the chain resolves them against its tempo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteLength {
    Eighth,
    Sixteenth,
}

impl NoteLength {
    pub fn seconds(self, tempo_bpm: f32) -> f32 {
        let beat = 60.0 / tempo_bpm.max(1.0);
        match self {
            NoteLength::Eighth => beat / 2.0,
            NoteLength::Sixteenth => beat / 4.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKind {
    Delay,
    Reverb,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerParams {
    pub frequency: f32,
    pub length: NoteLength,
    pub offset_ms: u32, // from the moment the engine receives the command
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioCommand {
    // Everything the control thread can ask of the engine. Sends are
    // fire-and-forget; a full queue drops the command.
    Trigger(TriggerParams),
    SetWaveform(Waveform),
    SetEnvelope(Envelope),
    SetFilter { kind: FilterKind, hz: f32 },
    SetEffectMix { kind: EffectKind, wet: f32 },
    SetGain(f32),

    StartRecording,
    StopRecording,
}
