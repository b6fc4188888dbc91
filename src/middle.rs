// The control layer between the TUI and the audio thread. Owns the ball
// simulation, the note trigger and the musical settings, and turns inbound
// requests into `AudioCommand`s. Nothing here blocks or touches the device.

use std::time::{Instant, SystemTime};

use crate::audio_api::{
    AudioCommand, ChainParameters, EffectKind, Envelope, FilterKind, TriggerParams, Waveform,
};
use crate::music::{Note, PitchClass, ScaleType};
use crate::recording::{CapturedAudio, FinishedRecording, RecordingEncoder};
use crate::shared::{
    BallView, DEBOUNCE_WINDOW, DEFAULT_KEY, DEFAULT_OCTAVE, DisplayState, InputEvent, MAX_OCTAVE,
    MIN_OCTAVE, ParamSlot, ParseError,
};
use crate::sim::{BallId, BallSimulator, Bounds};
use crate::trigger::NoteTrigger;

const DEFAULT_BALL_SPEED: f32 = 1.0;

pub struct Middle {
    sim: BallSimulator,
    trigger: NoteTrigger,
    encoder: RecordingEncoder,

    scale_type: ScaleType,
    key: String,
    octave: i32,

    params: ChainParameters, // what we last told the chain
    ball_speed: f32,
    selected: ParamSlot,

    chain_ready: bool,
    recording: bool,
    last_notes: Vec<String>,
    status: String,
}

impl Middle {
    pub fn new() -> Self {
        Self::from_parts(BallSimulator::new(Bounds::default()), NoteTrigger::new(DEBOUNCE_WINDOW))
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_parts(
            BallSimulator::with_seed(Bounds::default(), seed),
            NoteTrigger::with_seed(DEBOUNCE_WINDOW, seed.wrapping_add(1)),
        )
    }

    fn from_parts(sim: BallSimulator, trigger: NoteTrigger) -> Self {
        Self {
            sim,
            trigger,
            encoder: RecordingEncoder,
            scale_type: ScaleType::Minor,
            key: DEFAULT_KEY.to_string(),
            octave: DEFAULT_OCTAVE,
            params: ChainParameters::default(),
            ball_speed: DEFAULT_BALL_SPEED,
            selected: ParamSlot::Attack,
            chain_ready: false,
            recording: false,
            last_notes: Vec::new(),
            status: String::new(),
        }
    }

    // ── Sync from the audio side ─────────────────────────────────

    pub fn set_chain_ready(&mut self, ready: bool) {
        if ready != self.chain_ready {
            log::info!("signal chain {}", if ready { "ready" } else { "not ready" });
        }
        self.chain_ready = ready;
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    // ── Input ────────────────────────────────────────────────────

    pub fn handle_input(&mut self, event: InputEvent) -> Vec<AudioCommand> {
        match event {
            InputEvent::SpawnAt { x, y } => {
                self.spawn(x, y);
                vec![]
            }
            InputEvent::SpawnRandom => {
                self.spawn_random();
                vec![]
            }
            InputEvent::Clear => {
                self.clear();
                vec![]
            }
            InputEvent::NextScale | InputEvent::PrevScale => {
                let step = if event == InputEvent::NextScale { 1 } else { -1 };
                self.scale_type = self.scale_type.cycle(step);
                log::debug!("scale -> {}", self.scale_type.label());
                vec![]
            }
            InputEvent::KeyUp | InputEvent::KeyDown => {
                let step = if event == InputEvent::KeyUp { 1 } else { -1 };
                let current = PitchClass::from_name(&self.key)
                    .or_else(|| PitchClass::from_name(DEFAULT_KEY));
                if let Some(pitch) = current {
                    self.set_key(pitch.shifted(step).name());
                }
                vec![]
            }
            InputEvent::OctaveUp => {
                self.set_octave(self.octave + 1);
                vec![]
            }
            InputEvent::OctaveDown => {
                self.set_octave(self.octave - 1);
                vec![]
            }
            InputEvent::NextWaveform => self.set_waveform(self.params.waveform.next()).into_iter().collect(),
            InputEvent::SelectParam(step) => {
                self.selected = self.selected.cycle(step as i32);
                vec![]
            }
            InputEvent::AdjustParam(steps) => self.adjust_selected(steps).into_iter().collect(),
            InputEvent::ToggleRecording => {
                let cmd = if self.recording { self.stop_recording() } else { self.start_recording() };
                cmd.into_iter().collect()
            }
            InputEvent::Quit => vec![],
        }
    }

    /// One frame: advance the balls, feed their wall hits to the trigger, and
    /// emit whatever the trigger decides to play.
    pub fn tick(&mut self, now: Instant) -> Vec<AudioCommand> {
        let collisions = self.sim.step();
        for _ in &collisions {
            self.trigger.on_collision(now);
        }

        let scale = self.current_scale();
        let notes = self.trigger.poll(now, self.scale_type.kind(), &scale, self.chain_ready);
        if notes.is_empty() {
            return vec![];
        }

        self.last_notes = notes.iter().map(|n| n.note.to_string()).collect();
        log::debug!("play {:?}", self.last_notes);
        notes
            .into_iter()
            .map(|n| {
                AudioCommand::Trigger(TriggerParams {
                    frequency: n.note.frequency(),
                    length: n.length,
                    offset_ms: n.offset_ms,
                })
            })
            .collect()
    }

    // ── Balls ────────────────────────────────────────────────────

    pub fn spawn(&mut self, x: f64, y: f64) -> BallId {
        self.sim.spawn(x, y, self.ball_speed as f64)
    }

    pub fn spawn_random(&mut self) -> BallId {
        self.sim.spawn_random(self.ball_speed as f64)
    }

    pub fn clear(&mut self) {
        log::debug!("clearing {} balls", self.sim.len());
        self.sim.clear();
        self.trigger.cancel(); // no balls left to have hit anything
    }

    /// Applies to balls spawned from now on.
    pub fn set_ball_speed(&mut self, scale: f32) {
        let (min, max, _) = ParamSlot::BallSpeed.range();
        if scale.is_finite() {
            self.ball_speed = scale.clamp(min, max);
        }
    }

    // ── Musical settings ─────────────────────────────────────────

    pub fn set_scale_type(&mut self, name: &str) -> Result<(), ParseError> {
        self.scale_type = name.parse()?;
        Ok(())
    }

    /// Unknown names are kept as-is and simply yield an empty scale.
    pub fn set_key(&mut self, key: &str) {
        if PitchClass::from_name(key).is_none() {
            log::warn!("unknown key '{key}', nothing will play");
        }
        self.key = key.trim().to_string();
    }

    pub fn set_octave(&mut self, octave: i32) {
        self.octave = octave.clamp(MIN_OCTAVE, MAX_OCTAVE);
    }

    pub fn current_scale(&self) -> Vec<Note> {
        self.scale_type.notes(&self.key, self.octave)
    }

    // ── Chain parameters ─────────────────────────────────────────
    //
    // Each setter updates the mirror and returns the command for the engine,
    // or nothing at all while the chain isn't up.

    fn gate(&self, cmd: AudioCommand) -> Option<AudioCommand> {
        if self.chain_ready {
            Some(cmd)
        } else {
            log::debug!("chain not ready, dropped {cmd:?}");
            None
        }
    }

    pub fn set_waveform(&mut self, waveform: Waveform) -> Option<AudioCommand> {
        let cmd = self.gate(AudioCommand::SetWaveform(waveform))?;
        self.params.waveform = waveform;
        Some(cmd)
    }

    pub fn set_envelope(&mut self, envelope: Envelope) -> Option<AudioCommand> {
        let envelope = envelope.sanitized();
        let cmd = self.gate(AudioCommand::SetEnvelope(envelope))?;
        self.params.envelope = envelope;
        Some(cmd)
    }

    pub fn set_filter(&mut self, kind: FilterKind, hz: f32) -> Option<AudioCommand> {
        if !hz.is_finite() || hz <= 0.0 {
            return None;
        }
        let cmd = self.gate(AudioCommand::SetFilter { kind, hz })?;
        match kind {
            FilterKind::Lowpass => self.params.lowpass_hz = hz,
            FilterKind::Highpass => self.params.highpass_hz = hz,
        }
        Some(cmd)
    }

    pub fn set_effect_mix(&mut self, kind: EffectKind, wet: f32) -> Option<AudioCommand> {
        if !wet.is_finite() {
            return None;
        }
        let wet = wet.clamp(0.0, 1.0);
        let cmd = self.gate(AudioCommand::SetEffectMix { kind, wet })?;
        match kind {
            EffectKind::Delay => self.params.delay_mix = wet,
            EffectKind::Reverb => self.params.reverb_mix = wet,
        }
        Some(cmd)
    }

    pub fn set_gain(&mut self, level: f32) -> Option<AudioCommand> {
        if !level.is_finite() {
            return None;
        }
        let level = level.max(0.0);
        let cmd = self.gate(AudioCommand::SetGain(level))?;
        self.params.gain = level;
        Some(cmd)
    }

    fn param_value(&self, slot: ParamSlot) -> f32 {
        let p = &self.params;
        match slot {
            ParamSlot::Attack => p.envelope.attack,
            ParamSlot::Decay => p.envelope.decay,
            ParamSlot::Sustain => p.envelope.sustain,
            ParamSlot::Release => p.envelope.release,
            ParamSlot::DelayMix => p.delay_mix,
            ParamSlot::ReverbMix => p.reverb_mix,
            ParamSlot::Gain => p.gain,
            ParamSlot::Lowpass => p.lowpass_hz,
            ParamSlot::Highpass => p.highpass_hz,
            ParamSlot::BallSpeed => self.ball_speed,
        }
    }

    // knob turn: move the selected slot by whole steps, kept inside its range
    fn adjust_selected(&mut self, steps: f32) -> Option<AudioCommand> {
        let slot = self.selected;
        let (min, max, step) = slot.range();
        let value = (self.param_value(slot) + steps * step).clamp(min, max);
        let env = self.params.envelope;
        match slot {
            ParamSlot::Attack => self.set_envelope(Envelope { attack: value, ..env }),
            ParamSlot::Decay => self.set_envelope(Envelope { decay: value, ..env }),
            ParamSlot::Sustain => self.set_envelope(Envelope { sustain: value, ..env }),
            ParamSlot::Release => self.set_envelope(Envelope { release: value, ..env }),
            ParamSlot::DelayMix => self.set_effect_mix(EffectKind::Delay, value),
            ParamSlot::ReverbMix => self.set_effect_mix(EffectKind::Reverb, value),
            ParamSlot::Gain => self.set_gain(value),
            ParamSlot::Lowpass => self.set_filter(FilterKind::Lowpass, value),
            ParamSlot::Highpass => self.set_filter(FilterKind::Highpass, value),
            ParamSlot::BallSpeed => {
                self.set_ball_speed(value);
                None
            }
        }
    }

    // ── Recording ────────────────────────────────────────────────

    pub fn start_recording(&mut self) -> Option<AudioCommand> {
        if self.recording {
            log::debug!("already recording");
            return None;
        }
        let cmd = self.gate(AudioCommand::StartRecording)?;
        self.recording = true;
        self.status = "recording...".to_string();
        Some(cmd)
    }

    pub fn stop_recording(&mut self) -> Option<AudioCommand> {
        if !self.recording {
            log::debug!("not recording");
            return None;
        }
        self.recording = false;
        Some(AudioCommand::StopRecording)
    }

    /// The audio thread lost `blocks` capture blocks, so the take has gaps.
    pub fn note_dropped_capture(&mut self, blocks: u64) {
        if blocks == 0 {
            return;
        }
        log::warn!("capture dropped {blocks} blocks");
        self.status = format!("recording lost {blocks} blocks");
    }

    /// Encode a capture the engine handed back. A capture that can't be
    /// decoded produces no file, only a status line.
    pub fn on_recording_complete(&mut self, captured: &CapturedAudio, at: SystemTime) -> Option<FinishedRecording> {
        match self.encoder.finish(captured, at) {
            Ok(done) => {
                self.status = format!("encoded {}", done.filename);
                Some(done)
            }
            Err(e) => {
                log::error!("recording failed: {e}");
                self.status = format!("recording failed: {e}");
                None
            }
        }
    }

    // ── Display ──────────────────────────────────────────────────

    pub fn display_state(&self) -> DisplayState {
        DisplayState {
            balls: self
                .sim
                .balls()
                .iter()
                .map(|b| BallView { x: b.x, y: b.y, color: b.color })
                .collect(),
            params: self.params,
            ball_speed: self.ball_speed,
            selected_param: self.selected,
            scale_label: self.scale_type.label(),
            key: self.key.clone(),
            octave: self.octave,
            recording: self.recording,
            chain_ready: self.chain_ready,
            last_notes: self.last_notes.clone(),
            status: self.status.clone(),
        }
    }
}

impl Default for Middle {
    fn default() -> Self {
        Self::new()
    }
}
