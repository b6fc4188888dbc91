use super::effect::{Effect, FeedbackDelay, Filter, Reverb};
use super::frame::StereoFrame;
use super::voice::{Envelope, Voice, Waveform};
use crate::audio_api::{EffectKind, FilterKind, NoteLength};
use crate::shared::TEMPO_BPM;

const MAX_PENDING_NOTES: usize = 32; // fixed so scheduling never allocates on the audio thread
const DELAY_SECONDS: f32 = 0.5;
const DELAY_FEEDBACK: f32 = 0.125;
const REVERB_DECAY_SECONDS: f32 = 1.5;

/// Everything a user can turn on the chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChainParameters {
    pub envelope: Envelope,
    pub delay_mix: f32,
    pub reverb_mix: f32,
    pub gain: f32,
    pub lowpass_hz: f32,
    pub highpass_hz: f32,
    pub waveform: Waveform,
}

impl Default for ChainParameters {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            delay_mix: 0.5,
            reverb_mix: 0.5,
            gain: 0.5,
            lowpass_hz: 20000.0,
            highpass_hz: 20.0,
            waveform: Waveform::Sine,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PendingNote {
    seq: u64,
    start: u64, // in samples on the chain clock
    frequency: f32,
    length: NoteLength,
}

/// voice -> highpass -> lowpass -> delay -> reverb -> gain
///
/// Every stage is owned here; only a waveform change rebuilds them, and the
/// rebuild reads the current parameters so nothing the user set is lost.
pub struct SignalChain {
    sample_rate: f32,
    tempo_bpm: f32,
    params: ChainParameters,

    voice: Voice,
    highpass: Filter,
    lowpass: Filter,
    delay: FeedbackDelay,
    reverb: Reverb,

    pending: Vec<PendingNote>,
    next_seq: u64,
    release_at: Option<u64>,
    clock: u64,
}

impl SignalChain {
    pub fn new(sample_rate: u32, params: ChainParameters) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        let params = ChainParameters {
            envelope: params.envelope.sanitized(),
            ..params
        };
        Self {
            sample_rate,
            tempo_bpm: TEMPO_BPM,
            params,
            voice: Voice::new(params.waveform, sample_rate),
            highpass: Filter::new(FilterKind::Highpass, sample_rate, params.highpass_hz),
            lowpass: Filter::new(FilterKind::Lowpass, sample_rate, params.lowpass_hz),
            delay: FeedbackDelay::new(sample_rate, DELAY_SECONDS, DELAY_FEEDBACK, params.delay_mix),
            reverb: Reverb::new(sample_rate, REVERB_DECAY_SECONDS, params.reverb_mix),
            pending: Vec::with_capacity(MAX_PENDING_NOTES),
            next_seq: 0,
            release_at: None,
            clock: 0,
        }
    }

    pub fn params(&self) -> ChainParameters {
        self.params
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.params.waveform = waveform;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let p = self.params;
        let sr = self.sample_rate;
        self.voice = Voice::new(p.waveform, sr);
        self.highpass = Filter::new(FilterKind::Highpass, sr, p.highpass_hz);
        self.lowpass = Filter::new(FilterKind::Lowpass, sr, p.lowpass_hz);
        self.delay = FeedbackDelay::new(sr, DELAY_SECONDS, DELAY_FEEDBACK, p.delay_mix);
        self.reverb = Reverb::new(sr, REVERB_DECAY_SECONDS, p.reverb_mix);
        self.release_at = None;
    }

    pub fn set_envelope(&mut self, envelope: Envelope) {
        self.params.envelope = envelope.sanitized();
    }

    pub fn set_filter(&mut self, kind: FilterKind, hz: f32) {
        if !hz.is_finite() || hz <= 0.0 {
            return;
        }
        match kind {
            FilterKind::Lowpass => {
                self.params.lowpass_hz = hz;
                self.lowpass.set_cutoff(hz);
            }
            FilterKind::Highpass => {
                self.params.highpass_hz = hz;
                self.highpass.set_cutoff(hz);
            }
        }
    }

    pub fn set_effect_mix(&mut self, kind: EffectKind, wet: f32) {
        if !wet.is_finite() {
            return;
        }
        let wet = wet.clamp(0.0, 1.0);
        match kind {
            EffectKind::Delay => {
                self.params.delay_mix = wet;
                self.delay.set_wet(wet);
            }
            EffectKind::Reverb => {
                self.params.reverb_mix = wet;
                self.reverb.set_wet(wet);
            }
        }
    }

    // no upper bound here, the UI decides how loud is too loud
    pub fn set_gain(&mut self, level: f32) {
        if level.is_finite() {
            self.params.gain = level.max(0.0);
        }
    }

    /// Queue a note `offset_ms` from now. Returns false when the queue is full
    /// and the note was dropped.
    pub fn trigger(&mut self, frequency: f32, length: NoteLength, offset_ms: u32) -> bool {
        if self.pending.len() >= MAX_PENDING_NOTES || !frequency.is_finite() {
            return false;
        }
        let offset = (offset_ms as f32 / 1000.0 * self.sample_rate) as u64;
        self.pending.push(PendingNote {
            seq: self.next_seq,
            start: self.clock + offset,
            frequency,
            length,
        });
        self.next_seq += 1;
        true
    }

    fn start_due_notes(&mut self) {
        let clock = self.clock;
        let mut latest: Option<PendingNote> = None;
        self.pending.retain(|n| {
            if n.start > clock {
                return true;
            }
            // several due on the same sample: the last one queued wins the voice
            if latest.map_or(true, |l| n.seq > l.seq) {
                latest = Some(*n);
            }
            false
        });
        if let Some(note) = latest {
            self.voice.note_on(note.frequency, self.params.envelope);
            let hold = (note.length.seconds(self.tempo_bpm) * self.sample_rate) as u64;
            self.release_at = Some(clock + hold.max(1));
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        self.start_due_notes();
        if let Some(at) = self.release_at {
            if self.clock >= at {
                self.voice.note_off();
                self.release_at = None;
            }
        }

        let mut s = self.voice.next_sample();
        s = self.highpass.process(s);
        s = self.lowpass.process(s);
        s = self.delay.process(s);
        s = self.reverb.process(s);
        self.clock += 1;
        s * self.params.gain
    }

    pub fn render(&mut self, out: &mut [StereoFrame]) {
        for frame in out.iter_mut() {
            *frame = StereoFrame::mono(self.next_sample());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 8000;

    fn peak(frames: &[StereoFrame]) -> f32 {
        frames.iter().map(|f| f.left.abs()).fold(0.0, f32::max)
    }

    fn dry() -> ChainParameters {
        ChainParameters {
            delay_mix: 0.0,
            reverb_mix: 0.0,
            gain: 1.0,
            ..ChainParameters::default()
        }
    }

    #[test]
    fn test_silent_until_triggered() {
        let mut chain = SignalChain::new(SR, ChainParameters::default());
        let mut buf = vec![StereoFrame::zero(); 512];
        chain.render(&mut buf);
        assert_eq!(peak(&buf), 0.0);
    }

    #[test]
    fn test_trigger_produces_sound_then_releases() {
        let mut chain = SignalChain::new(SR, dry());
        chain.set_envelope(Envelope { attack: 0.005, decay: 0.01, sustain: 0.5, release: 0.05 });
        assert!(chain.trigger(440.0, NoteLength::Sixteenth, 0));

        let mut buf = vec![StereoFrame::zero(); SR as usize / 4];
        chain.render(&mut buf);
        assert!(peak(&buf) > 0.3);
        assert!(!chain.voice.is_active());
    }

    #[test]
    fn test_offset_delays_note_on() {
        let mut chain = SignalChain::new(SR, dry());
        chain.trigger(440.0, NoteLength::Eighth, 100);
        let mut early = vec![StereoFrame::zero(); 700]; // 87.5 ms
        chain.render(&mut early);
        assert_eq!(peak(&early), 0.0);
        let mut later = vec![StereoFrame::zero(); 400];
        chain.render(&mut later);
        assert!(peak(&later) > 0.0);
    }

    #[test]
    fn test_waveform_rebuild_keeps_parameters() {
        let mut chain = SignalChain::new(SR, ChainParameters::default());
        chain.set_gain(0.3);
        chain.set_filter(FilterKind::Lowpass, 1200.0);
        chain.set_effect_mix(EffectKind::Reverb, 0.9);
        chain.set_envelope(Envelope { attack: 0.2, decay: 0.3, sustain: 0.4, release: 0.5 });
        let before = chain.params();

        chain.set_waveform(Waveform::Sawtooth);
        let after = chain.params();
        assert_eq!(after.waveform, Waveform::Sawtooth);
        assert_eq!(ChainParameters { waveform: before.waveform, ..after }, before);
        assert_eq!(chain.lowpass.cutoff(), 1200.0);
    }

    #[test]
    fn test_setters_validate() {
        let mut chain = SignalChain::new(SR, ChainParameters::default());
        chain.set_gain(-2.0);
        assert_eq!(chain.params().gain, 0.0);
        chain.set_gain(3.5);
        assert_eq!(chain.params().gain, 3.5);
        chain.set_effect_mix(EffectKind::Delay, 7.0);
        assert_eq!(chain.params().delay_mix, 1.0);
        chain.set_filter(FilterKind::Highpass, -10.0);
        assert_eq!(chain.params().highpass_hz, 20.0);
        chain.set_filter(FilterKind::Highpass, f32::NAN);
        assert_eq!(chain.params().highpass_hz, 20.0);
    }

    #[test]
    fn test_zero_gain_is_silent() {
        let mut chain = SignalChain::new(SR, ChainParameters { gain: 0.0, ..dry() });
        chain.trigger(440.0, NoteLength::Eighth, 0);
        let mut buf = vec![StereoFrame::zero(); 1000];
        chain.render(&mut buf);
        assert_eq!(peak(&buf), 0.0);
    }

    #[test]
    fn test_pending_queue_is_bounded() {
        let mut chain = SignalChain::new(SR, ChainParameters::default());
        let accepted = (0..100).filter(|_| chain.trigger(220.0, NoteLength::Eighth, 500)).count();
        assert_eq!(accepted, MAX_PENDING_NOTES);
    }

    #[test]
    fn test_retrigger_takes_over_voice() {
        let mut chain = SignalChain::new(SR, dry());
        chain.trigger(220.0, NoteLength::Eighth, 0);
        chain.trigger(880.0, NoteLength::Eighth, 0);
        let mut buf = vec![StereoFrame::zero(); 10];
        chain.render(&mut buf);
        assert!(chain.pending.is_empty());
        assert!(chain.voice.is_active());
        assert!((chain.voice.frequency() - 880.0).abs() < 1e-2);
    }
}
