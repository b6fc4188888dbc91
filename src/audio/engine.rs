use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::chain::{ChainParameters, SignalChain};
use super::frame::StereoFrame;
use super::tap::{AnalysisTap, CaptureTap};
use crate::audio_api::AudioCommand;

pub const SCRATCH_FRAMES: usize = 4096; // grown only if the device asks for more

/// Everything that runs inside the output callback: the signal chain, the
/// capture tap and the analysis tap.
pub struct Engine {
    chain: SignalChain,
    ready: Arc<AtomicBool>,
    capture: Option<CaptureTap>,
    analysis: Option<AnalysisTap>,
    scratch: Vec<StereoFrame>,
}

impl Engine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            chain: SignalChain::new(sample_rate, ChainParameters::default()),
            ready: Arc::new(AtomicBool::new(false)),
            capture: None,
            analysis: None,
            scratch: vec![StereoFrame::zero(); SCRATCH_FRAMES],
        }
    }

    pub fn set_capture_tap(&mut self, tap: CaptureTap) {
        self.capture = Some(tap);
    }

    pub fn set_analysis_tap(&mut self, tap: AnalysisTap) {
        self.analysis = Some(tap);
    }

    /// Flips to true on the first block the device pulls.
    pub fn ready_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.ready)
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Trigger(t) => {
                self.chain.trigger(t.frequency, t.length, t.offset_ms);
            }
            AudioCommand::SetWaveform(w) => self.chain.set_waveform(w),
            AudioCommand::SetEnvelope(env) => self.chain.set_envelope(env),
            AudioCommand::SetFilter { kind, hz } => self.chain.set_filter(kind, hz),
            AudioCommand::SetEffectMix { kind, wet } => self.chain.set_effect_mix(kind, wet),
            AudioCommand::SetGain(level) => self.chain.set_gain(level),
            AudioCommand::StartRecording => {
                if let Some(capture) = &mut self.capture {
                    capture.start();
                }
            }
            AudioCommand::StopRecording => {
                if let Some(capture) = &mut self.capture {
                    capture.stop();
                }
            }
        }
    }

    /// Fill one device buffer of `channels`-interleaved f32 samples.
    pub fn render_block(&mut self, data: &mut [f32], channels: usize) {
        if !self.ready.load(Ordering::Relaxed) {
            self.ready.store(true, Ordering::Relaxed);
        }

        let channels = channels.max(1);
        let n_frames = data.len() / channels;
        if self.scratch.len() < n_frames {
            self.scratch.resize(n_frames, StereoFrame::zero());
        }
        let frames = &mut self.scratch[..n_frames];
        self.chain.render(frames);

        for (out, frame) in data.chunks_exact_mut(channels).zip(frames.iter()) {
            let left = frame.left.clamp(-1.0, 1.0);
            let right = frame.right.clamp(-1.0, 1.0);
            for (ch, sample) in out.iter_mut().enumerate() {
                *sample = if ch % 2 == 0 { left } else { right };
            }
        }

        if let Some(capture) = &self.capture {
            capture.write(frames);
        }
        if let Some(analysis) = &self.analysis {
            analysis.write(frames);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tap::{analysis_tap, capture_tap};
    use crate::audio_api::{EffectKind, NoteLength, TriggerParams};
    use crate::recording::decode;

    const SR: u32 = 8000;

    fn note() -> AudioCommand {
        AudioCommand::Trigger(TriggerParams {
            frequency: 440.0,
            length: NoteLength::Eighth,
            offset_ms: 0,
        })
    }

    #[test]
    fn test_ready_only_after_first_block() {
        let mut engine = Engine::new(SR);
        let ready = engine.ready_flag();
        assert!(!ready.load(Ordering::Relaxed));
        engine.handle_cmd(note());
        assert!(!ready.load(Ordering::Relaxed));
        engine.render_block(&mut [0.0; 64], 2);
        assert!(ready.load(Ordering::Relaxed));
    }

    #[test]
    fn test_render_block_fills_every_channel() {
        let mut engine = Engine::new(SR);
        engine.handle_cmd(AudioCommand::SetGain(1.0));
        engine.handle_cmd(note());
        let mut data = vec![0.0f32; 3 * 256];
        engine.render_block(&mut data, 3);
        assert!(data.iter().any(|s| *s != 0.0));
        for frame in data.chunks_exact(3) {
            assert_eq!(frame[0], frame[1]);
            assert_eq!(frame[0], frame[2]);
        }
    }

    #[test]
    fn test_output_is_hard_clipped() {
        let mut engine = Engine::new(SR);
        engine.handle_cmd(AudioCommand::SetGain(50.0));
        engine.handle_cmd(note());
        let mut data = vec![0.0f32; 2 * 2000];
        engine.render_block(&mut data, 2);
        assert!(data.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(data.iter().any(|s| s.abs() == 1.0));
    }

    #[test]
    fn test_grows_scratch_for_large_buffers() {
        let mut engine = Engine::new(SR);
        let mut data = vec![0.0f32; 2 * (SCRATCH_FRAMES + 100)];
        engine.render_block(&mut data, 2);
        assert_eq!(engine.scratch.len(), SCRATCH_FRAMES + 100);
    }

    #[test]
    fn test_stop_hands_take_to_control_thread() {
        let (tap, mut sink) = capture_tap(16, 256, SR);
        let mut engine = Engine::new(SR);
        engine.set_capture_tap(tap);

        engine.handle_cmd(AudioCommand::StartRecording);
        let mut data = vec![0.0f32; 2 * 128];
        engine.render_block(&mut data, 2);
        engine.render_block(&mut data, 2);
        engine.handle_cmd(AudioCommand::StopRecording);

        let captured = sink.poll().unwrap();
        assert_eq!(captured.channels, 2);
        assert_eq!(captured.sample_rate, SR);
        assert_eq!(decode(&captured).unwrap().frames(), 256);
    }

    #[test]
    fn test_stop_while_idle_sends_nothing() {
        let (tap, mut sink) = capture_tap(4, 64, SR);
        let mut engine = Engine::new(SR);
        engine.set_capture_tap(tap);
        engine.handle_cmd(AudioCommand::StopRecording);
        engine.render_block(&mut [0.0; 2 * 16], 2);
        assert!(sink.poll().is_none());
    }

    #[test]
    fn test_restart_does_not_leak_previous_take() {
        let (tap, mut sink) = capture_tap(16, 256, SR);
        let mut engine = Engine::new(SR);
        engine.set_capture_tap(tap);
        let mut data = vec![0.0f32; 2 * 64];

        engine.handle_cmd(AudioCommand::StartRecording);
        engine.render_block(&mut data, 2);
        engine.handle_cmd(AudioCommand::StopRecording);
        engine.handle_cmd(AudioCommand::StartRecording);
        engine.handle_cmd(AudioCommand::StartRecording); // ignored, already running
        engine.render_block(&mut data[..2 * 10], 2);
        engine.handle_cmd(AudioCommand::StopRecording);

        assert_eq!(decode(&sink.poll().unwrap()).unwrap().frames(), 64);
        assert_eq!(decode(&sink.poll().unwrap()).unwrap().frames(), 10);
    }

    #[test]
    fn test_lost_blocks_are_counted() {
        let (tap, mut sink) = capture_tap(2, 256, SR);
        let mut engine = Engine::new(SR);
        engine.set_capture_tap(tap);
        engine.handle_cmd(AudioCommand::StartRecording);
        for _ in 0..5 {
            engine.render_block(&mut [0.0; 2 * 32], 2);
        }
        engine.handle_cmd(AudioCommand::StopRecording);

        assert_eq!(decode(&sink.poll().unwrap()).unwrap().frames(), 64);
        assert_eq!(sink.take_dropped(), 3);
    }

    #[test]
    fn test_analysis_tap_gets_mono_blocks() {
        let (tap, sink) = analysis_tap(4, 256);
        let mut engine = Engine::new(SR);
        engine.set_analysis_tap(tap);
        engine.render_block(&mut [0.0; 2 * 100], 2);
        let mut lens = Vec::new();
        sink.drain(|block| lens.push(block.len()));
        assert_eq!(lens, vec![100]);
    }

    #[test]
    fn test_parameter_commands_reach_chain() {
        let mut engine = Engine::new(SR);
        engine.handle_cmd(AudioCommand::SetGain(0.25));
        engine.handle_cmd(AudioCommand::SetEffectMix {
            kind: EffectKind::Delay,
            wet: 0.1,
        });
        assert_eq!(engine.chain.params().gain, 0.25);
        assert_eq!(engine.chain.params().delay_mix, 0.1);
    }
}
