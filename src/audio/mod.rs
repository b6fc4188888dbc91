use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::AudioCommand;
use crate::recording::CapturedAudio;
use crate::shared::{FFT_SIZE, SPECTRUM_BANDS};

mod analysis;
mod chain;
mod effect;
mod engine;
mod frame;
mod tap;
mod voice;

pub use analysis::Analyser;
pub use chain::{ChainParameters, SignalChain};
pub use effect::{Effect, FeedbackDelay, Filter, Reverb};
pub use engine::Engine;
pub use frame::StereoFrame;
pub use tap::{AnalysisSink, AnalysisTap, CaptureSink, CaptureTap, analysis_tap, capture_tap};
pub use voice::{Envelope, Voice, Waveform};

// about 3 s of slack at 512-frame device blocks before capture drops audio
const CAPTURE_BLOCKS: usize = 256;
const ANALYSIS_BLOCKS: usize = 16;

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    capture: CaptureSink,
    analysis: AnalysisSink,
    analyser: Analyser,
    ready: Arc<AtomicBool>,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        let _ = self.tx.try_send(cmd);
    }

    /// True once the device has pulled its first block through the engine.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn poll_completed_recording(&mut self) -> Option<CapturedAudio> {
        self.capture.poll()
    }

    /// Capture blocks lost since the last call; any loss means a gap in the take.
    pub fn take_dropped_capture(&self) -> u64 {
        self.capture.take_dropped()
    }

    /// Drain whatever the tap sent since the last frame and return fresh bands.
    pub fn spectrum(&mut self) -> Vec<f32> {
        let analyser = &mut self.analyser;
        self.analysis.drain(|block| analyser.push(block));
        self.analyser.spectrum()
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let (capture_src, capture) = capture_tap(CAPTURE_BLOCKS, 2 * engine::SCRATCH_FRAMES, sample_rate);
            let (analysis_src, analysis) = analysis_tap(ANALYSIS_BLOCKS, engine::SCRATCH_FRAMES);

            let mut engine = Engine::new(sample_rate);
            engine.set_capture_tap(capture_src);
            engine.set_analysis_tap(analysis_src);
            let ready = engine.ready_flag();

            let output_stream = build_output_stream_f32(&device, &config.into(), rx, engine, channels)?;
            output_stream.play().context("failed to play output stream")?;
            log::info!("audio output running: {sample_rate} Hz, {channels} channels");

            Ok(AudioHandle {
                tx,
                capture,
                analysis,
                analyser: Analyser::new(FFT_SIZE, SPECTRUM_BANDS, sample_rate as f32),
                ready,
                _output_stream: output_stream,
            })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }
            engine.render_block(data, channels);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
