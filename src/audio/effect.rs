use biquad::{Biquad, Coefficients, DirectForm2Transposed, Q_BUTTERWORTH_F32, ToHertz, Type};

use crate::audio_api::FilterKind;

// Every stage after the voice is a mono sample-in/sample-out processor.
pub trait Effect: Send {
    fn process(&mut self, input: f32) -> f32;
}

#[inline]
fn mix(dry: f32, wet_signal: f32, wet: f32) -> f32 {
    dry * (1.0 - wet) + wet_signal * wet
}

// filter
pub struct Filter {
    kind: FilterKind,
    sample_rate: f32,
    cutoff: f32,
    inner: DirectForm2Transposed<f32>,
}

impl Filter {
    pub fn new(kind: FilterKind, sample_rate: f32, cutoff: f32) -> Self {
        let cutoff = clamp_cutoff(cutoff, sample_rate);
        let coeffs = coefficients(kind, sample_rate, cutoff).unwrap_or(PASSTHROUGH);
        Self {
            kind,
            sample_rate,
            cutoff,
            inner: DirectForm2Transposed::<f32>::new(coeffs),
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    // keeps the filter state, only the coefficients move
    pub fn set_cutoff(&mut self, hz: f32) {
        let hz = clamp_cutoff(hz, self.sample_rate);
        if let Some(coeffs) = coefficients(self.kind, self.sample_rate, hz) {
            self.inner.update_coefficients(coeffs);
            self.cutoff = hz;
        }
    }
}

impl Effect for Filter {
    fn process(&mut self, input: f32) -> f32 {
        self.inner.run(input)
    }
}

const PASSTHROUGH: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

fn clamp_cutoff(hz: f32, sample_rate: f32) -> f32 {
    hz.clamp(1.0, sample_rate * 0.49)
}

fn coefficients(kind: FilterKind, sample_rate: f32, cutoff: f32) -> Option<Coefficients<f32>> {
    let filter_type = match kind {
        FilterKind::Lowpass => Type::LowPass,
        FilterKind::Highpass => Type::HighPass,
    };
    Coefficients::<f32>::from_params(filter_type, sample_rate.hz(), cutoff.hz(), Q_BUTTERWORTH_F32).ok()
}

// feedback delay
pub struct FeedbackDelay {
    buffer: Vec<f32>,
    pos: usize,
    feedback: f32,
    wet: f32,
}

impl FeedbackDelay {
    pub fn new(sample_rate: f32, delay_seconds: f32, feedback: f32, wet: f32) -> Self {
        let len = ((sample_rate * delay_seconds) as usize).max(1);
        Self {
            buffer: vec![0.0; len],
            pos: 0,
            feedback: feedback.clamp(0.0, 0.95),
            wet: wet.clamp(0.0, 1.0),
        }
    }

    pub fn set_wet(&mut self, wet: f32) {
        self.wet = wet.clamp(0.0, 1.0);
    }
}

impl Effect for FeedbackDelay {
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        self.buffer[self.pos] = input + delayed * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        mix(input, delayed, self.wet)
    }
}

// reverb: four damped combs in parallel into two allpasses in series
const COMB_TUNING: [usize; 4] = [1557, 1617, 1491, 1422]; // samples at 44.1k
const ALLPASS_TUNING: [usize; 2] = [225, 556];
const DAMPING: f32 = 0.4;

struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    feedback: f32,
    filter_state: f32,
}

impl Comb {
    fn new(len: usize, decay_seconds: f32, sample_rate: f32) -> Self {
        // -60 dB after decay_seconds
        let feedback = 10f32.powf(-3.0 * len as f32 / (decay_seconds.max(0.1) * sample_rate));
        Self {
            buffer: vec![0.0; len],
            pos: 0,
            feedback,
            filter_state: 0.0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        self.filter_state = delayed * (1.0 - DAMPING) + self.filter_state * DAMPING;
        self.buffer[self.pos] = input + self.filter_state * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        delayed
    }
}

struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self { buffer: vec![0.0; len], pos: 0 }
    }

    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        self.buffer[self.pos] = input + delayed * 0.5;
        self.pos = (self.pos + 1) % self.buffer.len();
        delayed - input
    }
}

pub struct Reverb {
    combs: [Comb; 4],
    allpasses: [Allpass; 2],
    wet: f32,
}

impl Reverb {
    pub fn new(sample_rate: f32, decay_seconds: f32, wet: f32) -> Self {
        let scale = |n: usize| ((n as f32 * sample_rate / 44100.0) as usize).max(1);
        Self {
            combs: COMB_TUNING.map(|n| Comb::new(scale(n), decay_seconds, sample_rate)),
            allpasses: ALLPASS_TUNING.map(|n| Allpass::new(scale(n))),
            wet: wet.clamp(0.0, 1.0),
        }
    }

    pub fn set_wet(&mut self, wet: f32) {
        self.wet = wet.clamp(0.0, 1.0);
    }
}

impl Effect for Reverb {
    fn process(&mut self, input: f32) -> f32 {
        let mut acc = 0.0;
        for comb in self.combs.iter_mut() {
            acc += comb.process(input);
        }
        let mut out = acc * 0.25;
        for ap in self.allpasses.iter_mut() {
            out = ap.process(out);
        }
        mix(input, out, self.wet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(buf: &[f32]) -> f32 {
        (buf.iter().map(|s| s * s).sum::<f32>() / buf.len() as f32).sqrt()
    }

    fn sine(freq: f32, sr: f32, n: usize) -> Vec<f32> {
        (0..n).map(|i| (std::f32::consts::TAU * freq * i as f32 / sr).sin()).collect()
    }

    fn run(effect: &mut impl Effect, buf: &mut [f32]) {
        for s in buf.iter_mut() {
            *s = effect.process(*s);
        }
    }

    #[test]
    fn test_lowpass_attenuates_highs() {
        let sr = 44100.0;
        let mut lp = Filter::new(FilterKind::Lowpass, sr, 500.0);
        let mut buf = sine(8000.0, sr, 4410);
        run(&mut lp, &mut buf);
        assert!(rms(&buf[2000..]) < 0.05);
    }

    #[test]
    fn test_highpass_attenuates_lows() {
        let sr = 44100.0;
        let mut hp = Filter::new(FilterKind::Highpass, sr, 2000.0);
        let mut buf = sine(50.0, sr, 8820);
        run(&mut hp, &mut buf);
        assert!(rms(&buf[4410..]) < 0.05);
    }

    #[test]
    fn test_cutoff_clamped_below_nyquist() {
        let mut lp = Filter::new(FilterKind::Lowpass, 44100.0, 20000.0);
        lp.set_cutoff(90000.0);
        assert!(lp.cutoff() < 22050.0);
    }

    #[test]
    fn test_dry_delay_passes_input_through() {
        let mut delay = FeedbackDelay::new(1000.0, 0.01, 0.5, 0.0);
        assert_eq!(delay.process(0.7), 0.7);
    }

    #[test]
    fn test_wet_delay_echoes_after_delay_time() {
        // eight samples of delay
        let mut delay = FeedbackDelay::new(1024.0, 0.0078125, 0.0, 1.0);
        assert_eq!(delay.process(1.0), 0.0);
        let echoes: Vec<f32> = (0..8).map(|_| delay.process(0.0)).collect();
        assert_eq!(echoes[6], 0.0);
        assert_eq!(echoes[7], 1.0);
    }

    #[test]
    fn test_reverb_tail_outlasts_impulse() {
        let mut reverb = Reverb::new(44100.0, 1.5, 1.0);
        reverb.process(1.0);
        let tail: Vec<f32> = (0..4410).map(|_| reverb.process(0.0)).collect();
        assert!(tail.iter().any(|s| s.abs() > 1e-3));
        assert!(tail.iter().all(|s| s.is_finite()));
    }
}
