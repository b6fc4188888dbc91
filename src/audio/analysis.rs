//! Frequency analysis tap for reactive visuals.
//!
//! Sits after the gain stage and never feeds back into the audio path. The
//! audio thread ships mono blocks out; the control thread folds them in here
//! and asks for a band snapshot once per frame.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    bands: usize,
    sample_rate: f32,
    history: Vec<f32>, // newest samples at the end, at most `size`
    scratch: Vec<Complex<f32>>,
}

impl Analyser {
    pub fn new(size: usize, bands: usize, sample_rate: f32) -> Self {
        let size = size.max(16).next_power_of_two();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self {
            fft,
            size,
            bands: bands.max(1),
            sample_rate,
            history: Vec::with_capacity(size * 2),
            scratch: vec![Complex::new(0.0, 0.0); size],
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.history.extend_from_slice(samples);
        if self.history.len() > self.size {
            let excess = self.history.len() - self.size;
            self.history.drain(..excess);
        }
    }

    /// Average magnitude per band, log-spaced from 20 Hz up to Nyquist and
    /// normalized so a full-scale sine reads about 1.0.
    pub fn spectrum(&mut self) -> Vec<f32> {
        if self.history.len() < self.size {
            return vec![0.0; self.bands];
        }
        for (i, (slot, sample)) in self.scratch.iter_mut().zip(&self.history).enumerate() {
            *slot = Complex::new(sample * hann_window(i, self.size), 0.0);
        }
        self.fft.process(&mut self.scratch);

        let half = self.size / 2;
        let norm = 4.0 / self.size as f32; // hann coherent gain is 0.5
        let nyquist = self.sample_rate / 2.0;
        let bin_hz = self.sample_rate / self.size as f32;
        let edges: Vec<usize> = (0..=self.bands)
            .map(|b| {
                let hz = 20.0 * (nyquist / 20.0).powf(b as f32 / self.bands as f32);
                ((hz / bin_hz) as usize).clamp(1, half)
            })
            .collect();

        edges
            .windows(2)
            .map(|w| {
                let (lo, hi) = (w[0], w[1].max(w[0] + 1).min(half));
                if lo >= hi {
                    return 0.0;
                }
                let peak = self.scratch[lo..hi].iter().map(|c| c.norm()).fold(0.0, f32::max);
                (peak * norm).min(1.0)
            })
            .collect()
    }
}

/// Hann window function for FFT analysis
fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let size = 1024;
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_silence_until_history_fills() {
        let mut a = Analyser::new(1024, 8, 44100.0);
        a.push(&[0.5; 100]);
        assert_eq!(a.spectrum(), vec![0.0; 8]);
    }

    #[test]
    fn test_sine_lights_up_one_region() {
        let sr = 44100.0;
        let mut a = Analyser::new(1024, 16, sr);
        let tone: Vec<f32> = (0..2048)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / sr).sin())
            .collect();
        a.push(&tone);
        let bands = a.spectrum();
        assert_eq!(bands.len(), 16);
        let loudest = bands
            .iter()
            .enumerate()
            .max_by(|x, y| x.1.total_cmp(y.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(bands[loudest] > 0.5);
        assert!(bands[0] < 0.1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut a = Analyser::new(256, 4, 8000.0);
        for _ in 0..10 {
            a.push(&[0.0; 200]);
        }
        assert_eq!(a.history.len(), 256);
    }
}
