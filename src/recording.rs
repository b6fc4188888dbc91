// Capture -> decode -> WAV. The audio thread streams blocks out through the
// capture tap; the control thread collects them in a `RecordingSession`, and
// everything after `stop()` returns bytes, never touching the filesystem.

use std::io::Cursor;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("captured audio has no channels")]
    NoChannels,
    #[error("captured {samples} samples, not a whole number of {channels}-channel frames")]
    MisalignedChunks { samples: usize, channels: u16 },
    #[error("{0} channels can't be written with a plain PCM header")]
    UnsupportedChannels(u16),
    #[error("wav encoding failed: {0}")]
    Encode(#[from] hound::Error),
}

/// Raw interleaved chunks straight off the audio thread.
#[derive(Clone, Debug, Default)]
pub struct CapturedAudio {
    pub chunks: Vec<Vec<f32>>,
    pub channels: u16,
    pub sample_rate: u32,
}

/// One float vector per channel.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

#[derive(Clone, Debug)]
pub struct FinishedRecording {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct RecordingSession {
    chunks: Vec<Vec<f32>>,
    active: bool,
    channels: u16,
    sample_rate: u32,
}

impl RecordingSession {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            chunks: Vec::new(),
            active: false,
            channels,
            sample_rate,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Begin a fresh capture. Returns false (and changes nothing) if one is
    /// already running.
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.chunks.clear();
        self.active = true;
        true
    }

    pub fn capture(&mut self, interleaved: &[f32]) {
        if self.active && !interleaved.is_empty() {
            self.chunks.push(interleaved.to_vec());
        }
    }

    /// End the capture and hand over what was collected; `None` when nothing
    /// was running.
    pub fn stop(&mut self) -> Option<CapturedAudio> {
        if !self.active {
            return None;
        }
        self.active = false;
        Some(CapturedAudio {
            chunks: std::mem::take(&mut self.chunks),
            channels: self.channels,
            sample_rate: self.sample_rate,
        })
    }
}

/// Concatenate the chunks and split them into per-channel sample data.
pub fn decode(captured: &CapturedAudio) -> Result<DecodedAudio, RecordingError> {
    let channels = captured.channels as usize;
    if channels == 0 {
        return Err(RecordingError::NoChannels);
    }
    let samples: usize = captured.chunks.iter().map(Vec::len).sum();
    if samples % channels != 0 {
        return Err(RecordingError::MisalignedChunks {
            samples,
            channels: captured.channels,
        });
    }

    let frames = samples / channels;
    let mut out = vec![Vec::with_capacity(frames); channels];
    for (i, sample) in captured.chunks.iter().flatten().enumerate() {
        out[i % channels].push(*sample);
    }
    Ok(DecodedAudio {
        sample_rate: captured.sample_rate,
        channels: out,
    })
}

// asymmetric on purpose so -1.0 and 1.0 both land inside i16
fn to_pcm16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// 16-bit PCM WAV: 44-byte RIFF/fmt/data header, then interleaved samples.
pub fn encode_wav(audio: &DecodedAudio) -> Result<Vec<u8>, RecordingError> {
    let channels = audio.channels.len();
    if channels == 0 {
        return Err(RecordingError::NoChannels);
    }
    if channels > 2 {
        return Err(RecordingError::UnsupportedChannels(channels as u16));
    }
    let frames = audio.frames();
    if audio.channels.iter().any(|c| c.len() != frames) {
        let samples = audio.channels.iter().map(Vec::len).sum();
        return Err(RecordingError::MisalignedChunks {
            samples,
            channels: channels as u16,
        });
    }

    let spec = hound::WavSpec {
        channels: channels as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + frames * channels * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for frame in 0..frames {
            for channel in &audio.channels {
                writer.write_sample(to_pcm16(channel[frame]))?;
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// `tonelab-recording-2024-05-01T13:45:09.250Z.wav`, UTC.
pub fn suggest_filename(at: SystemTime) -> String {
    format!("tonelab-recording-{}.wav", iso8601_utc(at))
}

fn iso8601_utc(at: SystemTime) -> String {
    let since_epoch = at.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = since_epoch.as_secs() as i64;
    let millis = since_epoch.subsec_millis();
    let (year, month, day) = civil_from_days(secs.div_euclid(86_400));
    let rem = secs.rem_euclid(86_400);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        year,
        month,
        day,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60,
        millis
    )
}

// days since 1970-01-01 -> (year, month, day), proleptic Gregorian
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

/// Turns a finished capture into a named, fully encoded file buffer.
#[derive(Debug, Default)]
pub struct RecordingEncoder;

impl RecordingEncoder {
    pub fn finish(&self, captured: &CapturedAudio, at: SystemTime) -> Result<FinishedRecording, RecordingError> {
        let decoded = decode(captured)?;
        let bytes = encode_wav(&decoded)?;
        log::info!(
            "encoded {} frames ({} ch @ {} Hz) into {} bytes",
            decoded.frames(),
            decoded.channels.len(),
            decoded.sample_rate,
            bytes.len()
        );
        Ok(FinishedRecording {
            filename: suggest_filename(at),
            bytes,
        })
    }
}
