//! Bouncing balls that play notes.
//!
//! Balls bounce around a fixed canvas; every burst of wall hits becomes a note
//! from the active scale, played through a small synth and effects chain whose
//! output can be captured to WAV.

pub mod audio;
pub mod audio_api;
pub mod middle;
pub mod music;
pub mod recording;
pub mod shared;
pub mod sim;
pub mod trigger;
pub mod tui;
