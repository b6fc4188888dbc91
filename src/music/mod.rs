pub mod scale;

pub use scale::{Note, PitchClass, ScaleKind, ScaleType, ScheduledNote};
