// The smallest unit of audio the device sees; one stereo frame
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn zero() -> Self {
        Self::default()
    }

    // the chain is mono until the very end, where it is spread to both sides
    pub fn mono(s: f32) -> Self {
        Self { left: s, right: s }
    }

    pub fn mid(self) -> f32 {
        (self.left + self.right) * 0.5
    }
}
