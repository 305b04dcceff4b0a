/// Per-frame options for [`Context::begin_frame`](super::Context::begin_frame).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameOptions {
    /// Zero keeps the context's current width.
    pub width: u32,
    /// Zero keeps the context's current height.
    pub height: u32,
    /// Zero uses the context's frame clock.
    pub delta_time_ms: f32,
    pub vsync: bool,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            delta_time_ms: 0.0,
            vsync: true,
        }
    }
}

impl FrameOptions {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}
