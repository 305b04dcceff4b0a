use std::sync::Arc;

use crate::backend::ClipPath;
use crate::coords::Mat2D;

/// Transform and clip stack entry of a renderer.
#[derive(Debug, Clone)]
pub(crate) struct RenderState {
    pub(crate) transform: Mat2D,
    /// Shared with every draw recorded under this clip.
    pub(crate) clip: Arc<[ClipPath]>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            transform: Mat2D::IDENTITY,
            clip: Arc::from(Vec::new()),
        }
    }
}

impl RenderState {
    pub(crate) fn push_clip(&mut self, clip: ClipPath) {
        let mut clips = self.clip.to_vec();
        clips.push(clip);
        self.clip = Arc::from(clips);
    }
}
