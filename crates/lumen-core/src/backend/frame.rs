use std::sync::Arc;

use super::RawHandle;
use crate::coords::{Mat2D, PathGeometry};
use crate::paint::{BlendMode, FillRule, PaintDesc};
use crate::resource::{ImageData, ImageSampler, RenderBuffer};

/// Per-frame parameters handed to the backend at BeginFrame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub delta_time_ms: f32,
    pub vsync: bool,
    /// Index of this frame within its context, starting at 0.
    pub frame_index: u64,
}

/// One entry of the clip stack, resolved to the transform active when it was pushed.
#[derive(Debug, Clone)]
pub struct ClipPath {
    pub geometry: Arc<PathGeometry>,
    pub fill_rule: FillRule,
    pub transform: Mat2D,
}

/// Decoded image pixels plus the backend image they were uploaded to.
#[derive(Debug, Clone)]
pub struct ImageRef {
    pub raw: RawHandle,
    pub data: Arc<ImageData>,
}

/// A recorded draw with all renderer state resolved.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    Path {
        geometry: Arc<PathGeometry>,
        fill_rule: FillRule,
        paint: PaintDesc,
        transform: Mat2D,
        clip: Arc<[ClipPath]>,
    },
    Image {
        image: ImageRef,
        sampler: ImageSampler,
        blend_mode: BlendMode,
        opacity: f32,
        transform: Mat2D,
        clip: Arc<[ClipPath]>,
    },
    ImageMesh {
        image: ImageRef,
        sampler: ImageSampler,
        vertices: RenderBuffer,
        uvs: RenderBuffer,
        indices: RenderBuffer,
        vertex_count: u32,
        index_count: u32,
        blend_mode: BlendMode,
        opacity: f32,
        transform: Mat2D,
        clip: Arc<[ClipPath]>,
    },
}

impl DrawCommand {
    pub fn blend_mode(&self) -> BlendMode {
        match self {
            DrawCommand::Path { paint, .. } => paint.blend_mode,
            DrawCommand::Image { blend_mode, .. } | DrawCommand::ImageMesh { blend_mode, .. } => {
                *blend_mode
            }
        }
    }
}

/// A closed frame ready for submission.
#[derive(Debug, Clone)]
pub struct FrameBatch {
    pub info: FrameInfo,
    pub commands: Vec<DrawCommand>,
}

impl FrameBatch {
    pub(crate) fn new(info: FrameInfo) -> Self {
        Self {
            info,
            commands: Vec::new(),
        }
    }
}
