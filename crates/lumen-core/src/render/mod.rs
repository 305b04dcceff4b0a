//! Draw recording.
//!
//! A [`Renderer`] turns draw calls into [`DrawCommand`]s on its context's open
//! frame, resolving the transform and clip stack at record time. Capability
//! and ownership checks run here, before anything reaches the backend.

mod state;

use std::fmt;
use std::sync::Arc;

use state::RenderState;

use crate::backend::{ClipPath, DrawCommand, FeatureFlags};
use crate::context::{Context, ContextInner};
use crate::coords::Mat2D;
use crate::error::{Error, Recorded, Result};
use crate::handle::{ResourceId, ResourceKind};
use crate::paint::{BlendMode, FillRule};
use crate::resource::{BufferType, ContextLink, Image, ImageSampler, Paint, Path, RenderBuffer};

const VERTEX_STRIDE: usize = 8;
const INDEX_STRIDE: usize = 2;

/// Records draws into the current frame of its context.
///
/// State (transform and clip) lives for one frame: the first call in a new
/// frame starts from the identity transform with no clip.
pub struct Renderer {
    link: ContextLink,
    current: RenderState,
    stack: Vec<RenderState>,
    frame: Option<u64>,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("id", &self.link.id().get())
            .field("transform", &self.current.transform)
            .field("clips", &self.current.clip.len())
            .field("depth", &self.stack.len())
            .finish()
    }
}

fn check_opacity(opacity: f32) -> Result<()> {
    if opacity.is_finite() && (0.0..=1.0).contains(&opacity) {
        Ok(())
    } else {
        Err(Error::invalid_parameter(format!(
            "opacity must be within [0, 1], got {opacity}"
        )))
    }
}

fn check_buffer(buffer: &RenderBuffer, ty: BufferType, needed: usize, what: &str) -> Result<()> {
    if buffer.ty() != ty {
        return Err(Error::invalid_parameter(format!(
            "{what} buffer must be a {ty:?} buffer, got {:?}",
            buffer.ty()
        )));
    }
    if buffer.size() < needed {
        return Err(Error::invalid_parameter(format!(
            "{what} buffer holds {} bytes, draw needs {needed}",
            buffer.size()
        )));
    }
    Ok(())
}

impl Renderer {
    pub(crate) fn create(ctx: &Context) -> Result<Renderer> {
        let link = ContextLink::create(
            ctx.inner(),
            ResourceKind::Renderer,
            "renderer",
            |b, ctx| b.create_renderer(ctx),
            |b, raw| b.release_renderer(raw),
        )?;
        log::debug!("renderer #{} created", link.id().get());
        Ok(Renderer {
            link,
            current: RenderState::default(),
            stack: Vec::new(),
            frame: None,
        })
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.link.id()
    }

    fn ctx(&self) -> &Arc<ContextInner> {
        self.link.ctx()
    }

    /// Requires an open frame and resets state left over from an earlier one.
    fn begin_op(&mut self) -> Result<()> {
        self.ctx().device().check()?;
        let serial = self.ctx().recording_serial()?;
        if self.frame != Some(serial) {
            self.current = RenderState::default();
            self.stack.clear();
            self.frame = Some(serial);
        }
        Ok(())
    }

    fn require(&self, feature: FeatureFlags, what: &str) -> Result<()> {
        let caps = self.ctx().device().caps();
        if caps.supports(feature) {
            Ok(())
        } else {
            Err(Error::unsupported(format!(
                "{what} needs {feature:?}, which the {} backend lacks",
                caps.backend
            )))
        }
    }

    fn check_blend(&self, mode: BlendMode) -> Result<()> {
        if mode.is_advanced() {
            self.require(FeatureFlags::ADVANCED_BLEND, "blend mode")?;
        }
        Ok(())
    }

    fn check_fill_rule(&self, rule: FillRule) -> Result<()> {
        if rule == FillRule::Clockwise {
            self.require(FeatureFlags::CLOCKWISE_FILL, "clockwise fill")?;
        }
        Ok(())
    }

    pub fn current_transform(&self) -> Mat2D {
        self.current.transform
    }

    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn save(&mut self) -> Result<()> {
        self.save_inner().recorded()
    }

    fn save_inner(&mut self) -> Result<()> {
        self.begin_op()?;
        self.stack.push(self.current.clone());
        Ok(())
    }

    pub fn restore(&mut self) -> Result<()> {
        self.restore_inner().recorded()
    }

    fn restore_inner(&mut self) -> Result<()> {
        self.begin_op()?;
        self.current = self
            .stack
            .pop()
            .ok_or_else(|| Error::invalid_parameter("restore without a matching save"))?;
        Ok(())
    }

    /// Pre-multiplies `m` onto the current transform: `m` applies first.
    pub fn transform(&mut self, m: &Mat2D) -> Result<()> {
        self.transform_inner(m).recorded()
    }

    fn transform_inner(&mut self, m: &Mat2D) -> Result<()> {
        self.begin_op()?;
        if !m.is_finite() {
            return Err(Error::invalid_parameter("transform must be finite"));
        }
        self.current.transform = self.current.transform * *m;
        Ok(())
    }

    pub fn draw_path(&mut self, path: &Path, paint: &Paint) -> Result<()> {
        self.draw_path_inner(path, paint).recorded()
    }

    fn draw_path_inner(&mut self, path: &Path, paint: &Paint) -> Result<()> {
        self.begin_op()?;
        let ctx = Arc::clone(self.ctx());
        path.link().ensure_context(&ctx, "path")?;
        paint.link().ensure_context(&ctx, "paint")?;
        self.check_fill_rule(path.fill_rule())?;
        self.check_blend(paint.desc().blend_mode)?;

        ctx.record(DrawCommand::Path {
            geometry: path.snapshot(),
            fill_rule: path.fill_rule(),
            paint: paint.desc().clone(),
            transform: self.current.transform,
            clip: Arc::clone(&self.current.clip),
        })
    }

    /// Intersects the clip with `path` under the current transform.
    pub fn clip_path(&mut self, path: &Path) -> Result<()> {
        self.clip_path_inner(path).recorded()
    }

    fn clip_path_inner(&mut self, path: &Path) -> Result<()> {
        self.begin_op()?;
        path.link().ensure_context(self.ctx(), "path")?;
        self.check_fill_rule(path.fill_rule())?;
        let clip = ClipPath {
            geometry: path.snapshot(),
            fill_rule: path.fill_rule(),
            transform: self.current.transform,
        };
        self.current.push_clip(clip);
        Ok(())
    }

    /// Draws `image` with its top-left corner at the local origin.
    pub fn draw_image(
        &mut self,
        image: &Image,
        sampler: ImageSampler,
        blend_mode: BlendMode,
        opacity: f32,
    ) -> Result<()> {
        self.draw_image_inner(image, sampler, blend_mode, opacity)
            .recorded()
    }

    fn draw_image_inner(
        &mut self,
        image: &Image,
        sampler: ImageSampler,
        blend_mode: BlendMode,
        opacity: f32,
    ) -> Result<()> {
        self.begin_op()?;
        let ctx = Arc::clone(self.ctx());
        image.link().ensure_context(&ctx, "image")?;
        check_opacity(opacity)?;
        self.check_blend(blend_mode)?;

        ctx.record(DrawCommand::Image {
            image: image.image_ref(),
            sampler,
            blend_mode,
            opacity,
            transform: self.current.transform,
            clip: Arc::clone(&self.current.clip),
        })
    }

    /// Draws an indexed triangle mesh textured with `image`.
    ///
    /// `vertices` and `uvs` hold `[f32; 2]` per vertex (uvs normalized to the
    /// image); `indices` holds `u16` triangle indices.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_image_mesh(
        &mut self,
        image: &Image,
        sampler: ImageSampler,
        vertices: &RenderBuffer,
        uvs: &RenderBuffer,
        indices: &RenderBuffer,
        vertex_count: u32,
        index_count: u32,
        blend_mode: BlendMode,
        opacity: f32,
    ) -> Result<()> {
        let mesh = MeshBuffers {
            vertices,
            uvs,
            indices,
            vertex_count,
            index_count,
        };
        self.draw_image_mesh_inner(image, sampler, &mesh, blend_mode, opacity)
            .recorded()
    }

    fn draw_image_mesh_inner(
        &mut self,
        image: &Image,
        sampler: ImageSampler,
        mesh: &MeshBuffers<'_>,
        blend_mode: BlendMode,
        opacity: f32,
    ) -> Result<()> {
        self.begin_op()?;
        let ctx = Arc::clone(self.ctx());
        image.link().ensure_context(&ctx, "image")?;
        for (buffer, what) in [
            (mesh.vertices, "vertex"),
            (mesh.uvs, "uv"),
            (mesh.indices, "index"),
        ] {
            buffer.link().ensure_context(&ctx, what)?;
        }
        if mesh.vertex_count == 0 || mesh.index_count == 0 {
            return Err(Error::invalid_parameter(
                "mesh draw needs non-zero vertex and index counts",
            ));
        }
        let vertex_bytes = mesh.vertex_count as usize * VERTEX_STRIDE;
        check_buffer(mesh.vertices, BufferType::Vertex, vertex_bytes, "vertex")?;
        check_buffer(mesh.uvs, BufferType::Vertex, vertex_bytes, "uv")?;
        check_buffer(
            mesh.indices,
            BufferType::Index,
            mesh.index_count as usize * INDEX_STRIDE,
            "index",
        )?;
        check_opacity(opacity)?;
        self.check_blend(blend_mode)?;

        ctx.record(DrawCommand::ImageMesh {
            image: image.image_ref(),
            sampler,
            vertices: mesh.vertices.clone(),
            uvs: mesh.uvs.clone(),
            indices: mesh.indices.clone(),
            vertex_count: mesh.vertex_count,
            index_count: mesh.index_count,
            blend_mode,
            opacity,
            transform: self.current.transform,
            clip: Arc::clone(&self.current.clip),
        })
    }
}

struct MeshBuffers<'a> {
    vertices: &'a RenderBuffer,
    uvs: &'a RenderBuffer,
    indices: &'a RenderBuffer,
    vertex_count: u32,
    index_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FrameOptions;
    use crate::device::{Device, DeviceDesc};
    use crate::error::Status;
    use crate::resource::{BufferFlags, ImageData};

    fn context() -> Context {
        Device::create(DeviceDesc::default())
            .unwrap()
            .create_context(16, 16)
            .unwrap()
    }

    fn recorded(ctx: &Context) -> usize {
        use crate::context::FramePhase;
        assert_eq!(ctx.phase(), FramePhase::Recording);
        ctx.inner().recorded_len()
    }

    #[test]
    fn draws_need_an_open_frame() {
        let ctx = context();
        let mut r = ctx.create_renderer().unwrap();
        let path = ctx.create_path(FillRule::NonZero).unwrap();
        let paint = ctx.create_paint().unwrap();
        assert_eq!(r.draw_path(&path, &paint).unwrap_err().status(), Status::InvalidParameter);
        ctx.begin_frame(FrameOptions::default()).unwrap();
        r.draw_path(&path, &paint).unwrap();
        assert_eq!(recorded(&ctx), 1);
    }

    #[test]
    fn save_restore_balance() {
        let ctx = context();
        let mut r = ctx.create_renderer().unwrap();
        ctx.begin_frame(FrameOptions::default()).unwrap();
        r.save().unwrap();
        r.transform(&Mat2D::translate(2.0, 3.0)).unwrap();
        assert_eq!(r.current_transform(), Mat2D::translate(2.0, 3.0));
        r.restore().unwrap();
        assert!(r.current_transform().is_identity());
        assert_eq!(r.restore().unwrap_err().status(), Status::InvalidParameter);
    }

    #[test]
    fn state_resets_each_frame() {
        let ctx = context();
        let mut r = ctx.create_renderer().unwrap();
        let path = ctx.create_path(FillRule::NonZero).unwrap();
        ctx.begin_frame(FrameOptions::default()).unwrap();
        r.save().unwrap();
        r.transform(&Mat2D::scale(2.0, 2.0)).unwrap();
        r.clip_path(&path).unwrap();
        ctx.end_frame().unwrap();
        ctx.submit().unwrap();

        ctx.begin_frame(FrameOptions::default()).unwrap();
        r.save().unwrap();
        assert!(r.current_transform().is_identity());
        assert_eq!(r.save_depth(), 1);
    }

    #[test]
    fn capability_checks() {
        let ctx = context();
        let mut r = ctx.create_renderer().unwrap();
        let path = ctx.create_path(FillRule::Clockwise).unwrap();
        let mut paint = ctx.create_paint().unwrap();
        ctx.begin_frame(FrameOptions::default()).unwrap();
        assert_eq!(r.draw_path(&path, &paint).unwrap_err().status(), Status::Unsupported);
        assert_eq!(r.clip_path(&path).unwrap_err().status(), Status::Unsupported);

        let path = ctx.create_path(FillRule::EvenOdd).unwrap();
        paint.set_blend_mode(BlendMode::Multiply);
        assert_eq!(r.draw_path(&path, &paint).unwrap_err().status(), Status::Unsupported);
        assert_eq!(recorded(&ctx), 0);
    }

    #[test]
    fn foreign_resources_are_invalid_handles() {
        let device = Device::create(DeviceDesc::default()).unwrap();
        let a = device.create_context(8, 8).unwrap();
        let b = device.create_context(8, 8).unwrap();
        let mut r = a.create_renderer().unwrap();
        let path = b.create_path(FillRule::NonZero).unwrap();
        let paint = a.create_paint().unwrap();
        a.begin_frame(FrameOptions::default()).unwrap();
        assert_eq!(r.draw_path(&path, &paint).unwrap_err().status(), Status::InvalidHandle);
        assert_eq!(r.clip_path(&path).unwrap_err().status(), Status::InvalidHandle);
    }

    #[test]
    fn mesh_validation_happens_before_recording() {
        let ctx = context();
        let mut r = ctx.create_renderer().unwrap();
        let image = ctx
            .create_image(ImageData::from_premul_rgba8(1, 1, vec![255; 4]).unwrap())
            .unwrap();
        let verts = ctx
            .create_buffer_init(BufferType::Vertex, BufferFlags::empty(), bytemuck::cast_slice(&[0f32; 6]))
            .unwrap();
        let uvs = verts.clone();
        let indices = ctx
            .create_buffer_init(BufferType::Index, BufferFlags::empty(), bytemuck::cast_slice(&[0u16, 1, 2]))
            .unwrap();
        let s = ImageSampler::default();
        ctx.begin_frame(FrameOptions::default()).unwrap();

        let err = r
            .draw_image_mesh(&image, s, &verts, &uvs, &verts, 3, 3, BlendMode::SrcOver, 1.0)
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        let err = r
            .draw_image_mesh(&image, s, &verts, &uvs, &indices, 4, 3, BlendMode::SrcOver, 1.0)
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        let err = r
            .draw_image_mesh(&image, s, &verts, &uvs, &indices, 3, 0, BlendMode::SrcOver, 1.0)
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        let err = r
            .draw_image_mesh(&image, s, &verts, &uvs, &indices, 3, 3, BlendMode::SrcOver, 1.5)
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        assert_eq!(recorded(&ctx), 0);

        r.draw_image_mesh(&image, s, &verts, &uvs, &indices, 3, 3, BlendMode::SrcOver, 1.0)
            .unwrap();
        r.draw_image(&image, s, BlendMode::SrcOver, 0.5).unwrap();
        assert_eq!(recorded(&ctx), 2);
    }
}
