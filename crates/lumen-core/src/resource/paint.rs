use std::fmt;

use super::{ContextLink, Shader};
use crate::context::Context;
use crate::error::{Error, Recorded, Result};
use crate::handle::{ResourceId, ResourceKind};
use crate::paint::{BlendMode, PaintDesc, PaintStyle, StrokeCap, StrokeJoin};

/// Mutable paint state. Draws record a snapshot of it.
pub struct Paint {
    link: ContextLink,
    desc: PaintDesc,
    shader: Option<Shader>,
}

impl fmt::Debug for Paint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paint")
            .field("id", &self.link.id().get())
            .field("desc", &self.desc)
            .finish()
    }
}

fn non_negative(v: f32, what: &str) -> Result<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_parameter(format!(
            "{what} must be finite and non-negative, got {v}"
        )))
    }
}

impl Paint {
    pub(crate) fn create(ctx: &Context) -> Result<Paint> {
        Ok(Paint {
            link: ContextLink::create(
                ctx.inner(),
                ResourceKind::Paint,
                "paint",
                |b, ctx| b.create_paint(ctx),
                |b, raw| b.release_paint(raw),
            )?,
            desc: PaintDesc::default(),
            shader: None,
        })
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.link.id()
    }

    pub(crate) fn link(&self) -> &ContextLink {
        &self.link
    }

    /// Current state as it would be recorded by a draw.
    pub fn desc(&self) -> &PaintDesc {
        &self.desc
    }

    pub fn set_style(&mut self, style: PaintStyle) {
        self.desc.style = style;
    }

    /// Packed straight-alpha `0xAARRGGBB`.
    pub fn set_color(&mut self, argb: u32) {
        self.desc.color = argb;
    }

    pub fn set_thickness(&mut self, thickness: f32) -> Result<()> {
        non_negative(thickness, "stroke thickness").recorded()?;
        self.desc.thickness = thickness;
        Ok(())
    }

    pub fn set_join(&mut self, join: StrokeJoin) {
        self.desc.join = join;
    }

    pub fn set_cap(&mut self, cap: StrokeCap) {
        self.desc.cap = cap;
    }

    pub fn set_feather(&mut self, feather: f32) -> Result<()> {
        non_negative(feather, "feather").recorded()?;
        self.desc.feather = feather;
        Ok(())
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.desc.blend_mode = mode;
    }

    pub fn set_shader(&mut self, shader: &Shader) -> Result<()> {
        shader
            .link()
            .ensure_context(self.link.ctx(), "shader")
            .recorded()?;
        self.desc.shader = Some(shader.gradient_arc());
        self.shader = Some(shader.clone());
        Ok(())
    }

    pub fn clear_shader(&mut self) {
        self.desc.shader = None;
        self.shader = None;
    }

    pub fn shader(&self) -> Option<&Shader> {
        self.shader.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::device::{Device, DeviceDesc};
    use crate::error::Status;
    use crate::handle::ResourceKind;

    #[test]
    fn setters_validate_and_shader_stays_alive() {
        let device = Device::create(DeviceDesc::default()).unwrap();
        let ctx = device.create_context(4, 4).unwrap();
        let mut paint = ctx.create_paint().unwrap();
        assert_eq!(paint.set_thickness(-1.0).unwrap_err().status(), Status::InvalidParameter);
        assert_eq!(paint.set_feather(f32::NAN).unwrap_err().status(), Status::InvalidParameter);
        paint.set_thickness(3.0).unwrap();
        paint.set_style(PaintStyle::Stroke);
        assert_eq!(paint.desc().thickness, 3.0);

        let shader = ctx
            .linear_gradient(Vec2::zero(), Vec2::new(1.0, 0.0), &[0xFF00_0000], &[0.0])
            .unwrap();
        paint.set_shader(&shader).unwrap();
        drop(shader);
        assert_eq!(device.live_resources(ResourceKind::Shader), 1);
        paint.clear_shader();
        assert_eq!(device.live_resources(ResourceKind::Shader), 0);
        assert!(paint.desc().shader.is_none());
    }

    #[test]
    fn shader_from_another_context_is_an_invalid_handle() {
        let device = Device::create(DeviceDesc::default()).unwrap();
        let a = device.create_context(4, 4).unwrap();
        let b = device.create_context(4, 4).unwrap();
        let mut paint = a.create_paint().unwrap();
        let shader = b
            .radial_gradient(Vec2::zero(), 1.0, &[0xFFFF_FFFF], &[0.0])
            .unwrap();
        assert_eq!(paint.set_shader(&shader).unwrap_err().status(), Status::InvalidHandle);
    }
}
