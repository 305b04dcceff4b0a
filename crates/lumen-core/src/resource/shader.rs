use std::fmt;
use std::sync::Arc;

use super::ContextLink;
use crate::context::Context;
use crate::coords::Vec2;
use crate::error::Result;
use crate::handle::{ResourceId, ResourceKind};
use crate::paint::Gradient;

struct ShaderInner {
    link: ContextLink,
    gradient: Arc<Gradient>,
}

/// Immutable gradient shader. Clones share the shader.
#[derive(Clone)]
pub struct Shader {
    inner: Arc<ShaderInner>,
}

impl fmt::Debug for Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.inner.link.id().get())
            .field("gradient", &self.inner.gradient)
            .finish()
    }
}

impl Shader {
    pub(crate) fn linear(ctx: &Context, start: Vec2, end: Vec2, colors: &[u32], stops: &[f32]) -> Result<Shader> {
        Self::wrap(ctx, Gradient::linear(start, end, colors, stops)?)
    }

    pub(crate) fn radial(ctx: &Context, center: Vec2, radius: f32, colors: &[u32], stops: &[f32]) -> Result<Shader> {
        Self::wrap(ctx, Gradient::radial(center, radius, colors, stops)?)
    }

    fn wrap(ctx: &Context, gradient: Gradient) -> Result<Shader> {
        let link = ContextLink::create(
            ctx.inner(),
            ResourceKind::Shader,
            "shader",
            |b, ctx| b.create_shader(ctx, &gradient),
            |b, raw| b.release_shader(raw),
        )?;
        Ok(Shader {
            inner: Arc::new(ShaderInner {
                link,
                gradient: Arc::new(gradient),
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.inner.link.id()
    }

    pub fn gradient(&self) -> &Gradient {
        &self.inner.gradient
    }

    pub(crate) fn gradient_arc(&self) -> Arc<Gradient> {
        Arc::clone(&self.inner.gradient)
    }

    pub(crate) fn link(&self) -> &ContextLink {
        &self.inner.link
    }
}
