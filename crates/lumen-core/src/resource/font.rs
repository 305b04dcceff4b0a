use std::fmt;
use std::sync::Arc;

use super::ContextLink;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::{ResourceId, ResourceKind};

struct FontInner {
    link: ContextLink,
    font: fontdue::Font,
}

/// A parsed TrueType or OpenType font. Clones share the font.
#[derive(Clone)]
pub struct Font {
    inner: Arc<FontInner>,
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("id", &self.inner.link.id().get())
            .field("name", &self.inner.font.name())
            .field("glyphs", &self.inner.font.glyph_count())
            .finish()
    }
}

impl Font {
    pub(crate) fn decode(ctx: &Context, bytes: &[u8]) -> Result<Font> {
        if bytes.is_empty() {
            return Err(Error::invalid_parameter("font data is empty"));
        }
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| Error::invalid_parameter(format!("font decode failed: {e}")))?;
        let link = ContextLink::create(
            ctx.inner(),
            ResourceKind::Font,
            "font",
            |b, ctx| b.create_font(ctx, bytes),
            |b, raw| b.release_font(raw),
        )?;
        log::debug!(
            "font #{} decoded ({} glyphs)",
            link.id().get(),
            font.glyph_count()
        );
        Ok(Font {
            inner: Arc::new(FontInner { link, font }),
        })
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.inner.link.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.font.name()
    }

    pub fn glyph_count(&self) -> u16 {
        self.inner.font.glyph_count()
    }

    pub fn has_glyph(&self, c: char) -> bool {
        self.inner.font.lookup_glyph_index(c) != 0
    }

    /// Distance between baselines at `size` pixels, if the font has horizontal metrics.
    pub fn line_advance(&self, size: f32) -> Option<f32> {
        self.inner
            .font
            .horizontal_line_metrics(size)
            .map(|m| m.new_line_size)
    }

    pub(crate) fn fontdue(&self) -> &fontdue::Font {
        &self.inner.font
    }

    pub(crate) fn link(&self) -> &ContextLink {
        &self.inner.link
    }
}
