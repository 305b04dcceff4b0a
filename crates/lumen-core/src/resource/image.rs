use std::fmt;
use std::sync::Arc;

use super::ContextLink;
use crate::backend::{ImageRef, RawHandle};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::{ResourceId, ResourceKind};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ImageWrap {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ImageFilter {
    Nearest,
    #[default]
    Bilinear,
}

/// How an image is sampled when drawn.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ImageSampler {
    pub wrap_x: ImageWrap,
    pub wrap_y: ImageWrap,
    pub filter: ImageFilter,
}

/// Decoded pixels in premultiplied RGBA8, rows top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[inline]
fn premultiply(c: u8, a: u8) -> u8 {
    ((c as u32 * a as u32 + 127) / 255) as u8
}

impl ImageData {
    pub fn from_premul_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<ImageData> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_parameter("image dimensions must be non-zero"));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::invalid_parameter(format!(
                "{width}x{height} image needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(ImageData {
            width,
            height,
            pixels,
        })
    }

    pub fn from_straight_rgba8(width: u32, height: u32, mut pixels: Vec<u8>) -> Result<ImageData> {
        for px in pixels.chunks_exact_mut(4) {
            let a = px[3];
            for c in &mut px[..3] {
                *c = premultiply(*c, a);
            }
        }
        Self::from_premul_rgba8(width, height, pixels)
    }

    /// Decodes PNG, JPEG, BMP or WebP bytes.
    pub fn decode(bytes: &[u8]) -> Result<ImageData> {
        if bytes.is_empty() {
            return Err(Error::invalid_parameter("image data is empty"));
        }
        let decoded = ::image::load_from_memory(bytes)
            .map_err(|e| Error::invalid_parameter(format!("image decode failed: {e}")))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        Self::from_straight_rgba8(width, height, decoded.into_raw())
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Premultiplied texel; coordinates must be in range.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        match self.pixels.get(i..i + 4) {
            Some(&[r, g, b, a]) => [r, g, b, a],
            _ => [0; 4],
        }
    }
}

struct ImageInner {
    link: ContextLink,
    raw: RawHandle,
    data: Arc<ImageData>,
}

impl Drop for ImageInner {
    fn drop(&mut self) {
        self.link.ctx().device().backend().release_image(self.raw);
        log::trace!("image #{} released", self.link.id().get());
    }
}

/// An image uploaded to a context. Clones share the image.
#[derive(Clone)]
pub struct Image {
    inner: Arc<ImageInner>,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.inner.link.id().get())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl Image {
    pub(crate) fn decode(ctx: &Context, bytes: &[u8]) -> Result<Image> {
        Self::upload(ctx, ImageData::decode(bytes)?)
    }

    pub(crate) fn upload(ctx: &Context, data: ImageData) -> Result<Image> {
        let inner = ctx.inner();
        let device = inner.device();
        let data = Arc::new(data);
        let raw = device.create("image", |b| b.create_image(inner.raw(), &data))?;
        let link = match ContextLink::new(inner, ResourceKind::Image, raw) {
            Ok(link) => link,
            Err(e) => {
                device.backend().release_image(raw);
                return Err(e);
            }
        };
        log::debug!(
            "image #{} uploaded ({}x{})",
            link.id().get(),
            data.width,
            data.height
        );
        Ok(Image {
            inner: Arc::new(ImageInner { link, raw, data }),
        })
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.inner.link.id()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.inner.data.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.inner.data.height
    }

    pub fn data(&self) -> &ImageData {
        &self.inner.data
    }

    pub(crate) fn link(&self) -> &ContextLink {
        &self.inner.link
    }

    pub(crate) fn image_ref(&self) -> ImageRef {
        ImageRef {
            raw: self.inner.raw,
            data: Arc::clone(&self.inner.data),
        }
    }
}
