//! CPU reference rasterizer.
//!
//! Renders resolved draw commands into a premultiplied RGBA8 canvas by
//! scanline coverage at pixel centers. There is no anti-aliasing and only
//! source-over compositing; feathering is ignored. Backends that rasterize on
//! the CPU advertise neither advanced blending nor clockwise fill.

mod fill;
mod flatten;
mod sample;
mod stroke;

use std::sync::Arc;

use crate::backend::{ClipPath, DrawCommand, RawHandle};
use crate::coords::{Mat2D, PathGeometry, Rect, Vec2};
use crate::error::{Error, Result};
use crate::paint::{Color, FillRule, PaintDesc, PaintStyle};
use crate::resource::{ImageData, ImageSampler};

use fill::{Mask, fill_polygons};
use flatten::flatten;
use sample::sample_image;
use stroke::{StrokeStyle, stroke_polygons};

/// Flattening tolerance in device pixels.
const TOLERANCE: f32 = 0.25;

/// Premultiplied RGBA8 pixel store.
#[derive(Debug, Clone, Default)]
pub(crate) struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Resizes to `width`x`height` and clears to transparent black.
    pub(crate) fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width as usize * height as usize * 4, 0);
    }

    #[inline]
    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub(crate) fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn blend(&mut self, x: u32, y: u32, src: Color) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let Some(px) = self.pixels.get_mut(i..i + 4) else {
            return;
        };
        let dst = Color::from_premul_rgba8([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&src.over(dst).to_premul_rgba8());
    }
}

/// A draw with every buffer resolved to owned data.
#[derive(Debug, Clone)]
pub(crate) enum RasterOp {
    Path {
        geometry: Arc<PathGeometry>,
        fill_rule: FillRule,
        paint: PaintDesc,
        transform: Mat2D,
        clip: Arc<[ClipPath]>,
    },
    Image {
        image: Arc<ImageData>,
        sampler: ImageSampler,
        opacity: f32,
        transform: Mat2D,
        clip: Arc<[ClipPath]>,
    },
    Mesh {
        image: Arc<ImageData>,
        sampler: ImageSampler,
        positions: Vec<Vec2>,
        uvs: Vec<Vec2>,
        indices: Vec<u16>,
        opacity: f32,
        transform: Mat2D,
        clip: Arc<[ClipPath]>,
    },
}

impl RasterOp {
    /// Resolves a recorded command, reading mesh buffers through `read_buffer`.
    pub(crate) fn resolve(
        cmd: &DrawCommand,
        mut read_buffer: impl FnMut(RawHandle) -> Result<Vec<u8>>,
    ) -> Result<RasterOp> {
        let op = match cmd {
            DrawCommand::Path {
                geometry,
                fill_rule,
                paint,
                transform,
                clip,
            } => RasterOp::Path {
                geometry: Arc::clone(geometry),
                fill_rule: *fill_rule,
                paint: paint.clone(),
                transform: *transform,
                clip: Arc::clone(clip),
            },
            DrawCommand::Image {
                image,
                sampler,
                opacity,
                transform,
                clip,
                ..
            } => RasterOp::Image {
                image: Arc::clone(&image.data),
                sampler: *sampler,
                opacity: *opacity,
                transform: *transform,
                clip: Arc::clone(clip),
            },
            DrawCommand::ImageMesh {
                image,
                sampler,
                vertices,
                uvs,
                indices,
                vertex_count,
                index_count,
                opacity,
                transform,
                clip,
                ..
            } => {
                let positions = decode_vec2(&read_buffer(vertices.raw_handle())?, *vertex_count)?;
                let uvs = decode_vec2(&read_buffer(uvs.raw_handle())?, *vertex_count)?;
                let indices = decode_u16(&read_buffer(indices.raw_handle())?, *index_count)?;
                RasterOp::Mesh {
                    image: Arc::clone(&image.data),
                    sampler: *sampler,
                    positions,
                    uvs,
                    indices,
                    opacity: *opacity,
                    transform: *transform,
                    clip: Arc::clone(clip),
                }
            }
        };
        Ok(op)
    }
}

fn decode_vec2(bytes: &[u8], count: u32) -> Result<Vec<Vec2>> {
    let needed = count as usize * 8;
    let bytes = bytes
        .get(..needed)
        .ok_or_else(|| Error::invalid_parameter("vertex buffer shorter than vertex count"))?;
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let [x, y]: [f32; 2] = bytemuck::pod_read_unaligned(chunk);
            Vec2::new(x, y)
        })
        .collect())
}

fn decode_u16(bytes: &[u8], count: u32) -> Result<Vec<u16>> {
    let needed = count as usize * 2;
    let bytes = bytes
        .get(..needed)
        .ok_or_else(|| Error::invalid_parameter("index buffer shorter than index count"))?;
    Ok(bytes.chunks_exact(2).map(bytemuck::pod_read_unaligned).collect())
}

/// Executes `ops` in order on top of the current canvas contents.
pub(crate) fn render(canvas: &mut Canvas, ops: &[RasterOp]) {
    for op in ops {
        match op {
            RasterOp::Path {
                geometry,
                fill_rule,
                paint,
                transform,
                clip,
            } => draw_path(canvas, geometry, *fill_rule, paint, transform, clip),
            RasterOp::Image {
                image,
                sampler,
                opacity,
                transform,
                clip,
            } => draw_image(canvas, image, sampler, *opacity, transform, clip),
            RasterOp::Mesh {
                image,
                sampler,
                positions,
                uvs,
                indices,
                opacity,
                transform,
                clip,
            } => {
                let mesh = Mesh {
                    positions,
                    uvs,
                    indices,
                };
                draw_mesh(canvas, image, sampler, &mesh, *opacity, transform, clip);
            }
        }
    }
}

fn clip_mask(clip: &[ClipPath], width: u32, height: u32) -> Option<Mask> {
    let mut combined: Option<Mask> = None;
    for entry in clip {
        let polys = polygons(&entry.geometry, &entry.transform);
        let mask = fill_polygons(&polys, entry.fill_rule, width, height);
        match combined.as_mut() {
            Some(acc) => acc.intersect(&mask),
            None => combined = Some(mask),
        }
    }
    combined
}

fn polygons(geometry: &PathGeometry, transform: &Mat2D) -> Vec<Vec<Vec2>> {
    flatten(geometry, transform, TOLERANCE)
        .into_iter()
        .map(|c| c.points)
        .collect()
}

fn draw_path(
    canvas: &mut Canvas,
    geometry: &PathGeometry,
    fill_rule: FillRule,
    paint: &PaintDesc,
    transform: &Mat2D,
    clip: &[ClipPath],
) {
    let Some(inverse) = transform.invert() else {
        return;
    };
    let (w, h) = (canvas.width, canvas.height);

    let coverage = match paint.style {
        PaintStyle::Fill => fill_polygons(&polygons(geometry, transform), fill_rule, w, h),
        PaintStyle::Stroke => {
            let scale = transform.determinant().abs().sqrt().max(1e-3);
            let local = flatten(geometry, &Mat2D::IDENTITY, TOLERANCE / scale);
            let style = StrokeStyle {
                half_width: paint.thickness * 0.5,
                cap: paint.cap,
                join: paint.join,
            };
            let polys: Vec<Vec<Vec2>> = stroke_polygons(&local, &style)
                .into_iter()
                .map(|poly| poly.into_iter().map(|p| transform.map_point(p)).collect())
                .collect();
            fill_polygons(&polys, FillRule::NonZero, w, h)
        }
    };
    let clip = clip_mask(clip, w, h);
    let solid = paint.solid_color();

    for y in 0..h {
        for x in 0..w {
            if !coverage.get(x, y) || clip.as_ref().is_some_and(|m| !m.get(x, y)) {
                continue;
            }
            let color = match &paint.shader {
                Some(gradient) => {
                    gradient.sample(inverse.map_point(Vec2::new(x as f32 + 0.5, y as f32 + 0.5)))
                }
                None => solid,
            };
            canvas.blend(x, y, color);
        }
    }
}

fn device_bounds(local: Rect, transform: &Mat2D, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let (min, max) = (local.min(), local.max());
    let corners = [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)];
    let bounds = Rect::from_points(corners.iter().map(|p| transform.map_point(*p)))?;
    let target = Rect::new(0.0, 0.0, width as f32, height as f32);
    let r = bounds.intersect(target)?;
    Some((
        r.min().x.floor() as u32,
        r.min().y.floor() as u32,
        (r.max().x.ceil() as u32).min(width),
        (r.max().y.ceil() as u32).min(height),
    ))
}

fn draw_image(
    canvas: &mut Canvas,
    image: &ImageData,
    sampler: &ImageSampler,
    opacity: f32,
    transform: &Mat2D,
    clip: &[ClipPath],
) {
    let Some(inverse) = transform.invert() else {
        return;
    };
    let (w, h) = (canvas.width, canvas.height);
    let local = Rect::new(0.0, 0.0, image.width as f32, image.height as f32);
    let Some((x0, y0, x1, y1)) = device_bounds(local, transform, w, h) else {
        return;
    };
    let clip = clip_mask(clip, w, h);
    let opacity = opacity.clamp(0.0, 1.0);

    for y in y0..y1 {
        for x in x0..x1 {
            if clip.as_ref().is_some_and(|m| !m.get(x, y)) {
                continue;
            }
            let p = inverse.map_point(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
            if !local.contains(p) {
                continue;
            }
            let color = sample_image(image, p.x, p.y, sampler).scaled(opacity);
            canvas.blend(x, y, color);
        }
    }
}

struct Mesh<'a> {
    positions: &'a [Vec2],
    uvs: &'a [Vec2],
    indices: &'a [u16],
}

fn edge(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn draw_mesh(
    canvas: &mut Canvas,
    image: &ImageData,
    sampler: &ImageSampler,
    mesh: &Mesh<'_>,
    opacity: f32,
    transform: &Mat2D,
    clip: &[ClipPath],
) {
    let (w, h) = (canvas.width, canvas.height);
    let clip = clip_mask(clip, w, h);
    let opacity = opacity.clamp(0.0, 1.0);
    let (iw, ih) = (image.width as f32, image.height as f32);

    for tri in mesh.indices.chunks_exact(3) {
        let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if idx.iter().any(|&i| i >= mesh.positions.len() || i >= mesh.uvs.len()) {
            log::trace!("mesh triangle {idx:?} references a missing vertex");
            continue;
        }
        let p = idx.map(|i| transform.map_point(mesh.positions[i]));
        let uv = idx.map(|i| mesh.uvs[i]);
        let area = edge(p[0], p[1], p[2]);
        if area.abs() <= f32::EPSILON {
            continue;
        }
        let Some(bounds) = Rect::from_points(p) else {
            continue;
        };
        let Some((x0, y0, x1, y1)) = device_bounds(bounds, &Mat2D::IDENTITY, w, h) else {
            continue;
        };

        for y in y0..y1 {
            for x in x0..x1 {
                if clip.as_ref().is_some_and(|m| !m.get(x, y)) {
                    continue;
                }
                let q = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let b0 = edge(p[1], p[2], q) / area;
                let b1 = edge(p[2], p[0], q) / area;
                let b2 = edge(p[0], p[1], q) / area;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }
                let t = uv[0] * b0 + uv[1] * b1 + uv[2] * b2;
                let color = sample_image(image, t.x * iw, t.y * ih, sampler).scaled(opacity);
                canvas.blend(x, y, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::PathCmd;
    use crate::paint::Gradient;

    fn triangle() -> Arc<PathGeometry> {
        let mut g = PathGeometry::new();
        g.push(PathCmd::MoveTo(Vec2::new(0.0, 0.0)));
        g.push(PathCmd::LineTo(Vec2::new(64.0, 0.0)));
        g.push(PathCmd::LineTo(Vec2::new(0.0, 64.0)));
        g.push(PathCmd::Close);
        Arc::new(g)
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Arc<PathGeometry> {
        let mut g = PathGeometry::new();
        g.push(PathCmd::MoveTo(Vec2::new(x, y)));
        g.push(PathCmd::LineTo(Vec2::new(x + w, y)));
        g.push(PathCmd::LineTo(Vec2::new(x + w, y + h)));
        g.push(PathCmd::LineTo(Vec2::new(x, y + h)));
        g.push(PathCmd::Close);
        Arc::new(g)
    }

    fn px(c: &Canvas, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * c.width() + x) * 4) as usize;
        let p = &c.pixels()[i..i + 4];
        [p[0], p[1], p[2], p[3]]
    }

    fn no_clip() -> Arc<[ClipPath]> {
        Arc::from(Vec::new())
    }

    #[test]
    fn gradient_fills_triangle_interior() {
        let gradient =
            Gradient::linear(Vec2::zero(), Vec2::new(64.0, 0.0), &[0xFF0000FF, 0xFF00FF00], &[0.0, 1.0])
                .unwrap();
        let paint = PaintDesc {
            shader: Some(Arc::new(gradient)),
            ..PaintDesc::default()
        };
        let mut canvas = Canvas::new(64, 64);
        render(
            &mut canvas,
            &[RasterOp::Path {
                geometry: triangle(),
                fill_rule: FillRule::NonZero,
                paint,
                transform: Mat2D::IDENTITY,
                clip: no_clip(),
            }],
        );

        let near_start = px(&canvas, 1, 1);
        assert_eq!(near_start[3], 255);
        assert!(near_start[2] > 240 && near_start[1] < 15);
        let mid = px(&canvas, 31, 10);
        assert!(mid[1] > 100 && mid[2] > 100);
        assert_eq!(px(&canvas, 60, 60), [0, 0, 0, 0]);
    }

    #[test]
    fn clip_restricts_coverage() {
        let paint = PaintDesc {
            color: 0xFFFF0000,
            ..PaintDesc::default()
        };
        let clip: Arc<[ClipPath]> = Arc::from(vec![ClipPath {
            geometry: rect(0.0, 0.0, 4.0, 4.0),
            fill_rule: FillRule::NonZero,
            transform: Mat2D::IDENTITY,
        }]);
        let mut canvas = Canvas::new(8, 8);
        render(
            &mut canvas,
            &[RasterOp::Path {
                geometry: rect(2.0, 2.0, 6.0, 6.0),
                fill_rule: FillRule::NonZero,
                paint,
                transform: Mat2D::IDENTITY,
                clip,
            }],
        );
        assert_eq!(px(&canvas, 3, 3), [255, 0, 0, 255]);
        assert_eq!(px(&canvas, 5, 5), [0, 0, 0, 0]);
        assert_eq!(px(&canvas, 1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn transform_moves_geometry() {
        let paint = PaintDesc {
            color: 0xFFFFFFFF,
            ..PaintDesc::default()
        };
        let mut canvas = Canvas::new(8, 8);
        render(
            &mut canvas,
            &[RasterOp::Path {
                geometry: rect(0.0, 0.0, 2.0, 2.0),
                fill_rule: FillRule::NonZero,
                paint,
                transform: Mat2D::translate(4.0, 4.0),
                clip: no_clip(),
            }],
        );
        assert_eq!(px(&canvas, 0, 0), [0, 0, 0, 0]);
        assert_eq!(px(&canvas, 5, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn image_and_mesh_sample_texels() {
        let image = Arc::new(
            ImageData::from_premul_rgba8(1, 1, vec![0, 255, 0, 255]).unwrap(),
        );
        let mut canvas = Canvas::new(8, 8);
        let ops = [
            RasterOp::Image {
                image: Arc::clone(&image),
                sampler: ImageSampler::default(),
                opacity: 1.0,
                transform: Mat2D::scale(2.0, 2.0),
                clip: no_clip(),
            },
            RasterOp::Mesh {
                image,
                sampler: ImageSampler::default(),
                positions: vec![Vec2::new(4.0, 4.0), Vec2::new(8.0, 4.0), Vec2::new(4.0, 8.0)],
                uvs: vec![Vec2::zero(), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
                indices: vec![0, 1, 2],
                opacity: 0.5,
                transform: Mat2D::IDENTITY,
                clip: no_clip(),
            },
        ];
        render(&mut canvas, &ops);
        assert_eq!(px(&canvas, 1, 1), [0, 255, 0, 255]);
        assert_eq!(px(&canvas, 2, 2), [0, 0, 0, 0]);
        assert_eq!(px(&canvas, 4, 4), [0, 128, 0, 128]);
        assert_eq!(px(&canvas, 7, 7), [0, 0, 0, 0]);
    }

    #[test]
    fn buffer_bytes_decode_as_native_pods() {
        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(decode_vec2(&bytes, 1).unwrap(), vec![Vec2::new(1.5, -2.0)]);
        assert!(decode_vec2(&bytes, 2).is_err());
        let idx: Vec<u8> = [3u16, 257].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(decode_u16(&idx, 2).unwrap(), vec![3, 257]);
    }
}
