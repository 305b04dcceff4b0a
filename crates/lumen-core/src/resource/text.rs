//! Text layout into glyph coverage spans.

use fontdue::layout::{
    CoordinateSystem, GlyphPosition, HorizontalAlign, Layout, LayoutSettings,
    TextStyle as GlyphStyle,
};

use crate::coords::{Rect, Vec2};
use crate::error::{Error, Result};

/// Coverage at or above this value is inside a glyph.
const COVERAGE_THRESHOLD: u8 = 128;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TextWrap {
    #[default]
    Wrap,
    NoWrap,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

/// Layout parameters for [`Context::create_text_path`](crate::Context::create_text_path).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextStyle {
    /// Pixel size; must be positive.
    pub size: f32,
    /// Line height as a multiple of the font's line advance.
    pub line_height: f32,
    /// Extra advance added after every glyph.
    pub letter_spacing: f32,
    /// Wrap width. Ignored with [`TextWrap::NoWrap`].
    pub max_width: Option<f32>,
    /// Extra space between paragraphs separated by `'\n'`.
    pub paragraph_spacing: f32,
    pub align: TextAlign,
    pub wrap: TextWrap,
    pub direction: TextDirection,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 16.0,
            line_height: 1.0,
            letter_spacing: 0.0,
            max_width: None,
            paragraph_spacing: 0.0,
            align: TextAlign::Left,
            wrap: TextWrap::Wrap,
            direction: TextDirection::Ltr,
        }
    }
}

impl TextStyle {
    pub fn sized(size: f32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(Error::invalid_parameter(format!(
                "text size must be positive, got {}",
                self.size
            )));
        }
        if !(self.line_height.is_finite() && self.line_height > 0.0) {
            return Err(Error::invalid_parameter("line height must be positive"));
        }
        if !self.letter_spacing.is_finite()
            || !(self.paragraph_spacing.is_finite() && self.paragraph_spacing >= 0.0)
        {
            return Err(Error::invalid_parameter("text spacing must be finite"));
        }
        if self.max_width.is_some_and(|w| !(w.is_finite() && w > 0.0)) {
            return Err(Error::invalid_parameter("max width must be positive"));
        }
        Ok(())
    }

    fn settings(&self, y: f32) -> LayoutSettings {
        let max_width = match self.wrap {
            TextWrap::Wrap => self.max_width,
            TextWrap::NoWrap => None,
        };
        LayoutSettings {
            y,
            max_width,
            horizontal_align: match self.align {
                TextAlign::Left => HorizontalAlign::Left,
                TextAlign::Center => HorizontalAlign::Center,
                TextAlign::Right => HorizontalAlign::Right,
            },
            line_height: self.line_height,
            ..LayoutSettings::default()
        }
    }
}

/// A glyph placed on the page: bitmap origin and the raster key.
struct Placed {
    origin: Vec2,
    glyph: GlyphPosition,
}

/// Lays out `text` and returns the covered pixel spans of every glyph.
pub(crate) fn glyph_rects(font: &fontdue::Font, text: &str, style: &TextStyle) -> Result<Vec<Rect>> {
    style.validate()?;
    let blank_line = font
        .horizontal_line_metrics(style.size)
        .map_or(style.size, |m| m.new_line_size)
        * style.line_height;

    let mut layout: Layout = Layout::new(CoordinateSystem::PositiveYDown);
    let mut rects = Vec::new();
    let mut pen_y = 0.0f32;

    for paragraph in text.split('\n') {
        layout.reset(&style.settings(pen_y));
        layout.append(&[font], &GlyphStyle::new(paragraph, style.size, 0));

        for line in layout.lines().into_iter().flatten() {
            let Some(glyphs) = layout.glyphs().get(line.glyph_start..=line.glyph_end) else {
                continue;
            };
            for placed in place_line(glyphs, style) {
                if placed.glyph.width == 0 || placed.glyph.height == 0 {
                    continue;
                }
                let (metrics, coverage) = font.rasterize_config(placed.glyph.key);
                coverage_spans(&coverage, metrics.width, placed.origin, &mut rects);
            }
        }
        pen_y += layout.height().max(blank_line) + style.paragraph_spacing;
    }
    Ok(rects)
}

fn place_line(glyphs: &[GlyphPosition], style: &TextStyle) -> Vec<Placed> {
    let mut placed: Vec<Placed> = glyphs
        .iter()
        .enumerate()
        .map(|(i, g)| Placed {
            origin: Vec2::new(g.x + style.letter_spacing * i as f32, g.y),
            glyph: *g,
        })
        .collect();

    if style.direction == TextDirection::Rtl {
        let left = placed
            .iter()
            .map(|p| p.origin.x)
            .fold(f32::INFINITY, f32::min);
        let right = placed
            .iter()
            .map(|p| p.origin.x + p.glyph.width as f32)
            .fold(f32::NEG_INFINITY, f32::max);
        for p in &mut placed {
            p.origin.x = left + right - (p.origin.x + p.glyph.width as f32);
        }
    }
    placed
}

/// Appends one rectangle per horizontal run of covered pixels.
fn coverage_spans(coverage: &[u8], width: usize, origin: Vec2, out: &mut Vec<Rect>) {
    if width == 0 {
        return;
    }
    for (row, pixels) in coverage.chunks_exact(width).enumerate() {
        let mut x = 0;
        while x < width {
            if pixels[x] < COVERAGE_THRESHOLD {
                x += 1;
                continue;
            }
            let start = x;
            while x < width && pixels[x] >= COVERAGE_THRESHOLD {
                x += 1;
            }
            out.push(Rect::new(
                origin.x + start as f32,
                origin.y + row as f32,
                (x - start) as f32,
                1.0,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;

    #[test]
    fn spans_merge_runs_per_row() {
        #[rustfmt::skip]
        let coverage = [
            0, 200, 255, 10,
            255, 0, 130, 255,
        ];
        let mut out = Vec::new();
        coverage_spans(&coverage, 4, Vec2::new(10.0, 20.0), &mut out);
        assert_eq!(
            out,
            vec![
                Rect::new(11.0, 20.0, 2.0, 1.0),
                Rect::new(10.0, 21.0, 1.0, 1.0),
                Rect::new(12.0, 21.0, 2.0, 1.0),
            ]
        );
    }

    #[test]
    fn style_validation() {
        assert!(TextStyle::default().validate().is_ok());
        for bad in [
            TextStyle::sized(0.0),
            TextStyle::sized(-3.0),
            TextStyle { line_height: 0.0, ..TextStyle::default() },
            TextStyle { max_width: Some(0.0), ..TextStyle::default() },
            TextStyle { paragraph_spacing: -1.0, ..TextStyle::default() },
        ] {
            assert_eq!(bad.validate().unwrap_err().status(), Status::InvalidParameter);
        }
    }

    #[test]
    fn no_wrap_drops_max_width() {
        let style = TextStyle {
            max_width: Some(50.0),
            wrap: TextWrap::NoWrap,
            align: TextAlign::Center,
            ..TextStyle::default()
        };
        let settings = style.settings(4.0);
        assert_eq!(settings.max_width, None);
        assert_eq!(settings.y, 4.0);
        assert!(matches!(settings.horizontal_align, HorizontalAlign::Center));
    }
}
