use std::sync::Arc;

use super::{Color, Gradient};

/// Path fill rule.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
    /// Only clockwise (positive winding) regions. Needs `FeatureFlags::CLOCKWISE_FILL`.
    Clockwise,
}

impl FillRule {
    #[inline]
    pub fn is_inside(self, winding: i32) -> bool {
        match self {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => winding % 2 != 0,
            FillRule::Clockwise => winding > 0,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum PaintStyle {
    #[default]
    Fill,
    Stroke,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum StrokeCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum StrokeJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// Blend mode. Discriminants match the native renderer's values.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum BlendMode {
    #[default]
    SrcOver = 3,
    Screen = 14,
    Overlay = 15,
    Darken = 16,
    Lighten = 17,
    ColorDodge = 18,
    ColorBurn = 19,
    HardLight = 20,
    SoftLight = 21,
    Difference = 22,
    Exclusion = 23,
    Multiply = 24,
    Hue = 25,
    Saturation = 26,
    Color = 27,
    Luminosity = 28,
}

impl BlendMode {
    /// Anything other than source-over needs `FeatureFlags::ADVANCED_BLEND`.
    #[inline]
    pub fn is_advanced(self) -> bool {
        self != BlendMode::SrcOver
    }
}

/// Snapshot of paint state as recorded into a draw.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintDesc {
    pub style: PaintStyle,
    /// Packed straight-alpha `0xAARRGGBB`.
    pub color: u32,
    pub thickness: f32,
    pub join: StrokeJoin,
    pub cap: StrokeCap,
    pub feather: f32,
    pub blend_mode: BlendMode,
    pub shader: Option<Arc<Gradient>>,
}

impl Default for PaintDesc {
    fn default() -> Self {
        Self {
            style: PaintStyle::Fill,
            color: 0xFF00_0000,
            thickness: 1.0,
            join: StrokeJoin::Miter,
            cap: StrokeCap::Butt,
            feather: 0.0,
            blend_mode: BlendMode::SrcOver,
            shader: None,
        }
    }
}

impl PaintDesc {
    #[inline]
    pub fn solid_color(&self) -> Color {
        Color::from_argb(self.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rules_classify_winding() {
        assert!(FillRule::NonZero.is_inside(-2));
        assert!(!FillRule::EvenOdd.is_inside(-2));
        assert!(FillRule::EvenOdd.is_inside(-1));
        assert!(!FillRule::Clockwise.is_inside(-1));
        assert!(FillRule::Clockwise.is_inside(1));
    }

    #[test]
    fn blend_discriminants() {
        assert_eq!(BlendMode::SrcOver as u8, 3);
        assert_eq!(BlendMode::Luminosity as u8, 28);
        assert!(!BlendMode::SrcOver.is_advanced());
        assert!(BlendMode::Multiply.is_advanced());
    }
}
