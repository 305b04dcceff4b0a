use crate::coords::Vec2;
use crate::error::{Error, Result};

use super::Color;

/// A single gradient stop.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ColorStop {
    pub t: f32,
    pub color: Color,
}

impl ColorStop {
    #[inline]
    pub const fn new(t: f32, color: Color) -> Self {
        Self { t, color }
    }
}

/// Gradient geometry, in the same coordinate space as the path it fills.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum GradientKind {
    Linear { start: Vec2, end: Vec2 },
    Radial { center: Vec2, radius: f32 },
}

/// Gradient definition. Stops keep the order they were given in.
///
/// Outside `[0, 1]` the gradient pads with the edge stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub kind: GradientKind,
    pub stops: Vec<ColorStop>,
}

impl Gradient {
    /// Builds a linear gradient from packed `0xAARRGGBB` colors and stop offsets.
    pub fn linear(start: Vec2, end: Vec2, colors: &[u32], stops: &[f32]) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(Error::invalid_parameter("gradient endpoints must be finite"));
        }
        Self::build(GradientKind::Linear { start, end }, colors, stops)
    }

    /// Builds a radial gradient from packed `0xAARRGGBB` colors and stop offsets.
    pub fn radial(center: Vec2, radius: f32, colors: &[u32], stops: &[f32]) -> Result<Self> {
        if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
            return Err(Error::invalid_parameter(
                "radial gradient needs a finite center and a non-negative radius",
            ));
        }
        Self::build(GradientKind::Radial { center, radius }, colors, stops)
    }

    fn build(kind: GradientKind, colors: &[u32], stops: &[f32]) -> Result<Self> {
        if colors.is_empty() || stops.is_empty() {
            return Err(Error::invalid_parameter("gradient requires colors and stops"));
        }
        if colors.len() != stops.len() {
            return Err(Error::invalid_parameter(format!(
                "gradient has {} colors but {} stops",
                colors.len(),
                stops.len()
            )));
        }
        if stops.iter().any(|t| !t.is_finite()) {
            return Err(Error::invalid_parameter("gradient stops must be finite"));
        }

        let stops = colors
            .iter()
            .zip(stops)
            .map(|(&argb, &t)| ColorStop::new(t, Color::from_argb(argb)))
            .collect();
        Ok(Self { kind, stops })
    }

    /// Gradient parameter of a point before stop lookup.
    pub fn parameter(&self, p: Vec2) -> f32 {
        match self.kind {
            GradientKind::Linear { start, end } => {
                let axis = end - start;
                let len2 = axis.dot(axis);
                if len2 <= f32::EPSILON {
                    0.0
                } else {
                    (p - start).dot(axis) / len2
                }
            }
            GradientKind::Radial { center, radius } => {
                if radius <= f32::EPSILON {
                    1.0
                } else {
                    p.distance(center) / radius
                }
            }
        }
    }

    /// Color at parameter `t`, padding with the edge stops.
    pub fn color_at(&self, t: f32) -> Color {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Color::transparent(),
        };
        if t <= first.t {
            return first.color;
        }
        if t >= last.t {
            return last.color;
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t >= a.t && t <= b.t {
                let span = b.t - a.t;
                if span <= f32::EPSILON {
                    return b.color;
                }
                return a.color.lerp(b.color, (t - a.t) / span);
            }
        }
        last.color
    }

    #[inline]
    pub fn sample(&self, p: Vec2) -> Color {
        self.color_at(self.parameter(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE: u32 = 0xFF0000FF;
    const GREEN: u32 = 0xFF00FF00;

    fn blue_to_green() -> Gradient {
        Gradient::linear(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), &[BLUE, GREEN], &[0.0, 1.0])
            .unwrap()
    }

    #[test]
    fn linear_endpoints_and_midpoint() {
        let g = blue_to_green();
        assert_eq!(g.sample(Vec2::new(0.0, 7.0)).to_premul_rgba8(), [0, 0, 255, 255]);
        assert_eq!(g.sample(Vec2::new(100.0, 7.0)).to_premul_rgba8(), [0, 255, 0, 255]);
        let mid = g.sample(Vec2::new(50.0, 0.0)).to_premul_rgba8();
        assert_eq!(mid, [0, 128, 128, 255]);
    }

    #[test]
    fn pads_outside_range() {
        let g = blue_to_green();
        assert_eq!(g.sample(Vec2::new(-40.0, 0.0)), Color::from_argb(BLUE));
        assert_eq!(g.sample(Vec2::new(400.0, 0.0)), Color::from_argb(GREEN));
    }

    #[test]
    fn radial_distance_parameter() {
        let g = Gradient::radial(Vec2::new(10.0, 10.0), 10.0, &[BLUE, GREEN], &[0.0, 1.0]).unwrap();
        assert_eq!(g.parameter(Vec2::new(10.0, 10.0)), 0.0);
        assert!((g.parameter(Vec2::new(15.0, 10.0)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stop_order_is_preserved() {
        let g = Gradient::linear(
            Vec2::zero(),
            Vec2::new(1.0, 0.0),
            &[GREEN, BLUE, GREEN],
            &[0.0, 0.8, 0.3],
        )
        .unwrap();
        let ts: Vec<f32> = g.stops.iter().map(|s| s.t).collect();
        assert_eq!(ts, vec![0.0, 0.8, 0.3]);
    }

    #[test]
    fn rejects_malformed_input() {
        let p = Vec2::zero();
        assert!(Gradient::linear(p, p, &[], &[]).is_err());
        assert!(Gradient::linear(p, p, &[BLUE], &[0.0, 1.0]).is_err());
        assert!(Gradient::linear(p, p, &[BLUE], &[f32::NAN]).is_err());
        assert!(Gradient::radial(p, -1.0, &[BLUE], &[0.0]).is_err());
    }
}
