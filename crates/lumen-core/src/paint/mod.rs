//! Paint model: colors, gradients and stroke/blend parameters.
//!
//! Colors are stored premultiplied. Geometry types remain in `coords`.

pub mod color;
pub mod gradient;
mod style;

pub use color::Color;
pub use gradient::{ColorStop, Gradient, GradientKind};
pub use style::{BlendMode, FillRule, PaintDesc, PaintStyle, StrokeCap, StrokeJoin};
