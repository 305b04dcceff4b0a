//! Geometry shared by paths, transforms and the rasterizer.
//!
//! Coordinates are in pixels of the render target:
//! - Origin top-left
//! - +X right, +Y down

mod mat2d;
mod path;
mod rect;
mod vec2;

pub use mat2d::Mat2D;
pub use path::{PathCmd, PathGeometry};
pub use rect::Rect;
pub use vec2::Vec2;
