use super::{Mat2D, Rect, Vec2};

/// One path verb with its points.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PathCmd {
    MoveTo(Vec2),
    LineTo(Vec2),
    CubicTo(Vec2, Vec2, Vec2),
    Close,
}

impl PathCmd {
    fn map(self, m: &Mat2D) -> PathCmd {
        match self {
            PathCmd::MoveTo(p) => PathCmd::MoveTo(m.map_point(p)),
            PathCmd::LineTo(p) => PathCmd::LineTo(m.map_point(p)),
            PathCmd::CubicTo(a, b, c) => {
                PathCmd::CubicTo(m.map_point(a), m.map_point(b), m.map_point(c))
            }
            PathCmd::Close => PathCmd::Close,
        }
    }
}

/// Immutable-once-shared path geometry: subpaths of move/line/cubic/close.
///
/// Recorded draws hold geometry behind an `Arc`, so editing a path after a draw
/// never changes what that draw renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathGeometry {
    cmds: Vec<PathCmd>,
}

impl PathGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cmds(&self) -> &[PathCmd] {
        &self.cmds
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    #[inline]
    pub fn push(&mut self, cmd: PathCmd) {
        self.cmds.push(cmd);
    }

    /// Appends `other`, optionally transformed.
    pub fn extend_from(&mut self, other: &PathGeometry, transform: Option<&Mat2D>) {
        match transform {
            Some(m) => self.cmds.extend(other.cmds.iter().map(|c| c.map(m))),
            None => self.cmds.extend_from_slice(&other.cmds),
        }
    }

    pub fn transformed(&self, m: &Mat2D) -> PathGeometry {
        PathGeometry {
            cmds: self.cmds.iter().map(|c| c.map(m)).collect(),
        }
    }

    /// Bounds of all points including cubic control points.
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = Vec::with_capacity(self.cmds.len());
        for cmd in &self.cmds {
            match *cmd {
                PathCmd::MoveTo(p) | PathCmd::LineTo(p) => points.push(p),
                PathCmd::CubicTo(a, b, c) => points.extend([a, b, c]),
                PathCmd::Close => {}
            }
        }
        Rect::from_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> PathGeometry {
        let mut g = PathGeometry::new();
        g.push(PathCmd::MoveTo(Vec2::new(0.0, 0.0)));
        g.push(PathCmd::LineTo(Vec2::new(10.0, 0.0)));
        g.push(PathCmd::LineTo(Vec2::new(0.0, 5.0)));
        g.push(PathCmd::Close);
        g
    }

    #[test]
    fn bounds_include_control_points() {
        let mut g = triangle();
        g.push(PathCmd::CubicTo(
            Vec2::new(20.0, -4.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 2.0),
        ));
        assert_eq!(g.bounds().unwrap(), Rect::new(0.0, -4.0, 20.0, 9.0));
    }

    #[test]
    fn extend_applies_transform() {
        let mut g = PathGeometry::new();
        g.extend_from(&triangle(), Some(&Mat2D::translate(1.0, 1.0)));
        assert_eq!(g.cmds()[1], PathCmd::LineTo(Vec2::new(11.0, 1.0)));
        assert_eq!(g.cmds().len(), 4);
    }
}
