use std::fmt;
use std::sync::Arc;

use super::text::glyph_rects;
use super::{ContextLink, Font, TextStyle};
use crate::context::Context;
use crate::coords::{Mat2D, PathCmd, PathGeometry, Rect, Vec2};
use crate::error::{Error, Recorded, Result};
use crate::handle::{ResourceId, ResourceKind};
use crate::paint::FillRule;

/// Editable vector path.
///
/// Geometry is copy-on-write: draws recorded earlier keep the snapshot they
/// were recorded with, whatever edits follow.
pub struct Path {
    link: ContextLink,
    geometry: Arc<PathGeometry>,
    fill_rule: FillRule,
    start: Vec2,
    current: Vec2,
    open: bool,
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("id", &self.link.id().get())
            .field("fill_rule", &self.fill_rule)
            .field("verbs", &self.geometry.cmds().len())
            .finish()
    }
}

fn finite(points: &[Vec2]) -> Result<()> {
    if points.iter().all(|p| p.is_finite()) {
        Ok(())
    } else {
        Err(Error::invalid_parameter("path coordinates must be finite"))
    }
}

impl Path {
    pub(crate) fn create(ctx: &Context, fill_rule: FillRule) -> Result<Path> {
        let link = ContextLink::create(
            ctx.inner(),
            ResourceKind::Path,
            "path",
            |b, ctx| b.create_path(ctx),
            |b, raw| b.release_path(raw),
        )?;
        Ok(Path {
            link,
            geometry: Arc::new(PathGeometry::new()),
            fill_rule,
            start: Vec2::zero(),
            current: Vec2::zero(),
            open: false,
        })
    }

    pub(crate) fn from_text(
        ctx: &Context,
        font: &Font,
        text: &str,
        style: &TextStyle,
        fill_rule: FillRule,
    ) -> Result<Path> {
        font.link().ensure_context(ctx.inner(), "font")?;
        let rects = glyph_rects(font.fontdue(), text, style)?;
        let mut path = Path::create(ctx, fill_rule)?;
        let geometry = Arc::make_mut(&mut path.geometry);
        for r in &rects {
            let (lo, hi) = (r.min(), r.max());
            geometry.push(PathCmd::MoveTo(lo));
            geometry.push(PathCmd::LineTo(Vec2::new(hi.x, lo.y)));
            geometry.push(PathCmd::LineTo(hi));
            geometry.push(PathCmd::LineTo(Vec2::new(lo.x, hi.y)));
            geometry.push(PathCmd::Close);
        }
        log::debug!(
            "text path #{} built from {} coverage spans",
            path.link.id().get(),
            rects.len()
        );
        Ok(path)
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.link.id()
    }

    #[inline]
    pub(crate) fn link(&self) -> &ContextLink {
        &self.link
    }

    /// Geometry as of now; later edits do not affect the returned snapshot.
    pub(crate) fn snapshot(&self) -> Arc<PathGeometry> {
        Arc::clone(&self.geometry)
    }

    #[inline]
    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    pub fn set_fill_rule(&mut self, fill_rule: FillRule) {
        self.fill_rule = fill_rule;
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.geometry.bounds()
    }

    pub fn cmds(&self) -> &[PathCmd] {
        self.geometry.cmds()
    }

    fn push(&mut self, cmd: PathCmd) {
        Arc::make_mut(&mut self.geometry).push(cmd);
    }

    fn ensure_open(&mut self) {
        if !self.open {
            let at = self.current;
            self.push(PathCmd::MoveTo(at));
            self.start = at;
            self.open = true;
        }
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> Result<()> {
        let p = Vec2::new(x, y);
        finite(&[p]).recorded()?;
        self.push(PathCmd::MoveTo(p));
        self.start = p;
        self.current = p;
        self.open = true;
        Ok(())
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> Result<()> {
        let p = Vec2::new(x, y);
        finite(&[p]).recorded()?;
        self.ensure_open();
        self.push(PathCmd::LineTo(p));
        self.current = p;
        Ok(())
    }

    /// Quadratic segment, stored as the equivalent cubic.
    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) -> Result<()> {
        let (c, p) = (Vec2::new(cx, cy), Vec2::new(x, y));
        finite(&[c, p]).recorded()?;
        self.ensure_open();
        let p0 = self.current;
        let c1 = p0 + (c - p0) * (2.0 / 3.0);
        let c2 = p + (c - p) * (2.0 / 3.0);
        self.push(PathCmd::CubicTo(c1, c2, p));
        self.current = p;
        Ok(())
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) -> Result<()> {
        let (c1, c2, p) = (Vec2::new(c1x, c1y), Vec2::new(c2x, c2y), Vec2::new(x, y));
        finite(&[c1, c2, p]).recorded()?;
        self.ensure_open();
        self.push(PathCmd::CubicTo(c1, c2, p));
        self.current = p;
        Ok(())
    }

    pub fn close(&mut self) {
        if self.open {
            self.push(PathCmd::Close);
            self.current = self.start;
            self.open = false;
        }
    }

    /// Clears all geometry, keeping the fill rule.
    pub fn rewind(&mut self) {
        match Arc::get_mut(&mut self.geometry) {
            Some(g) => g.clear(),
            None => self.geometry = Arc::new(PathGeometry::new()),
        }
        self.start = Vec2::zero();
        self.current = Vec2::zero();
        self.open = false;
    }

    /// Appends the geometry of `other`, optionally transformed.
    pub fn add_path(&mut self, other: &Path, transform: Option<&Mat2D>) -> Result<()> {
        self.add_path_inner(other, transform).recorded()
    }

    fn add_path_inner(&mut self, other: &Path, transform: Option<&Mat2D>) -> Result<()> {
        other.link.ensure_context(self.link.ctx(), "path")?;
        if transform.is_some_and(|m| !m.is_finite()) {
            return Err(Error::invalid_parameter("path transform must be finite"));
        }
        let snapshot = other.snapshot();
        if snapshot.is_empty() {
            return Ok(());
        }
        Arc::make_mut(&mut self.geometry).extend_from(&snapshot, transform);

        let last = snapshot.cmds().iter().rev().find_map(|cmd| match *cmd {
            PathCmd::MoveTo(p) | PathCmd::LineTo(p) | PathCmd::CubicTo(_, _, p) => Some(p),
            PathCmd::Close => None,
        });
        if let Some(p) = last {
            self.current = transform.map_or(p, |m| m.map_point(p));
        }
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceDesc};
    use crate::error::Status;

    fn context() -> Context {
        Device::create(DeviceDesc::default())
            .unwrap()
            .create_context(16, 16)
            .unwrap()
    }

    #[test]
    fn non_finite_points_are_rejected() {
        let ctx = context();
        let mut path = ctx.create_path(FillRule::NonZero).unwrap();
        assert_eq!(path.move_to(f32::NAN, 0.0).unwrap_err().status(), Status::InvalidParameter);
        assert_eq!(
            path.cubic_to(0.0, 0.0, f32::INFINITY, 0.0, 1.0, 1.0).unwrap_err().status(),
            Status::InvalidParameter
        );
        assert!(path.is_empty());
    }

    #[test]
    fn line_without_move_starts_at_current_point() {
        let ctx = context();
        let mut path = ctx.create_path(FillRule::NonZero).unwrap();
        path.line_to(4.0, 0.0).unwrap();
        assert_eq!(path.cmds()[0], PathCmd::MoveTo(Vec2::zero()));
        path.close();
        path.line_to(0.0, 4.0).unwrap();
        assert_eq!(path.cmds()[3], PathCmd::MoveTo(Vec2::zero()));
    }

    #[test]
    fn quad_becomes_cubic() {
        let ctx = context();
        let mut path = ctx.create_path(FillRule::NonZero).unwrap();
        path.move_to(0.0, 0.0).unwrap();
        path.quad_to(3.0, 3.0, 6.0, 0.0).unwrap();
        assert_eq!(
            path.cmds()[1],
            PathCmd::CubicTo(Vec2::new(2.0, 2.0), Vec2::new(4.0, 2.0), Vec2::new(6.0, 0.0))
        );
    }

    #[test]
    fn snapshots_survive_edits() {
        let ctx = context();
        let mut path = ctx.create_path(FillRule::EvenOdd).unwrap();
        path.move_to(1.0, 1.0).unwrap();
        let snap = path.snapshot();
        path.line_to(5.0, 5.0).unwrap();
        path.rewind();
        assert_eq!(snap.cmds().len(), 1);
        assert!(path.is_empty());
        assert_eq!(path.fill_rule(), FillRule::EvenOdd);
    }

    #[test]
    fn add_path_transforms_and_checks_context() {
        let ctx = context();
        let mut a = ctx.create_path(FillRule::NonZero).unwrap();
        let mut b = ctx.create_path(FillRule::NonZero).unwrap();
        b.move_to(0.0, 0.0).unwrap();
        b.line_to(2.0, 0.0).unwrap();
        a.add_path(&b, Some(&Mat2D::translate(1.0, 1.0))).unwrap();
        assert_eq!(a.bounds().unwrap(), Rect::new(1.0, 1.0, 2.0, 0.0));

        let other = context();
        let foreign = other.create_path(FillRule::NonZero).unwrap();
        assert_eq!(a.add_path(&foreign, None).unwrap_err().status(), Status::InvalidHandle);
    }
}
