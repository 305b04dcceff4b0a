use core::ops::Mul;

use super::Vec2;

/// 2D affine transform.
///
/// Maps a point as
/// `x' = xx * x + yx * y + tx`, `y' = xy * x + yy * y + ty`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat2D {
    pub xx: f32,
    pub xy: f32,
    pub yx: f32,
    pub yy: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Mat2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat2D {
    pub const IDENTITY: Mat2D = Mat2D::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    #[inline]
    pub const fn new(xx: f32, xy: f32, yx: f32, yy: f32, tx: f32, ty: f32) -> Self {
        Self { xx, xy, yx, yy, tx, ty }
    }

    #[inline]
    pub const fn translate(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    #[inline]
    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `radians` (clockwise on screen, since +Y points down).
    #[inline]
    pub fn rotate(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Self::new(c, s, -s, c, 0.0, 0.0)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        [self.xx, self.xy, self.yx, self.yy, self.tx, self.ty]
            .iter()
            .all(|v| v.is_finite())
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.xx * self.yy - self.xy * self.yx
    }

    #[inline]
    pub fn map_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.xx * p.x + self.yx * p.y + self.tx,
            self.xy * p.x + self.yy * p.y + self.ty,
        )
    }

    /// Maps a direction (ignores translation).
    #[inline]
    pub fn map_vector(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.xx * v.x + self.yx * v.y, self.xy * v.x + self.yy * v.y)
    }

    pub fn invert(&self) -> Option<Mat2D> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Mat2D::new(
            self.yy * inv,
            -self.xy * inv,
            -self.yx * inv,
            self.xx * inv,
            (self.yx * self.ty - self.yy * self.tx) * inv,
            (self.xy * self.tx - self.xx * self.ty) * inv,
        ))
    }
}

/// `a * b` applies `b` first, then `a`.
impl Mul for Mat2D {
    type Output = Mat2D;

    fn mul(self, b: Mat2D) -> Mat2D {
        let a = self;
        Mat2D::new(
            a.xx * b.xx + a.yx * b.xy,
            a.xy * b.xx + a.yy * b.xy,
            a.xx * b.yx + a.yx * b.yy,
            a.xy * b.yx + a.yy * b.yy,
            a.xx * b.tx + a.yx * b.ty + a.tx,
            a.xy * b.tx + a.yy * b.ty + a.ty,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn product_applies_right_operand_first() {
        let t = Mat2D::translate(10.0, 0.0);
        let s = Mat2D::scale(2.0, 2.0);
        let p = Vec2::new(1.0, 1.0);
        assert_eq!((t * s).map_point(p), Vec2::new(12.0, 2.0));
        assert_eq!((s * t).map_point(p), Vec2::new(22.0, 2.0));
    }

    #[test]
    fn invert_round_trips() {
        let m = Mat2D::translate(3.0, -7.0) * Mat2D::rotate(0.7) * Mat2D::scale(2.0, 0.5);
        let inv = m.invert().unwrap();
        let p = Vec2::new(4.5, -2.25);
        assert!(close(inv.map_point(m.map_point(p)), p));
        assert!(close((m * inv).map_point(p), p));
    }

    #[test]
    fn singular_has_no_inverse() {
        assert!(Mat2D::scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn vectors_ignore_translation() {
        let m = Mat2D::translate(5.0, 5.0);
        assert_eq!(m.map_vector(Vec2::new(1.0, 2.0)), Vec2::new(1.0, 2.0));
    }
}
