use std::f32::consts::TAU;

use super::flatten::Contour;
use crate::coords::Vec2;
use crate::paint::{StrokeCap, StrokeJoin};

const MITER_LIMIT: f32 = 4.0;

#[derive(Debug, Copy, Clone)]
pub(crate) struct StrokeStyle {
    pub half_width: f32,
    pub cap: StrokeCap,
    pub join: StrokeJoin,
}

/// Expands polylines into positively oriented polygons whose non-zero union is the stroke.
pub(crate) fn stroke_polygons(contours: &[Contour], style: &StrokeStyle) -> Vec<Vec<Vec2>> {
    let mut out = Vec::new();
    if style.half_width <= 0.0 {
        return out;
    }
    for contour in contours {
        stroke_contour(contour, style, &mut out);
    }
    for poly in &mut out {
        if signed_area(poly) < 0.0 {
            poly.reverse();
        }
    }
    out
}

fn stroke_contour(contour: &Contour, style: &StrokeStyle, out: &mut Vec<Vec<Vec2>>) {
    let hw = style.half_width;
    let mut pts: Vec<Vec2> = Vec::with_capacity(contour.points.len());
    for &p in &contour.points {
        if pts.last().is_none_or(|last: &Vec2| last.distance(p) > 1e-5) {
            pts.push(p);
        }
    }
    if contour.closed && pts.len() > 2 && pts[0].distance(pts[pts.len() - 1]) <= 1e-5 {
        pts.pop();
    }

    let Some(&first) = pts.first() else {
        return;
    };
    if pts.len() == 1 {
        match style.cap {
            StrokeCap::Round => out.push(circle(first, hw)),
            StrokeCap::Square => out.push(vec![
                first + Vec2::new(-hw, -hw),
                first + Vec2::new(hw, -hw),
                first + Vec2::new(hw, hw),
                first + Vec2::new(-hw, hw),
            ]),
            StrokeCap::Butt => {}
        }
        return;
    }

    let closed = contour.closed && pts.len() > 2;
    let n = pts.len();
    let seg_count = if closed { n } else { n - 1 };
    let dirs: Vec<Vec2> = (0..seg_count)
        .map(|i| (pts[(i + 1) % n] - pts[i]).normalize().unwrap_or(Vec2::new(1.0, 0.0)))
        .collect();

    for (i, d) in dirs.iter().enumerate() {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        let off = d.perp() * hw;
        out.push(vec![a + off, b + off, b - off, a - off]);
    }

    let joins: Vec<usize> = if closed { (0..n).collect() } else { (1..n - 1).collect() };
    for i in joins {
        let prev = dirs[(i + seg_count - 1) % seg_count];
        let next = dirs[i % seg_count];
        if let Some(poly) = join(pts[i], prev, next, hw, style.join) {
            out.push(poly);
        }
    }

    if !closed {
        let last = pts[n - 1];
        cap(first, -dirs[0], hw, style.cap, out);
        cap(last, dirs[seg_count - 1], hw, style.cap, out);
    }
}

fn join(at: Vec2, d1: Vec2, d2: Vec2, hw: f32, kind: StrokeJoin) -> Option<Vec<Vec2>> {
    let turn = d1.x * d2.y - d1.y * d2.x;
    if turn.abs() < 1e-6 && d1.dot(d2) > 0.0 {
        return None;
    }
    if kind == StrokeJoin::Round {
        return Some(circle(at, hw));
    }

    // Outer side of the turn.
    let side = if turn > 0.0 { -1.0 } else { 1.0 };
    let n1 = d1.perp() * side;
    let n2 = d2.perp() * side;
    let bevel = vec![at, at + n1 * hw, at + n2 * hw];

    if kind == StrokeJoin::Bevel {
        return Some(bevel);
    }
    let Some(mid) = (n1 + n2).normalize() else {
        return Some(bevel);
    };
    let cos_half = mid.dot(n1);
    if cos_half <= 1.0 / MITER_LIMIT {
        return Some(bevel);
    }
    Some(vec![at, at + n1 * hw, at + mid * (hw / cos_half), at + n2 * hw])
}

fn cap(at: Vec2, outward: Vec2, hw: f32, kind: StrokeCap, out: &mut Vec<Vec<Vec2>>) {
    match kind {
        StrokeCap::Butt => {}
        StrokeCap::Round => out.push(circle(at, hw)),
        StrokeCap::Square => {
            let off = outward.perp() * hw;
            let ext = outward * hw;
            out.push(vec![at + off, at + off + ext, at - off + ext, at - off]);
        }
    }
}

fn circle(center: Vec2, radius: f32) -> Vec<Vec2> {
    let segments = (radius * TAU / 2.0).ceil().clamp(8.0, 64.0) as u32;
    (0..segments)
        .map(|i| {
            let (s, c) = (i as f32 / segments as f32 * TAU).sin_cos();
            center + Vec2::new(c, s) * radius
        })
        .collect()
}

fn signed_area(poly: &[Vec2]) -> f32 {
    let n = poly.len();
    (0..n)
        .map(|i| {
            let (a, b) = (poly[i], poly[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f32>()
        * 0.5
}
