use crate::coords::{Mat2D, PathCmd, PathGeometry, Vec2};

/// Polyline approximation of one subpath.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Contour {
    pub points: Vec<Vec2>,
    pub closed: bool,
}

const MAX_CUBIC_SEGMENTS: f32 = 64.0;

/// Flattens `geometry` after mapping it through `transform`.
///
/// `tolerance` bounds the chord error in output units.
pub(crate) fn flatten(geometry: &PathGeometry, transform: &Mat2D, tolerance: f32) -> Vec<Contour> {
    let mut contours = Vec::new();
    let mut current: Option<Contour> = None;
    let mut pen = transform.map_point(Vec2::zero());
    let mut start = pen;

    for cmd in geometry.cmds() {
        match *cmd {
            PathCmd::MoveTo(p) => {
                finish(&mut contours, current.take());
                let p = transform.map_point(p);
                current = Some(Contour {
                    points: vec![p],
                    closed: false,
                });
                pen = p;
                start = p;
            }
            PathCmd::LineTo(p) => {
                let p = transform.map_point(p);
                open(&mut current, pen).points.push(p);
                pen = p;
            }
            PathCmd::CubicTo(c1, c2, p) => {
                let (c1, c2, p) = (
                    transform.map_point(c1),
                    transform.map_point(c2),
                    transform.map_point(p),
                );
                let contour = open(&mut current, pen);
                let hull = pen.distance(c1) + c1.distance(c2) + c2.distance(p);
                let n = (hull / tolerance.max(1e-3)).sqrt().ceil().clamp(1.0, MAX_CUBIC_SEGMENTS);
                let steps = n as u32;
                for i in 1..=steps {
                    let t = i as f32 / steps as f32;
                    contour.points.push(cubic_point(pen, c1, c2, p, t));
                }
                pen = p;
            }
            PathCmd::Close => {
                if let Some(mut contour) = current.take() {
                    contour.closed = true;
                    contours.push(contour);
                }
                pen = start;
            }
        }
    }
    finish(&mut contours, current);
    contours
}

fn open(current: &mut Option<Contour>, pen: Vec2) -> &mut Contour {
    current.get_or_insert_with(|| Contour {
        points: vec![pen],
        closed: false,
    })
}

fn finish(contours: &mut Vec<Contour>, contour: Option<Contour>) {
    if let Some(c) = contour.filter(|c| !c.points.is_empty()) {
        contours.push(c);
    }
}

fn cubic_point(p0: Vec2, c1: Vec2, c2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    p0 * (u * u * u) + c1 * (3.0 * u * u * t) + c2 * (3.0 * u * t * t) + p3 * (t * t * t)
}
