use crate::coords::Vec2;
use crate::paint::FillRule;

/// Per-pixel coverage, sampled at pixel centers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    pub(crate) fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    #[inline]
    pub(crate) fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[(y * self.width + x) as usize]
    }

    #[inline]
    fn set(&mut self, x: u32, y: u32) {
        self.bits[(y * self.width + x) as usize] = true;
    }

    pub(crate) fn intersect(&mut self, other: &Mask) {
        for (a, b) in self.bits.iter_mut().zip(&other.bits) {
            *a &= *b;
        }
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

/// Scanline fill of closed polygons.
///
/// Edges going up on screen count +1, so clockwise shapes have positive winding.
pub(crate) fn fill_polygons(polys: &[Vec<Vec2>], rule: FillRule, width: u32, height: u32) -> Mask {
    let mut mask = Mask::empty(width, height);

    let edges: Vec<(Vec2, Vec2)> = polys
        .iter()
        .filter(|p| p.len() >= 2)
        .flat_map(|p| p.iter().copied().zip(p.iter().copied().cycle().skip(1)))
        .filter(|(a, b)| a.y != b.y)
        .collect();
    if edges.is_empty() {
        return mask;
    }

    let mut crossings: Vec<(f32, i32)> = Vec::new();
    for y in 0..height {
        let yc = y as f32 + 0.5;
        crossings.clear();
        for &(a, b) in &edges {
            let (lo, hi) = if a.y < b.y { (a.y, b.y) } else { (b.y, a.y) };
            if yc < lo || yc >= hi {
                continue;
            }
            let x = a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y);
            let dir = if b.y < a.y { 1 } else { -1 };
            crossings.push((x, dir));
        }
        if crossings.len() < 2 {
            continue;
        }
        crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

        let mut winding = 0;
        for i in 0..crossings.len() - 1 {
            winding += crossings[i].1;
            if !rule.is_inside(winding) {
                continue;
            }
            let x0 = (crossings[i].0 - 0.5).ceil().max(0.0);
            let x1 = (crossings[i + 1].0 - 0.5).ceil().min(width as f32);
            if x1 <= x0 {
                continue;
            }
            for x in x0 as u32..x1 as u32 {
                mask.set(x, y);
            }
        }
    }
    mask
}
