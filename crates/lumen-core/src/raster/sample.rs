use crate::paint::Color;
use crate::resource::{ImageData, ImageFilter, ImageSampler, ImageWrap};

/// Samples `image` at texel-space coordinates (`0..width`, `0..height`).
pub(crate) fn sample_image(image: &ImageData, x: f32, y: f32, sampler: &ImageSampler) -> Color {
    if image.width == 0 || image.height == 0 {
        return Color::transparent();
    }
    match sampler.filter {
        ImageFilter::Nearest => {
            let ix = wrap(x.floor() as i64, image.width, sampler.wrap_x);
            let iy = wrap(y.floor() as i64, image.height, sampler.wrap_y);
            texel(image, ix, iy)
        }
        ImageFilter::Bilinear => {
            let (fx, fy) = (x - 0.5, y - 0.5);
            let (x0, y0) = (fx.floor(), fy.floor());
            let (tx, ty) = (fx - x0, fy - y0);
            let (x0, y0) = (x0 as i64, y0 as i64);

            let xa = wrap(x0, image.width, sampler.wrap_x);
            let xb = wrap(x0 + 1, image.width, sampler.wrap_x);
            let ya = wrap(y0, image.height, sampler.wrap_y);
            let yb = wrap(y0 + 1, image.height, sampler.wrap_y);

            let top = texel(image, xa, ya).lerp(texel(image, xb, ya), tx);
            let bottom = texel(image, xa, yb).lerp(texel(image, xb, yb), tx);
            top.lerp(bottom, ty)
        }
    }
}

fn texel(image: &ImageData, x: u32, y: u32) -> Color {
    Color::from_premul_rgba8(image.pixel(x, y))
}

fn wrap(i: i64, size: u32, mode: ImageWrap) -> u32 {
    let n = size as i64;
    let v = match mode {
        ImageWrap::Clamp => i.clamp(0, n - 1),
        ImageWrap::Repeat => i.rem_euclid(n),
        ImageWrap::Mirror => {
            let m = i.rem_euclid(2 * n);
            if m < n { m } else { 2 * n - 1 - m }
        }
    };
    v as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> ImageData {
        // 2x1: opaque red, opaque blue.
        ImageData::from_premul_rgba8(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 255]).unwrap()
    }

    #[test]
    fn wrap_modes() {
        assert_eq!(wrap(-1, 4, ImageWrap::Clamp), 0);
        assert_eq!(wrap(9, 4, ImageWrap::Clamp), 3);
        assert_eq!(wrap(-1, 4, ImageWrap::Repeat), 3);
        assert_eq!(wrap(5, 4, ImageWrap::Repeat), 1);
        assert_eq!(wrap(4, 4, ImageWrap::Mirror), 3);
        assert_eq!(wrap(-1, 4, ImageWrap::Mirror), 0);
    }

    #[test]
    fn nearest_picks_texel() {
        let img = checker();
        let s = ImageSampler {
            filter: ImageFilter::Nearest,
            ..ImageSampler::default()
        };
        assert_eq!(sample_image(&img, 0.2, 0.5, &s).to_premul_rgba8(), [255, 0, 0, 255]);
        assert_eq!(sample_image(&img, 1.7, 0.5, &s).to_premul_rgba8(), [0, 0, 255, 255]);
    }

    #[test]
    fn bilinear_blends_between_centers() {
        let img = checker();
        let c = sample_image(&img, 1.0, 0.5, &ImageSampler::default()).to_premul_rgba8();
        assert_eq!(c, [128, 0, 128, 255]);
    }
}
