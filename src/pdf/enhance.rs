//! Page image enhancement before OCR

use image::{DynamicImage, GrayImage, Luma};

const CONTRAST_GAIN: f32 = 1.2;
const BRIGHTNESS_OFFSET: f32 = 10.0;

/// Grayscale, 3x3 median denoise, contrast boost and a light ink-closing pass.
pub fn enhance_for_ocr(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let denoised = median_3x3(&gray);
    let boosted = adjust_contrast(&denoised, CONTRAST_GAIN, BRIGHTNESS_OFFSET);
    close_ink(&boosted)
}

fn clamped(image: &GrayImage, x: i64, y: i64) -> u8 {
    let cx = x.clamp(0, image.width() as i64 - 1) as u32;
    let cy = y.clamp(0, image.height() as i64 - 1) as u32;
    image.get_pixel(cx, cy)[0]
}

fn median_3x3(image: &GrayImage) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    let mut window = [0u8; 9];

    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let mut i = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                window[i] = clamped(image, x as i64 + dx, y as i64 + dy);
                i += 1;
            }
        }
        window.sort_unstable();
        *pixel = Luma([window[4]]);
    }

    out
}

/// `out = clamp(gain * v + offset)`
fn adjust_contrast(image: &GrayImage, gain: f32, offset: f32) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let v = pixel[0] as f32 * gain + offset;
        pixel[0] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

const CROSS: [(i64, i64); 5] = [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)];

fn filter_cross(image: &GrayImage, pick: fn(u8, u8) -> u8) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let value = CROSS
            .iter()
            .map(|(dx, dy)| clamped(image, x as i64 + dx, y as i64 + dy))
            .fold(image.get_pixel(x, y)[0], pick);
        *pixel = Luma([value]);
    }
    out
}

/// Morphological close of dark ink on a light page: grow the ink (min
/// filter), then shrink it back (max filter). Fills one-pixel breaks in
/// strokes.
fn close_ink(image: &GrayImage) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let grown = filter_cross(image, u8::min);
    filter_cross(&grown, u8::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_removes_salt_noise() {
        let mut image = GrayImage::from_pixel(5, 5, Luma([200]));
        image.put_pixel(2, 2, Luma([0]));

        let out = median_3x3(&image);
        assert_eq!(out.get_pixel(2, 2)[0], 200);
    }

    #[test]
    fn test_contrast_saturates() {
        let image = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 100 } else { 240 }]));
        let out = adjust_contrast(&image, 1.2, 10.0);
        assert_eq!(out.get_pixel(0, 0)[0], 130);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_close_fills_stroke_gap() {
        // A horizontal dark stroke with a one-pixel break at x=3.
        let mut image = GrayImage::from_pixel(7, 5, Luma([255]));
        for x in 0..7 {
            if x != 3 {
                image.put_pixel(x, 2, Luma([0]));
            }
        }

        let out = close_ink(&image);
        assert_eq!(out.get_pixel(3, 2)[0], 0);
        assert_eq!(out.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn test_enhance_preserves_dimensions() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            12,
            8,
            image::Rgb([250, 250, 250]),
        ));
        let out = enhance_for_ocr(&image);
        assert_eq!(out.dimensions(), (12, 8));
        assert_eq!(out.get_pixel(0, 0)[0], 255);
    }
}
