//! Image decode/encode, normalization, and the pixel operations used by
//! mask rendering and the local compositing fallback.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use crate::StoreError;

/// Decode any supported image format.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, StoreError> {
    Ok(image::load_from_memory(bytes)?)
}

/// Encode as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Scale so the long side equals `target_px`, preserving aspect ratio.
/// Already-conforming images pass through untouched.
pub fn normalize_long_side(img: DynamicImage, target_px: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w.max(h) == target_px {
        return img;
    }
    let (nw, nh) = if w >= h {
        (target_px, (h as u64 * target_px as u64 / w as u64) as u32)
    } else {
        ((w as u64 * target_px as u64 / h as u64) as u32, target_px)
    };
    img.resize_exact(nw.max(1), nh.max(1), FilterType::Lanczos3)
}

/// Hex SHA-256 of stored bytes, recorded next to artifact rows.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Render a soft-edged elliptical mask: white inside, black outside,
/// edge feathered by a gaussian blur of `sigma`.
///
/// `cx`/`cy` are the ellipse center, `ax`/`ay` the semi-axes, all in
/// pixels. Always three channels; downstream graphs read one channel of
/// a regular RGB image.
pub fn render_ellipse_mask(
    width: u32,
    height: u32,
    cx: f32,
    cy: f32,
    ax: f32,
    ay: f32,
    sigma: f32,
) -> RgbImage {
    let mut mask = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
        let dx = (x as f32 + 0.5 - cx) / ax.max(1.0);
        let dy = (y as f32 + 0.5 - cy) / ay.max(1.0);
        if dx * dx + dy * dy <= 1.0 {
            *pixel = Rgb([255, 255, 255]);
        }
    }
    if sigma > 0.0 {
        image::imageops::blur(&mask, sigma)
    } else {
        mask
    }
}

/// Fully-selected mask, used when a page has neither an explicit mask
/// nor a detected face.
pub fn full_white_mask(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

/// Blend `overlay` over `base` weighted by the mask's red channel.
///
/// The pixel core of the local face-swap fallback. All three images must
/// share dimensions; `overlay` and `mask` are resized when they do not.
pub fn composite_masked(base: &RgbImage, overlay: &RgbImage, mask: &RgbImage) -> RgbImage {
    let (w, h) = base.dimensions();
    let overlay = resize_to(overlay, w, h);
    let mask = resize_to(mask, w, h);

    let mut out = base.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let alpha = mask.get_pixel(x, y)[0] as u32;
        if alpha == 0 {
            continue;
        }
        let over = overlay.get_pixel(x, y);
        for c in 0..3 {
            let b = pixel[c] as u32;
            let o = over[c] as u32;
            pixel[c] = ((o * alpha + b * (255 - alpha)) / 255) as u8;
        }
    }
    out
}

fn resize_to(img: &RgbImage, w: u32, h: u32) -> RgbImage {
    if img.dimensions() == (w, h) {
        img.clone()
    } else {
        image::imageops::resize(img, w, h, FilterType::Lanczos3)
    }
}
