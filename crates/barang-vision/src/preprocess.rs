//! Image transforms feeding the decode cascade. All operate on greyscale buffers.

use barang_types::frame::Frame;
use image::{imageops, GrayImage};

/// Converts an RGBA frame to luminance using ITU-R BT.601 weights.
///
/// Integer form of 0.299R + 0.587G + 0.114B: `(77R + 150G + 29B) >> 8`.
pub fn to_greyscale(frame: &Frame) -> Option<GrayImage> {
    if frame.is_empty() {
        return None;
    }
    let grey = frame.data[..frame.pixel_count() * 4]
        .chunks_exact(4)
        .map(|px| {
            let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
            ((77 * r + 150 * g + 29 * b) >> 8) as u8
        })
        .collect();
    GrayImage::from_raw(frame.width, frame.height, grey)
}

pub fn invert(grey: &GrayImage) -> GrayImage {
    let mut inverted = grey.clone();
    imageops::invert(&mut inverted);
    inverted
}

/// Resamples to `target_width`, preserving aspect ratio. Returns the scale
/// factor that maps output coordinates back to the input.
pub fn downscale_to_width(grey: &GrayImage, target_width: u32) -> (GrayImage, f32) {
    let (width, height) = grey.dimensions();
    let factor = width as f32 / target_width as f32;
    let target_height = ((height as f32 / factor).round() as u32).max(1);
    let resized = imageops::resize(
        grey,
        target_width,
        target_height,
        imageops::FilterType::Triangle,
    );
    (resized, factor)
}

/// Centered square covering `fraction` of the shorter side. Returns the crop
/// and its top-left offset in the input.
pub fn center_crop(grey: &GrayImage, fraction: f32) -> (GrayImage, (u32, u32)) {
    let (width, height) = grey.dimensions();
    let side = ((width.min(height) as f32 * fraction).round() as u32).clamp(1, width.min(height));
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    (imageops::crop_imm(grey, x, y, side, side).to_image(), (x, y))
}

/// Hard black/white threshold.
///
/// Values below `low` go black, above `high` go white, and the middle band
/// is forced to whichever side of `mid` it falls on.
pub fn binarize(grey: &GrayImage, low: u8, mid: u8, high: u8) -> GrayImage {
    let mut out = grey.clone();
    for px in out.pixels_mut() {
        let v = px[0];
        px[0] = if v < low {
            0
        } else if v > high {
            255
        } else if v >= mid {
            255
        } else {
            0
        };
    }
    out
}
