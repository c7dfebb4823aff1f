//! 3x3 sharpening convolution
//!
//! Center weight 5, orthogonal neighbours -1, corners 0, applied per channel
//! and clamped to `[0, 255]`. The outermost one-pixel ring has no full
//! neighbourhood and is copied through unchanged.
use image::{Rgb, RgbImage};

pub const SHARPEN_KERNEL: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];

/// Return a sharpened copy of `src`.
pub fn sharpen(src: &RgbImage) -> RgbImage {
    let (width, height) = src.dimensions();
    let mut out = src.clone();

    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = [0i32; 3];
            for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    if weight == 0 {
                        continue;
                    }
                    let p = src.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1);
                    for c in 0..3 {
                        acc[c] += p.0[c] as i32 * weight;
                    }
                }
            }
            out.put_pixel(x, y, Rgb(acc.map(|v| v.clamp(0, 255) as u8)));
        }
    }

    out
}
