//! Synthetic frames with a high-contrast "card" drawn where a detector
//! would report it.

use crate::geometry::Quadrilateral;
use crate::types::{BoundingBox, CameraFrame};
use image::{Rgb, RgbImage};

/// Checker cell size of the synthetic card texture in pixels
pub const CARD_CELL_PX: u32 = 16;

const BACKGROUND: Rgb<u8> = Rgb([96, 96, 96]);

/// Normalized box centered at `(cx, cy)` with the given size, labelled "card".
pub fn card_box(cx: f32, cy: f32, width: f32, height: f32, confidence: f32) -> BoundingBox {
    BoundingBox::new(
        cx - width / 2.0,
        cy - height / 2.0,
        cx + width / 2.0,
        cy + height / 2.0,
        confidence,
        "card",
    )
}

/// Solid-color frame; any crop of it has zero variance.
pub fn uniform_frame(width: u32, height: u32, rgb: [u8; 3]) -> CameraFrame {
    CameraFrame::from_rgb_image(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

/// Gray frame with a black/white checkerboard filling `bbox`.
pub fn synthetic_card_frame(width: u32, height: u32, bbox: &BoundingBox) -> CameraFrame {
    let rect = Quadrilateral::from_bounding_box(bbox, width, height)
        .bounding_rect()
        .clamp_to(width, height);

    let image = RgbImage::from_fn(width, height, |x, y| {
        let (xi, yi) = (x as i32, y as i32);
        let inside = xi >= rect.left && xi < rect.right && yi >= rect.top && yi < rect.bottom;
        if !inside {
            return BACKGROUND;
        }
        let cx = (xi - rect.left) as u32 / CARD_CELL_PX;
        let cy = (yi - rect.top) as u32 / CARD_CELL_PX;
        if (cx + cy) % 2 == 0 {
            Rgb([250, 250, 250])
        } else {
            Rgb([10, 10, 10])
        }
    });

    CameraFrame::from_rgb_image(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_box_geometry() {
        let b = card_box(0.5, 0.5, 0.45, 0.3, 0.9);
        assert!((b.cx() - 0.5).abs() < 1e-6);
        assert!((b.aspect_ratio().unwrap() - 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_card_frame_has_texture_inside_box() {
        let b = card_box(0.5, 0.5, 0.45, 0.3, 0.9);
        let frame = synthetic_card_frame(640, 480, &b);
        assert_eq!(frame.data.len(), 640 * 480 * 3);
        let view = frame.view().unwrap();
        assert_eq!(view.get_pixel(0, 0), &BACKGROUND);
        assert_ne!(view.get_pixel(320, 240), &BACKGROUND);
    }
}
