//! Pixel-space geometry for the detected document region.
//!
//! Boxes arrive in normalized coordinates; everything here works in integer
//! pixel space of the analyzed frame. A [`Quadrilateral`] built from an
//! axis-aligned box is a rectangle, but any four-point shape can flow through
//! [`Quadrilateral::transform`] and [`Quadrilateral::bounding_rect`].

use crate::types::BoundingBox;
use image::{GenericImageView, ImageBuffer, Pixel, RgbImage};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Half-open pixel rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i64 {
        self.right as i64 - self.left as i64
    }

    pub fn height(&self) -> i64 {
        self.bottom as i64 - self.top as i64
    }

    /// Non-positive width or height.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Clamp each edge into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: u32, height: u32) -> PixelRect {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        PixelRect {
            left: self.left.clamp(0, w),
            top: self.top.clamp(0, h),
            right: self.right.clamp(0, w),
            bottom: self.bottom.clamp(0, h),
        }
    }
}

/// 2D projective transform in homogeneous coordinates.
///
/// Affine transforms keep the last row at `[0, 0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub m: Matrix3<f64>,
}

impl Transform2D {
    pub fn new(m: Matrix3<f64>) -> Self {
        Self { m }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0))
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(Matrix3::new(sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0))
    }

    /// Rotation about the origin; positive angles turn +x toward +y
    /// (clockwise on screen, where y points down).
    pub fn rotation_degrees(degrees: f64) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Self::new(Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0))
    }

    pub fn rotation_about(degrees: f64, cx: f64, cy: f64) -> Self {
        Self::translation(-cx, -cy)
            .then(&Self::rotation_degrees(degrees))
            .then(&Self::translation(cx, cy))
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &Transform2D) -> Transform2D {
        Transform2D::new(next.m * self.m)
    }

    pub fn inverse(&self) -> Option<Transform2D> {
        self.m.try_inverse().map(Transform2D::new)
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let v = self.m * Vector3::new(x, y, 1.0);
        let w = v[2];
        (v[0] / w, v[1] / w)
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Four ordered corners: top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub points: [Point; 4],
}

impl Quadrilateral {
    pub fn new(
        top_left: Point,
        top_right: Point,
        bottom_right: Point,
        bottom_left: Point,
    ) -> Self {
        Self {
            points: [top_left, top_right, bottom_right, bottom_left],
        }
    }

    /// Scale a normalized box to pixel corners of a `width x height` frame.
    ///
    /// Coordinates are truncated toward zero; out-of-range inputs saturate.
    pub fn from_bounding_box(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        let x1 = (bbox.x1 as f64 * width as f64) as i32;
        let y1 = (bbox.y1 as f64 * height as f64) as i32;
        let x2 = (bbox.x2 as f64 * width as f64) as i32;
        let y2 = (bbox.y2 as f64 * height as f64) as i32;

        Self::new(
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        )
    }

    pub fn top_left(&self) -> Point {
        self.points[0]
    }

    pub fn bottom_right(&self) -> Point {
        self.points[2]
    }

    /// Smallest axis-aligned rectangle containing all four corners.
    pub fn bounding_rect(&self) -> PixelRect {
        let xs = self.points.iter().map(|p| p.x);
        let ys = self.points.iter().map(|p| p.y);
        PixelRect {
            left: xs.clone().min().unwrap_or(0),
            top: ys.clone().min().unwrap_or(0),
            right: xs.max().unwrap_or(0),
            bottom: ys.max().unwrap_or(0),
        }
    }

    /// Map every corner through `t`, keeping point order.
    pub fn transform(&self, t: &Transform2D) -> Quadrilateral {
        let map = |p: Point| {
            let (x, y) = t.apply(p.x as f64, p.y as f64);
            Point::new(x as i32, y as i32)
        };
        Quadrilateral {
            points: self.points.map(map),
        }
    }
}

impl std::fmt::Display for Quadrilateral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Quadrilateral(")?;
        for (i, p) in self.points.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({}, {})", p.x, p.y)?;
        }
        write!(f, ")")
    }
}

/// Crop region for a candidate box, or `None` when nothing of it survives
/// clamping to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction {
    pub quad: Quadrilateral,
    pub rect: PixelRect,
}

/// Build the pixel quadrilateral for `bbox` and its bounding rect clamped to
/// the frame. Degenerate results yield `None`.
pub fn extract_region(bbox: &BoundingBox, width: u32, height: u32) -> Option<Extraction> {
    let quad = Quadrilateral::from_bounding_box(bbox, width, height);
    let rect = quad.bounding_rect().clamp_to(width, height);

    if rect.is_degenerate() {
        log::debug!("Degenerate crop {:?} from {}", rect, quad);
        return None;
    }

    Some(Extraction { quad, rect })
}

/// Copy the pixels under a non-degenerate, in-bounds rect into a new image.
pub fn crop<I>(image: &I, rect: &PixelRect) -> RgbImage
where
    I: GenericImageView,
    I::Pixel: Pixel<Subpixel = u8>,
{
    let (w, h) = image.dimensions();
    let rect = rect.clamp_to(w, h);
    let out_w = rect.width().max(0) as u32;
    let out_h = rect.height().max(0) as u32;

    ImageBuffer::from_fn(out_w, out_h, |x, y| {
        image
            .get_pixel(rect.left as u32 + x, rect.top as u32 + y)
            .to_rgb()
    })
}

/// Rotate 90 degrees clockwise when the crop is taller than wide.
pub fn orient_portrait(image: RgbImage) -> RgbImage {
    if image.height() > image.width() {
        image::imageops::rotate90(&image)
    } else {
        image
    }
}
