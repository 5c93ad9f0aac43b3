//! Axis-aligned bounding boxes.
//!
//! Formats disagree on how a box is written down: COCO stores the origin plus
//! extent (`[x, y, width, height]`), Pascal VOC stores the corner pair
//! (`xmin, ymin, xmax, ymax`) and polygon-text stores all four corners. The
//! canonical storage here is origin + extent; the corner forms are derived.

use super::coord::Point;
use crate::error::AnnoconvError;

/// An axis-aligned box stored as `(x_min, y_min, width, height)` in pixels.
///
/// Construction always goes through a checked constructor, so `width` and
/// `height` are never negative and every field is finite. Zero extent is
/// representable here; the annotation model is what rejects it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    x_min: f64,
    y_min: f64,
    width: f64,
    height: f64,
}

impl BoundingBox {
    /// Builds a box from its corner pair.
    ///
    /// # Errors
    /// [`AnnoconvError::InvalidGeometry`] if `x_max < x_min`, `y_max < y_min`
    /// or any value is not finite. `x_max == x_min` is accepted.
    pub fn from_corners(
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
    ) -> Result<Self, AnnoconvError> {
        ensure_finite(&[x_min, y_min, x_max, y_max])?;
        if x_max < x_min {
            return Err(AnnoconvError::geometry(format!(
                "x_max {x_max} is less than x_min {x_min}"
            )));
        }
        if y_max < y_min {
            return Err(AnnoconvError::geometry(format!(
                "y_max {y_max} is less than y_min {y_min}"
            )));
        }

        Self::checked(x_min, y_min, x_max - x_min, y_max - y_min)
    }

    /// Builds a box from its top-left corner and extent (the COCO layout).
    ///
    /// # Errors
    /// [`AnnoconvError::InvalidGeometry`] for a negative extent or non-finite values.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Result<Self, AnnoconvError> {
        ensure_finite(&[x, y, width, height])?;
        if width < 0.0 || height < 0.0 {
            return Err(AnnoconvError::geometry(format!(
                "negative extent {width}x{height}"
            )));
        }

        Self::checked(x, y, width, height)
    }

    /// Rejects boxes whose derived values overflow, e.g. corners near
    /// `f64::MAX` whose difference is infinite.
    fn checked(x_min: f64, y_min: f64, width: f64, height: f64) -> Result<Self, AnnoconvError> {
        let derived = [width, height, x_min + width, y_min + height, width * height];
        if derived.iter().any(|value| !value.is_finite()) {
            return Err(AnnoconvError::geometry(format!(
                "box at ({x_min}, {y_min}) with extent {width}x{height} overflows"
            )));
        }

        Ok(Self {
            x_min,
            y_min,
            width,
            height,
        })
    }

    /// Builds a box from four corners listed top-left, top-right,
    /// bottom-right, bottom-left.
    ///
    /// # Errors
    /// [`AnnoconvError::InvalidGeometry`] if the points are not an
    /// axis-aligned rectangle in exactly that winding order.
    pub fn from_polygon(corners: [Point; 4]) -> Result<Self, AnnoconvError> {
        let [top_left, top_right, bottom_right, bottom_left] = corners;

        let aligned = top_left.y == top_right.y
            && bottom_left.y == bottom_right.y
            && top_left.x == bottom_left.x
            && top_right.x == bottom_right.x;
        if !aligned {
            return Err(AnnoconvError::geometry(format!(
                "points {} are not an axis-aligned rectangle in \
                 [top-left, top-right, bottom-right, bottom-left] order",
                describe_points(&corners)
            )));
        }

        Self::from_corners(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
    }

    #[inline]
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    #[inline]
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    #[inline]
    pub fn x_max(&self) -> f64 {
        self.x_min + self.width
    }

    #[inline]
    pub fn y_max(&self) -> f64 {
        self.y_min + self.height
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Returns `width * height`.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Returns true if the box has zero width or zero height.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Returns `(x_min, y_min, x_max, y_max)`.
    #[inline]
    pub fn to_corners(&self) -> (f64, f64, f64, f64) {
        (self.x_min, self.y_min, self.x_max(), self.y_max())
    }

    /// Returns `(x, y, width, height)`.
    #[inline]
    pub fn to_xywh(&self) -> (f64, f64, f64, f64) {
        (self.x_min, self.y_min, self.width, self.height)
    }

    /// Returns the corners as `[top-left, top-right, bottom-right, bottom-left]`.
    ///
    /// Polygon-text depends on this exact winding order; other tools reading
    /// those files would see a rotated box if it changed.
    pub fn polygon_corners(&self) -> [Point; 4] {
        let (x_min, y_min, x_max, y_max) = self.to_corners();
        [
            Point::new(x_min, y_min),
            Point::new(x_max, y_min),
            Point::new(x_max, y_max),
            Point::new(x_min, y_max),
        ]
    }
}

fn ensure_finite(values: &[f64]) -> Result<(), AnnoconvError> {
    match values.iter().find(|value| !value.is_finite()) {
        Some(value) => Err(AnnoconvError::geometry(format!(
            "coordinate {value} is not finite"
        ))),
        None => Ok(()),
    }
}

fn describe_points(points: &[Point]) -> String {
    let parts: Vec<String> = points
        .iter()
        .map(|point| format!("({}, {})", point.x, point.y))
        .collect();
    parts.join(" ")
}
