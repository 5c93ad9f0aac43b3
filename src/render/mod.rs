//! Drawing annotations onto images for inspection.
//!
//! Conversion never renders; this module only consumes the canonical model.
//! Boxes are drawn as 2-pixel hollow rectangles coloured by category, so
//! every box of one category shares a colour across images. With a
//! [`LabelFont`], the category name is written above each box.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::error::AnnoconvError;
use crate::ir::{BoundingBox, CanonicalImage, Category, CategoryId, CategoryRegistry};

/// Fonts tried by [`LabelFont::system_default`], in order.
const SYSTEM_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A TrueType/OpenType font used for category labels.
#[derive(Clone, Debug)]
pub struct LabelFont {
    font: FontArc,
    scale: PxScale,
}

impl LabelFont {
    const DEFAULT_SIZE: f32 = 16.0;

    /// Parses font data.
    ///
    /// # Errors
    /// [`AnnoconvError::FontUnreadable`] if `data` is not a font.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, AnnoconvError> {
        let font = FontArc::try_from_vec(data).map_err(|err| AnnoconvError::FontUnreadable {
            path: PathBuf::new(),
            message: err.to_string(),
        })?;
        Ok(Self {
            font,
            scale: PxScale::from(Self::DEFAULT_SIZE),
        })
    }

    /// Loads a font file.
    pub fn from_file(path: &Path) -> Result<Self, AnnoconvError> {
        let data = fs::read(path).map_err(|err| AnnoconvError::from(err).in_file(path))?;
        Self::from_bytes(data).map_err(|err| match err {
            AnnoconvError::FontUnreadable { message, .. } => AnnoconvError::FontUnreadable {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// The first well-known system font that loads, if any.
    pub fn system_default() -> Option<Self> {
        SYSTEM_FONTS
            .iter()
            .map(Path::new)
            .filter(|path| path.is_file())
            .find_map(|path| Self::from_file(path).ok())
    }
}

const PALETTE_SIZE: u64 = 24;
const UNLABELLED: Rgb<u8> = Rgb([255, 255, 255]);

/// Palette colour for a category id.
pub fn category_color(id: CategoryId) -> Rgb<u8> {
    // Step through the hue wheel with a stride coprime to the palette size so
    // neighbouring ids get distant hues.
    let slot = (id.as_u64().wrapping_mul(7)) % PALETTE_SIZE;
    let hue = slot as f32 / PALETTE_SIZE as f32 * 360.0;
    hsv_to_rgb(hue, 0.8, 0.95)
}

/// Draws one box, clipped to the image.
///
/// `label` only selects the colour; boxes without one are drawn white.
/// Boxes entirely outside the image draw nothing.
pub fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, label: Option<&Category>) {
    let color = label.map_or(UNLABELLED, |category| category_color(category.id()));

    let (x_min, y_min, x_max, y_max) = bbox.to_corners();
    let left = x_min.round().max(0.0);
    let top = y_min.round().max(0.0);
    let right = x_max.round().min(f64::from(image.width()));
    let bottom = y_max.round().min(f64::from(image.height()));
    if right <= left || bottom <= top {
        return;
    }

    let (x, y) = (left as i32, top as i32);
    let width = (right - left) as u32;
    let height = (bottom - top) as u32;

    draw_hollow_rect_mut(image, Rect::at(x, y).of_size(width, height), color);
    if width > 2 && height > 2 {
        draw_hollow_rect_mut(image, Rect::at(x + 1, y + 1).of_size(width - 2, height - 2), color);
    }
}

/// Writes the category name just above the box, or inside it when the box
/// touches the top edge.
pub fn draw_label(image: &mut RgbImage, bbox: &BoundingBox, category: &Category, font: &LabelFont) {
    let x = bbox.x_min().round().clamp(0.0, f64::from(image.width())) as i32;
    let above = bbox.y_min() - f64::from(font.scale.y) - 2.0;
    let y = if above >= 0.0 {
        above.round() as i32
    } else {
        bbox.y_min().round().clamp(0.0, f64::from(image.height())) as i32 + 2
    };

    draw_text_mut(
        image,
        category_color(category.id()),
        x,
        y,
        font.scale,
        &font.font,
        category.name(),
    );
}

/// Draws every annotation of `annotated` onto `image`, labelled when a font
/// is given.
pub fn render_annotations(
    image: &mut RgbImage,
    annotated: &CanonicalImage,
    registry: &CategoryRegistry,
    font: Option<&LabelFont>,
) {
    for annotation in annotated.annotations() {
        let category = registry.resolve_id(annotation.category_id()).ok();
        draw_box(image, annotation.bbox(), category);
        if let (Some(category), Some(font)) = (category, font) {
            draw_label(image, annotation.bbox(), category, font);
        }
    }
}

/// Loads `image_path`, draws the annotations and saves to `output`.
///
/// The output format follows `output`'s extension.
///
/// # Errors
/// [`AnnoconvError::Render`] if the image cannot be decoded or written.
pub fn render_file(
    annotated: &CanonicalImage,
    registry: &CategoryRegistry,
    image_path: &Path,
    output: &Path,
    font: Option<&LabelFont>,
) -> Result<(), AnnoconvError> {
    let mut image = image::open(image_path)
        .map_err(|err| AnnoconvError::from(err).in_file(image_path))?
        .to_rgb8();

    let meta = annotated.meta();
    if image.dimensions() != (meta.width, meta.height) {
        tracing::warn!(
            image = %image_path.display(),
            declared = %format!("{}x{}", meta.width, meta.height),
            actual = %format!("{}x{}", image.width(), image.height()),
            "annotation size does not match the image"
        );
    }

    render_annotations(&mut image, annotated, registry, font);
    image
        .save(output)
        .map_err(|err| AnnoconvError::from(err).in_file(output))?;

    tracing::info!(
        output = %output.display(),
        boxes = annotated.annotations().len(),
        labelled = font.is_some(),
        "rendered annotations"
    );
    Ok(())
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb([
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ])
}
