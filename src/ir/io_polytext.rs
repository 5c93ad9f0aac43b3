//! Polygon-text reader and writer (the plain-text format OpenCV tooling uses).
//!
//! ```text
//! 100 50
//! 10 5 30 5 30 20 10 20
//! ```
//!
//! The first line is `width height`. Every following line is one box as four
//! corners `x y` in `[top-left, top-right, bottom-right, bottom-left]` order,
//! numbers separated by spaces and/or commas. Blank lines are skipped.
//!
//! The format has no category and no file name. Decoding files every box
//! under the synthetic category [`SYNTHETIC_CATEGORY`]; encoding drops
//! categories entirely. That loss is published through
//! [`Capabilities::preserves_categories`].

use std::fmt::Write as _;

use super::adapter::{single_image, Capabilities, DecodeOptions, FormatAdapter};
use super::model::{CanonicalImage, ImageMeta};
use super::registry::CategoryRegistry;
use super::{BoundingBox, Point};
use crate::error::AnnoconvError;

const FORMAT: &str = "polygon-text";
const NUMBERS_PER_LINE: usize = 8;

/// Category name given to every decoded box.
pub const SYNTHETIC_CATEGORY: &str = "object";

/// Parses polygon-text into a canonical image.
///
/// The image takes `options.image_id` and the `options.file_name` hint (or
/// an empty name). Every annotation is assigned [`SYNTHETIC_CATEGORY`].
///
/// # Errors
/// - [`AnnoconvError::MalformedInput`] for a missing or bad header, or a line
///   without exactly eight numbers; nothing is returned for partial input
/// - [`AnnoconvError::InvalidGeometry`] when the corners are not an
///   axis-aligned rectangle in the fixed winding order
/// - [`AnnoconvError::MissingImageSize`] for a zero width or height
/// - [`AnnoconvError::UnknownCategoryName`] if `"object"` is unknown and
///   creation is denied
///
/// # Example
/// ```
/// use annoconv::ir::io_polytext::from_polytext_str;
/// use annoconv::ir::{CategoryRegistry, DecodeOptions};
///
/// let mut registry = CategoryRegistry::new();
/// let text = "100 50\n10 5 30 5 30 20 10 20\n";
/// let image = from_polytext_str(text, &mut registry, &DecodeOptions::default())?;
/// assert_eq!(image.annotations()[0].bbox().to_corners(), (10.0, 5.0, 30.0, 20.0));
/// # Ok::<(), annoconv::AnnoconvError>(())
/// ```
pub fn from_polytext_str(
    text: &str,
    registry: &mut CategoryRegistry,
    options: &DecodeOptions<'_>,
) -> Result<CanonicalImage, AnnoconvError> {
    let parsed = parse_polytext(text)?;
    registry.transaction(|staged| polytext_to_canonical(parsed, staged, options))
}

/// Parses polygon-text from bytes.
///
/// The input must be valid UTF-8.
pub fn from_polytext_slice(
    bytes: &[u8],
    registry: &mut CategoryRegistry,
    options: &DecodeOptions<'_>,
) -> Result<CanonicalImage, AnnoconvError> {
    let text = std::str::from_utf8(bytes).map_err(|source| {
        AnnoconvError::malformed(FORMAT, format!("input is not valid UTF-8: {source}"))
    })?;
    from_polytext_str(text, registry, options)
}

/// Writes one canonical image as polygon-text. Categories are not written.
pub fn to_polytext_string(image: &CanonicalImage) -> String {
    let mut text = String::new();
    // Writing into a String cannot fail.
    let _ = write_polytext(&mut text, image);
    text
}

/// The polygon-text adapter.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolyText;

impl FormatAdapter for PolyText {
    fn name(&self) -> &'static str {
        "polytext"
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            preserves_categories: false,
            preserves_supercategories: false,
            preserves_file_name: false,
            preserves_crowd: false,
            multi_image: false,
        }
    }

    fn decode(
        &self,
        raw: &str,
        registry: &mut CategoryRegistry,
        options: &DecodeOptions<'_>,
    ) -> Result<Vec<CanonicalImage>, AnnoconvError> {
        from_polytext_str(raw, registry, options).map(|image| vec![image])
    }

    fn encode(
        &self,
        images: &[CanonicalImage],
        _registry: &CategoryRegistry,
    ) -> Result<String, AnnoconvError> {
        single_image(FORMAT, images).map(to_polytext_string)
    }
}

#[derive(Debug)]
struct ParsedPolytext {
    width: u32,
    height: u32,
    polygons: Vec<[Point; 4]>,
}

fn polytext_to_canonical(
    parsed: ParsedPolytext,
    registry: &mut CategoryRegistry,
    options: &DecodeOptions<'_>,
) -> Result<CanonicalImage, AnnoconvError> {
    let file_name = options.file_name.unwrap_or_default();
    let meta = ImageMeta::new(options.image_id, file_name, parsed.width, parsed.height)?;
    let mut image = CanonicalImage::new(meta);

    if parsed.polygons.is_empty() {
        return Ok(image);
    }

    let category = registry.resolve_name(SYNTHETIC_CATEGORY, options.creation)?;
    for corners in parsed.polygons {
        let bbox = BoundingBox::from_polygon(corners)?;
        image.add_annotation(registry, &category, bbox, false)?;
    }

    Ok(image)
}

fn parse_polytext(text: &str) -> Result<ParsedPolytext, AnnoconvError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| AnnoconvError::malformed(FORMAT, "missing 'width height' header line"))?;
    let (width, height) = parse_header(header)?;

    let mut polygons = Vec::new();
    for (line_no, line) in lines {
        let numbers = split_fields(line)
            .map(|field| {
                field.parse::<f64>().map_err(|_| {
                    AnnoconvError::malformed(
                        FORMAT,
                        format!("line {line_no}: '{field}' is not a number"),
                    )
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let [x1, y1, x2, y2, x3, y3, x4, y4] =
            <[f64; NUMBERS_PER_LINE]>::try_from(numbers.as_slice()).map_err(|_| {
                AnnoconvError::malformed(
                    FORMAT,
                    format!(
                        "line {line_no}: expected {NUMBERS_PER_LINE} numbers, found {}",
                        numbers.len()
                    ),
                )
            })?;

        polygons.push([
            Point::new(x1, y1),
            Point::new(x2, y2),
            Point::new(x3, y3),
            Point::new(x4, y4),
        ]);
    }

    Ok(ParsedPolytext {
        width,
        height,
        polygons,
    })
}

/// Fuzz-only entrypoint for the text parser and box reconstruction, without a registry.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_polytext(input: &str) -> Result<(), AnnoconvError> {
    for corners in parse_polytext(input)?.polygons {
        BoundingBox::from_polygon(corners)?;
    }
    Ok(())
}

fn parse_header(line: &str) -> Result<(u32, u32), AnnoconvError> {
    let fields: Vec<&str> = split_fields(line).collect();
    let invalid = || {
        AnnoconvError::malformed(
            FORMAT,
            format!("invalid header '{line}'; expected 'width height'"),
        )
    };

    match fields.as_slice() {
        [width, height] => Ok((
            width.parse().map_err(|_| invalid())?,
            height.parse().map_err(|_| invalid())?,
        )),
        _ => Err(invalid()),
    }
}

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty())
}

fn write_polytext(text: &mut String, image: &CanonicalImage) -> std::fmt::Result {
    writeln!(text, "{} {}", image.meta().width, image.meta().height)?;
    for annotation in image.annotations() {
        let [a, b, c, d] = annotation.bbox().polygon_corners();
        writeln!(
            text,
            "{} {} {} {} {} {} {} {}",
            a.x, a.y, b.x, b.y, c.x, c.y, d.x, d.y
        )?;
    }
    Ok(())
}
