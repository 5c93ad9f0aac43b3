//! COCO JSON format reader and writer.
//!
//! COCO bounding boxes use `[x, y, width, height]` where `(x, y)` is the
//! top-left corner in absolute pixels, which is also the canonical box layout.
//!
//! # Category identity
//!
//! `category_id` values are looked up through the file's own category table,
//! keyed by id; they may start anywhere and have gaps. Categories are
//! registered in ascending file-id order, keeping the file's id whenever the
//! registry allows it (see [`CategoryRegistry::adopt`]).
//!
//! # Deterministic Output
//!
//! The writer emits `images`, `categories`, `annotations` in that order,
//! images sorted by id, the full registry sorted by id, and annotations
//! numbered from 1 in image order. Stored `area` values are ignored on read
//! and recomputed on write. Integral numbers are written without a fraction.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize, Serializer};

use super::adapter::{Capabilities, DecodeOptions, FormatAdapter};
use super::model::{CanonicalImage, ImageMeta};
use super::registry::{Category, CategoryCreation, CategoryRegistry};
use super::{BoundingBox, CategoryId, ImageId};
use crate::error::AnnoconvError;

const FORMAT: &str = "COCO JSON";

// ============================================================================
// COCO Schema Types (internal to this module)
// ============================================================================

/// Top-level COCO dataset structure.
#[derive(Debug, Serialize, Deserialize)]
struct CocoDataset {
    images: Vec<CocoImage>,
    categories: Vec<CocoCategory>,
    annotations: Vec<CocoAnnotation>,
}

/// COCO image entry.
#[derive(Debug, Serialize, Deserialize)]
struct CocoImage {
    id: u64,
    width: u32,
    height: u32,
    file_name: String,
}

/// COCO category entry.
#[derive(Debug, Serialize, Deserialize)]
struct CocoCategory {
    id: u64,
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    supercategory: Option<String>,
}

/// COCO annotation entry.
#[derive(Debug, Serialize, Deserialize)]
struct CocoAnnotation {
    id: u64,
    image_id: u64,
    category_id: u64,

    /// COCO bbox format: [x, y, width, height] with (x,y) as top-left corner
    #[serde(serialize_with = "serialize_compact_array")]
    bbox: [f64; 4],

    #[serde(default, serialize_with = "serialize_compact_option")]
    area: Option<f64>,

    #[serde(default)]
    iscrowd: u8,

    /// Segmentation data (polygons or RLE). Accepted but ignored for detection.
    #[serde(default)]
    segmentation: serde_json::Value,
}

// ============================================================================
// Public API
// ============================================================================

/// Reads COCO JSON into one canonical image per `images` entry, in file order.
///
/// # Errors
/// - [`AnnoconvError::MalformedInput`] for invalid JSON, missing arrays,
///   wrong `bbox` length, duplicate ids or annotations of unknown images
/// - [`AnnoconvError::UnknownCategoryId`] for a `category_id` absent from the table
/// - [`AnnoconvError::MissingImageSize`] for a zero width or height
/// - [`AnnoconvError::InvalidGeometry`] for negative or empty boxes
/// - [`AnnoconvError::UnknownCategoryName`] for a new name under
///   [`CategoryCreation::Deny`]
///
/// # Example
/// ```
/// use annoconv::ir::io_coco_json::from_coco_str;
/// use annoconv::ir::{CategoryCreation, CategoryRegistry};
///
/// let json = r#"{"images":[{"id":1,"width":100,"height":50,"file_name":"a.jpg"}],
///   "categories":[{"id":1,"name":"car"}],
///   "annotations":[{"id":1,"image_id":1,"category_id":1,"bbox":[10,5,20,15]}]}"#;
/// let mut registry = CategoryRegistry::new();
/// let images = from_coco_str(json, &mut registry, CategoryCreation::Allow)?;
/// assert_eq!(images[0].annotations()[0].area(), 300.0);
/// # Ok::<(), annoconv::AnnoconvError>(())
/// ```
pub fn from_coco_str(
    json: &str,
    registry: &mut CategoryRegistry,
    creation: CategoryCreation,
) -> Result<Vec<CanonicalImage>, AnnoconvError> {
    let coco: CocoDataset = serde_json::from_str(json)
        .map_err(|source| AnnoconvError::malformed(FORMAT, source.to_string()))?;
    registry.transaction(|staged| coco_to_canonical(coco, staged, creation))
}

/// Reads COCO JSON from a byte slice.
///
/// Useful for fuzzing and processing raw bytes without UTF-8 validation overhead.
pub fn from_coco_slice(
    bytes: &[u8],
    registry: &mut CategoryRegistry,
    creation: CategoryCreation,
) -> Result<Vec<CanonicalImage>, AnnoconvError> {
    let coco: CocoDataset = serde_json::from_slice(bytes)
        .map_err(|source| AnnoconvError::malformed(FORMAT, source.to_string()))?;
    registry.transaction(|staged| coco_to_canonical(coco, staged, creation))
}

/// Writes canonical images as one pretty-printed COCO JSON document.
///
/// The category table is the whole registry, so ids stay consistent across
/// every file written from the same run.
///
/// # Errors
/// [`AnnoconvError::UnknownCategoryId`] if an annotation's category is not in
/// `registry`.
pub fn to_coco_string(
    images: &[CanonicalImage],
    registry: &CategoryRegistry,
) -> Result<String, AnnoconvError> {
    let coco = canonical_to_coco(images, registry)?;
    serde_json::to_string_pretty(&coco).map_err(|source| AnnoconvError::JsonWrite { source })
}

/// The COCO adapter.
#[derive(Clone, Copy, Debug, Default)]
pub struct CocoJson;

impl FormatAdapter for CocoJson {
    fn name(&self) -> &'static str {
        "coco"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            preserves_categories: true,
            preserves_supercategories: true,
            preserves_file_name: true,
            preserves_crowd: true,
            multi_image: true,
        }
    }

    fn decode(
        &self,
        raw: &str,
        registry: &mut CategoryRegistry,
        options: &DecodeOptions<'_>,
    ) -> Result<Vec<CanonicalImage>, AnnoconvError> {
        from_coco_str(raw, registry, options.creation)
    }

    fn encode(
        &self,
        images: &[CanonicalImage],
        registry: &CategoryRegistry,
    ) -> Result<String, AnnoconvError> {
        to_coco_string(images, registry)
    }
}

// ============================================================================
// Conversion: COCO -> canonical
// ============================================================================

fn coco_to_canonical(
    coco: CocoDataset,
    registry: &mut CategoryRegistry,
    creation: CategoryCreation,
) -> Result<Vec<CanonicalImage>, AnnoconvError> {
    // Register categories by ascending file id; lookups below go through this map.
    let mut file_categories = coco.categories;
    file_categories.sort_by_key(|cat| cat.id);

    let mut category_by_file_id: BTreeMap<u64, Category> = BTreeMap::new();
    for cat in file_categories {
        if category_by_file_id.contains_key(&cat.id) {
            return Err(AnnoconvError::malformed(
                FORMAT,
                format!("duplicate category id {}", cat.id),
            ));
        }
        if cat.name.trim().is_empty() {
            return Err(AnnoconvError::malformed(
                FORMAT,
                format!("category {} has an empty name", cat.id),
            ));
        }
        let category =
            registry.adopt(CategoryId::new(cat.id), cat.name, cat.supercategory, creation)?;
        category_by_file_id.insert(cat.id, category);
    }

    let mut images = Vec::with_capacity(coco.images.len());
    let mut index_by_image_id: BTreeMap<u64, usize> = BTreeMap::new();
    for img in coco.images {
        if index_by_image_id.contains_key(&img.id) {
            return Err(AnnoconvError::malformed(
                FORMAT,
                format!("duplicate image id {}", img.id),
            ));
        }
        index_by_image_id.insert(img.id, images.len());
        let meta = ImageMeta::new(ImageId::new(img.id), img.file_name, img.width, img.height)?;
        images.push(CanonicalImage::new(meta));
    }

    let mut seen_annotation_ids = HashSet::new();
    for ann in coco.annotations {
        if !seen_annotation_ids.insert(ann.id) {
            return Err(AnnoconvError::malformed(
                FORMAT,
                format!("duplicate annotation id {}", ann.id),
            ));
        }

        let index = *index_by_image_id.get(&ann.image_id).ok_or_else(|| {
            AnnoconvError::malformed(
                FORMAT,
                format!(
                    "annotation {} references unknown image {}",
                    ann.id, ann.image_id
                ),
            )
        })?;
        let category = category_by_file_id
            .get(&ann.category_id)
            .ok_or(AnnoconvError::UnknownCategoryId(CategoryId::new(ann.category_id)))?;

        let [x, y, w, h] = ann.bbox;
        let bbox = BoundingBox::from_xywh(x, y, w, h)?;
        images[index].add_annotation(registry, category, bbox, ann.iscrowd != 0)?;
    }

    Ok(images)
}

// ============================================================================
// Conversion: canonical -> COCO
// ============================================================================

fn canonical_to_coco(
    images: &[CanonicalImage],
    registry: &CategoryRegistry,
) -> Result<CocoDataset, AnnoconvError> {
    let mut sorted: Vec<&CanonicalImage> = images.iter().collect();
    sorted.sort_by_key(|image| image.id());

    let categories = registry
        .iter()
        .map(|cat| CocoCategory {
            id: cat.id().as_u64(),
            name: cat.name().to_string(),
            supercategory: cat.supercategory().map(str::to_string),
        })
        .collect();

    let mut annotations = Vec::new();
    for image in &sorted {
        for ann in image.annotations() {
            registry.resolve_id(ann.category_id())?;
            let (x, y, w, h) = ann.bbox().to_xywh();
            annotations.push(CocoAnnotation {
                id: annotations.len() as u64 + 1,
                image_id: image.id().as_u64(),
                category_id: ann.category_id().as_u64(),
                bbox: [x, y, w, h],
                area: Some(ann.bbox().area()),
                iscrowd: u8::from(ann.is_crowd()),
                segmentation: serde_json::Value::Array(vec![]),
            });
        }
    }

    let images = sorted
        .iter()
        .map(|image| {
            let meta = image.meta();
            CocoImage {
                id: meta.id.as_u64(),
                width: meta.width,
                height: meta.height,
                file_name: meta.file_name.clone(),
            }
        })
        .collect();

    Ok(CocoDataset {
        images,
        categories,
        annotations,
    })
}

/// Integral values become JSON integers so `10.0` is written as `10`.
fn compact_number(value: f64) -> serde_json::Value {
    const I64_SAFE: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < I64_SAFE {
        serde_json::Value::from(value as i64)
    } else {
        serde_json::Value::from(value)
    }
}

fn serialize_compact_array<S: Serializer>(
    values: &[f64; 4],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let compact: Vec<serde_json::Value> = values.iter().copied().map(compact_number).collect();
    compact.serialize(serializer)
}

fn serialize_compact_option<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    value.map(compact_number).serialize(serializer)
}

// ============================================================================
// Tests
// ============================================================================
