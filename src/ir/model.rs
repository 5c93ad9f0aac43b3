//! Canonical annotation model.
//!
//! This module defines the format-agnostic representation of one image's
//! annotations. All format decoders produce it, and all encoders consume it.
//! [`CanonicalImage::add_annotation`] is the only way to create an
//! [`Annotation`], which keeps numbering and category checks in one place.

use std::collections::BTreeSet;

use super::bbox::BoundingBox;
use super::ids::{AnnotationId, CategoryId, ImageId};
use super::registry::{Category, CategoryRegistry};
use crate::error::AnnoconvError;

/// Metadata about one image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageMeta {
    /// Unique identifier for this image within its dataset.
    pub id: ImageId,

    /// Filename or relative path of the image. Empty when the source format
    /// does not carry one and no hint was supplied.
    pub file_name: String,

    /// Width of the image in pixels, always positive.
    pub width: u32,

    /// Height of the image in pixels, always positive.
    pub height: u32,

    /// Channel count, when the source recorded one (VOC `<depth>`).
    pub depth: Option<u32>,
}

impl ImageMeta {
    /// Creates image metadata, refusing id 0 and unknown (zero) dimensions.
    ///
    /// # Errors
    /// - [`AnnoconvError::InvalidImageId`] if `id` is 0
    /// - [`AnnoconvError::MissingImageSize`] if `width` or `height` is zero
    pub fn new(
        id: impl Into<ImageId>,
        file_name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Result<Self, AnnoconvError> {
        let id = id.into();
        if id.as_u64() == 0 {
            return Err(AnnoconvError::InvalidImageId(id));
        }
        let file_name = file_name.into();
        if width == 0 || height == 0 {
            return Err(AnnoconvError::MissingImageSize { file_name });
        }

        Ok(Self {
            id,
            file_name,
            width,
            height,
            depth: None,
        })
    }

    /// Sets the channel count.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// A labelled box on one image.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    id: AnnotationId,
    category_id: CategoryId,
    bbox: BoundingBox,
    area: f64,
    is_crowd: bool,
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Always `width * height` of the box; areas stored in source files are
    /// never trusted.
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn is_crowd(&self) -> bool {
        self.is_crowd
    }
}

/// One image's metadata and its annotations, in insertion order.
///
/// The categories referenced by the annotations live in a
/// [`CategoryRegistry`] shared with the other images of the run.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalImage {
    meta: ImageMeta,
    annotations: Vec<Annotation>,
}

impl CanonicalImage {
    /// Creates an image with no annotations.
    pub fn new(meta: ImageMeta) -> Self {
        Self {
            meta,
            annotations: Vec::new(),
        }
    }

    pub fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    pub fn id(&self) -> ImageId {
        self.meta.id
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Appends an annotation with the next per-image id.
    ///
    /// # Errors
    /// - [`AnnoconvError::UnresolvedCategory`] if `category` was not issued by `registry`
    /// - [`AnnoconvError::InvalidGeometry`] if the box has zero width or height
    pub fn add_annotation(
        &mut self,
        registry: &CategoryRegistry,
        category: &Category,
        bbox: BoundingBox,
        is_crowd: bool,
    ) -> Result<&Annotation, AnnoconvError> {
        if !registry.contains(category) {
            return Err(AnnoconvError::UnresolvedCategory {
                id: category.id(),
                name: category.name().to_string(),
            });
        }
        if bbox.is_degenerate() {
            return Err(AnnoconvError::geometry(format!(
                "box at ({}, {}) has non-positive extent {}x{}",
                bbox.x_min(),
                bbox.y_min(),
                bbox.width(),
                bbox.height()
            )));
        }

        let id = AnnotationId::new(self.annotations.len() as u64 + 1);
        self.annotations.push(Annotation {
            id,
            category_id: category.id(),
            bbox,
            area: bbox.area(),
            is_crowd,
        });
        Ok(&self.annotations[self.annotations.len() - 1])
    }
}

/// The batch unit: images converted together plus their shared registry.
///
/// Created empty, filled by repeated decodes, consumed by encodes; it is never
/// persisted itself.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    registry: CategoryRegistry,
    images: Vec<CanonicalImage>,
    image_ids: BTreeSet<ImageId>,
}

impl Dataset {
    /// Creates an empty dataset with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty dataset around a pre-populated registry.
    pub fn with_registry(registry: CategoryRegistry) -> Self {
        Self {
            registry,
            ..Default::default()
        }
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn images(&self) -> &[CanonicalImage] {
        &self.images
    }

    pub fn annotation_count(&self) -> usize {
        self.images.iter().map(|image| image.annotations.len()).sum()
    }

    /// The id the next single-image decode should use.
    pub fn next_image_id(&self) -> ImageId {
        let max = self.image_ids.last().map(ImageId::as_u64);
        ImageId::new(max.map_or(1, |id| id + 1))
    }

    /// Runs a decode against the registry and appends what it produced.
    ///
    /// Either every decoded image is appended and the registry changes are
    /// kept, or the dataset is left exactly as it was.
    ///
    /// # Errors
    /// Whatever `decode` returns, or [`AnnoconvError::DuplicateImageId`] if
    /// a decoded image reuses an id already present.
    pub fn ingest<F>(&mut self, decode: F) -> Result<usize, AnnoconvError>
    where
        F: FnOnce(&mut CategoryRegistry) -> Result<Vec<CanonicalImage>, AnnoconvError>,
    {
        let Self {
            registry,
            images,
            image_ids,
        } = self;
        registry.transaction(|staged| {
            let decoded = decode(staged)?;
            let mut fresh = BTreeSet::new();
            for image in &decoded {
                if image_ids.contains(&image.id()) || !fresh.insert(image.id()) {
                    return Err(AnnoconvError::DuplicateImageId(image.id()));
                }
            }
            let count = decoded.len();
            image_ids.append(&mut fresh);
            images.extend(decoded);
            Ok(count)
        })
    }

    /// Splits the dataset into its registry and images.
    pub fn into_parts(self) -> (CategoryRegistry, Vec<CanonicalImage>) {
        (self.registry, self.images)
    }
}
