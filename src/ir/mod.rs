//! Canonical annotation model and the format adapters built on it.
//!
//! Every supported format decodes into [`CanonicalImage`]s whose categories
//! live in a shared [`CategoryRegistry`], and encodes back out of them. A
//! conversion is one adapter's decode followed by another's encode, the way
//! Pandoc routes every document through one AST.
//!
//! # Design Principles
//!
//! 1. **Validated Construction**: boxes, image sizes and annotations are
//!    checked when built, so an encoder never sees an inverted box or an
//!    image without a size.
//!
//! 2. **One Box Layout**: boxes are stored as top-left corner plus
//!    width/height in pixels; adapters translate at the edges.
//!
//! 3. **Registry-Minted Categories**: a [`Category`] can only come from a
//!    registry, so an annotation can never name a category its run has not
//!    registered.
//!
//! # Example
//!
//! ```
//! use annoconv::ir::{BoundingBox, CanonicalImage, CategoryRegistry, ImageMeta};
//!
//! let mut registry = CategoryRegistry::new();
//! let person = registry.add_category("person", None);
//!
//! let mut image = CanonicalImage::new(ImageMeta::new(1u64, "image.jpg", 640, 480)?);
//! image.add_annotation(
//!     &registry,
//!     &person,
//!     BoundingBox::from_corners(10.0, 20.0, 100.0, 200.0)?,
//!     false,
//! )?;
//! assert_eq!(image.annotations()[0].area(), 90.0 * 180.0);
//! # Ok::<(), annoconv::AnnoconvError>(())
//! ```

pub mod adapter;
mod bbox;
mod coord;
mod ids;
pub mod io_coco_json;
pub mod io_polytext;
pub mod io_voc_xml;
mod model;
pub mod probe;
mod registry;

// Re-export core types for convenient access
pub use adapter::{Capabilities, DecodeOptions, FormatAdapter};
pub use bbox::BoundingBox;
pub use coord::Point;
pub use ids::{AnnotationId, CategoryId, ImageId};
pub use model::{Annotation, CanonicalImage, Dataset, ImageMeta};
pub use probe::{ImageSizeProbe, ImagesizeProbe};
pub use registry::{Category, CategoryCreation, CategoryRecord, CategoryRegistry};
