//! The contract every on-disk format implements.
//!
//! An adapter turns raw text into [`CanonicalImage`]s and back. Decoding is
//! pure apart from registering categories in the supplied registry (and an
//! optional image-size probe); encoding only reads. Conversions compose one
//! adapter's decode with another's encode, so a new format needs one adapter
//! rather than one converter per pair.

use std::path::{Path, PathBuf};

use super::ids::ImageId;
use super::model::CanonicalImage;
use super::probe::ImageSizeProbe;
use super::registry::{CategoryCreation, CategoryRegistry};
use crate::error::AnnoconvError;

/// What an adapter can carry through a decode/encode cycle.
///
/// Anything marked `false` is dropped when encoding into the format. This is
/// a documented property of the format, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Category identity survives; `false` collapses every box into one
    /// synthetic category on decode and writes no category on encode.
    pub preserves_categories: bool,
    /// Supercategory names survive.
    pub preserves_supercategories: bool,
    /// The image file name survives.
    pub preserves_file_name: bool,
    /// The `is_crowd` flag survives.
    pub preserves_crowd: bool,
    /// One file holds many images (otherwise exactly one image per file).
    pub multi_image: bool,
}

/// Caller-supplied context for a decode.
#[derive(Clone, Copy)]
pub struct DecodeOptions<'a> {
    /// Whether unseen category names may be registered.
    pub creation: CategoryCreation,
    /// Id given to the image of single-image formats.
    pub image_id: ImageId,
    /// File name to use when the format does not carry one.
    pub file_name: Option<&'a str>,
    /// Image file to probe when the format does not carry a size.
    pub image_path: Option<&'a Path>,
    /// Directory joined with the decoded file name to find the image to probe.
    pub image_dir: Option<&'a Path>,
    /// Size probe; without one, a missing size is an error.
    pub probe: Option<&'a dyn ImageSizeProbe>,
}

impl Default for DecodeOptions<'_> {
    fn default() -> Self {
        Self {
            creation: CategoryCreation::Allow,
            image_id: ImageId::new(1),
            file_name: None,
            image_path: None,
            image_dir: None,
            probe: None,
        }
    }
}

impl std::fmt::Debug for DecodeOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("creation", &self.creation)
            .field("image_id", &self.image_id)
            .field("file_name", &self.file_name)
            .field("image_path", &self.image_path)
            .field("image_dir", &self.image_dir)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

impl DecodeOptions<'_> {
    /// Where the image called `file_name` lives, if the caller told us.
    pub fn image_location(&self, file_name: &str) -> Option<PathBuf> {
        if let Some(path) = self.image_path {
            return Some(path.to_path_buf());
        }
        self.image_dir
            .filter(|_| !file_name.is_empty())
            .map(|dir| dir.join(file_name))
    }

    /// Probes the size of the image called `file_name`.
    ///
    /// # Errors
    /// - [`AnnoconvError::MissingImageSize`] when there is no image location or no probe
    /// - [`AnnoconvError::ImageUnreadable`] when the probe fails
    pub fn probe_size(&self, file_name: &str) -> Result<(u32, u32), AnnoconvError> {
        let missing = || AnnoconvError::MissingImageSize {
            file_name: file_name.to_string(),
        };
        let path = self.image_location(file_name).ok_or_else(missing)?;
        let probe = self.probe.ok_or_else(missing)?;

        let (width, height) = probe.image_size(&path)?;
        tracing::debug!(path = %path.display(), width, height, "probed image size");
        Ok((width, height))
    }
}

/// Decode/encode pair for one on-disk annotation format.
pub trait FormatAdapter: Sync {
    /// Short stable name, e.g. `"coco"`.
    fn name(&self) -> &'static str;

    /// File extension of encoded output, without the dot.
    fn extension(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Parses `raw` into canonical images, registering categories in `registry`.
    ///
    /// On error nothing is returned and `registry` is unchanged.
    fn decode(
        &self,
        raw: &str,
        registry: &mut CategoryRegistry,
        options: &DecodeOptions<'_>,
    ) -> Result<Vec<CanonicalImage>, AnnoconvError>;

    /// Serializes `images` deterministically.
    ///
    /// Single-image formats fail with [`AnnoconvError::SingleImageRequired`]
    /// unless exactly one image is given.
    fn encode(
        &self,
        images: &[CanonicalImage],
        registry: &CategoryRegistry,
    ) -> Result<String, AnnoconvError>;
}

/// Returns the only image of a single-image encode.
pub(crate) fn single_image<'a>(
    format: &'static str,
    images: &'a [CanonicalImage],
) -> Result<&'a CanonicalImage, AnnoconvError> {
    match images {
        [image] => Ok(image),
        _ => Err(AnnoconvError::SingleImageRequired {
            format,
            count: images.len(),
        }),
    }
}
