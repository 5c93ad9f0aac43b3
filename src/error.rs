use std::path::PathBuf;
use thiserror::Error;

use crate::conversion::ConversionReport;
use crate::ir::{CategoryId, ImageId};

/// The main error type for annoconv operations.
#[derive(Debug, Error)]
pub enum AnnoconvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The raw input does not have the structural shape its format requires.
    #[error("Malformed {format} input: {message}")]
    MalformedInput {
        format: &'static str,
        message: String,
    },

    /// A degenerate, inverted or non-finite box.
    #[error("Invalid geometry: {message}")]
    InvalidGeometry { message: String },

    /// A category handed to the model that its registry never issued.
    #[error("Category {id} ('{name}') is not registered in this model's category registry")]
    UnresolvedCategory { id: CategoryId, name: String },

    #[error("Unknown category id {0}")]
    UnknownCategoryId(CategoryId),

    #[error("Unknown category name '{0}' (creating new categories is not allowed)")]
    UnknownCategoryName(String),

    #[error("Image size for '{file_name}' is missing and could not be probed")]
    MissingImageSize { file_name: String },

    #[error("Failed to read image size from {path}: {message}")]
    ImageUnreadable { path: PathBuf, message: String },

    #[error(
        "Image '{file_name}' is declared as {declared_width}x{declared_height} \
         but the file is {actual_width}x{actual_height}"
    )]
    ImageSizeMismatch {
        file_name: String,
        declared_width: u32,
        declared_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Image id must be positive, got {0}")]
    InvalidImageId(ImageId),

    #[error("Duplicate image id {0}")]
    DuplicateImageId(ImageId),

    #[error("{format} holds exactly one image per file, but {count} image(s) were given")]
    SingleImageRequired { format: &'static str, count: usize },

    #[error("Failed to write JSON: {source}")]
    JsonWrite {
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse category ledger {path}: {source}")]
    CategoryLedgerParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "Conversion from {} to {} is lossy; rerun with --allow-lossy to proceed",
        .report.from,
        .report.to
    )]
    LossyConversion { report: Box<ConversionReport> },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{}: {source}", .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<AnnoconvError>,
    },

    #[cfg(feature = "render")]
    #[error("Rendering failed: {0}")]
    Render(#[from] image::ImageError),

    #[cfg(feature = "render")]
    #[error("Failed to load font {path}: {message}")]
    FontUnreadable { path: PathBuf, message: String },
}

impl AnnoconvError {
    /// Attaches the file the error originated from.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        AnnoconvError::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }

    pub(crate) fn malformed(format: &'static str, message: impl Into<String>) -> Self {
        AnnoconvError::MalformedInput {
            format,
            message: message.into(),
        }
    }

    pub(crate) fn geometry(message: impl Into<String>) -> Self {
        AnnoconvError::InvalidGeometry {
            message: message.into(),
        }
    }
}
