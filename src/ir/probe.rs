//! Reading image dimensions from image files.
//!
//! Decoders that meet an annotation without a usable size ask an
//! [`ImageSizeProbe`] instead of guessing. The probe is the only I/O a decode
//! can trigger, and callers choose whether to provide one.

use std::path::Path;

use crate::error::AnnoconvError;

/// Something that can report `(width, height)` for an image file.
pub trait ImageSizeProbe: Sync {
    /// # Errors
    /// [`AnnoconvError::ImageUnreadable`] if the file is missing or not an image.
    fn image_size(&self, path: &Path) -> Result<(u32, u32), AnnoconvError>;
}

/// Probe backed by the `imagesize` crate; reads only the file header.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImagesizeProbe;

impl ImageSizeProbe for ImagesizeProbe {
    fn image_size(&self, path: &Path) -> Result<(u32, u32), AnnoconvError> {
        let size = imagesize::size(path).map_err(|source| AnnoconvError::ImageUnreadable {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;

        let width: u32 = size
            .width
            .try_into()
            .map_err(|_| AnnoconvError::ImageUnreadable {
                path: path.to_path_buf(),
                message: format!("image width {} does not fit in u32", size.width),
            })?;

        let height: u32 = size
            .height
            .try_into()
            .map_err(|_| AnnoconvError::ImageUnreadable {
                path: path.to_path_buf(),
                message: format!("image height {} does not fit in u32", size.height),
            })?;

        Ok((width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_unreadable() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = ImagesizeProbe
            .image_size(&temp.path().join("nope.png"))
            .unwrap_err();
        assert!(matches!(err, AnnoconvError::ImageUnreadable { .. }));
    }

    #[test]
    fn non_image_file_is_unreadable() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("notes.jpg");
        std::fs::write(&path, "not an image").expect("write file");

        let err = ImagesizeProbe.image_size(&path).unwrap_err();
        assert!(matches!(err, AnnoconvError::ImageUnreadable { .. }));
    }
}
