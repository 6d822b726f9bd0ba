//! Input resolution: scan a screenshot directory and decode its images.
//!
//! Only JPEG and PNG files qualify; anything else in the directory is
//! ignored by the scan. Qualifying files are returned sorted by file name
//! so composites are deterministic regardless of directory-entry order.
//! A single decode failure aborts the whole load: a partially-composed
//! image would silently drop user data, which is worse than failing loud.

use crate::error::Shot2DataError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One loaded source image.
///
/// Immutable once loaded; a descriptor belongs to a single compose call.
pub struct ImageDescriptor {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub image: DynamicImage,
}

/// File extensions that qualify as input images.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// List the qualifying image files in a directory, sorted by file name.
///
/// Returns an error for a missing or unreadable directory; an existing
/// directory with no qualifying files returns an empty list (callers that
/// require images use [`load_images`]).
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>, Shot2DataError> {
    if !dir.exists() {
        return Err(Shot2DataError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(Shot2DataError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Shot2DataError::PermissionDenied {
            path: dir.to_path_buf(),
        },
        _ => Shot2DataError::Internal(format!("Failed to read '{}': {e}", dir.display())),
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| Shot2DataError::Internal(format!("Directory entry: {e}")))?;
        let path = entry.path();
        if path.is_file() && has_image_extension(&path) {
            paths.push(path);
        }
    }

    paths.sort();
    debug!("Found {} image files in {}", paths.len(), dir.display());
    Ok(paths)
}

/// Load and decode every qualifying image in a directory.
///
/// Errors when the directory holds no qualifying files, or when any single
/// file fails to decode (the underlying decode error is surfaced and no
/// partial result is returned).
pub fn load_images(dir: &Path) -> Result<Vec<ImageDescriptor>, Shot2DataError> {
    let paths = scan_directory(dir)?;
    if paths.is_empty() {
        return Err(Shot2DataError::NoImagesFound {
            path: dir.to_path_buf(),
        });
    }
    paths.into_iter().map(load_image).collect()
}

/// Decode one image file into a descriptor.
pub fn load_image(path: PathBuf) -> Result<ImageDescriptor, Shot2DataError> {
    let image = image::open(&path).map_err(|e| Shot2DataError::DecodeFailed {
        path: path.clone(),
        source: e,
    })?;
    debug!(
        "Loaded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(ImageDescriptor {
        width: image.width(),
        height: image.height(),
        path,
        image,
    })
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, Rgb([10, 20, 30]))
            .save(&path)
            .expect("save png");
        path
    }

    #[test]
    fn scan_filters_and_sorts() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_png(tmp.path(), "b.png", 2, 2);
        write_png(tmp.path(), "a.png", 2, 2);
        std::fs::write(tmp.path().join("notes.txt"), "ignore me").expect("write");
        std::fs::write(tmp.path().join("c.gif"), [0x47, 0x49, 0x46]).expect("write");

        let paths = scan_directory(tmp.path()).expect("scan");
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn scan_accepts_uppercase_extensions() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = write_png(tmp.path(), "shot.png", 2, 2);
        std::fs::rename(&src, tmp.path().join("SHOT.PNG")).expect("rename");

        let paths = scan_directory(tmp.path()).expect("scan");
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn scan_missing_directory_errors() {
        let result = scan_directory(Path::new("/definitely/not/here"));
        assert!(matches!(
            result,
            Err(Shot2DataError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn scan_file_path_is_not_a_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let file = write_png(tmp.path(), "shot.png", 2, 2);
        assert!(matches!(
            scan_directory(&file),
            Err(Shot2DataError::NotADirectory { .. })
        ));
    }

    #[test]
    fn load_images_empty_directory_errors() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            load_images(tmp.path()),
            Err(Shot2DataError::NoImagesFound { .. })
        ));
    }

    #[test]
    fn load_images_aborts_on_corrupt_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_png(tmp.path(), "good.png", 2, 2);
        std::fs::write(tmp.path().join("bad.png"), b"not a png at all").expect("write");

        let result = load_images(tmp.path());
        assert!(matches!(result, Err(Shot2DataError::DecodeFailed { .. })));
    }

    #[test]
    fn load_image_reports_dimensions() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = write_png(tmp.path(), "shot.png", 7, 9);
        let desc = load_image(path).expect("load");
        assert_eq!((desc.width, desc.height), (7, 9));
    }
}
