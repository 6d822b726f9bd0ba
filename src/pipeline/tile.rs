//! Tiling engine: lay screenshots out on one canvas and write the composite.
//!
//! Layout is computed as a pure [`LayoutPlan`] before any pixel is touched,
//! which keeps the arithmetic independently testable and the pixel work a
//! dumb copy loop. Three shapes exist:
//!
//! * **Vertical** — images stacked top-to-bottom, horizontally centred.
//! * **Horizontal** — images in one row left-to-right, vertically centred.
//! * **Grid** — horizontal with a `max_per_row` bound; rows wrap in input
//!   order and each image is vertically centred within its own row.
//!
//! Invariants: placements never overlap, and the canvas is the minimal
//! bounding box covering all placements plus the configured margins.
//! Uncovered canvas area is opaque white.

use crate::error::Shot2DataError;
use crate::output::CompositeInfo;
use crate::pipeline::input::{self, ImageDescriptor};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Subdirectory of the source directory that receives composites.
pub const MERGED_SUBDIR: &str = "merged";

/// Tiling direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Stack images top-to-bottom. (default)
    #[default]
    Vertical,
    /// Place images left-to-right, wrapping when `max_per_row` is set.
    Horizontal,
}

/// Encoding format for the written composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// JPEG at the configured quality. (default)
    #[default]
    Jpeg,
    /// Lossless PNG; `quality` is ignored.
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

/// Options for one compose operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TileOptions {
    pub direction: Direction,
    /// Pixel gap between adjacent images (and between rows). Default: 10.
    pub margin: u32,
    /// Row-wrap bound for horizontal tiling; ignored for vertical.
    pub max_per_row: Option<NonZeroUsize>,
    pub format: OutputFormat,
    /// JPEG quality, 1-100. Default: 85.
    pub quality: u8,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Vertical,
            margin: 10,
            max_per_row: None,
            format: OutputFormat::Jpeg,
            quality: 85,
        }
    }
}

/// Top-left corner of one image on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

/// A computed layout: one placement per input image, in input order, plus
/// the canvas dimensions. Derived, never persisted.
#[derive(Debug, Clone)]
pub struct LayoutPlan {
    pub placements: Vec<Placement>,
    pub width: u32,
    pub height: u32,
}

/// Compute placements for the given image dimensions.
///
/// `dims` is `(width, height)` per image, in input order. An empty slice
/// yields an empty 0x0 plan; callers that treat empty input as an error
/// (all of them, today) validate before calling.
pub fn plan_layout(
    dims: &[(u32, u32)],
    direction: Direction,
    margin: u32,
    max_per_row: Option<NonZeroUsize>,
) -> LayoutPlan {
    match direction {
        Direction::Vertical => plan_vertical(dims, margin),
        Direction::Horizontal => match max_per_row {
            Some(k) => plan_grid(dims, margin, k.get()),
            None => plan_row(dims, margin),
        },
    }
}

fn plan_vertical(dims: &[(u32, u32)], margin: u32) -> LayoutPlan {
    let width = dims.iter().map(|d| d.0).max().unwrap_or(0);
    let mut placements = Vec::with_capacity(dims.len());
    let mut y = 0u32;
    for (i, &(w, h)) in dims.iter().enumerate() {
        if i > 0 {
            y += margin;
        }
        placements.push(Placement {
            x: (width - w) / 2,
            y,
        });
        y += h;
    }
    LayoutPlan {
        placements,
        width,
        height: y,
    }
}

fn plan_row(dims: &[(u32, u32)], margin: u32) -> LayoutPlan {
    let height = dims.iter().map(|d| d.1).max().unwrap_or(0);
    let mut placements = Vec::with_capacity(dims.len());
    let mut x = 0u32;
    for (i, &(w, h)) in dims.iter().enumerate() {
        if i > 0 {
            x += margin;
        }
        placements.push(Placement {
            x,
            y: (height - h) / 2,
        });
        x += w;
    }
    LayoutPlan {
        placements,
        width: x,
        height,
    }
}

fn plan_grid(dims: &[(u32, u32)], margin: u32, per_row: usize) -> LayoutPlan {
    let mut placements = Vec::with_capacity(dims.len());
    let mut canvas_width = 0u32;
    let mut y = 0u32;

    for (row_index, row) in dims.chunks(per_row).enumerate() {
        if row_index > 0 {
            y += margin;
        }
        let row_height = row.iter().map(|d| d.1).max().unwrap_or(0);
        let mut x = 0u32;
        for (i, &(w, h)) in row.iter().enumerate() {
            if i > 0 {
                x += margin;
            }
            placements.push(Placement {
                x,
                y: y + (row_height - h) / 2,
            });
            x += w;
        }
        canvas_width = canvas_width.max(x);
        y += row_height;
    }

    LayoutPlan {
        placements,
        width: canvas_width,
        height: y,
    }
}

/// Compose the images onto a white canvas according to the options.
///
/// Empty input is an error, not a no-op: a silent empty composite would be
/// submitted to the provider and billed for nothing.
pub fn compose(
    images: &[ImageDescriptor],
    options: &TileOptions,
) -> Result<RgbImage, Shot2DataError> {
    if images.is_empty() {
        return Err(Shot2DataError::EmptyImageSet);
    }

    let dims: Vec<(u32, u32)> = images.iter().map(|d| (d.width, d.height)).collect();
    let plan = plan_layout(&dims, options.direction, options.margin, options.max_per_row);
    debug!(
        "Layout: {} images on {}x{} canvas",
        images.len(),
        plan.width,
        plan.height
    );

    let mut canvas = RgbImage::from_pixel(plan.width, plan.height, Rgb([255, 255, 255]));
    for (descriptor, placement) in images.iter().zip(&plan.placements) {
        image::imageops::overlay(
            &mut canvas,
            &descriptor.image.to_rgb8(),
            placement.x as i64,
            placement.y as i64,
        );
    }
    Ok(canvas)
}

/// Encode the canvas and write it under `<source_dir>/merged/`.
///
/// The write is atomic (temp file + rename) so readers never observe a
/// partial composite.
pub fn write_composite(
    canvas: &RgbImage,
    source_dir: &Path,
    base_name: &str,
    options: &TileOptions,
) -> Result<PathBuf, Shot2DataError> {
    let out_dir = source_dir.join(MERGED_SUBDIR);
    std::fs::create_dir_all(&out_dir).map_err(|e| Shot2DataError::OutputWriteFailed {
        path: out_dir.clone(),
        source: e,
    })?;
    let out_path = out_dir.join(format!("{base_name}.{}", options.format.extension()));

    let mut buf = Vec::new();
    match options.format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), options.quality);
            canvas
                .write_with_encoder(encoder)
                .map_err(|e| Shot2DataError::EncodeFailed { source: e })?;
        }
        OutputFormat::Png => {
            canvas
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| Shot2DataError::EncodeFailed { source: e })?;
        }
    }

    let mut tmp = tempfile::NamedTempFile::new_in(&out_dir).map_err(|e| {
        Shot2DataError::OutputWriteFailed {
            path: out_path.clone(),
            source: e,
        }
    })?;
    tmp.write_all(&buf)
        .map_err(|e| Shot2DataError::OutputWriteFailed {
            path: out_path.clone(),
            source: e,
        })?;
    tmp.persist(&out_path)
        .map_err(|e| Shot2DataError::OutputWriteFailed {
            path: out_path.clone(),
            source: e.error,
        })?;

    debug!("Wrote composite: {}", out_path.display());
    Ok(out_path)
}

/// Merge every image in a directory into one composite file.
///
/// Decode and encode are CPU-bound, so the work runs in `spawn_blocking`
/// to keep async callers responsive.
pub async fn merge_directory(
    dir: impl AsRef<Path>,
    base_name: &str,
    options: &TileOptions,
) -> Result<CompositeInfo, Shot2DataError> {
    let dir = dir.as_ref().to_path_buf();
    let base_name = base_name.to_string();
    let options = *options;

    tokio::task::spawn_blocking(move || merge_directory_blocking(&dir, &base_name, &options))
        .await
        .map_err(|e| Shot2DataError::Internal(format!("Merge task panicked: {e}")))?
}

/// Blocking implementation of the directory merge.
fn merge_directory_blocking(
    dir: &Path,
    base_name: &str,
    options: &TileOptions,
) -> Result<CompositeInfo, Shot2DataError> {
    let images = input::load_images(dir)?;
    info!(
        "Composing {} images from {}",
        images.len(),
        dir.display()
    );

    let canvas = compose(&images, options)?;
    let path = write_composite(&canvas, dir, base_name, options)?;

    Ok(CompositeInfo {
        path,
        width: canvas.width(),
        height: canvas.height(),
        image_count: images.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn descriptor(w: u32, h: u32, rgb: [u8; 3]) -> ImageDescriptor {
        ImageDescriptor {
            path: PathBuf::from(format!("{w}x{h}.png")),
            width: w,
            height: h,
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb(rgb))),
        }
    }

    fn overlaps(a: (Placement, (u32, u32)), b: (Placement, (u32, u32))) -> bool {
        let (pa, (wa, ha)) = a;
        let (pb, (wb, hb)) = b;
        pa.x < pb.x + wb && pb.x < pa.x + wa && pa.y < pb.y + hb && pb.y < pa.y + ha
    }

    #[test]
    fn vertical_height_is_sum_plus_margins() {
        let dims = [(10, 20), (30, 40), (20, 10)];
        let plan = plan_layout(&dims, Direction::Vertical, 5, None);
        assert_eq!(plan.width, 30);
        assert_eq!(plan.height, 20 + 40 + 10 + 5 * 2);
        assert_eq!(
            plan.placements,
            vec![
                Placement { x: 10, y: 0 },
                Placement { x: 0, y: 25 },
                Placement { x: 5, y: 70 },
            ]
        );
    }

    #[test]
    fn horizontal_width_is_sum_plus_margins() {
        let dims = [(10, 20), (30, 40), (20, 10)];
        let plan = plan_layout(&dims, Direction::Horizontal, 5, None);
        assert_eq!(plan.height, 40);
        assert_eq!(plan.width, 10 + 30 + 20 + 5 * 2);
        assert_eq!(
            plan.placements,
            vec![
                Placement { x: 0, y: 10 },
                Placement { x: 15, y: 0 },
                Placement { x: 50, y: 15 },
            ]
        );
    }

    #[test]
    fn grid_row_count_is_ceil_n_over_k() {
        let dims = [(10, 10); 5];
        let plan = plan_layout(
            &dims,
            Direction::Horizontal,
            3,
            NonZeroUsize::new(2),
        );
        // 3 rows of heights 10 each, 2 margins between rows
        assert_eq!(plan.height, 10 * 3 + 3 * 2);
        // full rows are two tiles wide
        assert_eq!(plan.width, 10 + 3 + 10);
        assert_eq!(plan.placements.len(), 5);
        // last row starts at y = 2 * (10 + 3)
        assert_eq!(plan.placements[4], Placement { x: 0, y: 26 });
    }

    #[test]
    fn grid_height_sums_per_row_maxima() {
        let dims = [(10, 20), (10, 10), (10, 30)];
        let plan = plan_layout(&dims, Direction::Horizontal, 0, NonZeroUsize::new(2));
        assert_eq!(plan.height, 20 + 30);
        // second image centres within its 20-px row
        assert_eq!(plan.placements[1], Placement { x: 10, y: 5 });
        // third image opens the second row
        assert_eq!(plan.placements[2], Placement { x: 0, y: 20 });
    }

    #[test]
    fn grid_with_capacity_above_count_is_single_row() {
        let dims = [(10, 10), (20, 10)];
        let grid = plan_layout(&dims, Direction::Horizontal, 4, NonZeroUsize::new(5));
        let row = plan_layout(&dims, Direction::Horizontal, 4, None);
        assert_eq!(grid.width, row.width);
        assert_eq!(grid.height, row.height);
        assert_eq!(grid.placements, row.placements);
    }

    #[test]
    fn placements_never_overlap() {
        let dims = [(13, 7), (5, 31), (20, 20), (8, 8), (17, 3)];
        for (direction, k) in [
            (Direction::Vertical, None),
            (Direction::Horizontal, None),
            (Direction::Horizontal, NonZeroUsize::new(2)),
        ] {
            let plan = plan_layout(&dims, direction, 2, k);
            for i in 0..dims.len() {
                for j in (i + 1)..dims.len() {
                    assert!(
                        !overlaps(
                            (plan.placements[i], dims[i]),
                            (plan.placements[j], dims[j])
                        ),
                        "{direction:?} k={k:?}: placements {i} and {j} overlap"
                    );
                }
            }
        }
    }

    #[test]
    fn empty_dims_yield_empty_plan() {
        let plan = plan_layout(&[], Direction::Vertical, 5, None);
        assert_eq!((plan.width, plan.height), (0, 0));
        assert!(plan.placements.is_empty());
    }

    #[test]
    fn compose_rejects_empty_input() {
        let result = compose(&[], &TileOptions::default());
        assert!(matches!(result, Err(Shot2DataError::EmptyImageSet)));
    }

    #[test]
    fn compose_fills_background_white_and_centres() {
        let images = vec![
            descriptor(2, 2, [200, 0, 0]),
            descriptor(4, 2, [0, 0, 200]),
        ];
        let options = TileOptions {
            direction: Direction::Vertical,
            margin: 2,
            ..TileOptions::default()
        };
        let canvas = compose(&images, &options).expect("compose");
        assert_eq!((canvas.width(), canvas.height()), (4, 6));

        // first image is centred: x offset (4-2)/2 = 1
        assert_eq!(canvas.get_pixel(1, 0), &Rgb([200, 0, 0]));
        // the column left of it is background
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([255, 255, 255]));
        // margin row is background
        assert_eq!(canvas.get_pixel(1, 3), &Rgb([255, 255, 255]));
        // second image starts at y = 4
        assert_eq!(canvas.get_pixel(0, 4), &Rgb([0, 0, 200]));
    }

    #[test]
    fn write_composite_creates_merged_subdir() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let canvas = RgbImage::from_pixel(3, 3, Rgb([1, 2, 3]));
        let options = TileOptions {
            format: OutputFormat::Png,
            ..TileOptions::default()
        };
        let path = write_composite(&canvas, tmp.path(), "user42", &options).expect("write");
        assert_eq!(path, tmp.path().join("merged").join("user42.png"));

        let reloaded = image::open(&path).expect("reload");
        assert_eq!((reloaded.width(), reloaded.height()), (3, 3));
    }

    #[tokio::test]
    async fn merge_directory_end_to_end() {
        let tmp = tempfile::tempdir().expect("tempdir");
        for (name, w, h) in [("a.png", 4, 6), ("b.png", 8, 2)] {
            RgbImage::from_pixel(w, h, Rgb([9, 9, 9]))
                .save(tmp.path().join(name))
                .expect("save");
        }

        let options = TileOptions {
            direction: Direction::Vertical,
            margin: 3,
            format: OutputFormat::Png,
            ..TileOptions::default()
        };
        let info = merge_directory(tmp.path(), "run1", &options)
            .await
            .expect("merge");

        assert_eq!(info.image_count, 2);
        assert_eq!(info.width, 8);
        assert_eq!(info.height, 6 + 2 + 3);
        assert!(info.path.exists());
    }

    #[tokio::test]
    async fn merge_directory_missing_dir_errors() {
        let result = merge_directory("/no/such/dir", "x", &TileOptions::default()).await;
        assert!(matches!(
            result,
            Err(Shot2DataError::DirectoryNotFound { .. })
        ));
    }
}
