//! Image augmentation driver
//!
//! For every stored source image this module writes six derived images
//! next to it: three rotations (90, 180, 270 degrees), two axis flips,
//! and one diagonal transpose. Files that are themselves augmentation
//! outputs are recognized by their name suffix and never re-augmented.

use crate::error::{DatagenError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions the driver treats as source images
pub const IMAGE_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "jpg", "jpeg"];

/// The fixed set of derived images produced per source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Augmentation {
    Rotate90,
    Rotate180,
    Rotate270,
    FlipHorizontal,
    FlipVertical,
    /// Reflection across the main diagonal (fliph of rot90); kept in
    /// the set so all six derived geometries are distinct
    Transpose,
}

impl Augmentation {
    /// All augmentations, in output order
    pub const ALL: [Augmentation; 6] = [
        Self::Rotate90,
        Self::Rotate180,
        Self::Rotate270,
        Self::FlipHorizontal,
        Self::FlipVertical,
        Self::Transpose,
    ];

    /// File-name suffix appended before the extension
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Rotate90 => "_rot90",
            Self::Rotate180 => "_rot180",
            Self::Rotate270 => "_rot270",
            Self::FlipHorizontal => "_fliph",
            Self::FlipVertical => "_flipv",
            Self::Transpose => "_transpose",
        }
    }

    /// Apply the transform to an image
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        match self {
            Self::Rotate90 => image.rotate90(),
            Self::Rotate180 => image.rotate180(),
            Self::Rotate270 => image.rotate270(),
            Self::FlipHorizontal => image.fliph(),
            Self::FlipVertical => image.flipv(),
            Self::Transpose => image.rotate90().fliph(),
        }
    }
}

/// Configuration for one augmentation run
#[derive(Debug, Clone)]
pub struct AugmentConfig {
    /// Directory scanned for source images
    pub input_dir: PathBuf,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Extensions treated as source images (lowercase, no dot)
    pub extensions: Vec<String>,
    /// Rewrite derived files that already exist
    pub overwrite: bool,
}

impl AugmentConfig {
    /// Configuration with the default extension set, recursive
    pub fn new<P: Into<PathBuf>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
            recursive: true,
            extensions: IMAGE_EXTENSIONS.iter().map(ToString::to_string).collect(),
            overwrite: false,
        }
    }
}

/// Summary of an augmentation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AugmentReport {
    /// Source images processed
    pub sources: usize,
    /// Derived files written
    pub written: usize,
    /// Derived files skipped because they already existed
    pub skipped: usize,
}

/// Path of one derived image: `{stem}{suffix}.{ext}` next to the source
pub fn augmented_path(source: &Path, augmentation: Augmentation) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            DatagenError::invalid_config(format!(
                "Source path '{}' has no usable file stem",
                source.display()
            ))
        })?;
    let ext = source
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("png");
    Ok(source.with_file_name(format!("{}{}.{}", stem, augmentation.suffix(), ext)))
}

/// Whether a file name carries one of the augmentation suffixes
pub fn is_augmented_output(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    Augmentation::ALL
        .iter()
        .any(|aug| stem.ends_with(aug.suffix()))
}

/// Augment a single source image, writing the six derived files next
/// to it. Returns the number of files written vs skipped.
///
/// # Errors
/// - Source cannot be loaded
/// - A derived image cannot be encoded or written
pub fn augment_image(source: &Path, overwrite: bool) -> Result<(usize, usize)> {
    let image = image::open(source)?;

    let mut written = 0;
    let mut skipped = 0;
    for augmentation in Augmentation::ALL {
        let target = augmented_path(source, augmentation)?;
        if !overwrite && target.exists() {
            skipped += 1;
            continue;
        }
        augmentation.apply(&image).save(&target)?;
        written += 1;
    }
    log::debug!(
        "augmented {}: {} written, {} skipped",
        source.display(),
        written,
        skipped
    );
    Ok((written, skipped))
}

/// Walk the input directory and augment every source image found.
///
/// # Errors
/// - Input directory does not exist
/// - Any source fails to load or any derived file fails to write
pub fn augment_directory(config: &AugmentConfig) -> Result<AugmentReport> {
    if !config.input_dir.is_dir() {
        return Err(DatagenError::invalid_config(format!(
            "Input directory '{}' does not exist",
            config.input_dir.display()
        )));
    }

    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let mut report = AugmentReport::default();

    for entry in WalkDir::new(&config.input_dir)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            DatagenError::internal(format!(
                "Failed to walk '{}': {}",
                config.input_dir.display(),
                e
            ))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_extension(path, &config.extensions) || is_augmented_output(path) {
            continue;
        }

        let (written, skipped) = augment_image(path, config.overwrite)?;
        report.sources += 1;
        report.written += written;
        report.skipped += skipped;
    }

    log::info!(
        "augmented {} source images: {} files written, {} skipped",
        report.sources,
        report.written,
        report.skipped
    );
    Ok(report)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| extensions.iter().any(|e| e == &ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    /// 2x3 image with a unique color per pixel
    fn sample() -> DynamicImage {
        let mut img = RgbImage::new(2, 3);
        for (i, pixel) in img.pixels_mut().enumerate() {
            *pixel = Rgb([i as u8 * 10, 0, 255 - i as u8 * 10]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_exactly_six_augmentations() {
        assert_eq!(Augmentation::ALL.len(), 6);
        let suffixes: std::collections::HashSet<&str> =
            Augmentation::ALL.iter().map(|a| a.suffix()).collect();
        assert_eq!(suffixes.len(), 6);
    }

    #[test]
    fn test_four_quarter_turns_are_identity() {
        let img = sample();
        let rotated = Augmentation::Rotate90.apply(
            &Augmentation::Rotate90.apply(
                &Augmentation::Rotate90.apply(&Augmentation::Rotate90.apply(&img)),
            ),
        );
        assert_eq!(img.as_bytes(), rotated.as_bytes());
    }

    #[test]
    fn test_flips_and_transpose_are_involutions() {
        let img = sample();
        for aug in [
            Augmentation::FlipHorizontal,
            Augmentation::FlipVertical,
            Augmentation::Transpose,
        ] {
            let twice = aug.apply(&aug.apply(&img));
            assert_eq!(img.as_bytes(), twice.as_bytes(), "{aug:?} is not an involution");
        }
    }

    #[test]
    fn test_rotations_compose() {
        let img = sample();
        let twice = Augmentation::Rotate90.apply(&Augmentation::Rotate90.apply(&img));
        assert_eq!(
            Augmentation::Rotate180.apply(&img).as_bytes(),
            twice.as_bytes()
        );
        let back = Augmentation::Rotate270.apply(&Augmentation::Rotate90.apply(&img));
        assert_eq!(img.as_bytes(), back.as_bytes());
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let img = sample();
        let rot = Augmentation::Rotate90.apply(&img);
        assert_eq!((rot.width(), rot.height()), (img.height(), img.width()));
        let rot180 = Augmentation::Rotate180.apply(&img);
        assert_eq!((rot180.width(), rot180.height()), (img.width(), img.height()));
    }

    #[test]
    fn test_augmented_path_naming() {
        let p = augmented_path(Path::new("/data/4326/2020-01-01/layer.tif"), Augmentation::Rotate90)
            .unwrap();
        assert_eq!(p, PathBuf::from("/data/4326/2020-01-01/layer_rot90.tif"));

        assert!(is_augmented_output(&p));
        assert!(!is_augmented_output(Path::new("layer.tif")));
    }

    #[test]
    fn test_augment_image_writes_six_files() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("scene.png");
        sample().save(&source).unwrap();

        let (written, skipped) = augment_image(&source, false).unwrap();
        assert_eq!((written, skipped), (6, 0));
        for aug in Augmentation::ALL {
            assert!(augmented_path(&source, aug).unwrap().exists());
        }

        // second run skips everything unless overwrite is requested
        let (written, skipped) = augment_image(&source, false).unwrap();
        assert_eq!((written, skipped), (0, 6));
        let (written, skipped) = augment_image(&source, true).unwrap();
        assert_eq!((written, skipped), (6, 0));
    }

    #[test]
    fn test_augment_directory_skips_derived_outputs() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("4326").join("2020-01-01");
        std::fs::create_dir_all(&nested).unwrap();
        sample().save(nested.join("a.png")).unwrap();
        sample().save(nested.join("b.png")).unwrap();
        std::fs::write(nested.join("notes.txt"), "not an image").unwrap();

        let report = augment_directory(&AugmentConfig::new(tmp.path())).unwrap();
        assert_eq!(report.sources, 2);
        assert_eq!(report.written, 12);

        // running again finds the same two sources, never the outputs
        let report = augment_directory(&AugmentConfig::new(tmp.path())).unwrap();
        assert_eq!(report.sources, 2);
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped, 12);
    }

    #[test]
    fn test_augment_directory_non_recursive() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        sample().save(tmp.path().join("top.png")).unwrap();
        sample().save(nested.join("below.png")).unwrap();

        let mut config = AugmentConfig::new(tmp.path());
        config.recursive = false;
        let report = augment_directory(&config).unwrap();
        assert_eq!(report.sources, 1);
    }

    #[test]
    fn test_missing_input_dir_rejected() {
        let err = augment_directory(&AugmentConfig::new("/no/such/dir")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
