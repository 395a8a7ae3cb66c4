//! File-level driver around the unblend transform.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::{debug, instrument, warn};

use crate::color::Channel;
use crate::error::{Error, Result};
use crate::unblending::{self, UnblendOptions};

/// Extensions of formats that can store an alpha channel.
const ALPHA_EXTENSIONS: &[&str] = &["png", "webp", "bmp", "tif", "tiff", "tga", "qoi", "exr"];

/// Where one batch input is written, or the path it would have taken and why
/// it was refused.
type Target = std::result::Result<PathBuf, (PathBuf, String)>;

/// How many output pixels ended up transparent, partially transparent or
/// opaque.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageStats {
    /// Pixels with zero alpha.
    pub transparent: u64,
    /// Pixels with alpha strictly between zero and full.
    pub partial: u64,
    /// Pixels with full alpha.
    pub opaque: u64,
}

impl CoverageStats {
    /// Count alpha coverage of an image at its native depth.
    #[must_use]
    pub fn from_image(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgba8(buf) => Self::tally(buf.pixels().map(|p| p.0[3])),
            DynamicImage::ImageRgba16(buf) => Self::tally(buf.pixels().map(|p| p.0[3])),
            DynamicImage::ImageRgba32F(buf) => Self::tally(buf.pixels().map(|p| p.0[3])),
            other => Self::tally(other.to_rgba8().pixels().map(|p| p.0[3])),
        }
    }

    /// Total number of pixels counted.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.transparent + self.partial + self.opaque
    }

    fn tally<C: Channel + PartialEq>(alphas: impl Iterator<Item = C>) -> Self {
        let zero = C::from_level(0.0);
        let mut stats = Self::default();
        for alpha in alphas {
            if alpha == zero {
                stats.transparent += 1;
            } else if alpha == C::MAX {
                stats.opaque += 1;
            } else {
                stats.partial += 1;
            }
        }
        stats
    }
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the input file.
    pub path: PathBuf,
    /// Path the output was (or would have been) written to.
    pub output: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Alpha coverage of the written output, when it was produced.
    pub stats: Option<CoverageStats>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn failed(path: &Path, output: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            output: output.to_path_buf(),
            success: false,
            stats: None,
            message,
        }
    }
}

/// Applies the unblend transform to pixels, images and files with a fixed set
/// of options.
///
/// The engine holds no per-image state; one instance can serve any number of
/// images, from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct UnblendEngine {
    options: UnblendOptions,
}

impl UnblendEngine {
    /// Create an engine with the given options.
    #[must_use]
    pub fn new(options: UnblendOptions) -> Self {
        Self { options }
    }

    /// The options this engine applies.
    #[must_use]
    pub fn options(&self) -> &UnblendOptions {
        &self.options
    }

    /// Unblend a single pixel.
    #[must_use]
    pub fn unblend_pixel<C: Channel>(&self, pixel: Rgba<C>) -> Rgba<C> {
        unblending::unblend_pixel(pixel, &self.options)
    }

    /// Unblend a decoded image, returning an RGBA image of the same size.
    #[must_use]
    pub fn unblend_image(&self, image: &DynamicImage) -> DynamicImage {
        unblending::unblend_image(image, &self.options)
    }

    /// Unblend an 8-bit RGBA image in place.
    pub fn unblend_in_place(&self, image: &mut RgbaImage) {
        unblending::unblend_buffer_in_place(image, &self.options);
    }

    /// Process a single image file: load, unblend, save.
    ///
    /// Never panics; failures are reported through the returned
    /// [`ProcessResult`].
    #[must_use]
    #[instrument(level = "debug", skip_all, fields(input = %input.display()))]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        let dyn_img = match image::open(input) {
            Ok(img) => img,
            Err(e) => return ProcessResult::failed(input, output, format!("Failed to load: {e}")),
        };

        if carries_transparency(&dyn_img) {
            if self.options.ignore_input_alpha {
                warn!(
                    input = %input.display(),
                    "existing transparency will not be used in the conversion"
                );
            } else {
                debug!("combining existing transparency with the estimate");
            }
        }

        let unblended = self.unblend_image(&dyn_img);

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ProcessResult::failed(
                        input,
                        output,
                        format!("Failed to create output directory: {e}"),
                    );
                }
            }
        }

        if let Err(e) = save_image(&unblended, output) {
            return ProcessResult::failed(input, output, format!("Failed to save: {e}"));
        }

        let stats = CoverageStats::from_image(&unblended);
        debug!(
            output = %output.display(),
            transparent = stats.transparent,
            partial = stats.partial,
            opaque = stats.opaque,
            "transparency restored"
        );

        ProcessResult {
            path: input.to_path_buf(),
            output: output.to_path_buf(),
            success: true,
            stats: Some(stats),
            message: "Transparency restored".to_string(),
        }
    }

    /// Process all supported images in a directory.
    ///
    /// Output files land in `output_dir` under [`output_file_name`]. When two
    /// inputs map to the same output (`logo.jpg` and `logo.png`), the one
    /// keeping its own name wins and the other fails without writing. Uses
    /// parallel iteration when the `parallel` feature is enabled.
    #[must_use]
    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path) -> Vec<ProcessResult> {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_dir,
                    output_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };
        entries.sort();
        debug!(count = entries.len(), dir = %input_dir.display(), "found images");

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failed(
                    output_dir,
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        let targets = plan_outputs(&entries, output_dir);
        let run = |(input, target): (&PathBuf, &Target)| match target {
            Ok(output) => self.process_file(input, output),
            Err((output, message)) => {
                warn!(input = %input.display(), "{message}");
                ProcessResult::failed(input, output, message.clone())
            }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            entries.par_iter().zip(targets.par_iter()).map(run).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            entries.iter().zip(targets.iter()).map(run).collect()
        }
    }
}

/// Assign each batch input its output path, refusing inputs whose output name
/// (compared case-insensitively) is already taken. Inputs that keep their own
/// file name claim first, then the rest in path order.
fn plan_outputs(inputs: &[PathBuf], output_dir: &Path) -> Vec<Target> {
    let names: Vec<Option<PathBuf>> = inputs.iter().map(|p| output_file_name(p)).collect();
    let key = |name: &Path| name.to_string_lossy().to_lowercase();

    let mut order: Vec<usize> = (0..inputs.len()).collect();
    order.sort_by_key(|&i| (names[i].as_deref() != inputs[i].file_name().map(Path::new), i));

    let mut claimed: HashMap<String, usize> = HashMap::new();
    for &i in &order {
        if let Some(name) = &names[i] {
            claimed.entry(key(name)).or_insert(i);
        }
    }

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let Some(name) = name else {
                return Err((output_dir.to_path_buf(), "Input has no file name".to_string()));
            };
            let target = output_dir.join(&name);
            match claimed.get(&key(&name)) {
                Some(&owner) if owner != i => {
                    let message = format!(
                        "Output name {} collides with {}",
                        name.display(),
                        inputs[owner].display()
                    );
                    Err((target, message))
                }
                _ => Ok(target),
            }
        })
        .collect()
}

/// Whether an image has an alpha channel that is not uniformly opaque.
fn carries_transparency(image: &DynamicImage) -> bool {
    if !image.color().has_alpha() {
        return false;
    }
    let stats = CoverageStats::from_image(image);
    stats.opaque != stats.total()
}

fn can_store_alpha(ext: &str) -> bool {
    ALPHA_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Check if a file has a supported input image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg") || can_store_alpha(ext)
        }
        None => false,
    }
}

/// Save an unblended image, converting to a depth the target format can hold.
///
/// PNG and TIFF keep 8- or 16-bit samples (float becomes 16-bit), WebP, BMP,
/// TGA and QOI are written as 8-bit RGBA, OpenEXR as 32-bit float.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] if the extension is unknown or the
/// format cannot store an alpha channel, or an I/O / encoding error.
pub fn save_image(img: &DynamicImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Png | ImageFormat::Tiff => match img {
            DynamicImage::ImageRgba8(_) | DynamicImage::ImageRgba16(_) => {
                img.save_with_format(path, format)?;
            }
            other => DynamicImage::ImageRgba16(other.to_rgba16()).save_with_format(path, format)?,
        },
        ImageFormat::WebP | ImageFormat::Bmp | ImageFormat::Tga | ImageFormat::Qoi => match img {
            DynamicImage::ImageRgba8(_) => img.save_with_format(path, format)?,
            other => DynamicImage::ImageRgba8(other.to_rgba8()).save_with_format(path, format)?,
        },
        ImageFormat::OpenExr => match img {
            DynamicImage::ImageRgba32F(_) => img.save_with_format(path, format)?,
            other => {
                DynamicImage::ImageRgba32F(other.to_rgba32f()).save_with_format(path, format)?;
            }
        },
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "{other:?} cannot store an alpha channel"
            )));
        }
    }

    Ok(())
}

/// File name for an unblended copy of `input`.
///
/// The extension is kept when the format can store alpha, otherwise the
/// output becomes PNG: `"logo.webp"` stays `"logo.webp"`, `"logo.jpg"` becomes
/// `"logo.png"`.
#[must_use]
pub fn output_file_name(input: &Path) -> Option<PathBuf> {
    let stem = input.file_stem()?.to_string_lossy();
    Some(PathBuf::from(format!("{stem}.{}", output_extension(input))))
}

fn output_extension(input: &Path) -> String {
    match input.extension().and_then(|e| e.to_str()) {
        Some(ext) if can_store_alpha(ext) => ext.to_string(),
        _ => "png".to_string(),
    }
}

/// Generate a default output path from an input path.
///
/// Example: `"logo.png"` becomes `"logo_transparent.png"`, `"logo.jpg"`
/// becomes `"logo_transparent.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_transparent.{}", output_extension(input)))
}
