//! Error types for the rebuild-transparency crate.

/// Errors raised around the unblend transform: parsing options, decoding
/// inputs and encoding outputs. The per-pixel transform itself cannot fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A background color string could not be parsed.
    #[error("invalid color {0:?} (expected #rgb, #rrggbb, white or black)")]
    InvalidColor(String),

    /// An alpha aggregation strategy name was not recognised.
    #[error("unknown alpha strategy {0:?} (expected max, average or luminance)")]
    UnknownStrategy(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output format is unknown or cannot store an alpha channel.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image decoding or encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
