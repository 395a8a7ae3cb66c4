//! Recover the alpha channel of images anti-aliased against a solid backdrop.
//!
//! When a logo or drawing with soft, anti-aliased edges is flattened onto a
//! white background, its edge pixels become a blend of the original color and
//! white. Cutting the background away leaves those pale fringes behind, which
//! show up as halos on any other background. This crate reverses the blend
//! per pixel: it estimates how opaque each pixel originally was from how far
//! it sits from white, then removes the white contribution from its color.
//!
//! # Quick Start
//!
//! ```no_run
//! use rebuild_transparency::{UnblendEngine, UnblendOptions};
//!
//! let engine = UnblendEngine::new(UnblendOptions::default());
//! let img = image::open("edges.png").unwrap();
//! let restored = engine.unblend_image(&img);
//! restored.save("edges_transparent.png").unwrap();
//! ```
//!
//! # Per-pixel use
//!
//! ```
//! use image::Rgba;
//! use rebuild_transparency::{unblend_pixel, UnblendOptions};
//!
//! let opts = UnblendOptions::default();
//! // a washed-out gray is black at partial coverage
//! assert_eq!(unblend_pixel(Rgba([200u8, 200, 200, 255]), &opts), Rgba([0, 0, 0, 55]));
//! // saturated hues are not mistaken for transparency
//! assert_eq!(unblend_pixel(Rgba([255u8, 0, 0, 255]), &opts), Rgba([255, 0, 0, 255]));
//! ```

#![deny(missing_docs)]

pub mod color;
mod engine;
pub mod error;
pub mod unblending;

pub use color::{AlphaStrategy, Background, Channel};
pub use engine::{
    default_output_path, is_supported_image, output_file_name, save_image, CoverageStats,
    ProcessResult, UnblendEngine,
};
pub use error::{Error, Result};
pub use unblending::{composite_over, unblend_image, unblend_pixel, unblend_rgb, UnblendOptions};
