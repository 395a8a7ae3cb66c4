//! Reverse alpha blending against a solid backdrop.
//!
//! Flattening a partially transparent pixel onto a solid backdrop follows
//! `observed = alpha * original + (1 - alpha) * backdrop`.
//!
//! Only `observed` and `backdrop` are known, so alpha is estimated from how
//! far each channel sits from the backdrop (its coverage), and the original
//! color is then recovered by inverting the equation. All math runs in `f64`
//! levels of the input depth (`0..=255` for 8-bit) and is quantized back at
//! the end: alpha to the nearest level, recovered colors by adding just
//! under one half and flooring, so mathematical halves round down.

use image::{DynamicImage, ImageBuffer, Pixel, Rgb, Rgba};
use tracing::debug;

use crate::color::{AlphaStrategy, Background, Channel};

/// Options for the unblend transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnblendOptions {
    /// The backdrop the image was flattened against (white by default).
    pub background: Background,
    /// How per-channel coverage collapses into a single alpha.
    pub strategy: AlphaStrategy,
    /// Treat any existing input alpha as fully opaque instead of combining it
    /// with the estimate.
    pub ignore_input_alpha: bool,
}

/// Emitted for pixels that match the backdrop exactly.
const TRANSPARENT: [f64; 4] = [0.0; 4];

/// The smallest alpha that keeps one recovered channel inside `[0, max]`.
///
/// Below the backdrop this is `(b - o) / b`, above it `(o - b) / (max - b)`.
/// Against white it reduces to the channel deficit `(max - o) / max`.
#[must_use]
pub fn channel_coverage(observed: f64, backdrop: f64, max: f64) -> f64 {
    match observed.partial_cmp(&backdrop) {
        Some(std::cmp::Ordering::Less) => (backdrop - observed) / backdrop,
        Some(std::cmp::Ordering::Greater) => (observed - backdrop) / (max - backdrop),
        _ => 0.0,
    }
}

/// Estimate the original alpha of an observed color, in `[0, 1]`.
///
/// `rgb` holds levels of a channel whose full intensity is `max`.
#[must_use]
pub fn estimate_alpha(rgb: [f64; 3], max: f64, options: &UnblendOptions) -> f64 {
    let backdrop = options.background.levels(max);
    let coverage = std::array::from_fn(|i| channel_coverage(rgb[i], backdrop[i], max));
    options.strategy.aggregate(coverage).clamp(0.0, 1.0)
}

/// Unblend one pixel given as RGB levels plus its existing alpha level.
///
/// Returns straight (non-premultiplied) RGBA levels in `[0, max]`, not yet
/// quantized. A pixel with zero estimated alpha comes back as transparent
/// black.
#[must_use]
pub fn unblend_levels(
    rgb: [f64; 3],
    alpha_in: f64,
    max: f64,
    options: &UnblendOptions,
) -> [f64; 4] {
    let alpha = estimate_alpha(rgb, max, options);
    if alpha <= 0.0 {
        return TRANSPARENT;
    }

    let backdrop = options.background.levels(max);
    let mut out = [0.0; 4];
    for ((slot, observed), bg) in out.iter_mut().zip(rgb).zip(backdrop) {
        *slot = ((observed - (1.0 - alpha) * bg) / alpha).clamp(0.0, max);
    }

    let existing = if options.ignore_input_alpha {
        1.0
    } else {
        (alpha_in / max).clamp(0.0, 1.0)
    };
    out[3] = alpha * existing * max;
    out
}

/// Unblend a single RGBA pixel at any supported channel depth.
#[must_use]
pub fn unblend_pixel<C: Channel>(pixel: Rgba<C>, options: &UnblendOptions) -> Rgba<C> {
    let [r, g, b, a] = pixel.0;
    let [r, g, b, a] = unblend_levels(
        [r.to_level(), g.to_level(), b.to_level()],
        a.to_level(),
        C::LEVELS,
        options,
    );
    Rgba([
        C::from_level_ties_down(r),
        C::from_level_ties_down(g),
        C::from_level_ties_down(b),
        C::from_level(a),
    ])
}

/// Unblend a pixel from a source without alpha (treated as fully opaque).
#[must_use]
pub fn unblend_rgb<C: Channel>(pixel: Rgb<C>, options: &UnblendOptions) -> Rgba<C> {
    let [r, g, b] = pixel.0;
    unblend_pixel(Rgba([r, g, b, C::MAX]), options)
}

/// Flatten a pixel onto a solid backdrop (the forward blend).
#[must_use]
pub fn composite_over<C: Channel>(pixel: Rgba<C>, background: Background) -> Rgb<C> {
    let [r, g, b, a] = pixel.0;
    let alpha = a.to_level() / C::LEVELS;
    let mut out = [C::MAX; 3];
    for ((slot, fg), bg) in out.iter_mut().zip([r, g, b]).zip(background.levels(C::LEVELS)) {
        *slot = C::from_level(fg.to_level() * alpha + bg * (1.0 - alpha));
    }
    Rgb(out)
}

/// Unblend every pixel of an RGBA buffer in place.
///
/// Pixels are independent, so with the `parallel` feature the buffer is split
/// across the rayon pool; output is bit-identical to the sequential map.
pub fn unblend_buffer_in_place<C>(image: &mut ImageBuffer<Rgba<C>, Vec<C>>, options: &UnblendOptions)
where
    C: Channel,
    Rgba<C>: Pixel<Subpixel = C>,
{
    let samples: &mut [C] = image;

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        samples
            .par_chunks_exact_mut(4)
            .for_each(|px| unblend_chunk(px, options));
    }

    #[cfg(not(feature = "parallel"))]
    {
        samples
            .chunks_exact_mut(4)
            .for_each(|px| unblend_chunk(px, options));
    }
}

/// Unblend an RGBA buffer into a new buffer of the same dimensions.
#[must_use]
pub fn unblend_buffer<C>(
    image: &ImageBuffer<Rgba<C>, Vec<C>>,
    options: &UnblendOptions,
) -> ImageBuffer<Rgba<C>, Vec<C>>
where
    C: Channel,
    Rgba<C>: Pixel<Subpixel = C>,
{
    let mut out = image.clone();
    unblend_buffer_in_place(&mut out, options);
    out
}

fn unblend_chunk<C: Channel>(px: &mut [C], options: &UnblendOptions) {
    let out = unblend_pixel(Rgba([px[0], px[1], px[2], px[3]]), options);
    px.copy_from_slice(&out.0);
}

/// Unblend a decoded image of any color type.
///
/// The result is always RGBA with the same dimensions. 16-bit inputs yield
/// `Rgba16`, floating point inputs `Rgba32F`, everything else `Rgba8`.
/// Grey inputs are expanded to RGB first.
#[must_use]
pub fn unblend_image(image: &DynamicImage, options: &UnblendOptions) -> DynamicImage {
    debug!(
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        background = %options.background,
        strategy = %options.strategy,
        "unblending image"
    );

    match image {
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => {
            let mut out = image.to_rgba16();
            unblend_buffer_in_place(&mut out, options);
            DynamicImage::ImageRgba16(out)
        }
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            let mut out = image.to_rgba32f();
            unblend_buffer_in_place(&mut out, options);
            DynamicImage::ImageRgba32F(out)
        }
        _ => {
            let mut out = image.to_rgba8();
            unblend_buffer_in_place(&mut out, options);
            DynamicImage::ImageRgba8(out)
        }
    }
}
