//! Backdrop colors, alpha aggregation strategies and channel depths.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Rec. 601 luma weights for red, green and blue.
const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Added before flooring recovered colors; just under one half, so a level
/// that lands on or a hair below a half (inexact division) rounds down.
const TIE_DOWN_HALF: f64 = 0.5 - f64::EPSILON;

/// The solid color an image was flattened against before its background
/// was cut away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Background([u8; 3]);

impl Background {
    /// Pure white, the backdrop assumed unless told otherwise.
    pub const WHITE: Self = Self([255, 255, 255]);
    /// Pure black.
    pub const BLACK: Self = Self([0, 0, 0]);

    /// Create a backdrop from 8-bit RGB values.
    #[must_use]
    pub const fn from_rgb8(rgb: [u8; 3]) -> Self {
        Self(rgb)
    }

    /// The backdrop as 8-bit RGB values.
    #[must_use]
    pub const fn rgb8(self) -> [u8; 3] {
        self.0
    }

    /// The backdrop expressed in the levels of a channel whose full
    /// intensity is `max` (255 for 8-bit, 65535 for 16-bit, 1 for float).
    #[must_use]
    pub fn levels(self, max: f64) -> [f64; 3] {
        self.0.map(|v| f64::from(v) * max / 255.0)
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

impl FromStr for Background {
    type Err = Error;

    /// Accepts `#rgb`, `#rrggbb` (the `#` is optional), `white` and `black`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "white" => return Ok(Self::WHITE),
            "black" => return Ok(Self::BLACK),
            _ => {}
        }

        let invalid = || Error::InvalidColor(s.to_string());
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut rgb = [0u8; 3];
        match hex.len() {
            3 => {
                for (slot, digit) in rgb.iter_mut().zip(hex.chars()) {
                    let nibble = digit.to_digit(16).ok_or_else(invalid)?;
                    *slot = u8::try_from(nibble * 17).map_err(|_| invalid())?;
                }
            }
            6 => {
                for (i, slot) in rgb.iter_mut().enumerate() {
                    *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                        .map_err(|_| invalid())?;
                }
            }
            _ => return Err(invalid()),
        }
        Ok(Self(rgb))
    }
}

/// How the three per-channel coverage estimates collapse into one alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaStrategy {
    /// The largest channel coverage. A single saturated channel keeps the
    /// pixel opaque, so hue is never mistaken for transparency.
    #[default]
    Max,
    /// The arithmetic mean of the channel coverages.
    Average,
    /// Channel coverages weighted by Rec. 601 luma coefficients.
    Luminance,
}

impl AlphaStrategy {
    /// Collapse per-channel coverage (each in `[0, 1]`) into a single alpha.
    #[must_use]
    pub fn aggregate(self, coverage: [f64; 3]) -> f64 {
        let [r, g, b] = coverage;
        match self {
            Self::Max => r.max(g).max(b),
            Self::Average => (r + g + b) / 3.0,
            Self::Luminance => {
                LUMA_WEIGHTS[0] * r + LUMA_WEIGHTS[1] * g + LUMA_WEIGHTS[2] * b
            }
        }
    }
}

impl fmt::Display for AlphaStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Max => "max",
            Self::Average => "average",
            Self::Luminance => "luminance",
        })
    }
}

impl FromStr for AlphaStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" | "maximum" => Ok(Self::Max),
            "average" | "avg" | "mean" => Ok(Self::Average),
            "luminance" | "luma" => Ok(Self::Luminance),
            _ => Err(Error::UnknownStrategy(s.to_string())),
        }
    }
}

/// A color channel sample type with a fixed `[0, MAX]` range.
///
/// The transform works in `f64` levels of the storage depth (`0..=255` for
/// `u8`); this trait converts to and from those levels.
pub trait Channel: Copy + Send + Sync + 'static {
    /// The fully opaque / full intensity value.
    const MAX: Self;
    /// `MAX` as a level.
    const LEVELS: f64;

    /// The sample as a level in `[0, LEVELS]`.
    fn to_level(self) -> f64;

    /// Clamp and quantize a level, rounding to the nearest sample.
    fn from_level(level: f64) -> Self;

    /// Clamp and quantize a level by adding just under one half and
    /// flooring. Small exact halves and the near-halves left by inexact
    /// division round down.
    ///
    /// Used for recovered colors.
    fn from_level_ties_down(level: f64) -> Self;
}

impl Channel for u8 {
    const MAX: Self = u8::MAX;
    const LEVELS: f64 = 255.0;

    fn to_level(self) -> f64 {
        f64::from(self)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_level(level: f64) -> Self {
        level.clamp(0.0, Self::LEVELS).round() as u8
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_level_ties_down(level: f64) -> Self {
        (level.clamp(0.0, Self::LEVELS) + TIE_DOWN_HALF).floor() as u8
    }
}

impl Channel for u16 {
    const MAX: Self = u16::MAX;
    const LEVELS: f64 = 65535.0;

    fn to_level(self) -> f64 {
        f64::from(self)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_level(level: f64) -> Self {
        level.clamp(0.0, Self::LEVELS).round() as u16
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_level_ties_down(level: f64) -> Self {
        (level.clamp(0.0, Self::LEVELS) + TIE_DOWN_HALF).floor() as u16
    }
}

impl Channel for f32 {
    const MAX: Self = 1.0;
    const LEVELS: f64 = 1.0;

    fn to_level(self) -> f64 {
        f64::from(self).clamp(0.0, 1.0)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_level(level: f64) -> Self {
        level.clamp(0.0, 1.0) as f32
    }

    fn from_level_ties_down(level: f64) -> Self {
        Self::from_level(level)
    }
}
