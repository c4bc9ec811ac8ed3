//! Pixel <-> seconds conversion for the timeline view.
//! Positions are always stored in seconds; zoom only changes the mapping.
use serde::{Deserialize, Serialize};

pub const DEFAULT_PIXELS_PER_SECOND: f64 = 100.0;
pub const MIN_PIXELS_PER_SECOND: f64 = 25.0;
pub const MAX_PIXELS_PER_SECOND: f64 = 400.0;

pub fn to_pixels(seconds: f64, pixels_per_second: f64) -> f64 {
    seconds * pixels_per_second
}

pub fn to_seconds(pixels: f64, pixels_per_second: f64) -> f64 {
    pixels / pixels_per_second
}

/// Shared zoom factor, bounded to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zoom {
    pixels_per_second: f64,
    min: f64,
    max: f64,
}

impl Zoom {
    /// Inverted bounds are swapped; non-finite or non-positive bounds fall
    /// back to the defaults.
    pub fn new(pixels_per_second: f64, min: f64, max: f64) -> Self {
        let (min, max) = if min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 {
            (min.min(max), min.max(max))
        } else {
            (MIN_PIXELS_PER_SECOND, MAX_PIXELS_PER_SECOND)
        };
        let mut zoom = Self {
            pixels_per_second: DEFAULT_PIXELS_PER_SECOND,
            min,
            max,
        };
        zoom.set(pixels_per_second);
        zoom
    }

    pub fn pixels_per_second(&self) -> f64 {
        self.pixels_per_second
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Returns the value actually applied after clamping.
    pub fn set(&mut self, pixels_per_second: f64) -> f64 {
        if pixels_per_second.is_finite() {
            self.pixels_per_second = pixels_per_second.clamp(self.min, self.max);
        }
        self.pixels_per_second
    }

    pub fn to_pixels(&self, seconds: f64) -> f64 {
        to_pixels(seconds, self.pixels_per_second)
    }

    pub fn to_seconds(&self, pixels: f64) -> f64 {
        to_seconds(pixels, self.pixels_per_second)
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self::new(
            DEFAULT_PIXELS_PER_SECOND,
            MIN_PIXELS_PER_SECOND,
            MAX_PIXELS_PER_SECOND,
        )
    }
}
