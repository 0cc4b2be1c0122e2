// Copyright 2024 Google LLC
// SPDX-License-Identifier: MIT

//! Simple types.
//!
//! This module defines the error type and the small value types shared by the pipe mapper, the
//! bandwidth model, and the validator.

use super::formats;
use std::{cmp, fmt, num, result};

/// The error type for display pipe operations.
#[derive(thiserror::Error, Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A generic error with a descriptive message to provide the context.
    #[error("{0}")]
    Context(&'static str),
    /// A validation error indicating a bad user input.
    #[error("bad user input")]
    User,
    /// Indicates an unsupported operation.
    #[error("unsupported")]
    Unsupported,
    /// A validation error indicating a bad integer.
    #[error("bad integer conversion")]
    IntegerConversion,
    /// An allocation failed while constructing the resource pool.
    #[error("out of memory")]
    OutOfMemory,
    /// A hardware block or the firmware failed during construction.
    #[error("hardware initialization failure")]
    HardwareInitFailure,
    /// No pipe context is free.
    #[error("no free pipe")]
    NoFreePipe,
    /// No stream encoder is free.
    #[error("no free stream encoder")]
    NoStreamEncoder,
    /// No clock source is free.
    #[error("no free clock source")]
    NoClockSource,
    /// No display stream compressor is free.
    #[error("no display stream compressor available")]
    NoCompressorResource,
    /// A horizontal split would leave a half narrower than the required margin.
    #[error("pipe split is infeasible")]
    SplitInfeasible,
    /// Output combine and plane overlay were requested on the same pipe.
    #[error("unsupported split combination")]
    UnsupportedSplitCombination,
    /// No feasibility level satisfies the configuration.
    #[error("bandwidth exceeded")]
    BandwidthExceeded,
}

impl Error {
    pub(crate) fn ctx<T>(s: &'static str) -> Result<T> {
        Err(Error::Context(s))
    }

    pub(crate) fn user<T>() -> Result<T> {
        Err(Error::User)
    }

    pub(crate) fn unsupported<T>() -> Result<T> {
        Err(Error::Unsupported)
    }
}

impl From<num::TryFromIntError> for Error {
    fn from(_err: num::TryFromIntError) -> Self {
        Self::IntegerConversion
    }
}

/// A specialized `Result` type for display pipe operations.
pub(crate) type Result<T> = result::Result<T, Error>;

/// A 32-bit DRM format.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Format(pub u32);

impl Format {
    pub(crate) fn is_invalid(&self) -> bool {
        *self == formats::INVALID
    }
}

impl Default for Format {
    fn default() -> Self {
        formats::INVALID
    }
}

impl<T> From<T> for Format
where
    T: Into<u32>,
{
    fn from(val: T) -> Self {
        Self(val.into())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(name) = formats::name(*self) {
            write!(f, "{}", name)
        } else {
            write!(f, "{}", formats::fourcc(*self))
        }
    }
}

/// A signed fixed-point number with 32 fractional bits.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Fixed31_32(pub i64);

impl Fixed31_32 {
    const FRACTION_BITS: u32 = 32;

    /// The value 1.
    pub const ONE: Self = Self(1 << Self::FRACTION_BITS);

    /// Returns `num / den`.
    ///
    /// Returns 0 when `den` is 0.
    pub fn from_fraction(num: i64, den: i64) -> Self {
        if den == 0 {
            return Self(0);
        }

        let val = ((num as i128) << Self::FRACTION_BITS) / den as i128;
        Self(val as i64)
    }

    /// Returns `self * val`.
    pub fn mul_int(self, val: i32) -> Self {
        Self(self.0.saturating_mul(val as i64))
    }

    /// Returns `self / val`.
    pub fn div_int(self, val: i64) -> Self {
        if val == 0 {
            return self;
        }
        Self(self.0 / val)
    }

    /// Rounds towards negative infinity.
    pub fn floor(self) -> i32 {
        (self.0 >> Self::FRACTION_BITS) as i32
    }

    /// Converts to a floating-point number.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / (1u64 << Self::FRACTION_BITS) as f64
    }

    pub(crate) fn is_one(self) -> bool {
        self == Self::ONE
    }
}

/// A rectangle in pixels.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Rect {
    /// The left edge.
    pub x: i32,
    /// The top edge.
    pub y: i32,
    /// The width.
    pub width: i32,
    /// The height.
    pub height: i32,
}

impl Rect {
    /// Creates a rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub(crate) fn intersect(&self, other: &Rect) -> Rect {
        let x = cmp::max(self.x, other.x);
        let y = cmp::max(self.y, other.y);
        let right = cmp::min(self.x + self.width, other.x + other.width);
        let bottom = cmp::min(self.y + self.height, other.y + other.height);

        Rect {
            x,
            y,
            width: cmp::max(right - x, 0),
            height: cmp::max(bottom - y, 0),
        }
    }
}
