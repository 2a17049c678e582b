// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt;

/// Closed interval `[min, max]` over `f64`.
///
/// Intervals are immutable values. [`Interval::new`] orders its endpoints so
/// that `min <= max` always holds for non-NaN inputs. Infinite endpoints are
/// allowed and are used to express "unconstrained" sides.
#[derive(Clone, Copy, PartialEq)]
pub struct Interval {
    min: f64,
    max: f64,
}

/// Smallest span (or scale) an axis group will ever commit.
const SMALLEST_VALID: f64 = f64::MIN_POSITIVE;

impl Interval {
    /// The unconstrained interval `(-∞, +∞)`.
    pub const ALL: Self = Self {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    /// Range of spans an axis group may commit.
    ///
    /// Both ends are finite, so `1.0 / span` is finite for every span inside.
    pub const VALID_SPAN: Self = Self {
        min: SMALLEST_VALID,
        max: 1.0 / SMALLEST_VALID,
    };

    /// Range of scales (logical pixels per data unit) an axis group may commit.
    pub const VALID_SCALE: Self = Self::VALID_SPAN;

    /// Creates an interval from two endpoints, in either order.
    #[must_use]
    pub fn new(a: f64, b: f64) -> Self {
        if b < a {
            Self { min: b, max: a }
        } else {
            Self { min: a, max: b }
        }
    }

    /// Creates the degenerate interval `[value, value]`.
    #[must_use]
    pub fn point(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Lower endpoint.
    #[must_use]
    #[inline]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Upper endpoint.
    #[must_use]
    #[inline]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Returns `max - min`.
    #[must_use]
    #[inline]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Returns `true` if both endpoints are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Returns `true` if `value` lies inside the closed interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Clamps `value` into the interval.
    ///
    /// NaN inputs stay NaN, so callers can detect them after the fact.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Returns the overlap of two intervals, or `None` if they are disjoint.
    #[must_use]
    pub fn intersect(&self, other: Self) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(Self { min, max })
    }

    /// Translates both endpoints by `delta`.
    #[must_use]
    pub fn shift(&self, delta: f64) -> Self {
        Self::new(self.min + delta, self.max + delta)
    }

    /// Multiplies both endpoints by `factor`.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.min * factor, self.max * factor)
    }

    /// Returns the value at fraction `frac` of the interval (0 = min, 1 = max).
    #[must_use]
    pub fn value_at_frac(&self, frac: f64) -> f64 {
        self.min + frac * self.span()
    }

    /// Returns the fraction of the interval at which `value` sits.
    ///
    /// This is the inverse of [`Interval::value_at_frac`]; for a zero-span
    /// interval the result is not finite.
    #[must_use]
    pub fn frac_of(&self, value: f64) -> f64 {
        (value - self.min) / self.span()
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}, {:?}]", self.min, self.max)
    }
}

impl From<core::ops::Range<f64>> for Interval {
    fn from(range: core::ops::Range<f64>) -> Self {
        Self::new(range.start, range.end)
    }
}
