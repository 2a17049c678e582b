// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The axis group contract shared by both group flavors.

use alloc::rc::Rc;
use core::fmt;

use crate::interval::Interval;
use crate::member::{AxisGroupMember, Membership};
use crate::notify::{ChangeNotifier, Subscription, Transaction};

/// Opaque token identifying one committed state of a group.
///
/// A group's marker changes exactly when its span/scale or tie coordinate
/// changes. Markers are only comparable between states of the same group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct StateMarker(u64);

impl StateMarker {
    pub(crate) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Bounds and scale of a view, derived from its group and pixel span.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisState {
    /// Logical pixel span the state was computed for.
    pub span_lpx: f64,
    /// Group state the values were derived from.
    pub marker: StateMarker,
    /// Visible data-space bounds.
    pub bounds: Interval,
    /// Logical pixels per data unit.
    pub scale: f64,
}

/// Requested visible range, in one of three shapes.
///
/// Every shape is normalized to an anchor `(frac, coord)` plus a span or
/// scale before constraints are applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AxisRequest {
    /// Show exactly these bounds.
    Bounds(Interval),
    /// Show `[min, max]`; the edges may be given in either order.
    Edges {
        /// One edge of the requested bounds.
        min: f64,
        /// The other edge of the requested bounds.
        max: f64,
    },
    /// Put `coord` at fraction `frac` of the view, at `scale` logical pixels per unit.
    Anchor {
        /// Fraction of the view (0 = min edge, 1 = max edge).
        frac: f64,
        /// Data coordinate to place at `frac`.
        coord: f64,
        /// Logical pixels per data unit.
        scale: f64,
    },
}

impl AxisRequest {
    /// Creates an [`AxisRequest::Edges`].
    #[must_use]
    pub fn edges(min: f64, max: f64) -> Self {
        Self::Edges { min, max }
    }

    /// Creates an [`AxisRequest::Anchor`].
    #[must_use]
    pub fn anchor(frac: f64, coord: f64, scale: f64) -> Self {
        Self::Anchor { frac, coord, scale }
    }

    /// Normalizes to `(frac, coord, span)` for a caller showing `span_lpx` logical pixels.
    ///
    /// Bounds-shaped requests are anchored at `tie_frac`.
    #[must_use]
    pub fn to_anchor_span(self, tie_frac: f64, span_lpx: f64) -> (f64, f64, f64) {
        match self {
            Self::Bounds(bounds) => (tie_frac, bounds.value_at_frac(tie_frac), bounds.span()),
            Self::Edges { min, max } => {
                Self::Bounds(Interval::new(min, max)).to_anchor_span(tie_frac, span_lpx)
            }
            Self::Anchor { frac, coord, scale } => (frac, coord, span_lpx / scale),
        }
    }

    /// Normalizes to `(frac, coord, scale)` for a caller showing `span_lpx` logical pixels.
    #[must_use]
    pub fn to_anchor_scale(self, tie_frac: f64, span_lpx: f64) -> (f64, f64, f64) {
        match self {
            Self::Anchor { frac, coord, scale } => (frac, coord, scale),
            other => {
                let (frac, coord, span) = other.to_anchor_span(tie_frac, span_lpx);
                (frac, coord, span_lpx / span)
            }
        }
    }

    /// The span this request asks a view of `span_lpx` logical pixels to show.
    #[must_use]
    pub fn requested_span(self, span_lpx: f64) -> f64 {
        self.to_anchor_span(0.5, span_lpx).2
    }
}

impl From<Interval> for AxisRequest {
    fn from(bounds: Interval) -> Self {
        Self::Bounds(bounds)
    }
}

/// Errors reported by group membership operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisGroupError {
    /// The member is already registered with this group.
    AlreadyMember,
}

impl fmt::Display for AxisGroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyMember => f.write_str("axis is already a member of this group"),
        }
    }
}

impl core::error::Error for AxisGroupError {}

/// Shared numeric state for a set of linked views.
///
/// Implemented by [`CommonBoundsAxisGroup1D`](crate::CommonBoundsAxisGroup1D)
/// and [`CommonScaleAxisGroup1D`](crate::CommonScaleAxisGroup1D). Mutating
/// operations take the caller's logical pixel span (`span_lpx`) and queue
/// their change notifications into `tx`.
///
/// Updates whose constrained result is not finite, or falls outside the
/// valid span/scale range, are discarded without notification.
pub trait AxisGroup {
    /// Requests new visible bounds.
    fn set(&self, tx: &mut Transaction, ongoing: bool, span_lpx: f64, request: AxisRequest);

    /// Moves the anchor so `coord` sits at `frac`, keeping the current span/scale.
    fn pan(&self, tx: &mut Transaction, ongoing: bool, span_lpx: f64, frac: f64, coord: f64);

    /// Re-applies the current state through the members' constraints.
    fn reconstrain(&self, tx: &mut Transaction, ongoing: bool);

    /// Token of the current committed state.
    fn state_marker(&self) -> StateMarker;

    /// Bounds and scale seen by a view showing `span_lpx` logical pixels.
    fn compute_axis_state(&self, span_lpx: f64) -> AxisState;

    /// The fixed anchor fraction of this group.
    fn tie_frac(&self) -> f64;

    /// A new group with this group's numeric state, no members and no lock.
    fn snapshot(&self) -> Rc<dyn AxisGroup>;

    /// Registers a member; the member leaves when the [`Membership`] drops.
    fn register_member(
        &self,
        member: Rc<dyn AxisGroupMember>,
    ) -> Result<Membership, AxisGroupError>;

    /// Number of registered members.
    fn member_count(&self) -> usize;

    /// Forwards this group's change notifications to `target`.
    fn forward_changes(&self, target: &Rc<ChangeNotifier>) -> Subscription;
}

impl fmt::Debug for dyn AxisGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisGroup")
            .field("marker", &self.state_marker())
            .field("tie_frac", &self.tie_frac())
            .field("member_count", &self.member_count())
            .finish_non_exhaustive()
    }
}

/// Checks a candidate span or scale against the valid range.
pub(crate) fn is_valid_extent(value: f64, valid: Interval) -> bool {
    value.is_finite() && valid.contains(value)
}

/// Bounds with `tie_coord` at `tie_frac` of a span of `span`.
pub(crate) fn bounds_around(tie_coord: f64, tie_frac: f64, span: f64) -> Interval {
    let min = tie_coord - tie_frac * span;
    Interval::new(min, min + span)
}

/// Clamps a caller's `tie_frac`, falling back to the center for NaN.
pub(crate) fn sanitize_tie_frac(tie_frac: f64) -> f64 {
    if tie_frac.is_nan() {
        0.5
    } else {
        tie_frac.clamp(0.0, 1.0)
    }
}
