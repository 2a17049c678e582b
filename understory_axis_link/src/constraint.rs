// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Constraint combination.
//!
//! [`combine`] never produces an empty interval: when its operands are
//! disjoint it returns a one-ULP interval hugging the edge of the first
//! operand closest to the second. Folding it over several constraints is
//! therefore order-dependent, and callers pass constraints from the most
//! authoritative to the least.

use crate::interval::Interval;
use crate::member::AxisGroupMember;

/// Combines two constraints, giving `a` priority when they conflict.
///
/// - Overlapping operands yield their intersection.
/// - If `a` lies entirely below `b`, the result is `[next_down(a.max), a.max]`.
/// - If `a` lies entirely above `b`, the result is `[a.min, next_up(a.min)]`.
///
/// ```rust
/// use understory_axis_link::{Interval, combine};
///
/// let low = Interval::new(0.0, 1.0);
/// let high = Interval::new(2.0, 3.0);
/// assert_eq!(combine(low, high), Interval::new(1.0_f64.next_down(), 1.0));
/// assert_eq!(combine(high, low), Interval::new(2.0, 2.0_f64.next_up()));
/// ```
#[must_use]
pub fn combine(a: Interval, b: Interval) -> Interval {
    if a.max() < b.min() {
        Interval::new(a.max().next_down(), a.max())
    } else if b.max() < a.min() {
        Interval::new(a.min(), a.min().next_up())
    } else {
        Interval::new(a.min().max(b.min()), a.max().min(b.max()))
    }
}

/// Which constraint to read from each member while folding.
///
/// The derived selectors convert a member's constraint into the requested
/// quantity through that member's own `span_lpx`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintSelector {
    /// The lower-edge constraint.
    Min,
    /// The upper-edge constraint.
    Max,
    /// The span constraint.
    Span,
    /// The scale constraint.
    Scale,
    /// The scale constraint expressed as a span: `span_lpx / scale`.
    SpanFromScale,
    /// The span implied by the lower- and upper-edge constraints together.
    SpanFromEdges,
    /// The span constraint expressed as a scale: `span_lpx / span`.
    ScaleFromSpan,
    /// The span implied by the edge constraints, expressed as a scale.
    ScaleFromEdges,
}

impl ConstraintSelector {
    /// Reads the selected constraint from `member`.
    #[must_use]
    pub fn select<M: AxisGroupMember + ?Sized>(self, member: &M) -> Interval {
        match self {
            Self::Min => member.min_constraint(),
            Self::Max => member.max_constraint(),
            Self::Span => member.span_constraint(),
            Self::Scale => member.scale_constraint(),
            Self::SpanFromScale => reciprocal(member.span_lpx(), member.scale_constraint()),
            Self::SpanFromEdges => {
                span_from_edges(member.min_constraint(), member.max_constraint())
            }
            Self::ScaleFromSpan => reciprocal(member.span_lpx(), member.span_constraint()),
            Self::ScaleFromEdges => reciprocal(
                member.span_lpx(),
                span_from_edges(member.min_constraint(), member.max_constraint()),
            ),
        }
    }
}

/// Folds `selector` over `members`, starting from `start`.
#[must_use]
pub fn fold_constraints<'a, M, I>(start: Interval, members: I, selector: ConstraintSelector) -> Interval
where
    M: AxisGroupMember + ?Sized + 'a,
    I: IntoIterator<Item = &'a M>,
{
    members
        .into_iter()
        .fold(start, |acc, m| combine(acc, selector.select(m)))
}

/// Folds `selector` over `members`, starting from [`Interval::ALL`].
#[must_use]
pub fn combine_axis_constraints<'a, M, I>(members: I, selector: ConstraintSelector) -> Interval
where
    M: AxisGroupMember + ?Sized + 'a,
    I: IntoIterator<Item = &'a M>,
{
    fold_constraints(Interval::ALL, members, selector)
}

/// Span of the visible bounds for one member while searching for a tie coordinate.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TieSpan {
    /// Every member shows the same span (shared bounds).
    Fixed(f64),
    /// Each member's span follows from a shared scale and its own pixel size.
    FromScale(f64),
}

impl TieSpan {
    fn for_member<M: AxisGroupMember + ?Sized>(self, member: &M) -> f64 {
        match self {
            Self::Fixed(span) => span,
            Self::FromScale(scale) => member.span_lpx() / scale,
        }
    }
}

/// Constraint on the tie coordinate implied by the members' edge constraints.
///
/// For a member showing `span`, its lower edge sits at
/// `tie - tie_frac * span` and its upper edge at `tie + (1 - tie_frac) * span`.
/// Each edge constraint is shifted accordingly. The min-derived and
/// max-derived folds are then combined with the preferred side first.
pub(crate) fn tie_constraint<'a, M, I>(
    members: I,
    tie_frac: f64,
    span: TieSpan,
    prioritize_min: bool,
) -> Interval
where
    M: AxisGroupMember + ?Sized + 'a,
    I: IntoIterator<Item = &'a M> + Clone,
{
    let shifted = |edge_frac: f64, selector: ConstraintSelector| {
        members.clone().into_iter().fold(Interval::ALL, |acc, m| {
            let member_span = span.for_member(m);
            let raw = selector.select(m);
            let shifted = if member_span.is_finite() {
                raw.shift(edge_frac * member_span)
            } else {
                raw
            };
            combine(acc, shifted)
        })
    };
    let from_min = shifted(tie_frac, ConstraintSelector::Min);
    let from_max = shifted(tie_frac - 1.0, ConstraintSelector::Max);
    if prioritize_min {
        combine(from_min, from_max)
    } else {
        combine(from_max, from_min)
    }
}

/// Converts a span (or scale) interval into the reciprocal quantity.
///
/// With `numerator = span_lpx`, a scale interval becomes a span interval and
/// vice versa. Non-positive lower ends are treated as zero, which maps to an
/// unbounded upper end. A view without a usable pixel span imposes nothing.
pub(crate) fn reciprocal(numerator: f64, interval: Interval) -> Interval {
    if !(numerator > 0.0 && numerator.is_finite()) {
        return Interval::ALL;
    }
    let lo = interval.min().max(0.0);
    let hi = interval.max().max(0.0);
    Interval::new(numerator / hi, numerator / lo)
}

/// Span range implied by independent lower- and upper-edge constraints.
pub(crate) fn span_from_edges(min: Interval, max: Interval) -> Interval {
    Interval::new(max.min() - min.max(), max.max() - min.min())
}
