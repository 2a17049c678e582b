// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::rc::Rc;
use core::cell::Cell;
use core::fmt;

use crate::constraint::{ConstraintSelector, TieSpan, fold_constraints, tie_constraint};
use crate::group::{
    AxisGroup, AxisGroupError, AxisRequest, AxisState, StateMarker, bounds_around,
    is_valid_extent, sanitize_tie_frac,
};
use crate::interval::Interval;
use crate::member::{AxisGroupMember, MemberSet, Membership, members_of};
use crate::notify::{ChangeNotifier, Subscription, Transaction};

#[derive(Clone, Copy, Debug, PartialEq)]
struct BoundsState {
    span: f64,
    tie_coord: f64,
}

/// Axis group whose members all show the same data bounds.
///
/// Each member's scale follows from its own pixel size: a wider view shows
/// the same bounds at a larger scale. The group tracks the shared span and
/// the coordinate sitting at the fixed anchor fraction `tie_frac`.
///
/// ```rust
/// use understory_axis_link::{
///     AxisGroup, AxisRequest, CommonBoundsAxisGroup1D, Interval, Transaction,
/// };
///
/// let group = CommonBoundsAxisGroup1D::new(Interval::new(-10.0, 10.0));
/// let mut tx = Transaction::new();
/// group.set(&mut tx, false, 500.0, AxisRequest::edges(0.0, 100.0));
/// tx.commit();
///
/// assert_eq!(group.bounds(), Interval::new(0.0, 100.0));
/// assert_eq!(group.compute_axis_state(500.0).scale, 5.0);
/// ```
pub struct CommonBoundsAxisGroup1D {
    tie_frac: f64,
    state: Cell<BoundsState>,
    marker: Cell<StateMarker>,
    prioritize_min: Cell<bool>,
    members: MemberSet,
    notifier: ChangeNotifier,
}

impl CommonBoundsAxisGroup1D {
    /// Creates a group showing `bounds`, anchored at the center.
    #[must_use]
    pub fn new(bounds: Interval) -> Rc<Self> {
        Self::with_tie_frac(bounds, 0.5)
    }

    /// Creates a group showing `bounds`, anchored at `tie_frac`.
    ///
    /// `tie_frac` is clamped into `[0, 1]` (NaN becomes `0.5`). A span outside
    /// the valid range is clamped into it; a non-finite anchor falls back to
    /// zero.
    #[must_use]
    pub fn with_tie_frac(bounds: Interval, tie_frac: f64) -> Rc<Self> {
        let tie_frac = sanitize_tie_frac(tie_frac);
        let span = Interval::VALID_SPAN.clamp(bounds.span());
        let span = if span.is_nan() { 1.0 } else { span };
        let tie_coord = bounds.value_at_frac(tie_frac);
        let tie_coord = if tie_coord.is_finite() { tie_coord } else { 0.0 };
        Rc::new(Self::from_parts(tie_frac, BoundsState { span, tie_coord }, true))
    }

    fn from_parts(tie_frac: f64, state: BoundsState, prioritize_min: bool) -> Self {
        Self {
            tie_frac,
            state: Cell::new(state),
            marker: Cell::new(StateMarker::default()),
            prioritize_min: Cell::new(prioritize_min),
            members: MemberSet::default(),
            notifier: ChangeNotifier::new(),
        }
    }

    /// The shared span, in data units.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.state.get().span
    }

    /// The coordinate at `tie_frac` of the shared bounds.
    #[must_use]
    pub fn tie_coord(&self) -> f64 {
        self.state.get().tie_coord
    }

    /// The shared bounds.
    #[must_use]
    pub fn bounds(&self) -> Interval {
        let state = self.state.get();
        bounds_around(state.tie_coord, self.tie_frac, state.span)
    }

    /// Whether lower-edge constraints win over upper-edge constraints when
    /// both cannot hold.
    #[must_use]
    pub fn prioritize_min_constraint(&self) -> bool {
        self.prioritize_min.get()
    }

    /// Sets which edge constraint wins conflicts. Defaults to `true`.
    ///
    /// Takes effect at the next update; call [`AxisGroup::reconstrain`] to
    /// apply it immediately.
    pub fn set_prioritize_min_constraint(&self, prioritize_min: bool) {
        self.prioritize_min.set(prioritize_min);
    }

    /// Subscribes to committed changes; the callback receives the `ongoing` flag.
    pub fn subscribe(&self, callback: impl Fn(bool) + 'static) -> Subscription {
        self.notifier.subscribe(callback)
    }

    /// Applies a canonical `(frac, coord, span)` request through the members' constraints.
    fn apply(&self, tx: &mut Transaction, ongoing: bool, frac: f64, coord: f64, span: f64) {
        let list = self.members.snapshot();
        let members = members_of(&list);

        let span_constraint = [
            ConstraintSelector::Span,
            ConstraintSelector::SpanFromScale,
            ConstraintSelector::SpanFromEdges,
        ]
        .into_iter()
        .fold(Interval::VALID_SPAN, |acc, selector| {
            fold_constraints(acc, members.clone(), selector)
        });
        let span = span_constraint.clamp(span);

        let requested_tie = coord + (self.tie_frac - frac) * span;
        let tie_coord = tie_constraint(
            members,
            self.tie_frac,
            TieSpan::Fixed(span),
            self.prioritize_min.get(),
        )
        .clamp(requested_tie);

        if !is_valid_extent(span, Interval::VALID_SPAN) || !tie_coord.is_finite() {
            #[cfg(feature = "tracing")]
            tracing::debug!(span, tie_coord, "discarding invalid common-bounds update");
            return;
        }
        self.commit(tx, ongoing, BoundsState { span, tie_coord });
    }

    fn commit(&self, tx: &mut Transaction, ongoing: bool, state: BoundsState) {
        if self.state.get() == state {
            return;
        }
        self.state.set(state);
        self.marker.set(self.marker.get().next());
        self.notifier.enqueue(tx, ongoing);
    }
}

impl AxisGroup for CommonBoundsAxisGroup1D {
    fn set(&self, tx: &mut Transaction, ongoing: bool, span_lpx: f64, request: AxisRequest) {
        let (frac, coord, span) = request.to_anchor_span(self.tie_frac, span_lpx);
        self.apply(tx, ongoing, frac, coord, span);
    }

    fn pan(&self, tx: &mut Transaction, ongoing: bool, _span_lpx: f64, frac: f64, coord: f64) {
        self.apply(tx, ongoing, frac, coord, self.span());
    }

    fn reconstrain(&self, tx: &mut Transaction, ongoing: bool) {
        let state = self.state.get();
        self.apply(tx, ongoing, self.tie_frac, state.tie_coord, state.span);
    }

    fn state_marker(&self) -> StateMarker {
        self.marker.get()
    }

    fn compute_axis_state(&self, span_lpx: f64) -> AxisState {
        let state = self.state.get();
        AxisState {
            span_lpx,
            marker: self.marker.get(),
            bounds: bounds_around(state.tie_coord, self.tie_frac, state.span),
            scale: span_lpx / state.span,
        }
    }

    fn tie_frac(&self) -> f64 {
        self.tie_frac
    }

    fn snapshot(&self) -> Rc<dyn AxisGroup> {
        Rc::new(Self::from_parts(
            self.tie_frac,
            self.state.get(),
            self.prioritize_min.get(),
        ))
    }

    fn register_member(
        &self,
        member: Rc<dyn AxisGroupMember>,
    ) -> Result<Membership, AxisGroupError> {
        self.members.register(member)
    }

    fn member_count(&self) -> usize {
        self.members.len()
    }

    fn forward_changes(&self, target: &Rc<ChangeNotifier>) -> Subscription {
        self.notifier.forward_to(target)
    }
}

impl fmt::Debug for CommonBoundsAxisGroup1D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.get();
        f.debug_struct("CommonBoundsAxisGroup1D")
            .field("tie_frac", &self.tie_frac)
            .field("span", &state.span)
            .field("tie_coord", &state.tie_coord)
            .field("marker", &self.marker.get())
            .field("prioritize_min", &self.prioritize_min.get())
            .field("members", &self.members)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use core::cell::Cell;

    use super::CommonBoundsAxisGroup1D;
    use crate::axis1d::Axis;
    use crate::group::{AxisGroup, AxisRequest};
    use crate::interval::Interval;
    use crate::member::AxisMember;
    use crate::notify::Transaction;

    fn set(group: &CommonBoundsAxisGroup1D, span_lpx: f64, request: AxisRequest) {
        let mut tx = Transaction::new();
        group.set(&mut tx, false, span_lpx, request);
        tx.commit();
    }

    #[test]
    fn new_group_reports_bounds() {
        let group = CommonBoundsAxisGroup1D::new(Interval::new(-10.0, 10.0));
        assert_eq!(group.bounds(), Interval::new(-10.0, 10.0));
        assert_eq!(group.span(), 20.0);
        assert_eq!(group.tie_coord(), 0.0);
        assert_eq!(group.tie_frac(), 0.5);
    }

    #[test]
    fn span_constraint_clamps_request() {
        let group = CommonBoundsAxisGroup1D::new(Interval::new(-10.0, 10.0));
        let member = Rc::new(AxisMember::new(500.0));
        member.set_span_constraint(Interval::new(1.0, 100.0));
        let _m = group.register_member(member).unwrap();

        set(&group, 500.0, AxisRequest::edges(-50.0, 50.0));
        assert!(Interval::new(1.0, 100.0).contains(group.span()));
        assert_eq!(group.bounds(), Interval::new(-50.0, 50.0));

        set(&group, 500.0, AxisRequest::edges(-100.0, 100.0));
        assert_eq!(group.span(), 100.0);
        assert_eq!(group.tie_coord(), 0.0);

        set(&group, 500.0, AxisRequest::edges(0.0, 0.5));
        assert_eq!(group.span(), 1.0);
    }

    #[test]
    fn scale_constraint_limits_span_through_member_pixels() {
        let group = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 10.0));
        let member = Rc::new(AxisMember::new(200.0));
        // At most 4 px per unit on 200 px: span >= 50.
        member.set_scale_constraint(Interval::new(0.0, 4.0));
        let _m = group.register_member(member).unwrap();

        set(&group, 200.0, AxisRequest::edges(0.0, 10.0));
        assert_eq!(group.span(), 50.0);
        assert_eq!(group.compute_axis_state(200.0).scale, 4.0);
    }

    #[test]
    fn edge_constraints_keep_bounds_inside() {
        let group = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 10.0));
        let member = Rc::new(AxisMember::new(100.0));
        member.set_min_constraint(Interval::new(0.0, f64::INFINITY));
        member.set_max_constraint(Interval::new(f64::NEG_INFINITY, 100.0));
        let _m = group.register_member(member).unwrap();

        let mut tx = Transaction::new();
        group.pan(&mut tx, false, 100.0, 0.0, -30.0);
        tx.commit();
        assert_eq!(group.bounds(), Interval::new(0.0, 10.0));

        // Too wide for the edge constraints: span is clamped to 100.
        set(&group, 100.0, AxisRequest::edges(-500.0, 500.0));
        assert_eq!(group.bounds(), Interval::new(0.0, 100.0));
    }

    #[test]
    fn conflicting_edges_follow_priority() {
        let group = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 10.0));
        let a = Rc::new(AxisMember::new(100.0));
        a.set_min_constraint(Interval::new(0.0, f64::INFINITY));
        let b = Rc::new(AxisMember::new(100.0));
        b.set_max_constraint(Interval::new(f64::NEG_INFINITY, 5.0));
        let _ma = group.register_member(a).unwrap();
        let _mb = group.register_member(b).unwrap();

        // Edge constraints live on different members, so the span stays free
        // and only the tie coordinate conflicts.
        set(&group, 100.0, AxisRequest::edges(-20.0, -10.0));
        assert_eq!(group.bounds().min(), 0.0);

        group.set_prioritize_min_constraint(false);
        set(&group, 100.0, AxisRequest::edges(20.0, 30.0));
        assert_eq!(group.bounds().max(), 5.0);
    }

    #[test]
    fn marker_changes_only_on_change() {
        let group = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 10.0));
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let _sub = group.subscribe(move |_| c.set(c.get() + 1));

        let before = group.state_marker();
        set(&group, 100.0, AxisRequest::edges(0.0, 10.0));
        assert_eq!(group.state_marker(), before);
        assert_eq!(calls.get(), 0);

        set(&group, 100.0, AxisRequest::edges(0.0, 20.0));
        assert_ne!(group.state_marker(), before);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn invalid_request_is_discarded() {
        let group = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 10.0));
        let before = group.state_marker();

        set(&group, 100.0, AxisRequest::edges(f64::NAN, 5.0));
        set(&group, 100.0, AxisRequest::anchor(0.5, f64::INFINITY, 10.0));
        set(&group, 100.0, AxisRequest::anchor(0.5, 1.0, f64::NAN));

        assert_eq!(group.state_marker(), before);
        assert_eq!(group.bounds(), Interval::new(0.0, 10.0));
    }

    #[test]
    fn snapshot_copies_state_without_members() {
        let group = CommonBoundsAxisGroup1D::with_tie_frac(Interval::new(0.0, 10.0), 0.0);
        let _m = group.register_member(Rc::new(AxisMember::new(100.0))).unwrap();

        let copy = group.snapshot();
        assert_eq!(copy.member_count(), 0);
        assert_eq!(copy.tie_frac(), 0.0);
        assert_eq!(copy.compute_axis_state(100.0).bounds, Interval::new(0.0, 10.0));
    }

    #[test]
    fn anchor_request_keeps_coord_under_frac() {
        let group = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 100.0));
        // Put coordinate 25 at the left quarter with 10 px/unit on 400 px: span 40.
        set(&group, 400.0, AxisRequest::anchor(0.25, 25.0, 10.0));
        assert_eq!(group.bounds(), Interval::new(15.0, 55.0));
    }

    #[test]
    fn relinking_does_not_accumulate_forwards() {
        let first = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 10.0));
        let second = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 10.0));
        let mut axis = Axis::new(first.clone(), Interval::new(0.0, 100.0)).unwrap();

        for _ in 0..1000 {
            axis.link(second.clone()).unwrap();
            axis.link(first.clone()).unwrap();
        }
        assert_eq!(first.member_count(), 1);
        assert_eq!(second.member_count(), 0);
        assert!(first.notifier.listener_count() <= 1);
        assert!(second.notifier.listener_count() <= 1);
    }
}
