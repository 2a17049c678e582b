// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::constraint::{ConstraintSelector, TieSpan, combine, fold_constraints, tie_constraint};
use crate::group::{
    AxisGroup, AxisGroupError, AxisRequest, AxisState, StateMarker, bounds_around,
    is_valid_extent, sanitize_tie_frac,
};
use crate::interval::Interval;
use crate::member::{AxisGroupMember, MemberList, MemberSet, Membership, members_of};
use crate::notify::{ChangeNotifier, Subscription, Transaction};

/// Errors reported by [`CommonScaleAxisGroup1D::set_scale_ratio_lock`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScaleRatioLockError {
    /// The ratio is not finite and positive, or its reciprocal is not finite.
    InvalidRatio(f64),
    /// A group cannot be locked to itself.
    SelfLock,
}

impl fmt::Display for ScaleRatioLockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRatio(ratio) => write!(f, "invalid scale ratio {ratio}"),
            Self::SelfLock => f.write_str("cannot lock a group's scale to itself"),
        }
    }
}

impl core::error::Error for ScaleRatioLockError {}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ScaleState {
    scale: f64,
    tie_coord: f64,
}

/// One side of a mutual lock; `ratio = this scale / partner scale`.
struct ScaleRatioLock {
    partner: Weak<CommonScaleAxisGroup1D>,
    ratio: f64,
}

/// Axis group whose members all share one scale and one anchor coordinate.
///
/// Each member shows `span_lpx / scale` data units, so views of different
/// pixel sizes show different bounds around the same anchor.
///
/// Two groups can be tied together with a scale-ratio lock, typically the X
/// and Y groups of an aspect-locked plot. Locked groups update together: a
/// change to one rescales the other so the ratio holds, and the change
/// commits on both sides or on neither.
///
/// ```rust
/// use understory_axis_link::{AxisGroup, AxisRequest, CommonScaleAxisGroup1D, Transaction};
///
/// let x = CommonScaleAxisGroup1D::new(0.0, 1.0);
/// let y = CommonScaleAxisGroup1D::new(0.0, 1.0);
/// x.set_scale_ratio_lock(&y, 2.0).unwrap();
///
/// let mut tx = Transaction::new();
/// x.set(&mut tx, false, 100.0, AxisRequest::anchor(0.5, 0.0, 8.0));
/// tx.commit();
///
/// assert_eq!(x.scale(), 8.0);
/// assert_eq!(y.scale(), 4.0);
/// ```
pub struct CommonScaleAxisGroup1D {
    tie_frac: f64,
    state: Cell<ScaleState>,
    marker: Cell<StateMarker>,
    prioritize_min: Cell<bool>,
    members: MemberSet,
    notifier: ChangeNotifier,
    lock: RefCell<Option<ScaleRatioLock>>,
}

impl CommonScaleAxisGroup1D {
    /// Creates a group at `scale` logical pixels per unit with `tie_coord` at the center.
    #[must_use]
    pub fn new(tie_coord: f64, scale: f64) -> Rc<Self> {
        Self::with_tie_frac(tie_coord, scale, 0.5)
    }

    /// Creates a group with `tie_coord` at fraction `tie_frac` of every member.
    ///
    /// `tie_frac` is clamped into `[0, 1]` (NaN becomes `0.5`). An invalid
    /// scale falls back into the valid range; a non-finite anchor falls back
    /// to zero.
    #[must_use]
    pub fn with_tie_frac(tie_coord: f64, scale: f64, tie_frac: f64) -> Rc<Self> {
        let scale = Interval::VALID_SCALE.clamp(scale);
        let scale = if scale.is_nan() { 1.0 } else { scale };
        let tie_coord = if tie_coord.is_finite() { tie_coord } else { 0.0 };
        Rc::new(Self::from_parts(
            sanitize_tie_frac(tie_frac),
            ScaleState { scale, tie_coord },
            true,
        ))
    }

    fn from_parts(tie_frac: f64, state: ScaleState, prioritize_min: bool) -> Self {
        Self {
            tie_frac,
            state: Cell::new(state),
            marker: Cell::new(StateMarker::default()),
            prioritize_min: Cell::new(prioritize_min),
            members: MemberSet::default(),
            notifier: ChangeNotifier::new(),
            lock: RefCell::new(None),
        }
    }

    /// The shared scale, in logical pixels per data unit.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.state.get().scale
    }

    /// The shared anchor coordinate.
    #[must_use]
    pub fn tie_coord(&self) -> f64 {
        self.state.get().tie_coord
    }

    /// Whether lower-edge constraints win conflicts. Defaults to `true`.
    #[must_use]
    pub fn prioritize_min_constraint(&self) -> bool {
        self.prioritize_min.get()
    }

    /// Sets which edge constraint wins conflicts.
    pub fn set_prioritize_min_constraint(&self, prioritize_min: bool) {
        self.prioritize_min.set(prioritize_min);
    }

    /// Subscribes to committed changes; the callback receives the `ongoing` flag.
    pub fn subscribe(&self, callback: impl Fn(bool) + 'static) -> Subscription {
        self.notifier.subscribe(callback)
    }

    /// Locks this group's scale to `ratio` times `other`'s scale.
    ///
    /// Any existing lock on either group is cleared first; `other` receives
    /// the reciprocal ratio. Both groups are then reconstrained so the ratio
    /// holds immediately.
    pub fn set_scale_ratio_lock(
        self: &Rc<Self>,
        other: &Rc<Self>,
        ratio: f64,
    ) -> Result<(), ScaleRatioLockError> {
        if !(ratio.is_finite() && ratio > 0.0 && ratio.recip().is_finite()) {
            return Err(ScaleRatioLockError::InvalidRatio(ratio));
        }
        if Rc::ptr_eq(self, other) {
            return Err(ScaleRatioLockError::SelfLock);
        }

        self.clear_scale_ratio_lock();
        other.clear_scale_ratio_lock();
        *self.lock.borrow_mut() = Some(ScaleRatioLock {
            partner: Rc::downgrade(other),
            ratio,
        });
        *other.lock.borrow_mut() = Some(ScaleRatioLock {
            partner: Rc::downgrade(self),
            ratio: ratio.recip(),
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(ratio, "scale ratio lock established");

        let mut tx = Transaction::new();
        self.reconstrain(&mut tx, false);
        tx.commit();
        Ok(())
    }

    /// Removes this group's lock and its partner's matching lock.
    pub fn clear_scale_ratio_lock(&self) {
        let Some(lock) = self.lock.borrow_mut().take() else {
            return;
        };
        if let Some(partner) = lock.partner.upgrade() {
            let mut theirs = partner.lock.borrow_mut();
            if theirs
                .as_ref()
                .is_some_and(|l| core::ptr::eq(l.partner.as_ptr(), self))
            {
                *theirs = None;
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("scale ratio lock cleared");
    }

    /// The locked partner and `ratio = self.scale() / partner.scale()`, if any.
    ///
    /// A lock whose partner has been dropped reads as no lock.
    #[must_use]
    pub fn scale_ratio_lock(&self) -> Option<(Rc<Self>, f64)> {
        let mut lock = self.lock.borrow_mut();
        let found = lock
            .as_ref()
            .and_then(|l| l.partner.upgrade().map(|p| (p, l.ratio)));
        if found.is_none() {
            *lock = None;
        }
        found
    }

    /// Scale range allowed by this group's own members.
    ///
    /// Folds the valid range, then the members' scale constraints, then
    /// their span and edge constraints expressed as scales.
    fn scale_constraint(list: &MemberList) -> Interval {
        [
            ConstraintSelector::Scale,
            ConstraintSelector::ScaleFromSpan,
            ConstraintSelector::ScaleFromEdges,
        ]
        .into_iter()
        .fold(Interval::VALID_SCALE, |acc, selector| {
            fold_constraints(acc, members_of(list), selector)
        })
    }

    fn constrain_tie(&self, list: &MemberList, scale: f64, requested: f64) -> f64 {
        tie_constraint(
            members_of(list),
            self.tie_frac,
            TieSpan::FromScale(scale),
            self.prioritize_min.get(),
        )
        .clamp(requested)
    }

    /// Applies `coord` at `frac` of a `span_lpx` view at the requested `scale`.
    fn apply(
        &self,
        tx: &mut Transaction,
        ongoing: bool,
        span_lpx: f64,
        frac: f64,
        coord: f64,
        scale: f64,
    ) {
        let list = self.members.snapshot();
        let own = Self::scale_constraint(&list);
        let requested_tie = |scale: f64| coord + (self.tie_frac - frac) * (span_lpx / scale);

        let Some((partner, ratio)) = self.scale_ratio_lock() else {
            let scale = own.clamp(scale);
            let tie_coord = self.constrain_tie(&list, scale, requested_tie(scale));
            if !is_valid(scale, tie_coord) {
                #[cfg(feature = "tracing")]
                tracing::debug!(scale, tie_coord, "discarding invalid common-scale update");
                return;
            }
            self.commit(tx, ongoing, ScaleState { scale, tie_coord });
            return;
        };

        let partner_list = partner.members.snapshot();
        let partner_own = Self::scale_constraint(&partner_list);
        let scale = combine(own, partner_own.scale(ratio)).clamp(scale);
        let tie_coord = self.constrain_tie(&list, scale, requested_tie(scale));

        let partner_scale = scale / ratio;
        let partner_tie = partner.constrain_tie(&partner_list, partner_scale, partner.tie_coord());

        if !is_valid(scale, tie_coord) || !is_valid(partner_scale, partner_tie) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                scale,
                tie_coord,
                partner_scale,
                partner_tie,
                "discarding invalid locked common-scale update"
            );
            return;
        }
        self.commit(tx, ongoing, ScaleState { scale, tie_coord });
        partner.commit(
            tx,
            ongoing,
            ScaleState {
                scale: partner_scale,
                tie_coord: partner_tie,
            },
        );
    }

    fn commit(&self, tx: &mut Transaction, ongoing: bool, state: ScaleState) {
        if self.state.get() == state {
            return;
        }
        self.state.set(state);
        self.marker.set(self.marker.get().next());
        self.notifier.enqueue(tx, ongoing);
    }
}

fn is_valid(scale: f64, tie_coord: f64) -> bool {
    is_valid_extent(scale, Interval::VALID_SCALE) && tie_coord.is_finite()
}

impl AxisGroup for CommonScaleAxisGroup1D {
    fn set(&self, tx: &mut Transaction, ongoing: bool, span_lpx: f64, request: AxisRequest) {
        let (frac, coord, scale) = request.to_anchor_scale(self.tie_frac, span_lpx);
        self.apply(tx, ongoing, span_lpx, frac, coord, scale);
    }

    fn pan(&self, tx: &mut Transaction, ongoing: bool, span_lpx: f64, frac: f64, coord: f64) {
        self.apply(tx, ongoing, span_lpx, frac, coord, self.scale());
    }

    fn reconstrain(&self, tx: &mut Transaction, ongoing: bool) {
        let state = self.state.get();
        self.apply(tx, ongoing, 0.0, self.tie_frac, state.tie_coord, state.scale);
    }

    fn state_marker(&self) -> StateMarker {
        self.marker.get()
    }

    fn compute_axis_state(&self, span_lpx: f64) -> AxisState {
        let state = self.state.get();
        AxisState {
            span_lpx,
            marker: self.marker.get(),
            bounds: bounds_around(state.tie_coord, self.tie_frac, span_lpx / state.scale),
            scale: state.scale,
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

impl Drop for CommonScaleAxisGroup1D {
    fn drop(&mut self) {
        self.clear_scale_ratio_lock();
    }
}

impl fmt::Debug for CommonScaleAxisGroup1D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.get();
        let ratio = self.lock.borrow().as_ref().map(|l| l.ratio);
        f.debug_struct("CommonScaleAxisGroup1D")
            .field("tie_frac", &self.tie_frac)
            .field("scale", &state.scale)
            .field("tie_coord", &state.tie_coord)
            .field("marker", &self.marker.get())
            .field("prioritize_min", &self.prioritize_min.get())
            .field("members", &self.members)
            .field("lock_ratio", &ratio)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use core::cell::Cell;

    use super::{CommonScaleAxisGroup1D, ScaleRatioLockError};
    use crate::group::{AxisGroup, AxisRequest};
    use crate::interval::Interval;
    use crate::member::AxisMember;
    use crate::notify::Transaction;

    fn set(group: &CommonScaleAxisGroup1D, span_lpx: f64, request: AxisRequest) {
        let mut tx = Transaction::new();
        group.set(&mut tx, false, span_lpx, request);
        tx.commit();
    }

    #[test]
    fn members_of_different_sizes_share_scale() {
        let group = CommonScaleAxisGroup1D::new(0.0, 10.0);
        assert_eq!(group.compute_axis_state(100.0).bounds, Interval::new(-5.0, 5.0));
        assert_eq!(group.compute_axis_state(200.0).bounds, Interval::new(-10.0, 10.0));
        assert_eq!(group.compute_axis_state(200.0).scale, 10.0);
    }

    #[test]
    fn bounds_request_sets_scale_from_caller_pixels() {
        let group = CommonScaleAxisGroup1D::new(0.0, 1.0);
        set(&group, 400.0, AxisRequest::edges(0.0, 100.0));
        assert_eq!(group.scale(), 4.0);
        assert_eq!(group.tie_coord(), 50.0);
    }

    #[test]
    fn pan_keeps_scale() {
        let group = CommonScaleAxisGroup1D::new(0.0, 10.0);
        let mut tx = Transaction::new();
        // Coordinate 3 under the left edge of a 100 px view: span 10.
        group.pan(&mut tx, false, 100.0, 0.0, 3.0);
        tx.commit();
        assert_eq!(group.scale(), 10.0);
        assert_eq!(group.tie_coord(), 8.0);
    }

    #[test]
    fn scale_constraint_and_span_constraint_combine() {
        let group = CommonScaleAxisGroup1D::new(0.0, 1.0);
        let member = Rc::new(AxisMember::new(100.0));
        member.set_scale_constraint(Interval::new(0.5, 20.0));
        // Span at most 10 on 100 px: scale >= 10.
        member.set_span_constraint(Interval::new(0.0, 10.0));
        let _m = group.register_member(member).unwrap();

        set(&group, 100.0, AxisRequest::anchor(0.5, 0.0, 1.0));
        assert_eq!(group.scale(), 10.0);

        set(&group, 100.0, AxisRequest::anchor(0.5, 0.0, 50.0));
        assert_eq!(group.scale(), 20.0);
    }

    #[test]
    fn edge_constraints_use_each_members_span() {
        let group = CommonScaleAxisGroup1D::with_tie_frac(0.0, 1.0, 0.0);
        let narrow = Rc::new(AxisMember::new(100.0));
        let wide = Rc::new(AxisMember::new(300.0));
        wide.set_max_constraint(Interval::new(f64::NEG_INFINITY, 30.0));
        let _n = group.register_member(narrow).unwrap();
        let _w = group.register_member(wide).unwrap();

        // At 10 px/unit the wide view shows 30 units; its max edge pins tie <= 0.
        set(&group, 100.0, AxisRequest::anchor(0.0, 5.0, 10.0));
        assert_eq!(group.scale(), 10.0);
        assert_eq!(group.tie_coord(), 0.0);
    }

    #[test]
    fn invalid_ratio_is_rejected() {
        let a = CommonScaleAxisGroup1D::new(0.0, 1.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        for ratio in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-310] {
            assert!(matches!(
                a.set_scale_ratio_lock(&b, ratio),
                Err(ScaleRatioLockError::InvalidRatio(_))
            ));
        }
        assert_eq!(
            a.set_scale_ratio_lock(&a, 1.0),
            Err(ScaleRatioLockError::SelfLock)
        );
        assert!(a.scale_ratio_lock().is_none());
    }

    #[test]
    fn lock_is_mutual_and_applied_immediately() {
        let a = CommonScaleAxisGroup1D::new(0.0, 6.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        a.set_scale_ratio_lock(&b, 2.0).unwrap();

        let (partner, ratio) = a.scale_ratio_lock().unwrap();
        assert!(Rc::ptr_eq(&partner, &b));
        assert_eq!(ratio, 2.0);
        let (partner, ratio) = b.scale_ratio_lock().unwrap();
        assert!(Rc::ptr_eq(&partner, &a));
        assert_eq!(ratio, 0.5);

        assert_eq!(a.scale(), 6.0);
        assert_eq!(b.scale(), 3.0);
    }

    #[test]
    fn relocking_clears_previous_partner() {
        let a = CommonScaleAxisGroup1D::new(0.0, 1.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        let c = CommonScaleAxisGroup1D::new(0.0, 1.0);
        a.set_scale_ratio_lock(&b, 1.0).unwrap();
        c.set_scale_ratio_lock(&b, 1.0).unwrap();

        assert!(a.scale_ratio_lock().is_none());
        assert!(Rc::ptr_eq(&b.scale_ratio_lock().unwrap().0, &c));
    }

    #[test]
    fn clear_is_symmetric() {
        let a = CommonScaleAxisGroup1D::new(0.0, 1.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        a.set_scale_ratio_lock(&b, 3.0).unwrap();
        let b_scale = b.scale();
        b.clear_scale_ratio_lock();
        assert!(a.scale_ratio_lock().is_none());
        assert!(b.scale_ratio_lock().is_none());
        assert_eq!(Rc::weak_count(&a), 0);
        assert_eq!(Rc::weak_count(&b), 0);

        set(&a, 100.0, AxisRequest::anchor(0.5, 0.0, 7.0));
        assert_eq!(a.scale(), 7.0);
        assert_eq!(b.scale(), b_scale);
    }

    #[test]
    fn dropping_partner_unlocks() {
        let a = CommonScaleAxisGroup1D::new(0.0, 1.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        a.set_scale_ratio_lock(&b, 2.0).unwrap();
        drop(b);
        assert!(a.scale_ratio_lock().is_none());
        set(&a, 100.0, AxisRequest::anchor(0.5, 0.0, 5.0));
        assert_eq!(a.scale(), 5.0);
    }

    #[test]
    fn locked_partner_constraint_limits_both() {
        let a = CommonScaleAxisGroup1D::new(0.0, 2.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        let member = Rc::new(AxisMember::new(100.0));
        member.set_scale_constraint(Interval::new(0.5, 4.0));
        let _m = b.register_member(member).unwrap();
        a.set_scale_ratio_lock(&b, 2.0).unwrap();

        // b's scale is capped at 4, so a's is capped at 8.
        set(&a, 100.0, AxisRequest::anchor(0.5, 0.0, 100.0));
        assert_eq!(a.scale(), 8.0);
        assert_eq!(b.scale(), 4.0);
    }

    #[test]
    fn locked_update_notifies_both_once() {
        let a = CommonScaleAxisGroup1D::new(0.0, 2.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        a.set_scale_ratio_lock(&b, 2.0).unwrap();

        let calls_a = Rc::new(Cell::new(0));
        let calls_b = Rc::new(Cell::new(0));
        let ca = calls_a.clone();
        let cb = calls_b.clone();
        let _sa = a.subscribe(move |_| ca.set(ca.get() + 1));
        let _sb = b.subscribe(move |_| cb.set(cb.get() + 1));

        set(&b, 100.0, AxisRequest::anchor(0.5, 0.0, 3.0));
        assert_eq!(a.scale(), 6.0);
        assert_eq!((calls_a.get(), calls_b.get()), (1, 1));
    }

    #[test]
    fn invalid_locked_update_commits_neither() {
        let a = CommonScaleAxisGroup1D::new(0.0, 2.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        a.set_scale_ratio_lock(&b, 2.0).unwrap();
        let (ma, mb) = (a.state_marker(), b.state_marker());

        set(&a, 100.0, AxisRequest::anchor(0.5, f64::NAN, 4.0));
        assert_eq!((a.state_marker(), b.state_marker()), (ma, mb));
        assert_eq!((a.scale(), b.scale()), (2.0, 1.0));
    }

    #[test]
    fn snapshot_drops_lock_and_members() {
        let a = CommonScaleAxisGroup1D::new(1.0, 2.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        a.set_scale_ratio_lock(&b, 2.0).unwrap();
        let _m = a.register_member(Rc::new(AxisMember::new(10.0))).unwrap();

        let copy = a.snapshot();
        assert_eq!(copy.member_count(), 0);
        let (copied, original) = (copy.compute_axis_state(10.0), a.compute_axis_state(10.0));
        assert_eq!(copied.bounds, original.bounds);
        assert_eq!(copied.scale, original.scale);
        assert!(Rc::ptr_eq(&b.scale_ratio_lock().unwrap().0, &a));
    }
}
