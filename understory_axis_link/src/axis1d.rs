// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::rc::Rc;
use core::cell::Cell;

use crate::group::{AxisGroup, AxisGroupError, AxisRequest, AxisState};
use crate::interval::Interval;
use crate::member::{AxisGroupMember, AxisMember, Membership};
use crate::notify::{ChangeNotifier, Subscription, Transaction};

/// Zoom factor for one mouse-wheel notch.
pub const DEFAULT_WHEEL_ZOOM_STEP: f64 = 1.12;

/// One view's axis, linked to a shared [`AxisGroup`].
///
/// An `Axis` owns the per-view state: device-pixel ratio, pixel viewport and
/// four constraint intervals. Its bounds and scale live in its group, which
/// it may share with other axes. The axis exposes only a narrow read
/// projection of itself to the group (its logical pixel span and its
/// constraints).
///
/// Reads of [`Axis::bounds`] and [`Axis::scale`] go through a cache that is
/// refreshed whenever the group's state marker or this axis's logical pixel
/// span changes.
///
/// The pixel viewport maps `viewport.min()` to `bounds.min()`; there is no
/// implicit flip for top-down Y axes.
#[derive(Debug)]
pub struct Axis {
    member: Rc<AxisMember>,
    dpr: f64,
    viewport: Interval,
    group: Rc<dyn AxisGroup>,
    membership: Option<Membership>,
    forward: Option<Subscription>,
    notifier: Rc<ChangeNotifier>,
    cache: Cell<Option<AxisState>>,
}

impl Axis {
    /// Creates an axis over `viewport` (device pixels, `dpr` 1) linked to `group`.
    ///
    /// Fails if the new axis cannot register with `group`, which only
    /// happens for a misbehaving group implementation.
    pub fn new(group: Rc<dyn AxisGroup>, viewport: Interval) -> Result<Self, AxisGroupError> {
        let mut axis = Self {
            member: Rc::new(AxisMember::new(viewport.span())),
            dpr: 1.0,
            viewport,
            group: group.clone(),
            membership: None,
            forward: None,
            notifier: Rc::new(ChangeNotifier::new()),
            cache: Cell::new(None),
        };
        axis.link(group)?;
        Ok(axis)
    }

    /// The group this axis is currently linked to.
    #[must_use]
    pub fn group(&self) -> &Rc<dyn AxisGroup> {
        &self.group
    }

    /// Leaves the current group and joins `group`.
    ///
    /// The old membership and change forwarding are released, the axis
    /// registers with `group`, and `group` is reconstrained so this axis's
    /// constraints take effect. Listeners of this axis are notified.
    ///
    /// Linking to a group this axis already belongs to fails with
    /// [`AxisGroupError::AlreadyMember`] and leaves the axis unchanged.
    pub fn link(&mut self, group: Rc<dyn AxisGroup>) -> Result<(), AxisGroupError> {
        let membership = group.register_member(self.member.clone())?;
        self.attach(group, membership);
        Ok(())
    }

    /// Leaves the current group, keeping the current bounds on a private copy of it.
    pub fn unlink(&mut self) {
        let solo = self.group.snapshot();
        // A fresh snapshot has no members, so registration cannot fail.
        if let Ok(membership) = solo.register_member(self.member.clone()) {
            self.attach(solo, membership);
        }
    }

    fn attach(&mut self, group: Rc<dyn AxisGroup>, membership: Membership) {
        self.membership = Some(membership);
        self.forward = Some(group.forward_changes(&self.notifier));
        self.group = group;
        self.cache.set(None);

        let mut tx = Transaction::new();
        self.group.reconstrain(&mut tx, false);
        self.notifier.enqueue(&mut tx, false);
        tx.commit();
    }

    /// Device-pixel ratio.
    #[must_use]
    pub fn dpr(&self) -> f64 {
        self.dpr
    }

    /// Viewport in device pixels.
    #[must_use]
    pub fn viewport(&self) -> Interval {
        self.viewport
    }

    /// Visible extent in logical pixels: `viewport.span() / dpr`.
    #[must_use]
    pub fn span_lpx(&self) -> f64 {
        self.viewport.span() / self.dpr
    }

    /// Updates the device-pixel ratio and viewport.
    ///
    /// The group reconstrain this requires is deferred to `tx`, so several
    /// axes sharing a group can be resized in one batch and the group is
    /// reconstrained once.
    pub fn set_viewport(&mut self, tx: &mut Transaction, dpr: f64, viewport: Interval) {
        if self.dpr == dpr && self.viewport == viewport {
            return;
        }
        self.dpr = dpr;
        self.viewport = viewport;
        self.member.set_span_lpx(self.span_lpx());
        tx.defer_reconstrain(self.group.clone(), false);
        self.notifier.enqueue(tx, false);
    }

    /// Allowed range for the lower edge of the bounds.
    #[must_use]
    pub fn min_constraint(&self) -> Interval {
        self.member.min_constraint()
    }

    /// Allowed range for the upper edge of the bounds.
    #[must_use]
    pub fn max_constraint(&self) -> Interval {
        self.member.max_constraint()
    }

    /// Allowed range for the span of the bounds.
    #[must_use]
    pub fn span_constraint(&self) -> Interval {
        self.member.span_constraint()
    }

    /// Allowed range for the scale.
    #[must_use]
    pub fn scale_constraint(&self) -> Interval {
        self.member.scale_constraint()
    }

    /// Sets the lower-edge constraint. Call [`Axis::reconstrain`] to apply it.
    pub fn set_min_constraint(&self, constraint: Interval) {
        self.member.set_min_constraint(constraint);
    }

    /// Sets the upper-edge constraint. Call [`Axis::reconstrain`] to apply it.
    pub fn set_max_constraint(&self, constraint: Interval) {
        self.member.set_max_constraint(constraint);
    }

    /// Sets the span constraint. Call [`Axis::reconstrain`] to apply it.
    pub fn set_span_constraint(&self, constraint: Interval) {
        self.member.set_span_constraint(constraint);
    }

    /// Sets the scale constraint. Call [`Axis::reconstrain`] to apply it.
    pub fn set_scale_constraint(&self, constraint: Interval) {
        self.member.set_scale_constraint(constraint);
    }

    /// Re-applies the group's state through its members' constraints.
    pub fn reconstrain(&self, ongoing: bool) {
        let mut tx = Transaction::new();
        self.reconstrain_in(&mut tx, ongoing);
        tx.commit();
    }

    /// [`Axis::reconstrain`] inside a caller's transaction.
    pub fn reconstrain_in(&self, tx: &mut Transaction, ongoing: bool) {
        self.group.reconstrain(tx, ongoing);
    }

    /// Requests new bounds for this axis (and every axis sharing its group).
    pub fn set(&self, ongoing: bool, request: AxisRequest) {
        let mut tx = Transaction::new();
        self.set_in(&mut tx, ongoing, request);
        tx.commit();
    }

    /// [`Axis::set`] inside a caller's transaction.
    pub fn set_in(&self, tx: &mut Transaction, ongoing: bool, request: AxisRequest) {
        self.group.set(tx, ongoing, self.span_lpx(), request);
    }

    /// Requests `bounds`.
    pub fn set_bounds(&self, ongoing: bool, bounds: Interval) {
        self.set(ongoing, AxisRequest::Bounds(bounds));
    }

    /// Requests bounds `[min, max]`.
    pub fn set_edges(&self, ongoing: bool, min: f64, max: f64) {
        self.set(ongoing, AxisRequest::edges(min, max));
    }

    /// Requests `coord` at fraction `frac` of the viewport at `scale`.
    pub fn set_anchor(&self, ongoing: bool, frac: f64, coord: f64, scale: f64) {
        self.set(ongoing, AxisRequest::anchor(frac, coord, scale));
    }

    /// Moves the bounds so `coord` sits at fraction `frac`, keeping the span or scale.
    pub fn pan(&self, ongoing: bool, frac: f64, coord: f64) {
        let mut tx = Transaction::new();
        self.pan_in(&mut tx, ongoing, frac, coord);
        tx.commit();
    }

    /// [`Axis::pan`] inside a caller's transaction.
    pub fn pan_in(&self, tx: &mut Transaction, ongoing: bool, frac: f64, coord: f64) {
        self.group.pan(tx, ongoing, self.span_lpx(), frac, coord);
    }

    /// Zooms by `factor` (greater than one zooms in), keeping the coordinate under `px` fixed.
    ///
    /// Non-positive or non-finite factors are ignored.
    pub fn zoom_about_px(&self, ongoing: bool, px: f64, factor: f64) {
        let mut tx = Transaction::new();
        self.zoom_about_px_in(&mut tx, ongoing, px, factor);
        tx.commit();
    }

    /// [`Axis::zoom_about_px`] inside a caller's transaction.
    pub fn zoom_about_px_in(&self, tx: &mut Transaction, ongoing: bool, px: f64, factor: f64) {
        if let Some(request) = self.zoom_request(px, factor) {
            self.set_in(tx, ongoing, request);
        }
    }

    pub(crate) fn zoom_request(&self, px: f64, factor: f64) -> Option<AxisRequest> {
        if !(factor > 0.0 && factor.is_finite()) {
            return None;
        }
        let state = self.state();
        Some(AxisRequest::anchor(
            self.viewport.frac_of(px),
            self.px_to_coord(px),
            state.scale * factor,
        ))
    }

    /// Pans so `grab_coord` sits under `px`.
    pub fn drag_to_px(&self, ongoing: bool, px: f64, grab_coord: f64) {
        self.pan(ongoing, self.viewport.frac_of(px), grab_coord);
    }

    /// Current bounds and scale, recomputed only when stale.
    #[must_use]
    pub fn state(&self) -> AxisState {
        let span_lpx = self.span_lpx();
        let marker = self.group.state_marker();
        if let Some(cached) = self.cache.get()
            && cached.marker == marker
            && cached.span_lpx == span_lpx
        {
            return cached;
        }
        let state = self.group.compute_axis_state(span_lpx);
        self.cache.set(Some(state));
        state
    }

    /// Visible data-space bounds.
    #[must_use]
    pub fn bounds(&self) -> Interval {
        self.state().bounds
    }

    /// Logical pixels per data unit.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.state().scale
    }

    /// Maps a device-pixel position to a data coordinate.
    #[must_use]
    pub fn px_to_coord(&self, px: f64) -> f64 {
        self.bounds().value_at_frac(self.viewport.frac_of(px))
    }

    /// Maps a data coordinate to a device-pixel position.
    #[must_use]
    pub fn coord_to_px(&self, coord: f64) -> f64 {
        self.viewport.value_at_frac(self.bounds().frac_of(coord))
    }

    /// Subscribes to changes of this axis; the callback receives the `ongoing` flag.
    ///
    /// The subscription survives [`Axis::link`] and [`Axis::unlink`].
    pub fn subscribe(&self, callback: impl Fn(bool) + 'static) -> Subscription {
        self.notifier.subscribe(callback)
    }

    pub(crate) fn forward_to(&self, target: &Rc<ChangeNotifier>) -> Subscription {
        self.notifier.forward_to(target)
    }
}
