// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property tests for constraint combination and group invariants.
//!
//! 1. `combine` is idempotent and never yields an inverted interval.
//! 2. Committed spans and scales stay inside the valid range, whatever the
//!    request and constraints.
//! 3. A scale-ratio lock holds after any update on either side.
//! 4. Pixel and data coordinates round-trip inside the viewport.

use std::rc::Rc;

use proptest::prelude::*;
use understory_axis_link::{
    Axis, AxisGroup, AxisRequest, CommonBoundsAxisGroup1D, CommonScaleAxisGroup1D, Interval,
    Transaction, combine,
};

fn finite() -> impl Strategy<Value = f64> {
    -1e6..1e6_f64
}

fn interval() -> impl Strategy<Value = Interval> {
    (finite(), finite()).prop_map(|(a, b)| Interval::new(a, b))
}

fn positive_interval() -> impl Strategy<Value = Interval> {
    (1e-3..1e3_f64, 1e-3..1e3_f64).prop_map(|(a, b)| Interval::new(a, b))
}

/// Mostly finite values, with the occasional NaN, infinity or zero.
fn value() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => finite(),
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(0.0),
    ]
}

/// Any request, including degenerate and non-finite ones.
fn request() -> impl Strategy<Value = AxisRequest> {
    prop_oneof![
        (value(), value()).prop_map(|(a, b)| AxisRequest::edges(a, b)),
        (0.0..=1.0_f64, value(), value()).prop_map(|(f, c, s)| AxisRequest::anchor(f, c, s)),
    ]
}

proptest! {
    #[test]
    fn combine_is_idempotent(a in interval()) {
        prop_assert_eq!(combine(a, a), a);
    }

    #[test]
    fn combine_never_inverts(a in interval(), b in interval()) {
        let c = combine(a, b);
        prop_assert!(c.min() <= c.max());
        if a.intersect(b).is_none() {
            prop_assert!(c.min() < c.max());
            prop_assert!(c.min() == a.min() || c.max() == a.max());
        }
    }

    #[test]
    fn bounds_group_span_stays_valid(
        requests in prop::collection::vec(request(), 1..8),
        span_limit in positive_interval(),
        span_lpx in 1.0..4000.0_f64,
    ) {
        let group = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 1.0));
        let axis = Axis::new(group.clone(), Interval::new(0.0, span_lpx)).unwrap();
        axis.set_span_constraint(span_limit);

        for request in requests {
            let marker = group.state_marker();
            let before = (group.span(), group.tie_coord());
            axis.set(false, request);
            prop_assert!(Interval::VALID_SPAN.contains(group.span()));
            prop_assert!(group.tie_coord().is_finite());
            if group.state_marker() == marker {
                prop_assert_eq!((group.span(), group.tie_coord()), before);
            }
        }
    }

    #[test]
    fn scale_group_scale_stays_valid(
        requests in prop::collection::vec(request(), 1..8),
        span_lpx in 1.0..4000.0_f64,
    ) {
        let group = CommonScaleAxisGroup1D::new(0.0, 1.0);
        let axis = Axis::new(group.clone(), Interval::new(0.0, span_lpx)).unwrap();
        for request in requests {
            axis.set(true, request);
            prop_assert!(Interval::VALID_SCALE.contains(group.scale()));
            prop_assert!(group.tie_coord().is_finite());
        }
    }

    #[test]
    fn lock_ratio_holds(
        ratio in 0.01..100.0_f64,
        updates in prop::collection::vec((any::<bool>(), 0.01..100.0_f64), 1..8),
    ) {
        let a = CommonScaleAxisGroup1D::new(0.0, 1.0);
        let b = CommonScaleAxisGroup1D::new(0.0, 1.0);
        a.set_scale_ratio_lock(&b, ratio).unwrap();

        for (on_a, scale) in updates {
            let target: &Rc<CommonScaleAxisGroup1D> = if on_a { &a } else { &b };
            let mut tx = Transaction::new();
            target.set(&mut tx, false, 100.0, AxisRequest::anchor(0.5, 0.0, scale));
            tx.commit();
            let expected = a.scale() / ratio;
            prop_assert!((b.scale() - expected).abs() <= 1e-9 * expected);
        }
    }

    #[test]
    fn px_coord_round_trip(
        bounds in interval(),
        start in -500.0..500.0_f64,
        len in 10.0..2000.0_f64,
        t in 0.0..=1.0_f64,
    ) {
        prop_assume!(bounds.span() > 1e-3);
        let group = CommonBoundsAxisGroup1D::new(bounds);
        let axis = Axis::new(group, Interval::new(start, start + len)).unwrap();
        let px = start + t * len;
        let back = axis.coord_to_px(axis.px_to_coord(px));
        prop_assert!((back - px).abs() <= 1e-6 * len.max(px.abs()));
    }
}
