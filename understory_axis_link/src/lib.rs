// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Axis Link: linked, constrained plot axes.
//!
//! This crate maps pixel viewports to data-space intervals for interactive
//! plots, and keeps several views in sync when they share an axis. It
//! focuses on:
//! - Combining per-view limits on bounds, span and scale into one effective
//!   constraint.
//! - Sharing state between views through axis groups, either with common
//!   bounds or with a common scale.
//! - Locking the scale ratio of two groups, for aspect-locked 2D plots.
//! - Batching updates so listeners observe each change once.
//!
//! It does **not** render, lay out, or generate ticks. Callers are expected
//! to push each view's device-pixel ratio and pixel viewport into its
//! [`Axis`], wire input events to [`Axis::zoom_about_px`] /
//! [`Axis::drag_to_px`], and repaint when notified.
//!
//! ## Linking two views
//!
//! ```rust
//! use understory_axis_link::{Axis, CommonBoundsAxisGroup1D, Interval};
//!
//! // Two plots showing the same time range at different widths.
//! let time = CommonBoundsAxisGroup1D::new(Interval::new(0.0, 60.0));
//! let wide = Axis::new(time.clone(), Interval::new(0.0, 1200.0)).unwrap();
//! let narrow = Axis::new(time, Interval::new(0.0, 300.0)).unwrap();
//!
//! // Zooming one zooms the other.
//! wide.set_edges(false, 10.0, 20.0);
//! assert_eq!(narrow.bounds(), Interval::new(10.0, 20.0));
//! assert_eq!(wide.scale(), 120.0);
//! assert_eq!(narrow.scale(), 30.0);
//! ```
//!
//! ## Aspect-locked 2D view
//!
//! ```rust
//! use kurbo::{Point, Rect, Vec2};
//! use understory_axis_link::{Axis2D, CommonScaleAxisGroup1D, DEFAULT_WHEEL_ZOOM_STEP};
//!
//! let x = CommonScaleAxisGroup1D::new(0.0, 1.0);
//! let y = CommonScaleAxisGroup1D::new(0.0, 1.0);
//! x.set_scale_ratio_lock(&y, 1.0).unwrap();
//!
//! let view = Axis2D::new(x, y, Rect::new(0.0, 0.0, 800.0, 600.0)).unwrap();
//! let step = Vec2::new(DEFAULT_WHEEL_ZOOM_STEP, DEFAULT_WHEEL_ZOOM_STEP);
//! view.zoom_about_px(false, Point::new(400.0, 300.0), step);
//!
//! let scale = view.scale();
//! assert_eq!(scale.x, scale.y);
//! ```
//!
//! ## Constraints
//!
//! Each axis carries four constraint intervals: on the lower edge, the upper
//! edge, the span, and the scale. A group folds its members' constraints
//! with [`combine`], which never yields an empty interval: disjoint operands
//! resolve to a one-ULP interval at the edge of the first operand. Folding
//! is therefore order-dependent, and the groups fold from the most
//! authoritative constraint to the least.
//!
//! Updates that would produce a non-finite anchor, or a span or scale
//! outside [`Interval::VALID_SPAN`], are discarded without notification.
//!
//! ## Notifications
//!
//! Groups, axes and 2D axes notify listeners with an `ongoing` flag that
//! distinguishes in-progress interaction from final changes. Every mutation
//! runs inside a [`Transaction`]; listeners are called when it commits,
//! once each, with the last flag queued for them.
//!
//! ## Features
//!
//! - `std` (default): forwards to `kurbo/std`.
//! - `libm`: forwards to `kurbo/libm` for `no_std` builds.
//! - `tracing`: emits `tracing` events for discarded updates, lock changes
//!   and transaction flushes.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod axis1d;
mod axis2d;
mod common_bounds;
mod common_scale;
mod constraint;
mod group;
mod interval;
mod member;
mod notify;

pub use axis1d::{Axis, DEFAULT_WHEEL_ZOOM_STEP};
pub use axis2d::{Axis2D, Axis2DRequest, X_REAPPLY_TOLERANCE};
pub use common_bounds::CommonBoundsAxisGroup1D;
pub use common_scale::{CommonScaleAxisGroup1D, ScaleRatioLockError};
pub use constraint::{ConstraintSelector, combine, combine_axis_constraints, fold_constraints};
pub use group::{AxisGroup, AxisGroupError, AxisRequest, AxisState, StateMarker};
pub use interval::Interval;
pub use member::{AxisGroupMember, AxisMember, Membership};
pub use notify::{ChangeNotifier, Subscription, Transaction};
