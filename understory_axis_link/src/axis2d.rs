// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::rc::Rc;

use kurbo::{Point, Rect, Vec2};

use crate::axis1d::Axis;
use crate::group::{AxisGroup, AxisGroupError, AxisRequest};
use crate::interval::Interval;
use crate::notify::{ChangeNotifier, Subscription, Transaction};

/// Fraction by which a committed span may fall short of the requested span
/// before [`Axis2D::set`] re-applies the X request.
pub const X_REAPPLY_TOLERANCE: f64 = 0.05;

/// Requested 2D bounds, in one of four shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Axis2DRequest {
    /// Show this data-space rectangle.
    Rect(Rect),
    /// Show these per-axis bounds.
    Intervals {
        /// Requested X bounds.
        x: Interval,
        /// Requested Y bounds.
        y: Interval,
    },
    /// Put `coord` at fractions `frac` of the viewport at `scale` pixels per unit.
    Anchors {
        /// Viewport fractions along X and Y.
        frac: Point,
        /// Data coordinates to place at `frac`.
        coord: Point,
        /// Logical pixels per data unit along X and Y.
        scale: Vec2,
    },
    /// Show `[x_min, x_max] × [y_min, y_max]`.
    Edges {
        /// One X edge.
        x_min: f64,
        /// The other X edge.
        x_max: f64,
        /// One Y edge.
        y_min: f64,
        /// The other Y edge.
        y_max: f64,
    },
}

impl Axis2DRequest {
    /// Splits into the X and Y requests.
    #[must_use]
    pub fn split(self) -> (AxisRequest, AxisRequest) {
        match self {
            Self::Rect(rect) => (
                AxisRequest::edges(rect.x0, rect.x1),
                AxisRequest::edges(rect.y0, rect.y1),
            ),
            Self::Intervals { x, y } => (AxisRequest::Bounds(x), AxisRequest::Bounds(y)),
            Self::Anchors { frac, coord, scale } => (
                AxisRequest::anchor(frac.x, coord.x, scale.x),
                AxisRequest::anchor(frac.y, coord.y, scale.y),
            ),
            Self::Edges {
                x_min,
                x_max,
                y_min,
                y_max,
            } => (
                AxisRequest::edges(x_min, x_max),
                AxisRequest::edges(y_min, y_max),
            ),
        }
    }
}

impl From<Rect> for Axis2DRequest {
    fn from(rect: Rect) -> Self {
        Self::Rect(rect)
    }
}

/// A pair of [`Axis`] values for one 2D view.
///
/// Both axes keep their own groups; coupling between them, if any, comes
/// from a scale-ratio lock between those groups. Listeners of the 2D axis
/// are notified once per transaction however many of X, Y and their groups
/// changed.
///
/// Pixel Y grows in the same direction as data Y: `viewport.y0` shows the
/// lower Y bound.
#[derive(Debug)]
pub struct Axis2D {
    x: Axis,
    y: Axis,
    notifier: Rc<ChangeNotifier>,
    _forwards: [Subscription; 2],
}

impl Axis2D {
    /// Creates X and Y axes over `viewport` (device pixels) linked to the given groups.
    pub fn new(
        x_group: Rc<dyn AxisGroup>,
        y_group: Rc<dyn AxisGroup>,
        viewport: Rect,
    ) -> Result<Self, AxisGroupError> {
        let x = Axis::new(x_group, Interval::new(viewport.x0, viewport.x1))?;
        let y = Axis::new(y_group, Interval::new(viewport.y0, viewport.y1))?;
        Ok(Self::from_axes(x, y))
    }

    /// Combines two existing axes.
    #[must_use]
    pub fn from_axes(x: Axis, y: Axis) -> Self {
        let notifier = Rc::new(ChangeNotifier::new());
        let forwards = [x.forward_to(&notifier), y.forward_to(&notifier)];
        Self {
            x,
            y,
            notifier,
            _forwards: forwards,
        }
    }

    /// The X axis.
    #[must_use]
    pub fn x(&self) -> &Axis {
        &self.x
    }

    /// The Y axis.
    #[must_use]
    pub fn y(&self) -> &Axis {
        &self.y
    }

    /// Mutable access to the X axis, e.g. to link it separately.
    pub fn x_mut(&mut self) -> &mut Axis {
        &mut self.x
    }

    /// Mutable access to the Y axis.
    pub fn y_mut(&mut self) -> &mut Axis {
        &mut self.y
    }

    /// Links X and Y to new groups.
    ///
    /// X is linked first; if linking Y fails, X stays linked to `x_group`.
    pub fn link(
        &mut self,
        x_group: Rc<dyn AxisGroup>,
        y_group: Rc<dyn AxisGroup>,
    ) -> Result<(), AxisGroupError> {
        self.x.link(x_group)?;
        self.y.link(y_group)
    }

    /// Unlinks both axes, freezing their current bounds.
    pub fn unlink(&mut self) {
        self.x.unlink();
        self.y.unlink();
    }

    /// Updates the device-pixel ratio and viewport of both axes.
    pub fn set_viewport(&mut self, tx: &mut Transaction, dpr: f64, viewport: Rect) {
        self.x
            .set_viewport(tx, dpr, Interval::new(viewport.x0, viewport.x1));
        self.y
            .set_viewport(tx, dpr, Interval::new(viewport.y0, viewport.y1));
    }

    /// The viewport in device pixels.
    #[must_use]
    pub fn viewport(&self) -> Rect {
        let (x, y) = (self.x.viewport(), self.y.viewport());
        Rect::new(x.min(), y.min(), x.max(), y.max())
    }

    /// The visible data-space rectangle.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let (x, y) = (self.x.bounds(), self.y.bounds());
        Rect::new(x.min(), y.min(), x.max(), y.max())
    }

    /// Logical pixels per data unit along X and Y.
    #[must_use]
    pub fn scale(&self) -> Vec2 {
        Vec2::new(self.x.scale(), self.y.scale())
    }

    /// Requests new bounds for both axes.
    pub fn set(&self, ongoing: bool, request: impl Into<Axis2DRequest>) {
        let mut tx = Transaction::new();
        self.set_in(&mut tx, ongoing, request.into());
        tx.commit();
    }

    /// [`Axis2D::set`] inside a caller's transaction.
    ///
    /// X is applied, then Y. If either committed span then falls more than
    /// [`X_REAPPLY_TOLERANCE`] short of its request, X is applied a second
    /// time. This happens when a scale-ratio lock lets Y's constraints
    /// shrink X; re-applying gives X the final word.
    pub fn set_in(&self, tx: &mut Transaction, ongoing: bool, request: Axis2DRequest) {
        let (x, y) = request.split();
        self.set_pair(tx, ongoing, x, y);
    }

    /// Moves the bounds so `coord` sits at fractions `frac`, keeping spans or scales.
    pub fn pan(&self, ongoing: bool, frac: Point, coord: Point) {
        let mut tx = Transaction::new();
        self.x.pan_in(&mut tx, ongoing, frac.x, coord.x);
        self.y.pan_in(&mut tx, ongoing, frac.y, coord.y);
        tx.commit();
    }

    /// Zooms by `factor` along each axis, keeping the coordinate under `px` fixed.
    ///
    /// An axis whose factor is non-positive or non-finite keeps its current
    /// scale.
    pub fn zoom_about_px(&self, ongoing: bool, px: Point, factor: Vec2) {
        let x = self.x.zoom_request(px.x, factor.x);
        let y = self.y.zoom_request(px.y, factor.y);
        if x.is_none() && y.is_none() {
            return;
        }
        let x = x.unwrap_or_else(|| hold_request(&self.x, px.x));
        let y = y.unwrap_or_else(|| hold_request(&self.y, px.y));
        let mut tx = Transaction::new();
        self.set_pair(&mut tx, ongoing, x, y);
        tx.commit();
    }

    /// Pans so the data point `grab` sits under `px`.
    pub fn drag_to_px(&self, ongoing: bool, px: Point, grab: Point) {
        let frac = Point::new(
            self.x.viewport().frac_of(px.x),
            self.y.viewport().frac_of(px.y),
        );
        self.pan(ongoing, frac, grab);
    }

    /// Maps a device-pixel position to data coordinates.
    #[must_use]
    pub fn px_to_coord(&self, px: Point) -> Point {
        Point::new(self.x.px_to_coord(px.x), self.y.px_to_coord(px.y))
    }

    /// Maps data coordinates to a device-pixel position.
    #[must_use]
    pub fn coord_to_px(&self, coord: Point) -> Point {
        Point::new(self.x.coord_to_px(coord.x), self.y.coord_to_px(coord.y))
    }

    /// Reconstrains both axes' groups in one transaction.
    pub fn reconstrain(&self, ongoing: bool) {
        let mut tx = Transaction::new();
        self.x.reconstrain_in(&mut tx, ongoing);
        self.y.reconstrain_in(&mut tx, ongoing);
        tx.commit();
    }

    /// Subscribes to changes of either axis; called once per transaction.
    pub fn subscribe(&self, callback: impl Fn(bool) + 'static) -> Subscription {
        self.notifier.subscribe(callback)
    }

    fn set_pair(&self, tx: &mut Transaction, ongoing: bool, x: AxisRequest, y: AxisRequest) {
        self.x.set_in(tx, ongoing, x);
        self.y.set_in(tx, ongoing, y);
        if fell_short(&self.x, x) || fell_short(&self.y, y) {
            #[cfg(feature = "tracing")]
            tracing::trace!("re-applying X request after narrowed span");
            self.x.set_in(tx, ongoing, x);
        }
    }
}

/// Request that keeps `axis` at its current scale with the coordinate under `px` in place.
fn hold_request(axis: &Axis, px: f64) -> AxisRequest {
    AxisRequest::anchor(axis.viewport().frac_of(px), axis.px_to_coord(px), axis.scale())
}

/// Whether `axis` committed a span more than [`X_REAPPLY_TOLERANCE`] narrower than `request`.
fn fell_short(axis: &Axis, request: AxisRequest) -> bool {
    let requested = request.requested_span(axis.span_lpx());
    axis.bounds().span() < (1.0 - X_REAPPLY_TOLERANCE) * requested
}
